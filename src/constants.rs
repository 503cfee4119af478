//! # System Constants and Defaults
//!
//! Well-known names and default tuning values shared across the
//! document-processing core. Callers can register arbitrary failure contexts
//! and cache keys; the constants here are the ones the built-in pipeline uses,
//! kept in one place so operators see consistent names in logs and snapshots.

/// Failure-context names for the pipeline's external dependencies
pub mod contexts {
    /// Vision service performing text extraction
    pub const OCR: &str = "ocr";

    /// Blob storage holding uploaded receipt images
    pub const STORAGE: &str = "storage";

    /// Document database persisting receipt records
    pub const DOCUMENT_STORE: &str = "document_store";
}

/// Cache key prefixes for pipeline-managed entries
pub mod cache_keys {
    /// Memoized OCR extraction, keyed by image content digest
    pub const OCR_TEXT: &str = "ocr_text";

    /// Memoized upload result, keyed by owner and image content digest
    pub const UPLOADED_IMAGE: &str = "uploaded_image";
}

/// Default tuning values applied when configuration does not override them
pub mod defaults {
    /// Consecutive failures required to trip a failure context
    pub const FAILURE_THRESHOLD: u32 = 3;

    /// Maximum cache entries before least-recently-used eviction
    pub const CACHE_MAX_ENTRIES: usize = 1000;

    /// TTL in seconds applied to cached values without an explicit one
    pub const CACHE_TTL_SECONDS: u64 = 300;

    /// Concurrency cap for batch execution
    pub const CONCURRENCY_LIMIT: usize = 4;

    /// Timeout in seconds applied to operations without an explicit one
    pub const OPERATION_TIMEOUT_SECONDS: u64 = 30;

    /// Upper bound in seconds on any per-operation timeout
    pub const MAX_OPERATION_TIMEOUT_SECONDS: u64 = 300;
}
