#![allow(clippy::doc_markdown)] // Allow technical terms like OCR, TTL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Receipta Core Rust
//!
//! Resilience core for the Receipta document-processing pipeline.
//!
//! ## Overview
//!
//! Receipta ingests receipt images whose processing depends on flaky external
//! services (OCR, object storage, the document database). This crate keeps
//! the pipeline responsive while those dependencies misbehave: provider
//! results are memoized with TTLs, repeated failures trip a per-dependency
//! circuit so callers fail fast instead of piling on, and batches of provider
//! calls run under a hard concurrency cap with per-slot isolation.
//!
//! ## Key Components
//!
//! - **TTL Cache**: bounded, thread-safe memoization with per-entry TTLs and
//!   least-recently-used eviction
//! - **Failure Tracker**: consecutive-failure counting per named context with
//!   a two-state circuit (healthy or tripped; recovery only through a real
//!   success or an explicit reset, never by the clock)
//! - **Batch Executor**: concurrency-capped execution of independent provider
//!   calls with cache probe, circuit check, timeout, and cancellation per
//!   slot, returning order-preserving results
//! - **Document Pipeline**: the consumer layer that runs upload, extraction,
//!   classification, and persistence for an uploaded receipt, degrading
//!   instead of failing when a dependency is down
//!
//! ## Module Organization
//!
//! - [`cache`] - TTL cache with LRU eviction
//! - [`clock`] - Time source abstraction for deterministic tests
//! - [`config`] - Configuration management
//! - [`constants`] - Failure context names, cache key prefixes, defaults
//! - [`error`] - Structured error handling
//! - [`execution`] - Batch executor and operation builders
//! - [`logging`] - Structured logging initialization
//! - [`pipeline`] - Document processing pipeline
//! - [`resilience`] - Failure tracking and circuit state
//!
//! ## Quick Start
//!
//! ```rust
//! use receipta_core::cache::TtlCache;
//! use receipta_core::config::CoreConfig;
//! use receipta_core::execution::{BatchExecutor, BatchOperation};
//! use receipta_core::resilience::FailureTracker;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CoreConfig::default();
//! let cache = Arc::new(TtlCache::new(config.cache.clone()));
//! let tracker = Arc::new(FailureTracker::new(config.tracker.clone()));
//! let executor = BatchExecutor::with_config(cache, tracker, config.executor.clone());
//!
//! let operation = BatchOperation::new("extract_text", || async { Ok(json!("TOTAL 12.50")) })
//!     .with_failure_context("ocr");
//! let results = executor.run(vec![operation], 4).await?;
//! assert!(results[0].is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live beside each module; integration and property tests cover
//! executor behavior and pipeline degradation with mock providers:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod execution;
pub mod logging;
pub mod pipeline;
pub mod resilience;

pub use cache::{CacheStats, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CoreConfig, ExecutorConfig, PipelineConfig, TrackerConfig};
pub use error::{ProcessingError, ProviderError, Result};
pub use execution::{
    BatchCancellation, BatchExecutor, BatchOperation, BatchSummary, CachePolicy, OperationResult,
    OperationStatus,
};
pub use pipeline::{
    DocumentProcessor, DocumentUpload, NewReceipt, OcrProvider, ProcessedDocument, ReceiptStore,
    StorageProvider, StoredImage,
};
pub use resilience::{ContextHealth, FailureSnapshot, FailureTracker};
