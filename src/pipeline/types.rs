//! # Document Pipeline Types
//!
//! Data structures flowing through the receipt pipeline, from the raw upload
//! submitted by the request layer to the processed document returned to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document submitted for processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUpload {
    /// Account that owns the document
    pub owner_id: String,
    /// Original file name, carried through to storage
    pub file_name: String,
    /// Raw image bytes
    pub image: Vec<u8>,
    /// The account's category names, used for local classification
    pub categories: Vec<String>,
}

/// Location of an uploaded image in durable storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    /// Publicly resolvable URL
    pub url: String,
    /// Provider-internal object path
    pub path: String,
}

/// A receipt record ready for persistence.
///
/// Optional fields stay empty when the stage that produces them was degraded;
/// the record is still persisted so the user's upload is never lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReceipt {
    pub owner_id: String,
    pub file_name: String,
    /// Storage URL, when the upload stage succeeded
    pub image_url: Option<String>,
    /// OCR output, when extraction succeeded and found text
    pub extracted_text: Option<String>,
    /// Best-matching category name, when classification found one
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of processing one uploaded document.
///
/// Stage outputs are optional because the pipeline degrades instead of
/// failing: a tripped or failing dependency leaves its field empty and adds
/// a warning describing what was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub document_id: Uuid,
    pub owner_id: String,
    pub file_name: String,
    /// Where the image landed, when the upload stage succeeded
    pub stored_image: Option<StoredImage>,
    /// Extracted text, when OCR succeeded and the image contained any
    pub extracted_text: Option<String>,
    /// Best-matching category name, when classification found one
    pub category: Option<String>,
    /// Persisted receipt id, when the persistence stage succeeded
    pub receipt_id: Option<String>,
    /// One entry per degraded stage, in pipeline order
    pub warnings: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedDocument {
    /// True when no stage was degraded.
    ///
    /// An image with no recognizable text still counts as complete; only
    /// dependency failures produce warnings.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}
