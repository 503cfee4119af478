//! # Pipeline Provider Contracts
//!
//! External collaborators of the document pipeline, expressed as traits so
//! production wiring and tests can substitute implementations freely. Every
//! method is an opaque async operation that fails with a [`ProviderError`];
//! resilience (timeouts, failure tracking, caching) is layered on by the
//! batch executor, never inside a provider.

use async_trait::async_trait;

use super::types::{NewReceipt, StoredImage};
use crate::error::ProviderError;

/// Text extraction from a document image
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Extract text from a document image.
    ///
    /// `Ok(None)` means the provider ran and found no recognizable text;
    /// that is a valid outcome, not a failure.
    async fn extract_text(&self, image: &[u8]) -> Result<Option<String>, ProviderError>;
}

/// Durable storage for uploaded document images
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Upload an image and return where it landed
    async fn upload_image(
        &self,
        image: &[u8],
        owner_id: &str,
        file_name: &str,
    ) -> Result<StoredImage, ProviderError>;
}

/// Persistence for finished receipt records
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Persist a receipt and return its identifier
    async fn save_receipt(&self, receipt: NewReceipt) -> Result<String, ProviderError>;
}
