//! # Document Processor
//!
//! Entry point for processing an uploaded receipt image. Each external stage
//! (storage upload, text extraction, persistence) runs through the batch
//! executor so it picks up caching, failure tracking, and timeouts without
//! the providers knowing about any of it. Classification is local and never
//! touches a dependency.
//!
//! The processor degrades instead of failing: a tripped or failing stage
//! leaves its field empty and contributes a warning, and the document still
//! comes back with everything the healthy stages produced. Only invalid
//! input or configuration aborts processing.

use chrono::Utc;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::{CoreConfig, PipelineConfig};
use crate::constants::{cache_keys, contexts};
use crate::error::{ProcessingError, Result};
use crate::execution::{BatchExecutor, BatchOperation, CachePolicy, OperationResult};
use crate::logging::log_document_operation;
use crate::resilience::FailureTracker;

use super::providers::{OcrProvider, ReceiptStore, StorageProvider};
use super::types::{DocumentUpload, NewReceipt, ProcessedDocument, StoredImage};

/// Orchestrates the receipt pipeline over injected providers
pub struct DocumentProcessor {
    executor: BatchExecutor,
    ocr: Arc<dyn OcrProvider>,
    storage: Arc<dyn StorageProvider>,
    store: Arc<dyn ReceiptStore>,
    config: PipelineConfig,
}

impl fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentProcessor {
    /// Create a processor around an existing executor
    pub fn new(
        executor: BatchExecutor,
        ocr: Arc<dyn OcrProvider>,
        storage: Arc<dyn StorageProvider>,
        store: Arc<dyn ReceiptStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            executor,
            ocr,
            storage,
            store,
            config,
        }
    }

    /// Build the full stack (cache, tracker, executor) from configuration.
    ///
    /// Validates the configuration first so an invalid setup fails at boot
    /// instead of on the first document.
    pub fn from_config(
        config: CoreConfig,
        ocr: Arc<dyn OcrProvider>,
        storage: Arc<dyn StorageProvider>,
        store: Arc<dyn ReceiptStore>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(TtlCache::new(config.cache));
        let tracker = Arc::new(FailureTracker::new(config.tracker));
        let executor = BatchExecutor::with_config(cache, tracker, config.executor);

        info!(
            document_concurrency = config.pipeline.document_concurrency,
            "📄 Document processor initialized"
        );
        Ok(Self::new(executor, ocr, storage, store, config.pipeline))
    }

    /// The executor (and through it the shared cache and tracker)
    pub fn executor(&self) -> &BatchExecutor {
        &self.executor
    }

    /// Process one uploaded document end to end.
    ///
    /// Returns a [`ProcessedDocument`] even when stages were degraded; check
    /// [`ProcessedDocument::is_complete`] and `warnings` to tell. Errors only
    /// on invalid input or configuration.
    #[instrument(
        skip(self, upload),
        fields(owner_id = %upload.owner_id, file_name = %upload.file_name)
    )]
    pub async fn process_document(&self, upload: DocumentUpload) -> Result<ProcessedDocument> {
        let DocumentUpload {
            owner_id,
            file_name,
            image,
            categories,
        } = upload;

        if image.is_empty() {
            return Err(ProcessingError::configuration("document image is empty"));
        }

        let document_id = Uuid::new_v4();
        let digest = content_digest(&image);
        let image = Arc::new(image);

        // Stage 1: upload and extraction, concurrently. Cache keys derive
        // from the content digest so a re-submitted image skips both calls.
        let storage = Arc::clone(&self.storage);
        let image_bytes = Arc::clone(&image);
        let upload_owner = owner_id.clone();
        let upload_file = file_name.clone();
        let upload_op = BatchOperation::new("upload_image", move || async move {
            let stored = storage
                .upload_image(image_bytes.as_slice(), &upload_owner, &upload_file)
                .await?;
            Ok(json!({ "url": stored.url, "path": stored.path }))
        })
        .with_cache(
            CachePolicy::new(format!(
                "{}:{}:{}",
                cache_keys::UPLOADED_IMAGE,
                owner_id,
                digest
            ))
            .with_ttl(self.config.upload_ttl()),
        )
        .with_failure_context(contexts::STORAGE);

        let ocr = Arc::clone(&self.ocr);
        let image_bytes = Arc::clone(&image);
        let extract_op = BatchOperation::new("extract_text", move || async move {
            let text = ocr.extract_text(image_bytes.as_slice()).await?;
            Ok(json!({ "text": text }))
        })
        .with_cache(
            CachePolicy::new(format!("{}:{}", cache_keys::OCR_TEXT, digest))
                .with_ttl(self.config.ocr_ttl()),
        )
        .with_failure_context(contexts::OCR);

        let results = self
            .executor
            .run(
                vec![upload_op, extract_op],
                self.config.document_concurrency,
            )
            .await?;
        let [upload_result, extract_result]: [OperationResult; 2] =
            results.try_into().map_err(|_| {
                ProcessingError::internal("document batch returned an unexpected number of results")
            })?;

        let mut warnings = Vec::new();

        let stored_image = if let Some(error) = upload_result.error() {
            warnings.push(describe_stage_failure("image upload", error));
            None
        } else {
            upload_result
                .value()
                .and_then(|value| serde_json::from_value::<StoredImage>(value.clone()).ok())
        };

        let extracted_text = if let Some(error) = extract_result.error() {
            warnings.push(describe_stage_failure("text extraction", error));
            None
        } else {
            extract_result
                .value()
                .and_then(|value| value.get("text"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };

        // Stage 2: local classification over whatever text we have
        let category = extracted_text
            .as_deref()
            .and_then(|text| classify_text(text, &categories));

        // Stage 3: persist the receipt, even when earlier stages degraded,
        // so the upload is never silently lost
        let store = Arc::clone(&self.store);
        let receipt = NewReceipt {
            owner_id: owner_id.clone(),
            file_name: file_name.clone(),
            image_url: stored_image.as_ref().map(|stored| stored.url.clone()),
            extracted_text: extracted_text.clone(),
            category: category.clone(),
            created_at: Utc::now(),
        };
        let persist_op = BatchOperation::new("save_receipt", move || async move {
            let receipt_id = store.save_receipt(receipt).await?;
            Ok(json!(receipt_id))
        })
        .with_failure_context(contexts::DOCUMENT_STORE);

        let results = self.executor.run(vec![persist_op], 1).await?;
        let [persist_result]: [OperationResult; 1] = results.try_into().map_err(|_| {
            ProcessingError::internal("persistence batch returned an unexpected number of results")
        })?;

        let receipt_id = if let Some(error) = persist_result.error() {
            warnings.push(describe_stage_failure("receipt persistence", error));
            None
        } else {
            persist_result
                .value()
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };

        let document = ProcessedDocument {
            document_id,
            owner_id,
            file_name,
            stored_image,
            extracted_text,
            category,
            receipt_id,
            warnings,
            processed_at: Utc::now(),
        };

        if document.is_complete() {
            log_document_operation(
                "process_document",
                Some(&document.document_id.to_string()),
                Some(&document.owner_id),
                "completed",
                None,
            );
        } else {
            warn!(
                document_id = %document.document_id,
                owner_id = %document.owner_id,
                warnings = ?document.warnings,
                "📄 Document processed in degraded mode"
            );
        }

        Ok(document)
    }
}

/// Stable digest of the image bytes, used for cache keys
fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Human-readable warning for a degraded stage
fn describe_stage_failure(stage: &str, error: &ProcessingError) -> String {
    if error.is_circuit_open() {
        format!("{stage} unavailable")
    } else {
        format!("{stage} failed: {error}")
    }
}

/// Pick the account category that appears most often in the text.
///
/// Matching is case-insensitive on whole category names; blank names are
/// ignored. Returns `None` when nothing matches, leaving the document
/// uncategorized.
fn classify_text(text: &str, categories: &[String]) -> Option<String> {
    let haystack = text.to_lowercase();
    categories
        .iter()
        // An empty pattern matches at every char boundary; never score it
        .filter(|category| !category.trim().is_empty())
        .map(|category| (category, haystack.matches(&category.to_lowercase()).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(category, _)| category.clone())
}
