//! # Document Pipeline
//!
//! The consumer-facing layer: accepts an uploaded receipt image, runs each
//! external stage (storage upload, text extraction, persistence) through the
//! batch executor, classifies locally, and returns a document that degrades
//! instead of failing when a dependency is down.

pub mod document_processor;
pub mod providers;
pub mod types;

pub use document_processor::DocumentProcessor;
pub use providers::{OcrProvider, ReceiptStore, StorageProvider};
pub use types::{DocumentUpload, NewReceipt, ProcessedDocument, StoredImage};
