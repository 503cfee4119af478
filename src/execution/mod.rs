//! # Batch Execution
//!
//! Concurrency-bounded execution of independent provider calls. A batch run
//! consults the result cache, honors tripped failure contexts, isolates
//! per-operation failures, and reports one result per submitted operation in
//! submission order.

pub mod batch_executor;
pub mod operation;

pub use batch_executor::{BatchExecutor, BatchSummary};
pub use operation::{
    BatchCancellation, BatchOperation, CachePolicy, OperationResult, OperationStatus,
};
