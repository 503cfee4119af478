//! Batch Executor
//!
//! Runs a set of independent provider calls with a hard concurrency cap and
//! returns one result per operation in submission order. Before invoking
//! anything the executor probes the result cache and the failure tracker:
//! cache hits skip the call entirely, and operations whose context is tripped
//! are rejected without touching the dependency. Successes feed the cache and
//! close circuits; failures and timeouts count toward tripping them.
//!
//! One slot's failure never aborts its siblings. The only whole-batch errors
//! are rejected parameters, reported before anything executes.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::ExecutorConfig;
use crate::error::{ProcessingError, ProviderError, Result};
use crate::resilience::FailureTracker;

use super::operation::{BatchCancellation, BatchOperation, OperationResult, OperationStatus};

/// Aggregate view of a finished batch, used for logging and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub short_circuited: usize,
    pub cancelled: usize,
    /// Completed slots that never invoked their operation
    pub served_from_cache: usize,
}

impl BatchSummary {
    /// Tally slot statuses from a finished run
    pub fn from_results(results: &[OperationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status() {
                OperationStatus::Completed => summary.completed += 1,
                OperationStatus::Failed => summary.failed += 1,
                OperationStatus::ShortCircuited => summary.short_circuited += 1,
                OperationStatus::Cancelled => summary.cancelled += 1,
            }
            if result.from_cache {
                summary.served_from_cache += 1;
            }
        }
        summary
    }

    /// True when every slot produced a value
    pub fn all_completed(&self) -> bool {
        self.completed == self.total
    }
}

/// Concurrency-bounded executor for independent provider calls
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    cache: Arc<TtlCache<Value>>,
    tracker: Arc<FailureTracker>,
    config: ExecutorConfig,
}

impl BatchExecutor {
    /// Create an executor with default timeout configuration
    pub fn new(cache: Arc<TtlCache<Value>>, tracker: Arc<FailureTracker>) -> Self {
        Self::with_config(cache, tracker, ExecutorConfig::default())
    }

    /// Create an executor with explicit timeout configuration
    pub fn with_config(
        cache: Arc<TtlCache<Value>>,
        tracker: Arc<FailureTracker>,
        config: ExecutorConfig,
    ) -> Self {
        debug!(
            operation_timeout_seconds = config.operation_timeout_seconds,
            max_operation_timeout_seconds = config.max_operation_timeout_seconds,
            "Initializing batch executor"
        );
        Self {
            cache,
            tracker,
            config,
        }
    }

    /// Shared result cache
    pub fn cache(&self) -> &Arc<TtlCache<Value>> {
        &self.cache
    }

    /// Shared failure tracker
    pub fn tracker(&self) -> &Arc<FailureTracker> {
        &self.tracker
    }

    /// Run a batch without external cancellation
    pub async fn run(
        &self,
        operations: Vec<BatchOperation>,
        concurrency_limit: usize,
    ) -> Result<Vec<OperationResult>> {
        self.run_with_cancellation(operations, concurrency_limit, BatchCancellation::new())
            .await
    }

    /// Run every operation with at most `concurrency_limit` in flight.
    ///
    /// Returns one result per operation, in submission order, regardless of
    /// completion order. An empty batch completes immediately. A
    /// `concurrency_limit` of zero is rejected before anything executes;
    /// limits larger than the batch admit every operation at once.
    #[instrument(skip(self, operations, cancellation), fields(operation_count = operations.len()))]
    pub async fn run_with_cancellation(
        &self,
        operations: Vec<BatchOperation>,
        concurrency_limit: usize,
        cancellation: BatchCancellation,
    ) -> Result<Vec<OperationResult>> {
        if concurrency_limit == 0 {
            return Err(ProcessingError::configuration(
                "concurrency limit must be at least 1",
            ));
        }
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let batch_id = Uuid::new_v4();
        debug!(
            batch_id = %batch_id,
            operation_count = operations.len(),
            concurrency_limit,
            "Starting batch execution"
        );

        // Tokio caps semaphore permits; a batch never needs more than one
        // permit per operation
        let permits = concurrency_limit.min(operations.len());
        let semaphore = Arc::new(Semaphore::new(permits));
        let names: Vec<String> = operations.iter().map(|op| op.name.clone()).collect();

        let mut handles = Vec::with_capacity(operations.len());
        for (index, operation) in operations.into_iter().enumerate() {
            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancellation = cancellation.clone();

            let handle = tokio::spawn(async move {
                executor
                    .execute_slot(index, operation, semaphore, cancellation)
                    .await
            });
            handles.push(handle);
        }

        // Collect in submission order; completion order does not matter
        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(
                        batch_id = %batch_id,
                        operation = %names[index],
                        error = %e,
                        "Operation task panicked"
                    );
                    results.push(OperationResult::failed(
                        index,
                        names[index].clone(),
                        ProcessingError::internal(format!("operation task panicked: {e}")),
                        Duration::ZERO,
                    ));
                }
            }
        }

        let summary = BatchSummary::from_results(&results);
        info!(
            batch_id = %batch_id,
            executed_operations = summary.total,
            completed_operations = summary.completed,
            failed_operations = summary.failed,
            short_circuited_operations = summary.short_circuited,
            cancelled_operations = summary.cancelled,
            served_from_cache = summary.served_from_cache,
            "Batch execution completed"
        );

        Ok(results)
    }

    /// Execute one slot end to end: admission, cache probe, circuit check,
    /// invocation, bookkeeping.
    async fn execute_slot(
        &self,
        index: usize,
        operation: BatchOperation,
        semaphore: Arc<Semaphore>,
        cancellation: BatchCancellation,
    ) -> OperationResult {
        let started = Instant::now();
        let BatchOperation {
            name,
            cache: cache_policy,
            failure_context,
            timeout: timeout_override,
            operation,
        } = operation;

        // Admission: wait for a permit, racing batch cancellation
        let _permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    // Semaphore closed mid-run; treat like cancellation
                    return OperationResult::failed(
                        index,
                        name.clone(),
                        ProcessingError::cancelled(name),
                        started.elapsed(),
                    );
                }
            },
            _ = cancellation.cancelled() => {
                debug!(operation = %name, "Operation skipped: batch cancelled before start");
                return OperationResult::failed(
                    index,
                    name.clone(),
                    ProcessingError::cancelled(name),
                    started.elapsed(),
                );
            }
        };

        // A cancel can land while this slot was queued for a permit
        if cancellation.is_cancelled() {
            debug!(operation = %name, "Operation skipped: batch cancelled before start");
            return OperationResult::failed(
                index,
                name.clone(),
                ProcessingError::cancelled(name),
                started.elapsed(),
            );
        }

        // Cache probe comes before the circuit check, so memoized results
        // keep flowing even while a dependency is tripped
        if let Some(policy) = &cache_policy {
            if let Some(value) = self.cache.get(&policy.key) {
                debug!(operation = %name, cache_key = %policy.key, "Serving result from cache");
                return OperationResult::served_from_cache(index, name, value, started.elapsed());
            }
        }

        if let Some(context) = &failure_context {
            if self.tracker.is_tripped(context) {
                warn!(
                    operation = %name,
                    context = %context,
                    "Operation short-circuited: failure context is tripped"
                );
                return OperationResult::failed(
                    index,
                    name,
                    ProcessingError::circuit_open(context.clone()),
                    started.elapsed(),
                );
            }
        }

        let default_timeout = self.config.operation_timeout();
        let max_timeout = self.config.max_operation_timeout();
        let effective_timeout = timeout_override.unwrap_or(default_timeout).min(max_timeout);

        let invocation = timeout(effective_timeout, (operation)());
        let call_outcome = tokio::select! {
            result = invocation => Some(result),
            _ = cancellation.cancelled() => None,
        };

        let duration = started.elapsed();
        match call_outcome {
            // Cancelled in flight. The dependency's state is unknown, so the
            // attempt counts as a failure for its context.
            None => {
                if let Some(context) = &failure_context {
                    self.tracker.record_failure(context);
                }
                warn!(
                    operation = %name,
                    duration_ms = duration.as_millis(),
                    "Operation cancelled in flight"
                );
                OperationResult::failed(
                    index,
                    name.clone(),
                    ProcessingError::cancelled(name),
                    duration,
                )
            }
            // Timed out: treated identically to a provider failure
            Some(Err(_elapsed)) => {
                if let Some(context) = &failure_context {
                    self.tracker.record_failure(context);
                }
                let timeout_ms = effective_timeout.as_millis() as u64;
                error!(operation = %name, timeout_ms, "Operation timed out");
                OperationResult::failed(
                    index,
                    name.clone(),
                    ProcessingError::provider(name, ProviderError::timeout(timeout_ms)),
                    duration,
                )
            }
            Some(Ok(Ok(value))) => {
                if let Some(policy) = &cache_policy {
                    let ttl = policy.ttl.unwrap_or_else(|| self.cache.default_ttl());
                    self.cache.set(policy.key.clone(), value.clone(), ttl);
                }
                if let Some(context) = &failure_context {
                    self.tracker.record_success(context);
                }
                debug!(
                    operation = %name,
                    duration_ms = duration.as_millis(),
                    "Operation completed"
                );
                OperationResult::completed(index, name, value, duration)
            }
            Some(Ok(Err(provider_error))) => {
                if let Some(context) = &failure_context {
                    self.tracker.record_failure(context);
                }
                warn!(
                    operation = %name,
                    error = %provider_error,
                    duration_ms = duration.as_millis(),
                    "Operation failed"
                );
                OperationResult::failed(
                    index,
                    name.clone(),
                    ProcessingError::provider(name, provider_error),
                    duration,
                )
            }
        }
    }
}
