//! Batch operation descriptors and completion records.
//!
//! A [`BatchOperation`] bundles a deferred provider call with the policies
//! the executor applies around it: an optional cache slot, an optional
//! failure context for circuit tracking, and an optional timeout override.
//! The call itself stays unexecuted until the executor admits it.

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{ProcessingError, ProviderError};

/// Caching instructions for one batch operation
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Key probed before invocation and written after success
    pub key: String,
    /// TTL for the stored result; `None` falls back to the cache default
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Deferred provider call, invoked only once the executor admits it
type OperationFn =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<Value, ProviderError>> + Send + 'static>;

/// One independent unit of work within a batch
pub struct BatchOperation {
    pub(crate) name: String,
    pub(crate) cache: Option<CachePolicy>,
    pub(crate) failure_context: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) operation: OperationFn,
}

impl BatchOperation {
    /// Wrap a deferred call. The closure is not invoked here; the executor
    /// calls it after the cache probe and circuit check both pass.
    pub fn new<F, Fut>(name: impl Into<String>, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, ProviderError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            cache: None,
            failure_context: None,
            timeout: None,
            operation: Box::new(move || {
                let future: BoxFuture<'static, Result<Value, ProviderError>> =
                    Box::pin(operation());
                future
            }),
        }
    }

    /// Probe and fill this cache slot around the call
    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    /// Count this call's outcome against a failure context
    pub fn with_failure_context(mut self, context: impl Into<String>) -> Self {
        self.failure_context = Some(context.into());
        self
    }

    /// Override the executor's default timeout for this call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOperation")
            .field("name", &self.name)
            .field("cache", &self.cache)
            .field("failure_context", &self.failure_context)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Coarse classification of a finished slot, for logging and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Produced a value, whether by invocation or from the cache
    Completed,
    /// Invoked and failed, timeouts included
    Failed,
    /// Rejected without invocation because its failure context is tripped
    ShortCircuited,
    /// Ended by batch cancellation, before or during invocation
    Cancelled,
}

/// Completion record for one slot of a batch run
#[derive(Debug)]
pub struct OperationResult {
    /// Position of the operation in the submitted batch
    pub index: usize,
    pub name: String,
    pub outcome: Result<Value, ProcessingError>,
    /// True when the value was served from the cache without invocation
    pub from_cache: bool,
    pub duration: Duration,
}

impl OperationResult {
    pub(crate) fn completed(index: usize, name: String, value: Value, duration: Duration) -> Self {
        Self {
            index,
            name,
            outcome: Ok(value),
            from_cache: false,
            duration,
        }
    }

    pub(crate) fn served_from_cache(
        index: usize,
        name: String,
        value: Value,
        duration: Duration,
    ) -> Self {
        Self {
            index,
            name,
            outcome: Ok(value),
            from_cache: true,
            duration,
        }
    }

    pub(crate) fn failed(
        index: usize,
        name: String,
        error: ProcessingError,
        duration: Duration,
    ) -> Self {
        Self {
            index,
            name,
            outcome: Err(error),
            from_cache: false,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ProcessingError> {
        self.outcome.as_ref().err()
    }

    pub fn status(&self) -> OperationStatus {
        match &self.outcome {
            Ok(_) => OperationStatus::Completed,
            Err(ProcessingError::CircuitOpen { .. }) => OperationStatus::ShortCircuited,
            Err(ProcessingError::Cancelled { .. }) => OperationStatus::Cancelled,
            Err(_) => OperationStatus::Failed,
        }
    }
}

#[derive(Debug, Default)]
struct CancellationInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation handle for batch runs.
///
/// Clones share state: cancelling one handle cancels every batch running
/// with it. Operations not yet started are skipped; in-flight operations are
/// abandoned at their next await point.
#[derive(Debug, Clone, Default)]
pub struct BatchCancellation {
    inner: Arc<CancellationInner>,
}

impl BatchCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called, immediately if it already was
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);

        // Register interest before checking the flag so a cancel landing in
        // between cannot be missed
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_policies() {
        let operation = BatchOperation::new("extract_text", || async { Ok(json!("text")) })
            .with_cache(CachePolicy::new("ocr_text:abc").with_ttl(Duration::from_secs(60)))
            .with_failure_context("ocr")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(operation.name(), "extract_text");
        assert_eq!(operation.failure_context.as_deref(), Some("ocr"));
        assert_eq!(operation.timeout, Some(Duration::from_secs(5)));

        let policy = operation.cache.as_ref().unwrap();
        assert_eq!(policy.key, "ocr_text:abc");
        assert_eq!(policy.ttl, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_deferred_call_runs_when_invoked() {
        let operation = BatchOperation::new("upload_image", || async {
            Ok(json!({"url": "https://cdn.example/1.jpg"}))
        });

        let value = (operation.operation)().await.unwrap();
        assert_eq!(value["url"], "https://cdn.example/1.jpg");
    }

    #[test]
    fn test_status_classification() {
        let duration = Duration::from_millis(1);

        let completed =
            OperationResult::completed(0, "op".to_string(), json!(1), duration);
        assert_eq!(completed.status(), OperationStatus::Completed);
        assert!(completed.is_success());

        let cached = OperationResult::served_from_cache(1, "op".to_string(), json!(2), duration);
        assert_eq!(cached.status(), OperationStatus::Completed);
        assert!(cached.from_cache);

        let short_circuited = OperationResult::failed(
            2,
            "op".to_string(),
            ProcessingError::circuit_open("ocr"),
            duration,
        );
        assert_eq!(short_circuited.status(), OperationStatus::ShortCircuited);

        let cancelled = OperationResult::failed(
            3,
            "op".to_string(),
            ProcessingError::cancelled("op"),
            duration,
        );
        assert_eq!(cancelled.status(), OperationStatus::Cancelled);

        let failed = OperationResult::failed(
            4,
            "op".to_string(),
            ProcessingError::provider("op", ProviderError::transport("reset")),
            duration,
        );
        assert_eq!(failed.status(), OperationStatus::Failed);
        assert!(failed.error().is_some());
    }

    #[tokio::test]
    async fn test_cancellation_resolves_waiters() {
        let cancellation = BatchCancellation::new();
        assert!(!cancellation.is_cancelled());

        let waiter = {
            let cancellation = cancellation.clone();
            tokio::spawn(async move { cancellation.cancelled().await })
        };

        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve after cancel")
            .unwrap();

        // Late waiters resolve immediately
        tokio::time::timeout(Duration::from_secs(1), cancellation.cancelled())
            .await
            .expect("already-cancelled handle resolves immediately");
        assert!(cancellation.is_cancelled());
    }
}
