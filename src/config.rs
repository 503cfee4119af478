//! # Configuration Management
//!
//! Environment-aware configuration for the document-processing core. Profiles
//! exist for production (the `Default` impls), development, and test, selected
//! by `RECEIPTA_ENV` with environment variable overrides applied on top.
//!
//! Every component takes its config struct by value at construction time, so
//! tests can build bespoke configurations without touching process state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::info;

use crate::constants::defaults;
use crate::error::{ProcessingError, Result};

/// Configuration for the memoizing TTL cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries held before least-recently-used eviction.
    /// Zero disables storage entirely.
    pub max_entries: usize,
    /// TTL applied when a caller stores a value without an explicit one
    pub default_ttl_seconds: u64,
}

impl CacheConfig {
    /// Get the default TTL as a Duration
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::CACHE_MAX_ENTRIES,
            default_ttl_seconds: defaults::CACHE_TTL_SECONDS,
        }
    }
}

/// Configuration for per-dependency failure tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Consecutive failures required to trip a context without an override
    pub default_threshold: u32,
    /// Per-context threshold overrides, keyed by context name
    pub context_thresholds: HashMap<String, u32>,
}

impl TrackerConfig {
    /// Effective threshold for a context. Zero thresholds are treated as 1
    /// so a context can never begin life tripped.
    pub fn threshold_for(&self, context: &str) -> u32 {
        self.context_thresholds
            .get(context)
            .copied()
            .unwrap_or(self.default_threshold)
            .max(1)
    }

    /// Override the threshold for one context
    pub fn with_context_threshold(mut self, context: impl Into<String>, threshold: u32) -> Self {
        self.context_thresholds.insert(context.into(), threshold);
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_threshold: defaults::FAILURE_THRESHOLD,
            context_thresholds: HashMap::new(),
        }
    }
}

/// Configuration for the batch executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout applied to operations that do not carry their own
    pub operation_timeout_seconds: u64,
    /// Upper bound on any per-operation timeout
    pub max_operation_timeout_seconds: u64,
}

impl ExecutorConfig {
    /// Get the default operation timeout as a Duration
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }

    /// Get the maximum operation timeout as a Duration
    pub fn max_operation_timeout(&self) -> Duration {
        Duration::from_secs(self.max_operation_timeout_seconds)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            operation_timeout_seconds: defaults::OPERATION_TIMEOUT_SECONDS,
            max_operation_timeout_seconds: defaults::MAX_OPERATION_TIMEOUT_SECONDS,
        }
    }
}

/// Configuration for the document pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// TTL for memoized OCR extractions. Content-addressed, so safe to keep
    /// for a long time.
    pub ocr_ttl_seconds: u64,
    /// TTL for memoized upload results
    pub upload_ttl_seconds: u64,
    /// Concurrency cap applied to a single document's provider calls
    pub document_concurrency: usize,
}

impl PipelineConfig {
    /// Get the OCR cache TTL as a Duration
    pub fn ocr_ttl(&self) -> Duration {
        Duration::from_secs(self.ocr_ttl_seconds)
    }

    /// Get the upload cache TTL as a Duration
    pub fn upload_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_ttl_seconds)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_ttl_seconds: 3600,
            upload_ttl_seconds: 600,
            document_concurrency: defaults::CONCURRENCY_LIMIT,
        }
    }
}

/// Top-level configuration for the document-processing core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub cache: CacheConfig,
    pub tracker: TrackerConfig,
    pub executor: ExecutorConfig,
    pub pipeline: PipelineConfig,
}

impl Default for CoreConfig {
    /// Default configuration suitable for production
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            tracker: TrackerConfig::default(),
            executor: ExecutorConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Create test-optimized configuration with rapid expiry and low thresholds
    pub fn for_test() -> Self {
        Self {
            cache: CacheConfig {
                max_entries: 100,
                default_ttl_seconds: 1, // 1 second for rapid test feedback
            },
            tracker: TrackerConfig {
                default_threshold: 2, // Trip quickly in tests
                context_thresholds: HashMap::new(),
            },
            executor: ExecutorConfig {
                operation_timeout_seconds: 5,
                max_operation_timeout_seconds: 10,
            },
            pipeline: PipelineConfig {
                ocr_ttl_seconds: 5,
                upload_ttl_seconds: 5,
                document_concurrency: 2,
            },
        }
    }

    /// Create development-optimized configuration
    pub fn for_development() -> Self {
        Self {
            cache: CacheConfig {
                max_entries: 500,
                default_ttl_seconds: 60, // 1 minute for development
            },
            tracker: TrackerConfig::default(),
            executor: ExecutorConfig {
                operation_timeout_seconds: 15,
                max_operation_timeout_seconds: 60,
            },
            pipeline: PipelineConfig {
                ocr_ttl_seconds: 300,
                upload_ttl_seconds: 120,
                document_concurrency: defaults::CONCURRENCY_LIMIT,
            },
        }
    }

    /// Load configuration from environment or use defaults
    pub fn from_environment() -> Self {
        // Detect environment from common environment variables
        let environment = env::var("RECEIPTA_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .or_else(|_| env::var("RUST_ENV"))
            .unwrap_or_else(|_| "production".to_string());

        let config = match environment.as_str() {
            "test" => {
                info!("Loading test processing configuration (rapid expiry)");
                Self::for_test()
            }
            "development" => {
                info!("Loading development processing configuration");
                Self::for_development()
            }
            _ => {
                info!("Loading production processing configuration");
                Self::default()
            }
        };

        // Apply environment variable overrides
        config.with_env_overrides()
    }

    /// Apply environment variable overrides to configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(max) = env::var("RECEIPTA_CACHE_MAX_ENTRIES") {
            if let Ok(entries) = max.parse::<usize>() {
                self.cache.max_entries = entries;
                info!("Cache max entries override: {}", entries);
            }
        }

        if let Ok(ttl) = env::var("RECEIPTA_CACHE_DEFAULT_TTL_SECONDS") {
            if let Ok(seconds) = ttl.parse::<u64>() {
                self.cache.default_ttl_seconds = seconds;
                info!("Cache default TTL override: {}s", seconds);
            }
        }

        if let Ok(threshold) = env::var("RECEIPTA_FAILURE_THRESHOLD") {
            if let Ok(count) = threshold.parse::<u32>() {
                self.tracker.default_threshold = count;
                info!("Failure threshold override: {}", count);
            }
        }

        if let Ok(timeout) = env::var("RECEIPTA_OPERATION_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                self.executor.operation_timeout_seconds = seconds;
                info!("Operation timeout override: {}s", seconds);
            }
        }

        if let Ok(concurrency) = env::var("RECEIPTA_DOCUMENT_CONCURRENCY") {
            if let Ok(limit) = concurrency.parse::<usize>() {
                self.pipeline.document_concurrency = limit;
                info!("Document concurrency override: {}", limit);
            }
        }

        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.document_concurrency == 0 {
            return Err(ProcessingError::configuration(
                "document_concurrency must be at least 1",
            ));
        }

        if self.executor.operation_timeout_seconds == 0 {
            return Err(ProcessingError::configuration(
                "operation_timeout_seconds must be at least 1",
            ));
        }

        if self.tracker.default_threshold == 0 {
            return Err(ProcessingError::configuration(
                "default_threshold must be at least 1",
            ));
        }

        Ok(())
    }

    /// Log current configuration for debugging
    pub fn log_configuration(&self) {
        info!("Document Processing Configuration:");
        info!(
            "  Cache: {} max entries, {}s default TTL",
            self.cache.max_entries, self.cache.default_ttl_seconds
        );
        info!(
            "  Tracker: {} failure threshold, {} context overrides",
            self.tracker.default_threshold,
            self.tracker.context_thresholds.len()
        );
        info!(
            "  Executor: {}s operation timeout, {}s maximum",
            self.executor.operation_timeout_seconds, self.executor.max_operation_timeout_seconds
        );
        info!(
            "  Pipeline: {}s OCR TTL, {}s upload TTL, {} document concurrency",
            self.pipeline.ocr_ttl_seconds,
            self.pipeline.upload_ttl_seconds,
            self.pipeline.document_concurrency
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = CoreConfig::default();
        assert_eq!(config.cache.max_entries, defaults::CACHE_MAX_ENTRIES);
        assert_eq!(config.tracker.default_threshold, defaults::FAILURE_THRESHOLD);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_test_profile_uses_rapid_expiry() {
        let config = CoreConfig::for_test();
        assert_eq!(config.cache.default_ttl_seconds, 1);
        assert!(config.tracker.default_threshold < defaults::FAILURE_THRESHOLD);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_override_and_clamping() {
        let tracker = TrackerConfig::default()
            .with_context_threshold("ocr", 5)
            .with_context_threshold("storage", 0);

        assert_eq!(tracker.threshold_for("ocr"), 5);
        assert_eq!(tracker.threshold_for("storage"), 1); // clamped
        assert_eq!(
            tracker.threshold_for("document_store"),
            defaults::FAILURE_THRESHOLD
        );
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = CoreConfig::default();
        config.pipeline.document_concurrency = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("document_concurrency"));
    }

    #[test]
    fn test_env_overrides_apply() {
        env::set_var("RECEIPTA_CACHE_MAX_ENTRIES", "42");
        env::set_var("RECEIPTA_FAILURE_THRESHOLD", "not-a-number");

        let config = CoreConfig::default().with_env_overrides();
        assert_eq!(config.cache.max_entries, 42);
        // Unparseable overrides are ignored, not fatal
        assert_eq!(config.tracker.default_threshold, defaults::FAILURE_THRESHOLD);

        env::remove_var("RECEIPTA_CACHE_MAX_ENTRIES");
        env::remove_var("RECEIPTA_FAILURE_THRESHOLD");
    }
}
