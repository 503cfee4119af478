//! # Resilience Module
//!
//! Per-dependency failure tracking that isolates failing providers and fails
//! fast once a dependency has shown it is down.
//!
//! The tracker is a two-state circuit per context: healthy until a configured
//! number of consecutive failures accumulates, then tripped until a recorded
//! success or an explicit reset restores it. Recovery is evidence-driven;
//! there is no time-based half-open probation.
//!
//! ## Usage
//!
//! ```rust
//! use receipta_core::config::TrackerConfig;
//! use receipta_core::resilience::FailureTracker;
//!
//! let tracker = FailureTracker::new(TrackerConfig::default());
//!
//! tracker.record_failure("ocr");
//! assert!(!tracker.is_tripped("ocr"));
//!
//! tracker.record_success("ocr");
//! assert_eq!(tracker.snapshot("ocr").consecutive_failures, 0);
//! ```

pub mod failure_tracker;

pub use failure_tracker::{ContextHealth, FailureSnapshot, FailureTracker};
