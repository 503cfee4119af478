//! # Result Caching
//!
//! Memoizing TTL cache used to avoid repeated provider calls for identical
//! inputs. Values expire lazily on access and a bounded capacity evicts the
//! least recently used entry when full.

pub mod ttl_cache;

pub use ttl_cache::{CacheStats, TtlCache};
