use proptest::prelude::*;

/// Strategy for generating cache keys
pub fn cache_key_strategy() -> impl Strategy<Value = String> {
    "[a-z_]{1,12}:[a-f0-9]{1,16}"
}

/// Strategy for generating failure context names
pub fn context_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ocr".to_string()),
        Just("storage".to_string()),
        Just("document_store".to_string()),
        "[a-z_][a-z0-9_]{0,15}",
    ]
}

/// Strategy for keys drawn from a small space, so sequences collide and evict
pub fn small_key_strategy() -> impl Strategy<Value = String> {
    (0u8..8).prop_map(|i| format!("key_{i}"))
}

/// Strategy for small cache capacities
pub fn capacity_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}

/// Strategy for trip thresholds
pub fn threshold_strategy() -> impl Strategy<Value = u32> {
    1u32..6
}

/// A scripted cache interaction
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Set { key: String, value: i64 },
    Get { key: String },
    Invalidate { key: String },
}

/// Strategy for generating one cache interaction
pub fn cache_event_strategy() -> impl Strategy<Value = CacheEvent> {
    prop_oneof![
        3 => (small_key_strategy(), any::<i64>())
            .prop_map(|(key, value)| CacheEvent::Set { key, value }),
        2 => small_key_strategy().prop_map(|key| CacheEvent::Get { key }),
        1 => small_key_strategy().prop_map(|key| CacheEvent::Invalidate { key }),
    ]
}

/// Strategy for generating cache interaction sequences
pub fn cache_event_sequence_strategy() -> impl Strategy<Value = Vec<CacheEvent>> {
    prop::collection::vec(cache_event_strategy(), 0..64)
}

/// A scripted tracker interaction against a single context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    Success,
    Failure,
    Reset,
}

/// Strategy for generating one tracker interaction, biased toward failures
pub fn tracker_event_strategy() -> impl Strategy<Value = TrackerEvent> {
    prop_oneof![
        2 => Just(TrackerEvent::Success),
        3 => Just(TrackerEvent::Failure),
        1 => Just(TrackerEvent::Reset),
    ]
}

/// Strategy for generating tracker interaction sequences
pub fn tracker_event_sequence_strategy() -> impl Strategy<Value = Vec<TrackerEvent>> {
    prop::collection::vec(tracker_event_strategy(), 0..48)
}
