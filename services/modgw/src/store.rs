//! Concurrent smart-meter value store.
//!
//! Bridges ingestion to serving: the MQTT bridge overwrites the latest raw
//! value per key while connection tasks read concurrently. The sharded map
//! keeps every put and get atomic, so a reader sees either no entry or a
//! fully written sample, never a torn one. Entries are only ever overwritten,
//! never deleted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;

/// Latest raw value for one `nodeID/topic` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSample {
    /// Raw textual representation as received from ingestion
    pub raw: String,
    /// Instant of the last write, for staleness policies layered on top
    pub updated_at: DateTime<Utc>,
}

/// Shared latest-value map written by the ingestion bridge and read by the
/// protocol engine
#[derive(Debug, Default)]
pub struct MeterStore {
    values: DashMap<String, ValueSample>,
}

impl MeterStore {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    /// Unconditionally overwrite the value for `key`, stamping the write time.
    pub fn put(&self, key: impl Into<String>, raw: impl Into<String>) {
        let key = key.into();
        let raw = raw.into();
        trace!("Storing value {:?} for key {}", raw, key);
        self.values.insert(
            key,
            ValueSample {
                raw,
                updated_at: Utc::now(),
            },
        );
    }

    /// Latest sample for `key`, or `None` when no value has been seen yet.
    pub fn get(&self, key: &str) -> Option<ValueSample> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_put_get_roundtrip() {
        let store = MeterStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("Node1/volt1"), None);

        store.put("Node1/volt1", "3.14");
        let sample = store.get("Node1/volt1").unwrap();
        assert_eq!(sample.raw, "3.14");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let store = MeterStore::new();

        store.put("Node1/volt1", "1.0");
        let first = store.get("Node1/volt1").unwrap();

        store.put("Node1/volt1", "2.5");
        let second = store.get("Node1/volt1").unwrap();

        // Only the latest value is retained, and the write time moves forward
        assert_eq!(second.raw, "2.5");
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_absent_differs_from_present() {
        let store = MeterStore::new();
        store.put("Node1/volt1", "");

        // An empty value is still a present entry
        assert!(store.get("Node1/volt1").is_some());
        assert!(store.get("Node1/volt2").is_none());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let store = Arc::new(MeterStore::new());
        let values = ["1.0", "2.0", "3.0", "4.0"];
        store.put("Node1/volt1", values[0]);

        let mut handles = Vec::new();

        for chunk in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    store.put("Node1/volt1", values[(chunk + i) % values.len()]);
                }
            }));
        }

        for _ in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    // Every observed value must be one that some put wrote in
                    // full; a torn or interleaved value would not match
                    let sample = store.get("Node1/volt1").expect("value must stay present");
                    assert!(values.contains(&sample.raw.as_str()));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}
