//! Session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kernel events buffered per session before the oldest is evicted.
pub const DEFAULT_EVENT_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Time between two snapshots.
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    /// Kernel events held before the oldest is dropped.
    pub event_capacity: usize,
}

impl SessionConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Serialize a [`Duration`] as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"interval_ms": 250}"#).unwrap();
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);

        let json = serde_json::to_string(&SessionConfig::default()).unwrap();
        assert!(json.contains(r#""interval_ms":1000"#));
    }
}
