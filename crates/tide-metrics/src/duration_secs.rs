//! Serde helpers that encode [`Duration`] as whole seconds.
//!
//! Use with `#[serde(with = "tide_metrics::duration_secs")]`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serializes a duration as an integer number of seconds.
pub fn serialize<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

/// Deserializes an integer number of seconds into a duration.
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        every: Duration,
    }

    #[test]
    fn encodes_whole_seconds() {
        let json = serde_json::to_string(&Wrapper {
            every: Duration::from_secs(300),
        })
        .unwrap();
        assert_eq!(json, r#"{"every":300}"#);
    }

    #[test]
    fn decodes_whole_seconds() {
        let parsed: Wrapper = serde_json::from_str(r#"{"every":30}"#).unwrap();
        assert_eq!(parsed.every, Duration::from_secs(30));
    }
}
