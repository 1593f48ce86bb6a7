//! Block record consumed by the merger.
//!
//! The merger only looks at `number` and `id`; everything else travels
//! through untouched into the merged file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One immutable, numbered input record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block height. Non-decreasing across the input stream.
    pub number: u64,

    /// Unique block identifier (hash).
    pub id: String,

    #[serde(default, rename = "parentId")]
    pub parent_id: String,

    #[serde(default, rename = "parentNum")]
    pub parent_number: u64,

    pub timestamp: DateTime<Utc>,

    /// Opaque chain payload, base64 in the JSON form.
    #[serde(default, with = "payload_b64")]
    pub payload: Vec<u8>,
}

impl Block {
    pub fn new(number: u64, id: impl Into<String>) -> Self {
        Self {
            number,
            id: id.into(),
            parent_id: String::new(),
            parent_number: number.saturating_sub(1),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            payload: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_number: u64, parent_id: impl Into<String>) -> Self {
        self.parent_number = parent_number;
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.number, self.id)
    }
}

mod payload_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_is_compact() {
        let block = Block::new(1234, "00001234a");
        assert_eq!(block.to_string(), "#1234 (00001234a)");
    }

    #[test]
    fn test_payload_is_base64_in_json() {
        let block = Block::new(7, "b7")
            .with_parent(6, "b6")
            .with_timestamp(Utc.timestamp_opt(1700000000, 0).unwrap())
            .with_payload(b"hello".to_vec());

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["payload"], "aGVsbG8=");
        assert_eq!(json["parentId"], "b6");
        assert_eq!(json["parentNum"], 6);

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_optional_fields_default() {
        let block: Block =
            serde_json::from_str(r#"{"number":3,"id":"c","timestamp":"2023-11-14T22:13:20Z"}"#)
                .unwrap();
        assert_eq!(block.number, 3);
        assert!(block.payload.is_empty());
        assert!(block.parent_id.is_empty());
    }

    #[test]
    fn test_rejects_invalid_payload() {
        let result = serde_json::from_str::<Block>(
            r#"{"number":3,"id":"c","timestamp":"2023-11-14T22:13:20Z","payload":"@@@"}"#,
        );
        assert!(result.is_err());
    }
}
