//! Conversion between serde types and payloads.
//!
//! Stages that prefer typed structs over raw JSON can decode their input and
//! encode their output with these helpers. Conversion errors come back as
//! `internal_error` records attributed to the calling stage.

use crate::core::{FailureRecord, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value as a payload.
pub fn encode<T: Serialize>(stage: &str, value: &T) -> Result<Payload, FailureRecord> {
    serde_json::to_value(value).map_err(|e| {
        FailureRecord::internal(stage, format!("could not encode output: {e}"))
            .with_context("type", serde_json::json!(std::any::type_name::<T>()))
    })
}

/// Decodes a payload into a value.
pub fn decode<T: DeserializeOwned>(stage: &str, payload: &Payload) -> Result<T, FailureRecord> {
    T::deserialize(payload).map_err(|e| {
        FailureRecord::internal(stage, format!("could not decode input: {e}"))
            .with_context("type", serde_json::json!(std::any::type_name::<T>()))
            .with_fix("Check that the stage input contract matches the struct it decodes into")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Transcript {
        text: String,
        language: Option<String>,
    }

    #[test]
    fn test_encode_decode() {
        let transcript = Transcript {
            text: "hello".to_string(),
            language: Some("en".to_string()),
        };
        let payload = encode("transcribe", &transcript).unwrap();
        assert_eq!(payload, json!({"text": "hello", "language": "en"}));

        let back: Transcript = decode("summarize", &payload).unwrap();
        assert_eq!(back, transcript);
    }

    #[test]
    fn test_decode_failure_is_internal_error() {
        let err = decode::<Transcript>("summarize", &json!({"language": "en"})).unwrap_err();
        assert_eq!(err.kind, FailureKind::InternalError);
        assert_eq!(err.stage, "summarize");
        assert!(err.cause.contains("text"));
        assert_eq!(err.suggested_fixes.len(), 2);
    }
}
