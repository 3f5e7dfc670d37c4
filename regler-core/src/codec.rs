//! Conversion between the stored `(value, is_array_value)` column pair and
//! the in-memory [`SettingValue`].
//!
//! Decoding is infallible by design: malformed historical JSON degrades to
//! the raw scalar instead of surfacing an error to whoever asked for the
//! setting.

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

/// A setting's in-memory value.
///
/// The storage layer keeps a separate boolean flag instead of a type tag;
/// this enum is the honest version of that pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// A plain scalar stored verbatim.
    Scalar(String),

    /// A JSON document (list, map or JSON scalar).
    Structured(serde_json::Value),
}

impl SettingValue {
    /// Converts the value into a plain `serde_json::Value` for transport.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            SettingValue::Scalar(raw) => serde_json::Value::String(raw),
            SettingValue::Structured(value) => value,
        }
    }
}

/// Decodes a stored payload.
///
/// With `is_array` set the payload is parsed as JSON; a payload which fails
/// to parse is returned unchanged as [`SettingValue::Scalar`]. This never
/// returns an error, the settings UI stays usable on corrupt history.
pub fn decode(raw: Option<&str>, is_array: bool) -> Option<SettingValue> {
    let raw = raw?;

    if is_array {
        match serde_json::from_str(raw) {
            Ok(value) => Some(SettingValue::Structured(value)),
            Err(error) => {
                warn!(
                    error.display = %error,
                    "Stored value is flagged as json but failed to parse, falling back to the raw value"
                );
                Some(SettingValue::Scalar(raw.to_string()))
            }
        }
    } else {
        Some(SettingValue::Scalar(raw.to_string()))
    }
}

/// Encodes a value into its storage form.
///
/// Returns the raw payload and the `is_array_value` flag to store with it.
pub fn encode(value: &SettingValue) -> (String, bool) {
    match value {
        SettingValue::Scalar(raw) => (raw.clone(), false),
        SettingValue::Structured(value) => (
            serde_json::to_string(value).unwrap_or_else(|_| value.to_string()),
            true,
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn roundtrip(value: SettingValue) {
        let (raw, is_array) = encode(&value);
        assert_eq!(decode(Some(&raw), is_array), Some(value));
    }

    #[test]
    fn scalars_roundtrip() {
        roundtrip(SettingValue::Scalar("My Site".to_string()));
        roundtrip(SettingValue::Scalar("".to_string()));
        roundtrip(SettingValue::Scalar("{not json".to_string()));
    }

    #[test]
    fn structured_values_roundtrip() {
        roundtrip(SettingValue::Structured(json!([
            {"label": "Home", "url": "/"},
            {"label": "About", "url": "/about"},
        ])));
        roundtrip(SettingValue::Structured(json!({"a": 1, "b": [true, null]})));
        roundtrip(SettingValue::Structured(json!(42)));
        roundtrip(SettingValue::Structured(json!("quoted")));
    }

    #[test]
    fn missing_payload_decodes_to_none() {
        assert_eq!(decode(None, false), None);
        assert_eq!(decode(None, true), None);
    }

    #[test]
    fn malformed_json_falls_back_to_the_raw_value() {
        assert_eq!(
            decode(Some("{oops"), true),
            Some(SettingValue::Scalar("{oops".to_string()))
        );
    }

    #[test]
    fn scalar_and_structured_forms_are_distinguished() {
        // "[1]" stored as a scalar must not be confused with the list [1]
        let (raw, is_array) = encode(&SettingValue::Scalar("[1]".to_string()));
        assert!(!is_array);
        assert_eq!(
            decode(Some(&raw), is_array),
            Some(SettingValue::Scalar("[1]".to_string()))
        );
    }
}
