//! Serde helpers for the loosely-typed fields generated payloads carry.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Unsigned(u64),
    Float(f64),
}

/// Accept `"15"` or `15` and keep the decimal text.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<StringOrNumber>::deserialize(deserializer)?;
    Ok(match value {
        None => String::new(),
        Some(StringOrNumber::Text(text)) => text,
        Some(StringOrNumber::Unsigned(n)) => n.to_string(),
        Some(StringOrNumber::Float(n)) => n.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrText {
    Flag(bool),
    Text(String),
}

/// Accept `true` or the stringly `"true"`/`"false"` older payloads stored.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<BoolOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrText::Flag(flag)) => Ok(Some(flag)),
        Some(BoolOrText::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            "" => Ok(None),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {other:?}"
            ))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KnownOrOther<T> {
    Known(T),
    Other(IgnoredAny),
}

/// Read an optional value, treating anything that does not parse as absent.
pub(crate) fn unknown_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<KnownOrOther<T>>::deserialize(deserializer)? {
        Some(KnownOrOther::Known(value)) => Some(value),
        Some(KnownOrOther::Other(_)) | None => None,
    })
}

pub(crate) fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Timing {
        #[serde(default, deserialize_with = "string_or_number")]
        duration: String,
        #[serde(default, deserialize_with = "null_as_default")]
        notes: Vec<String>,
    }

    #[test]
    fn numbers_become_decimal_text() {
        let parsed: Timing = serde_json::from_str(r#"{"duration":15,"notes":null}"#).unwrap();
        assert_eq!(parsed.duration, "15");
        assert!(parsed.notes.is_empty());
    }

    #[derive(Deserialize)]
    struct Flag {
        #[serde(default, deserialize_with = "lenient_bool")]
        completed: Option<bool>,
    }

    #[test]
    fn stringly_booleans_are_accepted() {
        let flag: Flag = serde_json::from_str(r#"{"completed":"True"}"#).unwrap();
        assert_eq!(flag.completed, Some(true));
        let flag: Flag = serde_json::from_str(r#"{"completed":false}"#).unwrap();
        assert_eq!(flag.completed, Some(false));
        let flag: Flag = serde_json::from_str("{}").unwrap();
        assert_eq!(flag.completed, None);
        assert!(serde_json::from_str::<Flag>(r#"{"completed":"maybe"}"#).is_err());
    }

    #[derive(Deserialize)]
    struct Counted {
        #[serde(default, deserialize_with = "unknown_as_none")]
        count: Option<u32>,
    }

    #[test]
    fn unparsable_optionals_become_none() {
        let counted: Counted = serde_json::from_str(r#"{"count":4}"#).unwrap();
        assert_eq!(counted.count, Some(4));
        let counted: Counted = serde_json::from_str(r#"{"count":"four"}"#).unwrap();
        assert_eq!(counted.count, None);
        let counted: Counted = serde_json::from_str(r#"{"count":null}"#).unwrap();
        assert_eq!(counted.count, None);
    }

    #[test]
    fn strings_pass_through() {
        let parsed: Timing = serde_json::from_str(r#"{"duration":"20-25"}"#).unwrap();
        assert_eq!(parsed.duration, "20-25");
    }
}
