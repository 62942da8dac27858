//! Shape classification for free-form upstream payloads.
//!
//! Upstream records drift between service versions, so every lookup goes
//! through these helpers instead of ad hoc probing at call sites. Each shape
//! union carries an explicit catch-all arm; nothing here fails.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// How a referenced entity (creator, manager) appears in a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum EntityShape<'a> {
    /// A bare identifier.
    BareId(&'a Value),
    /// An embedded object such as `{ "_id": .., "name": .. }`.
    Embedded(&'a Map<String, Value>),
    /// Missing or `null`.
    Absent,
    /// Present but of no recognised shape (arrays, booleans, blank strings).
    Unrecognised,
}

impl<'a> EntityShape<'a> {
    pub(crate) fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Object(map)) => Self::Embedded(map),
            Some(value @ (Value::String(_) | Value::Number(_))) if text(value).is_some() => {
                Self::BareId(value)
            }
            Some(_) => Self::Unrecognised,
        }
    }

    pub(crate) fn is_usable(&self) -> bool {
        matches!(self, Self::BareId(_) | Self::Embedded(_))
    }
}

/// How a numeric quantity appears in a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumberShape<'a> {
    /// A JSON number.
    Number(f64),
    /// A string that may hold a number, e.g. `"42.5"`.
    Text(&'a str),
    /// Missing or `null`.
    Absent,
    /// Anything else.
    Unrecognised,
}

impl<'a> NumberShape<'a> {
    pub(crate) fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Number(number)) => number
                .as_f64()
                .map_or(Self::Unrecognised, Self::Number),
            Some(Value::String(raw)) => Self::Text(raw.as_str()),
            Some(_) => Self::Unrecognised,
        }
    }

    /// Finite numeric value, if the shape carries one.
    pub(crate) fn finite(self) -> Option<f64> {
        let candidate = match self {
            Self::Number(value) => Some(value),
            Self::Text(raw) => raw.trim().parse::<f64>().ok(),
            Self::Absent | Self::Unrecognised => None,
        };
        candidate.filter(|value| value.is_finite())
    }
}

/// First non-null value stored under any of `keys`, in order.
pub(crate) fn first<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Trimmed, non-empty text for identifiers. Numbers are rendered as text.
pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// First identifier-like text stored under any of `keys`.
pub(crate) fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(text)
}

/// First string stored under any of `keys`, kept verbatim.
pub(crate) fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| value.as_str().map(str::to_owned))
}

/// First finite number stored under any of `keys`.
pub(crate) fn first_number(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| NumberShape::classify(object.get(*key)).finite())
}

/// First parseable timestamp stored under any of `keys`.
///
/// Accepts RFC 3339 strings, naive ISO-8601 strings (taken as UTC), and
/// integer epoch milliseconds.
pub(crate) fn first_timestamp(object: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(timestamp)
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            DateTime::parse_from_rfc3339(raw)
                .map(|parsed| parsed.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::string(json!("u1"), true)]
    #[case::number(json!(17), true)]
    #[case::object(json!({ "_id": "u1" }), true)]
    #[case::blank(json!("   "), false)]
    #[case::array(json!(["u1"]), false)]
    #[case::boolean(json!(true), false)]
    #[case::null(Value::Null, false)]
    fn entity_shapes_are_classified(#[case] value: Value, #[case] usable: bool) {
        assert_eq!(EntityShape::classify(Some(&value)).is_usable(), usable);
    }

    #[rstest]
    #[case::number(json!(42.5), Some(42.5))]
    #[case::numeric_text(json!(" 42.5 "), Some(42.5))]
    #[case::garbage_text(json!("forty"), None)]
    #[case::infinite_text(json!("inf"), None)]
    #[case::object(json!({ "value": 1 }), None)]
    fn numbers_coerce_to_finite_values(#[case] value: Value, #[case] expected: Option<f64>) {
        assert_eq!(NumberShape::classify(Some(&value)).finite(), expected);
    }

    #[test]
    fn first_skips_nulls_in_favour_of_later_aliases() {
        let object = json!({ "createdBy": null, "user": "u1" });
        let map = object.as_object().expect("object");
        assert_eq!(first(map, &["createdBy", "user"]), Some(&json!("u1")));
    }

    #[rstest]
    #[case::rfc3339(json!("2024-03-01T10:00:00Z"))]
    #[case::offset(json!("2024-03-01T11:00:00+01:00"))]
    #[case::naive(json!("2024-03-01T10:00:00.000"))]
    #[case::millis(json!(1_709_287_200_000_i64))]
    fn timestamps_parse_from_common_layouts(#[case] value: Value) {
        let object = json!({ "createdAt": value });
        let map = object.as_object().expect("object");
        let parsed = first_timestamp(map, &["createdAt"]).expect("timestamp");
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }
}
