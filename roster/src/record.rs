use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Accepts identifiers stored either as JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(v: StringOrNumber) -> Self {
        match v {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "StringOrNumber", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<StringOrNumber> for $name {
            fn from(v: StringOrNumber) -> Self {
                Self(v.into())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Opaque student identifier.
    StudentId
);

string_id!(
    /// Opaque student group identifier.
    GroupId
);

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(d)?.map(String::from))
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Display fields of a known identity, as sent in `match` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub roll_number: Option<String>,
}

/// One student row as returned by a roster source.
///
/// `face_embedding` is kept raw: sources store it either as a JSON-encoded
/// string or as an inline array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub face_embedding: Option<Value>,
}

impl StudentRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StudentId::new(id),
            name: name.into(),
            roll_number: None,
            face_embedding: None,
        }
    }

    pub fn with_roll_number(mut self, roll_number: impl Into<String>) -> Self {
        self.roll_number = Some(roll_number.into());
        self
    }

    /// Sets an inline array embedding.
    pub fn with_embedding(mut self, embedding: &[f32]) -> Self {
        self.face_embedding = Some(Value::from(
            embedding.iter().map(|&x| x as f64).collect::<Vec<f64>>(),
        ));
        self
    }

    /// Sets a raw embedding value (JSON text, array, or anything else).
    pub fn with_raw_embedding(mut self, raw: Value) -> Self {
        self.face_embedding = Some(raw);
        self
    }

    /// Returns the display fields.
    pub fn student(&self) -> Student {
        Student {
            id: self.id.clone(),
            name: self.name.clone(),
            roll_number: self.roll_number.clone(),
        }
    }
}

/// Why a record's embedding was not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no face embedding")]
    Absent,

    #[error("malformed face embedding: {0}")]
    Malformed(String),

    #[error("embedding dimension {got} does not match roster dimension {want}")]
    DimensionMismatch { got: usize, want: usize },
}

/// Parses a stored face embedding.
///
/// Missing values, JSON `null` and empty arrays are [`SkipReason::Absent`].
/// Anything that is not a non-empty array of numbers representable as finite
/// `f32` values (after decoding one level of JSON text) is
/// [`SkipReason::Malformed`].
pub fn parse_embedding(raw: Option<&Value>) -> Result<Vec<f32>, SkipReason> {
    match raw {
        None | Some(Value::Null) => Err(SkipReason::Absent),
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Err(SkipReason::Absent);
            }
            let decoded: Value = serde_json::from_str(text)
                .map_err(|e| SkipReason::Malformed(format!("invalid JSON: {e}")))?;
            match decoded {
                Value::String(_) => Err(SkipReason::Malformed("nested JSON string".into())),
                other => parse_embedding(Some(&other)),
            }
        }
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err(SkipReason::Absent);
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| match item.as_f64() {
                    Some(x) if (x as f32).is_finite() => Ok(x as f32),
                    Some(x) => Err(SkipReason::Malformed(format!(
                        "element {i} out of f32 range: {x}"
                    ))),
                    None => Err(SkipReason::Malformed(format!("element {i} is not a number"))),
                })
                .collect()
        }
        Some(other) => Err(SkipReason::Malformed(format!(
            "expected array, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_json_text() {
        let raw = json!("[0.5, -1, 2.25]");
        assert_eq!(parse_embedding(Some(&raw)), Ok(vec![0.5, -1.0, 2.25]));
    }

    #[test]
    fn parse_inline_array() {
        let raw = json!([1.0, 0.0]);
        assert_eq!(parse_embedding(Some(&raw)), Ok(vec![1.0, 0.0]));
    }

    #[test]
    fn parse_absent() {
        assert_eq!(parse_embedding(None), Err(SkipReason::Absent));
        assert_eq!(parse_embedding(Some(&Value::Null)), Err(SkipReason::Absent));
        assert_eq!(parse_embedding(Some(&json!("null"))), Err(SkipReason::Absent));
        assert_eq!(parse_embedding(Some(&json!("[]"))), Err(SkipReason::Absent));
        assert_eq!(parse_embedding(Some(&json!(""))), Err(SkipReason::Absent));
    }

    #[test]
    fn parse_malformed() {
        for raw in [
            json!("[1, 2"),
            json!("{\"a\": 1}"),
            json!("\"[1, 2]\""),
            json!([1, "x"]),
            json!(42),
            json!({"embedding": [1]}),
        ] {
            assert!(
                matches!(parse_embedding(Some(&raw)), Err(SkipReason::Malformed(_))),
                "{raw} should be malformed"
            );
        }
    }

    #[test]
    fn parse_rejects_values_beyond_f32() {
        for raw in [json!("[1e39, 0.0]"), json!([0.0, -1e39])] {
            assert!(
                matches!(parse_embedding(Some(&raw)), Err(SkipReason::Malformed(_))),
                "{raw} should be malformed"
            );
        }
        assert_eq!(
            parse_embedding(Some(&json!([3.0e38, 0.0]))),
            Ok(vec![3.0e38_f32, 0.0])
        );
    }

    #[test]
    fn ids_accept_numbers() {
        let rec: StudentRecord = serde_json::from_value(json!({
            "id": 17,
            "name": "Asha",
            "roll_number": 2021001,
            "face_embedding": null
        }))
        .unwrap();
        assert_eq!(rec.id.as_str(), "17");
        assert_eq!(rec.roll_number.as_deref(), Some("2021001"));
        assert!(rec.face_embedding.is_none());
    }

    #[test]
    fn student_serializes_id_as_string() {
        let rec = StudentRecord::new("u-1", "Asha").with_roll_number("R7");
        let v = serde_json::to_value(rec.student()).unwrap();
        assert_eq!(v, json!({"id": "u-1", "name": "Asha", "roll_number": "R7"}));
    }

    #[test]
    fn null_name_is_empty() {
        let rec: StudentRecord =
            serde_json::from_value(json!({"id": "a", "name": null})).unwrap();
        assert_eq!(rec.name, "");
        assert_eq!(rec.roll_number, None);
    }
}
