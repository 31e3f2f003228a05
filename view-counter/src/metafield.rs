//! Encoding of the view count inside a metafield.
//!
//! Metafield values travel as strings. An integer field holds `"5"`, an
//! integer list field holds `"[5]"`. Upstream enforces one type per field
//! definition, so writes must use the same representation the field was
//! created with; reads accept either.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
pub enum FieldType {
    #[serde(rename = "number_integer")]
    Integer,
    #[serde(rename = "list.number_integer")]
    #[default]
    IntegerList,
}

impl FieldType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "number_integer",
            FieldType::IntegerList => "list.number_integer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetafieldValue {
    Scalar(u64),
    SingletonList(u64),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("not a non-negative integer or integer list: {0}")]
    NotAnInteger(String),
    #[error("expected at most one element, found {0}")]
    TooManyElements(usize),
}

impl MetafieldValue {
    pub fn new(field_type: FieldType, count: u64) -> Self {
        match field_type {
            FieldType::Integer => MetafieldValue::Scalar(count),
            FieldType::IntegerList => MetafieldValue::SingletonList(count),
        }
    }

    /// Decodes the raw metafield string. An empty list counts as zero.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let not_an_integer = || DecodeError::NotAnInteger(raw.to_string());

        match serde_json::from_str::<serde_json::Value>(raw.trim()) {
            Ok(serde_json::Value::Number(n)) => {
                n.as_u64().map(MetafieldValue::Scalar).ok_or_else(not_an_integer)
            }
            Ok(serde_json::Value::Array(items)) => match items.as_slice() {
                [] => Ok(MetafieldValue::SingletonList(0)),
                [item] => item
                    .as_u64()
                    .map(MetafieldValue::SingletonList)
                    .ok_or_else(not_an_integer),
                _ => Err(DecodeError::TooManyElements(items.len())),
            },
            _ => Err(not_an_integer()),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            MetafieldValue::Scalar(n) => n.to_string(),
            MetafieldValue::SingletonList(n) => format!("[{n}]"),
        }
    }

    pub fn count(&self) -> u64 {
        match *self {
            MetafieldValue::Scalar(n) | MetafieldValue::SingletonList(n) => n,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            MetafieldValue::Scalar(_) => FieldType::Integer,
            MetafieldValue::SingletonList(_) => FieldType::IntegerList,
        }
    }
}
