//! Storage-safe attribute values.
//!
//! Every document tree headed for the store goes through [`normalize`], which converts JSON
//! numbers into exact decimals. The conversion reads the number's source text, never an `f64`,
//! so `0.1` stays `0.1`.

use rust_decimal::Decimal;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A value as persisted: like JSON, except that every number is a [`Decimal`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(Decimal),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("number {0} cannot be represented as an exact decimal")]
    UnrepresentableNumber(String),
}

/// Convert a JSON tree into storage values, recursing through mappings and sequences.
pub fn normalize(value: &JsonValue) -> Result<AttributeValue, NormalizeError> {
    Ok(match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Number(n) => AttributeValue::Number(decimal_from_number(n)?),
        JsonValue::String(s) => AttributeValue::String(s.clone()),
        JsonValue::Array(items) => {
            AttributeValue::List(items.iter().map(normalize).collect::<Result<_, _>>()?)
        }
        JsonValue::Object(fields) => AttributeValue::Map(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), normalize(v)?)))
                .collect::<Result<_, NormalizeError>>()?,
        ),
    })
}

fn decimal_from_number(number: &Number) -> Result<Decimal, NormalizeError> {
    let text = number.to_string();
    Decimal::from_str_exact(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| NormalizeError::UnrepresentableNumber(text))
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            AttributeValue::Number(d) => Some(*d),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        match self {
            AttributeValue::Map(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Render back to JSON. Decimals become JSON numbers with their exact text.
    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::Null => JsonValue::Null,
            AttributeValue::Bool(b) => JsonValue::Bool(*b),
            AttributeValue::Number(d) => Number::from_str(&d.to_string())
                .map(JsonValue::Number)
                .unwrap_or_else(|_| JsonValue::String(d.to_string())),
            AttributeValue::String(s) => JsonValue::String(s.clone()),
            AttributeValue::List(items) => {
                JsonValue::Array(items.iter().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Map(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttributeValue::Null => serializer.serialize_unit(),
            AttributeValue::Bool(b) => serializer.serialize_bool(*b),
            AttributeValue::Number(d) => Number::from_str(&d.to_string())
                .map_err(<S::Error as ser::Error>::custom)?
                .serialize(serializer),
            AttributeValue::String(s) => serializer.serialize_str(s),
            AttributeValue::List(items) => serializer.collect_seq(items),
            AttributeValue::Map(fields) => serializer.collect_map(fields),
        }
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        normalize(&value).map_err(de::Error::custom)
    }
}
