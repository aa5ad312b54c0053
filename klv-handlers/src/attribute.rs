//! Catalog attribute values produced by handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Double(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl AttributeValue {
    /// Returns the value as a date, if it is one.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttributeValue::Date(value)
    }
}

/// A named, ordered set of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Values in production order.
    pub values: Vec<AttributeValue>,
}

impl Attribute {
    /// Create an attribute.
    pub fn new(name: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Wrap `values` in an attribute, or `None` if there are no values.
    pub fn from_values<I, V>(name: &str, values: I) -> Option<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        let values: Vec<AttributeValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return None;
        }
        Some(Self::new(name, values))
    }

    /// First value, if any.
    pub fn first(&self) -> Option<&AttributeValue> {
        self.values.first()
    }
}
