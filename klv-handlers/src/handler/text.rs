//! Handler for a single text field.

use klv_protocol::{KlvElement, KlvValue};
use log::debug;

use super::KlvHandler;
use crate::attribute::Attribute;

/// Accumulates text values and emits each distinct value once, in the
/// order it was first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct TextHandler {
    attribute_name: String,
    field_name: String,
    values: Vec<String>,
}

impl TextHandler {
    pub fn new(attribute_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            field_name: field_name.into(),
            values: Vec::new(),
        }
    }

    /// Every accumulated value, duplicates included.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn push(&mut self, name: &str, value: String) {
        if name != self.field_name {
            debug!(
                "Ignoring value for '{}' in handler for '{}'",
                name, self.field_name
            );
            return;
        }
        self.values.push(value);
    }
}

impl KlvHandler for TextHandler {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn field_names(&self) -> Vec<&str> {
        vec![self.field_name.as_str()]
    }

    fn accept(&mut self, element: &KlvElement) {
        match &element.value {
            KlvValue::Text(s) => self.push(&element.name, s.clone()),
            other => debug!(
                "Non text data passed to TextHandler: name = {} kind = {}",
                element.name,
                other.kind()
            ),
        }
    }

    fn accept_value(&mut self, name: &str, value: KlvValue) {
        match value {
            KlvValue::Text(s) => self.push(name, s),
            other => debug!("Dropping {} value for '{}'", other.kind(), name),
        }
    }

    fn reset(&mut self) {
        self.values.clear();
    }

    fn as_attribute(&self) -> Option<Attribute> {
        let mut distinct: Vec<&str> = Vec::new();
        for value in &self.values {
            if !distinct.contains(&value.as_str()) {
                distinct.push(value);
            }
        }
        Attribute::from_values(&self.attribute_name, distinct)
    }
}
