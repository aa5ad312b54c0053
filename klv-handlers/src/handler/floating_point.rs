//! Handler for a single numeric field.

use klv_protocol::{KlvElement, KlvValue};
use log::debug;

use super::{FieldSeries, KlvHandler};
use crate::attribute::Attribute;

/// Accumulates the real values of one field and emits them unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingPointHandler {
    attribute_name: String,
    series: FieldSeries,
}

impl FloatingPointHandler {
    /// Create a handler producing `attribute_name` from `field_name`.
    pub fn new(attribute_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            series: FieldSeries::new(field_name),
        }
    }

    /// Field name this handler accumulates.
    pub fn field_name(&self) -> &str {
        self.series.name()
    }

    /// Accumulated values.
    pub fn series(&self) -> &FieldSeries {
        &self.series
    }

    /// Append `value` if `name` is the configured field.
    pub fn accept_double(&mut self, name: &str, value: f64) {
        if name != self.series.name() {
            debug!(
                "Ignoring value for '{}' in handler for '{}'",
                name,
                self.series.name()
            );
            return;
        }
        self.series.push(value);
    }
}

impl KlvHandler for FloatingPointHandler {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn field_names(&self) -> Vec<&str> {
        vec![self.series.name()]
    }

    fn accept(&mut self, element: &KlvElement) {
        match element.value {
            KlvValue::IntegerEncodedFloat(v) | KlvValue::Float(v) => {
                self.accept_double(&element.name, v)
            }
            ref other => debug!(
                "Non floating point data passed to FloatingPointHandler: name = {} kind = {}",
                element.name,
                other.kind()
            ),
        }
    }

    fn accept_value(&mut self, name: &str, value: KlvValue) {
        match value.as_f64() {
            Some(v) => self.accept_double(name, v),
            None => debug!("Dropping {} value for '{}'", value.kind(), name),
        }
    }

    fn reset(&mut self) {
        self.series.clear();
    }

    fn as_attribute(&self) -> Option<Attribute> {
        Attribute::from_values(&self.attribute_name, self.series.values().iter().copied())
    }
}
