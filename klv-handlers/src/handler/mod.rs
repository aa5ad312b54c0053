//! Field handlers.
//!
//! A handler owns the series of values accumulated for one field (or a
//! group of correlated fields) and turns them into a catalog [`Attribute`]
//! on demand.
//!
//! # Handlers
//! - [`FloatingPointHandler`] - one numeric field, raw values
//! - [`TextHandler`] - one text field, distinct values
//! - [`GeoBoxHandler`] - four latitude/longitude pairs, one WKT polygon per sample

mod floating_point;
mod geo_box;
mod text;

use std::borrow::Cow;

use klv_protocol::{KlvElement, KlvValue};
use serde::Deserialize;

use crate::attribute::Attribute;
use crate::error::{HandlerError, Result};

pub use floating_point::FloatingPointHandler;
pub use geo_box::{Corner, GeoBoxHandler, CORNER_FIELDS};
pub use text::TextHandler;

/// Accumulates decoded elements and derives an attribute from them.
///
/// Handlers are single-writer: callers serialize `accept` calls per
/// instance. None of the methods fail; elements a handler cannot use are
/// dropped with a debug diagnostic.
pub trait KlvHandler: Send {
    /// Name of the attribute this handler produces.
    fn attribute_name(&self) -> &str;

    /// Field names this handler consumes, used for routing.
    fn field_names(&self) -> Vec<&str>;

    /// Accept a decoded element.
    fn accept(&mut self, element: &KlvElement);

    /// Accept a value for `name` directly, bypassing encoding checks.
    fn accept_value(&mut self, name: &str, value: KlvValue);

    /// Clear all accumulated values. The handler stays usable.
    fn reset(&mut self);

    /// Derive the attribute from the values accumulated so far.
    ///
    /// Returns `None` when nothing derivable has been accumulated.
    fn as_attribute(&self) -> Option<Attribute>;

    /// Truncate correlated series to a common length.
    fn trim(&mut self) {}

    /// Attribute derived from at most `subsample_count` samples.
    fn subsampled_attribute(&self, _subsample_count: usize) -> Option<Attribute> {
        self.as_attribute()
    }

    /// Handler reduced to at most `subsample_count` samples.
    ///
    /// Returns `Cow::Borrowed(self)` when no reduction is needed.
    fn as_subsampled_handler(&self, _subsample_count: usize) -> Cow<'_, Self>
    where
        Self: Sized + Clone,
    {
        Cow::Borrowed(self)
    }
}

/// Append-only series of values for one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSeries {
    name: String,
    values: Vec<f64>,
}

impl FieldSeries {
    /// Create an empty series.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values in arrival order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at sample index `i`.
    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied()
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Keep only the first `len` values.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Handler definition as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerConfig {
    /// See [`FloatingPointHandler`].
    FloatingPoint { attribute: String, field: String },
    /// See [`TextHandler`].
    Text { attribute: String, field: String },
    /// See [`GeoBoxHandler`]. Fields are `lat1, lon1, ..., lat4, lon4`.
    GeoBox { attribute: String, fields: Vec<String> },
}

impl HandlerConfig {
    /// Build the configured handler.
    pub fn build(&self) -> Result<Box<dyn KlvHandler>> {
        match self {
            HandlerConfig::FloatingPoint { attribute, field } => {
                Ok(Box::new(FloatingPointHandler::new(attribute, field)))
            }
            HandlerConfig::Text { attribute, field } => {
                Ok(Box::new(TextHandler::new(attribute, field)))
            }
            HandlerConfig::GeoBox { attribute, fields } => {
                let fields: [String; CORNER_FIELDS] =
                    fields
                        .clone()
                        .try_into()
                        .map_err(|f: Vec<String>| HandlerError::FieldCount {
                            attribute: attribute.clone(),
                            expected: CORNER_FIELDS,
                            actual: f.len(),
                        })?;
                Ok(Box::new(GeoBoxHandler::with_fields(attribute, fields)?))
            }
        }
    }
}
