//! Four-corner footprint handler.
//!
//! Consumes four latitude/longitude pairs sampled repeatedly over time and
//! derives one WKT polygon per aligned sample:
//!
//! ```text
//! POLYGON ((lon1 lat1, lon2 lat2, lon3 lat3, lon4 lat4, lon1 lat1))
//! ```
//!
//! The eight series fill independently as elements arrive, so sample `i`
//! is only derivable once every series holds at least `i + 1` values.

use std::borrow::Cow;

use klv_protocol::{KlvElement, KlvValue};
use log::debug;

use super::{FieldSeries, KlvHandler};
use crate::attribute::Attribute;
use crate::error::{HandlerError, Result};
use crate::subsample::subsample_indices;

/// Number of fields a geo box consumes.
pub const CORNER_FIELDS: usize = 8;

/// Role of a field within the geo box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    Latitude1 = 0,
    Longitude1 = 1,
    Latitude2 = 2,
    Longitude2 = 3,
    Latitude3 = 4,
    Longitude3 = 5,
    Latitude4 = 6,
    Longitude4 = 7,
}

impl Corner {
    /// All roles in configuration order.
    pub const ALL: [Corner; CORNER_FIELDS] = [
        Corner::Latitude1,
        Corner::Longitude1,
        Corner::Latitude2,
        Corner::Longitude2,
        Corner::Latitude3,
        Corner::Longitude3,
        Corner::Latitude4,
        Corner::Longitude4,
    ];

    /// Polygon vertex order as (latitude, longitude) roles, closing on the first corner.
    const RING: [(Corner, Corner); 5] = [
        (Corner::Latitude1, Corner::Longitude1),
        (Corner::Latitude2, Corner::Longitude2),
        (Corner::Latitude3, Corner::Longitude3),
        (Corner::Latitude4, Corner::Longitude4),
        (Corner::Latitude1, Corner::Longitude1),
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Derives a WKT polygon from four latitude/longitude pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBoxHandler {
    attribute_name: String,
    series: [FieldSeries; CORNER_FIELDS],
}

impl GeoBoxHandler {
    /// Create a handler from four `(latitude, longitude)` field name pairs.
    pub fn new(attribute_name: impl Into<String>, corners: [(&str, &str); 4]) -> Result<Self> {
        let fields = std::array::from_fn(|i| {
            let (lat, lon) = corners[i / 2];
            let name = if i % 2 == 0 { lat } else { lon };
            name.to_string()
        });
        Self::with_fields(attribute_name, fields)
    }

    /// Create a handler from eight field names in [`Corner::ALL`] order.
    ///
    /// A field name may be bound to only one role.
    pub fn with_fields(
        attribute_name: impl Into<String>,
        fields: [String; CORNER_FIELDS],
    ) -> Result<Self> {
        let attribute_name = attribute_name.into();

        for (i, field) in fields.iter().enumerate() {
            if fields[..i].contains(field) {
                return Err(HandlerError::DuplicateField {
                    attribute: attribute_name,
                    field: field.clone(),
                });
            }
        }

        let [lat1, lon1, lat2, lon2, lat3, lon3, lat4, lon4] = fields;
        Ok(Self {
            attribute_name,
            series: [lat1, lon1, lat2, lon2, lat3, lon3, lat4, lon4].map(FieldSeries::new),
        })
    }

    /// Same configuration, no values.
    fn empty_copy(&self) -> Self {
        Self {
            attribute_name: self.attribute_name.clone(),
            series: std::array::from_fn(|i| FieldSeries::new(self.series[i].name())),
        }
    }

    /// Field name bound to `corner`.
    pub fn field(&self, corner: Corner) -> &str {
        self.series[corner.index()].name()
    }

    /// Series accumulated for `corner`.
    pub fn series(&self, corner: Corner) -> &FieldSeries {
        &self.series[corner.index()]
    }

    /// Role bound to a field name.
    pub fn corner_of(&self, name: &str) -> Option<Corner> {
        Corner::ALL
            .into_iter()
            .find(|c| self.series[c.index()].name() == name)
    }

    /// Number of samples derivable across all eight series.
    ///
    /// A series that has received nothing counts as length zero.
    pub fn minimum_list_size(&self) -> usize {
        self.series.iter().map(FieldSeries::len).min().unwrap_or(0)
    }

    /// Append a value to the series for `name`. Unknown names are ignored.
    pub fn accept_double(&mut self, name: &str, value: f64) {
        match self.corner_of(name) {
            Some(corner) => self.series[corner.index()].push(value),
            None => debug!(
                "Field '{}' is not part of geo box '{}'",
                name, self.attribute_name
            ),
        }
    }

    /// WKT polygon for aligned sample `i`.
    fn polygon_at(&self, i: usize) -> String {
        let ring: Vec<String> = Corner::RING
            .iter()
            .map(|(lat, lon)| {
                let lat = self.series[lat.index()].values()[i];
                let lon = self.series[lon.index()].values()[i];
                format!("{:.6} {:.6}", lon, lat)
            })
            .collect();
        format!("POLYGON (({}))", ring.join(", "))
    }
}

impl KlvHandler for GeoBoxHandler {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn field_names(&self) -> Vec<&str> {
        self.series.iter().map(FieldSeries::name).collect()
    }

    fn accept(&mut self, element: &KlvElement) {
        match element.value {
            KlvValue::IntegerEncodedFloat(v) => self.accept_double(&element.name, v),
            ref other => debug!(
                "Non integer encoded floating point data passed to GeoBoxHandler: name = {} kind = {}",
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
        self.series.iter_mut().for_each(FieldSeries::clear);
    }

    fn as_attribute(&self) -> Option<Attribute> {
        let polygons = (0..self.minimum_list_size()).map(|i| self.polygon_at(i));
        Attribute::from_values(&self.attribute_name, polygons)
    }

    /// Truncate every series to [`minimum_list_size`](Self::minimum_list_size).
    fn trim(&mut self) {
        let min = self.minimum_list_size();
        for series in self.series.iter_mut() {
            series.truncate(min);
        }
    }

    fn subsampled_attribute(&self, subsample_count: usize) -> Option<Attribute> {
        self.as_subsampled_handler(subsample_count).as_attribute()
    }

    /// Reduce to `subsample_count` aligned samples.
    ///
    /// Returns the handler itself when it already holds at most that many.
    /// Otherwise the selected samples are replayed, one full corner tuple
    /// at a time, into a new handler with the same field configuration.
    fn as_subsampled_handler(&self, subsample_count: usize) -> Cow<'_, Self> {
        let size = self.minimum_list_size();
        if size == 0 || size <= subsample_count {
            return Cow::Borrowed(self);
        }

        let mut out = self.empty_copy();
        for i in subsample_indices(size, subsample_count) {
            for series in &self.series {
                out.accept_double(series.name(), series.values()[i]);
            }
        }

        Cow::Owned(out)
    }
}
