//! Catalog record model and update strategies.

mod updater;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::attribute::{Attribute, AttributeValue};

pub use updater::{
    AttributeMergeUpdater, ListUpdater, MetacardMerger, MetacardUpdater, MetacardUpdaterVisitor,
    TemporalEndUpdater, TemporalStartUpdater,
};

/// Attribute holding the start of the covered time range.
pub const TEMPORAL_START: &str = "temporal.start";

/// Attribute holding the end of the covered time range.
pub const TEMPORAL_END: &str = "temporal.end";

/// A mutable catalog record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metacard {
    id: String,
    attributes: BTreeMap<String, Vec<AttributeValue>>,
}

impl Metacard {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the values of an attribute.
    pub fn set_attribute(&mut self, attribute: Attribute) {
        self.attributes.insert(attribute.name, attribute.values);
    }

    /// Values of an attribute, if set.
    pub fn attribute(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Vec<AttributeValue>> {
        self.attributes.remove(name)
    }

    /// Names of all set attributes, sorted.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Add values to an attribute, skipping values it already holds.
    pub fn merge_values<'a, I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = &'a AttributeValue>,
    {
        let existing = self.attributes.entry(name.to_string()).or_default();
        for value in values {
            if !existing.contains(value) {
                existing.push(value.clone());
            }
        }
    }

    pub fn temporal_start(&self) -> Option<DateTime<Utc>> {
        self.first_date(TEMPORAL_START)
    }

    pub fn temporal_end(&self) -> Option<DateTime<Utc>> {
        self.first_date(TEMPORAL_END)
    }

    pub fn set_temporal_start(&mut self, time: DateTime<Utc>) {
        self.set_attribute(Attribute::new(TEMPORAL_START, vec![time.into()]));
    }

    pub fn set_temporal_end(&mut self, time: DateTime<Utc>) {
        self.set_attribute(Attribute::new(TEMPORAL_END, vec![time.into()]));
    }

    fn first_date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.attribute(name)?.first()?.as_date()
    }
}
