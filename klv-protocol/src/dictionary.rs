//! Tag-to-field dictionary supplied by configuration.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::codec::{decode_element, parse_local_set};
use crate::error::KlvError;
use crate::types::{FieldDefinition, KlvElement};

/// Maps local-set tags to field definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FieldDefinition>", into = "Vec<FieldDefinition>")]
pub struct FieldDictionary {
    fields: HashMap<u64, FieldDefinition>,
}

impl FieldDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one for the same tag.
    pub fn insert(&mut self, definition: FieldDefinition) -> Option<FieldDefinition> {
        self.fields.insert(definition.tag, definition)
    }

    /// Look up the definition for a tag.
    pub fn get(&self, tag: u64) -> Option<&FieldDefinition> {
        self.fields.get(&tag)
    }

    /// Look up a definition by field name.
    pub fn find_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.values().find(|d| d.name == name)
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no tag is registered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode every known item of a local set.
    ///
    /// Items with unknown tags are skipped. Items that fail to decode are
    /// returned as errors in place so the caller can log and drop them;
    /// only a malformed local set fails as a whole.
    pub fn decode_local_set(
        &self,
        payload: &[u8],
    ) -> Result<Vec<Result<KlvElement, KlvError>>, KlvError> {
        let items = parse_local_set(payload)?;

        Ok(items
            .into_iter()
            .filter_map(|item| match self.get(item.tag) {
                Some(definition) => Some(decode_element(definition, item.value)),
                None => {
                    debug!("Skipping unknown tag {} ({} bytes)", item.tag, item.value.len());
                    None
                }
            })
            .collect())
    }
}

impl From<Vec<FieldDefinition>> for FieldDictionary {
    fn from(definitions: Vec<FieldDefinition>) -> Self {
        let mut dictionary = FieldDictionary::new();
        for definition in definitions {
            dictionary.insert(definition);
        }
        dictionary
    }
}

impl From<FieldDictionary> for Vec<FieldDefinition> {
    fn from(dictionary: FieldDictionary) -> Self {
        let mut definitions: Vec<_> = dictionary.fields.into_values().collect();
        definitions.sort_by_key(|d| d.tag);
        definitions
    }
}
