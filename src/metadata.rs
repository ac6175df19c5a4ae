//! Standardised properties for desktop search indexing.
//!
//! Distinct from display fields: a small fixed key set, one value per key.

use chrono::NaiveDateTime;

/// Standard property keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Title,
    Publisher,
    Description,
    GameId,
    Region,
    CreationDate,
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Timestamp(NaiveDateTime),
}

/// Ordered property list.
#[derive(Debug, Clone, Default)]
pub struct MetaData {
    props: Vec<(Property, PropertyValue)>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string property. Empty strings are skipped; a repeated key
    /// replaces the earlier value.
    pub fn add_string(&mut self, key: Property, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.set(key, PropertyValue::String(value));
        }
    }

    pub fn add_timestamp(&mut self, key: Property, value: Option<NaiveDateTime>) {
        if let Some(ts) = value {
            self.set(key, PropertyValue::Timestamp(ts));
        }
    }

    fn set(&mut self, key: Property, value: PropertyValue) {
        match self.props.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.props.push((key, value)),
        }
    }

    pub fn get(&self, key: Property) -> Option<&PropertyValue> {
        self.props.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Property, PropertyValue)> {
        self.props.iter()
    }
}
