//! Execution records returned by visibility stores.

use std::collections::BTreeMap;

use super::AttributeValue;
use crate::registry::RUN_ID;

/// A single workflow execution as seen by the visibility layer.
///
/// Attributes are sparse: an attribute that was never set is absent from the
/// map rather than stored as a null marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    run_id: String,
    attributes: BTreeMap<String, AttributeValue>,
}

impl ExecutionRecord {
    /// Create a record with only its `RunId` attribute set.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        let mut attributes = BTreeMap::new();
        attributes.insert(RUN_ID.to_owned(), AttributeValue::Text(run_id.as_str().to_owned()));
        Self { run_id, attributes }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.set(name, value);
        self
    }

    /// The run id, which uniquely identifies the record.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get an attribute value, `None` when the attribute is absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Set an attribute. `RunId` cannot be changed after construction.
    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) {
        let name = name.into();
        if name == RUN_ID {
            return;
        }
        self.attributes.insert(name, value);
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        if name == RUN_ID {
            return None;
        }
        self.attributes.remove(name)
    }

    /// Iterate over all present attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(name, value)| (name.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_is_an_attribute() {
        let record = ExecutionRecord::new("run-1");
        assert_eq!(record.run_id(), "run-1");
        assert_eq!(record.get(RUN_ID), Some(&AttributeValue::text("run-1")));
    }

    #[test]
    fn test_run_id_is_immutable() {
        let mut record = ExecutionRecord::new("run-1");
        record.set(RUN_ID, AttributeValue::text("other"));
        assert!(record.remove(RUN_ID).is_none());
        assert_eq!(record.get(RUN_ID), Some(&AttributeValue::text("run-1")));
    }

    #[test]
    fn test_absent_attribute() {
        let record = ExecutionRecord::new("run-1").with("Custom", AttributeValue::Int(4));
        assert!(record.has("Custom"));
        assert!(!record.has("Other"));
        assert_eq!(record.attributes().count(), 2);
    }
}
