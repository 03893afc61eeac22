//! Search attribute registry.
//!
//! Maps attribute names to their semantic type and records which names are
//! reserved by the system. One reserved attribute is the *partition
//! attribute*: its presence and value separate internally generated
//! executions from user-visible ones.
//!
//! # Thread Safety
//!
//! The registry is built once at startup and then shared behind an `Arc`.
//! Lookups take `&self` only, so concurrent reads need no locking.
//!
//! # Invariants
//!
//! - The partition attribute is always registered, as a reserved `Keyword`
//! - A custom attribute never shadows a reserved name
//! - A name maps to exactly one type for the registry's lifetime

use std::collections::HashMap;

use crate::types::{Attribute, AttributeType};

pub const WORKFLOW_ID: &str = "WorkflowId";
pub const RUN_ID: &str = "RunId";
pub const WORKFLOW_TYPE: &str = "WorkflowType";
pub const EXECUTION_STATUS: &str = "ExecutionStatus";
pub const TASK_QUEUE: &str = "TaskQueue";
pub const START_TIME: &str = "StartTime";
pub const CLOSE_TIME: &str = "CloseTime";
pub const EXECUTION_TIME: &str = "ExecutionTime";
pub const HISTORY_LENGTH: &str = "HistoryLength";
pub const BUILD_IDS: &str = "BuildIds";

/// Default name of the partition attribute.
pub const DEFAULT_PARTITION_ATTRIBUTE: &str = "NamespaceDivision";

const SYSTEM_ATTRIBUTES: [(&str, AttributeType); 10] = [
    (WORKFLOW_ID, AttributeType::Keyword),
    (RUN_ID, AttributeType::Keyword),
    (WORKFLOW_TYPE, AttributeType::Keyword),
    (EXECUTION_STATUS, AttributeType::Keyword),
    (TASK_QUEUE, AttributeType::Keyword),
    (START_TIME, AttributeType::Datetime),
    (CLOSE_TIME, AttributeType::Datetime),
    (EXECUTION_TIME, AttributeType::Datetime),
    (HISTORY_LENGTH, AttributeType::Int),
    (BUILD_IDS, AttributeType::KeywordList),
];

/// Read-only attribute lookup, consumed by the query converter.
pub trait AttributeLookup: Send + Sync {
    /// Look up an attribute by exact name.
    fn get_attribute(&self, name: &str) -> Option<&Attribute>;

    /// The partition attribute.
    fn partition_attribute(&self) -> &Attribute;
}

/// In-memory attribute registry.
#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    attributes: HashMap<String, Attribute>,
    partition: Attribute,
}

impl AttributeRegistry {
    /// Create a registry holding the system attributes and a partition
    /// attribute with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if `partition_attribute` is not a valid attribute name
    /// or collides with another system attribute.
    pub fn new(partition_attribute: &str) -> Result<Self, RegistryError> {
        validate_name(partition_attribute)?;
        if SYSTEM_ATTRIBUTES
            .iter()
            .any(|(name, _)| *name == partition_attribute)
        {
            return Err(RegistryError::ReservedName(partition_attribute.to_owned()));
        }
        Ok(Self::with_partition(partition_attribute))
    }

    fn with_partition(partition_attribute: &str) -> Self {
        let partition = Attribute::system(partition_attribute, AttributeType::Keyword);
        let mut attributes: HashMap<String, Attribute> = SYSTEM_ATTRIBUTES
            .iter()
            .map(|(name, ty)| ((*name).to_owned(), Attribute::system(*name, *ty)))
            .collect();
        attributes.insert(partition_attribute.to_owned(), partition.clone());
        Self {
            attributes,
            partition,
        }
    }

    /// Register a custom attribute.
    ///
    /// Registering the same name with the same type again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, reserved, or already
    /// registered with a different type.
    pub fn register_custom(
        &mut self,
        name: &str,
        attribute_type: AttributeType,
    ) -> Result<(), RegistryError> {
        validate_name(name)?;

        match self.attributes.get(name) {
            Some(existing) if existing.is_system_reserved => {
                Err(RegistryError::ReservedName(name.to_owned()))
            }
            Some(existing) if existing.attribute_type != attribute_type => {
                Err(RegistryError::TypeConflict {
                    name: name.to_owned(),
                    existing: existing.attribute_type,
                    requested: attribute_type,
                })
            }
            Some(_) => Ok(()),
            None => {
                self.attributes
                    .insert(name.to_owned(), Attribute::custom(name, attribute_type));
                tracing::debug!("registered custom attribute {name} ({attribute_type})");
                Ok(())
            }
        }
    }

    /// Builder-style variant of `register_custom`.
    ///
    /// # Errors
    ///
    /// Same as `register_custom`.
    pub fn with_custom(
        mut self,
        name: &str,
        attribute_type: AttributeType,
    ) -> Result<Self, RegistryError> {
        self.register_custom(name, attribute_type)?;
        Ok(self)
    }

    /// Whether `name` is a reserved system attribute.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.attributes
            .get(name)
            .is_some_and(|attribute| attribute.is_system_reserved)
    }

    /// Iterate over all registered attributes, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Number of registered attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Always false: system attributes are registered on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::with_partition(DEFAULT_PARTITION_ATTRIBUTE)
    }
}

impl AttributeLookup for AttributeRegistry {
    fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    fn partition_attribute(&self) -> &Attribute {
        &self.partition
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_owned()))
    }
}

/// Errors raised while building the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is empty, too long, or contains unsupported characters.
    InvalidName(String),
    /// The name belongs to a system attribute.
    ReservedName(String),
    /// The name is already registered with another type.
    TypeConflict {
        name: String,
        existing: AttributeType,
        requested: AttributeType,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid attribute name: '{name}'"),
            Self::ReservedName(name) => write!(f, "attribute name is reserved: {name}"),
            Self::TypeConflict {
                name,
                existing,
                requested,
            } => write!(
                f,
                "attribute {name} is already registered as {existing}, cannot register as {requested}"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_attributes_registered() {
        let registry = AttributeRegistry::default();
        let start = registry.get_attribute(START_TIME).expect("start time");
        assert_eq!(start.attribute_type, AttributeType::Datetime);
        assert!(start.is_system_reserved);
        assert!(registry.is_reserved(DEFAULT_PARTITION_ATTRIBUTE));
        assert_eq!(registry.len(), SYSTEM_ATTRIBUTES.len() + 1);
    }

    #[test]
    fn test_partition_attribute_is_configurable() {
        let registry = AttributeRegistry::new("Division").expect("registry");
        assert_eq!(registry.partition_attribute().name, "Division");
        assert!(registry.is_reserved("Division"));
        assert!(registry.get_attribute(DEFAULT_PARTITION_ATTRIBUTE).is_none());
    }

    #[test]
    fn test_partition_cannot_reuse_system_name() {
        assert_eq!(
            AttributeRegistry::new(WORKFLOW_ID).unwrap_err(),
            RegistryError::ReservedName(WORKFLOW_ID.to_owned())
        );
    }

    #[test]
    fn test_register_custom() {
        let mut registry = AttributeRegistry::default();
        registry
            .register_custom("CustomKeyword", AttributeType::Keyword)
            .expect("register");
        let attribute = registry.get_attribute("CustomKeyword").expect("lookup");
        assert!(!attribute.is_system_reserved);
        assert!(!registry.is_reserved("CustomKeyword"));

        // Same type again is fine
        registry
            .register_custom("CustomKeyword", AttributeType::Keyword)
            .expect("re-register");
    }

    #[test]
    fn test_register_custom_conflicts() {
        let mut registry = AttributeRegistry::default();
        assert!(matches!(
            registry.register_custom(RUN_ID, AttributeType::Keyword),
            Err(RegistryError::ReservedName(_))
        ));

        registry
            .register_custom("CustomInt", AttributeType::Int)
            .expect("register");
        assert!(matches!(
            registry.register_custom("CustomInt", AttributeType::Bool),
            Err(RegistryError::TypeConflict { .. })
        ));
        assert!(matches!(
            registry.register_custom("bad name", AttributeType::Bool),
            Err(RegistryError::InvalidName(_))
        ));
    }
}
