//! Service configuration module.
//!
//! This module provides configuration loading for the visibility service
//! from environment variables.
//!
//! # Environment Variables
//!
//! - `VISIBILITY_LISTEN_PORT`: Port to listen on (default: `7243`)
//! - `VISIBILITY_DEFAULT_PAGE_SIZE`: Page size when a request gives none (default: `100`)
//! - `VISIBILITY_MAX_PAGE_SIZE`: Larger page sizes are clamped to this (default: `1000`)
//! - `VISIBILITY_LIST_TIMEOUT_MS`: Deadline for each store call (default: `10000`)
//! - `VISIBILITY_PARTITION_ATTRIBUTE`: Name of the partition attribute (default: `NamespaceDivision`)
//! - `VISIBILITY_CUSTOM_ATTRIBUTES`: Custom attributes as `Name:Type,...` (default: none)
//!
//! # Invariants
//!
//! - `default_page_size` and `max_page_size` are positive, and
//!   `default_page_size <= max_page_size`
//! - `list_timeout` is non-zero
//! - `custom_attributes` names each carry a known `AttributeType`

use std::time::Duration;

use crate::listing::ListingOptions;
use crate::registry::{AttributeRegistry, DEFAULT_PARTITION_ATTRIBUTE};
use crate::types::AttributeType;

const LISTEN_PORT: &str = "VISIBILITY_LISTEN_PORT";
const DEFAULT_PAGE_SIZE: &str = "VISIBILITY_DEFAULT_PAGE_SIZE";
const MAX_PAGE_SIZE: &str = "VISIBILITY_MAX_PAGE_SIZE";
const LIST_TIMEOUT_MS: &str = "VISIBILITY_LIST_TIMEOUT_MS";
const PARTITION_ATTRIBUTE: &str = "VISIBILITY_PARTITION_ATTRIBUTE";
const CUSTOM_ATTRIBUTES: &str = "VISIBILITY_CUSTOM_ATTRIBUTES";

/// Visibility service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityConfig {
    /// Port to listen on for HTTP requests.
    pub listen_port: u16,
    /// Page size used when a request does not specify one.
    pub default_page_size: usize,
    /// Upper bound on page size.
    pub max_page_size: usize,
    /// Deadline for each store call.
    pub list_timeout: Duration,
    /// Name of the partition attribute.
    pub partition_attribute: String,
    /// Custom search attributes to register at startup.
    pub custom_attributes: Vec<(String, AttributeType)>,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            listen_port: Self::DEFAULT_PORT,
            default_page_size: Self::DEFAULT_PAGE_SIZE,
            max_page_size: ListingOptions::DEFAULT_MAX_PAGE_SIZE,
            list_timeout: ListingOptions::DEFAULT_LIST_TIMEOUT,
            partition_attribute: DEFAULT_PARTITION_ATTRIBUTE.to_owned(),
            custom_attributes: Vec::new(),
        }
    }
}

impl VisibilityConfig {
    /// Default port for the service.
    pub const DEFAULT_PORT: u16 = 7243;
    /// Default page size.
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - a numeric variable does not parse or is zero
    /// - the default page size exceeds the maximum
    /// - a custom attribute entry is not `Name:Type` with a known type
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listen_port = parse_or(&lookup, LISTEN_PORT, defaults.listen_port)?;
        let default_page_size = parse_positive(&lookup, DEFAULT_PAGE_SIZE, defaults.default_page_size)?;
        let max_page_size = parse_positive(&lookup, MAX_PAGE_SIZE, defaults.max_page_size)?;
        if default_page_size > max_page_size {
            return Err(ConfigError::InvalidValue {
                name: DEFAULT_PAGE_SIZE.to_owned(),
                message: format!("{default_page_size} exceeds {MAX_PAGE_SIZE} ({max_page_size})"),
            });
        }

        let timeout_ms = parse_positive(
            &lookup,
            LIST_TIMEOUT_MS,
            u64::try_from(defaults.list_timeout.as_millis()).unwrap_or(u64::MAX),
        )?;

        let partition_attribute = lookup(PARTITION_ATTRIBUTE)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.partition_attribute);

        let custom_attributes = lookup(CUSTOM_ATTRIBUTES)
            .map(|value| parse_custom_attributes(&value))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            listen_port,
            default_page_size,
            max_page_size,
            list_timeout: Duration::from_millis(timeout_ms),
            partition_attribute,
            custom_attributes,
        })
    }

    /// Build the attribute registry described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition attribute or a custom attribute is
    /// rejected by the registry.
    pub fn build_registry(&self) -> Result<AttributeRegistry, ConfigError> {
        let mut registry =
            AttributeRegistry::new(&self.partition_attribute).map_err(|e| ConfigError::InvalidValue {
                name: PARTITION_ATTRIBUTE.to_owned(),
                message: e.to_string(),
            })?;
        for (name, attribute_type) in &self.custom_attributes {
            registry
                .register_custom(name, *attribute_type)
                .map_err(|e| ConfigError::InvalidValue {
                    name: CUSTOM_ATTRIBUTES.to_owned(),
                    message: e.to_string(),
                })?;
        }
        Ok(registry)
    }

    /// Limits for the listing service.
    #[must_use]
    pub const fn listing_options(&self) -> ListingOptions {
        ListingOptions {
            max_page_size: self.max_page_size,
            list_timeout: self.list_timeout,
        }
    }
}

/// Parse a variable, returning `default` if it is unset.
fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_owned(),
            message: format!("'{value}' is not a valid number"),
        }),
        None => Ok(default),
    }
}

/// Like `parse_or`, rejecting zero.
fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let value = parse_or(lookup, name, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            name: name.to_owned(),
            message: "must be greater than zero".to_owned(),
        });
    }
    Ok(value)
}

/// Parse `Name:Type,Name:Type`. Empty entries are skipped.
fn parse_custom_attributes(value: &str) -> Result<Vec<(String, AttributeType)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = |message: String| ConfigError::InvalidValue {
                name: CUSTOM_ATTRIBUTES.to_owned(),
                message,
            };
            let (name, type_name) = entry
                .split_once(':')
                .ok_or_else(|| invalid(format!("'{entry}' is not of the form Name:Type")))?;
            let attribute_type = AttributeType::parse(type_name.trim())
                .ok_or_else(|| invalid(format!("unknown attribute type '{}'", type_name.trim())))?;
            Ok((name.trim().to_owned(), attribute_type))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::registry::AttributeLookup;

    fn load(vars: &[(&str, &str)]) -> Result<VisibilityConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        VisibilityConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).expect("config");
        assert_eq!(config, VisibilityConfig::default());
        assert_eq!(config.listen_port, 7243);
        assert_eq!(config.default_page_size, 100);
        assert_eq!(config.max_page_size, 1000);
        assert_eq!(config.list_timeout, Duration::from_secs(10));
        assert_eq!(config.partition_attribute, "NamespaceDivision");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (LISTEN_PORT, "8080"),
            (MAX_PAGE_SIZE, "50"),
            (DEFAULT_PAGE_SIZE, "20"),
            (LIST_TIMEOUT_MS, "250"),
            (PARTITION_ATTRIBUTE, "Division"),
            (CUSTOM_ATTRIBUTES, "CustomerId:keyword, Priority:Int,"),
        ])
        .expect("config");
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.listing_options().max_page_size, 50);
        assert_eq!(config.list_timeout, Duration::from_millis(250));
        assert_eq!(
            config.custom_attributes,
            vec![
                ("CustomerId".to_owned(), AttributeType::Keyword),
                ("Priority".to_owned(), AttributeType::Int),
            ]
        );

        let registry = config.build_registry().expect("registry");
        assert_eq!(registry.partition_attribute().name, "Division");
        assert!(registry.get_attribute("Priority").is_some());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[(LISTEN_PORT, "http")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&[(MAX_PAGE_SIZE, "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&[(DEFAULT_PAGE_SIZE, "500"), (MAX_PAGE_SIZE, "100")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&[(CUSTOM_ATTRIBUTES, "Broken")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&[(CUSTOM_ATTRIBUTES, "A:Decimal")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_registry_rejects_reserved_custom_name() {
        let config = load(&[(CUSTOM_ATTRIBUTES, "WorkflowId:Keyword")]).expect("config");
        assert!(config.build_registry().is_err());
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_owned(),
            message: "bad value".to_owned(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}
