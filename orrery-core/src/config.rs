//! Configuration types

use crate::error::{ConfigError, OrreryResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What removing a record does to edges that point *at* it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InboundEdgePolicy {
    /// Clear every inbound reference from the referring records before the
    /// record is removed. Inverses of the pruning are recorded, so undo
    /// restores the references.
    #[default]
    Prune,
    /// Leave referring records untouched (their references dangle) and only
    /// drop the removed record's outbound edges and its own index entry.
    Retain,
}

impl FromStr for InboundEdgePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prune" => Ok(InboundEdgePolicy::Prune),
            "retain" => Ok(InboundEdgePolicy::Retain),
            other => Err(ConfigError::InvalidValue {
                field: "inbound_edge_policy".to_string(),
                value: other.to_string(),
                reason: "expected prune or retain".to_string(),
            }),
        }
    }
}

/// How a cache-backed source applies an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateStrategy {
    /// Patch the cache directly, rolling back with the inverse operations
    /// when any operation fails.
    #[default]
    Direct,
    /// Patch a transform buffer seeded from the cache and apply the
    /// resulting changeset only when every operation succeeded.
    ///
    /// Seeding copies the whole cache, so each update costs time and memory
    /// proportional to the cache size rather than to the transform.
    Buffered,
}

impl FromStr for UpdateStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(UpdateStrategy::Direct),
            "buffered" => Ok(UpdateStrategy::Buffered),
            other => Err(ConfigError::InvalidValue {
                field: "update_strategy".to_string(),
                value: other.to_string(),
                reason: "expected direct or buffered".to_string(),
            }),
        }
    }
}

/// Record cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub inbound_edge_policy: InboundEdgePolicy,
    /// Check attribute values against their declared kinds.
    pub validate_attributes: bool,
    /// Default strict-not-found behaviour for queries that don't say.
    pub raise_not_found: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            inbound_edge_policy: InboundEdgePolicy::Prune,
            validate_attributes: true,
            raise_not_found: false,
        }
    }
}

impl CacheSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbound_edge_policy(mut self, policy: InboundEdgePolicy) -> Self {
        self.inbound_edge_policy = policy;
        self
    }

    pub fn with_attribute_validation(mut self, enabled: bool) -> Self {
        self.validate_attributes = enabled;
        self
    }

    pub fn with_raise_not_found(mut self, raise: bool) -> Self {
        self.raise_not_found = raise;
        self
    }
}

/// Settings for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Name used in logs, events and full-response `sources` maps.
    pub name: String,
    pub update_strategy: UpdateStrategy,
    pub cache: CacheSettings,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            update_strategy: UpdateStrategy::Direct,
            cache: CacheSettings::default(),
        }
    }
}

impl SourceSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_update_strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.update_strategy = strategy;
        self
    }

    pub fn with_cache(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    /// Create settings from environment variables.
    ///
    /// Environment variables:
    /// - `ORRERY_SOURCE_NAME`: source name (default: memory)
    /// - `ORRERY_UPDATE_STRATEGY`: "direct" or "buffered" (default: direct)
    /// - `ORRERY_INBOUND_EDGE_POLICY`: "prune" or "retain" (default: prune)
    /// - `ORRERY_VALIDATE_ATTRIBUTES`: "true" or "false" (default: true)
    /// - `ORRERY_RAISE_NOT_FOUND`: "true" or "false" (default: false)
    pub fn from_env() -> OrreryResult<Self> {
        let defaults = Self::default();

        let name = std::env::var("ORRERY_SOURCE_NAME").unwrap_or(defaults.name);

        let update_strategy = match std::env::var("ORRERY_UPDATE_STRATEGY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.update_strategy,
        };

        let inbound_edge_policy = match std::env::var("ORRERY_INBOUND_EDGE_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.cache.inbound_edge_policy,
        };

        let validate_attributes = std::env::var("ORRERY_VALIDATE_ATTRIBUTES")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.cache.validate_attributes);

        let raise_not_found = std::env::var("ORRERY_RAISE_NOT_FOUND")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(defaults.cache.raise_not_found);

        let settings = Self {
            name,
            update_strategy,
            cache: CacheSettings {
                inbound_edge_policy,
                validate_attributes,
                raise_not_found,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> OrreryResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "name".to_string(),
            }
            .into());
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "name".to_string(),
                value: self.name.clone(),
                reason: "must not contain whitespace".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
