//! Descriptor schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Config resource used when a descriptor names none.
pub const DEFAULT_CONFIG_RESOURCE: &str = "unit-config.toml";

/// Everything the launcher needs to know to install and initialise one unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Descriptor {
    /// Config resources, relative to the unit directory. Order is preserved;
    /// the first one is the resource watched for hot redeploy.
    pub config_resources: Vec<String>,

    /// Configuration builder name or alias. `None` selects the auto-detecting builder.
    pub configuration_builder: Option<String>,

    /// Properties seeded into the runtime before any other builder runs.
    pub properties: BTreeMap<String, String>,

    /// Shared library domain. `None` or `"default"` selects the default domain.
    pub domain: Option<String>,

    /// Watch the first config resource and redeploy on change.
    pub redeployment_enabled: bool,

    /// Per-unit override of the launcher's shutdown timeout.
    pub shutdown_timeout_ms: Option<u64>,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            config_resources: vec![DEFAULT_CONFIG_RESOURCE.to_string()],
            configuration_builder: None,
            properties: BTreeMap::new(),
            domain: None,
            redeployment_enabled: true,
            shutdown_timeout_ms: None,
        }
    }
}
