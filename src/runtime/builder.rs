//! Configuration builder contract and registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::isolation::IsolationContext;
use crate::runtime::builders::{AutoBuilder, TomlBuilder};

/// Builder used when a descriptor names none.
pub const AUTO_BUILDER: &str = "auto";
/// Canonical name of the TOML resource builder.
pub const TOML_BUILDER: &str = "toml-resources";
/// Optional annotation-aware builder, added to the chain when its library is visible.
pub const ANNOTATIONS_BUILDER: &str = "annotations";
/// Library that must be visible in a unit's isolation context for [`ANNOTATIONS_BUILDER`] to be used.
pub const ANNOTATIONS_LIBRARY: &str = "annotations";

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("no configuration builder registered under '{0}'")]
    Unknown(String),
    #[error("no builder can handle config resource {0}")]
    Unsupported(PathBuf),
    #[error("failed to read config resource {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config resource {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("malformed line {line} in {path}")]
    Malformed { path: PathBuf, line: usize },
}

/// Configuration accumulated by a builder chain.
///
/// Builders run in order; each sees the properties left by the ones before it.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfiguration {
    properties: BTreeMap<String, String>,
    resources: Vec<PathBuf>,
    applied: Vec<String>,
}

impl RuntimeConfiguration {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn add_resource(&mut self, path: impl Into<PathBuf>) {
        self.resources.push(path.into());
    }

    pub fn resources(&self) -> &[PathBuf] {
        &self.resources
    }

    /// Names of the builders applied so far, in order.
    pub fn applied_builders(&self) -> &[String] {
        &self.applied
    }

    pub(crate) fn record_builder(&mut self, name: &str) {
        self.applied.push(name.to_string());
    }

    /// Replace `${key}` with the value of an already-set property.
    /// Unknown placeholders are left as written.
    pub fn resolve_placeholders(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.properties.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 1]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// One step of runtime configuration.
pub trait ConfigurationBuilder: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this builder has already been applied.
    fn is_configured(&self) -> bool;

    fn configure(&mut self, config: &mut RuntimeConfiguration) -> Result<(), BuilderError>;
}

impl fmt::Debug for dyn ConfigurationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationBuilder")
            .field("name", &self.name())
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// What a builder factory gets to work with.
pub struct BuilderArgs<'a> {
    pub resources: &'a [PathBuf],
    pub isolation: &'a IsolationContext,
}

pub type BuilderFactory =
    Arc<dyn Fn(&BuilderArgs<'_>) -> Result<Box<dyn ConfigurationBuilder>, BuilderError> + Send + Sync>;

/// Named builder factories plus case-insensitive aliases.
#[derive(Clone)]
pub struct BuilderRegistry {
    factories: HashMap<String, BuilderFactory>,
    aliases: HashMap<String, String>,
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(AUTO_BUILDER, |args: &BuilderArgs<'_>| {
            Ok(Box::new(AutoBuilder::new(args.resources.to_vec())) as Box<dyn ConfigurationBuilder>)
        });
        registry.register(TOML_BUILDER, |args: &BuilderArgs<'_>| {
            Ok(Box::new(TomlBuilder::new(args.resources.to_vec())) as Box<dyn ConfigurationBuilder>)
        });
        registry.register_alias("toml", TOML_BUILDER);
        registry
    }
}

impl BuilderRegistry {
    /// A registry with no builders at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&BuilderArgs<'_>) -> Result<Box<dyn ConfigurationBuilder>, BuilderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn register_alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_ascii_lowercase(), target.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Resolve a descriptor's builder selection to a registered name:
    /// `None` is the auto builder, an alias maps to its target, anything else
    /// is taken as given.
    pub fn select(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            None | Some("") => AUTO_BUILDER.to_string(),
            Some(name) => self
                .aliases
                .get(&name.to_ascii_lowercase())
                .cloned()
                .unwrap_or_else(|| name.to_string()),
        }
    }

    pub fn instantiate(
        &self,
        name: &str,
        args: &BuilderArgs<'_>,
    ) -> Result<Box<dyn ConfigurationBuilder>, BuilderError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BuilderError::Unknown(name.to_string()))?;
        factory(args)
    }
}

/// Extension of a resource, lowercased.
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
