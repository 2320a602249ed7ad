//! Built-in configuration builders.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::runtime::builder::{
    extension_of, BuilderError, ConfigurationBuilder, RuntimeConfiguration, AUTO_BUILDER, TOML_BUILDER,
};

/// Seeds the runtime with a fixed set of properties.
#[derive(Debug)]
pub struct PropertiesBuilder {
    properties: BTreeMap<String, String>,
    configured: bool,
}

impl PropertiesBuilder {
    pub fn new(properties: BTreeMap<String, String>) -> Self {
        Self {
            properties,
            configured: false,
        }
    }
}

impl ConfigurationBuilder for PropertiesBuilder {
    fn name(&self) -> &str {
        "properties"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn configure(&mut self, config: &mut RuntimeConfiguration) -> Result<(), BuilderError> {
        for (key, value) in &self.properties {
            config.set_property(key.clone(), value.clone());
        }
        self.configured = true;
        Ok(())
    }
}

/// Loads TOML resources, flattening tables into dotted property keys.
#[derive(Debug)]
pub struct TomlBuilder {
    resources: Vec<PathBuf>,
    configured: bool,
}

impl TomlBuilder {
    pub fn new(resources: Vec<PathBuf>) -> Self {
        Self {
            resources,
            configured: false,
        }
    }
}

impl ConfigurationBuilder for TomlBuilder {
    fn name(&self) -> &str {
        TOML_BUILDER
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn configure(&mut self, config: &mut RuntimeConfiguration) -> Result<(), BuilderError> {
        for path in &self.resources {
            load_toml(path, config)?;
        }
        self.configured = true;
        Ok(())
    }
}

/// Picks a loader per resource from its file extension.
#[derive(Debug)]
pub struct AutoBuilder {
    resources: Vec<PathBuf>,
    configured: bool,
}

impl AutoBuilder {
    pub fn new(resources: Vec<PathBuf>) -> Self {
        Self {
            resources,
            configured: false,
        }
    }
}

impl ConfigurationBuilder for AutoBuilder {
    fn name(&self) -> &str {
        AUTO_BUILDER
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn configure(&mut self, config: &mut RuntimeConfiguration) -> Result<(), BuilderError> {
        for path in &self.resources {
            match extension_of(path).as_deref() {
                Some("toml") => load_toml(path, config)?,
                Some("properties") => load_properties(path, config)?,
                _ => return Err(BuilderError::Unsupported(path.clone())),
            }
        }
        self.configured = true;
        Ok(())
    }
}

fn read(path: &Path) -> Result<String, BuilderError> {
    fs::read_to_string(path).map_err(|source| BuilderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_toml(path: &Path, config: &mut RuntimeConfiguration) -> Result<(), BuilderError> {
    let table: toml::Table = read(path)?.parse().map_err(|source| BuilderError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut flat = Vec::new();
    flatten("", &toml::Value::Table(table), &mut flat);
    for (key, value) in flat {
        let value = config.resolve_placeholders(&value);
        config.set_property(key, value);
    }
    config.add_resource(path);
    tracing::debug!(resource = %path.display(), "Loaded TOML config resource");
    Ok(())
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, value) in table {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&key, value, out);
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

fn load_properties(path: &Path, config: &mut RuntimeConfiguration) -> Result<(), BuilderError> {
    let content = read(path)?;
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .or_else(|| line.split_once(':'))
            .ok_or_else(|| BuilderError::Malformed {
                path: path.to_path_buf(),
                line: index + 1,
            })?;
        let value = config.resolve_placeholders(value.trim());
        config.set_property(key.trim(), value);
    }
    config.add_resource(path);
    tracing::debug!(resource = %path.display(), "Loaded properties config resource");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_is_flattened_and_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(
            &path,
            r#"
            name = "orders"
            [store]
            path = "${app.home}/data"
            retries = 3
            "#,
        )
        .unwrap();

        let mut config = RuntimeConfiguration::default();
        PropertiesBuilder::new(BTreeMap::from([("app.home".to_string(), "/srv/orders".to_string())]))
            .configure(&mut config)
            .unwrap();

        let mut builder = TomlBuilder::new(vec![path.clone()]);
        assert!(!builder.is_configured());
        builder.configure(&mut config).unwrap();
        assert!(builder.is_configured());

        assert_eq!(config.property("name"), Some("orders"));
        assert_eq!(config.property("store.path"), Some("/srv/orders/data"));
        assert_eq!(config.property("store.retries"), Some("3"));
        assert_eq!(config.resources(), &[path]);
    }

    #[test]
    fn test_auto_handles_properties_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.properties");
        fs::write(&path, "# comment\nregion = eu-west\nowner: ops\n").unwrap();

        let mut config = RuntimeConfiguration::default();
        AutoBuilder::new(vec![path]).configure(&mut config).unwrap();

        assert_eq!(config.property("region"), Some("eu-west"));
        assert_eq!(config.property("owner"), Some("ops"));
    }

    #[test]
    fn test_auto_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.xml");
        fs::write(&path, "<flows/>").unwrap();

        let mut builder = AutoBuilder::new(vec![path]);
        let err = builder.configure(&mut RuntimeConfiguration::default()).unwrap_err();
        assert!(matches!(err, BuilderError::Unsupported(_)));
        assert!(!builder.is_configured());
    }

    #[test]
    fn test_malformed_properties_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.properties");
        fs::write(&path, "ok=1\nnot a pair\n").unwrap();

        let err = AutoBuilder::new(vec![path])
            .configure(&mut RuntimeConfiguration::default())
            .unwrap_err();
        assert!(matches!(err, BuilderError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(&path, "name = ").unwrap();

        let err = TomlBuilder::new(vec![path])
            .configure(&mut RuntimeConfiguration::default())
            .unwrap_err();
        assert!(matches!(err, BuilderError::Parse { .. }));
    }
}
