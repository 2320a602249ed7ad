//! Descriptor lookup.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::schema::Descriptor;

/// File name of a unit's descriptor inside its directory.
pub const DESCRIPTOR_FILE: &str = "deployment.toml";

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to read descriptor for unit '{unit}': {source}")]
    Io {
        unit: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse descriptor {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Source of unit descriptors.
pub trait DescriptorService: Send + Sync {
    fn fetch(&self, unit_name: &str) -> Result<Descriptor, DescriptorError>;
}

/// Reads `<apps_dir>/<unit>/deployment.toml`.
#[derive(Debug, Clone)]
pub struct FileDescriptorService {
    apps_dir: PathBuf,
}

impl FileDescriptorService {
    pub fn new(apps_dir: impl Into<PathBuf>) -> Self {
        Self { apps_dir: apps_dir.into() }
    }
}

impl DescriptorService for FileDescriptorService {
    fn fetch(&self, unit_name: &str) -> Result<Descriptor, DescriptorError> {
        let unit_dir = self.apps_dir.join(unit_name);
        if !unit_dir.is_dir() {
            return Err(DescriptorError::Io {
                unit: unit_name.to_string(),
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("unit directory {} does not exist", unit_dir.display()),
                ),
            });
        }

        let path = unit_dir.join(DESCRIPTOR_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(unit = %unit_name, "No descriptor file, using defaults");
                return Ok(Descriptor::default());
            }
            Err(source) => {
                return Err(DescriptorError::Io {
                    unit: unit_name.to_string(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| DescriptorError::Parse { path, source })
    }
}
