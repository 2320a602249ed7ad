//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (reload interval > 0)
//! - Check unit names are usable as directory names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LauncherConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::LauncherConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    ZeroReloadInterval,
    BlankUnitName,
    InvalidUnitName(String),
    DuplicateUnit(String),
    InvalidMetricsAddress(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroReloadInterval => write!(f, "reload.interval_ms must be greater than 0"),
            ValidationError::BlankUnitName => write!(f, "unit names must not be blank"),
            ValidationError::InvalidUnitName(name) => {
                write!(f, "unit name '{}' must not contain path separators", name)
            }
            ValidationError::DuplicateUnit(name) => write!(f, "unit '{}' is listed more than once", name),
            ValidationError::InvalidMetricsAddress(addr) => {
                write!(f, "observability.metrics_address '{}' is not a socket address", addr)
            }
        }
    }
}

/// Check a unit name can be used as a directory name under the apps dir.
pub fn validate_unit_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankUnitName);
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ValidationError::InvalidUnitName(name.to_string()));
    }
    Ok(())
}

pub fn validate_config(config: &LauncherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.reload.interval_ms == 0 {
        errors.push(ValidationError::ZeroReloadInterval);
    }

    let mut seen = HashSet::new();
    for unit in &config.units {
        if let Err(e) = validate_unit_name(unit) {
            errors.push(e);
        } else if !seen.insert(unit.as_str()) {
            errors.push(ValidationError::DuplicateUnit(unit.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&LauncherConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = LauncherConfig::default();
        config.reload.interval_ms = 0;
        config.units = vec!["orders".into(), "orders".into(), "../etc".into(), " ".into()];
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroReloadInterval,
                ValidationError::DuplicateUnit("orders".into()),
                ValidationError::InvalidUnitName("../etc".into()),
                ValidationError::BlankUnitName,
                ValidationError::InvalidMetricsAddress("not-an-address".into()),
            ]
        );
    }
}
