//! Per-unit isolation contexts.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::isolation::domain::{scan_libraries, DomainId, DomainRegistry};
use crate::isolation::IsolationConfigError;

/// Libraries visible only to the unit that owns them.
#[derive(Debug)]
pub struct AppBoundary {
    root: PathBuf,
    libraries: BTreeSet<String>,
}

impl AppBoundary {
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn contains(&self, library: &str) -> bool {
        self.libraries.contains(library)
    }
}

/// A unit's code-visibility boundary: its own libraries in front of its domain's.
///
/// A new context is created on every install and never reused, so identity
/// (`id()` or `Arc::ptr_eq`) tells deployments apart.
pub struct IsolationContext {
    id: Uuid,
    unit_name: String,
    domain: DomainId,
    domain_name: String,
    local: AppBoundary,
    registry: Arc<DomainRegistry>,
}

impl IsolationContext {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn local(&self) -> &AppBoundary {
        &self.local
    }

    /// Whether `library` is visible from inside this context.
    pub fn can_see(&self, library: &str) -> bool {
        if self.local.contains(library) {
            return true;
        }
        self.registry
            .get(self.domain)
            .map(|domain| domain.contains(library))
            .unwrap_or(false)
    }
}

impl fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationContext")
            .field("id", &self.id)
            .field("unit_name", &self.unit_name)
            .field("domain", &self.domain_name)
            .field("local", &self.local)
            .finish()
    }
}

/// Builds isolation contexts for units under one apps directory.
#[derive(Debug, Clone)]
pub struct IsolationContextFactory {
    apps_dir: PathBuf,
    registry: Arc<DomainRegistry>,
}

impl IsolationContextFactory {
    pub fn new(apps_dir: impl Into<PathBuf>, registry: Arc<DomainRegistry>) -> Self {
        Self {
            apps_dir: apps_dir.into(),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    /// Create a fresh context for `unit_name`, scanning `<apps_dir>/<unit>/lib`.
    pub fn create(
        &self,
        unit_name: &str,
        domain: Option<&str>,
    ) -> Result<Arc<IsolationContext>, IsolationConfigError> {
        let domain_id = self.registry.resolve(domain)?;
        let domain_name = self
            .registry
            .get(domain_id)
            .map(|d| d.name().to_string())
            .unwrap_or_default();

        let root = self.apps_dir.join(unit_name).join("lib");
        let libraries = scan_libraries(&root).map_err(|source| IsolationConfigError::Io {
            path: root.clone(),
            source,
        })?;

        let context = IsolationContext {
            id: Uuid::new_v4(),
            unit_name: unit_name.to_string(),
            domain: domain_id,
            domain_name,
            local: AppBoundary { root, libraries },
            registry: self.registry.clone(),
        };

        tracing::debug!(
            unit = %unit_name,
            context = %context.id,
            domain = %context.domain_name,
            "Isolation context created"
        );
        Ok(Arc::new(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn layout() -> (tempfile::TempDir, IsolationContextFactory) {
        let home = tempfile::tempdir().unwrap();
        let apps = home.path().join("apps");
        let shared = home.path().join("lib/shared");
        fs::create_dir_all(apps.join("orders/lib")).unwrap();
        fs::create_dir_all(apps.join("billing")).unwrap();
        fs::create_dir_all(shared.join("payments")).unwrap();
        fs::write(apps.join("orders/lib/annotations.jar"), b"").unwrap();
        fs::write(shared.join("payments/ledger.jar"), b"").unwrap();

        let registry = Arc::new(DomainRegistry::new(shared));
        (home, IsolationContextFactory::new(apps, registry))
    }

    #[test]
    fn test_local_and_domain_visibility() {
        let (_home, factory) = layout();
        let orders = factory.create("orders", Some("payments")).unwrap();

        assert!(orders.can_see("annotations"));
        assert!(orders.can_see("ledger"));
        assert!(!orders.can_see("unrelated"));
        assert_eq!(orders.domain_name(), "payments");
    }

    #[test]
    fn test_local_libraries_are_not_shared() {
        let (_home, factory) = layout();
        let orders = factory.create("orders", Some("payments")).unwrap();
        let billing = factory.create("billing", Some("payments")).unwrap();

        assert_eq!(orders.domain(), billing.domain());
        assert!(billing.can_see("ledger"));
        assert!(!billing.can_see("annotations"));
    }

    #[test]
    fn test_every_create_is_a_new_context() {
        let (_home, factory) = layout();
        let first = factory.create("orders", None).unwrap();
        let second = factory.create("orders", None).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.id(), second.id());
        assert_eq!(first.domain(), second.domain());
    }

    #[test]
    fn test_unknown_domain_is_rejected() {
        let (_home, factory) = layout();
        let err = factory.create("orders", Some("nope")).unwrap_err();
        assert!(matches!(err, IsolationConfigError::UnknownDomain { .. }));
    }
}
