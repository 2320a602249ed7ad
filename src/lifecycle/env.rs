//! Collaborators shared by every unit of one launcher.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LauncherConfig;
use crate::descriptor::{DescriptorService, FileDescriptorService};
use crate::isolation::{DomainRegistry, IsolationContextFactory};
use crate::lifecycle::shutdown::ShutdownTimeout;
use crate::runtime::{BuilderRegistry, DefaultRuntimeFactory, RuntimeContextFactory};

/// Suffix of the marker file written next to the unit directories on start.
pub const ANCHOR_SUFFIX: &str = "-anchor.txt";

/// Content of every marker file.
pub const ANCHOR_FILE_BLURB: &str =
    "Delete this file while the launcher is running to undeploy this unit in a clean way.";

/// Property carrying the unit's home directory into its runtime configuration.
pub const UNIT_HOME_PROPERTY: &str = "app.home";

/// Directory layout, services and defaults a [`LifecycleController`] works with.
///
/// [`LifecycleController`]: crate::lifecycle::LifecycleController
#[derive(Clone)]
pub struct DeploymentEnv {
    home_dir: PathBuf,
    apps_dir: PathBuf,
    descriptors: Arc<dyn DescriptorService>,
    isolation: IsolationContextFactory,
    builders: BuilderRegistry,
    runtimes: Arc<dyn RuntimeContextFactory>,
    reload_interval: Duration,
    shutdown_timeout: ShutdownTimeout,
}

impl DeploymentEnv {
    /// File-based descriptors, on-disk domains, default builders and runtime.
    pub fn from_config(config: &LauncherConfig) -> Self {
        let apps_dir = config.apps_dir();
        let registry = Arc::new(DomainRegistry::new(config.shared_lib_dir()));

        Self {
            home_dir: config.home_dir.clone(),
            descriptors: Arc::new(FileDescriptorService::new(&apps_dir)),
            isolation: IsolationContextFactory::new(&apps_dir, registry),
            builders: BuilderRegistry::default(),
            runtimes: Arc::new(DefaultRuntimeFactory),
            reload_interval: config.reload.interval(),
            shutdown_timeout: config.shutdown.timeout(),
            apps_dir,
        }
    }

    pub fn with_descriptor_service(mut self, service: impl DescriptorService + 'static) -> Self {
        self.descriptors = Arc::new(service);
        self
    }

    pub fn with_runtime_factory(mut self, factory: impl RuntimeContextFactory + 'static) -> Self {
        self.runtimes = Arc::new(factory);
        self
    }

    pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
        self.builders = builders;
        self
    }

    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: ShutdownTimeout) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn apps_dir(&self) -> &Path {
        &self.apps_dir
    }

    pub fn descriptors(&self) -> &dyn DescriptorService {
        self.descriptors.as_ref()
    }

    pub fn isolation(&self) -> &IsolationContextFactory {
        &self.isolation
    }

    pub fn builders(&self) -> &BuilderRegistry {
        &self.builders
    }

    pub fn runtimes(&self) -> &dyn RuntimeContextFactory {
        self.runtimes.as_ref()
    }

    pub fn reload_interval(&self) -> Duration {
        self.reload_interval
    }

    pub fn shutdown_timeout(&self) -> ShutdownTimeout {
        self.shutdown_timeout
    }

    /// `<home>/apps/<unit>`
    pub fn unit_home(&self, unit_name: &str) -> PathBuf {
        self.apps_dir.join(unit_name)
    }

    /// `<home>/apps/<unit>/<relative>`; may not exist. `None` if `relative`
    /// is absolute or climbs out of the unit directory.
    pub fn resolve_resource(&self, unit_name: &str, relative: &str) -> Option<PathBuf> {
        let inside = Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        inside.then(|| self.unit_home(unit_name).join(relative))
    }

    /// `<home>/apps/<unit>-anchor.txt`
    pub fn marker_path(&self, unit_name: &str) -> PathBuf {
        self.apps_dir.join(format!("{}{}", unit_name, ANCHOR_SUFFIX))
    }
}
