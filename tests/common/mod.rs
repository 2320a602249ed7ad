//! Shared utilities for lifecycle integration tests.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use unit_launcher::config::LauncherConfig;
use unit_launcher::lifecycle::{DeploymentEnv, Dispatcher};
use unit_launcher::notification::NotificationHub;
use unit_launcher::runtime::{
    ConfigurationBuilder, DefaultRuntimeFactory, RuntimeConfiguration, RuntimeContext, RuntimeContextFactory,
    RuntimeError, UnitOverrides,
};

/// A launcher home in a temporary directory.
pub struct TestHome {
    dir: TempDir,
}

#[allow(dead_code)]
impl TestHome {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("apps")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.path().join("apps")
    }

    pub fn unit_dir(&self, unit: &str) -> PathBuf {
        self.apps_dir().join(unit)
    }

    /// Unit directory with a default `unit-config.toml`.
    pub fn add_unit(&self, unit: &str, config: &str) -> PathBuf {
        let dir = self.unit_dir(unit);
        fs::create_dir_all(&dir).unwrap();
        let resource = dir.join("unit-config.toml");
        fs::write(&resource, config).unwrap();
        resource
    }

    /// Unit directory with nothing in it.
    pub fn add_empty_unit(&self, unit: &str) {
        fs::create_dir_all(self.unit_dir(unit)).unwrap();
    }

    pub fn write_descriptor(&self, unit: &str, body: &str) {
        fs::create_dir_all(self.unit_dir(unit)).unwrap();
        fs::write(self.unit_dir(unit).join("deployment.toml"), body).unwrap();
    }

    pub fn add_unit_library(&self, unit: &str, file: &str) {
        let lib = self.unit_dir(unit).join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join(file), "").unwrap();
    }

    pub fn add_shared_domain(&self, domain: &str, libraries: &[&str]) {
        let dir = self.path().join("lib").join("shared").join(domain);
        fs::create_dir_all(&dir).unwrap();
        for library in libraries {
            fs::write(dir.join(library), "").unwrap();
        }
    }

    pub fn config(&self) -> LauncherConfig {
        LauncherConfig {
            home_dir: self.path().to_path_buf(),
            ..LauncherConfig::default()
        }
    }

    pub fn env(&self) -> DeploymentEnv {
        DeploymentEnv::from_config(&self.config())
    }
}

/// Poll `check` until it holds or `limit` elapses.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check().await
}

/// Runtime that refuses to start.
struct FailingRuntime {
    inner: Arc<dyn RuntimeContext>,
}

#[async_trait]
impl RuntimeContext for FailingRuntime {
    fn unit_name(&self) -> &str {
        self.inner.unit_name()
    }

    fn notifications(&self) -> &NotificationHub {
        self.inner.notifications()
    }

    fn configuration(&self) -> &RuntimeConfiguration {
        self.inner.configuration()
    }

    fn dispatcher(&self) -> Dispatcher {
        self.inner.dispatcher()
    }

    fn is_started(&self) -> bool {
        false
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    async fn start(&self) -> Result<(), RuntimeError> {
        Err(RuntimeError::Other("engine refused to start".into()))
    }

    async fn stop(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn dispose(&self) {
        self.inner.dispose().await;
    }
}

#[allow(dead_code)]
pub struct FailingStartFactory;

impl RuntimeContextFactory for FailingStartFactory {
    fn create(
        &self,
        builders: Vec<Box<dyn ConfigurationBuilder>>,
        overrides: UnitOverrides,
    ) -> Result<Arc<dyn RuntimeContext>, RuntimeError> {
        let inner = DefaultRuntimeFactory.create(builders, overrides)?;
        Ok(Arc::new(FailingRuntime { inner }))
    }
}

/// Default runtime factory that counts the runtimes it creates.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct CountingFactory {
    pub created: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CountingFactory {
    pub fn count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RuntimeContextFactory for CountingFactory {
    fn create(
        &self,
        builders: Vec<Box<dyn ConfigurationBuilder>>,
        overrides: UnitOverrides,
    ) -> Result<Arc<dyn RuntimeContext>, RuntimeError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        DefaultRuntimeFactory.create(builders, overrides)
    }
}
