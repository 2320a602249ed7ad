//! Shared handle to one deployment unit.
//!
//! The controller sits behind an async mutex so lifecycle calls from the
//! supervisor and from the hot reload watcher never interleave. The current
//! isolation context is mirrored in an `ArcSwapOption` for lock-free reads.

use std::path::Path;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::Instrument;

use crate::isolation::IsolationContext;
use crate::lifecycle::controller::LifecycleController;
use crate::lifecycle::env::DeploymentEnv;
use crate::lifecycle::error::{DeploymentError, InitError, InstallError, StartError, StopError};
use crate::lifecycle::state::UnitState;
use crate::lifecycle::watcher::ChangeHandler;

struct UnitInner {
    name: String,
    controller: Mutex<LifecycleController>,
    reload_lock: Mutex<()>,
    isolation: ArcSwapOption<IsolationContext>,
}

impl UnitInner {
    fn sync_isolation(&self, controller: &LifecycleController) {
        self.isolation.store(controller.isolation().cloned());
    }
}

#[async_trait]
impl ChangeHandler for UnitInner {
    async fn on_change(&self, resource: &Path) {
        // One hot redeploy at a time per unit.
        let _reload = self.reload_lock.lock().await;
        let mut controller = self.controller.lock().await;
        if controller.state() != UnitState::Started {
            tracing::debug!(unit = %self.name, state = %controller.state(), "Unit not started, skipping reload");
            return;
        }

        let span = match controller.isolation() {
            Some(isolation) => tracing::info_span!("isolation", context = %isolation.id()),
            None => tracing::Span::none(),
        };
        let result = controller.redeploy().instrument(span).await;
        self.sync_isolation(&controller);

        match result {
            Ok(()) => tracing::info!(unit = %self.name, resource = %resource.display(), "Hot redeploy complete"),
            Err(e) => tracing::error!(unit = %self.name, error = %e, "Hot redeploy failed"),
        }
    }
}

/// Cloneable handle to a unit and its lifecycle controller.
#[derive(Clone)]
pub struct DeploymentUnit {
    inner: Arc<UnitInner>,
}

impl std::fmt::Debug for DeploymentUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentUnit")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl DeploymentUnit {
    pub fn new(name: impl Into<String>, env: Arc<DeploymentEnv>) -> Self {
        let name = name.into();
        let inner = Arc::new_cyclic(|weak: &Weak<UnitInner>| {
            let hook: Weak<dyn ChangeHandler> = weak.clone();
            UnitInner {
                controller: Mutex::new(LifecycleController::new(&name, env).with_reload_hook(hook)),
                reload_lock: Mutex::new(()),
                isolation: ArcSwapOption::empty(),
                name,
            }
        });
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The isolation context of the current deployment, if any.
    pub fn isolation(&self) -> Option<Arc<IsolationContext>> {
        self.inner.isolation.load_full()
    }

    /// Exclusive access to the controller.
    pub async fn lock(&self) -> MutexGuard<'_, LifecycleController> {
        self.inner.controller.lock().await
    }

    pub async fn state(&self) -> UnitState {
        self.lock().await.state()
    }

    pub async fn install(&self) -> Result<(), InstallError> {
        let mut controller = self.lock().await;
        let result = controller.install();
        self.inner.sync_isolation(&controller);
        result
    }

    pub async fn init(&self) -> Result<(), InitError> {
        self.lock().await.init()
    }

    pub async fn start(&self) -> Result<(), StartError> {
        self.lock().await.start().await
    }

    pub async fn stop(&self) -> Result<(), StopError> {
        self.lock().await.stop().await
    }

    pub async fn dispose(&self) -> Result<(), StopError> {
        let mut controller = self.lock().await;
        let result = controller.dispose().await;
        self.inner.sync_isolation(&controller);
        result
    }

    pub async fn redeploy(&self) -> Result<(), DeploymentError> {
        let mut controller = self.lock().await;
        let result = controller.redeploy().await;
        self.inner.sync_isolation(&controller);
        result
    }

    /// install, init and start in one go.
    pub async fn deploy(&self) -> Result<(), DeploymentError> {
        let mut controller = self.lock().await;
        let result = Self::deploy_locked(&mut controller).await;
        self.inner.sync_isolation(&controller);
        result
    }

    async fn deploy_locked(controller: &mut LifecycleController) -> Result<(), DeploymentError> {
        controller.install()?;
        let span = match controller.isolation() {
            Some(isolation) => tracing::info_span!("isolation", context = %isolation.id()),
            None => tracing::Span::none(),
        };
        async {
            controller.init()?;
            controller.start().await?;
            Ok::<(), DeploymentError>(())
        }
        .instrument(span)
        .await
    }

    /// Invoke the hot reload path directly, as the watcher would.
    pub async fn on_change(&self, resource: &Path) {
        self.inner.on_change(resource).await;
    }
}
