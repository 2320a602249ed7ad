//! Lifecycle of one deployment unit.
//!
//! # Responsibilities
//! - install: fetch the descriptor, resolve config resources, create the isolation context
//! - init: assemble the builder chain and create the runtime
//! - start / stop: drive the runtime, write the marker file
//! - dispose / redeploy: full teardown, then rebuild from scratch
//!
//! # Design Decisions
//! - Callers serialize lifecycle calls; `&mut self` enforces it
//! - The isolation context is passed explicitly, never bound to a thread
//! - The hot reload subscription is owned here and released on stop

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Instant;

use tracing::Instrument;

use crate::descriptor::Descriptor;
use crate::isolation::IsolationContext;
use crate::lifecycle::env::{DeploymentEnv, ANCHOR_FILE_BLURB, UNIT_HOME_PROPERTY};
use crate::lifecycle::error::{DeploymentError, InitError, InstallError, StartError, StopError};
use crate::lifecycle::shutdown::ShutdownTimeout;
use crate::lifecycle::state::UnitState;
use crate::lifecycle::watcher::{ChangeHandler, HotReloadWatcher, WatchedResource};
use crate::notification::{LifecycleEventKind, SubscriptionHandle};
use crate::observability::metrics;
use crate::runtime::{
    BuilderArgs, ConfigurationBuilder, PropertiesBuilder, RuntimeContext, UnitOverrides, ANNOTATIONS_BUILDER,
    ANNOTATIONS_LIBRARY,
};

/// A watcher plus its registration on the runtime's notifications.
struct ReloadSubscription {
    watcher: Arc<HotReloadWatcher>,
    handle: SubscriptionHandle,
}

impl ReloadSubscription {
    fn release(self) {
        self.watcher.cancel();
        self.handle.unsubscribe();
    }
}

/// State machine driving one unit through install, init, start, stop and dispose.
pub struct LifecycleController {
    unit_name: String,
    env: Arc<DeploymentEnv>,
    reload_hook: Option<Weak<dyn ChangeHandler>>,
    descriptor: Option<Descriptor>,
    resource_paths: Vec<PathBuf>,
    isolation: Option<Arc<IsolationContext>>,
    runtime: Option<Arc<dyn RuntimeContext>>,
    reload: Option<ReloadSubscription>,
    state: UnitState,
}

impl LifecycleController {
    pub fn new(unit_name: impl Into<String>, env: Arc<DeploymentEnv>) -> Self {
        Self {
            unit_name: unit_name.into(),
            env,
            reload_hook: None,
            descriptor: None,
            resource_paths: Vec::new(),
            isolation: None,
            runtime: None,
            reload: None,
            state: UnitState::Uninstalled,
        }
    }

    /// Where hot redeploy requests go. Without a hook, redeploy-enabled
    /// descriptors are initialised without a watcher.
    pub fn with_reload_hook(mut self, hook: Weak<dyn ChangeHandler>) -> Self {
        self.reload_hook = Some(hook);
        self
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn env(&self) -> &Arc<DeploymentEnv> {
        &self.env
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_ref()
    }

    /// Absolute paths of the config resources resolved by the last install.
    pub fn resource_paths(&self) -> &[PathBuf] {
        &self.resource_paths
    }

    pub fn isolation(&self) -> Option<&Arc<IsolationContext>> {
        self.isolation.as_ref()
    }

    pub fn runtime(&self) -> Option<&Arc<dyn RuntimeContext>> {
        self.runtime.as_ref()
    }

    pub fn marker_path(&self) -> PathBuf {
        self.env.marker_path(&self.unit_name)
    }

    /// Whether a hot reload watcher is registered for the current runtime.
    pub fn is_watching(&self) -> bool {
        self.reload.is_some()
    }

    pub fn install(&mut self) -> Result<(), InstallError> {
        tracing::info!(unit = %self.unit_name, "Installing deployment unit");
        // A failed install must not leave the previous context behind.
        self.isolation = None;

        let descriptor = self.env.descriptors().fetch(&self.unit_name)?;
        if descriptor.config_resources.is_empty() {
            return Err(InstallError::NoConfigResources {
                unit: self.unit_name.clone(),
            });
        }

        let mut resource_paths = Vec::with_capacity(descriptor.config_resources.len());
        for resource in &descriptor.config_resources {
            let Some(path) = self.env.resolve_resource(&self.unit_name, resource) else {
                return Err(InstallError::ResourceNotFound {
                    unit: self.unit_name.clone(),
                    path: PathBuf::from(resource),
                });
            };
            resource_paths.push(self.absolute_resource(path)?);
        }

        let isolation = self
            .env
            .isolation()
            .create(&self.unit_name, descriptor.domain.as_deref())?;

        self.descriptor = Some(descriptor);
        self.resource_paths = resource_paths;
        self.isolation = Some(isolation);
        self.transition(UnitState::Installed);
        Ok(())
    }

    fn absolute_resource(&self, path: PathBuf) -> Result<PathBuf, InstallError> {
        match fs::canonicalize(&path) {
            Ok(absolute) if absolute.is_file() => Ok(absolute),
            Ok(_) => Err(InstallError::ResourceNotFound {
                unit: self.unit_name.clone(),
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(InstallError::ResourceNotFound {
                unit: self.unit_name.clone(),
                path,
            }),
            Err(source) => Err(InstallError::Io { path, source }),
        }
    }

    pub fn init(&mut self) -> Result<(), InitError> {
        tracing::info!(unit = %self.unit_name, "Initializing deployment unit");

        if self.runtime.is_some() {
            return Err(InitError::AlreadyInitialized {
                unit: self.unit_name.clone(),
            });
        }
        let (descriptor, isolation) = match (&self.descriptor, &self.isolation) {
            (Some(descriptor), Some(isolation)) => (descriptor, isolation),
            _ => {
                return Err(InitError::NotInstalled {
                    unit: self.unit_name.clone(),
                })
            }
        };

        let builders = self.env.builders();
        let builder_name = builders.select(descriptor.configuration_builder.as_deref());
        let args = BuilderArgs {
            resources: &self.resource_paths,
            isolation,
        };
        let primary = builders
            .instantiate(&builder_name, &args)
            .map_err(|source| InitError::Builder {
                builder: builder_name.clone(),
                source,
            })?;
        if primary.is_configured() {
            return Err(InitError::AlreadyConfigured { builder: builder_name });
        }

        // Properties go first: later builders may reference them.
        let mut properties = descriptor.properties.clone();
        properties.insert(
            UNIT_HOME_PROPERTY.to_string(),
            self.env.unit_home(&self.unit_name).display().to_string(),
        );
        let mut chain: Vec<Box<dyn ConfigurationBuilder>> = vec![Box::new(PropertiesBuilder::new(properties))];

        if isolation.can_see(ANNOTATIONS_LIBRARY) && builders.contains(ANNOTATIONS_BUILDER) {
            let annotations = builders
                .instantiate(ANNOTATIONS_BUILDER, &args)
                .map_err(|source| InitError::Builder {
                    builder: ANNOTATIONS_BUILDER.to_string(),
                    source,
                })?;
            chain.push(annotations);
        }
        chain.push(primary);

        let overrides = UnitOverrides {
            unit_name: self.unit_name.clone(),
            shutdown_timeout: descriptor
                .shutdown_timeout_ms
                .map(ShutdownTimeout::from_millis)
                .unwrap_or_else(|| self.env.shutdown_timeout()),
        };
        let runtime = self
            .env
            .runtimes()
            .create(chain, overrides)
            .map_err(|source| InitError::Runtime {
                unit: self.unit_name.clone(),
                source,
            })?;

        if descriptor.redeployment_enabled {
            self.reload = self.watch_for_changes(&runtime);
        }
        self.runtime = Some(runtime);
        self.transition(UnitState::Initialized);
        Ok(())
    }

    /// Subscribe a watcher on the first config resource to the runtime's
    /// notifications: polling starts on STARTED and is cancelled on STOPPING.
    fn watch_for_changes(&self, runtime: &Arc<dyn RuntimeContext>) -> Option<ReloadSubscription> {
        let Some(hook) = self.reload_hook.clone() else {
            tracing::debug!(unit = %self.unit_name, "No reload hook, hot redeploy unavailable");
            return None;
        };
        let resource = self.resource_paths.first()?;

        tracing::info!(unit = %self.unit_name, resource = %resource.display(), "Monitoring for hot redeploy");
        let watcher = Arc::new(HotReloadWatcher::new(
            &self.unit_name,
            WatchedResource::new(resource),
            self.env.reload_interval(),
            hook,
        ));

        let listener = watcher.clone();
        let handle = runtime.notifications().subscribe(move |event| match event.kind {
            LifecycleEventKind::Started => listener.schedule(),
            LifecycleEventKind::Stopping => listener.cancel(),
            _ => {}
        });

        Some(ReloadSubscription { watcher, handle })
    }

    pub async fn start(&mut self) -> Result<(), StartError> {
        let Some(runtime) = self.runtime.clone() else {
            return Err(StartError::NotInitialized {
                unit: self.unit_name.clone(),
            });
        };
        tracing::info!(unit = %self.unit_name, "Starting deployment unit");

        runtime.start().await.map_err(|source| StartError::Runtime {
            unit: self.unit_name.clone(),
            source,
        })?;

        let marker = self.marker_path();
        write_marker(&marker).map_err(|source| StartError::Marker {
            unit: self.unit_name.clone(),
            path: marker,
            source,
        })?;

        self.transition(UnitState::Started);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), StopError> {
        let Some(runtime) = self.runtime.clone() else {
            // Never initialised, maybe due to an earlier error.
            return Ok(());
        };
        if !runtime.is_started() {
            return Ok(());
        }
        tracing::info!(unit = %self.unit_name, "Stopping deployment unit");

        let result = runtime.stop().await;
        if let Some(reload) = self.reload.take() {
            reload.release();
        }
        result.map_err(|source| StopError {
            unit: self.unit_name.clone(),
            source,
        })?;

        self.transition(UnitState::Stopped);
        Ok(())
    }

    /// Tear the runtime down. The runtime reference and the isolation context
    /// are released even when the preceding stop fails; that failure is
    /// still returned.
    pub async fn dispose(&mut self) -> Result<(), StopError> {
        let Some(runtime) = self.runtime.clone() else {
            tracing::info!(unit = %self.unit_name, "Runtime not created, nothing to dispose of");
            return Ok(());
        };

        let stopped = if runtime.is_started() && !runtime.is_disposed() {
            self.stop().await
        } else {
            Ok(())
        };

        tracing::info!(unit = %self.unit_name, "Disposing deployment unit");
        runtime.dispose().await;
        self.runtime = None;
        if let Some(reload) = self.reload.take() {
            reload.release();
        }
        self.isolation = None;
        self.transition(UnitState::Disposed);
        stopped
    }

    /// Full teardown and rebuild: dispose, install, init, start.
    pub async fn redeploy(&mut self) -> Result<(), DeploymentError> {
        tracing::info!(unit = %self.unit_name, "Redeploying deployment unit");
        let started = Instant::now();
        self.transition(UnitState::Redeploying);

        let result = self.rebuild().await;
        metrics::record_redeploy(&self.unit_name, result.is_ok(), started);
        if let Err(e) = &result {
            tracing::error!(unit = %self.unit_name, error = %e, "Redeploy failed");
            // Failed before any step moved the state on: nothing is deployed.
            if self.state == UnitState::Redeploying {
                self.transition(UnitState::Disposed);
            }
        }
        result
    }

    async fn rebuild(&mut self) -> Result<(), DeploymentError> {
        self.dispose().await?;
        self.install()?;

        let span = match &self.isolation {
            Some(isolation) => tracing::info_span!("isolation", context = %isolation.id()),
            None => tracing::Span::none(),
        };
        async {
            self.init()?;
            self.start().await?;
            Ok::<(), DeploymentError>(())
        }
        .instrument(span)
        .await
    }

    fn transition(&mut self, next: UnitState) {
        tracing::debug!(unit = %self.unit_name, from = %self.state, to = %next, "State transition");
        self.state = next;
        metrics::record_transition(&self.unit_name, next);
    }
}

fn write_marker(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, ANCHOR_FILE_BLURB)
}
