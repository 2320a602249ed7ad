//! Runtime context contract and the default in-process runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::lifecycle::shutdown::{Dispatcher, ShutdownCoordinator, ShutdownTimeout};
use crate::notification::{LifecycleEvent, LifecycleEventKind, NotificationHub};
use crate::runtime::builder::{BuilderError, ConfigurationBuilder, RuntimeConfiguration};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("configuration failed: {0}")]
    Builder(#[from] BuilderError),
    #[error("runtime for unit '{0}' has been disposed")]
    Disposed(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Unit-specific settings applied on top of what the builders produce.
#[derive(Debug, Clone)]
pub struct UnitOverrides {
    pub unit_name: String,
    pub shutdown_timeout: ShutdownTimeout,
}

/// The running instance of one deployment unit.
#[async_trait]
pub trait RuntimeContext: Send + Sync {
    fn unit_name(&self) -> &str;

    fn notifications(&self) -> &NotificationHub;

    fn configuration(&self) -> &RuntimeConfiguration;

    /// Entry point for asynchronous work that a stop will drain.
    fn dispatcher(&self) -> Dispatcher;

    fn is_started(&self) -> bool;

    fn is_disposed(&self) -> bool;

    async fn start(&self) -> Result<(), RuntimeError>;

    /// Stop, waiting for in-flight work as bounded by the shutdown timeout.
    async fn stop(&self) -> Result<(), RuntimeError>;

    async fn dispose(&self);
}

/// Builds a runtime from an ordered builder chain.
pub trait RuntimeContextFactory: Send + Sync {
    fn create(
        &self,
        builders: Vec<Box<dyn ConfigurationBuilder>>,
        overrides: UnitOverrides,
    ) -> Result<Arc<dyn RuntimeContext>, RuntimeError>;
}

/// Applies the builder chain and returns a [`DefaultRuntime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRuntimeFactory;

impl RuntimeContextFactory for DefaultRuntimeFactory {
    fn create(
        &self,
        builders: Vec<Box<dyn ConfigurationBuilder>>,
        overrides: UnitOverrides,
    ) -> Result<Arc<dyn RuntimeContext>, RuntimeError> {
        let mut config = RuntimeConfiguration::default();
        for mut builder in builders {
            builder.configure(&mut config)?;
            config.record_builder(builder.name());
            tracing::debug!(unit = %overrides.unit_name, builder = %builder.name(), "Builder applied");
        }

        Ok(Arc::new(DefaultRuntime::new(config, overrides)))
    }
}

/// In-process runtime: lifecycle flags, notifications, and drained work dispatch.
pub struct DefaultRuntime {
    unit_name: String,
    config: RuntimeConfiguration,
    hub: NotificationHub,
    coordinator: ShutdownCoordinator,
    started: AtomicBool,
    disposed: AtomicBool,
}

impl DefaultRuntime {
    pub fn new(config: RuntimeConfiguration, overrides: UnitOverrides) -> Self {
        let coordinator = ShutdownCoordinator::new(&overrides.unit_name, overrides.shutdown_timeout);
        // Nothing is accepted before the first start.
        coordinator.close();
        Self {
            unit_name: overrides.unit_name,
            config,
            hub: NotificationHub::new(),
            coordinator,
            started: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    fn publish(&self, kind: LifecycleEventKind) {
        self.hub.publish(&LifecycleEvent::new(kind, &self.unit_name));
    }
}

#[async_trait]
impl RuntimeContext for DefaultRuntime {
    fn unit_name(&self) -> &str {
        &self.unit_name
    }

    fn notifications(&self) -> &NotificationHub {
        &self.hub
    }

    fn configuration(&self) -> &RuntimeConfiguration {
        &self.config
    }

    fn dispatcher(&self) -> Dispatcher {
        self.coordinator.dispatcher()
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<(), RuntimeError> {
        if self.is_disposed() {
            return Err(RuntimeError::Disposed(self.unit_name.clone()));
        }
        if self.is_started() {
            return Ok(());
        }

        self.publish(LifecycleEventKind::Starting);
        self.coordinator.resume();
        self.started.store(true, Ordering::SeqCst);
        self.publish(LifecycleEventKind::Started);
        Ok(())
    }

    async fn stop(&self) -> Result<(), RuntimeError> {
        if !self.is_started() {
            return Ok(());
        }

        self.publish(LifecycleEventKind::Stopping);
        self.coordinator.drain().await;
        self.started.store(false, Ordering::SeqCst);
        self.publish(LifecycleEventKind::Stopped);
        Ok(())
    }

    async fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        if self.is_started() {
            // Stopping the default runtime cannot fail.
            let _ = self.stop().await;
        }

        self.publish(LifecycleEventKind::Disposing);
        self.disposed.store(true, Ordering::SeqCst);
        self.publish(LifecycleEventKind::Disposed);
        self.hub.clear();
    }
}
