//! Set of deployed units.

use std::sync::Arc;

use dashmap::DashMap;

use crate::lifecycle::{DeploymentEnv, DeploymentError, DeploymentUnit, StopError};

/// Deploys, tracks and undeploys units sharing one [`DeploymentEnv`].
pub struct UnitSupervisor {
    env: Arc<DeploymentEnv>,
    units: DashMap<String, DeploymentUnit>,
}

impl UnitSupervisor {
    pub fn new(env: DeploymentEnv) -> Self {
        Self {
            env: Arc::new(env),
            units: DashMap::new(),
        }
    }

    pub fn env(&self) -> &Arc<DeploymentEnv> {
        &self.env
    }

    /// Install, init and start `name`. A unit that fails is disposed and not tracked.
    pub async fn deploy(&self, name: &str) -> Result<DeploymentUnit, DeploymentError> {
        if let Some(existing) = self.get(name) {
            tracing::warn!(unit = %name, "Unit already deployed, redeploying");
            existing.redeploy().await?;
            return Ok(existing);
        }

        let unit = DeploymentUnit::new(name, self.env.clone());
        if let Err(e) = unit.deploy().await {
            tracing::error!(unit = %name, error = %e, "Deployment failed");
            if let Err(stop) = unit.dispose().await {
                tracing::warn!(unit = %name, error = %stop, "Cleanup after failed deployment did not stop cleanly");
            }
            return Err(e);
        }

        tracing::info!(unit = %name, "Unit deployed");
        self.units.insert(name.to_string(), unit.clone());
        Ok(unit)
    }

    /// Dispose `name` and forget it. Returns false if it was not deployed.
    pub async fn undeploy(&self, name: &str) -> Result<bool, StopError> {
        let Some((_, unit)) = self.units.remove(name) else {
            return Ok(false);
        };
        unit.dispose().await?;
        tracing::info!(unit = %name, "Unit undeployed");
        Ok(true)
    }

    pub async fn redeploy(&self, name: &str) -> Option<Result<(), DeploymentError>> {
        let unit = self.get(name)?;
        Some(unit.redeploy().await)
    }

    /// Undeploy every unit; failures are logged.
    pub async fn shutdown(&self) {
        for name in self.names() {
            if let Err(e) = self.undeploy(&name).await {
                tracing::error!(unit = %name, error = %e, "Unit did not stop cleanly");
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<DeploymentUnit> {
        self.units.get(name).map(|unit| unit.value().clone())
    }

    /// Deployed unit names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
