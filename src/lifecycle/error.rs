//! Lifecycle error taxonomy.
//!
//! Every failure reaches the caller with its original cause attached.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::isolation::IsolationConfigError;
use crate::runtime::{BuilderError, RuntimeError};

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("failed to fetch the deployment descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("descriptor for unit '{unit}' lists no config resources")]
    NoConfigResources { unit: String },
    #[error("config for unit '{unit}' not found: {path}")]
    ResourceNotFound { unit: String, path: PathBuf },
    #[error("failed to resolve config resource {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create isolation context: {0}")]
    Isolation(#[from] IsolationConfigError),
}

#[derive(Error, Debug)]
pub enum InitError {
    #[error("unit '{unit}' is not installed")]
    NotInstalled { unit: String },
    #[error("unit '{unit}' is already initialized")]
    AlreadyInitialized { unit: String },
    #[error("failed to load configuration builder '{builder}': {source}")]
    Builder {
        builder: String,
        #[source]
        source: BuilderError,
    },
    #[error("configuration builder '{builder}' is already configured")]
    AlreadyConfigured { builder: String },
    #[error("failed to create runtime for unit '{unit}': {source}")]
    Runtime {
        unit: String,
        #[source]
        source: RuntimeError,
    },
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("unit '{unit}' is not initialized")]
    NotInitialized { unit: String },
    #[error("failed to start unit '{unit}': {source}")]
    Runtime {
        unit: String,
        #[source]
        source: RuntimeError,
    },
    #[error("failed to write marker file {path} for unit '{unit}': {source}")]
    Marker {
        unit: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
#[error("failed to stop unit '{unit}': {source}")]
pub struct StopError {
    pub unit: String,
    #[source]
    pub source: RuntimeError,
}

/// Any lifecycle failure.
#[derive(Error, Debug)]
pub enum DeploymentError {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Stop(#[from] StopError),
}
