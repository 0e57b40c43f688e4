//! The control-plane context object.
//!
//! `ControlPlane` is created once at startup and passed by reference to
//! whatever dispatches configuration requests. It owns the registry and the
//! directory built from it.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use confmgr_core::{BuildReport, CapabilityCatalog};

use crate::config::DaemonConfig;
use crate::directory::{DirectoryError, ObjectDirectory, ObjectEntry};
use crate::registry::{ClientRegistry, RegistryError};

/// Errors that stop the control plane from starting.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Registry and directory, built in that order.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    registry: Arc<ClientRegistry>,
    directory: Arc<ObjectDirectory>,
    report: BuildReport,
}

impl ControlPlane {
    /// Builds the registry from `config.client_file`, then the directory
    /// from `config.object_files`.
    ///
    /// Warnings from both steps are kept in [`report`](Self::report).
    pub fn initialize(
        config: &DaemonConfig,
        catalog: &CapabilityCatalog,
        cancel_token: CancellationToken,
    ) -> Result<Self, InitError> {
        let (registry, mut report) = ClientRegistry::build(
            &config.client_file,
            catalog,
            config.retry_policy(),
            cancel_token,
        )?;
        let (directory, directory_report) = ObjectDirectory::build(&config.object_files, &registry)?;
        report.merge(directory_report);

        for warning in report.warnings() {
            warn!(%warning, "Configuration warning");
        }
        info!(
            clients = registry.len(),
            objects = directory.len(),
            warnings = report.len(),
            "Control plane initialized"
        );

        Ok(Self {
            registry: Arc::new(registry),
            directory: Arc::new(directory),
            report,
        })
    }

    /// Assembles a control plane from parts built elsewhere.
    pub fn from_parts(
        registry: Arc<ClientRegistry>,
        directory: Arc<ObjectDirectory>,
        report: BuildReport,
    ) -> Self {
        Self {
            registry,
            directory,
            report,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<ObjectDirectory> {
        &self.directory
    }

    /// Configuration warnings collected while building.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Ownership of `object_type`, if any file defined it.
    pub fn lookup(&self, object_type: &str) -> Option<&ObjectEntry> {
        self.directory.get(object_type)
    }

    /// True once every client has connected at least once.
    pub fn is_ready(&self) -> bool {
        self.registry.is_ready()
    }
}
