//! Object ownership directory.
//!
//! Maps each configuration object type to the client that owns it and the
//! clients that listen for changes to it. Built once from descriptor files
//! after the registry exists, then never modified.
//!
//! Owner and listener names that are not in the registry resolve to `None`.
//! Dispatchers must treat `None` as undeliverable.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Malformed descriptor files are reported, not fatal

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use confmgr_core::{Access, BuildReport, ConfigWarning};
use confmgr_protocol::{parse_object_descriptors, ObjectDescriptorMap, RawObjectDescriptor};

use crate::registry::{ClientHandle, ClientRegistry};

/// Errors that abort building the directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// An object descriptor file could not be read.
    #[error("failed to read object descriptors from {}: {source}", .path.display())]
    ReadDescriptors {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ownership of one object type.
#[derive(Clone)]
pub struct ObjectEntry {
    owner_name: String,
    owner: Option<Arc<ClientHandle>>,
    access: Access,
    listener_names: Vec<String>,
    listeners: Vec<Option<Arc<ClientHandle>>>,
}

impl ObjectEntry {
    fn resolve(descriptor: &RawObjectDescriptor, registry: &ClientRegistry) -> Self {
        Self {
            owner_name: descriptor.owner.clone(),
            owner: registry.get(&descriptor.owner).cloned(),
            access: descriptor.access,
            listener_names: descriptor.listeners.clone(),
            listeners: descriptor
                .listeners
                .iter()
                .map(|listener| registry.get(listener).cloned())
                .collect(),
        }
    }

    /// Warnings for the names in this entry that did not resolve.
    fn unresolved(&self, object: &str) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.owner.is_none() {
            warnings.push(ConfigWarning::UnresolvedOwner {
                object: object.to_string(),
                owner: self.owner_name.clone(),
            });
        }
        for (name, handle) in self.listener_names.iter().zip(&self.listeners) {
            if handle.is_none() {
                warnings.push(ConfigWarning::UnresolvedListener {
                    object: object.to_string(),
                    listener: name.clone(),
                });
            }
        }
        warnings
    }

    /// The owning client, or `None` if it is not registered.
    pub fn owner(&self) -> Option<&Arc<ClientHandle>> {
        self.owner.as_ref()
    }

    /// Owner name as written in the descriptor file.
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Listeners in descriptor order; `None` where the name did not resolve.
    pub fn listeners(&self) -> &[Option<Arc<ClientHandle>>] {
        &self.listeners
    }

    /// Listener names as written in the descriptor file.
    pub fn listener_names(&self) -> &[String] {
        &self.listener_names
    }

    /// Listeners that resolved to a registered client, in order.
    pub fn deliverable_listeners(&self) -> impl Iterator<Item = &Arc<ClientHandle>> {
        self.listeners.iter().flatten()
    }

    /// True if the owner and every listener resolved.
    pub fn is_fully_resolved(&self) -> bool {
        self.owner.is_some() && self.listeners.iter().all(Option::is_some)
    }
}

impl fmt::Debug for ObjectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectEntry")
            .field("owner", &self.owner_name)
            .field("access", &self.access)
            .field("listeners", &self.listener_names)
            .field("resolved", &self.is_fully_resolved())
            .finish()
    }
}

/// Object type name → ownership.
#[derive(Debug, Clone, Default)]
pub struct ObjectDirectory {
    entries: HashMap<String, ObjectEntry>,
}

impl ObjectDirectory {
    /// Builds the directory from descriptor files, in order.
    ///
    /// An object type defined in several files takes the entry from the
    /// last one; entries are replaced whole, never merged. A file that
    /// does not parse is skipped and reported.
    ///
    /// # Errors
    ///
    /// - `DirectoryError::ReadDescriptors` as soon as a file cannot be read
    pub fn build<P: AsRef<Path>>(
        files: &[P],
        registry: &ClientRegistry,
    ) -> Result<(Self, BuildReport), DirectoryError> {
        let mut directory = Self::default();
        let mut report = BuildReport::new();

        for file in files {
            let path = file.as_ref();
            let contents =
                fs::read_to_string(path).map_err(|source| DirectoryError::ReadDescriptors {
                    path: path.to_path_buf(),
                    source,
                })?;

            match parse_object_descriptors(&contents) {
                Ok(descriptors) => {
                    debug!(path = %path.display(), objects = descriptors.len(), "Read object descriptors");
                    directory.apply(&descriptors, registry);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed object descriptor file");
                    report.push(ConfigWarning::MalformedObjectFile {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        directory.report_unresolved(&mut report);
        info!(
            objects = directory.len(),
            warnings = report.len(),
            "Object directory built"
        );
        Ok((directory, report))
    }

    /// Builds the directory from already-parsed descriptor maps, in order.
    pub fn from_descriptors(
        maps: &[ObjectDescriptorMap],
        registry: &ClientRegistry,
    ) -> (Self, BuildReport) {
        let mut directory = Self::default();
        let mut report = BuildReport::new();
        for descriptors in maps {
            directory.apply(descriptors, registry);
        }
        directory.report_unresolved(&mut report);
        (directory, report)
    }

    fn apply(&mut self, descriptors: &ObjectDescriptorMap, registry: &ClientRegistry) {
        for (object, descriptor) in descriptors {
            debug!(
                object = %object,
                owner = %descriptor.owner,
                access = %descriptor.access,
                "Registering object owner"
            );
            let entry = ObjectEntry::resolve(descriptor, registry);
            if self.entries.insert(object.clone(), entry).is_some() {
                debug!(object = %object, "Object redefined, replacing earlier entry");
            }
        }
    }

    /// Reports unresolved names of the final entries, by object type.
    ///
    /// Runs once every file is applied, so names in entries a later file
    /// replaced are not reported.
    fn report_unresolved(&self, report: &mut BuildReport) {
        for object in self.object_types() {
            let Some(entry) = self.entries.get(object) else {
                continue;
            };
            for warning in entry.unresolved(object) {
                warn!(%warning, "Unresolved object reference");
                report.push(warning);
            }
        }
    }

    pub fn get(&self, object_type: &str) -> Option<&ObjectEntry> {
        self.entries.get(object_type)
    }

    /// The full mapping, for dispatchers.
    pub fn entries(&self) -> &HashMap<String, ObjectEntry> {
        &self.entries
    }

    /// Object type names, sorted.
    pub fn object_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Object types owned by `client`, sorted.
    pub fn owned_by(&self, client: &str) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.owner_name == client)
            .map(|(object, _)| object.as_str())
            .collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
