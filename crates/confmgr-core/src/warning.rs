//! Non-fatal configuration problems found while building the registry and
//! the object directory.

use std::path::PathBuf;
use thiserror::Error;

/// A configuration problem that degrades completeness without aborting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A client descriptor names a daemon with no capability implementation.
    #[error("no client implementation for {name}, skipping")]
    UnknownClient { name: String },

    /// The same client appears twice in the descriptor file.
    #[error("duplicate client descriptor for {name}, using port {port}")]
    DuplicateClient { name: String, port: u16 },

    /// An object's owner is not a registered client.
    #[error("object {object}: owner {owner} is not a registered client")]
    UnresolvedOwner { object: String, owner: String },

    /// One of an object's listeners is not a registered client.
    #[error("object {object}: listener {listener} is not a registered client")]
    UnresolvedListener { object: String, listener: String },

    /// An object descriptor file could not be parsed and was skipped.
    #[error("skipped object descriptor file {}: {reason}", .path.display())]
    MalformedObjectFile { path: PathBuf, reason: String },
}

/// Warnings collected while building the registry or directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    warnings: Vec<ConfigWarning>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ConfigWarning) {
        self.warnings.push(warning);
    }

    /// Appends every warning from another report.
    pub fn merge(&mut self, other: BuildReport) {
        self.warnings.extend(other.warnings);
    }

    /// Returns true if nothing went wrong.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl IntoIterator for BuildReport {
    type Item = ConfigWarning;
    type IntoIter = std::vec::IntoIter<ConfigWarning>;

    fn into_iter(self) -> Self::IntoIter {
        self.warnings.into_iter()
    }
}
