//! Client identity.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of a subsystem daemon (e.g. "bgpd", "vland").
///
/// The name is the identity of a client handle: the registry holds at most
/// one handle per name, and descriptor files refer to clients by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientName(String);

impl ClientName {
    /// Creates a new ClientName from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClientName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ClientName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets `HashMap<ClientName, _>` be queried with a plain `&str`.
impl Borrow<str> for ClientName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
