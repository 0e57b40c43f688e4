//! Configuration object access levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A configuration object as forwarded to a subsystem daemon.
///
/// The object model belongs to the API layer; the registry only moves
/// objects around, so they stay untyped JSON here.
pub type ConfigObject = serde_json::Value;

/// Access level of a configuration object type.
///
/// Descriptor files in the field use single letters (`"r"`, `"w"`), so
/// those are accepted alongside the spelled-out forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    #[serde(rename = "read-only", alias = "r", alias = "ro", alias = "R")]
    ReadOnly,
    #[serde(rename = "read-write", alias = "w", alias = "rw", alias = "W")]
    ReadWrite,
}

impl Access {
    /// Returns true if objects of this type accept create/update/delete.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_accepts_short_forms() {
        let ro: Access = serde_json::from_str("\"r\"").unwrap();
        let rw: Access = serde_json::from_str("\"w\"").unwrap();
        assert_eq!(ro, Access::ReadOnly);
        assert_eq!(rw, Access::ReadWrite);
    }

    #[test]
    fn test_access_accepts_long_forms() {
        let ro: Access = serde_json::from_str("\"read-only\"").unwrap();
        let rw: Access = serde_json::from_str("\"read-write\"").unwrap();
        assert!(!ro.is_writable());
        assert!(rw.is_writable());
    }

    #[test]
    fn test_access_rejects_unknown() {
        assert!(serde_json::from_str::<Access>("\"append\"").is_err());
    }
}
