//! Parsing client and object descriptor files.
//!
//! Both files are JSON. Keys are capitalised in deployed files (`Name`,
//! `Owner`, ...) but lower-case keys are accepted too.

use std::collections::BTreeMap;

use confmgr_core::{Access, ClientName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host every subsystem daemon listens on.
pub const CLIENT_HOST: &str = "localhost";

/// Errors parsing a descriptor file.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("invalid descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One entry of the client descriptor file.
///
/// ```json
/// [{"Name": "bgpd", "Port": 10001}, {"Name": "vland", "Port": 10002}]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawClientDescriptor {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Port", alias = "port")]
    pub port: u16,
}

impl RawClientDescriptor {
    pub fn client_name(&self) -> ClientName {
        ClientName::new(self.name.as_str())
    }

    /// Address the client's capability is initialised with.
    pub fn address(&self) -> String {
        format!("{CLIENT_HOST}:{}", self.port)
    }
}

/// Ownership record for one object type.
///
/// ```json
/// {"Vlan": {"Owner": "vland", "Access": "w", "Listeners": ["bgpd"]}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObjectDescriptor {
    #[serde(rename = "Owner", alias = "owner")]
    pub owner: String,
    /// Missing access is treated as writable.
    #[serde(rename = "Access", alias = "access", default = "default_access")]
    pub access: Access,
    #[serde(rename = "Listeners", alias = "listeners", default)]
    pub listeners: Vec<String>,
}

fn default_access() -> Access {
    Access::ReadWrite
}

/// Object type name → ownership record, as read from one file.
pub type ObjectDescriptorMap = BTreeMap<String, RawObjectDescriptor>;

/// Parses the client descriptor file contents.
pub fn parse_client_descriptors(json: &str) -> Result<Vec<RawClientDescriptor>, DescriptorError> {
    Ok(serde_json::from_str(json)?)
}

/// Parses one object descriptor file's contents.
pub fn parse_object_descriptors(json: &str) -> Result<ObjectDescriptorMap, DescriptorError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_descriptors() {
        let json = r#"[
            {"Name": "bgpd", "Port": 10001},
            {"name": "vland", "port": 10002}
        ]"#;
        let clients = parse_client_descriptors(json).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].client_name().as_str(), "bgpd");
        assert_eq!(clients[0].address(), "localhost:10001");
        assert_eq!(clients[1].name, "vland");
        assert_eq!(clients[1].port, 10002);
    }

    #[test]
    fn test_parse_client_descriptors_rejects_bad_port() {
        let json = r#"[{"Name": "bgpd", "Port": -1}]"#;
        assert!(parse_client_descriptors(json).is_err());

        let json = r#"[{"Name": "bgpd", "Port": 70000}]"#;
        assert!(parse_client_descriptors(json).is_err());
    }

    #[test]
    fn test_parse_client_descriptors_rejects_non_array() {
        let err = parse_client_descriptors(r#"{"Name": "bgpd"}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid descriptor JSON"));
    }

    #[test]
    fn test_parse_object_descriptors() {
        let json = r#"{
            "Vlan": {"Owner": "vland", "Access": "w", "Listeners": ["bgpd", "arpd"]},
            "VlanState": {"Owner": "vland", "Access": "r"}
        }"#;
        let objects = parse_object_descriptors(json).unwrap();
        assert_eq!(objects.len(), 2);

        let vlan = &objects["Vlan"];
        assert_eq!(vlan.owner, "vland");
        assert_eq!(vlan.access, Access::ReadWrite);
        assert_eq!(vlan.listeners, vec!["bgpd".to_string(), "arpd".to_string()]);

        let state = &objects["VlanState"];
        assert_eq!(state.access, Access::ReadOnly);
        assert!(state.listeners.is_empty());
    }

    #[test]
    fn test_parse_object_descriptor_defaults_access() {
        let json = r#"{"BGPGlobal": {"owner": "bgpd"}}"#;
        let objects = parse_object_descriptors(json).unwrap();
        assert_eq!(objects["BGPGlobal"].access, Access::ReadWrite);
    }

    #[test]
    fn test_parse_object_descriptors_rejects_missing_owner() {
        let json = r#"{"Vlan": {"Access": "w"}}"#;
        assert!(parse_object_descriptors(json).is_err());
    }
}
