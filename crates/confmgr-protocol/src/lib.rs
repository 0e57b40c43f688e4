//! confmgr Protocol - Descriptor files and the daemon status feed
//!
//! This crate provides the on-disk descriptor formats read at startup
//! (client list, object ownership) and the line format of the status feed
//! reporting subsystem daemon lifecycle changes.

pub mod descriptor;
pub mod feed;

pub use descriptor::{
    parse_client_descriptors, parse_object_descriptors, DescriptorError, ObjectDescriptorMap,
    RawClientDescriptor, RawObjectDescriptor, CLIENT_HOST,
};
pub use feed::{parse_status_line, FeedParseError, RawStatusMessage, MAX_STATUS_LINE};
