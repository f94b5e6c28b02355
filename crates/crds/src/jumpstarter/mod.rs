//! Jumpstarter control-plane resources (`jumpstarter.dev/v1alpha1`)
//!
//! Only the fields this tool reads or writes are modelled; anything else the
//! controller adds is preserved by never writing status.

pub mod access_policy;
pub mod client;
pub mod exporter;

pub use access_policy::*;
pub use client::*;
pub use exporter::*;

/// API group of the Jumpstarter control-plane resources
pub const JUMPSTARTER_GROUP: &str = "jumpstarter.dev";
