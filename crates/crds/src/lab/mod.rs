//! Lab-config resources (`meta.jumpstarter.dev/v1alpha1`)
//!
//! These kinds only live in the lab configuration repository; they are loaded,
//! rendered and turned into control-plane objects and host files but never
//! written to a cluster themselves.

pub mod exporter_config_template;
pub mod exporter_host;
pub mod exporter_instance;
pub mod jumpstarter_instance;
pub mod physical_location;

pub use exporter_config_template::*;
pub use exporter_host::*;
pub use exporter_instance::*;
pub use jumpstarter_instance::*;
pub use physical_location::*;

/// API group of the lab-config resources
pub const LAB_CONFIG_GROUP: &str = "meta.jumpstarter.dev";
