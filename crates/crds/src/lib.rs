//! Lab resource definitions
//!
//! Typed Kubernetes-style resources used by the lab-config tool:
//! - [`jumpstarter`]: control-plane kinds synced to a cluster (`Client`,
//!   `Exporter`, `ExporterAccessPolicy`);
//! - [`lab`]: repository-only kinds describing hosts, exporter instances,
//!   templates and control planes.
//!
//! Lab kinds implement [`templating::Templatable`], so any string field may
//! carry `$(vars.x)` / `$(params.x)` / `$(name)` placeholders.

pub mod jumpstarter;
pub mod lab;
pub mod references;

pub use jumpstarter::*;
pub use lab::*;
pub use references::*;
