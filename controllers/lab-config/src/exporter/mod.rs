//! Exporter rendering and host file sync

pub mod host;
pub mod redact;
pub mod remote;
pub mod template;
