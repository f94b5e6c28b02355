//! Lab templating
//!
//! Renders `$(vars.key)`, `$(params.key)` and `$(name)` placeholders across
//! typed object trees. See [`TemplateEngine`] for resolution rules and
//! [`templatable!`] for deriving [`Templatable`] on resource types.
//!
//! # Example
//!
//! ```no_run
//! use lab_vars::VariableStore;
//! use std::sync::Arc;
//! use templating::{ParameterSet, TemplateEngine};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TemplateEngine::new(Arc::new(VariableStore::new(None)), None);
//! let params = ParameterSet::from_map("exporter", [("namespace", "lab")]);
//! let rendered = engine.render_str("ns=$(params.namespace)", Some(&params), None)?;
//! assert_eq!(rendered, "ns=lab");
//! # Ok(())
//! # }
//! ```

mod macros;

pub mod engine;
pub mod error;
pub mod parameters;
#[path = "trait.rs"]
pub mod templatable;

pub use engine::{has_placeholders, RenderContext, TemplateEngine, RECURSION_LIMIT};
pub use error::TemplateError;
pub use parameters::ParameterSet;
pub use templatable::Templatable;
