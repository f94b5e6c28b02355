//! Placeholder substitution
//!
//! Three namespaces are recognised inside `$( ... )`:
//! - `vars.<key>` reads the [`VariableStore`] (decrypting vault values),
//! - `params.<key>` reads the engine parameters merged with call parameters,
//! - any other key reads object metadata (`name`).
//!
//! Substituted values may themselves contain placeholders; resolution repeats
//! until the text is stable or [`RECURSION_LIMIT`] passes have run.

use crate::error::TemplateError;
use crate::parameters::ParameterSet;
use crate::templatable::Templatable;
use lab_vars::VariableStore;
use regex::{Captures, Regex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Maximum number of substitution passes over a single string
pub const RECURSION_LIMIT: usize = 10;

const VARS_PREFIX: &str = "vars.";
const PARAMS_PREFIX: &str = "params.";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\(\s*([^)]*?)\s*\)").expect("placeholder pattern is valid")
});

/// Whether the text contains any `$(...)` placeholder
pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

/// Renders typed objects against a variable store and optional base parameters
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    variables: Arc<VariableStore>,
    parameters: Option<ParameterSet>,
}

impl TemplateEngine {
    /// Create an engine
    pub fn new(variables: Arc<VariableStore>, parameters: Option<ParameterSet>) -> Self {
        Self {
            variables,
            parameters,
        }
    }

    /// Variable store backing `$(vars.x)`
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Shared handle to the variable store
    pub fn variables_handle(&self) -> Arc<VariableStore> {
        Arc::clone(&self.variables)
    }

    /// Render every string field of `obj` in place
    pub fn apply<T: Templatable + ?Sized>(&self, obj: &mut T) -> Result<(), TemplateError> {
        self.apply_inner(obj, None)
    }

    /// Render with extra parameters layered over the engine parameters
    pub fn apply_with_parameters<T: Templatable + ?Sized>(
        &self,
        obj: &mut T,
        parameters: &ParameterSet,
    ) -> Result<(), TemplateError> {
        self.apply_inner(obj, Some(parameters))
    }

    /// Render a single string
    pub fn render_str(
        &self,
        input: &str,
        parameters: Option<&ParameterSet>,
        meta: Option<&ParameterSet>,
    ) -> Result<String, TemplateError> {
        let ctx = RenderContext {
            variables: &self.variables,
            parameters: self.merged_parameters(parameters),
            meta: meta.cloned().unwrap_or_else(|| ParameterSet::new("meta")),
            resolved: RefCell::new(HashMap::new()),
        };
        ctx.render(input)
    }

    fn apply_inner<T: Templatable + ?Sized>(
        &self,
        obj: &mut T,
        parameters: Option<&ParameterSet>,
    ) -> Result<(), TemplateError> {
        let mut meta = ParameterSet::new("meta");
        if let Some(name) = obj.template_name() {
            meta.set("name", name);
        }
        let ctx = RenderContext {
            variables: &self.variables,
            parameters: self.merged_parameters(parameters),
            meta,
            resolved: RefCell::new(HashMap::new()),
        };
        obj.render_with(&ctx)
    }

    fn merged_parameters(&self, extra: Option<&ParameterSet>) -> ParameterSet {
        match (&self.parameters, extra) {
            (Some(base), Some(extra)) => base.merge(extra),
            (Some(base), None) => base.clone(),
            (None, Some(extra)) => extra.clone(),
            (None, None) => ParameterSet::new("empty"),
        }
    }
}

/// Per-call resolution state handed to [`Templatable::render_with`]
#[derive(Debug)]
pub struct RenderContext<'a> {
    variables: &'a VariableStore,
    parameters: ParameterSet,
    meta: ParameterSet,
    resolved: RefCell<HashMap<String, Option<String>>>,
}

impl RenderContext<'_> {
    /// Substitute all placeholders in `input`
    pub fn render(&self, input: &str) -> Result<String, TemplateError> {
        if !has_placeholders(input) {
            return Ok(input.to_string());
        }

        let mut data = input.to_string();
        for pass in 0..RECURSION_LIMIT {
            let mut nested: Option<(String, String)> = None;
            let mut failure: Option<TemplateError> = None;

            let replaced = PLACEHOLDER.replace_all(&data, |caps: &Captures<'_>| {
                let key = &caps[1];
                match self.lookup(key) {
                    Ok(Some(value)) => {
                        if has_placeholders(&value) {
                            nested = Some((key.to_string(), value.clone()));
                        }
                        value
                    }
                    Ok(None) => caps[0].to_string(),
                    Err(err) => {
                        failure.get_or_insert(err);
                        caps[0].to_string()
                    }
                }
            });
            let replaced = replaced.into_owned();
            if let Some(err) = failure {
                return Err(err);
            }
            data = replaced;

            match nested {
                None => break,
                Some((key, value)) if pass + 1 == RECURSION_LIMIT => {
                    return Err(TemplateError::RecursionLimitExceeded { key, value });
                }
                Some(_) => {}
            }
        }

        let mut keys: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&data) {
            let key = caps[1].to_string();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            Ok(data)
        } else {
            Err(TemplateError::UnresolvedPlaceholder { keys })
        }
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, TemplateError> {
        if let Some(cached) = self.resolved.borrow().get(key) {
            return Ok(cached.clone());
        }

        let value = if let Some(name) = key.strip_prefix(VARS_PREFIX) {
            if self.variables.has(name) {
                Some(
                    self.variables
                        .get(name)
                        .map_err(|source| TemplateError::Variable {
                            key: key.to_string(),
                            source,
                        })?,
                )
            } else {
                None
            }
        } else if let Some(name) = key.strip_prefix(PARAMS_PREFIX) {
            self.parameters.get(name).map(str::to_string)
        } else {
            self.meta.get(key).map(str::to_string)
        };

        self.resolved
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(value)
    }
}
