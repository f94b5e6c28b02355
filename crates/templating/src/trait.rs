//! Templatable trait
//!
//! Every type that can appear in a rendered object tree implements
//! [`Templatable`]. Strings are rendered; containers recurse; other scalars are
//! left untouched. Structs implement it with [`templatable!`](crate::templatable).

use crate::engine::RenderContext;
use crate::error::TemplateError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// An object whose string fields can be rendered in place
pub trait Templatable {
    /// Render every string reachable from `self`
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError>;

    /// Value exposed to templates as `$(name)`
    fn template_name(&self) -> Option<String> {
        None
    }
}

impl Templatable for String {
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
        *self = ctx.render(self)?;
        Ok(())
    }
}

impl<T: Templatable> Templatable for Option<T> {
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
        match self {
            Some(inner) => inner.render_with(ctx),
            None => Ok(()),
        }
    }

    fn template_name(&self) -> Option<String> {
        self.as_ref().and_then(Templatable::template_name)
    }
}

impl<T: Templatable + ?Sized> Templatable for Box<T> {
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
        (**self).render_with(ctx)
    }

    fn template_name(&self) -> Option<String> {
        (**self).template_name()
    }
}

impl<T: Templatable> Templatable for Vec<T> {
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
        for (index, item) in self.iter_mut().enumerate() {
            item.render_with(ctx)
                .map_err(|e| e.in_field(&format!("[{index}]")))?;
        }
        Ok(())
    }
}

impl<K: std::fmt::Display + Ord, T: Templatable> Templatable for BTreeMap<K, T> {
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
        for (key, value) in self.iter_mut() {
            value
                .render_with(ctx)
                .map_err(|e| e.in_field(&format!("[{key}]")))?;
        }
        Ok(())
    }
}

impl<K: std::fmt::Display, T: Templatable, S: BuildHasher> Templatable for HashMap<K, T, S> {
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
        for (key, value) in self.iter_mut() {
            value
                .render_with(ctx)
                .map_err(|e| e.in_field(&format!("[{key}]")))?;
        }
        Ok(())
    }
}

macro_rules! inert {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Templatable for $ty {
                fn render_with(&mut self, _ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
                    Ok(())
                }
            }
        )*
    };
}

inert!(bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

impl Templatable for ObjectMeta {
    fn render_with(&mut self, ctx: &RenderContext<'_>) -> Result<(), TemplateError> {
        self.name.render_with(ctx).map_err(|e| e.in_field("name"))?;
        self.namespace
            .render_with(ctx)
            .map_err(|e| e.in_field("namespace"))?;
        self.generate_name
            .render_with(ctx)
            .map_err(|e| e.in_field("generate_name"))?;
        self.labels.render_with(ctx).map_err(|e| e.in_field("labels"))?;
        self.annotations
            .render_with(ctx)
            .map_err(|e| e.in_field("annotations"))?;
        Ok(())
    }

    fn template_name(&self) -> Option<String> {
        self.name.clone()
    }
}
