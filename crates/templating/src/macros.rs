/// Implement [`Templatable`](crate::Templatable) for a struct by listing its
/// renderable fields.
///
/// ```
/// use templating::templatable;
///
/// struct Ssh { host: String, user: Option<String>, port: Option<u16> }
/// templatable!(Ssh { host, user, port });
/// ```
///
/// Resources with `metadata: ObjectMeta` and `spec` fields use the `resource`
/// form, which also exposes `metadata.name` as `$(name)`:
///
/// ```ignore
/// templatable!(resource ExporterHost);
/// ```
#[macro_export]
macro_rules! templatable {
    (resource $ty:ty) => {
        impl $crate::Templatable for $ty {
            fn render_with(
                &mut self,
                ctx: &$crate::RenderContext<'_>,
            ) -> ::std::result::Result<(), $crate::TemplateError> {
                $crate::Templatable::render_with(&mut self.metadata, ctx)
                    .map_err(|e| e.in_field("metadata"))?;
                $crate::Templatable::render_with(&mut self.spec, ctx)
                    .map_err(|e| e.in_field("spec"))?;
                Ok(())
            }

            fn template_name(&self) -> ::std::option::Option<::std::string::String> {
                self.metadata.name.clone()
            }
        }
    };
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Templatable for $ty {
            #[allow(unused_variables, reason = "structs without string fields")]
            fn render_with(
                &mut self,
                ctx: &$crate::RenderContext<'_>,
            ) -> ::std::result::Result<(), $crate::TemplateError> {
                $(
                    $crate::Templatable::render_with(&mut self.$field, ctx)
                        .map_err(|e| e.in_field(stringify!($field)))?;
                )*
                Ok(())
            }
        }
    };
}
