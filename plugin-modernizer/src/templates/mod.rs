//! Recipe text rendering using Handlebars.
//!
//! Branch names, commit titles and pull request texts of the plugin
//! repository come from the recipe's formats. Every format sees the same data:
//! `plugin_name`, `recipe_id`, `recipe_short_id`, `recipe_name`,
//! `recipe_description`, `documentation`, `jenkins_version` and
//! `effective_baseline` (the last three empty when unknown).

mod error;
mod renderer;

pub use error::TemplateError;
pub use renderer::{create_handlebars_registry, TemplateRenderer};
