//! Template renderer.

use super::TemplateError;
use crate::config::Recipe;
use crate::work_item::WorkItem;
use bstr::ByteSlice;
use handlebars::{no_escape, Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde_json::{json, Value};

/// Creates a configured Handlebars registry with custom helpers.
///
/// The registry is configured with:
/// - No HTML escaping (for markdown output)
/// - Strict mode (catches missing variables)
/// - `eq` helper for equality comparisons
#[must_use]
pub fn create_handlebars_registry() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();

    // Markdown output
    hbs.register_escape_fn(no_escape);
    hbs.set_strict_mode(true);
    hbs.register_helper("eq", Box::new(eq_helper));

    hbs
}

/// Usage: `{{#if (eq effective_baseline "2.479")}}...{{/if}}`
fn eq_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param1 = h.param(0).and_then(|v| v.value().as_str());
    let param2 = h.param(1).and_then(|v| v.value().as_str());

    let result = match (param1, param2) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };

    out.write(if result { "true" } else { "" })?;
    Ok(())
}

/// Renders the plugin repository texts of a recipe.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlebars: create_handlebars_registry(),
        }
    }

    /// Renders the working branch name and checks it is a valid git reference.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidBranch`] when the result cannot name a branch.
    pub fn render_branch_name(
        &self,
        recipe: &Recipe,
        item: &WorkItem,
    ) -> Result<String, TemplateError> {
        let branch = self.render(&recipe.branch_name_format, recipe, item)?;
        let branch = branch.trim().to_string();
        if branch.is_empty() {
            return Err(TemplateError::InvalidBranch {
                branch,
                message: "branch name is empty".to_string(),
            });
        }
        gix_validate::reference::name_partial(branch.as_bytes().as_bstr()).map_err(|e| {
            TemplateError::InvalidBranch {
                branch: branch.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(branch)
    }

    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_commit_title(
        &self,
        recipe: &Recipe,
        item: &WorkItem,
    ) -> Result<String, TemplateError> {
        Ok(self
            .render(&recipe.commit_title_format, recipe, item)?
            .trim()
            .to_string())
    }

    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_pr_title(&self, recipe: &Recipe, item: &WorkItem) -> Result<String, TemplateError> {
        Ok(self
            .render(&recipe.pr_title_format, recipe, item)?
            .trim()
            .to_string())
    }

    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_pr_body(&self, recipe: &Recipe, item: &WorkItem) -> Result<String, TemplateError> {
        self.render(&recipe.pr_body_template, recipe, item)
    }

    fn render(
        &self,
        template: &str,
        recipe: &Recipe,
        item: &WorkItem,
    ) -> Result<String, TemplateError> {
        let data = template_data(recipe, item);
        Ok(self.handlebars.render_template(template, &data)?)
    }
}

fn template_data(recipe: &Recipe, item: &WorkItem) -> Value {
    json!({
        "plugin_name": item.name(),
        "recipe_id": recipe.id,
        "recipe_short_id": recipe.short_id(),
        "recipe_name": recipe.name,
        "recipe_description": recipe.description,
        "documentation": recipe.documentation.as_deref().unwrap_or(""),
        "jenkins_version": item.platform_version().unwrap_or(""),
        "effective_baseline": item.effective_baseline().unwrap_or(""),
    })
}
