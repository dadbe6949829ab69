//! Recipe definitions and the recipe catalogue.

use super::ConfigError;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

const BUILTIN_RECIPES: &str = include_str!("recipes.toml");
const BUILTIN_ORIGIN: &str = "<built-in recipes.toml>";

/// A transformation applied to every plugin of a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Recipe {
    /// Fully-qualified recipe identifier.
    pub id: String,

    /// Human readable name, used in commit and pull request titles.
    pub name: String,

    /// What the recipe does.
    pub description: String,

    /// Advisory labels for the pull request.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Link to further documentation (optional).
    #[serde(default)]
    pub documentation: Option<String>,

    /// Handlebars format for branch names.
    #[serde(default = "default_branch_name_format")]
    pub branch_name_format: String,

    /// Handlebars format for commit titles.
    #[serde(default = "default_commit_title_format")]
    pub commit_title_format: String,

    /// Handlebars format for pull request titles.
    #[serde(default = "default_pr_title_format")]
    pub pr_title_format: String,

    /// Handlebars template for pull request bodies.
    #[serde(default = "default_pr_body_template")]
    pub pr_body_template: String,
}

pub fn default_branch_name_format() -> String {
    "plugin-modernizer/{{recipe_short_id}}".to_string()
}

pub fn default_commit_title_format() -> String {
    "{{recipe_name}}".to_string()
}

pub fn default_pr_title_format() -> String {
    "{{recipe_name}}".to_string()
}

pub fn default_pr_body_template() -> String {
    r#"Hello `{{plugin_name}}` developers! :wave:

This is an automated pull request created by the [Jenkins Plugin Modernizer](https://github.com/jenkins-infra/plugin-modernizer-tool) tool. The tool has applied the following recipe to modernize the plugin:

<details aria-label="Recipe details for {{recipe_name}}">
    <summary>{{recipe_name}}</summary>
    <p><em>{{recipe_id}}</em></p>
    <blockquote>{{recipe_description}}</blockquote>
</details>
{{#if documentation}}

More information: {{documentation}}
{{/if}}
"#
    .to_string()
}

impl Recipe {
    /// Last dotted segment of the identifier.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.rsplit('.').next().unwrap_or(&self.id)
    }

    /// Returns true if `id` names this recipe, either fully-qualified or short.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        self.id == id || self.short_id() == id
    }

    fn validate(&self, origin: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::ValidationError {
            path: origin.to_string(),
            message,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("recipe id cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(invalid(format!("recipe '{}' has an empty name", self.id)));
        }
        if self.description.trim().is_empty() {
            return Err(invalid(format!(
                "recipe '{}' has an empty description",
                self.id
            )));
        }
        if let Some(link) = &self.documentation {
            url::Url::parse(link).map_err(|e| {
                invalid(format!("recipe '{}' documentation is not a URL: {e}", self.id))
            })?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RecipeFile {
    #[serde(default, rename = "recipe")]
    recipes: Vec<Recipe>,
}

/// The set of recipes available to a run.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    recipes: Vec<Recipe>,
}

impl RecipeBook {
    /// Loads the recipes compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded catalogue is malformed.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(BUILTIN_RECIPES, BUILTIN_ORIGIN)
    }

    /// Loads additional recipes from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    /// Parses a recipe catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on TOML errors, invalid recipes or duplicate ids.
    pub fn parse(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: RecipeFile = toml::from_str(contents).map_err(|e| ConfigError::TomlError {
            path: origin.to_string(),
            source: e,
        })?;

        let mut book = Self::default();
        for recipe in file.recipes {
            recipe.validate(origin)?;
            book.insert(recipe, origin)?;
        }
        debug!(origin, count = book.recipes.len(), "Loaded recipes");
        Ok(book)
    }

    /// Merges `other` into this catalogue; later definitions win.
    pub fn extend(&mut self, other: RecipeBook) {
        for recipe in other.recipes {
            self.recipes.retain(|existing| existing.id != recipe.id);
            self.recipes.push(recipe);
        }
    }

    fn insert(&mut self, recipe: Recipe, origin: &str) -> Result<(), ConfigError> {
        if self.recipes.iter().any(|r| r.id == recipe.id) {
            return Err(ConfigError::ValidationError {
                path: origin.to_string(),
                message: format!("duplicate recipe id '{}'", recipe.id),
            });
        }
        self.recipes.push(recipe);
        Ok(())
    }

    /// Finds a recipe by fully-qualified or short id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRecipe`] when nothing matches.
    pub fn find(&self, id: &str) -> Result<&Recipe, ConfigError> {
        self.recipes
            .iter()
            .find(|r| r.matches(id))
            .ok_or_else(|| ConfigError::UnknownRecipe(id.to_string()))
    }

    /// Iterates over all recipes.
    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}
