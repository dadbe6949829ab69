//! Run configuration, recipe catalogue and credentials.
//!
//! Settings are assembled once at startup from built-in defaults, an optional
//! `modernizer.toml` file and command-line flags. Recipes describe the
//! transformation applied to every plugin of a run.

mod credentials;
mod error;
mod recipe;
mod settings;

pub use credentials::{Credentials, GitAuth};
pub use error::ConfigError;
pub use recipe::{
    default_branch_name_format, default_commit_title_format, default_pr_body_template,
    default_pr_title_format, Recipe, RecipeBook,
};
pub use settings::{DuplicatePrStrategy, Settings, SettingsFile};
