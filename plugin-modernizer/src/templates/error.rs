//! Template rendering error types.

/// Template rendering error.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Handlebars rendering error.
    #[error("Template rendering error: {0}")]
    RenderError(#[from] handlebars::RenderError),

    /// A rendered branch name is not a valid git reference.
    #[error("Invalid branch name '{branch}': {message}")]
    InvalidBranch { branch: String, message: String },
}
