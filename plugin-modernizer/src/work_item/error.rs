//! Unit-level error values.

use std::fmt;

/// A failure recorded against one plugin.
///
/// Recording never aborts the batch; the driver inspects the accumulated
/// errors between steps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UnitError {
    message: String,
    cause: Option<String>,
}

impl UnitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates an error keeping the rendered cause chain of `cause`.
    pub fn with_cause(message: impl Into<String>, cause: &dyn std::error::Error) -> Self {
        let mut rendered = cause.to_string();
        let mut source = cause.source();
        while let Some(inner) = source {
            let text = inner.to_string();
            if !rendered.contains(&text) {
                rendered.push_str(": ");
                rendered.push_str(&text);
            }
            source = inner.source();
        }
        Self {
            message: message.into(),
            cause: Some(rendered),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Message and cause on one line, for summaries.
    #[must_use]
    pub fn describe(&self) -> Describe<'_> {
        Describe(self)
    }
}

pub struct Describe<'a>(&'a UnitError);

impl fmt::Display for Describe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.cause {
            Some(cause) => write!(f, "{}: {}", self.0.message, cause),
            None => f.write_str(&self.0.message),
        }
    }
}
