//! Build tool error types.

/// Errors that can occur while invoking the build tool.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build tool could not be started.
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The goal ran and failed.
    #[error("Goal '{goal}' failed with JDK {jdk} (exit code {code:?}): {output}")]
    GoalFailed {
        goal: String,
        jdk: u8,
        code: Option<i32>,
        output: String,
    },

    /// The goal did not finish in time.
    #[error("Goal '{goal}' timed out after {timeout_secs} seconds")]
    Timeout { goal: String, timeout_secs: u64 },

    /// The build tool is missing or too old.
    #[error("Maven is not usable: {message}")]
    Unavailable { message: String },
}
