//! Maven command-line invoker.

use super::{BuildError, BuildTool};
use crate::config::Settings;
use crate::runtime::Jdk;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, info_span, Instrument};

/// Lines of build output kept in error messages.
const OUTPUT_TAIL_LINES: usize = 40;

/// Runs `mvn` in batch mode with a per-JDK `JAVA_HOME`.
#[derive(Debug, Clone)]
pub struct MavenInvoker {
    executable: PathBuf,
    java_homes: BTreeMap<u8, PathBuf>,
    timeout: Duration,
}

impl MavenInvoker {
    /// Creates an invoker from run settings, resolving every known JDK home up front.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let java_homes = Jdk::all()
            .iter()
            .filter_map(|jdk| {
                settings
                    .jdk_home(jdk.major())
                    .map(|home| (jdk.major(), home))
            })
            .collect();
        Self {
            executable: settings.maven_executable(),
            java_homes,
            timeout: settings.build_timeout,
        }
    }

    /// Checks that Maven can be started.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Unavailable`] when `mvn -v` fails.
    pub async fn validate(&self) -> Result<String, BuildError> {
        let output = Command::new(&self.executable)
            .arg("-v")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BuildError::Unavailable {
                message: format!("{}: {e}", self.executable.display()),
            })?;

        if !output.status.success() {
            return Err(BuildError::Unavailable {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or_default().to_string();
        debug!(version = %version, "Maven available");
        Ok(version)
    }

    fn java_home(&self, runtime: Jdk) -> Option<&Path> {
        self.java_homes.get(&runtime.major()).map(PathBuf::as_path)
    }
}

fn tail(output: &[u8]) -> String {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl BuildTool for MavenInvoker {
    async fn invoke(
        &self,
        checkout: &Path,
        runtime: Jdk,
        goal: &str,
        flags: &[String],
    ) -> Result<(), BuildError> {
        let span = info_span!("maven", goal, jdk = runtime.major());

        async {
            info!(path = %checkout.display(), "Running Maven goal. Please be patient");

            let mut command = Command::new(&self.executable);
            command
                .args(["-B", "-ntp"])
                .args(flags)
                .arg(goal)
                .current_dir(checkout)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(home) = self.java_home(runtime) {
                command.env("JAVA_HOME", home);
            }

            let output = tokio::time::timeout(self.timeout, command.output())
                .await
                .map_err(|_| BuildError::Timeout {
                    goal: goal.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })?
                .map_err(|e| BuildError::Spawn {
                    program: self.executable.display().to_string(),
                    source: e,
                })?;

            if !output.status.success() {
                let mut log = tail(&output.stdout);
                if log.trim().is_empty() {
                    log = tail(&output.stderr);
                }
                return Err(BuildError::GoalFailed {
                    goal: goal.to_string(),
                    jdk: runtime.major(),
                    code: output.status.code(),
                    output: log,
                });
            }

            info!("Done");
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_configured_java_homes() {
        let mut settings = Settings::default();
        settings.jdk_homes.insert(17, PathBuf::from("/opt/jdk-17"));
        settings.maven_home = Some(PathBuf::from("/opt/maven"));

        let maven = MavenInvoker::new(&settings);
        assert_eq!(maven.java_home(Jdk::Java17), Some(Path::new("/opt/jdk-17")));
        assert_eq!(maven.executable, PathBuf::from("/opt/maven/bin/mvn"));
    }

    #[test]
    fn keeps_output_tail() {
        let output: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let kept = tail(output.as_bytes());
        assert!(kept.starts_with("line 60"));
        assert!(kept.ends_with("line 99"));
    }

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let settings = Settings {
            maven_home: Some(PathBuf::from("/nonexistent/maven")),
            ..Settings::default()
        };
        let maven = MavenInvoker::new(&settings);
        assert!(matches!(
            maven.validate().await,
            Err(BuildError::Unavailable { .. })
        ));
    }
}
