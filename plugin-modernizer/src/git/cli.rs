//! `VersionControl` over the git executable.

use super::{DiffStats, GitError, Signature, VersionControl, WorkingTreeStatus};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// stderr fragments meaning the remote refused our credentials.
const AUTH_FAILURES: [&str; 5] = [
    "Permission denied (publickey",
    "Authentication failed",
    "Host key verification failed",
    "could not read Username",
    "terminal prompts disabled",
];

struct GitOutput {
    stdout: String,
    stderr: String,
}

/// Runs git commands, optionally with a dedicated SSH key.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    ssh_key: Option<PathBuf>,
}

impl GitCli {
    #[must_use]
    pub fn new(ssh_key: Option<PathBuf>) -> Self {
        Self { ssh_key }
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new("git");
        command
            .current_dir(path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(key) = &self.ssh_key {
            command.env(
                "GIT_SSH_COMMAND",
                format!(
                    "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
                    key.display()
                ),
            );
        }
        command
    }

    /// Runs a git command and returns its output.
    async fn run_git_command(&self, path: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
        self.run_with(self.command(path), args).await
    }

    async fn run_with(&self, mut command: Command, args: &[&str]) -> Result<GitOutput, GitError> {
        let shown = args.join(" ");
        debug!(command = %shown, "Running git");

        let output = command
            .args(args)
            .output()
            .await
            .map_err(|e| GitError::Spawn {
                command: shown.clone(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let stderr = stderr.trim().to_string();
            if AUTH_FAILURES.iter().any(|marker| stderr.contains(marker)) {
                return Err(GitError::Authentication {
                    command: shown,
                    stderr,
                });
            }
            return Err(GitError::CommandFailed {
                command: shown,
                stderr,
            });
        }

        Ok(GitOutput { stdout, stderr })
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_repository(&self, url: &str, destination: &Path) -> Result<(), GitError> {
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        let target = destination.display().to_string();
        self.run_git_command(parent, &["clone", url, &target])
            .await?;
        Ok(())
    }

    async fn set_remote_url(&self, repo: &Path, remote: &str, url: &str) -> Result<(), GitError> {
        self.run_git_command(repo, &["remote", "set-url", remote, url])
            .await?;
        Ok(())
    }

    async fn fetch(&self, repo: &Path, remote: &str) -> Result<(), GitError> {
        self.run_git_command(repo, &["fetch", "--prune", remote])
            .await?;
        Ok(())
    }

    async fn reset_hard(&self, repo: &Path, target: &str) -> Result<(), GitError> {
        self.run_git_command(repo, &["reset", "--hard", target])
            .await?;
        Ok(())
    }

    async fn clean(&self, repo: &Path) -> Result<(), GitError> {
        self.run_git_command(repo, &["clean", "-fd"]).await?;
        Ok(())
    }

    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        self.run_git_command(repo, &["checkout", branch]).await?;
        Ok(())
    }

    async fn reset_branch(
        &self,
        repo: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError> {
        self.run_git_command(repo, &["checkout", "-B", branch, start_point])
            .await?;
        Ok(())
    }

    async fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, GitError> {
        let reference = format!("refs/heads/{branch}");
        let output = self
            .run_git_command(repo, &["branch", "--list", branch, "--format=%(refname)"])
            .await?;
        Ok(output.stdout.lines().any(|line| line.trim() == reference))
    }

    async fn create_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        self.run_git_command(repo, &["checkout", "-b", branch])
            .await?;
        Ok(())
    }

    async fn status(&self, repo: &Path) -> Result<WorkingTreeStatus, GitError> {
        let output = self
            .run_git_command(
                repo,
                &[
                    "-c",
                    "core.quotepath=off",
                    "status",
                    "--porcelain=v1",
                    "--untracked-files=all",
                ],
            )
            .await?;
        Ok(WorkingTreeStatus::parse_porcelain(&output.stdout))
    }

    async fn stage_all(&self, repo: &Path) -> Result<(), GitError> {
        self.run_git_command(repo, &["add", "--all"]).await?;
        Ok(())
    }

    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        author: &Signature,
        signing_key: Option<&Path>,
    ) -> Result<(), GitError> {
        let mut command = self.command(repo);
        command
            .env("GIT_AUTHOR_NAME", &author.name)
            .env("GIT_AUTHOR_EMAIL", &author.email)
            .env("GIT_COMMITTER_NAME", &author.name)
            .env("GIT_COMMITTER_EMAIL", &author.email);

        let key;
        let mut args: Vec<&str> = Vec::new();
        if let Some(signing_key) = signing_key {
            key = format!("user.signingkey={}", signing_key.display());
            args.extend(["-c", "gpg.format=ssh", "-c", key.as_str(), "commit", "-S"]);
        } else {
            args.extend(["commit", "--no-gpg-sign"]);
        }
        args.extend(["-m", message]);

        self.run_with(command, &args).await?;
        Ok(())
    }

    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<String, GitError> {
        let refspec = format!("{branch}:{branch}");
        let output = self
            .run_git_command(repo, &["push", "--force", "--porcelain", remote, &refspec])
            .await?;
        Ok(format!("{}{}", output.stdout, output.stderr))
    }

    async fn diff_stats(&self, repo: &Path, base: Option<&str>) -> Result<DiffStats, GitError> {
        let output = match base {
            Some(base) => {
                self.run_git_command(repo, &["diff", "--numstat", base, "HEAD"])
                    .await?
            }
            None => self.run_git_command(repo, &["diff", "--numstat"]).await?,
        };
        Ok(DiffStats::parse_numstat(&output.stdout))
    }
}
