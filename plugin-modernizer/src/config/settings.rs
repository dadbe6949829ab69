//! Run settings.

use super::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// What to do when an open pull request already exists for the same head and base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePrStrategy {
    /// Leave the existing pull request alone.
    #[default]
    Skip,
    /// Close the existing pull request and open a new one.
    Replace,
    /// Open a new pull request regardless.
    Ignore,
}

impl DuplicatePrStrategy {
    /// Returns the strategy name as used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Replace => "replace",
            Self::Ignore => "ignore",
        }
    }
}

impl FromStr for DuplicatePrStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "invalid duplicate PR strategy '{other}' (expected skip, replace or ignore)"
            )),
        }
    }
}

/// Optional on-disk configuration (`modernizer.toml`).
///
/// Every key is optional; unset keys fall back to [`Settings::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SettingsFile {
    pub cache_path: Option<PathBuf>,
    pub github_owner: Option<String>,
    pub source_organization: Option<String>,
    pub metadata_organization: Option<String>,
    pub metadata_repository: Option<String>,
    pub github_api_url: Option<String>,
    pub update_center_url: Option<String>,
    pub opt_out_plugins_url: Option<String>,
    pub ssh_private_key: Option<PathBuf>,
    pub duplicate_pr_strategy: Option<DuplicatePrStrategy>,
    pub draft: Option<bool>,
    pub fork_settle_delay_secs: Option<u64>,
    pub build_timeout_secs: Option<u64>,
    pub maven_home: Option<PathBuf>,
    /// JDK major version (as a string key) to `JAVA_HOME` directory.
    pub jdk_homes: BTreeMap<String, PathBuf>,
}

impl SettingsFile {
    /// Loads and parses a settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable or malformed.
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

        let file: Self = toml::from_str(&contents).map_err(|e| ConfigError::TomlError {
            path: path.display().to_string(),
            source: e,
        })?;
        file.validate(path)?;
        Ok(file)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        for (key, value) in [
            ("github-api-url", &self.github_api_url),
            ("update-center-url", &self.update_center_url),
            ("opt-out-plugins-url", &self.opt_out_plugins_url),
        ] {
            if let Some(value) = value {
                url::Url::parse(value).map_err(|e| ConfigError::ValidationError {
                    path: path.display().to_string(),
                    message: format!("{key} is not a valid URL: {e}"),
                })?;
            }
        }

        for major in self.jdk_homes.keys() {
            if major.parse::<u8>().is_err() {
                return Err(ConfigError::ValidationError {
                    path: path.display().to_string(),
                    message: format!("jdk-homes key '{major}' is not a JDK major version"),
                });
            }
        }

        Ok(())
    }
}

/// Immutable configuration of one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_path: PathBuf,
    /// Fork owner; `None` means the authenticated identity.
    pub github_owner: Option<String>,
    pub source_organization: String,
    pub metadata_organization: String,
    pub metadata_repository: String,
    pub github_api_url: String,
    pub update_center_url: String,
    pub opt_out_plugins_url: String,
    pub ssh_private_key: PathBuf,
    pub duplicate_pr_strategy: DuplicatePrStrategy,
    pub draft: bool,
    pub fork_settle_delay: Duration,
    pub build_timeout: Duration,
    pub maven_home: Option<PathBuf>,
    pub jdk_homes: BTreeMap<u8, PathBuf>,

    pub dry_run: bool,
    pub metadata_only: bool,
    pub skip_verification: bool,
    pub skip_metadata: bool,
    pub remove_forks: bool,
    pub allow_deprecated: bool,
    pub override_opt_out: bool,
    pub debug: bool,
}

pub const DEFAULT_SOURCE_ORGANIZATION: &str = "jenkinsci";
pub const DEFAULT_METADATA_ORGANIZATION: &str = "jenkins-infra";
pub const DEFAULT_METADATA_REPOSITORY: &str = "metadata-plugin-modernizer";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_UPDATE_CENTER_URL: &str =
    "https://updates.jenkins.io/current/update-center.actual.json";
pub const DEFAULT_OPT_OUT_PLUGINS_URL: &str =
    "https://raw.githubusercontent.com/jenkins-infra/metadata-plugin-modernizer/main/opt-out-plugins.json";

impl Default for Settings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let cache_path = dirs::cache_dir()
            .unwrap_or_else(|| home.join(".cache"))
            .join("jenkins-plugin-modernizer-cli");

        Self {
            cache_path,
            github_owner: env_owner(),
            source_organization: DEFAULT_SOURCE_ORGANIZATION.to_string(),
            metadata_organization: DEFAULT_METADATA_ORGANIZATION.to_string(),
            metadata_repository: DEFAULT_METADATA_REPOSITORY.to_string(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            update_center_url: DEFAULT_UPDATE_CENTER_URL.to_string(),
            opt_out_plugins_url: DEFAULT_OPT_OUT_PLUGINS_URL.to_string(),
            ssh_private_key: home.join(".ssh").join("id_rsa"),
            duplicate_pr_strategy: DuplicatePrStrategy::default(),
            draft: false,
            fork_settle_delay: Duration::from_secs(5),
            build_timeout: Duration::from_secs(3600),
            maven_home: None,
            jdk_homes: BTreeMap::new(),
            dry_run: false,
            metadata_only: false,
            skip_verification: false,
            skip_metadata: false,
            remove_forks: false,
            allow_deprecated: false,
            override_opt_out: false,
            debug: false,
        }
    }
}

fn env_owner() -> Option<String> {
    ["GH_OWNER", "GITHUB_OWNER"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

impl Settings {
    /// Builds settings from defaults overlaid with a settings file.
    #[must_use]
    pub fn from_file(file: SettingsFile) -> Self {
        let mut settings = Self::default();
        settings.apply(file);
        settings
    }

    /// Overlays the keys present in `file`.
    pub fn apply(&mut self, file: SettingsFile) {
        if let Some(path) = file.cache_path {
            self.cache_path = path;
        }
        if file.github_owner.is_some() {
            self.github_owner = file.github_owner;
        }
        if let Some(org) = file.source_organization {
            self.source_organization = org;
        }
        if let Some(org) = file.metadata_organization {
            self.metadata_organization = org;
        }
        if let Some(repo) = file.metadata_repository {
            self.metadata_repository = repo;
        }
        if let Some(url) = file.github_api_url {
            self.github_api_url = url;
        }
        if let Some(url) = file.update_center_url {
            self.update_center_url = url;
        }
        if let Some(url) = file.opt_out_plugins_url {
            self.opt_out_plugins_url = url;
        }
        if let Some(key) = file.ssh_private_key {
            self.ssh_private_key = key;
        }
        if let Some(strategy) = file.duplicate_pr_strategy {
            self.duplicate_pr_strategy = strategy;
        }
        if let Some(draft) = file.draft {
            self.draft = draft;
        }
        if let Some(secs) = file.fork_settle_delay_secs {
            self.fork_settle_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = file.build_timeout_secs {
            self.build_timeout = Duration::from_secs(secs);
        }
        if file.maven_home.is_some() {
            self.maven_home = file.maven_home;
        }
        for (major, path) in file.jdk_homes {
            if let Ok(major) = major.parse::<u8>() {
                self.jdk_homes.insert(major, path);
            }
        }
    }

    /// Directory holding everything cached for one plugin.
    #[must_use]
    pub fn plugin_cache_dir(&self, plugin: &str) -> PathBuf {
        self.cache_path.join(plugin)
    }

    /// Checkout location of a hosted plugin.
    #[must_use]
    pub fn plugin_checkout(&self, plugin: &str) -> PathBuf {
        self.plugin_cache_dir(plugin).join("sources")
    }

    /// Checkout location of the shared metadata repository.
    #[must_use]
    pub fn metadata_checkout(&self) -> PathBuf {
        self.cache_path.join(&self.metadata_repository)
    }

    /// Resolves the `JAVA_HOME` for a JDK major version.
    ///
    /// Looks at the configured `jdk-homes` table, then `JAVA_HOME_<major>`,
    /// then `JAVA_HOME`.
    #[must_use]
    pub fn jdk_home(&self, major: u8) -> Option<PathBuf> {
        if let Some(path) = self.jdk_homes.get(&major) {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(format!("JAVA_HOME_{major}")) {
            return Some(PathBuf::from(path));
        }
        let fallback = std::env::var("JAVA_HOME").ok().map(PathBuf::from);
        debug!(major, fallback = ?fallback, "No dedicated JAVA_HOME for JDK");
        fallback
    }

    /// Maven executable to invoke.
    #[must_use]
    pub fn maven_executable(&self) -> PathBuf {
        match &self.maven_home {
            Some(home) => home.join("bin").join("mvn"),
            None => PathBuf::from("mvn"),
        }
    }
}
