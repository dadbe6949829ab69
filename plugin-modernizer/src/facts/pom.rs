//! Static reading of Maven descriptors.
//!
//! Used where running Maven is not possible or not worth it: precondition
//! checks, the implicit-JDK fallback and multi-module detection. The reader is
//! deliberately shallow and only looks at top-level elements.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

pub const POM_FILE: &str = "pom.xml";

static COMMENTS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").ok());

/// Blocks whose children would shadow top-level elements, outermost first.
const NESTED_BLOCKS: [&str; 10] = [
    "profiles",
    "build",
    "reporting",
    "dependencyManagement",
    "dependencies",
    "parent",
    "repositories",
    "pluginRepositories",
    "modules",
    "distributionManagement",
];

static PROPERTIES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<properties>(.*?)</properties>").ok());

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").ok());

/// A `pom.xml` held as text.
#[derive(Debug, Clone)]
pub struct PomDescriptor {
    contents: String,
    top_level: String,
}

impl PomDescriptor {
    /// Reads `pom.xml` from a directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be read.
    pub fn read(dir: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(dir.join(POM_FILE))?;
        Ok(Self::parse(&contents))
    }

    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let without_comments = match COMMENTS.as_ref() {
            Some(re) => re.replace_all(contents, "").into_owned(),
            None => contents.to_string(),
        };
        let mut top_level = without_comments.clone();
        for block in NESTED_BLOCKS {
            if let Ok(re) = Regex::new(&format!(r"(?s)<{block}>.*?</{block}>")) {
                top_level = re.replace_all(&top_level, "").into_owned();
            }
        }
        Self {
            contents: without_comments,
            top_level,
        }
    }

    /// Raw text without comments.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }

    fn top_level_element(&self, element: &str) -> Option<String> {
        let re = Regex::new(&format!(
            r"(?s)<{0}>\s*(.*?)\s*</{0}>",
            regex::escape(element)
        ))
        .ok()?;
        re.captures(&self.top_level)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    #[must_use]
    pub fn artifact_id(&self) -> Option<String> {
        self.top_level_element("artifactId")
    }

    /// Declared packaging; Maven's default is `jar`.
    #[must_use]
    pub fn packaging(&self) -> String {
        self.top_level_element("packaging")
            .unwrap_or_else(|| "jar".to_string())
    }

    /// Whether this module builds a Jenkins plugin.
    #[must_use]
    pub fn is_plugin(&self) -> bool {
        matches!(self.packaging().as_str(), "hpi" | "jenkins-plugin")
    }

    /// Whether this module only aggregates others.
    #[must_use]
    pub fn is_aggregator(&self) -> bool {
        self.packaging() == "pom"
    }

    /// Value of a `<properties>` entry, without interpolation.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        let block = PROPERTIES
            .as_ref()?
            .captures(&self.contents)?
            .get(1)?
            .as_str()
            .to_string();
        let re = Regex::new(&format!(
            r"(?s)<{0}>\s*(.*?)\s*</{0}>",
            regex::escape(name)
        ))
        .ok()?;
        re.captures(&block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Value of a property with `${...}` references to other properties expanded.
    #[must_use]
    pub fn interpolated_property(&self, name: &str) -> Option<String> {
        let raw = self.property(name)?;
        let Some(re) = PLACEHOLDER.as_ref() else {
            return Some(raw);
        };
        let expanded = re.replace_all(&raw, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            if key == name {
                return caps[0].to_string();
            }
            self.property(key).unwrap_or_else(|| caps[0].to_string())
        });
        Some(expanded.into_owned())
    }

    /// Core version the plugin builds against (`jenkins.version`).
    #[must_use]
    pub fn jenkins_version(&self) -> Option<String> {
        self.interpolated_property("jenkins.version")
            .filter(|v| !v.contains("${"))
    }

    /// Whether a `<parent>` element is present.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.contents.contains("<parent>")
    }
}

/// Finds the plugin module below an aggregator checkout.
///
/// Searches at most two directory levels deep, in name order, and returns the
/// path relative to `root`.
#[must_use]
pub fn find_plugin_module(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| {
            !entry
                .file_name()
                .to_string_lossy()
                .starts_with(['.', '_'])
        })
        .filter(|entry| entry.file_name() != "target")
        .find(|entry| {
            PomDescriptor::read(entry.path())
                .map(|pom| pom.is_plugin())
                .unwrap_or(false)
        })
        .and_then(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
}
