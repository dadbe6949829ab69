//! Build runtime (JDK) selection.
//!
//! Every Jenkins core line supports a window of Java versions. Plugins declare
//! the JDKs they build with (usually through their `Jenkinsfile`) and the core
//! version they depend on; these functions pick a JDK satisfying both.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

/// A JDK major version usable as build runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Jdk {
    Java8,
    Java11,
    Java17,
    Java21,
    Java25,
}

const ALL: [Jdk; 5] = [Jdk::Java8, Jdk::Java11, Jdk::Java17, Jdk::Java21, Jdk::Java25];

impl Jdk {
    /// Runtime implied when a plugin's declared JDKs could not be parsed.
    pub const IMPLICIT: Jdk = Jdk::Java8;

    /// Runtime required to run the transformation engine.
    pub const TRANSFORMATION: Jdk = Jdk::Java21;

    /// All runtimes, oldest first.
    #[must_use]
    pub fn all() -> &'static [Jdk] {
        &ALL
    }

    /// Oldest known runtime.
    #[must_use]
    pub fn min() -> Jdk {
        ALL[0]
    }

    #[must_use]
    pub fn major(self) -> u8 {
        match self {
            Self::Java8 => 8,
            Self::Java11 => 11,
            Self::Java17 => 17,
            Self::Java21 => 21,
            Self::Java25 => 25,
        }
    }

    #[must_use]
    pub fn from_major(major: u8) -> Option<Jdk> {
        ALL.into_iter().find(|jdk| jdk.major() == major)
    }

    /// Next newer runtime, if any.
    #[must_use]
    pub fn next(self) -> Option<Jdk> {
        ALL.into_iter().find(|jdk| *jdk > self)
    }

    /// Inclusive lower and exclusive upper platform bound.
    fn window(self) -> (Option<PlatformVersion>, Option<PlatformVersion>) {
        let v = |major, minor| Some(PlatformVersion::new(vec![major, minor]));
        match self {
            Self::Java8 => (None, v(2, 361)),
            Self::Java11 => (v(2, 164), v(2, 463)),
            Self::Java17 => (v(2, 346), None),
            Self::Java21 => (v(2, 426), None),
            Self::Java25 => (v(2, 534), None),
        }
    }

    /// Whether this runtime can build against the given platform version.
    #[must_use]
    pub fn supports(self, version: &PlatformVersion) -> bool {
        let (lower, upper) = self.window();
        lower.is_none_or(|lower| *version >= lower) && upper.is_none_or(|upper| *version < upper)
    }

    /// Runtimes supporting `version`, oldest first. Empty when unparsable.
    #[must_use]
    pub fn supporting(version: &str) -> Vec<Jdk> {
        match PlatformVersion::parse(version) {
            Some(parsed) => ALL.into_iter().filter(|jdk| jdk.supports(&parsed)).collect(),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for Jdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major())
    }
}

impl From<Jdk> for u8 {
    fn from(jdk: Jdk) -> Self {
        jdk.major()
    }
}

impl TryFrom<u8> for Jdk {
    type Error = String;

    fn try_from(major: u8) -> Result<Self, Self::Error> {
        Jdk::from_major(major).ok_or_else(|| format!("unsupported JDK major version {major}"))
    }
}

/// A dotted numeric platform version such as `2.479.1`.
///
/// Comparison is component-wise, so `2.361.1` sorts after `2.361`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformVersion {
    parts: Vec<u32>,
}

impl PlatformVersion {
    fn new(parts: Vec<u32>) -> Self {
        Self { parts }
    }

    /// Parses the leading numeric components; qualifiers like `-SNAPSHOT` are ignored.
    #[must_use]
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = Vec::new();
        for part in version.trim().split('.') {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            match digits.parse::<u32>() {
                Ok(value) => parts.push(value),
                Err(_) => break,
            }
            if digits.len() != part.len() {
                break;
            }
        }
        (!parts.is_empty()).then(|| Self::new(parts))
    }
}

impl PartialOrd for PlatformVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlatformVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.parts.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Lowest declared runtime that also supports the platform version.
///
/// An empty declaration yields [`Jdk::TRANSFORMATION`]. When no declared runtime
/// supports the platform, the oldest runtime the platform supports is used, and
/// when the platform version cannot be parsed the oldest declared one.
#[must_use]
pub fn resolve_minimum(declared: &BTreeSet<Jdk>, platform_version: &str) -> Jdk {
    let Some(oldest_declared) = declared.iter().next().copied() else {
        return Jdk::TRANSFORMATION;
    };
    let Some(version) = PlatformVersion::parse(platform_version) else {
        return oldest_declared;
    };

    declared
        .iter()
        .copied()
        .find(|jdk| jdk.supports(&version))
        .or_else(|| Jdk::all().iter().copied().find(|jdk| jdk.supports(&version)))
        .unwrap_or(oldest_declared)
}

/// Outcome of walking forward through runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeWalk {
    pub runtime: Jdk,
    /// True when no runtime supported the platform and the newest one was kept.
    pub exhausted: bool,
}

/// Walks from `start` to newer runtimes until one supports the platform version.
#[must_use]
pub fn walk_forward(start: Jdk, platform_version: &str) -> RuntimeWalk {
    let Some(version) = PlatformVersion::parse(platform_version) else {
        return RuntimeWalk {
            runtime: start,
            exhausted: true,
        };
    };

    let mut runtime = start;
    loop {
        if runtime.supports(&version) {
            return RuntimeWalk {
                runtime,
                exhausted: false,
            };
        }
        match runtime.next() {
            Some(next) => runtime = next,
            None => {
                return RuntimeWalk {
                    runtime,
                    exhausted: true,
                }
            }
        }
    }
}

/// Runtimes to try for verification: the walk result, then every newer supported one.
#[must_use]
pub fn verification_candidates(walk: RuntimeWalk, platform_version: &str) -> Vec<Jdk> {
    let mut candidates = vec![walk.runtime];
    if walk.exhausted {
        return candidates;
    }
    if let Some(version) = PlatformVersion::parse(platform_version) {
        candidates.extend(
            Jdk::all()
                .iter()
                .copied()
                .filter(|jdk| *jdk > walk.runtime && jdk.supports(&version)),
        );
    }
    candidates
}

static PATCH_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+)\.\d+").ok());

/// Strips the patch component of an LTS version (`2.479.3` → `2.479`).
#[must_use]
pub fn effective_baseline(platform_version: &str) -> String {
    match PATCH_SUFFIX.as_ref() {
        Some(re) => re.replace_all(platform_version, "$1").into_owned(),
        None => platform_version.to_string(),
    }
}
