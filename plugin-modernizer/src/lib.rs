#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod build;
pub mod catalog;
pub mod config;
pub mod facts;
pub mod git;
pub mod hosting;
pub mod orchestrator;
pub mod rate_limit;
pub mod record;
pub mod repo_kind;
pub mod runner;
pub mod runtime;
pub mod summary;
pub mod sync;
pub mod templates;
pub mod work_item;

pub use build::{BuildError, BuildTool, Goal, MavenInvoker, RewriteTransformer, Transformer};
pub use catalog::{CatalogError, PluginCatalog, UpdateCenter};
pub use config::{ConfigError, Credentials, DuplicatePrStrategy, Recipe, RecipeBook, Settings};
pub use facts::{ExtractError, FactExtractor, Facts, FactsCache, PreconditionError};
pub use git::{GitCli, GitError, VersionControl};
pub use hosting::{GitHubHost, HostingApi, HostingError};
pub use orchestrator::{Collaborators, Disposition, Orchestrator};
pub use rate_limit::{check_core_rate_limit, ensure_core_rate_limit, wait_if_needed, RateLimitInfo};
pub use record::{MigrationStatus, ModernizationRecord, RecordError, RecordStore};
pub use repo_kind::{RecipeText, RepoKind, RepoKindBehavior};
pub use runner::{clean_cache, PluginTarget, Runner, RunnerError};
pub use runtime::Jdk;
pub use summary::{RunSummary, UnitOutcome, UnitReport};
pub use sync::{HostSync, SyncError};
pub use templates::{create_handlebars_registry, TemplateError, TemplateRenderer};
pub use work_item::{ProgressFlags, UnitError, WorkItem};
