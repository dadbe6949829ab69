//! The two repositories a unit publishes to.
//!
//! Every protocol step in [`crate::sync`] is written once and parameterized by
//! [`RepoKind`]. Kind-specific naming, paths and texts live behind
//! [`RepoKindBehavior`].

use crate::config::{Recipe, Settings};
use crate::hosting::RepoCoordinates;
use crate::templates::{TemplateError, TemplateRenderer};
use crate::work_item::{ProgressFlags, WorkItem};
use chrono::{SecondsFormat, Utc};
use std::fmt;
use std::path::PathBuf;

/// Which repository an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoKind {
    /// The plugin's own repository.
    Primary,
    /// The shared repository collecting modernization records.
    Metadata,
}

impl RepoKind {
    #[must_use]
    pub fn behavior(self) -> &'static dyn RepoKindBehavior {
        match self {
            Self::Primary => &PrimaryRepo,
            Self::Metadata => &MetadataRepo,
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.behavior().label())
    }
}

/// Recipe and renderer for the texts of the primary repository.
#[derive(Clone, Copy)]
pub struct RecipeText<'a> {
    pub recipe: &'a Recipe,
    pub renderer: &'a TemplateRenderer,
}

/// Per-kind naming, location and progress accessors.
pub trait RepoKindBehavior: Sync {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// Repository name as shown to users.
    fn display_name(&self, item: &WorkItem, settings: &Settings) -> String;

    /// Source repository on the hosting service; `None` until the name is resolved.
    fn remote(&self, item: &WorkItem, settings: &Settings) -> Option<RepoCoordinates>;

    /// Root of the local checkout.
    fn local_path(&self, item: &WorkItem) -> PathBuf;

    /// Working branch.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the branch name cannot be rendered.
    fn branch_name(&self, item: &WorkItem, text: RecipeText<'_>) -> Result<String, TemplateError>;

    /// # Errors
    ///
    /// Returns [`TemplateError`] when the message cannot be rendered.
    fn commit_message(&self, item: &WorkItem, text: RecipeText<'_>)
        -> Result<String, TemplateError>;

    /// # Errors
    ///
    /// Returns [`TemplateError`] when the title cannot be rendered.
    fn pr_title(&self, item: &WorkItem, text: RecipeText<'_>) -> Result<String, TemplateError>;

    /// # Errors
    ///
    /// Returns [`TemplateError`] when the body cannot be rendered.
    fn pr_body(&self, item: &WorkItem, text: RecipeText<'_>) -> Result<String, TemplateError>;

    fn progress<'a>(&self, item: &'a WorkItem) -> &'a ProgressFlags;

    fn progress_mut<'a>(&self, item: &'a mut WorkItem) -> &'a mut ProgressFlags;
}

/// The plugin repository. Texts come from the recipe formats.
pub struct PrimaryRepo;

impl RepoKindBehavior for PrimaryRepo {
    fn label(&self) -> &'static str {
        "plugin"
    }

    fn display_name(&self, item: &WorkItem, _settings: &Settings) -> String {
        item.name().to_string()
    }

    fn remote(&self, item: &WorkItem, settings: &Settings) -> Option<RepoCoordinates> {
        item.repository_name()
            .map(|name| RepoCoordinates::new(&settings.source_organization, name))
    }

    fn local_path(&self, item: &WorkItem) -> PathBuf {
        item.checkout_path().to_path_buf()
    }

    fn branch_name(&self, item: &WorkItem, text: RecipeText<'_>) -> Result<String, TemplateError> {
        text.renderer.render_branch_name(text.recipe, item)
    }

    fn commit_message(
        &self,
        item: &WorkItem,
        text: RecipeText<'_>,
    ) -> Result<String, TemplateError> {
        text.renderer.render_commit_title(text.recipe, item)
    }

    fn pr_title(&self, item: &WorkItem, text: RecipeText<'_>) -> Result<String, TemplateError> {
        text.renderer.render_pr_title(text.recipe, item)
    }

    fn pr_body(&self, item: &WorkItem, text: RecipeText<'_>) -> Result<String, TemplateError> {
        text.renderer.render_pr_body(text.recipe, item)
    }

    fn progress<'a>(&self, item: &'a WorkItem) -> &'a ProgressFlags {
        item.primary_progress()
    }

    fn progress_mut<'a>(&self, item: &'a mut WorkItem) -> &'a mut ProgressFlags {
        item.primary_progress_mut()
    }
}

/// The shared metadata repository. Texts are fixed.
pub struct MetadataRepo;

impl RepoKindBehavior for MetadataRepo {
    fn label(&self) -> &'static str {
        "metadata"
    }

    fn display_name(&self, _item: &WorkItem, settings: &Settings) -> String {
        settings.metadata_repository.clone()
    }

    fn remote(&self, _item: &WorkItem, settings: &Settings) -> Option<RepoCoordinates> {
        Some(RepoCoordinates::new(
            &settings.metadata_organization,
            &settings.metadata_repository,
        ))
    }

    fn local_path(&self, item: &WorkItem) -> PathBuf {
        item.metadata_checkout().to_path_buf()
    }

    fn branch_name(&self, item: &WorkItem, _text: RecipeText<'_>) -> Result<String, TemplateError> {
        Ok(format!("{}-modernization-metadata", item.name()))
    }

    fn commit_message(
        &self,
        item: &WorkItem,
        _text: RecipeText<'_>,
    ) -> Result<String, TemplateError> {
        Ok(format!(
            "Add Modernization metadata for plugin {}",
            item.name()
        ))
    }

    fn pr_title(&self, item: &WorkItem, _text: RecipeText<'_>) -> Result<String, TemplateError> {
        Ok(format!("Modernization-metadata for {}", item.name()))
    }

    fn pr_body(&self, item: &WorkItem, _text: RecipeText<'_>) -> Result<String, TemplateError> {
        let timestamp = item
            .record()
            .map_or_else(Utc::now, |record| record.timestamp)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut body = format!(
            "Modernization metadata for `{}` at `{timestamp}`",
            item.name()
        );
        if let Some(url) = item.pull_request_url() {
            body.push_str(&format!("\nPR: {url}"));
        }
        Ok(body)
    }

    fn progress<'a>(&self, item: &'a WorkItem) -> &'a ProgressFlags {
        item.metadata_progress()
    }

    fn progress_mut<'a>(&self, item: &'a mut WorkItem) -> &'a mut ProgressFlags {
        item.metadata_progress_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecipeBook;

    fn text_fixture() -> (Recipe, TemplateRenderer) {
        let recipe = RecipeBook::builtin()
            .unwrap()
            .find("RemoveDependabot")
            .unwrap()
            .clone();
        (recipe, TemplateRenderer::new())
    }

    #[test]
    fn primary_texts_come_from_recipe() {
        let (recipe, renderer) = text_fixture();
        let text = RecipeText {
            recipe: &recipe,
            renderer: &renderer,
        };
        let item = WorkItem::hosted("git", &Settings::default());
        let kind = RepoKind::Primary.behavior();

        assert_eq!(
            kind.branch_name(&item, text).unwrap(),
            "plugin-modernizer/RemoveDependabot"
        );
        assert_eq!(kind.commit_message(&item, text).unwrap(), recipe.name);
    }

    #[test]
    fn metadata_texts_are_fixed() {
        let (recipe, renderer) = text_fixture();
        let text = RecipeText {
            recipe: &recipe,
            renderer: &renderer,
        };
        let mut item = WorkItem::hosted("git", &Settings::default());
        item.set_pull_request_url("https://github.com/jenkinsci/git-plugin/pull/1");
        let kind = RepoKind::Metadata.behavior();

        assert_eq!(
            kind.branch_name(&item, text).unwrap(),
            "git-modernization-metadata"
        );
        assert_eq!(
            kind.commit_message(&item, text).unwrap(),
            "Add Modernization metadata for plugin git"
        );
        assert_eq!(
            kind.pr_title(&item, text).unwrap(),
            "Modernization-metadata for git"
        );
        let body = kind.pr_body(&item, text).unwrap();
        assert!(body.starts_with("Modernization metadata for `git` at `"));
        assert!(body.ends_with("\nPR: https://github.com/jenkinsci/git-plugin/pull/1"));
    }

    #[test]
    fn remotes_and_paths() {
        let settings = Settings::default();
        let mut item = WorkItem::hosted("git", &settings);

        assert_eq!(RepoKind::Primary.behavior().remote(&item, &settings), None);
        item.set_repository_name("git-plugin");
        assert_eq!(
            RepoKind::Primary.behavior().remote(&item, &settings),
            Some(RepoCoordinates::new("jenkinsci", "git-plugin"))
        );
        assert_eq!(
            RepoKind::Metadata.behavior().remote(&item, &settings),
            Some(RepoCoordinates::new(
                "jenkins-infra",
                "metadata-plugin-modernizer"
            ))
        );
        assert_eq!(
            RepoKind::Metadata.behavior().local_path(&item),
            settings.metadata_checkout()
        );
    }

    #[test]
    fn progress_is_tracked_per_kind() {
        let mut item = WorkItem::hosted("git", &Settings::default());
        RepoKind::Metadata
            .behavior()
            .progress_mut(&mut item)
            .with_commits();

        assert!(RepoKind::Metadata.behavior().progress(&item).has_commits());
        assert!(!RepoKind::Primary.behavior().progress(&item).has_commits());
    }

    #[test]
    fn display_names_per_kind() {
        let settings = Settings::default();
        let item = WorkItem::hosted("git", &settings);

        assert_eq!(RepoKind::Primary.behavior().display_name(&item, &settings), "git");
        assert_eq!(
            RepoKind::Metadata.behavior().display_name(&item, &settings),
            "metadata-plugin-modernizer"
        );
    }
}
