//! Final placement: local moves and outbound email staging.
//!
//! Every destination of the winning rule is attempted independently; a
//! failure on one neither stops the others nor rolls anything back. All
//! target paths go through the collision resolver first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::resolver::{IncrementStyle, PathResolver};
use crate::rules::{Destination, Rule};

/// Delimiter encoding the recipient inside staged filenames. Chosen to be
/// unlikely to occur in real filenames or addresses.
pub const EMAIL_ADDR_TOKEN: &str = "_@_@@_";

pub struct Router {
    resolver: PathResolver,
    outbound_dir: PathBuf,
    default_folders: HashMap<String, String>,
    dry_run: bool,
}

impl Router {
    pub fn new(config: &Config) -> Self {
        let style = match &config.routing.increment_token {
            Some(token) => IncrementStyle::Token(token.clone()),
            None => IncrementStyle::Sequential,
        };

        Self {
            resolver: PathResolver::new(style),
            outbound_dir: config.watch.outbound_dir(),
            default_folders: config.routing.default_folders.clone(),
            dry_run: config.execution.dry_run,
        }
    }

    /// Place the document exactly once: per-rule destinations when
    /// classification succeeded, the kind's default folder otherwise.
    pub async fn route(&self, doc: Document, rule: Option<&Rule>) -> Result<Document> {
        match rule {
            Some(rule) if doc.classified => self.route_classified(doc, rule).await,
            _ => self.route_unclassified(doc).await,
        }
    }

    async fn route_classified(&self, doc: Document, rule: &Rule) -> Result<Document> {
        let origin = doc.folder.clone();
        let mut doc = doc;
        let mut moved = false;

        for dest in &rule.destinations {
            let outcome = match dest {
                Destination::Email(addr) => self.stage_email(&doc, addr).await.map(|_| None),
                Destination::Folder(rel) => self
                    .place_in_folder(&doc, &origin.join(rel), !moved)
                    .await
                    .map(Some),
            };

            match outcome {
                Ok(Some(new_path)) => {
                    if !moved && !self.dry_run {
                        doc = doc.relocated(new_path);
                    }
                    moved = true;
                }
                Ok(None) => {}
                // attempted independently; no rollback of earlier placements
                Err(e) => warn!(
                    rule = %rule.key,
                    destination = ?dest,
                    error = %e,
                    "Destination failed"
                ),
            }
        }

        Ok(doc)
    }

    async fn route_unclassified(&self, doc: Document) -> Result<Document> {
        let folder = self
            .default_folders
            .get(doc.kind.config_key())
            .map(String::as_str)
            .unwrap_or_else(|| doc.kind.default_folder());

        let target_dir = doc.folder.join(folder);
        // unclassified documents keep their original name
        let new_path = self.place(&doc.path, &target_dir, &doc.file_name, true).await?;

        Ok(match new_path {
            Some(p) if !self.dry_run => doc.relocated(p),
            _ => doc,
        })
    }

    /// Move (or copy) the document into a folder under its final name
    async fn place_in_folder(
        &self,
        doc: &Document,
        target_dir: &Path,
        move_it: bool,
    ) -> Result<PathBuf> {
        let placed = self
            .place(&doc.path, target_dir, doc.final_name(), move_it)
            .await?;
        Ok(placed.unwrap_or_else(|| target_dir.join(doc.final_name())))
    }

    async fn place(
        &self,
        source: &Path,
        target_dir: &Path,
        name: &str,
        move_it: bool,
    ) -> Result<Option<PathBuf>> {
        if self.dry_run {
            info!(
                source = %source.display(),
                target = %target_dir.join(name).display(),
                move_it,
                "Dry run: skipping placement"
            );
            return Ok(None);
        }

        tokio::fs::create_dir_all(target_dir).await?;
        let resolved = self.resolver.resolve(&target_dir.join(name)).await?;

        if move_it {
            tokio::fs::rename(source, &resolved).await?;
            info!(from = %source.display(), to = %resolved.display(), "Moved");
        } else {
            tokio::fs::copy(source, &resolved).await?;
            info!(from = %source.display(), to = %resolved.display(), "Copied");
        }

        Ok(Some(resolved))
    }

    /// Stage a copy in the outbound folder under `recipient TOKEN name`
    async fn stage_email(&self, doc: &Document, recipient: &str) -> Result<()> {
        let staged_name = format!("{}{}{}", recipient, EMAIL_ADDR_TOKEN, doc.final_name());

        if self.dry_run {
            info!(recipient, staged_name, "Dry run: skipping email staging");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.outbound_dir).await?;
        let staged = self
            .resolver
            .resolve(&self.outbound_dir.join(&staged_name))
            .await?;
        tokio::fs::copy(&doc.path, &staged).await?;
        info!(recipient, staged = %staged.display(), "Staged for delivery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;
    use tempfile::tempdir;

    fn config_for(inbox: &Path) -> Config {
        let mut config = Config::default();
        config.watch.inbox = inbox.to_path_buf();
        config
    }

    async fn make_doc(dir: &Path, name: &str, content: &str) -> Document {
        let path = dir.join(name);
        tokio::fs::write(&path, content).await.unwrap();
        Document::from_path(&path).unwrap()
    }

    fn rule_with(yaml: &str, key: &str) -> Rule {
        RuleSet::parse(yaml).unwrap().get(key).unwrap().clone()
    }

    #[tokio::test]
    async fn test_classified_moves_to_folder_with_synthesized_name() {
        let dir = tempdir().unwrap();
        let mut doc = make_doc(dir.path(), "in.txt", "body").await;
        doc.classified = true;
        doc.matched_rule = Some("Visa".to_string());
        doc.synthesized_name = Some("2021-05_Visa.txt".to_string());

        let rule = rule_with("Visa:\n  - ['x']\n  - []\n  - [statements]\n", "Visa");
        let router = Router::new(&config_for(dir.path()));
        let doc = router.route(doc, Some(&rule)).await.unwrap();

        let expected = dir.path().join("statements/2021-05_Visa.txt");
        assert!(expected.exists());
        assert!(!dir.path().join("in.txt").exists());
        assert_eq!(doc.path, expected);
    }

    #[tokio::test]
    async fn test_multiple_folder_destinations_move_then_copy() {
        let dir = tempdir().unwrap();
        let mut doc = make_doc(dir.path(), "in.txt", "body").await;
        doc.classified = true;
        doc.synthesized_name = Some("out.txt".to_string());

        let rule = rule_with("R:\n  - ['x']\n  - []\n  - [first, second]\n", "R");
        let router = Router::new(&config_for(dir.path()));
        router.route(doc, Some(&rule)).await.unwrap();

        assert!(dir.path().join("first/out.txt").exists());
        assert!(dir.path().join("second/out.txt").exists());
        assert!(!dir.path().join("in.txt").exists());
    }

    #[tokio::test]
    async fn test_email_destination_stages_copy() {
        let dir = tempdir().unwrap();
        let mut doc = make_doc(dir.path(), "in.txt", "body").await;
        doc.classified = true;
        doc.synthesized_name = Some("report.txt".to_string());

        let rule = rule_with("R:\n  - ['x']\n  - []\n  - ['user@x.com']\n", "R");
        let router = Router::new(&config_for(dir.path()));
        router.route(doc, Some(&rule)).await.unwrap();

        let staged = dir
            .path()
            .join("to_be_emailed")
            .join(format!("user@x.com{}report.txt", EMAIL_ADDR_TOKEN));
        assert!(staged.exists());
        // email destinations copy; the original stays put for folder moves
        assert!(dir.path().join("in.txt").exists());
    }

    #[tokio::test]
    async fn test_unclassified_moves_to_default_folder_unrenamed() {
        let dir = tempdir().unwrap();
        let doc = make_doc(dir.path(), "in.txt", "body").await;

        let router = Router::new(&config_for(dir.path()));
        let doc = router.route(doc, None).await.unwrap();

        let expected = dir.path().join("txt/in.txt");
        assert!(expected.exists());
        assert_eq!(doc.path, expected);
        assert_eq!(doc.file_name, "in.txt");
    }

    #[tokio::test]
    async fn test_unclassified_respects_folder_override() {
        let dir = tempdir().unwrap();
        let doc = make_doc(dir.path(), "photo.png", "bytes").await;

        let mut config = config_for(dir.path());
        config
            .routing
            .default_folders
            .insert("figure".to_string(), "images".to_string());
        let router = Router::new(&config);
        router.route(doc, None).await.unwrap();

        assert!(dir.path().join("images/photo.png").exists());
    }

    #[tokio::test]
    async fn test_collision_goes_through_resolver() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("txt")).await.unwrap();
        tokio::fs::write(dir.path().join("txt/in.txt"), "other content")
            .await
            .unwrap();

        let doc = make_doc(dir.path(), "in.txt", "body").await;
        let router = Router::new(&config_for(dir.path()));
        let doc = router.route(doc, None).await.unwrap();

        assert_eq!(doc.path, dir.path().join("txt/in 1.txt"));
        assert!(doc.path.exists());
        // the occupant was not overwritten
        let other = tokio::fs::read_to_string(dir.path().join("txt/in.txt"))
            .await
            .unwrap();
        assert_eq!(other, "other content");
    }

    #[tokio::test]
    async fn test_dry_run_moves_nothing() {
        let dir = tempdir().unwrap();
        let doc = make_doc(dir.path(), "in.txt", "body").await;

        let mut config = config_for(dir.path());
        config.execution.dry_run = true;
        let router = Router::new(&config);
        let doc = router.route(doc, None).await.unwrap();

        assert!(dir.path().join("in.txt").exists());
        assert!(!dir.path().join("txt").exists());
        assert_eq!(doc.path, dir.path().join("in.txt"));
    }
}
