//! Batch driver: scan the inbox, triage each document, flush outbound.
//!
//! Strictly sequential: each document is extracted, classified, and routed
//! to completion before the next is considered. A failure in one document
//! is logged and counted, never allowed to abort the rest of the batch.

use tracing::{debug, error, info, warn};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::document::{Document, DocumentKind};
use crate::error::Result;
use crate::extract::{CommandTextSource, PlainTextSource, TextSource};
use crate::gateway::{EmailGateway, MailTransport};
use crate::router::Router;
use crate::rules::RuleSet;

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Documents a rule claimed
    pub classified: usize,
    /// Documents routed to their kind's default folder
    pub unmatched: usize,
    /// Files with no configured kind, left in place
    pub skipped: usize,
    /// Documents whose processing errored
    pub failed: usize,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    rules: &'a RuleSet,
    router: Router,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, rules: &'a RuleSet) -> Self {
        Self {
            config,
            rules,
            router: Router::new(config),
        }
    }

    /// Process every regular file currently in the inbox
    pub async fn run(&self) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        let mut entries = tokio::fs::read_dir(&self.config.watch.inbox).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();

            let Some(doc) = Document::from_path(&path) else {
                debug!(path = %path.display(), "No configured kind, skipping");
                summary.skipped += 1;
                continue;
            };

            match self.process_one(doc).await {
                Ok(doc) if doc.classified => summary.classified += 1,
                Ok(_) => summary.unmatched += 1,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Document failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            classified = summary.classified,
            unmatched = summary.unmatched,
            skipped = summary.skipped,
            failed = summary.failed,
            "Batch complete"
        );
        Ok(summary)
    }

    async fn process_one(&self, doc: Document) -> Result<Document> {
        info!(file = %doc.file_name, kind = ?doc.kind, "Processing");

        if !doc.kind.needs_text() {
            return self.router.route(doc, None).await;
        }

        let mut doc = doc;
        doc.text = self.extract_text(&doc).await;

        let doc = Classifier::new(self.rules).classify(doc);
        let rule = doc
            .matched_rule
            .as_deref()
            .and_then(|key| self.rules.get(key));

        self.router.route(doc, rule).await
    }

    /// Extraction failures degrade to empty text: the document will miss
    /// classification and land in its default folder instead
    async fn extract_text(&self, doc: &Document) -> String {
        let extracted = match doc.kind {
            DocumentKind::PlainText => PlainTextSource.extract(&doc.path).await,
            kind => match CommandTextSource::for_kind(kind, &self.config.extract) {
                Some(source) => source.extract(&doc.path).await,
                None => Ok(String::new()),
            },
        };

        match extracted {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %doc.file_name, error = %e, "Extraction failed");
                String::new()
            }
        }
    }

    /// Attempt delivery of everything staged in the outbound folder
    pub async fn flush_outbound<T: MailTransport>(&self, transport: T) -> Result<()> {
        EmailGateway::new(transport)
            .flush(&self.config.watch.outbound_dir())
            .await
    }
}
