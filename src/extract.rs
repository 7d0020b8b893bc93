//! Text extraction seams.
//!
//! Extraction is a collaborator: the pipeline only needs `TextSource`.
//! Two implementations ship: direct file reads for plain text, and
//! external converters (pdftotext, ebook-convert) run with a hard timeout.
//! A converter that exits nonzero or times out yields a retryable error;
//! callers degrade that to empty text, which ends in a classification miss.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::ExtractConfig;
use crate::document::DocumentKind;
use crate::error::{Result, TriageError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Produce the plain text of the document at `path`
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Decode bytes as UTF-8, falling back to Latin-1
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// Drop NBSP/NUL/CR artifacts that converters and copy-paste leave behind
fn scrub(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\u{a0}' => Some(' '),
            '\r' | '\0' => None,
            c => Some(c),
        })
        .collect()
}

/// Reads the file directly (txt documents)
#[derive(Debug, Default)]
pub struct PlainTextSource;

#[async_trait]
impl TextSource for PlainTextSource {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        Ok(scrub(&decode(bytes)))
    }
}

static OUTPUT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Runs an external converter described by an argv template.
///
/// `{input}` in the template is replaced by the document path. If the
/// template names `{output}`, the text is read back from that file;
/// otherwise it is taken from the converter's stdout.
#[derive(Debug)]
pub struct CommandTextSource {
    template: Vec<String>,
    timeout: Duration,
}

impl CommandTextSource {
    pub fn new(template: Vec<String>, timeout: Duration) -> Self {
        Self { template, timeout }
    }

    /// The configured converter for a text-bearing kind
    pub fn for_kind(kind: DocumentKind, config: &ExtractConfig) -> Option<Self> {
        let template = match kind {
            DocumentKind::Pdf => config.pdf_converter.clone(),
            DocumentKind::Epub => config.epub_converter.clone(),
            _ => return None,
        };
        Some(Self::new(
            template,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn output_path(&self) -> PathBuf {
        let seq = OUTPUT_SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "doc-triage-extract-{}-{}.txt",
            std::process::id(),
            seq
        ))
    }

    fn error(&self, path: &Path, reason: String, retryable: bool) -> TriageError {
        TriageError::Extraction {
            path: path.display().to_string(),
            reason,
            retryable,
        }
    }
}

#[async_trait]
impl TextSource for CommandTextSource {
    async fn extract(&self, path: &Path) -> Result<String> {
        let needs_output_file = self.template.iter().any(|a| a.contains("{output}"));
        let output_file = needs_output_file.then(|| self.output_path());

        let argv: Vec<String> = self
            .template
            .iter()
            .map(|arg| {
                let arg = arg.replace("{input}", &path.to_string_lossy());
                match &output_file {
                    Some(out) => arg.replace("{output}", &out.to_string_lossy()),
                    None => arg,
                }
            })
            .collect();

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| self.error(path, "empty converter template".to_string(), false))?;

        debug!(program, ?args, "Running converter");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(path, format!("failed to spawn {}: {}", program, e), false))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                self.error(
                    path,
                    format!("converter timed out after {:?}", self.timeout),
                    true,
                )
            })?
            .map_err(|e| self.error(path, format!("converter failed: {}", e), true))?;

        if !output.status.success() {
            return Err(self.error(
                path,
                format!("converter exited with {}", output.status),
                true,
            ));
        }

        let text = match output_file {
            Some(out) => {
                let bytes = tokio::fs::read(&out).await.map_err(|e| {
                    self.error(path, format!("converter produced no output: {}", e), true)
                })?;
                let _ = tokio::fs::remove_file(&out).await;
                decode(bytes)
            }
            None => decode(output.stdout),
        };

        Ok(scrub(&text))
    }
}
