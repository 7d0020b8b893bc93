//! Outbound delivery pass over the email staging folder.
//!
//! Staged files are named `recipient TOKEN filename`. Each pass copies the
//! payload to a plain-named sibling (so the attachment carries its real
//! name), attempts delivery, removes the staged original on success, and
//! removes the sibling regardless of outcome. Failures are best-effort:
//! the staged file stays behind for a later pass. Files that don't match
//! the staged-name pattern are orphans and are discarded.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::router::EMAIL_ADDR_TOKEN;

static STAGED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^(.+?@.+?){}(.+)$", regex::escape(EMAIL_ADDR_TOKEN)))
        .expect("staged-name pattern is valid")
});

/// Decode a staged filename into `(recipient, delivered filename)`
pub fn decode_staged_name(name: &str) -> Option<(&str, &str)> {
    let caps = STAGED_NAME.captures(name)?;
    Some((
        caps.get(1).map(|m| m.as_str())?,
        caps.get(2).map(|m| m.as_str())?,
    ))
}

/// Actual mail delivery is a collaborator behind this seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one file as an attachment to `recipient`
    async fn deliver(&self, recipient: &str, subject: &str, attachment: &Path) -> Result<()>;
}

/// Delivery through an external command, e.g. a sendmail-style wrapper.
///
/// The argv template takes `{recipient}`, `{subject}` and `{attachment}`
/// placeholders. A nonzero exit or a timeout is a retryable failure.
#[derive(Debug)]
pub struct CommandMailTransport {
    template: Vec<String>,
    timeout: std::time::Duration,
}

impl CommandMailTransport {
    pub fn new(template: Vec<String>, timeout: std::time::Duration) -> Self {
        Self { template, timeout }
    }

    fn error(&self, recipient: &str, reason: String, retryable: bool) -> crate::error::TriageError {
        crate::error::TriageError::Delivery {
            recipient: recipient.to_string(),
            reason,
            retryable,
        }
    }
}

#[async_trait]
impl MailTransport for CommandMailTransport {
    async fn deliver(&self, recipient: &str, subject: &str, attachment: &Path) -> Result<()> {
        let argv: Vec<String> = self
            .template
            .iter()
            .map(|arg| {
                arg.replace("{recipient}", recipient)
                    .replace("{subject}", subject)
                    .replace("{attachment}", &attachment.to_string_lossy())
            })
            .collect();

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| self.error(recipient, "empty delivery command".to_string(), false))?;

        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                self.error(recipient, format!("failed to spawn {}: {}", program, e), false)
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                self.error(
                    recipient,
                    format!("delivery timed out after {:?}", self.timeout),
                    true,
                )
            })?
            .map_err(|e| self.error(recipient, format!("delivery failed: {}", e), true))?;

        if !output.status.success() {
            return Err(self.error(
                recipient,
                format!("delivery command exited with {}", output.status),
                true,
            ));
        }

        Ok(())
    }
}

pub struct EmailGateway<T: MailTransport> {
    transport: T,
}

impl<T: MailTransport> EmailGateway<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Attempt delivery for everything currently staged
    pub async fn flush(&self, staging_dir: &Path) -> Result<()> {
        if !tokio::fs::try_exists(staging_dir).await? {
            return Ok(());
        }

        let mut entries = tokio::fs::read_dir(staging_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };

            match decode_staged_name(&name) {
                Some((recipient, filename)) => {
                    let recipient = recipient.to_string();
                    let filename = filename.to_string();
                    self.deliver_one(staging_dir, &name, &recipient, &filename)
                        .await;
                }
                None => {
                    warn!(file = %name, "Orphaned file in staging, discarding");
                    if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                        warn!(file = %name, error = %e, "Failed to discard orphan");
                    }
                }
            }
        }

        Ok(())
    }

    async fn deliver_one(&self, staging_dir: &Path, staged: &str, recipient: &str, filename: &str) {
        let staged_path = staging_dir.join(staged);
        let plain_path = staging_dir.join(filename);

        if let Err(e) = tokio::fs::copy(&staged_path, &plain_path).await {
            warn!(file = %staged, error = %e, "Failed to prepare attachment");
            return;
        }

        match self.transport.deliver(recipient, filename, &plain_path).await {
            Ok(()) => {
                info!(recipient, file = %filename, "Delivered");
                if let Err(e) = tokio::fs::remove_file(&staged_path).await {
                    warn!(file = %staged, error = %e, "Failed to remove delivered file");
                }
            }
            // best-effort: leave the staged original for a later pass
            Err(e) => warn!(recipient, file = %filename, error = %e, "Delivery failed"),
        }

        if let Err(e) = tokio::fs::remove_file(&plain_path).await {
            warn!(file = %filename, error = %e, "Failed to remove attachment copy");
        }
    }
}
