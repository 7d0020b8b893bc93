//! Collision-safe destination paths.
//!
//! Candidates are normalized to NFD before any comparison, since decomposing
//! storage backends (Dropbox, macOS) hand names back that way, and mixed
//! forms would defeat the existence checks. A free candidate is returned
//! as-is; an occupied one is renamed by inserting an increment marker
//! before the extension until a free name or a byte-identical existing
//! file is found.

use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

/// How collision renames are marked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IncrementStyle {
    /// "name 1.ext", "name 2.ext", ...
    #[default]
    Sequential,
    /// "name-.ext", "name--.ext", ... for a token of "-"
    Token(String),
}

#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    style: IncrementStyle,
}

impl PathResolver {
    pub fn new(style: IncrementStyle) -> Self {
        Self { style }
    }

    pub fn sequential() -> Self {
        Self::new(IncrementStyle::Sequential)
    }

    /// Resolve a candidate destination path to one that is safe to move a
    /// file onto: either unused, or already holding identical bytes.
    pub async fn resolve(&self, candidate: &Path) -> Result<PathBuf> {
        let candidate = normalize_nfd(candidate);
        let mut current = candidate.clone();
        let mut step = 1usize;

        loop {
            if !tokio::fs::try_exists(&current).await? {
                return Ok(current);
            }

            let probe = self.increment(&candidate, step);
            if files_equal(&candidate, &probe).await? {
                // A byte-identical copy is already saved under an
                // incremented name; hand that back instead of minting
                // another copy
                return Ok(probe);
            }

            current = probe;
            step += 1;
        }
    }

    /// Insert the increment marker for `step` before the extension
    fn increment(&self, path: &Path, step: usize) -> PathBuf {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let name = match &self.style {
            IncrementStyle::Sequential => format!("{} {}{}", stem, step, ext),
            IncrementStyle::Token(token) => format!("{}{}{}", stem, token.repeat(step), ext),
        };

        path.with_file_name(name)
    }
}

/// NFD-normalize the path's textual form
fn normalize_nfd(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().nfd().collect::<String>())
}

/// Byte-wise comparison; false when either file is missing
async fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    if !tokio::fs::try_exists(a).await? || !tokio::fs::try_exists(b).await? {
        return Ok(false);
    }

    let (meta_a, meta_b) = (tokio::fs::metadata(a).await?, tokio::fs::metadata(b).await?);
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let (bytes_a, bytes_b) = (tokio::fs::read(a).await?, tokio::fs::read(b).await?);
    Ok(bytes_a == bytes_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_free_path_returned_unchanged() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join("report.txt");

        let resolver = PathResolver::sequential();
        let resolved = resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolved, candidate);
    }

    #[tokio::test]
    async fn test_collision_increments() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join("report.txt");
        tokio::fs::write(&candidate, b"occupied").await.unwrap();

        let resolver = PathResolver::sequential();
        let resolved = resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolved, dir.path().join("report 1.txt"));
    }

    #[tokio::test]
    async fn test_repeated_collisions_increment_monotonically() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join("report.txt");
        tokio::fs::write(&candidate, b"first").await.unwrap();

        let resolver = PathResolver::sequential();
        for expected in ["report 1.txt", "report 2.txt", "report 3.txt"] {
            let resolved = resolver.resolve(&candidate).await.unwrap();
            assert_eq!(resolved, dir.path().join(expected));
            // occupy it with distinct content and resolve again
            tokio::fs::write(&resolved, expected.as_bytes()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_identical_content_deduplicates() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join("report.txt");
        let saved = dir.path().join("report 1.txt");
        tokio::fs::write(&candidate, b"same bytes").await.unwrap();
        tokio::fs::write(&saved, b"same bytes").await.unwrap();

        let resolver = PathResolver::sequential();
        let resolved = resolver.resolve(&candidate).await.unwrap();
        // the already-saved duplicate is handed back, no new name minted
        assert_eq!(resolved, saved);
    }

    #[tokio::test]
    async fn test_token_style_increments() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join("report.txt");
        tokio::fs::write(&candidate, b"first").await.unwrap();

        let resolver = PathResolver::new(IncrementStyle::Token("-".to_string()));
        let resolved = resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolved, dir.path().join("report-.txt"));

        tokio::fs::write(&resolved, b"second").await.unwrap();
        let resolved = resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolved, dir.path().join("report--.txt"));
    }

    #[tokio::test]
    async fn test_nfd_normalization() {
        let dir = tempdir().unwrap();
        // U+00E9 (composed) decomposes to "e" + U+0301
        let candidate = dir.path().join("caf\u{e9}.txt");

        let resolver = PathResolver::sequential();
        let resolved = resolver.resolve(&candidate).await.unwrap();

        let name = resolved.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "cafe\u{301}.txt");
    }

    #[tokio::test]
    async fn test_extensionless_candidate() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join("README");
        tokio::fs::write(&candidate, b"first").await.unwrap();

        let resolver = PathResolver::sequential();
        let resolved = resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolved, dir.path().join("README 1"));
    }
}
