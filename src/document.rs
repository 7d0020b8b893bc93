//! Core data structures: document kinds and the per-run document value

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Static extension table replacing per-extension dynamic dispatch.
/// Extensions are matched lowercase, without the leading dot.
static EXTENSIONS: &[(&str, DocumentKind)] = &[
    // Text-bearing kinds that go through extraction + classification
    ("pdf", DocumentKind::Pdf),
    ("txt", DocumentKind::PlainText),
    ("epub", DocumentKind::Epub),
    // Move-only kinds
    ("docx", DocumentKind::Word),
    ("doc", DocumentKind::Word),
    ("dot", DocumentKind::Word),
    ("docm", DocumentKind::Word),
    ("rtf", DocumentKind::Word),
    ("xlsx", DocumentKind::Spreadsheet),
    ("xls", DocumentKind::Spreadsheet),
    ("pptx", DocumentKind::Presentation),
    ("ppsx", DocumentKind::Presentation),
    ("ppt", DocumentKind::Presentation),
    ("pps", DocumentKind::Presentation),
    ("zip", DocumentKind::Archive),
    ("rar", DocumentKind::Archive),
    ("png", DocumentKind::Figure),
    ("jpg", DocumentKind::Figure),
    ("jpeg", DocumentKind::Figure),
    ("mp4", DocumentKind::Video),
    ("m", DocumentKind::Matlab),
    ("xml", DocumentKind::Xml),
    ("dmg", DocumentKind::DiskImage),
    ("mbz", DocumentKind::MoodleBackup),
    ("torrent", DocumentKind::Torrent),
];

/// Document type, determined from the file extension.
///
/// Text-bearing kinds (`needs_text() == true`) run through extraction and
/// classification; all others are moved straight to their default folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Epub,
    Word,
    Spreadsheet,
    Presentation,
    Archive,
    Figure,
    Video,
    Matlab,
    Xml,
    DiskImage,
    MoodleBackup,
    Torrent,
}

impl DocumentKind {
    /// Look up the kind for an extension (without the dot, any case).
    /// Unrecognized extensions return `None` and are skipped by the pipeline.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, kind)| *kind)
    }

    /// Whether this kind carries text worth extracting and classifying
    pub fn needs_text(&self) -> bool {
        matches!(
            self,
            DocumentKind::Pdf | DocumentKind::PlainText | DocumentKind::Epub
        )
    }

    /// Default destination folder for unclassified documents of this kind,
    /// relative to the document's original folder
    pub fn default_folder(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::PlainText => "txt",
            DocumentKind::Epub => "epub",
            DocumentKind::Word => "docx",
            DocumentKind::Spreadsheet => "xlsx",
            DocumentKind::Presentation => "pptx",
            DocumentKind::Archive => "archive",
            DocumentKind::Figure => "figures",
            DocumentKind::Video => "videos",
            DocumentKind::Matlab => "m",
            DocumentKind::Xml => "xml",
            DocumentKind::DiskImage => "dmg",
            DocumentKind::MoodleBackup => "moodle",
            DocumentKind::Torrent => "torrent",
        }
    }

    /// Stable name used to look up per-kind configuration overrides
    pub fn config_key(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::PlainText => "txt",
            DocumentKind::Epub => "epub",
            DocumentKind::Word => "word",
            DocumentKind::Spreadsheet => "spreadsheet",
            DocumentKind::Presentation => "presentation",
            DocumentKind::Archive => "archive",
            DocumentKind::Figure => "figure",
            DocumentKind::Video => "video",
            DocumentKind::Matlab => "matlab",
            DocumentKind::Xml => "xml",
            DocumentKind::DiskImage => "disk_image",
            DocumentKind::MoodleBackup => "moodle",
            DocumentKind::Torrent => "torrent",
        }
    }
}

/// Named fields extracted from a pattern match.
///
/// A field name can be present with no value: the capture group exists in
/// the winning pattern but did not participate in the match. That is distinct
/// from the name being unknown entirely, and filename synthesis relies on
/// the distinction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields(BTreeMap<String, Option<String>>);

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every named group of `re`, captured or not
    pub fn from_captures(re: &Regex, caps: &regex::Captures<'_>) -> Self {
        let mut fields = Self::new();
        for name in re.capture_names().flatten() {
            fields.0.insert(
                name.to_string(),
                caps.name(name).map(|m| m.as_str().to_string()),
            );
        }
        fields
    }

    /// The captured value for `name`, if the group participated in the match
    pub fn value(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_deref())
    }

    /// Whether `name` appeared as a group in the winning pattern at all
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The stored entry for `name`: outer `None` when the group is unknown,
    /// inner `None` when it exists but did not participate
    pub fn entry(&self, name: &str) -> Option<Option<&str>> {
        self.0.get(name).map(|v| v.as_deref())
    }

    /// Overwrite a field with a captured value
    pub fn set(&mut self, name: &str, value: String) {
        self.0.insert(name.to_string(), Some(value));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One document moving through the pipeline.
///
/// Owned exclusively by the pipeline for the duration of a single run; each
/// stage consumes it and returns an updated copy rather than mutating shared
/// state.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full path to the file as it currently sits on disk
    pub path: PathBuf,
    /// Folder containing the file
    pub folder: PathBuf,
    /// File name including extension
    pub file_name: String,
    /// File name without extension
    pub title: String,
    /// Extension including the leading dot, lowercased
    pub extension: String,
    pub kind: DocumentKind,
    /// Extracted plain text; empty for move-only kinds or failed extraction
    pub text: String,
    pub fields: ExtractedFields,
    /// Key of the committed rule, set only on successful classification
    pub matched_rule: Option<String>,
    /// Canonical filename produced by the synthesize action
    pub synthesized_name: Option<String>,
    /// Whether classification fully succeeded (match + all actions)
    pub classified: bool,
}

impl Document {
    /// Build a document from a path. Returns `None` when the path has no
    /// file name or its extension maps to no configured kind.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let ext = path.extension()?.to_str()?;
        let kind = DocumentKind::from_extension(ext)?;
        let title = path.file_stem()?.to_str()?.to_string();
        let folder = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();

        Some(Self {
            path: path.to_path_buf(),
            folder,
            file_name,
            title,
            extension: format!(".{}", ext.to_lowercase()),
            kind,
            text: String::new(),
            fields: ExtractedFields::new(),
            matched_rule: None,
            synthesized_name: None,
            classified: false,
        })
    }

    /// The name the file should carry at its destination: the synthesized
    /// name when classification produced one, the original name otherwise
    pub fn final_name(&self) -> &str {
        self.synthesized_name.as_deref().unwrap_or(&self.file_name)
    }

    /// Rebuild path-derived fields after the file has been moved
    pub fn relocated(mut self, new_path: PathBuf) -> Self {
        if let Some(name) = new_path.file_name().and_then(|n| n.to_str()) {
            self.file_name = name.to_string();
        }
        if let Some(parent) = new_path.parent() {
            self.folder = parent.to_path_buf();
        }
        self.path = new_path;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::from_extension("doc"),
            Some(DocumentKind::Word)
        );
        assert_eq!(DocumentKind::from_extension("exe"), None);
    }

    #[test]
    fn test_kind_routing_table() {
        assert!(DocumentKind::Pdf.needs_text());
        assert!(DocumentKind::PlainText.needs_text());
        assert!(!DocumentKind::Figure.needs_text());

        // Alias extensions land in the canonical folder
        assert_eq!(DocumentKind::from_extension("doc").unwrap().default_folder(), "docx");
        assert_eq!(DocumentKind::from_extension("png").unwrap().default_folder(), "figures");
        assert_eq!(DocumentKind::from_extension("rar").unwrap().default_folder(), "archive");
    }

    #[test]
    fn test_document_from_path() {
        let doc = Document::from_path(Path::new("/inbox/Statement MAY 21.PDF")).unwrap();
        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert_eq!(doc.title, "Statement MAY 21");
        assert_eq!(doc.extension, ".pdf");
        assert_eq!(doc.file_name, "Statement MAY 21.PDF");
        assert_eq!(doc.final_name(), "Statement MAY 21.PDF");
        assert!(!doc.classified);
    }

    #[test]
    fn test_document_from_path_unknown_extension() {
        assert!(Document::from_path(Path::new("/inbox/setup.exe")).is_none());
        assert!(Document::from_path(Path::new("/inbox/no_extension")).is_none());
    }

    #[test]
    fn test_fields_absent_vs_unknown() {
        let re = Regex::new(r"(?P<year>\d{4})(?:-(?P<month>\d{2}))?").unwrap();
        let caps = re.captures("2021").unwrap();
        let fields = ExtractedFields::from_captures(&re, &caps);

        // year participated
        assert_eq!(fields.value("year"), Some("2021"));
        // month exists as a group but did not participate
        assert!(fields.contains("month"));
        assert_eq!(fields.value("month"), None);
        assert_eq!(fields.entry("month"), Some(None));
        // day is not a group at all
        assert!(!fields.contains("day"));
        assert_eq!(fields.entry("day"), None);
    }

    #[test]
    fn test_relocated() {
        let doc = Document::from_path(Path::new("/inbox/a.txt")).unwrap();
        let doc = doc.relocated(PathBuf::from("/inbox/txt/b.txt"));
        assert_eq!(doc.file_name, "b.txt");
        assert_eq!(doc.folder, PathBuf::from("/inbox/txt"));
    }
}
