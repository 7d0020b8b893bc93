//! Closed set of post-match actions, resolved by name from the rules file.
//!
//! Every action in a rule's chain runs, in order, regardless of earlier
//! failures; the chain's result is the AND of all action results. Actions
//! consume the document and return an updated copy.

use tracing::{debug, warn};

use crate::document::{Document, ExtractedFields};
use crate::synthesize;

/// Name registry mapping rule-file identifiers to action variants
static REGISTRY: &[(&str, ActionKind)] = &[
    ("synthesize", ActionKind::Synthesize),
    ("strip_header_blank_lines", ActionKind::StripHeaderBlankLines),
    ("strip_carriage_returns", ActionKind::StripCarriageReturns),
    ("normalize_text", ActionKind::NormalizeText),
];

/// A post-match operation a rule can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Build the canonical filename from the extracted fields
    Synthesize,
    /// Drop empty lines before the first line of content
    StripHeaderBlankLines,
    /// Remove carriage returns left by DOS-style extraction output
    StripCarriageReturns,
    /// Replace NBSP and NUL artifacts from converter output
    NormalizeText,
}

impl ActionKind {
    /// Resolve a rule-file action identifier
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }

    /// Apply the action to the document. Returns the updated document and
    /// whether the action succeeded.
    pub fn execute(
        &self,
        mut doc: Document,
        fields: &ExtractedFields,
        rule_key: &str,
    ) -> (Document, bool) {
        match self {
            ActionKind::Synthesize => {
                match synthesize::synthesize(fields, rule_key, &doc.extension) {
                    Ok(name) => {
                        debug!(rule = rule_key, name = %name, "Synthesized filename");
                        doc.synthesized_name = Some(name);
                        (doc, true)
                    }
                    Err(e) => {
                        warn!(rule = rule_key, error = %e, "Filename synthesis failed");
                        (doc, false)
                    }
                }
            }
            ActionKind::StripHeaderBlankLines => {
                let start = doc.text.lines().position(|l| !l.is_empty());
                doc.text = match start {
                    Some(i) => doc.text.lines().skip(i).collect::<Vec<_>>().join("\n"),
                    None => String::new(),
                };
                (doc, true)
            }
            ActionKind::StripCarriageReturns => {
                doc.text = doc.text.replace('\r', "");
                (doc, true)
            }
            ActionKind::NormalizeText => {
                doc.text = doc.text.replace('\u{a0}', " ").replace('\0', "");
                (doc, true)
            }
        }
    }
}

/// Run a rule's action chain.
///
/// Deliberately does NOT short-circuit: a failing action degrades the
/// overall result but later actions still execute with their side effects.
pub fn run_chain(
    actions: &[ActionKind],
    doc: Document,
    fields: &ExtractedFields,
    rule_key: &str,
) -> (Document, bool) {
    let mut doc = doc;
    let mut success = true;

    for action in actions {
        let (updated, ok) = action.execute(doc, fields, rule_key);
        doc = updated;
        if !ok {
            debug!(rule = rule_key, action = action.name(), "Action failed");
        }
        success &= ok;
    }

    (doc, success)
}
