//! Document classification engine with rule-based pattern matching.
//!
//! The matching policy is first-full-success-wins: rules are tried in
//! declaration order, each rule's patterns in declaration order, with an
//! unanchored search. A pattern match alone does not commit the rule: the
//! rule's whole action chain has to succeed too. A failed chain moves on to
//! the rule's next pattern, then to the next rule, and leaves no state
//! behind. The first (rule, pattern) whose chain fully succeeds commits
//! immediately, even if a later rule or pattern would have matched more
//! specifically.

use tracing::{debug, info};

use crate::actions;
use crate::document::{Document, ExtractedFields};
use crate::rules::RuleSet;

pub struct Classifier<'a> {
    rules: &'a RuleSet,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Classify the document's text against the rule set.
    ///
    /// On success the returned document carries the committed rule key, the
    /// extracted fields, any action side effects, and `classified = true`.
    /// On a miss the input document comes back untouched.
    pub fn classify(&self, doc: Document) -> Document {
        for rule in self.rules.iter() {
            for pattern in &rule.patterns {
                let Some(caps) = pattern.captures(&doc.text) else {
                    continue;
                };

                let fields = ExtractedFields::from_captures(pattern, &caps);
                debug!(rule = %rule.key, pattern = %pattern.as_str(), "Pattern matched");

                // Trial run on a copy: a partially failed chain must not
                // leak into a later-winning rule
                let mut candidate = doc.clone();
                candidate.fields = fields.clone();
                candidate.matched_rule = Some(rule.key.clone());

                let (candidate, ok) =
                    actions::run_chain(&rule.actions, candidate, &fields, &rule.key);

                if ok {
                    let mut committed = candidate;
                    committed.classified = true;
                    info!(
                        rule = %rule.key,
                        file = %committed.file_name,
                        new_name = committed.synthesized_name.as_deref().unwrap_or(""),
                        "Document classified"
                    );
                    return committed;
                }

                debug!(rule = %rule.key, "Action chain failed, trying next pattern");
            }
        }

        info!(file = %doc.file_name, "No rule matched");
        doc
    }
}
