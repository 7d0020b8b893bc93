//! Ordered rule set loaded from the YAML rules file.
//!
//! The rules file is a mapping from rule key to a triple
//! `[patterns, actions, destinations]`:
//!
//! ```yaml
//! Visa:
//!   - ['(?s)VISA.+?(?P<month>[A-Z]{3})/(?P<year>\d{2})']
//!   - [synthesize]
//!   - [statements/visa, archive@example.com]
//! ```
//!
//! Declaration order is load-bearing: the classifier commits to the first
//! rule whose pattern matches and whose action chain fully succeeds.

use regex::Regex;
use std::path::{Path, PathBuf};

use crate::actions::ActionKind;
use crate::error::{Result, TriageError};

/// Where a classified document goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Folder path relative to the document's original folder
    Folder(PathBuf),
    /// Outbound email recipient
    Email(String),
}

impl Destination {
    /// Destinations containing an address marker are email recipients,
    /// everything else is a folder
    pub fn parse(spec: &str) -> Self {
        if spec.contains('@') {
            Destination::Email(spec.to_string())
        } else {
            Destination::Folder(PathBuf::from(spec))
        }
    }
}

/// One classification rule: ordered patterns, ordered actions, destinations
#[derive(Debug, Clone)]
pub struct Rule {
    pub key: String,
    pub patterns: Vec<Regex>,
    pub actions: Vec<ActionKind>,
    pub destinations: Vec<Destination>,
}

/// All rules, in declaration order
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

/// Raw rule triple as it appears in YAML
type RawRule = (Vec<String>, Vec<String>, Vec<String>);

impl RuleSet {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::Rules(format!("Failed to read rules file: {}", e)))?;
        let rules = Self::parse(&content)?;
        tracing::info!(
            "Loaded {} rules from {:?}",
            rules.len(),
            path
        );
        Ok(rules)
    }

    /// Parse the YAML rules document, preserving declaration order
    pub fn parse(content: &str) -> Result<Self> {
        // serde_yaml::Mapping keeps insertion order, which is what makes
        // first-match-wins meaningful
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(content)
            .map_err(|e| TriageError::Rules(format!("Failed to parse rules file: {}", e)))?;

        let mut rules = Vec::with_capacity(mapping.len());
        let mut seen = std::collections::HashSet::new();

        for (key, value) in mapping {
            let key = key
                .as_str()
                .ok_or_else(|| TriageError::Rules("rule keys must be strings".to_string()))?
                .to_string();

            if !seen.insert(key.clone()) {
                return Err(TriageError::Rules(format!("duplicate rule key '{}'", key)));
            }

            let (patterns, actions, destinations): RawRule = serde_yaml::from_value(value)
                .map_err(|e| {
                    TriageError::Rules(format!(
                        "rule '{}' is not a [patterns, actions, destinations] triple: {}",
                        key, e
                    ))
                })?;

            rules.push(Rule::compile(key, patterns, actions, destinations)?);
        }

        Ok(Self { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.key == key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Rule {
    fn compile(
        key: String,
        patterns: Vec<String>,
        actions: Vec<String>,
        destinations: Vec<String>,
    ) -> Result<Self> {
        if patterns.is_empty() {
            return Err(TriageError::Rules(format!(
                "rule '{}' must have at least one pattern",
                key
            )));
        }

        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    TriageError::Rules(format!("rule '{}' has a bad pattern: {}", key, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let actions = actions
            .iter()
            .map(|name| {
                ActionKind::from_name(name).ok_or_else(|| {
                    TriageError::Rules(format!("rule '{}' names unknown action '{}'", key, name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let destinations = destinations.iter().map(|d| Destination::parse(d)).collect();

        Ok(Self {
            key,
            patterns,
            actions,
            destinations,
        })
    }
}
