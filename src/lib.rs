//! Rule-driven triage for a watched document folder.
//!
//! Files dropped into the inbox are classified against an ordered set of
//! user-authored rules, given canonical names synthesized from the fields
//! each rule extracts, and moved, copied, or staged for email delivery
//! without ever overwriting an existing file.

pub mod actions;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod pipeline;
pub mod resolver;
pub mod router;
pub mod rules;
pub mod synthesize;

pub use config::Config;
pub use document::{Document, DocumentKind};
pub use error::{Result, TriageError};
pub use pipeline::{BatchSummary, Pipeline};
pub use rules::RuleSet;
