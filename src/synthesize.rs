//! Canonical filename synthesis from extracted fields.
//!
//! The synthesized name is `date_info_append.ext`, where `date` is
//! `year-month-day`, `info` is the info1..info5 fields plus the rule key,
//! and `append` is append1..append5. Pieces that resolve to nothing are
//! dropped from the stem. Pure and deterministic.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::document::ExtractedFields;
use crate::error::{Result, TriageError};

/// Three-letter month abbreviations, Portuguese and English
static MONTHS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("JAN", "01");
    map.insert("FEV", "02");
    map.insert("FEB", "02");
    map.insert("MAR", "03");
    map.insert("ABR", "04");
    map.insert("APR", "04");
    map.insert("MAI", "05");
    map.insert("MAY", "05");
    map.insert("JUN", "06");
    map.insert("JUL", "07");
    map.insert("AGO", "08");
    map.insert("AUG", "08");
    map.insert("SET", "09");
    map.insert("SEP", "09");
    map.insert("OUT", "10");
    map.insert("OCT", "10");
    map.insert("NOV", "11");
    map.insert("DEZ", "12");
    map.insert("DEC", "12");
    map
});

/// Convert a textual month to its two-digit number by its first three
/// letters, case-insensitive. Unrecognized input passes through unchanged.
pub fn to_iso_month(month: &str) -> String {
    let prefix: String = month.to_uppercase().chars().take(3).collect();
    match MONTHS.get(prefix.as_str()) {
        Some(num) => num.to_string(),
        None => month.to_string(),
    }
}

/// Convert a year to four digits: two-digit years get a "20" prefix,
/// four-digit years pass through, anything else is rejected
pub fn to_iso_year(year: &str) -> Result<String> {
    match year.chars().count() {
        2 => Ok(format!("20{}", year)),
        4 => Ok(year.to_string()),
        _ => Err(TriageError::InvalidYearFormat(year.to_string())),
    }
}

/// Collect the values of a field group, in order.
///
/// Only fields named by the winning pattern contribute. A group that
/// resolves to a single absent value normalizes to one empty string, so
/// joins stay well-defined.
fn group_values(fields: &ExtractedFields, names: &[String]) -> Vec<String> {
    let collected: Vec<Option<&str>> = names
        .iter()
        .filter_map(|name| fields.entry(name))
        .collect();

    if collected.len() == 1 && collected[0].is_none() {
        return vec![String::new()];
    }

    collected
        .into_iter()
        .flatten()
        .map(|v| v.to_string())
        .collect()
}

fn numbered(prefix: &str) -> Vec<String> {
    (1..=5).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Build the canonical filename for a classified document.
///
/// `extension` includes its leading dot and is appended unchanged.
pub fn synthesize(fields: &ExtractedFields, rule_key: &str, extension: &str) -> Result<String> {
    let mut fields = fields.clone();

    if let Some(month) = fields.value("month") {
        let month = to_iso_month(month);
        fields.set("month", month);
    }
    if let Some(year) = fields.value("year") {
        let year = to_iso_year(year)?;
        fields.set("year", year);
    }

    let date_names = ["year", "month", "day"].map(String::from);
    let date = group_values(&fields, &date_names).join("-");
    let info = group_values(&fields, &numbered("info")).join(" ");
    let append = group_values(&fields, &numbered("append")).join(" ");

    let info = if info.is_empty() {
        rule_key.to_string()
    } else {
        format!("{} {}", info, rule_key)
    };

    let stem = [date, info, append]
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("_");

    Ok(format!("{}{}", stem, extension))
}
