//! Parser for the mining tool's output file.
//!
//! Every non-empty line is one pattern in one of three shapes:
//!
//! | shape    | example                          |
//! |----------|----------------------------------|
//! | sequence | `1 2 -1 3 -1 #SUP: 5`            |
//! | rule     | `1 ==> 2 #SUP: 5 #CONF: 0.8`     |
//! | itemset  | `1 2 #SUP: 5`                    |
//!
//! Lines are classified one by one, so a file mixing shapes is accepted. The
//! three grammars are disjoint: `-1` and `==>` are reserved tokens that never
//! appear as items, and only rules carry a `#CONF:` field. A line matching no
//! grammar, or more than one, aborts the whole parse.

use crate::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const ITEMSET_SEPARATOR: &str = "-1";
const RULE_ARROW: &str = "==>";

// Hard-coded pattern, known to be valid.
#[allow(clippy::expect_used)]
static TRAILER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<body>.*?)\s*#SUP:\s*(?P<support>\d+)(?:\s+#CONF:\s*(?P<confidence>\S+))?\s*$",
    )
    .expect("Hard-coded regex pattern should be valid")
});

/// A frequent itemset with its absolute support.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemSet {
    pub items: Vec<String>,
    pub support: u64,
}

/// An association rule `items ==> results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub items: Vec<String>,
    pub results: Vec<String>,
    pub support: u64,
    /// Probability in `[0, 1]`, as printed by the tool
    pub confidence: f64,
}

/// A sequential pattern: itemsets in temporal order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sequence {
    pub itemsets: Vec<Vec<String>>,
    pub support: u64,
}

/// One parsed output line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    #[serde(rename = "itemset")]
    ItemSet(ItemSet),
    Rule(Rule),
    Sequence(Sequence),
}

impl Pattern {
    /// Absolute support of the pattern.
    pub fn support(&self) -> u64 {
        match self {
            Pattern::ItemSet(itemset) => itemset.support,
            Pattern::Rule(rule) => rule.support,
            Pattern::Sequence(sequence) => sequence.support,
        }
    }

    /// Short name of the pattern shape.
    pub fn kind(&self) -> &'static str {
        match self {
            Pattern::ItemSet(_) => "itemset",
            Pattern::Rule(_) => "rule",
            Pattern::Sequence(_) => "sequence",
        }
    }
}

/// Parses a whole output file.
///
/// Blank lines are skipped. The first unrecognized line fails the parse and
/// no patterns are returned.
#[instrument(skip_all, fields(bytes = text.len()))]
pub fn parse_output(text: &str) -> Result<Vec<Pattern>> {
    let mut patterns = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if let Some(pattern) = parse_line(index + 1, line)? {
            patterns.push(pattern);
        }
    }
    debug!(patterns = patterns.len(), "Parsed mining output");
    Ok(patterns)
}

/// Classifies and parses a single output line.
///
/// Returns `Ok(None)` for blank lines. `line_number` is only used for errors.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<Pattern>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let caps = TRAILER
        .captures(trimmed)
        .ok_or_else(|| MinerError::unrecognized(line_number, trimmed, "missing '#SUP:' field"))?;

    let support: u64 = caps["support"]
        .parse()
        .map_err(|_| MinerError::unrecognized(line_number, trimmed, "support is not a count"))?;

    let confidence = match caps.name("confidence") {
        Some(raw) => Some(parse_confidence(raw.as_str()).ok_or_else(|| {
            MinerError::unrecognized(line_number, trimmed, "confidence is not in [0, 1]")
        })?),
        None => None,
    };

    let tokens: Vec<&str> = caps["body"].split_whitespace().collect();

    let mut candidates = [
        as_sequence(&tokens, support, confidence),
        as_rule(&tokens, support, confidence),
        as_itemset(&tokens, support, confidence),
    ]
    .into_iter()
    .flatten();

    match (candidates.next(), candidates.next()) {
        (Some(pattern), None) => Ok(Some(pattern)),
        (Some(_), Some(_)) => Err(MinerError::unrecognized(
            line_number,
            trimmed,
            "line matches more than one pattern grammar",
        )),
        (None, _) => Err(MinerError::unrecognized(
            line_number,
            trimmed,
            "no pattern grammar matched",
        )),
    }
}

fn parse_confidence(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && (0.0..=1.0).contains(value))
}

fn is_item(token: &str) -> bool {
    token != ITEMSET_SEPARATOR && token != RULE_ARROW && !token.starts_with('#')
}

fn to_items(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|token| token.to_string()).collect()
}

/// `(<item>+ -1)+`, no confidence.
fn as_sequence(tokens: &[&str], support: u64, confidence: Option<f64>) -> Option<Pattern> {
    if confidence.is_some() || tokens.last() != Some(&ITEMSET_SEPARATOR) {
        return None;
    }
    let mut itemsets = Vec::new();
    for group in tokens[..tokens.len() - 1].split(|token| *token == ITEMSET_SEPARATOR) {
        if group.is_empty() || !group.iter().all(|token| is_item(token)) {
            return None;
        }
        itemsets.push(to_items(group));
    }
    Some(Pattern::Sequence(Sequence { itemsets, support }))
}

/// `<item>+ ==> <item>+` with a confidence.
fn as_rule(tokens: &[&str], support: u64, confidence: Option<f64>) -> Option<Pattern> {
    let confidence = confidence?;
    let arrow = tokens.iter().position(|token| *token == RULE_ARROW)?;
    let (items, results) = (&tokens[..arrow], &tokens[arrow + 1..]);
    if items.is_empty() || results.is_empty() {
        return None;
    }
    if !items.iter().chain(results).all(|token| is_item(token)) {
        return None;
    }
    Some(Pattern::Rule(Rule {
        items: to_items(items),
        results: to_items(results),
        support,
        confidence,
    }))
}

/// `<item>+`, no confidence.
fn as_itemset(tokens: &[&str], support: u64, confidence: Option<f64>) -> Option<Pattern> {
    if confidence.is_some() || tokens.is_empty() || !tokens.iter().all(|token| is_item(token)) {
        return None;
    }
    Some(Pattern::ItemSet(ItemSet {
        items: to_items(tokens),
        support,
    }))
}
