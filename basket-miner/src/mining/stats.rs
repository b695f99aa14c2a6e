//! Progress counters scraped from the mining tool's diagnostic output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Hard-coded patterns, known to be valid.
#[allow(clippy::expect_used)]
static CANDIDATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Candidates count\s*:\s*(\d+)")
        .expect("Hard-coded regex pattern should be valid")
});

#[allow(clippy::expect_used)]
static TOTAL_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Total time\s*~?\s*:?\s*(\d+)\s*ms")
        .expect("Hard-coded regex pattern should be valid")
});

#[allow(clippy::expect_used)]
static MAX_MEMORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Maximum memory usage\s*:\s*(\d+(?:\.\d+)?)\s*mb")
        .expect("Hard-coded regex pattern should be valid")
});

/// Best-effort counters reported by the mining tool.
///
/// Any field stays `None` if the tool never printed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MiningStats {
    /// Number of candidate patterns generated
    pub candidates: Option<u64>,
    /// Wall time reported by the tool, in milliseconds
    pub execution_time_ms: Option<u64>,
    /// Peak memory reported by the tool, in megabytes
    pub memory_mb: Option<f64>,
}

impl MiningStats {
    /// Scans a chunk of diagnostic text and overwrites every counter it mentions.
    ///
    /// Within a chunk the last occurrence wins. Returns whether anything changed.
    pub fn update_from(&mut self, chunk: &str) -> bool {
        let mut updated = false;
        if let Some(value) = last_capture(&CANDIDATES, chunk).and_then(|v| v.parse().ok()) {
            self.candidates = Some(value);
            updated = true;
        }
        if let Some(value) = last_capture(&TOTAL_TIME, chunk).and_then(|v| v.parse().ok()) {
            self.execution_time_ms = Some(value);
            updated = true;
        }
        if let Some(value) = last_capture(&MAX_MEMORY, chunk).and_then(|v| v.parse().ok()) {
            self.memory_mb = Some(value);
            updated = true;
        }
        updated
    }

    /// Whether no counter was ever seen.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_none() && self.execution_time_ms.is_none() && self.memory_mb.is_none()
    }
}

fn last_capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
