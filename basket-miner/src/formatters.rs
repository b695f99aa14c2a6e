//! Rendering of mining results for people and programs.
//!
//! # Examples
//!
//! ```rust
//! use basket_miner::formatters::{HumanFormatter, JsonFormatter, ResultFormatter};
//!
//! let human = HumanFormatter::new();
//! let json = JsonFormatter::new().with_pretty(false);
//! // let results: MiningResults = adapter.exec(1.0, None).await?;
//! // println!("{}", human.format(&results)?);
//! ```

use crate::mining::{MiningResults, Pattern};
use crate::prelude::*;
use serde::Serialize;
use std::fmt::Write;

/// Configuration options for formatting mining results.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the counters scraped from the tool
    pub include_stats: bool,
    /// Include individual patterns
    pub include_patterns: bool,
    /// Maximum number of patterns to display (-1 for all)
    pub max_patterns: i32,
    /// Whether to use colorized output (human formatter)
    pub use_colors: bool,
    /// Whether to include run timestamps
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_stats: true,
            include_patterns: true,
            max_patterns: -1,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Summary and counters only.
    pub fn minimal() -> Self {
        Self {
            include_stats: true,
            include_patterns: false,
            max_patterns: 0,
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Plain output with a bounded pattern list, for CI logs.
    pub fn ci() -> Self {
        Self {
            include_stats: true,
            include_patterns: true,
            max_patterns: 50,
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_stats(mut self, include: bool) -> Self {
        self.include_stats = include;
        self
    }

    pub fn with_patterns(mut self, include: bool) -> Self {
        self.include_patterns = include;
        self
    }

    pub fn with_max_patterns(mut self, max: i32) -> Self {
        self.max_patterns = max;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn visible<'a>(&self, patterns: &'a [Pattern]) -> &'a [Pattern] {
        if !self.include_patterns {
            &[]
        } else if self.max_patterns < 0 {
            patterns
        } else {
            &patterns[..patterns.len().min(self.max_patterns as usize)]
        }
    }
}

/// Turns mining results into a string.
pub trait ResultFormatter {
    /// Formats results with the formatter's own configuration.
    fn format(&self, results: &MiningResults) -> Result<String>;

    /// Formats results with an explicit configuration.
    fn format_with_config(
        &self,
        results: &MiningResults,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(results)
    }
}

/// Structured JSON output.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    algorithm: &'a str,
    exit_code: Option<i32>,
    pattern_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a crate::mining::MiningStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<i64>,
    output_path: String,
    patterns: &'a [Pattern],
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, results: &MiningResults) -> Result<String> {
        self.format_with_config(results, &self.config)
    }

    fn format_with_config(
        &self,
        results: &MiningResults,
        config: &FormatterConfig,
    ) -> Result<String> {
        let report = JsonReport {
            algorithm: &results.algorithm,
            exit_code: results.exit_code,
            pattern_count: results.len(),
            stats: config.include_stats.then_some(&results.stats),
            started_at: config
                .include_timestamps
                .then(|| results.started_at.to_rfc3339()),
            elapsed_ms: config.include_timestamps.then(|| results.elapsed_ms()),
            output_path: results.output_path.display().to_string(),
            patterns: config.visible(&results.patterns),
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };
        json.map_err(|e| MinerError::Serialization(format!("Failed to serialize results: {e}")))
    }
}

/// Console output.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, results: &MiningResults) -> Result<String> {
        self.format_with_config(results, &self.config)
    }

    fn format_with_config(
        &self,
        results: &MiningResults,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        let paint = |code: &str, text: String| {
            if config.use_colors {
                format!("\x1b[{code}m{text}\x1b[0m")
            } else {
                text
            }
        };

        writeln!(output)?;
        let status = match results.exit_code {
            Some(0) => paint("32", "Mining COMPLETED".to_string()),
            Some(code) => paint("33", format!("Mining COMPLETED (exit code {code})")),
            None => paint("33", "Mining COMPLETED (terminated by signal)".to_string()),
        };
        writeln!(output, "{status}")?;
        writeln!(output)?;
        writeln!(output, "Algorithm: {}", results.algorithm)?;
        writeln!(output, "Output: {}", results.output_path.display())?;
        if config.include_timestamps {
            writeln!(output, "Started: {}", results.started_at)?;
            writeln!(output, "Elapsed: {}ms", results.elapsed_ms())?;
        }

        if config.include_stats {
            writeln!(output)?;
            writeln!(output, "Summary:")?;
            writeln!(output, "   Patterns: {}", results.len())?;
            writeln!(output, "   Itemsets: {}", results.itemsets().count())?;
            writeln!(output, "   Rules: {}", results.rules().count())?;
            writeln!(output, "   Sequences: {}", results.sequences().count())?;
            let stats = &results.stats;
            if let Some(candidates) = stats.candidates {
                writeln!(output, "   Candidates: {candidates}")?;
            }
            if let Some(time) = stats.execution_time_ms {
                writeln!(output, "   Tool time: {time}ms")?;
            }
            if let Some(memory) = stats.memory_mb {
                writeln!(output, "   Peak memory: {memory:.2} mb")?;
            }
        }

        let shown = config.visible(&results.patterns);
        if !shown.is_empty() {
            writeln!(output)?;
            writeln!(output, "Patterns:")?;
            for pattern in shown {
                writeln!(output, "   {}", describe(pattern))?;
            }
            if results.len() > shown.len() {
                writeln!(
                    output,
                    "   ... and {} more patterns (use --max-patterns to show more)",
                    results.len() - shown.len()
                )?;
            }
        }

        writeln!(output)?;
        Ok(output)
    }
}

fn describe(pattern: &Pattern) -> String {
    match pattern {
        Pattern::ItemSet(itemset) => {
            format!("{{{}}} support={}", itemset.items.join(" "), itemset.support)
        }
        Pattern::Rule(rule) => format!(
            "{{{}}} => {{{}}} support={} confidence={:.3}",
            rule.items.join(" "),
            rule.results.join(" "),
            rule.support,
            rule.confidence
        ),
        Pattern::Sequence(sequence) => {
            let steps: Vec<String> = sequence
                .itemsets
                .iter()
                .map(|itemset| format!("<{}>", itemset.join(" ")))
                .collect();
            format!("{} support={}", steps.join(" "), sequence.support)
        }
    }
}
