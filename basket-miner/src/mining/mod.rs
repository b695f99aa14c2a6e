//! Driving an external frequent-pattern mining tool.
//!
//! The tool is an opaque executable (by default `java -jar spmf.jar`) invoked
//! with positional arguments:
//!
//! ```text
//! <launcher args...> <run-mode> <algorithm> <input> <output> <support>% [<confidence>%]
//! ```
//!
//! Its standard output is treated as free text and scraped for
//! [`MiningStats`]; its output file is the authoritative result and is parsed
//! into [`Pattern`]s.

mod adapter;
pub mod parser;
pub mod stats;

pub use adapter::MiningAdapter;
pub use parser::{parse_line, parse_output, ItemSet, Pattern, Rule, Sequence};
pub use stats::MiningStats;

use crate::logging::LogConfig;
use crate::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Algorithm names that produce sequential patterns.
const SEQUENTIAL_ALGORITHMS: &[&str] = &[
    "prefixspan",
    "spam",
    "spade",
    "cm-spade",
    "gsp",
    "clospan",
    "bide+",
    "vmsp",
    "maxsp",
    "cm-clasp",
    "fournier08",
    "lapin",
    "tks",
];

/// What an algorithm produces, which decides whether it takes a confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// Frequent itemsets, support only
    Itemsets,
    /// Association rules, support and confidence
    Rules,
    /// Sequential patterns, support only
    Sequences,
}

/// A named algorithm of the mining tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Algorithm {
    name: String,
    kind: AlgorithmKind,
}

impl Algorithm {
    /// An algorithm with an explicit kind.
    pub fn new(name: impl Into<String>, kind: AlgorithmKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// A frequent itemset miner, e.g. `FPGrowth_itemsets`.
    pub fn itemsets(name: impl Into<String>) -> Self {
        Self::new(name, AlgorithmKind::Itemsets)
    }

    /// An association rule miner, e.g. `FPGrowth_association_rules`.
    pub fn rules(name: impl Into<String>) -> Self {
        Self::new(name, AlgorithmKind::Rules)
    }

    /// A sequential pattern miner, e.g. `PrefixSpan`.
    pub fn sequences(name: impl Into<String>) -> Self {
        Self::new(name, AlgorithmKind::Sequences)
    }

    /// Guesses the kind from the algorithm name.
    ///
    /// Names mentioning `rules` are rule miners, a fixed list of well-known
    /// sequential miners are sequence miners, anything else mines itemsets.
    pub fn infer(name: impl Into<String>) -> Self {
        let name = name.into();
        let lower = name.to_lowercase();
        let kind = if lower.contains("rules") {
            AlgorithmKind::Rules
        } else if SEQUENTIAL_ALGORITHMS
            .iter()
            .any(|known| lower == *known || lower.starts_with(&format!("{known}_")))
        {
            AlgorithmKind::Sequences
        } else {
            AlgorithmKind::Itemsets
        };
        Self { name, kind }
    }

    /// The name passed to the tool.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the algorithm produces.
    pub fn kind(&self) -> AlgorithmKind {
        self.kind
    }

    /// Whether the algorithm takes a minimum confidence.
    pub fn uses_confidence(&self) -> bool {
        self.kind == AlgorithmKind::Rules
    }

    /// The name with every character unsafe in file names replaced.
    pub(crate) fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// How the mining tool is launched and where it writes.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Executable to spawn
    pub program: String,
    /// Arguments placed before the run mode
    pub launcher_args: Vec<String>,
    /// First tool argument, selecting the tool's command
    pub run_mode: String,
    /// Directory for inline datasets and output files
    pub work_dir: PathBuf,
    /// Library logging knobs
    pub log: LogConfig,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            launcher_args: vec!["-jar".to_string(), "spmf.jar".to_string()],
            run_mode: "run".to_string(),
            work_dir: std::env::temp_dir(),
            log: LogConfig::default(),
        }
    }
}

impl MinerConfig {
    /// Runs a jar through `java -jar <jar>`.
    pub fn with_jar(mut self, jar: impl AsRef<Path>) -> Self {
        self.program = "java".to_string();
        self.launcher_args = vec![
            "-jar".to_string(),
            jar.as_ref().to_string_lossy().into_owned(),
        ];
        self
    }

    /// Sets the executable to spawn.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the arguments placed before the run mode.
    pub fn with_launcher_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launcher_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the run mode argument.
    pub fn with_run_mode(mut self, run_mode: impl Into<String>) -> Self {
        self.run_mode = run_mode.into();
        self
    }

    /// Sets the working directory.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Sets the library logging knobs.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Checks the configuration before anything is spawned.
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(MinerError::Configuration(
                "Mining program must not be empty".to_string(),
            ));
        }
        if self.run_mode.trim().is_empty() {
            return Err(MinerError::Configuration(
                "Run mode must not be empty".to_string(),
            ));
        }
        if !self.work_dir.is_dir() {
            return Err(MinerError::Configuration(format!(
                "Work directory {} does not exist",
                self.work_dir.display()
            )));
        }
        Ok(())
    }
}

/// Where the transactions come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningInput {
    /// A dataset file already in the tool's format
    File(PathBuf),
    /// Transactions held in memory, written to a temporary file before the run
    Inline(String),
}

impl MiningInput {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            MiningInput::File(_) => "file",
            MiningInput::Inline(_) => "string",
        }
    }
}

/// Everything one run of the mining tool produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningResults {
    /// Algorithm name
    pub algorithm: String,
    /// Counters scraped from the tool's output, last value per field
    pub stats: MiningStats,
    /// Parsed output, in file order
    pub patterns: Vec<Pattern>,
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Dataset file the tool read
    pub input_path: PathBuf,
    /// Output file the tool wrote
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MiningResults {
    /// Frequent itemsets in the result.
    pub fn itemsets(&self) -> impl Iterator<Item = &ItemSet> {
        self.patterns.iter().filter_map(|p| match p {
            Pattern::ItemSet(itemset) => Some(itemset),
            _ => None,
        })
    }

    /// Association rules in the result.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.patterns.iter().filter_map(|p| match p {
            Pattern::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    /// Sequential patterns in the result.
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.patterns.iter().filter_map(|p| match p {
            Pattern::Sequence(sequence) => Some(sequence),
            _ => None,
        })
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the tool found nothing.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Wall time measured around the process, in milliseconds.
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
