//! Transaction-per-line dataset files.
//!
//! The mining tool reads one transaction per line with space-separated item
//! tokens. Lines are separated by `\r\n` and the file has no trailing
//! separator.

use crate::grouping::Group;
use crate::prelude::*;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const LINE_SEPARATOR: &[u8] = b"\r\n";

/// Outcome of writing a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Transactions written
    pub written: usize,
    /// Groups dropped by the minimum-items threshold
    pub skipped: usize,
}

/// Writes groups as transactions.
///
/// ```rust
/// use basket_miner::dataset::TransactionWriter;
/// use basket_miner::grouping::Group;
///
/// let mut out = Vec::new();
/// let mut writer = TransactionWriter::new(&mut out);
/// writer.write_group(&Group { id: "1".into(), items: vec!["196", "14084"] }).unwrap();
/// writer.write_group(&Group { id: "2".into(), items: vec!["12427"] }).unwrap();
/// writer.finish().unwrap();
/// assert_eq!(out, b"196 14084\r\n12427");
/// ```
pub struct TransactionWriter<W: Write> {
    out: W,
    min_items: usize,
    summary: WriteSummary,
}

impl TransactionWriter<BufWriter<File>> {
    /// Creates (or truncates) a dataset file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref()).with_context(|| {
            format!("Failed to create dataset file {}", path.as_ref().display())
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TransactionWriter<W> {
    /// Wraps any writer.
    pub fn new(out: W) -> Self {
        Self {
            out,
            min_items: 0,
            summary: WriteSummary::default(),
        }
    }

    /// Drops groups with fewer than `min_items` items.
    pub fn with_min_items(mut self, min_items: usize) -> Self {
        self.min_items = min_items;
        self
    }

    /// Writes one group as a transaction line.
    ///
    /// Returns whether the group was written.
    pub fn write_group<V: Display>(&mut self, group: &Group<V>) -> Result<bool> {
        if group.items.len() < self.min_items || group.items.is_empty() {
            self.summary.skipped += 1;
            return Ok(false);
        }
        if self.summary.written > 0 {
            self.out.write_all(LINE_SEPARATOR)?;
        }
        let mut items = group.items.iter();
        if let Some(first) = items.next() {
            write!(self.out, "{first}")?;
        }
        for item in items {
            write!(self.out, " {item}")?;
        }
        self.summary.written += 1;
        Ok(true)
    }

    /// Writes every group of a fallible group stream.
    pub fn write_all<V, I>(&mut self, groups: I) -> Result<()>
    where
        V: Display,
        I: IntoIterator<Item = Result<Group<V>>>,
    {
        for group in groups {
            self.write_group(&group?)?;
        }
        Ok(())
    }

    /// Flushes the writer and returns what was written.
    pub fn finish(mut self) -> Result<WriteSummary> {
        self.out.flush()?;
        info!(
            written = self.summary.written,
            skipped = self.summary.skipped,
            "Dataset written"
        );
        Ok(self.summary)
    }
}

/// Renders groups as an in-memory dataset, suitable for inline mining input.
pub fn format_transactions<V: Display>(groups: &[Group<V>]) -> String {
    groups
        .iter()
        .filter(|group| !group.items.is_empty())
        .map(|group| {
            group
                .items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Writes `id,count` lines, one per group, separated by `\r\n`.
pub fn write_counts<W: Write>(mut out: W, counts: &[(String, usize)]) -> Result<()> {
    for (index, (id, count)) in counts.iter().enumerate() {
        if index > 0 {
            out.write_all(LINE_SEPARATOR)?;
        }
        write!(out, "{id},{count}")?;
    }
    out.flush()?;
    Ok(())
}
