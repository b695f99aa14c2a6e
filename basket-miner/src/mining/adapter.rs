//! Process lifecycle of one mining run.

use super::{parse_output, Algorithm, MinerConfig, MiningInput, MiningResults, MiningStats};
use crate::logging::truncate_line;
use crate::prelude::*;
use crate::{log_dataset_write, log_process_line};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// Wraps the external mining tool for one algorithm.
///
/// An adapter holds exactly one input, set once with
/// [`set_input_file`](Self::set_input_file) or
/// [`set_input_data`](Self::set_input_data), and runs the tool through
/// [`exec`](Self::exec). `exec` borrows the adapter mutably, so an instance
/// never has two runs in flight.
///
/// Dropping the future returned by `exec` kills the spawned process.
///
/// # Examples
///
/// ```rust,no_run
/// use basket_miner::mining::{Algorithm, MinerConfig, MiningAdapter};
///
/// # async fn example() -> basket_miner::error::Result<()> {
/// let config = MinerConfig::default().with_jar("/opt/spmf/spmf.jar");
/// let mut adapter = MiningAdapter::new(Algorithm::rules("FPGrowth_association_rules"), config);
/// adapter.set_input_file("formatted_itemsets.txt")?;
///
/// let results = adapter.exec(1.0, Some(40.0)).await?;
/// for rule in results.rules() {
///     println!("{:?} => {:?} ({})", rule.items, rule.results, rule.confidence);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MiningAdapter {
    algorithm: Algorithm,
    config: MinerConfig,
    input: Option<MiningInput>,
}

impl MiningAdapter {
    /// Creates an adapter with no input.
    pub fn new(algorithm: Algorithm, config: MinerConfig) -> Self {
        Self {
            algorithm,
            config,
            input: None,
        }
    }

    /// The wrapped algorithm.
    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    /// The configured input, if any.
    pub fn input(&self) -> Option<&MiningInput> {
        self.input.as_ref()
    }

    /// Uses a dataset file already in the tool's format.
    pub fn set_input_file(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self> {
        self.set_input(MiningInput::File(path.into()))
    }

    /// Uses an in-memory dataset: one transaction per line, items separated by
    /// a single space.
    pub fn set_input_data(&mut self, data: impl Into<String>) -> Result<&mut Self> {
        self.set_input(MiningInput::Inline(data.into()))
    }

    fn set_input(&mut self, input: MiningInput) -> Result<&mut Self> {
        if let Some(existing) = &self.input {
            if existing.describe() != input.describe() {
                return Err(MinerError::ConflictingInput {
                    existing: existing.describe(),
                    attempted: input.describe(),
                });
            }
        }
        self.input = Some(input);
        Ok(self)
    }

    /// Runs the tool with a minimum support and, for rule miners, a minimum
    /// confidence. Both are percentages in `0..=100`.
    ///
    /// Argument and input errors are reported before anything is spawned. The
    /// output file is read whatever the exit code; if it cannot be read the
    /// run fails with [`MinerError::ExecutionFailure`].
    #[instrument(skip(self), fields(algorithm = %self.algorithm))]
    pub async fn exec(&mut self, support: f64, confidence: Option<f64>) -> Result<MiningResults> {
        self.check_arguments(support, confidence)?;
        let input = self.input.as_ref().ok_or(MinerError::MissingInput)?;
        self.config.validate()?;

        let stamp = unique_stamp()?;
        let input_path = match input {
            MiningInput::File(path) => path.clone(),
            MiningInput::Inline(data) => self.write_dataset(stamp, data).await?,
        };
        let output_path = self.config.work_dir.join(format!(
            "{stamp}_itemsets_{}_{support}.txt",
            self.algorithm.file_stem()
        ));

        let args = self.arguments(&input_path, &output_path, support, confidence);
        info!(program = %self.config.program, args = ?args, "Spawning mining process");

        let started_at = Utc::now();
        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MinerError::ProcessSpawn {
                program: self.config.program.clone(),
                source,
            })?;

        let mut stats = MiningStats::default();
        let log = &self.config.log;
        let mut observe = |stream: &str, line: String| {
            log_process_line!(
                log,
                stream,
                line = %truncate_line(&line, log.max_line_length),
                "Mining process output"
            );
            stats.update_from(&line);
        };

        let mut stdout = child
            .stdout
            .take()
            .map(|out| BufReader::new(out).split(b'\n'));
        let mut stderr = child
            .stderr
            .take()
            .map(|err| BufReader::new(err).split(b'\n'));
        let (mut stdout_open, mut stderr_open) = (stdout.is_some(), stderr.is_some());

        while stdout_open || stderr_open {
            tokio::select! {
                line = next_line(&mut stdout), if stdout_open => match line? {
                    Some(line) => observe("stdout", line),
                    None => stdout_open = false,
                },
                line = next_line(&mut stderr), if stderr_open => match line? {
                    Some(line) => observe("stderr", line),
                    None => stderr_open = false,
                },
            }
        }

        let status = child.wait().await?;
        let finished_at = Utc::now();
        let exit_code = status.code();
        if !status.success() {
            warn!(exit_code = ?exit_code, "Mining process exited unsuccessfully");
        }

        let text = tokio::fs::read_to_string(&output_path)
            .await
            .map_err(|err| {
                MinerError::execution_failure(
                    exit_code,
                    &output_path,
                    format!("cannot read output file {}: {err}", output_path.display()),
                )
            })?;
        let patterns = parse_output(&text)?;

        info!(
            patterns = patterns.len(),
            exit_code = ?exit_code,
            candidates = ?stats.candidates,
            time_ms = ?stats.execution_time_ms,
            memory_mb = ?stats.memory_mb,
            "Mining complete"
        );

        Ok(MiningResults {
            algorithm: self.algorithm.name().to_string(),
            stats,
            patterns,
            exit_code,
            input_path,
            output_path,
            started_at,
            finished_at,
        })
    }

    fn check_arguments(&self, support: f64, confidence: Option<f64>) -> Result<()> {
        check_percentage("support", support)?;
        match (self.algorithm.uses_confidence(), confidence) {
            (true, Some(confidence)) => check_percentage("confidence", confidence),
            (true, None) => Err(MinerError::InvalidArgument(format!(
                "{} mines association rules and requires a confidence",
                self.algorithm
            ))),
            (false, Some(_)) => Err(MinerError::InvalidArgument(format!(
                "{} does not take a confidence",
                self.algorithm
            ))),
            (false, None) => Ok(()),
        }
    }

    fn arguments(
        &self,
        input: &Path,
        output: &Path,
        support: f64,
        confidence: Option<f64>,
    ) -> Vec<String> {
        let mut args = self.config.launcher_args.clone();
        args.push(self.config.run_mode.clone());
        args.push(self.algorithm.name().to_string());
        args.push(input.to_string_lossy().into_owned());
        args.push(output.to_string_lossy().into_owned());
        args.push(format!("{support}%"));
        if let Some(confidence) = confidence {
            args.push(format!("{confidence}%"));
        }
        args
    }

    async fn write_dataset(&self, stamp: u64, data: &str) -> Result<PathBuf> {
        let path = self.config.work_dir.join(format!(
            "{stamp}_dataset_{}.txt",
            self.algorithm.file_stem()
        ));
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write dataset {}", path.display()))?;
        log_dataset_write!(
            self.config.log,
            path = %path.display(),
            bytes = data.len(),
            "Wrote inline dataset"
        );
        Ok(path)
    }
}

fn check_percentage(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(MinerError::InvalidArgument(format!(
            "{name} must be a percentage between 0 and 100, got {value}"
        )))
    }
}

/// Nanoseconds since the epoch, strictly increasing within the process so
/// that concurrent runs never share file names.
fn unique_stamp() -> Result<u64> {
    static LAST: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| MinerError::Internal(format!("Failed to get system time: {e}")))?;
    let now = u64::try_from(now.as_nanos())
        .map_err(|_| MinerError::Internal("System time out of range".to_string()))?;
    let previous = LAST
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    Ok(now.max(previous + 1))
}

async fn next_line<R>(lines: &mut Option<Split<R>>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(lines) = lines else {
        return Ok(None);
    };
    Ok(lines.next_segment().await?.map(|bytes| {
        String::from_utf8_lossy(&bytes)
            .trim_end_matches('\r')
            .to_string()
    }))
}
