//! basket
//!
//! Groups order lines into transactions and mines them with an external
//! frequent-pattern tool.

use anyhow::{bail, Context, Result};
use basket_miner::dataset::{format_transactions, write_counts, TransactionWriter};
use basket_miner::formatters::{FormatterConfig, HumanFormatter, JsonFormatter, ResultFormatter};
use basket_miner::grouping::{GroupBy, GroupSummary, SizeExtreme};
use basket_miner::logging::setup::{init_logging, SubscriberConfig};
use basket_miner::logging::{LogConfig, Verbosity};
use basket_miner::mining::{Algorithm, AlgorithmKind, MinerConfig, MiningAdapter};
use basket_miner::sources::{collect_matching, CsvOptions, Row, RowReader};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Tied groups listed by `summary` before eliding the rest.
const MAX_LISTED_IDS: usize = 10;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output, including every line the mining tool prints
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Group a CSV file into a transaction dataset
    Group(GroupArgs),
    /// Report group sizes and optionally write `id,count` lines
    Summary(SummaryArgs),
    /// Run a mining algorithm on a transaction dataset
    Mine(MineArgs),
}

#[derive(Args, Debug)]
struct CsvArgs {
    /// CSV file to read
    #[arg(short, long)]
    input: PathBuf,

    /// Column whose value identifies a transaction
    #[arg(short, long, default_value = "order_id")]
    key: String,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl CsvArgs {
    fn options(&self) -> Result<CsvOptions> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character");
        }
        Ok(CsvOptions::default().with_delimiter(self.delimiter as u8))
    }
}

#[derive(Args, Debug)]
struct GroupArgs {
    #[command(flatten)]
    csv: CsvArgs,

    /// Column projected into each transaction
    #[arg(long, default_value = "product_id")]
    value: String,

    /// Lookup table used to build an exclusion set, e.g. products.csv
    #[arg(long, requires = "exclude_values")]
    exclude_lookup: Option<PathBuf>,

    /// Lookup column compared against --exclude-values
    #[arg(long, default_value = "aisle_id")]
    exclude_match_column: String,

    /// Lookup values whose rows are excluded
    #[arg(long, value_delimiter = ',')]
    exclude_values: Vec<String>,

    /// Lookup column holding the excluded item values
    #[arg(long, default_value = "product_id")]
    exclude_project_column: String,

    /// Drop transactions with fewer items
    #[arg(long, default_value_t = 1)]
    min_items: usize,

    /// Dataset file to write
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    #[command(flatten)]
    csv: CsvArgs,

    /// File receiving one `id,count` line per group
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Itemsets,
    Rules,
    Sequences,
}

impl From<KindArg> for AlgorithmKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Itemsets => AlgorithmKind::Itemsets,
            KindArg::Rules => AlgorithmKind::Rules,
            KindArg::Sequences => AlgorithmKind::Sequences,
        }
    }
}

#[derive(Args, Debug)]
struct MineArgs {
    /// Algorithm name understood by the mining tool
    #[arg(short, long)]
    algorithm: String,

    /// What the algorithm produces; guessed from its name when omitted
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Transaction dataset
    #[arg(short, long, required_unless_present = "from_csv")]
    input: Option<PathBuf>,

    /// CSV file grouped in memory and handed to the tool inline
    #[arg(long, conflicts_with = "input")]
    from_csv: Option<PathBuf>,

    /// Grouping column for --from-csv
    #[arg(long, default_value = "order_id")]
    key: String,

    /// Column projected into each transaction for --from-csv
    #[arg(long, default_value = "product_id")]
    value: String,

    /// Drop --from-csv transactions with fewer items
    #[arg(long, default_value_t = 1)]
    min_items: usize,

    /// Minimum support, in percent
    #[arg(short, long)]
    support: f64,

    /// Minimum confidence, in percent (rule miners only)
    #[arg(short, long)]
    confidence: Option<f64>,

    /// Jar run through `java -jar`
    #[arg(long, default_value = "spmf.jar", conflicts_with = "program")]
    jar: PathBuf,

    /// Executable to run instead of `java -jar <jar>`
    #[arg(long)]
    program: Option<String>,

    /// Arguments placed before the run mode when --program is used
    #[arg(long = "launcher-arg", requires = "program")]
    launcher_args: Vec<String>,

    /// Directory for the tool's output file
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Maximum number of patterns to print (-1 for all)
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    max_patterns: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    init_logging(&SubscriberConfig::new(verbosity).with_json(cli.json_logs))?;
    let log = LogConfig::for_verbosity(verbosity);

    match cli.command {
        Command::Group(args) => {
            tokio::task::spawn_blocking(move || group(args)).await??;
        }
        Command::Summary(args) => {
            tokio::task::spawn_blocking(move || summary(args)).await??;
        }
        Command::Mine(args) => mine(args, log).await?,
    }
    Ok(())
}

fn group(args: GroupArgs) -> Result<()> {
    let options = args.csv.options()?;

    let excluded: HashSet<String> = match &args.exclude_lookup {
        Some(lookup) => {
            let values: HashSet<String> = args.exclude_values.iter().cloned().collect();
            collect_matching(
                lookup,
                &options,
                &args.exclude_match_column,
                &values,
                &args.exclude_project_column,
            )
            .with_context(|| format!("reading lookup table {}", lookup.display()))?
        }
        None => HashSet::new(),
    };
    info!(excluded = excluded.len(), "Built exclusion set");

    let value_column = args.value.clone();
    let filter_column = args.value.clone();
    let reader = RowReader::from_path(&args.csv.input, &options)?;
    reader.column_index(&value_column)?;

    let groups = GroupBy::new(args.csv.key.clone(), move |row: &Row| {
        row.get(&value_column).unwrap_or_default().to_string()
    })
    .with_filter(move |row: &Row| {
        row.get(&filter_column)
            .is_some_and(|value| !excluded.contains(value))
    })
    .stream(reader)?;

    let mut writer = TransactionWriter::create(&args.output)?.with_min_items(args.min_items);
    writer.write_all(groups)?;
    let written = writer.finish()?;

    println!(
        "Wrote {} transactions to {} ({} below {} items skipped)",
        written.written,
        args.output.display(),
        written.skipped,
        args.min_items
    );
    Ok(())
}

fn summary(args: SummaryArgs) -> Result<()> {
    let options = args.csv.options()?;
    let reader = RowReader::from_path(&args.csv.input, &options)?;
    let groups = GroupBy::new(args.csv.key.clone(), |_: &Row| ()).stream(reader)?;

    let mut stats = GroupSummary::new();
    let mut counts = Vec::new();
    for group in groups {
        let group = group?;
        stats.observe(&group);
        counts.push((group.id, group.items.len()));
    }

    if let Some(output) = &args.output {
        let file = File::create(output)
            .with_context(|| format!("creating counts file {}", output.display()))?;
        write_counts(BufWriter::new(file), &counts)?;
    }

    println!("Groups: {}", stats.groups);
    println!("Items: {}", stats.total_items);
    if let Some(smallest) = &stats.smallest {
        println!("Smallest: {}", describe_extreme(smallest));
    }
    if let Some(largest) = &stats.largest {
        println!("Largest: {}", describe_extreme(largest));
    }
    if let Some(mean) = stats.mean_items() {
        println!("Average: {mean:.2} items");
    }
    Ok(())
}

/// `2 items, 3 groups: 17, 40, 52`
fn describe_extreme(extreme: &SizeExtreme) -> String {
    let mut ids = extreme
        .ids
        .iter()
        .take(MAX_LISTED_IDS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if extreme.ids.len() > MAX_LISTED_IDS {
        ids.push_str(&format!(", ... {} more", extreme.ids.len() - MAX_LISTED_IDS));
    }
    let groups = if extreme.ids.len() == 1 { "group" } else { "groups" };
    format!(
        "{} items, {} {groups}: {ids}",
        extreme.size,
        extreme.ids.len()
    )
}

/// Groups a CSV file into an in-memory dataset for inline mining input.
fn inline_dataset(source: &Path, key: &str, value: &str, min_items: usize) -> Result<String> {
    let reader = RowReader::from_path(source, &CsvOptions::default())?;
    reader.column_index(value)?;

    let value = value.to_string();
    let groups = GroupBy::new(key, move |row: &Row| {
        row.get(&value).unwrap_or_default().to_string()
    })
    .stream(reader)?
    .filter(|group| group.as_ref().map_or(true, |g| g.len() >= min_items))
    .collect::<basket_miner::error::Result<Vec<_>>>()?;

    info!(transactions = groups.len(), "Grouped inline dataset");
    Ok(format_transactions(&groups))
}

async fn mine(args: MineArgs, log: LogConfig) -> Result<()> {
    let algorithm = match args.kind {
        Some(kind) => Algorithm::new(&args.algorithm, kind.into()),
        None => Algorithm::infer(&args.algorithm),
    };

    let mut config = match &args.program {
        Some(program) => MinerConfig::default()
            .with_program(program)
            .with_launcher_args(args.launcher_args.iter().cloned()),
        None => MinerConfig::default().with_jar(&args.jar),
    }
    .with_log_config(log);
    if let Some(work_dir) = &args.work_dir {
        config = config.with_work_dir(work_dir);
    }

    let mut adapter = MiningAdapter::new(algorithm, config);
    match (&args.input, &args.from_csv) {
        (Some(input), _) => {
            adapter.set_input_file(input)?;
        }
        (None, Some(source)) => {
            let source = source.clone();
            let (key, value, min_items) = (args.key.clone(), args.value.clone(), args.min_items);
            let data = tokio::task::spawn_blocking(move || {
                inline_dataset(&source, &key, &value, min_items)
            })
            .await??;
            adapter.set_input_data(data)?;
        }
        (None, None) => bail!("either --input or --from-csv is required"),
    }
    let results = adapter.exec(args.support, args.confidence).await?;

    let format = FormatterConfig::default()
        .with_colors(!args.json)
        .with_max_patterns(args.max_patterns);
    let rendered = if args.json {
        JsonFormatter::with_config(format).format(&results)?
    } else {
        HumanFormatter::with_config(format).format(&results)?
    };
    println!("{rendered}");
    Ok(())
}
