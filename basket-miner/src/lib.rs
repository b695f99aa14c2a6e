//! # basket-miner
//!
//! Turns large delimited exports into transaction datasets and mines them
//! for frequent patterns with an external tool.
//!
//! The crate has two halves:
//!
//! - [`grouping`] streams a CSV file once and folds consecutive or scattered
//!   rows sharing a key column into [`Group`](grouping::Group)s, yielded in
//!   first-seen key order. [`dataset`] writes those groups in the
//!   one-transaction-per-line format the mining tool reads.
//! - [`mining`] spawns the tool (by default `java -jar spmf.jar`), scrapes its
//!   diagnostic output for counters, and parses its result file into typed
//!   itemsets, association rules and sequential patterns.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use basket_miner::prelude::*;
//! use basket_miner::dataset::TransactionWriter;
//! use basket_miner::mining::{Algorithm, MinerConfig, MiningAdapter};
//!
//! # async fn example() -> basket_miner::error::Result<()> {
//! // One transaction per order, items are product ids.
//! let reader = RowReader::from_path("order_products.csv", &CsvOptions::default())?;
//! let groups = GroupBy::new("order_id", |row: &Row| {
//!     row.get("product_id").unwrap_or_default().to_string()
//! })
//! .stream(reader)?;
//!
//! let mut writer = TransactionWriter::create("/tmp/orders.txt")?.with_min_items(2);
//! writer.write_all(groups)?;
//! writer.finish()?;
//!
//! let mut adapter = MiningAdapter::new(
//!     Algorithm::itemsets("FPGrowth_itemsets"),
//!     MinerConfig::default().with_jar("/opt/spmf/spmf.jar"),
//! );
//! adapter.set_input_file("/tmp/orders.txt")?;
//! let results = adapter.exec(0.5, None).await?;
//! println!("{} frequent itemsets", results.itemsets().count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The library emits [`tracing`] events and spans and never installs a
//! subscriber itself. Binaries can use [`logging::setup::init_logging`].

pub mod dataset;
pub mod error;
pub mod formatters;
pub mod grouping;
pub mod logging;
pub mod mining;
pub mod prelude;
pub mod sources;
