//! Data source readers for basket-miner.
//!
//! Sources are read forward-only, one row at a time, so that arbitrarily large
//! order files never need to fit in memory as raw text.

mod csv;

pub use self::csv::{collect_matching, load_all, CsvOptions, Row, RowReader};
