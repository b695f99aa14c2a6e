//! Prelude for commonly used types and traits in basket-miner.

pub use crate::error::{ErrorContext, MinerError, Result};
pub use crate::formatters::{FormatterConfig, ResultFormatter};
pub use crate::grouping::{Group, GroupBy, GroupSummary, SizeExtreme};
pub use crate::logging::LogConfig;
pub use crate::sources::{CsvOptions, Row, RowReader};
