//! Streaming, header-aware CSV reading.

use crate::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Options for configuring CSV file reading.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Whether the CSV file has a header row
    pub has_header: bool,
    /// Field delimiter (default: ',')
    pub delimiter: u8,
    /// Quote character (default: '"')
    pub quote: u8,
    /// Whether to trim whitespace around fields
    pub trim: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            quote: b'"',
            trim: false,
        }
    }
}

impl CsvOptions {
    /// Options for tab-separated files.
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }

    /// Sets the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether fields are trimmed.
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    fn builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(self.has_header)
            .delimiter(self.delimiter)
            .quote(self.quote)
            // Ragged rows must surface as parse errors.
            .flexible(false)
            .trim(if self.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            });
        builder
    }
}

/// One record of a delimited file, addressable by header name.
#[derive(Debug, Clone)]
pub struct Row {
    headers: Arc<csv::StringRecord>,
    record: csv::StringRecord,
}

impl Row {
    /// Builds a row from explicit headers and values.
    ///
    /// Mostly useful for tests and in-memory sources.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let (names, values): (Vec<&str>, Vec<&str>) = pairs.into_iter().unzip();
        Self {
            headers: Arc::new(csv::StringRecord::from(names)),
            record: csv::StringRecord::from(values),
        }
    }

    /// Returns the value of the named column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.record.get(idx))
    }

    /// Returns the value at a column index resolved with [`RowReader::column_index`].
    pub fn field(&self, index: usize) -> Option<&str> {
        self.record.get(index)
    }

    /// Iterates over `(column, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().zip(self.record.iter())
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.record.len()
    }

    /// Whether the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Byte offset of the row within its source, if known.
    pub fn byte_offset(&self) -> Option<u64> {
        self.record.position().map(|pos| pos.byte())
    }

    /// 1-based source line of the row, counting the header, if known.
    pub fn line(&self) -> Option<u64> {
        self.record.position().map(|pos| pos.line())
    }
}

/// Forward-only iterator of [`Row`]s over a delimited source.
///
/// The header row is read eagerly on construction; data rows are tokenized
/// one at a time as the iterator is advanced. After the first error the
/// iterator is fused and yields nothing more.
pub struct RowReader<R> {
    reader: csv::Reader<R>,
    headers: Arc<csv::StringRecord>,
    rows_read: u64,
    failed: bool,
}

impl RowReader<File> {
    /// Opens a CSV file for streaming.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self> {
        let file = File::open(path.as_ref()).with_context(|| {
            format!("Failed to open CSV file {}", path.as_ref().display())
        })?;
        Self::from_reader(file, options)
    }
}

impl<R: Read> RowReader<R> {
    /// Wraps any byte source.
    pub fn from_reader(source: R, options: &CsvOptions) -> Result<Self> {
        if !options.has_header {
            return Err(MinerError::Configuration(
                "Row-addressed reading requires a header row".to_string(),
            ));
        }
        let mut reader = options.builder().from_reader(source);
        let headers = Arc::new(reader.headers()?.clone());
        debug!(columns = ?headers, "Read CSV header");
        Ok(Self {
            reader,
            headers,
            rows_read: 0,
            failed: false,
        })
    }

    /// Column names, in file order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    /// Resolves a column name to its index.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| MinerError::ColumnNotFound {
                column: column.to_string(),
            })
    }

    /// Number of data rows yielded so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut record = csv::StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(true) => {
                self.rows_read += 1;
                Some(Ok(Row {
                    headers: Arc::clone(&self.headers),
                    record,
                }))
            }
            Ok(false) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err.into()))
            }
        }
    }
}

/// Reads every row of a CSV file into memory.
///
/// Intended for small lookup tables; use [`RowReader`] for large files.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_all(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Vec<Row>> {
    let rows = RowReader::from_path(path, options)?.collect::<Result<Vec<_>>>()?;
    debug!(rows = rows.len(), "Loaded CSV file");
    Ok(rows)
}

/// Collects `project_column` of every row whose `match_column` is one of `values`.
///
/// Builds exclusion sets such as "all products in aisles 24 and 83".
pub fn collect_matching(
    path: impl AsRef<Path>,
    options: &CsvOptions,
    match_column: &str,
    values: &HashSet<String>,
    project_column: &str,
) -> Result<HashSet<String>> {
    let reader = RowReader::from_path(path, options)?;
    let match_idx = reader.column_index(match_column)?;
    let project_idx = reader.column_index(project_column)?;

    let mut matched = HashSet::new();
    for row in reader {
        let row = row?;
        let hit = row.field(match_idx).is_some_and(|v| values.contains(v));
        if hit {
            if let Some(value) = row.field(project_idx) {
                matched.insert(value.to_string());
            }
        }
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = "order_id,product_id,add_to_cart_order\n1,49302,1\n1,11109,2\n36,39612,1\n";

    #[test]
    fn test_reads_rows_by_header() {
        let reader = RowReader::from_reader(ORDERS.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(
            reader.headers().collect::<Vec<_>>(),
            vec!["order_id", "product_id", "add_to_cart_order"]
        );

        let rows: Vec<Row> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("product_id"), Some("49302"));
        assert_eq!(rows[2].get("order_id"), Some("36"));
        assert_eq!(rows[2].get("missing"), None);
    }

    #[test]
    fn test_column_index() {
        let reader = RowReader::from_reader(ORDERS.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(reader.column_index("product_id").unwrap(), 1);
        assert!(matches!(
            reader.column_index("aisle_id"),
            Err(MinerError::ColumnNotFound { column }) if column == "aisle_id"
        ));
    }

    #[test]
    fn test_row_position() {
        let data = "k,v\n1,a\n2,b\n";
        let rows: Vec<Row> = RowReader::from_reader(data.as_bytes(), &CsvOptions::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows[0].line(), Some(2));
        assert_eq!(rows[1].line(), Some(3));
        assert_eq!(rows[1].byte_offset(), Some(8));
        assert_eq!(Row::from_pairs([("k", "1")]).line(), None);
    }

    #[test]
    fn test_ragged_row_is_parse_error_with_offset() {
        let data = "k,v\n1,a\n2\n3,c\n";
        let mut reader = RowReader::from_reader(data.as_bytes(), &CsvOptions::default()).unwrap();
        assert!(reader.next().unwrap().is_ok());

        let err = reader.next().unwrap().unwrap_err();
        match err {
            MinerError::Parse { byte, line, .. } => {
                assert_eq!(byte, 8);
                assert_eq!(line, 3);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        // fused after the failure
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_header_required() {
        let options = CsvOptions {
            has_header: false,
            ..Default::default()
        };
        assert!(matches!(
            RowReader::from_reader(ORDERS.as_bytes(), &options),
            Err(MinerError::Configuration(_))
        ));
    }

    #[test]
    fn test_tsv_and_trim() {
        let data = "k\tv\n 1 \t x \n";
        let options = CsvOptions::tsv().with_trim(true);
        let rows: Vec<Row> = RowReader::from_reader(data.as_bytes(), &options)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows[0].get("k"), Some("1"));
        assert_eq!(rows[0].get("v"), Some("x"));
    }

    #[test]
    fn test_row_from_pairs() {
        let row = Row::from_pairs([("k", "1"), ("v", "x")]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("v"), Some("x"));
        assert_eq!(row.iter().collect::<Vec<_>>(), vec![("k", "1"), ("v", "x")]);
        assert_eq!(row.byte_offset(), None);
    }
}
