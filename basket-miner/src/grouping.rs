//! Streaming group-by over row sources.
//!
//! [`GroupBy`] turns a stream of [`Row`]s into one [`Group`] per distinct value
//! of a key column. Keys are not assumed to be sorted, so every group stays
//! open until the source is exhausted; the groups are then yielded in the
//! order their key was first seen.
//!
//! ```rust,no_run
//! use basket_miner::grouping::GroupBy;
//! use basket_miner::sources::{CsvOptions, RowReader};
//!
//! # fn example() -> basket_miner::error::Result<()> {
//! let reader = RowReader::from_path("order_products__train.csv", &CsvOptions::default())?;
//! let groups = GroupBy::new("order_id", |row| {
//!     row.get("product_id").unwrap_or_default().to_string()
//! })
//! .stream(reader)?;
//!
//! for group in groups {
//!     let group = group?;
//!     println!("{} -> {}", group.id, group.items.join(" "));
//! }
//! # Ok(())
//! # }
//! ```

use crate::prelude::*;
use crate::sources::{Row, RowReader};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, info, instrument};

/// All mapped values sharing one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group<V> {
    /// Key value, verbatim from the grouping column
    pub id: String,
    /// Mapped values in the order their rows were read
    pub items: Vec<V>,
}

impl<V> Group<V> {
    /// Number of items in the group.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the group has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

type MapFn<'a, V> = Box<dyn Fn(&Row) -> V + Send + 'a>;
type FilterFn<'a> = Box<dyn Fn(&Row) -> bool + Send + 'a>;

/// Grouping definition: key column, row projection and optional row filter.
pub struct GroupBy<'a, V> {
    key: String,
    map: MapFn<'a, V>,
    filter: Option<FilterFn<'a>>,
}

impl<'a, V> GroupBy<'a, V> {
    /// Groups on `key`, projecting each row through `map`.
    pub fn new<M>(key: impl Into<String>, map: M) -> Self
    where
        M: Fn(&Row) -> V + Send + 'a,
    {
        Self {
            key: key.into(),
            map: Box::new(map),
            filter: None,
        }
    }

    /// Keeps only rows for which `filter` returns true.
    ///
    /// The filter runs before the projection. A key whose rows are all
    /// filtered out produces no group.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + 'a,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// The grouping column.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Groups a CSV reader, resolving the key column against its header.
    pub fn stream<R: Read>(
        self,
        reader: RowReader<R>,
    ) -> Result<GroupedItemsets<'a, RowReader<R>, V>> {
        let index = reader.column_index(&self.key)?;
        Ok(GroupedItemsets::new(self, reader, KeyLookup::Index(index)))
    }

    /// Groups any row iterator, looking the key column up by name on every row.
    ///
    /// A row without the key column fails the whole operation with a parse error.
    pub fn rows<I>(self, rows: I) -> GroupedItemsets<'a, I::IntoIter, V>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        GroupedItemsets::new(self, rows.into_iter(), KeyLookup::Name)
    }
}

enum KeyLookup {
    Index(usize),
    Name,
}

enum State<I, V> {
    Pending(I),
    Draining(std::vec::IntoIter<Group<V>>),
    Done,
}

/// Lazy sequence of groups produced by [`GroupBy`].
///
/// Nothing is read until the first call to `next`, which consumes the whole
/// source. A malformed row yields a single error and no groups at all.
pub struct GroupedItemsets<'a, I, V> {
    definition: GroupBy<'a, V>,
    lookup: KeyLookup,
    state: State<I, V>,
}

impl<'a, I, V> GroupedItemsets<'a, I, V>
where
    I: Iterator<Item = Result<Row>>,
{
    fn new(definition: GroupBy<'a, V>, source: I, lookup: KeyLookup) -> Self {
        Self {
            definition,
            lookup,
            state: State::Pending(source),
        }
    }

    /// `rows_read` numbers data rows from 1. Rows without a source position
    /// are reported as if preceded by a header line.
    fn key_of<'r>(&self, row: &'r Row, rows_read: u64) -> Result<&'r str> {
        let value = match self.lookup {
            KeyLookup::Index(index) => row.field(index),
            KeyLookup::Name => row.get(&self.definition.key),
        };
        value.ok_or_else(|| MinerError::Parse {
            line: row.line().unwrap_or(rows_read + 1),
            byte: row.byte_offset().unwrap_or(0),
            message: format!("row has no '{}' column", self.definition.key),
        })
    }

    #[instrument(skip_all, fields(key = %self.definition.key))]
    fn accumulate(&self, source: I) -> Result<Vec<Group<V>>> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Group<V>> = Vec::new();
        let mut rows_read: u64 = 0;
        let mut rows_kept: u64 = 0;

        for row in source {
            let row = row?;
            rows_read += 1;
            let key = self.key_of(&row, rows_read)?;

            // First sighting fixes the emission slot even if the row is filtered.
            let slot = match positions.get(key) {
                Some(&slot) => slot,
                None => {
                    groups.push(Group {
                        id: key.to_string(),
                        items: Vec::new(),
                    });
                    positions.insert(key.to_string(), groups.len() - 1);
                    groups.len() - 1
                }
            };

            if let Some(filter) = &self.definition.filter {
                if !filter(&row) {
                    continue;
                }
            }
            groups[slot].items.push((self.definition.map)(&row));
            rows_kept += 1;
        }

        let distinct_keys = groups.len();
        groups.retain(|group| !group.items.is_empty());
        info!(
            rows.read = rows_read,
            rows.kept = rows_kept,
            keys = distinct_keys,
            groups = groups.len(),
            "Grouping complete"
        );
        Ok(groups)
    }
}

impl<'a, I, V> Iterator for GroupedItemsets<'a, I, V>
where
    I: Iterator<Item = Result<Row>>,
{
    type Item = Result<Group<V>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Pending(source) => match self.accumulate(source) {
                    Ok(groups) => {
                        debug!(groups = groups.len(), "Flushing groups");
                        self.state = State::Draining(groups.into_iter());
                    }
                    Err(err) => return Some(Err(err)),
                },
                State::Draining(mut groups) => {
                    let next = groups.next();
                    if next.is_some() {
                        self.state = State::Draining(groups);
                    }
                    return next.map(Ok);
                }
                State::Done => return None,
            }
        }
    }
}

/// Every group sharing an extreme size, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeExtreme {
    pub size: usize,
    pub ids: Vec<String>,
}

impl SizeExtreme {
    fn new(id: &str, size: usize) -> Self {
        Self {
            size,
            ids: vec![id.to_string()],
        }
    }

    /// Replaces the extreme when `beats` holds, joins it on a tie.
    fn fold(slot: &mut Option<Self>, id: &str, size: usize, beats: fn(usize, usize) -> bool) {
        match slot {
            Some(current) if current.size == size => current.ids.push(id.to_string()),
            Some(current) if !beats(size, current.size) => {}
            _ => *slot = Some(Self::new(id, size)),
        }
    }
}

/// Group-size statistics folded over emitted groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Number of groups observed
    pub groups: usize,
    /// Sum of all group sizes
    pub total_items: usize,
    /// Groups with the fewest items
    pub smallest: Option<SizeExtreme>,
    /// Groups with the most items
    pub largest: Option<SizeExtreme>,
}

impl GroupSummary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one group into the summary.
    pub fn observe<V>(&mut self, group: &Group<V>) {
        let size = group.items.len();
        self.groups += 1;
        self.total_items += size;

        SizeExtreme::fold(&mut self.smallest, &group.id, size, |a, b| a < b);
        SizeExtreme::fold(&mut self.largest, &group.id, size, |a, b| a > b);
    }

    /// Smallest group size.
    pub fn min_items(&self) -> Option<usize> {
        self.smallest.as_ref().map(|extreme| extreme.size)
    }

    /// Largest group size.
    pub fn max_items(&self) -> Option<usize> {
        self.largest.as_ref().map(|extreme| extreme.size)
    }

    /// Average group size.
    pub fn mean_items(&self) -> Option<f64> {
        (self.groups > 0).then(|| self.total_items as f64 / self.groups as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::CsvOptions;

    fn reader(data: &str) -> RowReader<&[u8]> {
        RowReader::from_reader(data.as_bytes(), &CsvOptions::default()).unwrap()
    }

    fn value_of(column: &'static str) -> impl Fn(&Row) -> String + Send {
        move |row| row.get(column).unwrap_or_default().to_string()
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let data = "k,v\nA,1\nB,2\nA,3\nC,4\n";
        let groups: Vec<Group<String>> = GroupBy::new("k", value_of("v"))
            .stream(reader(data))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(groups[0].items, vec!["1", "3"]);
        assert_eq!(groups[1].items, vec!["2"]);
        assert_eq!(groups[2].items, vec!["4"]);
    }

    #[test]
    fn test_filter_applies_before_accumulation() {
        let data = "k,v\n1,x\n1,y\n2,z\n";
        let groups: Vec<Group<String>> = GroupBy::new("k", value_of("v"))
            .with_filter(|row| row.get("v") != Some("y"))
            .stream(reader(data))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, "1");
        assert_eq!(groups[0].items, vec!["x"]);
        assert_eq!(groups[1].items, vec!["z"]);
    }

    #[test]
    fn test_fully_filtered_key_is_not_emitted() {
        let data = "k,v\n1,x\n2,drop\n2,drop\n3,y\n";
        let groups: Vec<Group<String>> = GroupBy::new("k", value_of("v"))
            .with_filter(|row| row.get("v") != Some("drop"))
            .stream(reader(data))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_slot_fixed_by_first_raw_sighting() {
        // B's first row is filtered but B still precedes C.
        let data = "k,v\nA,1\nB,drop\nC,2\nB,3\n";
        let groups: Vec<Group<String>> = GroupBy::new("k", value_of("v"))
            .with_filter(|row| row.get("v") != Some("drop"))
            .stream(reader(data))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(groups[1].items, vec!["3"]);
    }

    #[test]
    fn test_unknown_key_column() {
        let result = GroupBy::new("order_id", value_of("v")).stream(reader("k,v\n1,x\n"));
        assert!(matches!(result, Err(MinerError::ColumnNotFound { .. })));
    }

    #[test]
    fn test_malformed_row_returns_no_groups() {
        let data = "k,v\n1,x\n2,y,extra\n3,z\n";
        let mut groups = GroupBy::new("k", value_of("v")).stream(reader(data)).unwrap();

        let first = groups.next().unwrap();
        assert!(matches!(first, Err(MinerError::Parse { byte: 8, .. })));
        assert!(groups.next().is_none());
    }

    #[test]
    fn test_nothing_read_before_first_next() {
        let consumed = std::sync::atomic::AtomicUsize::new(0);
        let rows = (0..3).map(|i| {
            consumed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let id = i.to_string();
            Ok::<_, MinerError>(Row::from_pairs([("k", id.as_str()), ("v", "x")]))
        });

        let mut groups = GroupBy::new("k", value_of("v")).rows(rows);
        assert_eq!(consumed.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(groups.next().is_some());
        assert_eq!(consumed.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_missing_key_on_row_is_parse_error() {
        let rows: Vec<Result<Row>> = vec![
            Ok(Row::from_pairs([("k", "1"), ("v", "x")])),
            Ok(Row::from_pairs([("other", "2"), ("v", "y")])),
        ];
        let result: Result<Vec<Group<String>>> =
            GroupBy::new("k", value_of("v")).rows(rows).collect();
        // second data row, counted after a header line
        assert!(matches!(result, Err(MinerError::Parse { line: 3, byte: 0, .. })));
    }

    #[test]
    fn test_missing_key_reports_source_line() {
        // Same numbering as a tokenizer error on that row: header is line 1.
        let data = "other,v\n1,x\n2,y\n";
        let result: Result<Vec<Group<String>>> =
            GroupBy::new("k", value_of("v")).rows(reader(data)).collect();
        match result {
            Err(MinerError::Parse { line, byte, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(byte, 8);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_source() {
        let groups: Vec<Group<String>> = GroupBy::new("k", value_of("v"))
            .stream(reader("k,v\n"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_group_summary() {
        let mut summary = GroupSummary::new();
        assert_eq!(summary.mean_items(), None);

        for (id, size) in [("1", 3), ("2", 1), ("3", 5), ("4", 1)] {
            summary.observe(&Group {
                id: id.to_string(),
                items: vec![0u8; size],
            });
        }

        assert_eq!(summary.groups, 4);
        assert_eq!(summary.total_items, 10);
        assert_eq!(summary.min_items(), Some(1));
        assert_eq!(summary.max_items(), Some(5));
        assert_eq!(summary.smallest.as_ref().unwrap().ids, vec!["2", "4"]);
        assert_eq!(summary.largest.as_ref().unwrap().ids, vec!["3"]);
        assert_eq!(summary.mean_items(), Some(2.5));
    }

    #[test]
    fn test_group_summary_keeps_every_tie() {
        let mut summary = GroupSummary::new();
        for (id, size) in [("a", 2), ("b", 5), ("c", 5), ("d", 2)] {
            summary.observe(&Group {
                id: id.to_string(),
                items: vec![(); size],
            });
        }

        assert_eq!(
            summary.smallest,
            Some(SizeExtreme {
                size: 2,
                ids: vec!["a".to_string(), "d".to_string()],
            })
        );
        assert_eq!(
            summary.largest,
            Some(SizeExtreme {
                size: 5,
                ids: vec!["b".to_string(), "c".to_string()],
            })
        );
    }

    #[test]
    fn test_group_summary_new_extreme_drops_old_ties() {
        let mut summary = GroupSummary::new();
        for (id, size) in [("a", 3), ("b", 3), ("c", 1)] {
            summary.observe(&Group {
                id: id.to_string(),
                items: vec![(); size],
            });
        }

        assert_eq!(summary.smallest.as_ref().unwrap().ids, vec!["c"]);
        assert_eq!(summary.largest.as_ref().unwrap().ids, vec!["a", "b"]);
    }

    #[test]
    fn test_single_group_is_both_extremes() {
        let mut summary = GroupSummary::new();
        summary.observe(&Group {
            id: "only".to_string(),
            items: vec![1, 2],
        });
        assert_eq!(summary.smallest, summary.largest);
        assert_eq!(summary.min_items(), Some(2));
    }
}
