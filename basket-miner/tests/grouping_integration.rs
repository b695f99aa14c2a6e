//! Integration tests for CSV grouping and dataset output.

use basket_miner::dataset::{write_counts, TransactionWriter};
use basket_miner::prelude::*;
use basket_miner::sources::{collect_matching, load_all};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use tempfile::TempDir;

/// Creates a test directory with an order-lines export and a product table.
fn create_order_data() -> TempDir {
    let dir = TempDir::new().unwrap();

    let mut orders = File::create(dir.path().join("order_products.csv")).unwrap();
    writeln!(orders, "order_id,product_id,add_to_cart_order,reordered").unwrap();
    for (order, product) in [
        (1, 10),
        (1, 11),
        (1, 12),
        (1, 13),
        (1, 99),
        (2, 10),
        (2, 11),
        (36, 12),
        (3, 10),
        (36, 13),
        (36, 14),
        (3, 11),
        (36, 10),
        (3, 12),
        (3, 13),
        (3, 98),
    ] {
        writeln!(orders, "{order},{product},1,0").unwrap();
    }
    orders.flush().unwrap();

    let mut products = File::create(dir.path().join("products.csv")).unwrap();
    writeln!(products, "product_id,product_name,aisle_id,department_id").unwrap();
    writeln!(products, "10,\"Bananas, organic\",24,4").unwrap();
    writeln!(products, "11,Milk,84,16").unwrap();
    writeln!(products, "12,Bread,112,3").unwrap();
    writeln!(products, "13,Eggs,86,16").unwrap();
    writeln!(products, "14,Spinach,123,4").unwrap();
    writeln!(products, "98,Bottled water,115,7").unwrap();
    writeln!(products, "99,Limes,83,4").unwrap();
    products.flush().unwrap();

    dir
}

fn product_of(row: &Row) -> String {
    row.get("product_id").unwrap_or_default().to_string()
}

#[test]
fn test_groups_scattered_orders_in_first_seen_order() {
    let dir = create_order_data();
    let reader =
        RowReader::from_path(dir.path().join("order_products.csv"), &CsvOptions::default())
            .unwrap();
    let groups: Vec<Group<String>> = GroupBy::new("order_id", product_of)
        .stream(reader)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();

    let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "36", "3"]);
    assert_eq!(groups[2].items, vec!["12", "13", "14", "10"]);
    assert_eq!(groups[3].items, vec!["10", "11", "12", "13", "98"]);
    assert_eq!(groups.iter().map(Group::len).sum::<usize>(), 16);
}

#[test]
fn test_excluded_aisles_pipeline() {
    let dir = create_order_data();
    let options = CsvOptions::default();

    let aisles: HashSet<String> = ["24", "83"].iter().map(|s| s.to_string()).collect();
    let excluded = collect_matching(
        dir.path().join("products.csv"),
        &options,
        "aisle_id",
        &aisles,
        "product_id",
    )
    .unwrap();
    assert_eq!(
        excluded,
        ["10", "99"].iter().map(|s| s.to_string()).collect()
    );

    let reader = RowReader::from_path(dir.path().join("order_products.csv"), &options).unwrap();
    let groups = GroupBy::new("order_id", product_of)
        .with_filter(move |row| {
            row.get("product_id")
                .is_some_and(|product| !excluded.contains(product))
        })
        .stream(reader)
        .unwrap();

    let output = dir.path().join("formatted_itemsets.txt");
    let mut writer = TransactionWriter::create(&output)
        .unwrap()
        .with_min_items(4);
    writer.write_all(groups).unwrap();
    let summary = writer.finish().unwrap();

    // Order 1 keeps 11 12 13, order 36 keeps 12 13 14; only order 3 has four items left.
    assert_eq!(summary.written, 1);
    assert_eq!(summary.skipped, 3);
    assert_eq!(fs::read_to_string(&output).unwrap(), "11 12 13 98");
}

#[test]
fn test_summary_and_counts_file() {
    let dir = create_order_data();
    let reader =
        RowReader::from_path(dir.path().join("order_products.csv"), &CsvOptions::default())
            .unwrap();

    let mut summary = GroupSummary::new();
    let mut counts = Vec::new();
    for group in GroupBy::new("order_id", |_: &Row| ()).stream(reader).unwrap() {
        let group = group.unwrap();
        summary.observe(&group);
        counts.push((group.id, group.items.len()));
    }

    assert_eq!(summary.groups, 4);
    assert_eq!(summary.total_items, 16);
    let smallest = summary.smallest.as_ref().unwrap();
    assert_eq!((smallest.size, smallest.ids.clone()), (2, vec!["2".to_string()]));
    // orders 1 and 3 tie for the largest basket
    let largest = summary.largest.as_ref().unwrap();
    assert_eq!(largest.size, 5);
    assert_eq!(largest.ids, vec!["1", "3"]);
    assert_eq!(summary.mean_items(), Some(4.0));

    let path = dir.path().join("counts.csv");
    write_counts(File::create(&path).unwrap(), &counts).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "1,5\r\n2,2\r\n36,4\r\n3,5");
}

#[test]
fn test_load_all_quoted_fields() {
    let dir = create_order_data();
    let rows = load_all(dir.path().join("products.csv"), &CsvOptions::default()).unwrap();
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0].get("product_name"), Some("Bananas, organic"));
    assert_eq!(rows[0].len(), 4);
}

#[test]
fn test_malformed_file_yields_single_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, "order_id,product_id\n1,10\n1,11,extra\n2,12\n").unwrap();

    let reader = RowReader::from_path(&path, &CsvOptions::default()).unwrap();
    let mut groups = GroupBy::new("order_id", product_of).stream(reader).unwrap();

    match groups.next() {
        Some(Err(MinerError::Parse { line, .. })) => assert_eq!(line, 3),
        other => panic!("expected a parse error, got {other:?}"),
    }
    assert!(groups.next().is_none());
}

#[test]
fn test_unknown_key_column() {
    let dir = create_order_data();
    let reader =
        RowReader::from_path(dir.path().join("order_products.csv"), &CsvOptions::default())
            .unwrap();
    let result = GroupBy::new("user_id", product_of).stream(reader);
    assert!(matches!(
        result,
        Err(MinerError::ColumnNotFound { column }) if column == "user_id"
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = RowReader::from_path(dir.path().join("absent.csv"), &CsvOptions::default());
    assert!(matches!(result, Err(MinerError::Io(_))));
}

#[test]
fn test_tab_separated_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.tsv");
    fs::write(&path, "order_id\tproduct_id\n7\t1\n8\t2\n7\t3\n").unwrap();

    let reader = RowReader::from_path(&path, &CsvOptions::tsv()).unwrap();
    let groups: Vec<Group<String>> = GroupBy::new("order_id", product_of)
        .stream(reader)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].items, vec!["1", "3"]);
}
