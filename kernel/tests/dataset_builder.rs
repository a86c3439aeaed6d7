use hive_kernel::acid::AcidDelta;
use hive_kernel::catalog::Table;
use hive_kernel::dataset::{DatasetType, ScanStatsType};
use hive_kernel::format::ReaderType;
use hive_kernel::partition_value::{PartitionValue, PartitionValueData};
use hive_kernel::schema::DataType;
use hive_kernel::split::PhysicalSplit;
use hive_kernel::stats::{ROW_COUNT, TOTAL_SIZE};
use hive_kernel::{AcidSplitInfo, DatasetBuilderConfig, Error};
use test_utils::{
    partition, partitioned_parquet_table, parquet_table, MockEngine, MockSplit,
    HBASE_STORAGE_HANDLER,
};

use url::Url;

mod common;
use common::{builder, rebuild, resolve, USER};

const ORDERS: &str = "hdfs://nn/warehouse/sales.db/orders";
const EVENTS: &str = "hdfs://nn/warehouse/web.db/events";

/// Ten bytes per record: 8 + 1 + 1
const TEN_BYTE_COLUMNS: &[(&str, &str)] = &[
    ("id", "bigint"),
    ("shipped", "boolean"),
    ("returned", "boolean"),
];

fn sorted(mut splits: Vec<PhysicalSplit>) -> Vec<PhysicalSplit> {
    splits.sort_by(|a, b| a.split_key.cmp(&b.split_key));
    splits
}

/// An unpartitioned parquet table with three splits of 100, 200 and 300 bytes.
fn orders_engine() -> (MockEngine, Table) {
    let engine = MockEngine::new();
    let table = parquet_table("sales", "orders", ORDERS, TEN_BYTE_COLUMNS);
    engine.metastore.add_table(table.clone());
    engine.fs.add_dir(ORDERS, 1_000);
    for (i, size) in [100, 200, 300].into_iter().enumerate() {
        engine
            .fs
            .add_file(&format!("{ORDERS}/00000{i}_0"), size, 1_000 + i as i64);
    }
    engine.splits.add_splits(
        ORDERS,
        vec![
            MockSplit::new(100).with_hosts(&["dn1", "dn2"]),
            MockSplit::new(200).with_hosts(&["dn2"]),
            MockSplit::new(300).with_hosts(&["dn3"]),
        ],
    );
    (engine, table)
}

/// A parquet table partitioned by an int `ds`, with partitions `ds=1` (100 bytes) and `ds=2`
/// (50 + 50 bytes).
fn events_engine() -> (MockEngine, Table) {
    let engine = MockEngine::new();
    let table = partitioned_parquet_table(
        "web",
        "events",
        EVENTS,
        &[("id", "bigint"), ("payload", "string")],
        &[("ds", "int")],
    );
    engine.metastore.add_table(table.clone());
    let partitions = vec![partition(&table, &["1"]), partition(&table, &["2"])];
    engine.metastore.add_partitions(&table, partitions);
    engine.fs.add_file(&format!("{EVENTS}/ds=1/000000_0"), 100, 10);
    engine.fs.add_file(&format!("{EVENTS}/ds=2/000000_0"), 50, 20);
    engine.fs.add_file(&format!("{EVENTS}/ds=2/000001_0"), 50, 30);
    engine
        .splits
        .add_splits(&format!("{EVENTS}/ds=1"), vec![MockSplit::new(100)]);
    engine.splits.add_splits(
        &format!("{EVENTS}/ds=2"),
        vec![MockSplit::new(50), MockSplit::new(50)],
    );
    (engine, table)
}

#[test_log::test]
fn unpartitioned_parquet_table() {
    let (engine, _) = orders_engine();
    let mut builder = builder(&engine, &["hive", "sales", "orders"]);
    assert_eq!(builder.dataset_type(), DatasetType::PhysicalDataset);
    assert!(builder.is_saveable());
    assert_eq!(builder.name().to_string(), "hive.sales.orders");

    let descriptor = builder.dataset().unwrap();
    assert_eq!(descriptor.name, "orders");
    assert_eq!(descriptor.owner, USER);
    assert_eq!(descriptor.schema.len(), 3);
    assert_eq!(
        descriptor.schema.field("id").unwrap().data_type(),
        &DataType::LONG
    );

    let splits = sorted(builder.splits().unwrap());
    let rows: Vec<i64> = splits.iter().map(|s| s.row_count).collect();
    assert_eq!(rows, vec![300, 600, 900]);
    assert_eq!(splits[0].split_key, format!("{ORDERS}__0"));
    assert_eq!(splits[0].affinities.len(), 2);
    assert_eq!(splits[0].affinities[0].factor, 100.0);
    assert!(splits.iter().all(|s| s.partition_values.is_empty()));
    assert!(splits.iter().all(|s| s.xattr().unwrap().partition_id == 0));

    let read_definition = &descriptor.read_definition;
    assert!(read_definition.partition_columns.is_empty());
    let scan_stats = &read_definition.scan_stats;
    assert_eq!(scan_stats.record_count, 1800);
    assert_eq!(scan_stats.disk_cost, 600.0);
    assert_eq!(scan_stats.cpu_cost, 600.0);
    assert_eq!(scan_stats.scan_factor, 1.0);
    assert_eq!(scan_stats.stats_type, ScanStatsType::NoExactRowCount);

    let xattr = read_definition.table_xattr().unwrap();
    assert_eq!(xattr.reader_type, ReaderType::NativeParquet);
    assert_eq!(xattr.partition_hash, None);
    assert_eq!(xattr.partition_count(), 1);
    let table_prop = xattr.partition_prop(0).unwrap();
    assert_eq!(table_prop.properties["name"], "sales.orders");
    assert_eq!(table_prop.properties["location"], ORDERS);

    let signature = read_definition.signature().unwrap().unwrap();
    let keys = signature.update_keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].partition_id, 0);
    assert_eq!(keys[0].partition_root_dir, ORDERS);
    let mut paths: Vec<&str> = keys[0]
        .cached_entities
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["", "000000_0", "000001_0", "000002_0"]);
}

#[test]
fn building_happens_once() {
    let (engine, _) = orders_engine();
    let mut builder = builder(&engine, &["hive", "sales", "orders"]);
    let first = builder.dataset().unwrap();
    engine.splits.add_splits(ORDERS, vec![MockSplit::new(1)]);
    assert_eq!(builder.dataset().unwrap(), first);
    assert_eq!(builder.splits().unwrap().len(), 3);
}

#[test]
fn rebuilding_keeps_the_id() {
    let (engine, _) = orders_engine();
    let first = builder(&engine, &["hive", "sales", "orders"])
        .dataset()
        .unwrap();
    engine.splits.add_splits(ORDERS, vec![MockSplit::new(400)]);

    let second = rebuild(&engine, &first);
    assert_eq!(second.id, first.id);
    assert_eq!(second.read_definition.scan_stats.disk_cost, 1000.0);

    let unrelated = builder(&engine, &["hive", "sales", "orders"])
        .dataset()
        .unwrap();
    assert_ne!(unrelated.id, first.id);
}

#[test]
fn preferred_metastore_stats() {
    let (engine, mut table) = orders_engine();
    table
        .parameters
        .insert(ROW_COUNT.to_string(), "5000".to_string());
    table
        .parameters
        .insert(TOTAL_SIZE.to_string(), "600".to_string());
    engine.metastore.add_table(table);

    let config = DatasetBuilderConfig::builder()
        .with_metastore_stats(true)
        .build()
        .unwrap();
    let mut builder = resolve(&engine, &["hive", "sales", "orders"], config)
        .unwrap()
        .unwrap();
    let descriptor = builder.dataset().unwrap();
    assert_eq!(descriptor.read_definition.scan_stats.record_count, 5000);
    let rows: Vec<i64> = sorted(builder.splits().unwrap())
        .iter()
        .map(|s| s.row_count)
        .collect();
    assert_eq!(rows, vec![834, 1667, 2500]);
}

#[test]
fn unparsable_metastore_stats_are_ignored() {
    let (engine, mut table) = orders_engine();
    table
        .parameters
        .insert(ROW_COUNT.to_string(), "many".to_string());
    engine.metastore.add_table(table);

    let config = DatasetBuilderConfig::builder()
        .with_metastore_stats(true)
        .build()
        .unwrap();
    let descriptor = resolve(&engine, &["hive", "sales", "orders"], config)
        .unwrap()
        .unwrap()
        .dataset()
        .unwrap();
    assert_eq!(descriptor.read_definition.scan_stats.record_count, 1800);
}

#[test]
fn missing_table_location_yields_no_splits_and_no_signature() {
    let engine = MockEngine::new();
    engine
        .metastore
        .add_table(parquet_table("sales", "orders", ORDERS, TEN_BYTE_COLUMNS));
    let mut builder = builder(&engine, &["hive", "sales", "orders"]);
    let descriptor = builder.dataset().unwrap();
    assert!(builder.splits().unwrap().is_empty());
    assert_eq!(descriptor.read_definition.read_signature, None);
    assert_eq!(descriptor.read_definition.scan_stats.record_count, 0);
}

#[test_log::test]
fn partitioned_table() {
    let (engine, _) = events_engine();
    let mut builder = builder(&engine, &["hive", "web", "events"]);
    let descriptor = builder.dataset().unwrap();

    let names: Vec<&str> = descriptor
        .schema
        .fields()
        .map(|f| f.name().as_str())
        .collect();
    assert_eq!(names, vec!["id", "payload", "ds"]);
    assert_eq!(descriptor.read_definition.partition_columns, vec!["ds"]);

    let splits = sorted(builder.splits().unwrap());
    assert_eq!(splits.len(), 3);
    assert_eq!(splits[0].split_key, format!("{EVENTS}/ds=1__0"));
    assert_eq!(splits[0].partition_id, 0);
    assert_eq!(
        splits[0].partition_values,
        vec![PartitionValue::new("ds", PartitionValueData::Int(1))]
    );
    assert_eq!(splits[2].split_key, format!("{EVENTS}/ds=2__1"));
    assert_eq!(splits[2].partition_id, 1);
    assert_eq!(descriptor.read_definition.scan_stats.disk_cost, 200.0);

    let xattr = descriptor.read_definition.table_xattr().unwrap();
    assert_eq!(xattr.partition_count(), 2);
    assert!(xattr.partition_hash.is_some());
    assert_eq!(
        xattr.partition_prop(1).unwrap().properties["location"],
        format!("{EVENTS}/ds=2")
    );
    assert_eq!(
        xattr.table_prop().unwrap().properties["partition_columns"],
        "ds"
    );

    let signature = descriptor.read_definition.signature().unwrap().unwrap();
    let roots: Vec<(u32, &str)> = signature
        .update_keys()
        .iter()
        .map(|k| (k.partition_id, k.partition_root_dir.as_str()))
        .collect();
    assert_eq!(
        roots,
        vec![
            (0, format!("{EVENTS}/ds=1").as_str()),
            (1, format!("{EVENTS}/ds=2").as_str())
        ]
    );
}

#[test]
fn partitioned_metastore_stats_come_from_the_table() {
    let (engine, mut table) = events_engine();
    table
        .parameters
        .insert(ROW_COUNT.to_string(), "5000".to_string());
    table
        .parameters
        .insert(TOTAL_SIZE.to_string(), "200".to_string());
    engine.metastore.add_table(table);

    let config = DatasetBuilderConfig::builder()
        .with_metastore_stats(true)
        .build()
        .unwrap();
    let descriptor = resolve(&engine, &["hive", "web", "events"], config)
        .unwrap()
        .unwrap()
        .dataset()
        .unwrap();
    let scan_stats = &descriptor.read_definition.scan_stats;
    assert_eq!(scan_stats.record_count, 5000);
    assert_eq!(scan_stats.disk_cost, 200.0);
}

#[test]
fn partitioned_table_without_partitions() {
    let engine = MockEngine::new();
    let table = partitioned_parquet_table(
        "web",
        "events",
        EVENTS,
        &[("id", "bigint")],
        &[("ds", "int")],
    );
    engine.metastore.add_table(table.clone());
    engine.metastore.add_partitions(&table, vec![]);
    engine.fs.add_dir(EVENTS, 10);

    let mut builder = builder(&engine, &["hive", "web", "events"]);
    let descriptor = builder.dataset().unwrap();
    assert!(builder.splits().unwrap().is_empty());
    assert_eq!(descriptor.read_definition.signature().unwrap(), None);
    assert_eq!(descriptor.read_definition.read_signature, None);
    assert_eq!(descriptor.read_definition.scan_stats.record_count, 0);
}

#[test]
fn missing_partition_root_drops_the_signature() {
    let (engine, _) = events_engine();
    engine.fs.remove(&format!("{EVENTS}/ds=2"));
    let mut builder = builder(&engine, &["hive", "web", "events"]);
    let descriptor = builder.dataset().unwrap();
    assert_eq!(descriptor.read_definition.read_signature, None);

    let splits = builder.splits().unwrap();
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].partition_id, 0);
}

#[test]
fn partition_hash_ignores_partition_order() {
    let hash = |reverse: bool| {
        let (engine, table) = events_engine();
        let mut partitions = vec![partition(&table, &["1"]), partition(&table, &["2"])];
        if reverse {
            partitions.reverse();
        }
        engine.metastore.add_partitions(&table, partitions);
        builder(&engine, &["hive", "web", "events"])
            .dataset()
            .unwrap()
            .read_definition
            .table_xattr()
            .unwrap()
            .partition_hash
    };
    assert_eq!(hash(false), hash(true));

    let (engine, table) = events_engine();
    let mut changed = partition(&table, &["2"]);
    changed
        .parameters
        .insert("transient_lastDdlTime".to_string(), "1700000000".to_string());
    engine
        .metastore
        .add_partitions(&table, vec![partition(&table, &["1"]), changed]);
    let changed_hash = builder(&engine, &["hive", "web", "events"])
        .dataset()
        .unwrap()
        .read_definition
        .table_xattr()
        .unwrap()
        .partition_hash;
    assert_ne!(changed_hash, hash(false));
}

#[test]
fn typed_partition_values() {
    let engine = MockEngine::new();
    let location = "hdfs://nn/warehouse/t";
    let table = partitioned_parquet_table(
        "default",
        "t",
        location,
        &[("id", "int")],
        &[("amount", "decimal(10,2)"), ("day", "date")],
    );
    engine.metastore.add_table(table.clone());
    let partitions = vec![
        partition(&table, &["1.225", "1970-01-02"]),
        partition(&table, &["__HIVE_DEFAULT_PARTITION__", "1970-01-01"]),
    ];
    for p in &partitions {
        let dir = p.sd.location.clone().unwrap();
        engine.fs.add_file(&format!("{dir}/000000_0"), 10, 1);
        engine.splits.add_splits(&dir, vec![MockSplit::new(10)]);
    }
    engine.metastore.add_partitions(&table, partitions);

    let mut splits = builder(&engine, &["hive", "t"]).splits().unwrap();
    splits.sort_by_key(|s| s.partition_id);
    let mut expected_amount = vec![0u8; 15];
    expected_amount.push(0x7B);
    assert_eq!(
        splits[0].partition_values,
        vec![
            PartitionValue::new("amount", PartitionValueData::Binary(expected_amount)),
            PartitionValue::new("day", PartitionValueData::Long(86_400_000)),
        ]
    );
    assert_eq!(splits[1].partition_values[0], PartitionValue::unset("amount"));
}

#[test]
fn unsupported_partition_type_fails_the_build() {
    let engine = MockEngine::new();
    let location = "hdfs://nn/warehouse/t";
    let table = partitioned_parquet_table(
        "default",
        "t",
        location,
        &[("id", "int")],
        &[("attrs", "map<string,int>")],
    );
    engine.metastore.add_table(table.clone());
    engine
        .metastore
        .add_partitions(&table, vec![partition(&table, &["a"])]);
    let err = builder(&engine, &["hive", "t"]).dataset().unwrap_err();
    assert!(matches!(err, Error::UnsupportedDataType(ref category) if category == "MAP"));
}

#[test]
fn leaf_column_budget() {
    let engine = MockEngine::new();
    let table = partitioned_parquet_table(
        "web",
        "events",
        EVENTS,
        &[("id", "bigint"), ("point", "struct<x:double,y:double>")],
        &[("ds", "int")],
    );
    engine.metastore.add_table(table);

    let with_budget = |max: usize| {
        let config = DatasetBuilderConfig::builder()
            .with_max_leaf_columns(max)
            .build()
            .unwrap();
        resolve(&engine, &["hive", "web", "events"], config)
            .unwrap()
            .unwrap()
            .dataset()
    };
    assert!(with_budget(4).is_ok());
    let err = with_budget(3).unwrap_err();
    assert!(matches!(err, Error::ColumnCountTooLarge(3)));
    assert_eq!(
        err.to_string(),
        "Using datasets with more than 3 columns is currently disabled."
    );
}

#[test]
fn unmappable_columns_are_skipped() {
    let engine = MockEngine::new();
    engine.metastore.add_table(parquet_table(
        "sales",
        "orders",
        ORDERS,
        &[
            ("id", "bigint"),
            ("attrs", "map<string,string>"),
            ("huge", "decimal(38,2)"),
        ],
    ));
    let descriptor = builder(&engine, &["hive", "sales", "orders"])
        .dataset()
        .unwrap();
    let names: Vec<&str> = descriptor
        .schema
        .fields()
        .map(|f| f.name().as_str())
        .collect();
    assert_eq!(names, vec!["id", "huge"]);
}

#[test]
fn split_failures_name_the_partition() {
    let (engine, _) = events_engine();
    let failing = format!("{EVENTS}/ds=2");
    engine.splits.fail_on(&failing);
    let err = builder(&engine, &["hive", "web", "events"])
        .dataset()
        .unwrap_err();
    assert!(matches!(err, Error::SplitGeneration { .. }));
    assert_eq!(
        err.to_string(),
        format!(
            "Failure while trying to get splits for partition {failing}: \
             Generic hive kernel error: cannot compute splits of {failing}"
        )
    );
}

#[test]
fn split_failures_name_the_table() {
    let (engine, _) = orders_engine();
    engine.splits.fail_on(ORDERS);
    let err = builder(&engine, &["hive", "sales", "orders"])
        .dataset()
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Failure while trying to get splits for table sales.orders: "));
}

#[test]
fn storage_handler_tables_have_no_signature() {
    let engine = MockEngine::new();
    let mut table = parquet_table("sales", "orders", ORDERS, TEN_BYTE_COLUMNS);
    table.sd.input_format = None;
    table.parameters.insert(
        "storage_handler".to_string(),
        HBASE_STORAGE_HANDLER.to_string(),
    );
    engine.metastore.add_table(table);
    engine.fs.add_dir(ORDERS, 1);
    engine
        .splits
        .add_splits(ORDERS, vec![MockSplit::new(100)]);

    let mut builder = builder(&engine, &["hive", "sales", "orders"]);
    let descriptor = builder.dataset().unwrap();
    let read_definition = &descriptor.read_definition;
    assert_eq!(read_definition.read_signature, None);
    assert_eq!(read_definition.scan_stats.scan_factor, 5.0);
    let xattr = read_definition.table_xattr().unwrap();
    assert_eq!(xattr.reader_type, ReaderType::Basic);
    assert_eq!(
        xattr.table_prop().unwrap().storage_handler.as_deref(),
        Some(HBASE_STORAGE_HANDLER)
    );
    // no compression for formats we know nothing about
    assert_eq!(builder.splits().unwrap()[0].row_count, 10);
}

#[test]
fn missing_input_format() {
    let engine = MockEngine::new();
    let mut table = parquet_table("sales", "orders", ORDERS, TEN_BYTE_COLUMNS);
    table.sd.input_format = None;
    engine.metastore.add_table(table);
    let err = builder(&engine, &["hive", "sales", "orders"])
        .dataset()
        .unwrap_err();
    assert!(matches!(err, Error::MissingInputFormat));
}

#[test]
fn mixed_formats_use_the_basic_reader() {
    let (engine, table) = events_engine();
    let mut text = partition(&table, &["2"]);
    text.sd.input_format = Some(test_utils::TEXT_INPUT_FORMAT.to_string());
    engine
        .metastore
        .add_partitions(&table, vec![partition(&table, &["1"]), text]);
    let descriptor = builder(&engine, &["hive", "web", "events"])
        .dataset()
        .unwrap();
    let xattr = descriptor.read_definition.table_xattr().unwrap();
    assert_eq!(xattr.reader_type, ReaderType::Basic);
    assert_eq!(
        xattr.input_format_dictionary.len(),
        2,
        "both input formats are recorded once"
    );
    // both formats are file based, so the files are still tracked
    assert!(descriptor.read_definition.read_signature.is_some());
}

#[test_log::test]
fn transactional_split_sizes() {
    let engine = MockEngine::new();
    let mut table = parquet_table("sales", "orders", ORDERS, TEN_BYTE_COLUMNS);
    table
        .parameters
        .insert("transactional".to_string(), "true".to_string());
    engine.metastore.add_table(table);
    engine
        .fs
        .add_file(&format!("{ORDERS}/base_0000010/bucket_00000"), 100, 1);
    engine
        .fs
        .add_file(&format!("{ORDERS}/delta_0000011_0000011/bucket_00000"), 20, 2);
    engine
        .fs
        .add_file(&format!("{ORDERS}/delta_0000012_0000012_0000/bucket_00000"), 30, 3);

    let with_base = AcidSplitInfo {
        path: Url::parse(&format!("{ORDERS}/base_0000010/bucket_00000")).unwrap(),
        start: 0,
        length: 100,
        has_base: true,
        is_original: false,
        deltas: vec![
            AcidDelta::new(11, 11),
            AcidDelta::new(12, 12).with_statement_id(0),
        ],
    };
    let missing_delta = AcidSplitInfo {
        path: Url::parse(ORDERS).unwrap(),
        start: 7,
        length: 0,
        has_base: false,
        is_original: false,
        deltas: vec![AcidDelta::new(11, 11)],
    };
    engine.splits.add_splits(
        ORDERS,
        vec![
            MockSplit::new(100).with_acid(with_base),
            MockSplit::new(0).with_acid(missing_delta),
        ],
    );

    let mut builder = builder(&engine, &["hive", "sales", "orders"]);
    let sizes: Vec<u64> = sorted(builder.splits().unwrap())
        .iter()
        .map(|s| s.size)
        .collect();
    assert_eq!(sizes, vec![150, 1]);
    assert_eq!(
        builder.dataset().unwrap().read_definition.scan_stats.disk_cost,
        151.0
    );
}
