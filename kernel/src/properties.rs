//! The property sets handed to readers and split generation: the schema properties hive derives
//! from a table's (or partition's) storage descriptor, and the job configuration built from them.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::catalog::{FieldSchema, Partition, StorageDescriptor, Table};

/// Ordered string properties
pub type Properties = BTreeMap<String, String>;

pub const NAME: &str = "name";
pub const LOCATION: &str = "location";
pub const FILE_INPUT_FORMAT: &str = "file.inputformat";
pub const FILE_OUTPUT_FORMAT: &str = "file.outputformat";
pub const SERIALIZATION_LIB: &str = "serialization.lib";
pub const SERIALIZATION_DDL: &str = "serialization.ddl";
pub const COLUMNS: &str = "columns";
pub const COLUMNS_TYPES: &str = "columns.types";
pub const COLUMNS_COMMENTS: &str = "columns.comments";
pub const PARTITION_COLUMNS: &str = "partition_columns";
pub const PARTITION_COLUMNS_TYPES: &str = "partition_columns.types";
pub const BUCKET_COUNT: &str = "bucket_count";
pub const BUCKET_FIELD_NAME: &str = "bucket_field_name";

pub const TABLE_IS_TRANSACTIONAL: &str = "transactional";
pub const TRANSACTIONAL_TABLE_SCAN: &str = "hive.transactional.table.scan";
pub const SCHEMA_EVOLUTION_COLUMNS: &str = "schema.evolution.columns";
pub const SCHEMA_EVOLUTION_COLUMNS_TYPES: &str = "schema.evolution.columns.types";
pub const VALID_TXNS: &str = "hive.txn.valid.txns";
pub const INPUT_DIR: &str = "mapreduce.input.fileinputformat.inputdir";
pub const INPUT_DIR_RECURSIVE: &str = "mapred.input.dir.recursive";
pub const SUPPORTS_SUBDIRECTORIES: &str = "hive.mapred.supports.subdirectories";

/// Every transaction is valid, none are open or aborted
const ALL_TXNS_VALID: &str = "9223372036854775807:";

/// The schema properties of a table.
pub fn table_schema_properties(table: &Table) -> Properties {
    schema_properties(
        &table.sd,
        &table.sd,
        &table.parameters,
        &table.db_name,
        &table.table_name,
        &table.partition_keys,
    )
}

/// The schema properties of a partition: derived from the partition's storage descriptor and
/// parameters, with every table parameter laid over them. Serdes read some of their settings (the
/// avro schema, for one) from table parameters only.
pub fn partition_metadata(partition: &Partition, table: &Table) -> Properties {
    let mut properties = schema_properties(
        &partition.sd,
        &table.sd,
        &partition.parameters,
        &table.db_name,
        &table.table_name,
        &table.partition_keys,
    );
    properties.extend(
        table
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    properties
}

fn schema_properties(
    sd: &StorageDescriptor,
    table_sd: &StorageDescriptor,
    parameters: &BTreeMap<String, String>,
    database: &str,
    table_name: &str,
    partition_keys: &[FieldSchema],
) -> Properties {
    let mut properties = Properties::new();
    let mut set = |key: &str, value: String| {
        properties.insert(key.to_string(), value);
    };

    set(NAME, format!("{database}.{table_name}"));
    if let Some(location) = &sd.location {
        set(LOCATION, location.clone());
    }
    if let Some(input_format) = &sd.input_format {
        set(FILE_INPUT_FORMAT, input_format.clone());
    }
    if let Some(output_format) = &sd.output_format {
        set(FILE_OUTPUT_FORMAT, output_format.clone());
    }
    set(BUCKET_COUNT, sd.num_buckets.to_string());
    if let Some(bucket_col) = sd.bucket_cols.first() {
        set(BUCKET_FIELD_NAME, bucket_col.clone());
    }
    if let Some(lib) = &sd.serde_info.serialization_lib {
        set(SERIALIZATION_LIB, lib.clone());
    }

    // columns always come from the table, partitions may carry stale copies
    let cols = &table_sd.cols;
    set(COLUMNS, cols.iter().map(|c| c.name.as_str()).join(","));
    set(COLUMNS_TYPES, cols.iter().map(|c| c.type_name.as_str()).join(":"));
    set(
        COLUMNS_COMMENTS,
        cols.iter()
            .map(|c| c.comment.as_deref().unwrap_or_default())
            .join("\0"),
    );
    set(
        SERIALIZATION_DDL,
        format!(
            "struct {table_name} {{ {} }}",
            cols.iter()
                .map(|c| format!("{} {}", c.type_name, c.name))
                .join(", ")
        ),
    );
    if !partition_keys.is_empty() {
        set(
            PARTITION_COLUMNS,
            partition_keys.iter().map(|c| c.name.as_str()).join("/"),
        );
        set(
            PARTITION_COLUMNS_TYPES,
            partition_keys.iter().map(|c| c.type_name.as_str()).join(":"),
        );
    }

    properties.extend(
        sd.serde_info
            .parameters
            .iter()
            .chain(parameters.iter())
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    properties
}

/// Whether files in subdirectories of a location are part of the table. Both settings must be on.
pub fn is_recursive(properties: &Properties) -> bool {
    let enabled = |key: &str| {
        properties
            .get(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    };
    enabled(INPUT_DIR_RECURSIVE) && enabled(SUPPORTS_SUBDIRECTORIES)
}

/// Whether properties describe a transactional (ACID) table
pub fn is_transactional(properties: &Properties) -> bool {
    properties
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case(TABLE_IS_TRANSACTIONAL) && v.eq_ignore_ascii_case("true"))
}

/// A hadoop style job configuration: a flat set of string settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConf {
    settings: Properties,
}

impl JobConf {
    pub fn new(settings: Properties) -> Self {
        Self { settings }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn settings(&self) -> &Properties {
        &self.settings
    }

    /// Copy every property into this configuration. If the properties are those of a
    /// transactional table, also switch on transactional scans.
    pub fn add_properties(&mut self, properties: &Properties) {
        self.settings
            .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.add_acid_properties_if_needed();
    }

    fn add_acid_properties_if_needed(&mut self) {
        if !is_transactional(&self.settings) {
            return;
        }
        self.set(TRANSACTIONAL_TABLE_SCAN, "true");
        for (from, to) in [
            (COLUMNS, SCHEMA_EVOLUTION_COLUMNS),
            (COLUMNS_TYPES, SCHEMA_EVOLUTION_COLUMNS_TYPES),
        ] {
            if let Some(value) = self.settings.get(from).cloned() {
                self.set(to, value);
            }
        }
        self.set(VALID_TXNS, ALL_TXNS_VALID);
    }

    /// Add a location to the comma separated list of input directories.
    pub fn add_input_path(&mut self, location: &str) {
        let dirs = match self.get(INPUT_DIR) {
            Some(existing) if !existing.is_empty() => format!("{existing},{location}"),
            _ => location.to_string(),
        };
        self.set(INPUT_DIR, dirs);
    }

    pub fn input_paths(&self) -> Vec<&str> {
        self.get(INPUT_DIR)
            .map(|dirs| dirs.split(',').filter(|d| !d.is_empty()).collect())
            .unwrap_or_default()
    }
}
