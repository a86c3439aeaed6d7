//! The subset of the Hive metastore object model the kernel consumes. These mirror the thrift
//! structs a metastore client returns; a [`crate::MetastoreClient`] implementation is expected to
//! convert into them.
//!
//! Parameter maps are ordered so that [`crate::fingerprint`] hashes are stable regardless of the
//! order the metastore reported them in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Table (or partition) parameter naming the storage handler class, e.g. for HBase backed tables.
pub const META_TABLE_STORAGE: &str = "storage_handler";

/// A column as stored in the metastore: its name, hive type string and an optional comment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    /// Hive type string, e.g. `decimal(10,2)` or `array<struct<a:int>>`
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            comment: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SerDeInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub serialization_lib: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Sort order of a column. `order` is 1 for ascending and 0 for descending.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Order {
    pub col: String,
    pub order: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct StorageDescriptor {
    #[serde(default)]
    pub cols: Vec<FieldSchema>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub input_format: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default)]
    pub num_buckets: i32,
    #[serde(default)]
    pub serde_info: SerDeInfo,
    #[serde(default)]
    pub bucket_cols: Vec<String>,
    #[serde(default)]
    pub sort_cols: Vec<Order>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub db_name: String,
    pub table_name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub table_type: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub partition_keys: Vec<FieldSchema>,
    pub sd: StorageDescriptor,
    #[serde(default)]
    pub view_original_text: Option<String>,
    #[serde(default)]
    pub view_expanded_text: Option<String>,
}

impl Table {
    /// The storage handler class configured for this table, if any.
    pub fn storage_handler(&self) -> Option<&str> {
        self.parameters.get(META_TABLE_STORAGE).map(String::as_str)
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partition_keys.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// Partition key values in the order of [`Table::partition_keys`]
    pub values: Vec<String>,
    #[serde(default)]
    pub db_name: String,
    #[serde(default)]
    pub table_name: String,
    pub sd: StorageDescriptor,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Partition {
    /// The storage handler class configured for this partition, if any.
    pub fn storage_handler(&self) -> Option<&str> {
        self.parameters.get(META_TABLE_STORAGE).map(String::as_str)
    }
}
