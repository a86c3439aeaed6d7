//! The extended metadata of a dataset: the formats, serdes and properties readers need to read its
//! table and each of its partitions.
//!
//! Metadata is gathered in a [`TableXattrBuilder`] while the dataset is built and finalized once
//! into a [`TableXattr`]. Finalization moves properties and format names into deduplicated
//! dictionaries that the table and partitions reference by subscript, since partitions of a
//! table usually repeat most of them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::format::ReaderType;
use crate::properties::Properties;
use crate::{Error, HiveResult};

/// The format identity and properties of one partition, or of the table when it is unpartitioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionProp {
    pub input_format: Option<String>,
    pub storage_handler: Option<String>,
    pub serialization_lib: Option<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prop {
    pub key: String,
    pub value: String,
}

/// A [`PartitionProp`] with every string replaced by its dictionary subscript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionXattr {
    pub input_format_subscript: Option<u32>,
    pub storage_handler_subscript: Option<u32>,
    pub serialization_lib_subscript: Option<u32>,
    pub property_subscripts: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableXattr {
    pub reader_type: ReaderType,
    pub table_hash: u32,
    /// Only set for partitioned tables
    pub partition_hash: Option<u32>,
    pub table: PartitionXattr,
    pub partitions: Vec<PartitionXattr>,
    pub property_dictionary: Vec<Prop>,
    pub input_format_dictionary: Vec<String>,
    pub storage_handler_dictionary: Vec<String>,
    pub serialization_lib_dictionary: Vec<String>,
}

impl TableXattr {
    pub fn to_bytes(&self) -> HiveResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> HiveResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The table's own format identity and properties.
    pub fn table_prop(&self) -> HiveResult<PartitionProp> {
        self.decode(&self.table)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// The format identity and properties of partition `partition_id`.
    pub fn partition_prop(&self, partition_id: usize) -> HiveResult<PartitionProp> {
        let encoded = self.partitions.get(partition_id).ok_or_else(|| {
            Error::generic(format!(
                "Partition {partition_id} out of range, there are {} partitions",
                self.partitions.len()
            ))
        })?;
        self.decode(encoded)
    }

    fn decode(&self, encoded: &PartitionXattr) -> HiveResult<PartitionProp> {
        let lookup = |dictionary: &[String], subscript: Option<u32>| {
            subscript
                .map(|s| entry(dictionary, s).cloned())
                .transpose()
        };
        let properties = encoded
            .property_subscripts
            .iter()
            .map(|s| entry(&self.property_dictionary, *s).map(|p| (p.key.clone(), p.value.clone())))
            .collect::<HiveResult<_>>()?;
        Ok(PartitionProp {
            input_format: lookup(&self.input_format_dictionary, encoded.input_format_subscript)?,
            storage_handler: lookup(
                &self.storage_handler_dictionary,
                encoded.storage_handler_subscript,
            )?,
            serialization_lib: lookup(
                &self.serialization_lib_dictionary,
                encoded.serialization_lib_subscript,
            )?,
            properties,
        })
    }
}

fn entry<T>(dictionary: &[T], subscript: u32) -> HiveResult<&T> {
    dictionary
        .get(subscript as usize)
        .ok_or_else(|| Error::generic(format!("Dictionary subscript {subscript} out of range")))
}

/// Assigns subscripts in order of first appearance.
#[derive(Debug)]
struct Dictionary<T> {
    entries: Vec<T>,
    subscripts: HashMap<T, u32>,
}

impl<T> Default for Dictionary<T> {
    fn default() -> Self {
        Self {
            entries: vec![],
            subscripts: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + std::hash::Hash> Dictionary<T> {
    fn subscript(&mut self, value: T) -> u32 {
        if let Some(subscript) = self.subscripts.get(&value) {
            return *subscript;
        }
        let subscript = self.entries.len() as u32;
        self.entries.push(value.clone());
        self.subscripts.insert(value, subscript);
        subscript
    }
}

/// Accumulates the extended metadata of a dataset under construction.
#[derive(Debug)]
pub struct TableXattrBuilder {
    table_hash: u32,
    table: PartitionProp,
    partitions: Vec<PartitionProp>,
    partition_hash: Option<u32>,
    reader_type: ReaderType,
}

impl TableXattrBuilder {
    pub fn new(table_hash: u32, table: PartitionProp) -> Self {
        Self {
            table_hash,
            table,
            partitions: vec![],
            partition_hash: None,
            reader_type: ReaderType::NativeParquet,
        }
    }

    pub fn add_partition(&mut self, partition: PartitionProp) {
        self.partitions.push(partition);
    }

    pub fn set_partition_hash(&mut self, hash: u32) {
        self.partition_hash = Some(hash);
    }

    pub fn set_reader_type(&mut self, reader_type: ReaderType) {
        self.reader_type = reader_type;
    }

    /// Finalize the metadata, dictionary encoding every property and name.
    pub fn build(self) -> TableXattr {
        let mut properties = Dictionary::default();
        let mut input_formats = Dictionary::default();
        let mut storage_handlers = Dictionary::default();
        let mut serialization_libs = Dictionary::default();

        let mut encode = |prop: PartitionProp| PartitionXattr {
            input_format_subscript: prop.input_format.map(|f| input_formats.subscript(f)),
            storage_handler_subscript: prop.storage_handler.map(|h| storage_handlers.subscript(h)),
            serialization_lib_subscript: prop
                .serialization_lib
                .map(|l| serialization_libs.subscript(l)),
            property_subscripts: prop
                .properties
                .into_iter()
                .map(|(key, value)| properties.subscript(Prop { key, value }))
                .collect(),
        };
        let table = encode(self.table);
        let partitions = self.partitions.into_iter().map(&mut encode).collect();

        TableXattr {
            reader_type: self.reader_type,
            table_hash: self.table_hash,
            partition_hash: self.partition_hash,
            table,
            partitions,
            property_dictionary: properties.entries,
            input_format_dictionary: input_formats.entries,
            storage_handler_dictionary: storage_handlers.entries,
            serialization_lib_dictionary: serialization_libs.entries,
        }
    }
}
