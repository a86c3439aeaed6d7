//! Input formats, as far as the kernel needs to tell them apart.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

use crate::catalog::{Partition, Table};
use crate::properties::JobConf;
use crate::{Error, HiveResult, SplitFramework};

pub const PARQUET_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat";
pub const ORC_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat";
pub const AVRO_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.avro.AvroContainerInputFormat";
pub const RCFILE_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.RCFileInputFormat";

/// The input formats the kernel knows something about. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
pub enum FormatKind {
    Parquet,
    Orc,
    Avro,
    RcFile,
    Other,
}

impl FormatKind {
    /// Classify an input format by its class name.
    pub fn from_input_format_class(class_name: &str) -> Self {
        match class_name {
            PARQUET_INPUT_FORMAT => FormatKind::Parquet,
            ORC_INPUT_FORMAT => FormatKind::Orc,
            AVRO_INPUT_FORMAT => FormatKind::Avro,
            RCFILE_INPUT_FORMAT => FormatKind::RcFile,
            _ => FormatKind::Other,
        }
    }

    /// How much larger the decoded data is assumed to be than its on-disk bytes.
    pub fn compression_factor(&self) -> f64 {
        match self {
            FormatKind::Parquet | FormatKind::Orc => 30.0,
            FormatKind::Avro | FormatKind::RcFile => 10.0,
            FormatKind::Other => 1.0,
        }
    }
}

/// An input format resolved by the [`SplitFramework`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatHandle {
    /// Class name of the input format that will produce the splits
    pub input_format_class: String,
    pub kind: FormatKind,
    /// Whether the format reads files under a filesystem location. Only such formats can be
    /// covered by a filesystem read signature.
    pub file_based: bool,
}

impl FormatHandle {
    /// A file based handle, classified by its class name.
    pub fn file_based(input_format_class: impl Into<String>) -> Self {
        let input_format_class = input_format_class.into();
        Self {
            kind: FormatKind::from_input_format_class(&input_format_class),
            input_format_class,
            file_based: true,
        }
    }

    /// A handle for a format that does not read from a filesystem, e.g. one backed by a storage
    /// handler.
    pub fn non_file_based(input_format_class: impl Into<String>) -> Self {
        Self {
            input_format_class: input_format_class.into(),
            kind: FormatKind::Other,
            file_based: false,
        }
    }
}

/// The reader a dataset should be read with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, AsRefStr, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReaderType {
    /// Every partition is parquet; the engine's native parquet reader can be used
    NativeParquet,
    Basic,
}

impl ReaderType {
    /// Relative scan cost
    pub fn scan_factor(&self) -> f64 {
        match self {
            ReaderType::NativeParquet => 1.0,
            ReaderType::Basic => 5.0,
        }
    }
}

/// Tracks whether every format seen so far is parquet. Starts out (and with no formats stays)
/// allowing the native reader.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReaderSelector {
    native_parquet: bool,
}

impl Default for ReaderSelector {
    fn default() -> Self {
        Self {
            native_parquet: true,
        }
    }
}

impl ReaderSelector {
    pub(crate) fn observe(&mut self, format: &FormatHandle) {
        self.native_parquet &= format.kind == FormatKind::Parquet;
    }

    pub(crate) fn reader_type(&self) -> ReaderType {
        if self.native_parquet {
            ReaderType::NativeParquet
        } else {
            ReaderType::Basic
        }
    }
}

/// Resolve the input format of a table, or of one of its partitions. The first of these that is
/// set wins: the partition's input format, the partition's storage handler, the table's input
/// format, the table's storage handler.
pub fn resolve_format(
    framework: &dyn SplitFramework,
    table: &Table,
    partition: Option<&Partition>,
    job: &JobConf,
) -> HiveResult<FormatHandle> {
    if let Some(partition) = partition {
        if let Some(class_name) = &partition.sd.input_format {
            return framework.resolve_input_format(class_name);
        }
        if let Some(handler) = partition.storage_handler() {
            return framework.resolve_storage_handler(handler, job);
        }
    }
    if let Some(class_name) = &table.sd.input_format {
        return framework.resolve_input_format(class_name);
    }
    if let Some(handler) = table.storage_handler() {
        return framework.resolve_storage_handler(handler, job);
    }
    Err(Error::MissingInputFormat)
}
