//! Physical splits and their generation. A [`SplitGenerator`] turns one storage location (the
//! table's, or one partition's) into [`PhysicalSplit`]s annotated with sizes, row estimates, host
//! affinities and partition values.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::acid;
use crate::format::FormatHandle;
use crate::partition_value::PartitionValue;
use crate::properties::JobConf;
use crate::stats::{estimate_row_count, HiveStats, StatsEstimationParameters};
use crate::utils::parse_location;
use crate::{Engine, Error, HiveResult};

/// The weight of a host for reading a split: the number of bytes it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affinity {
    pub host: String,
    pub factor: f64,
}

/// A raw split as the reader will get it back: its class identity and serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedInputSplit {
    pub input_split_class: String,
    pub input_split: Vec<u8>,
}

/// Extended attributes of a [`PhysicalSplit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitXattr {
    /// Ordinal of the partition the split belongs to
    pub partition_id: u32,
    pub input_split: SerializedInputSplit,
}

impl SplitXattr {
    pub fn to_bytes(&self) -> HiveResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> HiveResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalSplit {
    /// `{location}__{ordinal}`, unique within a dataset
    pub split_key: String,
    pub size: u64,
    pub row_count: i64,
    /// In the order of the table's partition keys
    pub partition_values: Vec<PartitionValue>,
    pub affinities: Vec<Affinity>,
    pub partition_id: u32,
    /// A serialized [`SplitXattr`]
    pub extended_property: Vec<u8>,
}

impl PhysicalSplit {
    pub fn xattr(&self) -> HiveResult<SplitXattr> {
        SplitXattr::from_bytes(&self.extended_property)
    }
}

/// The outcome of one [`SplitGenerator`]: its splits and the observed stats of its location.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitWork {
    pub splits: Vec<PhysicalSplit>,
    pub stats: HiveStats,
}

/// Generates the splits of one storage location. Owns everything it needs, so that it can be
/// handed to a worker thread.
#[derive(Debug, Clone)]
pub struct SplitGenerator {
    location: String,
    description: String,
    format: FormatHandle,
    job: JobConf,
    metastore_stats: HiveStats,
    partition_id: u32,
    partition_values: Vec<PartitionValue>,
    record_size: usize,
    stats_params: StatsEstimationParameters,
}

impl SplitGenerator {
    /// A generator for `location`, whose input directory must already be set in `job`.
    /// `description` names the location in error messages, e.g. `table db.t`.
    pub fn new(
        location: impl Into<String>,
        description: impl Into<String>,
        format: FormatHandle,
        job: JobConf,
        partition_id: u32,
    ) -> Self {
        Self {
            location: location.into(),
            description: description.into(),
            format,
            job,
            metastore_stats: HiveStats::unknown(),
            partition_id,
            partition_values: vec![],
            record_size: 1,
            stats_params: StatsEstimationParameters::default(),
        }
    }

    pub fn with_metastore_stats(mut self, stats: HiveStats) -> Self {
        self.metastore_stats = stats;
        self
    }

    pub fn with_partition_values(mut self, values: Vec<PartitionValue>) -> Self {
        self.partition_values = values;
        self
    }

    pub fn with_record_size(mut self, record_size: usize) -> Self {
        self.record_size = record_size;
        self
    }

    pub fn with_stats_params(mut self, params: StatsEstimationParameters) -> Self {
        self.stats_params = params;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn run(&self, engine: &dyn Engine) -> HiveResult<SplitWork> {
        self.generate(engine)
            .map_err(|err| Error::split_generation(&self.description, err))
    }

    fn generate(&self, engine: &dyn Engine) -> HiveResult<SplitWork> {
        let location = parse_location(&self.location)?;
        let fs = engine.file_system(&location, &self.job)?;
        let raw_splits = engine
            .split_framework()
            .compute_splits(&self.format, &self.job)?;

        let lengths: Vec<u64> = raw_splits
            .iter()
            .map(|split| match split.acid_info() {
                Some(info) => acid::split_length(fs.as_ref(), info),
                None => split.length(),
            })
            .collect();
        let total_bytes: u64 = lengths.iter().sum();

        let mut splits = Vec::with_capacity(raw_splits.len());
        let mut total_rows = 0;
        for (ordinal, (raw, length)) in raw_splits.iter().zip(lengths).enumerate() {
            let size_ratio = if total_bytes == 0 {
                0.0
            } else {
                length as f64 / total_bytes as f64
            };
            let row_count = estimate_row_count(
                &self.stats_params,
                &self.metastore_stats,
                size_ratio,
                length,
                self.format.kind,
                self.record_size,
            );
            total_rows += row_count;

            let affinities = raw
                .locations()
                .into_iter()
                .map(|host| Affinity {
                    host,
                    factor: length as f64,
                })
                .collect();
            let xattr = SplitXattr {
                partition_id: self.partition_id,
                input_split: SerializedInputSplit {
                    input_split_class: raw.split_class().to_string(),
                    input_split: raw.payload()?,
                },
            };
            splits.push(PhysicalSplit {
                split_key: format!("{}__{ordinal}", self.location),
                size: length,
                row_count,
                partition_values: self.partition_values.clone(),
                affinities,
                partition_id: self.partition_id,
                extended_property: xattr.to_bytes()?,
            });
        }

        debug!(
            "{} splits with {total_bytes} bytes for {}",
            splits.len(),
            self.description
        );
        Ok(SplitWork {
            splits,
            stats: HiveStats::new(total_rows, total_bytes as i64),
        })
    }
}
