//! Row count and size statistics, reported by the metastore or observed while generating splits.

use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::format::FormatKind;
use crate::properties::Properties;

/// Table parameter holding the number of rows, as computed by `ANALYZE TABLE`
pub const ROW_COUNT: &str = "numRows";
/// Table parameter holding the total size of the table's files in bytes
pub const TOTAL_SIZE: &str = "totalSize";

/// Row count and size of a table, partition or set of splits. Either field is -1 when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveStats {
    pub num_rows: i64,
    pub size_in_bytes: i64,
}

impl HiveStats {
    pub fn new(num_rows: i64, size_in_bytes: i64) -> Self {
        Self {
            num_rows,
            size_in_bytes,
        }
    }

    /// Zero rows in zero bytes, the starting point when summing observed stats
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    pub fn unknown() -> Self {
        Self::new(-1, -1)
    }

    /// Stats are usable only if both the row count and the size are known.
    pub fn is_valid(&self) -> bool {
        self.num_rows >= 0 && self.size_in_bytes >= 0
    }

    pub fn add(&mut self, other: &HiveStats) {
        self.num_rows += other.num_rows;
        self.size_in_bytes += other.size_in_bytes;
    }

    /// Read the stats the metastore keeps in a table's or partition's properties. Values that are
    /// absent stay unknown. Stats the metastore reports are not necessarily up to date with the
    /// underlying data.
    pub fn from_properties(properties: &Properties) -> Self {
        let mut stats = Self::unknown();
        let parsed = (|| -> Result<(), std::num::ParseIntError> {
            if let Some(rows) = properties.get(ROW_COUNT) {
                stats.num_rows = rows.trim().parse()?;
            }
            if let Some(size) = properties.get(TOTAL_SIZE) {
                stats.size_in_bytes = size.trim().parse()?;
            }
            Ok(())
        })();
        if let Err(err) = parsed {
            error!("Failed to parse Hive stats in metastore: {err}");
        }
        stats
    }
}

/// Tunables of the row count estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsEstimationParameters {
    /// Prefer valid metastore stats over estimates derived from file sizes
    pub use_metastore_stats: bool,
    /// Assumed number of elements of an array column
    pub list_size_estimate: usize,
    /// Assumed width in bytes of a string or binary value
    pub var_field_size_estimate: usize,
}

impl Default for StatsEstimationParameters {
    fn default() -> Self {
        Self {
            use_metastore_stats: false,
            list_size_estimate: 5,
            var_field_size_estimate: 15,
        }
    }
}

/// Estimate the row count of one split of `split_bytes` bytes. `size_ratio` is the split's share
/// of the bytes of its location, used to apportion the location's metastore row count.
///
/// The estimate derived from the split size is ignored in favor of the metastore's only if
/// metastore stats are preferred and valid; otherwise the larger of the two is used.
pub fn estimate_row_count(
    params: &StatsEstimationParameters,
    metastore_stats: &HiveStats,
    size_ratio: f64,
    split_bytes: u64,
    format: FormatKind,
    record_size: usize,
) -> i64 {
    let compression_factor = format.compression_factor();
    let record_size = record_size.max(1) as f64;
    let estimated = (split_bytes as f64 * compression_factor / record_size).ceil() as i64;
    let from_metastore = (size_ratio * metastore_stats.num_rows as f64).ceil() as i64;

    trace!(
        "Hive stats estimation: compression factor {compression_factor}, recordSize {record_size}, \
         estimated {estimated}, from metastore {from_metastore}"
    );

    if params.use_metastore_stats && metastore_stats.is_valid() {
        return from_metastore;
    }
    estimated.max(from_metastore)
}
