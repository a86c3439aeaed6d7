//! Sizing of splits of transactional (ACID) tables.
//!
//! A transactional table (or partition) directory holds an optional base, either `base_N/` with
//! `bucket_NNNNN` files or "original" files written before the table became transactional
//! (`000000_0`), plus `delta_<min>_<max>[_<stmt>]/` directories holding the changes made since.
//! A split reads one bucket of the base together with the same bucket of every delta, so its
//! length is the base split's length plus the size of each of those delta bucket files.

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::utils::{file_name, join_child, parent};
use crate::{Error, FileSystem, HiveResult};

const BUCKET_PREFIX: &str = "bucket_";

/// A delta directory, named by the transaction range it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcidDelta {
    pub min_txn: i64,
    pub max_txn: i64,
    pub statement_id: Option<i32>,
}

impl AcidDelta {
    pub fn new(min_txn: i64, max_txn: i64) -> Self {
        Self {
            min_txn,
            max_txn,
            statement_id: None,
        }
    }

    pub fn with_statement_id(self, statement_id: i32) -> Self {
        Self {
            statement_id: Some(statement_id),
            ..self
        }
    }

    /// Directory name, e.g. `delta_0000005_0000007` or `delta_0000005_0000007_0001`
    pub fn directory_name(&self) -> String {
        match self.statement_id {
            Some(stmt) => format!("delta_{:07}_{:07}_{:04}", self.min_txn, self.max_txn, stmt),
            None => format!("delta_{:07}_{:07}", self.min_txn, self.max_txn),
        }
    }
}

/// The ACID layout of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcidSplitInfo {
    /// The base file of the split, or the table/partition directory if there is no base
    pub path: Url,
    /// Offset into the base file. Without a base this is the bucket number instead.
    pub start: u64,
    /// Length of the base split
    pub length: u64,
    pub has_base: bool,
    /// Whether the base consists of files written before the table became transactional
    pub is_original: bool,
    pub deltas: Vec<AcidDelta>,
}

/// File name of a bucket, e.g. `bucket_00003`
pub fn bucket_file_name(bucket: u32) -> String {
    format!("{BUCKET_PREFIX}{bucket:05}")
}

/// The bucket number of a base file, named either `bucket_N` or, for original files, `N_copy`
/// with a six digit bucket number.
pub fn parse_bucket(file_name: &str) -> HiveResult<u32> {
    if let Some(bucket) = file_name.strip_prefix(BUCKET_PREFIX) {
        let digits = bucket.split('_').next().unwrap_or_default();
        return Ok(digits.parse()?);
    }
    match file_name.split_once('_') {
        Some((bucket, copy))
            if bucket.len() == 6
                && bucket.bytes().all(|b| b.is_ascii_digit())
                && !copy.is_empty()
                && copy.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Ok(bucket.parse()?)
        }
        _ => Err(Error::generic(format!(
            "Cannot parse the bucket of base file {file_name}"
        ))),
    }
}

/// The length of an ACID split: the base split's length plus the bucket's file in every delta.
/// Any failure is logged and reported as a length of 1, so that planning can go on.
pub fn split_length(fs: &dyn FileSystem, info: &AcidSplitInfo) -> u64 {
    match try_split_length(fs, info) {
        Ok(length) => length,
        Err(err) => {
            warn!("Failed to derive the input split size of transactional Hive tables: {err}");
            1
        }
    }
}

fn try_split_length(fs: &dyn FileSystem, info: &AcidSplitInfo) -> HiveResult<u64> {
    let (root, bucket, mut size) = if info.has_base {
        let base_dir = parent(&info.path)?;
        let root = if info.is_original {
            base_dir
        } else {
            parent(&base_dir)?
        };
        let name = file_name(&info.path)
            .ok_or_else(|| Error::generic(format!("{} has no file name", info.path)))?;
        (root, parse_bucket(name)?, info.length)
    } else {
        let bucket = u32::try_from(info.start)
            .map_err(|_| Error::generic(format!("Invalid bucket {}", info.start)))?;
        (info.path.clone(), bucket, 0)
    };

    for delta in &info.deltas {
        let delta_dir = join_child(&root, &delta.directory_name())?;
        let delta_file = join_child(&delta_dir, &bucket_file_name(bucket))?;
        size += fs.file_status(&delta_file)?.size;
    }
    Ok(size)
}
