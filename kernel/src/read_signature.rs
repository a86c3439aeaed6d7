//! Read signatures: compact snapshots of the files behind a dataset, recorded when the dataset is
//! built so that an engine can later tell whether the files changed without building it again.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::properties::JobConf;
use crate::utils::{join_child, parse_location, relative_path};
use crate::{Engine, FileSystem, HiveResult};

/// One file or directory of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEntity {
    /// Path relative to the partition root; empty for the root itself
    pub path: String,
    pub last_modification_time: i64,
    pub is_dir: bool,
}

/// The snapshot of one partition (or of the table, when unpartitioned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemPartitionUpdateKey {
    pub partition_id: u32,
    /// Fully qualified root directory of the partition
    pub partition_root_dir: String,
    pub cached_entities: Vec<CachedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadSignature {
    /// Snapshots of filesystem trees, one per partition, in partition order
    #[serde(rename_all = "camelCase")]
    Filesystem {
        fs_partition_update_keys: Vec<FileSystemPartitionUpdateKey>,
    },
}

impl ReadSignature {
    pub fn filesystem(update_keys: Vec<FileSystemPartitionUpdateKey>) -> Self {
        ReadSignature::Filesystem {
            fs_partition_update_keys: update_keys,
        }
    }

    pub fn update_keys(&self) -> &[FileSystemPartitionUpdateKey] {
        match self {
            ReadSignature::Filesystem {
                fs_partition_update_keys,
            } => fs_partition_update_keys,
        }
    }

    pub fn to_bytes(&self) -> HiveResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> HiveResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Whether any file or directory recorded in this signature was modified or removed since it
    /// was taken.
    pub fn has_changed(&self, engine: &dyn Engine, job: &JobConf) -> HiveResult<bool> {
        for key in self.update_keys() {
            let root = parse_location(&key.partition_root_dir)?;
            let fs = engine.file_system(&root, job)?;
            for entity in &key.cached_entities {
                let location = entity
                    .path
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .try_fold(root.clone(), |url, segment| join_child(&url, segment))?;
                if !fs.exists(&location)? {
                    debug!("{location} was removed");
                    return Ok(true);
                }
                let status = fs.file_status(&location)?;
                if status.last_modified != entity.last_modification_time {
                    debug!("{location} was modified");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Snapshot the tree under `root`. Returns `None` if nothing exists at `root`.
///
/// A directory root yields the root itself followed by its children (or, with `recursive`, by
/// everything beneath it), each with its path relative to the root. A file root yields just the
/// file.
pub fn build_update_key(
    fs: &dyn FileSystem,
    root: &Url,
    recursive: bool,
    partition_id: u32,
) -> HiveResult<Option<FileSystemPartitionUpdateKey>> {
    if !fs.exists(root)? {
        return Ok(None);
    }
    let root_status = fs.file_status(root)?;
    let mut cached_entities = vec![CachedEntity {
        path: String::new(),
        last_modification_time: root_status.last_modified,
        is_dir: root_status.is_dir,
    }];
    if root_status.is_dir {
        cached_entities.extend(fs.list(root, recursive)?.into_iter().map(|status| {
            CachedEntity {
                path: relative_path(&status.location, root),
                last_modification_time: status.last_modified,
                is_dir: status.is_dir,
            }
        }));
    }
    Ok(Some(FileSystemPartitionUpdateKey {
        partition_id,
        partition_root_dir: fs.make_qualified(root)?,
        cached_entities,
    }))
}
