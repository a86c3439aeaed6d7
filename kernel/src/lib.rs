//! # hive_kernel
//!
//! Hive Kernel turns a table definition stored in a Hive metastore into a self-contained dataset
//! descriptor a query engine can plan against: a resolved schema, the physical splits of every
//! partition with size and row estimates, and a compact read signature that lets the engine find
//! out later whether the underlying files changed.
//!
//! The kernel does not talk to the metastore, the filesystem or the per-format split machinery
//! itself. Those are provided by an [`Engine`], which exposes one handle per concern:
//!
//! - [`MetastoreClient`]: fetches [`Table`](catalog::Table) and [`Partition`](catalog::Partition)
//!   objects.
//! - [`FileSystem`]: stats and lists storage locations. Acquired per location, since different
//!   locations may live on different filesystems.
//! - [`SplitFramework`]: resolves input formats and storage handlers by name and computes the raw
//!   splits of a location.
//!
//! The main entry point is [`DatasetBuilder`]:
//!
//! ```rust,ignore
//! let builder = DatasetBuilder::try_resolve(engine, "user", path, false, config, None)?;
//! if let Some(mut builder) = builder {
//!     let descriptor = builder.dataset()?;
//!     let splits = builder.splits()?;
//! }
//! ```
//!
//! A [`DefaultEngine`](engine::default::DefaultEngine) is provided which backs the
//! [`FileSystem`] with the [object_store] crate. Metastore and split framework implementations
//! are supplied by the caller.

#![warn(
    trivial_numeric_casts,
    unused_extern_crates,
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

use std::fmt::Debug;
use std::sync::Arc;

use url::Url;

pub mod acid;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod format;
pub mod partition_value;
pub mod properties;
pub mod read_signature;
pub mod schema;
pub mod split;
pub mod stats;
pub mod xattr;

pub(crate) mod parallel;
pub(crate) mod utils;

pub use acid::AcidSplitInfo;
pub use config::DatasetBuilderConfig;
pub use dataset::{DatasetBuilder, DatasetDescriptor, DatasetPath};
pub use error::{Error, HiveResult};
pub use format::{FormatHandle, FormatKind};
pub use properties::JobConf;

/// The metadata of a file or directory, as reported by a [`FileSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// The fully qualified location of the entry
    pub location: Url,
    pub is_dir: bool,
    /// Last modification time in milliseconds since the unix epoch
    pub last_modified: i64,
    /// Size in bytes. Zero for directories.
    pub size: u64,
}

impl FileStatus {
    pub fn new(location: Url, is_dir: bool, last_modified: i64, size: u64) -> Self {
        Self {
            location,
            is_dir,
            last_modified,
            size,
        }
    }
}

/// Provides access to the Hive metastore.
pub trait MetastoreClient: Send + Sync {
    /// Fetch a table by database and table name. Name matching is the metastore's business; the
    /// returned table carries the canonical spelling of both names. Returns `Ok(None)` if the table
    /// does not exist (or is not visible and `ignore_authz_errors` is set).
    fn get_table(
        &self,
        database: &str,
        table: &str,
        ignore_authz_errors: bool,
    ) -> HiveResult<Option<catalog::Table>>;

    /// Fetch every partition of a table.
    fn get_partitions(&self, database: &str, table: &str) -> HiveResult<Vec<catalog::Partition>>;
}

/// Provides the filesystem operations the kernel needs to size splits and build read signatures.
pub trait FileSystem: Send + Sync {
    fn exists(&self, location: &Url) -> HiveResult<bool>;

    /// Get the status of a single file or directory. Fails with [`Error::FileNotFound`] if there
    /// is nothing at `location`.
    fn file_status(&self, location: &Url) -> HiveResult<FileStatus>;

    /// List the entries under a directory. With `recursive` set, entries of every subdirectory are
    /// included as well (subdirectories themselves are always reported). The order is unspecified.
    fn list(&self, location: &Url, recursive: bool) -> HiveResult<Vec<FileStatus>>;

    /// The fully qualified form of `location`, e.g. with scheme and authority filled in.
    fn make_qualified(&self, location: &Url) -> HiveResult<String> {
        Ok(location.to_string())
    }
}

/// A split as produced by the [`SplitFramework`] for some input format. The kernel only
/// interprets its length, its host locations and, for transactional tables, its ACID layout.
pub trait RawSplit: Send + Sync + Debug {
    /// Length in bytes, as reported by the input format
    fn length(&self) -> u64;

    /// Hosts holding the split's data
    fn locations(&self) -> Vec<String>;

    /// The identity of the split's class, needed to deserialize [`RawSplit::payload`]
    fn split_class(&self) -> &str;

    /// The split serialized in whatever form the reader expects
    fn payload(&self) -> HiveResult<Vec<u8>>;

    /// The ACID layout of the split, if it belongs to a transactional table
    fn acid_info(&self) -> Option<&AcidSplitInfo> {
        None
    }
}

/// The pluggable per-format split machinery.
pub trait SplitFramework: Send + Sync {
    /// Resolve an input format class by name.
    fn resolve_input_format(&self, class_name: &str) -> HiveResult<FormatHandle>;

    /// Resolve the input format of a storage handler class, configured with `job`.
    fn resolve_storage_handler(&self, handler: &str, job: &JobConf) -> HiveResult<FormatHandle>;

    /// Compute the raw splits of the input directory configured in `job`.
    fn compute_splits(&self, format: &FormatHandle, job: &JobConf)
        -> HiveResult<Vec<Box<dyn RawSplit>>>;
}

/// The `Engine` trait bundles the collaborators the kernel needs. Connectors implement it to
/// hand the kernel access to their metastore, filesystem and split framework.
pub trait Engine: Send + Sync {
    /// Get the connector provided [`MetastoreClient`].
    fn metastore_client(&self) -> Arc<dyn MetastoreClient>;

    /// Get a [`FileSystem`] able to serve `location`, configured with `job`.
    fn file_system(&self, location: &Url, job: &JobConf) -> HiveResult<Arc<dyn FileSystem>>;

    /// Get the connector provided [`SplitFramework`].
    fn split_framework(&self) -> Arc<dyn SplitFramework>;
}
