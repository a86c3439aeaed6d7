//! A number of utilities useful for testing that we want to use in multiple crates: in-memory
//! implementations of the metastore, the filesystem and the split framework, and table fixtures.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use hive_kernel::catalog::{FieldSchema, Partition, SerDeInfo, StorageDescriptor, Table};
use hive_kernel::format::PARQUET_INPUT_FORMAT;
use hive_kernel::{
    AcidSplitInfo, Engine, Error, FileStatus, FileSystem, FormatHandle, HiveResult, JobConf,
    MetastoreClient, RawSplit, SplitFramework,
};
use itertools::Itertools;
use url::Url;

pub const PARQUET_SERDE: &str = "org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe";
pub const LAZY_SIMPLE_SERDE: &str = "org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe";
pub const TEXT_INPUT_FORMAT: &str = "org.apache.hadoop.mapred.TextInputFormat";
pub const HBASE_STORAGE_HANDLER: &str = "org.apache.hadoop.hive.hbase.HBaseStorageHandler";

fn catalog_key(database: &str, table: &str) -> (String, String) {
    (database.to_lowercase(), table.to_lowercase())
}

/// A metastore holding tables and partitions in memory. Names are matched case-insensitively, and
/// returned tables carry the spelling they were added with.
#[derive(Default)]
pub struct InMemoryMetastore {
    tables: RwLock<HashMap<(String, String), Table>>,
    partitions: RwLock<HashMap<(String, String), Vec<Partition>>>,
    denied: RwLock<HashSet<(String, String)>>,
}

impl InMemoryMetastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, table: Table) {
        let key = catalog_key(&table.db_name, &table.table_name);
        self.tables.write().unwrap().insert(key, table);
    }

    pub fn add_partitions(&self, table: &Table, partitions: Vec<Partition>) {
        let key = catalog_key(&table.db_name, &table.table_name);
        self.partitions.write().unwrap().insert(key, partitions);
    }

    pub fn remove_table(&self, database: &str, table: &str) {
        self.tables
            .write()
            .unwrap()
            .remove(&catalog_key(database, table));
    }

    /// Make the table inaccessible: fetching it fails with an authorization error.
    pub fn deny(&self, database: &str, table: &str) {
        self.denied
            .write()
            .unwrap()
            .insert(catalog_key(database, table));
    }
}

impl MetastoreClient for InMemoryMetastore {
    fn get_table(
        &self,
        database: &str,
        table: &str,
        ignore_authz_errors: bool,
    ) -> HiveResult<Option<Table>> {
        let key = catalog_key(database, table);
        if self.denied.read().unwrap().contains(&key) {
            if ignore_authz_errors {
                return Ok(None);
            }
            return Err(Error::metastore_access(format!(
                "user is not authorized to access {database}.{table}"
            )));
        }
        Ok(self.tables.read().unwrap().get(&key).cloned())
    }

    fn get_partitions(&self, database: &str, table: &str) -> HiveResult<Vec<Partition>> {
        Ok(self
            .partitions
            .read()
            .unwrap()
            .get(&catalog_key(database, table))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy)]
struct MockEntry {
    is_dir: bool,
    last_modified: i64,
    size: u64,
}

fn entry_key(location: &Url) -> String {
    location.as_str().trim_end_matches('/').to_string()
}

/// A filesystem tree held in memory. Files must be added with [`MockFileSystem::add_file`], which
/// also creates any missing parent directories.
#[derive(Default)]
pub struct MockFileSystem {
    entries: RwLock<BTreeMap<String, MockEntry>>,
    failing: RwLock<HashSet<String>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, location: &str, last_modified: i64) {
        let mut entries = self.entries.write().unwrap();
        let location = location.trim_end_matches('/');
        Self::add_parents(&mut entries, location, last_modified);
        entries.insert(
            location.to_string(),
            MockEntry {
                is_dir: true,
                last_modified,
                size: 0,
            },
        );
    }

    pub fn add_file(&self, location: &str, size: u64, last_modified: i64) {
        let mut entries = self.entries.write().unwrap();
        Self::add_parents(&mut entries, location, last_modified);
        entries.insert(
            location.to_string(),
            MockEntry {
                is_dir: false,
                last_modified,
                size,
            },
        );
    }

    fn add_parents(entries: &mut BTreeMap<String, MockEntry>, location: &str, last_modified: i64) {
        let Some(scheme_end) = location.find("://") else {
            return;
        };
        let authority_start = scheme_end + 3;
        let mut parent = location;
        while let Some((dir, _)) = parent.rsplit_once('/') {
            // stop at the authority
            if dir.len() <= authority_start || !dir[authority_start..].contains('/') {
                break;
            }
            entries.entry(dir.to_string()).or_insert(MockEntry {
                is_dir: true,
                last_modified,
                size: 0,
            });
            parent = dir;
        }
    }

    /// Set the modification time of an existing entry.
    pub fn touch(&self, location: &str, last_modified: i64) {
        if let Some(entry) = self
            .entries
            .write()
            .unwrap()
            .get_mut(location.trim_end_matches('/'))
        {
            entry.last_modified = last_modified;
        }
    }

    /// Remove an entry and everything beneath it.
    pub fn remove(&self, location: &str) {
        let location = location.trim_end_matches('/');
        let prefix = format!("{location}/");
        self.entries
            .write()
            .unwrap()
            .retain(|key, _| key != location && !key.starts_with(&prefix));
    }

    /// Make every operation on `location` fail.
    pub fn fail_on(&self, location: &str) {
        self.failing
            .write()
            .unwrap()
            .insert(location.trim_end_matches('/').to_string());
    }

    fn check(&self, key: &str) -> HiveResult<()> {
        if self.failing.read().unwrap().contains(key) {
            return Err(Error::generic(format!("injected failure for {key}")));
        }
        Ok(())
    }

    fn status(key: &str, entry: &MockEntry) -> HiveResult<FileStatus> {
        Ok(FileStatus::new(
            Url::parse(key)?,
            entry.is_dir,
            entry.last_modified,
            entry.size,
        ))
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, location: &Url) -> HiveResult<bool> {
        let key = entry_key(location);
        self.check(&key)?;
        Ok(self.entries.read().unwrap().contains_key(&key))
    }

    fn file_status(&self, location: &Url) -> HiveResult<FileStatus> {
        let key = entry_key(location);
        self.check(&key)?;
        let entries = self.entries.read().unwrap();
        let entry = entries
            .get(&key)
            .ok_or_else(|| Error::file_not_found(&key))?;
        Self::status(&key, entry)
    }

    fn list(&self, location: &Url, recursive: bool) -> HiveResult<Vec<FileStatus>> {
        let key = entry_key(location);
        self.check(&key)?;
        let prefix = format!("{key}/");
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .filter(|(child, _)| {
                child
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| recursive || !rest.contains('/'))
            })
            .map(|(child, entry)| Self::status(child, entry))
            .collect()
    }
}

/// A split of a given length, optionally with hosts and an ACID layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSplit {
    pub length: u64,
    pub hosts: Vec<String>,
    pub acid: Option<AcidSplitInfo>,
}

impl MockSplit {
    pub fn new(length: u64) -> Self {
        Self {
            length,
            hosts: vec![],
            acid: None,
        }
    }

    pub fn with_hosts(mut self, hosts: &[&str]) -> Self {
        self.hosts = hosts.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn with_acid(mut self, acid: AcidSplitInfo) -> Self {
        self.acid = Some(acid);
        self
    }
}

impl RawSplit for MockSplit {
    fn length(&self) -> u64 {
        self.length
    }

    fn locations(&self) -> Vec<String> {
        self.hosts.clone()
    }

    fn split_class(&self) -> &str {
        "org.apache.hadoop.mapred.FileSplit"
    }

    fn payload(&self) -> HiveResult<Vec<u8>> {
        Ok(self.length.to_le_bytes().to_vec())
    }

    fn acid_info(&self) -> Option<&AcidSplitInfo> {
        self.acid.as_ref()
    }
}

/// Serves preset splits for each input directory. Every input format resolves to a file based
/// handle; every storage handler to a handle that is not file based.
#[derive(Default)]
pub struct MockSplitFramework {
    splits: RwLock<HashMap<String, Vec<MockSplit>>>,
    failing: RwLock<HashSet<String>>,
    unknown_formats: RwLock<HashSet<String>>,
}

impl MockSplitFramework {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_splits(&self, location: &str, splits: Vec<MockSplit>) {
        self.splits
            .write()
            .unwrap()
            .entry(location.to_string())
            .or_default()
            .extend(splits);
    }

    /// Make computing the splits of `location` fail.
    pub fn fail_on(&self, location: &str) {
        self.failing.write().unwrap().insert(location.to_string());
    }

    /// Make resolving `class_name` fail.
    pub fn forget_format(&self, class_name: &str) {
        self.unknown_formats
            .write()
            .unwrap()
            .insert(class_name.to_string());
    }

    fn check_known(&self, class_name: &str) -> HiveResult<()> {
        if self.unknown_formats.read().unwrap().contains(class_name) {
            return Err(Error::UnknownFormat(class_name.to_string()));
        }
        Ok(())
    }
}

impl SplitFramework for MockSplitFramework {
    fn resolve_input_format(&self, class_name: &str) -> HiveResult<FormatHandle> {
        self.check_known(class_name)?;
        Ok(FormatHandle::file_based(class_name))
    }

    fn resolve_storage_handler(&self, handler: &str, _job: &JobConf) -> HiveResult<FormatHandle> {
        self.check_known(handler)?;
        Ok(FormatHandle::non_file_based(format!("{handler}$InputFormat")))
    }

    fn compute_splits(
        &self,
        _format: &FormatHandle,
        job: &JobConf,
    ) -> HiveResult<Vec<Box<dyn RawSplit>>> {
        let mut result: Vec<Box<dyn RawSplit>> = vec![];
        for location in job.input_paths() {
            if self.failing.read().unwrap().contains(location) {
                return Err(Error::generic(format!("cannot compute splits of {location}")));
            }
            if let Some(splits) = self.splits.read().unwrap().get(location) {
                result.extend(
                    splits
                        .iter()
                        .map(|split| Box::new(split.clone()) as Box<dyn RawSplit>),
                );
            }
        }
        Ok(result)
    }
}

/// An engine whose collaborators are the in-memory mocks above. One filesystem serves every
/// location.
#[derive(Default, Clone)]
pub struct MockEngine {
    pub metastore: Arc<InMemoryMetastore>,
    pub fs: Arc<MockFileSystem>,
    pub splits: Arc<MockSplitFramework>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for MockEngine {
    fn metastore_client(&self) -> Arc<dyn MetastoreClient> {
        self.metastore.clone()
    }

    fn file_system(&self, _location: &Url, _job: &JobConf) -> HiveResult<Arc<dyn FileSystem>> {
        Ok(self.fs.clone())
    }

    fn split_framework(&self) -> Arc<dyn SplitFramework> {
        self.splits.clone()
    }
}

pub fn columns(columns: &[(&str, &str)]) -> Vec<FieldSchema> {
    columns
        .iter()
        .map(|(name, type_name)| FieldSchema::new(*name, *type_name))
        .collect()
}

/// An unpartitioned parquet table.
pub fn parquet_table(database: &str, name: &str, location: &str, cols: &[(&str, &str)]) -> Table {
    Table {
        db_name: database.to_string(),
        table_name: name.to_string(),
        owner: Some("hive".to_string()),
        table_type: Some("MANAGED_TABLE".to_string()),
        sd: StorageDescriptor {
            cols: columns(cols),
            location: Some(location.to_string()),
            input_format: Some(PARQUET_INPUT_FORMAT.to_string()),
            output_format: Some(
                "org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat".to_string(),
            ),
            serde_info: SerDeInfo {
                serialization_lib: Some(PARQUET_SERDE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A parquet table partitioned by `keys`.
pub fn partitioned_parquet_table(
    database: &str,
    name: &str,
    location: &str,
    cols: &[(&str, &str)],
    keys: &[(&str, &str)],
) -> Table {
    let mut table = parquet_table(database, name, location, cols);
    table.partition_keys = columns(keys);
    table
}

/// A partition of `table` located under the table's location in the usual `key=value` layout,
/// with the table's formats.
pub fn partition(table: &Table, values: &[&str]) -> Partition {
    let dir = table
        .partition_keys
        .iter()
        .zip(values)
        .map(|(key, value)| format!("{}={value}", key.name))
        .join("/");
    let mut sd = table.sd.clone();
    sd.location = Some(format!(
        "{}/{dir}",
        table.sd.location.as_deref().unwrap_or_default()
    ));
    Partition {
        values: values.iter().map(|v| v.to_string()).collect(),
        db_name: table.db_name.clone(),
        table_name: table.table_name.clone(),
        sd,
        parameters: BTreeMap::new(),
    }
}
