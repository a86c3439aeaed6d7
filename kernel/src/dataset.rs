//! Dataset descriptors and the [`DatasetBuilder`] that assembles them from a metastore table.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{Partition, Table};
use crate::config::DatasetBuilderConfig;
use crate::fingerprint::{partition_fingerprint, partition_hash, table_fingerprint};
use crate::format::{resolve_format, ReaderSelector, ReaderType};
use crate::parallel::run_timed;
use crate::partition_value::{decode_partition_value, PartitionValue};
use crate::properties::{
    is_recursive, partition_metadata, table_schema_properties, JobConf, Properties,
};
use crate::read_signature::{build_update_key, FileSystemPartitionUpdateKey, ReadSignature};
use crate::schema::{estimate_record_size, Schema, StructType, TypeInfo, TypeMapper};
use crate::split::{PhysicalSplit, SplitGenerator, SplitWork};
use crate::stats::HiveStats;
use crate::utils::{parse_location, require};
use crate::xattr::{PartitionProp, TableXattr, TableXattrBuilder};
use crate::{Engine, Error, FormatHandle, HiveResult};

/// Database of tables addressed without one
pub const DEFAULT_DATABASE: &str = "default";

/// The path of a dataset: the source root followed by the database and the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetPath(Vec<String>);

impl DatasetPath {
    pub fn new(components: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(components.into_iter().map(Into::into).collect())
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The last component, i.e. the table name of a resolved path
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl Display for DatasetPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
    PhysicalDataset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatsType {
    ExactRowCount,
    NoExactRowCount,
}

/// The raw inputs of cost estimation for a scan of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub record_count: i64,
    pub disk_cost: f64,
    pub cpu_cost: f64,
    pub scan_factor: f64,
    #[serde(rename = "type")]
    pub stats_type: ScanStatsType,
}

impl ScanStats {
    fn estimated(stats: &HiveStats, reader_type: ReaderType) -> Self {
        let bytes = stats.size_in_bytes as f64;
        Self {
            record_count: stats.num_rows,
            disk_cost: bytes,
            cpu_cost: bytes,
            scan_factor: reader_type.scan_factor(),
            stats_type: ScanStatsType::NoExactRowCount,
        }
    }
}

/// Everything about a dataset that is rederived whenever it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadDefinition {
    pub partition_columns: Vec<String>,
    pub sort_columns: Vec<String>,
    /// Millis since the epoch
    pub last_refresh_date: i64,
    /// A serialized [`TableXattr`]
    pub extended_property: Vec<u8>,
    /// A serialized [`ReadSignature`], absent if the files of the dataset cannot be tracked
    pub read_signature: Option<Vec<u8>>,
    pub scan_stats: ScanStats,
}

impl ReadDefinition {
    pub fn table_xattr(&self) -> HiveResult<TableXattr> {
        TableXattr::from_bytes(&self.extended_property)
    }

    pub fn signature(&self) -> HiveResult<Option<ReadSignature>> {
        self.read_signature
            .as_deref()
            .map(ReadSignature::from_bytes)
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDescriptor {
    /// Generated when the dataset is first built and kept across rebuilds
    pub id: Uuid,
    pub full_path: DatasetPath,
    pub name: String,
    pub owner: String,
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,
    pub schema: Schema,
    pub read_definition: ReadDefinition,
}

/// Resolves a dataset path against the metastore and builds the [`DatasetDescriptor`] and splits
/// of the table it names. Building happens once, on the first call to [`DatasetBuilder::dataset`]
/// or [`DatasetBuilder::splits`].
pub struct DatasetBuilder {
    engine: Arc<dyn Engine>,
    user: String,
    path: DatasetPath,
    database: String,
    table_name: String,
    table: Option<Table>,
    config: DatasetBuilderConfig,
    prior: Option<DatasetDescriptor>,
    built: Option<(DatasetDescriptor, Vec<PhysicalSplit>)>,
}

impl std::fmt::Debug for DatasetBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetBuilder")
            .field("user", &self.user)
            .field("path", &self.path)
            .field("built", &self.built.is_some())
            .finish()
    }
}

impl DatasetBuilder {
    /// Resolve `path`, which is either `root.table` (in the default database) or
    /// `root.database.table`. Returns `Ok(None)` if the path has another shape or names no table.
    ///
    /// A `canonical` path is trusted to carry the metastore's spelling of the names and is not
    /// looked up; otherwise the table is fetched and its names replace those of `path`. `prior` is
    /// the descriptor of an earlier build of the same dataset, if any.
    pub fn try_resolve(
        engine: Arc<dyn Engine>,
        user: impl Into<String>,
        path: DatasetPath,
        canonical: bool,
        config: DatasetBuilderConfig,
        prior: Option<DatasetDescriptor>,
    ) -> HiveResult<Option<Self>> {
        let Some((root, rest)) = path.components().split_first() else {
            return Ok(None);
        };
        let (database, table_name) = match rest {
            [table] => (DEFAULT_DATABASE, table.as_str()),
            [database, table] => (database.as_str(), table.as_str()),
            _ => return Ok(None),
        };

        let (path, table) = if canonical {
            (
                DatasetPath::new([root.as_str(), database, table_name]),
                None,
            )
        } else {
            let table = engine.metastore_client().get_table(
                database,
                table_name,
                config.ignore_authz_errors,
            )?;
            let Some(table) = table else {
                debug!("Table {database}.{table_name} not found");
                return Ok(None);
            };
            (
                DatasetPath::new([
                    root.as_str(),
                    table.db_name.as_str(),
                    table.table_name.as_str(),
                ]),
                Some(table),
            )
        };

        let (database, table_name) = match path.components() {
            [_, database, table] => (database.clone(), table.clone()),
            _ => return Ok(None),
        };
        Ok(Some(Self {
            engine,
            user: user.into(),
            path,
            database,
            table_name,
            table,
            config,
            prior,
            built: None,
        }))
    }

    /// The resolved path of the dataset.
    pub fn name(&self) -> &DatasetPath {
        &self.path
    }

    pub fn dataset_type(&self) -> DatasetType {
        DatasetType::PhysicalDataset
    }

    /// Hive datasets can always be saved.
    pub fn is_saveable(&self) -> bool {
        true
    }

    pub fn dataset(&mut self) -> HiveResult<DatasetDescriptor> {
        Ok(self.build()?.0.clone())
    }

    pub fn splits(&mut self) -> HiveResult<Vec<PhysicalSplit>> {
        Ok(self.build()?.1.clone())
    }

    fn build(&mut self) -> HiveResult<&(DatasetDescriptor, Vec<PhysicalSplit>)> {
        let built = match self.built.take() {
            Some(built) => built,
            None => self.build_dataset()?,
        };
        let built: &_ = self.built.insert(built);
        Ok(built)
    }

    fn fetch_table(&mut self) -> HiveResult<Table> {
        if let Some(table) = self.table.take() {
            return Ok(table);
        }
        self.engine
            .metastore_client()
            .get_table(
                &self.database,
                &self.table_name,
                self.config.ignore_authz_errors,
            )?
            .ok_or_else(|| Error::TableDisappeared {
                database: self.database.clone(),
                table: self.table_name.clone(),
            })
    }

    fn build_dataset(&mut self) -> HiveResult<(DatasetDescriptor, Vec<PhysicalSplit>)> {
        info!("Building dataset {}", self.path);
        let table = self.fetch_table()?;
        let (schema, partition_columns) = self.schema(&table)?;
        let record_size = estimate_record_size(
            &schema,
            self.config.stats_params.list_size_estimate,
            self.config.stats_params.var_field_size_estimate,
        );

        let table_props = table_schema_properties(&table);
        let mut xattr = TableXattrBuilder::new(
            table_fingerprint(&table)?,
            PartitionProp {
                input_format: table.sd.input_format.clone(),
                storage_handler: table.storage_handler().map(str::to_string),
                serialization_lib: table.sd.serde_info.serialization_lib.clone(),
                properties: table_props.clone(),
            },
        );
        let build = BuildContext {
            engine: self.engine.as_ref(),
            config: &self.config,
            table: &table,
            table_props: &table_props,
            record_size,
        };
        let parts = if table.is_partitioned() {
            let partitions = self
                .engine
                .metastore_client()
                .get_partitions(&table.db_name, &table.table_name)?;
            build.partitioned(&partitions, &mut xattr)?
        } else {
            build.unpartitioned(&mut xattr)?
        };

        let stats = if self.config.stats_params.use_metastore_stats
            && parts.metastore_stats.is_valid()
        {
            parts.metastore_stats
        } else {
            parts.observed_stats
        };
        xattr.set_reader_type(parts.reader_type);
        let read_signature = parts
            .update_keys
            .map(|keys| ReadSignature::filesystem(keys).to_bytes())
            .transpose()?;

        let read_definition = ReadDefinition {
            partition_columns,
            sort_columns: table.sd.sort_cols.iter().map(|o| o.col.clone()).collect(),
            last_refresh_date: chrono::Utc::now().timestamp_millis(),
            extended_property: xattr.build().to_bytes()?,
            read_signature,
            scan_stats: ScanStats::estimated(&stats, parts.reader_type),
        };
        let descriptor = DatasetDescriptor {
            id: self.prior.as_ref().map_or_else(Uuid::new_v4, |prior| prior.id),
            full_path: self.path.clone(),
            name: self.table_name.clone(),
            owner: self.user.clone(),
            dataset_type: DatasetType::PhysicalDataset,
            schema,
            read_definition,
        };
        debug!(
            "Built dataset {} with {} splits",
            self.path,
            parts.splits.len()
        );
        Ok((descriptor, parts.splits))
    }

    /// Data columns followed by partition columns, skipping columns of types the engine cannot
    /// represent. Also returns the names of the partition columns that were kept.
    fn schema(&self, table: &Table) -> HiveResult<(Schema, Vec<String>)> {
        let mut mapper = TypeMapper::new(self.config.max_leaf_columns);
        let mut fields = vec![];
        for column in &table.sd.cols {
            fields.extend(mapper.map_column(&column.name, &column.type_name)?);
        }
        let mut partition_columns = vec![];
        for key in &table.partition_keys {
            if let Some(field) = mapper.map_column(&key.name, &key.type_name)? {
                partition_columns.push(field.name().clone());
                fields.push(field);
            }
        }
        Ok((StructType::new(fields), partition_columns))
    }
}

/// What building the partitions (or the table, if unpartitioned) produced.
struct PartitionsOutcome {
    splits: Vec<PhysicalSplit>,
    observed_stats: HiveStats,
    metastore_stats: HiveStats,
    reader_type: ReaderType,
    /// `None` if some location cannot be covered by a signature
    update_keys: Option<Vec<FileSystemPartitionUpdateKey>>,
}

struct BuildContext<'a> {
    engine: &'a dyn Engine,
    config: &'a DatasetBuilderConfig,
    table: &'a Table,
    table_props: &'a Properties,
    record_size: usize,
}

impl BuildContext<'_> {
    fn job(&self, properties: &Properties) -> JobConf {
        let mut job = self.config.base_conf.clone();
        job.add_properties(properties);
        job
    }

    fn generator(
        &self,
        location: &str,
        description: String,
        format: FormatHandle,
        mut job: JobConf,
        partition_id: u32,
    ) -> SplitGenerator {
        job.add_input_path(location);
        SplitGenerator::new(location, description, format, job, partition_id)
            .with_record_size(self.record_size)
            .with_stats_params(self.config.stats_params)
    }

    fn location<'p>(&self, location: &'p Option<String>) -> HiveResult<&'p str> {
        location.as_deref().ok_or_else(|| {
            Error::invalid_table_location(format!(
                "No location for {}.{}",
                self.table.db_name, self.table.table_name
            ))
        })
    }

    /// An unpartitioned table is a single implicit partition, generated inline.
    fn unpartitioned(&self, xattr: &mut TableXattrBuilder) -> HiveResult<PartitionsOutcome> {
        let table = self.table;
        let properties = self.table_props;
        let job = self.job(properties);
        let framework = self.engine.split_framework();
        let format = resolve_format(framework.as_ref(), table, None, &job)?;
        let mut selector = ReaderSelector::default();
        selector.observe(&format);
        xattr.add_partition(PartitionProp {
            input_format: Some(format.input_format_class.clone()),
            storage_handler: table.storage_handler().map(str::to_string),
            serialization_lib: table.sd.serde_info.serialization_lib.clone(),
            properties: properties.clone(),
        });

        let location = self.location(&table.sd.location)?;
        let url = parse_location(location)?;
        let fs = self.engine.file_system(&url, &job)?;
        let metastore_stats = HiveStats::from_properties(properties);

        let work = if fs.exists(&url)? {
            let description = format!("table {}.{}", table.db_name, table.table_name);
            self.generator(location, description, format.clone(), job.clone(), 0)
                .with_metastore_stats(metastore_stats)
                .run(self.engine)?
        } else {
            SplitWork {
                splits: vec![],
                stats: HiveStats::empty(),
            }
        };

        let update_keys = if format.file_based {
            build_update_key(fs.as_ref(), &url, is_recursive(job.settings()), 0)?
                .map(|key| vec![key])
        } else {
            None
        };
        Ok(PartitionsOutcome {
            splits: work.splits,
            observed_stats: work.stats,
            metastore_stats,
            reader_type: selector.reader_type(),
            update_keys,
        })
    }

    fn partitioned(
        &self,
        partitions: &[Partition],
        xattr: &mut TableXattrBuilder,
    ) -> HiveResult<PartitionsOutcome> {
        let table = self.table;
        let framework = self.engine.split_framework();
        let key_types = table
            .partition_keys
            .iter()
            .map(|key| key.type_name.parse::<TypeInfo>())
            .collect::<HiveResult<Vec<_>>>()?;

        let mut selector = ReaderSelector::default();
        let mut fingerprints = Vec::with_capacity(partitions.len());
        let mut update_keys = Some(vec![]);
        let mut generators = vec![];

        for (partition_id, partition) in (0u32..).zip(partitions) {
            fingerprints.push(partition_fingerprint(partition)?);
            let properties = partition_metadata(partition, table);
            let job = self.job(&properties);
            let format = resolve_format(framework.as_ref(), table, Some(partition), &job)?;
            selector.observe(&format);
            xattr.add_partition(PartitionProp {
                input_format: Some(format.input_format_class.clone()),
                storage_handler: partition.storage_handler().map(str::to_string),
                serialization_lib: partition.sd.serde_info.serialization_lib.clone(),
                properties: properties.clone(),
            });

            let partition_stats = HiveStats::from_properties(&properties);

            let values = self.partition_values(partition, &key_types)?;
            let location = self.location(&partition.sd.location)?;
            let url = parse_location(location)?;
            let fs = self.engine.file_system(&url, &job)?;
            if fs.exists(&url)? {
                let description = format!("partition {location}");
                generators.push(
                    self.generator(location, description, format.clone(), job.clone(), partition_id)
                        .with_metastore_stats(partition_stats)
                        .with_partition_values(values),
                );
            }

            if let Some(keys) = update_keys.as_mut() {
                let key = if format.file_based {
                    let recursive = is_recursive(job.settings());
                    build_update_key(fs.as_ref(), &url, recursive, partition_id)?
                } else {
                    None
                };
                match key {
                    Some(key) => keys.push(key),
                    None => {
                        debug!(
                            "No read signature for {}.{}: {location} is not tracked",
                            table.db_name, table.table_name
                        );
                        update_keys = None;
                    }
                }
            }
        }
        xattr.set_partition_hash(partition_hash(fingerprints));

        let engine = self.engine;
        let units: Vec<_> = generators
            .iter()
            .map(|generator| move || generator.run(engine))
            .collect();
        let results = run_timed("Hive split generation", units, self.config.split_parallelism)?;

        let mut splits = vec![];
        let mut observed_stats = HiveStats::empty();
        for work in results {
            observed_stats.add(&work.stats);
            splits.extend(work.splits);
        }
        Ok(PartitionsOutcome {
            splits,
            observed_stats,
            metastore_stats: HiveStats::from_properties(self.table_props),
            reader_type: selector.reader_type(),
            update_keys: update_keys.filter(|keys| !keys.is_empty()),
        })
    }

    fn partition_values(
        &self,
        partition: &Partition,
        key_types: &[TypeInfo],
    ) -> HiveResult<Vec<PartitionValue>> {
        require!(
            partition.values.len() == key_types.len(),
            Error::generic(format!(
                "Partition {:?} of {}.{} has {} values for {} partition keys",
                partition.values,
                self.table.db_name,
                self.table.table_name,
                partition.values.len(),
                key_types.len()
            ))
        );
        self.table
            .partition_keys
            .iter()
            .zip(key_types)
            .zip(&partition.values)
            .map(|((key, type_info), raw)| decode_partition_value(&key.name, type_info, raw))
            .collect()
    }
}
