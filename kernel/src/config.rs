//! Configuration of a [`DatasetBuilder`](crate::DatasetBuilder).

use crate::properties::{JobConf, Properties};
use crate::stats::StatsEstimationParameters;
use crate::utils::require;
use crate::{Error, HiveResult};

/// Default maximum number of leaf columns of a dataset
pub const DEFAULT_MAX_LEAF_COLUMNS: usize = 800;
/// Default number of locations split generation works on concurrently
pub const DEFAULT_SPLIT_PARALLELISM: usize = 16;

#[derive(Debug, Clone)]
pub struct DatasetBuilderConfig {
    /// Datasets with more leaf columns than this fail to build
    pub max_leaf_columns: usize,
    /// Width of the worker pool generating splits for the partitions of a table
    pub split_parallelism: usize,
    /// Treat tables the user may not access as if they did not exist
    pub ignore_authz_errors: bool,
    pub stats_params: StatsEstimationParameters,
    /// Hive configuration every job configuration starts from
    pub base_conf: JobConf,
}

impl Default for DatasetBuilderConfig {
    fn default() -> Self {
        Self {
            max_leaf_columns: DEFAULT_MAX_LEAF_COLUMNS,
            split_parallelism: DEFAULT_SPLIT_PARALLELISM,
            ignore_authz_errors: false,
            stats_params: StatsEstimationParameters::default(),
            base_conf: JobConf::default(),
        }
    }
}

impl DatasetBuilderConfig {
    pub fn builder() -> DatasetBuilderConfigBuilder {
        DatasetBuilderConfigBuilder::default()
    }
}

/// Builder for [`DatasetBuilderConfig`]
#[derive(Debug, Default)]
pub struct DatasetBuilderConfigBuilder {
    config: DatasetBuilderConfig,
}

impl DatasetBuilderConfigBuilder {
    pub fn with_max_leaf_columns(mut self, max: usize) -> Self {
        self.config.max_leaf_columns = max;
        self
    }

    pub fn with_split_parallelism(mut self, parallelism: usize) -> Self {
        self.config.split_parallelism = parallelism;
        self
    }

    pub fn with_ignore_authz_errors(mut self, ignore: bool) -> Self {
        self.config.ignore_authz_errors = ignore;
        self
    }

    pub fn with_metastore_stats(mut self, use_metastore_stats: bool) -> Self {
        self.config.stats_params.use_metastore_stats = use_metastore_stats;
        self
    }

    pub fn with_list_size_estimate(mut self, estimate: usize) -> Self {
        self.config.stats_params.list_size_estimate = estimate;
        self
    }

    pub fn with_var_field_size_estimate(mut self, estimate: usize) -> Self {
        self.config.stats_params.var_field_size_estimate = estimate;
        self
    }

    /// Add hive configuration settings to the base job configuration.
    pub fn with_hive_conf(mut self, settings: Properties) -> Self {
        for (key, value) in settings {
            self.config.base_conf.set(key, value);
        }
        self
    }

    pub fn build(self) -> HiveResult<DatasetBuilderConfig> {
        let config = self.config;
        require!(
            config.split_parallelism >= 1,
            Error::generic("split parallelism must be at least 1")
        );
        require!(
            config.stats_params.list_size_estimate >= 1,
            Error::generic("list size estimate must be at least 1")
        );
        require!(
            config.stats_params.var_field_size_estimate >= 1,
            Error::generic("variable field size estimate must be at least 1")
        );
        Ok(config)
    }
}
