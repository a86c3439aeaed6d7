#![allow(dead_code)]

use std::sync::Arc;

use hive_kernel::{
    DatasetBuilder, DatasetBuilderConfig, DatasetDescriptor, DatasetPath, HiveResult,
};
use test_utils::MockEngine;

pub const USER: &str = "alice";

pub fn path(components: &[&str]) -> DatasetPath {
    DatasetPath::new(components.iter().copied())
}

pub fn resolve(
    engine: &MockEngine,
    components: &[&str],
    config: DatasetBuilderConfig,
) -> HiveResult<Option<DatasetBuilder>> {
    DatasetBuilder::try_resolve(
        Arc::new(engine.clone()),
        USER,
        path(components),
        false,
        config,
        None,
    )
}

/// Resolve `components`, which must name an existing table.
pub fn builder(engine: &MockEngine, components: &[&str]) -> DatasetBuilder {
    resolve(engine, components, DatasetBuilderConfig::default())
        .unwrap()
        .expect("table should resolve")
}

pub fn rebuild(engine: &MockEngine, prior: &DatasetDescriptor) -> DatasetDescriptor {
    DatasetBuilder::try_resolve(
        Arc::new(engine.clone()),
        USER,
        prior.full_path.clone(),
        true,
        DatasetBuilderConfig::default(),
        Some(prior.clone()),
    )
    .unwrap()
    .expect("canonical paths always resolve")
    .dataset()
    .unwrap()
}
