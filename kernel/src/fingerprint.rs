//! Change fingerprints of tables and partitions. A fingerprint covers the descriptive fields that
//! change when a table or partition is altered, and is stable across processes and platforms: the
//! fields are encoded as JSON (parameter maps are ordered) and the hash is a crc32 of those bytes.

use serde::Serialize;

use crate::catalog::{Partition, Table};
use crate::HiveResult;

fn crc_of(value: &impl Serialize) -> HiveResult<u32> {
    Ok(crc32fast::hash(&serde_json::to_vec(value)?))
}

/// Fingerprint of a table's type, parameters, partition keys, storage descriptor and view texts.
pub fn table_fingerprint(table: &Table) -> HiveResult<u32> {
    crc_of(&(
        &table.table_type,
        &table.parameters,
        &table.partition_keys,
        &table.sd,
        &table.view_expanded_text,
        &table.view_original_text,
    ))
}

/// Fingerprint of a partition's storage descriptor, parameters and values.
pub fn partition_fingerprint(partition: &Partition) -> HiveResult<u32> {
    crc_of(&(&partition.sd, &partition.parameters, &partition.values))
}

/// Combined fingerprint of a set of partitions, independent of the order they were listed in.
pub fn partition_hash(fingerprints: impl IntoIterator<Item = u32>) -> u32 {
    let mut sorted: Vec<u32> = fingerprints.into_iter().collect();
    sorted.sort_unstable();
    let mut hasher = crc32fast::Hasher::new();
    for fingerprint in sorted {
        hasher.update(&fingerprint.to_le_bytes());
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StorageDescriptor;

    fn partition(value: &str) -> Partition {
        Partition {
            values: vec![value.to_string()],
            sd: StorageDescriptor {
                location: Some(format!("hdfs://nn/t/ds={value}")),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn fingerprints_track_changes() {
        let mut table = Table {
            db_name: "db".to_string(),
            table_name: "t".to_string(),
            ..Default::default()
        };
        let before = table_fingerprint(&table).unwrap();
        assert_eq!(before, table_fingerprint(&table.clone()).unwrap());
        table
            .parameters
            .insert("numRows".to_string(), "1".to_string());
        assert_ne!(before, table_fingerprint(&table).unwrap());

        let p = partition("a");
        let mut altered = p.clone();
        altered.sd.location = Some("hdfs://nn/elsewhere".to_string());
        assert_ne!(
            partition_fingerprint(&p).unwrap(),
            partition_fingerprint(&altered).unwrap()
        );
    }

    #[test]
    fn table_names_are_not_fingerprinted() {
        let table = Table::default();
        let renamed = Table {
            table_name: "renamed".to_string(),
            ..Table::default()
        };
        assert_eq!(
            table_fingerprint(&table).unwrap(),
            table_fingerprint(&renamed).unwrap()
        );
    }

    #[test]
    fn partition_hash_ignores_order() {
        let fps: Vec<u32> = ["a", "b", "c"]
            .iter()
            .map(|v| partition_fingerprint(&partition(v)).unwrap())
            .collect();
        let forward = partition_hash(fps.iter().copied());
        let backward = partition_hash(fps.iter().rev().copied());
        let shuffled = partition_hash([fps[1], fps[2], fps[0]]);
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        assert_ne!(forward, partition_hash(fps[..2].iter().copied()));
    }

    #[test]
    fn partition_hash_covers_little_endian_fingerprints() {
        assert_eq!(partition_hash([3, 1, 2]), 0xb0e0_2293);
    }
}
