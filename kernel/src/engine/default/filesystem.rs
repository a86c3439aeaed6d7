use std::collections::BTreeMap;
use std::sync::Arc;

use futures::executor::block_on;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{DynObjectStore, ObjectMeta};
use url::Url;

use crate::{Error, FileStatus, FileSystem, HiveResult};

/// A [`FileSystem`] over an [`object_store`]. Object stores have no directories, so directories
/// are synthesized from the paths of the objects beneath them: a directory exists while it holds
/// at least one object, and its modification time is the newest modification time of anything
/// beneath it.
#[derive(Debug)]
pub struct ObjectStoreFileSystem {
    inner: Arc<DynObjectStore>,
}

impl ObjectStoreFileSystem {
    pub fn new(store: Arc<DynObjectStore>) -> Self {
        Self { inner: store }
    }

    /// Every object under `location`, or the object at `location` itself.
    fn list_objects(&self, prefix: &Path) -> HiveResult<Vec<ObjectMeta>> {
        Ok(block_on(
            self.inner
                .list(Some(prefix))
                .try_collect::<Vec<_>>(),
        )?)
    }
}

/// The object store path of a location. Not checking the scheme before calling to_file_path would
/// eat the url path for non-file urls, so only file urls go through the local path conversion.
fn store_path(location: &Url) -> HiveResult<Path> {
    if location.scheme() == "file" {
        let file_path = location
            .to_file_path()
            .map_err(|_| Error::invalid_table_location(location))?;
        Ok(Path::from_absolute_path(file_path)?)
    } else {
        Ok(Path::from_url_path(location.path())?)
    }
}

/// The location of `path` in the store serving `base`.
fn location_of(base: &Url, path: &Path) -> Url {
    let mut location = base.clone();
    location.set_path(&format!("/{}", path.as_ref()));
    location
}

impl FileSystem for ObjectStoreFileSystem {
    fn exists(&self, location: &Url) -> HiveResult<bool> {
        match self.file_status(location) {
            Ok(_) => Ok(true),
            Err(err) => match err.without_backtrace() {
                Error::FileNotFound(_) => Ok(false),
                err => Err(err),
            },
        }
    }

    fn file_status(&self, location: &Url) -> HiveResult<FileStatus> {
        let path = store_path(location)?;
        if !path.as_ref().is_empty() {
            match block_on(self.inner.head(&path)) {
                Ok(meta) => {
                    return Ok(FileStatus::new(
                        location.clone(),
                        false,
                        meta.last_modified.timestamp_millis(),
                        meta.size,
                    ))
                }
                Err(object_store::Error::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        let objects = self.list_objects(&path)?;
        let newest = objects
            .iter()
            .map(|meta| meta.last_modified.timestamp_millis())
            .max()
            .ok_or_else(|| Error::file_not_found(location))?;
        Ok(FileStatus::new(location.clone(), true, newest, 0))
    }

    fn list(&self, location: &Url, recursive: bool) -> HiveResult<Vec<FileStatus>> {
        let prefix = store_path(location)?;
        let mut files = vec![];
        // directory path -> newest modification time beneath it
        let mut dirs: BTreeMap<Path, i64> = BTreeMap::new();

        for meta in self.list_objects(&prefix)? {
            let Some(parts) = meta.location.prefix_match(&prefix) else {
                continue;
            };
            let parts: Vec<_> = parts.collect();
            if parts.is_empty() {
                continue;
            }
            let modified = meta.last_modified.timestamp_millis();
            let depth = if recursive { parts.len() - 1 } else { 1 };
            let mut dir = prefix.clone();
            for part in parts.iter().take(depth.min(parts.len() - 1)) {
                dir = dir.child(part.clone());
                dirs.entry(dir.clone())
                    .and_modify(|newest| *newest = (*newest).max(modified))
                    .or_insert(modified);
            }
            if recursive || parts.len() == 1 {
                files.push(FileStatus::new(
                    location_of(location, &meta.location),
                    false,
                    modified,
                    meta.size,
                ));
            }
        }

        let dirs = dirs
            .into_iter()
            .map(|(path, modified)| FileStatus::new(location_of(location, &path), true, modified, 0));
        Ok(dirs.chain(files).collect())
    }
}
