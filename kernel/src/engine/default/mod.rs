//! # The Default Engine
//!
//! The default implementation of [`Engine`] is [`DefaultEngine`]. It serves every location from an
//! [`ObjectStoreFileSystem`], one per scheme and authority, and delegates the metastore and the split
//! framework to the implementations it is built with.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use object_store::DynObjectStore;
use tracing::debug;
use url::Url;

use self::filesystem::ObjectStoreFileSystem;
use crate::properties::JobConf;
use crate::{Engine, Error, FileSystem, HiveResult, MetastoreClient, SplitFramework};

pub mod filesystem;

/// Job settings with this prefix are passed (without it) as options to stores the engine creates.
pub const OBJECT_STORE_OPTION_PREFIX: &str = "hive_kernel.object_store.";

pub struct DefaultEngine {
    file_systems: RwLock<HashMap<String, Arc<ObjectStoreFileSystem>>>,
    metastore: Arc<dyn MetastoreClient>,
    split_framework: Arc<dyn SplitFramework>,
}

/// Locations with the same scheme and authority share a store.
fn store_key(location: &Url) -> String {
    format!("{}://{}", location.scheme(), location.authority())
}

impl DefaultEngine {
    /// Create a new [`DefaultEngine`] instance. Stores for locations are created on first use
    /// with [`object_store::parse_url_opts`].
    pub fn new(metastore: Arc<dyn MetastoreClient>, split_framework: Arc<dyn SplitFramework>) -> Self {
        Self {
            file_systems: RwLock::new(HashMap::new()),
            metastore,
            split_framework,
        }
    }

    /// Serve every location with the scheme and authority of `root` from `object_store`.
    pub fn with_object_store(mut self, root: &Url, object_store: Arc<DynObjectStore>) -> Self {
        let fs = Arc::new(ObjectStoreFileSystem::new(object_store));
        self.file_systems
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(store_key(root), fs);
        self.file_systems.clear_poison();
        self
    }

    fn create_file_system(location: &Url, job: &JobConf) -> HiveResult<Arc<ObjectStoreFileSystem>> {
        let options = job.settings().iter().filter_map(|(key, value)| {
            key.strip_prefix(OBJECT_STORE_OPTION_PREFIX)
                .map(|key| (key.to_string(), value.clone()))
        });
        let (store, _path) = object_store::parse_url_opts(location, options)?;
        debug!("Created object store for {}", store_key(location));
        Ok(Arc::new(ObjectStoreFileSystem::new(Arc::from(store))))
    }
}

impl Engine for DefaultEngine {
    fn metastore_client(&self) -> Arc<dyn MetastoreClient> {
        self.metastore.clone()
    }

    fn file_system(&self, location: &Url, job: &JobConf) -> HiveResult<Arc<dyn FileSystem>> {
        let key = store_key(location);
        {
            let file_systems = self
                .file_systems
                .read()
                .map_err(|_| Error::generic("file system cache lock poisoned"))?;
            if let Some(fs) = file_systems.get(&key) {
                return Ok(fs.clone());
            }
        }
        let mut file_systems = self
            .file_systems
            .write()
            .map_err(|_| Error::generic("file system cache lock poisoned"))?;
        let fs = match file_systems.get(&key) {
            Some(fs) => fs.clone(),
            None => {
                let fs = Self::create_file_system(location, job)?;
                file_systems.insert(key, fs.clone());
                fs
            }
        };
        Ok(fs)
    }

    fn split_framework(&self) -> Arc<dyn SplitFramework> {
        self.split_framework.clone()
    }
}
