pub mod config;
pub mod error;
pub mod index;
pub mod layout;
pub mod objects;

pub use config::StoreConfig;
pub use error::StoreError;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use hoist_core::{Fingerprint, StoredObject};

use crate::index::ObjectIndex;
use crate::layout::StoreLayout;

pub struct LocalStore {
    layout: StoreLayout,
    config: StoreConfig,
    index: ObjectIndex,
}

impl LocalStore {
    pub fn init(root: &Path) -> Result<Self, StoreError> {
        Self::init_with(root, StoreConfig::default())
    }

    pub fn init_with(root: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        let layout = StoreLayout::new(root);
        layout.create_dirs()?;
        config::write_config(&layout, &config)?;
        let index = ObjectIndex::open(&layout.index_file())?;
        tracing::debug!("initialized store at {}", root.display());
        Ok(Self {
            layout,
            config,
            index,
        })
    }

    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let layout = StoreLayout::new(root);
        if !layout.config_file().exists() {
            return Err(StoreError::NotAStore(root.to_path_buf()));
        }
        let config = config::read_config(&layout)?;
        let index = ObjectIndex::open(&layout.index_file())?;
        Ok(Self {
            layout,
            config,
            index,
        })
    }

    pub fn open_or_init(root: &Path) -> Result<Self, StoreError> {
        if StoreLayout::new(root).config_file().exists() {
            Self::open(root)
        } else {
            Self::init(root)
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Store `data` under `scope`. `on_chunk(written, total)` runs after every
    /// chunk; returning `false` aborts with [`StoreError::Aborted`].
    pub fn write_object<F>(
        &self,
        scope: &str,
        fp: &Fingerprint,
        data: &[u8],
        media_type: Option<&str>,
        on_chunk: F,
    ) -> Result<StoredObject, StoreError>
    where
        F: FnMut(u64, u64) -> bool,
    {
        let fresh = objects::write_object_chunked(
            &self.layout,
            scope,
            fp,
            data,
            self.config.chunk_size,
            on_chunk,
        )?;
        if !fresh {
            if let Some(existing) = self.index.get(scope, fp)? {
                return Ok(existing);
            }
        }
        let object = StoredObject {
            key: self.layout.object_key(scope, fp)?,
            scope: scope.to_string(),
            fingerprint: *fp,
            size: data.len() as u64,
            stored_at_ms: now_ms(),
            media_type: media_type.map(str::to_string),
        };
        self.index.record(&object)?;
        Ok(object)
    }

    pub fn find(&self, scope: &str, fp: &Fingerprint) -> Result<Option<StoredObject>, StoreError> {
        match self.index.get(scope, fp)? {
            Some(object) if self.has_object(scope, fp) => Ok(Some(object)),
            Some(_) => {
                tracing::warn!("index entry without object bytes: {scope}/{fp}");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn has_object(&self, scope: &str, fp: &Fingerprint) -> bool {
        self.layout
            .object_path(scope, fp)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn read_object(&self, scope: &str, fp: &Fingerprint) -> Result<Vec<u8>, StoreError> {
        objects::read_object(&self.layout, scope, fp)
    }

    pub fn remove_object(&self, scope: &str, fp: &Fingerprint) -> Result<bool, StoreError> {
        let removed = objects::remove_object(&self.layout, scope, fp)?;
        let unindexed = self.index.remove(scope, fp)?;
        Ok(removed || unindexed)
    }

    pub fn list(&self, scope: Option<&str>) -> Result<Vec<StoredObject>, StoreError> {
        self.index.list(scope)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::fingerprint;

    #[test]
    fn open_requires_init() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            LocalStore::open(tmp.path()),
            Err(StoreError::NotAStore(_))
        ));
        LocalStore::init(tmp.path()).unwrap();
        assert!(LocalStore::open(tmp.path()).is_ok());
    }

    #[test]
    fn write_then_find() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::init(tmp.path()).unwrap();
        let data = b"jpeg bytes";
        let fp = fingerprint(data);

        assert!(store.find("album", &fp).unwrap().is_none());
        let stored = store
            .write_object("album", &fp, data, Some("image/jpeg"), |_, _| true)
            .unwrap();
        assert_eq!(stored.size, data.len() as u64);
        assert_eq!(store.find("album", &fp).unwrap(), Some(stored.clone()));
        assert_eq!(store.read_object("album", &fp).unwrap(), data);

        // Rewriting identical bytes returns the original descriptor.
        let again = store.write_object("album", &fp, data, None, |_, _| true).unwrap();
        assert_eq!(again, stored);
    }

    #[test]
    fn deleted_bytes_are_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::init(tmp.path()).unwrap();
        let fp = fingerprint(b"x");
        store.write_object("s", &fp, b"x", None, |_, _| true).unwrap();
        let path = store.layout.object_path("s", &fp).unwrap();
        std::fs::remove_file(path).unwrap();
        assert!(store.find("s", &fp).unwrap().is_none());
    }

    #[test]
    fn reopen_keeps_index() {
        let tmp = tempfile::tempdir().unwrap();
        let fp = fingerprint(b"persist");
        {
            let store = LocalStore::init(tmp.path()).unwrap();
            store.write_object("s", &fp, b"persist", None, |_, _| true).unwrap();
        }
        let store = LocalStore::open(tmp.path()).unwrap();
        assert!(store.find("s", &fp).unwrap().is_some());
        assert_eq!(store.list(Some("s")).unwrap().len(), 1);
        assert!(store.remove_object("s", &fp).unwrap());
        assert!(store.list(None).unwrap().is_empty());
    }
}
