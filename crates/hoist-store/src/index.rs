use hoist_core::{Fingerprint, StoredObject};
use redb::ReadableTable;

use crate::StoreError;

pub struct ObjectIndex {
    db: redb::Database,
}

const OBJECTS_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("objects");

fn index_key(scope: &str, fp: &Fingerprint) -> String {
    format!("{scope}\0{}", fp.to_hex())
}

fn index_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Index(e.to_string())
}

impl ObjectIndex {
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let db = redb::Database::create(path).map_err(index_err)?;
        // Make sure the table exists so read transactions never fail on a
        // fresh store.
        let write_txn = db.begin_write().map_err(index_err)?;
        {
            write_txn.open_table(OBJECTS_TABLE).map_err(index_err)?;
        }
        write_txn.commit().map_err(index_err)?;
        Ok(Self { db })
    }

    pub fn record(&self, object: &StoredObject) -> Result<(), StoreError> {
        let value = serde_json::to_vec(object).map_err(index_err)?;
        let key = index_key(&object.scope, &object.fingerprint);
        let write_txn = self.db.begin_write().map_err(index_err)?;
        {
            let mut table = write_txn.open_table(OBJECTS_TABLE).map_err(index_err)?;
            table.insert(key.as_str(), value.as_slice()).map_err(index_err)?;
        }
        write_txn.commit().map_err(index_err)?;
        Ok(())
    }

    pub fn get(&self, scope: &str, fp: &Fingerprint) -> Result<Option<StoredObject>, StoreError> {
        let read_txn = self.db.begin_read().map_err(index_err)?;
        let table = read_txn.open_table(OBJECTS_TABLE).map_err(index_err)?;
        let key = index_key(scope, fp);
        match table.get(key.as_str()).map_err(index_err)? {
            Some(guard) => {
                let object = serde_json::from_slice(guard.value()).map_err(index_err)?;
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, scope: &str, fp: &Fingerprint) -> Result<bool, StoreError> {
        let key = index_key(scope, fp);
        let write_txn = self.db.begin_write().map_err(index_err)?;
        let removed = {
            let mut table = write_txn.open_table(OBJECTS_TABLE).map_err(index_err)?;
            let removed = table.remove(key.as_str()).map_err(index_err)?;
            removed.is_some()
        };
        write_txn.commit().map_err(index_err)?;
        Ok(removed)
    }

    pub fn list(&self, scope: Option<&str>) -> Result<Vec<StoredObject>, StoreError> {
        let read_txn = self.db.begin_read().map_err(index_err)?;
        let table = read_txn.open_table(OBJECTS_TABLE).map_err(index_err)?;
        let prefix = scope.map(|s| format!("{s}\0"));
        let mut objects = Vec::new();
        for entry in table.iter().map_err(index_err)? {
            let (key, value) = entry.map_err(index_err)?;
            if let Some(prefix) = &prefix {
                if !key.value().starts_with(prefix.as_str()) {
                    continue;
                }
            }
            objects.push(serde_json::from_slice(value.value()).map_err(index_err)?);
        }
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::fingerprint;

    fn object(scope: &str, data: &[u8]) -> StoredObject {
        StoredObject {
            key: format!("{scope}/key"),
            scope: scope.to_string(),
            fingerprint: fingerprint(data),
            size: data.len() as u64,
            stored_at_ms: 1000,
            media_type: None,
        }
    }

    #[test]
    fn record_get_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let index = ObjectIndex::open(&tmp.path().join("index.redb")).unwrap();
        let obj = object("album", b"a");
        assert!(index.get("album", &obj.fingerprint).unwrap().is_none());
        index.record(&obj).unwrap();
        assert_eq!(index.get("album", &obj.fingerprint).unwrap(), Some(obj.clone()));
        assert!(index.get("other", &obj.fingerprint).unwrap().is_none());
        assert!(index.remove("album", &obj.fingerprint).unwrap());
        assert!(index.get("album", &obj.fingerprint).unwrap().is_none());
    }

    #[test]
    fn list_filters_by_scope() {
        let tmp = tempfile::tempdir().unwrap();
        let index = ObjectIndex::open(&tmp.path().join("index.redb")).unwrap();
        index.record(&object("a", b"1")).unwrap();
        index.record(&object("a", b"2")).unwrap();
        index.record(&object("ab", b"3")).unwrap();
        assert_eq!(index.list(Some("a")).unwrap().len(), 2);
        assert_eq!(index.list(None).unwrap().len(), 3);
    }
}
