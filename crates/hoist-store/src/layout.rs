use std::path::{Path, PathBuf};

use hoist_core::Fingerprint;

use crate::StoreError;

#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("store.toml")
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join("index.redb")
    }

    /// Relative key of an object: `<scope>/<shard>/<suffix>`.
    pub fn object_key(&self, scope: &str, fp: &Fingerprint) -> Result<String, StoreError> {
        let scope_dir = scope_dir_name(scope)?;
        Ok(format!(
            "{scope_dir}/{}/{}",
            fp.shard_prefix(),
            fp.shard_suffix()
        ))
    }

    pub fn object_path(&self, scope: &str, fp: &Fingerprint) -> Result<PathBuf, StoreError> {
        Ok(self.objects_dir().join(self.object_key(scope, fp)?))
    }

    pub fn create_dirs(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.objects_dir())?;
        Ok(())
    }
}

/// Scopes made only of `[A-Za-z0-9._-]` map to themselves; anything else is
/// hex-encoded behind an `x-` prefix so it can never escape the objects dir.
pub fn scope_dir_name(scope: &str) -> Result<String, StoreError> {
    if scope.is_empty() {
        return Err(StoreError::InvalidScope(scope.to_string()));
    }
    let plain = scope
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && !scope.starts_with('.')
        && !scope.starts_with("x-");
    if plain {
        Ok(scope.to_string())
    } else {
        Ok(format!("x-{}", hex::encode(scope.as_bytes())))
    }
}
