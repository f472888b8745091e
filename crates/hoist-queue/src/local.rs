use std::sync::Arc;

use async_trait::async_trait;
use hoist_core::{Fingerprint, MediaKind, StoredObject};
use hoist_store::{LocalStore, StoreError};

use crate::error::{InventoryError, TransportError};
use crate::transport::{Inventory, Transport, UploadRequest};

#[derive(Clone)]
pub struct LocalBackend {
    store: Arc<LocalStore>,
}

impl LocalBackend {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }
}

#[async_trait]
impl Transport for LocalBackend {
    async fn upload(&self, request: UploadRequest) -> Result<StoredObject, TransportError> {
        let store = Arc::clone(&self.store);
        let UploadRequest {
            payload,
            metadata,
            fingerprint,
            media,
            progress,
            cancel,
            ..
        } = request;
        let media_type = (media != MediaKind::Other).then(|| media.mime_type());

        let written = tokio::task::spawn_blocking(move || {
            store.write_object(
                &metadata.scope,
                &fingerprint,
                payload.bytes(),
                media_type,
                |done, total| {
                    progress.report_bytes(done, total);
                    !cancel.is_cancelled()
                },
            )
        })
        .await
        .map_err(|e| TransportError::Transient(format!("write task failed: {e}")))?;

        match written {
            Ok(object) => Ok(object),
            Err(StoreError::Aborted { .. }) => Err(TransportError::Cancelled),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Inventory for LocalBackend {
    async fn find_by_hash(
        &self,
        scope: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredObject>, InventoryError> {
        let store = Arc::clone(&self.store);
        let scope = scope.to_string();
        let fingerprint = *fingerprint;
        tokio::task::spawn_blocking(move || store.find(&scope, &fingerprint))
            .await
            .map_err(|e| InventoryError::Unavailable(format!("lookup task failed: {e}")))?
            .map_err(InventoryError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ProgressHandle;
    use hoist_core::{fingerprint, ItemId, Payload, UploadMetadata};
    use tokio_util::sync::CancellationToken;

    fn request(data: &[u8], scope: &str, cancel: CancellationToken) -> UploadRequest {
        UploadRequest {
            id: ItemId::new(),
            payload: Payload::new("photo.png", data.to_vec()),
            metadata: UploadMetadata::new(scope),
            fingerprint: fingerprint(data),
            media: MediaKind::sniff(data),
            progress: ProgressHandle::detached(),
            cancel,
        }
    }

    #[tokio::test]
    async fn upload_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(LocalStore::init(dir.path()).unwrap());
        let data = b"\x89PNG\r\n\x1a\nrest of image";

        let stored = backend
            .upload(request(data, "album", CancellationToken::new()))
            .await
            .unwrap();
        assert_eq!(stored.media_type.as_deref(), Some("image/png"));
        assert_eq!(stored.size, data.len() as u64);

        let found = backend
            .find_by_hash("album", &fingerprint(data))
            .await
            .unwrap();
        assert_eq!(found, Some(stored));
        let elsewhere = backend
            .find_by_hash("other", &fingerprint(data))
            .await
            .unwrap();
        assert!(elsewhere.is_none());
    }

    #[tokio::test]
    async fn cancelled_upload_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(LocalStore::init(dir.path()).unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let data = b"never stored";

        let err = backend
            .upload(request(data, "album", cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
        assert!(!backend.store().has_object("album", &fingerprint(data)));
    }

    #[tokio::test]
    async fn bad_scope_is_a_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(LocalStore::init(dir.path()).unwrap());
        let err = backend
            .upload(request(b"x", "", CancellationToken::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }
}
