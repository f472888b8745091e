use std::fmt;
use std::path::Path;

use bytes::Bytes;

use crate::CoreError;

/// Handle to the source bytes of one upload. Cloning shares the underlying
/// buffer; the bytes are never copied by the queue.
#[derive(Clone)]
pub struct Payload {
    name: String,
    bytes: Bytes,
}

impl Payload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_buffer() {
        let p = Payload::new("a.jpg", vec![1u8, 2, 3]);
        let q = p.clone();
        assert_eq!(p.bytes().as_ptr(), q.bytes().as_ptr());
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn from_path_uses_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("holiday.png");
        std::fs::write(&path, b"png").unwrap();
        let p = Payload::from_path(&path).unwrap();
        assert_eq!(p.name(), "holiday.png");
        assert_eq!(&p.bytes()[..], b"png");
    }
}
