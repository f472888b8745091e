pub mod error;
pub mod hash;
pub mod id;
pub mod media;
pub mod types;

pub use error::CoreError;
pub use hash::fingerprint;
pub use id::{Fingerprint, ItemId};
pub use media::MediaKind;
pub use types::{ItemStatus, Payload, StoredObject, UploadMetadata};
