mod metadata;
mod object;
mod payload;
mod status;

pub use metadata::UploadMetadata;
pub use object::StoredObject;
pub use payload::Payload;
pub use status::ItemStatus;
