use serde::{Deserialize, Serialize};

use crate::id::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub scope: String,
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub stored_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}
