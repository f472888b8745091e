use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Preparing,
    Queued,
    Uploading,
    Uploaded,
    Error,
    Duplicate,
    Cancelled,
}

impl ItemStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Queued => "queued",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Error => "error",
            Self::Duplicate => "duplicate",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Preparing | Self::Queued | Self::Uploading)
    }

    /// Edges of the item lifecycle. `Uploaded -> Error` only happens through
    /// reconciliation, `Duplicate -> Queued` only through a forced upload.
    pub fn can_transition_to(&self, to: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, to),
            (Preparing, Queued)
                | (Preparing, Duplicate)
                | (Preparing, Cancelled)
                | (Preparing, Error)
                | (Queued, Uploading)
                | (Queued, Cancelled)
                | (Uploading, Uploaded)
                | (Uploading, Error)
                | (Uploading, Cancelled)
                | (Error, Queued)
                | (Error, Cancelled)
                | (Duplicate, Queued)
                | (Uploaded, Error)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ItemStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparing" => Ok(Self::Preparing),
            "queued" => Ok(Self::Queued),
            "uploading" => Ok(Self::Uploading),
            "uploaded" => Ok(Self::Uploaded),
            "error" => Ok(Self::Error),
            "duplicate" => Ok(Self::Duplicate),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}
