use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Namespace for duplicate lookup and storage (an album, a tenant, ...).
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_hint: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UploadMetadata {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            path_hint: None,
            tags: Vec::new(),
        }
    }

    pub fn with_path_hint(mut self, hint: impl Into<String>) -> Self {
        self.path_hint = Some(hint.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.scope.trim().is_empty() {
            return Err(CoreError::InvalidMetadata("scope is required".into()));
        }
        if let Some(hint) = &self.path_hint {
            if hint.starts_with('/') || hint.split('/').any(|part| part == "..") {
                return Err(CoreError::InvalidMetadata(format!(
                    "path hint must be relative: {hint}"
                )));
            }
        }
        Ok(())
    }
}
