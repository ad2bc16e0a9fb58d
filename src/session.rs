//! Session payload handed to and received from the persistence layer.
//!
//! The payload is the committed note log plus the tempo. Measures and layout
//! are never stored; they are recomputed from the log.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::duration::Tempo;
use crate::error::ScribeError;
use crate::note::NotatedNote;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub tempo: Tempo,
    pub notes: Vec<NotatedNote>,
}

impl SessionPayload {
    pub fn to_json(&self) -> Result<String, ScribeError> {
        serde_json::to_string_pretty(self).map_err(|e| ScribeError::SessionError(e.to_string()))
    }

    /// Decode a payload. A non-positive tempo is rejected.
    pub fn from_json(content: &str) -> Result<Self, ScribeError> {
        serde_json::from_str(content).map_err(|e| ScribeError::SessionError(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ScribeError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| {
            ScribeError::SessionError(format!("cannot write {}: {}", path.display(), e))
        })
    }

    pub fn load(path: &Path) -> Result<Self, ScribeError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScribeError::SessionError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}
