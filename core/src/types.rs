//! Resource handles and DTOs returned by `EngineClient` parse methods.
//!
//! Keys arrive snake_cased from the casing stage, so these types use the
//! default serde field names.

use serde::{Deserialize, Serialize};

/// A created container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl Container {
    /// Handle for an existing container id.
    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            warnings: None,
        }
    }
}

/// A built image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub id: String,
}

/// One entry of the engine's event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub status: String,
    pub id: String,
    #[serde(default)]
    pub from: Option<String>,
    pub time: i64,
}
