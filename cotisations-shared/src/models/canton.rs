/// Canton model
///
/// Cantons are the root of the territorial hierarchy. Names are unique,
/// enforced by a unique index on `nom`.

use crate::store::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level territorial unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Unique name
    #[serde(rename = "nom")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Administrative seat (e.g., "Lomé" for Golfe)
    #[serde(rename = "chef_lieu", default, skip_serializing_if = "Option::is_none")]
    pub chief_town: Option<String>,

    /// Short code (e.g., "GLF")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,

    /// Fields this model does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Canton {
    /// Creates an unsaved canton
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            chief_town: None,
            code: None,
            date_creation: None,
            date_modification: None,
            extra: Map::new(),
        }
    }
}

impl Record for Canton {
    const COLLECTION: Collection = Collection::Cantons;

    fn id(&self) -> Option<i64> {
        self.id
    }
}
