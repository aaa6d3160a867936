/// Quarter ("quartier") model
///
/// Quarters were added in schema version 2 and complete the
/// canton → village → quarter chain.

use crate::store::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Territorial unit belonging to one village
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quarter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(rename = "nom")]
    pub name: String,

    /// Parent village
    pub village_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Quarter {
    pub fn new(name: impl Into<String>, village_id: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            village_id,
            description: None,
            date_creation: None,
            date_modification: None,
            extra: Map::new(),
        }
    }
}

impl Record for Quarter {
    const COLLECTION: Collection = Collection::Quarters;

    fn id(&self) -> Option<i64> {
        self.id
    }
}
