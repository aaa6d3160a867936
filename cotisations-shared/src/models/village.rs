/// Village model

use crate::store::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Territorial unit belonging to one canton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Village {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(rename = "nom")]
    pub name: String,

    /// Parent canton
    pub canton_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Village {
    pub fn new(name: impl Into<String>, canton_id: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            canton_id,
            population: None,
            description: None,
            date_creation: None,
            date_modification: None,
            extra: Map::new(),
        }
    }
}

impl Record for Village {
    const COLLECTION: Collection = Collection::Villages;

    fn id(&self) -> Option<i64> {
        self.id
    }
}
