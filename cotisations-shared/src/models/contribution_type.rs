/// Contribution type presets
///
/// A contribution type names a required amount and how often it is due.
/// Three presets are seeded on first run; names are unique.

use crate::store::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How often a contribution is due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Periodicity {
    #[serde(rename = "mensuelle")]
    Monthly,

    #[serde(rename = "trimestrielle")]
    Quarterly,

    #[serde(rename = "semestrielle")]
    SemiAnnual,

    #[serde(rename = "annuelle")]
    Annual,

    /// One-off contribution
    #[serde(rename = "ponctuelle")]
    OneOff,
}

impl Periodicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::Monthly => "mensuelle",
            Periodicity::Quarterly => "trimestrielle",
            Periodicity::SemiAnnual => "semestrielle",
            Periodicity::Annual => "annuelle",
            Periodicity::OneOff => "ponctuelle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mensuelle" => Some(Periodicity::Monthly),
            "trimestrielle" => Some(Periodicity::Quarterly),
            "semestrielle" => Some(Periodicity::SemiAnnual),
            "annuelle" => Some(Periodicity::Annual),
            "ponctuelle" => Some(Periodicity::OneOff),
            _ => None,
        }
    }
}

/// Named contribution preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(rename = "nom")]
    pub name: String,

    /// Required amount per period, in CFA francs
    #[serde(rename = "montant_requis")]
    pub required_amount: f64,

    #[serde(rename = "periodicite")]
    pub periodicity: Periodicity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContributionType {
    pub fn new(name: impl Into<String>, required_amount: f64, periodicity: Periodicity) -> Self {
        Self {
            id: None,
            name: name.into(),
            required_amount,
            periodicity,
            date_creation: None,
            date_modification: None,
            extra: Map::new(),
        }
    }
}

impl Record for ContributionType {
    const COLLECTION: Collection = Collection::ContributionTypes;

    fn id(&self) -> Option<i64> {
        self.id
    }
}
