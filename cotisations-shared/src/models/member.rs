/// Member ("cotisant") model
///
/// A member stores all three territorial keys (canton, village, quarter)
/// even though the quarter implies the other two. The store does not check
/// that they agree; the member form does.

use crate::store::{Collection, Record};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Member status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    #[default]
    #[serde(rename = "actif")]
    Active,

    #[serde(rename = "inactif")]
    Inactive,

    #[serde(rename = "suspendu")]
    Suspended,

    #[serde(rename = "archive")]
    Archived,
}

impl MemberStatus {
    pub const ALL: [MemberStatus; 4] = [
        MemberStatus::Active,
        MemberStatus::Inactive,
        MemberStatus::Suspended,
        MemberStatus::Archived,
    ];

    /// Converts status to its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "actif",
            MemberStatus::Inactive => "inactif",
            MemberStatus::Suspended => "suspendu",
            MemberStatus::Archived => "archive",
        }
    }

    /// Parses status from its stored string
    pub fn parse(s: &str) -> Option<Self> {
        MemberStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            MemberStatus::Active => "Actif",
            MemberStatus::Inactive => "Inactif",
            MemberStatus::Suspended => "Suspendu",
            MemberStatus::Archived => "Archivé",
        }
    }
}

/// Member sex as recorded on the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,

    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Homme",
            Sex::Female => "Femme",
        }
    }
}

/// Occupations offered by the member form; `autre` pairs with a free-text
/// `autre_fonction`
pub const OCCUPATIONS: [&str; 6] = [
    "cultivateur",
    "enseignant",
    "employe",
    "directeur",
    "commercant",
    "autre",
];

/// Person tracked for contribution purposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Family name
    #[serde(rename = "nom")]
    pub last_name: String,

    /// Given name
    #[serde(rename = "prenom")]
    pub first_name: String,

    #[serde(rename = "sexe", default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,

    #[serde(rename = "fonction", default)]
    pub occupation: String,

    /// Free-text occupation when `occupation` is "autre"
    #[serde(rename = "autre_fonction", default, skip_serializing_if = "Option::is_none")]
    pub other_occupation: Option<String>,

    #[serde(rename = "telephone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Declared contribution amount in CFA francs
    #[serde(rename = "montant_cotisation", default)]
    pub contribution_amount: f64,

    #[serde(rename = "date_cotisation", default, skip_serializing_if = "Option::is_none")]
    pub contribution_date: Option<NaiveDate>,

    #[serde(rename = "statut", default)]
    pub status: MemberStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canton_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village_id: Option<i64>,

    #[serde(rename = "quartier_id", default, skip_serializing_if = "Option::is_none")]
    pub quarter_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    /// Creates an active, unsaved member with no location
    pub fn new(last_name: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self {
            id: None,
            last_name: last_name.into(),
            first_name: first_name.into(),
            sex: None,
            occupation: String::new(),
            other_occupation: None,
            phone: None,
            contribution_amount: 0.0,
            contribution_date: None,
            status: MemberStatus::Active,
            canton_id: None,
            village_id: None,
            quarter_id: None,
            date_creation: None,
            date_modification: None,
            extra: Map::new(),
        }
    }

    /// "Nom Prénom"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name).trim().to_string()
    }

    /// Occupation to display, falling back to the free-text one
    pub fn occupation_label(&self) -> &str {
        match (&self.occupation[..], &self.other_occupation) {
            ("" | "autre", Some(other)) if !other.is_empty() => other.as_str(),
            ("", _) => "-",
            (occupation, _) => occupation,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

impl Record for Member {
    const COLLECTION: Collection = Collection::Members;

    fn id(&self) -> Option<i64> {
        self.id
    }
}
