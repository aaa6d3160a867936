/// Collections held by the document store
///
/// Each collection maps to one SQLite table holding JSON documents. Numeric
/// collections use an auto-incrementing `id`; the settings collection is
/// keyed by the string `cle`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named collection of records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    /// Members ("cotisants")
    #[serde(rename = "cotisants")]
    Members,

    /// Payments attributed to a member
    #[serde(rename = "paiements")]
    Payments,

    /// Top-level territorial units
    #[serde(rename = "cantons")]
    Cantons,

    /// Second-level territorial units
    #[serde(rename = "villages")]
    Villages,

    /// Third-level territorial units
    #[serde(rename = "quartiers")]
    Quarters,

    /// Contribution presets (amount + periodicity)
    #[serde(rename = "types_cotisation")]
    ContributionTypes,

    /// String-keyed settings
    #[serde(rename = "parametres")]
    Settings,
}

impl Collection {
    /// Every collection, in export order
    pub const ALL: [Collection; 7] = [
        Collection::Members,
        Collection::Payments,
        Collection::Cantons,
        Collection::Villages,
        Collection::Quarters,
        Collection::ContributionTypes,
        Collection::Settings,
    ];

    /// Collection name, also used as the table name
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Members => "cotisants",
            Collection::Payments => "paiements",
            Collection::Cantons => "cantons",
            Collection::Villages => "villages",
            Collection::Quarters => "quartiers",
            Collection::ContributionTypes => "types_cotisation",
            Collection::Settings => "parametres",
        }
    }

    /// Parses a collection from its name
    pub fn parse(s: &str) -> Option<Self> {
        Collection::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Name of the primary key field inside documents
    pub fn key_field(&self) -> &'static str {
        match self {
            Collection::Settings => "cle",
            _ => "id",
        }
    }

    /// Whether records are keyed by an auto-incrementing integer
    pub fn has_numeric_key(&self) -> bool {
        !matches!(self, Collection::Settings)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed record stored in a numerically keyed collection
///
/// Implementors serialize to the JSON document stored in the collection. The
/// `id` field must be named `id` and be absent (or null) before insertion.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection holding this record type
    const COLLECTION: Collection;

    /// Store-assigned key, if the record has been persisted
    fn id(&self) -> Option<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_round_trips_through_name() {
        for collection in Collection::ALL {
            assert_eq!(Collection::parse(collection.as_str()), Some(collection));
        }
        assert_eq!(Collection::parse("users"), None);
    }

    #[test]
    fn test_settings_are_string_keyed() {
        assert_eq!(Collection::Settings.key_field(), "cle");
        assert!(!Collection::Settings.has_numeric_key());
        assert_eq!(Collection::Cantons.key_field(), "id");
        assert!(Collection::Members.has_numeric_key());
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&Collection::Quarters).unwrap();
        assert_eq!(json, "\"quartiers\"");
    }
}
