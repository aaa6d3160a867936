/// Payment model
///
/// A payment belongs to exactly one member through `cotisant_id`. Only
/// confirmed payments count as money received.

use crate::store::{Collection, Record};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentMode {
    #[serde(rename = "especes")]
    Cash,

    #[serde(rename = "mobile_money")]
    MobileMoney,

    #[serde(rename = "virement")]
    Transfer,

    #[serde(rename = "cheque")]
    Cheque,

    #[serde(rename = "autre")]
    Other,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 5] = [
        PaymentMode::Cash,
        PaymentMode::MobileMoney,
        PaymentMode::Transfer,
        PaymentMode::Cheque,
        PaymentMode::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "especes",
            PaymentMode::MobileMoney => "mobile_money",
            PaymentMode::Transfer => "virement",
            PaymentMode::Cheque => "cheque",
            PaymentMode::Other => "autre",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        PaymentMode::ALL.into_iter().find(|mode| mode.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "Espèces",
            PaymentMode::MobileMoney => "Mobile Money",
            PaymentMode::Transfer => "Virement Bancaire",
            PaymentMode::Cheque => "Chèque",
            PaymentMode::Other => "Autre",
        }
    }
}

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "confirme")]
    Confirmed,

    #[serde(rename = "en_attente")]
    Pending,

    #[serde(rename = "annule")]
    Cancelled,

    #[serde(rename = "rembourse")]
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Confirmed,
        PaymentStatus::Pending,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Confirmed => "confirme",
            PaymentStatus::Pending => "en_attente",
            PaymentStatus::Cancelled => "annule",
            PaymentStatus::Refunded => "rembourse",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        PaymentStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Confirmed => "Confirmé",
            PaymentStatus::Pending => "En Attente",
            PaymentStatus::Cancelled => "Annulé",
            PaymentStatus::Refunded => "Remboursé",
        }
    }
}

/// Monetary transaction attributed to a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Paying member
    #[serde(rename = "cotisant_id")]
    pub member_id: i64,

    /// Amount in CFA francs
    #[serde(rename = "montant")]
    pub amount: f64,

    #[serde(rename = "date_paiement")]
    pub paid_on: NaiveDate,

    #[serde(rename = "mode_paiement")]
    pub mode: PaymentMode,

    #[serde(rename = "statut")]
    pub status: PaymentStatus,

    /// Receipt or transaction number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Internal note
    #[serde(rename = "commentaire", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Payment {
    /// Creates an unsaved payment
    pub fn new(member_id: i64, amount: f64, paid_on: NaiveDate, mode: PaymentMode, status: PaymentStatus) -> Self {
        Self {
            id: None,
            member_id,
            amount,
            paid_on,
            mode,
            status,
            reference: None,
            comment: None,
            date_creation: None,
            date_modification: None,
            extra: Map::new(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }
}

impl Record for Payment {
    const COLLECTION: Collection = Collection::Payments;

    fn id(&self) -> Option<i64> {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_wire_names() {
        let payment = Payment::new(
            4,
            2500.0,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            PaymentMode::MobileMoney,
            PaymentStatus::Pending,
        );

        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["cotisant_id"], 4);
        assert_eq!(json["date_paiement"], "2024-02-29");
        assert_eq!(json["mode_paiement"], "mobile_money");
        assert_eq!(json["statut"], "en_attente");
        assert!(json.get("reference").is_none());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(PaymentMode::parse("cheque"), Some(PaymentMode::Cheque));
        assert_eq!(PaymentStatus::parse("rembourse"), Some(PaymentStatus::Refunded));
        assert_eq!(PaymentStatus::parse("paye"), None);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let raw = json!({
            "cotisant_id": 1,
            "montant": 100,
            "date_paiement": "2024-01-01",
            "mode_paiement": "troc",
            "statut": "confirme"
        });
        assert!(serde_json::from_value::<Payment>(raw).is_err());
    }
}
