/// Form inputs, validation and double-submit protection
///
/// Form fields arrive as a JSON object whose values are usually strings (as
/// read from HTML inputs). Each input struct deserializes leniently, trims
/// text, and declares its rules with `validator`. Failed rules become
/// [`FieldError`]s shown next to the offending field; nothing is written
/// until the whole form is valid.
///
/// # Example
///
/// ```
/// use cotisations_api::shell::forms::{validate_form, CantonForm};
/// use serde_json::json;
///
/// let form: CantonForm = serde_json::from_value(json!({"nom": " Z "})).unwrap();
/// assert!(validate_form(&form).is_err());
/// ```

use super::view::ViewError;
use chrono::NaiveDate;
use cotisations_shared::models::canton::Canton;
use cotisations_shared::models::member::{Member, MemberStatus, Sex, OCCUPATIONS};
use cotisations_shared::models::payment::{Payment, PaymentMode, PaymentStatus};
use cotisations_shared::models::quarter::Quarter;
use cotisations_shared::models::village::Village;
use cotisations_shared::models::{NAME_MAX_LENGTH, NAME_MIN_LENGTH};
use cotisations_shared::store::{Store, StoreResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;
use validator::{Validate, ValidationError, ValidationErrors};

/// Date format of date inputs
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation message attached to one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Flattens `validator` errors, sorted by field name
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut flattened: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Valeur invalide".to_string()),
            })
        })
        .collect();
    flattened.sort_by(|a, b| a.field.cmp(&b.field));
    flattened
}

/// Runs the form's rules
pub fn validate_form<T: Validate>(form: &T) -> Result<(), ViewError> {
    form.validate()
        .map_err(|e| ViewError::Validation(field_errors(&e)))
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn validate_name(value: &str) -> Result<(), ValidationError> {
    let length = value.chars().count();
    if length == 0 {
        Err(invalid("required", "Ce champ est obligatoire"))
    } else if length < NAME_MIN_LENGTH {
        Err(invalid("length", "Doit contenir au moins 2 caractères"))
    } else if length > NAME_MAX_LENGTH {
        Err(invalid("length", "Doit contenir au plus 50 caractères"))
    } else {
        Ok(())
    }
}

fn validate_sex(value: &str) -> Result<(), ValidationError> {
    match value {
        "" => Err(invalid("required", "Le sexe est obligatoire")),
        v if Sex::parse(v).is_some() => Ok(()),
        _ => Err(invalid("choice", "Sexe invalide")),
    }
}

fn validate_occupation(value: &str) -> Result<(), ValidationError> {
    match value {
        "" => Err(invalid("required", "La fonction est obligatoire")),
        v if OCCUPATIONS.contains(&v) => Ok(()),
        _ => Err(invalid("choice", "Fonction invalide")),
    }
}

fn validate_member_status(value: &str) -> Result<(), ValidationError> {
    MemberStatus::parse(value)
        .map(|_| ())
        .ok_or_else(|| invalid("choice", "Statut invalide"))
}

fn validate_date(value: &str) -> Result<(), ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| invalid("date", "Date invalide (AAAA-MM-JJ)"))
}

fn validate_required_date(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(invalid("required", "La date est obligatoire"));
    }
    validate_date(value)
}

fn validate_payment_mode(value: &str) -> Result<(), ValidationError> {
    match value {
        "" => Err(invalid("required", "Le mode de paiement est obligatoire")),
        v if PaymentMode::parse(v).is_some() => Ok(()),
        _ => Err(invalid("choice", "Mode de paiement invalide")),
    }
}

fn validate_payment_status(value: &str) -> Result<(), ValidationError> {
    match value {
        "" => Err(invalid("required", "Le statut est obligatoire")),
        v if PaymentStatus::parse(v).is_some() => Ok(()),
        _ => Err(invalid("choice", "Statut invalide")),
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = text(deserializer)?;
    Ok(if value.is_empty() { None } else { Some(value) })
}

fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn optional_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let amount = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    };
    Ok(amount.filter(|a: &f64| a.is_finite()))
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v, DATE_FORMAT).ok())
}

/// Canton form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CantonForm {
    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_name"))]
    pub nom: String,

    #[serde(default, deserialize_with = "optional_text")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    pub chef_lieu: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    pub code: Option<String>,
}

impl CantonForm {
    /// Applies the form onto an existing canton, or a new one
    pub fn apply(self, existing: Option<Canton>) -> Canton {
        let mut canton = existing.unwrap_or_else(|| Canton::new(""));
        canton.name = self.nom;
        canton.description = self.description;
        canton.chief_town = self.chef_lieu;
        canton.code = self.code;
        canton
    }
}

/// Village form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct VillageForm {
    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Le canton est obligatoire"))]
    pub canton_id: Option<i64>,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_name"))]
    pub nom: String,

    #[serde(default, deserialize_with = "optional_id")]
    #[validate(range(min = 0, message = "La population ne peut pas être négative"))]
    pub population: Option<i64>,

    #[serde(default, deserialize_with = "optional_text")]
    pub description: Option<String>,
}

impl VillageForm {
    pub fn apply(self, existing: Option<Village>) -> Village {
        let canton_id = self.canton_id.unwrap_or_default();
        let mut village = existing.unwrap_or_else(|| Village::new("", canton_id));
        village.name = self.nom;
        village.canton_id = canton_id;
        village.population = self.population.and_then(|p| u64::try_from(p).ok());
        village.description = self.description;
        village
    }
}

/// Quarter form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct QuarterForm {
    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Le village est obligatoire"))]
    pub village_id: Option<i64>,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_name"))]
    pub nom: String,

    #[serde(default, deserialize_with = "optional_text")]
    pub description: Option<String>,
}

impl QuarterForm {
    pub fn apply(self, existing: Option<Quarter>) -> Quarter {
        let village_id = self.village_id.unwrap_or_default();
        let mut quarter = existing.unwrap_or_else(|| Quarter::new("", village_id));
        quarter.name = self.nom;
        quarter.village_id = village_id;
        quarter.description = self.description;
        quarter
    }
}

/// Member form
///
/// The three territorial keys are required; [`check_member_location`] then
/// verifies that they form a chain.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MemberForm {
    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Le canton est obligatoire"))]
    pub canton_id: Option<i64>,

    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Le village est obligatoire"))]
    pub village_id: Option<i64>,

    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Le quartier est obligatoire"))]
    pub quartier_id: Option<i64>,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_name"))]
    pub nom: String,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_name"))]
    pub prenom: String,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_sex"))]
    pub sexe: String,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_occupation"))]
    pub fonction: String,

    #[serde(default, deserialize_with = "optional_text")]
    pub autre_fonction: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    pub telephone: Option<String>,

    #[serde(default, deserialize_with = "optional_amount")]
    #[validate(
        required(message = "Le montant est obligatoire"),
        range(min = 0.0, max = 10_000_000.0, message = "Le montant doit être compris entre 0 et 10 000 000")
    )]
    pub montant_cotisation: Option<f64>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(custom(function = "validate_date"))]
    pub date_cotisation: Option<String>,

    /// Kept from the edited member when absent
    #[serde(default, deserialize_with = "optional_text")]
    #[validate(custom(function = "validate_member_status"))]
    pub statut: Option<String>,
}

impl MemberForm {
    /// Applies the form onto an existing member, or a new active one
    ///
    /// Fields the form does not carry (and unknown document fields) are kept.
    pub fn apply(self, existing: Option<Member>) -> Member {
        let mut member = existing.unwrap_or_else(|| Member::new("", ""));
        member.canton_id = self.canton_id;
        member.village_id = self.village_id;
        member.quarter_id = self.quartier_id;
        member.last_name = self.nom;
        member.first_name = self.prenom;
        member.sex = Sex::parse(&self.sexe);
        member.occupation = self.fonction;
        member.other_occupation = self.autre_fonction;
        member.phone = self.telephone;
        member.contribution_amount = self.montant_cotisation.unwrap_or_default();
        member.contribution_date = parse_date(self.date_cotisation.as_deref());
        if let Some(status) = self.statut.as_deref().and_then(MemberStatus::parse) {
            member.status = status;
        }
        member
    }
}

/// Payment form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PaymentForm {
    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Le cotisant est obligatoire"))]
    pub cotisant_id: Option<i64>,

    #[serde(default, deserialize_with = "optional_amount")]
    #[validate(
        required(message = "Le montant est obligatoire"),
        range(min = 0.0, max = 10_000_000.0, message = "Le montant doit être compris entre 0 et 10 000 000")
    )]
    pub montant: Option<f64>,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_required_date"))]
    pub date_paiement: String,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_payment_mode"))]
    pub mode_paiement: String,

    #[serde(default, deserialize_with = "text")]
    #[validate(custom(function = "validate_payment_status"))]
    pub statut: String,

    #[serde(default, deserialize_with = "optional_text")]
    pub reference: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    pub commentaire: Option<String>,
}

impl PaymentForm {
    /// Builds the payment; call [`validate_form`] first
    pub fn apply(self, existing: Option<Payment>) -> Result<Payment, ViewError> {
        let paid_on = parse_date(Some(&self.date_paiement))
            .ok_or_else(|| ViewError::Validation(vec![FieldError::new("date_paiement", "Date invalide (AAAA-MM-JJ)")]))?;
        let mode = PaymentMode::parse(&self.mode_paiement)
            .ok_or_else(|| ViewError::Validation(vec![FieldError::new("mode_paiement", "Mode de paiement invalide")]))?;
        let status = PaymentStatus::parse(&self.statut)
            .ok_or_else(|| ViewError::Validation(vec![FieldError::new("statut", "Statut invalide")]))?;
        let member_id = self.cotisant_id.unwrap_or_default();
        let amount = self.montant.unwrap_or_default();

        let mut payment = existing.unwrap_or_else(|| Payment::new(member_id, amount, paid_on, mode, status));
        payment.member_id = member_id;
        payment.amount = amount;
        payment.paid_on = paid_on;
        payment.mode = mode;
        payment.status = status;
        payment.reference = self.reference;
        payment.comment = self.commentaire;
        Ok(payment)
    }
}

/// Checks that the quarter lies in the village and the village in the canton
pub async fn check_member_location(store: &Store, form: &MemberForm) -> StoreResult<Vec<FieldError>> {
    let (Some(canton_id), Some(village_id), Some(quarter_id)) = (form.canton_id, form.village_id, form.quartier_id) else {
        return Ok(Vec::new());
    };

    let mut errors = Vec::new();

    match store.get_by_id::<Village>(village_id).await? {
        None => errors.push(FieldError::new("village_id", "Village introuvable")),
        Some(village) if village.canton_id != canton_id => errors.push(FieldError::new(
            "village_id",
            "Le village n'appartient pas au canton sélectionné",
        )),
        Some(_) => {}
    }

    match store.get_by_id::<Quarter>(quarter_id).await? {
        None => errors.push(FieldError::new("quartier_id", "Quartier introuvable")),
        Some(quarter) if quarter.village_id != village_id => errors.push(FieldError::new(
            "quartier_id",
            "Le quartier n'appartient pas au village sélectionné",
        )),
        Some(_) => {}
    }

    Ok(errors)
}

/// In-flight flag of one form
///
/// A second submission while the first is running is dropped, not queued.
#[derive(Debug, Default)]
pub struct SubmitGuard {
    in_flight: AtomicBool,
}

impl SubmitGuard {
    /// Marks the form as submitting; `None` if it already is
    pub fn try_begin(self: &Arc<Self>) -> Option<SubmitTicket> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitTicket {
                guard: Arc::clone(self),
            })
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Held while a submission runs; releases the guard on drop
#[derive(Debug)]
pub struct SubmitTicket {
    guard: Arc<SubmitGuard>,
}

impl Drop for SubmitTicket {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

/// Submit guards keyed by form selector
#[derive(Debug, Default)]
pub struct SubmitGuards {
    guards: Mutex<HashMap<String, Arc<SubmitGuard>>>,
}

impl SubmitGuards {
    pub fn try_begin(&self, form: &str) -> Option<SubmitTicket> {
        let guard = {
            let mut guards = self.guards.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(guards.entry(form.to_string()).or_default())
        };

        let ticket = guard.try_begin();
        if ticket.is_none() {
            debug!(form = %form, "Submission already in flight");
        }
        ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors_of<T: Validate>(form: &T) -> Vec<FieldError> {
        match validate_form(form) {
            Err(ViewError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_canton_name_rules() {
        let empty: CantonForm = serde_json::from_value(json!({"nom": "  "})).unwrap();
        assert_eq!(errors_of(&empty), vec![FieldError::new("nom", "Ce champ est obligatoire")]);

        let short: CantonForm = serde_json::from_value(json!({"nom": "Z"})).unwrap();
        assert_eq!(errors_of(&short)[0].message, "Doit contenir au moins 2 caractères");

        let long: CantonForm = serde_json::from_value(json!({"nom": "x".repeat(51)})).unwrap();
        assert_eq!(errors_of(&long)[0].message, "Doit contenir au plus 50 caractères");

        let ok: CantonForm = serde_json::from_value(json!({"nom": " Zio ", "description": ""})).unwrap();
        assert!(validate_form(&ok).is_ok());
        let canton = ok.apply(None);
        assert_eq!(canton.name, "Zio");
        assert_eq!(canton.description, None);
    }

    #[test]
    fn test_member_form_requires_fields() {
        let form: MemberForm = serde_json::from_value(json!({})).unwrap();
        let fields: Vec<String> = errors_of(&form).into_iter().map(|e| e.field).collect();

        assert_eq!(
            fields,
            vec![
                "canton_id",
                "fonction",
                "montant_cotisation",
                "nom",
                "prenom",
                "quartier_id",
                "sexe",
                "village_id"
            ]
        );
    }

    #[test]
    fn test_member_form_accepts_string_inputs() {
        let form: MemberForm = serde_json::from_value(json!({
            "canton_id": "1",
            "village_id": "2",
            "quartier_id": 3,
            "nom": "Mensah",
            "prenom": "Afi",
            "sexe": "F",
            "fonction": "enseignant",
            "telephone": "",
            "montant_cotisation": "5000",
            "date_cotisation": "2025-01-15"
        }))
        .unwrap();
        assert!(validate_form(&form).is_ok());

        let member = form.apply(None);
        assert_eq!(member.quarter_id, Some(3));
        assert_eq!(member.sex, Some(Sex::Female));
        assert_eq!(member.phone, None);
        assert_eq!(member.contribution_amount, 5000.0);
        assert_eq!(member.contribution_date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(member.status, MemberStatus::Active);
    }

    #[test]
    fn test_amount_range() {
        let base = json!({
            "cotisant_id": 1,
            "date_paiement": "2025-02-01",
            "mode_paiement": "especes",
            "statut": "confirme"
        });

        for (amount, valid) in [("0", true), ("10000000", true), ("10000001", false), ("-1", false)] {
            let mut input = base.clone();
            input["montant"] = json!(amount);
            let form: PaymentForm = serde_json::from_value(input).unwrap();
            assert_eq!(validate_form(&form).is_ok(), valid, "amount {}", amount);
        }
    }

    #[test]
    fn test_payment_form_rejects_unknown_choices() {
        let form: PaymentForm = serde_json::from_value(json!({
            "cotisant_id": 1,
            "montant": 100,
            "date_paiement": "01/02/2025",
            "mode_paiement": "crypto",
            "statut": "confirme"
        }))
        .unwrap();

        let fields: Vec<String> = errors_of(&form).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["date_paiement", "mode_paiement"]);
    }

    #[test]
    fn test_submit_guard_drops_second_submission() {
        let guards = SubmitGuards::default();

        let first = guards.try_begin("#form-cotisant");
        assert!(first.is_some());
        assert!(guards.try_begin("#form-cotisant").is_none());

        // Other forms are independent
        assert!(guards.try_begin("#form-paiement").is_some());

        drop(first);
        assert!(guards.try_begin("#form-cotisant").is_some());
    }
}
