/// Concrete views and the application route table
///
/// | Route          | View                  |
/// |----------------|-----------------------|
/// | `tableau-bord` | [`DashboardView`]     |
/// | `cotisants`    | [`MembersView`]       |
/// | `paiements`    | [`PaymentsView`]      |
/// | `statistiques` | [`StatisticsView`]    |
/// | `cantons`      | [`TerritoriesView`]   |
/// | `rapports`     | [`ReportsView`]       |
/// | `parametres`   | [`SettingsView`]      |

mod dashboard;
mod members;
mod payments;
mod reports;
mod settings;
mod statistics;
mod territories;

pub use dashboard::DashboardView;
pub use members::MembersView;
pub use payments::PaymentsView;
pub use reports::ReportsView;
pub use settings::SettingsView;
pub use statistics::StatisticsView;
pub use territories::TerritoriesView;

use super::router::Navigator;
use super::view::{View, ViewError};
use cotisations_shared::models::canton::Canton;
use cotisations_shared::models::quarter::Quarter;
use cotisations_shared::models::village::Village;
use cotisations_shared::store::{Store, StoreError};
use std::collections::HashMap;

/// Registers the seven application routes
pub fn register_all(navigator: &mut Navigator) {
    navigator.define_route("tableau-bord", "Tableau de Bord", "dashboard", || {
        Box::new(DashboardView::new()) as Box<dyn View>
    });
    navigator.define_route("cotisants", "Gestion des Cotisants", "users", || {
        Box::new(MembersView::new()) as Box<dyn View>
    });
    navigator.define_route("paiements", "Gestion des Paiements", "credit-card", || {
        Box::new(PaymentsView::new()) as Box<dyn View>
    });
    navigator.define_route("statistiques", "Statistiques et Rapports", "bar-chart", || {
        Box::new(StatisticsView::new()) as Box<dyn View>
    });
    navigator.define_route("cantons", "Cantons et Villages", "map-pin", || {
        Box::new(TerritoriesView::new()) as Box<dyn View>
    });
    navigator.define_route("rapports", "Génération de Rapports", "file-text", || {
        Box::new(ReportsView::new()) as Box<dyn View>
    });
    navigator.define_route("parametres", "Paramètres", "settings", || {
        Box::new(SettingsView::new()) as Box<dyn View>
    });
}

/// Names of every territorial unit, by id
#[derive(Debug, Default)]
pub(crate) struct Territory {
    pub cantons: Vec<Canton>,
    pub villages: Vec<Village>,
    pub quarters: Vec<Quarter>,
    canton_names: HashMap<i64, String>,
    village_names: HashMap<i64, String>,
    quarter_names: HashMap<i64, String>,
}

impl Territory {
    pub async fn load(store: &Store) -> Result<Self, StoreError> {
        let cantons: Vec<Canton> = store.get_all().await?;
        let villages: Vec<Village> = store.get_all().await?;
        let quarters: Vec<Quarter> = store.get_all().await?;

        Ok(Self {
            canton_names: cantons.iter().filter_map(|c| Some((c.id?, c.name.clone()))).collect(),
            village_names: villages.iter().filter_map(|v| Some((v.id?, v.name.clone()))).collect(),
            quarter_names: quarters.iter().filter_map(|q| Some((q.id?, q.name.clone()))).collect(),
            cantons,
            villages,
            quarters,
        })
    }

    pub fn canton_name(&self, id: Option<i64>) -> Option<&str> {
        id.and_then(|id| self.canton_names.get(&id)).map(String::as_str)
    }

    pub fn village_name(&self, id: Option<i64>) -> Option<&str> {
        id.and_then(|id| self.village_names.get(&id)).map(String::as_str)
    }

    pub fn quarter_name(&self, id: Option<i64>) -> Option<&str> {
        id.and_then(|id| self.quarter_names.get(&id)).map(String::as_str)
    }

    /// "Quartier · Village · Canton", skipping unknown parts
    pub fn location_label(&self, canton_id: Option<i64>, village_id: Option<i64>, quarter_id: Option<i64>) -> String {
        [
            self.quarter_name(quarter_id),
            self.village_name(village_id),
            self.canton_name(canton_id),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" · ")
    }

    pub fn villages_of(&self, canton_id: Option<i64>) -> impl Iterator<Item = &Village> {
        self.villages
            .iter()
            .filter(move |v| canton_id.map_or(true, |id| v.canton_id == id))
    }

    pub fn quarters_of(&self, village_id: Option<i64>) -> impl Iterator<Item = &Quarter> {
        self.quarters
            .iter()
            .filter(move |q| village_id.map_or(true, |id| q.village_id == id))
    }

    pub fn canton_options(&self) -> Vec<(String, &str)> {
        self.cantons
            .iter()
            .filter_map(|c| Some((c.id?.to_string(), c.name.as_str())))
            .collect()
    }

    pub fn village_options(&self, canton_id: Option<i64>) -> Vec<(String, &str)> {
        self.villages_of(canton_id)
            .filter_map(|v| Some((v.id?.to_string(), v.name.as_str())))
            .collect()
    }

    pub fn quarter_options(&self, village_id: Option<i64>) -> Vec<(String, &str)> {
        self.quarters_of(village_id)
            .filter_map(|q| Some((q.id?.to_string(), q.name.as_str())))
            .collect()
    }
}

/// Parses the value of a select input as an optional id
pub(crate) fn selected_id(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Id parameter every row action needs
pub(crate) fn required_id(params: &super::view::ActionParams, action: &str) -> Result<i64, ViewError> {
    params
        .id("id")
        .ok_or_else(|| ViewError::Rejected(format!("Identifiant manquant pour l'action {}", action)))
}

/// Serializes a typed view state for [`View::update_state`]
pub(crate) fn to_state<T: serde::Serialize>(state: &T) -> Result<serde_json::Value, ViewError> {
    serde_json::to_value(state).map_err(|e| ViewError::State(e.to_string()))
}

/// Reads submitted form fields into a form struct
pub(crate) fn read_form<T: serde::de::DeserializeOwned>(event: &super::view::DomEvent) -> Result<T, ViewError> {
    serde_json::from_value(serde_json::Value::Object(event.form.clone())).map_err(|e| ViewError::State(e.to_string()))
}

/// Value of one field of a saved form input, as text for an `<input>`
pub(crate) fn field_value(input: Option<&serde_json::Value>, key: &str) -> String {
    match input.and_then(|i| i.get(key)) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Turns a unique-name violation into an inline error on `nom`
pub(crate) fn name_conflict(err: StoreError, message: &str) -> ViewError {
    match err {
        StoreError::Constraint { .. } => ViewError::Validation(vec![super::forms::FieldError::new("nom", message)]),
        other => ViewError::Store(other),
    }
}
