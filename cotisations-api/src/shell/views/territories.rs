/// Canton, village and quarter management
///
/// Three panels side by side: cantons, villages of the selected canton,
/// quarters of the selected village. A canton or village that still has
/// children cannot be deleted.

use super::{field_value, name_conflict, read_form, required_id, to_state, Territory};
use crate::shell::forms::{validate_form, CantonForm, FieldError, QuarterForm, VillageForm};
use crate::shell::markup::{self, escape, field_error};
use crate::shell::view::{ActionParams, ConfirmationRequest, DomEvent, View, ViewBase, ViewContext, ViewError};
use async_trait::async_trait;
use cotisations_shared::models::canton::Canton;
use cotisations_shared::models::member::Member;
use cotisations_shared::models::quarter::Quarter;
use cotisations_shared::models::village::Village;
use cotisations_shared::store::{Collection, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use tracing::info;

const PANELS: &str = "#gestion-territoires";
const FORM: &str = "#form-territoire";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Canton,
    Village,
    Quartier,
}

impl Level {
    fn title(&self, editing: bool) -> &'static str {
        match (self, editing) {
            (Level::Canton, false) => "Nouveau canton",
            (Level::Canton, true) => "Modifier le canton",
            (Level::Village, false) => "Nouveau village",
            (Level::Village, true) => "Modifier le village",
            (Level::Quartier, false) => "Nouveau quartier",
            (Level::Quartier, true) => "Modifier le quartier",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct TerritoriesState {
    canton_id: Option<i64>,
    village_id: Option<i64>,
    formulaire: Option<Level>,
    edition_id: Option<i64>,
    saisie: Option<Value>,
    erreurs: Vec<FieldError>,
    alerte: Option<String>,
    message: Option<String>,
}

/// Selecting the selected row again clears the selection
pub(crate) fn toggle_selection(current: Option<i64>, id: i64) -> Option<i64> {
    if current == Some(id) {
        None
    } else {
        Some(id)
    }
}

/// Reason a parent cannot be deleted, if it still has children
pub(crate) fn deletion_blocker(kind: &str, name: &str, children: usize, child_label: &str) -> Option<String> {
    (children > 0).then(|| {
        format!(
            "Impossible de supprimer le {} « {} » : il contient encore {} {}{}.",
            kind,
            name,
            children,
            child_label,
            if children > 1 { "s" } else { "" }
        )
    })
}

/// Territory management screen
#[derive(Debug)]
pub struct TerritoriesView {
    base: ViewBase,
}

impl TerritoriesView {
    pub fn new() -> Self {
        Self {
            base: ViewBase::new(json!({})),
        }
    }

    fn state(&self) -> Result<TerritoriesState, ViewError> {
        self.base.state_as()
    }

    async fn save(&mut self, ctx: &ViewContext, state: &TerritoriesState) -> Result<(), ViewError> {
        self.update_state(ctx, to_state(state)?).await.map(|_| ())
    }

    fn render_form(&self, state: &TerritoriesState, level: Level, territory: &Territory) -> String {
        let input = state.saisie.as_ref();
        let errors = &state.erreurs;
        let value = |key: &str| field_value(input, key);

        let mut html = format!(
            r#"<form id="form-territoire" class="formulaire"><h2>{}</h2>"#,
            level.title(state.edition_id.is_some())
        );

        match level {
            Level::Canton => {}
            Level::Village => {
                let _ = write!(
                    html,
                    r#"<label>Canton *</label>{}{}"#,
                    markup::select("territoire-canton", "canton_id", "Sélectionner un canton", territory.canton_options(), Some(value("canton_id").as_str())),
                    field_error(errors, "canton_id"),
                );
            }
            Level::Quartier => {
                let _ = write!(
                    html,
                    r#"<label>Village *</label>{}{}"#,
                    markup::select("territoire-village", "village_id", "Sélectionner un village", territory.village_options(state.canton_id), Some(value("village_id").as_str())),
                    field_error(errors, "village_id"),
                );
            }
        }

        let _ = write!(
            html,
            r#"<label for="territoire-nom">Nom *</label><input id="territoire-nom" name="nom" value="{}">{}"#,
            escape(&value("nom")),
            field_error(errors, "nom"),
        );

        match level {
            Level::Canton => {
                let _ = write!(
                    html,
                    r#"<label for="territoire-chef-lieu">Chef-lieu</label><input id="territoire-chef-lieu" name="chef_lieu" value="{}"><label for="territoire-code">Code</label><input id="territoire-code" name="code" value="{}">"#,
                    escape(&value("chef_lieu")),
                    escape(&value("code")),
                );
            }
            Level::Village => {
                let _ = write!(
                    html,
                    r#"<label for="territoire-population">Population</label><input id="territoire-population" name="population" type="number" min="0" value="{}">{}"#,
                    escape(&value("population")),
                    field_error(errors, "population"),
                );
            }
            Level::Quartier => {}
        }

        let _ = write!(
            html,
            r#"<label for="territoire-description">Description</label><textarea id="territoire-description" name="description">{}</textarea><div class="actions-formulaire"><button type="button" id="btn-annuler-territoire" class="bouton">Annuler</button><button type="submit" class="bouton bouton-primaire">Enregistrer</button></div></form>"#,
            escape(&value("description")),
        );
        html
    }

    async fn submit(&mut self, ctx: &ViewContext, event: &DomEvent) -> Result<(), ViewError> {
        let mut state = self.state()?;
        let level = state
            .formulaire
            .ok_or_else(|| ViewError::Rejected("Aucun formulaire ouvert".to_string()))?;
        self.base.set("saisie", Value::Object(event.form.clone()))?;

        let store = &ctx.store;
        match (level, state.edition_id) {
            (Level::Canton, edition_id) => {
                let form: CantonForm = read_form(event)?;
                validate_form(&form)?;
                let conflict = |e: StoreError| name_conflict(e, "Un canton portant ce nom existe déjà");
                match edition_id {
                    Some(id) => {
                        let existing: Option<Canton> = store.get_by_id(id).await?;
                        let existing = existing.ok_or_else(|| ViewError::Rejected("Canton introuvable".to_string()))?;
                        store.update(&form.apply(Some(existing))).await.map_err(conflict)?;
                        info!(canton_id = id, "Canton updated");
                    }
                    None => {
                        let id = store.add(&form.apply(None)).await.map_err(conflict)?;
                        info!(canton_id = id, "Canton created");
                        state.canton_id = Some(id);
                    }
                }
            }
            (Level::Village, edition_id) => {
                let form: VillageForm = read_form(event)?;
                validate_form(&form)?;
                let canton_id = form.canton_id.unwrap_or_default();
                if store.get_by_id::<Canton>(canton_id).await?.is_none() {
                    return Err(ViewError::Validation(vec![FieldError::new("canton_id", "Canton introuvable")]));
                }
                match edition_id {
                    Some(id) => {
                        let existing: Option<Village> = store.get_by_id(id).await?;
                        let existing = existing.ok_or_else(|| ViewError::Rejected("Village introuvable".to_string()))?;
                        store.update(&form.apply(Some(existing))).await?;
                        info!(village_id = id, "Village updated");
                    }
                    None => {
                        let id = store.add(&form.apply(None)).await?;
                        info!(village_id = id, canton_id, "Village created");
                    }
                }
                state.canton_id = Some(canton_id);
            }
            (Level::Quartier, edition_id) => {
                let form: QuarterForm = read_form(event)?;
                validate_form(&form)?;
                let village_id = form.village_id.unwrap_or_default();
                if store.get_by_id::<Village>(village_id).await?.is_none() {
                    return Err(ViewError::Validation(vec![FieldError::new("village_id", "Village introuvable")]));
                }
                match edition_id {
                    Some(id) => {
                        let existing: Option<Quarter> = store.get_by_id(id).await?;
                        let existing = existing.ok_or_else(|| ViewError::Rejected("Quartier introuvable".to_string()))?;
                        store.update(&form.apply(Some(existing))).await?;
                        info!(quarter_id = id, "Quarter updated");
                    }
                    None => {
                        let id = store.add(&form.apply(None)).await?;
                        info!(quarter_id = id, village_id, "Quarter created");
                    }
                }
                state.village_id = Some(village_id);
            }
        }

        state.message = Some("Enregistrement effectué".to_string());
        state.formulaire = None;
        state.edition_id = None;
        state.saisie = None;
        state.erreurs.clear();
        state.alerte = None;
        self.save(ctx, &state).await
    }

    async fn delete(&mut self, ctx: &ViewContext, level: Level, id: i64) -> Result<(), ViewError> {
        let store = &ctx.store;

        let (title, message) = match level {
            Level::Canton => {
                let canton: Option<Canton> = store.get_by_id(id).await?;
                let canton = canton.ok_or_else(|| ViewError::Rejected("Canton introuvable".to_string()))?;
                let villages: Vec<Village> = store.get_all().await?;
                let children = villages.iter().filter(|v| v.canton_id == id).count();
                if let Some(reason) = deletion_blocker("canton", &canton.name, children, "village") {
                    return Err(ViewError::Rejected(reason));
                }
                ("Supprimer ce canton", format!("Êtes-vous sûr de vouloir supprimer le canton {} ?", canton.name))
            }
            Level::Village => {
                let village: Option<Village> = store.get_by_id(id).await?;
                let village = village.ok_or_else(|| ViewError::Rejected("Village introuvable".to_string()))?;
                let quarters: Vec<Quarter> = store.get_all().await?;
                let children = quarters.iter().filter(|q| q.village_id == id).count();
                if let Some(reason) = deletion_blocker("village", &village.name, children, "quartier") {
                    return Err(ViewError::Rejected(reason));
                }
                ("Supprimer ce village", format!("Êtes-vous sûr de vouloir supprimer le village {} ?", village.name))
            }
            Level::Quartier => {
                let quarter: Option<Quarter> = store.get_by_id(id).await?;
                let quarter = quarter.ok_or_else(|| ViewError::Rejected("Quartier introuvable".to_string()))?;
                ("Supprimer ce quartier", format!("Êtes-vous sûr de vouloir supprimer le quartier {} ?", quarter.name))
            }
        };

        if !self.base.request_confirmation(ctx, ConfirmationRequest::new(title, message)).await {
            return Ok(());
        }

        let collection = match level {
            Level::Canton => Collection::Cantons,
            Level::Village => Collection::Villages,
            Level::Quartier => Collection::Quarters,
        };
        store.delete(collection, id).await?;
        info!(collection = %collection, id, "Territory deleted");

        let mut state = self.state()?;
        match level {
            Level::Canton if state.canton_id == Some(id) => {
                state.canton_id = None;
                state.village_id = None;
            }
            Level::Village if state.village_id == Some(id) => state.village_id = None,
            _ => {}
        }
        state.message = Some("Suppression effectuée".to_string());
        self.save(ctx, &state).await
    }

    async fn open_editor(&self, ctx: &ViewContext, level: Level, id: i64) -> Result<Value, ViewError> {
        let store = &ctx.store;
        let input = match level {
            Level::Canton => {
                let canton: Option<Canton> = store.get_by_id(id).await?;
                let c = canton.ok_or_else(|| ViewError::Rejected("Canton introuvable".to_string()))?;
                json!({"nom": c.name, "description": c.description, "chef_lieu": c.chief_town, "code": c.code})
            }
            Level::Village => {
                let village: Option<Village> = store.get_by_id(id).await?;
                let v = village.ok_or_else(|| ViewError::Rejected("Village introuvable".to_string()))?;
                json!({"canton_id": v.canton_id, "nom": v.name, "population": v.population, "description": v.description})
            }
            Level::Quartier => {
                let quarter: Option<Quarter> = store.get_by_id(id).await?;
                let q = quarter.ok_or_else(|| ViewError::Rejected("Quartier introuvable".to_string()))?;
                json!({"village_id": q.village_id, "nom": q.name, "description": q.description})
            }
        };
        Ok(input)
    }
}

impl Default for TerritoriesView {
    fn default() -> Self {
        Self::new()
    }
}

fn level_of(action: &str) -> Option<Level> {
    if action.ends_with("-canton") {
        Some(Level::Canton)
    } else if action.ends_with("-village") {
        Some(Level::Village)
    } else if action.ends_with("-quartier") {
        Some(Level::Quartier)
    } else {
        None
    }
}

#[async_trait]
impl View for TerritoriesView {
    fn name(&self) -> &'static str {
        "cantons"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewBase {
        &mut self.base
    }

    fn watches(&self) -> &'static [Collection] {
        &[Collection::Cantons, Collection::Villages, Collection::Quarters, Collection::Members]
    }

    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        let state = self.state()?;
        let territory = Territory::load(&ctx.store).await?;
        let members: Vec<Member> = ctx.store.get_all().await?;

        let mut html = markup::heading("Cantons et Villages");
        if let Some(alert) = &state.alerte {
            html.push_str(&markup::alert("erreur", alert));
        }
        if let Some(message) = &state.message {
            html.push_str(&markup::alert("succes", message));
        }
        if let Some(level) = state.formulaire {
            html.push_str(&self.render_form(&state, level, &territory));
        }

        html.push_str(r#"<div id="gestion-territoires" class="panneaux">"#);

        html.push_str(r#"<section class="panneau"><h2>Cantons</h2><button data-action="nouveau-canton" class="bouton">Ajouter</button><ul id="liste-cantons">"#);
        if territory.cantons.is_empty() {
            html.push_str(&markup::empty("Aucun canton enregistré."));
        }
        for canton in &territory.cantons {
            let id = canton.id.unwrap_or_default();
            let villages = territory.villages_of(Some(id)).count();
            let _ = write!(
                html,
                r#"<li data-action="selectionner-canton" data-id="{id}"{}><span>{}</span><small>{} village(s)</small><button data-action="editer-canton" data-id="{id}">Modifier</button><button data-action="supprimer-canton" data-id="{id}">Supprimer</button></li>"#,
                if state.canton_id == Some(id) { r#" class="selectionne""# } else { "" },
                escape(&canton.name),
                villages,
                id = id,
            );
        }
        html.push_str("</ul></section>");

        html.push_str(r#"<section class="panneau"><h2>Villages</h2>"#);
        match state.canton_id {
            None => html.push_str(&markup::empty("Sélectionnez un canton pour voir ses villages.")),
            Some(canton_id) => {
                html.push_str(r#"<button data-action="nouveau-village" class="bouton">Ajouter</button><ul id="liste-villages">"#);
                for village in territory.villages_of(Some(canton_id)) {
                    let id = village.id.unwrap_or_default();
                    let count = members.iter().filter(|m| m.village_id == Some(id)).count();
                    let _ = write!(
                        html,
                        r#"<li data-action="selectionner-village" data-id="{id}"{}><span>{}</span><small>{} cotisant(s)</small><button data-action="editer-village" data-id="{id}">Modifier</button><button data-action="supprimer-village" data-id="{id}">Supprimer</button></li>"#,
                        if state.village_id == Some(id) { r#" class="selectionne""# } else { "" },
                        escape(&village.name),
                        count,
                        id = id,
                    );
                }
                html.push_str("</ul>");
            }
        }
        html.push_str("</section>");

        html.push_str(r#"<section class="panneau"><h2>Quartiers</h2>"#);
        match state.village_id {
            None => html.push_str(&markup::empty("Sélectionnez un village pour voir ses quartiers.")),
            Some(village_id) => {
                html.push_str(r#"<button data-action="nouveau-quartier" class="bouton">Ajouter</button><ul id="liste-quartiers">"#);
                for quarter in territory.quarters_of(Some(village_id)) {
                    let id = quarter.id.unwrap_or_default();
                    let _ = write!(
                        html,
                        r#"<li data-id="{id}"><span>{}</span><button data-action="editer-quartier" data-id="{id}">Modifier</button><button data-action="supprimer-quartier" data-id="{id}">Supprimer</button></li>"#,
                        escape(&quarter.name),
                        id = id,
                    );
                }
                html.push_str("</ul>");
            }
        }
        html.push_str("</section></div>");
        html.push_str(&markup::confirmation_modal());
        Ok(html)
    }

    async fn mount(&mut self, _ctx: &ViewContext) -> Result<(), ViewError> {
        if markup::contains_element(self.base.markup(), FORM) {
            self.base.add_listener(FORM, "submit", "enregistrer");
            self.base.add_listener("#btn-annuler-territoire", "click", "fermer");
        }
        self.base.configure_delegated_actions(PANELS, None);
        Ok(())
    }

    async fn handle_action(
        &mut self,
        ctx: &ViewContext,
        action: &str,
        params: &ActionParams,
        event: &DomEvent,
    ) -> Result<(), ViewError> {
        let mut state = self.state()?;
        state.message = None;

        match action {
            "enregistrer" => return self.submit(ctx, event).await,
            "fermer" => {
                state.formulaire = None;
                state.edition_id = None;
                state.saisie = None;
                state.erreurs.clear();
            }
            "selectionner-canton" => {
                let id = required_id(params, action)?;
                state.canton_id = toggle_selection(state.canton_id, id);
                state.village_id = None;
            }
            "selectionner-village" => {
                let id = required_id(params, action)?;
                state.village_id = toggle_selection(state.village_id, id);
            }
            _ => {
                let level = level_of(action).ok_or_else(|| ViewError::UnknownAction(action.to_string()))?;
                let verb = action.split('-').next().unwrap_or_default();
                match verb {
                    "nouveau" => {
                        let input = match level {
                            Level::Canton => json!({}),
                            Level::Village => match state.canton_id {
                                Some(id) => json!({ "canton_id": id }),
                                None => return Err(ViewError::Rejected("Veuillez sélectionner un canton".to_string())),
                            },
                            Level::Quartier => match state.village_id {
                                Some(id) => json!({ "village_id": id }),
                                None => return Err(ViewError::Rejected("Veuillez sélectionner un village".to_string())),
                            },
                        };
                        state.formulaire = Some(level);
                        state.edition_id = None;
                        state.saisie = Some(input);
                        state.erreurs.clear();
                        state.alerte = None;
                    }
                    "editer" => {
                        let id = required_id(params, action)?;
                        state.saisie = Some(self.open_editor(ctx, level, id).await?);
                        state.formulaire = Some(level);
                        state.edition_id = Some(id);
                        state.erreurs.clear();
                        state.alerte = None;
                    }
                    "supprimer" => {
                        let id = required_id(params, action)?;
                        return self.delete(ctx, level, id).await;
                    }
                    _ => return Err(ViewError::UnknownAction(action.to_string())),
                }
            }
        }

        self.save(ctx, &state).await
    }
}
