/// Member list with filters, sorting and the create/edit form
///
/// The list can be narrowed by canton, village, quarter and a free-text
/// search over name, given name and phone. Opening the route with
/// `#cotisants?village_id=3` pre-selects the matching filters.

use super::{field_value, read_form, required_id, selected_id, to_state, Territory};
use crate::shell::forms::{check_member_location, validate_form, MemberForm, DATE_FORMAT};
use crate::shell::markup::{self, escape, field_error, format_amount};
use crate::shell::view::{ActionParams, ConfirmationRequest, DomEvent, View, ViewBase, ViewContext, ViewError};
use async_trait::async_trait;
use cotisations_shared::models::member::{Member, MemberStatus, OCCUPATIONS};
use cotisations_shared::ranking::SortOrder;
use cotisations_shared::store::Collection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use tracing::info;

const LIST: &str = "#liste-cotisants";

/// Column the list is sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SortColumn {
    #[default]
    Nom,
    Montant,
    Date,
}

impl SortColumn {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "nom" => Some(SortColumn::Nom),
            "montant" => Some(SortColumn::Montant),
            "date" => Some(SortColumn::Date),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Nom => "nom",
            SortColumn::Montant => "montant",
            SortColumn::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MemberFilters {
    pub canton_id: Option<i64>,
    pub village_id: Option<i64>,
    pub quartier_id: Option<i64>,
    pub recherche: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Sort {
    pub colonne: SortColumn,
    pub direction: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            colonne: SortColumn::Nom,
            direction: SortOrder::Asc,
        }
    }
}

impl Sort {
    /// Clicking the current column flips the direction; another column
    /// starts ascending
    pub fn toggle(self, column: SortColumn) -> Self {
        if column == self.colonne {
            Self {
                colonne: column,
                direction: match self.direction {
                    SortOrder::Asc => SortOrder::Desc,
                    SortOrder::Desc => SortOrder::Asc,
                },
            }
        } else {
            Self {
                colonne: column,
                direction: SortOrder::Asc,
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct MembersState {
    filtres: MemberFilters,
    tri: Sort,
    selection_id: Option<i64>,
    formulaire_ouvert: bool,
    edition_id: Option<i64>,
    saisie: Option<Value>,
    erreurs: Vec<crate::shell::forms::FieldError>,
    alerte: Option<String>,
    message: Option<String>,
}

/// Members matching every filter, in store order
pub(crate) fn filter_members<'a>(members: &'a [Member], filters: &MemberFilters) -> Vec<&'a Member> {
    let needle = filters.recherche.trim().to_lowercase();

    members
        .iter()
        .filter(|m| filters.canton_id.map_or(true, |id| m.canton_id == Some(id)))
        .filter(|m| filters.village_id.map_or(true, |id| m.village_id == Some(id)))
        .filter(|m| filters.quartier_id.map_or(true, |id| m.quarter_id == Some(id)))
        .filter(|m| {
            needle.is_empty()
                || format!(
                    "{} {} {}",
                    m.last_name,
                    m.first_name,
                    m.phone.as_deref().unwrap_or_default()
                )
                .to_lowercase()
                .contains(&needle)
        })
        .collect()
}

/// Stable sort of the visible members
pub(crate) fn sort_members(members: &mut [&Member], sort: Sort) {
    members.sort_by(|a, b| {
        let ordering = match sort.colonne {
            SortColumn::Nom => format!("{} {}", a.last_name, a.first_name)
                .to_lowercase()
                .cmp(&format!("{} {}", b.last_name, b.first_name).to_lowercase()),
            SortColumn::Montant => a.contribution_amount.total_cmp(&b.contribution_amount),
            SortColumn::Date => a.contribution_date.cmp(&b.contribution_date),
        };
        match sort.direction {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// "3 cotisants trouvés"
pub(crate) fn count_label(count: usize) -> String {
    match count {
        1 => "1 cotisant trouvé".to_string(),
        n => format!("{} cotisants trouvés", n),
    }
}

fn member_input(member: &Member) -> Value {
    json!({
        "canton_id": member.canton_id,
        "village_id": member.village_id,
        "quartier_id": member.quarter_id,
        "nom": member.last_name,
        "prenom": member.first_name,
        "sexe": member.sex.map(|s| s.as_str()),
        "fonction": member.occupation,
        "autre_fonction": member.other_occupation,
        "telephone": member.phone,
        "montant_cotisation": format!("{}", member.contribution_amount),
        "date_cotisation": member.contribution_date.map(|d| d.format(DATE_FORMAT).to_string()),
        "statut": member.status.as_str(),
    })
}

/// Member management screen
#[derive(Debug)]
pub struct MembersView {
    base: ViewBase,
    query_applied: bool,
}

impl MembersView {
    pub fn new() -> Self {
        Self {
            base: ViewBase::new(to_state(&MembersState::default()).unwrap_or_default()),
            query_applied: false,
        }
    }

    fn state(&self) -> Result<MembersState, ViewError> {
        self.base.state_as()
    }

    async fn save(&mut self, ctx: &ViewContext, state: &MembersState) -> Result<(), ViewError> {
        self.update_state(ctx, to_state(state)?).await.map(|_| ())
    }

    fn render_form(&self, state: &MembersState, territory: &Territory) -> String {
        let input = state.saisie.as_ref();
        let errors = &state.erreurs;
        let value = |key: &str| field_value(input, key);
        let canton_id = selected_id(Some(value("canton_id").as_str()));
        let village_id = selected_id(Some(value("village_id").as_str()));

        let mut html = String::new();
        let _ = write!(
            html,
            r#"<form id="form-cotisant" class="formulaire"><h2>{}</h2>"#,
            if state.edition_id.is_some() { "Modifier le cotisant" } else { "Nouveau cotisant" }
        );

        let _ = write!(
            html,
            r#"<div class="groupe-champs"><label>Canton *</label>{}{}<label>Village *</label>{}{}<label>Quartier *</label>{}{}</div>"#,
            markup::select("cotisant-canton", "canton_id", "Sélectionner un canton", territory.canton_options(), Some(value("canton_id").as_str())),
            field_error(errors, "canton_id"),
            markup::select("cotisant-village", "village_id", "Sélectionner un village", territory.village_options(canton_id), Some(value("village_id").as_str())),
            field_error(errors, "village_id"),
            markup::select("cotisant-quartier", "quartier_id", "Sélectionner un quartier", territory.quarter_options(village_id), Some(value("quartier_id").as_str())),
            field_error(errors, "quartier_id"),
        );

        for (field, label) in [("nom", "Nom *"), ("prenom", "Prénom *"), ("telephone", "Téléphone")] {
            let _ = write!(
                html,
                r#"<label for="cotisant-{f}">{}</label><input id="cotisant-{f}" name="{f}" value="{}">{}"#,
                escape(label),
                escape(&value(field)),
                field_error(errors, field),
                f = field,
            );
        }

        let sexes = [("M".to_string(), "Homme"), ("F".to_string(), "Femme")];
        let _ = write!(
            html,
            r#"<label>Sexe *</label>{}{}"#,
            markup::select("cotisant-sexe", "sexe", "Sélectionner", sexes, Some(value("sexe").as_str())),
            field_error(errors, "sexe"),
        );

        let occupations = OCCUPATIONS.iter().map(|o| (o.to_string(), *o));
        let _ = write!(
            html,
            r#"<label>Fonction *</label>{}{}<label for="cotisant-autre-fonction">Autre fonction</label><input id="cotisant-autre-fonction" name="autre_fonction" value="{}">"#,
            markup::select("cotisant-fonction", "fonction", "Sélectionner une fonction", occupations, Some(value("fonction").as_str())),
            field_error(errors, "fonction"),
            escape(&value("autre_fonction")),
        );

        let _ = write!(
            html,
            r#"<label for="cotisant-montant">Montant de cotisation (CFA) *</label><input id="cotisant-montant" name="montant_cotisation" type="number" min="0" max="10000000" value="{}">{}<label for="cotisant-date">Date de cotisation</label><input id="cotisant-date" name="date_cotisation" type="date" value="{}">{}"#,
            escape(&value("montant_cotisation")),
            field_error(errors, "montant_cotisation"),
            escape(&value("date_cotisation")),
            field_error(errors, "date_cotisation"),
        );

        if state.edition_id.is_some() {
            let statuses = MemberStatus::ALL.iter().map(|s| (s.as_str().to_string(), s.label()));
            let _ = write!(
                html,
                r#"<label>Statut</label>{}{}"#,
                markup::select("cotisant-statut", "statut", "Statut", statuses, Some(value("statut").as_str())),
                field_error(errors, "statut"),
            );
        }

        html.push_str(r#"<div class="actions-formulaire"><button type="button" id="btn-annuler-cotisant" class="bouton">Annuler</button><button type="submit" class="bouton bouton-primaire">Enregistrer</button></div></form>"#);
        html
    }

    fn render_list(&self, state: &MembersState, members: &[Member], territory: &Territory) -> String {
        let mut visible = filter_members(members, &state.filtres);
        sort_members(&mut visible, state.tri);

        let mut html = format!(
            r#"<div id="liste-cotisants"><p class="compteur">{}</p>"#,
            count_label(visible.len())
        );

        if visible.is_empty() {
            let message = if members.is_empty() {
                "Aucun cotisant enregistré pour le moment."
            } else {
                "Aucun cotisant ne correspond aux filtres sélectionnés."
            };
            html.push_str(&markup::empty(message));
            html.push_str("</div>");
            return html;
        }

        html.push_str(r#"<table class="tableau"><thead><tr>"#);
        for (column, label) in [(SortColumn::Nom, "Nom & Prénom"), (SortColumn::Montant, "Montant"), (SortColumn::Date, "Date")] {
            let indicator = match (state.tri.colonne == column, state.tri.direction) {
                (true, SortOrder::Asc) => " ▲",
                (true, SortOrder::Desc) => " ▼",
                (false, _) => "",
            };
            let _ = write!(html, r#"<th data-tri-colonne="{}">{}{}</th>"#, column.as_str(), label, indicator);
        }
        html.push_str("<th>Localisation</th><th>Fonction</th><th>Statut</th><th>Actions</th></tr></thead><tbody>");

        let mut total = 0.0;
        for member in &visible {
            let id = member.id.unwrap_or_default();
            total += member.contribution_amount;
            let _ = write!(
                html,
                r#"<tr data-id="{id}"{}><td>{}</td><td>{} CFA</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><button data-action="editer-cotisant" data-id="{id}">Modifier</button><button data-action="supprimer-cotisant" data-id="{id}">Supprimer</button></td></tr>"#,
                if state.selection_id == Some(id) { r#" class="selectionne""# } else { "" },
                escape(&member.full_name()),
                format_amount(member.contribution_amount),
                member.contribution_date.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_else(|| "-".to_string()),
                escape(&territory.location_label(member.canton_id, member.village_id, member.quarter_id)),
                escape(member.occupation_label()),
                member.status.label(),
                id = id,
            );
        }

        let _ = write!(
            html,
            r#"</tbody><tfoot><tr><td>Total</td><td>{} CFA</td><td colspan="5"></td></tr></tfoot></table></div>"#,
            format_amount(total)
        );
        html
    }

    async fn submit(&mut self, ctx: &ViewContext, event: &DomEvent) -> Result<(), ViewError> {
        let mut state = self.state()?;
        self.base.set("saisie", Value::Object(event.form.clone()))?;

        let form: MemberForm = read_form(event)?;
        validate_form(&form)?;
        let location_errors = check_member_location(&ctx.store, &form).await?;
        if !location_errors.is_empty() {
            return Err(ViewError::Validation(location_errors));
        }

        match state.edition_id {
            Some(id) => {
                let existing: Option<Member> = ctx.store.get_by_id(id).await?;
                let existing = existing.ok_or_else(|| ViewError::Rejected("Cotisant introuvable".to_string()))?;
                ctx.store.update(&form.apply(Some(existing))).await?;
                info!(member_id = id, "Member updated");
                state.message = Some("Cotisant modifié avec succès".to_string());
            }
            None => {
                let id = ctx.store.add(&form.apply(None)).await?;
                info!(member_id = id, "Member created");
                state.message = Some("Cotisant ajouté avec succès".to_string());
            }
        }

        state.formulaire_ouvert = false;
        state.edition_id = None;
        state.saisie = None;
        state.erreurs.clear();
        state.alerte = None;
        self.save(ctx, &state).await
    }

    async fn delete(&mut self, ctx: &ViewContext, id: i64) -> Result<(), ViewError> {
        let member: Option<Member> = ctx.store.get_by_id(id).await?;
        let member = member.ok_or_else(|| ViewError::Rejected("Cotisant introuvable".to_string()))?;

        let request = ConfirmationRequest::new(
            "Supprimer ce cotisant",
            format!("Êtes-vous sûr de vouloir supprimer {} ? Cette action est irréversible.", member.full_name()),
        )
        .confirm_label("Supprimer le cotisant");

        if !self.base.request_confirmation(ctx, request).await {
            return Ok(());
        }

        ctx.store.delete(Collection::Members, id).await?;
        info!(member_id = id, "Member deleted");

        let mut state = self.state()?;
        if state.selection_id == Some(id) {
            state.selection_id = None;
        }
        state.message = Some("Cotisant supprimé".to_string());
        self.save(ctx, &state).await
    }
}

impl Default for MembersView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl View for MembersView {
    fn name(&self) -> &'static str {
        "cotisants"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewBase {
        &mut self.base
    }

    fn watches(&self) -> &'static [Collection] {
        &[Collection::Members, Collection::Cantons, Collection::Villages, Collection::Quarters]
    }

    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        if !self.query_applied {
            self.query_applied = true;
            let filters = MemberFilters {
                canton_id: ctx.query_id("canton_id"),
                village_id: ctx.query_id("village_id"),
                quartier_id: ctx.query_id("quartier_id"),
                recherche: ctx.query.get("recherche").cloned().unwrap_or_default(),
            };
            if filters != MemberFilters::default() {
                self.base.set("filtres", &filters)?;
            }
        }

        let state = self.state()?;
        let territory = Territory::load(&ctx.store).await?;
        let members: Vec<Member> = ctx.store.get_all().await?;

        let mut html = markup::heading("Gestion des Cotisants");
        if let Some(alert) = &state.alerte {
            html.push_str(&markup::alert("erreur", alert));
        }
        if let Some(message) = &state.message {
            html.push_str(&markup::alert("succes", message));
        }
        html.push_str(r#"<button id="btn-nouveau-cotisant" class="bouton bouton-primaire">Nouveau cotisant</button>"#);

        let filters = &state.filtres;
        let _ = write!(
            html,
            r#"<div class="filtres">{}{}{}<input id="filtre-recherche" type="search" placeholder="Rechercher un cotisant" value="{}"><button id="btn-reinitialiser-filtres-cotisants" class="bouton">Réinitialiser</button></div>"#,
            markup::select("filtre-canton", "filtre_canton", "Tous les cantons", territory.canton_options(), filters.canton_id.map(|id| id.to_string()).as_deref()),
            markup::select("filtre-village", "filtre_village", "Tous les villages", territory.village_options(filters.canton_id), filters.village_id.map(|id| id.to_string()).as_deref()),
            markup::select("filtre-quartier", "filtre_quartier", "Tous les quartiers", territory.quarter_options(filters.village_id), filters.quartier_id.map(|id| id.to_string()).as_deref()),
            escape(&filters.recherche),
        );

        if state.formulaire_ouvert {
            html.push_str(&self.render_form(&state, &territory));
        }
        html.push_str(&self.render_list(&state, &members, &territory));
        html.push_str(&markup::confirmation_modal());
        Ok(html)
    }

    async fn mount(&mut self, _ctx: &ViewContext) -> Result<(), ViewError> {
        let base = &mut self.base;
        base.add_listener("#btn-nouveau-cotisant", "click", "nouveau");
        base.add_listener("#filtre-canton", "change", "filtrer-canton");
        base.add_listener("#filtre-village", "change", "filtrer-village");
        base.add_listener("#filtre-quartier", "change", "filtrer-quartier");
        base.add_listener("#filtre-recherche", "input", "rechercher");
        base.add_listener("#btn-reinitialiser-filtres-cotisants", "click", "reinitialiser-filtres");

        if markup::contains_element(base.markup(), "#form-cotisant") {
            base.add_listener("#form-cotisant", "submit", "enregistrer");
            base.add_listener("#btn-annuler-cotisant", "click", "fermer");
            base.add_listener("#cotisant-canton", "change", "choisir-canton");
            base.add_listener("#cotisant-village", "change", "choisir-village");
        }

        base.delegate_event(LIST, "th[data-tri-colonne]", "click", "trier");
        base.delegate_event(LIST, "tbody tr", "click", "selectionner");
        base.configure_delegated_actions(LIST, None);
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
        let value = event.value.as_deref();

        match action {
            "nouveau" => {
                state.formulaire_ouvert = true;
                state.edition_id = None;
                state.saisie = None;
                state.erreurs.clear();
                state.alerte = None;
            }
            "fermer" => {
                state.formulaire_ouvert = false;
                state.edition_id = None;
                state.saisie = None;
                state.erreurs.clear();
            }
            "editer-cotisant" => {
                let id = required_id(params, action)?;
                let member: Option<Member> = ctx.store.get_by_id(id).await?;
                let member = member.ok_or_else(|| ViewError::Rejected("Cotisant introuvable".to_string()))?;
                state.formulaire_ouvert = true;
                state.edition_id = Some(id);
                state.saisie = Some(member_input(&member));
                state.erreurs.clear();
                state.alerte = None;
            }
            "enregistrer" => return self.submit(ctx, event).await,
            "supprimer-cotisant" => {
                let id = required_id(params, action)?;
                return self.delete(ctx, id).await;
            }
            "selectionner" => {
                let id = required_id(params, action)?;
                state.selection_id = if state.selection_id == Some(id) { None } else { Some(id) };
            }
            "trier" => {
                let column = params
                    .str("triColonne")
                    .and_then(SortColumn::parse)
                    .ok_or_else(|| ViewError::Rejected("Colonne de tri inconnue".to_string()))?;
                state.tri = state.tri.toggle(column);
            }
            "filtrer-canton" => {
                state.filtres.canton_id = selected_id(value);
                state.filtres.village_id = None;
                state.filtres.quartier_id = None;
            }
            "filtrer-village" => {
                state.filtres.village_id = selected_id(value);
                state.filtres.quartier_id = None;
            }
            "filtrer-quartier" => state.filtres.quartier_id = selected_id(value),
            "rechercher" => state.filtres.recherche = value.unwrap_or_default().to_string(),
            "reinitialiser-filtres" => state.filtres = MemberFilters::default(),
            "choisir-canton" | "choisir-village" => {
                let mut input = state.saisie.take().unwrap_or_else(|| json!({}));
                if let Value::Object(fields) = &mut input {
                    let key = if action == "choisir-canton" { "canton_id" } else { "village_id" };
                    fields.insert(key.to_string(), json!(value.unwrap_or_default()));
                    if action == "choisir-canton" {
                        fields.insert("village_id".to_string(), Value::Null);
                    }
                    fields.insert("quartier_id".to_string(), Value::Null);
                }
                state.saisie = Some(input);
            }
            other => return Err(ViewError::UnknownAction(other.to_string())),
        }

        self.save(ctx, &state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn member(id: i64, last: &str, first: &str, amount: f64, village: i64) -> Member {
        Member {
            id: Some(id),
            contribution_amount: amount,
            canton_id: Some(1),
            village_id: Some(village),
            quarter_id: Some(village * 10),
            ..Member::new(last, first)
        }
    }

    fn names(members: &[&Member]) -> Vec<String> {
        members.iter().map(|m| m.last_name.clone()).collect()
    }

    #[test]
    fn test_filter_by_village_and_search() {
        let mut kossi = member(1, "Agbodjan", "Kossi", 5000.0, 1);
        kossi.phone = Some("90 11 22 33".to_string());
        let members = vec![kossi, member(2, "Mensah", "Afi", 2000.0, 1), member(3, "Amegah", "Yao", 1000.0, 2)];

        let by_village = MemberFilters {
            village_id: Some(1),
            ..Default::default()
        };
        assert_eq!(names(&filter_members(&members, &by_village)), vec!["Agbodjan", "Mensah"]);

        let by_phone = MemberFilters {
            recherche: "11 22".to_string(),
            ..Default::default()
        };
        assert_eq!(names(&filter_members(&members, &by_phone)), vec!["Agbodjan"]);

        let by_name = MemberFilters {
            recherche: "  YAO ".to_string(),
            ..Default::default()
        };
        assert_eq!(names(&filter_members(&members, &by_name)), vec!["Amegah"]);
    }

    #[test]
    fn test_sort_by_name_then_amount() {
        let members = vec![
            member(1, "mensah", "Afi", 2000.0, 1),
            member(2, "Agbodjan", "Kossi", 5000.0, 1),
            member(3, "Amegah", "Yao", 1000.0, 1),
        ];
        let mut visible: Vec<&Member> = members.iter().collect();

        sort_members(&mut visible, Sort::default());
        assert_eq!(names(&visible), vec!["Agbodjan", "Amegah", "mensah"]);

        sort_members(&mut visible, Sort::default().toggle(SortColumn::Montant).toggle(SortColumn::Montant));
        assert_eq!(names(&visible), vec!["Agbodjan", "mensah", "Amegah"]);
    }

    #[test]
    fn test_sort_by_date_puts_missing_dates_first() {
        let mut dated = member(1, "B", "b", 0.0, 1);
        dated.contribution_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        let undated = member(2, "A", "a", 0.0, 1);
        let members = vec![dated, undated];
        let mut visible: Vec<&Member> = members.iter().collect();

        sort_members(
            &mut visible,
            Sort {
                colonne: SortColumn::Date,
                direction: SortOrder::Asc,
            },
        );
        assert_eq!(names(&visible), vec!["A", "B"]);
    }

    #[test]
    fn test_sort_toggle() {
        let sort = Sort::default();
        assert_eq!(sort.toggle(SortColumn::Nom).direction, SortOrder::Desc);

        let by_amount = sort.toggle(SortColumn::Nom).toggle(SortColumn::Montant);
        assert_eq!(by_amount.colonne, SortColumn::Montant);
        assert_eq!(by_amount.direction, SortOrder::Asc);
    }

    #[test]
    fn test_count_label() {
        assert_eq!(count_label(0), "0 cotisants trouvés");
        assert_eq!(count_label(1), "1 cotisant trouvé");
        assert_eq!(count_label(12), "12 cotisants trouvés");
    }
}
