/// Payment list, filters and the payment form
///
/// Payments whose member no longer exists are hidden from the list; they
/// still count in exports.

use super::{field_value, read_form, required_id, selected_id, to_state, Territory};
use crate::shell::forms::{validate_form, FieldError, PaymentForm, DATE_FORMAT};
use crate::shell::markup::{self, escape, field_error, format_amount};
use crate::shell::view::{ActionParams, ConfirmationRequest, DomEvent, View, ViewBase, ViewContext, ViewError};
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use cotisations_shared::models::member::Member;
use cotisations_shared::models::payment::{Payment, PaymentMode, PaymentStatus};
use cotisations_shared::ranking::SortOrder;
use cotisations_shared::store::Collection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::info;

const LIST: &str = "#liste-paiements";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Period {
    #[default]
    Tout,
    MoisCourant,
    AnneeCourante,
}

impl Period {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "tout" => Some(Period::Tout),
            "mois_courant" => Some(Period::MoisCourant),
            "annee_courante" => Some(Period::AnneeCourante),
            _ => None,
        }
    }

    fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Period::Tout => true,
            Period::MoisCourant => date.year() == today.year() && date.month() == today.month(),
            Period::AnneeCourante => date.year() == today.year(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PaymentFilters {
    pub periode: Period,
    pub statut: Option<PaymentStatus>,
    pub mode: Option<PaymentMode>,
    pub canton_id: Option<i64>,
    pub village_id: Option<i64>,
    pub recherche: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SortColumn {
    #[default]
    Date,
    Montant,
    Cotisant,
}

impl SortColumn {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "date" => Some(SortColumn::Date),
            "montant" => Some(SortColumn::Montant),
            "cotisant" => Some(SortColumn::Cotisant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Sort {
    pub colonne: SortColumn,
    pub direction: SortOrder,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PaymentsState {
    filtres: PaymentFilters,
    tri: Sort,
    formulaire_ouvert: bool,
    edition_id: Option<i64>,
    saisie: Option<Value>,
    erreurs: Vec<FieldError>,
    alerte: Option<String>,
    message: Option<String>,
}

/// Figures shown above the list
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct PaymentKpis {
    pub total_confirmed: f64,
    pub confirmed_count: usize,
    pub pending_count: usize,
}

impl PaymentKpis {
    pub fn compute(payments: &[&Payment]) -> Self {
        payments.iter().fold(Self::default(), |mut kpis, payment| {
            match payment.status {
                PaymentStatus::Confirmed => {
                    kpis.total_confirmed += payment.amount;
                    kpis.confirmed_count += 1;
                }
                PaymentStatus::Pending => kpis.pending_count += 1,
                _ => {}
            }
            kpis
        })
    }
}

/// Payments matching every filter; payments of unknown members are dropped
pub(crate) fn filter_payments<'a>(
    payments: &'a [Payment],
    members: &HashMap<i64, &Member>,
    filters: &PaymentFilters,
    today: NaiveDate,
) -> Vec<&'a Payment> {
    let needle = filters.recherche.trim().to_lowercase();

    payments
        .iter()
        .filter(|p| {
            let Some(member) = members.get(&p.member_id) else {
                return false;
            };
            filters.periode.contains(p.paid_on, today)
                && filters.statut.map_or(true, |s| p.status == s)
                && filters.mode.map_or(true, |m| p.mode == m)
                && filters.canton_id.map_or(true, |id| member.canton_id == Some(id))
                && filters.village_id.map_or(true, |id| member.village_id == Some(id))
                && (needle.is_empty() || member.full_name().to_lowercase().contains(&needle))
        })
        .collect()
}

pub(crate) fn sort_payments(payments: &mut [&Payment], members: &HashMap<i64, &Member>, sort: Sort) {
    let name = |p: &Payment| {
        members
            .get(&p.member_id)
            .map(|m| m.full_name().to_lowercase())
            .unwrap_or_default()
    };

    payments.sort_by(|a, b| {
        let ordering = match sort.colonne {
            SortColumn::Date => a.paid_on.cmp(&b.paid_on),
            SortColumn::Montant => a.amount.total_cmp(&b.amount),
            SortColumn::Cotisant => name(a).cmp(&name(b)),
        };
        match sort.direction {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn payment_input(payment: &Payment) -> Value {
    json!({
        "cotisant_id": payment.member_id,
        "montant": format!("{}", payment.amount),
        "date_paiement": payment.paid_on.format(DATE_FORMAT).to_string(),
        "mode_paiement": payment.mode.as_str(),
        "statut": payment.status.as_str(),
        "reference": payment.reference,
        "commentaire": payment.comment,
    })
}

fn new_payment_input(today: NaiveDate) -> Value {
    json!({
        "date_paiement": today.format(DATE_FORMAT).to_string(),
        "statut": PaymentStatus::Confirmed.as_str(),
    })
}

/// Payment management screen
#[derive(Debug)]
pub struct PaymentsView {
    base: ViewBase,
    query_applied: bool,
}

impl PaymentsView {
    pub fn new() -> Self {
        Self {
            base: ViewBase::new(json!({})),
            query_applied: false,
        }
    }

    fn state(&self) -> Result<PaymentsState, ViewError> {
        self.base.state_as()
    }

    async fn save(&mut self, ctx: &ViewContext, state: &PaymentsState) -> Result<(), ViewError> {
        self.update_state(ctx, to_state(state)?).await.map(|_| ())
    }

    fn render_form(&self, state: &PaymentsState, members: &[Member]) -> String {
        let input = state.saisie.as_ref();
        let errors = &state.erreurs;
        let value = |key: &str| field_value(input, key);

        let member_options = members
            .iter()
            .filter_map(|m| Some((m.id?.to_string(), m.full_name())))
            .collect::<Vec<_>>();
        let modes = PaymentMode::ALL.iter().map(|m| (m.as_str().to_string(), m.label()));
        let statuses = PaymentStatus::ALL.iter().map(|s| (s.as_str().to_string(), s.label()));

        let mut html = String::new();
        let _ = write!(
            html,
            r#"<form id="form-paiement" class="formulaire"><h2>{}</h2><label>Cotisant *</label>{}{}"#,
            if state.edition_id.is_some() { "Modifier le paiement" } else { "Nouveau paiement" },
            markup::select(
                "paiement-cotisant",
                "cotisant_id",
                "Sélectionner un cotisant",
                member_options.iter().map(|(id, name)| (id.clone(), name.as_str())),
                Some(value("cotisant_id").as_str())
            ),
            field_error(errors, "cotisant_id"),
        );
        let _ = write!(
            html,
            r#"<label for="paiement-montant">Montant (CFA) *</label><input id="paiement-montant" name="montant" type="number" min="0" value="{}">{}<label for="paiement-date">Date *</label><input id="paiement-date" name="date_paiement" type="date" value="{}">{}"#,
            escape(&value("montant")),
            field_error(errors, "montant"),
            escape(&value("date_paiement")),
            field_error(errors, "date_paiement"),
        );
        let _ = write!(
            html,
            r#"<label>Mode *</label>{}{}<label>Statut *</label>{}{}"#,
            markup::select("paiement-mode", "mode_paiement", "Sélectionner un mode", modes, Some(value("mode_paiement").as_str())),
            field_error(errors, "mode_paiement"),
            markup::select("paiement-statut", "statut", "Sélectionner un statut", statuses, Some(value("statut").as_str())),
            field_error(errors, "statut"),
        );
        let _ = write!(
            html,
            r#"<label for="paiement-reference">Référence</label><input id="paiement-reference" name="reference" value="{}"><label for="paiement-commentaire">Commentaire</label><textarea id="paiement-commentaire" name="commentaire">{}</textarea>"#,
            escape(&value("reference")),
            escape(&value("commentaire")),
        );
        html.push_str(r#"<div class="actions-formulaire"><button type="button" id="btn-annuler-paiement" class="bouton">Annuler</button><button type="submit" class="bouton bouton-primaire">Enregistrer</button></div></form>"#);
        html
    }

    async fn submit(&mut self, ctx: &ViewContext, event: &DomEvent) -> Result<(), ViewError> {
        let mut state = self.state()?;
        self.base.set("saisie", Value::Object(event.form.clone()))?;

        let form: PaymentForm = read_form(event)?;
        validate_form(&form)?;
        let member_id = form.cotisant_id.unwrap_or_default();
        if ctx.store.get_by_id::<Member>(member_id).await?.is_none() {
            return Err(ViewError::Validation(vec![FieldError::new("cotisant_id", "Cotisant introuvable")]));
        }

        match state.edition_id {
            Some(id) => {
                let existing: Option<Payment> = ctx.store.get_by_id(id).await?;
                let existing = existing.ok_or_else(|| ViewError::Rejected("Paiement introuvable".to_string()))?;
                ctx.store.update(&form.apply(Some(existing))?).await?;
                info!(payment_id = id, "Payment updated");
                state.message = Some("Paiement modifié avec succès".to_string());
            }
            None => {
                let id = ctx.store.add(&form.apply(None)?).await?;
                info!(payment_id = id, member_id, "Payment recorded");
                state.message = Some("Paiement enregistré avec succès".to_string());
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
        let payment: Option<Payment> = ctx.store.get_by_id(id).await?;
        let payment = payment.ok_or_else(|| ViewError::Rejected("Paiement introuvable".to_string()))?;

        let request = ConfirmationRequest::new(
            "Supprimer ce paiement",
            format!(
                "Êtes-vous sûr de vouloir supprimer le paiement de {} CFA ?",
                format_amount(payment.amount)
            ),
        )
        .confirm_label("Supprimer le paiement");

        if !self.base.request_confirmation(ctx, request).await {
            return Ok(());
        }

        ctx.store.delete(Collection::Payments, id).await?;
        info!(payment_id = id, "Payment deleted");

        let mut state = self.state()?;
        state.message = Some("Paiement supprimé".to_string());
        self.save(ctx, &state).await
    }
}

impl Default for PaymentsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl View for PaymentsView {
    fn name(&self) -> &'static str {
        "paiements"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewBase {
        &mut self.base
    }

    fn watches(&self) -> &'static [Collection] {
        &[Collection::Payments, Collection::Members]
    }

    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        if !self.query_applied {
            self.query_applied = true;
            if let Some(member_id) = ctx.query_id("cotisant_id") {
                self.base.set("formulaire_ouvert", true)?;
                self.base.set("saisie", json!({ "cotisant_id": member_id, "date_paiement": Local::now().date_naive().format(DATE_FORMAT).to_string(), "statut": "confirme" }))?;
            }
        }

        let state = self.state()?;
        let today = Local::now().date_naive();
        let territory = Territory::load(&ctx.store).await?;
        let members: Vec<Member> = ctx.store.get_all().await?;
        let payments: Vec<Payment> = ctx.store.get_all().await?;
        let by_id: HashMap<i64, &Member> = members.iter().filter_map(|m| Some((m.id?, m))).collect();

        let mut visible = filter_payments(&payments, &by_id, &state.filtres, today);
        sort_payments(&mut visible, &by_id, state.tri);
        let kpis = PaymentKpis::compute(&visible);

        let mut html = markup::heading("Gestion des Paiements");
        if let Some(alert) = &state.alerte {
            html.push_str(&markup::alert("erreur", alert));
        }
        if let Some(message) = &state.message {
            html.push_str(&markup::alert("succes", message));
        }

        let _ = write!(
            html,
            r#"<div class="kpis"><div class="kpi"><span>Total confirmé</span><strong id="kpi-total-confirme">{} CFA</strong></div><div class="kpi"><span>Paiements confirmés</span><strong id="kpi-nombre-confirmes">{}</strong></div><div class="kpi"><span>En attente</span><strong id="kpi-nombre-attente">{}</strong></div></div>"#,
            format_amount(kpis.total_confirmed),
            kpis.confirmed_count,
            kpis.pending_count,
        );
        html.push_str(r#"<button id="btn-nouveau-paiement" class="bouton bouton-primaire">Nouveau paiement</button>"#);

        let filters = &state.filtres;
        let periods = [
            ("mois_courant".to_string(), "Mois en cours"),
            ("annee_courante".to_string(), "Année en cours"),
        ];
        let period = match filters.periode {
            Period::Tout => "",
            Period::MoisCourant => "mois_courant",
            Period::AnneeCourante => "annee_courante",
        };
        let _ = write!(
            html,
            r#"<div class="filtres">{}{}{}{}{}<input id="filtre-recherche-paiement" type="search" placeholder="Rechercher un cotisant" value="{}"><button id="btn-reinitialiser-filtres-paiements" class="bouton">Réinitialiser</button></div>"#,
            markup::select("filtre-periode", "periode", "Toutes les périodes", periods, Some(period)),
            markup::select("filtre-statut", "statut", "Tous les statuts", PaymentStatus::ALL.iter().map(|s| (s.as_str().to_string(), s.label())), filters.statut.map(|s| s.as_str())),
            markup::select("filtre-mode", "mode", "Tous les modes", PaymentMode::ALL.iter().map(|m| (m.as_str().to_string(), m.label())), filters.mode.map(|m| m.as_str())),
            markup::select("filtre-canton-paiement", "canton", "Tous les cantons", territory.canton_options(), filters.canton_id.map(|id| id.to_string()).as_deref()),
            markup::select("filtre-village-paiement", "village", "Tous les villages", territory.village_options(filters.canton_id), filters.village_id.map(|id| id.to_string()).as_deref()),
            escape(&filters.recherche),
        );

        if state.formulaire_ouvert {
            html.push_str(&self.render_form(&state, &members));
        }

        html.push_str(r#"<div id="liste-paiements">"#);
        if visible.is_empty() {
            html.push_str(&markup::empty(if payments.is_empty() {
                "Aucun paiement enregistré pour le moment."
            } else {
                "Aucun paiement ne correspond aux filtres sélectionnés."
            }));
        } else {
            html.push_str(r#"<table class="tableau"><thead><tr><th data-tri-colonne="date">Date</th><th data-tri-colonne="cotisant">Cotisant</th><th data-tri-colonne="montant">Montant</th><th>Mode</th><th>Statut</th><th>Référence</th><th>Actions</th></tr></thead><tbody>"#);
            for payment in &visible {
                let id = payment.id.unwrap_or_default();
                let member = by_id.get(&payment.member_id).map(|m| m.full_name()).unwrap_or_default();
                let _ = write!(
                    html,
                    r#"<tr data-id="{id}"><td>{}</td><td>{}</td><td>{} CFA</td><td>{}</td><td><span class="badge badge-{}">{}</span></td><td>{}</td><td><button data-action="editer-paiement" data-id="{id}">Modifier</button><button data-action="supprimer-paiement" data-id="{id}">Supprimer</button></td></tr>"#,
                    payment.paid_on.format("%d/%m/%Y"),
                    escape(&member),
                    format_amount(payment.amount),
                    payment.mode.label(),
                    payment.status.as_str(),
                    payment.status.label(),
                    escape(payment.reference.as_deref().unwrap_or("-")),
                    id = id,
                );
            }
            html.push_str("</tbody></table>");
        }
        html.push_str("</div>");
        html.push_str(&markup::confirmation_modal());
        Ok(html)
    }

    async fn mount(&mut self, _ctx: &ViewContext) -> Result<(), ViewError> {
        let base = &mut self.base;
        base.add_listener("#btn-nouveau-paiement", "click", "nouveau");
        base.add_listener("#filtre-periode", "change", "filtrer-periode");
        base.add_listener("#filtre-statut", "change", "filtrer-statut");
        base.add_listener("#filtre-mode", "change", "filtrer-mode");
        base.add_listener("#filtre-canton-paiement", "change", "filtrer-canton");
        base.add_listener("#filtre-village-paiement", "change", "filtrer-village");
        base.add_listener("#filtre-recherche-paiement", "input", "rechercher");
        base.add_listener("#btn-reinitialiser-filtres-paiements", "click", "reinitialiser-filtres");

        if markup::contains_element(base.markup(), "#form-paiement") {
            base.add_listener("#form-paiement", "submit", "enregistrer");
            base.add_listener("#btn-annuler-paiement", "click", "fermer");
        }

        base.delegate_event(LIST, "th[data-tri-colonne]", "click", "trier");
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
        let value = event.value.as_deref().unwrap_or_default();

        match action {
            "nouveau" => {
                state.formulaire_ouvert = true;
                state.edition_id = None;
                state.saisie = Some(new_payment_input(Local::now().date_naive()));
                state.erreurs.clear();
                state.alerte = None;
            }
            "fermer" => {
                state.formulaire_ouvert = false;
                state.edition_id = None;
                state.saisie = None;
                state.erreurs.clear();
            }
            "editer-paiement" => {
                let id = required_id(params, action)?;
                let payment: Option<Payment> = ctx.store.get_by_id(id).await?;
                let payment = payment.ok_or_else(|| ViewError::Rejected("Paiement introuvable".to_string()))?;
                state.formulaire_ouvert = true;
                state.edition_id = Some(id);
                state.saisie = Some(payment_input(&payment));
                state.erreurs.clear();
                state.alerte = None;
            }
            "enregistrer" => return self.submit(ctx, event).await,
            "supprimer-paiement" => {
                let id = required_id(params, action)?;
                return self.delete(ctx, id).await;
            }
            "trier" => {
                let column = params
                    .str("triColonne")
                    .and_then(SortColumn::parse)
                    .ok_or_else(|| ViewError::Rejected("Colonne de tri inconnue".to_string()))?;
                state.tri = if state.tri.colonne == column {
                    Sort {
                        colonne: column,
                        direction: match state.tri.direction {
                            SortOrder::Asc => SortOrder::Desc,
                            SortOrder::Desc => SortOrder::Asc,
                        },
                    }
                } else {
                    Sort {
                        colonne: column,
                        direction: SortOrder::Desc,
                    }
                };
            }
            "filtrer-periode" => state.filtres.periode = Period::parse(value).unwrap_or_default(),
            "filtrer-statut" => state.filtres.statut = PaymentStatus::parse(value),
            "filtrer-mode" => state.filtres.mode = PaymentMode::parse(value),
            "filtrer-canton" => {
                state.filtres.canton_id = selected_id(Some(value));
                state.filtres.village_id = None;
            }
            "filtrer-village" => state.filtres.village_id = selected_id(Some(value)),
            "rechercher" => state.filtres.recherche = value.to_string(),
            "reinitialiser-filtres" => state.filtres = PaymentFilters::default(),
            other => return Err(ViewError::UnknownAction(other.to_string())),
        }

        self.save(ctx, &state).await
    }
}
