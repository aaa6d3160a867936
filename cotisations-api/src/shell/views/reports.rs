/// Payment summaries and the member export
///
/// The export is a semicolon-separated CSV (the separator spreadsheet
/// software expects with a French locale) shown in a text area for copy.

use super::{to_state, Territory};
use crate::shell::markup::{self, escape, format_amount};
use crate::shell::view::{ActionParams, DomEvent, View, ViewBase, ViewContext, ViewError};
use async_trait::async_trait;
use cotisations_shared::models::member::Member;
use cotisations_shared::models::payment::{Payment, PaymentMode, PaymentStatus};
use cotisations_shared::store::Collection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::info;

const CSV_SEPARATOR: char = ';';

const CSV_HEADER: [&str; 11] = [
    "id",
    "nom",
    "prenom",
    "sexe",
    "fonction",
    "telephone",
    "montant_cotisation",
    "date_cotisation",
    "statut",
    "village",
    "canton",
];

/// Count and amount of one group of payments
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Tally {
    pub count: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PaymentSummary {
    pub by_status: BTreeMap<PaymentStatus, Tally>,
    pub by_mode: BTreeMap<PaymentMode, Tally>,
    pub total: Tally,
}

impl PaymentSummary {
    pub fn compute(payments: &[Payment]) -> Self {
        let mut summary = Self::default();
        for payment in payments {
            for tally in [
                summary.by_status.entry(payment.status).or_default(),
                summary.by_mode.entry(payment.mode).or_default(),
                &mut summary.total,
            ] {
                tally.count += 1;
                tally.amount += payment.amount;
            }
        }
        summary
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([CSV_SEPARATOR, '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Members as CSV, one line per member after the header
pub(crate) fn members_csv(members: &[Member], territory: &Territory) -> String {
    let separator = CSV_SEPARATOR.to_string();
    let mut csv = CSV_HEADER.join(&separator);
    csv.push('\n');

    for member in members {
        let fields = [
            member.id.map(|id| id.to_string()).unwrap_or_default(),
            member.last_name.clone(),
            member.first_name.clone(),
            member.sex.map(|s| s.as_str().to_string()).unwrap_or_default(),
            member.occupation_label().to_string(),
            member.phone.clone().unwrap_or_default(),
            format!("{}", member.contribution_amount),
            member.contribution_date.map(|d| d.to_string()).unwrap_or_default(),
            member.status.as_str().to_string(),
            territory.village_name(member.village_id).unwrap_or_default().to_string(),
            territory.canton_name(member.canton_id).unwrap_or_default().to_string(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        csv.push_str(&line.join(&separator));
        csv.push('\n');
    }
    csv
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ReportsState {
    export_csv: Option<String>,
}

/// Reports screen
#[derive(Debug)]
pub struct ReportsView {
    base: ViewBase,
}

impl ReportsView {
    pub fn new() -> Self {
        Self {
            base: ViewBase::new(json!({})),
        }
    }
}

impl Default for ReportsView {
    fn default() -> Self {
        Self::new()
    }
}

fn tally_table<K>(title: &str, rows: &BTreeMap<K, Tally>, label: impl Fn(&K) -> &'static str) -> String {
    let mut html = format!(
        r#"<section><h2>{}</h2><table class="tableau"><thead><tr><th></th><th>Nombre</th><th>Montant</th></tr></thead><tbody>"#,
        escape(title)
    );
    for (key, tally) in rows {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{} CFA</td></tr>",
            label(key),
            tally.count,
            format_amount(tally.amount)
        );
    }
    html.push_str("</tbody></table></section>");
    html
}

#[async_trait]
impl View for ReportsView {
    fn name(&self) -> &'static str {
        "rapports"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewBase {
        &mut self.base
    }

    fn watches(&self) -> &'static [Collection] {
        &[Collection::Payments]
    }

    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        let state: ReportsState = self.base.state_as()?;
        let payments: Vec<Payment> = ctx.store.get_all().await?;
        let summary = PaymentSummary::compute(&payments);

        let mut html = markup::heading("Génération de Rapports");
        let _ = write!(
            html,
            r#"<p class="resume">{} paiements pour un total de {} CFA</p>"#,
            summary.total.count,
            format_amount(summary.total.amount)
        );

        if payments.is_empty() {
            html.push_str(&markup::empty("Aucun paiement enregistré pour le moment."));
        } else {
            html.push_str(&tally_table("Par statut", &summary.by_status, PaymentStatus::label));
            html.push_str(&tally_table("Par mode de paiement", &summary.by_mode, PaymentMode::label));
        }

        html.push_str(r#"<section id="export"><h2>Export des cotisants</h2><button data-action="exporter-csv" class="bouton">Générer le CSV</button>"#);
        if let Some(csv) = &state.export_csv {
            let _ = write!(html, r#"<textarea id="export-csv" readonly>{}</textarea>"#, escape(csv));
        }
        html.push_str("</section>");
        Ok(html)
    }

    async fn mount(&mut self, _ctx: &ViewContext) -> Result<(), ViewError> {
        self.base.configure_delegated_actions("#export", None);
        Ok(())
    }

    async fn handle_action(
        &mut self,
        ctx: &ViewContext,
        action: &str,
        _params: &ActionParams,
        _event: &DomEvent,
    ) -> Result<(), ViewError> {
        match action {
            "exporter-csv" => {
                let members: Vec<Member> = ctx.store.get_all().await?;
                let territory = Territory::load(&ctx.store).await?;
                let csv = members_csv(&members, &territory);
                info!(members = members.len(), "Member export generated");

                let state = ReportsState { export_csv: Some(csv) };
                self.update_state(ctx, to_state(&state)?).await.map(|_| ())
            }
            other => Err(ViewError::UnknownAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_summary_groups_by_status_and_mode() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let payments = vec![
            Payment::new(1, 5000.0, date, PaymentMode::Cash, PaymentStatus::Confirmed),
            Payment::new(2, 2000.0, date, PaymentMode::MobileMoney, PaymentStatus::Confirmed),
            Payment::new(2, 1000.0, date, PaymentMode::Cash, PaymentStatus::Pending),
        ];

        let summary = PaymentSummary::compute(&payments);

        assert_eq!(summary.total, Tally { count: 3, amount: 8000.0 });
        assert_eq!(summary.by_status[&PaymentStatus::Confirmed], Tally { count: 2, amount: 7000.0 });
        assert_eq!(summary.by_status[&PaymentStatus::Pending], Tally { count: 1, amount: 1000.0 });
        assert_eq!(summary.by_mode[&PaymentMode::Cash], Tally { count: 2, amount: 6000.0 });
        assert!(!summary.by_status.contains_key(&PaymentStatus::Refunded));
    }

    #[test]
    fn test_csv_quotes_special_characters() {
        assert_eq!(csv_field("Lomé"), "Lomé");
        assert_eq!(csv_field("a;b"), "\"a;b\"");
        assert_eq!(csv_field("dit \"Kofi\""), "\"dit \"\"Kofi\"\"\"");
    }

    #[test]
    fn test_members_csv() {
        let mut member = Member::new("Agbodjan", "Kossi; fils");
        member.id = Some(1);
        member.contribution_amount = 5000.0;

        let csv = members_csv(&[member], &Territory::default());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id;nom;prenom"));
        assert_eq!(lines[1], "1;Agbodjan;\"Kossi; fils\";;-;;5000;;actif;;");
    }
}
