/// Home screen with the association's headline figures

use crate::shell::markup::{self, escape, format_amount};
use crate::shell::view::{View, ViewBase, ViewContext, ViewError};
use async_trait::async_trait;
use cotisations_shared::models::member::Member;
use cotisations_shared::models::payment::Payment;
use cotisations_shared::ranking::{Criterion, SortOrder};
use cotisations_shared::store::Collection;
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Number of payments listed under "Derniers paiements"
const RECENT_PAYMENTS: usize = 5;

/// Number of cantons in the leaderboard extract
const TOP_CANTONS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct DashboardKpis {
    pub members: usize,
    pub active_members: usize,
    pub declared_total: f64,
    pub confirmed_total: f64,
    /// Whole percentage of active members
    pub participation: u32,
}

impl DashboardKpis {
    pub fn compute(members: &[Member], payments: &[Payment]) -> Self {
        let active_members = members.iter().filter(|m| m.is_active()).count();
        let participation = if members.is_empty() {
            0
        } else {
            (active_members as f64 / members.len() as f64 * 100.0).round() as u32
        };

        Self {
            members: members.len(),
            active_members,
            declared_total: members.iter().map(|m| m.contribution_amount).sum(),
            confirmed_total: payments.iter().filter(|p| p.is_confirmed()).map(|p| p.amount).sum(),
            participation,
        }
    }
}

/// Latest payments first; ties keep the most recently created first
pub(crate) fn recent_payments(payments: &[Payment], limit: usize) -> Vec<&Payment> {
    let mut recent: Vec<&Payment> = payments.iter().collect();
    recent.sort_by(|a, b| b.paid_on.cmp(&a.paid_on).then(b.id.cmp(&a.id)));
    recent.truncate(limit);
    recent
}

/// Dashboard screen
#[derive(Debug)]
pub struct DashboardView {
    base: ViewBase,
}

impl DashboardView {
    pub fn new() -> Self {
        Self {
            base: ViewBase::new(json!({})),
        }
    }
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl View for DashboardView {
    fn name(&self) -> &'static str {
        "tableau-bord"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewBase {
        &mut self.base
    }

    fn watches(&self) -> &'static [Collection] {
        &[Collection::Members, Collection::Payments, Collection::Cantons, Collection::Villages]
    }

    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        let members: Vec<Member> = ctx.store.get_all().await?;
        let payments: Vec<Payment> = ctx.store.get_all().await?;
        let cantons = ctx.ranking.rank_cantons(Criterion::TotalAmount, SortOrder::Desc).await?;
        let village_count = ctx.store.count(Collection::Villages).await?;

        let kpis = DashboardKpis::compute(&members, &payments);

        let mut html = markup::heading("Tableau de Bord");
        let _ = write!(
            html,
            r#"<div class="kpis"><div class="kpi"><span>Cotisants actifs</span><strong id="kpi-cotisants-actifs">{}</strong><small>sur {}</small></div><div class="kpi"><span>Montant déclaré</span><strong id="kpi-montant-declare">{} CFA</strong></div><div class="kpi"><span>Paiements confirmés</span><strong id="kpi-montant-confirme">{} CFA</strong></div><div class="kpi"><span>Taux de participation</span><strong id="kpi-participation">{}%</strong></div><div class="kpi"><span>Territoires</span><strong id="kpi-territoires">{} cantons, {} villages</strong></div></div>"#,
            kpis.active_members,
            kpis.members,
            format_amount(kpis.declared_total),
            format_amount(kpis.confirmed_total),
            kpis.participation,
            cantons.len(),
            village_count,
        );

        html.push_str(r#"<section><h2>Meilleurs cantons</h2>"#);
        if cantons.is_empty() {
            html.push_str(&markup::empty("Aucun canton enregistré."));
        } else {
            html.push_str("<ol>");
            for entry in cantons.iter().take(TOP_CANTONS) {
                let _ = write!(
                    html,
                    "<li>{} : {} CFA ({} cotisants)</li>",
                    escape(&entry.entity.name),
                    format_amount(entry.statistics.total_amount),
                    entry.statistics.member_count
                );
            }
            html.push_str("</ol>");
        }
        html.push_str("</section>");

        let names: HashMap<i64, String> = members.iter().filter_map(|m| Some((m.id?, m.full_name()))).collect();
        html.push_str(r#"<section><h2>Derniers paiements</h2>"#);
        let recent = recent_payments(&payments, RECENT_PAYMENTS);
        if recent.is_empty() {
            html.push_str(&markup::empty("Aucun paiement enregistré."));
        } else {
            html.push_str("<ul>");
            for payment in recent {
                let _ = write!(
                    html,
                    "<li>{} - {} : {} CFA ({})</li>",
                    payment.paid_on.format("%d/%m/%Y"),
                    escape(names.get(&payment.member_id).map(String::as_str).unwrap_or("Cotisant supprimé")),
                    format_amount(payment.amount),
                    payment.status.label()
                );
            }
            html.push_str("</ul>");
        }
        html.push_str("</section>");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cotisations_shared::models::member::MemberStatus;
    use cotisations_shared::models::payment::{PaymentMode, PaymentStatus};

    #[test]
    fn test_kpis() {
        let mut inactive = Member::new("Mensah", "Afi");
        inactive.status = MemberStatus::Inactive;
        inactive.contribution_amount = 2000.0;
        let mut active = Member::new("Agbodjan", "Kossi");
        active.contribution_amount = 5000.0;
        let third = Member::new("Amegah", "Yao");

        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let payments = vec![
            Payment::new(1, 1500.0, date, PaymentMode::Cash, PaymentStatus::Confirmed),
            Payment::new(1, 900.0, date, PaymentMode::Cash, PaymentStatus::Pending),
        ];

        let kpis = DashboardKpis::compute(&[inactive, active, third], &payments);
        assert_eq!(kpis.members, 3);
        assert_eq!(kpis.active_members, 2);
        assert_eq!(kpis.declared_total, 7000.0);
        assert_eq!(kpis.confirmed_total, 1500.0);
        assert_eq!(kpis.participation, 67);
    }

    #[test]
    fn test_kpis_of_empty_store() {
        assert_eq!(DashboardKpis::compute(&[], &[]), DashboardKpis::default());
    }

    #[test]
    fn test_recent_payments_newest_first() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
        let payments: Vec<Payment> = [(1, 3), (2, 9), (3, 9), (4, 1)]
            .into_iter()
            .map(|(id, d)| Payment {
                id: Some(id),
                ..Payment::new(1, 100.0, day(d), PaymentMode::Cash, PaymentStatus::Confirmed)
            })
            .collect();

        let ids: Vec<i64> = recent_payments(&payments, 3).iter().filter_map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
