/// Leaderboards over the territorial hierarchy
///
/// Each entry point loads the collections it needs, groups members under
/// every candidate entity, reduces each group to [`Statistics`], then
/// stable-sorts by the chosen criterion and assigns dense ranks 1..N.
/// Entities without members are kept with zero statistics.
///
/// Membership rules:
/// - canton: members whose `village_id` is one of the canton's villages
/// - village: members whose `village_id` is the village
/// - quarter: members of the parent village whose `quartier_id` is the quarter
///
/// # Example
///
/// ```no_run
/// use cotisations_shared::ranking::{AmountSource, Criterion, RankingService, SortOrder};
/// use cotisations_shared::store::Store;
///
/// # async fn example(store: Store) -> Result<(), Box<dyn std::error::Error>> {
/// let ranking = RankingService::new(store, AmountSource::DeclaredContribution);
///
/// for entry in ranking.rank_cantons(Criterion::TotalAmount, SortOrder::Desc).await? {
///     println!("#{} {}: {}", entry.rank, entry.entity.name, entry.statistics.total_amount);
/// }
/// # Ok(())
/// # }
/// ```

use crate::models::canton::Canton;
use crate::models::member::Member;
use crate::models::payment::Payment;
use crate::models::quarter::Quarter;
use crate::models::village::Village;
use crate::store::{Store, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Field a leaderboard is sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Sum of the group's amounts (see [`AmountSource`])
    #[default]
    #[serde(rename = "montant_cotise")]
    TotalAmount,

    /// Percentage of active members
    #[serde(rename = "taux_participation")]
    ParticipationRate,

    #[serde(rename = "nombre_cotisants")]
    MemberCount,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::TotalAmount => "montant_cotise",
            Criterion::ParticipationRate => "taux_participation",
            Criterion::MemberCount => "nombre_cotisants",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "montant_cotise" => Some(Criterion::TotalAmount),
            "taux_participation" => Some(Criterion::ParticipationRate),
            "nombre_cotisants" => Some(Criterion::MemberCount),
            _ => None,
        }
    }

    fn value(&self, statistics: &Statistics) -> f64 {
        match self {
            Criterion::TotalAmount => statistics.total_amount,
            Criterion::ParticipationRate => statistics.participation_rate,
            Criterion::MemberCount => statistics.member_count as f64,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Where a group's total amount comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    /// Sum of each member's declared `montant_cotisation`
    #[default]
    DeclaredContribution,

    /// Sum of the group's confirmed payments
    ConfirmedPayments,
}

impl AmountSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountSource::DeclaredContribution => "declared_contribution",
            AmountSource::ConfirmedPayments => "confirmed_payments",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "declared_contribution" => Some(AmountSource::DeclaredContribution),
            "confirmed_payments" => Some(AmountSource::ConfirmedPayments),
            _ => None,
        }
    }
}

impl fmt::Display for AmountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregates over one group of members
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "montant_total")]
    pub total_amount: f64,

    /// Total divided by member count, 0 for an empty group
    #[serde(rename = "montant_moyen")]
    pub average_amount: f64,

    #[serde(rename = "nombre_cotisants")]
    pub member_count: usize,

    #[serde(rename = "cotisants_actifs")]
    pub active_members: usize,

    /// Active members as a percentage of the group, rounded to 2 decimals
    #[serde(rename = "taux_participation")]
    pub participation_rate: f64,

    /// Payments of any status made by the group's members
    #[serde(rename = "nombre_paiements")]
    pub payment_count: usize,
}

impl Statistics {
    /// Reduces a group of members and the full payment list
    pub fn compute(members: &[Member], payments: &[Payment], source: AmountSource) -> Self {
        let member_ids: HashSet<i64> = members.iter().filter_map(|m| m.id).collect();
        let group_payments: Vec<&Payment> = payments
            .iter()
            .filter(|p| member_ids.contains(&p.member_id))
            .collect();

        let total_amount: f64 = match source {
            AmountSource::DeclaredContribution => members.iter().map(|m| m.contribution_amount).sum(),
            AmountSource::ConfirmedPayments => group_payments
                .iter()
                .filter(|p| p.is_confirmed())
                .map(|p| p.amount)
                .sum(),
        };

        let member_count = members.len();
        let active_members = members.iter().filter(|m| m.is_active()).count();

        let (average_amount, participation_rate) = if member_count > 0 {
            let rate = active_members as f64 / member_count as f64 * 100.0;
            (total_amount / member_count as f64, round2(rate))
        } else {
            (0.0, 0.0)
        };

        Self {
            total_amount,
            average_amount,
            member_count,
            active_members,
            participation_rate,
            payment_count: group_payments.len(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One row of a leaderboard
///
/// `C` is the child entity type; quarters have no children and use `()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry<E, C> {
    #[serde(rename = "entite")]
    pub entity: E,

    #[serde(rename = "enfants")]
    pub children: Vec<C>,

    #[serde(rename = "cotisants")]
    pub members: Vec<Member>,

    #[serde(rename = "statistiques")]
    pub statistics: Statistics,

    /// 1-based position after sorting
    #[serde(rename = "rang")]
    pub rank: usize,
}

pub type CantonRanking = RankingEntry<Canton, Village>;
pub type VillageRanking = RankingEntry<Village, Quarter>;
pub type QuarterRanking = RankingEntry<Quarter, ()>;

/// Sorts entries stably and assigns dense ranks
pub fn sort_and_rank<E, C>(mut entries: Vec<RankingEntry<E, C>>, criterion: Criterion, order: SortOrder) -> Vec<RankingEntry<E, C>> {
    entries.sort_by(|a, b| {
        let (x, y) = (criterion.value(&a.statistics), criterion.value(&b.statistics));
        match order {
            SortOrder::Asc => x.total_cmp(&y),
            SortOrder::Desc => y.total_cmp(&x),
        }
    });

    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    entries
}

/// Computes leaderboards from the current store contents
///
/// Nothing is cached: every call reads the collections again.
#[derive(Debug, Clone)]
pub struct RankingService {
    store: Store,
    amount_source: AmountSource,
}

impl RankingService {
    pub fn new(store: Store, amount_source: AmountSource) -> Self {
        Self {
            store,
            amount_source,
        }
    }

    pub fn amount_source(&self) -> AmountSource {
        self.amount_source
    }

    /// Ranks every canton
    pub async fn rank_cantons(&self, criterion: Criterion, order: SortOrder) -> StoreResult<Vec<CantonRanking>> {
        let members: Vec<Member> = self.store.get_all().await?;
        let payments: Vec<Payment> = self.store.get_all().await?;
        let cantons: Vec<Canton> = self.store.get_all().await?;
        let villages: Vec<Village> = self.store.get_all().await?;

        let entries = cantons
            .into_iter()
            .map(|canton| {
                let canton_villages: Vec<Village> = villages
                    .iter()
                    .filter(|v| canton.id == Some(v.canton_id))
                    .cloned()
                    .collect();
                let village_ids: HashSet<i64> = canton_villages.iter().filter_map(|v| v.id).collect();
                let group: Vec<Member> = members
                    .iter()
                    .filter(|m| m.village_id.is_some_and(|id| village_ids.contains(&id)))
                    .cloned()
                    .collect();

                self.entry(canton, canton_villages, group, &payments)
            })
            .collect();

        debug!(criterion = criterion.as_str(), ?order, "Ranking cantons");
        Ok(sort_and_rank(entries, criterion, order))
    }

    /// Ranks the villages of one canton
    pub async fn rank_villages(&self, canton_id: i64, criterion: Criterion, order: SortOrder) -> StoreResult<Vec<VillageRanking>> {
        let members: Vec<Member> = self.store.get_all().await?;
        let payments: Vec<Payment> = self.store.get_all().await?;
        let villages: Vec<Village> = self.store.get_all().await?;
        let quarters: Vec<Quarter> = self.store.get_all().await?;

        let entries = villages
            .into_iter()
            .filter(|v| v.canton_id == canton_id)
            .map(|village| {
                let children: Vec<Quarter> = quarters
                    .iter()
                    .filter(|q| village.id == Some(q.village_id))
                    .cloned()
                    .collect();
                let group: Vec<Member> = members
                    .iter()
                    .filter(|m| m.village_id.is_some() && m.village_id == village.id)
                    .cloned()
                    .collect();

                self.entry(village, children, group, &payments)
            })
            .collect();

        debug!(canton_id, criterion = criterion.as_str(), ?order, "Ranking villages");
        Ok(sort_and_rank(entries, criterion, order))
    }

    /// Ranks the quarters of one village
    pub async fn rank_quarters(&self, village_id: i64, criterion: Criterion, order: SortOrder) -> StoreResult<Vec<QuarterRanking>> {
        let members: Vec<Member> = self.store.get_all().await?;
        let payments: Vec<Payment> = self.store.get_all().await?;
        let quarters: Vec<Quarter> = self.store.get_all().await?;

        let village_members: Vec<&Member> = members
            .iter()
            .filter(|m| m.village_id == Some(village_id))
            .collect();

        let entries = quarters
            .into_iter()
            .filter(|q| q.village_id == village_id)
            .map(|quarter| {
                let group: Vec<Member> = village_members
                    .iter()
                    .filter(|m| m.quarter_id.is_some() && m.quarter_id == quarter.id)
                    .map(|m| (*m).clone())
                    .collect();

                self.entry(quarter, Vec::new(), group, &payments)
            })
            .collect();

        debug!(village_id, criterion = criterion.as_str(), ?order, "Ranking quarters");
        Ok(sort_and_rank(entries, criterion, order))
    }

    fn entry<E, C>(&self, entity: E, children: Vec<C>, members: Vec<Member>, payments: &[Payment]) -> RankingEntry<E, C> {
        let statistics = Statistics::compute(&members, payments, self.amount_source);
        RankingEntry {
            entity,
            children,
            members,
            statistics,
            rank: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::MemberStatus;
    use crate::models::payment::{PaymentMode, PaymentStatus};
    use chrono::NaiveDate;

    fn member(id: i64, amount: f64, status: MemberStatus) -> Member {
        Member {
            id: Some(id),
            contribution_amount: amount,
            status,
            ..Member::new("Nom", "Prenom")
        }
    }

    fn payment(member_id: i64, amount: f64, status: PaymentStatus) -> Payment {
        Payment::new(
            member_id,
            amount,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            PaymentMode::Cash,
            status,
        )
    }

    fn entry(name: &str, statistics: Statistics) -> RankingEntry<String, ()> {
        RankingEntry {
            entity: name.to_string(),
            children: Vec::new(),
            members: Vec::new(),
            statistics,
            rank: 0,
        }
    }

    #[test]
    fn test_empty_group_has_zero_statistics() {
        let stats = Statistics::compute(&[], &[payment(1, 100.0, PaymentStatus::Confirmed)], AmountSource::default());
        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn test_participation_rate_is_rounded_percentage() {
        let members = vec![
            member(1, 1000.0, MemberStatus::Active),
            member(2, 2000.0, MemberStatus::Inactive),
            member(3, 3000.0, MemberStatus::Suspended),
        ];

        let stats = Statistics::compute(&members, &[], AmountSource::DeclaredContribution);
        assert_eq!(stats.member_count, 3);
        assert_eq!(stats.active_members, 1);
        assert_eq!(stats.participation_rate, 33.33);
        assert_eq!(stats.total_amount, 6000.0);
        assert_eq!(stats.average_amount, 2000.0);
    }

    #[test]
    fn test_amount_source_switches_total() {
        let members = vec![member(1, 5000.0, MemberStatus::Active)];
        let payments = vec![
            payment(1, 1500.0, PaymentStatus::Confirmed),
            payment(1, 700.0, PaymentStatus::Pending),
            payment(9, 999.0, PaymentStatus::Confirmed),
        ];

        let declared = Statistics::compute(&members, &payments, AmountSource::DeclaredContribution);
        assert_eq!(declared.total_amount, 5000.0);
        assert_eq!(declared.payment_count, 2);

        let paid = Statistics::compute(&members, &payments, AmountSource::ConfirmedPayments);
        assert_eq!(paid.total_amount, 1500.0);
        assert_eq!(paid.payment_count, 2);
    }

    #[test]
    fn test_sort_is_stable_and_ranks_are_dense() {
        let with_total = |total: f64| Statistics {
            total_amount: total,
            ..Statistics::default()
        };
        let entries = vec![
            entry("a", with_total(10.0)),
            entry("b", with_total(30.0)),
            entry("c", with_total(10.0)),
            entry("d", with_total(20.0)),
        ];

        let ranked = sort_and_rank(entries.clone(), Criterion::TotalAmount, SortOrder::Desc);
        let names: Vec<_> = ranked.iter().map(|e| e.entity.as_str()).collect();
        assert_eq!(names, vec!["b", "d", "a", "c"]);
        assert_eq!(ranked.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let ranked = sort_and_rank(entries, Criterion::TotalAmount, SortOrder::Asc);
        let names: Vec<_> = ranked.iter().map(|e| e.entity.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_criterion_and_order_parsing() {
        assert_eq!(Criterion::parse("taux_participation"), Some(Criterion::ParticipationRate));
        assert_eq!(Criterion::parse("montant"), None);
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::default(), SortOrder::Desc);
        assert_eq!(AmountSource::parse("confirmed_payments"), Some(AmountSource::ConfirmedPayments));
    }
}
