/// Leaderboards of cantons, villages of a canton, or quarters of a village

use super::{selected_id, to_state, Territory};
use crate::shell::markup::{self, escape, format_amount};
use crate::shell::view::{ActionParams, DomEvent, View, ViewBase, ViewContext, ViewError};
use async_trait::async_trait;
use cotisations_shared::ranking::{Criterion, RankingEntry, SortOrder};
use cotisations_shared::store::Collection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Level {
    #[default]
    Cantons,
    Villages,
    Quartiers,
}

impl Level {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "cantons" => Some(Level::Cantons),
            "villages" => Some(Level::Villages),
            "quartiers" => Some(Level::Quartiers),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Level::Cantons => "cantons",
            Level::Villages => "villages",
            Level::Quartiers => "quartiers",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StatisticsState {
    niveau: Level,
    critere: Criterion,
    ordre: SortOrder,
    canton_id: Option<i64>,
    village_id: Option<i64>,
}

/// One rendered leaderboard line
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    pub rank: usize,
    pub id: Option<i64>,
    pub name: String,
    pub members: usize,
    pub total: f64,
    pub participation: f64,
}

pub(crate) fn rows<E, C>(entries: &[RankingEntry<E, C>], name: impl Fn(&E) -> (Option<i64>, String)) -> Vec<Row> {
    entries
        .iter()
        .map(|entry| {
            let (id, label) = name(&entry.entity);
            Row {
                rank: entry.rank,
                id,
                name: label,
                members: entry.statistics.member_count,
                total: entry.statistics.total_amount,
                participation: entry.statistics.participation_rate,
            }
        })
        .collect()
}

/// Link to the member list filtered on one ranked entity
fn members_link(level: Level, id: i64) -> String {
    let key = match level {
        Level::Cantons => "canton_id",
        Level::Villages => "village_id",
        Level::Quartiers => "quartier_id",
    };
    format!("#cotisants?{}={}", key, id)
}

/// Statistics screen
#[derive(Debug)]
pub struct StatisticsView {
    base: ViewBase,
    query_applied: bool,
}

impl StatisticsView {
    pub fn new() -> Self {
        Self {
            base: ViewBase::new(json!({})),
            query_applied: false,
        }
    }

    fn state(&self) -> Result<StatisticsState, ViewError> {
        self.base.state_as()
    }

    async fn load_rows(&self, ctx: &ViewContext, state: &StatisticsState) -> Result<Option<Vec<Row>>, ViewError> {
        let ranking = &ctx.ranking;
        let rows = match state.niveau {
            Level::Cantons => {
                let entries = ranking.rank_cantons(state.critere, state.ordre).await?;
                rows(&entries, |c| (c.id, c.name.clone()))
            }
            Level::Villages => {
                let Some(canton_id) = state.canton_id else {
                    return Ok(None);
                };
                let entries = ranking.rank_villages(canton_id, state.critere, state.ordre).await?;
                rows(&entries, |v| (v.id, v.name.clone()))
            }
            Level::Quartiers => {
                let Some(village_id) = state.village_id else {
                    return Ok(None);
                };
                let entries = ranking.rank_quarters(village_id, state.critere, state.ordre).await?;
                rows(&entries, |q| (q.id, q.name.clone()))
            }
        };
        Ok(Some(rows))
    }
}

impl Default for StatisticsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl View for StatisticsView {
    fn name(&self) -> &'static str {
        "statistiques"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewBase {
        &mut self.base
    }

    fn watches(&self) -> &'static [Collection] {
        &[
            Collection::Members,
            Collection::Payments,
            Collection::Cantons,
            Collection::Villages,
            Collection::Quarters,
        ]
    }

    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        if !self.query_applied {
            self.query_applied = true;
            if let Some(level) = ctx.query.get("type").and_then(|t| Level::parse(t)) {
                self.base.set("niveau", level)?;
            }
            if let Some(criterion) = ctx.query.get("critere").and_then(|c| Criterion::parse(c)) {
                self.base.set("critere", criterion)?;
            }
            if let Some(id) = ctx.query_id("canton_id") {
                self.base.set("canton_id", id)?;
            }
            if let Some(id) = ctx.query_id("village_id") {
                self.base.set("village_id", id)?;
            }
        }

        let state = self.state()?;
        let territory = Territory::load(&ctx.store).await?;

        let mut html = markup::heading("Statistiques et Rapports");

        let levels = [
            ("cantons".to_string(), "Cantons"),
            ("villages".to_string(), "Villages d'un canton"),
            ("quartiers".to_string(), "Quartiers d'un village"),
        ];
        let criteria = [
            (Criterion::TotalAmount.as_str().to_string(), "Montant cotisé"),
            (Criterion::ParticipationRate.as_str().to_string(), "Taux de participation"),
            (Criterion::MemberCount.as_str().to_string(), "Nombre de cotisants"),
        ];
        let orders = [("desc".to_string(), "Décroissant"), ("asc".to_string(), "Croissant")];
        let order = match state.ordre {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };

        let _ = write!(
            html,
            r#"<div class="filtres">{}{}{}"#,
            markup::select("stat-type", "type", "Type de classement", levels, Some(state.niveau.as_str())),
            markup::select("stat-critere", "critere", "Critère", criteria, Some(state.critere.as_str())),
            markup::select("stat-ordre", "ordre", "Ordre", orders, Some(order)),
        );
        if state.niveau != Level::Cantons {
            html.push_str(&markup::select(
                "stat-canton",
                "canton_id",
                "Sélectionner un canton",
                territory.canton_options(),
                state.canton_id.map(|id| id.to_string()).as_deref(),
            ));
        }
        if state.niveau == Level::Quartiers {
            html.push_str(&markup::select(
                "stat-village",
                "village_id",
                "Sélectionner un village",
                territory.village_options(state.canton_id),
                state.village_id.map(|id| id.to_string()).as_deref(),
            ));
        }
        html.push_str("</div>");

        html.push_str(r#"<div id="classement">"#);
        match self.load_rows(ctx, &state).await? {
            None if state.niveau == Level::Villages => html.push_str(&markup::alert("info", "Veuillez sélectionner un canton")),
            None => html.push_str(&markup::alert("info", "Veuillez sélectionner un village")),
            Some(rows) if rows.is_empty() => html.push_str(&markup::empty("Aucune donnée à classer.")),
            Some(rows) => {
                html.push_str(r#"<table class="tableau"><thead><tr><th>Rang</th><th>Nom</th><th>Cotisants</th><th>Montant Total</th><th>Participation</th></tr></thead><tbody>"#);
                for row in rows {
                    let name = match row.id {
                        Some(id) => format!(r#"<a href="{}">{}</a>"#, members_link(state.niveau, id), escape(&row.name)),
                        None => escape(&row.name),
                    };
                    let _ = write!(
                        html,
                        r#"<tr><td>{}</td><td>{}</td><td>{}</td><td>{} CFA</td><td>{:.2}%</td></tr>"#,
                        row.rank,
                        name,
                        row.members,
                        format_amount(row.total),
                        row.participation,
                    );
                }
                html.push_str("</tbody></table>");
            }
        }
        html.push_str("</div>");
        Ok(html)
    }

    async fn mount(&mut self, _ctx: &ViewContext) -> Result<(), ViewError> {
        self.base.add_listener("#stat-type", "change", "changer-type");
        self.base.add_listener("#stat-critere", "change", "changer-critere");
        self.base.add_listener("#stat-ordre", "change", "changer-ordre");
        self.base.add_listener("#stat-canton", "change", "changer-canton");
        self.base.add_listener("#stat-village", "change", "changer-village");
        Ok(())
    }

    async fn handle_action(
        &mut self,
        ctx: &ViewContext,
        action: &str,
        _params: &ActionParams,
        event: &DomEvent,
    ) -> Result<(), ViewError> {
        let mut state = self.state()?;
        let value = event.value.as_deref().unwrap_or_default();

        match action {
            "changer-type" => state.niveau = Level::parse(value).unwrap_or_default(),
            "changer-critere" => state.critere = Criterion::parse(value).unwrap_or_default(),
            "changer-ordre" => state.ordre = SortOrder::parse(value).unwrap_or_default(),
            "changer-canton" => {
                state.canton_id = selected_id(Some(value));
                state.village_id = None;
            }
            "changer-village" => state.village_id = selected_id(Some(value)),
            other => return Err(ViewError::UnknownAction(other.to_string())),
        }

        self.update_state(ctx, to_state(&state)?).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cotisations_shared::models::canton::Canton;
    use cotisations_shared::ranking::Statistics;

    #[test]
    fn test_rows_keep_rank_and_statistics() {
        let entries = vec![RankingEntry::<Canton, ()> {
            entity: Canton {
                id: Some(4),
                ..Canton::new("Golfe")
            },
            children: Vec::new(),
            members: Vec::new(),
            statistics: Statistics {
                total_amount: 5000.0,
                member_count: 1,
                participation_rate: 100.0,
                ..Default::default()
            },
            rank: 1,
        }];

        let rows = rows(&entries, |c| (c.id, c.name.clone()));
        assert_eq!(
            rows,
            vec![Row {
                rank: 1,
                id: Some(4),
                name: "Golfe".to_string(),
                members: 1,
                total: 5000.0,
                participation: 100.0,
            }]
        );
    }

    #[test]
    fn test_members_link() {
        assert_eq!(members_link(Level::Villages, 3), "#cotisants?village_id=3");
        assert_eq!(members_link(Level::Quartiers, 7), "#cotisants?quartier_id=7");
    }
}
