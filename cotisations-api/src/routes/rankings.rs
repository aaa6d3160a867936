/// Leaderboard endpoints
///
/// # Endpoints
///
/// - `GET /v1/rankings/cantons` - Every canton
/// - `GET /v1/rankings/cantons/:id/villages` - Villages of one canton
/// - `GET /v1/rankings/villages/:id/quartiers` - Quarters of one village
///
/// # Query Parameters
///
/// - `critere`: `montant_cotise` (default), `taux_participation` or
///   `nombre_cotisants`
/// - `ordre`: `desc` (default) or `asc`
///
/// Entries without members are listed with zero statistics. Ranks are
/// 1-based and follow the sorted order; ties keep their stored order.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use cotisations_shared::models::{canton::Canton, quarter::Quarter, village::Village};
use cotisations_shared::ranking::{AmountSource, Criterion, RankingEntry, SortOrder};
use cotisations_shared::store::Record;
use serde::{Deserialize, Serialize};

/// Ranking query string
#[derive(Debug, Default, Deserialize)]
pub struct RankingQuery {
    pub critere: Option<String>,
    pub ordre: Option<String>,
}

impl RankingQuery {
    /// Parses the criterion and order, applying the defaults
    pub fn parse(&self) -> ApiResult<(Criterion, SortOrder)> {
        let criterion = match self.critere.as_deref() {
            None | Some("") => Criterion::default(),
            Some(raw) => Criterion::parse(raw)
                .ok_or_else(|| ApiError::invalid("critere", format!("Unknown criterion: {}", raw)))?,
        };
        let order = match self.ordre.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| ApiError::invalid("ordre", format!("Unknown order: {}", raw)))?,
        };
        Ok((criterion, order))
    }
}

/// Leaderboard response
#[derive(Debug, Serialize)]
pub struct RankingResponse<E, C> {
    pub critere: Criterion,
    pub ordre: SortOrder,

    /// Where totals come from
    pub source_montants: AmountSource,

    pub classement: Vec<RankingEntry<E, C>>,
}

async fn ensure_exists<R: Record>(state: &AppState, id: i64) -> ApiResult<()> {
    match state.store.get_by_id::<R>(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("No record {} in {}", id, R::COLLECTION))),
    }
}

/// Rank every canton
pub async fn rank_cantons(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<RankingResponse<Canton, Village>>> {
    let (criterion, order) = query.parse()?;
    let classement = state.ranking.rank_cantons(criterion, order).await?;

    Ok(Json(RankingResponse {
        critere: criterion,
        ordre: order,
        source_montants: state.ranking.amount_source(),
        classement,
    }))
}

/// Rank the villages of a canton
///
/// # Errors
///
/// - `404 Not Found`: Unknown canton
/// - `422 Unprocessable Entity`: Unknown criterion or order
pub async fn rank_villages(
    State(state): State<AppState>,
    Path(canton_id): Path<i64>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<RankingResponse<Village, Quarter>>> {
    let (criterion, order) = query.parse()?;
    ensure_exists::<Canton>(&state, canton_id).await?;
    let classement = state.ranking.rank_villages(canton_id, criterion, order).await?;

    Ok(Json(RankingResponse {
        critere: criterion,
        ordre: order,
        source_montants: state.ranking.amount_source(),
        classement,
    }))
}

/// Rank the quarters of a village
pub async fn rank_quarters(
    State(state): State<AppState>,
    Path(village_id): Path<i64>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<RankingResponse<Quarter, ()>>> {
    let (criterion, order) = query.parse()?;
    ensure_exists::<Village>(&state, village_id).await?;
    let classement = state.ranking.rank_quarters(village_id, criterion, order).await?;

    Ok(Json(RankingResponse {
        critere: criterion,
        ordre: order,
        source_montants: state.ranking.amount_source(),
        classement,
    }))
}
