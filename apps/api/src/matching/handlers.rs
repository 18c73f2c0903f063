//! Axum route handlers for the Matching API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::listing::{
    build_candidate_listing, build_opportunity_listing, CandidateListing, ListingView,
    OpportunityListing, OpportunityMatchFilter,
};
use crate::matching::manager::RecomputeSummary;
use crate::matching::triggers::{MatchEvent, RecomputePlan, CANDIDATE_TRIGGER_KIND};
use crate::models::opportunity::{OpportunityKind, OpportunityRef};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CandidateRunQuery {
    pub kind: Option<String>,
    pub min_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OpportunityRunQuery {
    pub min_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OpportunityMatchesQuery {
    pub min_score: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub plan: RecomputePlan,
    pub min_score: f64,
    /// Matches resulting from the run.
    pub match_count: usize,
    pub summary: RecomputeSummary,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// `None` when the event does not affect any score.
    pub scheduled: Option<RecomputePlan>,
}

fn parse_kind(raw: &str) -> Result<OpportunityKind, AppError> {
    raw.parse::<OpportunityKind>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Administrative recompute
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/admin/matching/candidates/:id/run?kind=&min_score=
///
/// Synchronous candidate-centric recompute. `kind` defaults to school.
pub async fn handle_run_for_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    Query(params): Query<CandidateRunQuery>,
) -> Result<Json<RunResponse>, AppError> {
    let kind = match params.kind.as_deref() {
        Some(raw) => parse_kind(raw)?,
        None => CANDIDATE_TRIGGER_KIND,
    };
    let plan = RecomputePlan::Candidate { candidate_id, kind };
    run(&state, plan, params.min_score).await
}

/// POST /api/v1/admin/matching/opportunities/:kind/:id/run?min_score=
pub async fn handle_run_for_opportunity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Query(params): Query<OpportunityRunQuery>,
) -> Result<Json<RunResponse>, AppError> {
    let opportunity = OpportunityRef::new(parse_kind(&kind)?, id);
    run(&state, RecomputePlan::Opportunity { opportunity }, params.min_score).await
}

async fn run(
    state: &AppState,
    plan: RecomputePlan,
    min_score: Option<f64>,
) -> Result<Json<RunResponse>, AppError> {
    let min_score = min_score.unwrap_or(state.triggers.min_score());
    let summary = state.triggers.run_now(plan, Some(min_score)).await?;

    Ok(Json(RunResponse {
        plan,
        min_score,
        match_count: summary.matched,
        summary,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Read views
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/matching/candidates/:id/preview
///
/// Ranked matches as the candidate sees them; unpaid accounts get the
/// preview window only.
pub async fn handle_candidate_preview(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<CandidateListing>, AppError> {
    let listing = build_candidate_listing(
        state.store.as_ref(),
        candidate_id,
        ListingView::Preview,
        state.config.match_list_limit,
    )
    .await?;
    Ok(Json(listing))
}

/// GET /api/v1/admin/matching/candidates/:id/matches
///
/// Full ranked list regardless of payment tier. Administrative only.
pub async fn handle_candidate_matches(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<CandidateListing>, AppError> {
    let listing = build_candidate_listing(
        state.store.as_ref(),
        candidate_id,
        ListingView::Full,
        state.config.match_list_limit,
    )
    .await?;
    Ok(Json(listing))
}

/// GET /api/v1/matching/opportunities/:kind/:id/matches?min_score=&limit=&offset=
pub async fn handle_opportunity_matches(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Query(params): Query<OpportunityMatchesQuery>,
) -> Result<Json<OpportunityListing>, AppError> {
    let reference = OpportunityRef::new(parse_kind(&kind)?, id);
    let filter = OpportunityMatchFilter::new(params.min_score, params.limit, params.offset)?;
    let listing = build_opportunity_listing(state.store.as_ref(), reference, filter).await?;
    Ok(Json(listing))
}

// ────────────────────────────────────────────────────────────────────────────
// Event intake
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/matching/events
///
/// Accepts a profile or opportunity change and schedules any recompute it
/// requires. Always answers 202 before the work runs.
pub async fn handle_event(
    State(state): State<AppState>,
    Json(event): Json<MatchEvent>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    let scheduled = state.triggers.handle(&event);
    Ok((StatusCode::ACCEPTED, Json(EventResponse { scheduled })))
}
