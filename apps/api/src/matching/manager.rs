//! Match Persistence Manager: keeps `match_records` consistent with the
//! profiles and opportunities it is derived from.
//!
//! A record exists exactly when the pair's current score clears `min_score`.
//! Writes are keyed on (candidate, opportunity), so every recompute is
//! idempotent and interleaved runs resolve last-write-wins per pair.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::requirements::{CandidateProfile, MatchTarget};
use crate::matching::scoring::{MatchScore, MatchScorer};
use crate::matching::store::MatchStore;
use crate::models::matches::MatchUpsert;
use crate::models::opportunity::{OpportunityKind, OpportunityRef};

/// Inclusive threshold used when no other is configured.
pub const DEFAULT_MIN_SCORE: f64 = 50.0;

/// Outcome of one recompute run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    /// Pairs scored.
    pub evaluated: usize,
    /// Pairs that cleared the threshold and were written.
    pub matched: usize,
    /// Existing records deleted.
    pub removed: usize,
    /// Pairs whose write failed and were skipped.
    pub failed: usize,
}

#[derive(Clone)]
pub struct MatchManager {
    store: Arc<dyn MatchStore>,
    scorer: Arc<dyn MatchScorer>,
}

impl MatchManager {
    pub fn new(store: Arc<dyn MatchStore>, scorer: Arc<dyn MatchScorer>) -> Self {
        Self { store, scorer }
    }

    /// Replaces the candidate's match set for `kind`: every active
    /// opportunity of that kind is scored, qualifying pairs are upserted and
    /// any other record of that kind is deleted.
    pub async fn recompute_for_candidate(
        &self,
        candidate_id: Uuid,
        kind: OpportunityKind,
        min_score: f64,
    ) -> Result<RecomputeSummary, AppError> {
        validate_min_score(min_score)?;

        let row = self
            .store
            .fetch_candidate(candidate_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id} not found")))?;
        let profile = CandidateProfile::from_row(&row);

        let opportunities = self.store.fetch_active_opportunities(kind).await?;
        let existing: HashSet<OpportunityRef> = self
            .store
            .fetch_candidate_matches(candidate_id)
            .await?
            .iter()
            .map(|record| record.opportunity())
            .filter(|reference| reference.kind == kind)
            .collect();

        let mut summary = RecomputeSummary::default();
        let mut qualifying = HashSet::with_capacity(opportunities.len());

        for opportunity in &opportunities {
            summary.evaluated += 1;
            let reference = opportunity.reference();
            let result = self.scorer.score(&profile, &opportunity.requirements());
            log_pair(candidate_id, reference, &result);

            if result.score >= min_score {
                qualifying.insert(reference);
                self.write_pair(candidate_id, reference, Some(result), &mut summary)
                    .await;
            }
        }

        for stale in existing.difference(&qualifying) {
            self.write_pair(candidate_id, *stale, None, &mut summary)
                .await;
        }

        info!(
            "Candidate {candidate_id} recomputed against {kind}: {} evaluated, {} matched, {} removed, {} failed",
            summary.evaluated, summary.matched, summary.removed, summary.failed
        );
        Ok(summary)
    }

    /// Rescores one opportunity against every candidate. Pairs at or above
    /// `min_score` are upserted, all others lose their record. An inactive
    /// opportunity qualifies no pair.
    pub async fn recompute_for_opportunity(
        &self,
        reference: OpportunityRef,
        min_score: f64,
    ) -> Result<RecomputeSummary, AppError> {
        validate_min_score(min_score)?;

        let opportunity = self
            .store
            .fetch_opportunity(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Opportunity {reference} not found")))?;
        let requirements = opportunity.requirements();
        let active = opportunity.is_active();

        let candidates = self.store.fetch_candidates().await?;
        let mut summary = RecomputeSummary::default();

        for row in &candidates {
            summary.evaluated += 1;
            let qualifying = if active {
                let result = self
                    .scorer
                    .score(&CandidateProfile::from_row(row), &requirements);
                log_pair(row.id, reference, &result);
                Some(result).filter(|r| r.score >= min_score)
            } else {
                None
            };
            self.write_pair(row.id, reference, qualifying, &mut summary)
                .await;
        }

        info!(
            "Opportunity {reference} recomputed{}: {} evaluated, {} matched, {} removed, {} failed",
            if active { "" } else { " (inactive)" },
            summary.evaluated,
            summary.matched,
            summary.removed,
            summary.failed
        );
        Ok(summary)
    }

    /// Upserts a qualifying pair or deletes a non-qualifying one. Store
    /// failures are logged and counted, never propagated.
    async fn write_pair(
        &self,
        candidate_id: Uuid,
        reference: OpportunityRef,
        qualifying: Option<MatchScore>,
        summary: &mut RecomputeSummary,
    ) {
        match qualifying {
            Some(result) => {
                let upsert = MatchUpsert {
                    candidate_id,
                    opportunity: reference,
                    score: result.score,
                    reasons: result.reasons,
                };
                match self.store.upsert_match(&upsert).await {
                    Ok(()) => summary.matched += 1,
                    Err(e) => {
                        warn!("Failed to save match {candidate_id} / {reference}: {e}");
                        summary.failed += 1;
                    }
                }
            }
            None => match self.store.delete_match(candidate_id, reference).await {
                Ok(true) => summary.removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to remove match {candidate_id} / {reference}: {e}");
                    summary.failed += 1;
                }
            },
        }
    }
}

fn validate_min_score(min_score: f64) -> Result<(), AppError> {
    if !(0.0..=100.0).contains(&min_score) {
        return Err(AppError::Validation(format!(
            "min_score must be between 0 and 100, got {min_score}"
        )));
    }
    Ok(())
}

fn log_pair(candidate_id: Uuid, reference: OpportunityRef, result: &MatchScore) {
    debug!(
        "Scored {candidate_id} / {reference}: {} (location {}, subject {}, age group {}, experience {}, language {})",
        result.score,
        result.breakdown.location,
        result.breakdown.subject,
        result.breakdown.age_group,
        result.breakdown.experience,
        result.breakdown.language
    );
}
