//! Aggregator / Access Gate: one ranked view of a candidate's matches across
//! every opportunity kind, gated by payment tier.
//!
//! Internal-school and school-job entries never carry a name, title or any
//! other identity; external listings are public and expose where to apply.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::store::MatchStore;
use crate::models::candidate::PaymentTier;
use crate::models::matches::MatchRecord;
use crate::models::opportunity::{Opportunity, OpportunityKind, OpportunityRef};

/// Entries an unpaid candidate sees.
pub const PREVIEW_WINDOW: usize = 3;

/// Full lists are capped at this length unless configured otherwise.
pub const DEFAULT_FULL_LIST_LIMIT: usize = 20;

/// Page size of an opportunity's match list when none is requested.
pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingView {
    /// What the candidate sees: truncated for the unpaid tier.
    Preview,
    /// Administrative full list: untruncated by tier, capped by limit.
    Full,
}

/// Display snapshot of the matched opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListingDetails {
    School {
        city: Option<String>,
        province: Option<String>,
        school_type: Option<String>,
        salary: Option<String>,
        age_groups: Vec<String>,
    },
    SchoolJob {
        city: Option<String>,
        province: Option<String>,
        role_type: Option<String>,
        salary: Option<String>,
        age_groups: Vec<String>,
    },
    ExternalJob {
        title: String,
        company: Option<String>,
        external_url: String,
        source: String,
        city: Option<String>,
        province: Option<String>,
        salary: Option<String>,
    },
}

impl ListingDetails {
    pub fn from_opportunity(opportunity: &Opportunity) -> Self {
        match opportunity {
            Opportunity::School(row) => ListingDetails::School {
                city: row.city.clone(),
                province: row.province.clone(),
                school_type: row.school_type.clone(),
                salary: row.salary_range.clone(),
                age_groups: row.age_groups.clone(),
            },
            Opportunity::SchoolJob(row) => ListingDetails::SchoolJob {
                city: row.city.clone(),
                province: row.province.clone(),
                role_type: row.role_type.clone(),
                salary: row.salary_display.clone(),
                age_groups: row.age_groups.clone(),
            },
            Opportunity::ExternalJob(row) => ListingDetails::ExternalJob {
                title: row.title.clone(),
                company: row.company.clone(),
                external_url: row.external_url.clone(),
                source: row.source.clone(),
                city: row.city.clone(),
                province: row.province.clone(),
                salary: row.salary.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchEntry {
    /// Match record id. Opportunity ids are withheld.
    pub match_id: Uuid,
    pub score: f64,
    pub reasons: Vec<String>,
    pub submitted: bool,
    pub role_name: Option<String>,
    pub matched_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: ListingDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateListing {
    pub candidate_id: Uuid,
    pub tier: PaymentTier,
    /// Matches available before any truncation.
    pub total_matches: usize,
    pub truncated: bool,
    pub matches: Vec<MatchEntry>,
}

/// One row of an opportunity's match list.
#[derive(Debug, Clone, Serialize)]
pub struct OpportunityMatch {
    pub candidate_id: Uuid,
    pub score: f64,
    pub reasons: Vec<String>,
    pub submitted: bool,
    pub role_name: Option<String>,
    pub matched_at: DateTime<Utc>,
}

/// Score floor and page window applied to an opportunity's match list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpportunityMatchFilter {
    pub min_score: Option<f64>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for OpportunityMatchFilter {
    fn default() -> Self {
        Self {
            min_score: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl OpportunityMatchFilter {
    /// `min_score` in [0, 100], `limit` in 1..=100, `offset` non-negative.
    pub fn new(
        min_score: Option<f64>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Self, AppError> {
        if let Some(score) = min_score {
            if !(0.0..=100.0).contains(&score) {
                return Err(AppError::Validation(format!(
                    "min_score must be between 0 and 100, got {score}"
                )));
            }
        }

        let limit = match limit {
            None => DEFAULT_PAGE_LIMIT,
            Some(n) if (1..=MAX_PAGE_LIMIT as i64).contains(&n) => n as usize,
            Some(n) => {
                return Err(AppError::Validation(format!(
                    "limit must be between 1 and {MAX_PAGE_LIMIT}, got {n}"
                )))
            }
        };

        let offset = match offset {
            None => 0,
            Some(n) if n >= 0 => n as usize,
            Some(n) => {
                return Err(AppError::Validation(format!(
                    "offset must not be negative, got {n}"
                )))
            }
        };

        Ok(Self {
            min_score,
            limit,
            offset,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityListing {
    pub opportunity: OpportunityRef,
    pub active: bool,
    /// Matches at or above the score floor, before paging.
    pub total_matches: usize,
    pub matches: Vec<OpportunityMatch>,
}

pub async fn build_candidate_listing(
    store: &dyn MatchStore,
    candidate_id: Uuid,
    view: ListingView,
    full_list_limit: usize,
) -> Result<CandidateListing, AppError> {
    let candidate = store
        .fetch_candidate(candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id} not found")))?;
    let tier = candidate.tier();

    let mut records = store.fetch_candidate_matches(candidate_id).await?;
    records.sort_by(rank);

    let snapshots = load_snapshots(store, &records).await?;
    let entries: Vec<MatchEntry> = records
        .into_iter()
        .filter_map(|record| {
            let opportunity = snapshots.get(&record.opportunity())?;
            Some(MatchEntry {
                match_id: record.id,
                score: record.score,
                reasons: record.reasons,
                submitted: record.submitted,
                role_name: record.role_name,
                matched_at: record.matched_at,
                details: ListingDetails::from_opportunity(opportunity),
            })
        })
        .collect();

    let total_matches = entries.len();
    let limit = match (view, tier) {
        (ListingView::Preview, PaymentTier::Unpaid) => PREVIEW_WINDOW,
        (ListingView::Preview, PaymentTier::Paid) => total_matches,
        (ListingView::Full, _) => full_list_limit,
    };
    let matches: Vec<MatchEntry> = entries.into_iter().take(limit).collect();

    Ok(CandidateListing {
        candidate_id,
        tier,
        total_matches,
        truncated: matches.len() < total_matches,
        matches,
    })
}

pub async fn build_opportunity_listing(
    store: &dyn MatchStore,
    reference: OpportunityRef,
    filter: OpportunityMatchFilter,
) -> Result<OpportunityListing, AppError> {
    let opportunity = store
        .fetch_opportunity(reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Opportunity {reference} not found")))?;

    let mut records = store.fetch_opportunity_matches(reference).await?;
    if let Some(floor) = filter.min_score {
        records.retain(|record| record.score >= floor);
    }
    records.sort_by(rank);

    Ok(OpportunityListing {
        opportunity: reference,
        active: opportunity.is_active(),
        total_matches: records.len(),
        matches: records
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .map(|record| OpportunityMatch {
                candidate_id: record.candidate_id,
                score: record.score,
                reasons: record.reasons,
                submitted: record.submitted,
                role_name: record.role_name,
                matched_at: record.matched_at,
            })
            .collect(),
    })
}

/// Score descending, then newest first.
fn rank(a: &MatchRecord, b: &MatchRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.matched_at.cmp(&a.matched_at))
}

/// One batched fetch per kind present in `records`.
async fn load_snapshots(
    store: &dyn MatchStore,
    records: &[MatchRecord],
) -> Result<HashMap<OpportunityRef, Opportunity>, AppError> {
    let mut snapshots = HashMap::new();
    for kind in OpportunityKind::ALL {
        let ids: Vec<Uuid> = records
            .iter()
            .filter(|r| r.opportunity_kind == kind)
            .map(|r| r.opportunity_id)
            .collect();
        if ids.is_empty() {
            continue;
        }
        for opportunity in store.fetch_opportunities(kind, &ids).await? {
            snapshots.insert(opportunity.reference(), opportunity);
        }
    }
    Ok(snapshots)
}
