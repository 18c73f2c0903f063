use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::opportunity::{OpportunityKind, OpportunityRef};

/// Derived match between a candidate and an opportunity. A cache of the
/// scoring function: it exists only while the pair clears the threshold.
///
/// `submitted` and `role_name` belong to the application workflow and are
/// never written by recomputation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchRecord {
    pub id: Uuid,
    pub candidate_id: Uuid,
    #[sqlx(try_from = "String")]
    pub opportunity_kind: OpportunityKind,
    pub opportunity_id: Uuid,
    pub score: f64,
    pub reasons: Vec<String>,
    pub submitted: bool,
    pub role_name: Option<String>,
    pub matched_at: DateTime<Utc>,
    pub status_updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn opportunity(&self) -> OpportunityRef {
        OpportunityRef::new(self.opportunity_kind, self.opportunity_id)
    }
}

/// Score-owned columns written by a recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchUpsert {
    pub candidate_id: Uuid,
    pub opportunity: OpportunityRef,
    pub score: f64,
    pub reasons: Vec<String>,
}
