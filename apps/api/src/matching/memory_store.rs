//! In-memory `MatchStore` with the same key semantics as the Postgres
//! backend, plus write-failure injection. Test-only.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::store::MatchStore;
use crate::models::candidate::CandidateRow;
use crate::models::matches::{MatchRecord, MatchUpsert};
use crate::models::opportunity::{Opportunity, OpportunityKind, OpportunityRef};

type PairKey = (Uuid, OpportunityRef);

#[derive(Default)]
pub struct MemoryMatchStore {
    candidates: Mutex<Vec<CandidateRow>>,
    opportunities: Mutex<Vec<Opportunity>>,
    matches: Mutex<HashMap<PairKey, MatchRecord>>,
    failing_pairs: Mutex<HashSet<PairKey>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_candidate(&self, row: CandidateRow) {
        let mut candidates = self.candidates.lock().unwrap();
        candidates.retain(|c| c.id != row.id);
        candidates.push(row);
    }

    pub fn put_opportunity(&self, opportunity: Opportunity) -> OpportunityRef {
        let reference = opportunity.reference();
        let mut opportunities = self.opportunities.lock().unwrap();
        opportunities.retain(|o| o.reference() != reference);
        opportunities.push(opportunity);
        reference
    }

    pub fn remove_opportunity(&self, reference: OpportunityRef) {
        self.opportunities
            .lock()
            .unwrap()
            .retain(|o| o.reference() != reference);
    }

    /// Stores a record directly, bypassing scoring.
    pub fn put_match(&self, record: MatchRecord) {
        self.matches
            .lock()
            .unwrap()
            .insert((record.candidate_id, record.opportunity()), record);
    }

    pub fn get_match(&self, candidate_id: Uuid, reference: OpportunityRef) -> Option<MatchRecord> {
        self.matches
            .lock()
            .unwrap()
            .get(&(candidate_id, reference))
            .cloned()
    }

    /// All records, ordered by key so snapshots compare equal.
    pub fn snapshot(&self) -> Vec<(Uuid, OpportunityRef, f64, Vec<String>, bool)> {
        let mut rows: Vec<_> = self
            .matches
            .lock()
            .unwrap()
            .values()
            .map(|m| {
                (
                    m.candidate_id,
                    m.opportunity(),
                    m.score,
                    m.reasons.clone(),
                    m.submitted,
                )
            })
            .collect();
        rows.sort_by_key(|(c, o, ..)| (*c, o.kind.as_str(), o.id));
        rows
    }

    /// Marks the pair as submitted the way the application workflow does.
    pub fn mark_submitted(&self, candidate_id: Uuid, reference: OpportunityRef, role: &str) {
        if let Some(record) = self.matches.lock().unwrap().get_mut(&(candidate_id, reference)) {
            record.submitted = true;
            record.role_name = Some(role.to_string());
            record.status_updated_at = Utc::now();
        }
    }

    /// Every subsequent upsert/delete for the pair fails.
    pub fn fail_writes_for(&self, candidate_id: Uuid, reference: OpportunityRef) {
        self.failing_pairs
            .lock()
            .unwrap()
            .insert((candidate_id, reference));
    }

    fn check_writable(&self, key: &PairKey) -> Result<(), AppError> {
        if self.failing_pairs.lock().unwrap().contains(key) {
            return Err(AppError::Internal(anyhow!(
                "injected write failure for {} / {}",
                key.0,
                key.1
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn fetch_candidate(&self, id: Uuid) -> Result<Option<CandidateRow>, AppError> {
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>, AppError> {
        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn fetch_opportunity(
        &self,
        reference: OpportunityRef,
    ) -> Result<Option<Opportunity>, AppError> {
        Ok(self
            .opportunities
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.reference() == reference)
            .cloned())
    }

    async fn fetch_opportunities(
        &self,
        kind: OpportunityKind,
        ids: &[Uuid],
    ) -> Result<Vec<Opportunity>, AppError> {
        Ok(self
            .opportunities
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.kind() == kind && ids.contains(&o.id()))
            .cloned()
            .collect())
    }

    async fn fetch_active_opportunities(
        &self,
        kind: OpportunityKind,
    ) -> Result<Vec<Opportunity>, AppError> {
        Ok(self
            .opportunities
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.kind() == kind && o.is_active())
            .cloned()
            .collect())
    }

    async fn fetch_candidate_matches(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<MatchRecord>, AppError> {
        Ok(self
            .matches
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    async fn fetch_opportunity_matches(
        &self,
        reference: OpportunityRef,
    ) -> Result<Vec<MatchRecord>, AppError> {
        Ok(self
            .matches
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.opportunity() == reference)
            .cloned()
            .collect())
    }

    async fn upsert_match(&self, upsert: &MatchUpsert) -> Result<(), AppError> {
        let key = (upsert.candidate_id, upsert.opportunity);
        self.check_writable(&key)?;

        let mut matches = self.matches.lock().unwrap();
        match matches.get_mut(&key) {
            Some(existing) => {
                existing.score = upsert.score;
                existing.reasons = upsert.reasons.clone();
            }
            None => {
                let now = Utc::now();
                matches.insert(
                    key,
                    MatchRecord {
                        id: Uuid::new_v4(),
                        candidate_id: upsert.candidate_id,
                        opportunity_kind: upsert.opportunity.kind,
                        opportunity_id: upsert.opportunity.id,
                        score: upsert.score,
                        reasons: upsert.reasons.clone(),
                        submitted: false,
                        role_name: None,
                        matched_at: now,
                        status_updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete_match(
        &self,
        candidate_id: Uuid,
        reference: OpportunityRef,
    ) -> Result<bool, AppError> {
        let key = (candidate_id, reference);
        self.check_writable(&key)?;
        Ok(self.matches.lock().unwrap().remove(&key).is_some())
    }
}

/// Row builders shared by the matching tests.
pub mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::candidate::CandidateRow;
    use crate::models::matches::MatchRecord;
    use crate::models::opportunity::{
        ExternalJobRow, OpportunityRef, SchoolJobRow, SchoolRow,
    };

    pub fn candidate(has_paid: bool) -> CandidateRow {
        CandidateRow {
            id: Uuid::new_v4(),
            has_paid,
            preferred_location: None,
            subject_specialty: None,
            preferred_age_group: None,
            years_experience: None,
            language_qualified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Candidate preferring `city`, teaching math to primary, 3 years.
    pub fn candidate_in(city: &str, has_paid: bool) -> CandidateRow {
        CandidateRow {
            preferred_location: Some(city.to_string()),
            subject_specialty: Some("Math".to_string()),
            preferred_age_group: Some("Primary".to_string()),
            years_experience: Some("3 years".to_string()),
            ..candidate(has_paid)
        }
    }

    /// Active school in `city` wanting math, primary, 2-4 years.
    pub fn school(city: &str) -> SchoolRow {
        SchoolRow {
            id: Uuid::new_v4(),
            name: format!("{city} Bilingual Academy"),
            school_type: Some("international".to_string()),
            city: Some(city.to_string()),
            province: Some(format!("{city} Province")),
            subjects_needed: vec!["Math".to_string()],
            age_groups: vec!["Primary".to_string()],
            experience_required: Some("2-4 years".to_string()),
            language_required: false,
            salary_range: Some("15k-20k RMB".to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn school_job(city: &str) -> SchoolJobRow {
        SchoolJobRow {
            id: Uuid::new_v4(),
            school_account_id: Uuid::new_v4(),
            title: format!("Homeroom teacher at {city} Elite School"),
            role_type: Some("homeroom".to_string()),
            city: Some(city.to_string()),
            province: Some(format!("{city} Province")),
            subjects: vec!["Math".to_string()],
            age_groups: vec!["Primary".to_string()],
            experience_required: Some("2-4 years".to_string()),
            language_required: false,
            salary_display: Some("18k RMB".to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn external_job(city: &str) -> ExternalJobRow {
        ExternalJobRow {
            id: Uuid::new_v4(),
            source: "jobboard".to_string(),
            external_id: "ext-1001".to_string(),
            external_url: "https://jobs.example.com/ext-1001".to_string(),
            title: "ESL Teacher".to_string(),
            company: Some("Bright Minds Training".to_string()),
            city: Some(city.to_string()),
            province: Some(format!("{city} Province")),
            subjects: Some("Math, ESL".to_string()),
            age_groups: Some("Primary".to_string()),
            experience: Some("1-3 years".to_string()),
            language_required: false,
            salary: Some("20k RMB".to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn match_record(candidate_id: Uuid, reference: OpportunityRef, score: f64) -> MatchRecord {
        MatchRecord {
            id: Uuid::new_v4(),
            candidate_id,
            opportunity_kind: reference.kind,
            opportunity_id: reference.id,
            score,
            reasons: vec![],
            submitted: false,
            role_name: None,
            matched_at: Utc::now(),
            status_updated_at: Utc::now(),
        }
    }
}
