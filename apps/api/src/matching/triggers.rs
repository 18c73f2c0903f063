//! Trigger Policy: decides which recompute an event calls for and hands it to
//! a deferred executor so the originating request never waits on it.
//!
//! | Event                                   | Recompute                          |
//! |-----------------------------------------|------------------------------------|
//! | candidate created                       | candidate-centric, school kind     |
//! | candidate edited (matching fields)      | candidate-centric, school kind     |
//! | school created                          | opportunity-centric                |
//! | any opportunity edited (matching fields)| opportunity-centric                |
//!
//! Administrator requests bypass the executor through [`MatchTriggers::run_now`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::manager::{MatchManager, RecomputeSummary};
use crate::matching::requirements::{CandidateProfile, MatchTarget};
use crate::models::candidate::{CandidateField, CandidateRow};
use crate::models::opportunity::{
    Opportunity, OpportunityField, OpportunityKind, OpportunityRef,
};

/// Kind a candidate is rescored against when their profile changes.
pub const CANDIDATE_TRIGGER_KIND: OpportunityKind = OpportunityKind::School;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    CandidateCreated {
        candidate_id: Uuid,
    },
    CandidateUpdated {
        candidate_id: Uuid,
        changed: Vec<CandidateField>,
    },
    OpportunityCreated {
        opportunity: OpportunityRef,
    },
    OpportunityUpdated {
        opportunity: OpportunityRef,
        changed: Vec<OpportunityField>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RecomputePlan {
    Candidate {
        candidate_id: Uuid,
        kind: OpportunityKind,
    },
    Opportunity {
        opportunity: OpportunityRef,
    },
}

impl fmt::Display for RecomputePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecomputePlan::Candidate { candidate_id, kind } => {
                write!(f, "candidate recompute {candidate_id} against {kind}")
            }
            RecomputePlan::Opportunity { opportunity } => {
                write!(f, "opportunity recompute {opportunity}")
            }
        }
    }
}

fn affects_matching_candidate(field: &CandidateField) -> bool {
    matches!(
        field,
        CandidateField::Locations
            | CandidateField::Subjects
            | CandidateField::AgeGroups
            | CandidateField::Experience
            | CandidateField::LanguageQualification
    )
}

fn affects_matching_opportunity(field: &OpportunityField) -> bool {
    !matches!(field, OpportunityField::Other)
}

/// Maps an event to the recompute it requires, if any.
pub fn plan_recompute(event: &MatchEvent) -> Option<RecomputePlan> {
    match event {
        MatchEvent::CandidateCreated { candidate_id } => Some(RecomputePlan::Candidate {
            candidate_id: *candidate_id,
            kind: CANDIDATE_TRIGGER_KIND,
        }),
        MatchEvent::CandidateUpdated {
            candidate_id,
            changed,
        } => changed
            .iter()
            .any(affects_matching_candidate)
            .then_some(RecomputePlan::Candidate {
                candidate_id: *candidate_id,
                kind: CANDIDATE_TRIGGER_KIND,
            }),
        MatchEvent::OpportunityCreated { opportunity } => (opportunity.kind
            == OpportunityKind::School)
            .then_some(RecomputePlan::Opportunity {
                opportunity: *opportunity,
            }),
        MatchEvent::OpportunityUpdated {
            opportunity,
            changed,
        } => changed
            .iter()
            .any(affects_matching_opportunity)
            .then_some(RecomputePlan::Opportunity {
                opportunity: *opportunity,
            }),
    }
}

/// Candidate fields whose normalized value differs between two snapshots.
pub fn changed_candidate_fields(before: &CandidateRow, after: &CandidateRow) -> Vec<CandidateField> {
    let (a, b) = (CandidateProfile::from_row(before), CandidateProfile::from_row(after));
    let mut changed = Vec::new();
    if a.locations != b.locations {
        changed.push(CandidateField::Locations);
    }
    if a.subjects != b.subjects {
        changed.push(CandidateField::Subjects);
    }
    if a.age_groups != b.age_groups {
        changed.push(CandidateField::AgeGroups);
    }
    if a.years_experience != b.years_experience {
        changed.push(CandidateField::Experience);
    }
    if a.language_qualified != b.language_qualified {
        changed.push(CandidateField::LanguageQualification);
    }
    if before.has_paid != after.has_paid {
        changed.push(CandidateField::PaymentTier);
    }
    changed
}

/// Opportunity fields whose normalized value differs between two snapshots.
pub fn changed_opportunity_fields(before: &Opportunity, after: &Opportunity) -> Vec<OpportunityField> {
    let (a, b) = (before.requirements(), after.requirements());
    let mut changed = Vec::new();
    if !a.city.eq_ignore_ascii_case(&b.city) {
        changed.push(OpportunityField::City);
    }
    if !a.province.eq_ignore_ascii_case(&b.province) {
        changed.push(OpportunityField::Province);
    }
    if a.subjects != b.subjects {
        changed.push(OpportunityField::Subjects);
    }
    if a.age_groups != b.age_groups {
        changed.push(OpportunityField::AgeGroups);
    }
    if a.experience != b.experience {
        changed.push(OpportunityField::ExperienceRequirement);
    }
    if a.language_required != b.language_required {
        changed.push(OpportunityField::LanguageRequirement);
    }
    if before.is_active() != after.is_active() {
        changed.push(OpportunityField::Active);
    }
    changed
}

// ────────────────────────────────────────────────────────────────────────────
// Deferred execution
// ────────────────────────────────────────────────────────────────────────────

pub type DeferredWork = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Runs work after the caller has returned. Failures end at the executor.
pub trait DeferredExecutor: Send + Sync {
    fn submit(&self, label: String, work: DeferredWork);
}

/// Detached tokio task per submission; outlives the request that spawned it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl DeferredExecutor for TokioExecutor {
    fn submit(&self, label: String, work: DeferredWork) {
        tokio::spawn(async move {
            match work.await {
                Ok(()) => debug!("Deferred {label} finished"),
                Err(e) => error!("Deferred {label} failed: {e:#}"),
            }
        });
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MatchTriggers {
    manager: MatchManager,
    executor: Arc<dyn DeferredExecutor>,
    min_score: f64,
}

impl MatchTriggers {
    pub fn new(manager: MatchManager, executor: Arc<dyn DeferredExecutor>, min_score: f64) -> Self {
        Self {
            manager,
            executor,
            min_score,
        }
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Schedules the recompute `event` calls for and returns it without
    /// waiting.
    pub fn handle(&self, event: &MatchEvent) -> Option<RecomputePlan> {
        let Some(plan) = plan_recompute(event) else {
            debug!("No recompute needed for {event:?}");
            return None;
        };

        let manager = self.manager.clone();
        let min_score = self.min_score;
        let label = plan.to_string();
        info!("Scheduling {label}");
        self.executor.submit(
            label,
            Box::pin(async move {
                execute(&manager, plan, min_score).await?;
                Ok::<_, anyhow::Error>(())
            }),
        );
        Some(plan)
    }

    /// Runs `plan` inline and returns its outcome.
    pub async fn run_now(
        &self,
        plan: RecomputePlan,
        min_score: Option<f64>,
    ) -> Result<RecomputeSummary, AppError> {
        execute(&self.manager, plan, min_score.unwrap_or(self.min_score)).await
    }
}

async fn execute(
    manager: &MatchManager,
    plan: RecomputePlan,
    min_score: f64,
) -> Result<RecomputeSummary, AppError> {
    match plan {
        RecomputePlan::Candidate { candidate_id, kind } => {
            manager
                .recompute_for_candidate(candidate_id, kind, min_score)
                .await
        }
        RecomputePlan::Opportunity { opportunity } => {
            manager.recompute_for_opportunity(opportunity, min_score).await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::matching::manager::DEFAULT_MIN_SCORE;
    use crate::matching::memory_store::{fixtures, MemoryMatchStore};
    use crate::matching::scoring::WeightedMatchScorer;

    /// Holds submitted work until the test drains it.
    #[derive(Default)]
    struct RecordingExecutor {
        queued: Mutex<Vec<(String, DeferredWork)>>,
    }

    impl RecordingExecutor {
        async fn drain(&self) -> Vec<(String, anyhow::Result<()>)> {
            let queued: Vec<_> = self.queued.lock().unwrap().drain(..).collect();
            let mut results = Vec::new();
            for (label, work) in queued {
                results.push((label, work.await));
            }
            results
        }
    }

    impl DeferredExecutor for RecordingExecutor {
        fn submit(&self, label: String, work: DeferredWork) {
            self.queued.lock().unwrap().push((label, work));
        }
    }

    fn setup() -> (Arc<MemoryMatchStore>, Arc<RecordingExecutor>, MatchTriggers) {
        let store = Arc::new(MemoryMatchStore::new());
        let executor = Arc::new(RecordingExecutor::default());
        let manager = MatchManager::new(store.clone(), Arc::new(WeightedMatchScorer::default()));
        let triggers = MatchTriggers::new(manager, executor.clone(), DEFAULT_MIN_SCORE);
        (store, executor, triggers)
    }

    #[test]
    fn test_policy_table() {
        let candidate_id = Uuid::new_v4();
        let school = OpportunityRef::new(OpportunityKind::School, Uuid::new_v4());
        let external = OpportunityRef::new(OpportunityKind::ExternalJob, Uuid::new_v4());
        let candidate_plan = Some(RecomputePlan::Candidate {
            candidate_id,
            kind: OpportunityKind::School,
        });

        assert_eq!(
            plan_recompute(&MatchEvent::CandidateCreated { candidate_id }),
            candidate_plan
        );
        assert_eq!(
            plan_recompute(&MatchEvent::CandidateUpdated {
                candidate_id,
                changed: vec![CandidateField::Other, CandidateField::Experience],
            }),
            candidate_plan
        );
        assert_eq!(
            plan_recompute(&MatchEvent::OpportunityCreated { opportunity: school }),
            Some(RecomputePlan::Opportunity { opportunity: school })
        );
        assert_eq!(
            plan_recompute(&MatchEvent::OpportunityUpdated {
                opportunity: external,
                changed: vec![OpportunityField::Province],
            }),
            Some(RecomputePlan::Opportunity {
                opportunity: external
            })
        );
    }

    #[test]
    fn test_irrelevant_events_schedule_nothing() {
        let candidate_id = Uuid::new_v4();
        assert_eq!(
            plan_recompute(&MatchEvent::CandidateUpdated {
                candidate_id,
                changed: vec![CandidateField::PaymentTier, CandidateField::Other],
            }),
            None
        );
        assert_eq!(
            plan_recompute(&MatchEvent::OpportunityUpdated {
                opportunity: OpportunityRef::new(OpportunityKind::School, Uuid::new_v4()),
                changed: vec![OpportunityField::Other],
            }),
            None
        );
        assert_eq!(
            plan_recompute(&MatchEvent::OpportunityCreated {
                opportunity: OpportunityRef::new(OpportunityKind::ExternalJob, Uuid::new_v4()),
            }),
            None
        );
    }

    #[test]
    fn test_event_json_shape() {
        let id = Uuid::new_v4();
        let event: MatchEvent = serde_json::from_str(&format!(
            r#"{{"event":"opportunity_updated","opportunity":{{"kind":"school_job","id":"{id}"}},"changed":["subjects","benefits"]}}"#
        ))
        .unwrap();
        assert_eq!(
            event,
            MatchEvent::OpportunityUpdated {
                opportunity: OpportunityRef::new(OpportunityKind::SchoolJob, id),
                changed: vec![OpportunityField::Subjects, OpportunityField::Other],
            }
        );
    }

    #[test]
    fn test_changed_candidate_fields_compare_normalized_values() {
        let before = fixtures::candidate_in("Beijing", false);
        let mut after = before.clone();
        after.preferred_location = Some(" beijing ".to_string());
        assert!(changed_candidate_fields(&before, &after).is_empty());

        after.years_experience = Some("6 years".to_string());
        after.has_paid = true;
        assert_eq!(
            changed_candidate_fields(&before, &after),
            vec![CandidateField::Experience, CandidateField::PaymentTier]
        );
    }

    #[test]
    fn test_changed_opportunity_fields() {
        let row = fixtures::school("Beijing");
        let mut edited = row.clone();
        edited.salary_range = Some("30k RMB".to_string());
        let before = Opportunity::School(row);
        assert!(changed_opportunity_fields(&before, &Opportunity::School(edited.clone())).is_empty());

        edited.subjects_needed.push("Science".to_string());
        edited.is_active = false;
        assert_eq!(
            changed_opportunity_fields(&before, &Opportunity::School(edited)),
            vec![OpportunityField::Subjects, OpportunityField::Active]
        );
    }

    #[tokio::test]
    async fn test_handle_defers_until_executor_runs() {
        let (store, executor, triggers) = setup();
        let candidate = fixtures::candidate_in("Beijing", true);
        store.put_candidate(candidate.clone());
        let school = store.put_opportunity(Opportunity::School(fixtures::school("Beijing")));

        let plan = triggers.handle(&MatchEvent::CandidateCreated {
            candidate_id: candidate.id,
        });
        assert!(plan.is_some());
        assert!(store.snapshot().is_empty());

        let results = executor.drain().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
        assert!(store.get_match(candidate.id, school).is_some());
    }

    #[tokio::test]
    async fn test_deferred_failure_stays_inside_the_work() {
        let (_store, executor, triggers) = setup();

        let plan = triggers.handle(&MatchEvent::CandidateCreated {
            candidate_id: Uuid::new_v4(),
        });
        assert!(plan.is_some());

        let results = executor.drain().await;
        assert!(results[0].1.is_err());
        assert!(results[0].0.starts_with("candidate recompute"));
    }

    #[tokio::test]
    async fn test_tokio_executor_swallows_failures() {
        let executor = TokioExecutor;

        let (failed_tx, failed_rx) = tokio::sync::oneshot::channel();
        executor.submit(
            "always fails".to_string(),
            Box::pin(async move {
                let _ = failed_tx.send(());
                Err::<(), _>(anyhow::anyhow!("store unavailable"))
            }),
        );
        failed_rx.await.unwrap();

        // The failure stayed inside its task; later work still runs.
        let (ok_tx, ok_rx) = tokio::sync::oneshot::channel();
        executor.submit(
            "succeeds".to_string(),
            Box::pin(async move {
                let _ = ok_tx.send(42);
                Ok::<_, anyhow::Error>(())
            }),
        );
        assert_eq!(ok_rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_failed_deferred_recompute_does_not_reach_caller() {
        let store = Arc::new(MemoryMatchStore::new());
        let manager = MatchManager::new(store.clone(), Arc::new(WeightedMatchScorer::default()));
        let triggers = MatchTriggers::new(manager, Arc::new(TokioExecutor), DEFAULT_MIN_SCORE);

        // Unknown candidate: the spawned run fails with NotFound.
        let event = MatchEvent::CandidateCreated {
            candidate_id: Uuid::new_v4(),
        };
        let scheduled = triggers.handle(&event);
        assert!(matches!(scheduled, Some(RecomputePlan::Candidate { .. })));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_run_now_returns_summary() {
        let (store, executor, triggers) = setup();
        store.put_candidate(fixtures::candidate_in("Beijing", true));
        let school = store.put_opportunity(Opportunity::School(fixtures::school("Beijing")));

        let summary = triggers
            .run_now(RecomputePlan::Opportunity { opportunity: school }, None)
            .await
            .unwrap();

        assert_eq!(summary.matched, 1);
        assert!(executor.drain().await.is_empty());
    }
}
