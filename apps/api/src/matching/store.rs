//! Relational store boundary for the matching engine.
//!
//! `PgMatchStore` is the production backend. Match writes are keyed on the
//! natural (candidate, opportunity) pair so every write is an idempotent
//! upsert or point delete.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::CandidateRow;
use crate::models::matches::{MatchRecord, MatchUpsert};
use crate::models::opportunity::{
    ExternalJobRow, Opportunity, OpportunityKind, OpportunityRef, SchoolJobRow, SchoolRow,
};

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn fetch_candidate(&self, id: Uuid) -> Result<Option<CandidateRow>, AppError>;

    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>, AppError>;

    async fn fetch_opportunity(
        &self,
        reference: OpportunityRef,
    ) -> Result<Option<Opportunity>, AppError>;

    /// Opportunities of `kind` whose `ids` still exist, in any order.
    async fn fetch_opportunities(
        &self,
        kind: OpportunityKind,
        ids: &[Uuid],
    ) -> Result<Vec<Opportunity>, AppError>;

    async fn fetch_active_opportunities(
        &self,
        kind: OpportunityKind,
    ) -> Result<Vec<Opportunity>, AppError>;

    async fn fetch_candidate_matches(&self, candidate_id: Uuid)
        -> Result<Vec<MatchRecord>, AppError>;

    async fn fetch_opportunity_matches(
        &self,
        reference: OpportunityRef,
    ) -> Result<Vec<MatchRecord>, AppError>;

    /// Inserts the pair or, on key conflict, updates only score and reasons.
    async fn upsert_match(&self, upsert: &MatchUpsert) -> Result<(), AppError>;

    /// Returns whether a record was removed.
    async fn delete_match(
        &self,
        candidate_id: Uuid,
        reference: OpportunityRef,
    ) -> Result<bool, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn table_for(kind: OpportunityKind) -> &'static str {
    match kind {
        OpportunityKind::School => "schools",
        OpportunityKind::SchoolJob => "school_jobs",
        OpportunityKind::ExternalJob => "external_jobs",
    }
}

/// Runs `sql` (one `$1` bind) against the table of `kind`, wrapping rows in
/// the matching `Opportunity` variant.
async fn query_opportunities<B>(
    pool: &PgPool,
    kind: OpportunityKind,
    sql: &str,
    bind: B,
) -> Result<Vec<Opportunity>, sqlx::Error>
where
    B: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
{
    async fn rows<T, B>(pool: &PgPool, sql: &str, bind: B) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        B: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
    {
        sqlx::query_as::<_, T>(sql).bind(bind).fetch_all(pool).await
    }

    Ok(match kind {
        OpportunityKind::School => rows::<SchoolRow, B>(pool, sql, bind)
            .await?
            .into_iter()
            .map(Opportunity::School)
            .collect(),
        OpportunityKind::SchoolJob => rows::<SchoolJobRow, B>(pool, sql, bind)
            .await?
            .into_iter()
            .map(Opportunity::SchoolJob)
            .collect(),
        OpportunityKind::ExternalJob => rows::<ExternalJobRow, B>(pool, sql, bind)
            .await?
            .into_iter()
            .map(Opportunity::ExternalJob)
            .collect(),
    })
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn fetch_candidate(&self, id: Uuid) -> Result<Option<CandidateRow>, AppError> {
        Ok(
            sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>, AppError> {
        Ok(
            sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn fetch_opportunity(
        &self,
        reference: OpportunityRef,
    ) -> Result<Option<Opportunity>, AppError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", table_for(reference.kind));
        let mut found = query_opportunities(&self.pool, reference.kind, &sql, reference.id).await?;
        Ok(found.pop())
    }

    async fn fetch_opportunities(
        &self,
        kind: OpportunityKind,
        ids: &[Uuid],
    ) -> Result<Vec<Opportunity>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT * FROM {} WHERE id = ANY($1)", table_for(kind));
        Ok(query_opportunities(&self.pool, kind, &sql, ids.to_vec()).await?)
    }

    async fn fetch_active_opportunities(
        &self,
        kind: OpportunityKind,
    ) -> Result<Vec<Opportunity>, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE is_active = $1 ORDER BY created_at",
            table_for(kind)
        );
        Ok(query_opportunities(&self.pool, kind, &sql, true).await?)
    }

    async fn fetch_candidate_matches(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<MatchRecord>, AppError> {
        Ok(sqlx::query_as::<_, MatchRecord>(
            "SELECT * FROM match_records WHERE candidate_id = $1 ORDER BY score DESC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn fetch_opportunity_matches(
        &self,
        reference: OpportunityRef,
    ) -> Result<Vec<MatchRecord>, AppError> {
        Ok(sqlx::query_as::<_, MatchRecord>(
            r#"
            SELECT * FROM match_records
            WHERE opportunity_kind = $1 AND opportunity_id = $2
            ORDER BY score DESC
            "#,
        )
        .bind(reference.kind.as_str())
        .bind(reference.id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_match(&self, upsert: &MatchUpsert) -> Result<(), AppError> {
        // submitted, role_name and both timestamps belong to other workflows
        sqlx::query(
            r#"
            INSERT INTO match_records
                (candidate_id, opportunity_kind, opportunity_id, score, reasons)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (candidate_id, opportunity_kind, opportunity_id)
            DO UPDATE SET score = EXCLUDED.score, reasons = EXCLUDED.reasons
            "#,
        )
        .bind(upsert.candidate_id)
        .bind(upsert.opportunity.kind.as_str())
        .bind(upsert.opportunity.id)
        .bind(upsert.score)
        .bind(&upsert.reasons)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_match(
        &self,
        candidate_id: Uuid,
        reference: OpportunityRef,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM match_records
            WHERE candidate_id = $1 AND opportunity_kind = $2 AND opportunity_id = $3
            "#,
        )
        .bind(candidate_id)
        .bind(reference.kind.as_str())
        .bind(reference.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
