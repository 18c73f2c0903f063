use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A candidate profile as stored. Preference columns are free-form text that
/// older signup flows wrote as comma lists, array literals or JSON arrays;
/// `matching::normalize` reconciles them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub has_paid: bool,
    pub preferred_location: Option<String>,
    pub subject_specialty: Option<String>,
    pub preferred_age_group: Option<String>,
    pub years_experience: Option<String>,
    pub language_qualified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateRow {
    pub fn tier(&self) -> PaymentTier {
        if self.has_paid {
            PaymentTier::Paid
        } else {
            PaymentTier::Unpaid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTier {
    Paid,
    Unpaid,
}

/// Candidate columns an edit event can report as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateField {
    Locations,
    Subjects,
    AgeGroups,
    Experience,
    LanguageQualification,
    PaymentTier,
    #[serde(other)]
    Other,
}
