use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// The three kinds of matchable opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Internal school posting managed by the placement team.
    School,
    /// Posting managed by a school account.
    SchoolJob,
    /// Listing aggregated from a public job board.
    ExternalJob,
}

impl OpportunityKind {
    pub const ALL: [OpportunityKind; 3] = [
        OpportunityKind::School,
        OpportunityKind::SchoolJob,
        OpportunityKind::ExternalJob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityKind::School => "school",
            OpportunityKind::SchoolJob => "school_job",
            OpportunityKind::ExternalJob => "external_job",
        }
    }
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown opportunity kind '{0}'")]
pub struct UnknownOpportunityKind(pub String);

impl FromStr for OpportunityKind {
    type Err = UnknownOpportunityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpportunityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownOpportunityKind(s.to_string()))
    }
}

/// Lets `match_records.opportunity_kind` decode straight into the enum.
impl TryFrom<String> for OpportunityKind {
    type Error = UnknownOpportunityKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Names one opportunity independently of its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpportunityRef {
    pub kind: OpportunityKind,
    pub id: Uuid,
}

impl OpportunityRef {
    pub fn new(kind: OpportunityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for OpportunityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SchoolRow {
    pub id: Uuid,
    pub name: String,
    pub school_type: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub subjects_needed: Vec<String>,
    pub age_groups: Vec<String>,
    pub experience_required: Option<String>,
    pub language_required: bool,
    pub salary_range: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SchoolJobRow {
    pub id: Uuid,
    pub school_account_id: Uuid,
    pub title: String,
    pub role_type: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub subjects: Vec<String>,
    pub age_groups: Vec<String>,
    pub experience_required: Option<String>,
    pub language_required: bool,
    pub salary_display: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scraped listing. Subjects and age groups arrive as free text from the
/// source board and are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExternalJobRow {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub external_url: String,
    pub title: String,
    pub company: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub subjects: Option<String>,
    pub age_groups: Option<String>,
    pub experience: Option<String>,
    pub language_required: bool,
    pub salary: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Opportunity {
    School(SchoolRow),
    SchoolJob(SchoolJobRow),
    ExternalJob(ExternalJobRow),
}

impl Opportunity {
    pub fn kind(&self) -> OpportunityKind {
        match self {
            Opportunity::School(_) => OpportunityKind::School,
            Opportunity::SchoolJob(_) => OpportunityKind::SchoolJob,
            Opportunity::ExternalJob(_) => OpportunityKind::ExternalJob,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Opportunity::School(row) => row.id,
            Opportunity::SchoolJob(row) => row.id,
            Opportunity::ExternalJob(row) => row.id,
        }
    }

    pub fn reference(&self) -> OpportunityRef {
        OpportunityRef::new(self.kind(), self.id())
    }

    pub fn is_active(&self) -> bool {
        match self {
            Opportunity::School(row) => row.is_active,
            Opportunity::SchoolJob(row) => row.is_active,
            Opportunity::ExternalJob(row) => row.is_active,
        }
    }
}

/// Opportunity columns an edit event can report as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityField {
    City,
    Province,
    Subjects,
    AgeGroups,
    ExperienceRequirement,
    LanguageRequirement,
    Active,
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in OpportunityKind::ALL {
            assert_eq!(kind.as_str().parse::<OpportunityKind>().unwrap(), kind);
        }
        assert!("district".parse::<OpportunityKind>().is_err());
    }

    #[test]
    fn reference_display_includes_kind() {
        let id = Uuid::nil();
        let reference = OpportunityRef::new(OpportunityKind::SchoolJob, id);
        assert_eq!(reference.to_string(), format!("school_job:{id}"));
    }

    #[test]
    fn unknown_field_names_deserialize_as_other() {
        let fields: Vec<OpportunityField> =
            serde_json::from_str(r#"["city", "benefits", "active"]"#).unwrap();
        assert_eq!(
            fields,
            vec![
                OpportunityField::City,
                OpportunityField::Other,
                OpportunityField::Active
            ]
        );
    }
}
