//! Canonical shapes the scorer works on: the normalized candidate and the
//! requirements every opportunity kind exposes through `MatchTarget`.

use serde::Serialize;
use uuid::Uuid;

use crate::matching::normalize::{
    parse_experience_requirement, parse_token_list, parse_years_experience,
    ExperienceRequirement, RawList,
};
use crate::models::candidate::CandidateRow;
use crate::models::opportunity::{ExternalJobRow, Opportunity, SchoolJobRow, SchoolRow};

/// Candidate preferences after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateProfile {
    pub id: Uuid,
    pub locations: Vec<String>,
    pub subjects: Vec<String>,
    pub age_groups: Vec<String>,
    pub years_experience: u32,
    pub language_qualified: bool,
}

impl CandidateProfile {
    pub fn from_row(row: &CandidateRow) -> Self {
        Self {
            id: row.id,
            locations: parse_token_list(RawList::Text(row.preferred_location.as_deref())),
            subjects: parse_token_list(RawList::Text(row.subject_specialty.as_deref())),
            age_groups: parse_token_list(RawList::Text(row.preferred_age_group.as_deref())),
            years_experience: parse_years_experience(row.years_experience.as_deref()),
            language_qualified: row.language_qualified,
        }
    }
}

/// What an opportunity asks of a candidate, independent of its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirements {
    /// Display form, trimmed. Comparisons are case-insensitive.
    pub city: String,
    pub province: String,
    pub subjects: Vec<String>,
    pub age_groups: Vec<String>,
    pub experience: ExperienceRequirement,
    pub language_required: bool,
}

/// Implemented by every opportunity kind so the scorer is written once.
pub trait MatchTarget {
    fn requirements(&self) -> Requirements;
}

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

impl MatchTarget for SchoolRow {
    fn requirements(&self) -> Requirements {
        Requirements {
            city: trimmed(self.city.as_deref()),
            province: trimmed(self.province.as_deref()),
            subjects: parse_token_list(RawList::Items(&self.subjects_needed)),
            age_groups: parse_token_list(RawList::Items(&self.age_groups)),
            experience: parse_experience_requirement(self.experience_required.as_deref()),
            language_required: self.language_required,
        }
    }
}

impl MatchTarget for SchoolJobRow {
    fn requirements(&self) -> Requirements {
        Requirements {
            city: trimmed(self.city.as_deref()),
            province: trimmed(self.province.as_deref()),
            subjects: parse_token_list(RawList::Items(&self.subjects)),
            age_groups: parse_token_list(RawList::Items(&self.age_groups)),
            experience: parse_experience_requirement(self.experience_required.as_deref()),
            language_required: self.language_required,
        }
    }
}

impl MatchTarget for ExternalJobRow {
    fn requirements(&self) -> Requirements {
        Requirements {
            city: trimmed(self.city.as_deref()),
            province: trimmed(self.province.as_deref()),
            subjects: parse_token_list(RawList::Text(self.subjects.as_deref())),
            age_groups: parse_token_list(RawList::Text(self.age_groups.as_deref())),
            experience: parse_experience_requirement(self.experience.as_deref()),
            language_required: self.language_required,
        }
    }
}

impl MatchTarget for Opportunity {
    fn requirements(&self) -> Requirements {
        match self {
            Opportunity::School(row) => row.requirements(),
            Opportunity::SchoolJob(row) => row.requirements(),
            Opportunity::ExternalJob(row) => row.requirements(),
        }
    }
}
