//! Match Scoring — pluggable, trait-based scorer for one (candidate, opportunity) pair.
//!
//! Default: `WeightedMatchScorer` (pure, deterministic, fully testable).
//! `AppState` holds an `Arc<dyn MatchScorer>` through the `MatchManager`.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::matching::normalize::ExperienceRequirement;
use crate::matching::requirements::{CandidateProfile, Requirements};

/// Score given to a factor when one side has no data.
const NEUTRAL_SCORE: f64 = 50.0;

/// Sub-score a factor must reach for its reason to be listed.
const REASON_THRESHOLD: f64 = 70.0;
const EXPERIENCE_REASON_THRESHOLD: f64 = 80.0;

// ────────────────────────────────────────────────────────────────────────────
// Weights
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub location: f64,
    pub subject: f64,
    pub age_group: f64,
    pub experience: f64,
    pub language: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            location: 0.35,
            subject: 0.25,
            age_group: 0.20,
            experience: 0.15,
            language: 0.05,
        }
    }
}

impl MatchWeights {
    pub fn sum(&self) -> f64 {
        self.location + self.subject + self.age_group + self.experience + self.language
    }

    /// Weights must be non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        let all = [
            self.location,
            self.subject,
            self.age_group,
            self.experience,
            self.language,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("match weights must be finite and non-negative: {self:?}");
        }
        if (self.sum() - 1.0).abs() > 1e-6 {
            bail!("match weights must sum to 1.0, got {}", self.sum());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// The five factor scores, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub location: f64,
    pub subject: f64,
    pub age_group: f64,
    pub experience: f64,
    pub language: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    /// Weighted composite in [0, 100], rounded to 2 decimals.
    pub score: f64,
    pub breakdown: SubScores,
    pub reasons: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap scoring backends without touching the manager,
/// handlers or trigger code.
pub trait MatchScorer: Send + Sync {
    fn score(&self, candidate: &CandidateProfile, requirements: &Requirements) -> MatchScore;
}

// ────────────────────────────────────────────────────────────────────────────
// WeightedMatchScorer — default implementation
// ────────────────────────────────────────────────────────────────────────────

/// Five-factor weighted scorer.
///
/// Algorithm:
/// 1. Compute location, subject, age group, experience and language sub-scores
/// 2. composite = Σ(weight × sub-score), clamped to [0, 100], rounded to 2 dp
/// 3. Reasons are derived from the sub-scores, independent of the composite
#[derive(Debug, Clone, Default)]
pub struct WeightedMatchScorer {
    weights: MatchWeights,
}

impl WeightedMatchScorer {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }
}

impl MatchScorer for WeightedMatchScorer {
    fn score(&self, candidate: &CandidateProfile, requirements: &Requirements) -> MatchScore {
        compute_match_score(candidate, requirements, &self.weights)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core scoring algorithm
// ────────────────────────────────────────────────────────────────────────────

fn compute_match_score(
    candidate: &CandidateProfile,
    requirements: &Requirements,
    weights: &MatchWeights,
) -> MatchScore {
    let breakdown = SubScores {
        location: location_score(
            &candidate.locations,
            &requirements.city,
            &requirements.province,
        ),
        subject: overlap_score(&candidate.subjects, &requirements.subjects),
        age_group: overlap_score(&candidate.age_groups, &requirements.age_groups),
        experience: experience_score(candidate.years_experience, &requirements.experience),
        language: language_score(candidate.language_qualified, requirements.language_required),
    };

    let composite = breakdown.location * weights.location
        + breakdown.subject * weights.subject
        + breakdown.age_group * weights.age_group
        + breakdown.experience * weights.experience
        + breakdown.language * weights.language;

    MatchScore {
        score: round2(composite.clamp(0.0, 100.0)),
        breakdown,
        reasons: build_reasons(candidate, requirements, &breakdown),
    }
}

/// Exact city → 100, province substring either way → 70, no preference → 50.
pub fn location_score(candidate_locations: &[String], city: &str, province: &str) -> f64 {
    if candidate_locations.is_empty() {
        return NEUTRAL_SCORE;
    }

    let city = city.to_lowercase();
    if !city.is_empty() && candidate_locations.iter().any(|l| *l == city) {
        return 100.0;
    }

    let province = province.to_lowercase();
    if !province.is_empty()
        && candidate_locations
            .iter()
            .any(|l| province.contains(l.as_str()) || l.contains(province.as_str()))
    {
        return 70.0;
    }

    0.0
}

/// `100 × |candidate ∩ required| / |required|`. Either side empty → neutral.
pub fn overlap_score(candidate: &[String], required: &[String]) -> f64 {
    if candidate.is_empty() || required.is_empty() {
        return NEUTRAL_SCORE;
    }

    let overlap = intersection(candidate, required).len();
    if overlap == 0 {
        return 0.0;
    }

    (overlap as f64 / required.len() as f64 * 100.0).min(100.0)
}

pub fn experience_score(years: u32, requirement: &ExperienceRequirement) -> f64 {
    let (min, max) = match *requirement {
        ExperienceRequirement::Unspecified => return 100.0,
        ExperienceRequirement::Unrecognized => return NEUTRAL_SCORE,
        ExperienceRequirement::Range { min, max } => (i64::from(min), i64::from(max)),
    };
    let years = i64::from(years);

    if (min..=max).contains(&years) {
        return 100.0;
    }
    if (years - min).abs() <= 1 || (years - max).abs() <= 1 {
        return 80.0;
    }
    if years > max {
        let excess = (years - max) as f64;
        return (70.0 - excess * 5.0).max(30.0);
    }
    let shortage = (min - years) as f64;
    (50.0 - shortage * 10.0).max(0.0)
}

pub fn language_score(qualified: bool, required: bool) -> f64 {
    match (required, qualified) {
        (true, true) => 100.0,
        (true, false) => 0.0,
        (false, true) => 100.0,
        (false, false) => 90.0,
    }
}

/// Items of `required` also present in `candidate`, in `required` order.
fn intersection<'a>(candidate: &[String], required: &'a [String]) -> Vec<&'a str> {
    required
        .iter()
        .filter(|r| candidate.contains(r))
        .map(String::as_str)
        .collect()
}

fn build_reasons(
    candidate: &CandidateProfile,
    requirements: &Requirements,
    scores: &SubScores,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if scores.location >= REASON_THRESHOLD {
        let place = if requirements.city.is_empty() {
            &requirements.province
        } else {
            &requirements.city
        };
        reasons.push(format!("Location match: {place}"));
    }

    if scores.subject >= REASON_THRESHOLD
        && !candidate.subjects.is_empty()
        && !requirements.subjects.is_empty()
    {
        let shared = intersection(&candidate.subjects, &requirements.subjects);
        reasons.push(format!("Subject match: {}", shared.join(", ")));
    }

    if scores.age_group >= REASON_THRESHOLD
        && !candidate.age_groups.is_empty()
        && !requirements.age_groups.is_empty()
    {
        let shared = intersection(&candidate.age_groups, &requirements.age_groups);
        reasons.push(format!("Age group match: {}", shared.join(", ")));
    }

    if scores.experience >= EXPERIENCE_REASON_THRESHOLD {
        reasons.push(format!(
            "Experience level ({} years) matches requirements",
            candidate.years_experience
        ));
    }

    if requirements.language_required && scores.language == 100.0 {
        reasons.push("Language requirement met".to_string());
    }

    reasons
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
