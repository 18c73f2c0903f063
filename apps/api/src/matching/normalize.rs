//! Normalizer: reconciles the stored representations of candidate and
//! opportunity fields into canonical token lists, year counts and ranges.
//!
//! Scoring never sees raw columns; everything passes through here once per
//! scoring call.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Upper bound used for open-ended requirements such as "5+ years".
pub const OPEN_ENDED_MAX_YEARS: u32 = 999;

static FIRST_INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid regex"));

static LIST_DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;|\n，、；]").expect("Invalid regex"));

/// "3-5 years", "3 – 5", "3 to 5 years"
static BOUNDED_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s*(?:-|–|—|to)\s*(\d+)").expect("Invalid regex")
});

/// "5+ years", "5 or more years", "5 years or more"
static OPEN_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s*(?:\+|(?:years?\s+)?or\s+(?:more|above))").expect("Invalid regex")
});

/// A list-valued field in whichever shape it was stored.
#[derive(Debug, Clone, Copy)]
pub enum RawList<'a> {
    /// Free text: delimited list, Postgres array literal or JSON array string.
    Text(Option<&'a str>),
    /// A true list column.
    Items(&'a [String]),
}

/// Parsed experience requirement of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExperienceRequirement {
    /// Empty or absent: no constraint.
    Unspecified,
    /// Inclusive bounds in years.
    Range { min: u32, max: u32 },
    /// Text present but not in a recognised shape.
    Unrecognized,
}

/// Ordered, trimmed, lowercase tokens with empties and repeats dropped.
pub fn parse_token_list(raw: RawList<'_>) -> Vec<String> {
    let pieces: Vec<String> = match raw {
        RawList::Items(items) => items.to_vec(),
        RawList::Text(None) => Vec::new(),
        RawList::Text(Some(text)) => split_text_list(text),
    };

    let mut tokens: Vec<String> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let token = piece
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'')
            .trim()
            .to_lowercase();
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

fn split_text_list(text: &str) -> Vec<String> {
    let trimmed = text.trim();

    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
            return items;
        }
    }

    let body = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .or_else(|| trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')))
        .unwrap_or(trimmed);

    LIST_DELIMITER_RE
        .split(body)
        .map(str::to_string)
        .collect()
}

/// First integer in the text ("5 years" -> 5). Absent or unparsable -> 0.
pub fn parse_years_experience(raw: Option<&str>) -> u32 {
    raw.and_then(|text| FIRST_INTEGER_RE.find(text))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0)
}

pub fn parse_experience_requirement(raw: Option<&str>) -> ExperienceRequirement {
    let text = match raw.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_lowercase(),
        _ => return ExperienceRequirement::Unspecified,
    };

    if let Some(caps) = BOUNDED_RANGE_RE.captures(&text) {
        let bounds = (caps[1].parse::<u32>(), caps[2].parse::<u32>());
        return match bounds {
            (Ok(a), Ok(b)) => ExperienceRequirement::Range {
                min: a.min(b),
                max: a.max(b),
            },
            _ => ExperienceRequirement::Unrecognized,
        };
    }

    if let Some(caps) = OPEN_RANGE_RE.captures(&text) {
        return match caps[1].parse::<u32>() {
            Ok(min) => ExperienceRequirement::Range {
                min,
                max: OPEN_ENDED_MAX_YEARS.max(min),
            },
            Err(_) => ExperienceRequirement::Unrecognized,
        };
    }

    ExperienceRequirement::Unrecognized
}
