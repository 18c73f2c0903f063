use anyhow::{bail, Context, Result};

use crate::matching::listing::DEFAULT_FULL_LIST_LIMIT;
use crate::matching::manager::DEFAULT_MIN_SCORE;
use crate::matching::scoring::MatchWeights;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    /// Threshold for triggered recomputes and admin runs without an override.
    pub match_min_score: f64,
    /// Cap on the administrative full match list.
    pub match_list_limit: usize,
    pub match_weights: MatchWeights,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = MatchWeights::default();
        let match_weights = MatchWeights {
            location: parse_or(&lookup, "MATCH_WEIGHT_LOCATION", defaults.location)?,
            subject: parse_or(&lookup, "MATCH_WEIGHT_SUBJECT", defaults.subject)?,
            age_group: parse_or(&lookup, "MATCH_WEIGHT_AGE_GROUP", defaults.age_group)?,
            experience: parse_or(&lookup, "MATCH_WEIGHT_EXPERIENCE", defaults.experience)?,
            language: parse_or(&lookup, "MATCH_WEIGHT_LANGUAGE", defaults.language)?,
        };
        match_weights.validate()?;

        let match_min_score = parse_or(&lookup, "MATCH_MIN_SCORE", DEFAULT_MIN_SCORE)?;
        if !(0.0..=100.0).contains(&match_min_score) {
            bail!("MATCH_MIN_SCORE must be between 0 and 100, got {match_min_score}");
        }

        Ok(Config {
            database_url: lookup("DATABASE_URL")
                .context("Required environment variable 'DATABASE_URL' is not set")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            match_min_score,
            match_list_limit: parse_or(&lookup, "MATCH_LIST_LIMIT", DEFAULT_FULL_LIST_LIMIT)?,
            match_weights,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
