// ============================================================================
// src/ranking/mod.rs - Character ranking for keep/trim decisions
// ============================================================================
//
// Characters are ordered from most to least valuable by a single named
// attribute. Missing or unreadable attributes count as zero, and the sort is
// stable so equally ranked characters keep their account order.
//
// ============================================================================

use crate::core::{Character, Result, RosterError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CRITERION
// ============================================================================

/// Attribute used to rank characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Criterion {
    /// Cumulative score (`marks`)
    #[default]
    #[serde(rename = "marks")]
    Marks,
    /// Growth metric (`actualGrowth`)
    #[serde(rename = "actualGrowth")]
    ActualGrowth,
    /// Last activity timestamp (`lastPlayedDate`)
    #[serde(rename = "lastPlayedDate")]
    LastPlayedDate,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [
        Criterion::Marks,
        Criterion::ActualGrowth,
        Criterion::LastPlayedDate,
    ];

    /// Name of the character record field this criterion reads.
    pub fn field(self) -> &'static str {
        match self {
            Criterion::Marks => "marks",
            Criterion::ActualGrowth => "actualGrowth",
            Criterion::LastPlayedDate => "lastPlayedDate",
        }
    }

    /// Label used in per-character report lines.
    pub fn label(self) -> &'static str {
        match self {
            Criterion::Marks => "Marks",
            Criterion::ActualGrowth => "ActualGrowth",
            Criterion::LastPlayedDate => "LastPlayedDate",
        }
    }

    /// Sort key for a character. Zero when the attribute is absent or unparseable.
    pub fn score(self, character: &Character) -> f64 {
        let Some(value) = character.attribute(self.field()) else {
            return 0.0;
        };

        let score = match self {
            Criterion::Marks | Criterion::ActualGrowth => numeric(value),
            Criterion::LastPlayedDate => timestamp(value),
        };

        score.filter(|s| s.is_finite()).unwrap_or(0.0)
    }

    /// The attribute as written in the record, for reporting.
    pub fn display_value(self, character: &Character) -> String {
        match character.attribute(self.field()) {
            None | Some(Value::Null) => "0".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for Criterion {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        Criterion::ALL
            .into_iter()
            .find(|criterion| criterion.field().to_lowercase() == normalized)
            .ok_or_else(|| {
                RosterError::InvalidArgument(format!(
                    "unsupported ranking criterion '{}' (expected one of: marks, actualGrowth, lastPlayedDate)",
                    s
                ))
            })
    }
}

// ============================================================================
// ATTRIBUTE PARSING
// ============================================================================

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => return n.as_f64(),
        Value::String(s) => s.trim(),
        _ => return None,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp() as f64);
    }
    // Unreal FDateTime export format
    for format in ["%Y.%m.%d-%H.%M.%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp() as f64);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp() as f64);
    }

    raw.parse::<f64>().ok()
}

// ============================================================================
// RANKING
// ============================================================================

/// Order characters from most to least valuable by `criterion`.
///
/// Uses a stable sort, so characters with equal scores keep their relative
/// input order. That order decides which of them are trimmed.
pub fn rank(characters: Vec<Character>, criterion: Criterion) -> Vec<Character> {
    let mut scored: Vec<(f64, Character)> = characters
        .into_iter()
        .map(|character| (criterion.score(&character), character))
        .collect();

    scored.sort_by(|(a, _), (b, _)| compare_descending(*a, *b));

    scored.into_iter().map(|(_, character)| character).collect()
}

fn compare_descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

// ============================================================================
// TESTS
// ============================================================================
