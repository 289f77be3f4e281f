//! Dataset scope filters and descriptive statistics.

use chrono::NaiveDateTime;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, StatsError};
use crate::models::{Play, PlayType};

// ============================================================================
// Scope
// ============================================================================

/// Restrict analysis to one year and/or one month. Empty scope keeps all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub year: Option<i32>,
    pub month: Option<u32>, // 1-12
}

impl Scope {
    pub fn new(year: Option<i32>, month: Option<u32>) -> Result<Self> {
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(StatsError::invalid("month", format!("must be 1-12, got {m}")));
            }
        }
        Ok(Self { year, month })
    }

    pub fn is_all(&self) -> bool {
        self.year.is_none() && self.month.is_none()
    }

    pub fn contains(&self, play: &Play) -> bool {
        self.year.map_or(true, |y| play.year == y) && self.month.map_or(true, |m| play.month == m)
    }

    /// Stable text form used in cache keys and logs.
    pub fn label(&self) -> String {
        match (self.year, self.month) {
            (None, None) => "all".to_string(),
            (Some(y), None) => format!("{y}"),
            (None, Some(m)) => format!("*-{m:02}"),
            (Some(y), Some(m)) => format!("{y}-{m:02}"),
        }
    }
}

/// Sorted distinct years that have at least one play.
pub fn available_years(plays: &[Play]) -> Vec<i32> {
    plays
        .iter()
        .map(|p| p.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_plays: u64,
    pub first_play: NaiveDateTime,
    pub last_play: NaiveDateTime,
    pub span_days: i64,
    pub unique_tracks: u64,
    pub unique_artists: u64,
    pub unique_albums: u64,
    pub min_ms_played: i64,
    pub mean_ms_played: f64,
    pub max_ms_played: i64,
    pub total_hours: f64,
    pub skips: u64,
    pub skip_rate: f64,
    pub plays_by_type: BTreeMap<PlayType, u64>,
}

impl DatasetSummary {
    pub fn from_plays(plays: &[Play]) -> Result<Self> {
        let (Some(first), Some(last)) = (
            plays.iter().map(|p| p.timestamp).min(),
            plays.iter().map(|p| p.timestamp).max(),
        ) else {
            return Err(StatsError::NoValidData { received: 0 });
        };

        let total_plays = plays.len() as u64;
        let total_ms: i64 = plays.iter().map(|p| p.ms_played).sum();
        let skips = plays.iter().filter(|p| p.skipped).count() as u64;

        let mut plays_by_type = BTreeMap::new();
        for play in plays {
            *plays_by_type.entry(play.play_type).or_insert(0) += 1;
        }

        let unique = |key: fn(&Play) -> Option<&str>| -> u64 {
            plays.iter().filter_map(key).collect::<FxHashSet<_>>().len() as u64
        };

        Ok(Self {
            total_plays,
            first_play: first,
            last_play: last,
            span_days: (last.date() - first.date()).num_days(),
            unique_tracks: unique(|p| Some(p.track_key.as_str())),
            unique_artists: unique(|p| Some(p.artist_key.as_str())),
            unique_albums: unique(|p| p.album_key.as_deref()),
            min_ms_played: plays.iter().map(|p| p.ms_played).min().unwrap_or(0),
            mean_ms_played: total_ms as f64 / total_plays as f64,
            max_ms_played: plays.iter().map(|p| p.ms_played).max().unwrap_or(0),
            total_hours: total_ms as f64 / 3_600_000.0,
            skips,
            skip_rate: skips as f64 / total_plays as f64,
            plays_by_type,
        })
    }
}
