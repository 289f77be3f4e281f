//! Analysis thresholds.
//!
//! Every field has a default matching the historical behaviour; callers may
//! override any of them (CLI flags or a JSON config file).

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

// ============================================================================
// Defaults
// ============================================================================

/// Intentional (and unknown) plays count from one minute.
pub const MIN_INTENTIONAL_PLAY_MS: i64 = 60_000;

/// Autoplay counts from 2.5 minutes regardless of percentage.
pub const MIN_AUTOPLAY_DURATION_MS: i64 = 150_000;

/// Autoplay counts when this share of the estimated duration was heard.
pub const MIN_AUTOPLAY_FRACTION: f64 = 0.80;

/// Reference track length (3min 20s) used when the real duration is unknown.
pub const AVERAGE_TRACK_DURATION_MS: i64 = 200_000;

/// Gap that splits two listening sessions.
pub const SESSION_GAP_MINUTES: i64 = 30;

/// Similarity above which two album names are merged.
pub const ALBUM_SIMILARITY_THRESHOLD: f64 = 0.85;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_intentional_ms: i64,
    pub min_autoplay_ms: i64,
    pub min_autoplay_fraction: f64,
    pub average_track_ms: i64,
    pub session_gap_minutes: i64,
    pub album_similarity_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_intentional_ms: MIN_INTENTIONAL_PLAY_MS,
            min_autoplay_ms: MIN_AUTOPLAY_DURATION_MS,
            min_autoplay_fraction: MIN_AUTOPLAY_FRACTION,
            average_track_ms: AVERAGE_TRACK_DURATION_MS,
            session_gap_minutes: SESSION_GAP_MINUTES,
            album_similarity_threshold: ALBUM_SIMILARITY_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    /// Reject values that would make the filters or engines meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.min_intentional_ms <= 0 {
            return Err(StatsError::invalid("min_intentional_ms", "must be positive"));
        }
        if self.min_autoplay_ms <= 0 {
            return Err(StatsError::invalid("min_autoplay_ms", "must be positive"));
        }
        if !(self.min_autoplay_fraction > 0.0 && self.min_autoplay_fraction <= 1.0) {
            return Err(StatsError::invalid(
                "min_autoplay_fraction",
                format!("must be in (0, 1], got {}", self.min_autoplay_fraction),
            ));
        }
        if self.average_track_ms <= 0 {
            return Err(StatsError::invalid("average_track_ms", "must be positive"));
        }
        if self.session_gap_minutes <= 0 {
            return Err(StatsError::invalid("session_gap_minutes", "must be positive"));
        }
        if !(self.album_similarity_threshold > 0.0 && self.album_similarity_threshold <= 1.0) {
            return Err(StatsError::invalid(
                "album_similarity_threshold",
                format!("must be in (0, 1], got {}", self.album_similarity_threshold),
            ));
        }
        Ok(())
    }

    pub fn session_gap(&self) -> Duration {
        Duration::minutes(self.session_gap_minutes)
    }
}
