//! Core data models for listening statistics.
//!
//! This module contains the event records flowing through the pipeline
//! (raw → classified → accepted → enriched play) and the value records
//! produced by the engines.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Input Models
// ============================================================================

/// One playback record as delivered by the ingestion collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub timestamp: NaiveDateTime, // UTC, timezone dropped
    pub ms_played: i64,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    pub track_uri: Option<String>, // Stable track id (e.g. "spotify:track:...")
    pub reason_start: Option<String>,
    pub skipped: Option<bool>,
}

// ============================================================================
// Play Type
// ============================================================================

/// How playback of an event started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayType {
    /// The listener picked the track.
    Intentional,
    /// The track started on its own after the previous one.
    Autoplay,
    /// Start reason missing or not recognised.
    Unknown,
}

impl PlayType {
    pub const ALL: [PlayType; 3] = [PlayType::Intentional, PlayType::Autoplay, PlayType::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            PlayType::Intentional => "INTENTIONAL",
            PlayType::Autoplay => "AUTOPLAY",
            PlayType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pipeline Stages
// ============================================================================

/// Raw event tagged with its play type.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedEvent {
    pub event: RawEvent,
    pub play_type: PlayType,
}

/// Event that passed both filter stages, with the duration estimate used by
/// the autoplay gate.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptedEvent {
    pub event: RawEvent,
    pub play_type: PlayType,
    pub estimated_duration_ms: i64,
    pub play_fraction: f64,
}

impl From<AcceptedEvent> for ClassifiedEvent {
    fn from(accepted: AcceptedEvent) -> Self {
        ClassifiedEvent {
            event: accepted.event,
            play_type: accepted.play_type,
        }
    }
}

/// Accepted and enriched play. The only record the engines consume.
///
/// Names are stored as received; the keys carry the trimmed forms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub timestamp: NaiveDateTime,
    pub ms_played: i64,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub track_uri: String,
    pub reason_start: Option<String>,
    pub play_type: PlayType,
    pub skipped: bool,
    pub estimated_duration_ms: i64,
    pub play_fraction: f64,

    // Derived keys
    pub track_key: String,         // "Track - Artist", trimmed parts
    pub artist_key: String,        // Trimmed artist name
    pub album_key: Option<String>, // Trimmed album name, None when blank

    // Calendar fields
    pub date: NaiveDate,
    pub hour: u32,
    pub day_of_week: u32, // 0 = Monday, 6 = Sunday
    pub month: u32,
    pub year: i32,
}

impl From<&Play> for AcceptedEvent {
    fn from(play: &Play) -> Self {
        AcceptedEvent {
            event: RawEvent {
                timestamp: play.timestamp,
                ms_played: play.ms_played,
                track_name: Some(play.track_name.clone()),
                artist_name: Some(play.artist_name.clone()),
                album_name: play.album_name.clone(),
                track_uri: Some(play.track_uri.clone()),
                reason_start: play.reason_start.clone(),
                skipped: Some(play.skipped),
            },
            play_type: play.play_type,
            estimated_duration_ms: play.estimated_duration_ms,
            play_fraction: play.play_fraction,
        }
    }
}

// ============================================================================
// Output Models
// ============================================================================

/// Which entity a top-N ranking groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Track,
    Artist,
    Album,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Track => "track",
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
        }
    }

    /// Grouping key of a play for this entity, if it has one.
    pub fn key_of(self, play: &Play) -> Option<&str> {
        match self {
            EntityKind::Track => Some(play.track_key.as_str()),
            EntityKind::Artist => Some(play.artist_key.as_str()),
            EntityKind::Album => play.album_key.as_deref(),
        }
    }
}

/// Top-N row: play count plus listening time and skips.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub key: String,
    pub plays: u64,
    pub total_ms_played: i64,
    pub skips: u64,
}

impl EntityStats {
    pub fn total_hours(&self) -> f64 {
        self.total_ms_played as f64 / (1000.0 * 60.0 * 60.0)
    }
}

/// Entity/count pair used by the streak, spiral and session engines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCount {
    pub key: String,
    pub count: u64,
}

impl EntityCount {
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

/// One day of the gap-filled daily histogram.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub plays: u64,
}
