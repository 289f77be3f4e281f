//! Parsing of Spotify "Extended Streaming History" exports.
//!
//! Each `Streaming_History_Audio_*.json` file is a JSON array of records.
//! Records that cannot be read (bad timestamp, wrong field types) are
//! counted and skipped; only a payload that is not an array fails.

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, StatsError};
use crate::models::RawEvent;

/// File names of audio history exports
pub static HISTORY_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Streaming_History_Audio_.*\.json$").unwrap());

pub fn is_history_file(file_name: &str) -> bool {
    HISTORY_FILE.is_match(file_name)
}

/// Fields of one export record. Everything else in the record is ignored.
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    ts: String,
    #[serde(default)]
    ms_played: Option<i64>,
    #[serde(default)]
    master_metadata_track_name: Option<String>,
    #[serde(default)]
    master_metadata_album_artist_name: Option<String>,
    #[serde(default)]
    master_metadata_album_album_name: Option<String>,
    #[serde(default)]
    spotify_track_uri: Option<String>,
    #[serde(default)]
    reason_start: Option<String>,
    #[serde(default)]
    skipped: Option<bool>,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub events: Vec<RawEvent>,
    /// Records skipped because they could not be read
    pub malformed: usize,
}

impl IngestOutcome {
    pub fn extend(&mut self, other: IngestOutcome) {
        self.events.extend(other.events);
        self.malformed += other.malformed;
    }
}

/// Parse an ISO-8601 timestamp to naive UTC. Offsets are converted, a
/// timestamp without offset is taken as UTC.
pub fn parse_timestamp(ts: &str) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(ts) {
        return Some(with_offset.naive_utc());
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

fn to_event(record: HistoryRecord) -> Option<RawEvent> {
    let timestamp = parse_timestamp(&record.ts)?;
    Some(RawEvent {
        timestamp,
        ms_played: record.ms_played.unwrap_or(0),
        track_name: record.master_metadata_track_name,
        artist_name: record.master_metadata_album_artist_name,
        album_name: record.master_metadata_album_album_name,
        track_uri: record.spotify_track_uri,
        reason_start: record.reason_start,
        skipped: record.skipped,
    })
}

/// Parse one history file's contents.
pub fn parse_history(payload: &str) -> Result<IngestOutcome> {
    let records: Vec<Value> = serde_json::from_str(payload).map_err(StatsError::MalformedHistory)?;
    let mut outcome = IngestOutcome {
        events: Vec::with_capacity(records.len()),
        malformed: 0,
    };

    for (index, value) in records.into_iter().enumerate() {
        let event = serde_json::from_value::<HistoryRecord>(value)
            .ok()
            .and_then(to_event);
        match event {
            Some(event) => outcome.events.push(event),
            None => {
                debug!(index, "Skipping unreadable history record");
                outcome.malformed += 1;
            }
        }
    }

    if outcome.malformed > 0 {
        warn!(
            malformed = outcome.malformed,
            parsed = outcome.events.len(),
            "Some history records could not be read"
        );
    }
    Ok(outcome)
}
