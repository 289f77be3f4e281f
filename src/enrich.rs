//! Enrichment: composite keys and calendar fields for accepted events.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::models::{AcceptedEvent, Play};

/// Separator between track and artist in a track key.
pub const TRACK_KEY_SEPARATOR: &str = " - ";

/// Build the track identity: trimmed track name + separator + trimmed artist.
pub fn track_key(track_name: &str, artist_name: &str) -> String {
    format!(
        "{}{}{}",
        track_name.trim(),
        TRACK_KEY_SEPARATOR,
        artist_name.trim()
    )
}

/// Trimmed album name, `None` when missing or blank.
pub fn album_key(album_name: Option<&str>) -> Option<String> {
    album_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Calendar fields of a timestamp: (hour, day_of_week, month, year).
fn calendar_fields(timestamp: &NaiveDateTime) -> (u32, u32, u32, i32) {
    (
        timestamp.hour(),
        timestamp.weekday().num_days_from_monday(),
        timestamp.month(),
        timestamp.year(),
    )
}

/// Attach keys and calendar fields. Re-enriching a play's own fields
/// (via `AcceptedEvent::from(&play)`) yields the same play.
pub fn enrich(accepted: AcceptedEvent) -> Play {
    let AcceptedEvent {
        event,
        play_type,
        estimated_duration_ms,
        play_fraction,
    } = accepted;

    // The filter guarantees these are present and non-blank
    let track_name = event.track_name.unwrap_or_default();
    let artist_name = event.artist_name.unwrap_or_default();
    let (hour, day_of_week, month, year) = calendar_fields(&event.timestamp);

    Play {
        track_key: track_key(&track_name, &artist_name),
        artist_key: artist_name.trim().to_string(),
        album_key: album_key(event.album_name.as_deref()),
        date: event.timestamp.date(),
        hour,
        day_of_week,
        month,
        year,
        timestamp: event.timestamp,
        ms_played: event.ms_played,
        track_name,
        artist_name,
        album_name: event.album_name,
        track_uri: event.track_uri.unwrap_or_default(),
        reason_start: event.reason_start,
        play_type,
        skipped: event.skipped.unwrap_or(false),
        estimated_duration_ms,
        play_fraction,
    }
}

pub fn enrich_all(accepted: Vec<AcceptedEvent>) -> Vec<Play> {
    accepted.into_iter().map(enrich).collect()
}
