//! Play builders shared by the inline unit tests.

use chrono::NaiveDateTime;

use crate::enrich::enrich;
use crate::models::{AcceptedEvent, Play, PlayType, RawEvent};

pub fn at(ts: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M").unwrap()
}

pub fn raw(track: &str, artist: &str, ts: &str, ms_played: i64, reason: &str) -> RawEvent {
    RawEvent {
        timestamp: at(ts),
        ms_played,
        track_name: Some(track.to_string()),
        artist_name: Some(artist.to_string()),
        album_name: Some("Album".to_string()),
        track_uri: Some(format!("spotify:track:{track}")),
        reason_start: Some(reason.to_string()),
        skipped: Some(false),
    }
}

/// Enriched 65s play on album "Album".
pub fn play(track: &str, artist: &str, ts: &str, play_type: PlayType) -> Play {
    let reason = match play_type {
        PlayType::Intentional => "clickrow",
        PlayType::Autoplay => "trackdone",
        PlayType::Unknown => "unknown",
    };
    enrich(AcceptedEvent {
        event: raw(track, artist, ts, 65_000, reason),
        play_type,
        estimated_duration_ms: 200_000,
        play_fraction: 0.325,
    })
}

pub fn with_album(mut play: Play, album: &str) -> Play {
    play.album_name = Some(album.to_string());
    play.album_key = crate::enrich::album_key(Some(album));
    play
}
