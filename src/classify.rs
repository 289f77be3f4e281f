//! Play type classification from the start-reason code.

use crate::models::{ClassifiedEvent, PlayType, RawEvent};

/// Start reasons that mean the listener chose the track.
pub const INTENTIONAL_REASONS: &[&str] = &[
    "clickrow",  // Clicked the row in a list/playlist
    "fwdbtn",    // Next button
    "backbtn",   // Previous button
    "playbtn",   // Play/resume button
    "appload",   // App reopened on this track
    "uriopen",   // Direct link
    "remote",    // Connected/remote device
    "popup",     // Legacy popup
    "clickside", // Legacy sidebar click
];

/// Start reasons that mean playback continued on its own.
pub const AUTOPLAY_REASONS: &[&str] = &[
    "trackdone", // Previous track finished
    "endplay",   // Queue ended, recommendations took over
];

/// Classify a start-reason code. Total: unrecognised codes are `Unknown`.
pub fn classify_reason(reason_start: &str) -> PlayType {
    if INTENTIONAL_REASONS.contains(&reason_start) {
        PlayType::Intentional
    } else if AUTOPLAY_REASONS.contains(&reason_start) {
        PlayType::Autoplay
    } else {
        PlayType::Unknown
    }
}

/// Classify an event; a missing start reason is `Unknown`.
pub fn classify_event(event: RawEvent) -> ClassifiedEvent {
    let play_type = event
        .reason_start
        .as_deref()
        .map_or(PlayType::Unknown, classify_reason);
    ClassifiedEvent { event, play_type }
}

pub fn classify_all(events: Vec<RawEvent>) -> Vec<ClassifiedEvent> {
    events.into_iter().map(classify_event).collect()
}
