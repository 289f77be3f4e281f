//! Per-track calendar lookup.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::Play;

/// Plays per date for one track key, over every play type. Unknown keys
/// give an empty map.
pub fn track_calendar(plays: &[Play], track_key: &str) -> BTreeMap<NaiveDate, u64> {
    let mut calendar = BTreeMap::new();
    for play in plays.iter().filter(|p| p.track_key == track_key) {
        *calendar.entry(play.date).or_insert(0) += 1;
    }
    calendar
}
