//! Session engine: gap-based listening sessions and in-session repeats.

use chrono::{Duration, NaiveDateTime};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};
use crate::models::{EntityCount, Play};
use crate::ranking::{top_counts, Limit};

/// A run of plays with no gap longer than the session gap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: u64, // From 1, in time order
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub plays: u64,
}

/// Plays in timestamp order; equal timestamps keep their input order.
fn chronological(plays: &[Play]) -> Vec<&Play> {
    let mut ordered: Vec<&Play> = plays.iter().collect();
    ordered.sort_by_key(|p| p.timestamp);
    ordered
}

/// Session id per play of `ordered`, starting at 1.
fn assign_ids(ordered: &[&Play], gap: Duration) -> Vec<u64> {
    let mut ids = Vec::with_capacity(ordered.len());
    let mut id = 0u64;
    let mut previous: Option<NaiveDateTime> = None;
    for play in ordered {
        match previous {
            Some(prev) if play.timestamp - prev <= gap => {}
            _ => id += 1,
        }
        ids.push(id);
        previous = Some(play.timestamp);
    }
    ids
}

/// Split plays into sessions. A new session starts whenever the gap to the
/// previous play exceeds `gap`.
pub fn segment_sessions(plays: &[Play], gap: Duration) -> Result<Vec<Session>> {
    StatsError::ensure_non_empty(plays)?;
    let ordered = chronological(plays);
    let ids = assign_ids(&ordered, gap);

    let mut sessions: Vec<Session> = Vec::new();
    for (play, id) in ordered.iter().zip(ids) {
        match sessions.last_mut() {
            Some(session) if session.id == id => {
                session.end = play.timestamp;
                session.plays += 1;
            }
            _ => sessions.push(Session {
                id,
                start: play.timestamp,
                end: play.timestamp,
                plays: 1,
            }),
        }
    }
    Ok(sessions)
}

/// Top `limit` tracks by the number of sessions in which they played more
/// than once.
pub fn top_repeat_sessions(plays: &[Play], gap: Duration, limit: Limit) -> Result<Vec<EntityCount>> {
    StatsError::ensure_non_empty(plays)?;
    let ordered = chronological(plays);
    let ids = assign_ids(&ordered, gap);

    let mut per_session: FxHashMap<(u64, &str), u64> = FxHashMap::default();
    for (play, id) in ordered.iter().zip(ids) {
        *per_session.entry((id, play.track_key.as_str())).or_insert(0) += 1;
    }

    let mut repeats: FxHashMap<&str, u64> = FxHashMap::default();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for ((_, key), count) in per_session {
        seen.insert(key);
        if count > 1 {
            *repeats.entry(key).or_insert(0) += 1;
        }
    }
    tracing::debug!(
        tracks = seen.len(),
        repeating = repeats.len(),
        "Counted in-session repeats"
    );

    Ok(top_counts(
        repeats.into_iter().map(|(key, count)| (key.to_string(), count)),
        limit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayType;
    use crate::test_support::{at, play};

    fn gap() -> Duration {
        Duration::minutes(30)
    }

    #[test]
    fn test_sessions_split_on_gap() {
        let plays = vec![
            play("A", "X", "2024-01-01 10:00", PlayType::Intentional),
            play("B", "Y", "2024-01-01 10:10", PlayType::Autoplay),
            play("C", "Z", "2024-01-01 10:55", PlayType::Intentional),
        ];
        let sessions = segment_sessions(&plays, gap()).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, 1);
        assert_eq!(sessions[0].plays, 2);
        assert_eq!(sessions[0].end, at("2024-01-01 10:10"));
        assert_eq!(sessions[1].id, 2);
        assert_eq!(sessions[1].start, at("2024-01-01 10:55"));
    }

    #[test]
    fn test_gap_equal_to_threshold_stays_in_session() {
        let plays = vec![
            play("A", "X", "2024-01-01 10:00", PlayType::Intentional),
            play("A", "X", "2024-01-01 10:30", PlayType::Intentional),
            play("A", "X", "2024-01-01 11:01", PlayType::Intentional),
        ];
        let sessions = segment_sessions(&plays, gap()).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].plays, 2);
    }

    #[test]
    fn test_unsorted_input() {
        let plays = vec![
            play("C", "Z", "2024-01-01 10:55", PlayType::Intentional),
            play("A", "X", "2024-01-01 10:00", PlayType::Intentional),
            play("A", "X", "2024-01-01 10:10", PlayType::Intentional),
        ];
        let sessions = segment_sessions(&plays, gap()).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].start, at("2024-01-01 10:00"));
    }

    #[test]
    fn test_repeat_session_scenario() {
        let plays = vec![
            play("Song", "Artist", "2024-01-01 10:00", PlayType::Intentional),
            play("Song", "Artist", "2024-01-01 10:10", PlayType::Intentional),
            play("Other", "Artist", "2024-01-01 10:55", PlayType::Intentional),
        ];
        let top = top_repeat_sessions(&plays, gap(), Limit::new(5).unwrap()).unwrap();
        assert_eq!(top, vec![EntityCount::new("Song - Artist", 1)]);
    }

    #[test]
    fn test_repeats_counted_per_session() {
        let plays = vec![
            play("A", "X", "2024-01-01 10:00", PlayType::Intentional),
            play("A", "X", "2024-01-01 10:05", PlayType::Intentional),
            play("A", "X", "2024-01-01 10:06", PlayType::Intentional),
            play("A", "X", "2024-01-02 10:00", PlayType::Intentional),
            play("A", "X", "2024-01-02 10:05", PlayType::Intentional),
            play("B", "Y", "2024-01-03 10:00", PlayType::Intentional),
            play("B", "Y", "2024-01-03 10:05", PlayType::Autoplay),
        ];
        let top = top_repeat_sessions(&plays, gap(), Limit::new(5).unwrap()).unwrap();
        assert_eq!(
            top,
            vec![EntityCount::new("A - X", 2), EntityCount::new("B - Y", 1)]
        );
    }

    #[test]
    fn test_empty_is_no_data() {
        assert!(segment_sessions(&[], gap()).unwrap_err().is_no_data());
    }
}
