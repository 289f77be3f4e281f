//! Streak engine: consecutive listening days per track.

use chrono::NaiveDate;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::error::{Result, StatsError};
use crate::models::{EntityCount, Play};
use crate::ranking::{top_counts, Limit};

/// Longest run of dates exactly one day apart. `dates` must be sorted and
/// distinct. Empty input → 0.
pub fn longest_streak<'a, I>(dates: I) -> u64
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let mut longest = 0u64;
    let mut current = 0u64;
    let mut previous: Option<NaiveDate> = None;

    for &date in dates {
        current = match previous {
            Some(prev) if (date - prev).num_days() == 1 => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(date);
    }
    longest
}

/// Distinct listening dates per track key.
fn dates_by_track(plays: &[Play]) -> Vec<(&str, BTreeSet<NaiveDate>)> {
    let mut groups: FxHashMap<&str, BTreeSet<NaiveDate>> = FxHashMap::default();
    for play in plays {
        groups
            .entry(play.track_key.as_str())
            .or_default()
            .insert(play.date);
    }
    groups.into_iter().collect()
}

/// Top `limit` tracks by longest daily streak.
pub fn top_streaks(plays: &[Play], limit: Limit) -> Result<Vec<EntityCount>> {
    StatsError::ensure_non_empty(plays)?;
    let streaks: Vec<(String, u64)> = dates_by_track(plays)
        .into_par_iter()
        .map(|(key, dates)| (key.to_string(), longest_streak(&dates)))
        .collect();
    Ok(top_counts(streaks, limit))
}

/// Top `limit` tracks by number of distinct listening days.
pub fn top_by_distinct_days(plays: &[Play], limit: Limit) -> Result<Vec<EntityCount>> {
    StatsError::ensure_non_empty(plays)?;
    let days = dates_by_track(plays)
        .into_iter()
        .map(|(key, dates)| (key.to_string(), dates.len() as u64));
    Ok(top_counts(days, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayType;
    use crate::test_support::play;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_longest_streak() {
        let dates: BTreeSet<NaiveDate> = [
            date(2024, 1, 1),
            date(2024, 1, 2),
            date(2024, 1, 3),
            date(2024, 1, 5),
            date(2024, 1, 6),
        ]
        .into_iter()
        .collect();
        assert_eq!(longest_streak(&dates), 3);
    }

    #[test]
    fn test_single_date_is_one() {
        assert_eq!(longest_streak(&[date(2024, 3, 1)]), 1);
        let none: [NaiveDate; 0] = [];
        assert_eq!(longest_streak(&none), 0);
    }

    #[test]
    fn test_streak_crosses_month_boundary() {
        let dates = [date(2024, 1, 31), date(2024, 2, 1), date(2024, 2, 2)];
        assert_eq!(longest_streak(&dates), 3);
    }

    #[test]
    fn test_top_streaks_scenario() {
        let plays = vec![
            play("Song", "Artist", "2024-01-01 10:00", PlayType::Intentional),
            play("Song", "Artist", "2024-01-02 10:00", PlayType::Intentional),
            play("Song", "Artist", "2024-01-10 10:00", PlayType::Intentional),
        ];
        let top = top_streaks(&plays, Limit::new(5).unwrap()).unwrap();
        assert_eq!(top, vec![EntityCount::new("Song - Artist", 2)]);
    }

    #[test]
    fn test_same_day_plays_count_once() {
        let plays = vec![
            play("A", "X", "2024-01-01 10:00", PlayType::Intentional),
            play("A", "X", "2024-01-01 11:00", PlayType::Autoplay),
            play("B", "Y", "2024-01-01 10:00", PlayType::Intentional),
            play("B", "Y", "2024-01-02 10:00", PlayType::Intentional),
        ];
        let top = top_streaks(&plays, Limit::new(5).unwrap()).unwrap();
        assert_eq!(
            top,
            vec![EntityCount::new("B - Y", 2), EntityCount::new("A - X", 1)]
        );
    }

    #[test]
    fn test_distinct_days() {
        let plays = vec![
            play("A", "X", "2024-01-01 10:00", PlayType::Intentional),
            play("A", "X", "2024-01-05 10:00", PlayType::Intentional),
            play("A", "X", "2024-01-05 12:00", PlayType::Intentional),
            play("B", "Y", "2024-01-02 10:00", PlayType::Intentional),
        ];
        let top = top_by_distinct_days(&plays, Limit::new(1).unwrap()).unwrap();
        assert_eq!(top, vec![EntityCount::new("A - X", 2)]);
    }

    #[test]
    fn test_empty_is_no_data() {
        assert!(top_streaks(&[], Limit::new(1).unwrap()).unwrap_err().is_no_data());
    }

    proptest! {
        #[test]
        fn streak_never_exceeds_distinct_days(offsets in prop::collection::vec(0i64..60, 1..40)) {
            let start = date(2024, 1, 1);
            let dates: BTreeSet<NaiveDate> = offsets
                .iter()
                .map(|&o| start + chrono::Duration::days(o))
                .collect();
            let streak = longest_streak(&dates);
            prop_assert!(streak >= 1);
            prop_assert!(streak as usize <= dates.len());
        }
    }
}
