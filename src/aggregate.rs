//! Aggregation engine: top-N entities and the daily histogram.

use chrono::{Duration, NaiveDate};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::error::{Result, StatsError};
use crate::models::{DailyCount, EntityKind, EntityStats, Play, PlayType};
use crate::ranking::{top_stats, Limit};

/// Group plays by entity key, counting plays, listening time and skips.
fn group_stats<'a, I>(plays: I, kind: EntityKind) -> FxHashMap<&'a str, EntityStats>
where
    I: IntoIterator<Item = &'a Play>,
{
    let mut groups: FxHashMap<&'a str, EntityStats> = FxHashMap::default();
    for play in plays {
        let Some(key) = kind.key_of(play) else {
            continue;
        };
        let entry = groups.entry(key).or_insert_with(|| EntityStats {
            key: key.to_string(),
            plays: 0,
            total_ms_played: 0,
            skips: 0,
        });
        entry.plays += 1;
        entry.total_ms_played += play.ms_played;
        if play.skipped {
            entry.skips += 1;
        }
    }
    groups
}

/// Top `limit` entities of `kind` by play count.
pub fn top_entities(plays: &[Play], kind: EntityKind, limit: Limit) -> Result<Vec<EntityStats>> {
    StatsError::ensure_non_empty(plays)?;
    Ok(top_stats(group_stats(plays, kind).into_values(), limit))
}

/// Top `limit` entities counting only INTENTIONAL plays ("really played").
pub fn top_entities_intentional(
    plays: &[Play],
    kind: EntityKind,
    limit: Limit,
) -> Result<Vec<EntityStats>> {
    StatsError::ensure_non_empty(plays)?;
    let intentional = plays.iter().filter(|p| p.play_type == PlayType::Intentional);
    Ok(top_stats(group_stats(intentional, kind).into_values(), limit))
}

/// Plays per calendar date, zero-filled from the first to the last date.
pub fn daily_histogram(plays: &[Play]) -> Result<Vec<DailyCount>> {
    StatsError::ensure_non_empty(plays)?;

    let mut per_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for play in plays {
        *per_date.entry(play.date).or_insert(0) += 1;
    }

    let (Some((&first, _)), Some((&last, _))) =
        (per_date.first_key_value(), per_date.last_key_value())
    else {
        return Ok(Vec::new());
    };

    let days = (last - first).num_days() + 1;
    let mut histogram = Vec::with_capacity(days as usize);
    let mut date = first;
    while date <= last {
        histogram.push(DailyCount {
            date,
            plays: per_date.get(&date).copied().unwrap_or(0),
        });
        date += Duration::days(1);
    }
    Ok(histogram)
}
