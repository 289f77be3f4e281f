//! Spiral engine: the densest bucket of intentional plays per track.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::error::{Result, StatsError};
use crate::models::{EntityCount, Play, PlayType};
use crate::ranking::{top_counts, Granularity, Limit};

/// Top `limit` tracks by the most INTENTIONAL plays in a single bucket.
pub fn top_spirals(
    plays: &[Play],
    limit: Limit,
    granularity: Granularity,
) -> Result<Vec<EntityCount>> {
    StatsError::ensure_non_empty(plays)?;

    let mut buckets: FxHashMap<(&str, NaiveDate), u64> = FxHashMap::default();
    for play in plays.iter().filter(|p| p.play_type == PlayType::Intentional) {
        let bucket = granularity.bucket_start(play.date);
        *buckets.entry((play.track_key.as_str(), bucket)).or_insert(0) += 1;
    }

    let mut peaks: FxHashMap<&str, u64> = FxHashMap::default();
    for ((key, _), count) in buckets {
        let peak = peaks.entry(key).or_insert(0);
        *peak = (*peak).max(count);
    }

    Ok(top_counts(
        peaks.into_iter().map(|(key, count)| (key.to_string(), count)),
        limit,
    ))
}
