//! Ranking helpers shared by every engine.
//!
//! All rankings order by count descending and break ties by key ascending,
//! so results never depend on input order or hash iteration order.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StatsError};
use crate::models::{EntityCount, EntityStats};

// ============================================================================
// Parameters
// ============================================================================

/// Size of a top-N ranking. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Limit(usize);

impl Limit {
    pub fn new(n: i64) -> Result<Self> {
        if n <= 0 {
            return Err(StatsError::invalid(
                "limit",
                format!("top-N size must be positive, got {n}"),
            ));
        }
        Ok(Limit(n as usize))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<i64> for Limit {
    type Error = StatsError;

    fn try_from(n: i64) -> Result<Self> {
        Limit::new(n)
    }
}

impl From<Limit> for i64 {
    fn from(limit: Limit) -> i64 {
        limit.0 as i64
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bucket size for the spiral engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Day,
    /// ISO week, starting Monday
    Week,
    /// Calendar month
    Month,
    /// Treated as `Day`
    All,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::All => "all",
        }
    }

    /// First date of the bucket containing `date`.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day | Granularity::All => date,
            Granularity::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }
}

impl FromStr for Granularity {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "all" => Ok(Granularity::All),
            other => Err(StatsError::invalid(
                "granularity",
                format!("expected day, week, month or all, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Count descending, then key ascending.
pub fn by_count_then_key(a_count: u64, a_key: &str, b_count: u64, b_key: &str) -> Ordering {
    b_count.cmp(&a_count).then_with(|| a_key.cmp(b_key))
}

/// Rank (key, count) pairs and keep the first `limit`.
pub fn top_counts<I>(counts: I, limit: Limit) -> Vec<EntityCount>
where
    I: IntoIterator<Item = (String, u64)>,
{
    let mut rows: Vec<EntityCount> = counts
        .into_iter()
        .map(|(key, count)| EntityCount { key, count })
        .collect();
    rows.sort_unstable_by(|a, b| by_count_then_key(a.count, &a.key, b.count, &b.key));
    rows.truncate(limit.get());
    rows
}

/// Rank entity stats by plays and keep the first `limit`.
pub fn top_stats<I>(stats: I, limit: Limit) -> Vec<EntityStats>
where
    I: IntoIterator<Item = EntityStats>,
{
    let mut rows: Vec<EntityStats> = stats.into_iter().collect();
    rows.sort_unstable_by(|a, b| by_count_then_key(a.plays, &a.key, b.plays, &b.key));
    rows.truncate(limit.get());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_rejects_non_positive() {
        assert!(Limit::new(0).is_err());
        assert!(Limit::new(-3).is_err());
        assert_eq!(Limit::new(5).unwrap().get(), 5);
    }

    #[test]
    fn test_limit_deserialize_validates() {
        assert!(serde_json::from_str::<Limit>("0").is_err());
        assert_eq!(serde_json::from_str::<Limit>("7").unwrap().get(), 7);
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert_eq!("all".parse::<Granularity>().unwrap(), Granularity::All);
        let err = "fortnight".parse::<Granularity>().unwrap_err();
        assert!(matches!(err, StatsError::InvalidParameter { name: "granularity", .. }));
    }

    #[test]
    fn test_bucket_start() {
        // 2024-01-10 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(Granularity::Day.bucket_start(date), date);
        assert_eq!(Granularity::All.bucket_start(date), date);
        assert_eq!(
            Granularity::Week.bucket_start(date),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
        assert_eq!(
            Granularity::Month.bucket_start(date),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        // Sunday belongs to the week that started the previous Monday
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        assert_eq!(
            Granularity::Week.bucket_start(sunday),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_ties_break_by_key() {
        let ranked = top_counts(
            vec![
                ("b".to_string(), 3),
                ("c".to_string(), 5),
                ("a".to_string(), 3),
                ("d".to_string(), 1),
            ],
            Limit::new(3).unwrap(),
        );
        let keys: Vec<&str> = ranked.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ranking_independent_of_input_order() {
        let mut pairs: Vec<(String, u64)> =
            (0..20).map(|i| (format!("k{i:02}"), (i % 4) as u64)).collect();
        let limit = Limit::new(7).unwrap();
        let forward = top_counts(pairs.clone(), limit);
        pairs.reverse();
        assert_eq!(forward, top_counts(pairs, limit));
    }
}
