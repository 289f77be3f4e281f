//! Analytics facade: every engine over one dataset, optionally memoized,
//! plus the full report with independent engines running in parallel.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use crate::aggregate;
use crate::cache::{CacheKey, ResultCache};
use crate::calendar;
use crate::dataset::Dataset;
use crate::error::{Result, StatsError};
use crate::filter::FilterReport;
use crate::models::{DailyCount, EntityCount, EntityKind, EntityStats};
use crate::ranking::{Granularity, Limit};
use crate::session::{self, Session};
use crate::spiral;
use crate::streak;
use crate::summary::{DatasetSummary, Scope};

// ============================================================================
// Report
// ============================================================================

/// What to include in a full report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub limit: Limit,
    pub granularity: Granularity,
    /// Track key to include a calendar for
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRankings {
    pub tracks: Vec<EntityStats>,
    pub artists: Vec<EntityStats>,
    pub albums: Vec<EntityStats>,
    pub really_played_tracks: Vec<EntityStats>,
    pub really_played_artists: Vec<EntityStats>,
    pub really_played_albums: Vec<EntityStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningPatterns {
    pub daily: Vec<DailyCount>,
    pub streaks: Vec<EntityCount>,
    pub distinct_days: Vec<EntityCount>,
    pub spirals: Vec<EntityCount>,
    pub repeat_sessions: Vec<EntityCount>,
    pub session_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCalendar {
    pub track_key: String,
    pub days: BTreeMap<NaiveDate, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub owner: String,
    pub revision: u64,
    pub scope: Scope,
    pub albums_normalized: bool,
    pub granularity: Granularity,
    pub filter: FilterReport,
    pub summary: DatasetSummary,
    pub rankings: EntityRankings,
    pub patterns: ListeningPatterns,
    pub track_calendar: Option<TrackCalendar>,
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Clone, Copy)]
pub struct Analytics<'a> {
    dataset: &'a Dataset,
    cache: Option<&'a ResultCache>,
}

impl<'a> Analytics<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset, cache: None }
    }

    pub fn with_cache(dataset: &'a Dataset, cache: &'a ResultCache) -> Self {
        Self {
            dataset,
            cache: Some(cache),
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    fn cached<T, F>(&self, engine: &str, params: String, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Result<T>,
    {
        match self.cache {
            Some(cache) => {
                let key = CacheKey::new(self.dataset.owner(), self.dataset.revision(), engine, params);
                cache.get_or_compute(&key, compute)
            }
            None => compute(),
        }
    }

    pub fn top_entities(&self, kind: EntityKind, limit: Limit) -> Result<Vec<EntityStats>> {
        self.cached("top_entities", format!("{}:n={limit}", kind.as_str()), || {
            aggregate::top_entities(self.dataset.plays(), kind, limit)
        })
    }

    pub fn top_entities_intentional(&self, kind: EntityKind, limit: Limit) -> Result<Vec<EntityStats>> {
        self.cached("top_entities_intentional", format!("{}:n={limit}", kind.as_str()), || {
            aggregate::top_entities_intentional(self.dataset.plays(), kind, limit)
        })
    }

    pub fn daily_histogram(&self) -> Result<Vec<DailyCount>> {
        self.cached("daily_histogram", String::new(), || {
            aggregate::daily_histogram(self.dataset.plays())
        })
    }

    pub fn top_streaks(&self, limit: Limit) -> Result<Vec<EntityCount>> {
        self.cached("top_streaks", format!("n={limit}"), || {
            streak::top_streaks(self.dataset.plays(), limit)
        })
    }

    pub fn top_by_distinct_days(&self, limit: Limit) -> Result<Vec<EntityCount>> {
        self.cached("top_by_distinct_days", format!("n={limit}"), || {
            streak::top_by_distinct_days(self.dataset.plays(), limit)
        })
    }

    pub fn top_spirals(&self, limit: Limit, granularity: Granularity) -> Result<Vec<EntityCount>> {
        self.cached("top_spirals", format!("n={limit}:period={granularity}"), || {
            spiral::top_spirals(self.dataset.plays(), limit, granularity)
        })
    }

    pub fn top_repeat_sessions(&self, limit: Limit) -> Result<Vec<EntityCount>> {
        let gap = self.dataset.config().session_gap();
        self.cached("top_repeat_sessions", format!("n={limit}:gap={}", gap.num_minutes()), || {
            session::top_repeat_sessions(self.dataset.plays(), gap, limit)
        })
    }

    pub fn sessions(&self) -> Result<Vec<Session>> {
        let gap = self.dataset.config().session_gap();
        self.cached("sessions", format!("gap={}", gap.num_minutes()), || {
            session::segment_sessions(self.dataset.plays(), gap)
        })
    }

    /// Never fails for lack of data: an unknown track gives an empty map.
    pub fn track_calendar(&self, track_key: &str) -> Result<BTreeMap<NaiveDate, u64>> {
        self.cached("track_calendar", track_key.to_string(), || {
            Ok(calendar::track_calendar(self.dataset.plays(), track_key))
        })
    }

    pub fn summary(&self) -> Result<DatasetSummary> {
        self.cached("summary", String::new(), || self.dataset.summary())
    }

    fn rankings(&self, limit: Limit) -> Result<EntityRankings> {
        let (all, intentional) = rayon::join(
            || -> Result<[Vec<EntityStats>; 3]> {
                Ok([
                    self.top_entities(EntityKind::Track, limit)?,
                    self.top_entities(EntityKind::Artist, limit)?,
                    self.top_entities(EntityKind::Album, limit)?,
                ])
            },
            || -> Result<[Vec<EntityStats>; 3]> {
                Ok([
                    self.top_entities_intentional(EntityKind::Track, limit)?,
                    self.top_entities_intentional(EntityKind::Artist, limit)?,
                    self.top_entities_intentional(EntityKind::Album, limit)?,
                ])
            },
        );
        let [tracks, artists, albums] = all?;
        let [really_played_tracks, really_played_artists, really_played_albums] = intentional?;
        Ok(EntityRankings {
            tracks,
            artists,
            albums,
            really_played_tracks,
            really_played_artists,
            really_played_albums,
        })
    }

    fn patterns(&self, limit: Limit, granularity: Granularity) -> Result<ListeningPatterns> {
        let ((daily, streaks), ((distinct_days, spirals), (repeat_sessions, sessions))) = rayon::join(
            || rayon::join(|| self.daily_histogram(), || self.top_streaks(limit)),
            || {
                rayon::join(
                    || rayon::join(|| self.top_by_distinct_days(limit), || self.top_spirals(limit, granularity)),
                    || rayon::join(|| self.top_repeat_sessions(limit), || self.sessions()),
                )
            },
        );
        Ok(ListeningPatterns {
            daily: daily?,
            streaks: streaks?,
            distinct_days: distinct_days?,
            spirals: spirals?,
            repeat_sessions: repeat_sessions?,
            session_count: sessions?.len() as u64,
        })
    }

    /// Run every engine and collect the results.
    pub fn report(&self, request: &ReportRequest) -> Result<Report> {
        if self.dataset.is_empty() {
            return Err(StatsError::NoValidData {
                received: self.dataset.filter_report().received,
            });
        }

        let start = Instant::now();
        let (summary, (rankings, patterns)) = rayon::join(
            || self.summary(),
            || {
                rayon::join(
                    || self.rankings(request.limit),
                    || self.patterns(request.limit, request.granularity),
                )
            },
        );
        let track_calendar = match &request.track {
            Some(key) => Some(TrackCalendar {
                track_key: key.clone(),
                days: self.track_calendar(key)?,
            }),
            None => None,
        };

        let report = Report {
            owner: self.dataset.owner().to_string(),
            revision: self.dataset.revision(),
            scope: self.dataset.scope(),
            albums_normalized: self.dataset.albums_normalized(),
            granularity: request.granularity,
            filter: self.dataset.filter_report().clone(),
            summary: summary?,
            rankings: rankings?,
            patterns: patterns?,
            track_calendar,
        };
        info!(
            owner = %report.owner,
            plays = report.summary.total_plays,
            sessions = report.patterns.session_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Report complete"
        );
        Ok(report)
    }
}
