//! Dataset: one owner's valid plays, built once by the pipeline
//! (classify → filter → enrich) and shared read-only by every engine.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;
use tracing::info;

use crate::classify::classify_all;
use crate::config::AnalysisConfig;
use crate::enrich::enrich_all;
use crate::error::{Result, StatsError};
use crate::filter::{self, FilterReport};
use crate::models::{Play, RawEvent};
use crate::normalize::normalize_albums;
use crate::summary::{available_years, DatasetSummary, Scope};

#[derive(Debug, Clone)]
pub struct Dataset {
    owner: String,
    plays: Vec<Play>,
    report: FilterReport,
    config: AnalysisConfig,
    scope: Scope,
    albums_normalized: bool,
    revision: u64,
}

impl Dataset {
    /// Run the pipeline over `events`.
    ///
    /// Fails with `NoValidData` when `events` is empty or nothing survives
    /// the validity filter.
    pub fn build(owner: impl Into<String>, events: Vec<RawEvent>, config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let owner = owner.into();
        let received = events.len();
        if received == 0 {
            return Err(StatsError::NoValidData { received });
        }

        let start = Instant::now();
        let classified = classify_all(events);
        let outcome = filter::apply(classified, config);
        outcome.report.log_summary(config);
        if outcome.accepted.is_empty() {
            return Err(StatsError::NoValidData { received });
        }
        let plays = enrich_all(outcome.accepted);

        info!(
            owner = %owner,
            received,
            plays = plays.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset built"
        );

        Ok(Self::assemble(owner, plays, outcome.report, config.clone(), Scope::default(), false))
    }

    fn assemble(
        owner: String,
        plays: Vec<Play>,
        report: FilterReport,
        config: AnalysisConfig,
        scope: Scope,
        albums_normalized: bool,
    ) -> Self {
        let revision = revision_of(&plays);
        Self {
            owner,
            plays,
            report,
            config,
            scope,
            albums_normalized,
            revision,
        }
    }

    /// Plays within `scope`. May be empty; engines then report no data.
    pub fn scoped(&self, scope: Scope) -> Self {
        let plays: Vec<Play> = self.plays.iter().filter(|p| scope.contains(p)).cloned().collect();
        info!(
            owner = %self.owner,
            scope = %scope.label(),
            plays = plays.len(),
            "Scoped dataset"
        );
        Self::assemble(
            self.owner.clone(),
            plays,
            self.report.clone(),
            self.config.clone(),
            scope,
            self.albums_normalized,
        )
    }

    /// Dataset with album spellings merged at the configured threshold.
    pub fn with_normalized_albums(&self) -> Self {
        let plays = normalize_albums(&self.plays, self.config.album_similarity_threshold);
        Self::assemble(
            self.owner.clone(),
            plays,
            self.report.clone(),
            self.config.clone(),
            self.scope,
            true,
        )
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn plays(&self) -> &[Play] {
        &self.plays
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    /// Filter report of the original build, unaffected by scoping.
    pub fn filter_report(&self) -> &FilterReport {
        &self.report
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn albums_normalized(&self) -> bool {
        self.albums_normalized
    }

    /// Content hash of the plays; changes whenever the plays do.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn available_years(&self) -> Vec<i32> {
        available_years(&self.plays)
    }

    pub fn summary(&self) -> Result<DatasetSummary> {
        DatasetSummary::from_plays(&self.plays)
    }
}

fn revision_of(plays: &[Play]) -> u64 {
    let mut hasher = FxHasher::default();
    plays.len().hash(&mut hasher);
    for play in plays {
        play.timestamp.hash(&mut hasher);
        play.ms_played.hash(&mut hasher);
        play.track_key.hash(&mut hasher);
        play.album_key.hash(&mut hasher);
        play.track_uri.hash(&mut hasher);
        play.play_type.hash(&mut hasher);
        play.skipped.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::raw;

    fn events() -> Vec<RawEvent> {
        vec![
            raw("A", "X", "2023-12-31 22:00", 90_000, "clickrow"),
            raw("A", "X", "2024-01-01 10:00", 90_000, "clickrow"),
            raw("B", "Y", "2024-01-01 10:05", 140_000, "trackdone"),
            raw("C", "Z", "2024-02-01 10:05", 160_000, "trackdone"),
            raw("D", "Z", "2024-02-01 10:10", 0, "clickrow"),
        ]
    }

    #[test]
    fn test_build_runs_pipeline() {
        let dataset = Dataset::build("user-1", events(), &AnalysisConfig::default()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.owner(), "user-1");
        assert_eq!(dataset.filter_report().received, 5);
        assert_eq!(dataset.filter_report().non_positive_duration, 1);
        assert_eq!(dataset.filter_report().autoplay_accepted, 1);
        assert_eq!(dataset.available_years(), vec![2023, 2024]);
    }

    #[test]
    fn test_build_empty_is_no_data() {
        let err = Dataset::build("u", Vec::new(), &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, StatsError::NoValidData { received: 0 }));
    }

    #[test]
    fn test_build_nothing_survives() {
        let events = vec![raw("A", "X", "2024-01-01 10:00", 5_000, "clickrow")];
        let err = Dataset::build("u", events, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, StatsError::NoValidData { received: 1 }));
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let config = AnalysisConfig {
            min_intentional_ms: -1,
            ..AnalysisConfig::default()
        };
        let err = Dataset::build("u", events(), &config).unwrap_err();
        assert!(matches!(err, StatsError::InvalidParameter { name: "min_intentional_ms", .. }));
    }

    #[test]
    fn test_scoped() {
        let dataset = Dataset::build("u", events(), &AnalysisConfig::default()).unwrap();
        let jan = dataset.scoped(Scope::new(Some(2024), Some(1)).unwrap());
        assert_eq!(jan.len(), 1);
        assert_ne!(jan.revision(), dataset.revision());

        let none = dataset.scoped(Scope::new(Some(2019), None).unwrap());
        assert!(none.is_empty());
        assert!(none.summary().unwrap_err().is_no_data());
    }

    #[test]
    fn test_revision_is_content_hash() {
        let config = AnalysisConfig::default();
        let a = Dataset::build("u", events(), &config).unwrap();
        let b = Dataset::build("other", events(), &config).unwrap();
        assert_eq!(a.revision(), b.revision());

        let mut changed = events();
        changed[0].ms_played += 1;
        let c = Dataset::build("u", changed, &config).unwrap();
        assert_ne!(a.revision(), c.revision());
    }

    #[test]
    fn test_normalized_albums_flag() {
        let dataset = Dataset::build("u", events(), &AnalysisConfig::default()).unwrap();
        let normalized = dataset.with_normalized_albums();
        assert!(normalized.albums_normalized());
        assert_eq!(normalized.len(), dataset.len());
    }
}
