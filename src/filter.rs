//! Validity filter: data-quality gate followed by the adaptive duration gate.
//!
//! Stage A drops records Spotify logged without a duration or metadata.
//! Stage B applies per play type thresholds:
//!
//! - INTENTIONAL / UNKNOWN: `ms_played >= min_intentional_ms`
//! - AUTOPLAY: `play_fraction >= min_autoplay_fraction` OR
//!   `ms_played >= min_autoplay_ms`, where the fraction is taken against an
//!   estimated duration (the reference average, or `ms_played` itself when
//!   longer).

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::models::{AcceptedEvent, ClassifiedEvent, PlayType};

/// Why an event was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `ms_played <= 0`
    NonPositiveDuration,
    /// Track name, artist name or track URI missing or blank
    MissingMetadata,
    /// Played too briefly for its play type
    TooShort(PlayType),
}

/// Per-category counts for auditing a filter run.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub received: usize,

    // Stage A
    pub non_positive_duration: usize,
    pub missing_metadata: usize,

    // Stage B, totals counted after stage A
    pub intentional_total: usize,
    pub intentional_accepted: usize,
    pub autoplay_total: usize,
    pub autoplay_accepted: usize,
    pub unknown_total: usize,
    pub unknown_accepted: usize,

    pub accepted: usize,
}

impl FilterReport {
    pub fn removed_for(&self, play_type: PlayType) -> usize {
        match play_type {
            PlayType::Intentional => self.intentional_total - self.intentional_accepted,
            PlayType::Autoplay => self.autoplay_total - self.autoplay_accepted,
            PlayType::Unknown => self.unknown_total - self.unknown_accepted,
        }
    }

    pub fn total_removed(&self) -> usize {
        self.received - self.accepted
    }

    /// Accepted share of the received events, as a percentage.
    pub fn retention_rate(&self) -> f64 {
        if self.received == 0 {
            0.0
        } else {
            100.0 * self.accepted as f64 / self.received as f64
        }
    }

    fn record(&mut self, play_type: PlayType, verdict: Result<(), Rejection>) {
        match verdict {
            Err(Rejection::NonPositiveDuration) => {
                self.non_positive_duration += 1;
                return;
            }
            Err(Rejection::MissingMetadata) => {
                self.missing_metadata += 1;
                return;
            }
            _ => {}
        }
        let accepted = verdict.is_ok();
        let (total, kept) = match play_type {
            PlayType::Intentional => (&mut self.intentional_total, &mut self.intentional_accepted),
            PlayType::Autoplay => (&mut self.autoplay_total, &mut self.autoplay_accepted),
            PlayType::Unknown => (&mut self.unknown_total, &mut self.unknown_accepted),
        };
        *total += 1;
        if accepted {
            *kept += 1;
            self.accepted += 1;
        }
    }

    /// Log the report through `tracing`.
    pub fn log_summary(&self, config: &AnalysisConfig) {
        info!(
            received = self.received,
            non_positive_duration = self.non_positive_duration,
            missing_metadata = self.missing_metadata,
            "data-quality gate"
        );
        info!(
            total = self.intentional_total,
            accepted = self.intentional_accepted,
            removed = self.removed_for(PlayType::Intentional),
            min_ms = config.min_intentional_ms,
            "INTENTIONAL duration gate"
        );
        info!(
            total = self.autoplay_total,
            accepted = self.autoplay_accepted,
            removed = self.removed_for(PlayType::Autoplay),
            min_fraction = config.min_autoplay_fraction,
            min_ms = config.min_autoplay_ms,
            "AUTOPLAY duration gate"
        );
        if self.unknown_total > 0 {
            info!(
                total = self.unknown_total,
                accepted = self.unknown_accepted,
                removed = self.removed_for(PlayType::Unknown),
                min_ms = config.min_intentional_ms,
                "UNKNOWN duration gate"
            );
        }
        info!(
            received = self.received,
            accepted = self.accepted,
            removed = self.total_removed(),
            retention = format!("{:.1}%", self.retention_rate()),
            "validity filter done"
        );
    }
}

/// Result of filtering a batch.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub accepted: Vec<AcceptedEvent>,
    pub report: FilterReport,
}

// ============================================================================
// Duration Estimate
// ============================================================================

/// Estimated track duration: the observed play when it exceeds the reference
/// average, otherwise the average.
pub fn estimate_duration_ms(ms_played: i64, config: &AnalysisConfig) -> i64 {
    if ms_played > config.average_track_ms {
        ms_played
    } else {
        config.average_track_ms
    }
}

/// Share of the estimated duration that was heard.
pub fn play_fraction(ms_played: i64, estimated_duration_ms: i64) -> f64 {
    ms_played as f64 / estimated_duration_ms as f64
}

// ============================================================================
// Gates
// ============================================================================

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Stage A: data-quality gate, independent of play type.
pub fn check_data_quality(candidate: &ClassifiedEvent) -> Result<(), Rejection> {
    let event = &candidate.event;
    if event.ms_played <= 0 {
        return Err(Rejection::NonPositiveDuration);
    }
    if is_blank(&event.track_name) || is_blank(&event.artist_name) || is_blank(&event.track_uri) {
        return Err(Rejection::MissingMetadata);
    }
    Ok(())
}

/// Stage B: adaptive duration gate.
pub fn check_duration(
    play_type: PlayType,
    ms_played: i64,
    config: &AnalysisConfig,
) -> Result<(), Rejection> {
    let accepted = match play_type {
        // Unknown gets the benefit of the doubt
        PlayType::Intentional | PlayType::Unknown => ms_played >= config.min_intentional_ms,
        PlayType::Autoplay => {
            let fraction = play_fraction(ms_played, estimate_duration_ms(ms_played, config));
            fraction >= config.min_autoplay_fraction || ms_played >= config.min_autoplay_ms
        }
    };
    if accepted {
        Ok(())
    } else {
        Err(Rejection::TooShort(play_type))
    }
}

/// Run both stages on one event.
pub fn evaluate(candidate: &ClassifiedEvent, config: &AnalysisConfig) -> Result<(), Rejection> {
    check_data_quality(candidate)?;
    check_duration(candidate.play_type, candidate.event.ms_played, config)
}

/// Filter a batch, keeping arrival order.
pub fn apply(events: Vec<ClassifiedEvent>, config: &AnalysisConfig) -> FilterOutcome {
    let mut report = FilterReport {
        received: events.len(),
        ..FilterReport::default()
    };
    let mut accepted = Vec::with_capacity(events.len());

    for candidate in events {
        let verdict = evaluate(&candidate, config);
        report.record(candidate.play_type, verdict);
        match verdict {
            Ok(()) => {
                let ms_played = candidate.event.ms_played;
                let estimated_duration_ms = estimate_duration_ms(ms_played, config);
                accepted.push(AcceptedEvent {
                    event: candidate.event,
                    play_type: candidate.play_type,
                    estimated_duration_ms,
                    play_fraction: play_fraction(ms_played, estimated_duration_ms),
                });
            }
            Err(reason) => debug!(?reason, ms_played = candidate.event.ms_played, "event rejected"),
        }
    }

    FilterOutcome { accepted, report }
}
