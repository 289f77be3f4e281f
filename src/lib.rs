//! Listening statistics from Spotify extended streaming history.
//!
//! Pipeline: raw events → [`classify`] → [`filter`] → [`enrich`] →
//! optional [`normalize`] → engines ([`aggregate`], [`streak`], [`spiral`],
//! [`session`], [`calendar`]). [`dataset::Dataset`] runs the pipeline once
//! and [`analytics::Analytics`] exposes the engines, optionally memoized in
//! a [`cache::ResultCache`].

pub mod aggregate;
pub mod analytics;
pub mod cache;
pub mod calendar;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod enrich;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod ranking;
pub mod safety;
pub mod session;
pub mod spiral;
pub mod streak;
pub mod summary;

#[cfg(test)]
mod test_support;

pub use analytics::{Analytics, Report, ReportRequest};
pub use cache::{CacheKey, ResultCache};
pub use config::AnalysisConfig;
pub use dataset::Dataset;
pub use error::{Result, StatsError};
pub use models::{EntityKind, Play, PlayType, RawEvent};
pub use ranking::{Granularity, Limit};
pub use summary::Scope;
