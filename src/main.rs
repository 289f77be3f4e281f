use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use rusqlite::Connection;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use listening_stats::export::{load_cache, save_cache, write_report};
use listening_stats::ingest::{is_history_file, parse_history, IngestOutcome};
use listening_stats::progress::{create_progress_bar, create_spinner, format_duration, log_progress, set_log_only};
use listening_stats::safety::{validate_output_path, OUTPUT_MARKER};
use listening_stats::{
    AnalysisConfig, Analytics, Dataset, Granularity, Limit, Report, ReportRequest, ResultCache, Scope,
};

#[derive(Parser)]
#[command(name = "listening-stats")]
#[command(about = "Listening statistics from Spotify extended streaming history")]
struct Args {
    /// Folder with Streaming_History_Audio_*.json files
    history_dir: PathBuf,

    /// Write the report as JSON (file name must contain "stats")
    #[arg(long)]
    output: Option<PathBuf>,

    /// Append the report to an SQLite database (file name must contain "stats")
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// SQLite file for persisting computed results between runs
    #[arg(long)]
    cache_db: Option<PathBuf>,

    /// Size of every top-N ranking
    #[arg(long, default_value = "10")]
    top: i64,

    /// Spiral bucket: day, week, month or all
    #[arg(long, default_value = "day")]
    period: Granularity,

    #[arg(long)]
    year: Option<i32>,

    #[arg(long)]
    month: Option<u32>,

    /// Track key ("Track - Artist") to include a day-by-day calendar for
    #[arg(long)]
    track: Option<String>,

    /// Merge near-identical album names before ranking
    #[arg(long)]
    normalize_albums: bool,

    /// JSON file with analysis settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    min_intentional_ms: Option<i64>,

    #[arg(long)]
    min_autoplay_ms: Option<i64>,

    #[arg(long)]
    min_autoplay_fraction: Option<f64>,

    #[arg(long)]
    average_track_ms: Option<i64>,

    #[arg(long)]
    session_gap_minutes: Option<i64>,

    #[arg(long)]
    album_similarity_threshold: Option<f64>,

    /// Owner id used to key cached results
    #[arg(long, default_value = "default")]
    user: String,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars, log progress instead
    #[arg(long)]
    log_only: bool,
}

fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };

    if let Some(v) = args.min_intentional_ms {
        config.min_intentional_ms = v;
    }
    if let Some(v) = args.min_autoplay_ms {
        config.min_autoplay_ms = v;
    }
    if let Some(v) = args.min_autoplay_fraction {
        config.min_autoplay_fraction = v;
    }
    if let Some(v) = args.average_track_ms {
        config.average_track_ms = v;
    }
    if let Some(v) = args.session_gap_minutes {
        config.session_gap_minutes = v;
    }
    if let Some(v) = args.album_similarity_threshold {
        config.album_similarity_threshold = v;
    }

    config.validate()?;
    Ok(config)
}

fn discover_history_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read history folder {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_history_file)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        bail!("No Streaming_History_Audio_*.json files in {}", dir.display());
    }
    Ok(files)
}

fn load_history(files: &[PathBuf]) -> Result<IngestOutcome> {
    let pb = create_progress_bar(files.len() as u64, "Phase 1: Reading history");
    let total = files.len() as u64;

    let parsed: Vec<IngestOutcome> = files
        .par_iter()
        .map(|path| -> Result<IngestOutcome> {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let outcome = parse_history(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
            pb.inc(1);
            log_progress("read", pb.position(), total, 1);
            Ok(outcome)
        })
        .collect::<Result<_>>()?;

    let mut history = IngestOutcome::default();
    for outcome in parsed {
        history.extend(outcome);
    }
    pb.finish_with_message(format!("Phase 1: Read {} events", history.events.len()));
    Ok(history)
}

fn print_report(report: &Report) {
    let summary = &report.summary;
    println!("\n{:=<60}", "");
    println!("Listening stats for '{}' ({})", report.owner, report.scope.label());
    println!("  Plays: {} ({} removed by filter)", summary.total_plays, report.filter.total_removed());
    println!("  Period: {} → {} ({} days)", summary.first_play, summary.last_play, summary.span_days);
    println!(
        "  Unique: {} tracks, {} artists, {} albums",
        summary.unique_tracks, summary.unique_artists, summary.unique_albums
    );
    println!("  Listening time: {:.1} h, skip rate {:.1}%", summary.total_hours, 100.0 * summary.skip_rate);
    println!("  Sessions: {}", report.patterns.session_count);

    println!("\nTop tracks:");
    for (rank, row) in report.rankings.tracks.iter().enumerate() {
        println!("  {:>2}. {} ({} plays, {:.1} h)", rank + 1, row.key, row.plays, row.total_hours());
    }
    println!("\nLongest streaks:");
    for row in &report.patterns.streaks {
        println!("  {} days  {}", row.count, row.key);
    }
    println!("\nSpirals ({}):", report.granularity);
    for row in &report.patterns.spirals {
        println!("  {} plays  {}", row.count, row.key);
    }
    println!("\nRepeat sessions:");
    for row in &report.patterns.repeat_sessions {
        println!("  {} sessions  {}", row.count, row.key);
    }
    println!("{:=<60}", "");
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();
    let config = load_config(&args)?;
    let request = ReportRequest {
        limit: Limit::new(args.top)?,
        granularity: args.period,
        track: args.track.clone(),
    };
    let scope = Scope::new(args.year, args.month)?;

    let files = discover_history_files(&args.history_dir)?;
    info!(files = files.len(), folder = %args.history_dir.display(), "Found history files");
    let mut sources: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
    sources.push(args.history_dir.as_path());

    let history = load_history(&files)?;
    if history.malformed > 0 {
        warn!(malformed = history.malformed, "Skipped unreadable records");
    }

    let mut dataset = Dataset::build(args.user.as_str(), history.events, &config)?;
    if !scope.is_all() {
        dataset = dataset.scoped(scope);
    }
    if args.normalize_albums {
        dataset = dataset.with_normalized_albums();
    }

    let cache = ResultCache::new();
    if let Some(path) = &args.cache_db {
        validate_output_path(path, OUTPUT_MARKER, &sources)?;
        let conn = Connection::open(path).context("Failed to open cache database")?;
        load_cache(&conn, &cache, dataset.owner(), dataset.revision())?;
    }

    let spinner = create_spinner("Phase 2: Computing statistics");
    let report = match Analytics::with_cache(&dataset, &cache).report(&request) {
        Ok(report) => report,
        Err(err) if err.is_no_data() => {
            spinner.finish_with_message("Phase 2: Nothing to analyse");
            println!("No valid listening data for {}", scope.label());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    spinner.finish_with_message("Phase 2: Statistics ready");

    print_report(&report);

    if let Some(path) = &args.output {
        validate_output_path(path, OUTPUT_MARKER, &sources)?;
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report).context("Failed to write JSON report")?;
        println!("JSON report: {:?}", path);
    }

    if let Some(path) = &args.sqlite {
        validate_output_path(path, OUTPUT_MARKER, &sources)?;
        let mut conn = Connection::open(path).context("Failed to open output database")?;
        let id = write_report(&mut conn, &report)?;
        println!("SQLite report #{}: {:?}", id, path);
    }

    if let Some(path) = &args.cache_db {
        let mut conn = Connection::open(path).context("Failed to open cache database")?;
        save_cache(&mut conn, &cache)?;
    }

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        computations = stats.computations,
        recoveries = stats.recoveries,
        "Result cache"
    );
    println!("Elapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
