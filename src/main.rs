//! CLI entry point for the Citi Bike insights dashboard.
//!
//! Provides subcommands for the overview report, the station ranking, the
//! weather-impact daily series, exporting and generating aggregate tables,
//! locating the station map, and a watch loop that rebuilds on input change.

use anyhow::Result;
use chrono::NaiveDate;
use citibike_insights::{
    analyzers::types::Season,
    cache::DashboardCache,
    config::DashboardConfig,
    map::load_map,
    output::{export_tables, log_daily, log_notices, log_stations, log_stats, print_json},
    pipeline::build_dashboard,
    stats::DashboardStats,
    synthetic::{generate_daily_series, generate_stations},
};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "citibike_insights")]
#[command(
    about = "Explore NYC Citi Bike usage: station rankings, daily trips and weather impact",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// JSON configuration file (candidate paths and parameters)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base directory the default candidate paths are resolved against
    #[arg(short = 'b', long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// Reject a whole file on its first malformed row
    #[arg(long, global = true, default_value_t = false)]
    strict: bool,
}

#[derive(Args)]
struct DailyFilter {
    /// Only include these months (1-12), comma separated
    #[arg(short, long, value_delimiter = ',')]
    months: Vec<u32>,

    /// Only include these seasons (winter, spring, summer, fall), comma separated
    #[arg(short, long, value_delimiter = ',')]
    seasons: Vec<Season>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show headline KPIs for the loaded data
    Report {
        #[command(flatten)]
        filter: DailyFilter,

        /// Print the full dashboard as JSON instead of the KPI summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the busiest start stations
    Stations {
        /// Number of stations to list
        #[arg(short = 'n', long)]
        top: Option<usize>,
    },
    /// List daily trip counts with temperature
    Daily {
        #[command(flatten)]
        filter: DailyFilter,
    },
    /// Write the station ranking and daily series as pre-aggregated CSVs
    Export {
        /// Directory to write top_20_stations.csv and daily_aggregated_data.csv into
        #[arg(short, long, default_value = "data/processed")]
        out_dir: PathBuf,
    },
    /// Generate synthetic aggregate CSVs
    Generate {
        /// First date of the daily series (YYYY-MM-DD)
        #[arg(long, default_value = "2022-01-01")]
        start: NaiveDate,

        /// Last date of the daily series (YYYY-MM-DD)
        #[arg(long, default_value = "2022-12-31")]
        end: NaiveDate,

        /// Seed for the noise generator
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of stations to generate
        #[arg(long, default_value_t = 20)]
        stations: usize,

        /// Directory to write the CSVs into
        #[arg(short, long, default_value = "data/processed")]
        out_dir: PathBuf,
    },
    /// Locate the pre-rendered station map
    Map,
    /// Rebuild the dashboard periodically, reusing results while inputs are unchanged
    Watch {
        /// Seconds between rebuild checks
        #[arg(short = 'r', long, default_value_t = 30)]
        interval: u64,

        /// Number of checks to run (0 = run until interrupted)
        #[arg(short = 'n', long, default_value_t = 0)]
        iterations: usize,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/citibike_insights.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("citibike_insights.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli.source)?;

    match cli.command {
        Commands::Report { filter, json } => {
            let dashboard = build_dashboard(&config)?;
            log_notices(&dashboard);

            if json {
                print_json(&dashboard)?;
            } else {
                let daily = dashboard.filtered_daily(&filter.months, &filter.seasons);
                let stats = DashboardStats::new(&dashboard.top_stations, &daily);
                log_stats(&stats);
            }
        }
        Commands::Stations { top } => {
            let config = DashboardConfig {
                top_n: top.unwrap_or(config.top_n),
                ..config
            };
            let dashboard = build_dashboard(&config)?;
            log_notices(&dashboard);
            log_stations(&dashboard.top_stations);
        }
        Commands::Daily { filter } => {
            let dashboard = build_dashboard(&config)?;
            log_notices(&dashboard);
            log_daily(&dashboard.filtered_daily(&filter.months, &filter.seasons));
        }
        Commands::Export { out_dir } => {
            let dashboard = build_dashboard(&config)?;
            log_notices(&dashboard);
            if dashboard.is_synthetic() {
                warn!("Exporting sample data; no real source was found");
            }
            export_tables(&out_dir, &dashboard.top_stations, &dashboard.daily)?;
        }
        Commands::Generate {
            start,
            end,
            seed,
            stations,
            out_dir,
        } => {
            let daily = generate_daily_series(start, end, seed)?;
            let stations = generate_stations(stations);
            export_tables(&out_dir, &stations, &daily)?;
        }
        Commands::Map => match load_map(&config.map_candidates)? {
            Some(map) => {
                info!(path = %map.path.display(), bytes = map.bytes.len(), "Map available");
            }
            None => {
                warn!(
                    candidates = config.map_candidates.len(),
                    "Map file is not available in the expected locations"
                );
                for path in &config.map_candidates {
                    info!(path = %path.display(), "Expected location");
                }
            }
        },
        Commands::Watch {
            interval,
            iterations,
        } => {
            watch(&config, interval, iterations)?;
        }
    }

    Ok(())
}

/// Builds the effective configuration from CLI flags and the optional file.
fn resolve_config(args: &SourceArgs) -> Result<DashboardConfig> {
    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::with_base_dir(&args.base_dir),
    };
    if args.strict {
        config.strict_rows = true;
    }
    Ok(config)
}

/// Re-checks the inputs every `interval` seconds and logs fresh KPIs only
/// when the fingerprint changed.
#[tracing::instrument(skip(config))]
fn watch(config: &DashboardConfig, interval: u64, iterations: usize) -> Result<()> {
    let mut cache = DashboardCache::new(4);
    let mut round = 0usize;

    if iterations == 0 {
        info!(interval, "Watching inputs. Press Ctrl+C to stop.");
    }

    loop {
        if iterations > 0 && round >= iterations {
            break;
        }
        round += 1;

        let misses_before = cache.misses();
        match cache.dashboard(config) {
            Ok(dashboard) if cache.misses() > misses_before => {
                info!(round, "Inputs changed, dashboard rebuilt");
                log_notices(&dashboard);
                log_stats(&DashboardStats::new(&dashboard.top_stations, &dashboard.daily));
            }
            Ok(_) => info!(round, hits = cache.hits(), "Inputs unchanged"),
            Err(e) => return Err(e.into()),
        }

        if iterations == 0 || round < iterations {
            std::thread::sleep(Duration::from_secs(interval));
        }
    }

    info!(rounds = round, "Watch finished");
    Ok(())
}
