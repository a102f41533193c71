//! CLI entry point for the transit tool.
//!
//! Provides subcommands for caching agency static data, showing real-time
//! arrivals (optionally in a self-refreshing watch mode), listing service
//! incidents, and reading/writing configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit::{
    api::{self, LineColor, Prediction, TransitApi},
    config::{self, Config},
    db::{Database, models::LocationSlug},
    error::{EXIT_BAD_CONFIG, TransitError, exit_code_for},
};

const ALT_SCREEN_ENTER: &str = "\x1b[?1049h";
const ALT_SCREEN_EXIT: &str = "\x1b[?1049l";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Parser)]
#[command(name = "transit")]
#[command(about = "Real-time transit arrivals in your terminal", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and cache static data for the configured location
    Init,
    /// Show upcoming arrivals for one or more stations
    At {
        /// Station names (fuzzy-matched against the cached stops)
        #[arg(value_name = "STATION", required = true)]
        stations: Vec<String>,

        /// Refresh continuously until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Show current service incidents
    Incidents,
    /// Read or write configuration values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the value of a config key (e.g. core.location)
    Get { key: String },
    /// Set a config key to a value
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config problems get their own exit code, and logging verbosity depends
    // on the config, so loading happens before anything else.
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(EXIT_BAD_CONFIG);
        }
    };

    init_logging(cli.verbose || config.core.verbose);

    if let Err(err) = run(cli.command, config).await {
        error!(error = format!("{err:#}"), "command failed");
        process::exit(exit_code_for(&err));
    }
}

fn load_config() -> Result<Config> {
    Config::load(&config::config_file()?)
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "transit=debug" } else { "transit=info" };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        );

    tracing_subscriber::registry().with(stderr_layer).init();
}

async fn run(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Init => {
            let location = configured_location(&config)?;
            let api = api::client_for(location, &config)?;
            let db = open_database().await?;
            run_init(location, api.as_ref(), &db).await
        }
        Commands::At { stations, watch } => {
            let location = configured_location(&config)?;
            let api: Arc<dyn TransitApi> = Arc::from(api::client_for(location, &config)?);
            let db = open_database().await?;

            if watch {
                watch_arrivals(api, db, stations, config.core.watch_interval).await
            } else {
                print_arrivals(api.as_ref(), &db, &stations).await
            }
        }
        Commands::Incidents => {
            let location = configured_location(&config)?;
            let api = api::client_for(location, &config)?;
            run_incidents(api.as_ref()).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => {
                let value = config.get_value(&key).ok_or_else(|| {
                    TransitError::Config(format!("unknown config key '{key}'"))
                })?;
                println!("{value}");
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                config.set_value(&key, &value)?;
                config.save(&config::config_file()?)
            }
        },
    }
}

fn configured_location(config: &Config) -> Result<LocationSlug> {
    Ok(config.core.location.parse()?)
}

/// Opens the cache database under the config directory and brings its schema
/// up to date.
async fn open_database() -> Result<Database> {
    let dir = config::config_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {dir:?}"))?;

    let db = Database::connect(&config::database_file()?).await?;
    db.sync_migrations().await?;
    Ok(db)
}

/// Downloads and caches static data, unless the location is already cached.
async fn run_init(location: LocationSlug, api: &dyn TransitApi, db: &Database) -> Result<()> {
    let Some(region) = db.get_location(location).await? else {
        let known: Vec<String> = db
            .get_all_locations()
            .await?
            .into_iter()
            .map(|l| l.slug.to_string())
            .collect();
        return Err(TransitError::Config(format!(
            "location '{location}' is not in the database; known locations: {}",
            known.join(", ")
        ))
        .into());
    };

    if db.count_stops_by_location(location).await? > 0 {
        info!(%location, "static data already cached; nothing to do");
        return Ok(());
    }

    info!(region = %region.name, "fetching static data");
    let data = api.fetch_static_data().await?;

    db.insert_agencies(&data.agencies).await?;
    db.insert_stops(&data.stops).await?;

    info!(
        %location,
        agencies = data.agencies.len(),
        stops = data.stops.len(),
        "static data cached"
    );
    Ok(())
}

/// Resolves each station argument and prints its upcoming arrivals, grouped
/// by stop and destination, with ghost trains filtered out.
async fn print_arrivals(api: &dyn TransitApi, db: &Database, stations: &[String]) -> Result<()> {
    for station in stations {
        let inputs = api.prediction_input(db, station).await?;
        if inputs.is_empty() {
            // The resolver already warned about why.
            continue;
        }

        let mut predictions = api.fetch_predictions(&inputs).await?;
        predictions.retain(|p| !api.is_ghost_train(p));

        let mut by_stop: BTreeMap<&str, Vec<&Prediction>> = BTreeMap::new();
        for prediction in &predictions {
            by_stop
                .entry(prediction.location_name.as_str())
                .or_default()
                .push(prediction);
        }

        for (stop_name, rows) in by_stop {
            println!("{stop_name}");

            // One row per (line, destination), collecting its arrival times.
            let mut by_destination: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
            for prediction in rows {
                let destination = if prediction.destination_name.is_empty() {
                    prediction.destination.as_str()
                } else {
                    prediction.destination_name.as_str()
                };
                by_destination
                    .entry((prediction.line.as_str(), destination))
                    .or_default()
                    .push(prediction.min.as_str());
            }

            for ((line, destination), minutes) in by_destination {
                println!(
                    "  {} {:<28} {} min",
                    paint_line(line, api.line_color(line)),
                    destination,
                    minutes.join(", ")
                );
            }
            println!();
        }
    }

    Ok(())
}

/// Runs the arrival board on the alternate screen, refreshing on an interval
/// until interrupted.
async fn watch_arrivals(
    api: Arc<dyn TransitApi>,
    db: Database,
    stations: Vec<String>,
    interval: u64,
) -> Result<()> {
    print!("{ALT_SCREEN_ENTER}");
    std::io::stdout().flush()?;

    let refresher = tokio::spawn(async move {
        loop {
            print!("{CLEAR_SCREEN}");
            let _ = std::io::stdout().flush();

            if let Err(err) = print_arrivals(api.as_ref(), &db, &stations).await {
                error!(error = format!("{err:#}"), "refresh failed");
            }

            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    refresher.abort();

    print!("{ALT_SCREEN_EXIT}");
    std::io::stdout().flush()?;
    Ok(())
}

async fn run_incidents(api: &dyn TransitApi) -> Result<()> {
    let incidents = api.fetch_incidents().await?;
    if incidents.is_empty() {
        println!("No reported incidents.");
        return Ok(());
    }

    for incident in incidents {
        let affected = if incident.affected.is_empty() {
            String::new()
        } else {
            format!(" [{}]", incident.affected.join(", "))
        };

        println!(
            "{}{affected} ({})",
            incident.date_updated.format("%Y-%m-%d %H:%M UTC"),
            incident.incident_type
        );
        println!("  {}", incident.description);
        println!();
    }

    Ok(())
}

/// Renders a line designator as a truecolor badge.
fn paint_line(line: &str, (bg, fg): LineColor) -> String {
    let (fr, fg_, fb) = rgb(fg);
    let (br, bg_, bb) = rgb(bg);
    format!("\x1b[38;2;{fr};{fg_};{fb}m\x1b[48;2;{br};{bg_};{bb}m {line} \x1b[0m")
}

fn rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    let channel =
        |range| u8::from_str_radix(hex.get(range).unwrap_or("0"), 16).unwrap_or(0);
    (channel(0..2), channel(2..4), channel(4..6))
}
