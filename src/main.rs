use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walknav::compass::Direction;
use walknav::format::{format_distance, format_duration, maneuver_glyph};
use walknav::{
    GeoPoint, MapboxDirectionsClient, NavigationCallbacks, NavigationTracker, NmeaLocationSource,
    TrackerConfig,
};

/// Replay an NMEA log against a walking route.
#[derive(Parser)]
#[command(name = "walknav")]
#[command(about = "Turn-by-turn walking navigation over a recorded NMEA track")]
struct Cli {
    /// NMEA 0183 log; the first fix is the origin
    #[arg(long)]
    nmea: PathBuf,

    #[arg(long, allow_hyphen_values = true)]
    dest_lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    dest_lon: f64,

    /// Tracker thresholds as TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pause between replayed fixes
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Directions API base URL
    #[arg(long)]
    api_base: Option<String>,

    #[arg(long, env = "MAPBOX_TOKEN", hide_env_values = true)]
    token: String,
}

fn callbacks() -> NavigationCallbacks {
    NavigationCallbacks::new()
        .on_route_calculated(|route| {
            println!(
                "✓ Route: {} steps, {}, {}",
                route.step_count(),
                format_distance(route.total_distance_meters),
                format_duration(route.total_duration_seconds)
            );
            if let Some(first) = route.steps.first() {
                println!("  {} {}", maneuver_glyph(&first.maneuver), first.instruction);
            }
        })
        .on_location_update(|update| {
            let heading = update
                .user_heading
                .map(|h| Direction::from_heading_16(h).abbreviation())
                .unwrap_or("-");
            println!(
                "  {} | next {} | left {} | {:.0}% | {}",
                update.location,
                format_distance(update.distance_to_next),
                format_distance(update.distance_to_destination),
                update.progress * 100.0,
                heading
            );
        })
        .on_step_advanced(|step| {
            println!(
                "→ {} {} ({})",
                maneuver_glyph(&step.maneuver),
                step.instruction,
                format_distance(step.distance_meters)
            );
            if let Some(bearing) = step.bearing_after {
                println!("  Head {}", Direction::from_heading_16(bearing).name());
            }
        })
        .on_wrong_turn(|wrong_turn| {
            println!(
                "⚠ Wrong turn: {} off route",
                format_distance(wrong_turn.distance_from_route)
            );
        })
        .on_off_route(|| println!("  Recalculating..."))
        .on_route_recalculated(|route| {
            println!(
                "✓ New route: {} steps, {}",
                route.step_count(),
                format_distance(route.total_distance_meters)
            );
        })
        .on_recalculation_failed(|err| println!("✗ Recalculation failed: {}", err))
        .on_navigation_completed(|| println!("✓ You have arrived"))
        .on_error(|err| eprintln!("✗ {}", err))
        .on_navigation_stopped(|| println!("Navigation stopped"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walknav=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrackerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    let file = File::open(&cli.nmea).with_context(|| format!("opening {}", cli.nmea.display()))?;
    let samples = NmeaLocationSource::new()
        .read_samples(BufReader::new(file))
        .context("reading NMEA log")?;
    let Some((origin, fixes)) = samples.split_first() else {
        bail!("no position fixes in {}", cli.nmea.display());
    };
    tracing::info!("Loaded {} fixes", samples.len());

    let mut client = MapboxDirectionsClient::new(cli.token)?;
    if let Some(base) = cli.api_base {
        client = client.with_base_url(base);
    }

    let tracker = NavigationTracker::with_config(Arc::new(client), config);
    let destination = GeoPoint::new(cli.dest_lat, cli.dest_lon);
    tracker.start(*origin, destination, callbacks()).await?;

    let interval = Duration::from_millis(cli.interval_ms);
    for fix in fixes {
        if !tracker.is_active() {
            break;
        }
        if let Some(recalculation) = tracker.update_location(*fix) {
            recalculation.await.context("recalculation task")?;
        }
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    if let Some(last) = tracker.last_location() {
        println!("Last fix: {}", last);
    }
    if !tracker.is_completed() {
        tracker.stop();
    }
    Ok(())
}
