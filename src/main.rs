use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::Level;

use zonemap::api::{GeometrySource, NominatimGeocoder, source_for};
use zonemap::config::FileConfig;
use zonemap::{
    Coordinate, MapSurface, Resolution, ZoneId, ZoneLayerCache, ZoneResolver, lookup_zip,
};

/// Find and map USDA plant hardiness zones
///
/// Examples:
///   # Which zone is Beverly Hills in?
///   zonemap --zip 90210
///
///   # Resolve a coordinate directly
///   zonemap --lat 44.98 --lon -93.27
///
///   # Export two zones as styled GeoJSON
///   zonemap --show 6a,6b -o zones.geojson
///
///   # Everything, from a hosted data set
///   zonemap --show-all --data https://example.org/geojson -o all.geojson
#[derive(Parser, Debug)]
#[command(name = "zonemap")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches zonemap.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 5-digit ZIP code to look up
    #[arg(short = 'z', long)]
    zip: Option<String>,

    /// Latitude for direct coordinate lookup (use with --lon)
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude for direct coordinate lookup (use with --lat)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Zones to show, comma separated (e.g. 6a,6b)
    #[arg(long, value_delimiter = ',')]
    show: Vec<ZoneId>,

    /// Show every zone
    #[arg(long)]
    show_all: bool,

    /// Zones to hide after the show requests, comma separated
    #[arg(long, value_delimiter = ',')]
    hide: Vec<ZoneId>,

    /// Print the zone legend and exit
    #[arg(long)]
    list: bool,

    /// Write visible zone layers to this GeoJSON file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Zone data location: directory or http(s) URL containing <tier>/zone_<id>.geojson
    #[arg(long)]
    data: Option<String>,

    /// Zone data tier (e.g. balanced, original)
    #[arg(long)]
    tier: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let file_config = match args.config {
        Some(ref config_path) => {
            if !config_path.exists() {
                bail!("Config file not found: {:?}", config_path);
            }
            FileConfig::from_path(config_path)?
        }
        None => FileConfig::load().unwrap_or_default(),
    };

    let verbose = args.verbose || file_config.verbose;
    init_logging(verbose);

    if args.list {
        print_legend();
        return Ok(());
    }

    let mut zone_config = file_config.zones.clone();
    if let Some(data) = args.data.clone() {
        zone_config.base = data;
    }
    if let Some(tier) = args.tier.clone() {
        zone_config.tier = tier;
    }
    let output = args.output.clone().or_else(|| file_config.output.clone());

    if args.zip.is_none() && args.lat.is_none() && args.show.is_empty() && !args.show_all {
        bail!("Nothing to do: provide --zip, --lat/--lon, --show, --show-all or --list");
    }

    if verbose {
        println!("Configuration:");
        println!("  Zone data: {}", zone_config.base);
        println!("  Tier: {}", zone_config.tier);
        println!("  Geocoder: {}", file_config.geocoder.url);
        if let Some(ref path) = output {
            println!("  Output: {}", path.display());
        }
        println!();
    }

    let source: Arc<dyn GeometrySource> = Arc::from(
        source_for(&zone_config).context("Failed to create zone data client")?,
    );
    let mut cache = ZoneLayerCache::new(source, MapSurface::new());

    if let Some(ref zip) = args.zip {
        let spinner = create_spinner(&format!("Looking up ZIP code {}...", zip));
        let start = Instant::now();
        let geocoder = NominatimGeocoder::new(&file_config.geocoder)?;

        match lookup_zip(zip, &geocoder, &mut cache) {
            Ok(outcome) => spinner.finish_with_message(format!(
                "{} [{:.1}s]",
                outcome.summary(),
                start.elapsed().as_secs_f32()
            )),
            Err(e) => {
                spinner.finish_and_clear();
                if e.is_retryable() {
                    bail!("{}. Please try again.", e);
                }
                bail!("{}", e);
            }
        }
    }

    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        let point = Coordinate::new(lat, lon)?;
        let spinner = create_spinner(&format!("Finding zone for {}...", point));
        let start = Instant::now();

        let resolution = ZoneResolver::new(&mut cache).resolve_detailed(&point);
        match resolution {
            Resolution::Found(zone) => {
                spinner.finish_with_message(format!(
                    "{} is in Zone {} [{:.1}s]",
                    point,
                    zone.as_str().to_uppercase(),
                    start.elapsed().as_secs_f32()
                ));
                cache.set_visible(zone, true);
            }
            Resolution::NotFound => {
                spinner.finish_with_message(format!(
                    "{} is not inside any zone. The location might be outside the continental US.",
                    point
                ));
            }
            Resolution::Undetermined { failed } => {
                spinner.finish_with_message(format!(
                    "Zone for {} could not be determined; {} zone(s) failed to load",
                    point,
                    failed.len()
                ));
            }
        }
    }

    if args.show_all {
        cache.show_all();
    }
    for zone in &args.show {
        cache.set_visible(*zone, true);
    }
    for zone in &args.hide {
        cache.set_visible(*zone, false);
    }

    if cache.is_busy() {
        let spinner = create_spinner("Loading zone geometry...");
        let start = Instant::now();
        cache.settle();
        spinner.finish_with_message(format!(
            "Loaded zone geometry [{:.1}s]",
            start.elapsed().as_secs_f32()
        ));
    }

    let mut failures = 0;
    for zone in ZoneId::ALL {
        if let Some(error) = cache.status_of(zone).error {
            failures += 1;
            eprintln!("  {} (toggle zone {} again to retry)", error, zone);
        }
    }

    let visible = cache.visible_zones();
    if !visible.is_empty() {
        let names: Vec<&str> = visible.iter().map(|z| z.as_str()).collect();
        println!("Visible zones: {}", names.join(", "));
    }

    if let Some(ref path) = output {
        cache
            .surface()
            .write_geojson(path)
            .with_context(|| format!("Failed to write GeoJSON file: {}", path.display()))?;
        println!("Output: {}", path.display());
    }

    if verbose {
        println!();
        println!(
            "Done! {} zone(s) visible, {} failed. Total time: {:.1}s",
            visible.len(),
            failures,
            total_start.elapsed().as_secs_f32()
        );
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_legend() {
    println!("USDA Plant Hardiness Zones");
    println!("==========================");
    println!();
    for zone in ZoneId::ALL {
        let info = zone.info();
        println!(
            "  Zone {:<4} {:>12}°F   {}",
            zone.as_str().to_uppercase(),
            info.temperature_range,
            info.color
        );
    }
    println!();
    println!("Blue = coldest zones | Red = warmest zones");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
