//! Mapboard - restore a dashboard view and report on it
//!
//! Restores layer, area, year and viewport state from a share link,
//! loads the active datasets and writes a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad link, config, unreadable input, etc.)

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mapboard::analysis::{distinct_places, place_field_for, sanitize_filename};
use mapboard::api::{load_active_layers, load_boundaries, HttpFetcher};
use mapboard::cli::{Args, OutputFormat};
use mapboard::config::{Config, CONFIG_FILE_NAME};
use mapboard::models::{AreaCollection, Observation};
use mapboard::report::{self, DashboardReport, ReportOptions};
use mapboard::store::{ActiveLayers, Dashboard, LayerStatus};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    if let Err(e) = init_logging(&args) {
        eprintln!("Warning: {}", e);
    }

    info!("Mapboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Report failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .mapboard.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the API host, initial viewport and report sections.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: restore the view
    let location = args.location(&config.map.share_url)?;
    let mut dashboard = Dashboard::new(location, &config.date.default_year, config.viewport());
    dashboard.mount();
    apply_overrides(&mut dashboard, &args);
    dashboard.sync_to_url();

    if !args.quiet {
        println!("🗺️  Restored view: {}", dashboard.location());
    }

    // Step 2: load data
    let spinner = make_spinner(args.quiet);
    let (boundaries, data_source) = match args.observations {
        Some(ref path) => {
            spinner.set_message(format!("Reading {}", path.display()));
            let boundaries = load_local_data(&mut dashboard, path, args.boundaries.as_deref())?;
            (boundaries, path.display().to_string())
        }
        None => {
            spinner.set_message(format!("Fetching from {}", config.api.base_url));
            let boundaries = load_remote_data(&mut dashboard, &config, args.boundaries.as_deref()).await?;
            (boundaries, config.api.base_url.clone())
        }
    };
    spinner.finish_and_clear();

    // Step 3: build and save the report
    let options = ReportOptions {
        monthly: config.report.monthly,
        include_table: config.report.include_table,
        include_time_series: config.report.include_time_series,
    };
    let report = DashboardReport::build(&mut dashboard, &boundaries, &data_source, options);

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&report, args.format));
    report::write_report(&output, &output_path)?;

    if !args.quiet {
        print_summary(&dashboard, &report, start_time.elapsed());
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    Ok(())
}

/// Apply flag overrides on top of the restored link, in a fixed order.
fn apply_overrides(dashboard: &mut Dashboard, args: &Args) {
    if let Some(ref layers) = args.layers {
        dashboard.set_active_layers(ActiveLayers::parse(layers));
    }
    if let Some(ref province) = args.province {
        dashboard.select_province(province);
    }
    if let Some(ref ac) = args.ac {
        dashboard.select_area_council(ac);
    }
    if let Some(ref year) = args.year {
        dashboard.set_year(year);
    }
    for layer in &args.toggle {
        let outcome = dashboard.toggle_layer(*layer);
        debug!(
            "Toggled {}: on = {}, replaced = {:?}",
            layer,
            outcome.activated.is_some(),
            outcome.deactivated
        );
    }
}

/// Observations from a JSON file; boundaries from a GeoJSON file or the
/// places named in the data.
fn load_local_data(
    dashboard: &mut Dashboard,
    observations_path: &Path,
    boundaries_path: Option<&Path>,
) -> Result<AreaCollection> {
    let content = std::fs::read_to_string(observations_path)
        .with_context(|| format!("Failed to read {}", observations_path.display()))?;
    let observations: Vec<Observation> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse observations in {}", observations_path.display()))?;
    info!("Read {} observations", observations.len());

    match dashboard.layers().active().tabular() {
        Some(layer) => {
            let key = dashboard.data_key(layer);
            dashboard.complete_tabular_fetch(&key, observations);
        }
        None => warn!("No tabular layer is active; observations ignored"),
    }

    if let Some(path) = boundaries_path {
        return read_boundaries(path);
    }

    let field = place_field_for(&dashboard.area().province);
    let places = distinct_places(dashboard.layers().observations(), field);
    Ok(AreaCollection::from_names(places))
}

async fn load_remote_data(
    dashboard: &mut Dashboard,
    config: &Config,
    boundaries_path: Option<&Path>,
) -> Result<AreaCollection> {
    let fetcher = HttpFetcher::new(config.api_settings())?;
    load_active_layers(dashboard, &fetcher).await;

    if let Some(path) = boundaries_path {
        return read_boundaries(path);
    }

    match load_boundaries(&fetcher, dashboard.area()).await {
        Ok(boundaries) => Ok(boundaries),
        Err(e) => {
            warn!("Failed to load boundaries: {}; using places from the data", e);
            let field = place_field_for(&dashboard.area().province);
            let places = distinct_places(dashboard.layers().observations(), field);
            Ok(AreaCollection::from_names(places))
        }
    }
}

fn read_boundaries(path: &Path) -> Result<AreaCollection> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse boundaries in {}", path.display()))
}

fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn default_output_path(report: &DashboardReport, format: OutputFormat) -> PathBuf {
    let name = sanitize_filename(report.tabular_name().unwrap_or("mapboard"));
    let name = if name.is_empty() { "mapboard".to_string() } else { name };
    PathBuf::from(format!(
        "{}_{}.{}",
        name,
        report.metadata.year,
        format.extension()
    ))
}

fn print_summary(dashboard: &Dashboard, report: &DashboardReport, elapsed: Duration) {
    println!("\n📊 Summary:");
    println!("   Layers: {}", report.metadata.layers);
    println!("   Year: {}", report.metadata.year);
    println!("   Observations: {}", report.metadata.observation_count);
    match report.value_range {
        Some(range) => println!("   Value range: {} to {}", range.min, range.max),
        None => println!("   Value range: no data"),
    }

    for entry in &report.legend {
        if let LayerStatus::Failed(ref message) = entry.status {
            println!("   ⚠️  {} failed: {}", entry.layer, message);
        }
    }
    let missing = dashboard.layers().missing_metadata();
    if !missing.is_empty() {
        let tokens: Vec<String> = missing.iter().map(ToString::to_string).collect();
        println!("   ⚠️  No metadata for: {}", tokens.join(", "));
    }

    println!("   Duration: {:.1}s", elapsed.as_secs_f64());
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
