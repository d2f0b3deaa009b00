//! Session Insights - analytics for food-session platform exports
//!
//! A CLI tool that cleans and joins the user, cooking session and order
//! sheets, computes grouped summary statistics and reports the key
//! business findings.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing sheet, malformed data, config, I/O)
//!   2 - Some insight categories could not be derived and --strict is set

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use models::{Report, ReportMetadata};
use report::ReportOptions;
use std::path::Path;
use std::time::Instant;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let set_log_level = init_logging(&args)?;

    info!("session-insights v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let level = effective_log_level(&args, &config);
    if level != args.log_level() {
        set_log_level(level)?;
        debug!("Log level raised to {} by config", level);
    }

    match run_analysis(&args, &config) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .session-insights.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize sheet names, date formats and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Returns a setter so a config file loaded afterwards can still raise the level.
fn init_logging(args: &Args) -> Result<impl Fn(Level) -> Result<()>> {
    let builder = FmtSubscriber::builder()
        .with_env_filter(level_env_filter(args.log_level()))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter_reloading();
    let handle = builder.reload_handle();

    tracing::subscriber::set_global_default(builder.finish())
        .context("Failed to set tracing subscriber")?;

    Ok(move |level: Level| {
        handle
            .reload(level_env_filter(level))
            .context("Failed to change log level")
    })
}

/// A filter that admits everything at or above `level`, like `with_max_level`.
fn level_env_filter(level: Level) -> EnvFilter {
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

/// Log level after the config file had its say; `--quiet` always wins.
fn effective_log_level(args: &Args, config: &Config) -> Level {
    if config.general.verbose && !args.quiet {
        Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Run the complete pipeline. Returns the exit code (0 or 2).
fn run_analysis(args: &Args, config: &Config) -> Result<i32> {
    let start_time = Instant::now();
    let input = args.input_dir();

    if !args.quiet {
        println!("📥 Reading sheets from {}", input.display());
    }
    let raw = loader::load_dataset(input, &config.input)?;

    if !args.quiet {
        println!("🔬 Cleaning, joining and aggregating...");
    }
    let outcome = analysis::run(&raw, &config.input.date_formats)?;

    let duration = start_time.elapsed().as_secs_f64();
    let report = Report {
        metadata: ReportMetadata {
            input_path: input.display().to_string(),
            analysis_date: Utc::now(),
            counts: outcome.counts,
            duration_seconds: duration,
        },
        analysis: outcome.result,
        insights: outcome.insights,
        recommendations: report::default_recommendations(),
    };

    let options = ReportOptions {
        top_n: config.report.top_n,
        include_tables: config.report.include_tables,
    };
    let content = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &options),
    };

    let output = Path::new(&config.general.output);
    report::write_report(&content, output)?;

    if !args.quiet {
        print_summary(&report, duration, output);
    }

    if args.strict && !report.insights.is_complete() {
        eprintln!(
            "\n⛔ {} insight categor{} could not be derived. Failing (exit code 2).",
            report.insights.failures.len(),
            if report.insights.failures.len() == 1 { "y" } else { "ies" }
        );
        return Ok(2);
    }

    Ok(0)
}

fn print_summary(report: &Report, duration: f64, output: &Path) {
    let counts = &report.metadata.counts;

    println!("\n📊 Analysis Summary:");
    println!(
        "   Users: {} | Sessions: {} | Orders: {}",
        counts.users, counts.sessions, counts.orders
    );
    for insight in &report.insights.insights {
        println!("   - {}: {}", insight.category, insight.key_finding);
    }
    for failure in &report.insights.failures {
        println!("   - ⚠️  {}: {}", failure.category, failure.error);
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Analysis complete! Report saved to: {}", output.display());
}

/// Load the configuration and apply CLI overrides.
///
/// Without `--config`, a file stored next to the sheets takes precedence
/// over one in the working directory.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args)?;

    if args.config.is_none() {
        let input = args.input_dir();
        if let Some(input_config) = Config::load_from_dir(input)? {
            info!("Found {} in {}", CONFIG_FILE_NAME, input.display());
            config = input_config;
        }
    }

    config.merge_with_args(args);
    Ok(config)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
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
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_effective_log_level() {
        let mut args = Args::for_input(PathBuf::from("data"));
        let mut config = Config::default();
        assert_eq!(effective_log_level(&args, &config), Level::INFO);

        config.general.verbose = true;
        assert_eq!(effective_log_level(&args, &config), Level::DEBUG);

        args.quiet = true;
        assert_eq!(effective_log_level(&args, &config), Level::ERROR);
    }

    #[test]
    fn test_resolve_config_prefers_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[general]\nverbose = true\n\n[report]\ntop_n = 2\n",
        )
        .unwrap();

        let mut args = Args::for_input(dir.path().to_path_buf());
        args.top = Some(7);
        let config = resolve_config(&args).unwrap();

        assert!(config.general.verbose);
        assert_eq!(config.report.top_n, 7);
        assert_eq!(effective_log_level(&args, &config), Level::DEBUG);
    }

    #[test]
    fn test_resolve_config_explicit_file_skips_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[report]\ntop_n = 2\n").unwrap();
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[report]\ntop_n = 9\n").unwrap();

        let mut args = Args::for_input(dir.path().to_path_buf());
        args.config = Some(explicit);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.report.top_n, 9);
        assert!(!config.general.verbose);
    }
}
