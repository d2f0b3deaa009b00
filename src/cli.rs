//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Session Insights - summary statistics for food-session platform exports
///
/// Reads the UserDetails, CookingSessions and OrderDetails sheets,
/// joins them, computes grouped summaries and writes a report with
/// the key business findings.
///
/// Examples:
///   session-insights --input ./export
///   session-insights --input ./export --format json -o insights.json
///   session-insights --input ./export --top 10 --strict
///   session-insights --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory containing the exported sheets
    ///
    /// Expects UserDetails.csv, CookingSessions.csv and OrderDetails.csv
    /// unless the config file names other files.
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "SESSION_INSIGHTS_INPUT",
        required_unless_present = "init_config"
    )]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the config value (session_insights.md).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .session-insights.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of rows in the top-N report sections
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Exit with code 2 if any insight category could not be derived
    #[arg(long)]
    pub strict: bool,

    /// Generate a default .session-insights.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the input directory (validated to be present unless --init-config).
    pub fn input_dir(&self) -> &Path {
        self.input.as_deref().unwrap_or_else(|| Path::new("."))
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }

        let input = self.input_dir();
        if !input.exists() {
            return Err(format!("Input directory does not exist: {}", input.display()));
        }
        if !input.is_dir() {
            return Err(format!("Input path is not a directory: {}", input.display()));
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
impl Args {
    pub(crate) fn for_input(input: PathBuf) -> Self {
        Args {
            input: Some(input),
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            verbose: false,
            quiet: false,
            top: None,
            strict: false,
            init_config: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args::for_input(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"))
    }

    #[test]
    fn test_validation_accepts_fixture_dir() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/nonexistent/export"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_input_not_a_directory() {
        let mut args = make_args();
        args.input = Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"));
        let err = args.validate().unwrap_err();
        assert!(err.contains("not a directory"));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_top() {
        let mut args = make_args();
        args.top = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.input = None;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "session-insights",
            "--input",
            "export",
            "--format",
            "json",
            "--top",
            "3",
            "--strict",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("export")));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.top, Some(3));
        assert!(args.strict);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
