// specmerge CLI - reconcile extracted specification documents

mod classify;
mod exit_codes;
mod export;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "specmerge")]
#[command(about = "Reconcile quantity summaries and detail specifications into one ordered schedule")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  specmerge run bay-tower.recon.toml
  specmerge run bay-tower.recon.toml --json
  specmerge run bay-tower.recon.toml --output result.json --csv schedule.csv

Exit codes:
  0  reconciled, nothing to review
  3  invalid config
  4  runtime error (unreadable input, fatal reconciliation error)
  5  output written, report needs review")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Print the full result as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write the full JSON result to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the ordered records as a flat CSV schedule
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Validate a run config without running
    #[command(after_help = "\
Examples:
  specmerge validate bay-tower.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },

    /// Show the role each filename would be assigned
    #[command(after_help = "\
Examples:
  specmerge classify 'Overall Qty.pdf' 'Casegoods & Seatings.pdf'
  specmerge classify --config bay-tower.recon.toml 'Project Totals.pdf'")]
    Classify {
        /// Document filenames
        #[arg(required = true)]
        filenames: Vec<String>,

        /// Take quantity keywords from this run config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  specmerge-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  specmerge-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: specmerge <command> [options]");
            eprintln!("       specmerge --help for more information");
            Ok(())
        }
        Some(Commands::Run { config, json, output, csv }) => recon::cmd_run(config, json, output, csv),
        Some(Commands::Validate { config }) => recon::cmd_validate(config),
        Some(Commands::Classify { filenames, config, json }) => {
            classify::cmd_classify(filenames, config, json)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    /// Create error from an engine error with the matching exit code.
    pub fn recon(err: specmerge_recon::ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            specmerge_recon::ReconError::MultipleQuantitySources { .. } => {
                Some("set `role = \"detail_specification\"` on all but one quantity document".to_string())
            }
            specmerge_recon::ReconError::ExtractionParse { .. } => {
                Some("extraction output must be a JSON array of record objects".to_string())
            }
            specmerge_recon::ReconError::EmptyQuantityIdentifier { .. } => {
                Some("fix or remove the entry in the quantity summary extraction".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
