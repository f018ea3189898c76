//! CLI Entry Point for dfagent-loadtest
//!
//! Generates sustained, paced load against a Data Factory Agent.
//!
//! # Usage
//!
//! Field by field:
//! ```bash
//! dfagent-loadtest command --instrument-mode IMAGING --observation-class SCIENCE \
//!     --observation-type OBJECTS --observation-mode STARE --image-path /data/raw \
//!     --number-images 4 --number-petitions 100 --petition-period 2.5
//! ```
//!
//! From a document with a top-level `configuration` mapping:
//! ```bash
//! dfagent-loadtest file --config-file loadtest.yaml
//! ```
//!
//! # Exit codes
//!
//! - `0`: run completed
//! - `1`: run failed after it started (rejected configuration, aborted submission)
//! - `2`: invalid configuration, document or settings
//! - `255`: agent unreachable or not responding, or no recognized sub-command

use anyhow::anyhow;
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use dfagent_loadtest::agent::directory::InMemoryNameService;
use dfagent_loadtest::agent::mock::SimulatedAgent;
use dfagent_loadtest::error::{EXIT_INVALID_CONFIG, EXIT_SESSION_FAILURE};
use dfagent_loadtest::settings::AppSettings;
use dfagent_loadtest::{
    logging, AppResult, LoadTestConfig, LoadTestError, ObservationClass, ObservationType,
    PetitionScheduler, RunReport, SessionEstablisher,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "dfagent-loadtest")]
#[command(
    about = "Drive a Data Factory Agent with paced configure/submit petitions",
    long_about = None
)]
struct Cli {
    /// Optional TOML settings file (agent name, timeouts, logging)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Register an in-process simulated agent under the configured instance name
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set parameters from the command line
    Command(CommandArgs),

    /// Set parameters from a config file
    File {
        /// YAML document with a top-level `configuration` mapping
        #[arg(long = "config-file")]
        config_file: PathBuf,
    },
}

#[derive(Args)]
struct CommandArgs {
    /// Instrument mode of the agent
    #[arg(long)]
    instrument_mode: Option<String>,

    /// Observation class
    #[arg(long, value_enum)]
    observation_class: Option<ObservationClass>,

    /// Observation type
    #[arg(long, value_enum)]
    observation_type: Option<ObservationType>,

    /// Observation mode process to be used
    #[arg(long)]
    observation_mode: Option<String>,

    /// Folder holding the raw images to send
    #[arg(long, default_value = ".")]
    image_path: PathBuf,

    /// Number of images sent per petition
    #[arg(long)]
    number_images: u32,

    /// Number of petitions
    #[arg(long)]
    number_petitions: u32,

    /// Seconds between petitions (fractional allowed)
    #[arg(long, allow_negative_numbers = true)]
    petition_period: f64,
}

impl CommandArgs {
    fn into_config(self) -> AppResult<LoadTestConfig> {
        let mut builder = LoadTestConfig::builder()
            .image_path(self.image_path)
            .number_images(self.number_images)
            .number_petitions(self.number_petitions)
            .petition_period_secs(self.petition_period);
        if let Some(mode) = self.instrument_mode {
            builder = builder.instrument_mode(mode);
        }
        if let Some(class) = self.observation_class {
            builder = builder.observation_class(class);
        }
        if let Some(kind) = self.observation_type {
            builder = builder.observation_type(kind);
        }
        if let Some(mode) = self.observation_mode {
            builder = builder.observation_mode(mode);
        }
        builder.build()
    }
}

impl Commands {
    fn into_config(self) -> AppResult<LoadTestConfig> {
        match self {
            Commands::Command(args) => args.into_config(),
            Commands::File { config_file } => LoadTestConfig::from_document_file(&config_file),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                ErrorKind::InvalidSubcommand
                | ErrorKind::MissingSubcommand
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    eprintln!("Unrecognized command");
                    ExitCode::from(EXIT_SESSION_FAILURE)
                }
                _ => ExitCode::from(EXIT_INVALID_CONFIG),
            };
        }
    };

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        eprintln!("\nUnrecognized command");
        return ExitCode::from(EXIT_SESSION_FAILURE);
    };

    let settings = match load_settings(cli.settings) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid settings: {e:#}");
            return ExitCode::from(EXIT_INVALID_CONFIG);
        }
    };

    if let Err(e) = logging::init_from_settings(&settings) {
        eprintln!("{e}");
        return ExitCode::from(EXIT_INVALID_CONFIG);
    }

    let config = match command.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(e.exit_code());
        }
    };

    let outcome = run(&settings, &config, cli.simulate).await;
    SessionEstablisher::teardown();

    match outcome {
        Ok(report) => {
            info!(
                petitions = report.petitions_completed,
                frames = report.frames_submitted,
                "load test finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            if matches!(e.root_cause(), LoadTestError::Cancelled) {
                warn!("load test cancelled");
            } else {
                error!("{:#}", anyhow::Error::from(e));
            }
            ExitCode::from(code)
        }
    }
}

fn load_settings(path: Option<PathBuf>) -> anyhow::Result<AppSettings> {
    let settings = AppSettings::load(path.as_deref())?;
    settings.validate().map_err(|e| anyhow!(e))?;
    Ok(settings)
}

async fn run(
    settings: &AppSettings,
    config: &LoadTestConfig,
    simulate: bool,
) -> AppResult<RunReport> {
    let directory = Arc::new(InMemoryNameService::new());
    if simulate {
        info!(instance = %settings.instance_name, "registering simulated agent");
        directory
            .register(settings.instance_name.clone(), Arc::new(SimulatedAgent::new()))
            .await;
    }

    let session = SessionEstablisher::new(directory)
        .with_max_message_size(settings.max_message_size)
        .establish(&settings.instance_name, settings.resolve_timeout)
        .await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next petition or artifact boundary");
            let _ = cancel_tx.send(true);
        }
    });

    PetitionScheduler::new(settings.camera_id.clone())
        .with_cancellation(cancel_rx)
        .run(&session, config)
        .await
}
