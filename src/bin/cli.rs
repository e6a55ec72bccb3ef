//! Vision Tasker - vision-guided Tasker automation
//!
//! Command-line entry point. Run with: cargo run --bin vision-tasker -- <command>

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use vision_tasker::adb::ADBConnection;
use vision_tasker::{AppSettings, IntentClassifier, WorkflowEngine, WorkflowReport};

#[derive(Parser, Debug)]
#[command(
    name = "vision-tasker",
    version,
    about = "Create, test and inspect Tasker tasks on an Android device with a vision model",
    after_help = "ENVIRONMENT VARIABLES:\n\
        DEVICE_SERIAL          ADB serial of the target device (or ADB_DEVICE_ID)\n\
        DEVICE_WIDTH/HEIGHT    Screen size in pixels\n\
        MODEL_BASE_URL         OpenAI-compatible endpoint for the vision model\n\
        MODEL_API_KEY          API key (or GOOGLE_API_KEY)\n\
        MODEL_NAME             Vision model name\n\
        PLANNER_MODEL_*        Planner overrides (BASE_URL, API_KEY, NAME)\n\
        WORKFLOW_TIMEOUT       Deadline for a whole workflow in seconds\n\
        RUST_LOG               Log filter (default: info)"
)]
struct Args {
    /// Override the configured device serial
    #[arg(long, short = 'd', global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a request and run the matching workflow
    Run {
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Show how a request would be classified
    Classify {
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Plan and create a task
    Create {
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Run a task until it passes (at most 3 times)
    Test {
        #[arg(required = true, trailing_var_arg = true)]
        task: Vec<String>,
    },
    /// Analyze the current screen with the canned queries plus this one
    Analyze {
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Capture the screen once and print the detected elements
    Observe {
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// List devices known to ADB
    Devices,
    /// Connect to a device over TCP/IP
    Connect { address: String },
    /// Print the effective settings
    Settings {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut settings = AppSettings::load().apply_env();
    if let Some(device) = args.device {
        settings.device_id = device;
    }

    match args.command {
        Commands::Classify { query } => {
            let detection = IntentClassifier::new().classify(&query.join(" "));
            print_json(&detection)?;
        }
        Commands::Devices => {
            let devices = ADBConnection::new().list_devices().await?;
            if devices.is_empty() {
                println!("No devices attached");
            }
            for device in devices {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    device.device_id,
                    device.status,
                    device.connection_type,
                    device.model.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Connect { address } => {
            let message = ADBConnection::new().connect(&address).await?;
            println!("{}", message);
        }
        Commands::Settings { save } => {
            if save {
                let path = settings.save()?;
                println!("Saved to {}", path.display());
            }
            let mut shown = settings.clone();
            mask(&mut shown.api_key);
            mask(&mut shown.planner_api_key);
            print_json(&shown)?;
        }
        Commands::Observe { query } => {
            let engine = WorkflowEngine::from_settings(&settings)?;
            let query = query.join(" ");
            let query = (!query.is_empty()).then_some(query.as_str());
            let result = engine.perception().observe(query).await;
            print_json(&result)?;
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Run { query } => {
            let dispatch = WorkflowEngine::from_settings(&settings)?
                .dispatch(&query.join(" "))
                .await;
            print_json(&dispatch)?;
            exit_for(&dispatch.report);
        }
        Commands::Create { query } => {
            let report = WorkflowEngine::from_settings(&settings)?
                .run_creation(&query.join(" "))
                .await;
            print_json(&report)?;
            exit_for(&report);
        }
        Commands::Test { task } => {
            let report = WorkflowEngine::from_settings(&settings)?
                .run_testing(&task.join(" "))
                .await;
            print_json(&report)?;
            exit_for(&report);
        }
        Commands::Analyze { query } => {
            let report = WorkflowEngine::from_settings(&settings)?
                .run_analysis(&query.join(" "))
                .await;
            print_json(&report)?;
            exit_for(&report);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{}", json);
    Ok(())
}

fn exit_for(report: &WorkflowReport) {
    if !report.is_success() {
        std::process::exit(1);
    }
}

fn mask(secret: &mut String) {
    if !secret.is_empty() {
        *secret = "***".to_string();
    }
}
