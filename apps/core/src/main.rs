// Parlot entry point
// Train intent models, chat with them, or expose them over a websocket.

use anyhow::Context;
use clap::{Parser, Subcommand};
use parlot_core::brain::pipeline::{load_responder, train_from_catalog};
use parlot_core::brain::stemming::Language;
use parlot_core::config::AppConfig;
use parlot_core::console::run_console;
use parlot_core::server::{serve, ServerSettings};
use parlot_core::telemetry::init_tracing;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const LICENSE: &str = "parlot Copyright (C) the Parlot authors

This program comes with ABSOLUTELY NO WARRANTY.
This is free software, and you are welcome to redistribute it under certain
conditions; see <https://www.gnu.org/licenses/> for details.";

#[derive(Parser, Debug)]
#[command(name = "parlot", version)]
#[command(about = "Intent-classification chat responder", long_about = None)]
struct Cli {
    /// Stemming language (fr, en); overrides PARLOT_LANGUAGE
    #[arg(long, global = true)]
    language: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a new model from an intent catalog
    Train {
        /// Model name, used for the model file name
        name: String,
        /// Intent catalog (JSON)
        intents: PathBuf,
        /// Artifact directory (default: <data dir>/models)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        epochs: Option<usize>,
        /// Seed for reproducible training
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Chat with a trained model on the terminal
    Chat {
        /// Model file (*.model.json)
        model: PathBuf,
        /// Vocabulary file (*.vocab.json)
        vocabulary: PathBuf,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Answer websocket clients with a trained model
    Serve {
        model: PathBuf,
        vocabulary: PathBuf,
        #[arg(short, long)]
        port: u16,
        /// Bind address (default: PARLOT_BIND_ADDRESS or 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Print the license notice
    License,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(language) = &cli.language {
        config.language = language.parse::<Language>()?;
    }

    match cli.command {
        Command::Train {
            name,
            intents,
            output_dir,
            epochs,
            seed,
        } => {
            if let Some(epochs) = epochs {
                config.network.epochs = epochs;
            }
            if seed.is_some() {
                config.network.seed = seed;
            }
            config.check()?;

            let output_dir = output_dir.unwrap_or_else(|| config.models_dir());
            let (artifacts, _) = train_from_catalog(
                &intents,
                &name,
                &output_dir,
                &config,
                &mut rand::thread_rng(),
            )
            .with_context(|| format!("training '{}' from {:?} failed", name, intents))?;

            println!("model: {}", artifacts.model_path.display());
            println!("vocabulary: {}", artifacts.vocabulary_path.display());
        }
        Command::Chat {
            model,
            vocabulary,
            threshold,
        } => {
            config.override_threshold(threshold)?;
            let responder = load_responder(
                &model,
                &vocabulary,
                config.language,
                config.confidence_threshold,
            )?;
            run_console(&responder, io::stdin().lock(), io::stdout().lock())?;
        }
        Command::Serve {
            model,
            vocabulary,
            port,
            bind,
            threshold,
        } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            config.override_threshold(threshold)?;
            let responder = load_responder(
                &model,
                &vocabulary,
                config.language,
                config.confidence_threshold,
            )?;
            let settings = ServerSettings::from_config(&config, port);

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve(Arc::new(responder), &settings, async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl-C received"),
                    Err(_) => std::future::pending::<()>().await,
                }
            }))?;
        }
        Command::License => println!("{}", LICENSE),
    }

    Ok(())
}
