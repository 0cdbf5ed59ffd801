//! Subtrans - Adaptive Batch Subtitle Translation
//!
//! Command line entry point: loads configuration, runs translation jobs on a
//! worker task and renders their progress.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use subtrans::cli::{Args, Commands};
use subtrans::config::Config;
use subtrans::events::{BatchEvent, LogLevel, PipelineEvent, EVENT_TARGET};
use subtrans::translate::check_availability;
use subtrans::workflow::{default_output_path, spawn_translation_job, Workflow};

const DEFAULT_CONFIG_FILE: &str = "subtrans.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Translate { input, output, suffix, target_lang, batch_size } => {
            if let Some(lang) = target_lang {
                config.translate.target_language = lang;
            }
            if let Some(size) = batch_size {
                config.batch.base_size = size;
            }

            let output = match output {
                Some(path) => path,
                None => default_output_path(&input, &suffix)?,
            };

            info!("Translating subtitles: {} -> {}", input.display(), output.display());
            let workflow = Arc::new(Workflow::new(config)?);
            let mut job = spawn_translation_job(workflow, input, output);

            let cancel = job.cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current batch");
                    cancel.cancel();
                }
            });

            let progress = ProgressBar::new(100);
            progress.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
                    )?
                    .progress_chars("#>-"),
            );

            while let Some(event) = job.events.recv().await {
                render_event(&progress, event, args.verbose);
            }

            let output = job.handle.await??;
            println!("Translated subtitles written to {}", output.display());
        }
        Commands::Check => {
            check_availability(&config.translate).await?;
            println!(
                "Endpoint {} is reachable with model '{}'",
                config.translate.endpoint, config.translate.model
            );
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

/// Draw one job event; log lines are printed above the bar so the bar stays intact
fn render_event(progress: &ProgressBar, event: PipelineEvent, verbose: bool) {
    match event {
        PipelineEvent::Log { level: LogLevel::Debug, .. } if !verbose => {}
        PipelineEvent::Log { level, text } => {
            progress.println(format!("[{}] {}", level, text));
            if level == LogLevel::Info {
                progress.set_message(text);
            }
        }
        PipelineEvent::Progress(percent) => progress.set_position(percent as u64),
        PipelineEvent::Batch(BatchEvent::Retrying { number, attempt, max_attempts, .. }) => {
            progress.set_message(format!("batch {} retry {}/{}", number, attempt, max_attempts));
        }
        PipelineEvent::Batch(_) => progress.tick(),
        PipelineEvent::Finished { output } => {
            progress.finish_with_message(format!("done: {}", output.display()));
        }
        PipelineEvent::Failed { message } => {
            progress.abandon_with_message(format!("failed: {}", message));
        }
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".subtrans").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "subtrans.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Job events reach the terminal through the progress bar
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(|meta| meta.target() != EVENT_TARGET));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - level: {}, file: {}",
        log_level,
        log_dir.join("subtrans.log").display()
    );

    Ok(())
}
