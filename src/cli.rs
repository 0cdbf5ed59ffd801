use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate an SRT subtitle file
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file (defaults to <input>_<suffix>.srt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Suffix used for the default output file name
        #[arg(long, default_value = "zh")]
        suffix: String,

        /// Target language, overrides the configuration
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Initial batch size, overrides the configuration
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Check that the translation endpoint and API key work
    Check,

    /// Write a configuration file with default values
    InitConfig {
        /// Where to write the configuration
        #[arg(short, long, default_value = "subtrans.toml")]
        output: PathBuf,
    },
}
