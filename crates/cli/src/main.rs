//! ChatBuffer CLI: the main entry point.
//!
//! Commands:
//! - `serve`    : Start the HTTP gateway
//! - `classify` : Classify one message with the configured patterns
//! - `check`    : Validate config, compile patterns, ping the store
//! - `init`     : Write the default config file
//! - `simulate` : Replay `chat_id<TAB>text` lines through the engine

use chatbuffer_config::EngineConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "chatbuffer",
    about = "ChatBuffer: semantic buffering for chat fragments",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.chatbuffer/config.toml)
    #[arg(short, long, global = true, env = "CHATBUFFER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Classify a single message and print the result
    Classify {
        /// The message text
        text: String,
    },

    /// Validate configuration and dependencies
    Check,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Feed `chat_id<TAB>text` lines through the engine and print decisions
    Simulate {
        /// Input file, or `-` for stdin
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Init { force } => commands::init::run(cli.config.as_deref(), force)?,
        Commands::Serve { port } => commands::serve::run(load(&cli.config)?, port).await?,
        Commands::Classify { text } => commands::classify::run(&load(&cli.config)?, &text).await?,
        Commands::Check => commands::check::run(cli.config.as_deref()).await?,
        Commands::Simulate { input } => commands::simulate::run(&load(&cli.config)?, &input).await?,
    }

    Ok(())
}

fn load(path: &Option<PathBuf>) -> Result<EngineConfig, chatbuffer_config::ConfigError> {
    match path {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    }
}
