//! Sightline - conversational screen reader
//!
//! Main entry point for the CLI application.

use clap::Parser;
use sightline::{Agent, Config, Repl};
use tracing_subscriber::EnvFilter;

/// Sightline - drive a browser with free-text commands
#[derive(Parser, Debug)]
#[command(name = "sightline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Oracle model used for classification and recovery
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Run in headed browser mode (visible window)
    #[arg(long)]
    headed: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Log filter, e.g. "info" or "sightline=debug"
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(config: &Config, args: &Args) {
    let level = match (&args.log_level, config.agent.debug) {
        (Some(level), _) => level.clone(),
        (None, true) => "sightline=debug".to_string(),
        (None, false) => config.logging.level.clone(),
    };

    // RUST_LOG wins over flags and config
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.set_model(model.clone());
    }

    if args.debug {
        config.agent.debug = true;
    }

    if args.headed {
        config.browser.headed = true;
    }

    config.validate()?;
    init_logging(&config, &args);

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let mut agent = Agent::from_config(config)?;
        agent.initialize().await?;

        let response = agent.process(&prompt).await;
        agent.shutdown().await?;
        println!("{}", response?);
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?;
    repl.run().await?;

    Ok(())
}
