//! Interactive REPL for Sightline
//!
//! One line of free text is one turn. A turn can be cancelled with Ctrl+C;
//! the agent then keeps the session it had before the turn started.

use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::agent::Agent;
use crate::cli::commands::{handle_command, CommandResult, USAGE_EXAMPLES};
use crate::core::{Config, Result};

const UNEXPECTED: &str = "An unexpected error occurred. Please try again.";

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Agent,
}

impl Repl {
    /// Create a REPL backed by Ollama and agent-browser
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            agent: Agent::from_config(config)?,
        })
    }

    /// Create a REPL around an existing agent
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        print!("Initializing...");
        io::stdout().flush()?;

        match self.agent.initialize().await {
            Ok(()) => println!(" Ready!\n"),
            Err(e) => {
                println!("\n\nInitialization Error: {}\n", e);
                return Ok(());
            }
        }

        println!("{}", USAGE_EXAMPLES);
        println!("\nType 'exit' to quit");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = io::stdout();

        loop {
            print!("\nWhat would you like me to do? ");
            stdout.flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nGoodbye!");
                    break;
                }
            };

            let input = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            };

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.agent).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Clear) => println!("Conversation cleared."),
                Ok(CommandResult::Handled(output)) => println!("{}", output),
                Ok(CommandResult::Continue(request)) => self.turn(&request).await,
                Err(e) => eprintln!("Command error: {}", e),
            }
        }

        info!("closing browser session");
        if let Err(e) = self.agent.shutdown().await {
            warn!(error = %e, "browser session did not close cleanly");
        }
        Ok(())
    }

    /// Run one turn, racing it against Ctrl+C
    async fn turn(&mut self, request: &str) {
        let outcome = tokio::select! {
            outcome = self.agent.process(request) => Some(outcome),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Ok(reply)) => println!("\n{}", reply),
            Some(Err(e)) => {
                error!(error = %e, "turn returned an error");
                println!("\n{}", UNEXPECTED);
            }
            None => {
                info!("turn cancelled by user");
                println!("\nOperation cancelled by user");
            }
        }
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.agent.config();

        println!(
            r#"
+-----------------------------------------------------------+
|                                                           |
|   S I G H T L I N E                                       |
|                                                           |
|   Conversational screen reader for the web                |
|                                                           |
+-----------------------------------------------------------+
"#
        );
        println!("Ollama:     {}", config.ollama_url());
        println!("Model:      {}", self.agent.model());
        println!(
            "Browser:    {}{}",
            config.browser.session_name,
            if config.browser.headed { " (headed)" } else { "" }
        );
        println!();
        println!("Commands: help, clear, models, status, exit");
        println!("-----------------------------------------------------------");
    }
}
