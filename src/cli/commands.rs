//! CLI commands
//!
//! Special commands that can be executed in the REPL. Anything else is a
//! request for the agent.

use crate::agent::Agent;
use crate::core::Result;

/// Commands users can give, shown at startup and by `help`
pub const USAGE_EXAMPLES: &str = "You can give commands like:
- 'Go to example.com'
- 'Read the current page'
- 'Click the login button'
- 'Find text about pricing'
- 'Move to next element'
- 'Go to previous element'
- 'List all landmarks'
- 'List headings' (shows page structure)
- 'List headlines' (shows news articles)
- 'Go to headline [number]' (opens selected article)
- 'Go to main content section'
- 'Read current section'";

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Session was cleared
    Clear,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, agent: &mut Agent) -> Result<CommandResult> {
    let input = input.trim();

    match input.to_lowercase().as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            agent.clear();
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "models" => {
            let models = agent.list_models().await?;
            let output = format!(
                "Available models:\n{}\n\nCurrent: {}",
                models
                    .iter()
                    .map(|m| format!("  - {}", m))
                    .collect::<Vec<_>>()
                    .join("\n"),
                agent.model()
            );
            Ok(CommandResult::Handled(output))
        }

        "status" => Ok(CommandResult::Handled(status_text(agent))),

        _ => Ok(CommandResult::Continue(input.to_string())),
    }
}

fn status_text(agent: &Agent) -> String {
    let config = agent.config();
    let session = agent.session();
    let page = session.page_context();

    format!(
        "Sightline Status:\n\
         -----------------------------\n\
         Model:        {}\n\
         Ollama:       {}\n\
         Browser:      {} ({})\n\
         Page:         {}\n\
         Page type:    {}\n\
         Actions:      {}\n\
         History:      {} messages\n\
         Learned:      {} patterns\n\
         Debug:        {}",
        agent.model(),
        config.ollama_url(),
        config.browser.session_name,
        if config.browser.headed { "headed" } else { "headless" },
        if page.url.is_empty() { "(none)" } else { &page.url },
        page.page_type,
        agent.actions().len(),
        session.conversation().len(),
        session.learned_patterns().len(),
        if config.agent.debug { "on" } else { "off" }
    )
}

/// Generate help text
fn help_text() -> String {
    format!(
        "{}

Sightline Commands:
---------------------------------------------
  help, ?          Show this help message
  exit, quit, q    Exit Sightline
  clear, reset     Forget the conversation and page
  status           Show current configuration
  models           List available Ollama models

Keyboard Shortcuts:
  Ctrl+C           Cancel the current request
  Ctrl+D           Exit Sightline
---------------------------------------------",
        USAGE_EXAMPLES
    )
}
