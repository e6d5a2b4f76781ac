//! Reflection and error recovery
//!
//! When a cycle fails, or a task needed more than one attempt, the engine
//! asks the oracle for a verdict and turns it into a [`Recovery`]: a
//! [`Remedy`], the stage it routes to, and the deltas to apply on the way.
//! Recovery never fails; anything unusable becomes an abort.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::agent::command::{ActionKind, Command};
use crate::agent::session::{SessionState, StateDelta, SubTask};
use crate::agent::turn::Stage;
use crate::core::config::AgentConfig;
use crate::llm::Oracle;

/// Reply when the oracle cannot help
pub const APOLOGY: &str =
    "I'm having trouble completing this task. Could you try rephrasing your request?";
const GIVE_UP: &str = "I wasn't able to complete that request.";
const CLARIFY_FALLBACK: &str = "Could you tell me a bit more about what you'd like to do?";

const HISTORY_WINDOW: usize = 10;
const TRANSCRIPT_MESSAGES: usize = 6;

/// Remediation strategies the oracle may pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Retry,
    Alternative,
    Decompose,
    Clarify,
    Abort,
}

impl Strategy {
    /// Parse an oracle label; anything unrecognised is an abort
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "retry" => Self::Retry,
            "alternative" => Self::Alternative,
            "decompose" => Self::Decompose,
            "clarify" => Self::Clarify,
            _ => Self::Abort,
        }
    }
}

/// Diagnostic reply from the oracle
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Verdict {
    #[serde(alias = "analysis")]
    pub diagnosis: Option<String>,
    pub strategy: Option<String>,
    pub sub_tasks: Vec<Value>,
    pub suggested_action: Option<String>,
    pub confidence: f32,
    #[serde(alias = "clarification_needed")]
    pub needed_context: Option<String>,
    pub user_message: Option<String>,
    /// A sentence or a list of them
    pub learnings: Value,
}

impl Verdict {
    fn learnings(&self) -> Vec<String> {
        strings(&self.learnings)
    }

    fn sub_task_utterances(&self) -> Vec<String> {
        self.sub_tasks
            .iter()
            .filter_map(|task| match task {
                Value::String(text) => Some(text.clone()),
                Value::Object(fields) => ["utterance", "description", "task", "command"]
                    .iter()
                    .find_map(|key| fields.get(*key).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect()
    }
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// What to do about a failed or struggling cycle
#[derive(Debug, Clone, PartialEq)]
pub enum Remedy {
    /// The cycle succeeded; move on to the next queued sub-task or end
    Continue,
    /// Re-run failed and never-started tasks of the cycle
    Retry,
    /// Replace the command and plan again
    Alternative(Command),
    /// Run smaller requests in order, the first one now
    Decompose(Vec<SubTask>),
    /// Ask the user a question and end the turn
    Clarify(String),
    /// Give up with a message
    Abort(String),
}

impl Remedy {
    /// Stage the remedy continues at when entered from `origin`
    pub fn route(&self, origin: Stage) -> Stage {
        match self {
            Self::Continue => Stage::End,
            Self::Retry => Stage::Prepare,
            // from ERROR_RECOVERY the replan happens inline
            Self::Alternative(_) if origin == Stage::Reflect => Stage::Plan,
            Self::Alternative(_) => Stage::Prepare,
            Self::Decompose(_) => Stage::Analyze,
            Self::Clarify(_) | Self::Abort(_) => Stage::End,
        }
    }
}

/// A decision together with the bookkeeping that goes with it
#[derive(Debug, Clone)]
pub struct Recovery {
    pub remedy: Remedy,
    pub diagnosis: String,
    pub learnings: Vec<String>,
    /// Action charged against its recovery budget, if the oracle was asked
    pub charged: Option<String>,
}

impl Recovery {
    fn uncharged(remedy: Remedy) -> Self {
        Self {
            remedy,
            diagnosis: String::new(),
            learnings: Vec::new(),
            charged: None,
        }
    }

    /// Deltas that put the remedy into effect
    ///
    /// For an alternative, accepting the new command and installing its plan
    /// is left to the planning step.
    pub fn deltas(&self) -> Vec<StateDelta> {
        let mut deltas: Vec<StateDelta> = self
            .charged
            .iter()
            .map(|action| StateDelta::CountRecovery(action.clone()))
            .collect();
        deltas.extend(self.learnings.iter().cloned().map(StateDelta::LearnPattern));

        match &self.remedy {
            Remedy::Continue => {}
            Remedy::Retry => {
                deltas.push(StateDelta::Error(None));
                deltas.push(StateDelta::RearmForRetry);
            }
            Remedy::Alternative(_) => {
                deltas.push(StateDelta::Error(None));
                deltas.push(StateDelta::Attempts(0));
            }
            Remedy::Decompose(sub_tasks) => {
                if let Some((first, rest)) = sub_tasks.split_first() {
                    deltas.push(StateDelta::Decompose {
                        active: first.clone(),
                        queued: rest.to_vec(),
                    });
                    deltas.push(StateDelta::BeginCycle {
                        utterance: first.utterance.clone(),
                    });
                }
            }
            Remedy::Clarify(message) | Remedy::Abort(message) => {
                deltas.push(StateDelta::DropSubTasks);
                deltas.push(StateDelta::Message(message.clone()));
            }
        }
        deltas
    }
}

/// Asks the oracle how to recover and bounds how often it may be asked
#[derive(Clone)]
pub struct RecoveryEngine {
    oracle: Oracle,
    max_attempts: u32,
    alternative_confidence: f32,
    max_subtasks: usize,
}

impl RecoveryEngine {
    pub fn new(oracle: Oracle, config: &AgentConfig) -> Self {
        Self {
            oracle,
            max_attempts: config.max_recovery_attempts,
            alternative_confidence: config.alternative_confidence,
            max_subtasks: config.max_subtasks,
        }
    }

    /// Decide how to continue after a cycle
    #[instrument(skip(self, session, origin), fields(origin = %origin))]
    pub async fn recover(&self, session: &SessionState, origin: Stage) -> Recovery {
        let action = charged_action(session);
        let spent = session.recovery_attempts(&action);
        if spent >= self.max_attempts {
            // the cycle itself succeeded
            if origin == Stage::Reflect && !session.has_unfinished_tasks() {
                info!(%action, spent, "recovery budget spent, cycle succeeded");
                return Recovery::uncharged(Remedy::Continue);
            }
            info!(%action, spent, "recovery budget exhausted");
            return Recovery::uncharged(Remedy::Abort(GIVE_UP.to_string()));
        }

        let prompt = build_prompt(session, origin);
        let verdict: Verdict = match self.oracle.ask_json(&prompt).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "recovery verdict unavailable");
                let mut recovery = Recovery::uncharged(Remedy::Abort(APOLOGY.to_string()));
                recovery.charged = Some(action);
                return recovery;
            }
        };
        debug!(?verdict, "recovery verdict");

        let remedy = self.decide(&verdict, session);
        info!(?remedy, "recovery decided");
        Recovery {
            remedy,
            diagnosis: verdict.diagnosis.clone().unwrap_or_default(),
            learnings: verdict.learnings(),
            charged: Some(action),
        }
    }

    /// Turn a verdict into a remedy, applying the confidence and size limits
    pub fn decide(&self, verdict: &Verdict, session: &SessionState) -> Remedy {
        let strategy = verdict
            .strategy
            .as_deref()
            .map(Strategy::parse)
            .unwrap_or(Strategy::Abort);

        match strategy {
            Strategy::Retry => Remedy::Retry,
            Strategy::Alternative => {
                let action = verdict.suggested_action.as_deref().and_then(ActionKind::parse);
                match action {
                    Some(action) if verdict.confidence > self.alternative_confidence => {
                        let context = [
                            session.command().map(|c| c.context.as_str()),
                            verdict.needed_context.as_deref(),
                        ]
                        .into_iter()
                        .flatten()
                        .map(str::trim)
                        .find(|c| !c.is_empty())
                        .unwrap_or_else(|| session.utterance())
                        .to_string();
                        Remedy::Alternative(Command::new(action, verdict.confidence, context))
                    }
                    _ => {
                        info!(
                            suggested = ?verdict.suggested_action,
                            confidence = verdict.confidence,
                            "alternative rejected"
                        );
                        Remedy::Abort(APOLOGY.to_string())
                    }
                }
            }
            Strategy::Decompose => {
                let mut utterances = verdict.sub_task_utterances();
                utterances.truncate(self.max_subtasks);
                if utterances.is_empty() {
                    return Remedy::Abort(GIVE_UP.to_string());
                }
                Remedy::Decompose(sub_tasks(session.plan_cycle(), utterances))
            }
            Strategy::Clarify => {
                let question = [&verdict.needed_context, &verdict.user_message]
                    .into_iter()
                    .flatten()
                    .map(|q| q.trim())
                    .find(|q| !q.is_empty())
                    .unwrap_or(CLARIFY_FALLBACK);
                Remedy::Clarify(question.to_string())
            }
            Strategy::Abort => {
                debug!(user_message = ?verdict.user_message, "oracle chose to abort");
                Remedy::Abort(GIVE_UP.to_string())
            }
        }
    }
}

/// Chain sub-tasks so each waits on the one before it
fn sub_tasks(cycle: u64, utterances: Vec<String>) -> Vec<SubTask> {
    let mut previous: Option<String> = None;
    utterances
        .into_iter()
        .enumerate()
        .map(|(i, utterance)| {
            let id = format!("c{}-s{}", cycle, i + 1);
            SubTask {
                id: id.clone(),
                utterance,
                depends_on: previous.replace(id),
            }
        })
        .collect()
}

/// The action a recovery round is charged to
fn charged_action(session: &SessionState) -> String {
    session
        .command()
        .map(|c| c.action.handler_name().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Build the diagnostic prompt from the session
pub fn build_prompt(session: &SessionState, origin: Stage) -> String {
    let mut prompt = String::from("Diagnose this screen reader task and choose a recovery strategy.\n\n");

    prompt.push_str(&format!("User request: {}\n", session.utterance()));
    match session.command() {
        Some(command) => prompt.push_str(&format!(
            "Command: {} (confidence {:.2}) with context \"{}\"\n",
            command.action, command.confidence, command.context
        )),
        None => prompt.push_str("Command: none accepted\n"),
    }

    let page = session.page_context();
    prompt.push_str(&format!("Page: {} {}\n", page.url, page.summary()));
    if let Some(prediction) = session.prediction() {
        prompt.push_str(&format!(
            "Prediction: scroll={} click={} wait={} popups={} confidence={:.2}\n",
            prediction.needs_scroll,
            prediction.needs_click,
            prediction.needs_wait,
            prediction.potential_popups,
            prediction.confidence
        ));
    }

    match origin {
        Stage::ErrorRecovery => prompt.push_str("Outcome: the last cycle failed.\n"),
        _ => prompt.push_str("Outcome: the last cycle needed more than one attempt.\n"),
    }
    prompt.push_str(&format!(
        "Attempts: {} (most on one task: {})\n",
        session.attempts(),
        session.max_task_attempts()
    ));
    if let Some(error) = session.last_error() {
        prompt.push_str(&format!("Error: {}\n", error));
    }

    let history = session.history();
    if !history.is_empty() {
        prompt.push_str("\nRecent executions:\n");
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        for record in history.iter().skip(start) {
            prompt.push_str(&format!(
                "- {} {}(\"{}\"): {}\n",
                if record.success { "ok" } else { "failed" },
                record.action,
                record.context,
                record.result
            ));
        }
    }

    if !session.learned_patterns().is_empty() {
        prompt.push_str("\nLearned so far:\n");
        for pattern in session.learned_patterns() {
            prompt.push_str(&format!("- {}\n", pattern));
        }
    }

    let transcript = session.conversation().transcript(TRANSCRIPT_MESSAGES);
    if !transcript.is_empty() {
        prompt.push_str(&format!("\nConversation:\n{}\n", transcript));
    }

    let actions: Vec<&str> = ActionKind::VOCABULARY
        .iter()
        .map(|a| a.oracle_name())
        .collect();
    prompt.push_str(&format!(
        r#"
Respond with a JSON object:
{{
  "analysis": "what went wrong",
  "strategy": "retry" | "alternative" | "decompose" | "clarify" | "abort",
  "suggested_action": "one of {}" (for alternative),
  "sub_tasks": ["smaller request", ...] (for decompose, in order),
  "clarification_needed": "question for the user" (for clarify),
  "user_message": "message for the user",
  "confidence": 0.0-1.0,
  "learnings": ["pattern worth remembering", ...]
}}"#,
        actions.join(", ")
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fake::{session_with, FakeBrowser};
    use crate::agent::session::ExecutionRecord;
    use crate::agent::task::TaskId;
    use crate::core::{Message, Result, SightlineError};
    use crate::llm::{GenerateOptions, LLMProvider, LLMResponse};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    struct Canned {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMProvider for Canned {
        async fn chat(
            &self,
            model: &str,
            messages: &[Message],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            if let Some(last) = messages.last() {
                self.prompts.lock().unwrap().push(last.content.clone());
            }
            match self.reply {
                Some(reply) => Ok(LLMResponse::text(model, reply)),
                None => Err(SightlineError::ollama("connection refused")),
            }
        }

        async fn is_model_available(&self, _model: &str) -> Result<bool> {
            Ok(true)
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn engine(reply: Option<&'static str>) -> (RecoveryEngine, Arc<Canned>) {
        let provider = Arc::new(Canned {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        let oracle = Oracle::new(provider.clone(), "test");
        (RecoveryEngine::new(oracle, &AgentConfig::default()), provider)
    }

    fn failed_click(browser: &FakeBrowser) -> SessionState {
        session_with(
            browser,
            vec![
                StateDelta::BeginTurn {
                    utterance: "click the sign in button".into(),
                },
                StateDelta::AcceptCommand(Command::new(ActionKind::ClickElement, 0.9, "sign in")),
                StateDelta::RecordExecution(ExecutionRecord {
                    task_id: TaskId::new(1, 1),
                    action: "click_element".into(),
                    context: "sign in".into(),
                    result: "element is not interactable".into(),
                    success: false,
                    at: Utc::now(),
                }),
                StateDelta::Error(Some("element is not interactable".into())),
            ],
        )
    }

    #[test]
    fn test_routes() {
        let alternative = Remedy::Alternative(Command::new(ActionKind::FindText, 0.9, "x"));
        assert_eq!(alternative.route(Stage::Reflect), Stage::Plan);
        assert_eq!(alternative.route(Stage::ErrorRecovery), Stage::Prepare);
        assert_eq!(Remedy::Retry.route(Stage::Reflect), Stage::Prepare);
        assert_eq!(Remedy::Decompose(vec![]).route(Stage::ErrorRecovery), Stage::Analyze);
        assert_eq!(Remedy::Clarify("?".into()).route(Stage::Reflect), Stage::End);
        assert_eq!(Remedy::Continue.route(Stage::Reflect), Stage::End);
    }

    #[tokio::test]
    async fn test_decompose_chains_sub_tasks() {
        let browser = FakeBrowser::new();
        let session = failed_click(&browser);
        let (engine, provider) = engine(Some(
            r#"{"analysis": "button hidden in a menu", "strategy": "decompose",
                "sub_tasks": ["open the account menu", {"description": "click sign in"}],
                "dependencies": {"2": []}, "confidence": 0.8, "learnings": "sign in lives in the account menu"}"#,
        ));

        let recovery = engine.recover(&session, Stage::ErrorRecovery).await;
        let Remedy::Decompose(tasks) = &recovery.remedy else {
            panic!("expected decompose, got {:?}", recovery.remedy);
        };
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].utterance, "open the account menu");
        assert_eq!(tasks[0].depends_on, None);
        assert_eq!(tasks[1].depends_on.as_deref(), Some(tasks[0].id.as_str()));
        assert_eq!(recovery.diagnosis, "button hidden in a menu");
        assert_eq!(recovery.charged.as_deref(), Some("click_element"));

        let prompt = provider.prompts.lock().unwrap().join("\n");
        assert!(prompt.contains("failed click_element(\"sign in\")"));
        assert!(prompt.contains("Error: element is not interactable"));

        let mut session = session;
        session.apply(recovery.deltas()).unwrap();
        assert_eq!(session.utterance(), "open the account menu");
        assert_eq!(session.queued_subtasks().count(), 1);
        assert_eq!(session.recovery_attempts("click_element"), 1);
        assert_eq!(
            session.learned_patterns(),
            &["sign in lives in the account menu".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_decompose_aborts() {
        let browser = FakeBrowser::new();
        let (engine, _) = self::engine(Some(r#"{"strategy": "decompose", "sub_tasks": []}"#));
        let recovery = engine.recover(&failed_click(&browser), Stage::Reflect).await;
        assert_eq!(recovery.remedy, Remedy::Abort(GIVE_UP.to_string()));
    }

    #[tokio::test]
    async fn test_alternative_needs_confidence_and_a_valid_action() {
        let browser = FakeBrowser::new();
        let session = failed_click(&browser);

        let (engine, _) = self::engine(Some(
            r#"{"strategy": "alternative", "suggested_action": "find", "confidence": 0.85,
                "needed_context": "whether the user is logged out"}"#,
        ));
        let recovery = engine.recover(&session, Stage::ErrorRecovery).await;
        let Remedy::Alternative(command) = &recovery.remedy else {
            panic!("expected alternative, got {:?}", recovery.remedy);
        };
        assert_eq!(command.action, ActionKind::FindText);
        assert_eq!(command.context, "sign in");

        let (engine, _) = self::engine(Some(
            r#"{"strategy": "alternative", "suggested_action": "find", "confidence": 0.5}"#,
        ));
        let recovery = engine.recover(&session, Stage::ErrorRecovery).await;
        assert_eq!(recovery.remedy, Remedy::Abort(APOLOGY.to_string()));

        let (engine, _) = self::engine(Some(
            r#"{"strategy": "alternative", "suggested_action": "teleport", "confidence": 0.95}"#,
        ));
        let recovery = engine.recover(&session, Stage::ErrorRecovery).await;
        assert_eq!(recovery.remedy, Remedy::Abort(APOLOGY.to_string()));
    }

    #[tokio::test]
    async fn test_clarify_uses_needed_context() {
        let browser = FakeBrowser::new();
        let (engine, _) = self::engine(Some(
            r#"{"strategy": "clarify", "clarification_needed": "Which sign in button?"}"#,
        ));
        let recovery = engine.recover(&failed_click(&browser), Stage::Reflect).await;
        assert_eq!(recovery.remedy, Remedy::Clarify("Which sign in button?".into()));
        assert!(recovery
            .deltas()
            .contains(&StateDelta::Message("Which sign in button?".into())));
    }

    #[tokio::test]
    async fn test_oracle_failure_aborts_with_apology() {
        let browser = FakeBrowser::new();
        let (engine, _) = self::engine(None);
        let recovery = engine.recover(&failed_click(&browser), Stage::ErrorRecovery).await;
        assert_eq!(recovery.remedy, Remedy::Abort(APOLOGY.to_string()));

        let (engine, _) = self::engine(Some("I think you should retry"));
        let recovery = engine.recover(&failed_click(&browser), Stage::ErrorRecovery).await;
        assert_eq!(recovery.remedy, Remedy::Abort(APOLOGY.to_string()));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_skips_the_oracle() {
        let browser = FakeBrowser::new();
        let mut session = failed_click(&browser);
        session
            .apply(vec![
                StateDelta::CountRecovery("click_element".into()),
                StateDelta::CountRecovery("click_element".into()),
            ])
            .unwrap();

        let (engine, provider) = engine(Some(r#"{"strategy": "retry"}"#));
        let recovery = engine.recover(&session, Stage::ErrorRecovery).await;
        assert_eq!(recovery.remedy, Remedy::Abort(GIVE_UP.to_string()));
        assert!(recovery.charged.is_none());
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spent_budget_after_success_continues() {
        let browser = FakeBrowser::new();
        let mut session = failed_click(&browser);
        session
            .apply(vec![
                StateDelta::CountRecovery("click_element".into()),
                StateDelta::CountRecovery("click_element".into()),
            ])
            .unwrap();

        let (engine, provider) = engine(Some(r#"{"strategy": "abort"}"#));
        let recovery = engine.recover(&session, Stage::Reflect).await;
        assert_eq!(recovery.remedy, Remedy::Continue);
        assert!(recovery.charged.is_none());
        assert!(recovery.deltas().is_empty());
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort_uses_fixed_message() {
        let browser = FakeBrowser::new();
        let (engine, _) = self::engine(Some(
            r#"{"strategy": "abort", "user_message": "The site is broken, try again tomorrow!\nSorry."}"#,
        ));
        let recovery = engine.recover(&failed_click(&browser), Stage::ErrorRecovery).await;
        assert_eq!(recovery.remedy, Remedy::Abort(GIVE_UP.to_string()));
    }

    #[test]
    fn test_unknown_strategy_is_abort() {
        assert_eq!(Strategy::parse("Retry"), Strategy::Retry);
        assert_eq!(Strategy::parse("escalate"), Strategy::Abort);
    }
}
