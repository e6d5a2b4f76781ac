//! Agent orchestrator
//!
//! Runs one user turn through the stage machine:
//! ANALYZE → PLAN → PREPARE → EXECUTE, then END, or REFLECT / ERROR_RECOVERY
//! which route back into the cycle. The turn works on a copy of the session
//! that is committed only when the turn completes, so a cancelled turn leaves
//! no trace.

use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::actions::ActionRegistry;
use crate::agent::analyzer::PageAnalyzer;
use crate::agent::classifier::{suggested_actions, Gate, IntentClassifier};
use crate::agent::command::Command;
use crate::agent::executor::{ExecutionReport, TaskExecutor};
use crate::agent::planner::TaskPlanner;
use crate::agent::predictor;
use crate::agent::recovery::{RecoveryEngine, Remedy, APOLOGY};
use crate::agent::session::{SessionState, StateDelta};
use crate::agent::turn::{Refusal, Stage, TurnState};
use crate::browser::{AgentBrowserDriver, BrowserDriver, DriverHandle};
use crate::core::{Config, Result, SightlineError};
use crate::llm::{LLMProvider, OllamaClient, Oracle};

const TOO_MANY_STEPS: &str =
    "I'm having trouble completing this task. It is taking too many steps, so I stopped.";
const UNPLANNABLE: &str = "I couldn't work out how to do that on this page.";
const NOTHING_TO_SAY: &str = "Done.";

/// Main agent that drives the browser from free-text commands
pub struct Agent {
    config: Config,
    provider: Arc<dyn LLMProvider>,
    classifier: IntentClassifier,
    analyzer: PageAnalyzer,
    planner: TaskPlanner,
    executor: TaskExecutor,
    recovery: RecoveryEngine,
    /// Committed session; turns run on a copy
    session: SessionState,
    /// Whether `initialize` must find the agent-browser CLI
    needs_agent_browser: bool,
}

impl Agent {
    /// Create an agent over the given oracle provider and browser
    pub fn new(
        config: Config,
        provider: Arc<dyn LLMProvider>,
        driver: Arc<dyn BrowserDriver>,
    ) -> Result<Self> {
        let registry = ActionRegistry::with_defaults()?;
        Ok(Self::with_registry(config, provider, driver, registry))
    }

    /// Create an agent with a custom action registry
    pub fn with_registry(
        config: Config,
        provider: Arc<dyn LLMProvider>,
        driver: Arc<dyn BrowserDriver>,
        registry: ActionRegistry,
    ) -> Self {
        let oracle = Oracle::from_config(provider.clone(), &config);
        let session = SessionState::new(DriverHandle::new(driver), config.agent.max_history);

        Self {
            classifier: IntentClassifier::new(oracle.clone(), Gate::from(&config.agent)),
            analyzer: PageAnalyzer::new(oracle.clone()),
            planner: TaskPlanner::new(),
            executor: TaskExecutor::from_config(Arc::new(registry), &config),
            recovery: RecoveryEngine::new(oracle, &config.agent),
            session,
            provider,
            config,
            needs_agent_browser: false,
        }
    }

    /// Create an agent backed by Ollama and the agent-browser CLI
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = Arc::new(OllamaClient::from_config(&config)?);
        let driver = Arc::new(AgentBrowserDriver::from_config(&config));
        let mut agent = Self::new(config, provider, driver)?;
        agent.needs_agent_browser = true;
        Ok(agent)
    }

    /// Check that the oracle model and the browser are reachable
    pub async fn initialize(&mut self) -> Result<()> {
        let models = self.provider.list_models().await.map_err(|e| {
            SightlineError::ollama(format!(
                "Ollama is not reachable at {} ({})",
                self.config.ollama_url(),
                e
            ))
        })?;
        debug!(?models, "available models");

        let model = &self.config.models.oracle;
        if !self.provider.is_model_available(model).await? {
            return Err(SightlineError::ModelNotFound(model.clone()));
        }

        if self.needs_agent_browser && !AgentBrowserDriver::is_available().await {
            return Err(SightlineError::AgentBrowserNotFound);
        }

        info!(model = %model, provider = self.provider.name(), "agent ready");
        Ok(())
    }

    /// Process one utterance and return the assistant's reply
    ///
    /// Turn-level failures become a reply; the session is updated only when
    /// this future runs to completion.
    pub async fn process(&mut self, utterance: &str) -> Result<String> {
        let utterance = utterance.trim();
        let mut working = self.session.clone();
        let span = info_span!("turn", cycle = working.plan_cycle() + 1);

        let reply = match self.run_turn(&mut working, utterance).instrument(span).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "turn failed");
                working = self.session.clone();
                working.apply([
                    StateDelta::BeginTurn {
                        utterance: utterance.to_string(),
                    },
                    StateDelta::Message(APOLOGY.to_string()),
                    StateDelta::FlushMessages,
                ])?;
                APOLOGY.to_string()
            }
        };

        self.session = working;
        Ok(reply)
    }

    async fn run_turn(&self, session: &mut SessionState, utterance: &str) -> Result<String> {
        session.apply([StateDelta::BeginTurn {
            utterance: utterance.to_string(),
        }])?;

        let mut turn = TurnState::new(self.config.agent.max_transitions);
        // command chosen by recovery for the next PLAN stage
        let mut replacement: Option<Command> = None;

        while turn.should_continue() {
            let stage = turn.stage();
            debug!(%stage, transitions = turn.transitions(), "stage");

            let next = match stage {
                Stage::Analyze => {
                    self.analyze(session).await?;
                    Stage::Plan
                }
                Stage::Plan => self.plan(session, replacement.take()).await?,
                Stage::Prepare => {
                    self.prepare(session)?;
                    Stage::Execute
                }
                Stage::Execute => {
                    let report = self.executor.execute(session).await?;
                    self.after_execute(session, &report)?
                }
                Stage::Reflect | Stage::ErrorRecovery => {
                    self.recover(session, stage, &mut replacement).await?
                }
                Stage::End => break,
            };

            if let Err(refusal) = turn.advance(next) {
                let message = match refusal {
                    Refusal::TooManySteps => TOO_MANY_STEPS,
                    Refusal::InvalidEdge => APOLOGY,
                };
                session.apply([
                    StateDelta::DropSubTasks,
                    StateDelta::Message(message.to_string()),
                ])?;
            }
        }

        info!(path = ?turn.path(), "turn finished");
        let reply = if session.pending_messages().is_empty() {
            NOTHING_TO_SAY.to_string()
        } else {
            session.pending_messages().join("\n")
        };
        session.apply([StateDelta::FlushMessages])?;
        Ok(reply)
    }

    /// ANALYZE: refresh the page context; a failed probe keeps the old one
    async fn analyze(&self, session: &mut SessionState) -> Result<()> {
        match self.analyzer.analyze(session.driver().driver()).await {
            Ok(page) => {
                debug!(url = %page.url, page_type = %page.page_type, "page analysed");
                session.apply([StateDelta::PageContext(page)])
            }
            Err(e) => {
                warn!(error = %e, "page analysis failed, keeping previous context");
                Ok(())
            }
        }
    }

    /// PLAN: classify the utterance, or take the recovery's command, and plan it
    async fn plan(&self, session: &mut SessionState, replacement: Option<Command>) -> Result<Stage> {
        let command = match replacement {
            Some(command) => command,
            None => {
                let page = session.page_context();
                let suggested = suggested_actions(page);
                self.classifier
                    .classify(session.utterance(), page, &suggested)
                    .await
            }
        };

        if command.is_clarification() {
            session.apply([
                StateDelta::DropSubTasks,
                StateDelta::Message(command.context),
            ])?;
            return Ok(Stage::End);
        }

        self.install(session, command)
    }

    /// Plan a command into a fresh cycle; planning errors end the turn
    fn install(&self, session: &mut SessionState, command: Command) -> Result<Stage> {
        let cycle = session.plan_cycle() + 1;
        match self.planner.plan(&command, session.page_context(), cycle) {
            Ok((tasks, plan)) => {
                info!(cycle, action = %command.action, tasks = tasks.len(), "plan installed");
                session.apply([
                    StateDelta::AcceptCommand(command),
                    StateDelta::InstallPlan { cycle, tasks, plan },
                ])?;
                Ok(Stage::Prepare)
            }
            Err(e @ SightlineError::Planning(_)) => {
                warn!(error = %e, "planning failed");
                session.apply([
                    StateDelta::DropSubTasks,
                    StateDelta::Message(UNPLANNABLE.to_string()),
                ])?;
                Ok(Stage::End)
            }
            Err(e) => Err(e),
        }
    }

    /// PREPARE: predict what the next step will need
    fn prepare(&self, session: &mut SessionState) -> Result<()> {
        let prediction = predictor::predict(session.page_context(), session.element_context());
        debug!(?prediction, "prepared");
        session.apply([StateDelta::Prediction(Some(prediction))])
    }

    fn after_execute(&self, session: &mut SessionState, report: &ExecutionReport) -> Result<Stage> {
        if let Some(failure) = report.failure() {
            info!(
                task = %failure.task_id,
                action = %failure.action,
                error = failure.error.as_deref().unwrap_or_default(),
                "cycle failed"
            );
            return Ok(Stage::ErrorRecovery);
        }
        if session.max_task_attempts() > 1 {
            return Ok(Stage::Reflect);
        }
        self.continue_subtasks(session)
    }

    /// After a successful cycle, start the next queued sub-task if there is one
    fn continue_subtasks(&self, session: &mut SessionState) -> Result<Stage> {
        if session.active_subtask().is_none() {
            return Ok(Stage::End);
        }
        session.apply([StateDelta::CompleteSubTask])?;

        if !session.next_subtask_ready() {
            return Ok(Stage::End);
        }
        let Some(next) = session.queued_subtasks().next().cloned() else {
            return Ok(Stage::End);
        };
        info!(sub_task = %next.id, utterance = %next.utterance, "next sub-task");
        session.apply([
            StateDelta::ActivateNextSubTask,
            StateDelta::BeginCycle {
                utterance: next.utterance,
            },
        ])?;
        Ok(Stage::Analyze)
    }

    /// REFLECT and ERROR_RECOVERY: ask the recovery engine where to go
    async fn recover(
        &self,
        session: &mut SessionState,
        origin: Stage,
        replacement: &mut Option<Command>,
    ) -> Result<Stage> {
        let recovery = self.recovery.recover(session, origin).await;
        if !recovery.diagnosis.is_empty() {
            debug!(diagnosis = %recovery.diagnosis, "recovery diagnosis");
        }
        session.apply(recovery.deltas())?;

        match recovery.remedy {
            Remedy::Continue => self.continue_subtasks(session),
            // nothing failed, so there is nothing to re-run
            Remedy::Retry if origin == Stage::Reflect && !session.has_unfinished_tasks() => {
                self.continue_subtasks(session)
            }
            Remedy::Alternative(command) if origin == Stage::ErrorRecovery => {
                self.install(session, command)
            }
            Remedy::Alternative(command) => {
                *replacement = Some(command);
                Ok(Stage::Plan)
            }
            remedy => Ok(remedy.route(origin)),
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Oracle model in use
    pub fn model(&self) -> &str {
        &self.config.models.oracle
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Forget the conversation and page knowledge
    pub fn clear(&mut self) {
        self.session.reset();
    }

    /// Registered action names
    pub fn actions(&self) -> Vec<&'static str> {
        self.executor.registry().names()
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.provider.list_models().await
    }

    /// Close the browser session
    pub async fn shutdown(&self) -> Result<()> {
        self.session.driver().driver().close().await
    }
}
