//! Plan execution
//!
//! Walks the plan from the session's cursor, running one task at a time.
//! Every status change, history entry and handler delta goes through the
//! session reducer. The first failed task stops the walk.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::actions::{ActionContext, ActionOutcome, ActionRegistry, Timing};
use crate::agent::predictor;
use crate::agent::session::{ExecutionRecord, SessionState, StateDelta};
use crate::agent::task::{Status, Task, TaskId, TaskStatus};
use crate::core::{ActionPrediction, Config, Result, SightlineError};

/// Result of one executed task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub action: String,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

/// Results of one pass over the plan, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    pub results: Vec<TaskResult>,
}

impl ExecutionReport {
    /// The failed task, if the pass stopped on one
    pub fn failure(&self) -> Option<&TaskResult> {
        self.results.iter().find(|r| !r.success)
    }

    pub fn succeeded(&self) -> bool {
        self.failure().is_none()
    }

    pub fn executed(&self) -> usize {
        self.results.len()
    }
}

/// Runs execution plans against the action registry
pub struct TaskExecutor {
    registry: Arc<ActionRegistry>,
    timing: Timing,
    action_timeout: Duration,
}

impl TaskExecutor {
    pub fn new(registry: Arc<ActionRegistry>, timing: Timing, action_timeout: Duration) -> Self {
        Self {
            registry,
            timing,
            action_timeout,
        }
    }

    pub fn from_config(registry: Arc<ActionRegistry>, config: &Config) -> Self {
        Self::new(registry, Timing::from_config(config), config.action_timeout())
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Execute the remaining plan entries
    ///
    /// Errors only when the session rejects a status change, which means the
    /// plan and the status map disagree.
    #[instrument(skip_all, fields(cycle = session.plan_cycle(), cursor = session.plan_cursor()))]
    pub async fn execute(&self, session: &mut SessionState) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::default();
        let plan = session.plan().clone();

        for index in session.plan_cursor()..plan.len() {
            let Some(entry) = plan.get(index) else { break };

            for id in entry.task_ids() {
                let pending = session.status(id).is_some_and(|s| s.status == Status::Pending);
                if !pending {
                    debug!(task = %id, "already executed this cycle, skipping");
                    continue;
                }
                let Some(task) = session.task(id).cloned() else {
                    return Err(SightlineError::planning(format!(
                        "plan references unknown task {}",
                        id
                    )));
                };

                let result = self.run_task(session, &task).await?;
                let failed = !result.success;
                report.results.push(result);
                if failed {
                    return Ok(report);
                }
            }

            session.apply([StateDelta::PlanCursor(index + 1)])?;
        }

        Ok(report)
    }

    async fn run_task(&self, session: &mut SessionState, task: &Task) -> Result<TaskResult> {
        let prediction = predictor::predict(session.page_context(), session.element_context());
        session.apply([StateDelta::Prediction(Some(prediction.clone()))])?;
        if prediction.needs_wait {
            self.settle(session).await;
        }

        let status = session
            .status(&task.id)
            .cloned()
            .ok_or_else(|| SightlineError::planning(format!("no status for {}", task.id)))?;
        let running = status.transition(&task.id, Status::Running, Utc::now(), None)?;
        let attempts = running.attempts;
        session.apply([
            StateDelta::TaskStatus {
                task: task.id.clone(),
                status: running.clone(),
            },
            StateDelta::Attempts(attempts),
        ])?;
        info!(task = %task.id, action = %task.action, attempts, "running task");

        let outcome = self.invoke(session, task, &prediction).await;

        let (success, output, error, updates) = match outcome {
            Ok(outcome) if outcome.is_success() => {
                let mut updates = outcome.state_updates;
                updates.extend(outcome.messages.into_iter().map(StateDelta::Message));
                (true, outcome.output, None, updates)
            }
            Ok(outcome) => {
                let error = outcome.error.unwrap_or_else(|| outcome.output.clone());
                (false, outcome.output, Some(error), Vec::new())
            }
            Err(e) => (false, String::new(), Some(e.to_string()), Vec::new()),
        };

        if success {
            let completed = running.transition(&task.id, Status::Completed, Utc::now(), None)?;
            let mut batch = vec![
                StateDelta::TaskStatus {
                    task: task.id.clone(),
                    status: completed,
                },
                record(task, &output, true),
                StateDelta::Error(None),
            ];
            batch.extend(updates);

            match session.apply(batch) {
                Ok(()) => {
                    return Ok(TaskResult {
                        task_id: task.id.clone(),
                        action: task.action.clone(),
                        success: true,
                        output,
                        error: None,
                    })
                }
                Err(e) => {
                    warn!(task = %task.id, error = %e, "handler produced an unusable update");
                    return self.fail(session, task, &running, String::new(), e.to_string());
                }
            }
        }

        let error = error.unwrap_or_default();
        self.fail(session, task, &running, output, error)
    }

    async fn invoke(
        &self,
        session: &SessionState,
        task: &Task,
        prediction: &ActionPrediction,
    ) -> Result<ActionOutcome> {
        let handler = self.registry.get(&task.action).ok_or_else(|| {
            SightlineError::execution(&task.action, "no handler is registered for this action")
        })?;

        let ctx = ActionContext {
            session,
            task,
            prediction,
            timing: self.timing,
        };
        match tokio::time::timeout(self.action_timeout, handler.invoke(ctx)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(SightlineError::execution(&task.action, e.to_string())),
            Err(_) => Err(SightlineError::execution(
                &task.action,
                format!("timed out after {}ms", self.action_timeout.as_millis()),
            )),
        }
    }

    fn fail(
        &self,
        session: &mut SessionState,
        task: &Task,
        running: &TaskStatus,
        output: String,
        error: String,
    ) -> Result<TaskResult> {
        warn!(task = %task.id, action = %task.action, %error, "task failed");
        let failed = running.transition(&task.id, Status::Failed, Utc::now(), Some(error.clone()))?;
        session.apply([
            StateDelta::TaskStatus {
                task: task.id.clone(),
                status: failed,
            },
            record(task, &error, false),
            StateDelta::Error(Some(error.clone())),
        ])?;
        Ok(TaskResult {
            task_id: task.id.clone(),
            action: task.action.clone(),
            success: false,
            output,
            error: Some(error),
        })
    }

    async fn settle(&self, session: &SessionState) {
        let driver = session.driver().driver();
        let settled = tokio::time::timeout(self.timing.settle, driver.wait_for_load(self.timing.settle))
            .await
            .map_err(|_| SightlineError::prediction("page did not settle in time"))
            .and_then(|r| r.map_err(|e| SightlineError::prediction(e.to_string())));
        if let Err(e) = settled {
            warn!(error = %e, "ignoring failed settle");
        }
    }
}

fn record(task: &Task, result: &str, success: bool) -> StateDelta {
    StateDelta::RecordExecution(ExecutionRecord {
        task_id: task.id.clone(),
        action: task.action.clone(),
        context: task.context.clone(),
        result: result.to_string(),
        success,
        at: Utc::now(),
    })
}
