//! Session state and its reducer
//!
//! `SessionState` is the one record the orchestration stages share. Stages
//! and handlers never mutate it directly: they return [`StateDelta`] values
//! and [`SessionState::apply`] folds them in. A batch applies entirely or not
//! at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::agent::command::Command;
use crate::agent::conversation::Conversation;
use crate::agent::task::{ExecutionPlan, Status, Task, TaskId, TaskStatus};
use crate::browser::{DriverHandle, Headline};
use crate::core::{ActionPrediction, ElementContext, PageContext, Result, SightlineError};

/// Append-only log entry for one task execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task_id: TaskId,
    pub action: String,
    pub context: String,
    pub result: String,
    pub success: bool,
    pub at: DateTime<Utc>,
}

/// A fragment of a decomposed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub utterance: String,
    pub depends_on: Option<String>,
}

/// Cursor over focusable elements for next/previous navigation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusCursor {
    pub elements: Vec<ElementContext>,
    pub index: Option<usize>,
}

/// Counts gathered by the auxiliary analysis tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInsights {
    pub headline_count: usize,
    pub article_words: usize,
    pub section_count: usize,
    pub landmark_count: usize,
    pub heading_count: usize,
}

/// A single change to the session
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    /// Supersede the page context; a new URL also invalidates element state
    PageContext(PageContext),
    ElementContext(Option<ElementContext>),
    Prediction(Option<ActionPrediction>),
    Headlines(Vec<Headline>),
    Focus(FocusCursor),
    LastFound(Option<ElementContext>),
    Insights(PageInsights),
    /// Start a user turn: record the utterance and reset per-turn bookkeeping
    BeginTurn { utterance: String },
    /// Start a new cycle inside the turn on a different utterance
    BeginCycle { utterance: String },
    AcceptCommand(Command),
    /// Replace the task graph and plan with a freshly planned cycle
    InstallPlan {
        cycle: u64,
        tasks: Vec<Task>,
        plan: ExecutionPlan,
    },
    /// Record a status change made by the executor
    TaskStatus { task: TaskId, status: TaskStatus },
    /// Move the plan cursor to the given entry
    PlanCursor(usize),
    RecordExecution(ExecutionRecord),
    Attempts(u32),
    Error(Option<String>),
    /// Count one recovery round against an action
    CountRecovery(String),
    LearnPattern(String),
    /// Give failed and never-started tasks a fresh pending record
    RearmForRetry,
    Decompose {
        active: SubTask,
        queued: Vec<SubTask>,
    },
    CompleteSubTask,
    ActivateNextSubTask,
    DropSubTasks,
    Message(String),
    /// Move pending assistant messages into the conversation
    FlushMessages,
}

/// Typed state threading the orchestration stages together
#[derive(Debug, Clone)]
pub struct SessionState {
    max_history: usize,
    conversation: Conversation,
    driver: DriverHandle,
    page_context: PageContext,
    element_context: Option<ElementContext>,
    prediction: Option<ActionPrediction>,
    utterance: String,
    command: Option<Command>,
    tasks: Vec<Task>,
    statuses: BTreeMap<TaskId, TaskStatus>,
    plan: ExecutionPlan,
    plan_cursor: usize,
    plan_cycle: u64,
    /// Most recent executions, at most `max_history`
    history: VecDeque<ExecutionRecord>,
    attempts: u32,
    recovery_attempts: HashMap<String, u32>,
    last_error: Option<String>,
    learned_patterns: Vec<String>,
    headlines: Vec<Headline>,
    focus: FocusCursor,
    last_found: Option<ElementContext>,
    insights: PageInsights,
    active_subtask: Option<SubTask>,
    subtask_queue: VecDeque<SubTask>,
    completed_subtasks: BTreeSet<String>,
    pending_messages: Vec<String>,
}

impl SessionState {
    pub fn new(driver: DriverHandle, max_history: usize) -> Self {
        Self {
            max_history,
            conversation: Conversation::new(max_history),
            driver,
            page_context: PageContext::default(),
            element_context: None,
            prediction: None,
            utterance: String::new(),
            command: None,
            tasks: Vec::new(),
            statuses: BTreeMap::new(),
            plan: ExecutionPlan::default(),
            plan_cursor: 0,
            plan_cycle: 0,
            history: VecDeque::new(),
            attempts: 0,
            recovery_attempts: HashMap::new(),
            last_error: None,
            learned_patterns: Vec::new(),
            headlines: Vec::new(),
            focus: FocusCursor::default(),
            last_found: None,
            insights: PageInsights::default(),
            active_subtask: None,
            subtask_queue: VecDeque::new(),
            completed_subtasks: BTreeSet::new(),
            pending_messages: Vec::new(),
        }
    }

    /// Apply a batch of deltas atomically
    pub fn apply(&mut self, deltas: impl IntoIterator<Item = StateDelta>) -> Result<()> {
        let mut next = self.clone();
        for delta in deltas {
            next.reduce(delta)?;
        }
        *self = next;
        Ok(())
    }

    fn reduce(&mut self, delta: StateDelta) -> Result<()> {
        match delta {
            StateDelta::PageContext(context) => {
                if context.url != self.page_context.url {
                    self.element_context = None;
                    self.last_found = None;
                    self.focus = FocusCursor::default();
                }
                self.page_context = context;
            }
            StateDelta::ElementContext(element) => self.element_context = element,
            StateDelta::Prediction(prediction) => self.prediction = prediction,
            StateDelta::Headlines(headlines) => self.headlines = headlines,
            StateDelta::Focus(focus) => {
                if let Some(index) = focus.index {
                    if index >= focus.elements.len() {
                        return Err(SightlineError::Other(format!(
                            "focus index {} out of range for {} elements",
                            index,
                            focus.elements.len()
                        )));
                    }
                }
                self.focus = focus;
            }
            StateDelta::LastFound(element) => self.last_found = element,
            StateDelta::Insights(insights) => self.insights = insights,
            StateDelta::BeginTurn { utterance } => {
                self.conversation.add_user(utterance.clone());
                self.utterance = utterance;
                self.clear_cycle();
                self.attempts = 0;
                self.recovery_attempts.clear();
                self.last_error = None;
                self.pending_messages.clear();
                self.active_subtask = None;
                self.subtask_queue.clear();
                self.completed_subtasks.clear();
            }
            StateDelta::BeginCycle { utterance } => {
                self.utterance = utterance;
                self.clear_cycle();
                self.last_error = None;
            }
            StateDelta::AcceptCommand(command) => {
                if command.is_clarification() {
                    return Err(SightlineError::classification(
                        "a clarification cannot be accepted as a command",
                    ));
                }
                self.command = Some(command);
            }
            StateDelta::InstallPlan { cycle, tasks, plan } => {
                if cycle <= self.plan_cycle {
                    return Err(SightlineError::planning(format!(
                        "planning cycle {} is not newer than {}",
                        cycle, self.plan_cycle
                    )));
                }
                self.statuses = tasks
                    .iter()
                    .map(|t| (t.id.clone(), TaskStatus::pending()))
                    .collect();
                self.tasks = tasks;
                self.plan = plan;
                self.plan_cursor = 0;
                self.plan_cycle = cycle;
            }
            StateDelta::TaskStatus { task, status } => {
                let current = self.statuses.get(&task).ok_or_else(|| {
                    SightlineError::Other(format!("unknown task {}", task))
                })?;
                if !transition_allowed(current.status, status.status) {
                    return Err(SightlineError::InvalidTransition {
                        task: task.to_string(),
                        from: current.status.to_string(),
                        to: status.status.to_string(),
                    });
                }
                self.statuses.insert(task, status);
            }
            StateDelta::PlanCursor(cursor) => self.plan_cursor = cursor.min(self.plan.len()),
            StateDelta::RecordExecution(record) => {
                self.history.push_back(record);
                while self.history.len() > self.max_history {
                    self.history.pop_front();
                }
            }
            StateDelta::Attempts(attempts) => self.attempts = attempts,
            StateDelta::Error(error) => self.last_error = error,
            StateDelta::CountRecovery(action) => {
                *self.recovery_attempts.entry(action).or_insert(0) += 1;
            }
            StateDelta::LearnPattern(pattern) => {
                let pattern = pattern.trim().to_string();
                if !pattern.is_empty() && !self.learned_patterns.contains(&pattern) {
                    self.learned_patterns.push(pattern);
                }
            }
            StateDelta::RearmForRetry => {
                for status in self.statuses.values_mut() {
                    if status.status != Status::Completed {
                        *status = TaskStatus::with_attempts(status.attempts);
                    }
                }
                self.plan_cursor = self
                    .plan
                    .entries()
                    .iter()
                    .position(|entry| {
                        entry.task_ids().iter().any(|id| {
                            self.statuses
                                .get(id)
                                .is_some_and(|s| s.status != Status::Completed)
                        })
                    })
                    .unwrap_or(self.plan.len());
            }
            StateDelta::Decompose { active, queued } => {
                self.active_subtask = Some(active);
                self.subtask_queue = queued.into();
                self.completed_subtasks.clear();
                self.attempts = 0;
            }
            StateDelta::CompleteSubTask => {
                if let Some(active) = self.active_subtask.take() {
                    self.completed_subtasks.insert(active.id);
                }
            }
            StateDelta::ActivateNextSubTask => {
                let next = self.subtask_queue.pop_front().ok_or_else(|| {
                    SightlineError::Other("no queued sub-task to activate".to_string())
                })?;
                if let Some(dep) = &next.depends_on {
                    if !self.completed_subtasks.contains(dep) {
                        return Err(SightlineError::planning(format!(
                            "sub-task {} depends on unfinished {}",
                            next.id, dep
                        )));
                    }
                }
                self.active_subtask = Some(next);
            }
            StateDelta::DropSubTasks => {
                self.active_subtask = None;
                self.subtask_queue.clear();
            }
            StateDelta::Message(message) => self.pending_messages.push(message),
            StateDelta::FlushMessages => {
                for message in self.pending_messages.drain(..) {
                    self.conversation.add_assistant(message);
                }
            }
        }
        Ok(())
    }

    fn clear_cycle(&mut self) {
        self.command = None;
        self.tasks.clear();
        self.statuses.clear();
        self.plan = ExecutionPlan::default();
        self.plan_cursor = 0;
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Drop conversation and page knowledge, keeping the browser session
    pub fn reset(&mut self) {
        let mut fresh = Self::new(self.driver.clone(), self.max_history);
        fresh.plan_cycle = self.plan_cycle;
        *self = fresh;
    }

    pub fn driver(&self) -> &DriverHandle {
        &self.driver
    }

    pub fn page_context(&self) -> &PageContext {
        &self.page_context
    }

    pub fn element_context(&self) -> Option<&ElementContext> {
        self.element_context.as_ref()
    }

    pub fn prediction(&self) -> Option<&ActionPrediction> {
        self.prediction.as_ref()
    }

    /// Utterance the current cycle is working on
    pub fn utterance(&self) -> &str {
        &self.utterance
    }

    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn status(&self, id: &TaskId) -> Option<&TaskStatus> {
        self.statuses.get(id)
    }

    pub fn statuses(&self) -> &BTreeMap<TaskId, TaskStatus> {
        &self.statuses
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn plan_cursor(&self) -> usize {
        self.plan_cursor
    }

    pub fn plan_cycle(&self) -> u64 {
        self.plan_cycle
    }

    /// Whether any task of the current cycle has not completed
    pub fn has_unfinished_tasks(&self) -> bool {
        self.statuses
            .values()
            .any(|s| s.status != Status::Completed)
    }

    pub fn history(&self) -> &VecDeque<ExecutionRecord> {
        &self.history
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Highest attempt count among the current cycle's tasks
    pub fn max_task_attempts(&self) -> u32 {
        self.statuses.values().map(|s| s.attempts).max().unwrap_or(0)
    }

    pub fn recovery_attempts(&self, action: &str) -> u32 {
        self.recovery_attempts.get(action).copied().unwrap_or(0)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn learned_patterns(&self) -> &[String] {
        &self.learned_patterns
    }

    pub fn headlines(&self) -> &[Headline] {
        &self.headlines
    }

    pub fn focus(&self) -> &FocusCursor {
        &self.focus
    }

    pub fn last_found(&self) -> Option<&ElementContext> {
        self.last_found.as_ref()
    }

    pub fn insights(&self) -> &PageInsights {
        &self.insights
    }

    pub fn active_subtask(&self) -> Option<&SubTask> {
        self.active_subtask.as_ref()
    }

    pub fn queued_subtasks(&self) -> impl Iterator<Item = &SubTask> {
        self.subtask_queue.iter()
    }

    /// Whether the head of the sub-task queue has its dependency completed
    pub fn next_subtask_ready(&self) -> bool {
        self.subtask_queue.front().is_some_and(|next| {
            next.depends_on
                .as_ref()
                .is_none_or(|dep| self.completed_subtasks.contains(dep))
        })
    }

    pub fn pending_messages(&self) -> &[String] {
        &self.pending_messages
    }
}

fn transition_allowed(from: Status, to: Status) -> bool {
    matches!(
        (from, to),
        (Status::Pending, Status::Running)
            | (Status::Running, Status::Completed)
            | (Status::Running, Status::Failed)
    )
}
