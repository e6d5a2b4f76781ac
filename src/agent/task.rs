//! Tasks, task status and execution plans

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::core::{Result, SightlineError};

/// Task identifier, unique across planning cycles of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(cycle: u64, index: usize) -> Self {
        Self(format!("c{}-t{}", cycle, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One unit of planned work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Registry name of the handler that runs this task
    pub action: String,
    pub context: String,
    pub dependencies: BTreeSet<TaskId>,
    pub can_parallel: bool,
    pub state: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    pub fn new(id: TaskId, action: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id,
            action: action.into(),
            context: context.into(),
            dependencies: BTreeSet::new(),
            can_parallel: false,
            state: serde_json::Map::new(),
        }
    }

    pub fn depends_on(mut self, id: &TaskId) -> Self {
        self.dependencies.insert(id.clone());
        self
    }

    pub fn with_state(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.state.insert(key.to_string(), value.into());
        self
    }
}

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Execution record of a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub status: Status,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self::with_attempts(0)
    }

    /// A fresh pending record that keeps an earlier attempt count
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            status: Status::Pending,
            start_time: None,
            end_time: None,
            error: None,
            attempts,
        }
    }

    /// Pending and never picked up by the executor
    pub fn never_started(&self) -> bool {
        self.status == Status::Pending && self.start_time.is_none()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, Status::Completed | Status::Failed)
    }

    /// Return the status after moving to `to`, rejecting invalid transitions
    pub fn transition(
        &self,
        task: &TaskId,
        to: Status,
        at: DateTime<Utc>,
        error: Option<String>,
    ) -> Result<Self> {
        let mut next = self.clone();
        match (self.status, to) {
            (Status::Pending, Status::Running) => {
                next.start_time = Some(at);
                next.attempts += 1;
            }
            (Status::Running, Status::Completed) => {
                next.end_time = Some(at);
            }
            (Status::Running, Status::Failed) => {
                next.end_time = Some(at);
                next.error = error;
            }
            (from, to) => {
                return Err(SightlineError::InvalidTransition {
                    task: task.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                })
            }
        }
        next.status = to;
        Ok(next)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::pending()
    }
}

/// One step of an execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanEntry {
    Single(TaskId),
    /// Tasks labelled as parallel; they still run one after another
    Group(Vec<TaskId>),
}

impl PlanEntry {
    pub fn task_ids(&self) -> &[TaskId] {
        match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Group(ids) => ids,
        }
    }
}

/// Ordered schedule of tasks and task groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn new(entries: Vec<PlanEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlanEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Task ids in plan order
    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.entries.iter().flat_map(|e| e.task_ids().iter())
    }

    /// Index of the entry holding `task`
    pub fn position_of(&self, task: &TaskId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.task_ids().contains(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_are_cycle_scoped() {
        assert_eq!(TaskId::new(3, 1).as_str(), "c3-t1");
        assert_ne!(TaskId::new(1, 1), TaskId::new(2, 1));
    }

    #[test]
    fn test_valid_transitions() {
        let id = TaskId::new(1, 1);
        let now = Utc::now();
        let status = TaskStatus::pending();
        assert!(status.never_started());

        let running = status.transition(&id, Status::Running, now, None).unwrap();
        assert_eq!(running.attempts, 1);
        assert_eq!(running.start_time, Some(now));
        assert!(!running.never_started());

        let failed = running
            .transition(&id, Status::Failed, now, Some("boom".into()))
            .unwrap();
        assert_eq!(failed.status, Status::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.is_finished());
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let id = TaskId::new(1, 1);
        let now = Utc::now();
        let pending = TaskStatus::pending();
        assert!(pending.transition(&id, Status::Completed, now, None).is_err());

        let running = pending.transition(&id, Status::Running, now, None).unwrap();
        let done = running.transition(&id, Status::Completed, now, None).unwrap();
        for to in [Status::Pending, Status::Running, Status::Failed] {
            let err = done.transition(&id, to, now, None).unwrap_err();
            assert!(matches!(err, SightlineError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn test_plan_lookup() {
        let a = TaskId::new(1, 1);
        let b = TaskId::new(1, 2);
        let c = TaskId::new(1, 3);
        let plan = ExecutionPlan::new(vec![
            PlanEntry::Single(a.clone()),
            PlanEntry::Group(vec![b.clone(), c.clone()]),
        ]);
        assert_eq!(plan.position_of(&c), Some(1));
        assert_eq!(plan.task_ids().count(), 3);
        assert_eq!(plan.get(0), Some(&PlanEntry::Single(a)));
    }
}
