//! Task planning
//!
//! Expands a command into a small task graph (the requested action, an
//! optional follow-up and page-dependent auxiliary analysis), labels tasks
//! that may share a parallel group, and linearises the graph into an
//! [`ExecutionPlan`].

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

use crate::agent::command::Command;
use crate::agent::task::{ExecutionPlan, PlanEntry, Task, TaskId};
use crate::core::{PageContext, Result, SightlineError};

pub const ANALYZE_CONTENT: &str = "analyze_content";
pub const ANALYZE_STRUCTURE: &str = "analyze_structure";
pub const HANDLE_DYNAMIC_CONTENT: &str = "handle_dynamic_content";

/// Builds task graphs and execution plans
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskPlanner;

impl TaskPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan one cycle for an accepted command
    #[instrument(skip(self, command, page), fields(action = %command.action))]
    pub fn plan(
        &self,
        command: &Command,
        page: &PageContext,
        cycle: u64,
    ) -> Result<(Vec<Task>, ExecutionPlan)> {
        if command.is_clarification() {
            return Err(SightlineError::planning(
                "a clarification cannot be planned",
            ));
        }

        let mut ids = (1..).map(|n| TaskId::new(cycle, n));
        let mut next_id = || ids.next().unwrap_or_else(|| TaskId::new(cycle, 0));

        let primary = Task::new(next_id(), command.action.handler_name(), &command.context)
            .with_state("role", "primary");
        let primary_id = primary.id.clone();
        let mut tasks = vec![primary];

        if let Some(next) = command.next_action {
            let context = command.next_context.clone().unwrap_or_default();
            tasks.push(
                Task::new(next_id(), next.handler_name(), context)
                    .depends_on(&primary_id)
                    .with_state("role", "follow_up"),
            );
        }

        let mut auxiliary = Vec::new();
        if !command.action.navigates_away() {
            if page.has_article || page.has_headlines {
                auxiliary.push(Task::new(next_id(), ANALYZE_CONTENT, ""));
            }
            if page.has_main {
                auxiliary.push(Task::new(next_id(), ANALYZE_STRUCTURE, ""));
            }
        }
        if page.dynamic_content {
            auxiliary.push(Task::new(next_id(), HANDLE_DYNAMIC_CONTENT, "").depends_on(&primary_id));
        }
        tasks.extend(
            auxiliary
                .into_iter()
                .map(|t| t.with_state("role", "auxiliary")),
        );

        mark_parallel(&mut tasks);
        let plan = build_plan(&tasks)?;
        debug!(tasks = tasks.len(), entries = plan.len(), "planned");
        Ok((tasks, plan))
    }
}

/// Auxiliary tasks may run in a group when no sibling shares a dependency
fn mark_parallel(tasks: &mut [Task]) {
    let flags: Vec<bool> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            task.state.get("role").and_then(|r| r.as_str()) == Some("auxiliary")
                && tasks
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .all(|(_, other)| task.dependencies.is_disjoint(&other.dependencies))
        })
        .collect();

    for (task, flag) in tasks.iter_mut().zip(flags) {
        task.can_parallel = flag;
    }
}

/// Longest dependency chain below each task; unknown dependencies count as roots
fn depths(tasks: &[Task]) -> HashMap<TaskId, usize> {
    fn visit(
        id: &TaskId,
        by_id: &HashMap<&TaskId, &Task>,
        memo: &mut HashMap<TaskId, usize>,
        path: &mut BTreeSet<TaskId>,
    ) -> usize {
        if let Some(depth) = memo.get(id) {
            return *depth;
        }
        let Some(task) = by_id.get(id) else {
            return 0;
        };
        if !path.insert(id.clone()) {
            // cycle; build_plan reports it
            return 0;
        }
        let depth = task
            .dependencies
            .iter()
            .map(|dep| visit(dep, by_id, memo, path) + 1)
            .max()
            .unwrap_or(0);
        path.remove(id);
        memo.insert(id.clone(), depth);
        depth
    }

    let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();
    let mut memo = HashMap::new();
    for task in tasks {
        visit(&task.id, &by_id, &mut memo, &mut BTreeSet::new());
    }
    memo
}

/// Greedy parallel groups in creation order
///
/// Only `can_parallel` tasks of equal depth are grouped, and a task joins a
/// group only if its dependencies are disjoint from every member's.
/// Single-member groups are dropped.
pub fn parallel_groups(tasks: &[Task]) -> Vec<Vec<TaskId>> {
    let depth = depths(tasks);
    let mut groups: Vec<Vec<&Task>> = Vec::new();

    for task in tasks.iter().filter(|t| t.can_parallel) {
        let level = depth.get(&task.id).copied().unwrap_or(0);
        let slot = groups.iter_mut().find(|group| {
            group
                .first()
                .is_some_and(|first| depth.get(&first.id).copied().unwrap_or(0) == level)
                && group
                    .iter()
                    .all(|member| member.dependencies.is_disjoint(&task.dependencies))
        });
        match slot {
            Some(group) => group.push(task),
            None => groups.push(vec![task]),
        }
    }

    groups
        .into_iter()
        .filter(|g| g.len() > 1)
        .map(|g| g.into_iter().map(|t| t.id.clone()).collect())
        .collect()
}

/// Linearise the task graph
///
/// Each round takes the tasks whose dependencies were placed in earlier
/// rounds. A group whose members are all ready is emitted as one entry at
/// its first member's position; other ready tasks are emitted on their own.
/// A round that places nothing means a cycle or a missing dependency.
pub fn build_plan(tasks: &[Task]) -> Result<ExecutionPlan> {
    let groups = parallel_groups(tasks);
    let group_of: HashMap<&TaskId, usize> = groups
        .iter()
        .enumerate()
        .flat_map(|(i, g)| g.iter().map(move |id| (id, i)))
        .collect();

    let mut placed: BTreeSet<TaskId> = BTreeSet::new();
    let mut entries = Vec::new();

    while placed.len() < tasks.len() {
        let ready: Vec<&Task> = tasks
            .iter()
            .filter(|t| !placed.contains(&t.id) && t.dependencies.is_subset(&placed))
            .collect();

        if ready.is_empty() {
            let stuck: Vec<String> = tasks
                .iter()
                .filter(|t| !placed.contains(&t.id))
                .map(|t| t.id.to_string())
                .collect();
            return Err(SightlineError::planning(format!(
                "unsatisfiable dependencies among {}",
                stuck.join(", ")
            )));
        }

        let ready_ids: BTreeSet<&TaskId> = ready.iter().map(|t| &t.id).collect();
        let mut round: BTreeSet<TaskId> = BTreeSet::new();

        for task in &ready {
            if round.contains(&task.id) {
                continue;
            }
            let whole_group = group_of
                .get(&task.id)
                .map(|&g| &groups[g])
                .filter(|members| members.iter().all(|m| ready_ids.contains(m)));

            match whole_group {
                Some(members) => {
                    round.extend(members.iter().cloned());
                    entries.push(PlanEntry::Group(members.clone()));
                }
                None => {
                    round.insert(task.id.clone());
                    entries.push(PlanEntry::Single(task.id.clone()));
                }
            }
        }

        placed.extend(round);
    }

    Ok(ExecutionPlan::new(entries))
}
