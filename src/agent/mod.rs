//! Agent module - orchestration of one user turn
//!
//! Contains the stages a command goes through (classification, page
//! analysis, planning, prediction, execution, recovery), the session state
//! they share, and the orchestrator that drives them.

pub mod analyzer;
pub mod classifier;
pub mod command;
pub mod conversation;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod predictor;
pub mod recovery;
pub mod session;
pub mod task;
pub mod turn;

pub use command::{ActionKind, Command};
pub use conversation::Conversation;
pub use orchestrator::Agent;
pub use session::{SessionState, StateDelta};
pub use task::{ExecutionPlan, PlanEntry, Task, TaskId, TaskStatus};
pub use turn::Stage;
