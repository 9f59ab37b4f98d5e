//! Owned task tree keyed by id.
//!
//! Tasks reference their subtasks and parent by id only. An edge can only be
//! created if the child has no parent yet and is not an ancestor of the new
//! parent, so the graph stays a forest and upward propagation is determinate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError, ValidationError};
use crate::events::{TaskEvent, TaskId};
use crate::listener::{ListenerId, Listeners};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub subtasks: Vec<TaskId>,
    pub parent: Option<TaskId>,
}

impl Task {
    fn new(id: TaskId, title: String) -> Self {
        Self {
            id,
            title,
            completed: false,
            completed_at: None,
            subtasks: Vec::new(),
            parent: None,
        }
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }
}

/// Observer of task completion changes.
pub trait TaskObserver: Send + Sync {
    fn on_event(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Completed { task_id, .. } => self.on_task_completed(task_id),
            TaskEvent::Updated {
                task_id, completed, ..
            } => self.on_task_updated(task_id, *completed),
        }
    }

    fn on_task_completed(&self, _task_id: &str) {}
    fn on_task_updated(&self, _task_id: &str, _completed: bool) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPolicy {
    /// Refuse to complete a task explicitly while any subtask is still open.
    pub require_subtasks_complete: bool,
}

#[derive(Default)]
struct GraphState {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
}

impl GraphState {
    fn get(&self, id: &str) -> Result<&Task> {
        self.tasks
            .get(id)
            .ok_or_else(|| StateError::UnknownTask(id.to_string()).into())
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| StateError::UnknownTask(id.to_string()).into())
    }

    fn ancestors(&self, id: &str) -> Vec<TaskId> {
        let mut chain = Vec::new();
        let mut cursor = self.tasks.get(id);
        while let Some(task) = cursor {
            chain.push(task.id.clone());
            cursor = task.parent.as_deref().and_then(|p| self.tasks.get(p));
        }
        chain
    }

    fn open_subtasks(&self, task: &Task) -> usize {
        task.subtasks
            .iter()
            .filter(|id| !self.tasks.get(id.as_str()).map(|t| t.completed).unwrap_or(false))
            .count()
    }

    /// Completes `id` if every subtask is complete. Returns whether it flipped.
    fn recompute(&mut self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let task = self.get(id)?;
        if task.completed || !task.has_subtasks() || self.open_subtasks(task) > 0 {
            return Ok(false);
        }
        let task = self.get_mut(id)?;
        task.completed = true;
        task.completed_at = Some(at);
        Ok(true)
    }

    /// Walks up from `id`, completing ancestors whose subtasks are all done.
    fn propagate_up(&mut self, id: &str, at: DateTime<Utc>, events: &mut Vec<TaskEvent>) {
        let mut parent = self.tasks.get(id).and_then(|t| t.parent.clone());
        while let Some(pid) = parent {
            match self.recompute(&pid, at) {
                Ok(true) => events.push(TaskEvent::Completed {
                    task_id: pid.clone(),
                    at,
                }),
                _ => break,
            }
            parent = self.tasks.get(&pid).and_then(|t| t.parent.clone());
        }
    }
}

pub struct TaskGraph {
    policy: TaskPolicy,
    state: RwLock<GraphState>,
    observers: Listeners<dyn TaskObserver>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::with_policy(TaskPolicy::default())
    }

    pub fn with_policy(policy: TaskPolicy) -> Self {
        Self {
            policy,
            state: RwLock::new(GraphState::default()),
            observers: Listeners::new(),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn TaskObserver>) -> ListenerId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ListenerId) -> bool {
        self.observers.remove(id)
    }

    // ── Structure ────────────────────────────────────────────────────

    pub fn add_task(&self, id: impl Into<TaskId>, title: impl Into<String>) -> Result<TaskId> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId { entity: "Task" }.into());
        }
        let mut state = self.state.write();
        if state.tasks.contains_key(&id) {
            return Err(StateError::DuplicateTask(id).into());
        }
        state.tasks.insert(id.clone(), Task::new(id.clone(), title.into()));
        state.order.push(id.clone());
        Ok(id)
    }

    /// Hang `child` under `parent`. The child keeps its own subtree.
    pub fn add_subtask(&self, parent: &str, child: &str) -> Result<()> {
        let mut state = self.state.write();
        state.get(parent)?;
        let existing = state.get(child)?.parent.clone();
        if let Some(existing) = existing {
            return Err(StateError::AlreadyHasParent {
                child: child.to_string(),
                parent: existing,
            }
            .into());
        }
        if state.ancestors(parent).iter().any(|id| id == child) {
            return Err(StateError::CycleDetected {
                parent: parent.to_string(),
                child: child.to_string(),
            }
            .into());
        }
        state.get_mut(parent)?.subtasks.push(child.to_string());
        state.get_mut(child)?.parent = Some(parent.to_string());
        Ok(())
    }

    // ── Completion ───────────────────────────────────────────────────

    /// Mark a task complete and propagate upward.
    ///
    /// Returns `false` if the task was already complete (no events).
    pub fn mark_complete(&self, id: &str) -> Result<bool> {
        let at = Utc::now();
        let mut events = Vec::new();
        {
            let mut state = self.state.write();
            let task = state.get(id)?;
            if task.completed {
                return Ok(false);
            }
            if self.policy.require_subtasks_complete {
                let remaining = state.open_subtasks(task);
                if remaining > 0 {
                    return Err(StateError::IncompleteSubtasks {
                        task_id: id.to_string(),
                        remaining,
                    }
                    .into());
                }
            }
            let task = state.get_mut(id)?;
            task.completed = true;
            task.completed_at = Some(at);
            events.push(TaskEvent::Completed {
                task_id: id.to_string(),
                at,
            });
            state.propagate_up(id, at, &mut events);
        }
        self.emit(&events);
        Ok(true)
    }

    /// Reopen a task. Ancestors that already completed stay completed.
    pub fn mark_incomplete(&self, id: &str) -> Result<bool> {
        let at = Utc::now();
        {
            let mut state = self.state.write();
            let task = state.get_mut(id)?;
            if !task.completed {
                return Ok(false);
            }
            task.completed = false;
            task.completed_at = None;
        }
        self.emit(&[TaskEvent::Updated {
            task_id: id.to_string(),
            completed: false,
            at,
        }]);
        Ok(true)
    }

    /// Complete `id` if it has subtasks and all of them are complete.
    ///
    /// Returns `true` only when this call completed the task.
    pub fn recompute_from_subtasks(&self, id: &str) -> Result<bool> {
        let at = Utc::now();
        let mut events = Vec::new();
        {
            let mut state = self.state.write();
            if !state.recompute(id, at)? {
                return Ok(false);
            }
            events.push(TaskEvent::Completed {
                task_id: id.to_string(),
                at,
            });
            state.propagate_up(id, at, &mut events);
        }
        self.emit(&events);
        Ok(true)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Task> {
        self.state.read().tasks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().tasks.contains_key(id)
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.state
            .read()
            .tasks
            .get(id)
            .map(|t| t.completed)
            .unwrap_or(false)
    }

    pub fn subtasks(&self, id: &str) -> Vec<TaskId> {
        self.state
            .read()
            .tasks
            .get(id)
            .map(|t| t.subtasks.clone())
            .unwrap_or_default()
    }

    /// `id` followed by its parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: &str) -> Vec<TaskId> {
        self.state.read().ancestors(id)
    }

    /// Tasks in insertion order.
    pub fn all_tasks(&self) -> Vec<Task> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, events: &[TaskEvent]) {
        for event in events {
            tracing::debug!(task = event.task_id(), event = event.name(), "task event");
            self.observers
                .notify(event.name(), |observer| observer.on_event(event));
        }
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("policy", &self.policy)
            .field("tasks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Completions(Mutex<Vec<String>>);

    impl TaskObserver for Completions {
        fn on_task_completed(&self, task_id: &str) {
            self.0.lock().push(task_id.to_string());
        }
    }

    fn tree() -> TaskGraph {
        // root
        // ├── a
        // │   ├── a1
        // │   └── a2
        // └── b
        let graph = TaskGraph::new();
        for id in ["root", "a", "a1", "a2", "b"] {
            graph.add_task(id, id.to_uppercase()).unwrap();
        }
        graph.add_subtask("root", "a").unwrap();
        graph.add_subtask("root", "b").unwrap();
        graph.add_subtask("a", "a1").unwrap();
        graph.add_subtask("a", "a2").unwrap();
        graph
    }

    #[test]
    fn rejects_duplicate_and_empty_ids() {
        let graph = TaskGraph::new();
        graph.add_task("t1", "One").unwrap();
        assert!(matches!(
            graph.add_task("t1", "Again"),
            Err(CoreError::State(StateError::DuplicateTask(_)))
        ));
        assert!(matches!(
            graph.add_task("  ", "Blank"),
            Err(CoreError::Validation(ValidationError::EmptyId { .. }))
        ));
    }

    #[test]
    fn child_can_have_only_one_parent() {
        let graph = tree();
        graph.add_task("other", "Other").unwrap();
        assert!(matches!(
            graph.add_subtask("other", "a1"),
            Err(CoreError::State(StateError::AlreadyHasParent { .. }))
        ));
    }

    #[test]
    fn cycles_are_rejected() {
        let graph = tree();
        graph.add_task("x", "X").unwrap();
        assert!(matches!(
            graph.add_subtask("a1", "root"),
            Err(CoreError::State(StateError::CycleDetected { .. }))
        ));
        assert!(matches!(
            graph.add_subtask("x", "x"),
            Err(CoreError::State(StateError::CycleDetected { .. }))
        ));
    }

    #[test]
    fn completion_propagates_upward() {
        let graph = tree();
        let seen = Arc::new(Completions::default());
        graph.add_observer(seen.clone());

        assert!(graph.mark_complete("a1").unwrap());
        assert!(!graph.is_completed("a"));

        graph.mark_complete("a2").unwrap();
        assert!(graph.is_completed("a"));
        assert!(!graph.is_completed("root"));

        graph.mark_complete("b").unwrap();
        assert!(graph.is_completed("root"));

        assert_eq!(*seen.0.lock(), vec!["a1", "a2", "a", "b", "root"]);
    }

    #[test]
    fn completing_twice_is_a_noop() {
        let graph = tree();
        let seen = Arc::new(Completions::default());
        graph.add_observer(seen.clone());
        assert!(graph.mark_complete("b").unwrap());
        assert!(!graph.mark_complete("b").unwrap());
        assert_eq!(seen.0.lock().len(), 1);
    }

    #[test]
    fn recompute_is_idempotent() {
        let graph = tree();
        assert!(!graph.recompute_from_subtasks("a").unwrap());
        graph.mark_complete("a1").unwrap();
        graph.mark_complete("a2").unwrap();
        // Propagation already completed `a`.
        assert!(!graph.recompute_from_subtasks("a").unwrap());
        // Leaves never complete through recomputation.
        assert!(!graph.recompute_from_subtasks("b").unwrap());
    }

    #[test]
    fn recompute_completes_when_subtasks_done() {
        let graph = tree();
        graph.mark_complete("a1").unwrap();
        graph.mark_complete("a2").unwrap();
        graph.mark_incomplete("a").unwrap();
        assert!(!graph.is_completed("a"));
        assert!(graph.recompute_from_subtasks("a").unwrap());
        assert!(!graph.recompute_from_subtasks("a").unwrap());
    }

    #[test]
    fn mark_incomplete_emits_update_and_keeps_ancestors() {
        let graph = tree();
        graph.mark_complete("a1").unwrap();
        graph.mark_complete("a2").unwrap();
        assert!(graph.mark_incomplete("a1").unwrap());
        assert!(!graph.mark_incomplete("a1").unwrap());
        assert!(!graph.is_completed("a1"));
        assert!(graph.is_completed("a"));
    }

    #[test]
    fn explicit_parent_completion_allowed_by_default() {
        let graph = tree();
        assert!(graph.mark_complete("a").unwrap());
    }

    #[test]
    fn strict_policy_requires_subtasks() {
        let graph = TaskGraph::with_policy(TaskPolicy {
            require_subtasks_complete: true,
        });
        graph.add_task("p", "P").unwrap();
        graph.add_task("c", "C").unwrap();
        graph.add_subtask("p", "c").unwrap();
        assert!(matches!(
            graph.mark_complete("p"),
            Err(CoreError::State(StateError::IncompleteSubtasks { remaining: 1, .. }))
        ));
        graph.mark_complete("c").unwrap();
        assert!(graph.is_completed("p"));
    }

    #[test]
    fn ancestors_start_with_self() {
        let graph = tree();
        assert_eq!(graph.ancestors("a2"), vec!["a2", "a", "root"]);
        assert!(graph.ancestors("missing").is_empty());
    }

    #[test]
    fn unknown_task_errors() {
        let graph = TaskGraph::new();
        assert!(matches!(
            graph.mark_complete("nope"),
            Err(CoreError::State(StateError::UnknownTask(_)))
        ));
    }
}
