use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::FocusSession;
use crate::timer::{TimerKind, TimerState};

pub type TaskId = String;
pub type QuestId = String;
pub type AchievementId = String;

/// Every timer state change produces one of these, delivered to `TimerListener`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEvent {
    pub kind: TimerKind,
    pub task_id: Option<TaskId>,
    pub at: DateTime<Utc>,
    pub signal: TimerSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimerSignal {
    Started { total_secs: u64 },
    Paused { remaining_secs: u64 },
    Resumed { remaining_secs: u64 },
    Tick { remaining_secs: u64 },
    Completed,
    Stopped { remaining_secs: u64 },
    Reset,
}

impl TimerSignal {
    pub fn name(&self) -> &'static str {
        match self {
            TimerSignal::Started { .. } => "started",
            TimerSignal::Paused { .. } => "paused",
            TimerSignal::Resumed { .. } => "resumed",
            TimerSignal::Tick { .. } => "tick",
            TimerSignal::Completed => "completed",
            TimerSignal::Stopped { .. } => "stopped",
            TimerSignal::Reset => "reset",
        }
    }

    /// Completed and Stopped end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TimerSignal::Completed | TimerSignal::Stopped { .. })
    }
}

/// Serializable view of a timer for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub kind: TimerKind,
    pub state: TimerState,
    pub task_id: Option<TaskId>,
    pub total_secs: u64,
    pub remaining_secs: u64,
    pub elapsed_secs: u64,
    pub progress: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    Started { session: FocusSession },
    Paused { session: FocusSession },
    Resumed { session: FocusSession },
    Ended { session: FocusSession },
    HistoryChanged { len: usize },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Started { .. } => "session_started",
            SessionEvent::Paused { .. } => "session_paused",
            SessionEvent::Resumed { .. } => "session_resumed",
            SessionEvent::Ended { .. } => "session_ended",
            SessionEvent::HistoryChanged { .. } => "session_history_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    Completed {
        task_id: TaskId,
        at: DateTime<Utc>,
    },
    Updated {
        task_id: TaskId,
        completed: bool,
        at: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TaskEvent::Completed { .. } => "task_completed",
            TaskEvent::Updated { .. } => "task_updated",
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Completed { task_id, .. } | TaskEvent::Updated { task_id, .. } => task_id,
        }
    }
}

/// What a quest paid out when it completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestReward {
    pub quest_id: QuestId,
    pub xp_awarded: u64,
    pub task_count: usize,
    pub subtask_count: usize,
    /// Set only when the achievement was newly unlocked by this quest.
    pub achievement_unlocked: Option<AchievementId>,
    pub leveled_up: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestEvent {
    Completed { reward: QuestReward },
}

impl QuestEvent {
    pub fn name(&self) -> &'static str {
        match self {
            QuestEvent::Completed { .. } => "quest_completed",
        }
    }
}
