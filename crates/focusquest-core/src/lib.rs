//! # Focusquest Core Library
//!
//! Core logic of the focusquest focus tracker: a Pomodoro-style timer whose
//! focus sessions, task completions and quests feed a small progression system.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A state machine driven by its own background ticker on a
//!   tokio runtime. It only emits [`TimerEvent`]s.
//! - **Sessions**: A [`FocusCoordinator`] listens to a timer and records focus
//!   sessions in a [`SessionTracker`], which detects consecutive runs.
//! - **Tasks**: A [`TaskGraph`] of tasks and subtasks. Completion propagates to
//!   parents whose subtasks are all done.
//! - **Quests**: A [`QuestManager`] observes the graph and, once every task of a
//!   quest is complete, grants XP through the [`XpLedger`] and unlocks an
//!   achievement in the [`AchievementRegistry`].
//!
//! Every component fans events out to registered listeners. A panicking
//! listener is logged and skipped; it never affects the emitter or the other
//! listeners.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod listener;
pub mod logging;
pub mod quest;
pub mod reward;
pub mod session;
pub mod task;
pub mod timer;

pub use config::Config;
pub use coordinator::FocusCoordinator;
pub use error::{ConfigError, CoreError, Result, StateError, ValidationError};
pub use events::{
    AchievementId, QuestEvent, QuestId, QuestReward, SessionEvent, TaskEvent, TaskId, TimerEvent,
    TimerSignal, TimerSnapshot,
};
pub use listener::ListenerId;
pub use quest::{Quest, QuestListener, QuestManager};
pub use reward::{xp_threshold, Achievement, AchievementRegistry, XpCurve, XpLedger, XpProgress};
pub use session::{FocusSession, SessionListener, SessionPolicy, SessionTracker};
pub use task::{Task, TaskGraph, TaskObserver, TaskPolicy};
pub use timer::{BreakPolicy, Cycle, TimerEngine, TimerKind, TimerListener, TimerState};
