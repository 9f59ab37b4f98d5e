//! Glue between a timer and the session tracker.
//!
//! The timer only emits events. Register a [`FocusCoordinator`] as one of its
//! listeners to have Work runs with a bound task open, pause, resume and close
//! focus sessions. Session errors are logged, never pushed back into the timer.

use std::sync::Arc;

use crate::error::Result;
use crate::events::TimerEvent;
use crate::session::{FocusSession, SessionTracker};
use crate::timer::{TimerKind, TimerListener};

pub struct FocusCoordinator {
    sessions: Arc<SessionTracker>,
}

impl FocusCoordinator {
    pub fn new(sessions: Arc<SessionTracker>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.sessions
    }

    /// Only Work timers with a bound task are tracked.
    fn tracked(event: &TimerEvent) -> Option<&str> {
        match event.kind {
            TimerKind::Work => event.task_id.as_deref(),
            TimerKind::ShortBreak | TimerKind::LongBreak => None,
        }
    }

    fn owns_current(&self, task_id: &str) -> bool {
        self.sessions
            .current_session()
            .map(|s| s.task_id == task_id)
            .unwrap_or(false)
    }

    fn log_failure(action: &str, event: &TimerEvent, result: Result<FocusSession>) {
        if let Err(err) = result {
            tracing::warn!(
                action,
                task = event.task_id.as_deref().unwrap_or("-"),
                "session update skipped: {err}"
            );
        }
    }
}

impl TimerListener for FocusCoordinator {
    fn on_started(&self, event: &TimerEvent) {
        if let Some(task_id) = Self::tracked(event) {
            Self::log_failure("start", event, self.sessions.start_session_at(task_id, event.at));
        }
    }

    fn on_paused(&self, event: &TimerEvent) {
        if let Some(task_id) = Self::tracked(event) {
            if self.owns_current(task_id) {
                Self::log_failure("pause", event, self.sessions.pause_current_session_at(event.at));
            }
        }
    }

    fn on_resumed(&self, event: &TimerEvent) {
        if let Some(task_id) = Self::tracked(event) {
            if self.owns_current(task_id) {
                Self::log_failure(
                    "resume",
                    event,
                    self.sessions.resume_current_session_at(event.at),
                );
            }
        }
    }

    fn on_completed(&self, event: &TimerEvent) {
        if let Some(task_id) = Self::tracked(event) {
            if self.owns_current(task_id) {
                Self::log_failure(
                    "complete",
                    event,
                    self.sessions.complete_current_session_at(event.at),
                );
            }
        }
    }

    fn on_stopped(&self, event: &TimerEvent) {
        if let Some(task_id) = Self::tracked(event) {
            if self.owns_current(task_id) {
                Self::log_failure("end", event, self.sessions.end_current_session_at(event.at));
            }
        }
    }

    /// A reset from `Running` or `Paused` is preceded by `Stopped`, which already
    /// closed the session. This covers a reset that lands after the run finished
    /// counting but before `Completed` went out.
    fn on_reset(&self, event: &TimerEvent) {
        if let Some(task_id) = Self::tracked(event) {
            if self.owns_current(task_id) {
                Self::log_failure("end", event, self.sessions.end_current_session_at(event.at));
            }
        }
    }
}
