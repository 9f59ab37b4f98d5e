//! Focus session lifecycle.
//!
//! The tracker owns the single "current session" slot and an append-only
//! history of closed sessions. A new session is flagged consecutive when it
//! starts within a tolerance of the moment the previous session's break was
//! due to end.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::model::FocusSession;
use crate::error::{Result, StateError, ValidationError};
use crate::events::{SessionEvent, TaskId};
use crate::listener::{ListenerId, Listeners};
use crate::timer::BreakPolicy;

/// Observer of session lifecycle changes.
pub trait SessionListener: Send + Sync {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { session } => self.on_session_started(session),
            SessionEvent::Paused { session } => self.on_session_paused(session),
            SessionEvent::Resumed { session } => self.on_session_resumed(session),
            SessionEvent::Ended { session } => self.on_session_ended(session),
            SessionEvent::HistoryChanged { len } => self.on_history_changed(*len),
        }
    }

    fn on_session_started(&self, _session: &FocusSession) {}
    fn on_session_paused(&self, _session: &FocusSession) {}
    fn on_session_resumed(&self, _session: &FocusSession) {}
    fn on_session_ended(&self, _session: &FocusSession) {}
    fn on_history_changed(&self, _len: usize) {}
}

/// Break cadence plus the slack allowed around the expected resumption time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub breaks: BreakPolicy,
    pub tolerance_secs: u64,
}

impl SessionPolicy {
    pub fn new(breaks: BreakPolicy, tolerance_secs: u64) -> Result<Self> {
        breaks.validate()?;
        Ok(Self {
            breaks,
            tolerance_secs,
        })
    }

    /// Zero means the next session must start exactly when the break ends.
    pub fn tolerance(&self) -> Duration {
        i64::try_from(self.tolerance_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            breaks: BreakPolicy::default(),
            tolerance_secs: 2 * 60,
        }
    }
}

#[derive(Default)]
struct TrackerState {
    current: Option<FocusSession>,
    history: Vec<FocusSession>,
}

impl TrackerState {
    /// Length of the consecutive run ending with the most recent session.
    fn trailing_streak(&self) -> u32 {
        let mut streak = 0u32;
        for session in self.history.iter().rev() {
            streak += 1;
            if !session.is_consecutive {
                break;
            }
        }
        streak
    }
}

pub struct SessionTracker {
    policy: SessionPolicy,
    state: Mutex<TrackerState>,
    listeners: Listeners<dyn SessionListener>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::with_policy(SessionPolicy::default())
    }

    pub fn with_policy(policy: SessionPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(TrackerState::default()),
            listeners: Listeners::new(),
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start_session(&self, task_id: &str) -> Result<FocusSession> {
        self.start_session_at(task_id, Utc::now())
    }

    pub fn start_session_at(&self, task_id: &str, at: DateTime<Utc>) -> Result<FocusSession> {
        if task_id.trim().is_empty() {
            return Err(ValidationError::EmptyTaskId.into());
        }
        let session = {
            let mut state = self.state.lock();
            if let Some(current) = &state.current {
                return Err(StateError::SessionAlreadyActive {
                    task_id: current.task_id.clone(),
                }
                .into());
            }
            let consecutive = self.is_consecutive(&state, at);
            let session = FocusSession::open(TaskId::from(task_id), at, consecutive);
            state.current = Some(session.clone());
            session
        };
        tracing::info!(
            session = %session.id,
            task = %session.task_id,
            consecutive = session.is_consecutive,
            "focus session started"
        );
        self.emit(SessionEvent::Started {
            session: session.clone(),
        });
        Ok(session)
    }

    pub fn pause_current_session(&self) -> Result<FocusSession> {
        self.pause_current_session_at(Utc::now())
    }

    pub fn pause_current_session_at(&self, at: DateTime<Utc>) -> Result<FocusSession> {
        let session = {
            let mut state = self.state.lock();
            let current = state.current.as_mut().ok_or(StateError::NoActiveSession)?;
            if current.paused {
                return Err(StateError::SessionAlreadyPaused.into());
            }
            current.pause(at);
            current.clone()
        };
        tracing::debug!(session = %session.id, "focus session paused");
        self.emit(SessionEvent::Paused {
            session: session.clone(),
        });
        Ok(session)
    }

    pub fn resume_current_session(&self) -> Result<FocusSession> {
        self.resume_current_session_at(Utc::now())
    }

    pub fn resume_current_session_at(&self, at: DateTime<Utc>) -> Result<FocusSession> {
        let session = {
            let mut state = self.state.lock();
            let current = state.current.as_mut().ok_or(StateError::NoActiveSession)?;
            if !current.paused {
                return Err(StateError::SessionNotPaused.into());
            }
            current.resume(at);
            current.clone()
        };
        tracing::debug!(
            session = %session.id,
            paused_secs = session.paused_secs,
            "focus session resumed"
        );
        self.emit(SessionEvent::Resumed {
            session: session.clone(),
        });
        Ok(session)
    }

    /// Close the current session without marking it completed.
    pub fn end_current_session(&self) -> Result<FocusSession> {
        self.close_current(Utc::now(), false)
    }

    pub fn end_current_session_at(&self, at: DateTime<Utc>) -> Result<FocusSession> {
        self.close_current(at, false)
    }

    /// Close the current session as completed.
    pub fn complete_current_session(&self) -> Result<FocusSession> {
        self.close_current(Utc::now(), true)
    }

    pub fn complete_current_session_at(&self, at: DateTime<Utc>) -> Result<FocusSession> {
        self.close_current(at, true)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn current_session(&self) -> Option<FocusSession> {
        self.state.lock().current.clone()
    }

    pub fn session_history(&self) -> Vec<FocusSession> {
        self.state.lock().history.clone()
    }

    /// Number of sessions in the consecutive run ending with the last closed one.
    pub fn consecutive_streak(&self) -> u32 {
        self.state.lock().trailing_streak()
    }

    /// Focused seconds across closed sessions.
    pub fn total_focus_secs(&self) -> i64 {
        self.state
            .lock()
            .history
            .iter()
            .map(|s| s.duration_secs())
            .sum()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn is_consecutive(&self, state: &TrackerState, start: DateTime<Utc>) -> bool {
        let Some(end) = state.history.last().and_then(|prev| prev.end_time) else {
            return false;
        };
        let expected = end + self.policy.breaks.break_after(state.trailing_streak());
        let drift = (start - expected).abs();
        drift <= self.policy.tolerance()
    }

    fn close_current(&self, at: DateTime<Utc>, completed: bool) -> Result<FocusSession> {
        let (session, len) = {
            let mut state = self.state.lock();
            let mut session = state.current.take().ok_or(StateError::NoActiveSession)?;
            session.close(at, completed);
            state.history.push(session.clone());
            (session, state.history.len())
        };
        tracing::info!(
            session = %session.id,
            task = %session.task_id,
            completed,
            duration_secs = session.duration_secs(),
            "focus session ended"
        );
        self.emit(SessionEvent::Ended {
            session: session.clone(),
        });
        self.emit(SessionEvent::HistoryChanged { len });
        Ok(session)
    }

    fn emit(&self, event: SessionEvent) {
        self.listeners
            .notify(event.name(), |listener| listener.on_event(&event));
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SessionTracker")
            .field("policy", &self.policy)
            .field("current", &state.current)
            .field("history_len", &state.history.len())
            .finish()
    }
}
