//! Timer engine implementation.
//!
//! The engine is a countdown state machine driven from two sides: commands
//! (`start`, `pause`, `resume`, `stop`, `reset`) from the caller, and one tick per
//! second from a background [`Ticker`] task.
//!
//! ## State Transitions
//!
//! ```text
//! Inactive -> Running <-> Paused
//! Running | Paused -> Stopped
//! Running -> Completed            (clock reaches zero)
//! any -> Inactive                 (reset)
//! ```
//!
//! ## Synchronization
//!
//! Every transition and every emission happens under a per-engine reentrant
//! gate. Ticks carry the epoch of the arming that produced them and are
//! dropped if the epoch is stale or the engine is no longer running, so once
//! `pause`, `stop` or `reset` returns no further `Tick` or `Completed` of that
//! run is delivered, and a run ends with exactly one terminal event. The
//! reentrant gate lets listeners call back into the engine from a callback.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = TimerEngine::new(TimerKind::Work, 25 * 60, Handle::current())?
//!     .with_task("write-report");
//! engine.add_listener(Arc::new(MyRepainter));
//! engine.start();
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use super::cycle::{Cycle, TimerKind};
use super::listener::TimerListener;
use crate::clock::Ticker;
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{TaskId, TimerEvent, TimerSignal, TimerSnapshot};
use crate::listener::{ListenerId, Listeners};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Inactive,
    Running,
    Paused,
    Completed,
    Stopped,
}

/// Core timer engine. Cloning yields another handle to the same timer.
#[derive(Clone)]
pub struct TimerEngine {
    shared: Arc<Shared>,
}

struct Shared {
    kind: TimerKind,
    total_secs: u64,
    gate: ReentrantMutex<()>,
    core: Mutex<Core>,
    ticker: Ticker,
    listeners: Listeners<dyn TimerListener>,
}

struct Core {
    state: TimerState,
    remaining_secs: u64,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    /// Elapsed time frozen at the terminal transition.
    elapsed: Duration,
    task_id: Option<TaskId>,
    /// Bumped every time the ticker is armed.
    epoch: u64,
}

impl TimerEngine {
    /// Create an inactive timer of `total_secs` whose clock runs on `runtime`.
    pub fn new(kind: TimerKind, total_secs: u64, runtime: Handle) -> Result<Self> {
        if total_secs == 0 {
            return Err(ValidationError::NonPositiveDuration {
                field: kind.label().to_string(),
            }
            .into());
        }
        Ok(Self {
            shared: Arc::new(Shared {
                kind,
                total_secs,
                gate: ReentrantMutex::new(()),
                core: Mutex::new(Core {
                    state: TimerState::Inactive,
                    remaining_secs: total_secs,
                    started_at: None,
                    paused_at: None,
                    elapsed: Duration::zero(),
                    task_id: None,
                    epoch: 0,
                }),
                ticker: Ticker::new(runtime),
                listeners: Listeners::new(),
            }),
        })
    }

    /// Like [`TimerEngine::new`], using the runtime of the calling context.
    pub fn on_current_runtime(kind: TimerKind, total_secs: u64) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| CoreError::NoRuntime)?;
        Self::new(kind, total_secs, runtime)
    }

    /// Timer for the cycle's current phase.
    pub fn for_cycle(cycle: &Cycle, runtime: Handle) -> Result<Self> {
        Self::new(cycle.current(), cycle.current_duration_secs(), runtime)
    }

    pub fn with_task(self, task_id: impl Into<TaskId>) -> Self {
        self.bind_task(Some(task_id.into()));
        self
    }

    /// Bind (or unbind) the task reported in subsequent events.
    pub fn bind_task(&self, task_id: Option<TaskId>) {
        self.shared.core.lock().task_id = task_id;
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn kind(&self) -> TimerKind {
        self.shared.kind
    }

    pub fn total_secs(&self) -> u64 {
        self.shared.total_secs
    }

    pub fn bound_task(&self) -> Option<TaskId> {
        self.shared.core.lock().task_id.clone()
    }

    pub fn state(&self) -> TimerState {
        self.shared.core.lock().state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.shared.core.lock().remaining_secs
    }

    pub fn elapsed_secs(&self) -> u64 {
        let core = self.shared.core.lock();
        core.elapsed_at(Utc::now()).num_seconds().max(0) as u64
    }

    /// 0.0 .. 1.0 progress through the countdown.
    pub fn progress(&self) -> f64 {
        let remaining = self.remaining_secs();
        1.0 - (remaining as f64 / self.shared.total_secs as f64)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let now = Utc::now();
        let core = self.shared.core.lock();
        TimerSnapshot {
            kind: self.shared.kind,
            state: core.state,
            task_id: core.task_id.clone(),
            total_secs: self.shared.total_secs,
            remaining_secs: core.remaining_secs,
            elapsed_secs: core.elapsed_at(now).num_seconds().max(0) as u64,
            progress: 1.0 - (core.remaining_secs as f64 / self.shared.total_secs as f64),
            at: now,
        }
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn TimerListener>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    // ── Commands ─────────────────────────────────────────────────────
    //
    // Each command returns whether it changed state. Calls from a state that
    // does not allow them are ignored.

    pub fn start(&self) -> bool {
        let _gate = self.shared.gate.lock();
        let event = {
            let mut core = self.shared.core.lock();
            let state = core.state;
            match state {
                TimerState::Inactive => {
                    let now = Utc::now();
                    core.state = TimerState::Running;
                    core.started_at = Some(now);
                    core.paused_at = None;
                    core.elapsed = Duration::zero();
                    core.epoch += 1;
                    Shared::arm(&self.shared, core.epoch);
                    self.shared.event(
                        &core,
                        TimerSignal::Started {
                            total_secs: self.shared.total_secs,
                        },
                        now,
                    )
                }
                TimerState::Paused => {
                    drop(core);
                    return self.resume();
                }
                TimerState::Running | TimerState::Completed | TimerState::Stopped => {
                    return false
                }
            }
        };
        self.shared.emit(&event);
        true
    }

    pub fn pause(&self) -> bool {
        let _gate = self.shared.gate.lock();
        let event = {
            let mut core = self.shared.core.lock();
            if core.state != TimerState::Running {
                return false;
            }
            let now = Utc::now();
            core.state = TimerState::Paused;
            core.paused_at = Some(now);
            self.shared.event(
                &core,
                TimerSignal::Paused {
                    remaining_secs: core.remaining_secs,
                },
                now,
            )
        };
        self.shared.ticker.disarm();
        self.shared.emit(&event);
        true
    }

    pub fn resume(&self) -> bool {
        let _gate = self.shared.gate.lock();
        let event = {
            let mut core = self.shared.core.lock();
            if core.state != TimerState::Paused {
                return false;
            }
            let now = Utc::now();
            if let (Some(started), Some(paused)) = (core.started_at, core.paused_at) {
                core.started_at = Some(started + (now - paused));
            }
            core.paused_at = None;
            core.state = TimerState::Running;
            core.epoch += 1;
            Shared::arm(&self.shared, core.epoch);
            self.shared.event(
                &core,
                TimerSignal::Resumed {
                    remaining_secs: core.remaining_secs,
                },
                now,
            )
        };
        self.shared.emit(&event);
        true
    }

    pub fn stop(&self) -> bool {
        let _gate = self.shared.gate.lock();
        let event = {
            let mut core = self.shared.core.lock();
            if !matches!(core.state, TimerState::Running | TimerState::Paused) {
                return false;
            }
            let now = Utc::now();
            core.elapsed = core.elapsed_at(now);
            core.state = TimerState::Stopped;
            self.shared.event(
                &core,
                TimerSignal::Stopped {
                    remaining_secs: core.remaining_secs,
                },
                now,
            )
        };
        self.shared.ticker.disarm();
        self.shared.emit(&event);
        true
    }

    /// Back to `Inactive` with the full duration, from any state.
    pub fn reset(&self) -> bool {
        let _gate = self.shared.gate.lock();
        self.stop();
        let event = {
            let mut core = self.shared.core.lock();
            core.state = TimerState::Inactive;
            core.epoch += 1;
            core.remaining_secs = self.shared.total_secs;
            core.started_at = None;
            core.paused_at = None;
            core.elapsed = Duration::zero();
            self.shared.event(&core, TimerSignal::Reset, Utc::now())
        };
        self.shared.emit(&event);
        true
    }
}

impl Shared {
    fn arm(shared: &Arc<Shared>, epoch: u64) {
        let weak = Arc::downgrade(shared);
        shared.ticker.arm(move || match weak.upgrade() {
            Some(shared) => shared.on_tick(epoch),
            None => ControlFlow::Break(()),
        });
    }

    fn on_tick(&self, epoch: u64) -> ControlFlow<()> {
        let _gate = self.gate.lock();
        let (events, flow) = {
            let mut core = self.core.lock();
            if core.epoch != epoch || core.state != TimerState::Running {
                return ControlFlow::Break(());
            }
            let now = Utc::now();
            core.remaining_secs = core.remaining_secs.saturating_sub(1);
            let mut events = vec![self.event(
                &core,
                TimerSignal::Tick {
                    remaining_secs: core.remaining_secs,
                },
                now,
            )];
            if core.remaining_secs == 0 {
                core.elapsed = core.elapsed_at(now);
                core.state = TimerState::Completed;
                events.push(self.event(&core, TimerSignal::Completed, now));
                (events, ControlFlow::Break(()))
            } else {
                (events, ControlFlow::Continue(()))
            }
        };
        if flow.is_break() {
            self.ticker.disarm();
        }
        for (i, event) in events.iter().enumerate() {
            // A listener may have reset the run while an earlier event was delivered.
            if i > 0 && self.core.lock().epoch != epoch {
                break;
            }
            self.emit(event);
        }
        flow
    }

    fn event(&self, core: &Core, signal: TimerSignal, at: DateTime<Utc>) -> TimerEvent {
        TimerEvent {
            kind: self.kind,
            task_id: core.task_id.clone(),
            at,
            signal,
        }
    }

    fn emit(&self, event: &TimerEvent) {
        tracing::debug!(
            kind = %event.kind,
            task = event.task_id.as_deref().unwrap_or("-"),
            signal = ?event.signal,
            "timer event"
        );
        self.listeners
            .notify(event.signal.name(), |listener| listener.on_event(event));
    }
}

impl Core {
    fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        match (self.state, self.started_at) {
            (TimerState::Inactive, _) => Duration::zero(),
            (TimerState::Paused, Some(started)) => {
                self.paused_at.map(|p| p - started).unwrap_or_else(Duration::zero)
            }
            (TimerState::Running, Some(started)) => now - started,
            (TimerState::Paused | TimerState::Running, None) => Duration::zero(),
            (TimerState::Completed | TimerState::Stopped, _) => self.elapsed,
        }
    }
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("TimerEngine")
            .field("kind", &self.shared.kind)
            .field("total_secs", &self.shared.total_secs)
            .field("state", &core.state)
            .field("remaining_secs", &core.remaining_secs)
            .field("task_id", &core.task_id)
            .finish()
    }
}
