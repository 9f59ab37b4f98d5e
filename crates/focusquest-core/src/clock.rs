//! Per-timer ticking task.
//!
//! A [`Ticker`] owns at most one periodic task spawned on a tokio runtime. The
//! task fires its callback once per period until the callback asks it to stop
//! or the ticker is disarmed. Disarming aborts the task; a tick that is already
//! executing is not interrupted, so owners must validate ticks themselves (the
//! timer engine does this with an arming epoch).

use std::ops::ControlFlow;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One tick per second.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct Ticker {
    runtime: Handle,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    pub fn new(runtime: Handle) -> Self {
        Self::with_period(runtime, TICK_INTERVAL)
    }

    pub fn with_period(runtime: Handle, period: Duration) -> Self {
        Self {
            runtime,
            period,
            task: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking. The first tick fires one full period from now.
    ///
    /// Any previously armed task is aborted first.
    pub fn arm<F>(&self, mut on_tick: F)
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let period = self.period;
        let handle = self.runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        });
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop ticking. Returns `true` if a task was armed.
    pub fn disarm(&self) -> bool {
        match self.task.lock().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("period", &self.period)
            .field("armed", &self.is_armed())
            .finish()
    }
}
