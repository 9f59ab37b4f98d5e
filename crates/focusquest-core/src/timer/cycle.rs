use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerKind {
    pub fn is_break(&self) -> bool {
        matches!(self, TimerKind::ShortBreak | TimerKind::LongBreak)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimerKind::Work => "Work",
            TimerKind::ShortBreak => "Short Break",
            TimerKind::LongBreak => "Long Break",
        }
    }
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Break lengths and the long-break cadence.
///
/// Every `long_break_interval`-th work session of a streak is followed by a long
/// break; all others by a short one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakPolicy {
    pub short_break_secs: u64,
    pub long_break_secs: u64,
    pub long_break_interval: u32,
}

impl BreakPolicy {
    pub fn new(short_break_secs: u64, long_break_secs: u64, long_break_interval: u32) -> Result<Self> {
        let policy = Self {
            short_break_secs,
            long_break_secs,
            long_break_interval,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_break_secs == 0 {
            return Err(non_positive("short_break"));
        }
        if self.long_break_secs == 0 {
            return Err(non_positive("long_break"));
        }
        if self.long_break_interval == 0 {
            return Err(non_positive("long_break_interval"));
        }
        Ok(())
    }

    /// Which break follows a streak of `completed_work` work sessions.
    pub fn break_kind_after(&self, completed_work: u32) -> TimerKind {
        if completed_work > 0 && completed_work % self.long_break_interval == 0 {
            TimerKind::LongBreak
        } else {
            TimerKind::ShortBreak
        }
    }

    pub fn break_after(&self, completed_work: u32) -> Duration {
        let secs = match self.break_kind_after(completed_work) {
            TimerKind::LongBreak => self.long_break_secs,
            _ => self.short_break_secs,
        };
        Duration::seconds(secs as i64)
    }
}

impl Default for BreakPolicy {
    fn default() -> Self {
        Self {
            short_break_secs: 5 * 60,
            long_break_secs: 15 * 60,
            long_break_interval: 4,
        }
    }
}

fn non_positive(field: &str) -> crate::error::CoreError {
    ValidationError::NonPositiveDuration {
        field: field.to_string(),
    }
    .into()
}

/// Walks the work/break rotation: Work, break, Work, break, ...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    policy: BreakPolicy,
    work_secs: u64,
    current: TimerKind,
    completed_work: u32,
}

impl Cycle {
    pub fn new(work_secs: u64, policy: BreakPolicy) -> Result<Self> {
        if work_secs == 0 {
            return Err(non_positive("work"));
        }
        policy.validate()?;
        Ok(Self {
            policy,
            work_secs,
            current: TimerKind::Work,
            completed_work: 0,
        })
    }

    pub fn current(&self) -> TimerKind {
        self.current
    }

    pub fn completed_work(&self) -> u32 {
        self.completed_work
    }

    pub fn duration_secs(&self, kind: TimerKind) -> u64 {
        match kind {
            TimerKind::Work => self.work_secs,
            TimerKind::ShortBreak => self.policy.short_break_secs,
            TimerKind::LongBreak => self.policy.long_break_secs,
        }
    }

    pub fn current_duration_secs(&self) -> u64 {
        self.duration_secs(self.current)
    }

    /// Move to the next phase and return it.
    pub fn advance(&mut self) -> TimerKind {
        self.current = match self.current {
            TimerKind::Work => {
                self.completed_work = self.completed_work.saturating_add(1);
                self.policy.break_kind_after(self.completed_work)
            }
            TimerKind::ShortBreak | TimerKind::LongBreak => TimerKind::Work,
        };
        self.current
    }

    /// Back to the first work phase with an empty streak.
    pub fn restart(&mut self) {
        self.current = TimerKind::Work;
        self.completed_work = 0;
    }
}
