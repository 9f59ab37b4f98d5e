use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::TaskId;

/// One focused stretch of work on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: String,
    pub task_id: TaskId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Accumulated pause time, excluding a pause that is still open.
    pub paused_secs: i64,
    pub completed: bool,
    pub paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub is_consecutive: bool,
}

impl FocusSession {
    pub(crate) fn open(task_id: TaskId, start_time: DateTime<Utc>, is_consecutive: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id,
            start_time,
            end_time: None,
            paused_secs: 0,
            completed: false,
            paused: false,
            paused_at: None,
            is_consecutive,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Focused time: wall-clock span minus pauses.
    ///
    /// Open sessions are measured up to `now`, including any pause in progress.
    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end_time.unwrap_or(now);
        let mut paused = Duration::seconds(self.paused_secs);
        if let (true, Some(since)) = (self.paused, self.paused_at) {
            paused = paused + (end - since);
        }
        (end - self.start_time - paused).max(Duration::zero())
    }

    pub fn duration(&self) -> Duration {
        self.duration_at(Utc::now())
    }

    pub fn duration_secs(&self) -> i64 {
        self.duration().num_seconds()
    }

    pub(crate) fn pause(&mut self, at: DateTime<Utc>) {
        self.paused = true;
        self.paused_at = Some(at);
    }

    pub(crate) fn resume(&mut self, at: DateTime<Utc>) {
        if let Some(since) = self.paused_at.take() {
            self.paused_secs += (at - since).num_seconds().max(0);
        }
        self.paused = false;
    }

    pub(crate) fn close(&mut self, at: DateTime<Utc>, completed: bool) {
        if self.paused {
            self.resume(at);
        }
        self.end_time = Some(at);
        self.completed = completed;
    }
}
