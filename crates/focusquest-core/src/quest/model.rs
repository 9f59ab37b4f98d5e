use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{AchievementId, QuestId, TaskId};

pub const XP_PER_TASK: u64 = 10;
pub const XP_PER_SUBTASK: u64 = 2;

/// A set of tasks that pays out XP, and optionally an achievement, once all of
/// them are complete. Tasks are referenced by id; the task graph owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub title: String,
    pub task_ids: Vec<TaskId>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub reward_achievement: Option<AchievementId>,
    pub base_xp_reward: u64,
}

impl Quest {
    pub fn new(id: impl Into<QuestId>, title: impl Into<String>, base_xp_reward: u64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            task_ids: Vec::new(),
            completed: false,
            completed_at: None,
            reward_achievement: None,
            base_xp_reward,
        }
    }

    pub fn with_reward_achievement(mut self, achievement: impl Into<AchievementId>) -> Self {
        self.reward_achievement = Some(achievement.into());
        self
    }

    pub fn with_tasks<I, T>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        for task in tasks {
            self.add_task(task);
        }
        self
    }

    /// Returns `false` if the task was already referenced.
    pub fn add_task(&mut self, task_id: impl Into<TaskId>) -> bool {
        let task_id = task_id.into();
        if self.task_ids.contains(&task_id) {
            return false;
        }
        self.task_ids.push(task_id);
        true
    }

    pub fn remove_task(&mut self, task_id: &str) -> bool {
        let before = self.task_ids.len();
        self.task_ids.retain(|id| id != task_id);
        self.task_ids.len() != before
    }

    pub fn task_count(&self) -> usize {
        self.task_ids.len()
    }

    /// Payout for the given task and subtask counts.
    pub fn xp_reward(&self, task_count: usize, subtask_count: usize) -> u64 {
        self.base_xp_reward
            .saturating_add(XP_PER_TASK.saturating_mul(task_count as u64))
            .saturating_add(XP_PER_SUBTASK.saturating_mul(subtask_count as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_tasks() {
        let mut quest = Quest::new("q1", "Ship it", 50);
        assert!(quest.add_task("t1"));
        assert!(!quest.add_task("t1"));
        assert!(quest.add_task("t2"));
        assert_eq!(quest.task_count(), 2);
        assert!(quest.remove_task("t1"));
        assert!(!quest.remove_task("t1"));
        assert_eq!(quest.task_ids, vec!["t2"]);
    }

    #[test]
    fn xp_reward_formula() {
        let quest = Quest::new("q1", "Ship it", 50);
        assert_eq!(quest.xp_reward(2, 0), 70);
        assert_eq!(quest.xp_reward(3, 4), 50 + 30 + 8);
    }
}
