//! Quest completion and reward cascade.
//!
//! The manager observes the task graph. Whenever a task completes, every open
//! quest referencing that task (or one of its ancestors) is re-evaluated. A
//! quest flips to completed under the quest lock before any reward is paid, so
//! each quest pays out at most once no matter how many completions race.

use std::sync::{Arc, Weak};

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;

use super::model::Quest;
use crate::error::{Result, StateError, ValidationError};
use crate::events::{QuestEvent, QuestId, QuestReward, TaskId};
use crate::listener::{ListenerId, Listeners};
use crate::reward::{AchievementRegistry, XpLedger};
use crate::task::{TaskGraph, TaskObserver};

/// Observer of quest completions.
pub trait QuestListener: Send + Sync {
    fn on_event(&self, event: &QuestEvent) {
        match event {
            QuestEvent::Completed { reward } => self.on_quest_completed(reward),
        }
    }

    fn on_quest_completed(&self, _reward: &QuestReward) {}
}

pub struct QuestManager {
    tasks: Arc<TaskGraph>,
    ledger: Arc<XpLedger>,
    achievements: Arc<AchievementRegistry>,
    quests: Mutex<IndexMap<QuestId, Quest>>,
    listeners: Listeners<dyn QuestListener>,
    subscription: Mutex<Option<ListenerId>>,
}

/// Forwards task completions without keeping the manager alive.
struct Subscription(Weak<QuestManager>);

impl TaskObserver for Subscription {
    fn on_task_completed(&self, task_id: &str) {
        if let Some(manager) = self.0.upgrade() {
            manager.on_task_completed(task_id);
        }
    }
}

/// Snapshot of a quest taken at the moment it completed.
struct Completion {
    quest: Quest,
    task_count: usize,
    subtask_count: usize,
}

impl QuestManager {
    /// Create a manager and subscribe it to `tasks`.
    pub fn new(
        tasks: Arc<TaskGraph>,
        ledger: Arc<XpLedger>,
        achievements: Arc<AchievementRegistry>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            tasks,
            ledger,
            achievements,
            quests: Mutex::new(IndexMap::new()),
            listeners: Listeners::new(),
            subscription: Mutex::new(None),
        });
        let id = manager
            .tasks
            .add_observer(Arc::new(Subscription(Arc::downgrade(&manager))));
        *manager.subscription.lock() = Some(id);
        manager
    }

    pub fn tasks(&self) -> &Arc<TaskGraph> {
        &self.tasks
    }

    pub fn ledger(&self) -> &Arc<XpLedger> {
        &self.ledger
    }

    pub fn achievements(&self) -> &Arc<AchievementRegistry> {
        &self.achievements
    }

    pub fn add_listener(&self, listener: Arc<dyn QuestListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a quest. Every referenced task must already exist.
    pub fn add_quest(&self, quest: Quest) -> Result<()> {
        if quest.id.trim().is_empty() {
            return Err(ValidationError::EmptyId { entity: "Quest" }.into());
        }
        for task_id in &quest.task_ids {
            self.ensure_task(task_id)?;
        }
        let mut quests = self.quests.lock();
        if quests.contains_key(&quest.id) {
            return Err(StateError::DuplicateQuest(quest.id).into());
        }
        tracing::debug!(quest = %quest.id, tasks = quest.task_ids.len(), "quest added");
        quests.insert(quest.id.clone(), quest);
        Ok(())
    }

    /// Reference another task from a quest. Returns `false` if already referenced.
    pub fn add_task_to_quest(&self, quest_id: &str, task_id: &str) -> Result<bool> {
        self.ensure_task(task_id)?;
        let mut quests = self.quests.lock();
        let quest = quests
            .get_mut(quest_id)
            .ok_or_else(|| StateError::UnknownQuest(quest_id.to_string()))?;
        Ok(quest.add_task(TaskId::from(task_id)))
    }

    pub fn remove_task_from_quest(&self, quest_id: &str, task_id: &str) -> Result<bool> {
        let mut quests = self.quests.lock();
        let quest = quests
            .get_mut(quest_id)
            .ok_or_else(|| StateError::UnknownQuest(quest_id.to_string()))?;
        Ok(quest.remove_task(task_id))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get_all_quests(&self) -> Vec<Quest> {
        self.quests.lock().values().cloned().collect()
    }

    pub fn get_quest(&self, quest_id: &str) -> Option<Quest> {
        self.quests.lock().get(quest_id).cloned()
    }

    /// Quests that reference `task_id` directly or through one of its ancestors.
    pub fn quests_for_task(&self, task_id: &str) -> Vec<QuestId> {
        let lineage = self.tasks.ancestors(task_id);
        self.quests
            .lock()
            .values()
            .filter(|q| q.task_ids.iter().any(|t| lineage.contains(t)))
            .map(|q| q.id.clone())
            .collect()
    }

    // ── Cascade ──────────────────────────────────────────────────────

    /// Complete the quest if every referenced task is complete.
    ///
    /// Returns the reward only for the call that completed it.
    pub fn recompute_quest(&self, quest_id: &str) -> Result<Option<QuestReward>> {
        let completion = {
            let mut quests = self.quests.lock();
            let quest = quests
                .get_mut(quest_id)
                .ok_or_else(|| StateError::UnknownQuest(quest_id.to_string()))?;
            if quest.completed || quest.task_ids.is_empty() {
                return Ok(None);
            }
            if !quest.task_ids.iter().all(|t| self.tasks.is_completed(t)) {
                return Ok(None);
            }
            quest.completed = true;
            quest.completed_at = Some(Utc::now());
            Completion {
                task_count: quest.task_ids.len(),
                subtask_count: quest
                    .task_ids
                    .iter()
                    .map(|t| self.tasks.subtasks(t).len())
                    .sum(),
                quest: quest.clone(),
            }
        };
        let reward = self.pay_out(completion);
        let event = QuestEvent::Completed {
            reward: reward.clone(),
        };
        self.listeners
            .notify(event.name(), |listener| listener.on_event(&event));
        Ok(Some(reward))
    }

    fn on_task_completed(&self, task_id: &str) {
        for quest_id in self.quests_for_task(task_id) {
            if let Err(err) = self.recompute_quest(&quest_id) {
                tracing::warn!(quest = %quest_id, task = task_id, "quest recompute failed: {err}");
            }
        }
    }

    /// Apply the rewards. Each step is attempted even if the other fails.
    fn pay_out(&self, completion: Completion) -> QuestReward {
        let Completion {
            quest,
            task_count,
            subtask_count,
        } = completion;

        let achievement_unlocked = quest.reward_achievement.as_deref().and_then(|id| {
            match self.achievements.unlock(id) {
                Ok(true) => Some(id.to_string()),
                Ok(false) => None,
                Err(err) => {
                    tracing::warn!(quest = %quest.id, achievement = id, "achievement unlock failed: {err}");
                    None
                }
            }
        });

        let xp = quest.xp_reward(task_count, subtask_count);
        let leveled_up = match i64::try_from(xp) {
            Ok(amount) => self.ledger.add_xp(amount).unwrap_or_else(|err| {
                tracing::warn!(quest = %quest.id, xp, "xp grant failed: {err}");
                false
            }),
            Err(_) => {
                tracing::warn!(quest = %quest.id, xp, "xp grant out of range");
                false
            }
        };

        tracing::info!(
            quest = %quest.id,
            xp,
            task_count,
            subtask_count,
            leveled_up,
            "quest completed"
        );

        QuestReward {
            quest_id: quest.id,
            xp_awarded: xp,
            task_count,
            subtask_count,
            achievement_unlocked,
            leveled_up,
            at: quest.completed_at.unwrap_or_else(Utc::now),
        }
    }

    fn ensure_task(&self, task_id: &str) -> Result<()> {
        if self.tasks.contains(task_id) {
            Ok(())
        } else {
            Err(StateError::UnknownTask(task_id.to_string()).into())
        }
    }
}

impl Drop for QuestManager {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.lock().take() {
            self.tasks.remove_observer(id);
        }
    }
}

impl std::fmt::Debug for QuestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestManager")
            .field("quests", &self.quests.lock().len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
