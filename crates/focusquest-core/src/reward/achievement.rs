use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError, ValidationError};
use crate::events::AchievementId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Achievement {
    pub fn new(id: impl Into<AchievementId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            unlocked: false,
            unlocked_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Registered achievements in registration order. Unlocking is one-way.
#[derive(Debug, Default)]
pub struct AchievementRegistry {
    achievements: RwLock<IndexMap<AchievementId, Achievement>>,
}

impl AchievementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an achievement. Re-registering an id keeps its unlock state.
    pub fn register(&self, achievement: Achievement) -> Result<()> {
        if achievement.id.trim().is_empty() {
            return Err(ValidationError::EmptyId {
                entity: "Achievement",
            }
            .into());
        }
        let mut achievements = self.achievements.write();
        match achievements.get_mut(&achievement.id) {
            Some(existing) => {
                existing.title = achievement.title;
                existing.description = achievement.description;
            }
            None => {
                achievements.insert(achievement.id.clone(), achievement);
            }
        }
        Ok(())
    }

    /// Unlock `id`. Returns `true` only on the locked -> unlocked transition.
    pub fn unlock(&self, id: &str) -> Result<bool> {
        let mut achievements = self.achievements.write();
        let achievement = achievements
            .get_mut(id)
            .ok_or_else(|| StateError::UnknownAchievement(id.to_string()))?;
        if achievement.unlocked {
            return Ok(false);
        }
        achievement.unlocked = true;
        achievement.unlocked_at = Some(Utc::now());
        tracing::info!(achievement = id, title = %achievement.title, "achievement unlocked");
        Ok(true)
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.achievements
            .read()
            .get(id)
            .map(|a| a.unlocked)
            .unwrap_or(false)
    }

    pub fn get(&self, id: &str) -> Option<Achievement> {
        self.achievements.read().get(id).cloned()
    }

    pub fn get_unlocked(&self) -> Vec<Achievement> {
        self.filtered(true)
    }

    pub fn get_locked(&self) -> Vec<Achievement> {
        self.filtered(false)
    }

    pub fn len(&self) -> usize {
        self.achievements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered(&self, unlocked: bool) -> Vec<Achievement> {
        self.achievements
            .read()
            .values()
            .filter(|a| a.unlocked == unlocked)
            .cloned()
            .collect()
    }
}
