//! Quests and the completion cascade that pays out rewards.

mod manager;
mod model;

pub use manager::{QuestListener, QuestManager};
pub use model::{Quest, XP_PER_SUBTASK, XP_PER_TASK};
