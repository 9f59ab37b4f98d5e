//! XP ledger and achievement registry.

mod achievement;
mod xp;

pub use achievement::{Achievement, AchievementRegistry};
pub use xp::{xp_threshold, XpCurve, XpLedger, XpProgress};
