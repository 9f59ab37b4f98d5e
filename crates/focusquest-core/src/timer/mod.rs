mod cycle;
mod engine;
mod listener;

pub use cycle::{BreakPolicy, Cycle, TimerKind};
pub use engine::{TimerEngine, TimerState};
pub use listener::TimerListener;
