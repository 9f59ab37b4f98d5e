mod model;
mod tracker;

pub use model::FocusSession;
pub use tracker::{SessionListener, SessionPolicy, SessionTracker};
