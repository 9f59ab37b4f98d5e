use crate::events::{TimerEvent, TimerSignal};

/// Observer of timer lifecycle events.
///
/// Implement only the hooks you care about; the rest default to no-ops.
/// `Tick` and `Completed` arrive on the ticking task, everything else on the
/// thread that issued the command.
pub trait TimerListener: Send + Sync {
    /// Entry point used by the engine. Dispatches to the per-signal hooks.
    fn on_event(&self, event: &TimerEvent) {
        match event.signal {
            TimerSignal::Started { .. } => self.on_started(event),
            TimerSignal::Paused { .. } => self.on_paused(event),
            TimerSignal::Resumed { .. } => self.on_resumed(event),
            TimerSignal::Tick { remaining_secs } => self.on_tick(remaining_secs, event),
            TimerSignal::Completed => self.on_completed(event),
            TimerSignal::Stopped { .. } => self.on_stopped(event),
            TimerSignal::Reset => self.on_reset(event),
        }
    }

    fn on_started(&self, _event: &TimerEvent) {}
    fn on_paused(&self, _event: &TimerEvent) {}
    fn on_resumed(&self, _event: &TimerEvent) {}
    fn on_tick(&self, _remaining_secs: u64, _event: &TimerEvent) {}
    fn on_completed(&self, _event: &TimerEvent) {}
    fn on_stopped(&self, _event: &TimerEvent) {}
    fn on_reset(&self, _event: &TimerEvent) {}
}
