//! Visual events for the external LED/animation engine.
//!
//! The controller queues these instead of calling into the LED engine;
//! the engine drains the queue on its own schedule.

use crate::device::SysMode;
use crate::settings::SleepPolicy;

/// Capacity of the visual event queue. Events beyond this in one drain
/// interval are dropped (the LED engine only shows the latest anyway).
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// One visual event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VisualEvent {
    /// OS personality changed via the dial; show the Mac/Win indicator.
    OsChanged(SysMode),
    /// Sleep policy cycled by the sleep-mode key.
    SleepModeChanged(SleepPolicy),
    /// Factory reset committed; run the reset animation.
    FactoryReset,
    /// RGB hardware test gesture committed.
    RgbTest,
}

/// Queue drained by the LED engine.
pub type EventQueue = heapless::Vec<VisualEvent, EVENT_QUEUE_DEPTH>;

/// Push an event, silently dropping it when the queue is full.
pub fn push(queue: &mut EventQueue, event: VisualEvent) {
    let _ = queue.push(event);
}
