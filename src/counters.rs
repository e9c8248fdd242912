//! Polled tick source and saturating activity counters.
//!
//! A millisecond monotonic clock is sampled from the control loop; no
//! counter runs from interrupt context. `TickSource` turns the sampled
//! time into the cadences the rest of the crate steps on, and
//! `ActivityCounters` accumulates elapsed time since the last user
//! activity and since link negotiation began.

use crate::config::{COUNTER_TICK_MS, DIAL_SCAN_MS, LONG_PRESS_STEP_MS, SLEEP_STEP_MS};

/// Which cadences fired for one `TickSource::poll` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cadences {
    /// 10 ms counter tick, with the elapsed time it covers.
    pub counter_elapsed_ms: u32,
    /// 20 ms dial scan step.
    pub dial: bool,
    /// 50 ms sleep machine step.
    pub sleep: bool,
    /// 100 ms long-press gesture step.
    pub long_press: bool,
}

/// Derives the fixed cadences from a polled monotonic clock.
///
/// Each cadence keeps its own last-processed stamp; a poll that arrives
/// late fires the cadence once and carries the full elapsed time. There
/// are no catch-up bursts.
pub struct TickSource {
    last_counter_ms: u64,
    last_dial_ms: u64,
    last_sleep_ms: u64,
    last_long_press_ms: u64,
    primed: bool,
}

impl TickSource {
    pub const fn new() -> Self {
        Self {
            last_counter_ms: 0,
            last_dial_ms: 0,
            last_sleep_ms: 0,
            last_long_press_ms: 0,
            primed: false,
        }
    }

    /// Sample the clock and report which cadences are due.
    pub fn poll(&mut self, now_ms: u64) -> Cadences {
        if !self.primed {
            self.primed = true;
            self.last_counter_ms = now_ms;
            self.last_dial_ms = now_ms;
            self.last_sleep_ms = now_ms;
            self.last_long_press_ms = now_ms;
            return Cadences::default();
        }

        let mut out = Cadences::default();

        let counter_elapsed = now_ms.saturating_sub(self.last_counter_ms);
        if counter_elapsed >= COUNTER_TICK_MS {
            self.last_counter_ms = now_ms;
            out.counter_elapsed_ms = counter_elapsed.min(u32::MAX as u64) as u32;
        }
        if now_ms.saturating_sub(self.last_dial_ms) >= DIAL_SCAN_MS {
            self.last_dial_ms = now_ms;
            out.dial = true;
        }
        if now_ms.saturating_sub(self.last_sleep_ms) >= SLEEP_STEP_MS {
            self.last_sleep_ms = now_ms;
            out.sleep = true;
        }
        if now_ms.saturating_sub(self.last_long_press_ms) >= LONG_PRESS_STEP_MS {
            self.last_long_press_ms = now_ms;
            out.long_press = true;
        }

        out
    }
}

impl Default for TickSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed-time counters driven by the 10 ms cadence.
///
/// All counters saturate at their maximum instead of wrapping. Only an
/// accepted key event or a dial-state change resets the activity pair;
/// there is no other reset path.
#[derive(Clone, Debug, Default)]
pub struct ActivityCounters {
    /// Time since the last user activity (ms).
    pub no_act_ms: u32,
    /// Time since the current link negotiation began (ms).
    pub rf_linking_ms: u32,
    /// Time since the per-key RGB matrix last changed (ms); consumed by
    /// the external LED engine's power-down logic.
    pub rgb_led_last_act_ms: u32,
    /// Time since the side strip last changed (ms); consumed externally.
    pub side_led_last_act_ms: u32,
}

impl ActivityCounters {
    pub const fn new() -> Self {
        Self {
            no_act_ms: 0,
            rf_linking_ms: 0,
            rgb_led_last_act_ms: 0,
            side_led_last_act_ms: 0,
        }
    }

    /// Advance all counters by the elapsed time of one counter tick.
    pub fn tick(&mut self, elapsed_ms: u32) {
        self.no_act_ms = self.no_act_ms.saturating_add(elapsed_ms);
        self.rf_linking_ms = self.rf_linking_ms.saturating_add(elapsed_ms);
        self.rgb_led_last_act_ms = self.rgb_led_last_act_ms.saturating_add(elapsed_ms);
        self.side_led_last_act_ms = self.side_led_last_act_ms.saturating_add(elapsed_ms);
    }

    /// Key event or dial change: both activity counters restart.
    pub fn reset_activity(&mut self) {
        self.no_act_ms = 0;
        self.rf_linking_ms = 0;
    }

    /// A link negotiation finished or a new one is starting.
    pub fn reset_linking(&mut self) {
        self.rf_linking_ms = 0;
    }

    /// The LED engine repainted the per-key matrix.
    pub fn touch_rgb_led(&mut self) {
        self.rgb_led_last_act_ms = 0;
    }

    /// The LED engine repainted the side strip.
    pub fn touch_side_led(&mut self) {
        self.side_led_last_act_ms = 0;
    }
}
