//! Sleep state machine.
//!
//! Decides, once per 50 ms step, whether the keyboard stays active,
//! powers its peripherals down ("light sleep", the control loop keeps
//! polling) or halts the MCU ("deep sleep", resumed only by the wake
//! interrupt).
//!
//! The machine is pure: it consumes a snapshot of the step inputs and
//! emits at most one [`SleepDecision`] per step. The controller maps
//! decisions onto the platform seams, including the blocking halt.
//!
//! Phase rules:
//! - a request raised in step N is executed in step N+1;
//! - deep-sleep arbitration runs before any light-sleep logic in the
//!   same step;
//! - the charge / USB veto is evaluated only at the step that commits a
//!   deep request, so a condition that changed since the request was
//!   raised is seen one step late;
//! - a vetoed deep request that escalated from a light request degrades
//!   to light sleep in the same step.

use crate::config::{
    DEEP_SLEEP_DELAY_MS, DEEP_SLEEP_FALLBACK_MULT, LINK_TIMEOUT_MS, LINK_TIMEOUT_RF24_MS,
    RF_DISCONNECT_ESCALATE_STEPS, SLEEP_TIME_DELAY_MS, USB_SUSPEND_DEBOUNCE_STEPS,
    WAKE_ACTIVITY_MS,
};
use crate::device::{ChargeState, LinkMode, RfState};
use crate::settings::SleepPolicy;

/// Sleep phase. Exactly one is in effect at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepPhase {
    /// Normal operation.
    Active,
    /// Light sleep requested; entry runs next step.
    LightSleepRequested,
    /// Deep sleep requested; arbitration and entry run next step.
    DeepSleepRequested,
    /// Peripherals are powered down; polling for renewed activity.
    InLightSleep,
    /// The MCU is halted. Only observable while the halt primitive is
    /// on the stack.
    InDeepSleep,
    /// Resumed from a halt; waiting for activity to confirm the wake.
    /// Deep sleep cannot re-trigger from here.
    WakeupPrepare,
}

impl SleepPhase {
    /// Exhaustive transition legality table.
    pub const fn can_transition(from: SleepPhase, to: SleepPhase) -> bool {
        use SleepPhase::*;
        matches!(
            (from, to),
            (Active, LightSleepRequested)
                | (Active, DeepSleepRequested)
                | (LightSleepRequested, InLightSleep)
                | (LightSleepRequested, DeepSleepRequested)
                | (InLightSleep, DeepSleepRequested)
                | (InLightSleep, Active)
                | (DeepSleepRequested, InDeepSleep)
                | (DeepSleepRequested, InLightSleep)
                | (DeepSleepRequested, Active)
                | (InDeepSleep, WakeupPrepare)
                | (WakeupPrepare, Active)
        )
    }
}

/// Snapshot of everything one sleep step reads.
#[derive(Clone, Copy, Debug)]
pub struct SleepInputs {
    pub link_mode: LinkMode,
    pub rf_state: RfState,
    pub charge: ChargeState,
    pub usb_suspended: bool,
    pub policy: SleepPolicy,
    /// Time since last user activity (ms).
    pub no_act_ms: u32,
    /// Time since the current link negotiation began (ms).
    pub rf_linking_ms: u32,
}

/// Action the controller must perform for this step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepDecision {
    None,
    /// Enter light sleep. `powered` is false when the policy is
    /// Disabled: the phase cycles but nothing is powered down.
    EnterLightSleep { cue: bool, powered: bool },
    /// Enter deep sleep: release keys, cue, status sync, halt.
    EnterDeepSleep,
    /// Activity confirmed a wake; run the resume sequence when
    /// `powered`.
    Wake { powered: bool },
}

/// The sleep scheduler.
pub struct SleepStateMachine {
    phase: SleepPhase,
    usb_suspend_debounce: u8,
    rf_disconnect_steps: u32,
    /// Pending deep request escalated from a light request; a veto
    /// degrades to light sleep instead of cancelling outright.
    light_fallback: bool,
    /// Pending deep request was raised while light-sleeping.
    raised_in_light_sleep: bool,
}

impl SleepStateMachine {
    pub const fn new() -> Self {
        Self {
            phase: SleepPhase::Active,
            usb_suspend_debounce: 0,
            rf_disconnect_steps: 0,
            light_fallback: false,
            raised_in_light_sleep: false,
        }
    }

    pub fn phase(&self) -> SleepPhase {
        self.phase
    }

    /// A sleep transition is in flight or the device is sleeping; the
    /// LED engine uses this to suppress flicker.
    pub fn sleep_busy(&self) -> bool {
        self.phase != SleepPhase::Active
    }

    fn set_phase(&mut self, to: SleepPhase) {
        debug_assert!(
            SleepPhase::can_transition(self.phase, to),
            "illegal sleep transition"
        );
        self.phase = to;
    }

    /// The halt primitive returned: the wake interrupt fired.
    pub fn on_deep_wake(&mut self) {
        self.set_phase(SleepPhase::WakeupPrepare);
    }

    /// Run one 50 ms step.
    pub fn step(&mut self, inputs: &SleepInputs) -> SleepDecision {
        use SleepPhase::*;

        // Never stepped while halted; the halt is synchronous.
        if self.phase == InDeepSleep {
            return SleepDecision::None;
        }

        // Deep-sleep handling first, always.
        //
        // Inactivity eligibility is reachable from light sleep so an
        // idle wireless keyboard escalates instead of staying in light
        // sleep forever; the post-halt window (WakeupPrepare) cannot
        // re-request. A raised request commits on the next step.
        if self.phase == DeepSleepRequested {
            if let Some(decision) = self.arbitrate_deep(inputs) {
                return decision;
            }
            // Request cancelled; the step continues from the restored
            // phase so a charging device still reaches light sleep.
        } else if matches!(self.phase, Active | LightSleepRequested | InLightSleep)
            && inputs.policy.deep_allowed()
            && self.deep_eligible(inputs)
        {
            self.light_fallback = self.phase == LightSleepRequested;
            self.raised_in_light_sleep = self.phase == InLightSleep;
            self.set_phase(DeepSleepRequested);
            return SleepDecision::None;
        }

        // Pending light request executes now.
        if self.phase == LightSleepRequested {
            return self.enter_light(inputs);
        }

        // Wake polling while sleeping or in the post-halt window.
        if matches!(self.phase, InLightSleep | WakeupPrepare) {
            if inputs.no_act_ms <= WAKE_ACTIVITY_MS {
                self.set_phase(Active);
                return SleepDecision::Wake {
                    powered: inputs.policy.sleep_allowed(),
                };
            }
            return SleepDecision::None;
        }

        // Request evaluation, Active only.
        self.evaluate_requests(inputs);
        SleepDecision::None
    }

    fn deep_eligible(&self, inputs: &SleepInputs) -> bool {
        (inputs.link_mode == LinkMode::Rf24 && inputs.no_act_ms >= DEEP_SLEEP_DELAY_MS)
            || inputs.no_act_ms >= DEEP_SLEEP_FALLBACK_MULT.saturating_mul(DEEP_SLEEP_DELAY_MS)
    }

    /// Commit or degrade a pending deep request. `None` means the
    /// request was cancelled and the step should continue from the
    /// restored phase.
    fn arbitrate_deep(&mut self, inputs: &SleepInputs) -> Option<SleepDecision> {
        let mut commit = inputs.policy.deep_allowed();

        // Commit-time veto: charging, or an awake USB host.
        if commit
            && (inputs.charge.is_charging()
                || (inputs.link_mode == LinkMode::Usb && !inputs.usb_suspended))
        {
            commit = false;
        }

        if commit {
            self.light_fallback = false;
            self.raised_in_light_sleep = false;
            self.set_phase(SleepPhase::InDeepSleep);
            return Some(SleepDecision::EnterDeepSleep);
        }

        if self.light_fallback {
            self.light_fallback = false;
            self.raised_in_light_sleep = false;
            return Some(self.enter_light(inputs));
        }

        let back = if self.raised_in_light_sleep {
            SleepPhase::InLightSleep
        } else {
            SleepPhase::Active
        };
        self.raised_in_light_sleep = false;
        self.set_phase(back);
        None
    }

    fn enter_light(&mut self, inputs: &SleepInputs) -> SleepDecision {
        self.rf_disconnect_steps = 0;
        self.set_phase(SleepPhase::InLightSleep);
        let powered = inputs.policy.sleep_allowed();
        SleepDecision::EnterLightSleep {
            cue: powered && inputs.policy.entry_cue(),
            powered,
        }
    }

    fn evaluate_requests(&mut self, inputs: &SleepInputs) {
        if inputs.link_mode == LinkMode::Usb {
            // Host-suspend debounce; a single active sample restarts it.
            if inputs.usb_suspended {
                self.usb_suspend_debounce = self.usb_suspend_debounce.saturating_add(1);
                if self.usb_suspend_debounce >= USB_SUSPEND_DEBOUNCE_STEPS {
                    self.set_phase(SleepPhase::LightSleepRequested);
                }
            } else {
                self.usb_suspend_debounce = 0;
            }
            return;
        }

        let link_timeout = if inputs.link_mode == LinkMode::Rf24 {
            LINK_TIMEOUT_RF24_MS
        } else {
            LINK_TIMEOUT_MS
        };

        if inputs.no_act_ms >= SLEEP_TIME_DELAY_MS {
            self.set_phase(SleepPhase::LightSleepRequested);
        } else if inputs.rf_linking_ms >= link_timeout {
            // Negotiation never completed; not worth staying half-awake.
            self.light_fallback = true;
            self.raised_in_light_sleep = false;
            self.set_phase(SleepPhase::DeepSleepRequested);
        } else if inputs.rf_state == RfState::Disconnect {
            self.rf_disconnect_steps = self.rf_disconnect_steps.saturating_add(1);
            if self.rf_disconnect_steps > RF_DISCONNECT_ESCALATE_STEPS {
                self.light_fallback = true;
                self.raised_in_light_sleep = false;
                self.set_phase(SleepPhase::DeepSleepRequested);
            }
        } else if inputs.rf_state == RfState::Connect {
            self.rf_disconnect_steps = 0;
        }
    }
}

impl Default for SleepStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
