//! The control-loop context object.
//!
//! Owns every piece of session state (device record, user settings,
//! counters, dial, gestures, sleep machine, visual event queue) and
//! steps the components in a fixed order from one poll entry point:
//! counters first, then transport status, gestures, dial resolution,
//! the settings coalescer and finally the sleep machine. The order is a
//! correctness invariant: a dial change resets the counters the sleep
//! step reads in the same pass.

use crate::config::{
    SIDE_BRIGHTNESS_MAX, SIDE_COLOR_COUNT, SIDE_MODE_COUNT, SIDE_SPEED_MAX,
};
use crate::counters::{ActivityCounters, TickSource};
use crate::device::{ChargeState, DeviceInfo, LinkMode, RfState, SysMode};
use crate::events::{self, EventQueue, VisualEvent};
use crate::link::{DialReading, LinkManager, LongPressGestures};
use crate::platform::{Platform, SleepCue};
use crate::settings::{SettingsCoalescer, UserConfig};
use crate::sleep::{SleepDecision, SleepInputs, SleepPhase, SleepStateMachine};
use crate::transport::{RfCommand, RfEvent};

/// Side-light adjustments arriving from the input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SideControl {
    BrightnessUp,
    BrightnessDown,
    SpeedUp,
    SpeedDown,
    NextMode,
    NextColor,
}

/// Top-level control state; one instance per device.
pub struct Controller {
    device: DeviceInfo,
    config: UserConfig,
    counters: ActivityCounters,
    ticks: TickSource,
    coalescer: SettingsCoalescer,
    link: LinkManager,
    gestures: LongPressGestures,
    sleep: SleepStateMachine,
    events: EventQueue,
}

impl Controller {
    /// Build with explicit settings (tests, or a caller that already
    /// loaded them).
    pub fn new(config: UserConfig) -> Self {
        Self {
            device: DeviceInfo::new(),
            config,
            counters: ActivityCounters::new(),
            ticks: TickSource::new(),
            coalescer: SettingsCoalescer::new(),
            link: LinkManager::new(),
            gestures: LongPressGestures::new(),
            sleep: SleepStateMachine::new(),
            events: EventQueue::new(),
        }
    }

    /// Build from the settings store. An absent or corrupt record is
    /// first boot: defaults are applied and written back, silently.
    pub fn init<P: Platform>(platform: &mut P) -> Self {
        let config = match platform.read_settings() {
            Some(config) => config,
            None => {
                let defaults = UserConfig::new();
                let _ = platform.write_settings(&defaults);
                defaults
            }
        };
        Self::new(config)
    }

    /// Synchronous boot-time dial scan; run once before the first poll.
    pub fn boot_scan<P: Platform, F: FnMut() -> DialReading>(
        &mut self,
        read: F,
        platform: &mut P,
    ) {
        self.link.boot_scan(
            read,
            &mut self.device,
            &mut self.counters,
            &mut self.events,
            platform,
        );
    }

    /// One pass of the control loop.
    ///
    /// `now_ms` is the polled monotonic clock, `dial` the current raw
    /// selector reading and `usb_suspended` the USB stack's bus state.
    pub fn poll<P: Platform>(
        &mut self,
        now_ms: u64,
        dial: DialReading,
        usb_suspended: bool,
        platform: &mut P,
    ) {
        let cadences = self.ticks.poll(now_ms);

        if cadences.counter_elapsed_ms > 0 {
            self.counters.tick(cadences.counter_elapsed_ms);
        }

        self.drain_transport(platform);

        if cadences.long_press {
            self.gestures.step(
                &mut self.link,
                &mut self.device,
                &mut self.counters,
                &mut self.config,
                &mut self.coalescer,
                &mut self.events,
                platform,
            );
        }

        if cadences.dial {
            self.link.scan(
                dial,
                &mut self.device,
                &mut self.counters,
                &mut self.events,
                platform,
            );
        }

        let flush = self.coalescer.poll(now_ms);
        if flush.settings {
            let _ = platform.write_settings(&self.config);
        }
        if flush.lighting {
            let _ = platform.write_lighting();
        }

        if cadences.sleep {
            self.sleep_step(usb_suspended, platform);
        }
    }

    /// Apply pending status pushes from the RF module.
    fn drain_transport<P: Platform>(&mut self, platform: &mut P) {
        while let Some(event) = platform.poll_event() {
            match event {
                RfEvent::Status(status) => {
                    if status.rf_state == RfState::Connect {
                        // Negotiation is over while the link holds.
                        self.counters.reset_linking();
                    }
                    self.device.rf_state = status.rf_state;
                    self.device.rf_charge = status.charge;
                    self.device.rf_battery = status.battery;
                }
                RfEvent::PairingAck => {}
            }
        }
    }

    fn sleep_step<P: Platform>(&mut self, usb_suspended: bool, platform: &mut P) {
        let inputs = SleepInputs {
            link_mode: self.device.link_mode,
            rf_state: self.device.rf_state,
            charge: self.device.rf_charge,
            usb_suspended,
            policy: self.config.sleep,
            no_act_ms: self.counters.no_act_ms,
            rf_linking_ms: self.counters.rf_linking_ms,
        };

        match self.sleep.step(&inputs) {
            SleepDecision::None => {}
            SleepDecision::EnterLightSleep { cue, powered } => {
                self.counters.reset_linking();
                if powered {
                    if cue {
                        platform.signal_sleep(SleepCue::Light);
                    }
                    if self.device.link_mode.is_wireless() {
                        let _ = platform.send_cmd(RfCommand::SleepNotify, 5, 5);
                    }
                    platform.enter_light_sleep();
                }
            }
            SleepDecision::EnterDeepSleep => {
                platform.release_all();
                platform.signal_sleep(SleepCue::Deep);
                let _ = platform.send_cmd(RfCommand::StatusSync, 5, 5);
                let _ = platform.send_cmd(RfCommand::SleepNotify, 5, 5);

                // Halts here until the wake interrupt fires.
                platform.enter_deep_sleep();
                platform.exit_deep_sleep();

                let _ = platform.send_cmd(RfCommand::WakeHandshake, 0, 1);
                self.device.rf_state = RfState::Wake;
                // Otherwise the very next step would re-enter sleep.
                self.counters.reset_activity();
                self.sleep.on_deep_wake();
            }
            SleepDecision::Wake { powered } => {
                if powered {
                    platform.exit_light_sleep();
                    let _ = platform.send_cmd(RfCommand::WakeHandshake, 0, 1);
                    if self.device.link_mode == LinkMode::Usb {
                        platform.wakeup_host();
                        platform.restart_driver();
                    }
                    self.device.rf_state = RfState::Wake;
                }
            }
        }
    }

    // Input-layer surface

    /// An accepted key event. The sole activity-reset path besides a
    /// dial change.
    pub fn key_activity(&mut self) {
        self.counters.reset_activity();
    }

    /// A channel-select key went down (wireless transports only).
    pub fn channel_key_down<P: Platform>(&mut self, target: LinkMode, platform: &mut P) {
        if self.device.link_mode == LinkMode::Usb || !target.is_wireless() {
            return;
        }
        self.gestures.channel_key_down(target, platform);
    }

    /// The channel-select key came back up.
    pub fn channel_key_up<P: Platform>(&mut self, platform: &mut P) {
        self.gestures.channel_key_up(
            &mut self.link,
            &mut self.device,
            &mut self.counters,
            platform,
        );
    }

    /// Factory-reset key state.
    pub fn set_reset_pressed(&mut self, pressed: bool) {
        self.gestures.set_reset_pressed(pressed);
    }

    /// RGB-test key state.
    pub fn set_rgb_test_pressed(&mut self, pressed: bool) {
        self.gestures.set_rgb_test_pressed(pressed);
    }

    /// Sleep-mode key: cycle the policy and schedule a settings flush.
    pub fn cycle_sleep_policy(&mut self, now_ms: u64) {
        self.config.sleep = self.config.sleep.cycle();
        self.coalescer.mark_settings_dirty(now_ms);
        events::push(&mut self.events, VisualEvent::SleepModeChanged(self.config.sleep));
    }

    /// Side-light adjustment key.
    pub fn side_control(&mut self, control: SideControl, now_ms: u64) {
        let c = &mut self.config;
        match control {
            SideControl::BrightnessUp => {
                c.side_brightness = (c.side_brightness + 1).min(SIDE_BRIGHTNESS_MAX)
            }
            SideControl::BrightnessDown => c.side_brightness = c.side_brightness.saturating_sub(1),
            SideControl::SpeedUp => c.side_speed = (c.side_speed + 1).min(SIDE_SPEED_MAX),
            SideControl::SpeedDown => c.side_speed = c.side_speed.saturating_sub(1),
            SideControl::NextMode => c.side_mode = (c.side_mode + 1) % SIDE_MODE_COUNT,
            SideControl::NextColor => c.side_color = (c.side_color + 1) % SIDE_COLOR_COUNT,
        }
        self.coalescer.mark_settings_dirty(now_ms);
    }

    /// The lighting engine changed its own persisted block.
    pub fn lighting_changed(&mut self, now_ms: u64) {
        self.coalescer.mark_lighting_dirty(now_ms);
    }

    // LED-engine surface

    pub fn link_mode(&self) -> LinkMode {
        self.device.link_mode
    }

    pub fn rf_state(&self) -> RfState {
        self.device.rf_state
    }

    pub fn battery(&self) -> u8 {
        self.device.rf_battery
    }

    pub fn charge(&self) -> ChargeState {
        self.device.rf_charge
    }

    pub fn os_mode(&self) -> SysMode {
        self.device.sys_sw_state
    }

    /// A sleep transition is in flight; the LED engine suppresses
    /// flicker while this holds.
    pub fn sleep_busy(&self) -> bool {
        self.sleep.sleep_busy()
    }

    pub fn sleep_phase(&self) -> SleepPhase {
        self.sleep.phase()
    }

    /// Drain queued visual events.
    pub fn take_events(&mut self) -> EventQueue {
        core::mem::take(&mut self.events)
    }

    /// Announce-channel latch for the status-sync path.
    pub fn take_send_channel(&mut self) -> bool {
        self.link.take_send_channel()
    }

    /// Counters shared with the LED engine's power-down logic.
    pub fn counters(&self) -> &ActivityCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut ActivityCounters {
        &mut self.counters
    }

    /// Current persisted settings (LED engine reads the side-light
    /// fields).
    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }
}
