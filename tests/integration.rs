//! End-to-end scenarios for the sleeplink control loop.
//!
//! Drives a full `Controller` through wall-clock time against a
//! recording platform mock, the way the embedded loop drives it on
//! target.

use std::collections::VecDeque;

use sleeplink::config::{
    DEEP_SLEEP_DELAY_MS, SETTINGS_COALESCE_MS, SLEEP_TIME_DELAY_MS,
};
use sleeplink::controller::{Controller, SideControl};
use sleeplink::device::{ChargeState, LinkMode, RfState, SysMode};
use sleeplink::error::Error;
use sleeplink::link::DialReading;
use sleeplink::platform::{HidHost, HostTransport, PowerSequencer, SettingsStore, SleepCue};
use sleeplink::settings::UserConfig;
use sleeplink::sleep::SleepPhase;
use sleeplink::transport::{RfCommand, RfEvent, RfStatus, RfTransport};

/// Dial parked on USB + Windows.
const DIAL_USB: DialReading = DialReading(0x01);
/// Dial parked on the wireless channel + Windows.
const DIAL_WIRELESS: DialReading = DialReading(0x00);

#[derive(Default)]
struct Rig {
    enter_light: usize,
    exit_light: usize,
    enter_deep: usize,
    exit_deep: usize,
    cues: Vec<SleepCue>,
    cmds: Vec<RfCommand>,
    releases: usize,
    transports: Vec<HostTransport>,
    os_layouts: Vec<SysMode>,
    wakeup_hosts: usize,
    restarts: usize,
    settings_writes: usize,
    lighting_writes: usize,
    stored: Option<UserConfig>,
    pending: VecDeque<RfEvent>,
    /// Status the RF module repeats on every poll when set.
    repeat_status: Option<RfStatus>,
}

impl PowerSequencer for Rig {
    fn enter_light_sleep(&mut self) {
        self.enter_light += 1;
    }
    fn exit_light_sleep(&mut self) {
        self.exit_light += 1;
    }
    fn enter_deep_sleep(&mut self) {
        self.enter_deep += 1;
    }
    fn exit_deep_sleep(&mut self) {
        self.exit_deep += 1;
    }
    fn signal_sleep(&mut self, cue: SleepCue) {
        self.cues.push(cue);
    }
    fn delay_ms(&mut self, _ms: u32) {}
}

impl HidHost for Rig {
    fn release_all(&mut self) {
        self.releases += 1;
    }
    fn select_transport(&mut self, transport: HostTransport) {
        self.transports.push(transport);
    }
    fn set_os_layout(&mut self, os: SysMode) {
        self.os_layouts.push(os);
    }
    fn wakeup_host(&mut self) {
        self.wakeup_hosts += 1;
    }
    fn restart_driver(&mut self) {
        self.restarts += 1;
    }
}

impl RfTransport for Rig {
    fn send_cmd(&mut self, cmd: RfCommand, _retries: u8, _delay_ms: u32) -> Result<(), Error> {
        self.cmds.push(cmd);
        Ok(())
    }
    fn poll_event(&mut self) -> Option<RfEvent> {
        self.pending.pop_front()
    }
}

impl SettingsStore for Rig {
    fn read_settings(&mut self) -> Option<UserConfig> {
        self.stored.clone()
    }
    fn write_settings(&mut self, config: &UserConfig) -> Result<(), Error> {
        self.settings_writes += 1;
        self.stored = Some(config.clone());
        Ok(())
    }
    fn write_lighting(&mut self) -> Result<(), Error> {
        self.lighting_writes += 1;
        Ok(())
    }
}

/// Drive the loop in 10 ms polls for `duration_ms`, feeding a constant
/// dial reading and USB bus state. Returns the advanced clock.
fn run(
    controller: &mut Controller,
    rig: &mut Rig,
    mut now_ms: u64,
    duration_ms: u64,
    dial: DialReading,
    usb_suspended: bool,
) -> u64 {
    let end = now_ms + duration_ms;
    while now_ms < end {
        now_ms += 10;
        if let Some(status) = rig.repeat_status {
            rig.pending.push_back(RfEvent::Status(status));
        }
        controller.poll(now_ms, dial, usb_suspended, rig);
    }
    now_ms
}

/// Boot a controller and settle the dial debounce on the given reading.
fn booted(dial: DialReading, rig: &mut Rig) -> (Controller, u64) {
    let mut controller = Controller::init(rig);
    let now = run(&mut controller, rig, 0, 1_000, dial, false);
    // Settling is over; drop boot-time noise from the records.
    rig.releases = 0;
    rig.transports.clear();
    (controller, now)
}

fn connected() -> RfStatus {
    RfStatus {
        rf_state: RfState::Connect,
        charge: ChargeState(0),
        battery: 80,
    }
}

#[test]
fn usb_suspend_debounce_reaches_light_sleep_in_about_a_second() {
    let mut rig = Rig::default();
    let (mut controller, now) = booted(DIAL_USB, &mut rig);
    assert_eq!(controller.link_mode(), LinkMode::Usb);

    // 0.95 s of suspended bus: still short of the 20-step debounce.
    let now = run(&mut controller, &mut rig, now, 950, DIAL_USB, true);
    assert_eq!(rig.enter_light, 0);

    // Within a couple more steps the request raises and entry runs.
    run(&mut controller, &mut rig, now, 150, DIAL_USB, true);
    assert_eq!(rig.enter_light, 1);
    assert_eq!(controller.sleep_phase(), SleepPhase::InLightSleep);
    assert!(controller.sleep_busy());
    // USB link: the RF module is not told anything.
    assert!(!rig.cmds.contains(&RfCommand::SleepNotify));
}

#[test]
fn usb_suspend_flicker_restarts_the_debounce() {
    let mut rig = Rig::default();
    let (mut controller, now) = booted(DIAL_USB, &mut rig);

    let now = run(&mut controller, &mut rig, now, 900, DIAL_USB, true);
    // One active sample resets the count to zero.
    let now = run(&mut controller, &mut rig, now, 50, DIAL_USB, false);
    let now = run(&mut controller, &mut rig, now, 900, DIAL_USB, true);
    assert_eq!(rig.enter_light, 0);
    run(&mut controller, &mut rig, now, 200, DIAL_USB, true);
    assert_eq!(rig.enter_light, 1);
}

#[test]
fn usb_wake_signals_host_and_restarts_driver() {
    let mut rig = Rig::default();
    let (mut controller, now) = booted(DIAL_USB, &mut rig);
    let now = run(&mut controller, &mut rig, now, 1_200, DIAL_USB, true);
    assert_eq!(rig.enter_light, 1);

    // Host resumed and the user hit a key.
    controller.key_activity();
    run(&mut controller, &mut rig, now, 100, DIAL_USB, false);
    assert_eq!(rig.exit_light, 1);
    assert_eq!(rig.wakeup_hosts, 1);
    assert_eq!(rig.restarts, 1);
    assert_eq!(controller.rf_state(), RfState::Wake);
    assert_eq!(controller.sleep_phase(), SleepPhase::Active);
}

#[test]
fn dial_switch_to_wireless_selects_the_rf_driver() {
    let mut rig = Rig::default();
    let (mut controller, now) = booted(DIAL_USB, &mut rig);

    run(&mut controller, &mut rig, now, 1_000, DIAL_WIRELESS, false);
    assert_eq!(controller.link_mode(), LinkMode::Rf24);
    assert!(rig.transports.contains(&HostTransport::Rf));
    assert!(controller.take_send_channel());
    // The dial change counted as activity.
    assert!(controller.counters().no_act_ms < SLEEP_TIME_DELAY_MS);
}

#[test]
fn rf24_idle_passes_through_light_into_deep_sleep_and_wakes_cleanly() {
    let mut rig = Rig::default();
    rig.repeat_status = Some(connected());
    let (mut controller, now) = booted(DIAL_WIRELESS, &mut rig);
    assert_eq!(controller.link_mode(), LinkMode::Rf24);

    // Light sleep after two idle minutes.
    let now = run(
        &mut controller,
        &mut rig,
        now,
        SLEEP_TIME_DELAY_MS as u64 + 200,
        DIAL_WIRELESS,
        false,
    );
    assert_eq!(rig.enter_light, 1);
    assert!(rig.cmds.contains(&RfCommand::SleepNotify));
    assert_eq!(controller.sleep_phase(), SleepPhase::InLightSleep);

    // Deep sleep once inactivity reaches the six-minute threshold.
    let now = run(
        &mut controller,
        &mut rig,
        now,
        (DEEP_SLEEP_DELAY_MS - SLEEP_TIME_DELAY_MS) as u64 + 200,
        DIAL_WIRELESS,
        false,
    );
    assert_eq!(rig.enter_deep, 1);
    assert_eq!(rig.exit_deep, 1); // halt returned via the wake interrupt
    assert_eq!(rig.cues, [SleepCue::Deep]);
    assert!(rig.cmds.contains(&RfCommand::StatusSync));
    assert!(rig.cmds.contains(&RfCommand::WakeHandshake));
    assert!(rig.releases >= 1);

    // The resume zeroed the inactivity counter and the wake completed.
    run(&mut controller, &mut rig, now, 100, DIAL_WIRELESS, false);
    assert_eq!(controller.sleep_phase(), SleepPhase::Active);
    assert!(controller.counters().no_act_ms < 5_000);
    assert_eq!(rig.enter_deep, 1); // no immediate re-trigger
}

#[test]
fn charging_keeps_the_keyboard_out_of_deep_sleep() {
    let mut rig = Rig::default();
    rig.repeat_status = Some(RfStatus {
        rf_state: RfState::Connect,
        charge: ChargeState(0x01),
        battery: 55,
    });
    let (mut controller, now) = booted(DIAL_WIRELESS, &mut rig);

    // Idle far past every deep threshold.
    run(
        &mut controller,
        &mut rig,
        now,
        2 * DEEP_SLEEP_DELAY_MS as u64,
        DIAL_WIRELESS,
        false,
    );
    assert_eq!(rig.enter_deep, 0);
    // Light sleep still happened.
    assert_eq!(rig.enter_light, 1);
}

#[test]
fn coalescer_writes_once_per_window_under_a_mutation_storm() {
    let mut rig = Rig::default();
    let (mut controller, now) = booted(DIAL_USB, &mut rig);
    rig.settings_writes = 0;

    // 100 brightness increments within one second.
    for i in 0..100 {
        controller.side_control(SideControl::BrightnessUp, now + i * 10);
    }
    let now = run(&mut controller, &mut rig, now, 1_000, DIAL_USB, false);
    assert_eq!(rig.settings_writes, 0); // still inside the quiet period

    run(
        &mut controller,
        &mut rig,
        now,
        SETTINGS_COALESCE_MS,
        DIAL_USB,
        false,
    );
    assert_eq!(rig.settings_writes, 1);
    assert_eq!(rig.lighting_writes, 0); // untouched block stays unwritten
}

#[test]
fn settings_roundtrip_through_the_store() {
    let mut rig = Rig::default();
    let (mut controller, now) = booted(DIAL_USB, &mut rig);
    rig.settings_writes = 0;

    controller.side_control(SideControl::NextColor, now);
    controller.side_control(SideControl::SpeedUp, now);
    run(
        &mut controller,
        &mut rig,
        now,
        SETTINGS_COALESCE_MS + 1_000,
        DIAL_USB,
        false,
    );
    assert_eq!(rig.settings_writes, 1);

    // A rebooted controller reads back exactly what was flushed.
    let rebooted = Controller::init(&mut rig);
    assert_eq!(rebooted.config(), controller.config());
}

#[test]
fn factory_reset_needs_the_full_hold() {
    let mut rig = Rig::default();
    let (mut controller, now) = booted(DIAL_WIRELESS, &mut rig);
    rig.settings_writes = 0;

    // Held for just under the 3 s threshold, then released.
    controller.set_reset_pressed(true);
    let now = run(&mut controller, &mut rig, now, 2_800, DIAL_WIRELESS, false);
    controller.set_reset_pressed(false);
    let now = run(&mut controller, &mut rig, now, 500, DIAL_WIRELESS, false);
    assert!(!rig.cmds.contains(&RfCommand::FactoryClear));
    assert_eq!(rig.settings_writes, 0);

    // A full hold commits: clear command, an immediate write, and the
    // OS personality defaults re-derived.
    controller.set_reset_pressed(true);
    run(&mut controller, &mut rig, now, 3_200, DIAL_WIRELESS, false);
    assert!(rig.cmds.contains(&RfCommand::FactoryClear));
    assert_eq!(rig.settings_writes, 1);
    assert_eq!(rig.os_layouts, [SysMode::Win]);
    assert_eq!(controller.config(), &UserConfig::new());
}

#[test]
fn corrupt_settings_record_resets_to_defaults() {
    let mut rig = Rig::default();
    // A stored record is only reachable through deserialize, so model
    // corruption as an absent read.
    rig.stored = None;
    let controller = Controller::init(&mut rig);
    assert_eq!(controller.config(), &UserConfig::new());
    assert_eq!(rig.settings_writes, 1); // defaults written back
}
