//! Link-mode manager: transport selection, dial-switch debouncing and
//! long-press gestures.
//!
//! The physical selector is a 2-bit dial: bit 0 picks USB versus the
//! remembered wireless channel, bit 1 picks the Mac/Win personality. A
//! raw reading must survive 25 consecutive scan samples before it is
//! applied; any flicker restarts the window and releases held keys so a
//! host handoff never leaves a key stuck.
//!
//! Three press-and-hold gestures run on the 100 ms step: committing a
//! temporarily selected channel to a fresh pairing, factory reset, and
//! the RGB hardware test pattern.

use crate::config::{
    BOOT_DIAL_STABLE_SAMPLES, DIAL_DEBOUNCE_SAMPLES, FACTORY_CMD_DELAY_MS, FACTORY_CMD_RETRIES,
    FACTORY_INTER_CMD_DELAY_MS, PAIRING_RETRIES, PAIRING_RETRY_DELAY_MS, PAIR_HOLD_STEPS,
    RESET_HOLD_STEPS, RGB_TEST_HOLD_STEPS,
};
use crate::counters::ActivityCounters;
use crate::device::{DeviceInfo, LinkMode, RfState, SysMode};
use crate::events::{self, EventQueue, VisualEvent};
use crate::platform::{HostTransport, Platform};
use crate::settings::{SettingsCoalescer, UserConfig};
use crate::transport::{RfCommand, RfEvent};

/// One raw 2-bit dial sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DialReading(pub u8);

impl DialReading {
    /// Bit 0 high selects USB; low selects the remembered wireless
    /// channel.
    pub fn wants_usb(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Bit 1 high selects the Mac personality.
    pub fn wants_mac(self) -> bool {
        self.0 & 0x02 != 0
    }
}

/// Owns the active transport selection and the dial debounce state.
pub struct LinkManager {
    saved: Option<DialReading>,
    debounce: u8,
    applied_once: bool,
    /// Latch telling the status-sync path to announce the channel to
    /// the RF module. Set on every switch, consumed externally.
    send_channel: bool,
}

impl LinkManager {
    pub const fn new() -> Self {
        Self {
            saved: None,
            debounce: 0,
            applied_once: false,
            send_channel: false,
        }
    }

    /// Take the announce-channel latch.
    pub fn take_send_channel(&mut self) -> bool {
        core::mem::take(&mut self.send_channel)
    }

    /// Switch the active transport.
    ///
    /// Held keys are flushed first so the old host never sees a stuck
    /// key, the link state resets to idle and the report path is
    /// re-pointed at the right driver.
    pub fn switch_link<P: Platform>(
        &mut self,
        mode: LinkMode,
        device: &mut DeviceInfo,
        counters: &mut ActivityCounters,
        platform: &mut P,
    ) {
        platform.release_all();

        device.link_mode = mode;
        device.rf_state = RfState::Idle;
        counters.reset_linking();
        self.send_channel = true;

        let transport = if mode == LinkMode::Usb {
            HostTransport::Usb
        } else {
            HostTransport::Rf
        };
        platform.select_transport(transport);
    }

    /// One dial scan sample on the 20 ms cadence.
    pub fn scan<P: Platform>(
        &mut self,
        reading: DialReading,
        device: &mut DeviceInfo,
        counters: &mut ActivityCounters,
        events: &mut EventQueue,
        platform: &mut P,
    ) {
        if self.saved != Some(reading) {
            // New raw value: flush keys, restart the window, and treat
            // the change as user activity.
            platform.release_all();
            counters.reset_activity();

            self.saved = Some(reading);
            self.debounce = DIAL_DEBOUNCE_SAMPLES;
            self.applied_once = false;
            return;
        }

        if self.debounce > 0 {
            self.debounce -= 1;
            return;
        }

        self.apply(reading, true, device, counters, events, platform);

        if !self.applied_once {
            self.applied_once = true;
            if device.link_mode.is_wireless() {
                platform.select_transport(HostTransport::Rf);
            }
        }
    }

    /// Synchronous boot-time scan: busy-sample until the reading is
    /// stable, then apply it without LED cues, so the very first dial
    /// read cannot race the periodic scan.
    pub fn boot_scan<P: Platform, F: FnMut() -> DialReading>(
        &mut self,
        mut read: F,
        device: &mut DeviceInfo,
        counters: &mut ActivityCounters,
        events: &mut EventQueue,
        platform: &mut P,
    ) {
        let mut candidate = read();
        let mut stable: u8 = 0;
        while stable < BOOT_DIAL_STABLE_SAMPLES {
            platform.delay_ms(crate::config::BOOT_DIAL_SAMPLE_DELAY_MS);
            let sample = read();
            if sample == candidate {
                stable += 1;
            } else {
                candidate = sample;
                stable = 0;
            }
        }

        self.apply(candidate, false, device, counters, events, platform);
        self.saved = Some(candidate);
    }

    /// Apply a debounced reading: transport selection then personality.
    fn apply<P: Platform>(
        &mut self,
        reading: DialReading,
        led_cue: bool,
        device: &mut DeviceInfo,
        counters: &mut ActivityCounters,
        events: &mut EventQueue,
        platform: &mut P,
    ) {
        if reading.wants_usb() {
            if device.link_mode != LinkMode::Usb {
                self.switch_link(LinkMode::Usb, device, counters, platform);
            }
        } else if device.link_mode != device.rf_channel {
            self.switch_link(device.rf_channel, device, counters, platform);
        }

        let os = if reading.wants_mac() {
            SysMode::Mac
        } else {
            SysMode::Win
        };
        if device.sys_sw_state != os {
            device.sys_sw_state = os;
            platform.set_os_layout(os);
            platform.release_all();
            if led_cue {
                events::push(events, VisualEvent::OsChanged(os));
            }
        }
    }
}

impl Default for LinkManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Press-and-hold gesture tracker, stepped on the 100 ms cadence.
///
/// Each gesture's hold counter resets to zero whenever its press flag
/// is down, so releasing one step before the threshold does nothing.
pub struct LongPressGestures {
    channel_target: Option<LinkMode>,
    channel_hold_steps: u16,
    reset_pressed: bool,
    reset_hold_steps: u16,
    rgb_test_pressed: bool,
    rgb_test_hold_steps: u16,
}

impl LongPressGestures {
    pub const fn new() -> Self {
        Self {
            channel_target: None,
            channel_hold_steps: 0,
            reset_pressed: false,
            reset_hold_steps: 0,
            rgb_test_pressed: false,
            rgb_test_hold_steps: 0,
        }
    }

    /// A channel-select key went down while on a wireless transport.
    pub fn channel_key_down<P: Platform>(&mut self, target: LinkMode, platform: &mut P) {
        self.channel_target = Some(target);
        self.channel_hold_steps = 0;
        platform.release_all();
    }

    /// The channel-select key came back up. A release before the hold
    /// threshold is a plain channel switch (no new pairing).
    pub fn channel_key_up<P: Platform>(
        &mut self,
        link: &mut LinkManager,
        device: &mut DeviceInfo,
        counters: &mut ActivityCounters,
        platform: &mut P,
    ) {
        let target = match self.channel_target.take() {
            Some(t) => t,
            None => return,
        };

        if self.channel_hold_steps < PAIR_HOLD_STEPS {
            device.rf_channel = target;
            if target.is_bluetooth() {
                device.ble_channel = target;
            }
            link.switch_link(target, device, counters, platform);
            let _ = platform.send_cmd(RfCommand::SetLink, 10, 20);
        }
        self.channel_hold_steps = 0;
    }

    /// Factory-reset key state.
    pub fn set_reset_pressed(&mut self, pressed: bool) {
        self.reset_pressed = pressed;
    }

    /// RGB-test key state.
    pub fn set_rgb_test_pressed(&mut self, pressed: bool) {
        self.rgb_test_pressed = pressed;
    }

    /// One 100 ms gesture step.
    #[allow(clippy::too_many_arguments)]
    pub fn step<P: Platform>(
        &mut self,
        link: &mut LinkManager,
        device: &mut DeviceInfo,
        counters: &mut ActivityCounters,
        config: &mut UserConfig,
        coalescer: &mut SettingsCoalescer,
        events: &mut EventQueue,
        platform: &mut P,
    ) {
        // Commit a temporarily selected channel to a fresh pairing.
        if let Some(target) = self.channel_target {
            self.channel_hold_steps = self.channel_hold_steps.saturating_add(1);
            if self.channel_hold_steps >= PAIR_HOLD_STEPS {
                self.channel_target = None;
                self.channel_hold_steps = 0;
                self.commit_pairing(target, link, device, counters, platform);
            }
        } else {
            self.channel_hold_steps = 0;
        }

        // Restore factory settings.
        if self.reset_pressed {
            self.reset_hold_steps = self.reset_hold_steps.saturating_add(1);
            if self.reset_hold_steps >= RESET_HOLD_STEPS {
                self.reset_pressed = false;
                self.reset_hold_steps = 0;
                factory_reset(device, config, coalescer, events, platform);
            }
        } else {
            self.reset_hold_steps = 0;
        }

        // Enter the RGB hardware test pattern.
        if self.rgb_test_pressed {
            self.rgb_test_hold_steps = self.rgb_test_hold_steps.saturating_add(1);
            if self.rgb_test_hold_steps >= RGB_TEST_HOLD_STEPS {
                self.rgb_test_pressed = false;
                self.rgb_test_hold_steps = 0;
                events::push(events, VisualEvent::RgbTest);
            }
        } else {
            self.rgb_test_hold_steps = 0;
        }
    }

    /// Long press past threshold: adopt the channel and advertise a new
    /// pairing until the module acknowledges or the budget runs out. An
    /// unacknowledged pairing is silently abandoned; the channel switch
    /// stays in effect and the module keeps its previous bond.
    fn commit_pairing<P: Platform>(
        &mut self,
        target: LinkMode,
        link: &mut LinkManager,
        device: &mut DeviceInfo,
        counters: &mut ActivityCounters,
        platform: &mut P,
    ) {
        device.rf_channel = target;
        if target.is_bluetooth() {
            device.ble_channel = target;
        }
        link.switch_link(target, device, counters, platform);

        for _ in 0..PAIRING_RETRIES {
            if platform.send_cmd(RfCommand::PairingInit, 0, 1).is_err() {
                continue;
            }
            platform.delay_ms(PAIRING_RETRY_DELAY_MS);
            if poll_for_pairing_ack(device, platform) {
                device.rf_state = RfState::Pairing;
                break;
            }
        }
    }
}

impl Default for LongPressGestures {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain transport events looking for a pairing acknowledgement,
/// applying any status pushes on the way.
fn poll_for_pairing_ack<P: Platform>(device: &mut DeviceInfo, platform: &mut P) -> bool {
    while let Some(event) = platform.poll_event() {
        match event {
            RfEvent::PairingAck => return true,
            RfEvent::Status(status) => {
                device.rf_state = status.rf_state;
                device.rf_charge = status.charge;
                device.rf_battery = status.battery;
            }
        }
    }
    false
}

/// Restore factory settings: forget bonded hosts, reset the persisted
/// configuration immediately (bypassing the coalescer) and re-derive the
/// OS personality defaults.
pub fn factory_reset<P: Platform>(
    device: &mut DeviceInfo,
    config: &mut UserConfig,
    coalescer: &mut SettingsCoalescer,
    events: &mut EventQueue,
    platform: &mut P,
) {
    // Wireless channels fall back to BT1 unless parked on the dongle.
    if device.link_mode != LinkMode::Usb {
        if device.link_mode != LinkMode::Rf24 {
            device.link_mode = LinkMode::Bt1;
            device.ble_channel = LinkMode::Bt1;
            device.rf_channel = LinkMode::Bt1;
        }
    } else {
        device.ble_channel = LinkMode::Bt1;
        device.rf_channel = LinkMode::Bt1;
    }

    let _ = platform.send_cmd(RfCommand::SetLink, FACTORY_CMD_RETRIES, FACTORY_CMD_DELAY_MS);
    platform.delay_ms(FACTORY_INTER_CMD_DELAY_MS);
    let _ = platform.send_cmd(
        RfCommand::FactoryClear,
        FACTORY_CMD_RETRIES,
        FACTORY_CMD_DELAY_MS,
    );

    *config = UserConfig::new();
    coalescer.cancel();
    let _ = platform.write_settings(config);

    platform.set_os_layout(device.sys_sw_state);
    events::push(events, VisualEvent::FactoryReset);
}
