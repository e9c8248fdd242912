//! Contracts to the platform layer: power sequencing, the HID report
//! path and the settings store.
//!
//! The control core never touches registers. Everything with a hardware
//! side effect goes through these traits; the embedded binary implements
//! them against the nRF52840 and the host tests implement them with a
//! recording mock.

use crate::device::SysMode;
use crate::error::Error;
use crate::settings::UserConfig;
use crate::transport::RfTransport;

/// Colour of the sleep-entry acknowledgement on the side LEDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepCue {
    /// Light sleep (blue).
    Light,
    /// Deep sleep (green).
    Deep,
}

/// Host transport the report path should target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostTransport {
    Usb,
    Rf,
}

/// Power-rail and halt primitives owned by the firmware platform layer.
///
/// `enter_deep_sleep` is the single intentionally blocking operation in
/// the system: it suspends the control loop until the wake interrupt
/// fires, with no timeout. Everything else returns promptly.
pub trait PowerSequencer {
    /// Power down LEDs and idle the transport for light sleep.
    fn enter_light_sleep(&mut self);

    /// Restore LED power after light sleep.
    fn exit_light_sleep(&mut self);

    /// Halt the MCU. Returns only after a wake interrupt.
    fn enter_deep_sleep(&mut self);

    /// Re-init clocks and IO after the halt returns.
    fn exit_deep_sleep(&mut self);

    /// Hold the sleep-entry acknowledgement on the side LEDs.
    fn signal_sleep(&mut self, cue: SleepCue);

    /// Busy-wait used by power-sequencing command gaps.
    fn delay_ms(&mut self, ms: u32);
}

/// Seam to the input/report layer.
pub trait HidHost {
    /// Release every held key on both the NKRO and boot report paths.
    /// Called before any transport or mode change so no key stays stuck
    /// across a host handoff.
    fn release_all(&mut self);

    /// Route reports to USB or to the RF module.
    fn select_transport(&mut self, transport: HostTransport);

    /// Apply the OS personality: default layer and extended-report mode.
    fn set_os_layout(&mut self, os: SysMode);

    /// Signal remote wakeup to a suspended USB host.
    fn wakeup_host(&mut self);

    /// Restart the USB driver after a wake.
    fn restart_driver(&mut self);
}

/// Block-granular persistence for the two settings blocks.
pub trait SettingsStore {
    /// Read the general settings block. `None` when absent or corrupt.
    fn read_settings(&mut self) -> Option<UserConfig>;

    /// Write the general settings block.
    fn write_settings(&mut self, config: &UserConfig) -> Result<(), Error>;

    /// Ask the lighting engine to persist its own block.
    fn write_lighting(&mut self) -> Result<(), Error>;
}

/// Everything the control core needs from the outside world, as one
/// object. Blanket-implemented so a board support struct (or the test
/// mock) only implements the four seams.
pub trait Platform: PowerSequencer + HidHost + RfTransport + SettingsStore {}

impl<T: PowerSequencer + HidHost + RfTransport + SettingsStore> Platform for T {}
