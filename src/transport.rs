//! Command seam to the external RF module.
//!
//! The radio (2.4 GHz + Bluetooth) lives in a separate module reached
//! over UART. This crate only issues commands and consumes status
//! pushes; the wire framing is owned by the transport implementation.
//!
//! Implementations handle the low-level protocol details; retry logic is
//! part of the `send_cmd` contract so that call sites stay declarative
//! about their retry budget.

use crate::device::{ChargeState, RfState};
use crate::error::Error;

/// Commands issued to the RF module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RfCommand {
    /// Device is about to sleep; module may drop to its own low-power
    /// advertising schedule.
    SleepNotify,
    /// Apply the current link mode/channel selection.
    SetLink,
    /// Start advertising for a brand-new pairing on the current channel.
    PairingInit,
    /// Forget all bonded hosts (factory reset).
    FactoryClear,
    /// Push full device status to the module before a halt.
    StatusSync,
    /// Wake handshake after resuming from a halt.
    WakeHandshake,
}

/// Status pushed by the RF module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RfStatus {
    pub rf_state: RfState,
    pub charge: ChargeState,
    pub battery: u8,
}

/// Events surfaced by polling the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RfEvent {
    /// Periodic status push.
    Status(RfStatus),
    /// The module acknowledged a [`RfCommand::PairingInit`].
    PairingAck,
}

/// Result type for transport operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Trait for the RF module command interface.
///
/// # Notes
///
/// - `send_cmd` may block for up to `retries * delay_ms` while waiting
///   for the module to take the command.
/// - `poll_event` must be non-blocking; it drains at most one pending
///   event per call.
pub trait RfTransport {
    /// Send a command, retrying up to `retries` times with `delay_ms`
    /// between attempts.
    fn send_cmd(&mut self, cmd: RfCommand, retries: u8, delay_ms: u32) -> Result<()>;

    /// Fetch the next pending event from the module, if any.
    fn poll_event(&mut self) -> Option<RfEvent>;
}
