//! Unified error type for sleeplink.
//!
//! This is a fail-safe system: errors at the platform seams are reported
//! to the caller, which degrades to a safe default instead of propagating
//! further. No variant carries heap data.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // RF transport
    /// The RF module never acknowledged a command within its retry budget.
    NotAcknowledged,

    /// UART framing / transfer to the RF module failed.
    Transport,

    // Storage
    /// Flash read/write/erase failed.
    Storage,

    // USB
    /// USB stack returned an error.
    Usb,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,

    /// Operation timed out.
    Timeout,
}
