//! HID keyboard report types shared with the report path.
//!
//! The matrix scan and report assembly are owned by the input layer;
//! this module only defines the wire layouts and the all-released
//! reports the control core flushes before a transport or mode change.
//!
//! Boot layout (8 bytes):
//! ```text
//! Byte 0: Modifier keys (bitfield)
//! Byte 1: Reserved (0x00)
//! Byte 2-7: Up to 6 simultaneous key codes
//! ```
//!
//! NKRO layout (1 + 30 bytes): modifier bitfield followed by one bit
//! per key code 0..239.

/// Boot keyboard report size in bytes.
pub const BOOT_REPORT_SIZE: usize = 8;

/// NKRO report size in bytes.
pub const NKRO_REPORT_SIZE: usize = 31;

/// Standard USB HID boot-protocol keyboard report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Reserved byte (always 0x00 per HID spec).
    pub reserved: u8,
    /// Up to 6 simultaneously pressed key codes.
    pub keycodes: [u8; 6],
}

impl BootReport {
    /// All keys released.
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [0; 6],
        }
    }

    /// Serialise into a byte slice for transmission.
    /// Returns the number of bytes written, 0 if the buffer is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < BOOT_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.modifier;
        buf[1] = self.reserved;
        buf[2..8].copy_from_slice(&self.keycodes);
        BOOT_REPORT_SIZE
    }

    /// Returns `true` if no keys are pressed.
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }
}

/// N-key rollover report: one bit per key code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NkroReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Key bitmap, bit N = key code N pressed.
    pub bitmap: [u8; 30],
}

impl NkroReport {
    /// All keys released.
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            bitmap: [0; 30],
        }
    }

    /// Serialise into a byte slice for transmission.
    /// Returns the number of bytes written, 0 if the buffer is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < NKRO_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.modifier;
        buf[1..NKRO_REPORT_SIZE].copy_from_slice(&self.bitmap);
        NKRO_REPORT_SIZE
    }

    /// Returns `true` if no keys are pressed.
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.bitmap.iter().all(|&b| b == 0)
    }
}
