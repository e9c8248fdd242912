//! Persisted user settings and the write-coalescing policy.
//!
//! Settings are stored as a fixed-layout record guarded by a validity
//! marker byte. A record with the wrong marker is treated as absent:
//! defaults are applied and rewritten, and no error is surfaced (the
//! first-boot path and the corruption path are the same path).
//!
//! Writes never happen at mutation time. Each mutation marks its block
//! dirty and arms a shared quiet-period timer; the flush runs once the
//! timer has been armed for `SETTINGS_COALESCE_MS`, one write per dirty
//! block, bounding flash wear under held-down adjustment keys.

use crate::config::{SETTINGS_COALESCE_MS, SETTINGS_VALID_MARKER};

/// Serialized size of a [`UserConfig`] record.
pub const USER_CONFIG_SIZE: usize = 7;

/// Sleep policy level, cycled by the sleep-mode key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepPolicy {
    /// Never power anything down; sleep phases still cycle so the USB
    /// suspend handshake keeps working, but they are inert.
    Disabled,
    /// Light and deep sleep, no visual cue on entry.
    Enabled,
    /// Light sleep only, with a visual cue on entry; deep sleep is
    /// suppressed.
    LightOnly,
}

impl SleepPolicy {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Disabled),
            1 => Some(Self::Enabled),
            2 => Some(Self::LightOnly),
            _ => None,
        }
    }

    fn to_raw(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
            Self::LightOnly => 2,
        }
    }

    /// Whether any power-down action may run at all.
    pub fn sleep_allowed(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether the MCU may be halted.
    pub fn deep_allowed(self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Whether light-sleep entry shows the side-LED cue.
    pub fn entry_cue(self) -> bool {
        matches!(self, Self::LightOnly)
    }

    /// Sleep-mode key: Enabled -> LightOnly -> Disabled -> Enabled.
    pub fn cycle(self) -> Self {
        match self {
            Self::Enabled => Self::LightOnly,
            Self::LightOnly => Self::Disabled,
            Self::Disabled => Self::Enabled,
        }
    }
}

/// User-adjustable settings persisted across power cycles.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UserConfig {
    /// Sleep policy level.
    pub sleep: SleepPolicy,
    /// Side-light animation mode index.
    pub side_mode: u8,
    /// Side-light brightness level (0 = off).
    pub side_brightness: u8,
    /// Side-light animation speed level.
    pub side_speed: u8,
    /// Side-light RGB enable.
    pub side_rgb: bool,
    /// Side-light base colour index.
    pub side_color: u8,
}

impl UserConfig {
    /// First-boot defaults.
    pub const fn new() -> Self {
        Self {
            sleep: SleepPolicy::Enabled,
            side_mode: 0,
            side_brightness: 1,
            side_speed: 2,
            side_rgb: true,
            side_color: 0,
        }
    }

    /// Serialise into a byte slice for flash storage.
    /// Returns the number of bytes written, 0 if the buffer is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < USER_CONFIG_SIZE {
            return 0;
        }
        buf[0] = SETTINGS_VALID_MARKER;
        buf[1] = self.sleep.to_raw();
        buf[2] = self.side_mode;
        buf[3] = self.side_brightness;
        buf[4] = self.side_speed;
        buf[5] = self.side_rgb as u8;
        buf[6] = self.side_color;
        USER_CONFIG_SIZE
    }

    /// Parse a persisted record. `None` means "absent or corrupt"; the
    /// caller falls back to [`UserConfig::new`] and rewrites.
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < USER_CONFIG_SIZE || data[0] != SETTINGS_VALID_MARKER {
            return None;
        }
        Some(Self {
            sleep: SleepPolicy::from_raw(data[1])?,
            side_mode: data[2],
            side_brightness: data[3],
            side_speed: data[4],
            side_rgb: data[5] != 0,
            side_color: data[6],
        })
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Which persisted blocks a coalescer poll wants flushed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushSet {
    /// General settings block ([`UserConfig`]).
    pub settings: bool,
    /// Lighting-engine-owned block (per-key RGB matrix state).
    pub lighting: bool,
}

impl FlushSet {
    pub fn any(self) -> bool {
        self.settings || self.lighting
    }
}

/// Delays and batches settings writes.
///
/// The timer is armed by the first mutation after an idle period and is
/// *not* re-armed by further mutations, so a stream of changes costs one
/// write per block per quiet window.
#[derive(Clone, Debug, Default)]
pub struct SettingsCoalescer {
    armed_at_ms: Option<u64>,
    settings_dirty: bool,
    lighting_dirty: bool,
}

impl SettingsCoalescer {
    pub const fn new() -> Self {
        Self {
            armed_at_ms: None,
            settings_dirty: false,
            lighting_dirty: false,
        }
    }

    /// A field of the general settings block changed.
    pub fn mark_settings_dirty(&mut self, now_ms: u64) {
        self.settings_dirty = true;
        self.arm(now_ms);
    }

    /// The lighting engine reports its own block changed.
    pub fn mark_lighting_dirty(&mut self, now_ms: u64) {
        self.lighting_dirty = true;
        self.arm(now_ms);
    }

    fn arm(&mut self, now_ms: u64) {
        if self.armed_at_ms.is_none() {
            self.armed_at_ms = Some(now_ms);
        }
    }

    /// True while a flush is pending.
    pub fn pending(&self) -> bool {
        self.armed_at_ms.is_some()
    }

    /// Check the quiet period. When it has elapsed, reports which blocks
    /// to flush and returns to idle; the caller performs the writes.
    pub fn poll(&mut self, now_ms: u64) -> FlushSet {
        let armed_at = match self.armed_at_ms {
            Some(t) => t,
            None => return FlushSet::default(),
        };
        if now_ms.saturating_sub(armed_at) < SETTINGS_COALESCE_MS {
            return FlushSet::default();
        }

        let out = FlushSet {
            settings: self.settings_dirty,
            lighting: self.lighting_dirty,
        };
        self.settings_dirty = false;
        self.lighting_dirty = false;
        self.armed_at_ms = None;
        out
    }

    /// Drop any pending flush (factory reset writes through immediately).
    pub fn cancel(&mut self) {
        self.settings_dirty = false;
        self.lighting_dirty = false;
        self.armed_at_ms = None;
    }
}
