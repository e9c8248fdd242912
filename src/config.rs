//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, debounce windows and storage layout constants
//! live here so they can be tuned in one place.
//!
//! Every threshold is a millisecond duration measured against the
//! polled monotonic clock, so correctness does not depend on the loop
//! holding an exact cadence. Debounce windows that the hardware defines
//! as "N consecutive stable observations" stay sample-counted.

// Control loop cadences

/// Activity counter cadence (ms). Counters accumulate elapsed time on
/// this grid.
pub const COUNTER_TICK_MS: u64 = 10;

/// Sleep state machine step interval (ms).
pub const SLEEP_STEP_MS: u64 = 50;

/// Long-press gesture step interval (ms).
pub const LONG_PRESS_STEP_MS: u64 = 100;

/// Dial switch scan interval (ms).
pub const DIAL_SCAN_MS: u64 = 20;

// Dial switch debounce

/// Consecutive stable dial samples required before a new reading is applied.
pub const DIAL_DEBOUNCE_SAMPLES: u8 = 25;

/// Consecutive stable samples required by the synchronous boot-time scan.
pub const BOOT_DIAL_STABLE_SAMPLES: u8 = 10;

/// Delay between boot-time dial samples (ms).
pub const BOOT_DIAL_SAMPLE_DELAY_MS: u32 = 1;

// Sleep thresholds

/// Consecutive 50 ms steps the USB host must report "suspended" before
/// light sleep is requested (~1 s).
pub const USB_SUSPEND_DEBOUNCE_STEPS: u8 = 20;

/// Consecutive 50 ms steps of reported RF disconnect before the device
/// gives up and escalates to deep sleep (~5 s).
pub const RF_DISCONNECT_ESCALATE_STEPS: u32 = 100;

/// Inactivity before light sleep on a wireless transport (2 min).
pub const SLEEP_TIME_DELAY_MS: u32 = 120_000;

/// Inactivity before deep sleep on the 2.4 GHz transport (6 min).
pub const DEEP_SLEEP_DELAY_MS: u32 = 360_000;

/// Any transport deep-sleeps after this multiple of `DEEP_SLEEP_DELAY_MS`.
pub const DEEP_SLEEP_FALLBACK_MULT: u32 = 10;

/// Link negotiation timeout over Bluetooth (1 min).
pub const LINK_TIMEOUT_MS: u32 = 60_000;

/// Link negotiation timeout over 2.4 GHz RF. The dongle either answers
/// quickly or not at all, so this is much shorter than Bluetooth.
pub const LINK_TIMEOUT_RF24_MS: u32 = 15_000;

/// Inactivity ceiling below which a sleeping device is considered woken.
pub const WAKE_ACTIVITY_MS: u32 = 50;

/// How long the sleep-entry visual cue is held on the side LEDs (ms).
pub const SLEEP_CUE_HOLD_MS: u32 = 500;

// Long-press gestures (counted on the 100 ms gesture step)

/// Hold steps before a temporarily selected channel commits to pairing (3 s).
pub const PAIR_HOLD_STEPS: u16 = 30;

/// Hold steps before a factory reset commits (3 s).
pub const RESET_HOLD_STEPS: u16 = 30;

/// Hold steps before the RGB hardware test pattern starts (2 s).
pub const RGB_TEST_HOLD_STEPS: u16 = 20;

/// Pairing-init command attempts before the gesture is abandoned.
pub const PAIRING_RETRIES: u8 = 5;

/// Delay between pairing-init attempts (ms).
pub const PAIRING_RETRY_DELAY_MS: u32 = 20;

/// Per-command retry count for the factory reset sequence.
pub const FACTORY_CMD_RETRIES: u8 = 10;

/// Inter-attempt delay for factory reset commands (ms).
pub const FACTORY_CMD_DELAY_MS: u32 = 10;

/// Pause between the link-set and device-clear commands of a factory
/// reset, giving the RF module time to apply the first (ms).
pub const FACTORY_INTER_CMD_DELAY_MS: u32 = 500;

// Side-light adjustment ranges

/// Highest side-light brightness level (0 = off).
pub const SIDE_BRIGHTNESS_MAX: u8 = 5;

/// Highest side-light animation speed level.
pub const SIDE_SPEED_MAX: u8 = 4;

/// Number of side-light animation modes (wraps).
pub const SIDE_MODE_COUNT: u8 = 5;

/// Number of side-light base colours (wraps; the last is rainbow).
pub const SIDE_COLOR_COUNT: u8 = 8;

// Settings persistence

/// Quiet period before dirty settings are flushed to flash (40 s).
/// Bounds flash wear to roughly one write per block per window no matter
/// how fast the user hammers an adjustment key.
pub const SETTINGS_COALESCE_MS: u64 = 40_000;

/// Marker byte a persisted settings record must carry to be trusted.
pub const SETTINGS_VALID_MARKER: u8 = 0xA5;

/// Flash page index where the settings store starts (4 KB per page on
/// nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 252;

/// Number of flash pages reserved for the settings store.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

// USB

/// USB VID/PID - use the "pid.codes" open-source test VID.
/// Replace with your own allocated VID/PID for production.
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0002;

/// USB device strings.
pub const USB_MANUFACTURER: &str = "sleeplink";
pub const USB_PRODUCT: &str = "Wireless Mechanical Keyboard";
pub const USB_SERIAL_NUMBER: &str = "000001";

/// USB HID polling interval (ms). 1 ms = 1000 Hz for lowest latency.
pub const USB_HID_POLL_MS: u8 = 1;
