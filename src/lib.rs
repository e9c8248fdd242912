//! Power-state and link-mode control layer for a wireless mechanical
//! keyboard.
//!
//! Every tick the controller decides whether the device stays active,
//! enters light sleep (peripherals down, loop still polling) or deep
//! sleep (MCU halted until the wake interrupt), and coordinates that
//! with the active transport (USB / 2.4 GHz RF / Bluetooth 1-3), the
//! dial-switch debouncing and a write-coalescing settings store.
//!
//! The crate is split so all of that logic is host-testable:
//! - this library is pure `no_std` state-machine code behind platform
//!   trait seams ([`platform`], [`transport`]);
//! - the embedded binary (feature `embedded`, `main.rs`) implements the
//!   seams against the nRF52840 and runs the polling loop.
//!
//! Usage: `cargo test` on the host; `cargo run --features embedded`
//! on target via probe-rs.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod controller;
pub mod counters;
pub mod device;
pub mod error;
pub mod events;
pub mod hid;
pub mod link;
pub mod platform;
pub mod settings;
pub mod sleep;
pub mod transport;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
