//! Session-lifetime device state: active transport, RF link status,
//! battery/charge report and host OS personality.
//!
//! `DeviceInfo` lives for the whole process and is reset only by a
//! factory reset. It is mutated by the link-mode manager (transport
//! selection) and by status pushes from the RF module.

/// Active transport link mode.
///
/// The raw values match the selector wire protocol: the wireless slots
/// come first, USB last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkMode {
    /// 2.4 GHz RF dongle.
    Rf24 = 0,
    /// Bluetooth channel slot 1.
    Bt1 = 1,
    /// Bluetooth channel slot 2.
    Bt2 = 2,
    /// Bluetooth channel slot 3.
    Bt3 = 3,
    /// Wired USB.
    Usb = 4,
}

impl LinkMode {
    /// Parse a raw mode byte. Values beyond the valid set are rejected.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Rf24),
            1 => Some(Self::Bt1),
            2 => Some(Self::Bt2),
            3 => Some(Self::Bt3),
            4 => Some(Self::Usb),
            _ => None,
        }
    }

    /// Whether this mode goes through the external RF module.
    pub fn is_wireless(self) -> bool {
        !matches!(self, Self::Usb)
    }

    /// Whether this is one of the three Bluetooth channel slots.
    pub fn is_bluetooth(self) -> bool {
        matches!(self, Self::Bt1 | Self::Bt2 | Self::Bt3)
    }
}

/// Link state reported by the RF module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RfState {
    /// No link activity.
    Idle,
    /// Linked to a host.
    Connect,
    /// Link lost or host gone.
    Disconnect,
    /// Advertising for a new pairing.
    Pairing,
    /// Module is completing a wake handshake.
    Wake,
}

/// Charging status bitfield pushed by the RF module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargeState(pub u8);

impl ChargeState {
    const CHARGING: u8 = 0x01;
    const FULL: u8 = 0x02;

    /// Battery is actively charging.
    pub fn is_charging(self) -> bool {
        self.0 & Self::CHARGING != 0
    }

    /// Battery reports full.
    pub fn is_full(self) -> bool {
        self.0 & Self::FULL != 0
    }
}

/// Host OS personality selected by the dial switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysMode {
    Mac,
    Win,
}

/// Session-lifetime device record.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    /// Currently active transport.
    pub link_mode: LinkMode,
    /// Remembered channel for the RF family (what bit 0 of the dial
    /// switches back to).
    pub rf_channel: LinkMode,
    /// Remembered Bluetooth channel slot.
    pub ble_channel: LinkMode,
    /// Last link state pushed by the RF module.
    pub rf_state: RfState,
    /// Last charging status pushed by the RF module.
    pub rf_charge: ChargeState,
    /// Battery percentage (0-100).
    pub rf_battery: u8,
    /// Host OS personality.
    pub sys_sw_state: SysMode,
}

impl DeviceInfo {
    pub const fn new() -> Self {
        Self {
            link_mode: LinkMode::Usb,
            rf_channel: LinkMode::Rf24,
            ble_channel: LinkMode::Bt1,
            rf_state: RfState::Idle,
            rf_charge: ChargeState(0),
            rf_battery: 100,
            sys_sw_state: SysMode::Win,
        }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::new()
    }
}
