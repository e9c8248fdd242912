//! Power sequencing for the nRF52840 board.
//!
//! Owns the LED power rails (DC boost converter + RGB driver shutdown
//! lines), the RF module wake pin and the deep-sleep halt. Deep sleep
//! parks the key matrix so any keypress pulls a sense-enabled row and
//! wakes the core from WFI.

use defmt::info;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_time::{block_for, Duration};

use sleeplink::config::SLEEP_CUE_HOLD_MS;
use sleeplink::platform::SleepCue;

/// LED supply rails and the RF wake line.
pub struct PowerRails {
    /// DC boost converter feeding the LED matrix.
    dc_boost: Output<'static>,
    /// RGB driver shutdown line (active high = running).
    rgb_sdb: Output<'static>,
    /// Side strip driver shutdown line.
    side_sdb: Output<'static>,
    /// Wake line into the RF module (high = awake).
    rf_wakeup: Output<'static>,
    rails_on: bool,
}

impl PowerRails {
    pub fn new(
        dc_boost: Output<'static>,
        rgb_sdb: Output<'static>,
        side_sdb: Output<'static>,
        rf_wakeup: Output<'static>,
    ) -> Self {
        let mut rails = Self {
            dc_boost,
            rgb_sdb,
            side_sdb,
            rf_wakeup,
            rails_on: false,
        };
        rails.leds_on();
        rails
    }

    pub fn leds_on(&mut self) {
        if self.rails_on {
            return;
        }
        self.dc_boost.set_high();
        self.rgb_sdb.set_high();
        self.side_sdb.set_high();
        self.rails_on = true;
    }

    pub fn leds_off(&mut self) {
        if !self.rails_on {
            return;
        }
        self.dc_boost.set_low();
        self.rgb_sdb.set_low();
        self.side_sdb.set_low();
        self.rails_on = false;
    }

    pub fn rf_wake_high(&mut self) {
        self.rf_wakeup.set_high();
    }
}

/// Matrix pins the halt re-purposes as the wake interrupt source.
pub struct WakeMatrix {
    pub rows: [Input<'static>; 6],
    pub cols: [Output<'static>; 16],
}

/// The power sequencer: rails plus halt plumbing.
pub struct McuPower {
    pub rails: PowerRails,
    matrix: WakeMatrix,
}

impl McuPower {
    pub fn new(rails: PowerRails, matrix: WakeMatrix) -> Self {
        Self { rails, matrix }
    }

    /// Power down peripherals for light sleep.
    pub fn light_sleep(&mut self) {
        info!("power: light sleep");
        self.rails.leds_off();
    }

    /// Restore peripherals after light sleep.
    pub fn light_wake(&mut self) {
        info!("power: wake");
        self.rails.leds_on();
    }

    /// Halt the core until a key is pressed.
    ///
    /// Columns are driven high and rows sense-enabled, so closing any
    /// switch raises a GPIO SENSE event; WFE returns and the control
    /// loop resumes where it stopped.
    pub fn halt_until_keypress(&mut self) {
        info!("power: deep sleep");
        self.rails.leds_off();

        for col in &mut self.matrix.cols {
            col.set_high();
        }
        // Rows already carry Pull::Down + sense-high configuration from
        // board init; nothing to reprogram here.

        cortex_m::asm::dsb();
        cortex_m::asm::wfe();
    }

    /// Re-init IO after the halt returns.
    pub fn resume_from_halt(&mut self) {
        for col in &mut self.matrix.cols {
            col.set_low();
        }
        self.rails.rf_wake_high();
        self.rails.leds_on();
        info!("power: resumed from deep sleep");
    }

    /// Hold the sleep-entry cue on the side LEDs. The LED engine paints
    /// the colour; this keeps the rail up long enough to show it.
    pub fn hold_cue(&mut self, cue: SleepCue) {
        info!("power: sleep cue {}", cue);
        self.rails.leds_on();
        block_for(Duration::from_millis(SLEEP_CUE_HOLD_MS as u64));
    }

    pub fn busy_wait_ms(&mut self, ms: u32) {
        block_for(Duration::from_millis(ms as u64));
    }
}

/// Build a sense-enabled matrix row input.
pub fn wake_row(pin: embassy_nrf::gpio::AnyPin) -> Input<'static> {
    Input::new(pin, Pull::Down)
}

/// Build a matrix column output, idle low.
pub fn matrix_col(pin: embassy_nrf::gpio::AnyPin) -> Output<'static> {
    Output::new(pin, Level::Low, OutputDrive::Standard)
}

/// Build a power rail output, idle low.
pub fn rail(pin: embassy_nrf::gpio::AnyPin) -> Output<'static> {
    Output::new(pin, Level::Low, OutputDrive::Standard)
}

/// Build the RF wake output, idle high.
pub fn rf_wake(pin: embassy_nrf::gpio::AnyPin) -> Output<'static> {
    Output::new(pin, Level::High, OutputDrive::Standard)
}
