//! Embedded entry point for the nRF52840 keyboard controller.
//!
//! Wires the host-tested control core to the board: USB device with
//! suspend tracking, UART link to the RF module, LED power rails, flash
//! settings store and the dial switch, then runs the polling control
//! loop. Boot order follows the hardware's needs: give the RF module
//! time to start, flush any stale keys, fast-scan the dial before the
//! periodic scan begins, then load settings.

#![no_std]
#![no_main]

mod flash;
mod mcu;
mod rf_uart;
mod usb_dev;

use defmt::info;
use defmt_rtt as _;
use panic_probe as _;

use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Input, Pin, Pull};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver as UsbDriver;
use embassy_nrf::{bind_interrupts, peripherals, uarte};
use embassy_time::{Duration, Instant, Ticker, Timer};
use embassy_usb::class::hid::HidWriter;

use sleeplink::controller::Controller;
use sleeplink::device::SysMode;
use sleeplink::error::Error;
use sleeplink::hid::BootReport;
use sleeplink::link::DialReading;
use sleeplink::platform::{HidHost, HostTransport, PowerSequencer, SettingsStore, SleepCue};
use sleeplink::settings::UserConfig;
use sleeplink::transport::{RfCommand, RfEvent, RfTransport};

use flash::FlashStore;
use mcu::{matrix_col, rail, rf_wake, wake_row, McuPower, PowerRails, WakeMatrix};
use rf_uart::RfUart;

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

/// Control loop poll period. Finer than every cadence it derives.
const LOOP_POLL_MS: u64 = 5;

/// Everything the control core reaches through its platform seams.
struct Board {
    power: McuPower,
    rf: RfUart,
    store: FlashStore,
    keyboard_writer:
        HidWriter<'static, UsbDriver<'static, peripherals::USBD, HardwareVbusDetect>, 8>,
    active_transport: HostTransport,
}

impl PowerSequencer for Board {
    fn enter_light_sleep(&mut self) {
        self.power.light_sleep();
    }
    fn exit_light_sleep(&mut self) {
        self.power.light_wake();
    }
    fn enter_deep_sleep(&mut self) {
        self.power.halt_until_keypress();
    }
    fn exit_deep_sleep(&mut self) {
        self.power.resume_from_halt();
    }
    fn signal_sleep(&mut self, cue: SleepCue) {
        self.power.hold_cue(cue);
    }
    fn delay_ms(&mut self, ms: u32) {
        self.power.busy_wait_ms(ms);
    }
}

impl HidHost for Board {
    fn release_all(&mut self) {
        let report = BootReport::empty();
        let mut buf = [0u8; 8];
        report.serialize(&mut buf);
        if self.active_transport == HostTransport::Usb {
            let _ = embassy_futures::block_on(self.keyboard_writer.write(&buf));
        }
        // The RF report path clears its own queue on the next sync.
    }

    fn select_transport(&mut self, transport: HostTransport) {
        if self.active_transport != transport {
            info!("hid: report path -> {}", transport);
            self.active_transport = transport;
        }
    }

    fn set_os_layout(&mut self, os: SysMode) {
        // The keymap layer picks its default layer off this.
        info!("hid: os layout {}", os);
    }

    fn wakeup_host(&mut self) {
        usb_dev::request_remote_wakeup();
    }

    fn restart_driver(&mut self) {
        info!("usb: driver restart after wake");
    }
}

impl RfTransport for Board {
    fn send_cmd(&mut self, cmd: RfCommand, retries: u8, delay_ms: u32) -> Result<(), Error> {
        self.rf.send_cmd(cmd, retries, delay_ms)
    }
    fn poll_event(&mut self) -> Option<RfEvent> {
        self.rf.poll_event()
    }
}

impl SettingsStore for Board {
    fn read_settings(&mut self) -> Option<UserConfig> {
        self.store.read_settings_blocking()
    }
    fn write_settings(&mut self, config: &UserConfig) -> Result<(), Error> {
        self.store.write_settings_blocking(config)
    }
    fn write_lighting(&mut self) -> Result<(), Error> {
        self.store.write_lighting_blocking()
    }
}

fn read_dial(dev_mode: &Input<'static>, sys_mode: &Input<'static>) -> DialReading {
    let mut raw = 0;
    if dev_mode.is_high() {
        raw |= 0x01;
    }
    if sys_mode.is_high() {
        raw |= 0x02;
    }
    DialReading(raw)
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());
    info!("sleeplink boot");

    // Dial switch inputs (active low on both poles).
    let dev_mode = Input::new(p.P0_02.degrade(), Pull::Up);
    let sys_mode = Input::new(p.P0_29.degrade(), Pull::Up);

    // LED rails and the RF wake line.
    let rails = PowerRails::new(
        rail(p.P1_04.degrade()),
        rail(p.P1_05.degrade()),
        rail(p.P1_06.degrade()),
        rf_wake(p.P1_07.degrade()),
    );

    // Key matrix, used here only as the deep-sleep wake source.
    let matrix = WakeMatrix {
        rows: [
            wake_row(p.P0_19.degrade()),
            wake_row(p.P0_20.degrade()),
            wake_row(p.P0_21.degrade()),
            wake_row(p.P0_22.degrade()),
            wake_row(p.P0_23.degrade()),
            wake_row(p.P0_24.degrade()),
        ],
        cols: cols(
            [
                p.P0_05.degrade(),
                p.P0_06.degrade(),
                p.P0_07.degrade(),
                p.P0_11.degrade(),
                p.P0_12.degrade(),
                p.P0_13.degrade(),
                p.P0_14.degrade(),
                p.P0_15.degrade(),
                p.P0_16.degrade(),
                p.P0_17.degrade(),
                p.P1_00.degrade(),
                p.P1_01.degrade(),
                p.P1_02.degrade(),
                p.P1_03.degrade(),
                p.P1_08.degrade(),
                p.P1_09.degrade(),
            ],
        ),
    };

    // UART to the RF module.
    let mut uart_config = uarte::Config::default();
    uart_config.baudrate = uarte::Baudrate::BAUD115200;
    let uart = uarte::Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_04, uart_config);
    let (uart_tx, uart_rx) = uart.split();

    // USB HID device.
    let usb = usb_dev::init(p.USBD);
    spawner.must_spawn(usb_dev::usb_task(usb.device));
    spawner.must_spawn(rf_uart::rf_rx_task(uart_rx));

    let mut board = Board {
        power: McuPower::new(rails, matrix),
        rf: RfUart::new(uart_tx),
        store: FlashStore::new(Nvmc::new(p.NVMC)),
        keyboard_writer: usb.keyboard_writer,
        active_transport: HostTransport::Usb,
    };

    // Give the RF module time to come out of reset before talking.
    Timer::after_millis(500).await;
    board.release_all();

    let mut controller = Controller::init(&mut board);
    controller.boot_scan(|| read_dial(&dev_mode, &sys_mode), &mut board);
    info!("boot link mode: {}", controller.link_mode());

    let mut ticker = Ticker::every(Duration::from_millis(LOOP_POLL_MS));
    loop {
        ticker.next().await;
        controller.poll(
            Instant::now().as_millis(),
            read_dial(&dev_mode, &sys_mode),
            usb_dev::usb_suspended(),
            &mut board,
        );

        // The LED engine and report path drain their surfaces here.
        for _event in controller.take_events() {
            // Handed to the LED engine; it owns the animations.
        }
    }
}

fn cols(pins: [AnyPin; 16]) -> [embassy_nrf::gpio::Output<'static>; 16] {
    pins.map(matrix_col)
}
