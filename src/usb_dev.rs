//! USB HID keyboard device with bus suspend tracking.
//!
//! Initialises the Embassy USB stack on the nRF52840 hardware USB
//! peripheral and exposes a boot-protocol keyboard endpoint plus the
//! suspend/resume state the sleep machine debounces.

use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, warn};
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;
use usbd_hid::descriptor::{KeyboardReport, SerializedDescriptor};

use sleeplink::config;

bind_interrupts!(struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<peripherals::USBD>;
    CLOCK_POWER => embassy_nrf::usb::vbus_detect::InterruptHandler;
});

static KB_STATE: StaticCell<State> = StaticCell::new();
static USB_CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_CTRL_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static USB_BUS_HANDLER: StaticCell<UsbBusHandler> = StaticCell::new();

/// Host-suspended flag, written from the USB handler and polled by the
/// control loop every sleep step.
static USB_SUSPENDED: AtomicBool = AtomicBool::new(false);

struct UsbBusHandler;

impl embassy_usb::Handler for UsbBusHandler {
    fn suspended(&mut self, suspended: bool) {
        info!("usb: suspended={}", suspended);
        USB_SUSPENDED.store(suspended, Ordering::Relaxed);
    }
}

/// Current host-suspend state as last reported by the bus.
pub fn usb_suspended() -> bool {
    USB_SUSPENDED.load(Ordering::Relaxed)
}

/// Remote wakeup requests from the control loop.
static WAKEUP_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Ask the USB task to signal remote wakeup to a suspended host.
pub fn request_remote_wakeup() {
    WAKEUP_REQUEST.signal(());
}

/// Build result containing the USB device runner and the report writer.
pub struct UsbKeyboard {
    pub device: UsbDevice<'static, Driver<'static, peripherals::USBD, HardwareVbusDetect>>,
    pub keyboard_writer:
        HidWriter<'static, Driver<'static, peripherals::USBD, HardwareVbusDetect>, 8>,
}

/// Initialise the USB stack and create the HID keyboard device.
///
/// Must be called exactly once.  All static buffers are consumed here.
pub fn init(usbd: peripherals::USBD) -> UsbKeyboard {
    let driver = Driver::new(usbd, Irqs, HardwareVbusDetect::new(Irqs));

    let mut usb_config = Config::new(config::USB_VID, config::USB_PID);
    usb_config.manufacturer = Some(config::USB_MANUFACTURER);
    usb_config.product = Some(config::USB_PRODUCT);
    usb_config.serial_number = Some(config::USB_SERIAL_NUMBER);
    usb_config.max_power = 100; // mA
    usb_config.max_packet_size_0 = 64;
    usb_config.supports_remote_wakeup = true;

    let config_desc = USB_CONFIG_DESC.init([0u8; 256]);
    let bos_desc = USB_BOS_DESC.init([0u8; 256]);
    let msos_desc = USB_MSOS_DESC.init([0u8; 256]);
    let ctrl_buf = USB_CTRL_BUF.init([0u8; 128]);

    let mut builder = Builder::new(
        driver,
        usb_config,
        config_desc,
        bos_desc,
        msos_desc,
        ctrl_buf,
    );
    builder.handler(USB_BUS_HANDLER.init(UsbBusHandler));

    let kb_config = HidConfig {
        report_descriptor: KeyboardReport::desc(),
        request_handler: None,
        poll_ms: config::USB_HID_POLL_MS,
        max_packet_size: 64,
    };
    let keyboard_writer =
        HidWriter::<_, 8>::new(&mut builder, KB_STATE.init(State::new()), kb_config);

    let device = builder.build();

    UsbKeyboard {
        device,
        keyboard_writer,
    }
}

/// Run the USB device state machine forever, honouring remote wakeup
/// requests while the bus is suspended.
#[embassy_executor::task]
pub async fn usb_task(
    mut device: UsbDevice<'static, Driver<'static, peripherals::USBD, HardwareVbusDetect>>,
) -> ! {
    loop {
        device.run_until_suspend().await;
        WAKEUP_REQUEST.wait().await;
        if device.remote_wakeup().await.is_err() {
            warn!("usb: remote wakeup rejected by host");
        }
    }
}
