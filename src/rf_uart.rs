//! UART transport to the external RF module.
//!
//! Frame format (device -> module):
//! ```text
//! +------+------+---------+----------+
//! | 0xAA | cmd  | len (1) | checksum |
//! +------+------+---------+----------+
//! ```
//! The module answers every command with `0x55 cmd` within a few
//! milliseconds; anything else counts as a missed attempt. Status
//! pushes and pairing acknowledgements arrive unsolicited and are
//! collected by [`rf_rx_task`] into a channel the control loop drains.

use defmt::{debug, warn};
use embassy_nrf::uarte::{UarteRx, UarteTx};
use embassy_nrf::peripherals::UARTE0;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{block_for, with_timeout, Duration};

use sleeplink::device::{ChargeState, RfState};
use sleeplink::error::Error;
use sleeplink::transport::{RfCommand, RfEvent, RfStatus, RfTransport};

/// Frame lead-in byte, device to module.
const FRAME_SOF: u8 = 0xAA;

/// Frame lead-in byte, module to device.
const FRAME_ACK: u8 = 0x55;

/// Unsolicited status push opcode.
const OP_STATUS: u8 = 0x90;

/// Pairing acknowledged opcode.
const OP_PAIRING_ACK: u8 = 0x91;

/// Per-attempt acknowledgement window.
const ACK_TIMEOUT: Duration = Duration::from_millis(5);

fn opcode(cmd: RfCommand) -> u8 {
    match cmd {
        RfCommand::SleepNotify => 0x01,
        RfCommand::SetLink => 0x02,
        RfCommand::PairingInit => 0x03,
        RfCommand::FactoryClear => 0x04,
        RfCommand::StatusSync => 0x05,
        RfCommand::WakeHandshake => 0x06,
    }
}

fn parse_rf_state(raw: u8) -> RfState {
    match raw {
        1 => RfState::Connect,
        2 => RfState::Disconnect,
        3 => RfState::Pairing,
        4 => RfState::Wake,
        _ => RfState::Idle,
    }
}

/// Events decoded off the wire, drained by the control loop.
pub static RF_EVENTS: Channel<CriticalSectionRawMutex, RfEvent, 8> = Channel::new();

/// Command acknowledgements from the module.
static RF_ACKS: Channel<CriticalSectionRawMutex, u8, 4> = Channel::new();

/// Synchronous command half of the transport.
pub struct RfUart {
    tx: UarteTx<'static, UARTE0>,
}

impl RfUart {
    pub fn new(tx: UarteTx<'static, UARTE0>) -> Self {
        Self { tx }
    }

    fn send_frame(&mut self, cmd: RfCommand) -> Result<(), Error> {
        let op = opcode(cmd);
        let frame = [FRAME_SOF, op, 0, FRAME_SOF ^ op];
        self.tx.blocking_write(&frame).map_err(|_| Error::Transport)
    }

    fn wait_ack(&mut self, cmd: RfCommand) -> bool {
        let op = opcode(cmd);
        embassy_futures::block_on(async {
            matches!(with_timeout(ACK_TIMEOUT, RF_ACKS.receive()).await, Ok(a) if a == op)
        })
    }
}

impl RfTransport for RfUart {
    fn send_cmd(&mut self, cmd: RfCommand, retries: u8, delay_ms: u32) -> Result<(), Error> {
        for attempt in 0..=retries {
            if self.send_frame(cmd).is_ok() && self.wait_ack(cmd) {
                return Ok(());
            }
            debug!("rf: cmd {} attempt {} not acknowledged", opcode(cmd), attempt);
            block_for(Duration::from_millis(delay_ms as u64));
        }
        warn!("rf: cmd {} abandoned", opcode(cmd));
        Err(Error::NotAcknowledged)
    }

    fn poll_event(&mut self) -> Option<RfEvent> {
        RF_EVENTS.try_receive().ok()
    }
}

/// Receive task: decodes acknowledgements and unsolicited pushes.
#[embassy_executor::task]
pub async fn rf_rx_task(mut rx: UarteRx<'static, UARTE0>) {
    let mut header = [0u8; 2];
    loop {
        if rx.read(&mut header).await.is_err() {
            continue;
        }
        match header {
            [FRAME_ACK, op] if op < 0x80 => {
                let _ = RF_ACKS.try_send(op);
            }
            [FRAME_ACK, OP_STATUS] => {
                let mut body = [0u8; 3];
                if rx.read(&mut body).await.is_err() {
                    continue;
                }
                let status = RfStatus {
                    rf_state: parse_rf_state(body[0]),
                    charge: ChargeState(body[1]),
                    battery: body[2].min(100),
                };
                if RF_EVENTS.try_send(RfEvent::Status(status)).is_err() {
                    debug!("rf: event queue full, status dropped");
                }
            }
            [FRAME_ACK, OP_PAIRING_ACK] => {
                let _ = RF_EVENTS.try_send(RfEvent::PairingAck);
            }
            _ => {
                // Framing slipped; resync on the next lead-in.
                debug!("rf: bad header {:02x}", header);
            }
        }
    }
}
