//! Asynchronous (UART) link with hardware RTS flow control.
//!
//! Receive runs in the UART interrupt: each byte goes through
//! [`AsyncReceiver::on_byte`], which drives the [`FrameDecoder`] and parks a
//! completed frame in a one-message hand-off slot. Completing a frame sets the
//! hold flag; the interrupt glue then deasserts RTS so the host stops sending
//! until the dispatcher releases the slot.
//!
//! Host sleep lines:
//! - SLEEP (active high): host allows the link to power down.
//! - SUSPEND (active low): with SLEEP asserted, enter system-off.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

use super::{
    BaudRate, LinkFlags, Sense, SenseLine, SerialLink, SerialMode, WakeControl,
};
use crate::error::LinkError;
use crate::proto::codec::{FrameDecoder, LineErrors};
use crate::proto::ids::{MESG_TX_SYNC, ResponseCode};
use crate::proto::wire::Message;

/// UART peripheral as the asynchronous link drives it.
pub trait UartPort {
    type Error: core::fmt::Debug;

    fn enable(&mut self);
    fn disable(&mut self);
    fn start_rx(&mut self);
    fn stop_rx(&mut self);
    /// `true` hands RTS to the UART's automatic flow control; `false` holds
    /// it deasserted.
    fn set_flow_control(&mut self, enabled: bool);
    fn set_baud_rate(&mut self, rate: BaudRate);
    fn start_tx(&mut self);
    /// Queue one byte, returning once the UART has accepted it.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
    fn stop_tx(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Interrupt-side receiver
// ───────────────────────────────────────────────────────────────

/// Receive state shared between the UART interrupt and the main loop.
pub struct AsyncReceiver {
    decoder: Mutex<CriticalSectionRawMutex, RefCell<FrameDecoder>>,
    slot: Mutex<CriticalSectionRawMutex, Cell<Option<Message>>>,
    flags: LinkFlags,
}

impl AsyncReceiver {
    pub const fn new() -> Self {
        Self {
            decoder: Mutex::new(RefCell::new(FrameDecoder::new(MESG_TX_SYNC))),
            slot: Mutex::new(Cell::new(None)),
            flags: LinkFlags::new(),
        }
    }

    pub fn flags(&self) -> &LinkFlags {
        &self.flags
    }

    /// UART receive interrupt body.
    ///
    /// Returns `true` when this byte completed a frame; the caller must then
    /// deassert RTS.
    pub fn on_byte(&self, byte: u8, errors: LineErrors) -> bool {
        if self.flags.is_held() {
            return false;
        }
        let frame = self
            .decoder
            .lock(|d| d.borrow_mut().feed_byte_with_errors(byte, errors));
        match frame {
            Some(msg) => {
                self.slot.lock(|s| s.set(Some(msg)));
                self.flags.set_hold(true);
                true
            }
            None => false,
        }
    }

    /// Move the completed frame out of the hand-off slot.
    pub fn take(&self) -> Option<Message> {
        self.slot.lock(Cell::take)
    }

    /// Drop any partial frame.
    pub fn reset(&self) {
        self.decoder.lock(|d| d.borrow_mut().reset());
    }
}

impl Default for AsyncReceiver {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Link
// ───────────────────────────────────────────────────────────────

pub struct AsyncLink<'a, U, W, SLP, SUS> {
    uart: U,
    wake: W,
    sleep_pin: SLP,
    suspend_pin: SUS,
    rx: &'a AsyncReceiver,
    baud: BaudRate,
    pending_baud: Option<BaudRate>,
}

impl<'a, U, W, SLP, SUS> AsyncLink<'a, U, W, SLP, SUS>
where
    U: UartPort,
    W: WakeControl,
    SLP: InputPin,
    SUS: InputPin,
{
    /// Bring the UART up at `baud` and start receiving.
    pub fn new(
        mut uart: U,
        mut wake: W,
        sleep_pin: SLP,
        suspend_pin: SUS,
        rx: &'a AsyncReceiver,
        baud: BaudRate,
    ) -> Self {
        wake.request_clock();
        uart.set_baud_rate(baud);
        uart.enable();
        uart.start_rx();
        uart.set_flow_control(true);
        wake.set_sense(SenseLine::Sleep, Sense::High);
        wake.set_sense(SenseLine::Suspend, Sense::Low);
        info!("LINK: async at {} baud", baud.bits_per_second());
        Self {
            uart,
            wake,
            sleep_pin,
            suspend_pin,
            rx,
            baud,
            pending_baud: None,
        }
    }

    /// As [`AsyncLink::new`], with the rate taken from the baud straps.
    /// The reserved strap setting falls back to `default`.
    pub fn with_baud_straps<B1, B2, B3>(
        uart: U,
        wake: W,
        sleep_pin: SLP,
        suspend_pin: SUS,
        rx: &'a AsyncReceiver,
        default: BaudRate,
        straps: (&mut B1, &mut B2, &mut B3),
    ) -> Result<Self, LinkError>
    where
        B1: InputPin,
        B2: InputPin,
        B3: InputPin,
    {
        let (br1, br2, br3) = straps;
        let baud = match BaudRate::sense_strap(br1, br2, br3)? {
            Some(rate) => rate,
            None => {
                warn!("LINK: reserved baud strap, using {}", default.bits_per_second());
                default
            }
        };
        Ok(Self::new(uart, wake, sleep_pin, suspend_pin, rx, baud))
    }

    pub fn baud_rate(&self) -> BaudRate {
        self.baud
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    pub fn wake_control(&self) -> &W {
        &self.wake
    }

    fn flags(&self) -> &LinkFlags {
        &self.rx.flags
    }

    fn sleep_asserted(&mut self) -> Result<bool, LinkError> {
        self.sleep_pin.is_high().map_err(|_| LinkError::Pin)
    }

    fn suspend_asserted(&mut self) -> Result<bool, LinkError> {
        self.suspend_pin.is_low().map_err(|_| LinkError::Pin)
    }

    fn wakeup(&mut self) {
        if !self.flags().is_sleeping() {
            return;
        }
        self.flags().set_sleeping(false);
        self.wake.set_sense(SenseLine::Sleep, Sense::High);
        self.wake.set_sense(SenseLine::Suspend, Sense::Low);
        self.rx.reset();
        self.wake.request_clock();
        self.uart.enable();
        self.uart.start_rx();
        if !self.flags().is_held() {
            self.uart.set_flow_control(true);
        }
        debug!("LINK: async wake");
    }

    /// Suspend-line handler. Returns `true` when the host asked for system-off
    /// (SUSPEND asserted while SLEEP is asserted); the caller then enters deep
    /// sleep, which ends in a reset.
    pub fn on_suspend_sense(&mut self) -> Result<bool, LinkError> {
        if !self.suspend_asserted()? || !self.sleep_asserted()? {
            return Ok(false);
        }
        self.wake.set_sense(SenseLine::Suspend, Sense::Disabled);
        // Deep sleep wakes on the host deasserting SLEEP.
        self.wake.set_sense(SenseLine::Sleep, Sense::Low);
        info!("LINK: host suspend");
        Ok(true)
    }
}

impl<U, W, SLP, SUS> SerialLink for AsyncLink<'_, U, W, SLP, SUS>
where
    U: UartPort,
    W: WakeControl,
    SLP: InputPin,
    SUS: InputPin,
{
    fn mode(&self) -> SerialMode {
        SerialMode::Asynchronous
    }

    fn poll_rx(&mut self) -> Result<bool, LinkError> {
        if self.sleep_asserted()? {
            Ok(true)
        } else {
            self.wakeup();
            Ok(false)
        }
    }

    fn take_frame(&mut self) -> Option<Message> {
        self.rx.take()
    }

    fn transmit(&mut self, msg: &Message) -> Result<(), LinkError> {
        if msg.is_empty() {
            return Ok(());
        }
        self.wakeup();

        let len = msg.len() as u8;
        let checksum = msg.checksum(MESG_TX_SYNC);
        self.flags().set_transmitting(true);
        self.uart.start_tx();
        let result = [MESG_TX_SYNC, len, msg.id()]
            .into_iter()
            .chain(msg.data().iter().copied())
            .chain([checksum])
            .try_for_each(|b| self.uart.write_byte(b));
        self.uart.stop_tx();
        self.flags().set_transmitting(false);

        result.map_err(|e| {
            warn!("LINK: uart write failed: {:?}", e);
            LinkError::Uart
        })
    }

    fn idle(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn hold_rx(&mut self) {
        self.flags().set_hold(true);
        self.uart.set_flow_control(false);
    }

    fn release_rx(&mut self) {
        self.flags().set_hold(false);
        self.rx.reset();
        self.uart.set_flow_control(true);
    }

    fn is_held(&self) -> bool {
        self.flags().is_held()
    }

    fn sleep(&mut self) -> Result<(), LinkError> {
        self.flags().set_sleeping(true);
        self.uart.set_flow_control(false);
        self.uart.stop_rx();
        self.wake.release_clock();
        self.uart.disable();
        self.wake.set_sense(SenseLine::Sleep, Sense::Low);
        self.wake.set_sense(SenseLine::Suspend, Sense::Low);
        Ok(())
    }

    fn request_baud_rate(&mut self, index: u8) -> ResponseCode {
        let Some(rate) = BaudRate::from_index(index) else {
            return ResponseCode::INVALID_PARAMETER_PROVIDED;
        };
        self.pending_baud = Some(rate);
        self.flags().set_baud_change_pending(true);
        ResponseCode::NO_ERROR
    }

    fn baud_change_pending(&self) -> bool {
        self.flags().baud_change_pending()
    }

    fn apply_pending_baud_rate(&mut self) -> Result<(), LinkError> {
        if self.flags().is_transmitting() {
            return Ok(());
        }
        self.flags().set_baud_change_pending(false);
        if let Some(rate) = self.pending_baud.take() {
            self.uart.set_baud_rate(rate);
            self.baud = rate;
            info!("LINK: baud now {}", rate.bits_per_second());
        }
        Ok(())
    }

    fn set_bit_rate(&mut self, _index: u8) -> ResponseCode {
        ResponseCode::INVALID_MESSAGE
    }

    fn set_srdy_sleep_delay(&mut self, _delay: u8) -> ResponseCode {
        ResponseCode::INVALID_MESSAGE
    }
}
