//! Synchronous (byte-clocked) link.
//!
//! The host clocks every byte. Handshake lines, all active low:
//!
//! | Line | Driven by | Meaning                                         |
//! |------|-----------|-------------------------------------------------|
//! | MRDY | host      | host has a frame for us                         |
//! | SRDY | host      | host is ready to clock the next byte            |
//! | SEN  | us        | we are in a transaction and want the host clock |
//!
//! Each byte waits for an SRDY edge. The GPIO interrupt latches that edge in
//! [`LinkFlags::on_srdy_edge`]. If none arrives within the SRDY sleep delay the
//! link drops its clock and sleeps on level sensing. MRDY asserted while SRDY
//! is held low is the host's reset pattern.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use log::{debug, info, warn};

use super::{BitRate, LinkFlags, Sense, SenseLine, SerialLink, SerialMode, WakeControl};
use crate::error::LinkError;
use crate::proto::ids::{MESG_MAX_SIZE_VALUE, MESG_RX_SYNC, MESG_TX_SYNC, ResponseCode};
use crate::proto::wire::{Message, xor_checksum};

/// Default wait for SRDY before sleeping, in µs.
pub const DEFAULT_SRDY_SLEEP_DELAY_US: u16 = 50;
/// Unit of the host's SRDY sleep delay setting, in µs.
pub const SRDY_SLEEP_DELAY_STEP_US: u16 = 10;

const FILL_BYTE: u8 = 0xFF;

/// Clock control of the SPI peripheral, beyond what [`SpiBus`] covers.
pub trait BusClock {
    fn set_frequency(&mut self, hz: u32);
    fn set_enabled(&mut self, enabled: bool);
}

pub struct SyncPins<SEN, MRDY, SRDY> {
    pub sen: SEN,
    pub mrdy: MRDY,
    pub srdy: SRDY,
}

pub struct SyncLink<'a, SPI, SEN, MRDY, SRDY, D, W> {
    spi: SPI,
    pins: SyncPins<SEN, MRDY, SRDY>,
    delay: D,
    wake: W,
    flags: &'a LinkFlags,
    rate: BitRate,
    srdy_delay_us: u16,
    mrdy_sense_armed: bool,
    start_message: bool,
    end_message: bool,
    received: Option<Message>,
}

impl<'a, SPI, SEN, MRDY, SRDY, D, W> SyncLink<'a, SPI, SEN, MRDY, SRDY, D, W>
where
    SPI: SpiBus<u8> + BusClock,
    SEN: OutputPin,
    MRDY: InputPin,
    SRDY: InputPin,
    D: DelayNs,
    W: WakeControl,
{
    /// Bring the bus up at `rate`.
    ///
    /// A reset may have come from the host's SRDY→MRDY sequence, in which case
    /// the host is still holding SRDY and waiting for SEN; serve that first.
    pub fn new(
        mut spi: SPI,
        pins: SyncPins<SEN, MRDY, SRDY>,
        delay: D,
        wake: W,
        flags: &'a LinkFlags,
        rate: BitRate,
    ) -> Result<Self, LinkError> {
        spi.set_frequency(rate.hz());
        spi.set_enabled(true);
        let mut link = Self {
            spi,
            pins,
            delay,
            wake,
            flags,
            rate,
            srdy_delay_us: DEFAULT_SRDY_SLEEP_DELAY_US,
            mrdy_sense_armed: false,
            start_message: false,
            end_message: false,
            received: None,
        };
        link.set_sen(false)?;

        while link.srdy_asserted()? {
            link.flags.clear_srdy_edge();
            link.wake.set_sense(SenseLine::Srdy, Sense::High);
            link.set_sen(true)?;
            link.wake.wait_for_event();
            link.wake.request_clock();
        }

        link.flags.set_sleeping(true);
        link.wakeup()?;
        info!("LINK: sync at {} Hz", rate.hz());
        Ok(link)
    }

    /// Start-up SRDY sleep delay. The host may change it later.
    pub fn with_srdy_sleep_delay_us(mut self, delay_us: u16) -> Self {
        self.srdy_delay_us = delay_us;
        self
    }

    pub fn bit_rate(&self) -> BitRate {
        self.rate
    }

    pub fn srdy_sleep_delay_us(&self) -> u16 {
        self.srdy_delay_us
    }

    pub fn spi(&self) -> &SPI {
        &self.spi
    }

    pub fn pins(&self) -> &SyncPins<SEN, MRDY, SRDY> {
        &self.pins
    }

    pub fn wake_control(&self) -> &W {
        &self.wake
    }

    fn mrdy_asserted(&mut self) -> Result<bool, LinkError> {
        self.pins.mrdy.is_low().map_err(|_| LinkError::Pin)
    }

    fn srdy_asserted(&mut self) -> Result<bool, LinkError> {
        self.pins.srdy.is_low().map_err(|_| LinkError::Pin)
    }

    fn set_sen(&mut self, asserted: bool) -> Result<(), LinkError> {
        let result = if asserted {
            self.pins.sen.set_low()
        } else {
            self.pins.sen.set_high()
        };
        result.map_err(|_| LinkError::Pin)
    }

    fn wakeup(&mut self) -> Result<(), LinkError> {
        if !self.flags.is_sleeping() {
            return Ok(());
        }
        self.flags.set_sleeping(false);

        if self.mrdy_sense_armed && self.srdy_asserted()? {
            self.set_sen(false)?;
            warn!("LINK: host reset pattern on wake");
            return Err(LinkError::ResetRequested);
        }

        self.mrdy_sense_armed = false;
        self.wake.set_sense(SenseLine::Mrdy, Sense::Disabled);
        self.wake.set_sense(SenseLine::Srdy, Sense::Disabled);
        self.wake.request_clock();
        self.spi.set_enabled(true);
        self.flags.clear_srdy_edge();
        Ok(())
    }

    /// Low-power wait for SRDY after the poll window expired.
    fn sleep_until_srdy(&mut self) -> Result<(), LinkError> {
        self.flags.set_sleeping(true);
        self.wake.set_sense(SenseLine::Srdy, Sense::Low);
        self.wake.release_clock();

        while !self.flags.take_srdy_edge() && !self.srdy_asserted()? {
            self.wake.wait_for_event();
        }

        self.wake.set_sense(SenseLine::Srdy, Sense::High);
        self.mrdy_sense_armed = !self.mrdy_asserted()?;
        if self.mrdy_sense_armed {
            self.wake.set_sense(SenseLine::Mrdy, Sense::Low);
        }

        while self.srdy_asserted()? {
            self.wake.wait_for_event();
            if self.mrdy_sense_armed && self.mrdy_asserted()? {
                self.set_sen(false)?;
                warn!("LINK: host reset pattern during SRDY wait");
                return Err(LinkError::ResetRequested);
            }
        }

        self.wakeup()
    }

    /// Wait until the host has pulsed SRDY for the next byte.
    fn wait_srdy(&mut self) -> Result<(), LinkError> {
        if self.start_message {
            self.start_message = false;
            self.flags.clear_srdy_edge();
            self.set_sen(true)?;
        }

        let mut latched = self.flags.take_srdy_edge();
        if !latched {
            let mut waited: u16 = 0;
            loop {
                latched |= self.flags.take_srdy_edge();
                if latched && !self.srdy_asserted()? {
                    break;
                }
                if !latched && waited >= self.srdy_delay_us {
                    self.sleep_until_srdy()?;
                    latched = true;
                    continue;
                }
                self.delay.delay_us(u32::from(SRDY_SLEEP_DELAY_STEP_US));
                waited = waited.saturating_add(SRDY_SLEEP_DELAY_STEP_US);
            }
        }

        if self.end_message {
            self.end_message = false;
            self.set_sen(false)?;
        }
        Ok(())
    }

    fn exchange(&mut self, byte: u8) -> Result<u8, LinkError> {
        self.wait_srdy()?;
        let mut buf = [byte];
        self.spi
            .transfer_in_place(&mut buf)
            .and_then(|()| self.spi.flush())
            .map_err(|_| LinkError::Bus)?;
        Ok(buf[0])
    }

    fn receive(&mut self) -> Result<(), LinkError> {
        self.start_message = true;
        self.exchange(MESG_RX_SYNC)?;

        let len = self.exchange(FILL_BYTE)?;
        if len == 0 || usize::from(len) > MESG_MAX_SIZE_VALUE {
            self.set_sen(false)?;
            debug!("LINK: rejected sync frame length {}", len);
            return Ok(());
        }

        // Message id followed by `len` data bytes.
        let mut body = [0u8; MESG_MAX_SIZE_VALUE + 1];
        let body = &mut body[..=usize::from(len)];
        for slot in body.iter_mut() {
            *slot = self.exchange(FILL_BYTE)?;
        }
        self.end_message = true;
        let checksum = self.exchange(FILL_BYTE)?;

        if xor_checksum(MESG_RX_SYNC ^ len, body) ^ checksum == 0 {
            self.received = Message::new(body[0], &body[1..]);
            self.hold_rx();
        } else {
            debug!("LINK: sync frame checksum mismatch");
        }
        Ok(())
    }

    fn send_frame(&mut self, msg: &Message) -> Result<(), LinkError> {
        self.start_message = true;
        self.exchange(MESG_TX_SYNC)?;
        self.exchange(msg.len() as u8)?;
        self.exchange(msg.id())?;
        for &b in msg.data() {
            self.exchange(b)?;
        }
        self.end_message = true;
        self.exchange(msg.checksum(MESG_TX_SYNC))?;
        Ok(())
    }
}

impl<SPI, SEN, MRDY, SRDY, D, W> SerialLink for SyncLink<'_, SPI, SEN, MRDY, SRDY, D, W>
where
    SPI: SpiBus<u8> + BusClock,
    SEN: OutputPin,
    MRDY: InputPin,
    SRDY: InputPin,
    D: DelayNs,
    W: WakeControl,
{
    fn mode(&self) -> SerialMode {
        SerialMode::Synchronous
    }

    fn poll_rx(&mut self) -> Result<bool, LinkError> {
        if !self.flags.is_held() && self.mrdy_asserted()? {
            self.wakeup()?;
            self.receive()?;
        }
        Ok(true)
    }

    fn take_frame(&mut self) -> Option<Message> {
        self.received.take()
    }

    fn transmit(&mut self, msg: &Message) -> Result<(), LinkError> {
        if msg.is_empty() {
            return self.set_sen(false);
        }
        self.wakeup()?;
        self.flags.set_transmitting(true);
        let result = self.send_frame(msg);
        self.flags.set_transmitting(false);
        result
    }

    fn idle(&mut self) -> Result<(), LinkError> {
        self.set_sen(false)
    }

    fn hold_rx(&mut self) {
        self.flags.set_hold(true);
    }

    fn release_rx(&mut self) {
        self.flags.set_hold(false);
    }

    fn is_held(&self) -> bool {
        self.flags.is_held()
    }

    fn sleep(&mut self) -> Result<(), LinkError> {
        self.flags.set_sleeping(true);
        self.wake.release_clock();
        self.flags.clear_srdy_edge();
        self.spi.set_enabled(false);
        if !self.flags.is_held() {
            self.wake.set_sense(SenseLine::Mrdy, Sense::Low);
            self.mrdy_sense_armed = true;
        }
        Ok(())
    }

    fn request_baud_rate(&mut self, _index: u8) -> ResponseCode {
        ResponseCode::INVALID_MESSAGE
    }

    fn baud_change_pending(&self) -> bool {
        false
    }

    fn apply_pending_baud_rate(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn set_bit_rate(&mut self, index: u8) -> ResponseCode {
        match BitRate::from_index(index) {
            Some(rate) => {
                self.spi.set_frequency(rate.hz());
                self.rate = rate;
                ResponseCode::NO_ERROR
            }
            None => ResponseCode::INVALID_PARAMETER_PROVIDED,
        }
    }

    fn set_srdy_sleep_delay(&mut self, delay: u8) -> ResponseCode {
        self.srdy_delay_us = u16::from(delay) * SRDY_SLEEP_DELAY_STEP_US;
        ResponseCode::NO_ERROR
    }
}
