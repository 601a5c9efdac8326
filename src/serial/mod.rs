//! Host serial link.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SerialLink                            │
//! │                                                              │
//! │   mode-select line ── low ──▶ AsyncLink  (UART + RTS)        │
//! │                    └─ high ─▶ SyncLink   (SPI + MRDY/SRDY)   │
//! │                                                              │
//! │   poll_rx ─▶ take_frame ─▶ dispatch ─▶ release_rx            │
//! │   transmit ◀─ event buffer / responses                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reception is single-slot: once a frame completes, the link holds further
//! reception until the dispatcher calls [`SerialLink::release_rx`]. Control
//! flags shared with interrupt handlers live in [`LinkFlags`], one atomic per
//! flag.

pub mod async_link;
pub mod sync_link;

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::InputPin;
use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::proto::ids::ResponseCode;
use crate::proto::wire::Message;

pub use async_link::{AsyncLink, AsyncReceiver, UartPort};
pub use sync_link::{BusClock, SyncLink, SyncPins};

// ───────────────────────────────────────────────────────────────
// Rates
// ───────────────────────────────────────────────────────────────

/// Asynchronous baud rates, indexed as the host selects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BaudRate {
    B1200 = 0,
    B2400 = 1,
    B4800 = 2,
    B9600 = 3,
    B19200 = 4,
    B38400 = 5,
    // Index 6 is reserved.
    B57600 = 7,
    B115200 = 8,
    B230400 = 9,
    B460800 = 10,
    B921600 = 11,
}

/// Bit `i` set when baud index `i` is selectable.
pub const BAUD_RATE_SUPPORTED: u16 = 0x0FBF;

impl BaudRate {
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Self::B1200,
            1 => Self::B2400,
            2 => Self::B4800,
            3 => Self::B9600,
            4 => Self::B19200,
            5 => Self::B38400,
            7 => Self::B57600,
            8 => Self::B115200,
            9 => Self::B230400,
            10 => Self::B460800,
            11 => Self::B921600,
            _ => return None,
        })
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Boot-time rate from the three baud straps, read as
    /// `br1 | br2 << 1 | br3 << 2`. `None` for the reserved index.
    pub fn sense_strap<B1, B2, B3>(
        br1: &mut B1,
        br2: &mut B2,
        br3: &mut B3,
    ) -> Result<Option<Self>, LinkError>
    where
        B1: InputPin,
        B2: InputPin,
        B3: InputPin,
    {
        let index = strap_bit(br1, 0x01)? | strap_bit(br2, 0x02)? | strap_bit(br3, 0x04)?;
        Ok(Self::from_index(index))
    }

    pub fn bits_per_second(self) -> u32 {
        match self {
            Self::B1200 => 1_200,
            Self::B2400 => 2_400,
            Self::B4800 => 4_800,
            Self::B9600 => 9_600,
            Self::B19200 => 19_200,
            Self::B38400 => 38_400,
            Self::B57600 => 57_600,
            Self::B115200 => 115_200,
            Self::B230400 => 230_400,
            Self::B460800 => 460_800,
            Self::B921600 => 921_600,
        }
    }
}

fn strap_bit<P: InputPin>(pin: &mut P, weight: u8) -> Result<u8, LinkError> {
    Ok(if pin.is_high().map_err(|_| LinkError::Pin)? { weight } else { 0 })
}

/// Synchronous serial clock rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BitRate {
    K500 = 0,
    M1 = 1,
    M2 = 2,
    M4 = 3,
    M8 = 4,
}

/// Bit `i` set when bit-rate index `i` is selectable.
pub const BIT_RATE_SUPPORTED: u8 = 0x1F;

impl BitRate {
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Self::K500,
            1 => Self::M1,
            2 => Self::M2,
            3 => Self::M4,
            4 => Self::M8,
            _ => return None,
        })
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn hz(self) -> u32 {
        match self {
            Self::K500 => 500_000,
            Self::M1 => 1_000_000,
            Self::M2 => 2_000_000,
            Self::M4 => 4_000_000,
            Self::M8 => 8_000_000,
        }
    }

    /// Boot-time clock from the rate strap: high picks 4 MHz, low 500 kHz.
    pub fn sense_strap<P: InputPin>(pin: &mut P) -> Result<Self, LinkError> {
        if pin.is_high().map_err(|_| LinkError::Pin)? {
            Ok(Self::M4)
        } else {
            Ok(Self::K500)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Mode selection
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialMode {
    Asynchronous,
    Synchronous,
}

impl SerialMode {
    /// Read the mode-select line once at boot: high selects the synchronous link.
    pub fn sense<P: InputPin>(pin: &mut P) -> Result<Self, LinkError> {
        if pin.is_high().map_err(|_| LinkError::Pin)? {
            Ok(Self::Synchronous)
        } else {
            Ok(Self::Asynchronous)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Shared flags
// ───────────────────────────────────────────────────────────────

/// Link state shared between the main loop and serial interrupt handlers.
#[derive(Debug, Default)]
pub struct LinkFlags {
    hold: AtomicBool,
    sleeping: AtomicBool,
    transmitting: AtomicBool,
    baud_change_pending: AtomicBool,
    srdy_edge: AtomicBool,
}

impl LinkFlags {
    pub const fn new() -> Self {
        Self {
            hold: AtomicBool::new(false),
            sleeping: AtomicBool::new(false),
            transmitting: AtomicBool::new(false),
            baud_change_pending: AtomicBool::new(false),
            srdy_edge: AtomicBool::new(false),
        }
    }

    pub fn is_held(&self) -> bool {
        self.hold.load(Ordering::Acquire)
    }

    pub(crate) fn set_hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::Release);
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::Acquire)
    }

    pub(crate) fn set_sleeping(&self, sleeping: bool) {
        self.sleeping.store(sleeping, Ordering::Release);
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting.load(Ordering::Acquire)
    }

    pub(crate) fn set_transmitting(&self, transmitting: bool) {
        self.transmitting.store(transmitting, Ordering::Release);
    }

    pub fn baud_change_pending(&self) -> bool {
        self.baud_change_pending.load(Ordering::Acquire)
    }

    pub(crate) fn set_baud_change_pending(&self, pending: bool) {
        self.baud_change_pending.store(pending, Ordering::Release);
    }

    /// SRDY release edge, called from the GPIO interrupt handler.
    pub fn on_srdy_edge(&self) {
        self.srdy_edge.store(true, Ordering::Release);
    }

    pub(crate) fn take_srdy_edge(&self) -> bool {
        self.srdy_edge.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn clear_srdy_edge(&self) {
        self.srdy_edge.store(false, Ordering::Release);
    }
}

// ───────────────────────────────────────────────────────────────
// Power integration
// ───────────────────────────────────────────────────────────────

/// Lines whose level can wake the SoC from a low-power wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseLine {
    Mrdy,
    Srdy,
    Sleep,
    Suspend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Disabled,
    Low,
    High,
}

/// Low-power hooks the links use around sleep and handshake waits.
pub trait WakeControl {
    /// Block until an interrupt or an armed sense line fires.
    fn wait_for_event(&mut self);
    /// Arm or disarm level sensing on `line`.
    fn set_sense(&mut self, line: SenseLine, sense: Sense);
    /// Hold the high-frequency clock the serial peripheral needs.
    fn request_clock(&mut self);
    fn release_clock(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Link trait
// ───────────────────────────────────────────────────────────────

/// One physical host link, driven from the main loop.
pub trait SerialLink {
    fn mode(&self) -> SerialMode;

    /// Service the receive side. Returns `true` when the link may sleep.
    fn poll_rx(&mut self) -> Result<bool, LinkError>;

    /// Take the completed frame, if any. Reception stays held until
    /// [`release_rx`](Self::release_rx).
    fn take_frame(&mut self) -> Option<Message>;

    /// Send one frame, blocking until it is clocked out.
    fn transmit(&mut self, msg: &Message) -> Result<(), LinkError>;

    /// Called on loop passes with nothing to send.
    fn idle(&mut self) -> Result<(), LinkError>;

    /// Stop accepting frames.
    fn hold_rx(&mut self);

    /// Accept the next frame.
    fn release_rx(&mut self);

    fn is_held(&self) -> bool;

    /// Power the link down until the host wakes it.
    fn sleep(&mut self) -> Result<(), LinkError>;

    /// Stage a baud-rate change by table index.
    fn request_baud_rate(&mut self, index: u8) -> ResponseCode;

    fn baud_change_pending(&self) -> bool;

    /// Apply a staged baud-rate change once nothing is being transmitted.
    fn apply_pending_baud_rate(&mut self) -> Result<(), LinkError>;

    /// Change the synchronous clock by table index.
    fn set_bit_rate(&mut self, index: u8) -> ResponseCode;

    /// Change the SRDY wait before sleeping, in 10 µs units.
    fn set_srdy_sleep_delay(&mut self, delay: u8) -> ResponseCode;
}

/// Whichever link the mode-select line picked at boot.
pub enum SelectedLink<A, S> {
    Async(A),
    Sync(S),
}

macro_rules! delegate {
    ($self:ident, $link:ident => $call:expr) => {
        match $self {
            SelectedLink::Async($link) => $call,
            SelectedLink::Sync($link) => $call,
        }
    };
}

impl<A: SerialLink, S: SerialLink> SerialLink for SelectedLink<A, S> {
    fn mode(&self) -> SerialMode {
        delegate!(self, l => l.mode())
    }
    fn poll_rx(&mut self) -> Result<bool, LinkError> {
        delegate!(self, l => l.poll_rx())
    }
    fn take_frame(&mut self) -> Option<Message> {
        delegate!(self, l => l.take_frame())
    }
    fn transmit(&mut self, msg: &Message) -> Result<(), LinkError> {
        delegate!(self, l => l.transmit(msg))
    }
    fn idle(&mut self) -> Result<(), LinkError> {
        delegate!(self, l => l.idle())
    }
    fn hold_rx(&mut self) {
        delegate!(self, l => l.hold_rx());
    }
    fn release_rx(&mut self) {
        delegate!(self, l => l.release_rx());
    }
    fn is_held(&self) -> bool {
        delegate!(self, l => l.is_held())
    }
    fn sleep(&mut self) -> Result<(), LinkError> {
        delegate!(self, l => l.sleep())
    }
    fn request_baud_rate(&mut self, index: u8) -> ResponseCode {
        delegate!(self, l => l.request_baud_rate(index))
    }
    fn baud_change_pending(&self) -> bool {
        delegate!(self, l => l.baud_change_pending())
    }
    fn apply_pending_baud_rate(&mut self) -> Result<(), LinkError> {
        delegate!(self, l => l.apply_pending_baud_rate())
    }
    fn set_bit_rate(&mut self, index: u8) -> ResponseCode {
        delegate!(self, l => l.set_bit_rate(index))
    }
    fn set_srdy_sleep_delay(&mut self, delay: u8) -> ResponseCode {
        delegate!(self, l => l.set_srdy_sleep_delay(delay))
    }
}
