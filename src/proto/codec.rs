//! Streaming frame decoder.
//!
//! ```text
//!   SeekSync ──sync──▶ Length ──1..=41──▶ Body (length+1 bytes) ──▶ Checksum
//!      ▲                  │                                            │
//!      └──── 0 / >41 ─────┘◀──────────── bad XOR / good frame ─────────┘
//! ```
//!
//! The decoder is fed one byte at a time from the receive interrupt of the
//! asynchronous link, and in bulk by the synchronous link once it has clocked
//! a frame in. A line error drops whatever was collected and re-examines the
//! offending byte as a potential sync marker.

use super::ids::MESG_MAX_SIZE_VALUE;
use super::wire::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    SeekSync,
    Length,
    /// `collected` counts the id byte plus data bytes seen so far.
    Body { len: u8, collected: u8 },
    Checksum { len: u8 },
}

/// Framing error reported by the UART alongside a received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineErrors {
    pub framing: bool,
    pub parity: bool,
    pub overrun: bool,
}

impl LineErrors {
    pub const NONE: Self = Self {
        framing: false,
        parity: false,
        overrun: false,
    };

    pub fn any(self) -> bool {
        self.framing || self.parity || self.overrun
    }
}

/// Byte-at-a-time frame decoder for one sync marker.
pub struct FrameDecoder {
    sync: u8,
    state: DecoderState,
    checksum: u8,
    id: u8,
    data: [u8; MESG_MAX_SIZE_VALUE],
}

impl FrameDecoder {
    pub const fn new(sync: u8) -> Self {
        Self {
            sync,
            state: DecoderState::SeekSync,
            checksum: 0,
            id: 0,
            data: [0; MESG_MAX_SIZE_VALUE],
        }
    }

    /// True while no partial frame is being collected.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::SeekSync
    }

    /// Drop any partial frame and seek the next sync marker.
    pub fn reset(&mut self) {
        self.state = DecoderState::SeekSync;
    }

    /// Feed one received byte, with the line status the UART reported for it.
    pub fn feed_byte_with_errors(&mut self, byte: u8, errors: LineErrors) -> Option<Message> {
        if errors.any() {
            self.reset();
        }
        self.feed_byte(byte)
    }

    /// Feed one byte. Returns the message once a frame with a zero XOR completes.
    pub fn feed_byte(&mut self, byte: u8) -> Option<Message> {
        match self.state {
            DecoderState::SeekSync => {
                if byte == self.sync {
                    self.checksum = byte;
                    self.state = DecoderState::Length;
                }
                None
            }
            DecoderState::Length => {
                if byte == 0 || byte as usize > MESG_MAX_SIZE_VALUE {
                    self.state = DecoderState::SeekSync;
                } else {
                    self.checksum ^= byte;
                    self.state = DecoderState::Body {
                        len: byte,
                        collected: 0,
                    };
                }
                None
            }
            DecoderState::Body { len, collected } => {
                self.checksum ^= byte;
                if collected == 0 {
                    self.id = byte;
                } else {
                    self.data[collected as usize - 1] = byte;
                }
                let collected = collected + 1;
                self.state = if collected > len {
                    DecoderState::Checksum { len }
                } else {
                    DecoderState::Body { len, collected }
                };
                None
            }
            DecoderState::Checksum { len } => {
                self.state = DecoderState::SeekSync;
                if self.checksum ^ byte == 0 {
                    Message::new(self.id, &self.data[..len as usize])
                } else {
                    None
                }
            }
        }
    }

    /// Feed a slice, returning the first complete message. Bytes after that
    /// frame are not consumed.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<Message> {
        bytes.iter().find_map(|&b| self.feed_byte(b))
    }
}
