//! Wire formats: the host frame, the ring-buffer event record and the
//! little-endian field helpers.
//!
//! Frame layout:
//! ```text
//! ┌──────┬────────┬────┬─────────────────────┬──────────┐
//! │ sync │ length │ id │ data (length bytes) │ checksum │
//! └──────┴────────┴────┴─────────────────────┴──────────┘
//!            checksum = XOR(sync .. last data byte)
//! ```
//!
//! Event record layout (as stored in the event queue):
//! ```text
//! ┌─────────┬───────┬────────┬────┬─────────────────────┐
//! │ channel │ event │ length │ id │ data (length bytes) │
//! └─────────┴───────┴────────┴────┴─────────────────────┘
//! ```
//!
//! Every multi-byte field the host sees is little-endian and goes through
//! [`get_u16_le`] / [`put_u16_le`]; nothing else in the crate touches byte order.

use heapless::Vec;

use super::ids::{MESG_MAX_SIZE_VALUE, is_extended_id};

/// sync + length + id + checksum.
pub const FRAME_OVERHEAD: usize = 4;
/// Largest encoded frame.
pub const MAX_FRAME_SIZE: usize = MESG_MAX_SIZE_VALUE + FRAME_OVERHEAD;
/// channel + event ahead of the frame in the event queue.
pub const EVENT_HEADER_SIZE: usize = 2;
/// Largest encoded event record.
pub const MAX_EVENT_RECORD_SIZE: usize = EVENT_HEADER_SIZE + 2 + MESG_MAX_SIZE_VALUE;

// ───────────────────────────────────────────────────────────────
// Little-endian helpers
// ───────────────────────────────────────────────────────────────

/// Read a little-endian `u16` from the first two bytes; missing bytes read as 0.
pub fn get_u16_le(bytes: &[u8]) -> u16 {
    let lo = bytes.first().copied().unwrap_or(0);
    let hi = bytes.get(1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}

/// Read a little-endian `u32` from the first four bytes; missing bytes read as 0.
pub fn get_u32_le(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    for (dst, src) in raw.iter_mut().zip(bytes) {
        *dst = *src;
    }
    u32::from_le_bytes(raw)
}

/// Write `value` little-endian into the first two bytes of `out`.
pub fn put_u16_le(out: &mut [u8], value: u16) {
    for (dst, src) in out.iter_mut().zip(value.to_le_bytes()) {
        *dst = src;
    }
}

/// XOR of every byte in `bytes`, seeded with `seed`.
pub fn xor_checksum(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, b| acc ^ b)
}

// ───────────────────────────────────────────────────────────────
// Message
// ───────────────────────────────────────────────────────────────

/// One host message: id plus up to [`MESG_MAX_SIZE_VALUE`] data bytes.
///
/// An empty message (no data) stands for "nothing to send"; every message the
/// protocol defines carries at least one data byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    id: u8,
    data: Vec<u8, MESG_MAX_SIZE_VALUE>,
}

impl Message {
    pub const fn empty() -> Self {
        Self {
            id: 0,
            data: Vec::new(),
        }
    }

    /// Build a message from its id and raw data bytes.
    pub fn new(id: u8, data: &[u8]) -> Option<Self> {
        Some(Self {
            id,
            data: Vec::from_slice(data).ok()?,
        })
    }

    /// Build a channel-addressed message: `data = [channel, payload..]`.
    pub fn with_channel(id: u8, channel: u8, payload: &[u8]) -> Option<Self> {
        let mut msg = Self::new(id, &[channel])?;
        msg.data.extend_from_slice(payload).ok()?;
        Some(msg)
    }

    /// Build an extended-id message: `id = ext >> 8`, `data = [ext & 0xFF, payload..]`.
    pub fn extended(ext_id: u16, payload: &[u8]) -> Option<Self> {
        let [hi, lo] = ext_id.to_be_bytes();
        Self::with_channel(hi, lo, payload)
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// The frame length field.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// First data byte: channel number (plus burst sequence bits on burst data).
    pub fn channel(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    pub fn set_channel(&mut self, channel: u8) {
        if let Some(first) = self.data.first_mut() {
            *first = channel;
        }
    }

    /// First data byte of an extended message.
    pub fn sub_id(&self) -> u8 {
        self.channel()
    }

    /// `(id << 8) | sub_id` for extended messages.
    pub fn ext_id(&self) -> u16 {
        u16::from_be_bytes([self.id, self.sub_id()])
    }

    pub fn is_extended(&self) -> bool {
        is_extended_id(self.id)
    }

    /// Data after the channel (or sub-id) byte.
    pub fn payload(&self) -> &[u8] {
        self.data.get(1..).unwrap_or(&[])
    }

    /// Payload byte `index`, 0 when the host sent a shorter frame.
    pub fn payload_byte(&self, index: usize) -> u8 {
        self.payload().get(index).copied().unwrap_or(0)
    }

    /// Discard the contents; the message no longer transmits.
    pub fn clear(&mut self) {
        self.id = 0;
        self.data.clear();
    }

    /// Checksum of the framed message under `sync`.
    pub fn checksum(&self, sync: u8) -> u8 {
        xor_checksum(sync ^ self.data.len() as u8 ^ self.id, &self.data)
    }
}

/// Encode `msg` as a complete frame into `out`. Returns the frame length.
pub fn encode_frame(sync: u8, msg: &Message, out: &mut [u8]) -> Option<usize> {
    let total = msg.len() + FRAME_OVERHEAD;
    if total > out.len() {
        return None;
    }
    out[0] = sync;
    out[1] = msg.len() as u8;
    out[2] = msg.id();
    out[3..3 + msg.len()].copy_from_slice(msg.data());
    out[total - 1] = msg.checksum(sync);
    Some(total)
}

/// Decode one complete frame occupying all of `frame`.
///
/// Returns `None` on a wrong sync byte, an inconsistent or oversized length,
/// or a nonzero XOR.
pub fn decode_frame(sync: u8, frame: &[u8]) -> Option<Message> {
    if frame.len() < FRAME_OVERHEAD || frame[0] != sync {
        return None;
    }
    let len = frame[1] as usize;
    if len == 0 || len > MESG_MAX_SIZE_VALUE || frame.len() != len + FRAME_OVERHEAD {
        return None;
    }
    if xor_checksum(0, frame) != 0 {
        return None;
    }
    Message::new(frame[2], &frame[3..3 + len])
}

// ───────────────────────────────────────────────────────────────
// Event record
// ───────────────────────────────────────────────────────────────

/// A radio event (or a locally generated response) awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventRecord {
    pub channel: u8,
    pub event: u8,
    pub message: Message,
}

impl EventRecord {
    pub fn new(channel: u8, event: u8, message: Message) -> Self {
        Self {
            channel,
            event,
            message,
        }
    }

    /// Serialise into the queue layout. Returns the number of bytes written.
    pub fn encode(&self, out: &mut [u8; MAX_EVENT_RECORD_SIZE]) -> usize {
        let len = self.message.len();
        out[0] = self.channel;
        out[1] = self.event;
        out[2] = len as u8;
        out[3] = self.message.id();
        out[4..4 + len].copy_from_slice(self.message.data());
        4 + len
    }
}
