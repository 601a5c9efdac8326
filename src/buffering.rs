//! Event buffering policy.
//!
//! Radio events are accumulated in the [`MultiContextFifo`] and released to the
//! host in flushes. A flush starts when any of these holds after a `put`:
//!
//! - the record did not fit,
//! - the event is not bufferable under the configured class,
//! - the buffered byte count exceeds the size threshold,
//! - the time threshold has elapsed since the previous flush.
//!
//! ```text
//!   radio ISR ──put──▶ ┌──────────────┐ ──get (while flushing)──▶ main loop
//!   main loop ──put──▶ │ ring buffer  │
//!                      └──────────────┘
//! ```
//!
//! Once flushing, `get` keeps draining until the queue is empty, so records
//! pushed during a flush go out in the same flush.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, Ordering};

use log::warn;

use crate::app::ports::TimerPort;
use crate::fifo::MultiContextFifo;
use crate::proto::ids::{EVENT_CHANNEL_COLLISION, EVENT_RX_FAIL, EVENT_TX, MESG_MAX_SIZE_VALUE};
use crate::proto::wire::{EVENT_HEADER_SIZE, EventRecord, MAX_EVENT_RECORD_SIZE, Message};

/// Storage size of the event queue.
pub const EVENT_QUEUE_SIZE: usize = 0x200;

/// Only transmission-type events accumulate; everything else flushes.
pub const BUFFERING_CLASS_LOW_PRIORITY: u8 = 0x00;
/// Every event accumulates.
pub const BUFFERING_CLASS_ALL: u8 = 0x01;

/// Timer ticks per host time unit (10 ms at 32 768 Hz).
pub const TICKS_PER_TIME_UNIT: u32 = 328;

/// Buffering settings as exchanged with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferingSettings {
    pub class: u8,
    /// Bytes buffered before a flush is forced.
    pub size_threshold: u16,
    /// Maximum time between flushes, in 10 ms units. 0 disables the timer.
    pub time_threshold: u16,
}

/// Buffers radio events between the interrupt and thread contexts.
pub struct EventBuffer<T: TimerPort, const N: usize = EVENT_QUEUE_SIZE> {
    fifo: MultiContextFifo<N>,
    timer: T,
    flushing: AtomicBool,
    class: AtomicU8,
    size_threshold: AtomicU16,
    /// In timer ticks.
    time_threshold: AtomicU32,
    flush_time: AtomicU32,
}

impl<T: TimerPort, const N: usize> EventBuffer<T, N> {
    pub fn new(timer: T) -> Self {
        let now = timer.now_ticks();
        Self {
            fifo: MultiContextFifo::new(),
            timer,
            flushing: AtomicBool::new(false),
            class: AtomicU8::new(BUFFERING_CLASS_LOW_PRIORITY),
            size_threshold: AtomicU16::new(0),
            time_threshold: AtomicU32::new(0),
            flush_time: AtomicU32::new(now),
        }
    }

    /// Queue `record`. Returns `false` if it did not fit; a flush is then
    /// forced so the consumer starts draining.
    pub fn put(&self, record: &EventRecord) -> bool {
        let mut raw = [0u8; MAX_EVENT_RECORD_SIZE];
        let len = record.encode(&mut raw);
        let pushed = self.fifo.push(&raw[..len]);

        if !pushed
            || !self.is_bufferable(record.event)
            || self.fifo.len() > self.size_threshold.load(Ordering::Acquire) as usize
            || self.flush_timeout_expired()
        {
            self.flush();
        }
        pushed
    }

    /// Pop the next record while a flush is in progress.
    ///
    /// Must only be called from the consumer context.
    pub fn get(&self) -> Option<EventRecord> {
        if !self.flushing.swap(false, Ordering::AcqRel) {
            return None;
        }

        let mut header = [0u8; EVENT_HEADER_SIZE];
        if !self.fifo.pop(&mut header) {
            return None;
        }
        self.flushing.store(true, Ordering::Release);

        let mut len = [0u8; 1];
        if !self.fifo.pop(&mut len) {
            warn!("EVT: record truncated after header");
            return None;
        }
        let len = (len[0] as usize).min(MESG_MAX_SIZE_VALUE);
        let mut body = [0u8; MESG_MAX_SIZE_VALUE + 1];
        if !self.fifo.pop(&mut body[..=len]) {
            warn!("EVT: record shorter than its size byte ({})", len);
            return None;
        }

        let message = Message::new(body[0], &body[1..=len]).unwrap_or_default();
        Some(EventRecord::new(header[0], header[1], message))
    }

    /// Start (or extend) a flush.
    pub fn flush(&self) {
        self.flushing.store(true, Ordering::Release);
        self.flush_time.store(self.timer.now_ticks(), Ordering::Release);
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Apply host settings. The size threshold is clamped to the queue size
    /// and a flush always follows.
    pub fn configure(&self, settings: BufferingSettings) {
        let ticks = settings.time_threshold as u32 * TICKS_PER_TIME_UNIT;
        let previous = self.time_threshold.swap(ticks, Ordering::AcqRel);
        match (previous == 0, ticks == 0) {
            (true, false) => self.timer.request(),
            (false, true) => self.timer.release(),
            _ => {}
        }

        let size = (settings.size_threshold as usize).min(N) as u16;
        self.class.store(settings.class, Ordering::Release);
        self.size_threshold.store(size, Ordering::Release);

        log::info!(
            "EVT: buffering class={} size={} time={}",
            settings.class,
            size,
            settings.time_threshold
        );
        self.flush();
    }

    /// Current settings, time threshold converted back to 10 ms units.
    pub fn settings(&self) -> BufferingSettings {
        BufferingSettings {
            class: self.class.load(Ordering::Acquire),
            size_threshold: self.size_threshold.load(Ordering::Acquire),
            time_threshold: (self.time_threshold.load(Ordering::Acquire) / TICKS_PER_TIME_UNIT)
                as u16,
        }
    }

    fn is_bufferable(&self, event: u8) -> bool {
        match self.class.load(Ordering::Acquire) {
            BUFFERING_CLASS_LOW_PRIORITY => {
                matches!(event, EVENT_TX | EVENT_RX_FAIL | EVENT_CHANNEL_COLLISION)
            }
            BUFFERING_CLASS_ALL => true,
            _ => false,
        }
    }

    fn flush_timeout_expired(&self) -> bool {
        let threshold = self.time_threshold.load(Ordering::Acquire);
        if threshold == 0 {
            return false;
        }
        let elapsed = self
            .timer
            .now_ticks()
            .wrapping_sub(self.flush_time.load(Ordering::Acquire));
        elapsed >= threshold
    }
}
