//! Multi-producer, single-consumer byte ring buffer.
//!
//! Producers run at different interrupt priorities (and the thread context);
//! the consumer is the main loop. Every push and pop is all-or-nothing.
//!
//! ```text
//!        tail            head          push_head
//!         │               │                │
//!   ──────▼───────────────▼────────────────▼──────────
//!   free  │  committed    │  reserved,     │  free
//!         │  (readable)   │  being copied  │
//!   ──────────────────────────────────────────────────
//! ```
//!
//! A push reserves its span by advancing `push_head` inside a critical
//! section, copies with interrupts enabled, then commits. `head` only moves to
//! `push_head` once no reservation is still copying, so the consumer never sees
//! a half-written record. With nested interrupt contexts this is exactly the
//! rule "the producer holding the oldest reservation commits for everyone".
//!
//! One slot is always left empty: `N` bytes of storage hold `N - 1` bytes.

use core::cell::{Cell, UnsafeCell};

use critical_section::Mutex;

#[derive(Debug, Clone, Copy, Default)]
struct Indices {
    head: usize,
    tail: usize,
    push_head: usize,
    /// Reservations whose copy has not finished yet.
    in_flight: usize,
}

/// `a - b` modulo `size`.
const fn diff(a: usize, b: usize, size: usize) -> usize {
    if a >= b { a - b } else { size - b + a }
}

/// `a + b` modulo `size`.
const fn sum(a: usize, b: usize, size: usize) -> usize {
    if b < size - a { a + b } else { b - (size - a) }
}

/// Fixed-capacity ring buffer of `N` bytes.
pub struct MultiContextFifo<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    idx: Mutex<Cell<Indices>>,
}

// SAFETY: the byte storage is only written inside spans reserved under the
// index lock, and only read inside spans committed under it. Reserved spans
// never overlap each other or the committed region.
unsafe impl<const N: usize> Sync for MultiContextFifo<N> {}

impl<const N: usize> MultiContextFifo<N> {
    pub const fn new() -> Self {
        assert!(N >= 2, "ring buffer needs at least two bytes of storage");
        Self {
            buf: UnsafeCell::new([0; N]),
            idx: Mutex::new(Cell::new(Indices {
                head: 0,
                tail: 0,
                push_head: 0,
                in_flight: 0,
            })),
        }
    }

    /// Usable bytes when empty.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Committed bytes available to the consumer.
    pub fn len(&self) -> usize {
        let i = self.indices();
        diff(i.head, i.tail, N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes a push could reserve right now.
    pub fn free(&self) -> usize {
        let i = self.indices();
        N - diff(i.push_head, i.tail, N) - 1
    }

    /// Append `src` in full or not at all. Callable from any context.
    #[must_use]
    pub fn push(&self, src: &[u8]) -> bool {
        let Some(start) = self.reserve(src.len()) else {
            return false;
        };
        self.copy_in(start, src);
        self.commit();
        true
    }

    /// Remove exactly `dst.len()` bytes into `dst`, or nothing.
    ///
    /// Must only be called from the single consumer context.
    #[must_use]
    pub fn pop(&self, dst: &mut [u8]) -> bool {
        let i = self.indices();
        if dst.len() > diff(i.head, i.tail, N) {
            return false;
        }
        self.copy_out(i.tail, dst);
        critical_section::with(|cs| {
            let cell = self.idx.borrow(cs);
            let mut i = cell.get();
            i.tail = sum(i.tail, dst.len(), N);
            cell.set(i);
        });
        true
    }

    fn indices(&self) -> Indices {
        critical_section::with(|cs| self.idx.borrow(cs).get())
    }

    /// Claim `len` bytes at `push_head`. Returns the start offset.
    fn reserve(&self, len: usize) -> Option<usize> {
        critical_section::with(|cs| {
            let cell = self.idx.borrow(cs);
            let mut i = cell.get();
            let free = N - diff(i.push_head, i.tail, N) - 1;
            if len > free {
                return None;
            }
            let start = i.push_head;
            i.push_head = sum(start, len, N);
            i.in_flight += 1;
            cell.set(i);
            Some(start)
        })
    }

    /// Publish every finished reservation once the last copy completes.
    fn commit(&self) {
        critical_section::with(|cs| {
            let cell = self.idx.borrow(cs);
            let mut i = cell.get();
            i.in_flight -= 1;
            if i.in_flight == 0 {
                i.head = i.push_head;
            }
            cell.set(i);
        });
    }

    fn copy_in(&self, start: usize, src: &[u8]) {
        let first = src.len().min(N - start);
        let base = self.buf.get().cast::<u8>();
        // SAFETY: [start, start + len) modulo N was reserved by this caller and
        // is disjoint from every other reservation and from the readable span.
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), base.add(start), first);
            core::ptr::copy_nonoverlapping(src.as_ptr().add(first), base, src.len() - first);
        }
    }

    fn copy_out(&self, start: usize, dst: &mut [u8]) {
        let len = dst.len();
        let first = len.min(N - start);
        let base = self.buf.get().cast::<u8>().cast_const();
        // SAFETY: the span lies inside the committed region, which producers
        // do not touch until the consumer advances `tail` past it.
        unsafe {
            core::ptr::copy_nonoverlapping(base.add(start), dst.as_mut_ptr(), first);
            core::ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), len - first);
        }
    }
}

impl<const N: usize> Default for MultiContextFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
