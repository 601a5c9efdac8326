//! Burst segment sequencing.
//!
//! Each burst segment carries a 3-bit sequence field in the top of its
//! channel byte: two counter bits (`0x20`, `0x40`) and the last-segment flag
//! (`0x80`). The first segment uses counter 0; after that the counter runs
//! `1, 2, 3, 1, 2, 3, ...` so a continuation is never mistaken for a restart.
//!
//! The counter is global to the link, not per channel: host and device
//! serialise all burst traffic across the one serial connection.

use super::ids::{
    BURST_SEGMENT_CONTINUE, BURST_SEGMENT_END, BURST_SEGMENT_START, SEQUENCE_FIRST_MESSAGE,
    SEQUENCE_LAST_MESSAGE, SEQUENCE_NUMBER_INC, SEQUENCE_NUMBER_ROLLOVER,
};

/// Result of checking one segment's sequence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Segment is in order; `segment` carries the start/end flags.
    Accepted { segment: u8 },
    /// Out of order; the counter has been reset to expect a first segment.
    Mismatch,
}

/// Rolling burst sequence counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstSequence {
    expected: u8,
}

impl BurstSequence {
    pub const fn new() -> Self {
        Self { expected: 0 }
    }

    /// Counter bits expected on the next segment.
    pub fn expected(&self) -> u8 {
        self.expected
    }

    /// Forget any transfer in progress.
    pub fn reset(&mut self) {
        self.expected = SEQUENCE_FIRST_MESSAGE;
    }

    /// Validate the sequence bits (`channel_byte & 0xE0`) of one segment.
    pub fn check(&mut self, sequence: u8) -> SequenceCheck {
        // The last-segment flag does not take part in the comparison.
        let counter = sequence << 1;
        if self.expected << 1 != counter {
            self.reset();
            return SequenceCheck::Mismatch;
        }

        if counter == SEQUENCE_NUMBER_ROLLOVER << 1 {
            self.expected = SEQUENCE_NUMBER_INC;
        } else {
            self.expected += SEQUENCE_NUMBER_INC;
        }

        let mut segment = BURST_SEGMENT_CONTINUE;
        if counter == SEQUENCE_FIRST_MESSAGE {
            segment |= BURST_SEGMENT_START;
        }
        if sequence & SEQUENCE_LAST_MESSAGE != 0 {
            self.reset();
            segment |= BURST_SEGMENT_END;
        }
        SequenceCheck::Accepted { segment }
    }
}
