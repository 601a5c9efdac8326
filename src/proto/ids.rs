//! Host protocol identifiers: message ids, response/event codes and the
//! bit fields that ride inside message bytes.
//!
//! Message ids partition into four namespaces:
//!
//! ```text
//!  0x4E..0x5F, 0x72   data       broadcast / acknowledged / burst
//!  0x4D               request    answered with a full reply frame
//!  everything else    command    answered with a response event (0x40)
//!  0xE0..=0xFF        extended   two-byte id, sub-id in the first data byte
//! ```

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Framing
// ───────────────────────────────────────────────────────────────

/// Sync byte of every device→host frame and of async host→device frames.
pub const MESG_TX_SYNC: u8 = 0xA4;
/// Sync byte of host→device frames on the synchronous link.
pub const MESG_RX_SYNC: u8 = 0xA5;
/// Largest value accepted in the frame length field.
pub const MESG_MAX_SIZE_VALUE: usize = 41;

/// Size of the 4-byte ANT channel id carried by extended data messages.
pub const ANT_ID_SIZE: usize = 4;

// ───────────────────────────────────────────────────────────────
// Data messages
// ───────────────────────────────────────────────────────────────

pub const MESG_BROADCAST_DATA_ID: u8 = 0x4E;
pub const MESG_ACKNOWLEDGED_DATA_ID: u8 = 0x4F;
pub const MESG_BURST_DATA_ID: u8 = 0x50;
pub const MESG_EXT_BROADCAST_DATA_ID: u8 = 0x5D;
pub const MESG_EXT_ACKNOWLEDGED_DATA_ID: u8 = 0x5E;
pub const MESG_EXT_BURST_DATA_ID: u8 = 0x5F;
pub const MESG_ADV_BURST_DATA_ID: u8 = 0x72;

// ───────────────────────────────────────────────────────────────
// Configuration, control and notification messages
// ───────────────────────────────────────────────────────────────

pub const MESG_VERSION_ID: u8 = 0x3E;
pub const MESG_RESPONSE_EVENT_ID: u8 = 0x40;
pub const MESG_UNASSIGN_CHANNEL_ID: u8 = 0x41;
pub const MESG_ASSIGN_CHANNEL_ID: u8 = 0x42;
pub const MESG_CHANNEL_MESG_PERIOD_ID: u8 = 0x43;
pub const MESG_CHANNEL_SEARCH_TIMEOUT_ID: u8 = 0x44;
pub const MESG_CHANNEL_RADIO_FREQ_ID: u8 = 0x45;
pub const MESG_NETWORK_KEY_ID: u8 = 0x46;
pub const MESG_RADIO_TX_POWER_ID: u8 = 0x47;
pub const MESG_SEARCH_WAVEFORM_ID: u8 = 0x49;
pub const MESG_SYSTEM_RESET_ID: u8 = 0x4A;
pub const MESG_OPEN_CHANNEL_ID: u8 = 0x4B;
pub const MESG_CLOSE_CHANNEL_ID: u8 = 0x4C;
pub const MESG_REQUEST_ID: u8 = 0x4D;
pub const MESG_CHANNEL_ID_ID: u8 = 0x51;
pub const MESG_CHANNEL_STATUS_ID: u8 = 0x52;
pub const MESG_CAPABILITIES_ID: u8 = 0x54;
pub const MESG_ID_LIST_ADD_ID: u8 = 0x59;
pub const MESG_ID_LIST_CONFIG_ID: u8 = 0x5A;
pub const MESG_OPEN_RX_SCAN_ID: u8 = 0x5B;
pub const MESG_CHANNEL_RADIO_TX_POWER_ID: u8 = 0x60;
pub const MESG_GET_SERIAL_NUM_ID: u8 = 0x61;
pub const MESG_SET_LP_SEARCH_TIMEOUT_ID: u8 = 0x63;
pub const MESG_SERIAL_NUM_SET_CHANNEL_ID_ID: u8 = 0x65;
pub const MESG_RX_EXT_MESGS_ENABLE_ID: u8 = 0x66;
pub const MESG_ANTLIB_CONFIG_ID: u8 = 0x6E;
pub const MESG_STARTUP_MESG_ID: u8 = 0x6F;
pub const MESG_PROX_SEARCH_CONFIG_ID: u8 = 0x71;
pub const MESG_EVENT_BUFFERING_CONFIG_ID: u8 = 0x74;
pub const MESG_SET_SEARCH_CH_PRIORITY_ID: u8 = 0x75;
pub const MESG_CONFIG_ADV_BURST_ID: u8 = 0x78;
pub const MESG_EVENT_FILTER_CONFIG_ID: u8 = 0x79;
pub const MESG_UNLOCK_INTERFACE_ID: u8 = 0xAD;
pub const MESG_SLEEP_ID: u8 = 0xC5;

// Frame lengths the dispatcher checks or produces.
pub const MESG_CHANNEL_NUM_SIZE: usize = 1;
pub const MESG_ASSIGN_CHANNEL_SIZE: usize = 3;
pub const MESG_OPEN_CHANNEL_WITH_OFFSET_SIZE: usize = 3;
pub const MESG_OPEN_RX_SCAN_SIZE: usize = 2;
pub const MESG_RESPONSE_EVENT_SIZE: usize = 3;
pub const MESG_EXT_RESPONSE_SIZE: usize = 4;
pub const MESG_CAPABILITIES_SIZE: usize = 8;
pub const MESG_VERSION_SIZE: usize = 11;
pub const MESG_SERIAL_NUM_SIZE: usize = 4;
/// Advanced burst request with a nonzero selector: current configuration.
pub const MESG_CONFIG_ADV_BURST_REQ_CONFIG_SIZE: usize = 12;
/// Advanced burst request with selector 0: supported capabilities.
pub const MESG_CONFIG_ADV_BURST_REQ_CAPABILITIES_SIZE: usize = 5;

// ───────────────────────────────────────────────────────────────
// Extended (two-byte) ids
// ───────────────────────────────────────────────────────────────

/// High bits shared by every extended message id.
pub const MSG_EXT_ID_MASK: u8 = 0xE0;
pub const MESG_EXT_ID_0: u8 = 0xE0;
pub const MESG_EXT_ID_1: u8 = 0xE1;
pub const MESG_EXT_ID_2: u8 = 0xE2;
pub const MESG_EXT_ID_3: u8 = 0xE3;
pub const MESG_EXT_ID_4: u8 = 0xE4;

pub const MESG_EXT_RESPONSE_ID: u16 = 0xE000;
pub const MESG_EXT_REQUEST_ID: u16 = 0xE001;
pub const MESG_SET_SYNC_SERIAL_BIT_RATE_ID: u16 = 0xE100;
pub const MESG_SET_SYNC_SERIAL_SRDY_SLEEP_ID: u16 = 0xE101;
pub const MESG_SET_ASYNC_BAUDRATE_ID: u16 = 0xE102;

/// True when `id` lies in the extended range.
pub const fn is_extended_id(id: u8) -> bool {
    id & MSG_EXT_ID_MASK == MSG_EXT_ID_MASK
}

// ───────────────────────────────────────────────────────────────
// Burst sequencing (upper bits of the channel byte)
// ───────────────────────────────────────────────────────────────

pub const CHANNEL_NUMBER_MASK: u8 = 0x1F;
pub const SEQUENCE_NUMBER_MASK: u8 = 0xE0;
pub const SEQUENCE_NUMBER_INC: u8 = 0x20;
pub const SEQUENCE_NUMBER_ROLLOVER: u8 = 0x60;
pub const SEQUENCE_FIRST_MESSAGE: u8 = 0x00;
pub const SEQUENCE_LAST_MESSAGE: u8 = 0x80;

pub const BURST_SEGMENT_CONTINUE: u8 = 0x00;
pub const BURST_SEGMENT_START: u8 = 0x01;
pub const BURST_SEGMENT_END: u8 = 0x02;

// ───────────────────────────────────────────────────────────────
// Channel events
// ───────────────────────────────────────────────────────────────

pub const NO_EVENT: u8 = 0x00;
pub const EVENT_RX_SEARCH_TIMEOUT: u8 = 0x01;
pub const EVENT_RX_FAIL: u8 = 0x02;
pub const EVENT_TX: u8 = 0x03;
pub const EVENT_TRANSFER_RX_FAILED: u8 = 0x04;
pub const EVENT_TRANSFER_TX_COMPLETED: u8 = 0x05;
pub const EVENT_TRANSFER_TX_FAILED: u8 = 0x06;
pub const EVENT_CHANNEL_CLOSED: u8 = 0x07;
pub const EVENT_RX_FAIL_GO_TO_SEARCH: u8 = 0x08;
pub const EVENT_CHANNEL_COLLISION: u8 = 0x09;
pub const EVENT_TRANSFER_TX_START: u8 = 0x0A;
pub const EVENT_TRANSFER_NEXT_DATA_BLOCK: u8 = 0x11;
pub const EVENT_QUE_OVERFLOW: u8 = 0x35;

/// Event-filter bit for `event` (bit `event - 1`); `NO_EVENT` has none.
pub const fn event_filter_bit(event: u8) -> u16 {
    if event == NO_EVENT || event > 16 {
        0
    } else {
        1 << (event - 1)
    }
}

/// Events the radio stack must never drop; the dispatcher filters them itself.
pub const EVENT_FILTER_PROHIBITED: u16 =
    event_filter_bit(EVENT_TRANSFER_TX_COMPLETED) | event_filter_bit(EVENT_TRANSFER_TX_FAILED);

// ───────────────────────────────────────────────────────────────
// Capabilities, lib config and startup bits
// ───────────────────────────────────────────────────────────────

/// Byte 3 of the capabilities reply (advanced options).
pub const CAPABILITIES_SERIAL_NUMBER_ENABLED: u8 = 0x08;
/// Byte 6 of the capabilities reply (advanced options 3).
pub const CAPABILITIES_EVENT_BUFFERING_ENABLED: u8 = 0x02;

pub const ANT_LIB_CONFIG_MASK_ALL: u8 = 0xFF;
pub const ANT_LIB_CONFIG_RADIO_CONFIG_ALWAYS: u8 = 0x01;

pub const RESET_POR: u8 = 0x00;
pub const RESET_RST: u8 = 0x01;
pub const RESET_WDT: u8 = 0x02;
pub const RESET_CMD: u8 = 0x20;
pub const RESET_SYNC: u8 = 0x40;
pub const RESET_SUSPEND: u8 = 0x80;

/// Number of network keys the radio stack holds.
pub const MAX_NETWORKS: u8 = 8;

// ───────────────────────────────────────────────────────────────
// Response codes
// ───────────────────────────────────────────────────────────────

/// Status byte returned by the radio stack and reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseCode(pub u8);

impl ResponseCode {
    pub const NO_ERROR: Self = Self(0x00);
    /// Platform error code for an unimplemented call.
    pub const NOT_SUPPORTED: Self = Self(0x06);
    pub const CHANNEL_IN_WRONG_STATE: Self = Self(0x15);
    pub const TRANSFER_IN_PROGRESS: Self = Self(0x1F);
    pub const TRANSFER_SEQUENCE_NUMBER_ERROR: Self = Self(0x20);
    pub const INVALID_MESSAGE: Self = Self(0x28);
    pub const INVALID_PARAMETER_PROVIDED: Self = Self(0x33);
    /// Marks a command whose reply (if any) is produced elsewhere.
    pub const NO_RESPONSE_MESSAGE: Self = Self(0x50);
    pub const RETURN_TO_MFG: Self = Self(0x60);

    pub const fn is_ok(self) -> bool {
        self.0 == Self::NO_ERROR.0
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NO_ERROR => write!(f, "no error"),
            Self::NOT_SUPPORTED => write!(f, "not supported"),
            Self::CHANNEL_IN_WRONG_STATE => write!(f, "channel in wrong state"),
            Self::TRANSFER_IN_PROGRESS => write!(f, "transfer in progress"),
            Self::TRANSFER_SEQUENCE_NUMBER_ERROR => write!(f, "transfer sequence number error"),
            Self::INVALID_MESSAGE => write!(f, "invalid message"),
            Self::INVALID_PARAMETER_PROVIDED => write!(f, "invalid parameter"),
            Self::NO_RESPONSE_MESSAGE => write!(f, "no response"),
            Self::RETURN_TO_MFG => write!(f, "return to manufacturer"),
            Self(other) => write!(f, "code {other:#04x}"),
        }
    }
}
