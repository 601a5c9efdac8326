//! Port traits: the boundary between the network-processor core and the
//! platform it runs on.
//!
//! ```text
//!   Radio stack / SoC services ──▶ Port trait ──▶ Dispatcher, Scheduler
//! ```
//!
//! The core consumes these through generics and never touches the radio
//! SoftDevice or power registers directly. Serial hardware has its own traits
//! in [`crate::serial`].

use crate::proto::ids::{MESG_CONFIG_ADV_BURST_REQ_CONFIG_SIZE, ResponseCode};
use crate::proto::wire::EventRecord;

// ───────────────────────────────────────────────────────────────
// Radio stack (driven adapter: dispatcher → radio)
// ───────────────────────────────────────────────────────────────

/// Channel identity as stored by the radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelId {
    pub device_number: u16,
    pub device_type: u8,
    pub transmission_type: u8,
}

/// Synchronous radio-stack calls. Each returns the stack's status byte.
///
/// Optional features default to [`ResponseCode::NOT_SUPPORTED`], which the
/// dispatcher reports to the host as an invalid message.
pub trait RadioPort {
    fn channel_assign(
        &mut self,
        channel: u8,
        channel_type: u8,
        network: u8,
        ext_assign: u8,
    ) -> ResponseCode;
    fn channel_unassign(&mut self, channel: u8) -> ResponseCode;
    fn channel_open(&mut self, channel: u8) -> ResponseCode;
    fn channel_open_with_offset(&mut self, channel: u8, offset: u16) -> ResponseCode;
    fn channel_close(&mut self, channel: u8) -> ResponseCode;
    fn channel_id_set(&mut self, channel: u8, id: ChannelId) -> ResponseCode;
    fn channel_id_get(&mut self, channel: u8) -> Result<ChannelId, ResponseCode>;
    fn channel_period_set(&mut self, channel: u8, period: u16) -> ResponseCode;
    fn channel_radio_freq_set(&mut self, channel: u8, freq: u8) -> ResponseCode;
    fn channel_search_timeout_set(&mut self, channel: u8, timeout: u8) -> ResponseCode;
    fn channel_radio_tx_power_set(&mut self, channel: u8, power: u8, custom: u8) -> ResponseCode;
    fn channel_status_get(&mut self, channel: u8) -> Result<u8, ResponseCode>;
    fn network_key_set(&mut self, network: u8, key: &[u8]) -> ResponseCode;

    /// Fill the 8-byte capabilities block.
    fn capabilities(&mut self) -> Result<[u8; 8], ResponseCode>;
    /// Radio stack version string, NUL padded.
    fn version(&mut self) -> Result<[u8; 11], ResponseCode>;

    fn broadcast_tx(&mut self, channel: u8, payload: &[u8]) -> ResponseCode;
    fn acknowledged_tx(&mut self, channel: u8, payload: &[u8]) -> ResponseCode;
    /// Hand one burst segment to the stack. `segment` carries the start/end flags.
    fn burst_tx(&mut self, channel: u8, payload: &[u8], segment: u8) -> ResponseCode;

    fn event_filter_set(&mut self, mask: u16) -> ResponseCode;
    fn event_filter_get(&mut self) -> Result<u16, ResponseCode>;

    fn channel_low_priority_search_timeout_set(
        &mut self,
        _channel: u8,
        _timeout: u8,
    ) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn search_waveform_set(&mut self, _channel: u8, _waveform: u16) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn prox_search_set(&mut self, _channel: u8, _threshold: u8, _custom: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn search_channel_priority_set(&mut self, _channel: u8, _priority: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn lib_config_set(&mut self, _flags: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn lib_config_clear(&mut self, _flags: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn rx_ext_mesgs_enable(&mut self, _enable: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn id_list_add(&mut self, _channel: u8, _entry: [u8; 4], _index: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn id_list_config(&mut self, _channel: u8, _size: u8, _exclude: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    fn rx_scan_mode_start(&mut self, _sync_packets_only: u8) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    /// Advanced burst configuration, as sent by the host after the selector
    /// byte.
    fn adv_burst_config_set(&mut self, _config: &[u8]) -> ResponseCode {
        ResponseCode::NOT_SUPPORTED
    }
    /// Selector 0 reads the capabilities, anything else the configuration.
    /// Only the first [`MESG_CONFIG_ADV_BURST_REQ_CAPABILITIES_SIZE`](crate::proto::ids::MESG_CONFIG_ADV_BURST_REQ_CAPABILITIES_SIZE) bytes
    /// are sent for a capabilities reply.
    fn adv_burst_config_get(
        &mut self,
        _selector: u8,
    ) -> Result<[u8; MESG_CONFIG_ADV_BURST_REQ_CONFIG_SIZE], ResponseCode> {
        Err(ResponseCode::NOT_SUPPORTED)
    }
}

// ───────────────────────────────────────────────────────────────
// Radio event source (interrupt context)
// ───────────────────────────────────────────────────────────────

/// Pulls the radio stack's pending events, one at a time.
pub trait RadioEventSource {
    fn next_event(&mut self) -> Option<EventRecord>;
}

// ───────────────────────────────────────────────────────────────
// System services
// ───────────────────────────────────────────────────────────────

/// Reset, sleep and identity services of the SoC.
pub trait SystemPort {
    /// Reset reason bits (`RESET_*`) for the startup message.
    fn reset_reason(&mut self) -> u8;

    /// Reset the system. On hardware this does not return.
    fn system_reset(&mut self);

    /// Arm deep sleep; taken on the next idle pass of the main loop.
    fn request_deep_sleep(&mut self);

    /// Enter deep sleep if previously requested.
    fn deep_sleep_if_requested(&mut self);

    /// Block until any interrupt is pending.
    fn wait_for_event(&mut self);

    /// Re-pend the radio event interrupt after a stall.
    fn resume_radio_events(&mut self);

    /// Factory serial number, little-endian.
    fn serial_number(&mut self) -> [u8; 4];
}

/// Free-running 32 768 Hz time base shared by every context.
///
/// `request`/`release` are reference counted by the platform: the timer keeps
/// running while any user holds a request.
pub trait TimerPort {
    fn now_ticks(&self) -> u32;
    fn request(&self);
    fn release(&self);
}
