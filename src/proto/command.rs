//! Host command dispatch and burst reassembly.
//!
//! [`CommandProcessor::process`] takes one received host message and turns it
//! into radio-stack calls plus (usually) a reply frame:
//!
//! ```text
//!   rx message ──▶ interface lock ──▶ channel gate ──▶ handler ──▶ finish
//!                                                        │            │
//!                               burst data ◀─────────────┘     response event,
//!                          (Dispatch::Burst, hold kept)        reply or nothing
//! ```
//!
//! Every path except a queued burst ends in [`SerialLink::release_rx`], so the
//! host may send its next frame.

use log::{debug, info, warn};

use super::burst::{BurstSequence, SequenceCheck};
use super::ids::*;
use super::wire::{EventRecord, Message, get_u16_le, put_u16_le};
use crate::app::ports::{ChannelId, RadioPort, SystemPort, TimerPort};
use crate::buffering::{BufferingSettings, EventBuffer};
use crate::serial::{BAUD_RATE_SUPPORTED, BIT_RATE_SUPPORTED, SerialLink};

/// Length of the application version string reported for version requests.
pub const APP_VERSION_SIZE: usize = MESG_VERSION_SIZE;

const CAPABILITIES_ADV_OPTIONS_INDEX: usize = 3;
const CAPABILITIES_ADV_OPTIONS3_INDEX: usize = 6;

/// What the scheduler does next with a processed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Reception was released. Queue the frame unless it is empty.
    Respond(Message),
    /// Burst data: keep the message and hand it to
    /// [`CommandProcessor::process_burst`] once no response is pending.
    Burst,
}

/// Outcome of handing one burst segment to the radio stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurstOutcome {
    /// Segment queued; reception stays held until the radio reports progress
    /// on `channel`.
    Queued { channel: u8 },
    /// Segment rejected. Reception was released.
    Respond(Message),
}

/// Everything a command may touch besides the processor's own state.
pub struct CommandContext<'a, R, L, S, T: TimerPort, const N: usize> {
    pub radio: &'a mut R,
    pub link: &'a mut L,
    pub system: &'a mut S,
    pub events: &'a EventBuffer<T, N>,
}

/// Correlation of a command with its response.
#[derive(Debug, Clone, Copy)]
struct CommandResponse {
    channel: u8,
    id: u8,
    sub_id: u8,
    code: ResponseCode,
    extended: bool,
}

impl CommandResponse {
    fn for_message(rx: &Message) -> Self {
        Self {
            channel: rx.channel() & CHANNEL_NUMBER_MASK,
            id: rx.id(),
            sub_id: 0,
            code: ResponseCode::NO_ERROR,
            extended: false,
        }
    }
}

pub struct CommandProcessor {
    burst: BurstSequence,
    queued_burst_channel: Option<u8>,
    /// Events filtered here rather than by the radio stack.
    event_filter_mask: u16,
    max_channels: u8,
    #[cfg(feature = "interface-lock")]
    interface_lock: bool,
    app_version: [u8; APP_VERSION_SIZE],
}

impl CommandProcessor {
    pub fn new(max_channels: u8, app_version: [u8; APP_VERSION_SIZE]) -> Self {
        Self {
            burst: BurstSequence::new(),
            queued_burst_channel: None,
            event_filter_mask: 0,
            max_channels,
            #[cfg(feature = "interface-lock")]
            interface_lock: false,
            app_version,
        }
    }

    pub fn max_channels(&self) -> u8 {
        self.max_channels
    }

    /// Channel whose queued burst segment still holds reception.
    pub fn queued_burst_channel(&self) -> Option<u8> {
        self.queued_burst_channel
    }

    pub fn burst_sequence(&self) -> &BurstSequence {
        &self.burst
    }

    /// Engage or release the manufacturing lock. While engaged every command
    /// but unlock answers `RETURN_TO_MFG`.
    #[cfg(feature = "interface-lock")]
    pub fn set_interface_lock(&mut self, locked: bool) {
        self.interface_lock = locked;
    }

    #[cfg(feature = "interface-lock")]
    pub fn is_interface_locked(&self) -> bool {
        self.interface_lock
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Handle one host message.
    pub fn process<R, L, S, T, const N: usize>(
        &mut self,
        rx: &Message,
        ctx: &mut CommandContext<'_, R, L, S, T, N>,
    ) -> Dispatch
    where
        R: RadioPort,
        L: SerialLink,
        S: SystemPort,
        T: TimerPort,
    {
        let mut resp = CommandResponse::for_message(rx);
        let mut tx = Message::empty();

        #[cfg(feature = "interface-lock")]
        if self.interface_lock {
            if rx.id() == MESG_UNLOCK_INTERFACE_ID {
                self.interface_lock = false;
                info!("CMD: interface unlocked");
            } else {
                resp.code = ResponseCode::RETURN_TO_MFG;
            }
            return Dispatch::Respond(Self::finish(resp, tx, ctx.link));
        }

        let id = rx.id();
        let gate_open = resp.channel < self.max_channels
            || (MAX_NETWORKS > self.max_channels && id == MESG_NETWORK_KEY_ID)
            || is_extended_id(id);

        if !gate_open {
            resp.code = ResponseCode::INVALID_MESSAGE;
        } else {
            match id {
                MESG_EXT_BURST_DATA_ID => {
                    if rx.channel() & SEQUENCE_NUMBER_ROLLOVER == SEQUENCE_FIRST_MESSAGE {
                        resp.code = ctx
                            .radio
                            .channel_id_set(resp.channel, channel_id_from(rx.payload()));
                    }
                    if resp.code.is_ok() {
                        return Dispatch::Burst;
                    }
                }
                MESG_BURST_DATA_ID | MESG_ADV_BURST_DATA_ID => return Dispatch::Burst,
                MESG_BROADCAST_DATA_ID
                | MESG_ACKNOWLEDGED_DATA_ID
                | MESG_EXT_BROADCAST_DATA_ID
                | MESG_EXT_ACKNOWLEDGED_DATA_ID => {
                    resp.code = Self::data(rx, resp.channel, ctx.radio);
                }
                MESG_REQUEST_ID => {
                    tx = self.request(rx, &mut resp, ctx);
                }
                id if is_extended_id(id) => {
                    tx = Self::extended(rx, &mut resp, ctx.link);
                }
                _ => {
                    resp.code = self.command(rx, resp.channel, ctx);
                }
            }
        }

        if resp.code == ResponseCode::NOT_SUPPORTED {
            resp.code = ResponseCode::INVALID_MESSAGE;
        }
        debug!("CMD[{:#04x}] ch={} -> {}", resp.id, resp.channel, resp.code);
        Dispatch::Respond(Self::finish(resp, tx, ctx.link))
    }

    /// Hand a burst segment held by [`Dispatch::Burst`] to the radio stack.
    pub fn process_burst<R, L, S, T, const N: usize>(
        &mut self,
        rx: &Message,
        ctx: &mut CommandContext<'_, R, L, S, T, N>,
    ) -> BurstOutcome
    where
        R: RadioPort,
        L: SerialLink,
        S: SystemPort,
        T: TimerPort,
    {
        let mut resp = CommandResponse::for_message(rx);
        let sequence = rx.channel() & SEQUENCE_NUMBER_MASK;

        resp.code = match self.burst.check(sequence) {
            SequenceCheck::Mismatch => {
                warn!(
                    "CMD[burst] ch={} sequence {:#04x} out of order",
                    resp.channel, sequence
                );
                ResponseCode::TRANSFER_SEQUENCE_NUMBER_ERROR
            }
            SequenceCheck::Accepted { segment } => {
                let payload = if rx.id() == MESG_EXT_BURST_DATA_ID {
                    rx.payload().get(ANT_ID_SIZE..).unwrap_or(&[])
                } else {
                    rx.payload()
                };
                let code = ctx.radio.burst_tx(resp.channel, payload, segment);
                if code.is_ok() {
                    self.queued_burst_channel = Some(resp.channel);
                    return BurstOutcome::Queued {
                        channel: resp.channel,
                    };
                }
                self.burst.reset();
                code
            }
        };

        BurstOutcome::Respond(Self::finish(resp, Message::empty(), ctx.link))
    }

    // ── Radio events ──────────────────────────────────────────

    /// Inspect a radio event before it goes to the host.
    ///
    /// Releases reception held by a queued burst once the radio has taken the
    /// segment, and blanks `NEXT_DATA_BLOCK` events, which the host never sees.
    pub fn on_radio_event(&mut self, record: &mut EventRecord, link: &mut impl SerialLink) {
        let event = record.event;
        if !matches!(
            event,
            EVENT_TRANSFER_NEXT_DATA_BLOCK
                | EVENT_TRANSFER_TX_COMPLETED
                | EVENT_TRANSFER_TX_FAILED
                | EVENT_QUE_OVERFLOW
        ) {
            return;
        }

        if let Some(queued) = self.queued_burst_channel {
            let channel = record.message.channel() & CHANNEL_NUMBER_MASK;
            if queued == channel || event == EVENT_QUE_OVERFLOW {
                self.queued_burst_channel = None;
                link.release_rx();
            }
        }

        match event {
            EVENT_TRANSFER_NEXT_DATA_BLOCK => record.message.clear(),
            EVENT_TRANSFER_TX_FAILED => self.burst.reset(),
            _ => {}
        }
    }

    /// True when the host asked for `event` to be suppressed and the radio
    /// stack is not allowed to do it.
    pub fn is_filtered(&self, event: u8) -> bool {
        event_filter_bit(event) & self.event_filter_mask != 0
    }

    // ── Handlers ──────────────────────────────────────────────

    fn data<R: RadioPort>(rx: &Message, channel: u8, radio: &mut R) -> ResponseCode {
        let id = rx.id();
        let mut payload = rx.payload();
        if matches!(id, MESG_EXT_BROADCAST_DATA_ID | MESG_EXT_ACKNOWLEDGED_DATA_ID) {
            // Best effort: the transmit result is what the host hears about.
            let _ = radio.channel_id_set(channel, channel_id_from(payload));
            payload = payload.get(ANT_ID_SIZE..).unwrap_or(&[]);
        }

        let code = match id {
            MESG_BROADCAST_DATA_ID | MESG_EXT_BROADCAST_DATA_ID => {
                radio.broadcast_tx(channel, payload)
            }
            _ => radio.acknowledged_tx(channel, payload),
        };
        if code.is_ok() {
            ResponseCode::NO_RESPONSE_MESSAGE
        } else {
            code
        }
    }

    fn request<R, L, S, T, const N: usize>(
        &self,
        rx: &Message,
        resp: &mut CommandResponse,
        ctx: &mut CommandContext<'_, R, L, S, T, N>,
    ) -> Message
    where
        R: RadioPort,
        L: SerialLink,
        S: SystemPort,
        T: TimerPort,
    {
        let channel = resp.channel;
        let reply = match rx.payload_byte(0) {
            MESG_CHANNEL_STATUS_ID => ctx
                .radio
                .channel_status_get(channel)
                .map(|status| Message::with_channel(MESG_CHANNEL_STATUS_ID, channel, &[status])),
            MESG_CHANNEL_ID_ID => ctx.radio.channel_id_get(channel).map(|id| {
                let mut raw = [0u8; 4];
                put_u16_le(&mut raw, id.device_number);
                raw[2] = id.device_type;
                raw[3] = id.transmission_type;
                Message::with_channel(MESG_CHANNEL_ID_ID, channel, &raw)
            }),
            MESG_CAPABILITIES_ID => ctx.radio.capabilities().map(|mut caps| {
                caps[CAPABILITIES_ADV_OPTIONS_INDEX] |= CAPABILITIES_SERIAL_NUMBER_ENABLED;
                caps[CAPABILITIES_ADV_OPTIONS3_INDEX] |= CAPABILITIES_EVENT_BUFFERING_ENABLED;
                Message::new(MESG_CAPABILITIES_ID, &caps)
            }),
            MESG_VERSION_ID => match channel {
                0 => Ok(Message::new(MESG_VERSION_ID, &self.app_version)),
                1 => ctx
                    .radio
                    .version()
                    .map(|v| Message::new(MESG_VERSION_ID, &v)),
                _ => Err(ResponseCode::INVALID_MESSAGE),
            },
            MESG_GET_SERIAL_NUM_ID => Ok(Message::new(
                MESG_GET_SERIAL_NUM_ID,
                &ctx.system.serial_number(),
            )),
            MESG_EVENT_BUFFERING_CONFIG_ID => {
                let settings = ctx.events.settings();
                let mut raw = [0u8; 5];
                raw[0] = settings.class;
                put_u16_le(&mut raw[1..], settings.size_threshold);
                put_u16_le(&mut raw[3..], settings.time_threshold);
                Ok(Message::with_channel(
                    MESG_EVENT_BUFFERING_CONFIG_ID,
                    channel,
                    &raw,
                ))
            }
            MESG_EVENT_FILTER_CONFIG_ID => ctx.radio.event_filter_get().map(|mask| {
                let mask = mask | self.event_filter_mask;
                Message::with_channel(MESG_EVENT_FILTER_CONFIG_ID, channel, &mask.to_le_bytes())
            }),
            MESG_CONFIG_ADV_BURST_ID => ctx.radio.adv_burst_config_get(channel).map(|raw| {
                let len = if channel != 0 {
                    MESG_CONFIG_ADV_BURST_REQ_CONFIG_SIZE
                } else {
                    MESG_CONFIG_ADV_BURST_REQ_CAPABILITIES_SIZE
                };
                Message::new(MESG_CONFIG_ADV_BURST_ID, &raw[..len])
            }),
            _ => Err(ResponseCode::INVALID_MESSAGE),
        };

        match reply {
            Ok(msg) => msg.unwrap_or_default(),
            Err(code) => {
                resp.code = code;
                Message::empty()
            }
        }
    }

    fn command<R, L, S, T, const N: usize>(
        &mut self,
        rx: &Message,
        channel: u8,
        ctx: &mut CommandContext<'_, R, L, S, T, N>,
    ) -> ResponseCode
    where
        R: RadioPort,
        L: SerialLink,
        S: SystemPort,
        T: TimerPort,
    {
        let p = |i| rx.payload_byte(i);
        let size = rx.len();
        let radio = &mut *ctx.radio;

        match rx.id() {
            MESG_ASSIGN_CHANNEL_ID => {
                let ext_assign = if size > MESG_ASSIGN_CHANNEL_SIZE { p(2) } else { 0 };
                radio.channel_assign(channel, p(0), p(1), ext_assign)
            }
            MESG_UNASSIGN_CHANNEL_ID => radio.channel_unassign(channel),
            MESG_OPEN_CHANNEL_ID => {
                if size >= MESG_OPEN_CHANNEL_WITH_OFFSET_SIZE {
                    radio.channel_open_with_offset(channel, get_u16_le(rx.payload()))
                } else {
                    radio.channel_open(channel)
                }
            }
            MESG_CLOSE_CHANNEL_ID => radio.channel_close(channel),
            MESG_CHANNEL_ID_ID => radio.channel_id_set(channel, channel_id_from(rx.payload())),
            MESG_CHANNEL_MESG_PERIOD_ID => {
                radio.channel_period_set(channel, get_u16_le(rx.payload()))
            }
            MESG_CHANNEL_SEARCH_TIMEOUT_ID => radio.channel_search_timeout_set(channel, p(0)),
            MESG_SET_LP_SEARCH_TIMEOUT_ID => {
                radio.channel_low_priority_search_timeout_set(channel, p(0))
            }
            MESG_CHANNEL_RADIO_FREQ_ID => radio.channel_radio_freq_set(channel, p(0)),
            MESG_RADIO_TX_POWER_ID => {
                let custom = if size > 2 { p(1) } else { 0 };
                // Every channel is set; the first failure is reported.
                (0..self.max_channels).fold(ResponseCode::NO_ERROR, |first, ch| {
                    let code = radio.channel_radio_tx_power_set(ch, p(0), custom);
                    if first.is_ok() { code } else { first }
                })
            }
            MESG_CHANNEL_RADIO_TX_POWER_ID => {
                let custom = if size > 2 { p(1) } else { 0 };
                radio.channel_radio_tx_power_set(channel, p(0), custom)
            }
            MESG_NETWORK_KEY_ID => {
                if channel < MAX_NETWORKS {
                    radio.network_key_set(channel, rx.payload())
                } else {
                    ResponseCode::INVALID_MESSAGE
                }
            }
            MESG_SEARCH_WAVEFORM_ID => radio.search_waveform_set(channel, get_u16_le(rx.payload())),
            MESG_PROX_SEARCH_CONFIG_ID => {
                let custom = if size > 2 { p(1) } else { 0 };
                radio.prox_search_set(channel, p(0), custom)
            }
            MESG_SET_SEARCH_CH_PRIORITY_ID => radio.search_channel_priority_set(channel, p(0)),
            MESG_CONFIG_ADV_BURST_ID => radio.adv_burst_config_set(rx.payload()),
            MESG_ANTLIB_CONFIG_ID => {
                let _ = radio.lib_config_clear(ANT_LIB_CONFIG_MASK_ALL);
                radio.lib_config_set(ANT_LIB_CONFIG_RADIO_CONFIG_ALWAYS | p(0))
            }
            MESG_RX_EXT_MESGS_ENABLE_ID => radio.rx_ext_mesgs_enable(p(0)),
            MESG_ID_LIST_ADD_ID => radio.id_list_add(channel, [p(0), p(1), p(2), p(3)], p(4)),
            MESG_ID_LIST_CONFIG_ID => radio.id_list_config(channel, p(0), p(1)),
            MESG_OPEN_RX_SCAN_ID => {
                let sync_only = if size == MESG_OPEN_RX_SCAN_SIZE { p(0) } else { 0 };
                radio.rx_scan_mode_start(sync_only)
            }
            MESG_SERIAL_NUM_SET_CHANNEL_ID_ID => {
                let serial = ctx.system.serial_number();
                // Device number 0 is the search wildcard.
                let device_number = match get_u16_le(&serial) {
                    0 => 1,
                    n => n,
                };
                let id = ChannelId {
                    device_number,
                    device_type: p(0),
                    transmission_type: p(1),
                };
                radio.channel_id_set(channel, id)
            }
            MESG_EVENT_BUFFERING_CONFIG_ID => {
                ctx.events.configure(BufferingSettings {
                    class: p(0),
                    size_threshold: u16::from_le_bytes([p(1), p(2)]),
                    time_threshold: u16::from_le_bytes([p(3), p(4)]),
                });
                ResponseCode::NO_ERROR
            }
            MESG_EVENT_FILTER_CONFIG_ID => {
                let mask = get_u16_le(rx.payload());
                self.event_filter_mask = mask & EVENT_FILTER_PROHIBITED;
                radio.event_filter_set(mask & !EVENT_FILTER_PROHIBITED)
            }
            MESG_SYSTEM_RESET_ID => {
                info!("CMD: system reset");
                ctx.system.system_reset();
                ResponseCode::NO_RESPONSE_MESSAGE
            }
            MESG_SLEEP_ID => {
                if size == 1 {
                    info!("CMD: deep sleep requested");
                    ctx.system.request_deep_sleep();
                    ResponseCode::NO_ERROR
                } else {
                    ResponseCode::INVALID_MESSAGE
                }
            }
            _ => ResponseCode::INVALID_MESSAGE,
        }
    }

    fn extended<L: SerialLink>(rx: &Message, resp: &mut CommandResponse, link: &mut L) -> Message {
        resp.id = rx.id();
        resp.sub_id = rx.sub_id();
        resp.channel = 0;

        let p = |i| rx.payload_byte(i);
        let mut tx = Message::empty();
        let mut invalid = false;

        match rx.ext_id() {
            MESG_EXT_REQUEST_ID => {
                let requested = u16::from_be_bytes([p(0), p(1)]);
                // A nonzero selector is reserved for future queries.
                let selector = p(2);
                match requested {
                    MESG_SET_SYNC_SERIAL_BIT_RATE_ID if selector == 0 => {
                        tx = Message::extended(requested, &[0, BIT_RATE_SUPPORTED])
                            .unwrap_or_default();
                    }
                    MESG_SET_ASYNC_BAUDRATE_ID if selector == 0 => {
                        let [lo, hi] = BAUD_RATE_SUPPORTED.to_le_bytes();
                        tx = Message::extended(requested, &[0, lo, hi]).unwrap_or_default();
                    }
                    MESG_SET_SYNC_SERIAL_BIT_RATE_ID | MESG_SET_ASYNC_BAUDRATE_ID => {
                        resp.code = ResponseCode::INVALID_PARAMETER_PROVIDED;
                    }
                    _ => invalid = true,
                }
                if !resp.code.is_ok() {
                    resp.id = p(0);
                    resp.sub_id = p(1);
                }
            }
            MESG_SET_SYNC_SERIAL_BIT_RATE_ID => resp.code = link.set_bit_rate(p(0)),
            MESG_SET_SYNC_SERIAL_SRDY_SLEEP_ID => resp.code = link.set_srdy_sleep_delay(p(0)),
            MESG_SET_ASYNC_BAUDRATE_ID => resp.code = link.request_baud_rate(p(0)),
            _ => invalid = true,
        }

        if invalid {
            resp.code = ResponseCode::INVALID_MESSAGE;
        } else {
            resp.extended = true;
        }
        tx
    }

    // ── Response ──────────────────────────────────────────────

    /// Build the default response unless a reply was already produced, and
    /// release reception.
    fn finish<L: SerialLink>(resp: CommandResponse, tx: Message, link: &mut L) -> Message {
        let tx = if !tx.is_empty() {
            tx
        } else if resp.extended {
            Message::extended(MESG_EXT_RESPONSE_ID, &[resp.id, resp.sub_id, resp.code.0])
                .unwrap_or_default()
        } else if resp.code != ResponseCode::NO_RESPONSE_MESSAGE {
            Message::with_channel(MESG_RESPONSE_EVENT_ID, resp.channel, &[resp.id, resp.code.0])
                .unwrap_or_default()
        } else {
            tx
        };
        link.release_rx();
        tx
    }
}

/// Channel id as carried little-endian in a message payload.
fn channel_id_from(payload: &[u8]) -> ChannelId {
    ChannelId {
        device_number: get_u16_le(payload),
        device_type: payload.get(2).copied().unwrap_or(0),
        transmission_type: payload.get(3).copied().unwrap_or(0),
    }
}
