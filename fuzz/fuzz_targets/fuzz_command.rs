//! Fuzz target: `CommandProcessor::process` / `process_burst`
//!
//! Splits the input into host messages and dispatches each against a radio
//! stack that accepts everything. Whatever the message, reception must end up
//! released unless a burst segment is queued.
//!
//! cargo fuzz run fuzz_command

#![no_main]

use antnp::app::ports::{ChannelId, RadioPort, SystemPort, TimerPort};
use antnp::buffering::EventBuffer;
use antnp::error::LinkError;
use antnp::proto::command::{BurstOutcome, CommandContext, CommandProcessor, Dispatch};
use antnp::proto::ids::{MESG_MAX_SIZE_VALUE, ResponseCode};
use antnp::proto::wire::Message;
use antnp::serial::{SerialLink, SerialMode};
use libfuzzer_sys::fuzz_target;

struct Radio;

impl RadioPort for Radio {
    fn channel_assign(&mut self, _: u8, _: u8, _: u8, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_unassign(&mut self, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_open(&mut self, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_open_with_offset(&mut self, _: u8, _: u16) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_close(&mut self, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_id_set(&mut self, _: u8, _: ChannelId) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_id_get(&mut self, _: u8) -> Result<ChannelId, ResponseCode> {
        Ok(ChannelId::default())
    }
    fn channel_period_set(&mut self, _: u8, _: u16) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_radio_freq_set(&mut self, _: u8, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_search_timeout_set(&mut self, _: u8, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_radio_tx_power_set(&mut self, _: u8, _: u8, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn channel_status_get(&mut self, _: u8) -> Result<u8, ResponseCode> {
        Ok(0)
    }
    fn network_key_set(&mut self, _: u8, _: &[u8]) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn capabilities(&mut self) -> Result<[u8; 8], ResponseCode> {
        Ok([8, 3, 0, 0, 0, 0, 0, 0])
    }
    fn version(&mut self) -> Result<[u8; 11], ResponseCode> {
        Ok([0; 11])
    }
    fn broadcast_tx(&mut self, _: u8, _: &[u8]) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn acknowledged_tx(&mut self, _: u8, _: &[u8]) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn burst_tx(&mut self, _: u8, _: &[u8], _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn event_filter_set(&mut self, _: u16) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn event_filter_get(&mut self) -> Result<u16, ResponseCode> {
        Ok(0)
    }
}

#[derive(Default)]
struct Link {
    held: bool,
}

impl SerialLink for Link {
    fn mode(&self) -> SerialMode {
        SerialMode::Asynchronous
    }
    fn poll_rx(&mut self) -> Result<bool, LinkError> {
        Ok(true)
    }
    fn take_frame(&mut self) -> Option<Message> {
        None
    }
    fn transmit(&mut self, _: &Message) -> Result<(), LinkError> {
        Ok(())
    }
    fn idle(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
    fn hold_rx(&mut self) {
        self.held = true;
    }
    fn release_rx(&mut self) {
        self.held = false;
    }
    fn is_held(&self) -> bool {
        self.held
    }
    fn sleep(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
    fn request_baud_rate(&mut self, _: u8) -> ResponseCode {
        ResponseCode::NO_ERROR
    }
    fn baud_change_pending(&self) -> bool {
        false
    }
    fn apply_pending_baud_rate(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
    fn set_bit_rate(&mut self, _: u8) -> ResponseCode {
        ResponseCode::INVALID_MESSAGE
    }
    fn set_srdy_sleep_delay(&mut self, _: u8) -> ResponseCode {
        ResponseCode::INVALID_MESSAGE
    }
}

struct System;

impl SystemPort for System {
    fn reset_reason(&mut self) -> u8 {
        0
    }
    fn system_reset(&mut self) {}
    fn request_deep_sleep(&mut self) {}
    fn deep_sleep_if_requested(&mut self) {}
    fn wait_for_event(&mut self) {}
    fn resume_radio_events(&mut self) {}
    fn serial_number(&mut self) -> [u8; 4] {
        [1, 2, 3, 4]
    }
}

struct Clock;

impl TimerPort for Clock {
    fn now_ticks(&self) -> u32 {
        0
    }
    fn request(&self) {}
    fn release(&self) {}
}

fuzz_target!(|data: &[u8]| {
    let events = EventBuffer::<_, 256>::new(Clock);
    let mut radio = Radio;
    let mut link = Link::default();
    let mut system = System;
    let mut commands = CommandProcessor::new(8, [0; 11]);

    // [len, id, data..] records; len counts the data bytes.
    let mut rest = data;
    while let [len, id, tail @ ..] = rest {
        let len = (*len as usize % MESG_MAX_SIZE_VALUE).min(tail.len());
        let (body, next) = tail.split_at(len);
        rest = next;
        let Some(rx) = Message::new(*id, body) else {
            continue;
        };

        link.hold_rx();
        let mut ctx = CommandContext {
            radio: &mut radio,
            link: &mut link,
            system: &mut system,
            events: &events,
        };
        match commands.process(&rx, &mut ctx) {
            Dispatch::Respond(_) => assert!(!link.is_held()),
            Dispatch::Burst => match commands.process_burst(&rx, &mut ctx) {
                BurstOutcome::Queued { channel } => {
                    assert!(link.is_held());
                    assert_eq!(commands.queued_burst_channel(), Some(channel));
                    link.release_rx();
                }
                BurstOutcome::Respond(_) => assert!(!link.is_held()),
            },
        }
    }
});
