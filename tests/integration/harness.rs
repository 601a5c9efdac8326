//! Boots a scheduler on mock adapters and drives it pass by pass.

use std::collections::VecDeque;

use antnp::app::ports::{RadioEventSource, RadioPort, SystemPort, TimerPort};
use antnp::config::NetworkProcessorConfig;
use antnp::proto::ids::MESG_RESPONSE_EVENT_ID;
use antnp::proto::wire::{EventRecord, Message};
use antnp::scheduler::{EventPump, Scheduler};
use antnp::serial::SerialLink;

use crate::mock_hw::{MockLink, MockRadio, MockSystem, StoppedClock};

pub type Np<'p, const N: usize> = Scheduler<'p, MockRadio, MockLink, MockSystem, StoppedClock, N>;

/// Passes after which a loop that never idles is considered stuck.
const MAX_PASSES: usize = 256;

pub fn pump<const N: usize>() -> EventPump<StoppedClock, N> {
    EventPump::new(StoppedClock)
}

/// Boot with default mocks and let the startup message go out.
pub fn boot<const N: usize>(pump: &EventPump<StoppedClock, N>) -> Np<'_, N> {
    boot_with(pump, MockRadio::new(), MockSystem::new())
}

pub fn boot_with<const N: usize>(
    pump: &EventPump<StoppedClock, N>,
    radio: MockRadio,
    system: MockSystem,
) -> Np<'_, N> {
    let config = NetworkProcessorConfig::default();
    let mut np = Scheduler::new(&config, radio, MockLink::new(), system, pump).unwrap();
    run_until_idle(&mut np);
    np.link_mut().sent.clear();
    np
}

/// Run passes until one goes to sleep. Returns the number of busy passes.
pub fn run_until_idle<R, L, S, T, const N: usize>(np: &mut Scheduler<'_, R, L, S, T, N>) -> usize
where
    R: RadioPort,
    L: SerialLink,
    S: SystemPort,
    T: TimerPort,
{
    for busy in 0..MAX_PASSES {
        if np.run_once() {
            return busy;
        }
    }
    panic!("scheduler never went idle");
}

/// Send one host message and return everything transmitted until idle.
pub fn exchange<const N: usize>(np: &mut Np<'_, N>, msg: Message) -> Vec<Message> {
    np.link_mut().push(msg);
    run_until_idle(np);
    std::mem::take(&mut np.link_mut().sent)
}

pub fn msg(id: u8, data: &[u8]) -> Message {
    Message::new(id, data).unwrap()
}

/// `0x40 [channel, id, code]`.
pub fn response(channel: u8, id: u8, code: u8) -> Message {
    Message::with_channel(MESG_RESPONSE_EVENT_ID, channel, &[id, code]).unwrap()
}

/// Channel event as the radio stack reports it: `0x40 [channel, 0x01, event]`.
pub fn channel_event(channel: u8, event: u8) -> EventRecord {
    EventRecord::new(channel, event, response(channel, 0x01, event))
}

#[derive(Default)]
pub struct EventSource(pub VecDeque<EventRecord>);

impl RadioEventSource for EventSource {
    fn next_event(&mut self) -> Option<EventRecord> {
        self.0.pop_front()
    }
}

/// Raise the radio interrupt with `records` pending.
pub fn radio_events<const N: usize>(pump: &EventPump<StoppedClock, N>, records: &[EventRecord]) {
    let mut source = EventSource(records.iter().cloned().collect());
    pump.on_radio_interrupt(&mut source);
}
