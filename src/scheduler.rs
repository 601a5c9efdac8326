//! Main-loop scheduler and the radio event pump.
//!
//! One pass of [`Scheduler::run_once`] does at most one unit of work, then
//! queues any response, retries a stalled radio event, transmits and (if the
//! pass was idle) sleeps:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ poll link                                                      │
//! │   │                                                            │
//! │   ├─ baud change pending ──▶ apply                             │
//! │   ├─ startup pending ──────▶ (startup frame already in tx)     │
//! │   ├─ host frame ───────────▶ CommandProcessor::process         │
//! │   ├─ events flushing ──────▶ EventBuffer::get ──▶ tx           │
//! │   └─ burst held ───────────▶ CommandProcessor::process_burst   │
//! │                                                                │
//! │ response pending ──▶ EventBuffer::put + flush                  │
//! │ radio stalled ─────▶ retry parked record, re-pend interrupt    │
//! │ transmit tx (or idle)                                          │
//! │ idle pass ─────────▶ link sleep, deep sleep, wait for event    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Responses travel through the event buffer rather than straight to `tx`, so
//! they stay ordered with the radio events already queued ahead of them.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, info, warn};

use crate::app::ports::{RadioEventSource, RadioPort, SystemPort, TimerPort};
use crate::buffering::{EVENT_QUEUE_SIZE, EventBuffer};
use crate::config::NetworkProcessorConfig;
use crate::error::{Error, LinkError};
use crate::proto::command::{BurstOutcome, CommandContext, CommandProcessor, Dispatch};
use crate::proto::ids::{CHANNEL_NUMBER_MASK, MESG_STARTUP_MESG_ID, NO_EVENT};
use crate::proto::wire::{EventRecord, Message};
use crate::serial::SerialLink;

// ═══════════════════════════════════════════════════════════════
//  Event pump (radio interrupt side)
// ═══════════════════════════════════════════════════════════════

/// Moves radio events into the event buffer from the radio interrupt.
///
/// When the buffer is full the pump stalls: the record that did not fit is
/// parked and the interrupt stops pulling events until the main loop has
/// queued the parked record and re-pended the interrupt.
pub struct EventPump<T: TimerPort, const N: usize = EVENT_QUEUE_SIZE> {
    events: EventBuffer<T, N>,
    started: AtomicBool,
    stalled: AtomicBool,
    parked: Mutex<CriticalSectionRawMutex, Cell<Option<EventRecord>>>,
}

impl<T: TimerPort, const N: usize> EventPump<T, N> {
    pub fn new(timer: T) -> Self {
        Self {
            events: EventBuffer::new(timer),
            started: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            parked: Mutex::new(Cell::new(None)),
        }
    }

    pub fn events(&self) -> &EventBuffer<T, N> {
        &self.events
    }

    /// Radio event interrupt body.
    pub fn on_radio_interrupt(&self, source: &mut impl RadioEventSource) {
        while !self.stalled.load(Ordering::Acquire) {
            let Some(record) = source.next_event() else {
                break;
            };
            self.started.store(true, Ordering::Release);
            if !self.events.put(&record) {
                self.parked.lock(|p| p.set(Some(record)));
                self.stalled.store(true, Ordering::Release);
            }
        }
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    /// Queue the parked record. Returns `true` when the pump was stalled and
    /// is now running again; the caller must then re-pend the radio interrupt.
    pub fn retry_stalled(&self) -> bool {
        if !self.is_stalled() {
            return false;
        }
        let queued = self.parked.lock(|p| match p.take() {
            Some(record) if !self.events.put(&record) => {
                p.set(Some(record));
                false
            }
            _ => true,
        });
        if queued {
            self.stalled.store(false, Ordering::Release);
        }
        queued
    }

    /// Consume the "events arrived" signal raised by the interrupt.
    fn take_started(&self) -> bool {
        self.started.swap(false, Ordering::AcqRel)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler (thread side)
// ═══════════════════════════════════════════════════════════════

/// Cooperative main loop of the network processor.
pub struct Scheduler<'p, R, L, S, T: TimerPort, const N: usize = EVENT_QUEUE_SIZE> {
    radio: R,
    link: L,
    system: S,
    pump: &'p EventPump<T, N>,
    commands: CommandProcessor,
    /// Frame to send at the end of this pass.
    tx: Message,
    response: Message,
    response_pending: bool,
    /// Burst segment held back until no response is pending.
    burst: Option<Message>,
    startup_pending: bool,
    /// Draining the event buffer.
    events_active: bool,
}

impl<'p, R, L, S, T, const N: usize> Scheduler<'p, R, L, S, T, N>
where
    R: RadioPort,
    L: SerialLink,
    S: SystemPort,
    T: TimerPort,
{
    /// Validate `config`, size the channel table from the radio stack and
    /// stage the startup message.
    pub fn new(
        config: &NetworkProcessorConfig,
        mut radio: R,
        link: L,
        mut system: S,
        pump: &'p EventPump<T, N>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let max_channels = match radio.capabilities() {
            Ok(caps) if caps[0] > 0 => caps[0].min(CHANNEL_NUMBER_MASK + 1),
            _ => {
                warn!(
                    "NP: radio capabilities unavailable, assuming {} channels",
                    config.max_channels
                );
                config.max_channels
            }
        };

        pump.events().configure(config.buffering.into());

        let reason = system.reset_reason();
        let tx = Message::new(MESG_STARTUP_MESG_ID, &[reason]).unwrap_or_default();
        info!(
            "NP: {:?} link, {} channels, reset reason {:#04x}",
            link.mode(),
            max_channels,
            reason
        );

        Ok(Self {
            radio,
            link,
            system,
            pump,
            commands: CommandProcessor::new(max_channels, config.app_version),
            tx,
            response: Message::empty(),
            response_pending: false,
            burst: None,
            startup_pending: true,
            events_active: false,
        })
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.run_once();
        }
    }

    /// One loop pass. Returns `true` when the pass was idle and waited for an
    /// event.
    pub fn run_once(&mut self) -> bool {
        let mut allow_sleep = true;
        let serial_sleep_ok = match self.link.poll_rx() {
            Ok(ok) => ok,
            Err(e) => {
                self.on_link_error(e);
                false
            }
        };

        if self.link.baud_change_pending() {
            if let Err(e) = self.link.apply_pending_baud_rate() {
                self.on_link_error(e);
            }
            // The response to the change is still queued.
            allow_sleep = false;
        } else if self.startup_pending {
            self.startup_pending = false;
            allow_sleep = false;
        } else if let Some(rx) = self.take_host_frame() {
            self.dispatch(rx);
            allow_sleep = false;
        } else if self.events_active || self.pump.take_started() {
            self.events_active = true;
            self.next_event();
            allow_sleep = false;
        } else if !self.response_pending && self.burst.is_some() {
            self.next_burst();
            allow_sleep = false;
        }

        if self.response_pending {
            self.queue_response();
            allow_sleep = false;
        }

        // After the response, so command responses win a full buffer.
        if self.pump.retry_stalled() {
            debug!("EVT: radio events resumed");
            self.system.resume_radio_events();
        }

        self.transmit();

        if allow_sleep {
            if serial_sleep_ok {
                if let Err(e) = self.link.sleep() {
                    self.on_link_error(e);
                }
            }
            self.system.deep_sleep_if_requested();
            self.system.wait_for_event();
        }
        allow_sleep
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn commands(&self) -> &CommandProcessor {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandProcessor {
        &mut self.commands
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Platform glue reaches link-specific hooks (suspend sensing) here.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    pub fn is_response_pending(&self) -> bool {
        self.response_pending
    }

    // ── Work items ────────────────────────────────────────────

    fn take_host_frame(&mut self) -> Option<Message> {
        if self.response_pending {
            return None;
        }
        self.link.take_frame()
    }

    fn dispatch(&mut self, rx: Message) {
        let mut ctx = CommandContext {
            radio: &mut self.radio,
            link: &mut self.link,
            system: &mut self.system,
            events: self.pump.events(),
        };
        self.response = match self.commands.process(&rx, &mut ctx) {
            Dispatch::Respond(msg) => msg,
            Dispatch::Burst => {
                self.burst = Some(rx);
                Message::empty()
            }
        };
        self.response_pending = true;
    }

    fn next_burst(&mut self) {
        let Some(rx) = self.burst.take() else {
            return;
        };
        let mut ctx = CommandContext {
            radio: &mut self.radio,
            link: &mut self.link,
            system: &mut self.system,
            events: self.pump.events(),
        };
        self.response = match self.commands.process_burst(&rx, &mut ctx) {
            BurstOutcome::Queued { channel } => {
                debug!("CMD[burst] ch={} queued", channel);
                Message::empty()
            }
            BurstOutcome::Respond(msg) => msg,
        };
        self.response_pending = true;
    }

    fn next_event(&mut self) {
        match self.pump.events().get() {
            Some(mut record) => {
                self.commands.on_radio_event(&mut record, &mut self.link);
                if self.commands.is_filtered(record.event) {
                    record.message.clear();
                }
                self.tx = record.message;
            }
            None => self.events_active = false,
        }
    }

    fn queue_response(&mut self) {
        let response = core::mem::take(&mut self.response);
        if response.is_empty() {
            self.response_pending = false;
        } else {
            let record = EventRecord::new(response.channel(), NO_EVENT, response);
            if self.pump.events().put(&record) {
                self.response_pending = false;
            } else {
                self.response = record.message;
            }
        }
        self.pump.events().flush();
        self.events_active = true;
    }

    fn transmit(&mut self) {
        let result = if self.tx.is_empty() {
            self.link.idle()
        } else {
            let result = self.link.transmit(&self.tx);
            self.tx.clear();
            result
        };
        if let Err(e) = result {
            self.on_link_error(e);
        }
    }

    fn on_link_error(&mut self, e: LinkError) {
        match e {
            LinkError::ResetRequested => {
                info!("LINK: host requested reset");
                self.system.system_reset();
            }
            other => warn!("LINK: {}", other),
        }
    }
}
