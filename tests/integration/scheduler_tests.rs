//! Main-loop behaviour: startup, ordering of responses and radio events,
//! filtering, stalls, sleep and link-level requests.

use antnp::LinkError;
use antnp::buffering::EVENT_QUEUE_SIZE;
use antnp::config::NetworkProcessorConfig;
use antnp::proto::ids::*;
use antnp::scheduler::Scheduler;
use antnp::serial::SerialLink;

use crate::harness::*;
use crate::mock_hw::{MockLink, MockRadio, MockSystem, SystemCall};

// ── Startup ───────────────────────────────────────────────────

#[test]
fn startup_message_reports_reset_reason_first() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut system = MockSystem::new();
    system.reset_reason = RESET_CMD;
    let config = NetworkProcessorConfig::default();
    let mut np = Scheduler::new(&config, MockRadio::new(), MockLink::new(), system, &pump).unwrap();

    assert!(!np.run_once(), "startup pass is busy");
    assert_eq!(np.link().sent, vec![msg(MESG_STARTUP_MESG_ID, &[RESET_CMD])]);
}

#[test]
fn invalid_config_is_refused() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut config = NetworkProcessorConfig::default();
    config.serial.baud_rate = 6;
    let result = Scheduler::new(&config, MockRadio::new(), MockLink::new(), MockSystem::new(), &pump);
    assert!(result.is_err());
}

// ── Responses and events ──────────────────────────────────────

#[test]
fn command_response_goes_out_and_reception_resumes() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);

    let sent = exchange(&mut np, msg(MESG_OPEN_CHANNEL_ID, &[0]));
    assert_eq!(sent, vec![response(0, MESG_OPEN_CHANNEL_ID, 0x00)]);
    assert!(!np.link().held);
    assert!(!np.is_response_pending());
}

#[test]
fn frames_are_processed_one_at_a_time() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.link_mut().push(msg(MESG_OPEN_CHANNEL_ID, &[0]));
    np.link_mut().push(msg(MESG_CLOSE_CHANNEL_ID, &[0]));
    run_until_idle(&mut np);

    assert_eq!(
        np.link().sent,
        vec![
            response(0, MESG_OPEN_CHANNEL_ID, 0x00),
            response(0, MESG_CLOSE_CHANNEL_ID, 0x00),
        ]
    );
    assert_eq!(np.link().releases, 2);
}

#[test]
fn radio_events_reach_the_host_in_order() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    radio_events(&pump, &[channel_event(0, EVENT_TX), channel_event(1, EVENT_RX_FAIL)]);
    run_until_idle(&mut np);

    assert_eq!(
        np.link().sent,
        vec![
            channel_event(0, EVENT_TX).message,
            channel_event(1, EVENT_RX_FAIL).message,
        ]
    );
}

#[test]
fn buffered_events_precede_the_response_that_flushes_them() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    // Buffer every event until 100 bytes are queued.
    let sent = exchange(
        &mut np,
        msg(MESG_EVENT_BUFFERING_CONFIG_ID, &[0, 0x01, 100, 0, 0, 0]),
    );
    assert_eq!(sent, vec![response(0, MESG_EVENT_BUFFERING_CONFIG_ID, 0x00)]);

    radio_events(&pump, &[channel_event(0, EVENT_TX), channel_event(0, EVENT_TX)]);
    run_until_idle(&mut np);
    assert!(np.link().sent.is_empty(), "events stay buffered");

    let sent = exchange(&mut np, msg(MESG_CLOSE_CHANNEL_ID, &[0]));
    assert_eq!(
        sent,
        vec![
            channel_event(0, EVENT_TX).message,
            channel_event(0, EVENT_TX).message,
            response(0, MESG_CLOSE_CHANNEL_ID, 0x00),
        ]
    );
}

#[test]
fn locally_filtered_events_are_dropped() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    // TX_COMPLETED (bit 4) is filtered locally, RX_FAIL (bit 1) by the radio.
    exchange(&mut np, msg(MESG_EVENT_FILTER_CONFIG_ID, &[0, 0x12, 0x00]));
    assert_eq!(np.radio().filter, 0x0002);

    radio_events(
        &pump,
        &[
            channel_event(0, EVENT_TRANSFER_TX_COMPLETED),
            channel_event(0, EVENT_TX),
        ],
    );
    run_until_idle(&mut np);
    assert_eq!(np.link().sent, vec![channel_event(0, EVENT_TX).message]);
}

// ── Stall ─────────────────────────────────────────────────────

#[test]
fn full_queue_stalls_radio_events_without_losing_any() {
    // 7-byte records; 16 bytes of storage hold two.
    let pump = pump::<16>();
    let mut np = boot(&pump);
    let records: Vec<_> = (0..4).map(|ch| channel_event(ch, EVENT_TX)).collect();

    let mut source = EventSource(records.iter().cloned().collect());
    pump.on_radio_interrupt(&mut source);
    assert!(pump.is_stalled());

    // The first pass frees room; the parked record goes in and the
    // interrupt is re-pended.
    np.run_once();
    assert!(!pump.is_stalled());
    assert_eq!(np.system().count(SystemCall::ResumeRadioEvents), 1);

    pump.on_radio_interrupt(&mut source);
    run_until_idle(&mut np);
    let expected: Vec<_> = records.into_iter().map(|r| r.message).collect();
    assert_eq!(np.link().sent, expected);
}

// ── Sleep ─────────────────────────────────────────────────────

#[test]
fn idle_pass_sleeps_link_then_system() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.system_mut().calls.clear();
    let sleeps = np.link().sleeps;

    assert!(np.run_once());
    assert_eq!(np.link().sleeps, sleeps + 1);
    assert_eq!(
        np.system().calls,
        vec![SystemCall::DeepSleepIfRequested, SystemCall::WaitForEvent]
    );
}

#[test]
fn busy_link_skips_link_sleep() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.link_mut().sleep_ok = false;
    let sleeps = np.link().sleeps;

    assert!(np.run_once());
    assert_eq!(np.link().sleeps, sleeps);
    assert_eq!(np.system().calls.last(), Some(&SystemCall::WaitForEvent));
}

#[test]
fn sleep_command_arms_deep_sleep_for_next_idle_pass() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.system_mut().calls.clear();

    let sent = exchange(&mut np, msg(MESG_SLEEP_ID, &[0]));
    assert_eq!(sent, vec![response(0, MESG_SLEEP_ID, 0x00)]);
    let calls = &np.system().calls;
    let requested = calls.iter().position(|c| *c == SystemCall::RequestDeepSleep);
    let taken = calls.iter().rposition(|c| *c == SystemCall::DeepSleepIfRequested);
    assert!(requested.is_some() && taken > requested);
}

// ── Link requests ─────────────────────────────────────────────

#[test]
fn host_reset_pattern_resets_the_system() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.link_mut().poll_errors.push_back(LinkError::ResetRequested);
    np.run_once();
    assert_eq!(np.system().count(SystemCall::Reset), 1);
}

#[test]
fn other_link_errors_are_survivable() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.link_mut().poll_errors.push_back(LinkError::Bus);
    np.run_once();
    assert_eq!(np.system().count(SystemCall::Reset), 0);

    let sent = exchange(&mut np, msg(MESG_OPEN_CHANNEL_ID, &[1]));
    assert_eq!(sent, vec![response(1, MESG_OPEN_CHANNEL_ID, 0x00)]);
}

#[test]
fn baud_change_applies_before_the_response_goes_out() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);

    np.link_mut().push(msg(MESG_EXT_ID_1, &[0x02, 8]));
    np.run_once();
    assert!(np.link().baud_change_pending());
    assert!(np.link().sent.is_empty());

    np.run_once();
    assert_eq!(np.link().baud_index, Some(8));

    run_until_idle(&mut np);
    assert_eq!(
        np.link().sent,
        vec![msg(MESG_EXT_ID_0, &[0x00, MESG_EXT_ID_1, 0x02, 0x00])]
    );
}
