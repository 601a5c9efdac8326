//! Host commands end to end: frame in, radio call made, frame out.

use antnp::app::ports::ChannelId;
use antnp::buffering::EVENT_QUEUE_SIZE;
use antnp::proto::ids::*;

use crate::harness::*;
use crate::mock_hw::{MockRadio, MockSystem, RadioCall};

const SEGMENT: [u8; 8] = [0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17];

fn burst_segment(channel_and_sequence: u8) -> antnp::proto::wire::Message {
    let mut data = vec![channel_and_sequence];
    data.extend_from_slice(&SEGMENT);
    msg(MESG_BURST_DATA_ID, &data)
}

// ── Channel configuration ─────────────────────────────────────

#[test]
fn assign_passes_extended_assignment_byte() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, msg(MESG_ASSIGN_CHANNEL_ID, &[1, 0x10, 0, 0x01]));
    assert_eq!(sent, vec![response(1, MESG_ASSIGN_CHANNEL_ID, 0x00)]);
    assert_eq!(
        np.radio().calls,
        vec![RadioCall::Assign {
            channel: 1,
            channel_type: 0x10,
            network: 0,
            ext: 0x01
        }]
    );
}

#[test]
fn open_with_offset_reads_little_endian() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    exchange(&mut np, msg(MESG_OPEN_CHANNEL_ID, &[2, 0x34, 0x12]));
    assert_eq!(np.radio().calls, vec![RadioCall::OpenWithOffset(2, 0x1234)]);
}

#[test]
fn channel_count_comes_from_radio_capabilities() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut radio = MockRadio::new();
    radio.capabilities = Ok([4, 3, 0, 0, 0, 0, 0, 0]);
    let mut np = boot_with(&pump, radio, MockSystem::new());

    let sent = exchange(&mut np, msg(MESG_OPEN_CHANNEL_ID, &[5]));
    assert_eq!(sent, vec![response(5, MESG_OPEN_CHANNEL_ID, 0x28)]);
    assert!(np.radio().calls.is_empty());

    // Network numbers are not channel numbers.
    let key = [0xB9, 0xA5, 0x21, 0xFB, 0xBD, 0x72, 0xC3, 0x45];
    let mut data = vec![5];
    data.extend_from_slice(&key);
    let sent = exchange(&mut np, msg(MESG_NETWORK_KEY_ID, &data));
    assert_eq!(sent, vec![response(5, MESG_NETWORK_KEY_ID, 0x00)]);
    assert_eq!(np.radio().calls, vec![RadioCall::NetworkKey(5, key.to_vec())]);
}

#[test]
fn missing_capabilities_fall_back_to_configured_count() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut radio = MockRadio::new();
    radio.capabilities = Err(ResponseCode::NOT_SUPPORTED);
    let mut np = boot_with(&pump, radio, MockSystem::new());
    assert_eq!(np.commands().max_channels(), 8);

    let sent = exchange(&mut np, msg(MESG_OPEN_CHANNEL_ID, &[7]));
    assert_eq!(sent, vec![response(7, MESG_OPEN_CHANNEL_ID, 0x00)]);
}

#[test]
fn adv_burst_config_reaches_the_radio() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let config = [0x01, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    let mut data = vec![0];
    data.extend_from_slice(&config);
    let sent = exchange(&mut np, msg(MESG_CONFIG_ADV_BURST_ID, &data));
    assert_eq!(sent, vec![response(0, MESG_CONFIG_ADV_BURST_ID, 0x00)]);
    assert_eq!(np.radio().calls, vec![RadioCall::AdvBurstConfig(config.to_vec())]);
}

#[test]
fn tx_power_failure_still_sets_remaining_channels() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.radio_mut().refuse_tx_power_on = Some(1);
    let sent = exchange(&mut np, msg(MESG_RADIO_TX_POWER_ID, &[0, 3]));
    assert_eq!(sent, vec![response(0, MESG_RADIO_TX_POWER_ID, 0x15)]);
    let channels: Vec<u8> = np
        .radio()
        .calls
        .iter()
        .filter_map(|c| match c {
            RadioCall::TxPower { channel, .. } => Some(*channel),
            _ => None,
        })
        .collect();
    assert_eq!(channels, (0..8).collect::<Vec<u8>>());
}

#[test]
fn lib_config_keeps_radio_config_always_on() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    exchange(&mut np, msg(MESG_ANTLIB_CONFIG_ID, &[0, 0x80]));
    assert_eq!(np.radio().calls, vec![RadioCall::LibConfig(0x81)]);
}

#[test]
fn radio_error_codes_reach_the_host() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.radio_mut()
        .fail("close", ResponseCode::CHANNEL_IN_WRONG_STATE);
    let sent = exchange(&mut np, msg(MESG_CLOSE_CHANNEL_ID, &[3]));
    assert_eq!(sent, vec![response(3, MESG_CLOSE_CHANNEL_ID, 0x15)]);
}

// ── Requests ──────────────────────────────────────────────────

#[test]
fn version_request_reports_application_version() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, msg(MESG_REQUEST_ID, &[0, MESG_VERSION_ID]));
    assert_eq!(sent, vec![msg(MESG_VERSION_ID, b"ANTNP1.00\0\0")]);
}

#[test]
fn serial_number_request() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, msg(MESG_REQUEST_ID, &[0, MESG_GET_SERIAL_NUM_ID]));
    assert_eq!(
        sent,
        vec![msg(MESG_GET_SERIAL_NUM_ID, &[0x78, 0x56, 0x34, 0x12])]
    );
}

#[test]
fn capabilities_request_adds_local_feature_bits() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, msg(MESG_REQUEST_ID, &[0, MESG_CAPABILITIES_ID]));
    assert_eq!(
        sent,
        vec![msg(
            MESG_CAPABILITIES_ID,
            &[8, 3, 0xBA, 0x08, 0x00, 0x00, 0x02, 0x00]
        )]
    );
}

#[test]
fn adv_burst_capabilities_and_config_requests() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut radio = MockRadio::new();
    radio.adv_burst = [0, 0x03, 0x01, 0x00, 0x00, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00];
    let mut np = boot_with(&pump, radio, MockSystem::new());

    let sent = exchange(&mut np, msg(MESG_REQUEST_ID, &[0, MESG_CONFIG_ADV_BURST_ID]));
    assert_eq!(
        sent,
        vec![msg(MESG_CONFIG_ADV_BURST_ID, &[0x00, 0x03, 0x01, 0x00, 0x00])]
    );

    let sent = exchange(&mut np, msg(MESG_REQUEST_ID, &[1, MESG_CONFIG_ADV_BURST_ID]));
    assert_eq!(
        sent,
        vec![msg(
            MESG_CONFIG_ADV_BURST_ID,
            &[0x01, 0x03, 0x01, 0x00, 0x00, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00]
        )]
    );
}

#[test]
fn adv_burst_request_without_radio_support_is_invalid() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.radio_mut().fail("adv_burst", ResponseCode::NOT_SUPPORTED);
    let sent = exchange(&mut np, msg(MESG_REQUEST_ID, &[1, MESG_CONFIG_ADV_BURST_ID]));
    assert_eq!(sent, vec![response(1, MESG_REQUEST_ID, 0x28)]);
}

#[test]
fn unknown_request_is_invalid() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, msg(MESG_REQUEST_ID, &[0, 0x99]));
    assert_eq!(sent, vec![response(0, MESG_REQUEST_ID, 0x28)]);
}

// ── Extended commands ─────────────────────────────────────────

#[test]
fn sync_bit_rate_on_async_link_is_invalid() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, msg(MESG_EXT_ID_1, &[0x00, 2]));
    assert_eq!(
        sent,
        vec![msg(MESG_EXT_ID_0, &[0x00, MESG_EXT_ID_1, 0x00, 0x28])]
    );
}

#[test]
fn bit_rate_capability_request() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, msg(MESG_EXT_ID_0, &[0x01, MESG_EXT_ID_1, 0x00, 0x00]));
    assert_eq!(sent, vec![msg(MESG_EXT_ID_1, &[0x00, 0x00, 0x1F])]);
}

// ── Data ──────────────────────────────────────────────────────

#[test]
fn extended_broadcast_sets_channel_id_then_sends_silently() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let mut data = vec![0, 0x21, 0x00, 0x78, 0x01];
    data.extend_from_slice(&SEGMENT);
    let sent = exchange(&mut np, msg(MESG_EXT_BROADCAST_DATA_ID, &data));

    assert!(sent.is_empty());
    assert!(!np.link().held);
    assert_eq!(
        np.radio().calls,
        vec![
            RadioCall::SetChannelId(
                0,
                ChannelId {
                    device_number: 0x0021,
                    device_type: 0x78,
                    transmission_type: 0x01,
                }
            ),
            RadioCall::Broadcast(0, SEGMENT.to_vec()),
        ]
    );
}

#[test]
fn failed_acknowledged_send_is_reported() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.radio_mut()
        .fail("acknowledged", ResponseCode::TRANSFER_IN_PROGRESS);
    let mut data = vec![2];
    data.extend_from_slice(&SEGMENT);
    let sent = exchange(&mut np, msg(MESG_ACKNOWLEDGED_DATA_ID, &data));
    assert_eq!(sent, vec![response(2, MESG_ACKNOWLEDGED_DATA_ID, 0x1F)]);
}

// ── Burst ─────────────────────────────────────────────────────

#[test]
fn burst_transfer_paces_host_by_radio_progress() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.link_mut().push(burst_segment(0x01));
    np.link_mut().push(burst_segment(0x21));
    np.link_mut().push(burst_segment(0xC1));

    run_until_idle(&mut np);
    assert_eq!(np.radio().bursts().len(), 1);
    assert!(np.link().held, "reception waits for the radio");
    assert_eq!(np.link().inbound.len(), 2);

    for _ in 0..2 {
        radio_events(&pump, &[channel_event(1, EVENT_TRANSFER_NEXT_DATA_BLOCK)]);
        run_until_idle(&mut np);
    }
    radio_events(&pump, &[channel_event(1, EVENT_TRANSFER_TX_COMPLETED)]);
    run_until_idle(&mut np);

    let segments: Vec<_> = np.radio().bursts().into_iter().map(|b| b.2).collect();
    assert_eq!(
        segments,
        vec![BURST_SEGMENT_START, BURST_SEGMENT_CONTINUE, BURST_SEGMENT_END]
    );
    assert!(np.radio().bursts().iter().all(|b| b.0 == 1 && b.1 == SEGMENT));
    // Next-data-block events never reach the host.
    assert_eq!(
        np.link().sent,
        vec![channel_event(1, EVENT_TRANSFER_TX_COMPLETED).message]
    );
    assert!(!np.link().held);
}

#[test]
fn out_of_sequence_segment_is_refused() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    let sent = exchange(&mut np, burst_segment(0x40));
    assert_eq!(sent, vec![response(0, MESG_BURST_DATA_ID, 0x20)]);
    assert!(np.radio().bursts().is_empty());
    assert!(!np.link().held);
}

#[test]
fn radio_refusing_a_segment_releases_reception() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.radio_mut()
        .fail("burst", ResponseCode::TRANSFER_IN_PROGRESS);
    let sent = exchange(&mut np, burst_segment(0x03));
    assert_eq!(sent, vec![response(3, MESG_BURST_DATA_ID, 0x1F)]);
    assert!(!np.link().held);
    assert_eq!(np.commands().burst_sequence().expected(), 0);
}

// ── Interface lock ────────────────────────────────────────────

#[cfg(feature = "interface-lock")]
#[test]
fn locked_interface_refuses_until_unlocked() {
    let pump = pump::<EVENT_QUEUE_SIZE>();
    let mut np = boot(&pump);
    np.commands_mut().set_interface_lock(true);

    let sent = exchange(&mut np, msg(MESG_OPEN_CHANNEL_ID, &[0]));
    assert_eq!(sent, vec![response(0, MESG_OPEN_CHANNEL_ID, 0x60)]);
    assert!(np.radio().calls.is_empty());

    exchange(&mut np, msg(MESG_UNLOCK_INTERFACE_ID, &[0]));
    let sent = exchange(&mut np, msg(MESG_OPEN_CHANNEL_ID, &[0]));
    assert_eq!(sent, vec![response(0, MESG_OPEN_CHANNEL_ID, 0x00)]);
}
