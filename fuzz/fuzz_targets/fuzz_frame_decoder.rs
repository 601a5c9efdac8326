//! Fuzz target: `FrameDecoder::feed_byte_with_errors`
//!
//! Streams arbitrary bytes (with arbitrary line-error flags) through the
//! host frame decoder. Every message it yields must re-encode into a frame
//! that decodes to the same message.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use antnp::proto::codec::{FrameDecoder, LineErrors};
use antnp::proto::ids::{MESG_MAX_SIZE_VALUE, MESG_TX_SYNC};
use antnp::proto::wire::{MAX_FRAME_SIZE, decode_frame, encode_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&error_bits, bytes)) = data.split_first() else {
        return;
    };
    let mut decoder = FrameDecoder::new(MESG_TX_SYNC);

    for (i, &byte) in bytes.iter().enumerate() {
        // The first input byte masks which positions (mod 8) arrive with a
        // framing error.
        let errors = LineErrors {
            framing: error_bits & (1 << (i % 8)) != 0,
            ..LineErrors::NONE
        };
        if let Some(msg) = decoder.feed_byte_with_errors(byte, errors) {
            assert!(!msg.is_empty(), "decoder yielded an empty message");
            assert!(msg.len() <= MESG_MAX_SIZE_VALUE);

            let mut frame = [0u8; MAX_FRAME_SIZE];
            let len = encode_frame(MESG_TX_SYNC, &msg, &mut frame).expect("message fits a frame");
            assert_eq!(decode_frame(MESG_TX_SYNC, &frame[..len]), Some(msg));
        }
    }

    decoder.reset();
    assert!(decoder.is_idle());
});
