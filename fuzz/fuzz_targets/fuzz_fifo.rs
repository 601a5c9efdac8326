//! Fuzz target: `MultiContextFifo`
//!
//! Interprets the input as push/pop operations against a small ring buffer
//! and checks every result against a plain byte queue.
//!
//! cargo fuzz run fuzz_fifo

#![no_main]

use std::collections::VecDeque;

use antnp::fifo::MultiContextFifo;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let fifo = MultiContextFifo::<29>::new();
    let mut model = VecDeque::new();
    let mut scratch = [0u8; 32];

    for op in data.chunks(2) {
        let [kind, arg] = *op else {
            break;
        };
        let n = (arg % 32) as usize;
        if kind & 1 == 0 {
            let src = &[kind; 32][..n];
            let fits = model.len() + n <= fifo.capacity();
            assert_eq!(fifo.push(src), fits);
            if fits {
                model.extend(src);
            }
        } else {
            let dst = &mut scratch[..n];
            let enough = n <= model.len();
            assert_eq!(fifo.pop(dst), enough);
            if enough {
                assert!(model.drain(..n).eq(dst.iter().copied()));
            }
        }
        assert_eq!(fifo.len(), model.len());
    }
});
