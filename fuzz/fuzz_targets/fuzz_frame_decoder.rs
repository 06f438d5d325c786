//! Fuzz target: `Frame::decode` and `Reassembler::feed`.
//!
//! Drives arbitrary byte sequences into the frame decoder and the BLE
//! chunk reassembler and asserts neither ever panics, regardless of CRC
//! failures, truncated chunks, or garbage countdown headers.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use glm_mt_link::chunk::Reassembler;
use glm_mt_link::frame::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = Frame::decode(data);

    let mut reassembler = Reassembler::new();
    for window in data.chunks(20) {
        let _ = reassembler.feed(window);
    }
});
