//! Fuzz target: `FrameIter` over arbitrary region bytes.
//!
//! The shared flash region is attacker-adjacent (a corrupt upload or a
//! torn write must never wedge the kernel), so the iterator has to stay
//! in bounds and terminate for any byte soup.
//!
//! Invariants checked:
//! - No panics for any input
//! - Every yielded frame lies fully inside the region
//! - Header parsing and CRC verification never panic on yielded frames
//!
//! cargo fuzz run fuzz_frame_iter

#![no_main]

use libfuzzer_sys::fuzz_target;
use seos::image::FrameIter;

fuzz_target!(|data: &[u8]| {
    // The region is bounded, so the frame count is too; the take() is a
    // backstop against an iterator bug looping forever.
    for frame in FrameIter::new(data).take(100_000) {
        assert!(
            frame.payload_off + frame.payload_len <= data.len(),
            "payload escapes the region"
        );
        assert!(
            frame.header_off() + frame.total_len() <= data.len(),
            "frame extends past the region"
        );

        let _ = frame.payload(data);
        let _ = frame.app_header(data);
        let _ = frame.valid_app(data);
        let _ = frame.verify_crc(data);
    }
});
