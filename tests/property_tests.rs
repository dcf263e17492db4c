//! Property tests for the kernel's core data structures.
//!
//! Runs on host targets only — proptest is not available on device.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;
use std::collections::HashSet;
use std::collections::VecDeque;

use seos::events::{EventData, EventDescriptor, FreeInfo, FIRST_USER_EVENT};
use seos::evq::{Enqueued, EventQueue};
use seos::image::FrameIter;
use seos::kernel::MgmtStatus;
use seos::tasks::{AppImageRef, EventSet, TaskTable, Tid, MAX_TASKS};

// ── MgmtStatus packing ────────────────────────────────────────

proptest! {
    /// Packing and unpacking are inverse for every counter value.
    #[test]
    fn mgmt_status_roundtrip(app: u8, task: u8, op: u8, erase: u8) {
        let status = MgmtStatus { app, task, op, erase };
        prop_assert_eq!(MgmtStatus::from_bits(status.to_bits()), status);
    }

    /// Each counter occupies its own byte lane.
    #[test]
    fn mgmt_status_lanes_do_not_interfere(app: u8, task: u8, op: u8, erase: u8) {
        let bits = MgmtStatus { app, task, op, erase }.to_bits();
        prop_assert_eq!(bits as u8, op);
        prop_assert_eq!((bits >> 8) as u8, erase);
        prop_assert_eq!((bits >> 16) as u8, task);
        prop_assert_eq!((bits >> 24) as u8, app);
    }
}

// ── EventSet vs. model ────────────────────────────────────────

#[derive(Debug, Clone)]
enum SetOp {
    Insert(u32),
    Remove(u32),
}

fn arb_set_op() -> impl Strategy<Value = SetOp> {
    // A small event domain keeps collisions frequent.
    prop_oneof![
        (0u32..24).prop_map(|e| SetOp::Insert(FIRST_USER_EVENT + e)),
        (0u32..24).prop_map(|e| SetOp::Remove(FIRST_USER_EVENT + e)),
    ]
}

proptest! {
    /// The subscription set behaves like a set: no duplicates, exact
    /// membership, length matching a reference model.
    #[test]
    fn event_set_matches_model(ops in proptest::collection::vec(arb_set_op(), 1..=64)) {
        let mut set = EventSet::new();
        let mut model: HashSet<u32> = HashSet::new();

        for op in &ops {
            match op {
                SetOp::Insert(evt) => {
                    prop_assert!(set.insert(*evt));
                    model.insert(*evt);
                }
                SetOp::Remove(evt) => {
                    let removed = set.remove(*evt);
                    prop_assert_eq!(removed, model.remove(evt));
                }
            }
            prop_assert_eq!(set.len(), model.len());
            prop_assert!(set.len() <= set.capacity());
        }
        for evt in &model {
            prop_assert!(set.contains(*evt));
        }
    }

    /// Insert twice == insert once; insert-then-remove restores.
    #[test]
    fn event_set_idempotence(evt in 0u32..1024) {
        let mut set = EventSet::new();
        set.insert(evt);
        let len_once = set.len();
        set.insert(evt);
        prop_assert_eq!(set.len(), len_once);

        set.remove(evt);
        prop_assert!(!set.contains(evt));
        prop_assert_eq!(set.len(), 0);
    }
}

// ── Task table TID invariants ─────────────────────────────────

#[derive(Debug, Clone)]
enum TableOp {
    Insert(u8),
    RemoveNth(u8),
}

fn arb_table_op() -> impl Strategy<Value = TableOp> {
    prop_oneof![
        any::<u8>().prop_map(TableOp::Insert),
        any::<u8>().prop_map(TableOp::RemoveNth),
    ]
}

proptest! {
    /// Under arbitrary insert/remove churn, live TIDs stay nonzero and
    /// pairwise distinct, and the table never exceeds its capacity.
    #[test]
    fn task_tids_unique_under_churn(ops in proptest::collection::vec(arb_table_op(), 1..=128)) {
        let mut table = TaskTable::new();
        let mut seq = 0u64;

        for op in &ops {
            match op {
                TableOp::Insert(_) => {
                    seq += 1;
                    let _ = table.insert(seq, 1, AppImageRef::Internal(seq as usize), 0);
                }
                TableOp::RemoveNth(n) => {
                    if !table.is_empty() {
                        let idx = *n as usize % table.len();
                        let tid = table.get(idx).unwrap().tid;
                        table.remove(tid);
                    }
                }
            }

            prop_assert!(table.len() <= MAX_TASKS);
            let tids: Vec<Tid> = table.iter().map(|t| t.tid).collect();
            for tid in &tids {
                prop_assert!(tid.0 != 0);
            }
            let unique: HashSet<u32> = tids.iter().map(|t| t.0).collect();
            prop_assert_eq!(unique.len(), tids.len());
        }
    }
}

// ── Event queue ordering vs. model ────────────────────────────

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue { code: u32, urgent: bool },
    Dequeue,
}

fn arb_queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        (0u32..64, any::<bool>())
            .prop_map(|(code, urgent)| QueueOp::Enqueue { code: FIRST_USER_EVENT + code, urgent }),
        Just(QueueOp::Dequeue),
    ]
}

proptest! {
    /// FIFO for ordinary enqueues, head insertion for urgent ones —
    /// verified against a VecDeque model.
    #[test]
    fn event_queue_matches_model(ops in proptest::collection::vec(arb_queue_op(), 1..=128)) {
        let mut queue = EventQueue::new();
        let mut model: VecDeque<u32> = VecDeque::new();

        for op in &ops {
            match op {
                QueueOp::Enqueue { code, urgent } => {
                    let item = EventDescriptor::new(*code, EventData::NONE, FreeInfo::None);
                    match queue.enqueue(item, *urgent) {
                        Ok(Enqueued::Ok) => {
                            if *urgent {
                                model.push_front(*code);
                            } else {
                                model.push_back(*code);
                            }
                        }
                        Ok(Enqueued::Evicted(_)) | Err(_) => {
                            // Capacity is 512; 128 ops cannot fill it.
                            prop_assert!(false, "unexpected overflow");
                        }
                    }
                }
                QueueOp::Dequeue => {
                    let got = queue.dequeue().map(|d| d.evt_type);
                    prop_assert_eq!(got, model.pop_front());
                }
            }
            prop_assert_eq!(queue.len(), model.len());
        }

        // Drain both and compare the tails.
        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(queue.dequeue().map(|d| d.evt_type), Some(expected));
        }
        prop_assert!(queue.dequeue().is_none());
    }
}

// ── Frame iterator robustness ─────────────────────────────────

proptest! {
    /// The iterator never panics and never yields a frame extending
    /// past the region, no matter the bytes.
    #[test]
    fn frame_iterator_stays_in_bounds(bytes in proptest::collection::vec(any::<u8>(), 0..=512)) {
        for frame in FrameIter::new(&bytes).take(1024) {
            prop_assert!(frame.payload_off + frame.payload_len <= bytes.len());
            prop_assert!(frame.header_off() + frame.total_len() <= bytes.len());
            // Accessors must not panic on any yielded frame.
            let _ = frame.payload(&bytes);
            let _ = frame.app_header(&bytes);
            let _ = frame.verify_crc(&bytes);
        }
    }
}
