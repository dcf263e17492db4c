//! Bounded event queue — the sole boundary between producer contexts
//! and the single-consumer dispatcher.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ Driver ISRs │────▶│                  │────▶│              │
//! │ Timer hooks │────▶│   Event Queue    │     │  Dispatcher  │
//! │ Kernel API  │────▶│  (FIFO, bounded) │     │  (consumer)  │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! Ordering is FIFO for ordinary enqueues; `urgent` inserts at the head
//! (LIFO relative to other urgent items).  On overflow the queue evicts
//! the oldest discardable descriptor to admit a non-discardable one;
//! the evicted descriptor is handed back to the enqueuing boundary,
//! which must run its free action.  Producers on hardware bracket the
//! enqueue call with their platform's brief IRQ-disable primitive; the
//! queue itself carries no locking.

use std::collections::VecDeque;

use crate::events::EventDescriptor;

/// Maximum number of pending events.
pub const EVQ_CAP: usize = 512;

/// Outcome of a successful enqueue.
#[derive(Debug)]
pub enum Enqueued {
    /// Inserted without eviction.
    Ok,
    /// Inserted after evicting the oldest discardable descriptor.
    /// The caller now owns the eviction and must free its payload.
    Evicted(EventDescriptor),
}

/// Bounded FIFO of event descriptors.
pub struct EventQueue {
    items: VecDeque<EventDescriptor>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::with_capacity(EVQ_CAP),
        }
    }

    /// Insert a descriptor.  On a full queue, a non-discardable
    /// descriptor evicts the oldest discardable one; a discardable
    /// descriptor is rejected outright.  `Err` returns the descriptor
    /// unqueued so the caller can release its payload.
    pub fn enqueue(
        &mut self,
        item: EventDescriptor,
        urgent: bool,
    ) -> core::result::Result<Enqueued, EventDescriptor> {
        let mut evicted = None;
        if self.items.len() == EVQ_CAP {
            if item.is_discardable() {
                return Err(item);
            }
            let Some(victim_idx) = self.items.iter().position(EventDescriptor::is_discardable)
            else {
                return Err(item);
            };
            evicted = self.items.remove(victim_idx);
        }

        if urgent {
            self.items.push_front(item);
        } else {
            self.items.push_back(item);
        }

        Ok(match evicted {
            Some(victim) => Enqueued::Evicted(victim),
            None => Enqueued::Ok,
        })
    }

    /// Remove and return the next descriptor (single consumer).
    pub fn dequeue(&mut self) -> Option<EventDescriptor> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventData, FreeInfo, EVENT_TYPE_BIT_DISCARDABLE, FIRST_USER_EVENT};

    fn evt(code: u32) -> EventDescriptor {
        EventDescriptor::new(code, EventData::NONE, FreeInfo::None)
    }

    #[test]
    fn fifo_ordering() {
        let mut q = EventQueue::new();
        for code in [0x100, 0x101, 0x102] {
            assert!(q.enqueue(evt(code), false).is_ok());
        }
        assert_eq!(q.dequeue().unwrap().evt_type, 0x100);
        assert_eq!(q.dequeue().unwrap().evt_type, 0x101);
        assert_eq!(q.dequeue().unwrap().evt_type, 0x102);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn urgent_inserts_at_head() {
        let mut q = EventQueue::new();
        q.enqueue(evt(0x100), false).unwrap();
        q.enqueue(evt(0x101), true).unwrap();
        q.enqueue(evt(0x102), true).unwrap();
        // Urgent items are LIFO relative to each other.
        assert_eq!(q.dequeue().unwrap().evt_type, 0x102);
        assert_eq!(q.dequeue().unwrap().evt_type, 0x101);
        assert_eq!(q.dequeue().unwrap().evt_type, 0x100);
    }

    #[test]
    fn full_queue_rejects() {
        let mut q = EventQueue::new();
        for _ in 0..EVQ_CAP {
            q.enqueue(evt(0x100), false).unwrap();
        }
        assert!(q.enqueue(evt(0x101), false).is_err());
        assert_eq!(q.len(), EVQ_CAP);
    }

    #[test]
    fn overflow_evicts_oldest_discardable() {
        let mut q = EventQueue::new();
        q.enqueue(evt(0x200 | EVENT_TYPE_BIT_DISCARDABLE), false)
            .unwrap();
        for _ in 0..EVQ_CAP - 1 {
            q.enqueue(evt(0x100), false).unwrap();
        }
        match q.enqueue(evt(0x101), false) {
            Ok(Enqueued::Evicted(victim)) => {
                assert_eq!(victim.evt_type & !EVENT_TYPE_BIT_DISCARDABLE, 0x200);
            }
            other => panic!("expected eviction, got {other:?}"),
        }
        // The evicted slot admitted the new event.
        assert_eq!(q.len(), EVQ_CAP);
    }

    #[test]
    fn discardable_dropped_when_full() {
        let mut q = EventQueue::new();
        for _ in 0..EVQ_CAP {
            q.enqueue(evt(FIRST_USER_EVENT), false).unwrap();
        }
        let item = evt(0x300 | EVENT_TYPE_BIT_DISCARDABLE);
        assert!(q.enqueue(item, false).is_err());
    }
}
