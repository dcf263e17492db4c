//! Event model: type codes, opaque payloads, and free-info tags.
//!
//! Every event in the system is a `(type, data, free_info)` triple.
//! The kernel never interprets `data` — producers and consumers agree on
//! its meaning per event type.  `free_info` records who releases the
//! payload once the event has been dispatched:
//!
//! ```text
//! ┌───────────┬──────────────────────────────────────────────┐
//! │ None      │ nothing to free                              │
//! │ Callback  │ direct free function, called by the kernel   │
//! │ AppTid    │ payload belongs to an app; the kernel        │
//! │           │ delivers EVT_APP_FREE_EVT_DATA to that app   │
//! └───────────┴──────────────────────────────────────────────┘
//! ```

use crate::tasks::Tid;

// ── Internal event type codes (< FIRST_USER_EVENT) ────────────

/// Deferred subscription request, carries `(tid, evt)`.
pub const EVT_SUBSCRIBE: u32 = 0x0000_0001;
/// Deferred unsubscription request, carries `(tid, evt)`.
pub const EVT_UNSUBSCRIBE: u32 = 0x0000_0002;
/// Deferred callback, carries `(callback, cookie)`.
pub const EVT_DEFERRED_CALLBACK: u32 = 0x0000_0003;
/// Privately addressed event, carries `(inner_type, inner_data,
/// inner_free, to_tid)`.
pub const EVT_PRIVATE_EVT: u32 = 0x0000_0004;
/// Delivered privately to an app that owns an event payload; the app
/// must release the payload referenced by `data`.
pub const EVT_APP_FREE_EVT_DATA: u32 = 0x0000_0005;

/// First event code routed by broadcast rather than handled internally.
pub const FIRST_USER_EVENT: u32 = 0x0000_0100;

/// Producers may set this bit to mark an event droppable under queue
/// pressure.  The bit is masked off before subscription matching.
pub const EVENT_TYPE_BIT_DISCARDABLE: u32 = 0x8000_0000;

/// Strip routing-only bits from an event type.
pub const fn masked_type(evt_type: u32) -> u32 {
    evt_type & !EVENT_TYPE_BIT_DISCARDABLE
}

// ── Payload and free-info ─────────────────────────────────────

/// Opaque event payload word.  On hardware this is a pointer into a
/// driver buffer or heap block; the kernel only moves it around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventData(pub usize);

impl EventData {
    /// Payload-free events carry this.
    pub const NONE: EventData = EventData(0);
}

/// Direct free callback: `(masked event type, payload)`.
pub type FreeFn = fn(u32, EventData);

/// Tagged free action for an event payload.
#[derive(Debug, Clone, Copy)]
pub enum FreeInfo {
    /// No free action required.
    None,
    /// Call this function with the masked type and payload.
    Callback(FreeFn),
    /// The payload belongs to the app with this TID; it is released by
    /// delivering [`EVT_APP_FREE_EVT_DATA`] to that app.
    AppTid(Tid),
}

impl FreeInfo {
    pub fn is_none(&self) -> bool {
        matches!(self, FreeInfo::None)
    }
}

/// One queued event.  The queue owns the descriptor until dequeue; the
/// dispatcher then owns it until the free action has run (or ownership
/// is transferred by retention).
#[derive(Debug, Clone, Copy)]
pub struct EventDescriptor {
    pub evt_type: u32,
    pub data: EventData,
    pub free: FreeInfo,
}

impl EventDescriptor {
    pub fn new(evt_type: u32, data: EventData, free: FreeInfo) -> Self {
        Self {
            evt_type,
            data,
            free,
        }
    }

    /// True when the producer marked this event droppable.
    pub fn is_discardable(&self) -> bool {
        self.evt_type & EVENT_TYPE_BIT_DISCARDABLE != 0
    }

    /// True when the dispatcher handles this event internally rather
    /// than broadcasting it.
    pub fn is_internal(&self) -> bool {
        self.evt_type < FIRST_USER_EVENT
    }
}
