//! The kernel: task table, event dispatch, and app lifecycle.
//!
//! A single cooperative dispatcher thread owns every piece of mutable
//! kernel state.  Interrupt-context producers only ever touch the event
//! queue; everything else — subscription sets, the task table, the
//! retention handle — is mutated exclusively inside the dispatch loop.
//! The public API therefore never changes shared state inline: each
//! call allocates a small descriptor from the slab and posts it as an
//! internal event for the dispatcher to apply.
//!
//! ```text
//!  driver / ISR ──enqueue──▶ ┌─────────────────────────────┐
//!                            │           Kernel            │
//!  app (via EventCtx) ──────▶│  EVQ · slab · tasks · host  │──▶ AppHost
//!                            └─────────────────────────────┘
//!                                        │
//!                             SharedRegion (app images)
//! ```

pub mod dispatch;
pub mod lifecycle;

pub use dispatch::{DeferredCallback, EventCtx, RetainedEvent};
pub use lifecycle::{AppIdSelector, MgmtStatus};

use log::warn;

use crate::events::{EventData, EventDescriptor, FreeFn, FreeInfo, FIRST_USER_EVENT};
use crate::image::FrameIter;
use crate::ports::{AppHost, InternalApp, SharedRegion};
use crate::tasks::{TaskTable, Tid};

use dispatch::EventCore;

/// The sensor-hub micro-kernel.
///
/// Generic over the app host (CPU/ABI glue) and the shared flash
/// region so the whole thing runs against mocks in tests.
pub struct Kernel<H: AppHost, R: SharedRegion> {
    pub(crate) core: EventCore,
    pub(crate) tasks: TaskTable,
    pub(crate) internal_apps: Vec<InternalApp>,
    pub(crate) host: H,
    pub(crate) region: R,
}

impl<H: AppHost, R: SharedRegion> Kernel<H, R> {
    /// Build a kernel over `host` and `region`.  `internal_apps` is the
    /// host-provided ROM app list; call [`Kernel::boot`] to start them.
    pub fn new(host: H, region: R, internal_apps: Vec<InternalApp>) -> Self {
        Self {
            core: EventCore::new(),
            tasks: TaskTable::new(),
            internal_apps,
            host,
            region,
        }
    }

    // ── Introspection ─────────────────────────────────────────

    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    /// Number of events waiting for dispatch.
    pub fn pending_events(&self) -> usize {
        self.core.evq.len()
    }

    // ── Event posting API ─────────────────────────────────────
    //
    // All of these return `false` on resource exhaustion (queue full or
    // slab empty) with no partial mutation.

    /// Subscribe `tid` to event type `evt` (applied at dispatch time).
    pub fn subscribe(&mut self, tid: Tid, evt: u32) -> bool {
        self.core.subscribe(tid, evt)
    }

    /// Remove `tid`'s subscription to `evt` (applied at dispatch time).
    pub fn unsubscribe(&mut self, tid: Tid, evt: u32) -> bool {
        self.core.unsubscribe(tid, evt)
    }

    /// Run `callback(ctx, cookie)` from the dispatcher loop.  `urgent`
    /// schedules it ahead of already-queued user events.
    pub fn defer(&mut self, callback: DeferredCallback, cookie: usize, urgent: bool) -> bool {
        self.core.defer(callback, cookie, urgent)
    }

    /// Broadcast a user event to subscribed tasks.
    pub fn enqueue(&mut self, evt_type: u32, data: EventData, free_fn: Option<FreeFn>) -> bool {
        self.core
            .enqueue_user(evt_type, data, free_info_from(free_fn))
    }

    /// [`Kernel::enqueue`], but on failure the payload is freed
    /// immediately instead of leaking.
    pub fn enqueue_or_free(
        &mut self,
        evt_type: u32,
        data: EventData,
        free_fn: Option<FreeFn>,
    ) -> bool {
        self.core.enqueue_user_or_free(evt_type, data, free_fn)
    }

    /// Broadcast a user event whose payload belongs to the app
    /// `from_tid`; that app's free handler releases it after dispatch.
    pub fn enqueue_as_app(&mut self, evt_type: u32, data: EventData, from_tid: Tid) -> bool {
        self.core
            .enqueue_user(evt_type, data, FreeInfo::AppTid(from_tid))
    }

    /// Deliver `evt_type` to exactly one task, bypassing subscriptions.
    pub fn enqueue_private(
        &mut self,
        evt_type: u32,
        data: EventData,
        free_fn: Option<FreeFn>,
        to_tid: Tid,
    ) -> bool {
        self.core
            .enqueue_private(evt_type, data, free_info_from(free_fn), to_tid)
    }

    /// Private delivery with an app-owned payload.
    pub fn enqueue_private_as_app(
        &mut self,
        evt_type: u32,
        data: EventData,
        from_tid: Tid,
        to_tid: Tid,
    ) -> bool {
        self.core
            .enqueue_private(evt_type, data, FreeInfo::AppTid(from_tid), to_tid)
    }

    // ── Queries ───────────────────────────────────────────────

    /// TID of the live task hosting `app_id`, if any.
    pub fn tid_by_id(&self, app_id: u64) -> Option<Tid> {
        self.tasks.find_by_app_id(app_id).map(|t| t.tid)
    }

    /// Look up an app (internal first, then valid external frames in
    /// scan order) by its ID.
    pub fn app_info_by_id(&self, app_id: u64) -> Option<AppInfo> {
        app_info_lookup(&self.internal_apps, self.region.bytes(), app_id)
    }

    /// Enumerate apps by index (internal apps precede external ones).
    pub fn app_info_by_index(&self, index: usize) -> Option<AppInfo> {
        app_info_at(&self.internal_apps, self.region.bytes(), index)
    }
}

/// App enumeration record returned by the info queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppInfo {
    pub index: usize,
    pub app_id: u64,
    pub app_version: u32,
    /// Image size in bytes (the header's end-of-image offset).
    pub size: u32,
}

fn free_info_from(free_fn: Option<FreeFn>) -> FreeInfo {
    match free_fn {
        Some(f) => FreeInfo::Callback(f),
        None => FreeInfo::None,
    }
}

/// Guard for producer-supplied event types: anything below the user
/// range would be misrouted as an internal descriptor.
pub(crate) fn user_event_guard(evt_type: u32) -> bool {
    if crate::events::masked_type(evt_type) < FIRST_USER_EVENT {
        warn!("rejecting user enqueue of reserved event type {evt_type:#x}");
        debug_assert!(false, "user enqueue of reserved event type");
        return false;
    }
    true
}

pub(crate) fn internal_descriptor(evt_type: u32, slot: usize) -> EventDescriptor {
    EventDescriptor::new(evt_type, EventData(slot), FreeInfo::None)
}

// ── App enumeration (shared by Kernel and EventCtx) ──────────

pub(crate) fn app_info_at(
    internal: &[InternalApp],
    region: &[u8],
    index: usize,
) -> Option<AppInfo> {
    if let Some(app) = internal.get(index) {
        return Some(AppInfo {
            index,
            app_id: app.header.app_id,
            app_version: app.header.app_version,
            size: app.header.image_end_offset,
        });
    }
    let mut next = internal.len();
    for frame in FrameIter::new(region) {
        if let Some(header) = frame.valid_app(region) {
            if next == index {
                return Some(AppInfo {
                    index,
                    app_id: header.app_id,
                    app_version: header.app_version,
                    size: header.image_end_offset,
                });
            }
            next += 1;
        }
    }
    None
}

pub(crate) fn app_info_lookup(
    internal: &[InternalApp],
    region: &[u8],
    app_id: u64,
) -> Option<AppInfo> {
    let mut index = 0;
    for app in internal {
        if app.header.app_id == app_id {
            return Some(AppInfo {
                index,
                app_id,
                app_version: app.header.app_version,
                size: app.header.image_end_offset,
            });
        }
        index += 1;
    }
    for frame in FrameIter::new(region) {
        if let Some(header) = frame.valid_app(region) {
            if header.app_id == app_id {
                return Some(AppInfo {
                    index,
                    app_id,
                    app_version: header.app_version,
                    size: header.image_end_offset,
                });
            }
            index += 1;
        }
    }
    None
}
