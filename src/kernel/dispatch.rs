//! Event dispatcher: the single consumer of the event queue.
//!
//! Dispatch of one descriptor:
//!
//! 1. Dequeue `(type, data, free_info)`.
//! 2. Publish the current-event retention handle (broadcast events
//!    only — internal descriptors carry no user free-info).
//! 3. Route: internal codes are applied to kernel state; user events
//!    are broadcast to every subscribed task.
//! 4. If no app retained the event, run its free action and clear the
//!    handle.
//!
//! ## Ownership of in-flight payloads
//!
//! Exactly one party frees each payload.  The dispatcher does it by
//! default; [`EventCtx::retain_current_event`] transfers that duty to
//! the calling app, which discharges it through `free_retained_event`.
//! [`RetainedEvent`] is a linear token — it cannot be copied, so the
//! free action cannot run twice.
//!
//! Private deliveries are non-retainable: the handle stays cleared
//! around the target app's handler and the inner free-info is honored
//! afterwards no matter what the app did.

use log::warn;

use crate::error::fatal_error;
use crate::events::{
    masked_type, EventData, EventDescriptor, FreeFn, FreeInfo, EVT_APP_FREE_EVT_DATA,
    EVT_DEFERRED_CALLBACK, EVT_PRIVATE_EVT, EVT_SUBSCRIBE, EVT_UNSUBSCRIBE,
};
use crate::evq::{Enqueued, EventQueue};
use crate::ports::{AppHost, InternalApp, SharedRegion};
use crate::slab::Slab;
use crate::tasks::{TaskTable, Tid};

use super::{
    app_info_at, app_info_lookup, free_info_from, internal_descriptor, user_event_guard, AppInfo,
    Kernel,
};

/// Concurrent internal events the slab can hold.
pub(crate) const INTERNAL_EVT_SLOTS: usize = 64;

/// Deferred work queued through [`EventCtx::defer`]; runs synchronously
/// inside the dispatch loop.
pub type DeferredCallback = fn(&mut EventCtx<'_>, usize);

/// Slab-allocated descriptor for one internal event.
#[derive(Debug, Clone, Copy)]
pub(crate) enum InternalEvent {
    Subscribe {
        tid: Tid,
        evt: u32,
    },
    Unsubscribe {
        tid: Tid,
        evt: u32,
    },
    Defer {
        callback: DeferredCallback,
        cookie: usize,
    },
    Private {
        evt_type: u32,
        data: EventData,
        free: FreeInfo,
        to_tid: Tid,
    },
}

/// Ownership token for a retained in-flight event.  Produced by
/// `retain_current_event`, consumed by `free_retained_event`.
#[must_use = "a retained event's payload leaks unless freed"]
pub struct RetainedEvent {
    pub(crate) free: FreeInfo,
}

// ---------------------------------------------------------------------------
// EventCore: queue + slab + retention handle
// ---------------------------------------------------------------------------

/// The dispatcher-owned event plumbing, split from the kernel so app
/// handlers can borrow it while the task table stays shared.
pub(crate) struct EventCore {
    pub(crate) evq: EventQueue,
    pub(crate) slab: Slab<InternalEvent, INTERNAL_EVT_SLOTS>,
    /// Free-info of the event currently being broadcast; `None` once
    /// taken by retention or outside broadcast.
    pub(crate) retention: Option<FreeInfo>,
}

impl EventCore {
    pub(crate) fn new() -> Self {
        Self {
            evq: EventQueue::new(),
            slab: Slab::new(),
            retention: None,
        }
    }

    fn post_internal(&mut self, evt_type: u32, desc: InternalEvent, urgent: bool) -> bool {
        let Some(slot) = self.slab.alloc(desc) else {
            return false;
        };
        match self.evq.enqueue(internal_descriptor(evt_type, slot), urgent) {
            Ok(Enqueued::Ok) => true,
            Ok(Enqueued::Evicted(victim)) => {
                self.release_discarded(victim);
                true
            }
            Err(_rejected) => {
                self.slab.free(slot);
                false
            }
        }
    }

    pub(crate) fn subscribe(&mut self, tid: Tid, evt: u32) -> bool {
        self.post_internal(EVT_SUBSCRIBE, InternalEvent::Subscribe { tid, evt }, false)
    }

    pub(crate) fn unsubscribe(&mut self, tid: Tid, evt: u32) -> bool {
        self.post_internal(
            EVT_UNSUBSCRIBE,
            InternalEvent::Unsubscribe { tid, evt },
            false,
        )
    }

    pub(crate) fn defer(&mut self, callback: DeferredCallback, cookie: usize, urgent: bool) -> bool {
        self.post_internal(
            EVT_DEFERRED_CALLBACK,
            InternalEvent::Defer { callback, cookie },
            urgent,
        )
    }

    pub(crate) fn enqueue_user(&mut self, evt_type: u32, data: EventData, free: FreeInfo) -> bool {
        if !user_event_guard(evt_type) {
            return false;
        }
        match self
            .evq
            .enqueue(EventDescriptor::new(evt_type, data, free), false)
        {
            Ok(Enqueued::Ok) => true,
            Ok(Enqueued::Evicted(victim)) => {
                self.release_discarded(victim);
                true
            }
            Err(_rejected) => false,
        }
    }

    pub(crate) fn enqueue_user_or_free(
        &mut self,
        evt_type: u32,
        data: EventData,
        free_fn: Option<FreeFn>,
    ) -> bool {
        if self.enqueue_user(evt_type, data, free_info_from(free_fn)) {
            return true;
        }
        if let Some(f) = free_fn {
            f(masked_type(evt_type), data);
        }
        false
    }

    pub(crate) fn enqueue_private(
        &mut self,
        evt_type: u32,
        data: EventData,
        free: FreeInfo,
        to_tid: Tid,
    ) -> bool {
        self.post_internal(
            EVT_PRIVATE_EVT,
            InternalEvent::Private {
                evt_type,
                data,
                free,
                to_tid,
            },
            false,
        )
    }

    pub(crate) fn retain_current_event(&mut self) -> Option<RetainedEvent> {
        self.retention.take().map(|free| RetainedEvent { free })
    }

    /// Free action for contexts that cannot re-enter the app host (an
    /// app is on the call stack): callbacks run inline, app-owned
    /// payloads are released through a queued private delivery.
    fn release_deferred(&mut self, evt_type: u32, data: EventData, free: FreeInfo) {
        match free {
            FreeInfo::None => {}
            FreeInfo::Callback(f) => f(masked_type(evt_type), data),
            FreeInfo::AppTid(tid) => {
                let posted = self.post_internal(
                    EVT_PRIVATE_EVT,
                    InternalEvent::Private {
                        evt_type: EVT_APP_FREE_EVT_DATA,
                        data,
                        free: FreeInfo::None,
                        to_tid: tid,
                    },
                    true,
                );
                if !posted {
                    warn!(
                        "dropping payload free for event {evt_type:#x}: queue exhausted"
                    );
                }
            }
        }
    }

    /// Queue-eviction cleanup.  Only user events are evictable
    /// (internal descriptors never carry the discardable bit).
    fn release_discarded(&mut self, victim: EventDescriptor) {
        self.release_deferred(victim.evt_type, victim.data, victim.free);
    }
}

// ---------------------------------------------------------------------------
// EventCtx: the kernel as apps see it mid-dispatch
// ---------------------------------------------------------------------------

/// Borrow-limited view of the kernel handed to app handlers and
/// deferred callbacks.  Posting is live; task/app state is read-only —
/// mutations are applied when the posted descriptor dispatches.
pub struct EventCtx<'a> {
    pub(crate) core: &'a mut EventCore,
    pub(crate) tasks: &'a TaskTable,
    pub(crate) internal_apps: &'a [InternalApp],
    pub(crate) region: &'a [u8],
}

impl EventCtx<'_> {
    pub fn subscribe(&mut self, tid: Tid, evt: u32) -> bool {
        self.core.subscribe(tid, evt)
    }

    pub fn unsubscribe(&mut self, tid: Tid, evt: u32) -> bool {
        self.core.unsubscribe(tid, evt)
    }

    pub fn defer(&mut self, callback: DeferredCallback, cookie: usize, urgent: bool) -> bool {
        self.core.defer(callback, cookie, urgent)
    }

    pub fn enqueue(&mut self, evt_type: u32, data: EventData, free_fn: Option<FreeFn>) -> bool {
        self.core
            .enqueue_user(evt_type, data, free_info_from(free_fn))
    }

    pub fn enqueue_or_free(
        &mut self,
        evt_type: u32,
        data: EventData,
        free_fn: Option<FreeFn>,
    ) -> bool {
        self.core.enqueue_user_or_free(evt_type, data, free_fn)
    }

    pub fn enqueue_as_app(&mut self, evt_type: u32, data: EventData, from_tid: Tid) -> bool {
        self.core
            .enqueue_user(evt_type, data, FreeInfo::AppTid(from_tid))
    }

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

    /// Take ownership of the event currently being dispatched to this
    /// app.  Returns `None` when there is nothing to retain (not in a
    /// broadcast, or another handler already took it).
    pub fn retain_current_event(&mut self) -> Option<RetainedEvent> {
        self.core.retain_current_event()
    }

    /// Discharge a retained event: performs exactly the free action the
    /// dispatcher would have performed.
    pub fn free_retained_event(&mut self, evt_type: u32, data: EventData, retained: RetainedEvent) {
        self.core.release_deferred(evt_type, data, retained.free);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn tid_by_id(&self, app_id: u64) -> Option<Tid> {
        self.tasks.find_by_app_id(app_id).map(|t| t.tid)
    }

    pub fn app_info_by_id(&self, app_id: u64) -> Option<AppInfo> {
        app_info_lookup(self.internal_apps, self.region, app_id)
    }

    pub fn app_info_by_index(&self, index: usize) -> Option<AppInfo> {
        app_info_at(self.internal_apps, self.region, index)
    }
}

// ---------------------------------------------------------------------------
// Dispatch loop
// ---------------------------------------------------------------------------

impl<H: AppHost, R: SharedRegion> Kernel<H, R> {
    /// Dispatch one queued event.  Returns `false` when the queue is
    /// empty — the point where an embedding may yield to a hardware
    /// sleep primitive.
    pub fn dispatch_one(&mut self) -> bool {
        let Some(item) = self.core.evq.dequeue() else {
            return false;
        };
        if item.is_internal() {
            self.handle_internal(item);
        } else {
            self.broadcast(item);
        }
        true
    }

    /// Drain the queue; returns the number of events dispatched.
    pub fn dispatch_all(&mut self) -> usize {
        let mut count = 0;
        while self.dispatch_one() {
            count += 1;
        }
        count
    }

    /// Take ownership of the in-flight event (dispatcher-context
    /// callers; apps use [`EventCtx::retain_current_event`]).
    pub fn retain_current_event(&mut self) -> Option<RetainedEvent> {
        self.core.retain_current_event()
    }

    /// Discharge a retained event from dispatcher context.
    pub fn free_retained_event(&mut self, evt_type: u32, data: EventData, retained: RetainedEvent) {
        let Kernel {
            core,
            tasks,
            internal_apps,
            host,
            region,
        } = self;
        Self::run_free_action(
            host,
            core,
            tasks,
            internal_apps.as_slice(),
            region.bytes(),
            masked_type(evt_type),
            data,
            retained.free,
        );
    }

    // ── Broadcast ─────────────────────────────────────────────

    fn broadcast(&mut self, item: EventDescriptor) {
        let masked = masked_type(item.evt_type);
        let Kernel {
            core,
            tasks,
            internal_apps,
            host,
            region,
        } = self;
        let region_bytes = region.bytes();

        core.retention = Some(item.free);
        for idx in 0..tasks.len() {
            let Some(task) = tasks.get(idx) else {
                break;
            };
            if !task.subs.contains(masked) {
                continue;
            }
            let instance = task.host_info;
            let mut ctx = EventCtx {
                core: &mut *core,
                tasks: &*tasks,
                internal_apps: internal_apps.as_slice(),
                region: region_bytes,
            };
            host.handle(instance, &mut ctx, masked, item.data);
        }
        if let Some(free) = core.retention.take() {
            Self::run_free_action(
                host,
                core,
                tasks,
                internal_apps.as_slice(),
                region_bytes,
                masked,
                item.data,
                free,
            );
        }
    }

    // ── Internal events ───────────────────────────────────────

    fn handle_internal(&mut self, item: EventDescriptor) {
        let Some(desc) = self.core.slab.free(item.data.0) else {
            // The slab slot is the descriptor's identity; a miss means
            // kernel state is corrupt.
            fatal_error("internal event references a stale slab descriptor");
        };
        match desc {
            InternalEvent::Subscribe { tid, evt } => match self.tasks.find_by_tid_mut(tid) {
                Some(task) => {
                    if !task.subs.insert(evt) {
                        warn!("subscription dropped (alloc failure): tid {} evt {evt:#x}", tid.0);
                    }
                }
                None => warn!("subscribe for unknown tid {}", tid.0),
            },
            InternalEvent::Unsubscribe { tid, evt } => match self.tasks.find_by_tid_mut(tid) {
                Some(task) => {
                    task.subs.remove(evt);
                }
                None => warn!("unsubscribe for unknown tid {}", tid.0),
            },
            InternalEvent::Defer { callback, cookie } => {
                let Kernel {
                    core,
                    tasks,
                    internal_apps,
                    region,
                    ..
                } = self;
                let mut ctx = EventCtx {
                    core,
                    tasks: &*tasks,
                    internal_apps: internal_apps.as_slice(),
                    region: region.bytes(),
                };
                callback(&mut ctx, cookie);
            }
            InternalEvent::Private {
                evt_type,
                data,
                free,
                to_tid,
            } => self.deliver_private(evt_type, data, free, to_tid),
        }
    }

    /// Private delivery: retention is disabled around the handler call
    /// and the inner free-info is honored regardless.
    fn deliver_private(&mut self, evt_type: u32, data: EventData, free: FreeInfo, to_tid: Tid) {
        let masked = masked_type(evt_type);
        let Kernel {
            core,
            tasks,
            internal_apps,
            host,
            region,
        } = self;
        let region_bytes = region.bytes();

        debug_assert!(core.retention.is_none());
        match tasks.find_by_tid(to_tid) {
            Some(task) => {
                let instance = task.host_info;
                let mut ctx = EventCtx {
                    core: &mut *core,
                    tasks: &*tasks,
                    internal_apps: internal_apps.as_slice(),
                    region: region_bytes,
                };
                host.handle(instance, &mut ctx, masked, data);
            }
            None => warn!("private event {masked:#x} for unknown tid {}; dropped", to_tid.0),
        }
        Self::run_free_action(
            host,
            core,
            tasks,
            internal_apps.as_slice(),
            region_bytes,
            masked,
            data,
            free,
        );
    }

    // ── Free actions ──────────────────────────────────────────

    /// Dispatcher-context free: callbacks run inline, app-owned
    /// payloads are released by delivering `EVT_APP_FREE_EVT_DATA`
    /// synchronously (retention stays cleared).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run_free_action(
        host: &mut H,
        core: &mut EventCore,
        tasks: &TaskTable,
        internal_apps: &[InternalApp],
        region: &[u8],
        evt_type: u32,
        data: EventData,
        free: FreeInfo,
    ) {
        match free {
            FreeInfo::None => {}
            FreeInfo::Callback(f) => f(evt_type, data),
            FreeInfo::AppTid(tid) => match tasks.find_by_tid(tid) {
                Some(task) => {
                    let instance = task.host_info;
                    let mut ctx = EventCtx {
                        core,
                        tasks,
                        internal_apps,
                        region,
                    };
                    host.handle(instance, &mut ctx, EVT_APP_FREE_EVT_DATA, data);
                }
                None => warn!(
                    "payload owner tid {} gone; dropping free for event {evt_type:#x}",
                    tid.0
                ),
            },
        }
    }
}
