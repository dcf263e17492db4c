//! Task table: the fixed-capacity registry of live apps.
//!
//! Each live task pairs a nonzero TID with the app image it was loaded
//! from, the host's opaque per-app state, and the set of event types it
//! subscribes to.  TIDs are assigned from a rotating counter that skips
//! values still in use, so a recycled table slot never aliases a stale
//! TID held by in-flight events.

use log::warn;

/// Maximum number of live tasks.
pub const MAX_TASKS: usize = 16;

/// Subscription slots embedded in the task record before the set is
/// promoted to heap-backed storage.
pub const EMBEDDED_SUBS: usize = 6;

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// Task identifier.  Nonzero for every live task; two live tasks never
/// share a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tid(pub u32);

/// Reference to the immutable app image a task was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppImageRef {
    /// Index into the boot-time internal app list.
    Internal(usize),
    /// Byte offset of the app header within the shared flash region.
    Flash(usize),
}

// ---------------------------------------------------------------------------
// Subscription set
// ---------------------------------------------------------------------------

/// Set of subscribed event types.
///
/// Starts in embedded storage ([`EMBEDDED_SUBS`] slots inside the task
/// record); the first overflowing insert copies it out to a heap vector
/// and subsequent growth multiplies capacity by 1.5 (rounded up).
/// Holds no duplicates.
pub struct EventSet {
    store: SetStore,
}

enum SetStore {
    Inline(heapless::Vec<u32, EMBEDDED_SUBS>),
    Spilled(Vec<u32>),
}

impl EventSet {
    pub fn new() -> Self {
        Self {
            store: SetStore::Inline(heapless::Vec::new()),
        }
    }

    pub fn contains(&self, evt: u32) -> bool {
        self.as_slice().contains(&evt)
    }

    /// Add `evt` if absent.  Returns `false` only when growth was
    /// needed and the allocation failed; a duplicate insert is a no-op
    /// reported as success.
    pub fn insert(&mut self, evt: u32) -> bool {
        if self.contains(evt) {
            return true;
        }
        match &mut self.store {
            SetStore::Inline(inline) => {
                if inline.push(evt).is_ok() {
                    return true;
                }
                // Embedded storage is full: promote to the heap at the
                // next 1.5x capacity step.
                let new_cap = grown_capacity(EMBEDDED_SUBS);
                let mut spilled = Vec::new();
                if spilled.try_reserve_exact(new_cap).is_err() {
                    return false;
                }
                spilled.extend_from_slice(inline);
                spilled.push(evt);
                self.store = SetStore::Spilled(spilled);
                true
            }
            SetStore::Spilled(spilled) => {
                if spilled.len() == spilled.capacity() {
                    let new_cap = grown_capacity(spilled.capacity());
                    let additional = new_cap - spilled.len();
                    if spilled.try_reserve_exact(additional).is_err() {
                        return false;
                    }
                }
                spilled.push(evt);
                true
            }
        }
    }

    /// Remove `evt` if present (swap-remove; order is not preserved).
    pub fn remove(&mut self, evt: u32) -> bool {
        let Some(idx) = self.as_slice().iter().position(|&e| e == evt) else {
            return false;
        };
        match &mut self.store {
            SetStore::Inline(inline) => {
                inline.swap_remove(idx);
            }
            SetStore::Spilled(spilled) => {
                spilled.swap_remove(idx);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn capacity(&self) -> usize {
        match &self.store {
            SetStore::Inline(_) => EMBEDDED_SUBS,
            SetStore::Spilled(spilled) => spilled.capacity(),
        }
    }

    fn as_slice(&self) -> &[u32] {
        match &self.store {
            SetStore::Inline(inline) => inline,
            SetStore::Spilled(spilled) => spilled,
        }
    }
}

impl Default for EventSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Next capacity step: ceil(cap * 1.5).
fn grown_capacity(cap: usize) -> usize {
    cap + cap.div_ceil(2)
}

// ---------------------------------------------------------------------------
// Task record and table
// ---------------------------------------------------------------------------

/// One live app.
pub struct Task {
    pub tid: Tid,
    pub app_id: u64,
    pub app_version: u32,
    pub image: AppImageRef,
    /// Opaque per-app state assigned by the app host at load time.
    pub host_info: u32,
    pub subs: EventSet,
}

/// Fixed-capacity table of live tasks.  Lookups are linear scans —
/// `MAX_TASKS` is small and the dispatch hot path iterates every task
/// anyway.  Removal swaps with the last slot; a task's position in the
/// array is never part of its identity.
pub struct TaskTable {
    tasks: heapless::Vec<Task, MAX_TASKS>,
    next_tid: u32,
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            tasks: heapless::Vec::new(),
            next_tid: 1,
        }
    }

    /// Add a task for the given image, assigning a fresh TID.
    /// Returns `None` when the table is full.
    pub fn insert(
        &mut self,
        app_id: u64,
        app_version: u32,
        image: AppImageRef,
        host_info: u32,
    ) -> Option<Tid> {
        if self.tasks.is_full() {
            warn!("task table full, cannot start app {app_id:#018x}");
            return None;
        }
        let tid = self.alloc_tid();
        let task = Task {
            tid,
            app_id,
            app_version,
            image,
            host_info,
            subs: EventSet::new(),
        };
        // Capacity was checked above.
        if self.tasks.push(task).is_err() {
            return None;
        }
        Some(tid)
    }

    /// Remove the task with `tid` (swap-with-last).
    pub fn remove(&mut self, tid: Tid) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.tid == tid)?;
        Some(self.tasks.swap_remove(idx))
    }

    pub fn find_by_tid(&self, tid: Tid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.tid == tid)
    }

    pub fn find_by_tid_mut(&mut self, tid: Tid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.tid == tid)
    }

    pub fn find_by_app_id(&self, app_id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.app_id == app_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next TID from the rotating counter, skipping zero and values
    /// still held by live tasks.
    fn alloc_tid(&mut self) -> Tid {
        loop {
            let candidate = self.next_tid;
            self.next_tid = self.next_tid.wrapping_add(1);
            if self.next_tid == 0 {
                self.next_tid = 1;
            }
            if candidate != 0 && self.find_by_tid(Tid(candidate)).is_none() {
                return Tid(candidate);
            }
        }
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_set_no_duplicates() {
        let mut set = EventSet::new();
        assert!(set.insert(0x100));
        assert!(set.insert(0x100));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn event_set_insert_remove_roundtrip() {
        let mut set = EventSet::new();
        set.insert(0x100);
        set.insert(0x101);
        assert!(set.remove(0x100));
        assert!(!set.remove(0x100));
        assert!(set.contains(0x101));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn event_set_spills_past_embedded_capacity() {
        let mut set = EventSet::new();
        for i in 0..EMBEDDED_SUBS as u32 + 4 {
            assert!(set.insert(0x100 + i));
        }
        assert_eq!(set.len(), EMBEDDED_SUBS + 4);
        for i in 0..EMBEDDED_SUBS as u32 + 4 {
            assert!(set.contains(0x100 + i));
        }
        assert!(set.capacity() >= set.len());
    }

    #[test]
    fn grown_capacity_rounds_up() {
        assert_eq!(grown_capacity(6), 9);
        assert_eq!(grown_capacity(9), 14);
        assert_eq!(grown_capacity(1), 2);
    }

    #[test]
    fn tids_are_unique_and_nonzero() {
        let mut tt = TaskTable::new();
        let a = tt
            .insert(0x1, 1, AppImageRef::Internal(0), 0)
            .unwrap();
        let b = tt
            .insert(0x2, 1, AppImageRef::Internal(1), 0)
            .unwrap();
        assert_ne!(a, b);
        assert_ne!(a.0, 0);
        assert_ne!(b.0, 0);
    }

    #[test]
    fn removed_tid_not_reused_immediately() {
        let mut tt = TaskTable::new();
        let a = tt.insert(0x1, 1, AppImageRef::Internal(0), 0).unwrap();
        tt.remove(a).unwrap();
        let b = tt.insert(0x2, 1, AppImageRef::Internal(1), 0).unwrap();
        // The counter rotates; a fresh insert must not recycle `a`.
        assert_ne!(a, b);
    }

    #[test]
    fn table_full_returns_none() {
        let mut tt = TaskTable::new();
        for i in 0..MAX_TASKS as u64 {
            assert!(tt.insert(i, 1, AppImageRef::Internal(i as usize), 0).is_some());
        }
        assert!(tt.insert(999, 1, AppImageRef::Internal(99), 0).is_none());
    }

    #[test]
    fn swap_remove_keeps_survivors() {
        let mut tt = TaskTable::new();
        let a = tt.insert(0x1, 1, AppImageRef::Internal(0), 0).unwrap();
        let b = tt.insert(0x2, 1, AppImageRef::Internal(1), 0).unwrap();
        let c = tt.insert(0x3, 1, AppImageRef::Internal(2), 0).unwrap();
        tt.remove(a).unwrap();
        assert_eq!(tt.len(), 2);
        assert!(tt.find_by_tid(b).is_some());
        assert!(tt.find_by_tid(c).is_some());
        assert!(tt.find_by_tid(a).is_none());
    }
}
