//! App lifecycle: start, stop, and erase over App ID selectors.
//!
//! External apps live as framed images in the shared flash region; a
//! batch operation walks the valid frames matching a selector and acts
//! on each.  Start deduplicates in-place updates: when the same App ID
//! appears more than once, every frame but the last is erased and only
//! the most recent image is loaded.
//!
//! All three operations run in dispatcher context, so no two of them
//! ever race on a frame's marker word.

use log::{info, warn};

use crate::error::KernelError;
use crate::image::{seq_of, vendor_of, AppHeader, Frame, FrameIter, MARKER_DELETED, MARKER_INTERNAL, MARKER_VALID};
use crate::ports::{AppHost, SharedRegion};
use crate::tasks::{AppImageRef, Tid, MAX_TASKS};

use super::Kernel;

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// App ID selector: vendor (high 40 bits) and sequence (low 24 bits),
/// each independently wildcardable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppIdSelector {
    vendor: Option<u64>,
    seq: Option<u32>,
}

impl AppIdSelector {
    /// Matches every app.
    pub const ANY: AppIdSelector = AppIdSelector {
        vendor: None,
        seq: None,
    };

    /// Matches exactly one app ID.
    pub fn exact(app_id: u64) -> Self {
        Self {
            vendor: Some(vendor_of(app_id)),
            seq: Some(seq_of(app_id)),
        }
    }

    /// Matches every app of one vendor.
    pub fn vendor(vendor: u64) -> Self {
        Self {
            vendor: Some(vendor),
            seq: None,
        }
    }

    pub fn matches(&self, app_id: u64) -> bool {
        self.vendor.is_none_or(|v| v == vendor_of(app_id))
            && self.seq.is_none_or(|s| s == seq_of(app_id))
    }
}

// ---------------------------------------------------------------------------
// Batch status
// ---------------------------------------------------------------------------

/// Result of a lifecycle batch: four saturating 8-bit counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MgmtStatus {
    /// Valid matching frames seen.
    pub app: u8,
    /// Live tasks found for those frames.
    pub task: u8,
    /// Start/stop operations that succeeded.
    pub op: u8,
    /// Marker flips that succeeded.
    pub erase: u8,
}

impl MgmtStatus {
    /// Pack into the wire layout: `op | erase | task | app`, low to high.
    pub fn to_bits(self) -> u32 {
        u32::from(self.op)
            | u32::from(self.erase) << 8
            | u32::from(self.task) << 16
            | u32::from(self.app) << 24
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            op: bits as u8,
            erase: (bits >> 8) as u8,
            task: (bits >> 16) as u8,
            app: (bits >> 24) as u8,
        }
    }
}

fn bump(counter: &mut u8) {
    *counter = counter.saturating_add(1);
}

// ---------------------------------------------------------------------------
// Lifecycle operations
// ---------------------------------------------------------------------------

impl<H: AppHost, R: SharedRegion> Kernel<H, R> {
    /// Start the host-enumerated internal apps.  Returns the number of
    /// tasks created.  Apps with a non-internal marker or a duplicate
    /// App ID are rejected with a warning.
    pub fn boot(&mut self) -> usize {
        let mut started = 0;
        for idx in 0..self.internal_apps.len() {
            let app = self.internal_apps[idx];
            if app.header.marker != MARKER_INTERNAL {
                warn!(
                    "internal app {:#018x} has a non-internal marker; skipping",
                    app.header.app_id
                );
                continue;
            }
            if self.tasks.find_by_app_id(app.header.app_id).is_some() {
                warn!(
                    "duplicate internal app {:#018x} rejected",
                    app.header.app_id
                );
                continue;
            }
            match self.finish_start(AppImageRef::Internal(idx), app.header, app.host_info, false) {
                Ok(tid) => {
                    info!(
                        "internal app {:#018x} started as tid {}",
                        app.header.app_id, tid.0
                    );
                    started += 1;
                }
                Err(e) => warn!("internal app {:#018x} failed to start: {e}", app.header.app_id),
            }
        }
        started
    }

    /// Stop every live task hosting a valid frame that matches `sel`.
    pub fn stop_apps(&mut self, sel: AppIdSelector) -> MgmtStatus {
        let mut status = MgmtStatus::default();
        for (frame, _header) in self.matching_frames(sel) {
            bump(&mut status.app);
            if let Some(tid) = self.task_hosting(frame) {
                bump(&mut status.task);
                if self.stop_task(tid) {
                    bump(&mut status.op);
                }
            }
        }
        status
    }

    /// [`Kernel::stop_apps`], then flip each matching frame's marker to
    /// `DELETED` through the protected-region writer.  Idempotent: a
    /// deleted frame is no longer a valid app and drops out of the
    /// next call's scan.
    pub fn erase_apps(&mut self, sel: AppIdSelector) -> MgmtStatus {
        let mut status = MgmtStatus::default();
        for (frame, header) in self.matching_frames(sel) {
            bump(&mut status.app);
            if let Some(tid) = self.task_hosting(frame) {
                bump(&mut status.task);
                if self.stop_task(tid) {
                    bump(&mut status.op);
                }
            }
            if self.delete_frame(frame) {
                bump(&mut status.erase);
                info!(
                    "erased app {:#018x} at region offset {:#x}",
                    header.app_id,
                    frame.header_off()
                );
            }
        }
        status
    }

    /// Start every valid matching app that is not already hosted.  When
    /// an App ID appears in several frames, all but the last are erased
    /// and only the most recent image is started.
    pub fn start_apps(&mut self, sel: AppIdSelector) -> MgmtStatus {
        let mut status = MgmtStatus::default();
        let frames = self.matching_frames(sel);
        for (i, (frame, header)) in frames.iter().enumerate() {
            bump(&mut status.app);

            let superseded = frames[i + 1..]
                .iter()
                .any(|(_, h)| h.app_id == header.app_id);
            if superseded {
                if self.delete_frame(*frame) {
                    bump(&mut status.erase);
                    info!(
                        "erased superseded image of app {:#018x} at {:#x}",
                        header.app_id,
                        frame.header_off()
                    );
                }
                continue;
            }

            if self.tasks.find_by_app_id(header.app_id).is_some() {
                bump(&mut status.task);
                continue;
            }
            match self.start_flash_app(*frame, *header) {
                Ok(tid) => {
                    bump(&mut status.task);
                    bump(&mut status.op);
                    info!("app {:#018x} started as tid {}", header.app_id, tid.0);
                }
                Err(e) => warn!("app {:#018x} failed to start: {e}", header.app_id),
            }
        }
        status
    }

    // ── Internal ──────────────────────────────────────────────

    /// Valid frames matching `sel`, in region scan order.
    fn matching_frames(&self, sel: AppIdSelector) -> Vec<(Frame, AppHeader)> {
        let bytes = self.region.bytes();
        FrameIter::new(bytes)
            .filter_map(|frame| frame.valid_app(bytes).map(|header| (frame, header)))
            .filter(|(_, header)| sel.matches(header.app_id))
            .collect()
    }

    /// TID of the live task loaded from exactly this frame, provided
    /// the frame's marker is still `VALID` (an earlier erase in the
    /// same batch may have flipped it).
    fn task_hosting(&self, frame: Frame) -> Option<Tid> {
        let bytes = self.region.bytes();
        let marker_bytes = bytes.get(frame.marker_off()..frame.marker_off() + 4)?;
        if u32::from_le_bytes(marker_bytes.try_into().unwrap()) != MARKER_VALID {
            return None;
        }
        self.tasks
            .iter()
            .find(|t| t.image == AppImageRef::Flash(frame.payload_off))
            .map(|t| t.tid)
    }

    /// Stop a task synchronously: app end entry, host unload, table
    /// removal.  In-flight events addressed to its TID will resolve to
    /// task-not-found and be dropped with their free actions honored.
    fn stop_task(&mut self, tid: Tid) -> bool {
        let Some(task) = self.tasks.remove(tid) else {
            return false;
        };
        info!("stopping task {} (app {:#018x})", tid.0, task.app_id);
        self.host.end(task.host_info);
        self.host.unload(task.host_info);
        true
    }

    /// Flip a frame's marker to `DELETED`.
    fn delete_frame(&mut self, frame: Frame) -> bool {
        match self
            .region
            .program(frame.marker_off(), &MARKER_DELETED.to_le_bytes())
        {
            Ok(()) => true,
            Err(e) => {
                warn!("marker flip failed at {:#x}: {e}", frame.marker_off());
                false
            }
        }
    }

    fn start_flash_app(&mut self, frame: Frame, header: AppHeader) -> Result<Tid, KernelError> {
        if self.tasks.len() == MAX_TASKS {
            return Err(KernelError::TaskTableFull);
        }
        let host_info = {
            let Kernel { host, region, .. } = self;
            host.load(&header, frame.payload(region.bytes()))
                .ok_or(KernelError::AppLoadFailed)?
        };
        self.finish_start(
            AppImageRef::Flash(frame.payload_off),
            header,
            host_info,
            true,
        )
    }

    /// Common tail of app startup: table slot, fresh TID, empty
    /// subscription set, init entry.  Every failure rolls the slot back.
    fn finish_start(
        &mut self,
        image: AppImageRef,
        header: AppHeader,
        host_info: u32,
        unload_on_fail: bool,
    ) -> Result<Tid, KernelError> {
        let Some(tid) = self
            .tasks
            .insert(header.app_id, header.app_version, image, host_info)
        else {
            if unload_on_fail {
                self.host.unload(host_info);
            }
            return Err(KernelError::TaskTableFull);
        };
        if !self.host.init(host_info, tid) {
            self.tasks.remove(tid);
            if unload_on_fail {
                self.host.unload(host_info);
            }
            return Err(KernelError::AppInitFailed);
        }
        Ok(tid)
    }
}
