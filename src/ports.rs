//! Port traits — the boundary between the kernel and the platform.
//!
//! ```text
//!   Platform adapter ──▶ Port trait ──▶ Kernel (domain)
//! ```
//!
//! The kernel never touches CPU ABI glue or flash controllers directly:
//! the app host executes app entry points, and the shared region
//! capability is the only writer of the protected flash area.  Both are
//! injected as generics, so the whole kernel runs against mocks on a
//! workstation.

use crate::events::EventData;
use crate::image::AppHeader;
use crate::kernel::EventCtx;
use crate::tasks::Tid;

// ───────────────────────────────────────────────────────────────
// App host (CPU/ABI glue)
// ───────────────────────────────────────────────────────────────

/// Executes app entry points and owns per-app platform state.
///
/// `instance` values are opaque tokens the host hands out at load time;
/// the kernel stores them in the task record and passes them back.
pub trait AppHost {
    /// Resolve and map an app image.  `image` is the frame payload
    /// (header plus host-specific relocation/symbol regions).
    /// Returns the instance token, or `None` when the image cannot be
    /// loaded.
    fn load(&mut self, header: &AppHeader, image: &[u8]) -> Option<u32>;

    /// Release everything `load` acquired.
    fn unload(&mut self, instance: u32);

    /// Call the app's init entry.  `false` rolls the start back.
    fn init(&mut self, instance: u32, tid: Tid) -> bool;

    /// Call the app's end entry (before unload on stop).
    fn end(&mut self, instance: u32);

    /// Deliver one event to the app.  The app may call back into the
    /// kernel through `ctx` (subscribe, enqueue, retain, queries).
    fn handle(&mut self, instance: u32, ctx: &mut EventCtx<'_>, evt_type: u32, data: EventData);
}

/// Internal (ROM-resident) app, enumerated by the host at boot.  The
/// instance token is pre-resolved — internal apps are never loaded
/// through [`AppHost::load`].
#[derive(Debug, Clone, Copy)]
pub struct InternalApp {
    pub header: AppHeader,
    pub host_info: u32,
}

// ───────────────────────────────────────────────────────────────
// Shared flash region (protected-region writer)
// ───────────────────────────────────────────────────────────────

/// The shared flash region holding external app images.
///
/// Reads are plain byte access; the only mutation is `program`, which
/// models the protected-region programming primitive.  Programming can
/// only clear bits (NOR-flash semantics) — sufficient for the single
/// mutable field in an app image, the `VALID → DELETED` marker flip.
pub trait SharedRegion {
    fn bytes(&self) -> &[u8];

    /// Program `data` at `offset`.  Implementations AND the new bytes
    /// into place; they never set cleared bits.
    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), crate::error::FlashError>;
}

/// RAM-backed region for hosts and tests.
pub struct RamRegion {
    bytes: Vec<u8>,
}

impl RamRegion {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn empty() -> Self {
        Self { bytes: Vec::new() }
    }
}

impl SharedRegion for RamRegion {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), crate::error::FlashError> {
        let end = offset
            .checked_add(data.len())
            .ok_or(crate::error::FlashError::OutOfBounds)?;
        if end > self.bytes.len() {
            return Err(crate::error::FlashError::OutOfBounds);
        }
        for (dst, src) in self.bytes[offset..end].iter_mut().zip(data) {
            *dst &= *src;
        }
        Ok(())
    }
}
