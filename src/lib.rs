//! SEOS sensor-hub micro-kernel.
//!
//! A cooperative, single-threaded event-driven runtime that hosts small
//! sensor apps (internal and externally flashed), plus the online
//! gyroscope bias calibration engine that rides on top of it.  All
//! hardware touch-points — app entry-point glue and the protected flash
//! writer — enter through the port traits in [`ports`], so the entire
//! crate runs and tests on a workstation.

#![deny(unused_must_use)]

pub mod calib;
pub mod error;
pub mod events;
pub mod evq;
pub mod image;
pub mod kernel;
pub mod ports;
pub mod slab;
pub mod tasks;
