//! Online gyroscope bias calibration.
//!
//! The engine watches accelerometer, gyroscope, and (optionally)
//! magnetometer streams, detects periods where the device sits still,
//! and emits an updated gyro bias estimate when a sufficiently long
//! still period ends.
//!
//! ```text
//!  gyro ───▶ ┌───────────────┐
//!  accel ──▶ │ per-sensor    │──window ready──▶ ┌───────────────┐
//!  mag ────▶ │ stillness     │                  │ device gate + │──▶ bias
//!            │ sub-detectors │◀──reset/align────│ bias computer │
//!            └───────────────┘                  └───────────────┘
//! ```
//!
//! All units: rad/s (gyro), m/s² (accel), µT (mag), nanoseconds,
//! degrees Celsius.

pub mod gyro_cal;
pub mod stillness;

#[cfg(feature = "calib-debug")]
pub(crate) mod debug;

pub use gyro_cal::{GyroCal, MAX_GYRO_BIAS_RPS};
pub use stillness::StillnessDetector;

use serde::{Deserialize, Serialize};

/// Calibration engine parameters.
///
/// Defaults are tuned for a consumer IMU sampled at 50–400 Hz; hosts
/// override them per sensor part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GyroCalParams {
    // --- Stillness period ---
    /// Shortest still period that may produce a calibration.
    pub min_still_duration_ns: u64,
    /// Longest still period before the accumulated estimate is emitted
    /// and a fresh period begins.
    pub max_still_duration_ns: u64,
    /// Duration of one analysis window.
    pub window_time_duration_ns: u64,

    // --- Initial state ---
    /// Bias estimate to start from (rad/s).
    pub initial_bias: [f32; 3],
    /// Timestamp of the initial bias estimate.
    pub calibration_time_ns: u64,

    // --- Sub-detector thresholds ---
    /// Gyro variance threshold ((rad/s)²).
    pub gyro_var_threshold: f32,
    /// Gyro confidence transition band ((rad/s)²).
    pub gyro_confidence_delta: f32,
    /// Accel variance threshold ((m/s²)²).
    pub accel_var_threshold: f32,
    /// Accel confidence transition band ((m/s²)²).
    pub accel_confidence_delta: f32,
    /// Mag variance threshold (µT²).
    pub mag_var_threshold: f32,
    /// Mag confidence transition band (µT²).
    pub mag_confidence_delta: f32,

    // --- Device gate ---
    /// Combined confidence needed to call the device still.
    pub stillness_threshold: f32,
    /// Largest allowed spread of per-window gyro means within one
    /// still period (rad/s).
    pub stillness_mean_delta_limit: f32,
    /// Largest allowed temperature range within one still period.
    pub temperature_delta_limit_celsius: f32,

    /// Master enable for bias subtraction in [`GyroCal::remove_bias`].
    pub gyro_calibration_enable: bool,
}

impl Default for GyroCalParams {
    fn default() -> Self {
        Self {
            // Stillness period
            min_still_duration_ns: 5_000_000_000,
            max_still_duration_ns: 6_000_000_000,
            window_time_duration_ns: 1_500_000_000,

            // Initial state
            initial_bias: [0.0; 3],
            calibration_time_ns: 0,

            // Sub-detector thresholds
            gyro_var_threshold: 5e-5,
            gyro_confidence_delta: 1e-5,
            accel_var_threshold: 8e-3,
            accel_confidence_delta: 1.6e-3,
            mag_var_threshold: 1.4,
            mag_confidence_delta: 0.25,

            // Device gate
            stillness_threshold: 0.95,
            stillness_mean_delta_limit: 8.727e-4, // 50 mdeg/s
            temperature_delta_limit_celsius: 1.5,

            gyro_calibration_enable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_survive_serde_roundtrip() {
        let params = GyroCalParams {
            min_still_duration_ns: 2_000_000_000,
            initial_bias: [0.001, -0.002, 0.003],
            gyro_calibration_enable: false,
            ..GyroCalParams::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: GyroCalParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.min_still_duration_ns, 2_000_000_000);
        assert_eq!(back.initial_bias, [0.001, -0.002, 0.003]);
        assert!(!back.gyro_calibration_enable);
        assert_eq!(
            back.window_time_duration_ns,
            GyroCalParams::default().window_time_duration_ns
        );
    }

    #[test]
    fn defaults_are_sane() {
        let p = GyroCalParams::default();
        assert!(p.min_still_duration_ns < p.max_still_duration_ns);
        assert!(p.window_time_duration_ns < p.min_still_duration_ns);
        assert!(p.stillness_threshold > 0.0 && p.stillness_threshold < 1.0);
        assert!(p.gyro_confidence_delta < p.gyro_var_threshold);
    }
}
