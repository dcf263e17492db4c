//! Stillness-gated gyroscope bias estimator.
//!
//! The device-level gate combines the three sub-detector confidences
//! with two stability trackers (per-window gyro mean spread and
//! temperature range) and runs a small state machine over consecutive
//! windows:
//!
//! ```text
//!             window still                window still
//!    ┌──────┐ ───────────▶ ┌───────┐ ◀──────────────┐
//!    │ not  │              │ still │ ───────────────┘
//!    │ still│ ◀─────────── │       │ ──▶ emit on motion (≥ min) or
//!    └──────┘  window moved └───────┘     on max duration reached
//! ```
//!
//! A watchdog covers gyro stream starvation: after two window durations
//! without completing a device check, everything resets to a known
//! state and the window re-arms on the next sample.
//!
//! The stability trackers keep their storage in this struct and are
//! driven through [`TrackerCommand`], so several independent calibrator
//! instances can coexist.

use log::debug;

use super::stillness::StillnessDetector;
use super::GyroCalParams;

#[cfg(feature = "calib-debug")]
use super::debug::{DebugReporter, DebugSnapshot};

/// Hard acceptance limit for an emitted bias estimate, per axis.
pub const MAX_GYRO_BIAS_RPS: f32 = 0.1;

/// Samples averaged per sample-rate estimate.
const SAMPLE_RATE_WINDOW: u32 = 100;

/// Commands for the in-struct stability trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerCommand {
    Reset,
    Update,
    Store,
    Evaluate,
}

/// Online gyroscope bias calibrator.
pub struct GyroCal {
    params: GyroCalParams,

    // Sub-detectors.
    gyro_still: StillnessDetector,
    accel_still: StillnessDetector,
    mag_still: StillnessDetector,

    // Current calibration.
    bias: [f32; 3],
    bias_temperature_celsius: f32,
    calibration_time_ns: u64,
    stillness_confidence: f32,
    new_bias_available: bool,

    // Stillness-period state.
    prev_still: bool,
    start_still_time_ns: u64,
    stillness_win_endtime_ns: u64,
    watchdog_start_ns: Option<u64>,
    watchdog_timeout_count: u32,
    using_mag_sensor: bool,

    latest_temperature_celsius: f32,

    // Temperature tracker storage (running mean + min/max).
    temp_sum: f32,
    temp_count: u32,
    temp_min: f32,
    temp_max: f32,
    temp_last: f32,
    // Snapshot taken on STORE.
    temperature_mean_celsius: f32,
    temperature_min_max_celsius: [f32; 2],

    // Gyro window-mean tracker storage (per-axis min/max).
    winmean_min: [f32; 3],
    winmean_max: [f32; 3],
    // Snapshot taken on STORE.
    gyro_winmean_min: [f32; 3],
    gyro_winmean_max: [f32; 3],

    sample_rate: SampleRateEstimator,

    #[cfg(feature = "calib-debug")]
    debug: DebugReporter,
}

impl GyroCal {
    pub fn new(params: &GyroCalParams) -> Self {
        let mut cal = Self {
            gyro_still: StillnessDetector::new(
                params.gyro_var_threshold,
                params.gyro_confidence_delta,
            ),
            accel_still: StillnessDetector::new(
                params.accel_var_threshold,
                params.accel_confidence_delta,
            ),
            mag_still: StillnessDetector::new(
                params.mag_var_threshold,
                params.mag_confidence_delta,
            ),
            bias: params.initial_bias,
            bias_temperature_celsius: 0.0,
            calibration_time_ns: params.calibration_time_ns,
            stillness_confidence: 0.0,
            new_bias_available: false,
            prev_still: false,
            start_still_time_ns: 0,
            stillness_win_endtime_ns: 0,
            watchdog_start_ns: None,
            watchdog_timeout_count: 0,
            using_mag_sensor: false,
            latest_temperature_celsius: 0.0,
            temp_sum: 0.0,
            temp_count: 0,
            temp_min: f32::INFINITY,
            temp_max: f32::MIN,
            temp_last: f32::INFINITY,
            temperature_mean_celsius: 0.0,
            temperature_min_max_celsius: [0.0; 2],
            winmean_min: [f32::INFINITY; 3],
            winmean_max: [f32::MIN; 3],
            gyro_winmean_min: [0.0; 3],
            gyro_winmean_max: [0.0; 3],
            sample_rate: SampleRateEstimator::new(),
            #[cfg(feature = "calib-debug")]
            debug: DebugReporter::new(),
            params: params.clone(),
        };
        let _ = cal.temperature_tracker(TrackerCommand::Reset);
        let _ = cal.mean_tracker(TrackerCommand::Reset);
        cal
    }

    // ── Sample input ──────────────────────────────────────────

    /// Feed one gyro sample (rad/s) with its die temperature.
    pub fn update_gyro(&mut self, t_ns: u64, x: f32, y: f32, z: f32, temperature_celsius: f32) {
        self.latest_temperature_celsius = temperature_celsius;

        // First sample after init/reset arms the shared window boundary
        // and the watchdog.
        if self.stillness_win_endtime_ns == 0 {
            self.stillness_win_endtime_ns = t_ns + self.params.window_time_duration_ns;
            self.watchdog_start_ns = Some(t_ns);
        }

        self.sample_rate.update(t_ns);
        self.gyro_still
            .update(self.stillness_win_endtime_ns, t_ns, x, y, z);
        self.device_stillness_check(t_ns);
    }

    /// Feed one accelerometer sample (m/s²).
    pub fn update_accel(&mut self, t_ns: u64, x: f32, y: f32, z: f32) {
        self.accel_still
            .update(self.stillness_win_endtime_ns, t_ns, x, y, z);
        self.device_stillness_check(t_ns);
    }

    /// Feed one magnetometer sample (µT).  The first sample opts the
    /// mag stream into the stillness gate.
    pub fn update_mag(&mut self, t_ns: u64, x: f32, y: f32, z: f32) {
        self.using_mag_sensor = true;
        self.mag_still
            .update(self.stillness_win_endtime_ns, t_ns, x, y, z);
        self.device_stillness_check(t_ns);
    }

    // ── Calibration access ────────────────────────────────────

    /// Current bias estimate and the temperature it was computed at.
    pub fn get_bias(&self) -> ([f32; 3], f32) {
        (self.bias, self.bias_temperature_celsius)
    }

    /// Seed the bias estimate (e.g. restored from storage at boot).
    pub fn set_bias(&mut self, bias: [f32; 3], t_ns: u64) {
        self.bias = bias;
        self.calibration_time_ns = t_ns;
    }

    /// Whether a new bias has been emitted since the last call.
    /// Read-and-clear: a second call without an intervening emission
    /// returns `false`.
    pub fn new_bias_available(&mut self) -> bool {
        let available = self.new_bias_available;
        self.new_bias_available = false;
        available
    }

    /// Subtract the bias from a gyro sample.  When calibration is
    /// disabled this is an identity passthrough.
    pub fn remove_bias(&self, input: [f32; 3]) -> [f32; 3] {
        if !self.params.gyro_calibration_enable {
            return input;
        }
        [
            input[0] - self.bias[0],
            input[1] - self.bias[1],
            input[2] - self.bias[2],
        ]
    }

    /// Combined stillness confidence of the period behind the current
    /// bias estimate.
    pub fn stillness_confidence(&self) -> f32 {
        self.stillness_confidence
    }

    pub fn calibration_time_ns(&self) -> u64 {
        self.calibration_time_ns
    }

    /// Watchdog recoveries since init (diagnostic).
    pub fn watchdog_timeout_count(&self) -> u32 {
        self.watchdog_timeout_count
    }

    /// Temperature range stored for the current still period.
    pub fn temperature_min_max_celsius(&self) -> [f32; 2] {
        self.temperature_min_max_celsius
    }

    /// Per-axis spread of window means stored for the current still
    /// period (diagnostic companion to the mean-stability gate).
    pub fn window_mean_spread(&self) -> [f32; 3] {
        [
            self.gyro_winmean_max[0] - self.gyro_winmean_min[0],
            self.gyro_winmean_max[1] - self.gyro_winmean_min[1],
            self.gyro_winmean_max[2] - self.gyro_winmean_min[2],
        ]
    }

    /// Measured gyro sample rate (diagnostic; 0 until enough samples).
    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate.hz()
    }

    /// Drive the throttled diagnostic reporter.
    #[cfg(feature = "calib-debug")]
    pub fn debug_process(&mut self, t_ns: u64) {
        self.debug.process(t_ns);
    }

    // ── Device stillness gate ─────────────────────────────────

    fn device_stillness_check(&mut self, t_ns: u64) {
        self.check_watchdog(t_ns);

        // All participating sensors must have closed their windows.
        if !self.gyro_still.window_ready()
            || !self.accel_still.window_ready()
            || (self.using_mag_sensor && !self.mag_still.window_ready())
        {
            return;
        }

        // Advance the shared boundary for the next window.
        self.stillness_win_endtime_ns += self.params.window_time_duration_ns;

        let conf_gyro = self.gyro_still.compute_confidence();
        let conf_accel = self.accel_still.compute_confidence();
        let conf_mag = if self.using_mag_sensor {
            self.mag_still.compute_confidence()
        } else {
            1.0
        };

        let _ = self.mean_tracker(TrackerCommand::Update);
        let _ = self.temperature_tracker(TrackerCommand::Update);

        let conf_still = conf_gyro * conf_accel * conf_mag;
        let mean_not_stable = self.mean_tracker(TrackerCommand::Evaluate);
        let temp_exceeded = self.temperature_tracker(TrackerCommand::Evaluate);
        let device_is_still = conf_still > self.params.stillness_threshold
            && !mean_not_stable
            && !temp_exceeded;

        match (self.prev_still, device_is_still) {
            // Stillness begins: anchor the period at the start of the
            // window that was just accepted.
            (false, true) => {
                self.start_still_time_ns = self.gyro_still.window_start_time_ns();
                let _ = self.temperature_tracker(TrackerCommand::Store);
                let _ = self.mean_tracker(TrackerCommand::Store);
                self.reset_detectors(true);
                self.prev_still = true;
            }

            (true, true) => {
                let elapsed = self
                    .gyro_still
                    .last_sample_time_ns()
                    .saturating_sub(self.start_still_time_ns);
                if elapsed > self.params.max_still_duration_ns {
                    // Cap the accumulation: emit and force a new period.
                    self.compute_gyro_cal(self.gyro_still.last_sample_time_ns());
                    self.end_still_period();
                } else {
                    let _ = self.temperature_tracker(TrackerCommand::Store);
                    let _ = self.mean_tracker(TrackerCommand::Store);
                    self.reset_detectors(true);
                }
            }

            // Motion after a qualifying period: calibrate from the
            // snapshot of the last fully still window.
            (true, false) => {
                let still_end = self.gyro_still.window_start_time_ns();
                let still_duration = still_end.saturating_sub(self.start_still_time_ns);
                if still_duration >= self.params.min_still_duration_ns {
                    self.compute_gyro_cal(still_end);
                }
                self.end_still_period();
            }

            (false, false) => {
                self.end_still_period();
            }
        }

        self.watchdog_start_ns = Some(t_ns);
    }

    /// Full reset of period state: detectors lose their saved stats,
    /// trackers restart, and the next window starts a fresh period.
    fn end_still_period(&mut self) {
        self.reset_detectors(false);
        let _ = self.temperature_tracker(TrackerCommand::Reset);
        let _ = self.mean_tracker(TrackerCommand::Reset);
        self.start_still_time_ns = 0;
        self.prev_still = false;
    }

    fn reset_detectors(&mut self, save_stats: bool) {
        self.gyro_still.reset(save_stats);
        self.accel_still.reset(save_stats);
        self.mag_still.reset(save_stats);
    }

    // ── Watchdog ──────────────────────────────────────────────

    /// Recover from gyro stream starvation.  Fires when no device
    /// check completed for two window durations; everything resets and
    /// the window re-arms on the next gyro sample.
    fn check_watchdog(&mut self, t_ns: u64) {
        let Some(start) = self.watchdog_start_ns else {
            return;
        };
        let timeout = 2 * self.params.window_time_duration_ns;
        if t_ns <= start.saturating_add(timeout) {
            return;
        }

        self.watchdog_timeout_count += 1;
        debug!(
            "gyro_cal: watchdog timeout #{} ({} ns since last check)",
            self.watchdog_timeout_count,
            t_ns - start
        );

        // A mag stream that never produced a window would gate stillness
        // detection forever; drop it from the required set.
        if self.using_mag_sensor && !self.mag_still.window_ready() {
            self.using_mag_sensor = false;
            debug!("gyro_cal: magnetometer window never closed; disabling mag gate");
        }

        self.end_still_period();
        self.stillness_win_endtime_ns = 0;
        self.watchdog_start_ns = None;
    }

    // ── Bias computation ──────────────────────────────────────

    /// Accept or reject the candidate bias from the last still window.
    /// Rejection leaves the current bias and the `new_bias_available`
    /// flag untouched.
    fn compute_gyro_cal(&mut self, calibration_time_ns: u64) {
        let mean = self.gyro_still.prev_mean();
        if mean.iter().any(|m| m.abs() >= MAX_GYRO_BIAS_RPS) {
            debug!(
                "gyro_cal: rejected out-of-range bias candidate ({:.6}, {:.6}, {:.6}) rad/s",
                mean[0], mean[1], mean[2]
            );
            return;
        }

        self.bias = mean;
        self.bias_temperature_celsius = self.temperature_mean_celsius;
        self.calibration_time_ns = calibration_time_ns;

        let mag_conf = if self.using_mag_sensor {
            self.mag_still.prev_confidence()
        } else {
            1.0
        };
        self.stillness_confidence =
            self.gyro_still.prev_confidence() * self.accel_still.prev_confidence() * mag_conf;
        self.new_bias_available = true;

        debug!(
            "gyro_cal: new bias ({:.6}, {:.6}, {:.6}) rad/s at {:.2} C, confidence {:.3}",
            self.bias[0],
            self.bias[1],
            self.bias[2],
            self.bias_temperature_celsius,
            self.stillness_confidence
        );

        #[cfg(feature = "calib-debug")]
        self.debug.on_emission(DebugSnapshot {
            bias: self.bias,
            bias_temperature_celsius: self.bias_temperature_celsius,
            calibration_time_ns: self.calibration_time_ns,
            stillness_confidence: self.stillness_confidence,
            temperature_min_max_celsius: self.temperature_min_max_celsius,
            gyro_winmean_min: self.gyro_winmean_min,
            gyro_winmean_max: self.gyro_winmean_max,
            start_still_time_ns: self.start_still_time_ns,
            end_still_time_ns: calibration_time_ns,
            sample_rate_hz: self.sample_rate.hz(),
        });
    }

    // ── Stability trackers ────────────────────────────────────

    /// Temperature statistics over the current still period.  Returns
    /// the gate verdict for `Evaluate`; other commands return `false`.
    fn temperature_tracker(&mut self, command: TrackerCommand) -> bool {
        match command {
            TrackerCommand::Reset => {
                self.temp_sum = 0.0;
                self.temp_count = 0;
                self.temp_min = f32::INFINITY;
                self.temp_max = f32::MIN;
                self.temp_last = f32::INFINITY;
            }
            TrackerCommand::Update => {
                let t = self.latest_temperature_celsius;
                // Repeated identical readings carry no information for
                // the running mean.
                if (t - self.temp_last).abs() > f32::MIN_POSITIVE {
                    self.temp_sum += t;
                    self.temp_count += 1;
                    self.temp_min = self.temp_min.min(t);
                    self.temp_max = self.temp_max.max(t);
                    self.temp_last = t;
                }
            }
            TrackerCommand::Store => {
                if self.temp_count > 0 {
                    self.temperature_mean_celsius = self.temp_sum / self.temp_count as f32;
                    self.temperature_min_max_celsius = [self.temp_min, self.temp_max];
                }
            }
            TrackerCommand::Evaluate => {
                return self.temp_count > 0
                    && self.temp_max - self.temp_min > self.params.temperature_delta_limit_celsius;
            }
        }
        false
    }

    /// Spread of per-window gyro means over the current still period.
    /// Returns the gate verdict for `Evaluate`; other commands return
    /// `false`.
    fn mean_tracker(&mut self, command: TrackerCommand) -> bool {
        match command {
            TrackerCommand::Reset => {
                self.winmean_min = [f32::INFINITY; 3];
                self.winmean_max = [f32::MIN; 3];
            }
            TrackerCommand::Update => {
                let mean = self.gyro_still.win_mean();
                for axis in 0..3 {
                    self.winmean_min[axis] = self.winmean_min[axis].min(mean[axis]);
                    self.winmean_max[axis] = self.winmean_max[axis].max(mean[axis]);
                }
            }
            TrackerCommand::Store => {
                self.gyro_winmean_min = self.winmean_min;
                self.gyro_winmean_max = self.winmean_max;
            }
            TrackerCommand::Evaluate => {
                return (0..3).any(|axis| {
                    self.winmean_max[axis] - self.winmean_min[axis]
                        > self.params.stillness_mean_delta_limit
                });
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Sample-rate estimator
// ---------------------------------------------------------------------------

/// Measures the gyro stream rate from inter-sample deltas, averaged
/// over [`SAMPLE_RATE_WINDOW`] samples.  Diagnostic only.
struct SampleRateEstimator {
    last_sample_time_ns: u64,
    delta_sum_ns: u64,
    count: u32,
    hz: f32,
}

impl SampleRateEstimator {
    fn new() -> Self {
        Self {
            last_sample_time_ns: 0,
            delta_sum_ns: 0,
            count: 0,
            hz: 0.0,
        }
    }

    fn update(&mut self, t_ns: u64) {
        if self.last_sample_time_ns != 0 && t_ns > self.last_sample_time_ns {
            self.delta_sum_ns += t_ns - self.last_sample_time_ns;
            self.count += 1;
            if self.count >= SAMPLE_RATE_WINDOW {
                self.hz = self.count as f32 * 1e9 / self.delta_sum_ns as f32;
                self.delta_sum_ns = 0;
                self.count = 0;
            }
        }
        self.last_sample_time_ns = t_ns;
    }

    fn hz(&self) -> f32 {
        self.hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_NS: u64 = 500_000_000;
    const STEP_NS: u64 = 10_000_000; // 100 Hz

    fn test_params() -> GyroCalParams {
        GyroCalParams {
            min_still_duration_ns: 2_000_000_000,
            max_still_duration_ns: 10_000_000_000,
            window_time_duration_ns: WINDOW_NS,
            ..GyroCalParams::default()
        }
    }

    /// Feed still gyro + accel samples over `[from, to)`.
    fn feed_still(cal: &mut GyroCal, from_ns: u64, to_ns: u64, gyro: [f32; 3]) {
        let mut t = from_ns;
        while t < to_ns {
            cal.update_gyro(t, gyro[0], gyro[1], gyro[2], 25.0);
            cal.update_accel(t, 0.0, 0.0, 9.81);
            t += STEP_NS;
        }
    }

    /// Feed visibly moving samples (high variance) over `[from, to)`.
    fn feed_motion(cal: &mut GyroCal, from_ns: u64, to_ns: u64) {
        let mut t = from_ns;
        let mut flip = 1.0f32;
        while t < to_ns {
            cal.update_gyro(t, 0.5 * flip, 0.5 * flip, 0.5 * flip, 25.0);
            cal.update_accel(t, 2.0 * flip, 0.0, 9.81);
            flip = -flip;
            t += STEP_NS;
        }
    }

    #[test]
    fn still_period_emits_on_motion() {
        let mut cal = GyroCal::new(&test_params());
        let bias = [0.002, -0.003, 0.001];
        feed_still(&mut cal, 0, 4_000_000_000, bias);
        feed_motion(&mut cal, 4_000_000_000, 5_500_000_000);

        assert!(cal.new_bias_available());
        assert!(!cal.new_bias_available(), "flag must read-and-clear");
        let (b, temp) = cal.get_bias();
        for axis in 0..3 {
            assert!((b[axis] - bias[axis]).abs() < 1e-4, "axis {axis}: {b:?}");
        }
        assert!((temp - 25.0).abs() < 0.5);
        assert!(cal.stillness_confidence() > 0.9);
        assert!(cal.stillness_confidence() <= 1.0);
    }

    #[test]
    fn short_still_period_does_not_emit() {
        let mut cal = GyroCal::new(&test_params());
        feed_still(&mut cal, 0, 1_500_000_000, [0.002; 3]);
        feed_motion(&mut cal, 1_500_000_000, 3_000_000_000);
        assert!(!cal.new_bias_available());
    }

    #[test]
    fn max_duration_caps_the_period() {
        let mut cal = GyroCal::new(&test_params());
        // Runs past max_still_duration without any motion.
        feed_still(&mut cal, 0, 11_000_000_000, [0.004, 0.0, 0.0]);
        assert!(cal.new_bias_available());
        let (b, _) = cal.get_bias();
        assert!((b[0] - 0.004).abs() < 1e-4);
    }

    #[test]
    fn out_of_range_candidate_is_rejected() {
        let mut cal = GyroCal::new(&test_params());
        feed_still(&mut cal, 0, 4_000_000_000, [0.15, 0.0, 0.0]);
        feed_motion(&mut cal, 4_000_000_000, 5_500_000_000);
        assert!(!cal.new_bias_available());
        let (b, _) = cal.get_bias();
        assert_eq!(b, [0.0; 3], "rejection must not touch the bias");
    }

    #[test]
    fn set_bias_seeds_estimate() {
        let mut cal = GyroCal::new(&test_params());
        cal.set_bias([0.01, 0.02, 0.03], 777);
        let (b, _) = cal.get_bias();
        assert_eq!(b, [0.01, 0.02, 0.03]);
        assert_eq!(cal.calibration_time_ns(), 777);
        assert!(!cal.new_bias_available(), "set_bias is not an emission");
    }

    #[test]
    fn remove_bias_subtracts_when_enabled() {
        let mut cal = GyroCal::new(&test_params());
        cal.set_bias([0.01, 0.02, 0.03], 0);
        let out = cal.remove_bias([0.11, 0.22, 0.33]);
        assert!((out[0] - 0.10).abs() < 1e-6);
        assert!((out[1] - 0.20).abs() < 1e-6);
        assert!((out[2] - 0.30).abs() < 1e-6);
    }

    #[test]
    fn remove_bias_is_identity_when_disabled() {
        let params = GyroCalParams {
            gyro_calibration_enable: false,
            ..test_params()
        };
        let mut cal = GyroCal::new(&params);
        cal.set_bias([0.01, 0.02, 0.03], 0);
        assert_eq!(cal.remove_bias([0.5, 0.6, 0.7]), [0.5, 0.6, 0.7]);
    }

    #[test]
    fn watchdog_resets_after_gyro_gap() {
        let mut cal = GyroCal::new(&test_params());
        feed_still(&mut cal, 0, 300_000_000, [0.002; 3]);

        // Silence for 2 * window + 1 ms, then resume.
        let resume = 300_000_000 + 2 * WINDOW_NS + 1_000_000;
        cal.update_gyro(resume, 0.002, 0.002, 0.002, 25.0);
        assert_eq!(cal.watchdog_timeout_count(), 1);
        assert!(!cal.new_bias_available());

        // A full still period after the gap still calibrates.
        feed_still(&mut cal, resume + STEP_NS, resume + 4_000_000_000, [0.002; 3]);
        feed_motion(&mut cal, resume + 4_000_000_000, resume + 5_500_000_000);
        assert!(cal.new_bias_available());
    }

    #[test]
    fn temperature_swing_blocks_stillness() {
        let mut cal = GyroCal::new(&test_params());
        // Temperature ramps 10 C over the period; gate must never pass.
        let mut t = 0u64;
        let mut temp = 20.0f32;
        while t < 6_000_000_000 {
            cal.update_gyro(t, 0.002, 0.002, 0.002, temp);
            cal.update_accel(t, 0.0, 0.0, 9.81);
            temp += 0.02;
            t += STEP_NS;
        }
        feed_motion(&mut cal, 6_000_000_000, 7_500_000_000);
        assert!(!cal.new_bias_available());
    }

    #[test]
    fn stale_mag_stream_is_dropped_by_watchdog() {
        let mut cal = GyroCal::new(&test_params());
        // One mag sample opts the mag gate in, then the stream dies.
        cal.update_mag(0, 20.0, 5.0, -30.0);
        feed_still(&mut cal, 0, 5_000_000_000, [0.002; 3]);
        assert!(cal.watchdog_timeout_count() >= 1);

        // With mag dropped, a fresh still period calibrates normally.
        feed_still(&mut cal, 5_000_000_000, 9_000_000_000, [0.002; 3]);
        feed_motion(&mut cal, 9_000_000_000, 10_500_000_000);
        assert!(cal.new_bias_available());
    }

    #[test]
    fn sample_rate_estimator_converges() {
        let mut est = SampleRateEstimator::new();
        for i in 0..=150u64 {
            est.update(i * STEP_NS);
        }
        assert!((est.hz() - 100.0).abs() < 1.0);
    }
}
