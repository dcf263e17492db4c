//! Per-sensor stillness sub-detector.
//!
//! Accumulates one analysis window of samples, producing the windowed
//! per-axis mean and variance plus a stillness confidence in `[0, 1]`.
//! The window boundary is driven externally: the device-level gate owns
//! the shared end time so that all sensors close their windows in step.
//!
//! A reset may preserve the last window's statistics (`save_stats`);
//! the gate uses the preserved copy to calibrate from the final still
//! window once motion resumes.

/// Windowed mean/variance stillness detector for one triaxial sensor.
pub struct StillnessDetector {
    var_threshold: f32,
    confidence_delta: f32,

    // Current-window accumulators (Welford).
    num_samples: u32,
    mean: [f32; 3],
    m2: [f32; 3],
    window_start_time_ns: u64,
    last_sample_time_ns: u64,

    // Last closed window.
    window_ready: bool,
    win_mean: [f32; 3],
    win_var: [f32; 3],
    stillness_confidence: f32,

    // Previous window, preserved across reset-with-save.
    prev_mean: [f32; 3],
    prev_stillness_confidence: f32,
}

impl StillnessDetector {
    /// `var_threshold` centres the confidence transition band;
    /// `confidence_delta` is its half-width.
    pub fn new(var_threshold: f32, confidence_delta: f32) -> Self {
        Self {
            var_threshold,
            confidence_delta,
            num_samples: 0,
            mean: [0.0; 3],
            m2: [0.0; 3],
            window_start_time_ns: 0,
            last_sample_time_ns: 0,
            window_ready: false,
            win_mean: [0.0; 3],
            win_var: [0.0; 3],
            stillness_confidence: 0.0,
            prev_mean: [0.0; 3],
            prev_stillness_confidence: 0.0,
        }
    }

    /// Accumulate one sample.  `win_endtime_ns` is the shared window
    /// boundary (zero = detection disarmed); once the sample time
    /// reaches it, the window statistics are finalized and
    /// [`window_ready`](Self::window_ready) reports `true`.
    pub fn update(&mut self, win_endtime_ns: u64, t_ns: u64, x: f32, y: f32, z: f32) {
        if win_endtime_ns == 0 {
            return;
        }
        if self.num_samples == 0 {
            self.window_start_time_ns = t_ns;
        }
        self.num_samples += 1;
        self.last_sample_time_ns = t_ns;

        let n = self.num_samples as f32;
        for (axis, value) in [x, y, z].into_iter().enumerate() {
            let delta = value - self.mean[axis];
            self.mean[axis] += delta / n;
            self.m2[axis] += delta * (value - self.mean[axis]);
        }

        if t_ns >= win_endtime_ns {
            self.win_mean = self.mean;
            self.win_var = if self.num_samples > 1 {
                self.m2.map(|m2| m2 / (self.num_samples - 1) as f32)
            } else {
                [0.0; 3]
            };
            self.window_ready = true;
        }
    }

    /// Map the closed window's worst-axis variance into a stillness
    /// confidence: 1 below the transition band, 0 above it, linear in
    /// between.
    pub fn compute_confidence(&mut self) -> f32 {
        let max_var = self.win_var.iter().fold(0.0f32, |acc, &v| acc.max(v));
        let upper = self.var_threshold + self.confidence_delta;
        let lower = self.var_threshold - self.confidence_delta;

        self.stillness_confidence = if max_var <= lower {
            1.0
        } else if max_var >= upper {
            0.0
        } else {
            (upper - max_var) / (2.0 * self.confidence_delta)
        };
        self.stillness_confidence
    }

    /// Clear the accumulators for the next window.  With `save_stats`,
    /// the closed window's mean and confidence survive in the `prev_*`
    /// copies; without it, those are cleared too.
    pub fn reset(&mut self, save_stats: bool) {
        if save_stats {
            self.prev_mean = self.win_mean;
            self.prev_stillness_confidence = self.stillness_confidence;
        } else {
            self.prev_mean = [0.0; 3];
            self.prev_stillness_confidence = 0.0;
        }
        self.num_samples = 0;
        self.mean = [0.0; 3];
        self.m2 = [0.0; 3];
        self.window_start_time_ns = 0;
        self.window_ready = false;
        self.win_mean = [0.0; 3];
        self.win_var = [0.0; 3];
        self.stillness_confidence = 0.0;
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn window_ready(&self) -> bool {
        self.window_ready
    }

    pub fn win_mean(&self) -> [f32; 3] {
        self.win_mean
    }

    pub fn win_var(&self) -> [f32; 3] {
        self.win_var
    }

    pub fn window_start_time_ns(&self) -> u64 {
        self.window_start_time_ns
    }

    pub fn last_sample_time_ns(&self) -> u64 {
        self.last_sample_time_ns
    }

    pub fn confidence(&self) -> f32 {
        self.stillness_confidence
    }

    pub fn prev_mean(&self) -> [f32; 3] {
        self.prev_mean
    }

    pub fn prev_confidence(&self) -> f32 {
        self.prev_stillness_confidence
    }
}
