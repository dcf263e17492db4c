//! Throttled diagnostic reporter for the calibration engine.
//!
//! Compiled only with the `calib-debug` feature.  Each emission arms a
//! trigger; the FSM then walks the report pages with a 300 ms wait
//! between prints so a burst of emissions cannot flood the log:
//!
//! ```text
//! IDLE ─▶ PRINT_OFFSET ─▶ WAIT ─▶ PRINT_STILLNESS ─▶ WAIT
//!   ▲                                                  │
//!   └───────── WAIT ◀── PRINT_SAMPLE_RATE ◀────────────┘
//! ```
//!
//! The snapshot buffer is only written while the FSM is idle, so a
//! report in progress always prints one coherent emission.

use log::info;

/// Gate between report pages.
const WAIT_TIME_NANOS: u64 = 300_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebugState {
    Idle,
    Wait,
    PrintOffset,
    PrintStillness,
    PrintSampleRate,
}

/// Copy of the calibration state captured at emission time.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DebugSnapshot {
    pub bias: [f32; 3],
    pub bias_temperature_celsius: f32,
    pub calibration_time_ns: u64,
    pub stillness_confidence: f32,
    pub temperature_min_max_celsius: [f32; 2],
    pub gyro_winmean_min: [f32; 3],
    pub gyro_winmean_max: [f32; 3],
    pub start_still_time_ns: u64,
    pub end_still_time_ns: u64,
    pub sample_rate_hz: f32,
}

pub(crate) struct DebugReporter {
    state: DebugState,
    next_state: DebugState,
    wait_start_ns: u64,
    trigger: bool,
    snapshot: DebugSnapshot,
}

impl DebugReporter {
    pub(crate) fn new() -> Self {
        Self {
            state: DebugState::Idle,
            next_state: DebugState::Idle,
            wait_start_ns: 0,
            trigger: false,
            snapshot: DebugSnapshot::default(),
        }
    }

    /// Record an emission.  The snapshot write is suppressed while a
    /// report is printing; the trigger still arms so the fresh data is
    /// reported on the next pass.
    pub(crate) fn on_emission(&mut self, snapshot: DebugSnapshot) {
        if self.state == DebugState::Idle {
            self.snapshot = snapshot;
        }
        self.trigger = true;
    }

    /// Advance the reporter; call periodically with the current time.
    pub(crate) fn process(&mut self, t_ns: u64) {
        match self.state {
            DebugState::Idle => {
                if self.trigger {
                    self.trigger = false;
                    self.state = DebugState::PrintOffset;
                }
            }
            DebugState::Wait => {
                if t_ns.saturating_sub(self.wait_start_ns) >= WAIT_TIME_NANOS {
                    self.state = self.next_state;
                }
            }
            DebugState::PrintOffset => {
                let s = &self.snapshot;
                info!(
                    "gyro_cal: offset ({:.6}, {:.6}, {:.6}) rad/s | temp {:.2} C | t {} ns",
                    s.bias[0], s.bias[1], s.bias[2], s.bias_temperature_celsius,
                    s.calibration_time_ns
                );
                self.wait_then(t_ns, DebugState::PrintStillness);
            }
            DebugState::PrintStillness => {
                let s = &self.snapshot;
                info!(
                    "gyro_cal: still [{} .. {}] ns | conf {:.3} | temp range [{:.2}, {:.2}] C | \
                     mean spread ({:.6}, {:.6}, {:.6}) rad/s",
                    s.start_still_time_ns,
                    s.end_still_time_ns,
                    s.stillness_confidence,
                    s.temperature_min_max_celsius[0],
                    s.temperature_min_max_celsius[1],
                    s.gyro_winmean_max[0] - s.gyro_winmean_min[0],
                    s.gyro_winmean_max[1] - s.gyro_winmean_min[1],
                    s.gyro_winmean_max[2] - s.gyro_winmean_min[2],
                );
                self.wait_then(t_ns, DebugState::PrintSampleRate);
            }
            DebugState::PrintSampleRate => {
                info!("gyro_cal: gyro sample rate {:.1} Hz", self.snapshot.sample_rate_hz);
                self.wait_then(t_ns, DebugState::Idle);
            }
        }
    }

    fn wait_then(&mut self, t_ns: u64, next: DebugState) {
        self.wait_start_ns = t_ns;
        self.next_state = next;
        self.state = DebugState::Wait;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(bias_x: f32) -> DebugSnapshot {
        DebugSnapshot {
            bias: [bias_x, 0.0, 0.0],
            ..DebugSnapshot::default()
        }
    }

    #[test]
    fn reporter_walks_pages_with_wait_gates() {
        let mut rep = DebugReporter::new();
        rep.on_emission(snap(0.001));

        rep.process(0); // Idle -> PrintOffset
        assert_eq!(rep.state, DebugState::PrintOffset);
        rep.process(0); // prints, enters Wait
        assert_eq!(rep.state, DebugState::Wait);
        rep.process(WAIT_TIME_NANOS - 1); // still waiting
        assert_eq!(rep.state, DebugState::Wait);
        rep.process(WAIT_TIME_NANOS);
        assert_eq!(rep.state, DebugState::PrintStillness);
        rep.process(WAIT_TIME_NANOS);
        rep.process(2 * WAIT_TIME_NANOS);
        assert_eq!(rep.state, DebugState::PrintSampleRate);
        rep.process(2 * WAIT_TIME_NANOS);
        rep.process(3 * WAIT_TIME_NANOS);
        assert_eq!(rep.state, DebugState::Idle);
    }

    #[test]
    fn snapshot_not_overwritten_mid_report() {
        let mut rep = DebugReporter::new();
        rep.on_emission(snap(0.001));
        rep.process(0); // printing starts

        rep.on_emission(snap(0.999));
        assert!((rep.snapshot.bias[0] - 0.001).abs() < 1e-9);
        // The trigger re-arms so the next pass reports the new data.
        assert!(rep.trigger);
    }
}
