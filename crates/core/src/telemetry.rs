use rand::Rng;
use serde::Serialize;
use std::time::Duration;

pub const TELEMETRY_INTERVAL: Duration = Duration::from_secs(3);

const LATENCY_RANGE_MS: (f64, f64) = (8.0, 24.0);
const COMPUTE_LOAD_RANGE: (f64, f64) = (70.0, 99.0);

/// Simulated infrastructure readings shown in the session HUD.
///
/// Each reading is a bounded random walk; the values carry no meaning beyond
/// keeping the display alive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HudTelemetry {
    pub latency_ms: f64,
    pub compute_load: f64,
}

impl Default for HudTelemetry {
    fn default() -> Self {
        Self {
            latency_ms: 12.0,
            compute_load: 94.0,
        }
    }
}

impl HudTelemetry {
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.latency_ms = (self.latency_ms + rng.random_range(-1.0..1.0))
            .clamp(LATENCY_RANGE_MS.0, LATENCY_RANGE_MS.1);
        self.compute_load = (self.compute_load + rng.random_range(-2.0..2.0))
            .clamp(COMPUTE_LOAD_RANGE.0, COMPUTE_LOAD_RANGE.1);
    }
}
