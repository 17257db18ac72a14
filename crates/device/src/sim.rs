//! Stateful greenhouse climate simulator for running the device stand-in
//! without real sensors.
//!
//! Models plausible capsule behaviour:
//! - Temporal coherence via random walk with mean reversion
//! - Diurnal (day/night) temperature cycle
//! - Per-reading sensor noise and occasional spikes
//! - Closed-loop fan response (temperature and humidity fall while a fan
//!   runs, soil dries slightly faster)

use std::fmt;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) with the Irwin-Hall method: sum of 12
/// uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Simulation profiles selectable via the `SIM_SCENARIO` env var.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Hovers near comfortable values.  Low noise, rare spikes.  Good for
    /// exercising the relay without constant fan commands.
    Stable,
    /// Starts warm and keeps drifting warmer until fans run.  Produces a
    /// steady stream of operator interventions.
    Hot,
    /// High noise sigma, ~8% spike rate.  Tests how the console's display
    /// copes with implausible readings.
    Flaky,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Self::Hot,
            "flaky" => Self::Flaky,
            _ => Self::Stable, // default
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Hot => write!(f, "hot"),
            Self::Flaky => write!(f, "flaky"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sample type
// ---------------------------------------------------------------------------

/// One climate reading: temperature (°C), relative humidity (%), soil
/// moisture context (%).
#[derive(Debug, Clone, Copy)]
pub struct ClimateSample {
    pub t: f64,
    pub h: f64,
    pub s: f64,
}

// ---------------------------------------------------------------------------
// Main simulator
// ---------------------------------------------------------------------------

pub struct ClimateSim {
    // Evolving "true" values
    temp: f64,
    humidity: f64,
    soil: f64,

    // Random walk parameters
    temp_drift: f64,
    walk_sigma: f64,
    mean_reversion: f64,
    temp_center: f64,

    // Noise / spikes
    noise_sigma: f64,
    spike_prob: f32,
    spike_sigma: f64,

    // Diurnal cycle
    diurnal_amplitude: f64,
    diurnal_period_s: f64,

    // Fan response, applied per running fan per tick
    fan_cooling: f64,
    fan_drying: f64,
}

impl ClimateSim {
    /// Create a simulator.  `diurnal_period_s` controls the day/night cycle
    /// length; use 600 (10 min) for fast dev iteration or 86400 for
    /// real-time.
    pub fn new(scenario: Scenario, diurnal_period_s: f64) -> Self {
        let (start_temp, temp_center, temp_drift, walk_sigma, noise_sigma, spike_prob, spike_sigma) =
            match scenario {
                Scenario::Stable => (22.0, 22.0, 0.0, 0.08, 0.05, 0.005_f32, 3.0),
                Scenario::Hot => (27.0, 32.0, 0.03, 0.12, 0.08, 0.01, 3.0),
                Scenario::Flaky => (23.0, 23.0, 0.0, 0.25, 0.5, 0.08, 8.0),
            };

        Self {
            temp: start_temp + gaussian(0.0, 0.5),
            humidity: (60.0 + gaussian(0.0, 3.0)).clamp(20.0, 95.0),
            soil: (55.0 + gaussian(0.0, 5.0)).clamp(5.0, 95.0),
            temp_drift,
            walk_sigma,
            mean_reversion: 0.02,
            temp_center,
            noise_sigma,
            spike_prob,
            spike_sigma,
            diurnal_amplitude: 2.5,
            diurnal_period_s,
            fan_cooling: 0.15,
            fan_drying: 0.05,
        }
    }

    /// Produce the next reading.  `fans_on` is how many fans currently run;
    /// the internal state evolves with each call, so call once per tick.
    pub fn sample(&mut self, fans_on: usize) -> ClimateSample {
        let cooling = self.fan_cooling * fans_on as f64;

        // Temperature: drift + mean reversion + walk − fan cooling
        let pull = self.mean_reversion * (self.temp_center - self.temp);
        self.temp = (self.temp + self.temp_drift + pull + gaussian(0.0, self.walk_sigma) - cooling)
            .clamp(-5.0, 55.0);

        // Humidity loosely tracks opposite of temperature, fans dry the air
        let h_pull = 0.03 * (60.0 - self.humidity);
        self.humidity = (self.humidity + h_pull + gaussian(0.0, self.walk_sigma * 2.0)
            - cooling * 2.0)
            .clamp(5.0, 100.0);

        // Soil dries slowly, a touch faster with airflow
        self.soil = (self.soil - 0.01 - self.fan_drying * fans_on as f64
            + gaussian(0.0, self.walk_sigma))
        .clamp(0.0, 100.0);

        // Diurnal offset on temperature only, peaking mid-period
        let now_s = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let phase = 2.0 * std::f64::consts::PI * now_s / self.diurnal_period_s;
        let diurnal = self.diurnal_amplitude * phase.sin();

        // Instantaneous noise, plus the occasional spike
        let spike = if fastrand::f32() < self.spike_prob {
            gaussian(0.0, self.spike_sigma)
        } else {
            0.0
        };

        ClimateSample {
            t: round1((self.temp + diurnal + gaussian(0.0, self.noise_sigma) + spike).clamp(-10.0, 60.0)),
            h: round1((self.humidity + gaussian(0.0, self.noise_sigma * 4.0)).clamp(0.0, 100.0)),
            s: round1((self.soil + gaussian(0.0, self.noise_sigma * 2.0)).clamp(0.0, 100.0)),
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ===========================================================================
// Tests
// ===========================================================================
