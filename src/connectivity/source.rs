use std::collections::VecDeque;
use std::f64::consts::PI;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::connectivity::error::ConnectivityError;
use crate::connectivity::trial::TrialData;
/// Something that can yield trials on demand.
pub trait TrialSource {
    fn next_trial(&mut self) -> Result<Option<TrialData>, ConnectivityError>;
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<TrialData>,
}
impl ManualSource {
    pub fn new(trials: impl IntoIterator<Item = TrialData>) -> Self {
        Self {
            queue: trials.into_iter().collect(),
        }
    }
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}
impl TrialSource for ManualSource {
    fn next_trial(&mut self) -> Result<Option<TrialData>, ConnectivityError> {
        Ok(self.queue.pop_front())
    }
}
/// Seeded generator of phase-coupled sinusoids with additive noise.
///
/// Every channel carries the same oscillation, delayed by `lag_radians` per
/// channel index, with a random starting phase per trial.
pub struct SyntheticSource {
    rng: StdRng,
    channels: usize,
    samples: usize,
    remaining: usize,
    sampling_frequency_hz: f64,
    frequency_hz: f64,
    lag_radians: f64,
    noise: f64,
}
impl SyntheticSource {
    pub fn new(channels: usize, samples: usize, count: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            channels,
            samples,
            remaining: count,
            sampling_frequency_hz: 250.0,
            frequency_hz: 10.0,
            lag_radians: PI / 4.0,
            noise: 0.5,
        }
    }
    pub fn with_sampling_frequency(mut self, sampling_frequency_hz: f64) -> Self {
        self.sampling_frequency_hz = sampling_frequency_hz;
        self
    }
    pub fn with_oscillation(mut self, frequency_hz: f64, lag_radians: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self.lag_radians = lag_radians;
        self
    }
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }
    pub fn generate(&mut self) -> TrialData {
        let phase = self.rng.gen_range(0.0..2.0 * PI);
        let step = 2.0 * PI * self.frequency_hz / self.sampling_frequency_hz;
        let mut data = Array2::zeros((self.channels, self.samples));
        for ((channel, sample), value) in data.indexed_iter_mut() {
            let clean = (step * sample as f64 + phase - self.lag_radians * channel as f64).sin();
            *value = clean + self.noise * self.rng.gen_range(-1.0..1.0);
        }
        TrialData::new(data)
    }
}
impl TrialSource for SyntheticSource {
    fn next_trial(&mut self) -> Result<Option<TrialData>, ConnectivityError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(self.generate()))
    }
}
