use std::sync::Arc;
use log::{debug, warn};
use ndarray::Array2;
use crate::config::{ConnectivityConfig, DEFAULT_SAMPLING_FREQUENCY_HZ};
use crate::connectivity::csd::CsdAccumulator;
use crate::connectivity::error::{ConnectivityError, TrialFault};
use crate::connectivity::scheduler::{BatchReport, TrialScheduler};
use crate::connectivity::spectral::SpectrumBuilder;
use crate::connectivity::taper::WindowType;
use crate::connectivity::trial::{SpectralKey, TrialData};
/// Inputs of a connectivity run plus the CSD sum the run accumulates into.
///
/// Every trial in `trials` that holds a complete pair cache was computed with
/// the current window and FFT length and has been merged into `accumulator`
/// exactly once; the mutators below keep it that way.
#[derive(Debug)]
pub struct ConnectivitySettings {
    trials: Vec<TrialData>,
    node_positions: Option<Array2<f32>>,
    window: WindowType,
    fft_size: usize,
    sampling_frequency_hz: f64,
    worker_threads: usize,
    accumulator: CsdAccumulator,
    last_report: BatchReport,
    scheduler: Option<Arc<TrialScheduler>>,
}
impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            trials: Vec::new(),
            node_positions: None,
            window: WindowType::default(),
            fft_size: 0,
            sampling_frequency_hz: DEFAULT_SAMPLING_FREQUENCY_HZ,
            worker_threads: 0,
            accumulator: CsdAccumulator::new(),
            last_report: BatchReport::default(),
            scheduler: None,
        }
    }
}
impl ConnectivitySettings {
    pub fn new(trials: impl IntoIterator<Item = TrialData>) -> Self {
        let mut settings = Self::default();
        for trial in trials {
            settings.push_trial(trial);
        }
        settings
    }
    pub fn from_config(
        config: &ConnectivityConfig,
        trials: impl IntoIterator<Item = TrialData>,
    ) -> Result<Self, ConnectivityError> {
        config.validate()?;
        let mut settings = Self {
            window: config.window_type()?,
            fft_size: config.nfft,
            sampling_frequency_hz: config.sampling_frequency_hz,
            worker_threads: config.worker_threads,
            ..Self::default()
        };
        for trial in trials {
            settings.push_trial(trial);
        }
        Ok(settings)
    }
    pub fn with_window(mut self, window: WindowType) -> Self {
        self.window = window;
        self.reset_caches();
        self
    }
    pub fn with_fft_size(mut self, fft_size: usize) -> Self {
        self.fft_size = fft_size;
        self.reset_caches();
        self
    }
    pub fn with_sampling_frequency(mut self, sampling_frequency_hz: f64) -> Self {
        self.sampling_frequency_hz = sampling_frequency_hz;
        self
    }
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        if worker_threads != self.worker_threads {
            self.scheduler = None;
        }
        self.worker_threads = worker_threads;
        self
    }
    /// `positions` is a channel x 3 matrix; rows past its end get the origin.
    pub fn with_node_positions(mut self, positions: Array2<f32>) -> Result<Self, ConnectivityError> {
        if positions.ncols() != 3 {
            return Err(ConnectivityError::InvalidPositions {
                columns: positions.ncols(),
            });
        }
        self.node_positions = Some(positions);
        Ok(self)
    }
    pub fn trials(&self) -> &[TrialData] {
        &self.trials
    }
    pub fn window(&self) -> WindowType {
        self.window
    }
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
    pub fn sampling_frequency_hz(&self) -> f64 {
        self.sampling_frequency_hz
    }
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
    pub fn node_position(&self, index: usize) -> [f32; 3] {
        match &self.node_positions {
            Some(positions) if index < positions.nrows() => [
                positions[[index, 0]],
                positions[[index, 1]],
                positions[[index, 2]],
            ],
            _ => [0.0; 3],
        }
    }
    pub fn accumulator(&self) -> &CsdAccumulator {
        &self.accumulator
    }
    pub fn last_report(&self) -> &BatchReport {
        &self.last_report
    }
    /// Trials left out of the most recent run.
    pub fn last_faults(&self) -> &[TrialFault] {
        &self.last_report.faults
    }
    /// Cache key a run over trials of `samples` samples uses.
    pub fn spectral_key(&self, samples: usize) -> SpectralKey {
        SpectralKey {
            fft_size: SpectrumBuilder::effective_size(self.fft_size, samples),
            window: self.window,
        }
    }
    /// Adds a trial. A trial arriving with a complete pair cache for the
    /// current window and FFT length, and the shape of the first trial, is
    /// merged right away since the compute step will skip it. Any other
    /// cache is dropped so the trial gets recomputed.
    pub fn push_trial(&mut self, mut trial: TrialData) {
        if trial.has_complete_pairs() {
            let key = self.spectral_key(trial.samples_per_channel());
            let same_shape = self.trials.first().map_or(true, |first| {
                first.num_channels() == trial.num_channels()
                    && first.samples_per_channel() == trial.samples_per_channel()
            });
            let merged = same_shape
                && trial.has_complete_pairs_for(&key)
                && self.accumulator.merge(trial.pair_csd()).is_ok();
            if !merged {
                debug!("dropping stale caches of trial {}", self.trials.len());
                trial.invalidate_cache();
            }
        }
        self.trials.push(trial);
    }
    /// Removes a trial and takes its contribution back out of the CSD sum.
    pub fn remove_trial(&mut self, index: usize) -> Option<TrialData> {
        if index >= self.trials.len() {
            return None;
        }
        let trial = self.trials.remove(index);
        if trial.has_complete_pairs() {
            if let Err(kind) = self.accumulator.retract(trial.pair_csd()) {
                warn!("trial {index} could not be retracted from the CSD sum: {kind}");
            }
        }
        Some(trial)
    }
    /// Drops the trials that faulted in the last run. Returns how many.
    pub fn discard_faulted(&mut self) -> usize {
        let mut indices: Vec<usize> = self.last_report.faults.iter().map(|f| f.trial).collect();
        indices.sort_unstable();
        indices.dedup();
        let mut removed = 0;
        for index in indices.into_iter().rev() {
            if self.remove_trial(index).is_some() {
                removed += 1;
            }
        }
        self.last_report.faults.clear();
        removed
    }
    /// Forgets every cached spectrum and the accumulated sum.
    pub fn reset_caches(&mut self) {
        for trial in &mut self.trials {
            trial.invalidate_cache();
        }
        self.accumulator.clear();
    }
    /// The worker pool for `worker_threads`, built on first use and kept for
    /// later runs.
    pub(crate) fn scheduler(&mut self) -> Result<Arc<TrialScheduler>, ConnectivityError> {
        if let Some(scheduler) = &self.scheduler {
            return Ok(Arc::clone(scheduler));
        }
        let scheduler = Arc::new(TrialScheduler::new(self.worker_threads)?);
        self.scheduler = Some(Arc::clone(&scheduler));
        Ok(scheduler)
    }
    pub(crate) fn batch_parts(&mut self) -> (&mut [TrialData], &CsdAccumulator) {
        (&mut self.trials, &self.accumulator)
    }
    pub(crate) fn record_report(&mut self, report: BatchReport) {
        self.last_report = report;
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::csd::compute_trial;
    use crate::connectivity::metric::DebiasedSquaredWpli;
    use crate::connectivity::taper::generate_tapers;
    use ndarray::array;
    fn cached_trial(offset: f64, window: WindowType, fft_size: usize) -> TrialData {
        let tapers = generate_tapers(4, window).unwrap();
        let builder = SpectrumBuilder::with_size(fft_size, 4);
        let mut trial = TrialData::new(array![
            [offset, 1.0, 0.0, -1.0],
            [0.5, offset, -0.5, 0.0]
        ]);
        compute_trial(&mut trial, &builder, &tapers);
        trial
    }
    fn computed_trial(offset: f64) -> TrialData {
        cached_trial(offset, WindowType::Hanning, 4)
    }
    #[test]
    fn defaults_match_config_defaults() {
        let settings = ConnectivitySettings::default();
        let config = ConnectivityConfig::default();
        assert_eq!(settings.sampling_frequency_hz(), config.sampling_frequency_hz);
        assert_eq!(settings.window(), config.window);
        assert_eq!(settings.fft_size(), config.nfft);
    }
    #[test]
    fn cached_trials_are_merged_on_push() {
        let settings = ConnectivitySettings::new(vec![computed_trial(0.0), computed_trial(1.0)]);
        assert_eq!(settings.accumulator().trial_count(), 2);
    }
    #[test]
    fn mismatched_cached_trial_is_reset() {
        let mut settings = ConnectivitySettings::new(vec![computed_trial(0.0)]);
        let mut odd = TrialData::new(array![[1.0, 2.0, 3.0]]);
        let tapers = generate_tapers(3, WindowType::Hanning).unwrap();
        compute_trial(&mut odd, &SpectrumBuilder::with_size(3, 3), &tapers);
        settings.push_trial(odd);
        assert_eq!(settings.accumulator().trial_count(), 1);
        assert!(!settings.trials()[1].has_complete_pairs());
    }
    #[test]
    fn caches_from_another_fft_size_are_not_merged() {
        let settings = ConnectivitySettings::new(vec![
            cached_trial(0.0, WindowType::Hanning, 8),
            cached_trial(1.0, WindowType::Hanning, 4),
        ]);
        assert_eq!(settings.accumulator().trial_count(), 1);
        assert!(!settings.trials()[0].has_complete_pairs());
        assert!(settings.trials()[0].spectral_key().is_none());
        assert!(settings.trials()[1].has_complete_pairs());
    }
    #[test]
    fn caches_from_another_window_are_not_merged() {
        let settings = ConnectivitySettings::new(vec![cached_trial(0.0, WindowType::Rectangular, 4)]);
        assert!(settings.accumulator().is_empty());
        assert!(!settings.trials()[0].has_complete_pairs());
    }
    #[test]
    fn stale_cache_is_recomputed_by_the_next_run() {
        let fresh = TrialData::new(array![[0.0, 1.0, 0.0, -1.0], [1.0, 0.0, -1.0, 0.0]]);
        let mut settings =
            ConnectivitySettings::new(vec![cached_trial(0.0, WindowType::Hanning, 8), fresh]);
        let network = DebiasedSquaredWpli::calculate(&mut settings).unwrap();
        assert_eq!(settings.last_report().computed, 2);
        assert!(settings.last_faults().is_empty());
        assert_eq!(settings.accumulator().trial_count(), 2);
        assert!(network.edges().iter().all(|edge| edge.num_freqs() == 3));
    }
    #[test]
    fn remove_retracts_contribution() {
        let mut settings = ConnectivitySettings::new(vec![computed_trial(0.0), computed_trial(1.0)]);
        assert!(settings.remove_trial(0).is_some());
        assert_eq!(settings.accumulator().trial_count(), 1);
        assert!(settings.remove_trial(5).is_none());
    }
    #[test]
    fn changing_window_drops_caches() {
        let settings = ConnectivitySettings::new(vec![computed_trial(0.0)])
            .with_window(WindowType::Rectangular);
        assert!(settings.accumulator().is_empty());
        assert!(!settings.trials()[0].has_complete_pairs());
    }
    #[test]
    fn scheduler_is_kept_between_runs() {
        let mut settings =
            ConnectivitySettings::new(vec![TrialData::new(Array2::zeros((2, 8)))]).with_worker_threads(2);
        DebiasedSquaredWpli::calculate(&mut settings).unwrap();
        let first = settings.scheduler().unwrap();
        DebiasedSquaredWpli::calculate(&mut settings).unwrap();
        assert!(Arc::ptr_eq(&first, &settings.scheduler().unwrap()));
        assert_eq!(first.worker_count(), 2);
        let mut resized = settings.with_worker_threads(3);
        assert!(!Arc::ptr_eq(&first, &resized.scheduler().unwrap()));
    }
    #[test]
    fn positions_need_three_columns() {
        let err = ConnectivitySettings::default()
            .with_node_positions(Array2::zeros((2, 2)))
            .unwrap_err();
        assert!(matches!(err, ConnectivityError::InvalidPositions { columns: 2 }));
        let settings = ConnectivitySettings::default()
            .with_node_positions(array![[1.0, 2.0, 3.0]])
            .unwrap();
        assert_eq!(settings.node_position(0), [1.0, 2.0, 3.0]);
        assert_eq!(settings.node_position(1), [0.0; 3]);
    }
}
