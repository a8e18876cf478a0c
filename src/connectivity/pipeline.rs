use log::{debug, warn};
use ndarray::Array2;
use crate::config::ConnectivityConfig;
use crate::connectivity::error::ConnectivityError;
use crate::connectivity::metric::DebiasedSquaredWpli;
use crate::connectivity::settings::ConnectivitySettings;
use crate::connectivity::source::TrialSource;
use crate::connectivity::trial::TrialData;
use crate::network::Network;
/// Streaming front end: pulls trials one at a time and keeps the network of
/// the most recent `trial_window` trials up to date.
///
/// Only the incoming trial is transformed; evicted trials are retracted from
/// the CSD sum and the rest come from their caches.
pub struct ConnectivityPipeline<S: TrialSource> {
    source: S,
    settings: ConnectivitySettings,
    trial_window: usize,
    threshold: Option<f64>,
    frequency_range_hz: Option<(f64, f64)>,
    latest: Option<Network>,
}
impl<S: TrialSource> ConnectivityPipeline<S> {
    pub fn new(source: S, config: &ConnectivityConfig) -> Result<Self, ConnectivityError> {
        let settings = ConnectivitySettings::from_config(config, Vec::new())?;
        Ok(Self {
            source,
            settings,
            trial_window: config.trial_window,
            threshold: config.threshold,
            frequency_range_hz: config.frequency_range_hz,
            latest: None,
        })
    }
    pub fn with_node_positions(mut self, positions: Array2<f32>) -> Result<Self, ConnectivityError> {
        self.settings = std::mem::take(&mut self.settings).with_node_positions(positions)?;
        Ok(self)
    }
    /// Pulls one trial and recomputes. `None` once the source is exhausted.
    pub fn pump_once(&mut self) -> Result<Option<Network>, ConnectivityError> {
        let Some(trial) = self.source.next_trial()? else {
            return Ok(None);
        };
        let network = self.push_and_compute(trial)?;
        Ok(Some(network))
    }
    pub fn push_and_compute(&mut self, trial: TrialData) -> Result<Network, ConnectivityError> {
        while self.settings.trials().len() >= self.trial_window {
            if self.settings.remove_trial(0).is_none() {
                break;
            }
        }
        self.settings.push_trial(trial);
        let result = DebiasedSquaredWpli::calculate(&mut self.settings);
        let dropped = self.settings.discard_faulted();
        if dropped > 0 {
            warn!("dropped {dropped} faulted trial(s) from the window");
        }
        let mut network = result?;
        if let Some((from_hz, to_hz)) = self.frequency_range_hz {
            network.set_frequency_range(from_hz, to_hz)?;
        }
        if let Some(threshold) = self.threshold {
            network.set_threshold(threshold);
        }
        debug!(
            "window holds {} of {} trials",
            self.settings.trials().len(),
            self.trial_window
        );
        self.latest = Some(network.clone());
        Ok(network)
    }
    /// Runs the source dry and returns the last network produced.
    pub fn drain(&mut self) -> Result<Option<Network>, ConnectivityError> {
        let mut last = None;
        while let Some(network) = self.pump_once()? {
            last = Some(network);
        }
        Ok(last)
    }
    pub fn latest_network(&self) -> Option<&Network> {
        self.latest.as_ref()
    }
    pub fn settings(&self) -> &ConnectivitySettings {
        &self.settings
    }
}
