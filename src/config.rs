//! Run configuration loaded from JSON.
//!
//! ```json
//! {
//!   "window": "dpss",
//!   "half_bandwidth": 3.0,
//!   "nfft": 512,
//!   "sampling_frequency_hz": 250.0,
//!   "worker_threads": 4,
//!   "trial_window": 20,
//!   "threshold": 0.1,
//!   "frequency_range_hz": [8.0, 13.0]
//! }
//! ```
//!
//! Every field is optional; missing fields take the values of
//! [`ConnectivityConfig::default`].
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::connectivity::error::{ConfigurationError, ConnectivityError};
use crate::connectivity::taper::WindowType;
pub const DEFAULT_SAMPLING_FREQUENCY_HZ: f64 = 1000.0;
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectivityConfig {
    /// `hanning`, `rectangular`, `dpss` or `dpss:<NW>`.
    pub window: WindowType,
    /// Overrides the DPSS half-bandwidth; ignored for other windows.
    pub half_bandwidth: Option<f64>,
    /// FFT length; values below the trial length (including 0) use the trial length.
    pub nfft: usize,
    pub sampling_frequency_hz: f64,
    /// 0 runs on rayon's global pool.
    pub worker_threads: usize,
    /// Trials kept by the streaming pipeline.
    pub trial_window: usize,
    pub threshold: Option<f64>,
    pub frequency_range_hz: Option<(f64, f64)>,
}
impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            window: WindowType::Hanning,
            half_bandwidth: None,
            nfft: 0,
            sampling_frequency_hz: DEFAULT_SAMPLING_FREQUENCY_HZ,
            worker_threads: 0,
            trial_window: 10,
            threshold: None,
            frequency_range_hz: None,
        }
    }
}
impl ConnectivityConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConnectivityError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
    pub fn from_json_str(json: &str) -> Result<Self, ConnectivityError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.trial_window == 0 {
            return Err(ConfigurationError::InvalidTrialWindow);
        }
        self.window_type().map(|_| ())
    }
    /// The window with `half_bandwidth` applied.
    pub fn window_type(&self) -> Result<WindowType, ConfigurationError> {
        match (self.window, self.half_bandwidth) {
            (WindowType::Dpss { .. }, Some(half_bandwidth)) => {
                if half_bandwidth.is_finite() && half_bandwidth > 0.0 {
                    Ok(WindowType::Dpss { half_bandwidth })
                } else {
                    Err(ConfigurationError::InvalidHalfBandwidth(half_bandwidth))
                }
            }
            (window, _) => Ok(window),
        }
    }
}
