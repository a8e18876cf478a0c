use thiserror::Error;
use crate::network::NetworkError;
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("signal length must be greater than zero")]
    InvalidSignalLength,
    #[error("unknown window type `{0}` (expected hanning, rectangular or dpss)")]
    UnknownWindowType(String),
    #[error("dpss half-bandwidth must be a positive finite number, got {0}")]
    InvalidHalfBandwidth(f64),
    #[error("trial window must hold at least one trial")]
    InvalidTrialWindow,
}
/// Why a single trial was left out of the accumulated CSD.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FaultKind {
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("sample count mismatch: expected {expected}, got {actual}")]
    SampleMismatch { expected: usize, actual: usize },
    #[error("non-finite sample at channel {channel}, sample {sample}")]
    NonFiniteSample { channel: usize, sample: usize },
    #[error("CSD rows for channel {channel} are {actual:?}, the running sum holds {expected:?}")]
    IncompatibleCsd {
        channel: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("worker panicked: {0}")]
    Panicked(String),
}
#[derive(Debug, Error, Clone, PartialEq)]
#[error("trial {trial}: {kind}")]
pub struct TrialFault {
    pub trial: usize,
    pub kind: FaultKind,
}
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("all {} trials failed; first fault: {}", .faults.len(), first_fault(.faults))]
    NoUsableTrials { faults: Vec<TrialFault> },
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("node positions must have 3 columns, got {columns}")]
    InvalidPositions { columns: usize },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}
fn first_fault(faults: &[TrialFault]) -> String {
    faults
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".into())
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ConnectivityError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ConnectivityError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for ConnectivityError {
    fn from(value: image::ImageError) -> Self {
        ConnectivityError::Plot(value.to_string())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn aggregate_error_names_first_fault() {
        let err = ConnectivityError::NoUsableTrials {
            faults: vec![TrialFault {
                trial: 3,
                kind: FaultKind::NonFiniteSample {
                    channel: 1,
                    sample: 7,
                },
            }],
        };
        let text = err.to_string();
        assert!(text.contains("all 1 trials failed"));
        assert!(text.contains("trial 3"));
    }
    #[test]
    fn configuration_errors_convert() {
        let err: ConnectivityError = ConfigurationError::InvalidSignalLength.into();
        assert!(matches!(
            err,
            ConnectivityError::Configuration(ConfigurationError::InvalidSignalLength)
        ));
    }
}
