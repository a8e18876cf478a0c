//! Trial-averaged phase-lag connectivity for multi-channel recordings.
//!
//! Trials are tapered and transformed ([`connectivity::spectral`]), turned into
//! per-trial cross-spectra that are summed across trials in parallel
//! ([`connectivity::csd`], [`connectivity::scheduler`]), and finalized into a
//! [`network::Network`] with one weight vector per channel pair
//! ([`connectivity::metric`]).
pub mod config;
pub mod connectivity;
pub mod network;
pub use config::ConnectivityConfig;
pub use connectivity::{
    ConnectivityError, ConnectivityPipeline, ConnectivitySettings, DebiasedSquaredWpli,
    TrialData, WindowType,
};
pub use network::{Network, NetworkEdge, NetworkNode};
