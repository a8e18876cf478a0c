use std::time::Instant;
use log::{debug, info};
use ndarray::Array2;
use rustfft::num_complex::Complex64;
use crate::connectivity::error::ConnectivityError;
use crate::connectivity::scheduler::TrialJob;
use crate::connectivity::settings::ConnectivitySettings;
use crate::connectivity::spectral::SpectrumBuilder;
use crate::connectivity::taper::TaperSet;
use crate::network::{Network, NetworkEdge};
/// Debiased squared weighted phase lag index over a batch of trials.
pub struct DebiasedSquaredWpli;
impl DebiasedSquaredWpli {
    pub const NAME: &'static str = "Debiased Squared Weighted Phase Lag Index";
    /// Computes the connectivity network for every trial in `settings`.
    ///
    /// Trials that fault are left out and listed in
    /// [`ConnectivitySettings::last_faults`]; the call only fails when no
    /// trial made it into the CSD sum.
    pub fn calculate(settings: &mut ConnectivitySettings) -> Result<Network, ConnectivityError> {
        let mut network = Network::new(Self::NAME);
        let Some(first) = settings.trials().first() else {
            debug!("no trials supplied, returning an empty network");
            return Ok(network);
        };
        let started = Instant::now();
        let channels = first.num_channels();
        let samples = first.samples_per_channel();
        let tapers = TaperSet::shared(samples, settings.window())?;
        let builder = SpectrumBuilder::with_size(settings.fft_size(), samples);
        let scheduler = settings.scheduler()?;
        let job = TrialJob {
            builder: &builder,
            tapers: &tapers,
            channels,
            samples,
        };
        let (trials, accumulator) = settings.batch_parts();
        let report = scheduler.run(trials, &job, accumulator);
        if settings.accumulator().is_empty() && !report.faults.is_empty() {
            let faults = report.faults.clone();
            settings.record_report(report);
            return Err(ConnectivityError::NoUsableTrials { faults });
        }
        let merged = settings.accumulator().trial_count();
        settings.record_report(report);
        let weights = settings.accumulator().with_sum(finalize);
        for index in 0..channels {
            network.append_node(settings.node_position(index));
        }
        network.set_spectrum_info(settings.sampling_frequency_hz(), builder.fft_size());
        for (i, rows) in weights {
            for (offset, row) in rows.outer_iter().enumerate() {
                network.append_edge(NetworkEdge::new(i, i + offset, row.to_owned()))?;
            }
        }
        info!(
            "{}: {} channels, {} trials merged, {} tapers, nfft {} in {:?}",
            Self::NAME,
            channels,
            merged,
            tapers.count(),
            builder.fft_size(),
            started.elapsed()
        );
        Ok(network)
    }
}
/// Turns accumulated CSD rows into per-bin weights, one matrix per channel.
///
/// Zero denominators become `+inf`, so those bins come out as `0.0`.
pub fn finalize(sum: &[(usize, Array2<Complex64>)]) -> Vec<(usize, Array2<f64>)> {
    sum.iter()
        .map(|(channel, rows)| {
            let imag = rows.mapv(|value| value.im);
            let squared = imag.mapv(|v| v * v);
            let numerator = &squared - &squared;
            let denominator = imag.mapv(|v| v.abs() * v.abs()) - &squared;
            let denominator = denominator.mapv(|d| if d == 0.0 { f64::INFINITY } else { d });
            (*channel, numerator / denominator)
        })
        .collect()
}
