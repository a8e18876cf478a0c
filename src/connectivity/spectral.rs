use std::sync::Arc;
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use crate::connectivity::taper::TaperSet;
use crate::connectivity::trial::{SpectralKey, TrialData};
/// Tapered half-spectrum FFTs with one plan shared by all workers.
#[derive(Clone)]
pub struct SpectrumBuilder {
    fft_size: usize,
    fft: Arc<dyn Fft<f64>>,
}
impl SpectrumBuilder {
    /// Plans the forward FFT. A requested size shorter than the signal is
    /// raised to the signal length.
    pub fn with_size(fft_size: usize, signal_length: usize) -> Self {
        let fft_size = Self::effective_size(fft_size, signal_length);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self { fft_size, fft }
    }
    /// FFT length actually used for a requested size and signal length.
    pub fn effective_size(fft_size: usize, signal_length: usize) -> usize {
        fft_size.max(signal_length).max(1)
    }
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
    /// Cache key for spectra produced by this builder with `tapers`.
    pub fn key(&self, tapers: &TaperSet) -> SpectralKey {
        SpectralKey {
            fft_size: self.fft_size,
            window: tapers.window(),
        }
    }
    /// Bins in the half spectrum, `floor(nfft / 2) + 1`.
    pub fn num_freqs(&self) -> usize {
        self.fft_size / 2 + 1
    }
    pub fn is_even(&self) -> bool {
        self.fft_size % 2 == 0
    }
    /// One `taper x bin` matrix for a single channel row.
    pub fn channel_spectrum(&self, row: ArrayView1<f64>, tapers: &TaperSet) -> Array2<Complex64> {
        let mean = row.mean().unwrap_or(0.0);
        let num_freqs = self.num_freqs();
        let mut spectrum = Array2::zeros((tapers.count(), num_freqs));
        let mut buffer = vec![Complex64::new(0.0, 0.0); self.fft_size];
        let mut scratch = vec![Complex64::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        for (taper_idx, (taper, weight)) in tapers
            .tapers()
            .rows()
            .into_iter()
            .zip(tapers.weights().iter())
            .enumerate()
        {
            buffer.fill(Complex64::new(0.0, 0.0));
            for (slot, (sample, window)) in buffer.iter_mut().zip(row.iter().zip(taper.iter())) {
                *slot = Complex64::new((sample - mean) * window, 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            for (bin, value) in buffer.iter().take(num_freqs).enumerate() {
                spectrum[[taper_idx, bin]] = *value * *weight;
            }
        }
        spectrum
    }
    pub fn compute(&self, data: &Array2<f64>, tapers: &TaperSet) -> Vec<Array2<Complex64>> {
        data.rows()
            .into_iter()
            .map(|row| self.channel_spectrum(row, tapers))
            .collect()
    }
    /// Fills the trial's spectra cache unless one for the same channel count,
    /// FFT length and window is already present. Returns whether anything was
    /// computed.
    pub fn ensure_spectra(&self, trial: &mut TrialData, tapers: &TaperSet) -> bool {
        let key = self.key(tapers);
        if trial.has_spectra_for(trial.num_channels()) && trial.spectral_key == Some(key) {
            return false;
        }
        // pairs derived from the old spectra are stale too
        trial.invalidate_cache();
        let spectra = self.compute(trial.data(), tapers);
        trial.tapered_spectra = Some(spectra);
        trial.spectral_key = Some(key);
        true
    }
}
