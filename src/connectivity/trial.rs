use ndarray::Array2;
use rustfft::num_complex::Complex64;
use crate::connectivity::error::FaultKind;
use crate::connectivity::taper::WindowType;
/// FFT length and window a trial's caches were computed with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralKey {
    pub fft_size: usize,
    pub window: WindowType,
}
/// One trial of channel x sample data plus the lazily filled spectral caches.
#[derive(Clone, Debug)]
pub struct TrialData {
    data: Array2<f64>,
    /// channel -> (taper x frequency bin)
    pub(crate) tapered_spectra: Option<Vec<Array2<Complex64>>>,
    /// channel i -> CSD rows against channels j >= i, row `j - i`
    pub(crate) pair_csd: Vec<(usize, Array2<Complex64>)>,
    pub(crate) spectral_key: Option<SpectralKey>,
}
impl TrialData {
    pub fn new(data: Array2<f64>) -> Self {
        Self {
            data,
            tapered_spectra: None,
            pair_csd: Vec::new(),
            spectral_key: None,
        }
    }
    /// Builds a trial from per-channel sample rows; rows must share one length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, FaultKind> {
        let samples = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|row| row.len() != samples) {
            return Err(FaultKind::SampleMismatch {
                expected: samples,
                actual: bad.len(),
            });
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((rows.len(), samples), flat).map_err(|_| {
            FaultKind::SampleMismatch {
                expected: samples,
                actual: 0,
            }
        })?;
        Ok(Self::new(data))
    }
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }
    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }
    pub fn samples_per_channel(&self) -> usize {
        self.data.ncols()
    }
    pub fn tapered_spectra(&self) -> Option<&[Array2<Complex64>]> {
        self.tapered_spectra.as_deref()
    }
    pub fn pair_csd(&self) -> &[(usize, Array2<Complex64>)] {
        &self.pair_csd
    }
    pub fn has_spectra_for(&self, channels: usize) -> bool {
        self.tapered_spectra
            .as_ref()
            .map_or(false, |spectra| spectra.len() == channels)
    }
    pub fn spectral_key(&self) -> Option<SpectralKey> {
        self.spectral_key
    }
    /// The pair cache is complete once it holds one entry per channel.
    pub fn has_complete_pairs(&self) -> bool {
        !self.pair_csd.is_empty() && self.pair_csd.len() == self.num_channels()
    }
    /// Complete, and computed with `key`. Caches from another FFT length or
    /// window count as missing.
    pub fn has_complete_pairs_for(&self, key: &SpectralKey) -> bool {
        self.has_complete_pairs() && self.spectral_key.as_ref() == Some(key)
    }
    /// Drops both caches; call after changing what the trial represents.
    pub fn invalidate_cache(&mut self) {
        self.tapered_spectra = None;
        self.pair_csd.clear();
        self.spectral_key = None;
    }
    /// Checks the trial against the run's expected shape.
    pub fn validate(&self, channels: usize, samples: usize) -> Result<(), FaultKind> {
        if self.num_channels() != channels {
            return Err(FaultKind::ChannelMismatch {
                expected: channels,
                actual: self.num_channels(),
            });
        }
        if self.samples_per_channel() != samples {
            return Err(FaultKind::SampleMismatch {
                expected: samples,
                actual: self.samples_per_channel(),
            });
        }
        if let Some(((channel, sample), _)) = self
            .data
            .indexed_iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(FaultKind::NonFiniteSample { channel, sample });
        }
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    #[test]
    fn from_rows_keeps_layout() {
        let trial = TrialData::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(trial.num_channels(), 2);
        assert_eq!(trial.samples_per_channel(), 3);
        assert_eq!(trial.data()[[1, 0]], 4.0);
    }
    #[test]
    fn ragged_rows_are_rejected() {
        let err = TrialData::from_rows(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert_eq!(
            err,
            FaultKind::SampleMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
    #[test]
    fn validate_reports_first_non_finite_sample() {
        let trial = TrialData::new(array![[0.0, 1.0], [f64::NAN, 2.0]]);
        assert_eq!(
            trial.validate(2, 2),
            Err(FaultKind::NonFiniteSample {
                channel: 1,
                sample: 0
            })
        );
        assert!(matches!(
            trial.validate(3, 2),
            Err(FaultKind::ChannelMismatch { .. })
        ));
    }
    #[test]
    fn fresh_trial_has_no_caches() {
        let trial = TrialData::new(Array2::zeros((2, 4)));
        assert!(!trial.has_complete_pairs());
        assert!(!trial.has_spectra_for(2));
        assert!(trial.tapered_spectra().is_none());
        assert!(trial.spectral_key().is_none());
    }
    #[test]
    fn pairs_from_another_key_are_incomplete() {
        let key = SpectralKey {
            fft_size: 4,
            window: WindowType::Hanning,
        };
        let mut trial = TrialData::new(Array2::zeros((1, 4)));
        trial.pair_csd = vec![(0, Array2::zeros((1, 3)))];
        trial.spectral_key = Some(key);
        assert!(trial.has_complete_pairs_for(&key));
        let wider = SpectralKey { fft_size: 8, ..key };
        assert!(!trial.has_complete_pairs_for(&wider));
        let boxcar = SpectralKey {
            window: WindowType::Rectangular,
            ..key
        };
        assert!(!trial.has_complete_pairs_for(&boxcar));
        trial.invalidate_cache();
        assert!(!trial.has_complete_pairs_for(&key));
    }
}
