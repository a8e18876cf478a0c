use std::sync::{Mutex, MutexGuard, PoisonError};
use ndarray::{Array2, Axis};
use rustfft::num_complex::Complex64;
use crate::connectivity::error::FaultKind;
use crate::connectivity::spectral::SpectrumBuilder;
use crate::connectivity::taper::TaperSet;
use crate::connectivity::trial::TrialData;
/// Per channel `i`, the CSD rows against channels `j >= i` (row `j - i`).
pub type PairCsd = Vec<(usize, Array2<Complex64>)>;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialOutcome {
    /// Pairs were computed and are ready to merge.
    Computed,
    /// The trial already held a complete pair set; nothing to do.
    Cached,
}
/// Cross-spectra for every pair `i <= j`, averaged over tapers.
///
/// The DC bin, and the Nyquist bin for an even FFT length, are halved because
/// only the half spectrum is kept.
pub fn pair_csd(spectra: &[Array2<Complex64>], denominator: f64, even_fft: bool) -> PairCsd {
    let channels = spectra.len();
    let num_freqs = spectra.first().map(|s| s.ncols()).unwrap_or(0);
    (0..channels)
        .map(|i| {
            let mut rows = Array2::zeros((channels - i, num_freqs));
            for j in i..channels {
                let cross = (&spectra[i] * &spectra[j].mapv(|c| c.conj())).sum_axis(Axis(0))
                    / denominator;
                let mut row = rows.row_mut(j - i);
                row.assign(&cross);
                if num_freqs > 0 {
                    row[0] /= 2.0;
                    if even_fft {
                        row[num_freqs - 1] /= 2.0;
                    }
                }
            }
            (i, rows)
        })
        .collect()
}
/// Fills the trial's pair cache, computing spectra first if needed.
///
/// A trial whose pair cache is complete for this FFT length and window is
/// left untouched.
pub fn compute_trial(
    trial: &mut TrialData,
    builder: &SpectrumBuilder,
    tapers: &TaperSet,
) -> TrialOutcome {
    if trial.has_complete_pairs_for(&builder.key(tapers)) {
        return TrialOutcome::Cached;
    }
    builder.ensure_spectra(trial, tapers);
    let spectra = trial.tapered_spectra.as_deref().unwrap_or(&[]);
    let pairs = pair_csd(spectra, tapers.csd_denominator(), builder.is_even());
    trial.pair_csd = pairs;
    TrialOutcome::Computed
}
#[derive(Debug, Default)]
struct CsdSum {
    pairs: PairCsd,
    trials: usize,
}
/// Running CSD sum shared by all workers of a run.
///
/// The lock is only taken for the elementwise add, never while spectra are
/// being computed.
#[derive(Debug, Default)]
pub struct CsdAccumulator {
    inner: Mutex<CsdSum>,
}
impl CsdAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
    fn lock(&self) -> MutexGuard<'_, CsdSum> {
        // shapes are checked before the first element is touched, so the
        // elementwise update cannot stop halfway
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// Adds one trial's pairs. The first trial initializes the sum.
    ///
    /// Pairs whose layout differs from the running sum are rejected and the
    /// sum is left as it was.
    pub fn merge(&self, pairs: &[(usize, Array2<Complex64>)]) -> Result<(), FaultKind> {
        let mut sum = self.lock();
        if sum.pairs.is_empty() {
            sum.pairs = pairs.to_vec();
        } else {
            check_layout(&sum.pairs, pairs)?;
            for ((_, total), (_, addend)) in sum.pairs.iter_mut().zip(pairs) {
                *total += addend;
            }
        }
        sum.trials += 1;
        Ok(())
    }
    /// Removes a previously merged trial's pairs. Used by the sliding trial
    /// window between runs.
    pub fn retract(&self, pairs: &[(usize, Array2<Complex64>)]) -> Result<(), FaultKind> {
        let mut sum = self.lock();
        if sum.trials == 0 {
            return Ok(());
        }
        if !sum.pairs.is_empty() {
            check_layout(&sum.pairs, pairs)?;
        }
        sum.trials -= 1;
        if sum.trials == 0 {
            sum.pairs.clear();
            return Ok(());
        }
        for ((_, total), (_, addend)) in sum.pairs.iter_mut().zip(pairs) {
            *total -= addend;
        }
        Ok(())
    }
    pub fn trial_count(&self) -> usize {
        self.lock().trials
    }
    pub fn is_empty(&self) -> bool {
        self.lock().pairs.is_empty()
    }
    pub fn clear(&self) {
        let mut sum = self.lock();
        sum.pairs.clear();
        sum.trials = 0;
    }
    /// Runs `f` on the current sum while holding the lock.
    pub fn with_sum<R>(&self, f: impl FnOnce(&[(usize, Array2<Complex64>)]) -> R) -> R {
        let sum = self.lock();
        f(&sum.pairs)
    }
    pub fn snapshot(&self) -> PairCsd {
        self.lock().pairs.clone()
    }
}
fn check_layout(
    sum: &[(usize, Array2<Complex64>)],
    pairs: &[(usize, Array2<Complex64>)],
) -> Result<(), FaultKind> {
    if sum.len() != pairs.len() {
        return Err(FaultKind::ChannelMismatch {
            expected: sum.len(),
            actual: pairs.len(),
        });
    }
    for ((channel, total), (_, addend)) in sum.iter().zip(pairs) {
        if total.dim() != addend.dim() {
            return Err(FaultKind::IncompatibleCsd {
                channel: *channel,
                expected: total.dim(),
                actual: addend.dim(),
            });
        }
    }
    Ok(())
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::taper::{generate_tapers, WindowType};
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    fn random_trial(rng: &mut StdRng, channels: usize, samples: usize) -> TrialData {
        TrialData::new(Array2::from_shape_fn((channels, samples), |_| {
            rng.gen_range(-1.0..1.0)
        }))
    }
    #[test]
    fn pair_layout_is_upper_triangular() {
        let tapers = generate_tapers(8, WindowType::Hanning).unwrap();
        let builder = SpectrumBuilder::with_size(8, 8);
        let mut rng = StdRng::seed_from_u64(7);
        let mut trial = random_trial(&mut rng, 3, 8);
        assert_eq!(compute_trial(&mut trial, &builder, &tapers), TrialOutcome::Computed);
        let pairs = trial.pair_csd();
        assert_eq!(pairs.len(), 3);
        for (i, (index, rows)) in pairs.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(rows.dim(), (3 - i, 5));
        }
        // auto-spectra are real and non-negative
        for (_, rows) in pairs {
            for value in rows.row(0).iter() {
                assert!(value.im.abs() < 1e-12);
                assert!(value.re >= -1e-12);
            }
        }
    }
    #[test]
    fn dc_and_nyquist_bins_are_halved() {
        let tapers = generate_tapers(4, WindowType::Rectangular).unwrap();
        let builder = SpectrumBuilder::with_size(4, 4);
        let mut trial = TrialData::new(array![[1.0, -1.0, 1.0, -1.0]]);
        compute_trial(&mut trial, &builder, &tapers);
        let auto = &trial.pair_csd()[0].1;
        // |X(2)|^2 = 4, divided by denom 0.5, then halved for Nyquist
        assert!((auto[[0, 2]].re - 4.0).abs() < 1e-12);
        let mut odd = TrialData::new(array![[1.0, -1.0, 1.0, -1.0]]);
        let builder = SpectrumBuilder::with_size(5, 4);
        compute_trial(&mut odd, &builder, &tapers);
        assert_eq!(odd.pair_csd()[0].1.ncols(), 3);
    }
    #[test]
    fn complete_trial_is_not_recomputed() {
        let tapers = generate_tapers(8, WindowType::Hanning).unwrap();
        let builder = SpectrumBuilder::with_size(8, 8);
        let mut rng = StdRng::seed_from_u64(11);
        let mut trial = random_trial(&mut rng, 2, 8);
        compute_trial(&mut trial, &builder, &tapers);
        let before = trial.pair_csd().to_vec();
        assert_eq!(compute_trial(&mut trial, &builder, &tapers), TrialOutcome::Cached);
        assert_eq!(trial.pair_csd(), before.as_slice());
    }
    #[test]
    fn merge_order_does_not_change_the_sum() {
        let tapers = generate_tapers(16, WindowType::Hanning).unwrap();
        let builder = SpectrumBuilder::with_size(16, 16);
        let mut rng = StdRng::seed_from_u64(3);
        let mut trials: Vec<TrialData> = (0..6).map(|_| random_trial(&mut rng, 4, 16)).collect();
        for trial in &mut trials {
            compute_trial(trial, &builder, &tapers);
        }
        let forward = CsdAccumulator::new();
        for trial in &trials {
            forward.merge(trial.pair_csd()).unwrap();
        }
        trials.shuffle(&mut rng);
        let shuffled = CsdAccumulator::new();
        for trial in &trials {
            shuffled.merge(trial.pair_csd()).unwrap();
        }
        assert_eq!(forward.trial_count(), 6);
        let a = forward.snapshot();
        let b = shuffled.snapshot();
        for ((_, x), (_, y)) in a.iter().zip(&b) {
            for (p, q) in x.iter().zip(y.iter()) {
                assert!((p - q).norm() < 1e-9);
            }
        }
    }
    #[test]
    fn retract_undoes_merge() {
        let tapers = generate_tapers(8, WindowType::Hanning).unwrap();
        let builder = SpectrumBuilder::with_size(8, 8);
        let mut rng = StdRng::seed_from_u64(5);
        let mut first = random_trial(&mut rng, 2, 8);
        let mut second = random_trial(&mut rng, 2, 8);
        compute_trial(&mut first, &builder, &tapers);
        compute_trial(&mut second, &builder, &tapers);
        let acc = CsdAccumulator::new();
        acc.merge(first.pair_csd()).unwrap();
        acc.merge(second.pair_csd()).unwrap();
        acc.retract(first.pair_csd()).unwrap();
        assert_eq!(acc.trial_count(), 1);
        acc.with_sum(|sum| {
            for ((_, x), (_, y)) in sum.iter().zip(second.pair_csd()) {
                for (p, q) in x.iter().zip(y.iter()) {
                    assert!((p - q).norm() < 1e-9);
                }
            }
        });
        acc.retract(second.pair_csd()).unwrap();
        assert!(acc.is_empty());
    }
    #[test]
    fn pairs_from_another_fft_size_are_recomputed() {
        let tapers = generate_tapers(4, WindowType::Hanning).unwrap();
        let mut trial = TrialData::new(array![[1.0, 0.0, -1.0, 0.0], [0.0, 1.0, 0.0, -1.0]]);
        compute_trial(&mut trial, &SpectrumBuilder::with_size(8, 4), &tapers);
        assert_eq!(trial.pair_csd()[0].1.ncols(), 5);
        let narrow = SpectrumBuilder::with_size(4, 4);
        assert_eq!(compute_trial(&mut trial, &narrow, &tapers), TrialOutcome::Computed);
        assert_eq!(trial.pair_csd()[0].1.ncols(), 3);
        assert_eq!(compute_trial(&mut trial, &narrow, &tapers), TrialOutcome::Cached);
    }
    #[test]
    fn mismatched_layout_leaves_the_sum_untouched() {
        let tapers = generate_tapers(8, WindowType::Hanning).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let mut wide = random_trial(&mut rng, 2, 8);
        let mut narrow = wide.clone();
        let mut fewer = random_trial(&mut rng, 1, 8);
        compute_trial(&mut wide, &SpectrumBuilder::with_size(16, 8), &tapers);
        compute_trial(&mut narrow, &SpectrumBuilder::with_size(8, 8), &tapers);
        compute_trial(&mut fewer, &SpectrumBuilder::with_size(16, 8), &tapers);
        let acc = CsdAccumulator::new();
        acc.merge(wide.pair_csd()).unwrap();
        let before = acc.snapshot();
        assert_eq!(
            acc.merge(narrow.pair_csd()),
            Err(FaultKind::IncompatibleCsd {
                channel: 0,
                expected: (2, 9),
                actual: (2, 5),
            })
        );
        assert!(matches!(
            acc.merge(fewer.pair_csd()),
            Err(FaultKind::ChannelMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(acc.retract(narrow.pair_csd()).is_err());
        assert_eq!(acc.trial_count(), 1);
        assert_eq!(acc.snapshot(), before);
    }
}
