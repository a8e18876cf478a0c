//! Window tapers applied before the spectral transform.
//!
//! Hanning and rectangular windows produce a single unit-norm taper with a
//! weight of one. `Dpss` produces Slepian tapers for multitaper estimation,
//! weighted by the square root of their spectral concentration.
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use ndarray::{Array1, Array2, Axis};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use crate::connectivity::error::ConfigurationError;
/// Default time half-bandwidth product for `dpss`.
pub const DEFAULT_HALF_BANDWIDTH: f64 = 4.0;
/// Slepian tapers concentrating less energy than this are dropped.
const LOW_BIAS_CONCENTRATION: f64 = 0.9;
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WindowType {
    Hanning,
    Rectangular,
    Dpss { half_bandwidth: f64 },
}
impl Default for WindowType {
    fn default() -> Self {
        WindowType::Hanning
    }
}
impl WindowType {
    fn cache_key(&self) -> (u8, u64) {
        match self {
            WindowType::Hanning => (0, 0),
            WindowType::Rectangular => (1, 0),
            WindowType::Dpss { half_bandwidth } => (2, half_bandwidth.to_bits()),
        }
    }
}
impl FromStr for WindowType {
    type Err = ConfigurationError;
    /// Accepts `hanning`, `rectangular` and `dpss`, plus `dpss:<NW>` to pick
    /// the half-bandwidth inline.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let (name, param) = match normalized.split_once(':') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (normalized.as_str(), None),
        };
        match (name, param) {
            ("hanning" | "hann", None) => Ok(WindowType::Hanning),
            ("rectangular" | "ones" | "boxcar", None) => Ok(WindowType::Rectangular),
            ("dpss" | "multitaper", None) => Ok(WindowType::Dpss {
                half_bandwidth: DEFAULT_HALF_BANDWIDTH,
            }),
            ("dpss" | "multitaper", Some(param)) => {
                let half_bandwidth: f64 = param
                    .parse()
                    .map_err(|_| ConfigurationError::UnknownWindowType(value.to_string()))?;
                validate_half_bandwidth(half_bandwidth)?;
                Ok(WindowType::Dpss { half_bandwidth })
            }
            _ => Err(ConfigurationError::UnknownWindowType(value.to_string())),
        }
    }
}
impl TryFrom<String> for WindowType {
    type Error = ConfigurationError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
impl From<WindowType> for String {
    fn from(value: WindowType) -> Self {
        value.to_string()
    }
}
impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowType::Hanning => write!(f, "hanning"),
            WindowType::Rectangular => write!(f, "rectangular"),
            WindowType::Dpss { half_bandwidth } => write!(f, "dpss:{half_bandwidth}"),
        }
    }
}
fn validate_half_bandwidth(half_bandwidth: f64) -> Result<(), ConfigurationError> {
    if half_bandwidth.is_finite() && half_bandwidth > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidHalfBandwidth(half_bandwidth))
    }
}
/// Distinct (length, window) taper sets kept by [`TaperSet::shared`]. The
/// cache is emptied when it fills up; sets already handed out stay valid.
pub const TAPER_CACHE_CAPACITY: usize = 32;
type TaperCache = HashMap<(usize, (u8, u64)), Arc<TaperSet>>;
static TAPER_CACHE: Lazy<Mutex<TaperCache>> = Lazy::new(|| Mutex::new(HashMap::new()));
fn taper_cache() -> std::sync::MutexGuard<'static, TaperCache> {
    TAPER_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
/// Taper rows (taper x sample) and one weight per taper.
#[derive(Clone, Debug, PartialEq)]
pub struct TaperSet {
    tapers: Array2<f64>,
    weights: Array1<f64>,
    window: WindowType,
}
impl TaperSet {
    /// Returns the process-wide shared taper set for this length and window,
    /// generating it on first use.
    pub fn shared(
        signal_length: usize,
        window: WindowType,
    ) -> Result<Arc<TaperSet>, ConfigurationError> {
        let key = (signal_length, window.cache_key());
        if let Some(hit) = taper_cache().get(&key) {
            return Ok(Arc::clone(hit));
        }
        let generated = Arc::new(generate_tapers(signal_length, window)?);
        let mut cache = taper_cache();
        if cache.len() >= TAPER_CACHE_CAPACITY && !cache.contains_key(&key) {
            cache.clear();
        }
        Ok(Arc::clone(cache.entry(key).or_insert(generated)))
    }
    /// The window these tapers were generated for.
    pub fn window(&self) -> WindowType {
        self.window
    }
    pub fn tapers(&self) -> &Array2<f64> {
        &self.tapers
    }
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }
    pub fn count(&self) -> usize {
        self.tapers.nrows()
    }
    pub fn signal_length(&self) -> usize {
        self.tapers.ncols()
    }
    /// CSD normalization: `sqrt(sum w^2) * sqrt(sum w^2) / 2`.
    pub fn csd_denominator(&self) -> f64 {
        let energy = self.weights.mapv(|w| w * w).sum().sqrt();
        energy * energy / 2.0
    }
}
/// Builds the taper set for `signal_length` samples.
pub fn generate_tapers(
    signal_length: usize,
    window: WindowType,
) -> Result<TaperSet, ConfigurationError> {
    if signal_length == 0 {
        return Err(ConfigurationError::InvalidSignalLength);
    }
    match window {
        WindowType::Hanning => Ok(single(hanning(signal_length), window)),
        WindowType::Rectangular => {
            let value = 1.0 / (signal_length as f64).sqrt();
            Ok(single(Array1::from_elem(signal_length, value), window))
        }
        WindowType::Dpss { half_bandwidth } => {
            validate_half_bandwidth(half_bandwidth)?;
            Ok(dpss(signal_length, half_bandwidth))
        }
    }
}
fn single(taper: Array1<f64>, window: WindowType) -> TaperSet {
    TaperSet {
        tapers: taper.insert_axis(Axis(0)),
        weights: Array1::ones(1),
        window,
    }
}
fn hanning(signal_length: usize) -> Array1<f64> {
    if signal_length == 1 {
        return Array1::ones(1);
    }
    let span = (signal_length - 1) as f64;
    let window = Array1::from_shape_fn(signal_length, |n| {
        0.5 - 0.5 * (2.0 * PI * n as f64 / span).cos()
    });
    let norm = window.dot(&window).sqrt();
    window / norm
}
/// Slepian sequences with low-bias selection, most concentrated first.
fn dpss(signal_length: usize, half_bandwidth: f64) -> TaperSet {
    let wanted = ((2.0 * half_bandwidth).floor() as usize)
        .saturating_sub(1)
        .clamp(1, signal_length);
    let bandwidth = half_bandwidth / signal_length as f64;
    let diagonal: Vec<f64> = (0..signal_length)
        .map(|n| {
            let centre = (signal_length as f64 - 1.0 - 2.0 * n as f64) / 2.0;
            centre * centre * (2.0 * PI * bandwidth).cos()
        })
        .collect();
    // off_diagonal[n] couples samples n - 1 and n; index 0 is unused.
    let off_diagonal: Vec<f64> = (0..signal_length)
        .map(|n| (n * (signal_length - n)) as f64 / 2.0)
        .collect();
    let mut found: Vec<Vec<f64>> = Vec::with_capacity(wanted);
    for k in 0..wanted {
        let eigenvalue = kth_largest_eigenvalue(&diagonal, &off_diagonal, k);
        let mut vector = inverse_iteration(&diagonal, &off_diagonal, eigenvalue, &found);
        fix_sign(&mut vector, k);
        found.push(vector);
    }
    let mut ranked: Vec<(f64, Vec<f64>)> = found
        .into_iter()
        .map(|taper| (concentration(&taper, bandwidth), taper))
        .collect();
    if ranked
        .iter()
        .any(|(ratio, _)| *ratio > LOW_BIAS_CONCENTRATION)
    {
        ranked.retain(|(ratio, _)| *ratio > LOW_BIAS_CONCENTRATION);
    } else {
        // the leading taper is always the most concentrated one
        ranked.truncate(1);
    }
    let mut tapers = Array2::zeros((ranked.len(), signal_length));
    let mut weights = Array1::zeros(ranked.len());
    for (row, (ratio, taper)) in ranked.into_iter().enumerate() {
        tapers.row_mut(row).assign(&Array1::from(taper));
        weights[row] = ratio.clamp(0.0, 1.0).sqrt();
    }
    TaperSet {
        tapers,
        weights,
        window: WindowType::Dpss { half_bandwidth },
    }
}
/// Number of eigenvalues strictly below `x` (Sturm sequence count).
fn sturm_count(diagonal: &[f64], off_diagonal: &[f64], x: f64) -> usize {
    let mut count = 0;
    let mut q = 1.0;
    for n in 0..diagonal.len() {
        let coupling = if n == 0 {
            0.0
        } else {
            off_diagonal[n] * off_diagonal[n] / q
        };
        q = diagonal[n] - x - coupling;
        if q == 0.0 {
            q = -f64::EPSILON * (1.0 + x.abs());
        }
        if q < 0.0 {
            count += 1;
        }
    }
    count
}
fn kth_largest_eigenvalue(diagonal: &[f64], off_diagonal: &[f64], k: usize) -> f64 {
    let size = diagonal.len();
    let target = size - 1 - k;
    let (mut low, mut high) = gershgorin_bounds(diagonal, off_diagonal);
    for _ in 0..200 {
        let mid = 0.5 * (low + high);
        if mid <= low || mid >= high {
            break;
        }
        if sturm_count(diagonal, off_diagonal, mid) > target {
            high = mid;
        } else {
            low = mid;
        }
    }
    0.5 * (low + high)
}
fn gershgorin_bounds(diagonal: &[f64], off_diagonal: &[f64]) -> (f64, f64) {
    let size = diagonal.len();
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;
    for n in 0..size {
        let left = if n > 0 { off_diagonal[n].abs() } else { 0.0 };
        let right = if n + 1 < size {
            off_diagonal[n + 1].abs()
        } else {
            0.0
        };
        low = low.min(diagonal[n] - left - right);
        high = high.max(diagonal[n] + left + right);
    }
    let pad = 1e-9 * (1.0 + high.abs().max(low.abs()));
    (low - pad, high + pad)
}
/// Eigenvector for `eigenvalue`, kept orthogonal to `previous`.
fn inverse_iteration(
    diagonal: &[f64],
    off_diagonal: &[f64],
    eigenvalue: f64,
    previous: &[Vec<f64>],
) -> Vec<f64> {
    let size = diagonal.len();
    if size == 1 {
        return vec![1.0];
    }
    let scale = diagonal
        .iter()
        .chain(off_diagonal.iter())
        .fold(1.0f64, |acc, v| acc.max(v.abs()));
    let shift = eigenvalue + scale * 1e-12;
    let factors = TridiagonalLu::factor(diagonal, off_diagonal, shift, scale);
    let mut vector: Vec<f64> = (0..size)
        .map(|n| 1.0 + 0.01 * ((n * 7919) % 101) as f64)
        .collect();
    for _ in 0..4 {
        vector = factors.solve(&vector);
        for basis in previous {
            let projection: f64 = vector.iter().zip(basis).map(|(a, b)| a * b).sum();
            for (value, b) in vector.iter_mut().zip(basis) {
                *value -= projection * b;
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            break;
        }
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}
/// LU factors of `T - shift * I` with partial pivoting.
struct TridiagonalLu {
    upper0: Vec<f64>,
    upper1: Vec<f64>,
    upper2: Vec<f64>,
    lower: Vec<f64>,
    swapped: Vec<bool>,
}
impl TridiagonalLu {
    fn factor(diagonal: &[f64], off_diagonal: &[f64], shift: f64, scale: f64) -> Self {
        let size = diagonal.len();
        let tiny = f64::EPSILON * scale;
        let mut upper0: Vec<f64> = diagonal.iter().map(|d| d - shift).collect();
        let mut upper1: Vec<f64> = (0..size)
            .map(|n| if n + 1 < size { off_diagonal[n + 1] } else { 0.0 })
            .collect();
        let mut upper2 = vec![0.0; size];
        let mut lower = vec![0.0; size];
        let mut swapped = vec![false; size];
        // sub[n] is the entry below the diagonal in column n
        let mut sub: Vec<f64> = (0..size)
            .map(|n| if n + 1 < size { off_diagonal[n + 1] } else { 0.0 })
            .collect();
        for n in 0..size.saturating_sub(1) {
            if sub[n].abs() > upper0[n].abs() {
                swapped[n] = true;
                // swap rows n and n + 1
                let next_diag = diagonal[n + 1] - shift;
                let next_super = if n + 2 < size { off_diagonal[n + 2] } else { 0.0 };
                let (row_a0, row_a1, row_a2) = (upper0[n], upper1[n], 0.0);
                upper0[n] = sub[n];
                upper1[n] = next_diag;
                upper2[n] = next_super;
                let factor = row_a0 / upper0[n];
                lower[n] = factor;
                upper0[n + 1] = row_a1 - factor * upper1[n];
                upper1[n + 1] = row_a2 - factor * upper2[n];
            } else {
                if upper0[n] == 0.0 {
                    upper0[n] = tiny;
                }
                let factor = sub[n] / upper0[n];
                lower[n] = factor;
                upper0[n + 1] = (diagonal[n + 1] - shift) - factor * upper1[n];
            }
            sub[n] = 0.0;
        }
        if upper0[size - 1] == 0.0 {
            upper0[size - 1] = tiny;
        }
        Self {
            upper0,
            upper1,
            upper2,
            lower,
            swapped,
        }
    }
    fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let size = rhs.len();
        let mut y = rhs.to_vec();
        for n in 0..size.saturating_sub(1) {
            if self.swapped[n] {
                y.swap(n, n + 1);
            }
            y[n + 1] -= self.lower[n] * y[n];
        }
        let mut x = vec![0.0; size];
        for n in (0..size).rev() {
            let mut value = y[n];
            if n + 1 < size {
                value -= self.upper1[n] * x[n + 1];
            }
            if n + 2 < size {
                value -= self.upper2[n] * x[n + 2];
            }
            x[n] = value / self.upper0[n];
        }
        x
    }
}
fn fix_sign(taper: &mut [f64], order: usize) {
    let flip = if order % 2 == 0 {
        taper.iter().sum::<f64>() < 0.0
    } else {
        let threshold = (1.0 / taper.len() as f64).max(1e-7);
        taper
            .iter()
            .find(|v| *v * *v > threshold)
            .map(|v| *v < 0.0)
            .unwrap_or(false)
    };
    if flip {
        taper.iter_mut().for_each(|v| *v = -*v);
    }
}
/// Fraction of the taper's energy inside `[-bandwidth, bandwidth]`.
fn concentration(taper: &[f64], bandwidth: f64) -> f64 {
    let size = taper.len();
    (0..size)
        .map(|lag| {
            let autocorrelation: f64 = (0..size - lag).map(|m| taper[m] * taper[m + lag]).sum();
            let kernel = if lag == 0 {
                2.0 * bandwidth
            } else {
                2.0 * (2.0 * PI * bandwidth * lag as f64).sin() / (PI * lag as f64)
            };
            autocorrelation * kernel
        })
        .sum()
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parses_window_names() {
        assert_eq!("hanning".parse::<WindowType>().unwrap(), WindowType::Hanning);
        assert_eq!("Ones".parse::<WindowType>().unwrap(), WindowType::Rectangular);
        assert_eq!(
            "dpss:2.5".parse::<WindowType>().unwrap(),
            WindowType::Dpss { half_bandwidth: 2.5 }
        );
        assert!(matches!(
            "kaiser".parse::<WindowType>(),
            Err(ConfigurationError::UnknownWindowType(_))
        ));
        assert!(matches!(
            "dpss:-1".parse::<WindowType>(),
            Err(ConfigurationError::InvalidHalfBandwidth(_))
        ));
    }
    #[test]
    fn zero_length_is_rejected() {
        assert_eq!(
            generate_tapers(0, WindowType::Hanning),
            Err(ConfigurationError::InvalidSignalLength)
        );
    }
    #[test]
    fn hanning_has_unit_norm_and_zero_edges() {
        let set = generate_tapers(64, WindowType::Hanning).unwrap();
        assert_eq!(set.count(), 1);
        assert_eq!(set.signal_length(), 64);
        let row = set.tapers().row(0);
        assert!((row.dot(&row) - 1.0).abs() < 1e-12);
        assert!(row[0].abs() < 1e-12);
        assert!(row[63].abs() < 1e-12);
        assert_eq!(set.weights()[0], 1.0);
        assert!((set.csd_denominator() - 0.5).abs() < 1e-12);
    }
    #[test]
    fn single_sample_hanning_is_one() {
        let set = generate_tapers(1, WindowType::Hanning).unwrap();
        assert_eq!(set.tapers()[[0, 0]], 1.0);
    }
    #[test]
    fn rectangular_is_flat() {
        let set = generate_tapers(4, WindowType::Rectangular).unwrap();
        for value in set.tapers().iter() {
            assert!((value - 0.5).abs() < 1e-12);
        }
    }
    #[test]
    fn dpss_tapers_are_orthonormal_and_concentrated() {
        let set = generate_tapers(128, WindowType::Dpss { half_bandwidth: 3.0 }).unwrap();
        assert!(set.count() >= 3 && set.count() <= 5);
        let tapers = set.tapers();
        for a in 0..set.count() {
            for b in 0..set.count() {
                let dot = tapers.row(a).dot(&tapers.row(b));
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-6, "dot({a},{b}) = {dot}");
            }
            assert!(set.weights()[a] > LOW_BIAS_CONCENTRATION.sqrt());
        }
        // first taper is symmetric and positive
        let first = tapers.row(0);
        assert!(first.sum() > 0.0);
        assert!((first[10] - first[117]).abs() < 1e-6);
    }
    #[test]
    fn shared_sets_are_reused() {
        let a = TaperSet::shared(32, WindowType::Hanning).unwrap();
        let b = TaperSet::shared(32, WindowType::Hanning).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.window(), WindowType::Hanning);
    }
    #[test]
    fn shared_cache_stays_bounded() {
        let held = TaperSet::shared(3, WindowType::Rectangular).unwrap();
        for len in 1000..1000 + TAPER_CACHE_CAPACITY + 5 {
            TaperSet::shared(len, WindowType::Rectangular).unwrap();
            assert!(taper_cache().len() <= TAPER_CACHE_CAPACITY);
        }
        // evicted sets stay usable by whoever holds them
        assert_eq!(held.signal_length(), 3);
        assert_eq!(held.window(), WindowType::Rectangular);
    }
}
