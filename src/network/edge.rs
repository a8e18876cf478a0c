use ndarray::{s, Array1};
use serde::Serialize;
/// Undirected connection between two channels with one weight per
/// frequency bin.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkEdge {
    start: usize,
    end: usize,
    weights: Array1<f64>,
    active: bool,
    /// Inclusive bin range averaged by [`NetworkEdge::weight`].
    bins: Option<(usize, usize)>,
}
impl NetworkEdge {
    pub fn new(start: usize, end: usize, weights: Array1<f64>) -> Self {
        Self {
            start,
            end,
            weights,
            active: true,
            bins: None,
        }
    }
    pub fn start_node(&self) -> usize {
        self.start
    }
    pub fn end_node(&self) -> usize {
        self.end
    }
    pub fn is_self_loop(&self) -> bool {
        self.start == self.end
    }
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }
    pub fn num_freqs(&self) -> usize {
        self.weights.len()
    }
    /// Mean weight over the selected bins (all bins when none are selected).
    pub fn weight(&self) -> f64 {
        let len = self.weights.len();
        if len == 0 {
            return 0.0;
        }
        let (lo, hi) = self.bins.unwrap_or((0, len - 1));
        let hi = hi.min(len - 1);
        if lo > hi {
            return 0.0;
        }
        self.weights.slice(s![lo..=hi]).mean().unwrap_or(0.0)
    }
    pub fn frequency_bins(&self) -> Option<(usize, usize)> {
        self.bins
    }
    pub(crate) fn set_frequency_bins(&mut self, bins: Option<(usize, usize)>) {
        self.bins = bins;
    }
    pub fn is_active(&self) -> bool {
        self.active
    }
    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
    pub(crate) fn scale(&mut self, factor: f64) {
        self.weights.mapv_inplace(|w| w * factor);
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    #[test]
    fn weight_averages_selected_bins() {
        let mut edge = NetworkEdge::new(0, 1, array![1.0, 2.0, 3.0, 6.0]);
        assert_eq!(edge.weight(), 3.0);
        edge.set_frequency_bins(Some((1, 2)));
        assert_eq!(edge.weight(), 2.5);
        edge.set_frequency_bins(Some((2, 99)));
        assert_eq!(edge.weight(), 4.5);
        edge.set_frequency_bins(Some((5, 6)));
        assert_eq!(edge.weight(), 0.0);
    }
    #[test]
    fn empty_weights_have_zero_weight() {
        let edge = NetworkEdge::new(2, 2, Array1::zeros(0));
        assert!(edge.is_self_loop());
        assert_eq!(edge.weight(), 0.0);
    }
}
