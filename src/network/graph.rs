use ndarray::Array2;
use serde::Serialize;
use thiserror::Error;
use crate::network::edge::NetworkEdge;
use crate::network::node::NetworkNode;
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    #[error("edge ({start}, {end}) references a node outside 0..{nodes}")]
    UnknownNode {
        start: usize,
        end: usize,
        nodes: usize,
    },
    #[error("invalid frequency range {from_hz}..{to_hz} Hz")]
    InvalidFrequencyRange { from_hz: f64, to_hz: f64 },
    #[error("sampling frequency and FFT size must be set before selecting a frequency range")]
    MissingSpectrumInfo,
}
/// Named connectivity graph: one node per channel, one edge per channel pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Network {
    name: String,
    nodes: Vec<NetworkNode>,
    edges: Vec<NetworkEdge>,
    threshold: f64,
    frequency_bins: Option<(usize, usize)>,
    sampling_frequency_hz: f64,
    fft_size: usize,
}
impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            threshold: f64::NEG_INFINITY,
            frequency_bins: None,
            sampling_frequency_hz: 0.0,
            fft_size: 0,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn nodes(&self) -> &[NetworkNode] {
        &self.nodes
    }
    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }
    pub fn node(&self, id: usize) -> Option<&NetworkNode> {
        self.nodes.get(id)
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
    pub fn append_node(&mut self, position: [f32; 3]) -> usize {
        let id = self.nodes.len();
        self.nodes.push(NetworkNode::new(id, position));
        id
    }
    /// Adds an edge and registers it on both endpoint nodes.
    pub fn append_edge(&mut self, mut edge: NetworkEdge) -> Result<usize, NetworkError> {
        let (start, end) = (edge.start_node(), edge.end_node());
        if start >= self.nodes.len() || end >= self.nodes.len() {
            return Err(NetworkError::UnknownNode {
                start,
                end,
                nodes: self.nodes.len(),
            });
        }
        edge.set_frequency_bins(self.frequency_bins);
        edge.set_active(edge.weight() >= self.threshold);
        let index = self.edges.len();
        self.nodes[start].attach(index, &edge);
        if end != start {
            self.nodes[end].attach(index, &edge);
        }
        self.edges.push(edge);
        Ok(index)
    }
    /// Records the spectral axis so frequency ranges can be given in Hz.
    pub fn set_spectrum_info(&mut self, sampling_frequency_hz: f64, fft_size: usize) {
        self.sampling_frequency_hz = sampling_frequency_hz;
        self.fft_size = fft_size;
    }
    pub fn sampling_frequency_hz(&self) -> f64 {
        self.sampling_frequency_hz
    }
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
    /// Edges whose averaged weight reaches `threshold` become active.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.refresh_active();
    }
    pub fn frequency_bins(&self) -> Option<(usize, usize)> {
        self.frequency_bins
    }
    /// Restricts edge weights to the inclusive bin range; `None` uses all bins.
    pub fn set_frequency_bins(&mut self, bins: Option<(usize, usize)>) {
        self.frequency_bins = bins;
        for edge in &mut self.edges {
            edge.set_frequency_bins(bins);
        }
        self.refresh_active();
    }
    /// Hz variant of [`Network::set_frequency_bins`].
    pub fn set_frequency_range(&mut self, from_hz: f64, to_hz: f64) -> Result<(), NetworkError> {
        if self.sampling_frequency_hz <= 0.0 || self.fft_size == 0 {
            return Err(NetworkError::MissingSpectrumInfo);
        }
        if !(from_hz.is_finite() && to_hz.is_finite()) || from_hz < 0.0 || from_hz > to_hz {
            return Err(NetworkError::InvalidFrequencyRange { from_hz, to_hz });
        }
        let hz_per_bin = self.sampling_frequency_hz / self.fft_size as f64;
        let lo = (from_hz / hz_per_bin).round() as usize;
        let hi = (to_hz / hz_per_bin).round() as usize;
        self.set_frequency_bins(Some((lo, hi)));
        Ok(())
    }
    fn refresh_active(&mut self) {
        let threshold = self.threshold;
        for edge in &mut self.edges {
            let active = edge.weight() >= threshold;
            edge.set_active(active);
        }
    }
    pub fn full_connectivity_matrix(&self, mirrored: bool) -> Array2<f64> {
        self.matrix(mirrored, |_| true)
    }
    pub fn thresholded_connectivity_matrix(&self, mirrored: bool) -> Array2<f64> {
        self.matrix(mirrored, NetworkEdge::is_active)
    }
    fn matrix(&self, mirrored: bool, keep: impl Fn(&NetworkEdge) -> bool) -> Array2<f64> {
        let n = self.nodes.len();
        let mut matrix = Array2::zeros((n, n));
        for edge in self.edges.iter().filter(|edge| keep(*edge)) {
            let weight = edge.weight();
            matrix[[edge.start_node(), edge.end_node()]] = weight;
            if mirrored {
                matrix[[edge.end_node(), edge.start_node()]] = weight;
            }
        }
        matrix
    }
    pub fn min_max_full_weights(&self) -> (f64, f64) {
        min_max(self.edges.iter().map(NetworkEdge::weight))
    }
    pub fn min_max_thresholded_weights(&self) -> (f64, f64) {
        min_max(
            self.edges
                .iter()
                .filter(|edge| edge.is_active())
                .map(NetworkEdge::weight),
        )
    }
    /// Scales every weight vector by the largest absolute edge weight.
    pub fn normalize(&mut self) {
        let peak = self
            .edges
            .iter()
            .map(|edge| edge.weight().abs())
            .fold(0.0f64, f64::max);
        if peak == 0.0 || !peak.is_finite() {
            return;
        }
        for edge in &mut self.edges {
            edge.scale(1.0 / peak);
        }
        self.refresh_active();
    }
    /// Full degree of every node, in node order.
    pub fn distribution(&self) -> Vec<usize> {
        self.nodes.iter().map(NetworkNode::full_degree).collect()
    }
    pub fn thresholded_distribution(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .map(|node| node.thresholded_degree(&self.edges))
            .collect()
    }
    pub fn full_strength(&self, id: usize) -> Option<f64> {
        self.node(id).map(|node| node.full_strength(&self.edges))
    }
    pub fn thresholded_strength(&self, id: usize) -> Option<f64> {
        self.node(id).map(|node| node.thresholded_strength(&self.edges))
    }
}
fn min_max(weights: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = weights.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), w| {
        (lo.min(w), hi.max(w))
    });
    if lo > hi {
        (0.0, 0.0)
    } else {
        (lo, hi)
    }
}
