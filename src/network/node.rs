use serde::Serialize;
use crate::network::edge::NetworkEdge;
/// One channel of the network.
///
/// Incident edges are kept as indices into the owning network's edge list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkNode {
    id: usize,
    position: [f32; 3],
    edges_in: Vec<usize>,
    edges_out: Vec<usize>,
}
impl NetworkNode {
    pub fn new(id: usize, position: [f32; 3]) -> Self {
        Self {
            id,
            position,
            edges_in: Vec::new(),
            edges_out: Vec::new(),
        }
    }
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn position(&self) -> [f32; 3] {
        self.position
    }
    pub fn edges_in(&self) -> &[usize] {
        &self.edges_in
    }
    pub fn edges_out(&self) -> &[usize] {
        &self.edges_out
    }
    pub(crate) fn attach(&mut self, edge_index: usize, edge: &NetworkEdge) {
        if edge.start_node() == self.id {
            self.edges_out.push(edge_index);
        }
        if edge.end_node() == self.id {
            self.edges_in.push(edge_index);
        }
    }
    pub fn indegree(&self) -> usize {
        self.edges_in.len()
    }
    pub fn outdegree(&self) -> usize {
        self.edges_out.len()
    }
    /// In plus out; a self-loop counts twice.
    pub fn full_degree(&self) -> usize {
        self.indegree() + self.outdegree()
    }
    pub fn thresholded_degree(&self, edges: &[NetworkEdge]) -> usize {
        self.incident(edges).filter(|edge| edge.is_active()).count()
    }
    pub fn full_strength(&self, edges: &[NetworkEdge]) -> f64 {
        self.incident(edges).map(NetworkEdge::weight).sum()
    }
    pub fn thresholded_strength(&self, edges: &[NetworkEdge]) -> f64 {
        self.incident(edges)
            .filter(|edge| edge.is_active())
            .map(NetworkEdge::weight)
            .sum()
    }
    fn incident<'a>(&'a self, edges: &'a [NetworkEdge]) -> impl Iterator<Item = &'a NetworkEdge> {
        self.edges_in
            .iter()
            .chain(self.edges_out.iter())
            .filter_map(move |&idx| edges.get(idx))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    #[test]
    fn attach_sorts_by_direction() {
        let edges = vec![
            NetworkEdge::new(0, 1, array![2.0]),
            NetworkEdge::new(1, 1, array![1.0]),
        ];
        let mut node = NetworkNode::new(1, [0.0; 3]);
        node.attach(0, &edges[0]);
        node.attach(1, &edges[1]);
        assert_eq!(node.edges_in(), &[0, 1]);
        assert_eq!(node.edges_out(), &[1]);
        assert_eq!(node.full_degree(), 3);
        assert_eq!(node.full_strength(&edges), 4.0);
    }
}
