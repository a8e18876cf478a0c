// src/network/mod.rs
pub mod edge;
pub mod graph;
pub mod node;
pub use edge::NetworkEdge;
pub use graph::{Network, NetworkError};
pub use node::NetworkNode;
