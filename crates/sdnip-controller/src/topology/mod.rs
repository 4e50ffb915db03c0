//! Live fabric topology.

mod graph;

pub use graph::{LinkPorts, Path, TopologyGraph};
