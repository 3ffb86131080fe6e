//! Structural records for the layered graph.
//!
//! This module defines the fundamental building blocks of the diagram:
//! - [`Unit`]: a node, identified by its layer and position within the layer
//! - [`Edge`]: a weighted connection between units in adjacent layers
//!
//! Activation state is deliberately not stored here; the structural records
//! are immutable after build, while per-run state lives in the simulator's
//! working buffers.

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a unit within a topology.
    ///
    /// Uses SlotMap's generational indices for safe, cache-friendly storage.
    pub struct UnitId;

    /// Unique identifier for an edge within a topology.
    pub struct EdgeId;
}

/// A unit (node) in the layered graph.
///
/// Units are stored in a `SlotMap` arena and identified to the outside world
/// by their `(layer, index)` coordinates, which are stable for the lifetime
/// of the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Unit {
    /// Index of the layer this unit belongs to (0 = input layer).
    pub layer: usize,
    /// Position of this unit within its layer.
    pub index: usize,
}

impl Unit {
    /// Create a unit at the given layer coordinates.
    #[must_use]
    pub fn new(layer: usize, index: usize) -> Self {
        Self { layer, index }
    }
}

/// A directed, weighted connection between units in adjacent layers.
///
/// The weight is assigned at build time and never mutated. Whether the edge
/// carried signal during a run is per-run state owned by the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// The source unit of this edge.
    pub from: UnitId,
    /// The target unit of this edge. Must sit one layer after `from`.
    pub to: UnitId,
    /// The edge weight, in `[-1, 1]` for built topologies.
    pub weight: f32,
}

impl Edge {
    /// Create a new edge.
    #[must_use]
    pub fn new(from: UnitId, to: UnitId, weight: f32) -> Self {
        Self { from, to, weight }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_unit_creation() {
        let unit = Unit::new(2, 17);
        assert_eq!(unit.layer, 2);
        assert_eq!(unit.index, 17);
    }

    #[test]
    fn test_edge_creation() {
        let mut units: SlotMap<UnitId, Unit> = SlotMap::with_key();
        let a = units.insert(Unit::new(0, 0));
        let b = units.insert(Unit::new(1, 0));

        let edge = Edge::new(a, b, -0.25);
        assert_eq!(edge.from, a);
        assert_eq!(edge.to, b);
        assert!((edge.weight - -0.25).abs() < 1e-6);
    }

    #[test]
    fn test_arena_keys_are_distinct() {
        let mut units: SlotMap<UnitId, Unit> = SlotMap::with_key();
        let a = units.insert(Unit::new(0, 0));
        let b = units.insert(Unit::new(0, 1));
        assert_ne!(a, b);
        assert_eq!(units[a].index, 0);
        assert_eq!(units[b].index, 1);
    }
}
