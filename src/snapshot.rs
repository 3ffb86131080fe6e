//! Per-step state snapshots, the outbound contract to renderers.
//!
//! A [`Snapshot`] is an immutable copy of the full unit and edge state after
//! one layer's processing. Everything a renderer needs to redraw the diagram
//! is here; nothing requires consulting the simulator's internals. All types
//! serialize with serde so the boundary can be a JSON message, a channel, or
//! a plain in-process callback.

use serde::{Deserialize, Serialize};

/// Stable coordinates of a unit: layer index plus position within the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    /// Layer index, 0 = input layer.
    pub layer: usize,
    /// Position within the layer.
    pub index: usize,
}

/// One unit's state at the time of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    /// Which unit this is.
    pub unit: UnitRef,
    /// Whether the unit fired at its layer's step.
    pub active: bool,
    /// The unit's activation. Clamped to `[0, 1]` for active units; inactive
    /// units keep their raw value, which may exceed 1.
    pub activation: f32,
}

/// One edge's state at the time of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeState {
    /// Source unit coordinates.
    pub from: UnitRef,
    /// Target unit coordinates (always one layer after `from`).
    pub to: UnitRef,
    /// The fixed edge weight.
    pub weight: f32,
    /// True iff the source unit was active when the target layer stepped.
    pub active: bool,
}

/// The full diagram state after one layer's processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The layer step this snapshot was emitted after (0-based).
    pub step: usize,
    /// State of every unit in the topology.
    pub units: Vec<UnitState>,
    /// State of every edge in the topology.
    pub edges: Vec<EdgeState>,
}

impl Snapshot {
    /// Look up a unit's state by coordinates.
    #[must_use]
    pub fn unit(&self, layer: usize, index: usize) -> Option<&UnitState> {
        self.units
            .iter()
            .find(|u| u.unit.layer == layer && u.unit.index == index)
    }

    /// Count active units in one layer.
    #[must_use]
    pub fn active_in_layer(&self, layer: usize) -> usize {
        self.units
            .iter()
            .filter(|u| u.unit.layer == layer && u.active)
            .count()
    }

    /// Count active units across the whole diagram.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.units.iter().filter(|u| u.active).count()
    }
}

/// Summary counters computed over the final snapshot of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Units active in the final snapshot.
    pub active_count: usize,
    /// Total units across all layers.
    pub total_count: usize,
    /// `round(100 * (1 - active / total))`.
    pub sparsity_percent: u8,
}

/// A materialized run: every snapshot in layer order, plus the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Snapshots in step order, one per layer.
    pub snapshots: Vec<Snapshot>,
    /// Summary counters over the final snapshot.
    pub stats: RunStats,
}
