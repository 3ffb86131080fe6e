//! Topology construction with arena-allocated graph storage.
//!
//! A [`Topology`] is the fixed-shape layered graph the simulator runs over:
//! an ordered list of layers, a unit arena, and a sparse random edge set with
//! fixed out-degree per unit. Structure is immutable once built (the arenas
//! are only appended to during construction), so a topology can be shared by
//! any number of simulators without locking.

use rand::Rng;
use slotmap::SlotMap;
use tracing::debug;

use crate::unit::{Edge, EdgeId, Unit, UnitId};

/// Layer sizes of the default six-layer demo diagram.
pub const DEFAULT_LAYER_SIZES: [usize; 6] = [16, 64, 128, 128, 64, 16];

/// Default out-degree for units in non-terminal layers. Each such unit gets
/// `min(DEFAULT_FAN_OUT, next_layer_size)` out-edges.
pub const DEFAULT_FAN_OUT: usize = 8;

/// Error type for topology construction failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Fewer than two layers were requested; a forward pass needs at least an
    /// input and an output layer.
    TooFewLayers {
        /// The number of layers requested.
        found: usize,
    },
    /// A layer was requested with zero units.
    EmptyLayer {
        /// Index of the offending layer.
        index: usize,
    },
}

impl std::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyError::TooFewLayers { found } => {
                write!(f, "topology needs at least 2 layers, got {}", found)
            }
            TopologyError::EmptyLayer { index } => {
                write!(f, "layer {} has zero units", index)
            }
        }
    }
}

impl std::error::Error for TopologyError {}

/// The layered graph: unit arena, edge arena, and per-layer unit ids.
///
/// Units and edges are stored in flat `SlotMap` buffers; `layers` holds the
/// unit ids of each layer in index order, which is the canonical ordering
/// used for feature injection, ranking ties, and snapshot layout.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Arena storage for units.
    pub units: SlotMap<UnitId, Unit>,
    /// Arena storage for edges.
    pub edges: SlotMap<EdgeId, Edge>,
    /// Unit ids per layer, each inner vec in unit-index order.
    pub layers: Vec<Vec<UnitId>>,
}

impl Topology {
    /// Create a topology with units but no edges.
    ///
    /// Useful for hand-wired fixtures; production topologies come from
    /// [`sparse_random`](Self::sparse_random).
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] if fewer than two layers are given or any
    /// layer is empty.
    pub fn disconnected(layer_sizes: &[usize]) -> Result<Self, TopologyError> {
        if layer_sizes.len() < 2 {
            return Err(TopologyError::TooFewLayers {
                found: layer_sizes.len(),
            });
        }
        if let Some(index) = layer_sizes.iter().position(|&s| s == 0) {
            return Err(TopologyError::EmptyLayer { index });
        }

        let mut units: SlotMap<UnitId, Unit> = SlotMap::with_key();
        let mut layers = Vec::with_capacity(layer_sizes.len());

        for (layer, &size) in layer_sizes.iter().enumerate() {
            let mut ids = Vec::with_capacity(size);
            for index in 0..size {
                ids.push(units.insert(Unit::new(layer, index)));
            }
            layers.push(ids);
        }

        Ok(Self {
            units,
            edges: SlotMap::with_key(),
            layers,
        })
    }

    /// Build a sparsely connected topology.
    ///
    /// Every unit in a non-terminal layer receives out-edges to
    /// `min(fan_out, next_layer_size)` distinct units of the next layer,
    /// chosen uniformly at random without replacement. Weights are drawn
    /// uniformly from `[-1, 1]`. Pass a seeded rng for a reproducible graph;
    /// the reference behavior uses an unseeded one.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] if fewer than two layers are given or any
    /// layer is empty.
    pub fn sparse_random<R: Rng>(
        layer_sizes: &[usize],
        fan_out: usize,
        rng: &mut R,
    ) -> Result<Self, TopologyError> {
        let mut topology = Self::disconnected(layer_sizes)?;

        for layer in 0..topology.layers.len() - 1 {
            let next_size = topology.layers[layer + 1].len();
            let out_degree = fan_out.min(next_size);

            for u in 0..topology.layers[layer].len() {
                let from = topology.layers[layer][u];
                let targets = rand::seq::index::sample(rng, next_size, out_degree);
                for t in targets.iter() {
                    let to = topology.layers[layer + 1][t];
                    let weight = rng.random::<f32>() * 2.0 - 1.0;
                    topology.edges.insert(Edge::new(from, to, weight));
                }
            }
        }

        debug!(
            layers = topology.layers.len(),
            units = topology.units.len(),
            edges = topology.edges.len(),
            "built sparse topology"
        );
        Ok(topology)
    }

    /// Build the default six-layer demo topology.
    ///
    /// # Panics
    ///
    /// Never in practice: [`DEFAULT_LAYER_SIZES`] is a valid shape.
    #[must_use]
    pub fn demo<R: Rng>(rng: &mut R) -> Self {
        Self::sparse_random(&DEFAULT_LAYER_SIZES, DEFAULT_FAN_OUT, rng)
            .expect("default layer sizes are valid")
    }

    /// Add a single edge between existing units.
    ///
    /// Returns `None` if either unit is missing, the edge would not connect
    /// adjacent layers in the forward direction, or the pair is already
    /// connected. Intended for hand-built test fixtures.
    pub fn add_edge(&mut self, from: UnitId, to: UnitId, weight: f32) -> Option<EdgeId> {
        let from_unit = self.units.get(from)?;
        let to_unit = self.units.get(to)?;

        if from_unit.layer + 1 != to_unit.layer {
            return None;
        }

        for (_, edge) in &self.edges {
            if edge.from == from && edge.to == to {
                return None;
            }
        }

        Some(self.edges.insert(Edge::new(from, to, weight)))
    }

    /// Number of layers.
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Sizes of each layer, in order.
    #[must_use]
    pub fn layer_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(Vec::len).collect()
    }

    /// Total number of units across all layers.
    #[must_use]
    pub fn total_units(&self) -> usize {
        self.units.len()
    }

    /// Number of out-edges leaving a unit.
    #[must_use]
    pub fn out_degree(&self, id: UnitId) -> usize {
        self.edges.iter().filter(|(_, e)| e.from == id).count()
    }

    /// Derived 2-D layout position for a unit, normalized to `[0, 1]` on both
    /// axes: layers left to right, units top to bottom within a layer.
    ///
    /// A convenience for renderers; the simulation itself never consumes it.
    #[must_use]
    pub fn unit_position(&self, layer: usize, index: usize) -> [f32; 2] {
        let n = self.layers.len();
        let x = if n > 1 {
            layer as f32 / (n - 1) as f32
        } else {
            0.5
        };
        let size = self.layers.get(layer).map_or(1, Vec::len);
        let y = (index as f32 + 0.5) / size as f32;
        [x, y]
    }
}
