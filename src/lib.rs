//! # Sparse Cascade
//!
//! A forward-pass simulation engine for animated diagrams of sparse,
//! input-dependent activation in a toy feed-forward network.
//!
//! ## Features
//!
//! - **Arena-Graph Topology**: cache-friendly `SlotMap` storage for units and
//!   edges; sparse random wiring with a fixed out-degree per unit
//! - **Two-Policy Gating**: a stochastic per-unit gate at the input layer,
//!   a deterministic top-k gate (with an absolute activation floor) at every
//!   hidden and output layer
//! - **Snapshot Stream**: one immutable [`Snapshot`] per layer, carrying the
//!   full unit and edge state a renderer needs to redraw, serde-serializable
//!   across any boundary
//! - **Animation Pacing**: configurable real-time delays between snapshot
//!   emissions; collapse them with [`Pacing::none`] for headless use
//! - **Injected Randomness**: every constructor and run takes `rng: &mut R`,
//!   so tests pin outcomes while the demo stays unseeded
//!
//! ## Quick Start
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use sparse_cascade::{Pacing, Simulator, Topology};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! // A small three-layer diagram, four out-edges per unit.
//! let topology = Topology::sparse_random(&[8, 16, 8], 4, &mut rng).unwrap();
//! let simulator = Simulator::new(&topology).with_pacing(Pacing::none());
//!
//! let record = simulator.run_collect("hello", 0.85, &mut rng).unwrap();
//! assert_eq!(record.snapshots.len(), 3);
//! println!(
//!     "{} of {} units fired ({}% sparse)",
//!     record.stats.active_count, record.stats.total_count, record.stats.sparsity_percent
//! );
//! ```
//!
//! ## Architecture
//!
//! Data flows one way: [`Topology`] (built once, immutable, shareable) →
//! [`Simulator`] (compiled CSR view plus one working copy of unit/edge
//! state) → ordered [`Snapshot`]s → the caller's renderer. Nothing feeds
//! back from rendering into the simulation.
//!
//! A run steps layer by layer. The input layer injects the prompt's
//! lowercased code points as features and gates each unit with an
//! independent Bernoulli draw (activation probability `1 - sparsity`).
//! Every later layer sums the weighted activations of its active
//! predecessors, rectifies, and then keeps only the top
//! `ceil(size * (1 - sparsity))` units above the activation floor. The two
//! policies are intentionally different: noisy sensory gating at the input,
//! competitive selection everywhere else.
//!
//! One run at a time per [`Simulator`]: calls made while a run is in flight
//! are dropped ("last call loses"), modeled as a [`RunOutcome::Ignored`]
//! value rather than an error.

pub mod gate;
pub mod input;
pub mod simulator;
pub mod snapshot;
pub mod topology;
pub mod unit;

// Re-exports for convenience
pub use simulator::{
    IgnoreReason, Pacing, RunOutcome, Simulator, ACTIVATION_FLOOR, BOOST_GAIN, DEFAULT_SPARSITY,
    FEATURE_SCALE,
};
pub use snapshot::{EdgeState, RunRecord, RunStats, Snapshot, UnitRef, UnitState};
pub use topology::{Topology, TopologyError, DEFAULT_FAN_OUT, DEFAULT_LAYER_SIZES};
pub use unit::{Edge, EdgeId, Unit, UnitId};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_default_demo_run() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let topology = Topology::demo(&mut rng);
        let simulator = Simulator::new(&topology).with_pacing(Pacing::none());

        let record = simulator
            .run_collect("the quick brown fox", DEFAULT_SPARSITY, &mut rng)
            .unwrap();

        assert_eq!(record.snapshots.len(), DEFAULT_LAYER_SIZES.len());
        for (step, snapshot) in record.snapshots.iter().enumerate() {
            assert_eq!(snapshot.step, step);
            assert_eq!(snapshot.units.len(), topology.total_units());
            assert_eq!(snapshot.edges.len(), topology.edges.len());
        }
        assert_eq!(record.stats.total_count, topology.total_units());
    }

    #[test]
    fn test_topology_is_shareable_across_simulators() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let topology = Topology::sparse_random(&[4, 8, 4], 4, &mut rng).unwrap();

        let a = Simulator::new(&topology).with_pacing(Pacing::none());
        let b = Simulator::new(&topology).with_pacing(Pacing::none());

        let mut rng_a = ChaCha8Rng::seed_from_u64(9);
        let mut rng_b = ChaCha8Rng::seed_from_u64(9);
        let record_a = a.run_collect("shared", 0.5, &mut rng_a).unwrap();
        let record_b = b.run_collect("shared", 0.5, &mut rng_b).unwrap();

        // Same structure, same seed: identical trajectories.
        assert_eq!(record_a.snapshots, record_b.snapshots);
    }
}
