//! Forward-pass simulator.
//!
//! This module provides the [`Simulator`], which executes runs over a built
//! [`Topology`]: a stochastic feature gate at the input layer, weighted
//! propagation with a rectified-linear transform plus a top-k sparsity gate
//! at every later layer, and one [`Snapshot`] emission per layer so a
//! renderer can animate intermediate states.
//!
//! The simulator pre-compiles the topology into Compressed Sparse Row (CSR)
//! incoming-edge arrays for cache-efficient stepping; the topology itself is
//! never touched after compilation and can be shared freely.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::gate::top_k_mask;
use crate::input;
use crate::snapshot::{EdgeState, RunRecord, RunStats, Snapshot, UnitRef, UnitState};
use crate::topology::Topology;

/// Absolute activation floor for the top-k gate: a top-ranked unit still
/// stays inactive unless its activation strictly exceeds this.
pub const ACTIVATION_FLOOR: f32 = 0.1;

/// Divisor mapping a character code point to an input-layer feature value.
pub const FEATURE_SCALE: f32 = 128.0;

/// Maximum fractional boost applied to an input unit that fires.
pub const BOOST_GAIN: f32 = 0.5;

/// Default sparsity level when the caller has no opinion.
pub const DEFAULT_SPARSITY: f32 = 0.85;

/// Real-time delays between snapshot emissions.
///
/// The delays are an animation contract, not backpressure: they give the
/// consumer time to render each intermediate state. Headless callers use
/// [`Pacing::none`]; the functional results are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    /// Delay before the input-layer snapshot.
    pub initial: Duration,
    /// Delay before every subsequent snapshot.
    pub step: Duration,
}

impl Pacing {
    /// The reference animation timing: 200 ms before step 0, 300 ms between
    /// subsequent steps.
    #[must_use]
    pub const fn animated() -> Self {
        Self {
            initial: Duration::from_millis(200),
            step: Duration::from_millis(300),
        }
    }

    /// No delays; for tests, benchmarks, and batch use.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            initial: Duration::ZERO,
            step: Duration::ZERO,
        }
    }

    fn delay_before(self, step: usize) -> Duration {
        if step == 0 {
            self.initial
        } else {
            self.step
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::animated()
    }
}

/// Why a `run` call was ignored rather than executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The input text was empty, so there is nothing to inject.
    EmptyInput,
    /// Another run is in flight on this instance; last call loses.
    RunInProgress,
}

/// Result of a `run` call.
///
/// An ignored run is a value, not an error: the engine models the UI's
/// "ignore re-entrant submit" behavior, where dropping the request is the
/// designed outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// The run executed to the final layer; summary counters attached.
    Completed(RunStats),
    /// The run was dropped without touching any state.
    Ignored(IgnoreReason),
}

impl RunOutcome {
    /// True iff the run executed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// The summary counters, if the run executed.
    #[must_use]
    pub fn stats(&self) -> Option<RunStats> {
        match self {
            RunOutcome::Completed(stats) => Some(*stats),
            RunOutcome::Ignored(_) => None,
        }
    }
}

/// Mutable per-run state: one working copy of unit and edge activity.
#[derive(Debug)]
struct WorkState {
    activations: Vec<f32>,
    active: Vec<bool>,
    edge_active: Vec<bool>,
}

impl WorkState {
    fn reset(&mut self) {
        self.activations.fill(0.0);
        self.active.fill(false);
        self.edge_active.fill(false);
    }
}

/// Resets the running flag when dropped, so the state machine returns to
/// Idle unconditionally, including on a panicking sink.
struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A compiled, run-ready view of a topology.
///
/// Construction copies the structural data (layer offsets, incoming edges
/// per unit, the dense edge table) out of the topology; runs then mutate
/// only the simulator's own working buffers. Edges are sorted by their
/// `(from, to)` coordinates so iteration order, and with it tie-breaking
/// and snapshot layout, is stable across runs.
#[derive(Debug)]
pub struct Simulator {
    /// Prefix sums of layer sizes; length = `num_layers + 1`.
    layer_offsets: Vec<usize>,
    /// Dense unit index to stable coordinates.
    unit_refs: Vec<UnitRef>,
    /// Dense edge table: endpoints and weight, sorted by `(from, to)`.
    edge_refs: Vec<(UnitRef, UnitRef, f32)>,
    // CSR format for incoming edges. For unit `i`, incoming entries are at
    // positions `in_offsets[i]..in_offsets[i+1]` of the parallel arrays.
    in_offsets: Vec<usize>,
    in_sources: Vec<usize>,
    in_weights: Vec<f32>,
    in_edges: Vec<usize>,
    pacing: Pacing,
    state: RefCell<WorkState>,
    running: Cell<bool>,
}

impl Simulator {
    /// Compile a topology into a simulator with the default animated pacing.
    #[must_use]
    pub fn new(topology: &Topology) -> Self {
        let num_layers = topology.num_layers();
        let mut layer_offsets = Vec::with_capacity(num_layers + 1);
        layer_offsets.push(0);
        for layer in &topology.layers {
            layer_offsets.push(layer_offsets.last().unwrap() + layer.len());
        }
        let total_units = *layer_offsets.last().unwrap();

        // Dense index per unit, in (layer, index) order.
        let mut dense_of: std::collections::HashMap<crate::unit::UnitId, usize> =
            std::collections::HashMap::with_capacity(total_units);
        let mut unit_refs = Vec::with_capacity(total_units);
        for (layer, ids) in topology.layers.iter().enumerate() {
            for (index, &id) in ids.iter().enumerate() {
                dense_of.insert(id, unit_refs.len());
                unit_refs.push(UnitRef { layer, index });
            }
        }

        // Collect edges as dense index pairs, sorted for a stable order.
        let mut edges: Vec<(usize, usize, f32)> = topology
            .edges
            .iter()
            .map(|(_, e)| (dense_of[&e.from], dense_of[&e.to], e.weight))
            .collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let edge_refs: Vec<(UnitRef, UnitRef, f32)> = edges
            .iter()
            .map(|&(from, to, weight)| (unit_refs[from], unit_refs[to], weight))
            .collect();

        // Build incoming CSR.
        let mut counts = vec![0usize; total_units];
        for &(_, to, _) in &edges {
            counts[to] += 1;
        }

        let mut in_offsets = Vec::with_capacity(total_units + 1);
        in_offsets.push(0);
        for &count in &counts {
            in_offsets.push(in_offsets.last().unwrap() + count);
        }

        let total_edges = edges.len();
        let mut in_sources = vec![0usize; total_edges];
        let mut in_weights = vec![0.0f32; total_edges];
        let mut in_edges = vec![0usize; total_edges];
        let mut write_pos = in_offsets[..total_units].to_vec();

        for (edge_idx, &(from, to, weight)) in edges.iter().enumerate() {
            let pos = write_pos[to];
            in_sources[pos] = from;
            in_weights[pos] = weight;
            in_edges[pos] = edge_idx;
            write_pos[to] += 1;
        }

        Self {
            layer_offsets,
            unit_refs,
            edge_refs,
            in_offsets,
            in_sources,
            in_weights,
            in_edges,
            pacing: Pacing::default(),
            state: RefCell::new(WorkState {
                activations: vec![0.0; total_units],
                active: vec![false; total_units],
                edge_active: vec![false; total_edges],
            }),
            running: Cell::new(false),
        }
    }

    /// Replace the pacing configuration.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Number of layers in the compiled topology.
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.layer_offsets.len() - 1
    }

    /// Total number of units across all layers.
    #[must_use]
    pub fn total_units(&self) -> usize {
        self.unit_refs.len()
    }

    /// Execute one forward pass, handing each layer's snapshot to `sink`.
    ///
    /// The engine guarantees at most one run per instance: a call made while
    /// a run is in flight (including from inside `sink`) is dropped with
    /// [`IgnoreReason::RunInProgress`], and an empty `input` is dropped with
    /// [`IgnoreReason::EmptyInput`]; neither mutates any state. `sparsity`
    /// is clamped to `[0, 1]`. Once started, a run always emits exactly one
    /// snapshot per layer and then returns to idle.
    ///
    /// Snapshots are emitted as they are produced and must be consumed or
    /// captured by the caller; the engine keeps no history. Between
    /// emissions the call sleeps per the configured [`Pacing`].
    pub fn run<R: Rng, F: FnMut(&Snapshot)>(
        &self,
        input: &str,
        sparsity: f32,
        rng: &mut R,
        mut sink: F,
    ) -> RunOutcome {
        if self.running.get() {
            trace!("run ignored: already running");
            return RunOutcome::Ignored(IgnoreReason::RunInProgress);
        }
        let features = input::encode(input);
        if features.is_empty() {
            trace!("run ignored: empty input");
            return RunOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        self.running.set(true);
        let _guard = RunGuard(&self.running);

        let sparsity = sparsity.clamp(0.0, 1.0);
        self.state.borrow_mut().reset();

        for step in 0..self.num_layers() {
            let delay = self.pacing.delay_before(step);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            {
                let mut state = self.state.borrow_mut();
                if step == 0 {
                    self.inject_features(&mut state, &features, sparsity, rng);
                } else {
                    self.step_layer(&mut state, step, sparsity);
                }
                trace!(
                    step,
                    active = Self::active_in_layer(&state, &self.layer_offsets, step),
                    "layer gated"
                );
            }

            let snapshot = self.capture(step);
            sink(&snapshot);
        }

        let stats = self.stats();
        debug!(
            active = stats.active_count,
            total = stats.total_count,
            sparsity_percent = stats.sparsity_percent,
            "run completed"
        );
        RunOutcome::Completed(stats)
    }

    /// Execute one forward pass and materialize it.
    ///
    /// Returns `None` when the run is ignored (empty input or run in flight).
    pub fn run_collect<R: Rng>(
        &self,
        input: &str,
        sparsity: f32,
        rng: &mut R,
    ) -> Option<RunRecord> {
        let mut snapshots = Vec::with_capacity(self.num_layers());
        match self.run(input, sparsity, rng, |s| snapshots.push(s.clone())) {
            RunOutcome::Completed(stats) => Some(RunRecord { snapshots, stats }),
            RunOutcome::Ignored(_) => None,
        }
    }

    /// Input-layer step: feature injection through a per-unit stochastic gate.
    ///
    /// Activation probability is `1 - sparsity`, independent per unit; a unit
    /// that fires gets a random boost of up to half its feature value, capped
    /// at 1.
    fn inject_features<R: Rng>(
        &self,
        state: &mut WorkState,
        features: &[u32],
        sparsity: f32,
        rng: &mut R,
    ) {
        let size = self.layer_offsets[1];
        for dense in 0..size {
            let feature = features[dense % features.len()] as f32 / FEATURE_SCALE;
            state.activations[dense] = feature;

            let r: f32 = rng.random();
            if r > sparsity {
                let boost: f32 = rng.random();
                state.activations[dense] = (feature * (1.0 + boost * BOOST_GAIN)).min(1.0);
                state.active[dense] = true;
            }
        }
    }

    /// Hidden/output-layer step: weighted propagation, ReLU, then the layer
    /// wide top-k gate.
    fn step_layer(&self, state: &mut WorkState, step: usize, sparsity: f32) {
        let lo = self.layer_offsets[step];
        let hi = self.layer_offsets[step + 1];

        for dense in lo..hi {
            let mut sum = 0.0;
            for pos in self.in_offsets[dense]..self.in_offsets[dense + 1] {
                let source = self.in_sources[pos];
                if state.active[source] {
                    sum += state.activations[source] * self.in_weights[pos];
                    state.edge_active[self.in_edges[pos]] = true;
                } else {
                    state.edge_active[self.in_edges[pos]] = false;
                }
            }
            // Raw rectified activation; may exceed 1 until the gate clamps
            // the survivors.
            state.activations[dense] = sum.max(0.0);
        }

        let size = hi - lo;
        let k = (size as f32 * (1.0 - sparsity)).ceil() as usize;
        let mask = top_k_mask(&state.activations[lo..hi], k, ACTIVATION_FLOOR);
        for (offset, &keep) in mask.iter().enumerate() {
            let dense = lo + offset;
            state.active[dense] = keep;
            if keep {
                state.activations[dense] = state.activations[dense].min(1.0);
            }
        }
    }

    fn active_in_layer(state: &WorkState, layer_offsets: &[usize], step: usize) -> usize {
        state.active[layer_offsets[step]..layer_offsets[step + 1]]
            .iter()
            .filter(|&&a| a)
            .count()
    }

    /// Copy the working state into an immutable snapshot.
    fn capture(&self, step: usize) -> Snapshot {
        let state = self.state.borrow();

        let mut units = Vec::with_capacity(self.unit_refs.len());
        for (dense, &unit) in self.unit_refs.iter().enumerate() {
            units.push(UnitState {
                unit,
                active: state.active[dense],
                activation: state.activations[dense],
            });
        }

        let mut edges = Vec::with_capacity(self.edge_refs.len());
        for (edge_idx, &(from, to, weight)) in self.edge_refs.iter().enumerate() {
            edges.push(EdgeState {
                from,
                to,
                weight,
                active: state.edge_active[edge_idx],
            });
        }

        Snapshot { step, units, edges }
    }

    /// Summary counters over the current (final) working state.
    fn stats(&self) -> RunStats {
        let state = self.state.borrow();
        let active_count = state.active.iter().filter(|&&a| a).count();
        let total_count = state.active.len();
        let sparsity_percent =
            (100.0 * (1.0 - active_count as f32 / total_count as f32)).round() as u8;
        RunStats {
            active_count,
            total_count,
            sparsity_percent,
        }
    }
}
