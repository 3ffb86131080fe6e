//! Animated terminal rendering of a sparse forward pass.
//!
//! This is the presentation adapter the engine is designed for, reduced to a
//! terminal: it supplies the two inputs (a prompt and a sparsity level),
//! consumes one snapshot per layer at the animated pacing, and redraws a
//! per-layer activity diagram after each step.
//!
//! Run with: `cargo run --example animate -- "hello world" 0.85`

use std::env;

use sparse_cascade::{Pacing, RunOutcome, Simulator, Snapshot, Topology, DEFAULT_SPARSITY};

/// Human-readable layer names for the default six-layer shape. Purely a
/// presentation concern; the engine only knows layer indices.
const LAYER_NAMES: [&str; 6] = [
    "Input",
    "Encode-1",
    "Encode-2",
    "Bottleneck",
    "Decode-1",
    "Output",
];

const BAR_WIDTH: usize = 32;

fn draw(snapshot: &Snapshot, layer_sizes: &[usize]) {
    println!("-- step {} --", snapshot.step);
    for (layer, &size) in layer_sizes.iter().enumerate() {
        let active = snapshot.active_in_layer(layer);
        let filled = active * BAR_WIDTH / size;
        let bar: String = (0..BAR_WIDTH).map(|i| if i < filled { '█' } else { '·' }).collect();
        let marker = if layer == snapshot.step { '>' } else { ' ' };
        println!(
            "{} {:<10} [{}] {:>3}/{:<3}",
            marker, LAYER_NAMES[layer], bar, active, size
        );
    }
    println!();
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let prompt = args.get(1).map_or("sparse attention", String::as_str);
    let sparsity: f32 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SPARSITY);

    println!("Sparse Cascade");
    println!("==============\n");
    println!("Prompt:   {:?}", prompt);
    println!("Sparsity: {:.2}\n", sparsity);

    // The reference behavior: an unseeded random source for both the wiring
    // and the input gate.
    let mut rng = rand::rng();
    let topology = Topology::demo(&mut rng);
    let simulator = Simulator::new(&topology).with_pacing(Pacing::animated());
    let layer_sizes = topology.layer_sizes();

    let outcome = simulator.run(prompt, sparsity, &mut rng, |snapshot| {
        draw(snapshot, &layer_sizes);
    });

    match outcome {
        RunOutcome::Completed(stats) => {
            println!("Run complete");
            println!("============");
            println!("Active units: {} / {}", stats.active_count, stats.total_count);
            println!("Sparsity:     {}%", stats.sparsity_percent);
        }
        RunOutcome::Ignored(reason) => {
            println!("Request ignored: {:?}", reason);
        }
    }
}
