//! Text-to-feature encoding for the input layer.
//!
//! The demo treats its prompt character by character: case is normalized to
//! lowercase, then every character becomes one integer feature, its Unicode
//! code point. There is no vocabulary and no tokenizer state; feature count
//! is simply the character count and need not match the input-layer size.

/// Encode a prompt into integer features.
///
/// Returns one code point per character of the lowercased text. An empty
/// input yields an empty feature vector, which the simulator treats as a
/// request to ignore.
#[must_use]
pub fn encode(text: &str) -> Vec<u32> {
    text.to_lowercase().chars().map(u32::from).collect()
}
