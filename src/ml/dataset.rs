//! Merging synthetic and feedback training data.

use super::types::TrainingExample;
use crate::storage::feedback_store::FeedbackRecord;

/// Default replication factor for feedback examples.
pub const DEFAULT_FEEDBACK_WEIGHT: usize = 5;

/// Concatenate synthetic examples with weighted feedback examples.
///
/// Synthetic examples come first, in order. Each feedback record then
/// contributes `weight` identical copies of its corrected example, so the
/// output always holds `synthetic.len() + weight * feedback.len()` items.
pub fn combine(
    synthetic: &[TrainingExample],
    feedback: &[FeedbackRecord],
    weight: usize,
) -> Vec<TrainingExample> {
    let mut combined = Vec::with_capacity(synthetic.len() + weight * feedback.len());
    combined.extend_from_slice(synthetic);

    for record in feedback {
        let example = record.to_training_example();
        combined.extend(std::iter::repeat(example).take(weight));
    }

    if !feedback.is_empty() {
        tracing::debug!(
            "Combined {} synthetic with {} feedback examples (weight {})",
            synthetic.len(),
            feedback.len(),
            weight
        );
    }

    combined
}
