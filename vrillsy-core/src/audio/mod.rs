//! Audio conditioning and onset detection.

mod condition;
mod onset;

pub use condition::{AudioConditioner, CONDITIONED_FILENAME};
pub use onset::{OnsetDetector, OnsetDetectorConfig};
