pub mod backend; // Model backend contract and configuration resolution
pub mod embedded; // Embedded diagonal-Gaussian density backend
pub mod error;
pub mod external; // External-process backend (bundled isolation-forest script or custom)
pub mod paths; // Output-path derivation (prefix + variant type + stage)
pub mod store; // Annotation store and score-file I/O
pub mod threshold; // Calibration-sensitivity to score-threshold conversion
pub mod train; // Orchestrator: validate, partition, train, score, recombine
pub mod variant_type;
