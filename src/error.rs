use thiserror::Error;

/// Errors raised by the training pipeline.
///
/// Every variant is fatal: failures unwind to the top of the run and abort the
/// whole multi-variant-type invocation. Zero-variance annotations are the one
/// recoverable condition and are reported via `log::warn!` rather than here.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Bad or inconsistent inputs, detected before any training work.
    #[error("invalid input: {0}")]
    InputValidation(String),

    /// A required subset (training or negative-training pool) has zero rows.
    #[error("insufficient data: {0}")]
    DataSufficiency(String),

    /// An annotation column is entirely missing in a training subset.
    #[error("annotation quality: {0}")]
    AnnotationQuality(String),

    /// A backend train/score call failed: non-zero exit, malformed artifact,
    /// or a score count that does not match the input row count. Not retried.
    #[error("backend execution failed: {0}")]
    BackendExecution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
