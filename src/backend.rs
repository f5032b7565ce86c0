// Model backend capability contract
//
// The orchestrator depends only on this trait, never on backend identity.
// Every backend communicates through files: a train call consumes an
// annotation store and persists an opaque scorer artifact; a score call
// consumes a scorer artifact plus an annotation store and writes an ordered
// score file whose length equals the store's row count.

use clap::ValueEnum;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::embedded::EmbeddedGaussianModel;
use crate::error::TrainError;
use crate::external::ExternalProcessModel;

/// A train-and-score capability. Implementations must be deterministic given
/// identical inputs and configuration, and must not retry on failure.
pub trait ModelBackend {
    /// Fit a model to the annotations in `annotations_path` and persist a
    /// scorer artifact at `scorer_path`.
    fn train(&self, annotations_path: &Path, scorer_path: &Path) -> Result<(), TrainError>;

    /// Score the annotations in `annotations_path` with a previously trained
    /// scorer, writing an ordered score file to `scores_path`. Output length
    /// must equal the input row count, in input row order.
    fn score(
        &self,
        scorer_path: &Path,
        annotations_path: &Path,
        scores_path: &Path,
    ) -> Result<(), TrainError>;

    /// Filename suffix of persisted scorer artifacts, including the leading
    /// dot (e.g. ".scorer.json").
    fn scorer_suffix(&self) -> &'static str;
}

/// Selectable backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-process diagonal-Gaussian density model.
    EmbeddedGaussian,
    /// Bundled isolation-forest script, run out of process.
    ExternalDefault,
    /// User-supplied script, run out of process.
    ExternalCustom,
}

fn check_readable(path: &Path, what: &str) -> Result<(), TrainError> {
    File::open(path).map(|_| ()).map_err(|e| {
        TrainError::InputValidation(format!("cannot read {} {}: {}", what, path.display(), e))
    })
}

/// Resolve the backend configuration once per invocation.
///
/// The embedded and default-script backends supply built-in hyperparameter
/// defaults and must not be given a script; a custom backend always requires
/// both an explicit script and an explicit hyperparameters document.
pub fn resolve_backend(
    kind: BackendKind,
    script: Option<&PathBuf>,
    hyperparameters: Option<&PathBuf>,
) -> Result<Box<dyn ModelBackend>, TrainError> {
    match kind {
        BackendKind::EmbeddedGaussian => {
            if script.is_some() {
                return Err(TrainError::InputValidation(
                    "a backend script must not be provided for the embedded-gaussian backend".into(),
                ));
            }
            if let Some(path) = hyperparameters {
                check_readable(path, "hyperparameters JSON")?;
            }
            Ok(Box::new(EmbeddedGaussianModel::new(hyperparameters.map(|p| p.as_path()))?))
        }
        BackendKind::ExternalDefault => {
            if script.is_some() {
                return Err(TrainError::InputValidation(
                    "a backend script must not be provided for the external-default backend".into(),
                ));
            }
            if let Some(path) = hyperparameters {
                check_readable(path, "hyperparameters JSON")?;
            }
            Ok(Box::new(ExternalProcessModel::bundled(
                hyperparameters.cloned(),
            )?))
        }
        BackendKind::ExternalCustom => {
            let script = script.ok_or_else(|| {
                TrainError::InputValidation(
                    "a backend script is required for the external-custom backend".into(),
                )
            })?;
            let hyperparameters = hyperparameters.ok_or_else(|| {
                TrainError::InputValidation(
                    "a hyperparameters JSON file is required for the external-custom backend".into(),
                )
            })?;
            check_readable(script, "backend script")?;
            check_readable(hyperparameters, "hyperparameters JSON")?;
            Ok(Box::new(ExternalProcessModel::custom(
                script.clone(),
                hyperparameters.clone(),
            )))
        }
    }
}
