// External-process backend
//
// Invokes a script out of process with explicit file-path arguments:
//
//   <script> train <matrix> <hyperparameters> <scorer-out>
//   <script> score <matrix> <scorer-in> <scores-out>
//
// The calling thread blocks until the subprocess terminates. Success or
// failure is conveyed by the exit status; stdout and stderr are captured for
// diagnostics only, never parsed for data. A non-zero exit, a missing or
// unreadable output file, or a score count that differs from the input row
// count is a backend-execution failure. No retries, no timeout: a hung
// subprocess hangs the run.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::backend::ModelBackend;
use crate::error::TrainError;
use crate::store;

pub const EXTERNAL_SCORER_SUFFIX: &str = ".scorer.pkl";

const DEFAULT_SCRIPT_NAME: &str = "isolation-forest.py";
const DEFAULT_SCRIPT: &str = include_str!("../resources/isolation-forest.py");
const DEFAULT_HYPERPARAMETERS_NAME: &str = "isolation-forest-hyperparameters.json";
const DEFAULT_HYPERPARAMETERS: &str =
    include_str!("../resources/isolation-forest-hyperparameters.json");

pub struct ExternalProcessModel {
    script: PathBuf,
    hyperparameters: PathBuf,
    // Holds the materialized bundled resources alive for the run's duration.
    _resources: Option<tempfile::TempDir>,
}

impl ExternalProcessModel {
    /// Materialize the bundled isolation-forest script (and, unless the
    /// caller supplied one, its default hyperparameters) to a temporary
    /// directory.
    pub fn bundled(hyperparameters: Option<PathBuf>) -> Result<ExternalProcessModel, TrainError> {
        let resources = tempfile::Builder::new().prefix("annotrain.").tempdir()?;
        let script = resources.path().join(DEFAULT_SCRIPT_NAME);
        fs::write(&script, DEFAULT_SCRIPT)?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        let hyperparameters = match hyperparameters {
            Some(path) => path,
            None => {
                let path = resources.path().join(DEFAULT_HYPERPARAMETERS_NAME);
                fs::write(&path, DEFAULT_HYPERPARAMETERS)?;
                path
            }
        };
        Ok(ExternalProcessModel {
            script,
            hyperparameters,
            _resources: Some(resources),
        })
    }

    /// Use a caller-supplied executable script and hyperparameters document.
    pub fn custom(script: PathBuf, hyperparameters: PathBuf) -> ExternalProcessModel {
        ExternalProcessModel {
            script,
            hyperparameters,
            _resources: None,
        }
    }

    fn run(&self, verb: &str, args: &[&Path]) -> Result<(), TrainError> {
        let mut command = Command::new(&self.script);
        command.arg(verb);
        for arg in args {
            command.arg(arg);
        }
        log::debug!("Invoking backend script: {:?}", command);
        let output = command.output().map_err(|e| {
            TrainError::BackendExecution(format!(
                "failed to invoke backend script {}: {}",
                self.script.display(),
                e
            ))
        })?;
        if !output.stdout.is_empty() {
            log::debug!("Backend stdout: {}", String::from_utf8_lossy(&output.stdout));
        }
        if !output.stderr.is_empty() {
            log::debug!("Backend stderr: {}", String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            return Err(TrainError::BackendExecution(format!(
                "backend script {} {} exited with {}: {}",
                self.script.display(),
                verb,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl ModelBackend for ExternalProcessModel {
    fn train(&self, annotations_path: &Path, scorer_path: &Path) -> Result<(), TrainError> {
        self.run(
            "train",
            &[annotations_path, self.hyperparameters.as_path(), scorer_path],
        )?;
        if !scorer_path.is_file() {
            return Err(TrainError::BackendExecution(format!(
                "backend script {} exited successfully but produced no scorer artifact at {}",
                self.script.display(),
                scorer_path.display()
            )));
        }
        Ok(())
    }

    fn score(
        &self,
        scorer_path: &Path,
        annotations_path: &Path,
        scores_path: &Path,
    ) -> Result<(), TrainError> {
        self.run("score", &[annotations_path, scorer_path, scores_path])?;
        // The subprocess boundary cannot be trusted for shape: check that the
        // produced score count matches the input row count.
        let scores = store::read_scores(scores_path)?;
        let expected = store::read_store(annotations_path)?.rows.len();
        if scores.len() != expected {
            return Err(TrainError::BackendExecution(format!(
                "backend script {} produced {} scores for {} input rows",
                self.script.display(),
                scores.len(),
                expected
            )));
        }
        Ok(())
    }

    fn scorer_suffix(&self) -> &'static str {
        EXTERNAL_SCORER_SUFFIX
    }
}
