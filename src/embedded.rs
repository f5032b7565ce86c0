// Embedded diagonal-Gaussian density backend
//
// Runs in-process with no subprocess boundary, but still persists its scorer
// artifact so a downstream run can re-score on demand. Training imputes
// missing values with the per-column median, then fits an independent
// Gaussian per column; the score of a row is the sum of per-column Gaussian
// log-densities, so denser regions of training annotation space score higher.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::backend::ModelBackend;
use crate::error::TrainError;
use crate::store;

#[path = "embedded_test.rs"]
mod embedded_test;

pub const EMBEDDED_SCORER_SUFFIX: &str = ".scorer.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianHyperparameters {
    /// Lower bound applied to per-column variances so that a zero-variance
    /// column yields finite log-densities.
    pub variance_floor: f64,
}

impl Default for GaussianHyperparameters {
    fn default() -> Self {
        GaussianHyperparameters {
            variance_floor: 1e-6,
        }
    }
}

/// Persisted scorer artifact: per-column imputation medians and Gaussian
/// parameters, keyed by the annotation names seen at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianScorer {
    pub annotation_names: Vec<String>,
    pub medians: Vec<f64>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
}

impl GaussianScorer {
    pub fn deserialize(path: &Path) -> Result<GaussianScorer, TrainError> {
        let file = File::open(path).map_err(|e| {
            TrainError::BackendExecution(format!("cannot read scorer artifact {}: {}", path.display(), e))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TrainError::BackendExecution(format!("malformed scorer artifact {}: {}", path.display(), e))
        })
    }

    fn serialize(&self, path: &Path) -> Result<(), TrainError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| {
            TrainError::BackendExecution(format!("cannot write scorer artifact {}: {}", path.display(), e))
        })?;
        writer.flush()?;
        Ok(())
    }

    /// Score one row, imputing missing values with the training medians.
    pub fn score_row(&self, row: &[f64]) -> f64 {
        debug_assert_eq!(row.len(), self.means.len());
        row.iter()
            .enumerate()
            .map(|(i, &x)| {
                let x = if x.is_nan() { self.medians[i] } else { x };
                let d = x - self.means[i];
                let v = self.variances[i];
                -0.5 * (d * d / v + (2.0 * PI * v).ln())
            })
            .sum()
    }
}

/// Median of the non-missing values of a column; 0.0 if every value is
/// missing (the quality gate rejects such columns before training).
fn median(values: &[f64]) -> f64 {
    let mut present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return 0.0;
    }
    present.sort_by(f64::total_cmp);
    let n = present.len();
    if n % 2 == 1 {
        present[n / 2]
    } else {
        0.5 * (present[n / 2 - 1] + present[n / 2])
    }
}

pub struct EmbeddedGaussianModel {
    hyperparameters: GaussianHyperparameters,
}

impl EmbeddedGaussianModel {
    /// Build the backend, reading hyperparameters from `hyperparameters_path`
    /// when given and falling back to built-in defaults otherwise.
    pub fn new(hyperparameters_path: Option<&Path>) -> Result<EmbeddedGaussianModel, TrainError> {
        let hyperparameters = match hyperparameters_path {
            Some(path) => {
                let file = File::open(path).map_err(|e| {
                    TrainError::InputValidation(format!(
                        "cannot read hyperparameters JSON {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                    TrainError::InputValidation(format!(
                        "malformed hyperparameters JSON {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            None => GaussianHyperparameters::default(),
        };
        Ok(EmbeddedGaussianModel { hyperparameters })
    }
}

impl ModelBackend for EmbeddedGaussianModel {
    fn train(&self, annotations_path: &Path, scorer_path: &Path) -> Result<(), TrainError> {
        let data = store::read_store(annotations_path)?;
        let num_rows = data.rows.len();
        let num_annotations = data.annotation_names.len();
        if num_rows == 0 || num_annotations == 0 {
            return Err(TrainError::BackendExecution(format!(
                "cannot fit a model to an empty matrix ({} rows x {} annotations)",
                num_rows, num_annotations
            )));
        }

        let mut medians = Vec::with_capacity(num_annotations);
        let mut means = Vec::with_capacity(num_annotations);
        let mut variances = Vec::with_capacity(num_annotations);
        for i in 0..num_annotations {
            let column: Vec<f64> = data.rows.iter().map(|row| row[i]).collect();
            let med = median(&column);
            let imputed: Vec<f64> = column
                .iter()
                .map(|&x| if x.is_nan() { med } else { x })
                .collect();
            let mean = imputed.iter().sum::<f64>() / num_rows as f64;
            let var = imputed.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / num_rows as f64;
            medians.push(med);
            means.push(mean);
            variances.push(var.max(self.hyperparameters.variance_floor));
        }

        let scorer = GaussianScorer {
            annotation_names: data.annotation_names,
            medians,
            means,
            variances,
        };
        scorer.serialize(scorer_path)
    }

    fn score(
        &self,
        scorer_path: &Path,
        annotations_path: &Path,
        scores_path: &Path,
    ) -> Result<(), TrainError> {
        let scorer = GaussianScorer::deserialize(scorer_path)?;
        let data = store::read_store(annotations_path)?;
        if data.annotation_names != scorer.annotation_names {
            return Err(TrainError::BackendExecution(format!(
                "annotation names of {} do not match those the scorer {} was trained on",
                annotations_path.display(),
                scorer_path.display()
            )));
        }
        let scores: Vec<f64> = data.rows.iter().map(|row| scorer.score_row(row)).collect();
        store::write_scores(scores_path, &scores)
    }

    fn scorer_suffix(&self) -> &'static str {
        EMBEDDED_SCORER_SUFFIX
    }
}
