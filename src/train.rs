// Orchestrator
//
// Drives the full per-variant-type workflow:
//   validate -> partition -> train positive -> score training/calibration ->
//   (positive-negative mode only) derive threshold -> select negative
//   training data -> train negative -> recombine-score calibration.
//
// Execution is single-threaded and strictly sequential: variant types are
// processed one at a time in canonical order, and every failure is terminal
// for the whole invocation. Each subset handed to a backend is a fresh
// temporary store file, never reused across steps.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::backend::{self, BackendKind, ModelBackend};
use crate::error::TrainError;
use crate::paths::{self, ScoreStage};
use crate::store;
use crate::threshold;
use crate::variant_type::{self, VariantType};

#[path = "train_test.rs"]
mod train_test;

/// Recognized operation parameters for a training run.
pub struct TrainOpt {
    /// Primary annotation store with `training`, `calibration`, and `snp`
    /// labels.
    pub annotations_file: PathBuf,
    /// Unlabeled annotation store; must be paired with
    /// `calibration_sensitivity_threshold`.
    pub unlabeled_annotations_file: Option<PathBuf>,
    pub backend_kind: BackendKind,
    /// Executable script for the external-custom backend.
    pub backend_script: Option<PathBuf>,
    /// Backend hyperparameters document; required for external-custom,
    /// optional otherwise.
    pub hyperparameters_json: Option<PathBuf>,
    /// Basename for all output files.
    pub output_prefix: String,
    /// Calibration-sensitivity target in [0, 1]; must be paired with
    /// `unlabeled_annotations_file`.
    pub calibration_sensitivity_threshold: Option<f64>,
    /// Variant types to train models for; duplicates collapse and processing
    /// always runs SNP before INDEL.
    pub variant_types: Vec<VariantType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelsMode {
    PositiveOnly,
    PositiveUnlabeled,
}

/// Run the complete training workflow for every requested variant type.
pub fn run_training(opt: &TrainOpt) -> Result<(), TrainError> {
    let mode = validate_inputs(opt)?;
    let backend = backend::resolve_backend(
        opt.backend_kind,
        opt.backend_script.as_ref(),
        opt.hyperparameters_json.as_ref(),
    )?;

    log::info!("Starting training...");
    for variant_type in variant_type::resolve_types(&opt.variant_types)? {
        do_work_for_variant_type(opt, mode, backend.as_ref(), variant_type)?;
    }
    log::info!("Training complete.");
    Ok(())
}

/// Decide positive-only vs. positive-negative mode and fail fast on
/// inconsistent inputs. The unlabeled store and the sensitivity threshold
/// must be jointly present or jointly absent, and the unlabeled store must
/// carry exactly the primary's annotation names in the same order.
fn validate_inputs(opt: &TrainOpt) -> Result<LabelsMode, TrainError> {
    check_readable(&opt.annotations_file, "annotation store")?;

    if opt.unlabeled_annotations_file.is_some() != opt.calibration_sensitivity_threshold.is_some() {
        return Err(TrainError::InputValidation(
            "unlabeled annotations and calibration-sensitivity threshold must both be unspecified \
             (for positive-only model training) or specified (for positive-negative model training)"
                .into(),
        ));
    }

    if let Some(sensitivity) = opt.calibration_sensitivity_threshold {
        if !(0.0..=1.0).contains(&sensitivity) {
            return Err(TrainError::InputValidation(format!(
                "calibration-sensitivity threshold must be in [0, 1], got {}",
                sensitivity
            )));
        }
    }

    match &opt.unlabeled_annotations_file {
        Some(unlabeled_file) => {
            check_readable(unlabeled_file, "unlabeled annotation store")?;
            let names = store::read_annotation_names(&opt.annotations_file)?;
            let unlabeled_names = store::read_annotation_names(unlabeled_file)?;
            if names != unlabeled_names {
                return Err(TrainError::InputValidation(
                    "annotation names must be identical for labeled and unlabeled annotations".into(),
                ));
            }
            Ok(LabelsMode::PositiveUnlabeled)
        }
        None => Ok(LabelsMode::PositiveOnly),
    }
}

fn check_readable(path: &Path, what: &str) -> Result<(), TrainError> {
    File::open(path).map(|_| ()).map_err(|e| {
        TrainError::InputValidation(format!("cannot read {} {}: {}", what, path.display(), e))
    })
}

/// All modeling and scoring work for one variant type.
fn do_work_for_variant_type(
    opt: &TrainOpt,
    mode: LabelsMode,
    backend: &dyn ModelBackend,
    variant_type: VariantType,
) -> Result<(), TrainError> {
    let data = store::read_store(&opt.annotations_file)?;
    let is_training = data.label(store::TRAINING_LABEL)?;
    let is_calibration = data.label(store::CALIBRATION_LABEL)?;
    let is_snp = data.label(store::SNP_LABEL)?;

    let part = variant_type::partition(is_training, is_calibration, is_snp, variant_type)?;
    let names = &data.annotation_names;

    // Positive model.
    log::info!(
        "Training {} model with {} training sites x {} annotations {:?}...",
        variant_type,
        part.num_training,
        names.len(),
        names
    );
    let training_rows = store::subset_rows(&data.rows, &part.training);
    validate_training_annotations(names, &training_rows, &format!("{} positive", variant_type))?;
    let training_subset = store::rows_to_temp_file(names, &training_rows)?;
    let positive_scorer = paths::scorer_path(
        &opt.output_prefix,
        variant_type,
        false,
        backend.scorer_suffix(),
    );
    backend.train(training_subset.path(), &positive_scorer)?;
    log::info!(
        "{} model trained and serialized to {}.",
        variant_type,
        positive_scorer.display()
    );

    log::info!("Scoring {} {} training sites...", part.num_training, variant_type);
    let training_scores_path = paths::scores_path(&opt.output_prefix, variant_type, ScoreStage::Training);
    backend.score(&positive_scorer, training_subset.path(), &training_scores_path)?;
    log::info!(
        "{} training scores written to {}.",
        variant_type,
        training_scores_path.display()
    );

    let calibration_scores_path =
        paths::scores_path(&opt.output_prefix, variant_type, ScoreStage::Calibration);
    if part.num_calibration > 0 {
        log::info!(
            "Scoring {} {} calibration sites...",
            part.num_calibration,
            variant_type
        );
        let calibration_subset = store::subset_to_temp_file(names, &data.rows, &part.calibration)?;
        backend.score(&positive_scorer, calibration_subset.path(), &calibration_scores_path)?;
        log::info!(
            "{} calibration scores written to {}.",
            variant_type,
            calibration_scores_path.display()
        );
    } else {
        log::warn!("No {} calibration sites were available.", variant_type);
    }

    if mode == LabelsMode::PositiveOnly {
        return Ok(());
    }

    // Negative model.
    if part.num_calibration == 0 {
        return Err(TrainError::DataSufficiency(format!(
            "attempted to train {} negative model, but no suitable calibration sites were found in the provided annotations",
            variant_type
        )));
    }

    let unlabeled_file = opt
        .unlabeled_annotations_file
        .as_ref()
        .expect("positive-unlabeled mode implies an unlabeled store");
    let sensitivity = opt
        .calibration_sensitivity_threshold
        .expect("positive-unlabeled mode implies a sensitivity threshold");

    let unlabeled = store::read_store(unlabeled_file)?;
    let unlabeled_mask = variant_type::type_mask(unlabeled.label(store::SNP_LABEL)?, variant_type);
    let num_unlabeled = variant_type::count_true(&unlabeled_mask);
    if num_unlabeled == 0 {
        return Err(TrainError::DataSufficiency(format!(
            "attempted to train {} negative model, but no suitable unlabeled sites were found in the provided annotations",
            variant_type
        )));
    }

    let calibration_scores = store::read_scores(&calibration_scores_path)?;
    let cutoff = threshold::score_threshold(&calibration_scores, sensitivity)?;
    log::info!(
        "Using {} score threshold of {:.4} corresponding to specified calibration-sensitivity threshold of {:.4}...",
        variant_type,
        cutoff,
        sensitivity
    );

    let training_scores = store::read_scores(&training_scores_path)?;
    let num_negative_from_training = training_scores.iter().filter(|&&s| s < cutoff).count();
    log::info!(
        "Selected {} labeled {} sites below score threshold of {:.4} for negative-model training...",
        num_negative_from_training,
        variant_type,
        cutoff
    );

    log::info!("Scoring {} unlabeled {} sites...", num_unlabeled, variant_type);
    let unlabeled_rows = store::subset_rows(&unlabeled.rows, &unlabeled_mask);
    let unlabeled_subset = store::rows_to_temp_file(names, &unlabeled_rows)?;
    let unlabeled_scores_path =
        paths::scores_path(&opt.output_prefix, variant_type, ScoreStage::Unlabeled);
    backend.score(&positive_scorer, unlabeled_subset.path(), &unlabeled_scores_path)?;
    let unlabeled_scores = store::read_scores(&unlabeled_scores_path)?;
    let num_negative_from_unlabeled = unlabeled_scores.iter().filter(|&&s| s < cutoff).count();
    log::info!(
        "Selected {} unlabeled {} sites below score threshold of {:.4} for negative-model training...",
        num_negative_from_unlabeled,
        variant_type,
        cutoff
    );

    let negative_rows = concatenate_negative_training_rows(
        &training_rows,
        &training_scores,
        &unlabeled_rows,
        &unlabeled_scores,
        cutoff,
    )?;
    log::info!(
        "Training {} negative model with {} negative-training sites x {} annotations {:?}...",
        variant_type,
        negative_rows.len(),
        names.len(),
        names
    );
    validate_training_annotations(names, &negative_rows, &format!("{} negative", variant_type))?;
    let negative_subset = store::rows_to_temp_file(names, &negative_rows)?;
    let negative_scorer = paths::scorer_path(
        &opt.output_prefix,
        variant_type,
        true,
        backend.scorer_suffix(),
    );
    backend.train(negative_subset.path(), &negative_scorer)?;
    log::info!(
        "{} negative model trained and serialized to {}.",
        variant_type,
        negative_scorer.display()
    );

    // Re-score the calibration subset with the combined scorer
    // (positive - negative), overwriting the positive-only calibration
    // scores. Training and unlabeled scores keep their positive-model
    // values; a downstream consumer can re-score them on demand given both
    // persisted scorer artifacts.
    log::info!(
        "Re-scoring {} {} calibration sites...",
        part.num_calibration,
        variant_type
    );
    let calibration_subset = store::subset_to_temp_file(names, &data.rows, &part.calibration)?;
    let combined = combined_score(
        backend,
        &positive_scorer,
        &negative_scorer,
        calibration_subset.path(),
    )?;
    store::write_scores(&calibration_scores_path, &combined)?;
    log::info!(
        "Calibration scores written to {}.",
        calibration_scores_path.display()
    );

    Ok(())
}

/// Annotation quality gate, run before every train call regardless of
/// backend. A column whose values are all missing is fatal (the feature is
/// meaningless and indicates an upstream extraction problem); a column whose
/// present values are all identical only degrades most density models, so it
/// is reported as a warning and the run continues.
fn validate_training_annotations(
    annotation_names: &[String],
    rows: &[Vec<f64>],
    model_tag: &str,
) -> Result<(), TrainError> {
    if annotation_names.is_empty() {
        return Err(TrainError::InputValidation(
            "number of annotations must be positive".into(),
        ));
    }
    if rows.is_empty() {
        return Err(TrainError::InputValidation(
            "number of training sites must be positive".into(),
        ));
    }
    if rows.iter().any(|row| row.len() != annotation_names.len()) {
        return Err(TrainError::InputValidation(
            "every row must have exactly one value per annotation".into(),
        ));
    }

    for name in zero_variance_annotation_names(annotation_names, rows) {
        log::warn!(
            "All values of the annotation {} are identical in the training data for the {} model.",
            name,
            model_tag
        );
    }

    let completely_missing: Vec<String> = annotation_names
        .iter()
        .enumerate()
        .filter(|(i, _)| rows.iter().all(|row| row[*i].is_nan()))
        .map(|(_, name)| name.clone())
        .collect();
    if !completely_missing.is_empty() {
        return Err(TrainError::AnnotationQuality(format!(
            "all values of the following annotations are missing in the training data for the {} model: [{}]; \
             consider repeating the extraction step with these annotations dropped, or lowering the \
             calibration-sensitivity threshold so that more negative-training data is admitted",
            model_tag,
            completely_missing.join(", ")
        )));
    }
    Ok(())
}

/// Names of the columns whose present (non-missing) values are all identical,
/// in annotation order. One warning is emitted per returned name; columns
/// with no present values at all are excluded here and handled by the fatal
/// all-missing check instead.
fn zero_variance_annotation_names(annotation_names: &[String], rows: &[Vec<f64>]) -> Vec<String> {
    annotation_names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            let mut present = rows.iter().map(|row| row[i]).filter(|v| !v.is_nan());
            match present.next() {
                Some(first) if present.all(|v| v == first) => Some(name.clone()),
                _ => None,
            }
        })
        .collect()
}

/// Concatenate the training-subset rows scored below the cutoff with the
/// unlabeled-subset rows scored below the cutoff, preserving within-group
/// order. A negative model cannot be trained on no data, so an empty result
/// is fatal rather than a silent fallback to positive-only behavior.
fn concatenate_negative_training_rows(
    training_rows: &[Vec<f64>],
    training_scores: &[f64],
    unlabeled_rows: &[Vec<f64>],
    unlabeled_scores: &[f64],
    cutoff: f64,
) -> Result<Vec<Vec<f64>>, TrainError> {
    debug_assert_eq!(training_rows.len(), training_scores.len());
    debug_assert_eq!(unlabeled_rows.len(), unlabeled_scores.len());
    let mut selected: Vec<Vec<f64>> = training_rows
        .iter()
        .zip(training_scores)
        .filter(|(_, &s)| s < cutoff)
        .map(|(row, _)| row.clone())
        .collect();
    selected.extend(
        unlabeled_rows
            .iter()
            .zip(unlabeled_scores)
            .filter(|(_, &s)| s < cutoff)
            .map(|(row, _)| row.clone()),
    );
    if selected.is_empty() {
        return Err(TrainError::DataSufficiency(
            "no sites below the specified score threshold were available for negative-model training; \
             consider using a positive-only modeling approach or adjusting the calibration-sensitivity threshold"
                .into(),
        ));
    }
    Ok(selected)
}

/// Score a subset with the read-time composition of a positive and a negative
/// scorer: combined(x) = positive(x) - negative(x). The composition is never
/// persisted.
fn combined_score(
    backend: &dyn ModelBackend,
    positive_scorer: &Path,
    negative_scorer: &Path,
    annotations_path: &Path,
) -> Result<Vec<f64>, TrainError> {
    let positive_file = tempfile::Builder::new()
        .prefix("annotrain.")
        .suffix(".scores.bin")
        .tempfile()?;
    let negative_file = tempfile::Builder::new()
        .prefix("annotrain.")
        .suffix(".scores.bin")
        .tempfile()?;
    backend.score(positive_scorer, annotations_path, positive_file.path())?;
    backend.score(negative_scorer, annotations_path, negative_file.path())?;
    let positive = store::read_scores(positive_file.path())?;
    let negative = store::read_scores(negative_file.path())?;
    if positive.len() != negative.len() {
        return Err(TrainError::BackendExecution(format!(
            "positive and negative scorers produced different score counts ({} vs {})",
            positive.len(),
            negative.len()
        )));
    }
    Ok(positive
        .iter()
        .zip(&negative)
        .map(|(p, n)| p - n)
        .collect())
}
