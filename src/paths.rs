// Output-path derivation
//
// All file artifacts are namespaced by output prefix + variant-type tag +
// stage suffix. Deriving every path through these functions (rather than ad
// hoc string concatenation at each call site) keeps output naming
// deterministic and makes the scheme testable in isolation.

use std::path::PathBuf;

use crate::variant_type::VariantType;

#[path = "paths_test.rs"]
mod paths_test;

/// The three score files a training run may produce per variant type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreStage {
    Training,
    Calibration,
    Unlabeled,
}

impl ScoreStage {
    fn suffix(&self) -> &'static str {
        match self {
            ScoreStage::Training => "trainingScores.bin",
            ScoreStage::Calibration => "calibrationScores.bin",
            ScoreStage::Unlabeled => "unlabeledScores.bin",
        }
    }
}

/// Path of a score file: `<prefix>.<type>.<stage>Scores.bin`.
pub fn scores_path(output_prefix: &str, variant_type: VariantType, stage: ScoreStage) -> PathBuf {
    PathBuf::from(format!(
        "{}.{}.{}",
        output_prefix,
        variant_type.tag(),
        stage.suffix()
    ))
}

/// Path of a scorer artifact: `<prefix>.<type>[.negative]<backend suffix>`.
/// The backend suffix carries its own leading dot (e.g. ".scorer.json").
pub fn scorer_path(
    output_prefix: &str,
    variant_type: VariantType,
    negative: bool,
    backend_suffix: &str,
) -> PathBuf {
    let tag = if negative { ".negative" } else { "" };
    PathBuf::from(format!(
        "{}.{}{}{}",
        output_prefix,
        variant_type.tag(),
        tag,
        backend_suffix
    ))
}
