// Variant types and the variant-type partitioner
//
// A separate model is trained per variant type. Types are always processed in
// CANONICAL_ORDER (SNP before INDEL) regardless of how the caller listed
// them, so multi-type runs are reproducible; duplicate requests collapse.

use clap::ValueEnum;

use crate::error::TrainError;

#[path = "variant_type_test.rs"]
mod variant_type_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum VariantType {
    Snp,
    Indel,
}

/// The order in which variant types are processed. This is a documented
/// contract, not an accident of enum declaration order.
pub const CANONICAL_ORDER: [VariantType; 2] = [VariantType::Snp, VariantType::Indel];

impl VariantType {
    /// Lowercase tag used in output file names.
    pub fn tag(&self) -> &'static str {
        match self {
            VariantType::Snp => "snp",
            VariantType::Indel => "indel",
        }
    }

    /// Uppercase name used in log and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            VariantType::Snp => "SNP",
            VariantType::Indel => "INDEL",
        }
    }
}

impl std::fmt::Display for VariantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Collapse duplicates and impose the canonical processing order on a
/// requested type list. An empty request is an input error.
pub fn resolve_types(requested: &[VariantType]) -> Result<Vec<VariantType>, TrainError> {
    if requested.is_empty() {
        return Err(TrainError::InputValidation(
            "at least one variant type must be requested".into(),
        ));
    }
    Ok(CANONICAL_ORDER
        .iter()
        .copied()
        .filter(|t| requested.contains(t))
        .collect())
}

/// Derive the per-type row mask from the `snp` label: the label itself for
/// SNP, its negation for INDEL.
pub fn type_mask(is_snp: &[bool], variant_type: VariantType) -> Vec<bool> {
    match variant_type {
        VariantType::Snp => is_snp.to_vec(),
        VariantType::Indel => is_snp.iter().map(|&b| !b).collect(),
    }
}

/// Element-wise AND of two masks of equal length.
pub fn intersect(a: &[bool], b: &[bool]) -> Vec<bool> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x && y).collect()
}

pub fn count_true(mask: &[bool]) -> usize {
    mask.iter().filter(|&&b| b).count()
}

/// Working masks for one variant type: training and calibration label masks
/// intersected with the type mask, plus their counts.
pub struct TypePartition {
    pub training: Vec<bool>,
    pub calibration: Vec<bool>,
    pub num_training: usize,
    pub num_calibration: usize,
}

/// Intersect the training/calibration labels with the variant-type mask.
/// A zero training count is fatal for the entire invocation; it does not
/// silently skip the type.
pub fn partition(
    is_training: &[bool],
    is_calibration: &[bool],
    is_snp: &[bool],
    variant_type: VariantType,
) -> Result<TypePartition, TrainError> {
    let of_type = type_mask(is_snp, variant_type);
    let training = intersect(is_training, &of_type);
    let calibration = intersect(is_calibration, &of_type);
    let num_training = count_true(&training);
    let num_calibration = count_true(&calibration);
    if num_training == 0 {
        return Err(TrainError::DataSufficiency(format!(
            "attempted to train {} model, but no suitable training sites were found in the provided annotations",
            variant_type
        )));
    }
    Ok(TypePartition {
        training,
        calibration,
        num_training,
        num_calibration,
    })
}
