// Annotation store accessor
//
// Reads and writes the persisted annotation matrix, its boolean label
// vectors, and score files. Also extracts row subsets to fresh temporary
// stores immediately before each backend train/score call.
//
// Store layout (all integers little-endian):
//   magic    b"VANN"
//   version  u32 (currently 1)
//   F        u32   annotation count
//   N        u64   row count
//   L        u32   label count
//   names    F x { u32 length, UTF-8 bytes }
//   matrix   N x F x f64, row-major; NaN encodes a missing value
//   labels   L x { u32 length, UTF-8 name, N x u8 (0/1) }
//
// Score-file layout:
//   magic    b"VSCR"
//   version  u32 (currently 1)
//   N        u64
//   scores   N x f64
//
// Stores may be gzip-compressed; reads are transparently decompressed based
// on the `.gz` extension. Score files are always written uncompressed.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::TrainError;

#[path = "store_test.rs"]
mod store_test;

pub const STORE_MAGIC: &[u8; 4] = b"VANN";
pub const SCORES_MAGIC: &[u8; 4] = b"VSCR";
pub const FORMAT_VERSION: u32 = 1;

/// Well-known label names in the primary annotation store.
pub const TRAINING_LABEL: &str = "training";
pub const CALIBRATION_LABEL: &str = "calibration";
pub const SNP_LABEL: &str = "snp";

/// In-memory view of an annotation store: ordered annotation names, a dense
/// row-major matrix, and named boolean label vectors of length `rows.len()`.
#[derive(Debug)]
pub struct AnnotationStore {
    pub annotation_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<(String, Vec<bool>)>,
}

impl AnnotationStore {
    /// Look up a label vector by name.
    pub fn label(&self, name: &str) -> Result<&[bool], TrainError> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| {
                TrainError::InputValidation(format!("label \"{}\" not found in annotation store", name))
            })
    }
}

/// Open a store for reading, transparently decompressing `.gz` files.
fn open_store(path: &Path) -> Result<Box<dyn Read>, TrainError> {
    let file = File::open(path).map_err(|e| {
        TrainError::InputValidation(format!("cannot read annotation store {}: {}", path.display(), e))
    })?;
    let reader = BufReader::with_capacity(1 << 20, file);
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(reader: &mut impl Read) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_string(reader: &mut impl Read) -> std::io::Result<String> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "non-UTF-8 name"))
}

/// A short read while parsing an annotation store means the source itself is
/// unusable, so it is classified as an input error naming the file.
fn store_read_error(path: &Path, e: std::io::Error) -> TrainError {
    TrainError::InputValidation(format!(
        "truncated or corrupt annotation store {}: {}",
        path.display(),
        e
    ))
}

/// A short read while parsing a score file means the backend produced an
/// ill-shaped output, so it is classified as a backend-execution error.
fn scores_read_error(path: &Path, e: std::io::Error) -> TrainError {
    TrainError::BackendExecution(format!(
        "ill-shaped score file {}: {}",
        path.display(),
        e
    ))
}

fn check_magic(reader: &mut impl Read, expected: &[u8; 4], path: &Path) -> Result<(), TrainError> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| store_read_error(path, e))?;
    if &magic != expected {
        return Err(TrainError::InputValidation(format!(
            "{} is not a recognized file (bad magic)",
            path.display()
        )));
    }
    let version = read_u32(reader).map_err(|e| store_read_error(path, e))?;
    if version != FORMAT_VERSION {
        return Err(TrainError::InputValidation(format!(
            "{} has unsupported format version {}",
            path.display(),
            version
        )));
    }
    Ok(())
}

/// Read only the ordered annotation-name list from a store.
pub fn read_annotation_names(path: &Path) -> Result<Vec<String>, TrainError> {
    let mut reader = open_store(path)?;
    check_magic(&mut reader, STORE_MAGIC, path)?;
    read_header_names(&mut reader).map_err(|e| store_read_error(path, e))
}

fn read_header_names(reader: &mut impl Read) -> std::io::Result<Vec<String>> {
    let num_annotations = read_u32(reader)? as usize;
    let _num_rows = read_u64(reader)?;
    let _num_labels = read_u32(reader)?;
    let mut names = Vec::with_capacity(num_annotations);
    for _ in 0..num_annotations {
        names.push(read_string(reader)?);
    }
    Ok(names)
}

/// Read a complete store: names, matrix, and label vectors.
pub fn read_store(path: &Path) -> Result<AnnotationStore, TrainError> {
    let mut reader = open_store(path)?;
    check_magic(&mut reader, STORE_MAGIC, path)?;
    read_store_body(&mut reader).map_err(|e| store_read_error(path, e))
}

fn read_store_body(reader: &mut impl Read) -> std::io::Result<AnnotationStore> {
    let num_annotations = read_u32(reader)? as usize;
    let num_rows = read_u64(reader)? as usize;
    let num_labels = read_u32(reader)? as usize;

    let mut annotation_names = Vec::with_capacity(num_annotations);
    for _ in 0..num_annotations {
        annotation_names.push(read_string(reader)?);
    }

    let mut rows = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let mut row = Vec::with_capacity(num_annotations);
        for _ in 0..num_annotations {
            row.push(read_f64(reader)?);
        }
        rows.push(row);
    }

    let mut labels = Vec::with_capacity(num_labels);
    for _ in 0..num_labels {
        let name = read_string(reader)?;
        let mut bytes = vec![0u8; num_rows];
        reader.read_exact(&mut bytes)?;
        labels.push((name, bytes.into_iter().map(|b| b != 0).collect()));
    }

    Ok(AnnotationStore {
        annotation_names,
        rows,
        labels,
    })
}

/// Write a store. Every row must have exactly `annotation_names.len()` values
/// and every label vector must have exactly `rows.len()` entries.
pub fn write_store(
    path: &Path,
    annotation_names: &[String],
    rows: &[Vec<f64>],
    labels: &[(String, Vec<bool>)],
) -> Result<(), TrainError> {
    debug_assert!(rows.iter().all(|r| r.len() == annotation_names.len()));
    debug_assert!(labels.iter().all(|(_, v)| v.len() == rows.len()));

    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(1 << 20, file);
    writer.write_all(STORE_MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(annotation_names.len() as u32).to_le_bytes())?;
    writer.write_all(&(rows.len() as u64).to_le_bytes())?;
    writer.write_all(&(labels.len() as u32).to_le_bytes())?;
    for name in annotation_names {
        writer.write_all(&(name.len() as u32).to_le_bytes())?;
        writer.write_all(name.as_bytes())?;
    }
    for row in rows {
        for value in row {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    for (name, mask) in labels {
        writer.write_all(&(name.len() as u32).to_le_bytes())?;
        writer.write_all(name.as_bytes())?;
        let bytes: Vec<u8> = mask.iter().map(|&b| b as u8).collect();
        writer.write_all(&bytes)?;
    }
    writer.flush()?;
    Ok(())
}

/// Extract the rows selected by `mask`, preserving input order.
pub fn subset_rows(rows: &[Vec<f64>], mask: &[bool]) -> Vec<Vec<f64>> {
    debug_assert_eq!(rows.len(), mask.len());
    rows.iter()
        .zip(mask)
        .filter(|(_, &keep)| keep)
        .map(|(row, _)| row.clone())
        .collect()
}

/// Write the rows selected by `mask` to a fresh temporary store with no
/// labels. The returned handle owns the file; it is deleted on drop, so the
/// caller must keep it alive across the backend call that consumes it.
pub fn subset_to_temp_file(
    annotation_names: &[String],
    rows: &[Vec<f64>],
    mask: &[bool],
) -> Result<tempfile::NamedTempFile, TrainError> {
    let subset = subset_rows(rows, mask);
    rows_to_temp_file(annotation_names, &subset)
}

/// Write an already-materialized matrix to a fresh temporary store.
pub fn rows_to_temp_file(
    annotation_names: &[String],
    rows: &[Vec<f64>],
) -> Result<tempfile::NamedTempFile, TrainError> {
    let file = tempfile::Builder::new()
        .prefix("annotrain.")
        .suffix(".ann")
        .tempfile()?;
    write_store(file.path(), annotation_names, rows, &[])?;
    Ok(file)
}

/// Read an ordered score vector.
pub fn read_scores(path: &Path) -> Result<Vec<f64>, TrainError> {
    let file = File::open(path).map_err(|e| {
        TrainError::BackendExecution(format!("cannot read score file {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| scores_read_error(path, e))?;
    if &magic != SCORES_MAGIC {
        return Err(TrainError::BackendExecution(format!(
            "{} is not a recognized score file (bad magic)",
            path.display()
        )));
    }
    let version = read_u32(&mut reader).map_err(|e| scores_read_error(path, e))?;
    if version != FORMAT_VERSION {
        return Err(TrainError::BackendExecution(format!(
            "{} has unsupported score-file version {}",
            path.display(),
            version
        )));
    }
    let n = read_u64(&mut reader).map_err(|e| scores_read_error(path, e))? as usize;
    let mut scores = Vec::with_capacity(n);
    for _ in 0..n {
        scores.push(read_f64(&mut reader).map_err(|e| scores_read_error(path, e))?);
    }
    Ok(scores)
}

/// Write an ordered score vector.
pub fn write_scores(path: &Path, scores: &[f64]) -> Result<(), TrainError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(SCORES_MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(scores.len() as u64).to_le_bytes())?;
    for score in scores {
        writer.write_all(&score.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}
