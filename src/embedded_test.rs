// Tests for src/embedded.rs

#[cfg(test)]
mod tests {
    use crate::backend::ModelBackend;
    use crate::embedded::{EmbeddedGaussianModel, GaussianScorer};
    use crate::error::TrainError;
    use crate::store;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn write_training_store(dir: &Path, rows: &[Vec<f64>]) -> PathBuf {
        let path = dir.join("train.ann");
        let names = vec!["a".to_string(), "b".to_string()];
        store::write_store(&path, &names, rows, &[]).unwrap();
        path
    }

    #[test]
    fn test_train_then_score_preserves_row_count_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            vec![1.0, 10.0],
            vec![2.0, 20.0],
            vec![3.0, 30.0],
            vec![100.0, -5.0],
        ];
        let train_path = write_training_store(dir.path(), &rows);
        let scorer_path = dir.path().join("model.scorer.json");
        let scores_path = dir.path().join("scores.bin");

        let backend = EmbeddedGaussianModel::new(None).unwrap();
        backend.train(&train_path, &scorer_path).unwrap();
        backend.score(&scorer_path, &train_path, &scores_path).unwrap();

        let scores = store::read_scores(&scores_path).unwrap();
        assert_eq!(scores.len(), rows.len());

        // The outlier row should look less like the training density than the
        // clustered rows; lower score = more anomalous.
        assert!(scores[3] < scores[1]);

        // Scoring per row must match scoring the file, index for index.
        let scorer = GaussianScorer::deserialize(&scorer_path).unwrap();
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(scores[i], scorer.score_row(row));
        }
    }

    #[test]
    fn test_training_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let train_path = write_training_store(dir.path(), &rows);
        let backend = EmbeddedGaussianModel::new(None).unwrap();

        let first = dir.path().join("first.scorer.json");
        let second = dir.path().join("second.scorer.json");
        backend.train(&train_path, &first).unwrap();
        backend.train(&train_path, &second).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_missing_values_are_imputed_with_training_median() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        let train_path = write_training_store(dir.path(), &rows);
        let scorer_path = dir.path().join("model.scorer.json");
        let backend = EmbeddedGaussianModel::new(None).unwrap();
        backend.train(&train_path, &scorer_path).unwrap();

        let scorer = GaussianScorer::deserialize(&scorer_path).unwrap();
        // Median of column 0 is 2.0: a missing value must score exactly as
        // the median would.
        assert_eq!(
            scorer.score_row(&[f64::NAN, 5.0]),
            scorer.score_row(&[2.0, 5.0])
        );
    }

    #[test]
    fn test_zero_variance_column_still_trains() {
        let dir = tempfile::tempdir().unwrap();
        // Column "b" is constant; the variance floor keeps densities finite.
        let rows = vec![vec![1.0, 7.0], vec![2.0, 7.0], vec![3.0, 7.0]];
        let train_path = write_training_store(dir.path(), &rows);
        let scorer_path = dir.path().join("model.scorer.json");
        let scores_path = dir.path().join("scores.bin");
        let backend = EmbeddedGaussianModel::new(None).unwrap();
        backend.train(&train_path, &scorer_path).unwrap();
        backend.score(&scorer_path, &train_path, &scores_path).unwrap();
        let scores = store::read_scores(&scores_path).unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_annotation_name_mismatch_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![vec![1.0, 2.0]];
        let train_path = write_training_store(dir.path(), &rows);
        let scorer_path = dir.path().join("model.scorer.json");
        let backend = EmbeddedGaussianModel::new(None).unwrap();
        backend.train(&train_path, &scorer_path).unwrap();

        let other = dir.path().join("other.ann");
        let other_names = vec!["x".to_string(), "y".to_string()];
        store::write_store(&other, &other_names, &rows, &[]).unwrap();
        let result = backend.score(&scorer_path, &other, &dir.path().join("scores.bin"));
        assert!(matches!(result, Err(TrainError::BackendExecution(_))));
    }

    #[test]
    fn test_malformed_artifact_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![vec![1.0, 2.0]];
        let train_path = write_training_store(dir.path(), &rows);
        let scorer_path = dir.path().join("model.scorer.json");
        fs::write(&scorer_path, b"{ not json").unwrap();
        let backend = EmbeddedGaussianModel::new(None).unwrap();
        let result = backend.score(&scorer_path, &train_path, &dir.path().join("scores.bin"));
        assert!(matches!(result, Err(TrainError::BackendExecution(_))));
    }

    #[test]
    fn test_hyperparameters_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyperparameters.json");
        fs::write(&path, br#"{"variance_floor": 0.5}"#).unwrap();
        // A large floor flattens the density of a tight column; just check
        // the file is accepted and training succeeds.
        let rows = vec![vec![1.0, 2.0], vec![1.1, 2.1]];
        let train_path = write_training_store(dir.path(), &rows);
        let backend = EmbeddedGaussianModel::new(Some(&path)).unwrap();
        backend
            .train(&train_path, &dir.path().join("model.scorer.json"))
            .unwrap();
    }

    #[test]
    fn test_malformed_hyperparameters_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyperparameters.json");
        fs::write(&path, b"nope").unwrap();
        assert!(matches!(
            EmbeddedGaussianModel::new(Some(&path)),
            Err(TrainError::InputValidation(_))
        ));
    }
}
