//! Dataset, versioning and stage integration tests

use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use trueno_pipeline::dataset::{reference, Dataset, DatasetSchema};
use trueno_pipeline::stages::{load_data, preprocess};
use trueno_pipeline::versioning::{digest, DataResolver, VersionedRepo, REPO_DIR};
use trueno_pipeline::Error;

fn repo(dir: &Path) -> VersionedRepo {
    std::fs::create_dir_all(dir.join(REPO_DIR)).unwrap();
    VersionedRepo::new(dir)
}

#[test]
fn test_reference_dataset_shape() {
    let dataset = reference::diabetes().unwrap();
    assert_eq!(dataset.shape(), (442, 11));

    let schema = DatasetSchema::infer(&dataset, "target").unwrap();
    assert_eq!(schema.features().len(), 10);
    assert_eq!(schema.features()[2], "bmi");

    let (_, target) = dataset.features_and_target(&schema).unwrap();
    assert!(target.iter().all(|t| (25.0..=346.0).contains(t)));
}

#[test]
fn test_materialize_overwrites_and_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let path = reference::materialize(dir.path()).unwrap();
    let first = std::fs::read(&path).unwrap();

    std::fs::write(&path, "stale").unwrap();
    reference::materialize(dir.path()).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn test_tracked_data_survives_workspace_removal() {
    let dir = tempfile::tempdir().unwrap();
    let repo = repo(dir.path());
    reference::materialize(dir.path()).unwrap();
    let original = std::fs::read(dir.path().join("data/raw_data.csv")).unwrap();

    let md5 = repo.track("data/raw_data.csv").unwrap();
    assert_eq!(md5, digest(&original));
    std::fs::remove_file(dir.path().join("data/raw_data.csv")).unwrap();

    let out = dir.path().join("extracted.csv");
    let report = load_data::run_with(&repo, "data/raw_data.csv", &out).unwrap();
    assert_eq!((report.rows, report.columns), (442, 11));
    assert_eq!(report.md5.as_deref(), Some(md5.as_str()));
}

#[test]
fn test_corrupted_cache_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let repo = repo(dir.path());
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/raw.csv"), "a,target\n1,2\n").unwrap();
    let md5 = repo.track("data/raw.csv").unwrap();
    std::fs::remove_file(dir.path().join("data/raw.csv")).unwrap();
    std::fs::write(repo.cache_path(&md5), "a,target\n9,9\n").unwrap();

    let err = repo.resolve("data/raw.csv").unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));
}

#[test]
fn test_parquet_source_written_as_csv() {
    let dir = tempfile::tempdir().unwrap();
    let source = Dataset::from_f64_columns(vec![
        ("x".to_string(), vec![1.0, 2.0, 3.0]),
        ("target".to_string(), vec![10.0, 20.0, 30.0]),
    ])
    .unwrap();

    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    let file = File::create(dir.path().join("data/raw.parquet")).unwrap();
    let mut writer = ArrowWriter::try_new(file, source.schema(), None).unwrap();
    writer.write(source.batch()).unwrap();
    writer.close().unwrap();

    let out = dir.path().join("extracted.csv");
    let report = load_data::run_with(&VersionedRepo::new(dir.path()), "data/raw.parquet", &out)
        .unwrap();
    assert_eq!((report.rows, report.columns), (3, 2));

    let loaded = Dataset::read_csv(&out).unwrap();
    assert_eq!(loaded.column_f64("target").unwrap(), vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_reference_split_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let raw = reference::materialize(dir.path()).unwrap();
    let train = dir.path().join("train.csv");
    let test = dir.path().join("test.csv");

    let report = preprocess::run(&raw, &train, &test).unwrap();
    assert_eq!((report.n_train, report.n_test), (353, 89));

    // Every input row lands in exactly one subset.
    let column = |path: &Path| Dataset::read_csv(path).unwrap().column_f64("bmi").unwrap();
    let mut combined = column(&train);
    combined.extend(column(&test));
    let mut expected = column(&raw);
    combined.sort_by(f64::total_cmp);
    expected.sort_by(f64::total_cmp);
    assert_eq!(combined, expected);
}
