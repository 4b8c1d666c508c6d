//! Data loader stage
//!
//! Resolves a logical data path through the versioned repository, parses
//! it (CSV, or Parquet when the logical path ends in `.parquet`) and
//! writes it as CSV to the output path.

use crate::dataset::Dataset;
use crate::versioning::{DataResolver, VersionedRepo};
use crate::Result;
use std::path::{Path, PathBuf};

/// Outcome of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// File the content was read from
    pub source: PathBuf,
    /// Content digest when served from the cache
    pub md5: Option<String>,
    /// Rows written
    pub rows: usize,
    /// Columns written
    pub columns: usize,
}

/// Load `data_path` using the repository that contains the current
/// working directory.
///
/// # Errors
///
/// Returns resolution, integrity, parse or write errors
pub fn run(data_path: &str, output_path: &Path) -> Result<LoadReport> {
    let cwd = std::env::current_dir()?;
    run_with(&VersionedRepo::discover(&cwd), data_path, output_path)
}

/// Load `data_path` through an explicit resolver.
///
/// # Errors
///
/// Returns resolution, integrity, parse or write errors
pub fn run_with<R: DataResolver>(
    resolver: &R,
    data_path: &str,
    output_path: &Path,
) -> Result<LoadReport> {
    let resolved = resolver.resolve(data_path)?;
    let dataset = if is_parquet(data_path) {
        Dataset::read_parquet(&resolved.path)?
    } else {
        Dataset::read_csv(&resolved.path)?
    };

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    dataset.write_csv(output_path)?;

    let (rows, columns) = dataset.shape();
    tracing::info!(
        source = %resolved.path.display(),
        output = %output_path.display(),
        rows,
        columns,
        "loaded data"
    );
    Ok(LoadReport {
        source: resolved.path,
        md5: resolved.md5,
        rows,
        columns,
    })
}

fn is_parquet(logical_path: &str) -> bool {
    Path::new(logical_path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::REPO_DIR;
    use crate::Error;

    #[test]
    fn test_copies_workspace_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/raw.csv"), "a,target\n1,2\n3,4\n").unwrap();

        let repo = VersionedRepo::new(dir.path());
        let out = dir.path().join("out/extracted.csv");
        let report = run_with(&repo, "data/raw.csv", &out).unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(report.columns, 2);
        assert!(report.md5.is_none());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "a,target\n1,2\n3,4\n");
    }

    #[test]
    fn test_serves_tracked_file_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(REPO_DIR)).unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/raw.csv"), "a,target\n1,2\n").unwrap();

        let repo = VersionedRepo::new(dir.path());
        let md5 = repo.track("data/raw.csv").unwrap();
        std::fs::remove_file(dir.path().join("data/raw.csv")).unwrap();

        let out = dir.path().join("extracted.csv");
        let report = run_with(&repo, "data/raw.csv", &out).unwrap();
        assert_eq!(report.md5.as_deref(), Some(md5.as_str()));
        assert!(out.is_file());
    }

    #[test]
    fn test_unresolvable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = VersionedRepo::new(dir.path());
        let err = run_with(&repo, "data/missing.csv", &dir.path().join("o.csv")).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
        assert!(!dir.path().join("o.csv").exists());
    }

    #[test]
    fn test_parquet_detection() {
        assert!(is_parquet("data/raw.parquet"));
        assert!(is_parquet("data/RAW.PARQUET"));
        assert!(!is_parquet("data/raw.csv"));
    }
}
