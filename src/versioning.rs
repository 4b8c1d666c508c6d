//! Versioned data retrieval
//!
//! Resolves a logical data path to physical content the way a DVC
//! repository does:
//!
//! ```text
//! <root>/<path>                       workspace copy, used when present
//! <root>/<path>.dvc                   pointer file: outs[0].md5
//! <root>/.dvc/cache/files/md5/ab/cd…  content-addressed cache entry
//! ```
//!
//! The repository root is the nearest ancestor holding a `.dvc` directory.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the repository metadata directory
pub const REPO_DIR: &str = ".dvc";

/// Resolves logical data paths to readable files.
pub trait DataResolver {
    /// Locate the content of `logical_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] when nothing backs the path and
    /// [`Error::Integrity`] when cached content fails its digest check.
    fn resolve(&self, logical_path: &str) -> Result<ResolvedData>;
}

/// Where resolved content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedData {
    /// Physical file holding the content
    pub path: PathBuf,
    /// Digest from the pointer file, when the content came from the cache
    pub md5: Option<String>,
}

/// One tracked output in a pointer file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerOut {
    /// Hex md5 of the content
    pub md5: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// File name relative to the pointer file
    pub path: String,
}

/// Contents of a `<file>.dvc` pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerFile {
    /// Tracked outputs (a single entry for file pointers)
    pub outs: Vec<PointerOut>,
}

/// A data repository rooted at a directory.
#[derive(Debug, Clone)]
pub struct VersionedRepo {
    root: PathBuf,
}

impl VersionedRepo {
    /// Repository rooted exactly at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository containing `start`: the nearest ancestor with a `.dvc`
    /// directory, or `start` itself when there is none.
    #[must_use]
    pub fn discover(start: &Path) -> Self {
        let root = start
            .ancestors()
            .find(|dir| dir.join(REPO_DIR).is_dir())
            .unwrap_or(start);
        Self::new(root)
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache location of content with the given md5.
    #[must_use]
    pub fn cache_path(&self, md5: &str) -> PathBuf {
        let (prefix, rest) = fanout(md5);
        self.root
            .join(REPO_DIR)
            .join("cache")
            .join("files")
            .join("md5")
            .join(prefix)
            .join(rest)
    }

    fn legacy_cache_path(&self, md5: &str) -> PathBuf {
        let (prefix, rest) = fanout(md5);
        self.root.join(REPO_DIR).join("cache").join(prefix).join(rest)
    }

    /// Pointer file path for a logical path.
    #[must_use]
    pub fn pointer_path(&self, logical_path: &str) -> PathBuf {
        self.root.join(format!("{logical_path}.dvc"))
    }

    /// Record the workspace file at `logical_path`: copy it into the cache
    /// and write its pointer file. Returns the content digest.
    ///
    /// # Errors
    ///
    /// Returns error if the workspace file cannot be read or the cache
    /// and pointer cannot be written.
    pub fn track(&self, logical_path: &str) -> Result<String> {
        let workspace = self.root.join(logical_path);
        let bytes = std::fs::read(&workspace).map_err(|e| {
            Error::Resolution(format!("cannot track {}: {e}", workspace.display()))
        })?;
        let md5 = digest(&bytes);

        let cached = self.cache_path(&md5);
        if let Some(parent) = cached.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&cached, &bytes)?;

        let file_name = workspace
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| logical_path.to_string());
        let pointer = PointerFile {
            outs: vec![PointerOut {
                md5: md5.clone(),
                size: bytes.len() as u64,
                path: file_name,
            }],
        };
        let yaml = serde_yaml::to_string(&pointer)
            .map_err(|e| Error::Other(format!("cannot encode pointer file: {e}")))?;
        std::fs::write(self.pointer_path(logical_path), yaml)?;

        tracing::info!(path = logical_path, md5 = %md5, "tracked data file");
        Ok(md5)
    }

    fn read_pointer(&self, logical_path: &str) -> Result<Option<PointerFile>> {
        let pointer_path = self.pointer_path(logical_path);
        if !pointer_path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&pointer_path)?;
        let pointer: PointerFile = serde_yaml::from_str(&text).map_err(|e| {
            Error::Resolution(format!(
                "malformed pointer file {}: {e}",
                pointer_path.display()
            ))
        })?;
        if let Some(bad) = pointer.outs.iter().find(|out| !is_md5(&out.md5)) {
            return Err(Error::Resolution(format!(
                "pointer file {} has invalid md5 {:?}",
                pointer_path.display(),
                bad.md5
            )));
        }
        Ok(Some(pointer))
    }
}

impl DataResolver for VersionedRepo {
    fn resolve(&self, logical_path: &str) -> Result<ResolvedData> {
        let workspace = self.root.join(logical_path);
        if workspace.is_file() {
            tracing::debug!(path = %workspace.display(), "resolved from workspace");
            return Ok(ResolvedData {
                path: workspace,
                md5: None,
            });
        }

        let pointer = self.read_pointer(logical_path)?.ok_or_else(|| {
            Error::Resolution(format!(
                "'{logical_path}' is neither in the workspace nor tracked under {}",
                self.root.display()
            ))
        })?;
        let out = pointer.outs.first().ok_or_else(|| {
            Error::Resolution(format!("pointer for '{logical_path}' lists no outputs"))
        })?;

        let cached = [self.cache_path(&out.md5), self.legacy_cache_path(&out.md5)]
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(|| {
                Error::Resolution(format!(
                    "'{logical_path}' (md5 {}) is missing from the cache",
                    out.md5
                ))
            })?;

        let actual = digest(&std::fs::read(&cached)?);
        if !actual.eq_ignore_ascii_case(&out.md5) {
            return Err(Error::Integrity {
                path: logical_path.to_string(),
                expected: out.md5.clone(),
                actual,
            });
        }

        tracing::debug!(path = %cached.display(), md5 = %actual, "resolved from cache");
        Ok(ResolvedData {
            path: cached,
            md5: Some(actual),
        })
    }
}

// Splits off the two-character cache directory; short or non-ASCII
// input lands in the cache root instead of panicking.
fn fanout(md5: &str) -> (&str, &str) {
    match (md5.get(..2), md5.get(2..)) {
        (Some(prefix), Some(rest)) => (prefix, rest),
        _ => ("", md5),
    }
}

/// Whether `value` is a 32-digit hex md5.
#[must_use]
pub fn is_md5(value: &str) -> bool {
    value.len() == 32 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Hex md5 of `bytes`.
#[must_use]
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}
