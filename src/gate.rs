//! Idempotent gate - artifact existence is the only completion signal
//!
//! Stages check their output artifact before doing any work and only ever
//! produce that artifact by renaming a finished sibling into place, so an
//! interrupted run never leaves something the gate would mistake for done.

use crate::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// True when the artifact is present and the item must be skipped
pub fn is_done(artifact: &Path) -> bool {
    artifact.exists()
}

/// Hidden sibling used while an artifact is being produced:
/// `dir/name.db` becomes `dir/.name.partial.db`. The extension stays last
/// because tools pick their output format from it.
pub fn partial_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match artifact.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    artifact.with_file_name(name)
}

/// Make sure the artifact's parent directory exists
pub fn ensure_parent(artifact: &Path) -> Result<()> {
    if let Some(parent) = artifact.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write `bytes` to `artifact` through a partial sibling and a rename.
pub fn write_atomic(artifact: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(artifact)?;
    let partial = partial_path(artifact);
    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&partial)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&partial, artifact)?;
        Ok(())
    })();
    if result.is_err() {
        discard(&partial);
    }
    result
}

/// Promote a finished partial artifact (file or directory) into place
pub fn promote(partial: &Path, artifact: &Path) -> Result<()> {
    fs::rename(partial, artifact)?;
    Ok(())
}

/// Remove a leftover partial artifact; missing paths are fine
pub fn discard(partial: &Path) {
    let result = if partial.is_dir() {
        fs::remove_dir_all(partial)
    } else {
        fs::remove_file(partial)
    };
    if let Err(e) = result {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %partial.display(), error = %e, "could not remove partial artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        let partial = partial_path(Path::new("/data/apache/kafka.db"));
        assert_eq!(partial, PathBuf::from("/data/apache/.kafka.partial.db"));
        assert_eq!(partial.extension().unwrap(), "db");
    }

    #[test]
    fn test_partial_path_without_extension() {
        let partial = partial_path(Path::new("lists/valid"));
        assert_eq!(partial, PathBuf::from("lists/.valid.partial"));
    }

    #[test]
    fn test_write_atomic_creates_parents_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("owner/repo.json");

        write_atomic(&artifact, b"{}").unwrap();

        assert!(is_done(&artifact));
        assert_eq!(fs::read(&artifact).unwrap(), b"{}");
        assert!(!partial_path(&artifact).exists());
    }

    #[test]
    fn test_discard_handles_dirs_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join(".repo.partial.git");
        fs::create_dir_all(partial.join("objects")).unwrap();

        discard(&partial);
        assert!(!partial.exists());
        discard(&partial);
    }
}
