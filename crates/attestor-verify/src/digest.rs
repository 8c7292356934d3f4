//! SHA-256 digests for attestation subjects.
//!
//! A blob subject may name a single file or a newline-separated list of
//! files. Its digest is taken over the concatenated file contents in sorted
//! path order, so a directory and the listing of its files hash the same.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use attestor_statement::Subject;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::VerificationError;

const BUF_SIZE: usize = 64 * 1024;

fn update_from_file(hasher: &mut Sha256, path: &Path) -> Result<(), VerificationError> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buf[..n]);
    }
}

/// Compute the SHA-256 hex digest of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 hex digest of a file without loading it whole.
pub fn sha256_file(path: &Path) -> Result<String, VerificationError> {
    let mut hasher = Sha256::new();
    update_from_file(&mut hasher, path)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Every regular file under `path`, sorted. A file path yields itself.
///
/// Symlinks are not followed.
pub fn list_files(path: &Path) -> Result<Vec<PathBuf>, VerificationError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| {
            VerificationError::IoError(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other(format!("cannot walk {}", path.display()))
            }))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Digest the concatenated contents of `paths`, expanding directories and
/// visiting files in sorted order.
pub fn digest_paths<P: AsRef<Path>>(paths: &[P]) -> Result<String, VerificationError> {
    let mut files = Vec::new();
    for path in paths {
        files.extend(list_files(path.as_ref())?);
    }
    files.sort();
    files.dedup();
    if files.is_empty() {
        return Err(VerificationError::MalformedInput(
            "no files to digest".to_owned(),
        ));
    }

    let mut hasher = Sha256::new();
    for file in &files {
        update_from_file(&mut hasher, file)?;
    }
    tracing::debug!(files = files.len(), "digested paths");
    Ok(hex::encode(hasher.finalize()))
}

/// Check that a file's digest matches the expected value.
pub fn check_file_digest(
    path: &Path,
    expected: &str,
    artifact_name: &str,
) -> Result<(), VerificationError> {
    let actual = sha256_file(path)?;
    if actual != expected {
        return Err(VerificationError::DigestMismatch {
            artifact: artifact_name.to_owned(),
            expected: expected.to_owned(),
            actual,
        });
    }
    Ok(())
}

/// Join a subject path onto `base_dir`, refusing anything that could leave it.
fn resolve_under(base_dir: &Path, name: &str) -> Result<PathBuf, VerificationError> {
    let relative = Path::new(name);
    let confined = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !confined {
        return Err(VerificationError::MalformedInput(format!(
            "subject path `{name}` is not relative to the base directory"
        )));
    }
    Ok(base_dir.join(relative))
}

/// Re-check each subject's SHA-256 against files under `base_dir`.
///
/// Returns one result per subject that carries a SHA-256 digest. Subject
/// names are resolved relative to `base_dir`, one path per line; absolute
/// paths and `..` components are rejected without touching the filesystem.
pub fn check_subjects(
    subjects: &[Subject],
    base_dir: &Path,
) -> Vec<(String, Result<(), VerificationError>)> {
    subjects
        .iter()
        .filter_map(|subject| {
            let expected = subject.digest.get("sha256")?;
            let paths: Result<Vec<PathBuf>, VerificationError> = subject
                .name
                .lines()
                .filter(|line| !line.is_empty())
                .map(|line| resolve_under(base_dir, line))
                .collect();
            let result = paths.and_then(|paths| digest_paths(&paths)).and_then(|actual| {
                if actual == expected {
                    Ok(())
                } else {
                    Err(VerificationError::DigestMismatch {
                        artifact: subject.name.clone(),
                        expected: expected.to_owned(),
                        actual,
                    })
                }
            });
            Some((subject.name.clone(), result))
        })
        .collect()
}
