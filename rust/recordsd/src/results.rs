//! Per-user storage of exam result files.
//!
//! Layout: `results/<username>/<file>.pdf` next to `results/<username>/manifest.json`.
//! The manifest keeps class and exam names as separate fields, so the file name
//! is only a storage detail and never parsed back except for files written
//! before the manifest existed.

use crate::layout::RESULTS_MANIFEST;
use crate::store::{write_atomic, FlatFile, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const RESULT_EXT: &str = ".pdf";

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("invalid {field}: {value:?}")]
    InvalidName { field: &'static str, value: String },
    #[error("no result for class {class_name:?}, exam {exam_name:?}")]
    NotFound {
        class_name: String,
        exam_name: String,
    },
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResultsError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ResultsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn not_found(class_name: &str, exam_name: &str) -> Self {
        ResultsError::NotFound {
            class_name: class_name.to_string(),
            exam_name: exam_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub class_name: String,
    pub exam_name: String,
    pub file_name: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub uploaded_at: String,
}

impl ResultEntry {
    fn is_key(&self, class_name: &str, exam_name: &str) -> bool {
        self.class_name == class_name && self.exam_name == exam_name
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    entries: Vec<ResultEntry>,
}

/// Names become single path segments, so separators and dot-segments are refused.
pub fn check_name(field: &'static str, value: &str) -> Result<(), ResultsError> {
    let bad = value.trim().is_empty()
        || value == "."
        || value == ".."
        || value.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if bad {
        return Err(ResultsError::InvalidName {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn strip_pdf_suffix(file_name: &str) -> Option<&str> {
    let cut = file_name.len().checked_sub(RESULT_EXT.len())?;
    let suffix = file_name.get(cut..)?;
    if suffix.eq_ignore_ascii_case(RESULT_EXT) {
        file_name.get(..cut)
    } else {
        None
    }
}

pub fn is_pdf_name(file_name: &str) -> bool {
    strip_pdf_suffix(file_name).is_some()
}

/// A manifest `file_name` must be a visible PDF directly inside the user directory.
fn is_stored_file_name(file_name: &str) -> bool {
    check_name("fileName", file_name).is_ok()
        && !file_name.starts_with('.')
        && is_pdf_name(file_name)
}

/// `{class}_{exam}.pdf`, split on the last underscore: class names may contain
/// underscores, exam names written this way cannot.
pub fn split_legacy_file_name(file_name: &str) -> Option<(String, String)> {
    let stem = strip_pdf_suffix(file_name)?;
    let (class_name, exam_name) = stem.rsplit_once('_')?;
    if class_name.is_empty() || exam_name.is_empty() {
        return None;
    }
    Some((class_name.to_string(), exam_name.to_string()))
}

fn sort_entries(entries: &mut [ResultEntry]) {
    entries.sort_by(|a, b| {
        (a.class_name.as_str(), a.exam_name.as_str())
            .cmp(&(b.class_name.as_str(), b.exam_name.as_str()))
    });
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
pub struct ResultArea {
    root: PathBuf,
}

impl ResultArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ResultArea { root: root.into() }
    }

    fn user_dir(&self, username: &str) -> Result<PathBuf, ResultsError> {
        check_name("username", username)?;
        Ok(self.root.join(username))
    }

    fn manifest(dir: &Path) -> FlatFile<Manifest> {
        FlatFile::new(dir.join(RESULTS_MANIFEST))
    }

    fn store_entries(dir: &Path, mut entries: Vec<ResultEntry>) -> Result<(), ResultsError> {
        sort_entries(&mut entries);
        Self::manifest(dir).save(&Manifest { entries })?;
        Ok(())
    }

    /// Manifest entries reconciled with what is actually in the directory:
    /// entries whose file vanished or that name anything but a PDF in `dir`
    /// are dropped, stray PDFs are adopted.
    fn load_entries(&self, dir: &Path) -> Result<Vec<ResultEntry>, ResultsError> {
        let mut entries = Self::manifest(dir).load()?.entries;
        let before = entries.len();
        entries.retain(|e| {
            if !is_stored_file_name(&e.file_name) {
                tracing::warn!(dir = %dir.display(), file = %e.file_name, "dropping manifest entry outside the user directory");
                return false;
            }
            dir.join(&e.file_name).is_file()
        });
        let mut changed = entries.len() != before;

        let listing = match fs::read_dir(dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(ResultsError::io(dir, e)),
        };
        let mut strays: Vec<String> = Vec::new();
        for ent in listing {
            let ent = ent.map_err(|e| ResultsError::io(dir, e))?;
            let Some(name) = ent.file_name().to_str().map(|s| s.to_string()) else {
                continue;
            };
            if !is_pdf_name(&name) || !ent.path().is_file() {
                continue;
            }
            if entries.iter().any(|e| e.file_name == name) {
                continue;
            }
            strays.push(name);
        }
        strays.sort();

        for name in strays {
            let Some((class_name, exam_name)) = split_legacy_file_name(&name) else {
                tracing::warn!(dir = %dir.display(), file = %name, "skipping result file with no class/exam separator");
                continue;
            };
            if entries.iter().any(|e| e.is_key(&class_name, &exam_name)) {
                continue;
            }
            let path = dir.join(&name);
            let bytes = fs::read(&path).map_err(|e| ResultsError::io(&path, e))?;
            let uploaded_at = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                .unwrap_or_default();
            tracing::info!(dir = %dir.display(), file = %name, "adopted result file missing from manifest");
            entries.push(ResultEntry {
                class_name,
                exam_name,
                file_name: name,
                size_bytes: bytes.len() as u64,
                sha256: sha256_hex(&bytes),
                uploaded_at,
            });
            changed = true;
        }

        if changed {
            sort_entries(&mut entries);
            Self::store_entries(dir, entries.clone())?;
        }
        Ok(entries)
    }

    /// Writes the blob for (class, exam), replacing any earlier upload with the same key.
    pub fn save(
        &self,
        username: &str,
        class_name: &str,
        exam_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, ResultsError> {
        check_name("className", class_name)?;
        check_name("examName", exam_name)?;
        let dir = self.user_dir(username)?;
        fs::create_dir_all(&dir).map_err(|e| ResultsError::io(&dir, e))?;

        let mut entries = self.load_entries(&dir)?;
        let file_name = match entries.iter().find(|e| e.is_key(class_name, exam_name)) {
            Some(existing) => existing.file_name.clone(),
            None => {
                let plain = format!("{}_{}{}", class_name, exam_name, RESULT_EXT);
                if entries.iter().any(|e| e.file_name == plain) {
                    // Same flattened name, different key: `a_b`+`c` versus `a`+`b_c`.
                    let tag = Uuid::new_v4().simple().to_string();
                    format!("{}_{}-{}{}", class_name, exam_name, &tag[..8], RESULT_EXT)
                } else {
                    plain
                }
            }
        };

        let path = dir.join(&file_name);
        write_atomic(&path, bytes)?;

        entries.retain(|e| !e.is_key(class_name, exam_name));
        entries.push(ResultEntry {
            class_name: class_name.to_string(),
            exam_name: exam_name.to_string(),
            file_name,
            size_bytes: bytes.len() as u64,
            sha256: sha256_hex(bytes),
            uploaded_at: Utc::now().to_rfc3339(),
        });
        Self::store_entries(&dir, entries)?;

        tracing::info!(
            user = username,
            class = class_name,
            exam = exam_name,
            size = bytes.len(),
            "stored result file"
        );
        Ok(path)
    }

    pub fn list(&self, username: &str) -> Result<Vec<ResultEntry>, ResultsError> {
        let dir = self.user_dir(username)?;
        self.load_entries(&dir)
    }

    pub fn read(
        &self,
        username: &str,
        class_name: &str,
        exam_name: &str,
    ) -> Result<Vec<u8>, ResultsError> {
        let dir = self.user_dir(username)?;
        let entries = self.load_entries(&dir)?;
        let entry = entries
            .iter()
            .find(|e| e.is_key(class_name, exam_name))
            .ok_or_else(|| ResultsError::not_found(class_name, exam_name))?;
        let path = dir.join(&entry.file_name);
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResultsError::not_found(class_name, exam_name),
            _ => ResultsError::io(&path, e),
        })
    }

    /// True if a file existed and was removed.
    pub fn delete(
        &self,
        username: &str,
        class_name: &str,
        exam_name: &str,
    ) -> Result<bool, ResultsError> {
        let dir = self.user_dir(username)?;
        let mut entries = self.load_entries(&dir)?;
        let Some(idx) = entries.iter().position(|e| e.is_key(class_name, exam_name)) else {
            return Ok(false);
        };
        let entry = entries.remove(idx);
        let path = dir.join(&entry.file_name);
        let removed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(ResultsError::io(&path, e)),
        };
        Self::store_entries(&dir, entries)?;
        if removed {
            tracing::info!(user = username, class = class_name, exam = exam_name, "deleted result file");
        }
        Ok(removed)
    }

    pub fn exams(&self, username: &str) -> Result<Vec<String>, ResultsError> {
        let exams: BTreeSet<String> = self
            .list(username)?
            .into_iter()
            .map(|e| e.exam_name)
            .collect();
        Ok(exams.into_iter().collect())
    }

    pub fn classes_for_exam(
        &self,
        username: &str,
        exam_name: &str,
    ) -> Result<Vec<String>, ResultsError> {
        let classes: BTreeSet<String> = self
            .list(username)?
            .into_iter()
            .filter(|e| e.exam_name == exam_name)
            .map(|e| e.class_name)
            .collect();
        Ok(classes.into_iter().collect())
    }
}
