use crate::layout::{RESULTS_DIR, RESULTS_MANIFEST, STUDENTS_FILE, USERS_FILE};
use anyhow::{anyhow, bail, Context};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const STUDENTS_ENTRY: &str = "data/students.json";
const USERS_ENTRY: &str = "data/users.json";
pub const BUNDLE_FORMAT_V1: &str = "recordsd-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub entry_count: usize,
    pub users_added: usize,
}

enum Restore {
    Copy(usize),
    Bytes(Vec<u8>),
}

fn collect_result_files(results_root: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    if !results_root.is_dir() {
        return Ok(out);
    }
    for user in std::fs::read_dir(results_root)
        .with_context(|| format!("failed to list {}", results_root.to_string_lossy()))?
    {
        let user = user?;
        let user_path = user.path();
        if !user_path.is_dir() {
            continue;
        }
        let Some(user_name) = user.file_name().to_str().map(|s| s.to_string()) else {
            continue;
        };
        for ent in std::fs::read_dir(&user_path)
            .with_context(|| format!("failed to list {}", user_path.to_string_lossy()))?
        {
            let ent = ent?;
            let p = ent.path();
            if !p.is_file() {
                continue;
            }
            let Some(name) = ent.file_name().to_str().map(|s| s.to_string()) else {
                continue;
            };
            // In-flight temp files from an interrupted write.
            if name.starts_with('.') {
                continue;
            }
            out.push((format!("{}/{}/{}", RESULTS_DIR, user_name, name), p));
        }
    }
    out.sort();
    Ok(out)
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if !workspace_path.is_dir() {
        return Err(anyhow!(
            "workspace not found: {}",
            workspace_path.to_string_lossy()
        ));
    }

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for (entry, file) in [(STUDENTS_ENTRY, STUDENTS_FILE), (USERS_ENTRY, USERS_FILE)] {
        let p = workspace_path.join(file);
        if p.is_file() {
            files.push((entry.to_string(), p));
        }
    }
    files.extend(collect_result_files(&workspace_path.join(RESULTS_DIR))?);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "entries": files.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, path) in &files {
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", name))?;
        let mut src = File::open(path)
            .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
        std::io::copy(&mut src, &mut zip).with_context(|| format!("failed to write entry {}", name))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: files.len() + 1,
    })
}

fn plain_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}

/// Workspace-relative destination for a bundle entry, or None if the entry
/// does not belong in a workspace.
fn entry_target(name: &str) -> Option<PathBuf> {
    match name {
        STUDENTS_ENTRY => return Some(PathBuf::from(STUDENTS_FILE)),
        USERS_ENTRY => return Some(PathBuf::from(USERS_FILE)),
        _ => {}
    }
    let parts: Vec<&str> = name.split('/').collect();
    match parts.as_slice() {
        [dir, user, file] if *dir == RESULTS_DIR && plain_segment(user) && plain_segment(file) => {
            Some(PathBuf::from(RESULTS_DIR).join(user).join(file))
        }
        _ => None,
    }
}

fn read_entry(archive: &mut ZipArchive<File>, index: usize) -> anyhow::Result<Vec<u8>> {
    let mut entry = archive.by_index(index).context("failed to reopen bundle entry")?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read bundle entry {}", entry.name()))?;
    Ok(bytes)
}

fn read_local_json(path: &Path) -> anyhow::Result<Option<serde_json::Value>> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .with_context(|| format!("{} is invalid JSON", path.to_string_lossy())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.to_string_lossy())),
    }
}

/// Local credentials win: only usernames the workspace does not know yet are added.
fn merge_users(bundled: &[u8], local_path: &Path) -> anyhow::Result<(Vec<u8>, usize)> {
    let bundled: BTreeMap<String, String> =
        serde_json::from_slice(bundled).context("bundled users.json is invalid")?;
    let mut users: BTreeMap<String, String> = match read_local_json(local_path)? {
        Some(v) => serde_json::from_value(v)
            .with_context(|| format!("{} is not a user table", local_path.to_string_lossy()))?,
        None => BTreeMap::new(),
    };

    let mut added = 0;
    for (username, password) in bundled {
        if !plain_segment(&username) {
            tracing::warn!(user = %username, "skipping bundled user with an invalid name");
            continue;
        }
        if users.contains_key(&username) {
            continue;
        }
        users.insert(username, password);
        added += 1;
    }
    let bytes = serde_json::to_vec_pretty(&users).context("failed to serialize users")?;
    Ok((bytes, added))
}

fn entry_file_name(entry: &serde_json::Value) -> Option<&str> {
    entry.get("file_name").and_then(|v| v.as_str())
}

fn entry_key(entry: &serde_json::Value) -> (Option<&str>, Option<&str>) {
    (
        entry.get("class_name").and_then(|v| v.as_str()),
        entry.get("exam_name").and_then(|v| v.as_str()),
    )
}

/// Rebuilds a bundled results manifest: only entries naming a PDF shipped in
/// the same user's directory survive, and local entries for other files are kept.
fn merge_results_manifest(
    bundled: &[u8],
    user: &str,
    bundle_names: &BTreeSet<String>,
    local_path: &Path,
) -> anyhow::Result<Vec<u8>> {
    let bundled: serde_json::Value = serde_json::from_slice(bundled)
        .with_context(|| format!("bundled manifest for {} is invalid", user))?;
    let imported: Vec<serde_json::Value> = bundled
        .get("entries")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter(|e| {
            entry_file_name(e).is_some_and(|f| {
                plain_segment(f)
                    && !f.starts_with('.')
                    && f.to_ascii_lowercase().ends_with(".pdf")
                    && bundle_names.contains(&format!("{}/{}/{}", RESULTS_DIR, user, f))
            })
        })
        .cloned()
        .collect();

    let local: Vec<serde_json::Value> = read_local_json(local_path)?
        .as_ref()
        .and_then(|v| v.get("entries"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let mut entries: Vec<serde_json::Value> = local
        .into_iter()
        .filter(|l| {
            !imported
                .iter()
                .any(|i| entry_file_name(i) == entry_file_name(l) || entry_key(i) == entry_key(l))
        })
        .collect();
    entries.extend(imported);

    serde_json::to_vec_pretty(&json!({ "entries": entries }))
        .context("failed to serialize results manifest")
}

pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        bail!("not a workspace bundle: {}", in_path.to_string_lossy());
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    // Check every entry before touching the workspace.
    let mut targets: Vec<(usize, String, PathBuf)> = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).context("failed to read bundle entry")?;
        if entry.is_dir() || entry.name() == MANIFEST_ENTRY {
            continue;
        }
        let Some(rel) = entry_target(entry.name()) else {
            bail!("unexpected bundle entry: {}", entry.name());
        };
        targets.push((i, entry.name().to_string(), rel));
    }
    let bundle_names: BTreeSet<String> =
        targets.iter().map(|(_, name, _)| name.clone()).collect();

    let mut users_added = 0;
    let mut plan: Vec<(PathBuf, Restore)> = Vec::new();
    for (i, name, rel) in targets {
        let local = workspace_path.join(&rel);
        let restore = if name == USERS_ENTRY {
            let (bytes, added) = merge_users(&read_entry(&mut archive, i)?, &local)?;
            users_added = added;
            Restore::Bytes(bytes)
        } else if let [RESULTS_DIR, user, RESULTS_MANIFEST] =
            name.split('/').collect::<Vec<_>>().as_slice()
        {
            let bundled = read_entry(&mut archive, i)?;
            Restore::Bytes(merge_results_manifest(&bundled, user, &bundle_names, &local)?)
        } else {
            Restore::Copy(i)
        };
        plan.push((rel, restore));
    }

    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;

    for (rel, restore) in &plan {
        let dst = workspace_path.join(rel);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
        let tmp_dst = dst.with_extension("importing");
        let mut out = File::create(&tmp_dst).with_context(|| {
            format!("failed to create temp file {}", tmp_dst.to_string_lossy())
        })?;
        match restore {
            Restore::Copy(i) => {
                let mut entry = archive.by_index(*i).context("failed to reopen bundle entry")?;
                std::io::copy(&mut entry, &mut out)
                    .with_context(|| format!("failed to extract {}", rel.to_string_lossy()))?;
            }
            Restore::Bytes(bytes) => out
                .write_all(bytes)
                .with_context(|| format!("failed to write {}", rel.to_string_lossy()))?,
        }
        out.flush().context("failed to flush extracted file")?;
        drop(out);
        std::fs::rename(&tmp_dst, &dst).with_context(|| {
            format!("failed to move extracted file to {}", dst.to_string_lossy())
        })?;
    }

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        entry_count: plan.len(),
        users_added,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
