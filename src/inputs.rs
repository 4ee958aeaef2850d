use anyhow::{Context, Result};
use blake3::Hasher;
use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// One export snapshot found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ExportFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: i64,
    pub hash: String,
}

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Resolve configured paths, directories and globs to an ordered list of
/// export files.
///
/// Files are deduplicated by canonical path and sorted by path. Snapshot
/// exports carry a date stamp in their name, so this is oldest first.
pub fn discover(patterns: &[String]) -> Result<Vec<ExportFile>> {
    let mut found: BTreeMap<PathBuf, ExportFile> = BTreeMap::new();
    for pattern in patterns {
        let matched = expand(pattern)?;
        if matched.is_empty() {
            warn!(pattern = %pattern, "export path matched no files");
        }
        for path in matched {
            let path = fs::canonicalize(&path).unwrap_or(path);
            if found.contains_key(&path) {
                continue;
            }
            let file = describe(&path)?;
            debug!(path = %path.display(), size = file.size, hash = %file.hash, "found export");
            found.insert(path, file);
        }
    }
    Ok(found.into_values().collect())
}

pub fn paths(files: &[ExportFile]) -> Vec<PathBuf> {
    files.iter().map(|file| file.path.clone()).collect()
}

fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = expand_home(pattern);
    if path.is_file() {
        return Ok(vec![path]);
    }
    if path.is_dir() {
        return walk(&path, None);
    }
    if !pattern.contains(GLOB_META) {
        return Ok(Vec::new());
    }
    let (base, glob) = split_glob(&path);
    if !base.is_dir() {
        return Ok(Vec::new());
    }
    let mut builder = OverrideBuilder::new(&base);
    builder
        .add(&glob)
        .with_context(|| format!("invalid export glob {pattern}"))?;
    let matcher = builder
        .build()
        .with_context(|| format!("invalid export glob {pattern}"))?;
    walk(&base, Some(&matcher))
}

fn expand_home(pattern: &str) -> PathBuf {
    if let Some(rest) = pattern.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(pattern)
}

/// Longest directory prefix free of glob characters, and the rest of the
/// pattern relative to it.
fn split_glob(path: &Path) -> (PathBuf, String) {
    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    for component in path.components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !text.contains(GLOB_META) {
            base.push(component.as_os_str());
            continue;
        }
        if let Component::Normal(_) = component {
            rest.push(text.to_string());
        }
    }
    if base.as_os_str().is_empty() {
        base.push(".");
    }
    (base, rest.join("/"))
}

fn walk(root: &Path, matcher: Option<&Override>) -> Result<Vec<PathBuf>> {
    let walker = WalkBuilder::new(root)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .hidden(false)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                warn!("walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if let Some(matcher) = matcher {
            if !matcher.matched(path, false).is_whitelist() {
                continue;
            }
        }
        files.push(path.to_path_buf());
    }
    Ok(files)
}

fn describe(path: &Path) -> Result<ExportFile> {
    let metadata = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let hash = hash_file(path).with_context(|| format!("hash {}", path.display()))?;
    Ok(ExportFile {
        path: path.to_path_buf(),
        size: metadata.len(),
        modified,
        hash,
    })
}

fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}
