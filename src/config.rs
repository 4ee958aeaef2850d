// Configuration for threadgraph
// Layers: defaults, then environment, then an optional YAML file; the CLI
// applies its own flags last.

use crate::cli::SourceArgs;
use crate::extract::{DEFAULT_PAGE_SIZE, ExtractOptions};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Paths, directories or globs of messenger exports (THREADGRAPH_EXPORT_PATH)
    pub export_paths: Vec<String>,

    /// Account owner's id, left out of participant lists (THREADGRAPH_FACEBOOK_ID)
    pub facebook_id: Option<String>,

    /// Message rows fetched per query (THREADGRAPH_PAGE_SIZE)
    pub page_size: usize,

    /// Hacker News dogsheep exports (THREADGRAPH_HACKERNEWS_PATH)
    pub hackernews_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_paths: Vec::new(),
            facebook_id: None,
            page_size: DEFAULT_PAGE_SIZE,
            hackernews_paths: Vec::new(),
        }
    }
}

/// On-disk YAML layout.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub fbmessenger: Option<MessengerSection>,
    #[serde(default)]
    pub hackernews: Option<HackernewsSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerSection {
    #[serde(default)]
    pub export_path: Option<PathList>,
    #[serde(default)]
    pub facebook_id: Option<Scalar>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HackernewsSection {
    #[serde(default)]
    pub export_path: Option<PathList>,
}

/// A single path or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathList {
    One(String),
    Many(Vec<String>),
}

impl PathList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            PathList::One(path) => vec![path],
            PathList::Many(paths) => paths,
        }
    }
}

/// Facebook ids are often written unquoted in YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(u64),
}

impl Scalar {
    pub fn into_string(self) -> String {
        match self {
            Scalar::Text(value) => value,
            Scalar::Number(value) => value.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env(|key| env::var(key).ok());
        config
    }

    /// Environment overlaid by `file`, when given.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_env();
        if let Some(path) = file {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let parsed: ConfigFile = serde_yaml_ng::from_str(&raw)
                .with_context(|| format!("parse config {}", path.display()))?;
            config.apply_file(parsed);
        }
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("THREADGRAPH_EXPORT_PATH") {
            self.export_paths = split_path_list(&val);
        }

        if let Some(val) = lookup("THREADGRAPH_FACEBOOK_ID") {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                self.facebook_id = Some(trimmed.to_string());
            }
        }

        if let Some(val) = lookup("THREADGRAPH_PAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(parsed) if parsed > 0 => self.page_size = parsed,
                _ => warn!(
                    "Invalid THREADGRAPH_PAGE_SIZE value: {}, using default: {}",
                    val, self.page_size
                ),
            }
        }

        if let Some(val) = lookup("THREADGRAPH_HACKERNEWS_PATH") {
            self.hackernews_paths = split_path_list(&val);
        }
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(section) = file.fbmessenger {
            if let Some(paths) = section.export_path {
                self.export_paths = paths.into_vec();
            }
            if let Some(id) = section.facebook_id {
                self.facebook_id = Some(id.into_string());
            }
            if let Some(page_size) = section.page_size.filter(|size| *size > 0) {
                self.page_size = page_size;
            }
        }
        if let Some(section) = file.hackernews {
            if let Some(paths) = section.export_path {
                self.hackernews_paths = paths.into_vec();
            }
        }
    }

    /// Command-line flags, the last and strongest layer.
    pub fn apply_cli(&mut self, args: &SourceArgs) {
        if !args.exports.is_empty() {
            self.export_paths = args.exports.clone();
        }
        if let Some(id) = &args.facebook_id {
            self.facebook_id = Some(id.clone());
        }
        if let Some(page_size) = args.page_size.filter(|size| *size > 0) {
            self.page_size = page_size;
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            self_id: self.facebook_id.clone(),
            page_size: self.page_size,
        }
    }
}

fn split_path_list(raw: &str) -> Vec<String> {
    env::split_paths(raw)
        .map(|path| path.to_string_lossy().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}
