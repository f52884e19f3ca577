use globset::GlobBuilder;
use std::fs;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::config::{FrameOptions, TilesetConfig};
use crate::error::{Result, TilesetError};
use crate::model::Frame;

/// Anything whose name and file contents feed a build fingerprint.
pub trait FrameContent {
    fn name(&self) -> &str;
    fn content_path(&self) -> &Path;
}

impl FrameContent for Frame {
    fn name(&self) -> &str {
        &self.name
    }
    fn content_path(&self) -> &Path {
        &self.source_path
    }
}

/// Preprocessing settings resolved for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocess {
    pub scale: f32,
    pub trim: bool,
    pub rotatable: bool,
}

impl Preprocess {
    fn resolve(cfg: &TilesetConfig, opts: &FrameOptions) -> Self {
        Self {
            scale: opts.scale.unwrap_or(cfg.scale),
            trim: opts.trim.unwrap_or(cfg.trim),
            rotatable: opts.rotatable.unwrap_or(true),
        }
    }

    /// True when the source file can be used as is.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && !self.trim
    }
}

/// One catalog entry: a source image before measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSource {
    pub name: String,
    pub path: PathBuf,
    pub preprocess: Preprocess,
}

impl FrameContent for FrameSource {
    fn name(&self) -> &str {
        &self.name
    }
    fn content_path(&self) -> &Path {
        &self.path
    }
}

/// Validated, ordered list of frame sources.
#[derive(Debug, Clone, Default)]
pub struct FrameCatalog {
    sources: Vec<FrameSource>,
}

impl FrameCatalog {
    /// Resolves the `files` mapping of `cfg` against `context`.
    ///
    /// Entries are visited in key order; glob matches are sorted by path.
    /// Frame names are file stems and must be unique.
    pub fn resolve(cfg: &TilesetConfig, context: &Path) -> Result<Self> {
        Self::resolve_excluding(cfg, context, &[])
    }

    /// Like [`FrameCatalog::resolve`], but glob walks never descend into or
    /// match any path in `exclude` (build output, previous artifacts).
    /// Literal entries are taken as written.
    #[instrument(skip_all, fields(context = %context.display()))]
    pub fn resolve_excluding(cfg: &TilesetConfig, context: &Path, exclude: &[&Path]) -> Result<Self> {
        let skip: Vec<PathBuf> = exclude
            .iter()
            .filter_map(|p| fs::canonicalize(p).ok())
            .collect();
        let mut sources = Vec::new();
        for (pattern, opts) in &cfg.files {
            let preprocess = Preprocess::resolve(cfg, opts);
            for path in expand_pattern(pattern, context, &skip)? {
                let name = frame_name(&path)?;
                sources.push(FrameSource {
                    name,
                    path,
                    preprocess,
                });
            }
        }
        let catalog = Self { sources };
        catalog.validate()?;
        debug!(frames = catalog.len(), "catalog resolved");
        Ok(catalog)
    }

    pub fn from_sources(sources: Vec<FrameSource>) -> Result<Self> {
        let catalog = Self { sources };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(TilesetError::Config("no frames listed under `files`".into()));
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if s.name.is_empty() {
                return Err(TilesetError::Config(format!(
                    "frame name derived from {} is empty",
                    s.path.display()
                )));
            }
            if !seen.insert(s.name.as_str()) {
                return Err(TilesetError::Config(format!(
                    "duplicate frame name '{}' ({})",
                    s.name,
                    s.path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn sources(&self) -> &[FrameSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn expand_pattern(pattern: &str, context: &Path, skip: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if !is_glob(pattern) {
        let path = context.join(pattern);
        if !path.is_file() {
            return Err(TilesetError::Config(format!(
                "frame file {} does not exist",
                path.display()
            )));
        }
        return Ok(vec![path]);
    }
    // `*` stays within one path component; `**` crosses directories
    let matcher = GlobBuilder::new(pattern.trim_start_matches("./"))
        .literal_separator(true)
        .build()
        .map_err(|e| TilesetError::Config(format!("invalid pattern '{pattern}': {e}")))?
        .compile_matcher();
    let mut list: Vec<PathBuf> = WalkDir::new(context)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(e.path(), skip))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .strip_prefix(context)
                .map(|rel| matcher.is_match(rel.to_string_lossy().replace('\\', "/")))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    if list.is_empty() {
        return Err(TilesetError::Config(format!(
            "pattern '{pattern}' matched no files under {}",
            context.display()
        )));
    }
    list.sort();
    Ok(list)
}

fn is_skipped(path: &Path, skip: &[PathBuf]) -> bool {
    !skip.is_empty()
        && fs::canonicalize(path)
            .map(|p| skip.contains(&p))
            .unwrap_or(false)
}

fn frame_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            TilesetError::Config(format!("cannot derive a frame name from {}", path.display()))
        })
}
