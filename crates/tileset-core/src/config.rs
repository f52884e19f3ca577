use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TilesetError};
use crate::model::CanvasSize;

/// How the build result references the atlas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoaderMode {
    /// Produce nothing; the artifacts on disk are the result.
    None,
    /// Embed the descriptor JSON (with `meta.image` rewritten to the atlas URL).
    Json,
    /// Reference the descriptor by URL (data URL or public path).
    Url,
}

impl FromStr for LoaderMode {
    type Err = TilesetError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "json" => Ok(Self::Json),
            "url" => Ok(Self::Url),
            _ => Err(TilesetError::Config(format!(
                "unknown loader '{s}' (expected none, json or url)"
            ))),
        }
    }
}

/// Per-entry preprocessing directives from the `files` mapping.
/// Unset fields fall back to the document-level defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FrameOptions {
    pub scale: Option<f32>,
    pub trim: Option<bool>,
    pub rotatable: Option<bool>,
}

/// Frame source configuration document (YAML).
///
/// ```yaml
/// files:
///   "hero/*.png": {}
///   "boss.png": { scale: 0.5, trim: true }
/// output: hero
/// rotatable: true
/// colors: 128
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TilesetConfig {
    /// Path or glob (relative to the config directory) to frame options.
    pub files: BTreeMap<String, FrameOptions>,
    /// Logical atlas name; output files are `<output>.png` / `<output>.json`.
    pub output: Option<String>,
    /// Allow 90° rotation of frames during packing.
    pub rotatable: bool,
    /// Palette size for lossy PNG compression. None keeps the PNG lossless.
    pub colors: Option<u32>,
    /// Default trim for entries that do not set it.
    pub trim: bool,
    /// Default scale for entries that do not set it.
    pub scale: f32,
    /// Pixels kept free to the right of and below every frame.
    pub padding: u32,
    /// Maximum canvas side. None lets the canvas grow without bound.
    pub max_size: Option<u32>,
}

impl Default for TilesetConfig {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            output: None,
            rotatable: false,
            colors: None,
            trim: false,
            scale: 1.0,
            padding: 0,
            max_size: None,
        }
    }
}

impl TilesetConfig {
    /// Parses and validates a configuration document. An empty document is the default config.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: TilesetConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.output {
            if name.trim().is_empty() {
                return Err(TilesetError::Config("output name is empty".into()));
            }
        }
        if let Some(colors) = self.colors {
            if !(2..=256).contains(&colors) {
                return Err(TilesetError::Config(format!(
                    "colors must be within 2..=256, got {colors}"
                )));
            }
        }
        if !(self.scale > 0.0) {
            return Err(TilesetError::Config(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        for (pattern, opts) in &self.files {
            if let Some(scale) = opts.scale {
                if !(scale > 0.0) {
                    return Err(TilesetError::Config(format!(
                        "scale for '{pattern}' must be positive, got {scale}"
                    )));
                }
            }
        }
        if self.max_size == Some(0) {
            return Err(TilesetError::Config("max_size must be positive".into()));
        }
        Ok(())
    }

    /// Logical atlas name, or `fallback` when the document does not set one.
    pub fn output_name(&self, fallback: &str) -> String {
        self.output
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Options of a single packing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackOptions {
    /// Global rotation switch, combined with each frame's own permission.
    pub rotatable: bool,
    /// Floor for the starting canvas.
    pub min_size: Option<CanvasSize>,
    /// Growth ceiling. None means unbounded.
    pub max_size: Option<CanvasSize>,
    /// Pixels reserved to the right of and below every frame.
    pub padding: u32,
}

impl PackOptions {
    /// Packing settings derived from a frame source configuration.
    pub fn from_config(cfg: &TilesetConfig) -> Self {
        Self {
            rotatable: cfg.rotatable,
            min_size: None,
            max_size: cfg.max_size.map(|s| CanvasSize::new(s, s)),
            padding: cfg.padding,
        }
    }

    pub fn builder() -> PackOptionsBuilder {
        PackOptionsBuilder::new()
    }
}

/// Builder for `PackOptions`.
#[derive(Debug, Default, Clone)]
pub struct PackOptionsBuilder {
    opts: PackOptions,
}

impl PackOptionsBuilder {
    pub fn new() -> Self {
        Self {
            opts: PackOptions::default(),
        }
    }
    pub fn rotatable(mut self, v: bool) -> Self {
        self.opts.rotatable = v;
        self
    }
    pub fn min_size(mut self, w: u32, h: u32) -> Self {
        self.opts.min_size = Some(CanvasSize::new(w, h));
        self
    }
    pub fn max_size(mut self, w: u32, h: u32) -> Self {
        self.opts.max_size = Some(CanvasSize::new(w, h));
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.opts.padding = v;
        self
    }
    pub fn build(self) -> PackOptions {
        self.opts
    }
}

/// Options of one build invocation, supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    /// When false, serve the existing atlas and descriptor from `output`.
    pub process: bool,
    /// Directory the atlas, descriptor, and cache file live in.
    pub output: PathBuf,
    pub loader: LoaderMode,
    /// Log the full error before falling back.
    pub verbose: bool,
    /// Consult and update the rebuild cache.
    pub cache: bool,
    /// Prefix for asset URLs that are not inlined.
    pub public_path: String,
    /// Inline assets of at most this many bytes as data URLs. None never inlines.
    pub inline_limit: Option<u64>,
    /// pngquant executable used when `colors` is configured.
    pub pngquant: PathBuf,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            process: true,
            output: PathBuf::from("out"),
            loader: LoaderMode::Json,
            verbose: false,
            cache: true,
            public_path: String::new(),
            inline_limit: None,
            pngquant: PathBuf::from("pngquant"),
        }
    }
}
