use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{error, info, instrument, warn};

use crate::cache::{CacheStatus, CacheStore, artifact_paths};
use crate::catalog::{FrameCatalog, FrameSource};
use crate::compositing::render_atlas;
use crate::config::{BuildOptions, LoaderMode, PackOptions, TilesetConfig};
use crate::embed::{EmbedOptions, asset_url};
use crate::error::{Result, TilesetError};
use crate::export::{rewrite_image_reference, to_descriptor};
use crate::model::Frame;
use crate::optimize::{copy_file, optimize_png};
use crate::packer::pack;
use crate::preprocess::{measure, preprocess};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What the host receives for the atlas.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderOutput {
    None,
    /// Descriptor with `meta.image` / `meta.json` pointing at the built assets.
    Json(Value),
    /// URL of the rewritten descriptor.
    Url(String),
}

/// Result of one build invocation.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Logical atlas name.
    pub name: String,
    pub image_path: PathBuf,
    pub descriptor_path: PathBuf,
    pub content: LoaderOutput,
    pub cache: CacheStatus,
    /// True when this invocation produced new artifacts.
    pub rebuilt: bool,
    /// Diagnostics for the host; each was also logged as a warning.
    pub warnings: Vec<String>,
}

/// Temporary working directories of one rebuild, removed when dropped.
struct Workspace {
    input: TempDir,
    output: TempDir,
}

impl Workspace {
    fn new() -> Result<Self> {
        Ok(Self {
            input: tempfile::Builder::new().prefix("tileset-in-").tempdir()?,
            output: tempfile::Builder::new().prefix("tileset-out-").tempdir()?,
        })
    }
}

/// Builds the atlas described by the YAML file at `config_path`.
///
/// Frame paths resolve against the file's directory; the atlas name defaults
/// to the file stem.
pub fn build_tileset(
    config_path: &Path,
    options: &BuildOptions,
    cache: &mut CacheStore,
) -> Result<BuildOutput> {
    let source = fs::read_to_string(config_path)?;
    let context = match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let default_name = config_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tileset");
    build_from_str(&source, context, default_name, options, cache)
}

/// Builds an atlas from a configuration document.
///
/// `cache` must be opened on `options.output` when caching is enabled.
/// Configuration and packing errors abort the build. External tool failures
/// are reported as warnings and the previously built artifacts are served
/// instead; without such artifacts the tool error is returned.
#[instrument(skip_all, fields(context = %context.display(), process = options.process))]
pub fn build_from_str(
    source: &str,
    context: &Path,
    default_name: &str,
    options: &BuildOptions,
    cache: &mut CacheStore,
) -> Result<BuildOutput> {
    if options.cache && cache.dir() != options.output.as_path() {
        return Err(TilesetError::Config(format!(
            "cache store is opened for {} but the output directory is {}",
            cache.dir().display(),
            options.output.display()
        )));
    }
    let config = TilesetConfig::from_yaml_str(source)?;
    let name = config.output_name(default_name);
    let (image_path, descriptor_path) = artifact_paths(&options.output, &name);
    let mut served = Served {
        name: name.clone(),
        image_path,
        descriptor_path,
        warnings: Vec::new(),
    };

    if !options.process {
        for path in [&served.image_path, &served.descriptor_path] {
            if !path.is_file() {
                return Err(TilesetError::MissingArtifact { path: path.clone() });
            }
        }
        served.warn(format!(
            "image processing is disabled; {name}.png and {name}.json are read from {}",
            options.output.display()
        ));
        return served.finish(options, CacheStatus::Miss, false);
    }

    let catalog = FrameCatalog::resolve_excluding(
        &config,
        context,
        &[&options.output, &served.image_path, &served.descriptor_path],
    )?;
    let status = if options.cache {
        cache.check(&name, &config, catalog.sources())
    } else {
        CacheStatus::Miss
    };
    if status.is_hit() {
        info!(name = %name, "atlas is up to date");
        return served.finish(options, status, false);
    }

    let outcome = Workspace::new().and_then(|ws| {
        rebuild(&config, &catalog, &served, &ws, options)
        // ws dropped here, removing both temp dirs
    });
    match outcome {
        Ok(()) => {
            if options.cache {
                cache.commit(&name, &config, catalog.sources());
            }
            served.finish(options, status, true)
        }
        Err(e) if e.is_recoverable() => {
            if options.verbose {
                error!(error = ?e, "atlas processing failed");
            }
            if !served.image_path.is_file() || !served.descriptor_path.is_file() {
                return Err(e);
            }
            served.warn(format!(
                "atlas processing failed ({e}); serving the previously built {name}.png and {name}.json"
            ));
            served.finish(options, status, false)
        }
        Err(e) => Err(e),
    }
}

/// Final artifact locations plus the diagnostics gathered so far.
struct Served {
    name: String,
    image_path: PathBuf,
    descriptor_path: PathBuf,
    warnings: Vec<String>,
}

impl Served {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn finish(mut self, options: &BuildOptions, cache: CacheStatus, rebuilt: bool) -> Result<BuildOutput> {
        let content = self.loader_output(options)?;
        Ok(BuildOutput {
            name: self.name,
            image_path: self.image_path,
            descriptor_path: self.descriptor_path,
            content,
            cache,
            rebuilt,
            warnings: self.warnings,
        })
    }

    fn loader_output(&mut self, options: &BuildOptions) -> Result<LoaderOutput> {
        if options.loader == LoaderMode::None {
            return Ok(LoaderOutput::None);
        }
        let embed = EmbedOptions::from_build(options);
        let image_file = format!("{}.png", self.name);
        let json_file = format!("{}.json", self.name);
        let image_url = asset_url(&image_file, &fs::read(&self.image_path)?, &embed);
        let mut descriptor: Value = serde_json::from_slice(&fs::read(&self.descriptor_path)?)?;

        let json_url = match options.loader {
            LoaderMode::Json => Some(json_url_for(&image_url, &json_file, &embed)),
            _ => None,
        };
        if !rewrite_image_reference(&mut descriptor, &image_url, json_url.as_deref()) {
            self.warn(format!(
                "{} is not a JSON object; image reference left unchanged",
                self.descriptor_path.display()
            ));
        }

        Ok(match options.loader {
            LoaderMode::Url => {
                let text = serde_json::to_string(&descriptor)?;
                LoaderOutput::Url(asset_url(&json_file, text.as_bytes(), &embed))
            }
            _ => LoaderOutput::Json(descriptor),
        })
    }
}

/// The image URL with `.png` swapped for `.json`; inlined images fall back
/// to the public path of the descriptor.
fn json_url_for(image_url: &str, json_file: &str, embed: &EmbedOptions) -> String {
    if image_url.starts_with("data:") {
        return format!("{}{}", embed.public_path, json_file);
    }
    match image_url.strip_suffix(".png") {
        Some(stem) => format!("{stem}.json"),
        None => format!("{image_url}.json"),
    }
}

/// Preprocess, measure, pack, render, optimize, then publish into the output directory.
fn rebuild(
    config: &TilesetConfig,
    catalog: &FrameCatalog,
    served: &Served,
    ws: &Workspace,
    options: &BuildOptions,
) -> Result<()> {
    let frames = prepare_frames(catalog.sources(), ws.input.path())?;
    let packing = pack(&frames, &PackOptions::from_config(config))?;
    info!(
        frames = frames.len(),
        width = packing.canvas.width,
        height = packing.canvas.height,
        occupancy = format!("{:.2}%", packing.occupancy() * 100.0),
        "packed"
    );

    let atlas = render_atlas(&packing)?;
    let raw_image = ws.output.path().join("atlas.raw.png");
    let staged_image = ws.output.path().join("atlas.png");
    let staged_descriptor = ws.output.path().join("atlas.json");
    atlas
        .save(&raw_image)
        .map_err(|e| TilesetError::tool("image encode", e))?;

    let image_name = format!("{}.png", served.name);
    let descriptor = to_descriptor(&packing, &image_name);
    let write_descriptor = || -> Result<()> {
        fs::write(&staged_descriptor, serde_json::to_string_pretty(&descriptor)?)?;
        Ok(())
    };
    let quantize = || optimize_png(&raw_image, &staged_image, config.colors, &options.pngquant);

    #[cfg(feature = "parallel")]
    let (png, json) = rayon::join(quantize, write_descriptor);
    #[cfg(not(feature = "parallel"))]
    let (png, json) = (quantize(), write_descriptor());
    png?;
    json?;

    // output directory is only touched once every stage has succeeded
    copy_file(&staged_image, &served.image_path)?;
    copy_file(&staged_descriptor, &served.descriptor_path)?;
    info!(image = %served.image_path.display(), "atlas written");
    Ok(())
}

#[cfg(feature = "parallel")]
fn prepare_frames(sources: &[FrameSource], work_dir: &Path) -> Result<Vec<Frame>> {
    sources
        .par_iter()
        .enumerate()
        .map(|(i, s)| preprocess(i, s, work_dir).and_then(measure))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn prepare_frames(sources: &[FrameSource], work_dir: &Path) -> Result<Vec<Frame>> {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| preprocess(i, s, work_dir).and_then(measure))
        .collect()
}

/// Resolves, measures and packs without rendering or writing any output.
///
/// Preprocessed frames live in a temporary directory that is gone once this
/// returns, so `source_path` of scaled or trimmed frames is informational only.
pub fn layout_from_str(source: &str, context: &Path) -> Result<crate::model::Packing> {
    let config = TilesetConfig::from_yaml_str(source)?;
    let catalog = FrameCatalog::resolve(&config, context)?;
    let ws = Workspace::new()?;
    let frames = prepare_frames(catalog.sources(), ws.input.path())?;
    pack(&frames, &PackOptions::from_config(&config))
}
