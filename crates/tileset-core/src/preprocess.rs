//! Per-frame preprocessing (scale, trim) and size measurement.

use image::RgbaImage;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::catalog::FrameSource;
use crate::error::{Result, TilesetError};
use crate::model::{Frame, Rect, TrimInfo};

/// Frame source after preprocessing; `path` points at the pixels to pack.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFrame {
    pub name: String,
    pub path: PathBuf,
    pub rotation_allowed: bool,
    pub trim: Option<TrimInfo>,
}

/// Bounding box of pixels with alpha above `threshold`, or `None` when the
/// image is fully transparent.
pub fn compute_trim_rect(rgba: &RgbaImage, threshold: u8) -> Option<Rect> {
    let (w, h) = rgba.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    for (x, y, px) in rgba.enumerate_pixels() {
        if px[3] > threshold {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x == u32::MAX || w == 0 || h == 0 {
        return None;
    }
    Some(Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Applies the source's scale and trim directives.
///
/// Sources without directives are used in place; others are decoded,
/// transformed and written as PNG into `work_dir`.
pub fn preprocess(index: usize, source: &FrameSource, work_dir: &Path) -> Result<PreparedFrame> {
    let opts = source.preprocess;
    let mut prepared = PreparedFrame {
        name: source.name.clone(),
        path: source.path.clone(),
        rotation_allowed: opts.rotatable,
        trim: None,
    };
    if opts.is_identity() {
        return Ok(prepared);
    }

    let decoded = image::open(&source.path).map_err(|e| TilesetError::tool("image decode", e))?;
    let mut rgba = decoded.to_rgba8();
    if opts.scale != 1.0 {
        let (w, h) = rgba.dimensions();
        let sw = ((w as f32 * opts.scale).round() as u32).max(1);
        let sh = ((h as f32 * opts.scale).round() as u32).max(1);
        rgba = image::imageops::resize(&rgba, sw, sh, FilterType::Lanczos3);
    }
    if opts.trim {
        let (w, h) = rgba.dimensions();
        // fully transparent images keep their size
        if let Some(r) = compute_trim_rect(&rgba, 0) {
            if r.w != w || r.h != h {
                rgba = image::imageops::crop_imm(&rgba, r.x, r.y, r.w, r.h).to_image();
                prepared.trim = Some(TrimInfo {
                    x: r.x,
                    y: r.y,
                    source_width: w,
                    source_height: h,
                });
            }
        }
    }

    let out = work_dir.join(format!("{index:04}_{}.png", source.name));
    rgba.save(&out)
        .map_err(|e| TilesetError::tool("image encode", e))?;
    trace!(frame = %source.name, path = %out.display(), "preprocessed");
    prepared.path = out;
    Ok(prepared)
}

/// Reads the dimensions of a prepared frame from its file header.
pub fn measure(prepared: PreparedFrame) -> Result<Frame> {
    let (width, height) = image::image_dimensions(&prepared.path)
        .map_err(|e| TilesetError::tool("image probe", e))?;
    Ok(Frame {
        name: prepared.name,
        width,
        height,
        source_path: prepared.path,
        rotation_allowed: prepared.rotation_allowed,
        trim: prepared.trim,
    })
}
