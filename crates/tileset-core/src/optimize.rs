//! Final PNG stage: lossy palette compression through pngquant, or a plain copy.

use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, instrument};

use crate::error::{Result, TilesetError};

/// Writes `src` to `dest`, quantized to `colors` when set.
#[instrument(skip_all, fields(colors = ?colors))]
pub fn optimize_png(src: &Path, dest: &Path, colors: Option<u32>, pngquant: &Path) -> Result<()> {
    let Some(colors) = colors else {
        return copy_file(src, dest);
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let output = Command::new(pngquant)
        .arg(colors.to_string())
        .arg("--force")
        .arg("--output")
        .arg(dest)
        .arg("--")
        .arg(src)
        .output()
        .map_err(|e| TilesetError::tool("pngquant", format!("{}: {e}", pngquant.display())))?;
    if !output.status.success() {
        return Err(TilesetError::tool(
            "pngquant",
            format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    debug!(dest = %dest.display(), "quantized");
    Ok(())
}

/// Copies `src` to `dest`, creating parent directories.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest)?;
    Ok(())
}
