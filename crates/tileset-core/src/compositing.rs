use image::RgbaImage;
use tracing::instrument;

use crate::error::{Result, TilesetError};
use crate::model::Packing;

/// Copy `src` into `canvas` with its top-left at (dx, dy), rotating it 90°
/// clockwise when `rotated`. Pixels falling outside the canvas are dropped.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32, rotated: bool) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    // destination (rendered) size differs when rotated
    let (rw, rh) = if rotated { (sh, sw) } else { (sw, sh) };

    for yy in 0..rh {
        for xx in 0..rw {
            let (ix, iy) = if rotated {
                (yy, sh - 1 - xx)
            } else {
                (xx, yy)
            };
            if dx + xx < cw && dy + yy < ch {
                canvas.put_pixel(dx + xx, dy + yy, *src.get_pixel(ix, iy));
            }
        }
    }
}

/// Decodes every placed frame and draws it onto a transparent canvas.
#[instrument(skip_all, fields(width = packing.canvas.width, height = packing.canvas.height))]
pub fn render_atlas(packing: &Packing) -> Result<RgbaImage> {
    let mut canvas = RgbaImage::new(packing.canvas.width, packing.canvas.height);
    for placed in &packing.placements {
        let src = image::open(&placed.frame.source_path)
            .map_err(|e| TilesetError::tool("image decode", e))?
            .to_rgba8();
        blit_rgba(&src, &mut canvas, placed.x, placed.y, placed.rotated);
    }
    Ok(canvas)
}
