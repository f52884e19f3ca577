use tracing::{debug, instrument};

use crate::config::PackOptions;
use crate::error::{Result, TilesetError};
use crate::model::{CanvasSize, Frame, Packing, PlacedFrame};

pub mod maxrects;

use maxrects::MaxRectsPacker;

/// Top-left position chosen for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub rotated: bool,
}

/// A packer places rectangles onto its current canvas.
///
/// Implementations must ensure no overlaps. `pack` returns `None` when the
/// rectangle does not fit the canvas as it is now.
pub trait Packer {
    fn can_pack(&self, w: u32, h: u32, allow_rotation: bool) -> bool;
    fn pack(&mut self, w: u32, h: u32, allow_rotation: bool) -> Option<Placement>;
}

/// Packs `frames` onto one canvas, growing it as needed.
///
/// Frames are placed largest area first (ties keep input order), the canvas
/// is trimmed to the bounding box of all frames, and placements are returned
/// in the order of `frames`. Identical inputs always give identical output.
#[instrument(skip_all, fields(frames = frames.len(), rotatable = options.rotatable))]
pub fn pack(frames: &[Frame], options: &PackOptions) -> Result<Packing> {
    if frames.is_empty() {
        return Ok(Packing::default());
    }
    for f in frames {
        if f.width == 0 || f.height == 0 {
            return Err(TilesetError::InvalidFrame {
                name: f.name.clone(),
                width: f.width,
                height: f.height,
            });
        }
        if f.width.checked_add(options.padding).is_none()
            || f.height.checked_add(options.padding).is_none()
        {
            let max = options
                .max_size
                .unwrap_or(CanvasSize::new(u32::MAX, u32::MAX));
            return Err(TilesetError::CanvasLimit {
                name: f.name.clone(),
                max_width: max.width,
                max_height: max.height,
            });
        }
        if let Some(max) = options.max_size {
            let rot = options.rotatable && f.rotation_allowed;
            if !slot_fits(f, options.padding, max, rot) {
                return Err(TilesetError::CanvasLimit {
                    name: f.name.clone(),
                    max_width: max.width,
                    max_height: max.height,
                });
            }
        }
    }

    let mut order: Vec<usize> = (0..frames.len()).collect();
    order.sort_by(|&a, &b| {
        frames[b]
            .area()
            .cmp(&frames[a].area())
            .then_with(|| a.cmp(&b))
    });

    let start = starting_canvas(frames, options);
    debug!(width = start.width, height = start.height, "starting canvas");
    let mut packer = MaxRectsPacker::new(start, options.padding);
    let mut slots: Vec<Option<Placement>> = vec![None; frames.len()];

    for idx in order {
        let frame = &frames[idx];
        let allow_rotation = options.rotatable && frame.rotation_allowed;
        let placement = loop {
            if let Some(p) = packer.pack(frame.width, frame.height, allow_rotation) {
                break p;
            }
            grow_for(&mut packer, frame, options)?;
        };
        slots[idx] = Some(placement);
    }

    let placements: Vec<PlacedFrame> = frames
        .iter()
        .zip(slots)
        .filter_map(|(frame, slot)| {
            slot.map(|p| PlacedFrame {
                frame: frame.clone(),
                x: p.x,
                y: p.y,
                rotated: p.rotated,
            })
        })
        .collect();

    let canvas = placements
        .iter()
        .map(PlacedFrame::footprint)
        .fold(CanvasSize::default(), |acc, r| {
            CanvasSize::new(acc.width.max(r.right()), acc.height.max(r.bottom()))
        });
    debug!(
        width = canvas.width,
        height = canvas.height,
        grown_width = packer.canvas().width,
        grown_height = packer.canvas().height,
        "packed"
    );
    Ok(Packing { placements, canvas })
}

fn slot_fits(frame: &Frame, padding: u32, max: CanvasSize, allow_rotation: bool) -> bool {
    let w = frame.width.saturating_add(padding);
    let h = frame.height.saturating_add(padding);
    (w <= max.width && h <= max.height) || (allow_rotation && h <= max.width && w <= max.height)
}

/// Square of the largest frame side (plus padding), raised to `min_size`
/// and clamped to `max_size`.
fn starting_canvas(frames: &[Frame], options: &PackOptions) -> CanvasSize {
    let side = frames
        .iter()
        .map(|f| f.width.max(f.height).saturating_add(options.padding))
        .max()
        .unwrap_or(0);
    let mut size = CanvasSize::new(side, side);
    if let Some(min) = options.min_size {
        size.width = size.width.max(min.width);
        size.height = size.height.max(min.height);
    }
    if let Some(max) = options.max_size {
        size.width = size.width.min(max.width);
        size.height = size.height.min(max.height);
    }
    size
}

/// Grows the canvas once so `frame` has a chance to fit.
///
/// The preferred axis grows by the frame's extent along it, capped by the
/// remaining headroom (`max_size`, or `u32::MAX` without one); when that
/// axis is at its ceiling the other one grows.
fn grow_for(packer: &mut MaxRectsPacker, frame: &Frame, options: &PackOptions) -> Result<()> {
    let first = packer.next_growth_axis();
    let canvas = packer.canvas();
    for axis in [first, first.other()] {
        let (current, wanted, ceiling) = match axis {
            maxrects::Axis::Width => (
                canvas.width,
                frame.width.saturating_add(options.padding),
                options.max_size.map_or(u32::MAX, |m| m.width),
            ),
            maxrects::Axis::Height => (
                canvas.height,
                frame.height.saturating_add(options.padding),
                options.max_size.map_or(u32::MAX, |m| m.height),
            ),
        };
        let amount = wanted.min(ceiling.saturating_sub(current));
        if amount > 0 {
            debug!(frame = %frame.name, ?axis, amount, "growing canvas");
            packer.grow(axis, amount);
            return Ok(());
        }
    }
    let max = options.max_size.unwrap_or(canvas);
    Err(TilesetError::CanvasLimit {
        name: frame.name.clone(),
        max_width: max.width,
        max_height: max.height,
    })
}
