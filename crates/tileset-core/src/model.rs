use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Unallocated canvas region tracked by the packer.
pub type FreeRect = Rect;

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// Returns true if the two rectangles share a non-zero area.
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.x >= r.right() || r.x >= self.right() || self.y >= r.bottom() || r.y >= self.bottom())
    }
}

/// Canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Trimming applied to a frame during preprocessing.
///
/// `x,y` locate the kept region inside the untrimmed image of
/// `source_width x source_height` pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrimInfo {
    pub x: u32,
    pub y: u32,
    pub source_width: u32,
    pub source_height: u32,
}

/// A measured frame, ready for packing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    /// Unique frame name (key in the descriptor).
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// File holding the frame pixels; read again when fingerprinting or rendering.
    pub source_path: PathBuf,
    /// Whether this frame may be rotated 90° when the packing allows rotation.
    pub rotation_allowed: bool,
    #[serde(default)]
    pub trim: Option<TrimInfo>,
}

impl Frame {
    /// Frame without a backing file; handy for layout-only callers.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            source_path: PathBuf::new(),
            rotation_allowed: true,
            trim: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    pub fn with_rotation(mut self, allowed: bool) -> Self {
        self.rotation_allowed = allowed;
        self
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A frame with its position on the canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacedFrame {
    pub frame: Frame,
    pub x: u32,
    pub y: u32,
    /// True if the frame was rotated 90° clockwise when placed.
    pub rotated: bool,
}

impl PlacedFrame {
    /// Occupied canvas area (post-rotation width/height).
    pub fn footprint(&self) -> Rect {
        if self.rotated {
            Rect::new(self.x, self.y, self.frame.height, self.frame.width)
        } else {
            Rect::new(self.x, self.y, self.frame.width, self.frame.height)
        }
    }
}

/// Result of one packing run. `placements` follow the input frame order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packing {
    pub placements: Vec<PlacedFrame>,
    pub canvas: CanvasSize,
}

impl Packing {
    /// Ratio of frame area to canvas area (0.0 to 1.0).
    pub fn occupancy(&self) -> f64 {
        let total = self.canvas.area();
        if total == 0 {
            return 0.0;
        }
        let used: u64 = self.placements.iter().map(|p| p.frame.area()).sum();
        used as f64 / total as f64
    }

    /// Number of frames placed rotated.
    pub fn rotated_count(&self) -> usize {
        self.placements.iter().filter(|p| p.rotated).count()
    }
}
