//! Core library for building sprite-sheet atlases.
//!
//! - Packing: MaxRects best-area-fit on a canvas that grows on demand (`pack`)
//! - Cache: fingerprints of config + frame contents decide whether a rebuild can be skipped (`CacheStore`)
//! - Pipeline: `build_tileset` runs preprocessing, packing, rendering and PNG optimization,
//!   then writes `<name>.png` and a JSON hash descriptor `<name>.json`.
//!
//! Quick example:
//! ```ignore
//! use tileset_core::{Frame, PackOptions, pack};
//! # fn main() -> tileset_core::Result<()> {
//! let frames = vec![Frame::new("a", 10, 10), Frame::new("b", 20, 10)];
//! let packing = pack(&frames, &PackOptions::builder().rotatable(false).build())?;
//! println!("canvas: {}x{}", packing.canvas.width, packing.canvas.height);
//! # Ok(()) }
//! ```

pub mod cache;
pub mod catalog;
pub mod compositing;
pub mod config;
pub mod embed;
pub mod error;
pub mod export;
pub mod model;
pub mod optimize;
pub mod packer;
pub mod pipeline;
pub mod preprocess;

pub use cache::{CacheStatus, CacheStore};
pub use catalog::{FrameCatalog, FrameContent, FrameSource};
pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::{Packer, Placement, pack};
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `tileset_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::cache::{CacheStatus, CacheStore};
    pub use crate::catalog::{FrameCatalog, FrameSource};
    pub use crate::config::{BuildOptions, LoaderMode, PackOptions, PackOptionsBuilder, TilesetConfig};
    pub use crate::model::{CanvasSize, Frame, Packing, PlacedFrame, Rect};
    pub use crate::pipeline::{BuildOutput, LoaderOutput};
    pub use crate::{build_from_str, build_tileset, pack};
}
