use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TilesetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Frame '{name}' has invalid dimensions {width}x{height}")]
    InvalidFrame {
        name: String,
        width: u32,
        height: u32,
    },
    #[error("Frame '{name}' does not fit: canvas growth exceeds {max_width}x{max_height}")]
    CanvasLimit {
        name: String,
        max_width: u32,
        max_height: u32,
    },
    #[error(
        "{} not found; build the atlas into the output directory before disabling processing",
        path.display()
    )]
    MissingArtifact { path: PathBuf },
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },
    #[error("Cache file is unreadable: {0}")]
    CacheCorruption(String),
}

impl TilesetError {
    /// External-tool failures are recovered by serving the last good output.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TilesetError::ExternalTool { .. })
    }

    /// True for errors raised by the packing engine itself.
    pub fn is_packing(&self) -> bool {
        matches!(
            self,
            TilesetError::InvalidFrame { .. } | TilesetError::CanvasLimit { .. }
        )
    }

    pub(crate) fn tool(tool: &str, err: impl std::fmt::Display) -> Self {
        TilesetError::ExternalTool {
            tool: tool.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for TilesetError {
    fn from(err: serde_yaml::Error) -> Self {
        TilesetError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TilesetError>;
