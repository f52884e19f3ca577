//! URLs for built assets: inline data URLs for small files, public paths otherwise.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

use crate::config::BuildOptions;

/// How asset URLs are formed for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOptions {
    pub public_path: String,
    pub inline_limit: Option<u64>,
}

impl EmbedOptions {
    pub fn from_build(opts: &BuildOptions) -> Self {
        Self {
            public_path: opts.public_path.clone(),
            inline_limit: opts.inline_limit,
        }
    }
}

pub fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("json") => "application/json",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// URL for an asset named `file_name` whose content is `bytes`.
///
/// Inlined as a base64 data URL when it is at most `inline_limit` bytes,
/// otherwise `public_path` + `file_name`.
pub fn asset_url(file_name: &str, bytes: &[u8], opts: &EmbedOptions) -> String {
    match opts.inline_limit {
        Some(limit) if bytes.len() as u64 <= limit => format!(
            "data:{};base64,{}",
            mime_for(Path::new(file_name)),
            STANDARD.encode(bytes)
        ),
        _ => format!("{}{}", opts.public_path, file_name),
    }
}
