//! Infobox rendering configuration.
//!
//! Most of these settings correspond to site-wide settings of the host wiki.
//! Every field has a default, so an empty configuration file is valid.

use serde::Deserialize;
use std::path::Path;

/// The default strip marker prefix used by the host parser.
pub const MARKER_PREFIX: &str = "\x7f'\"`UNIQ-";

/// The default strip marker suffix used by the host parser.
pub const MARKER_SUFFIX: &str = "-QINU`\"'\x7f";

/// A configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration file could not be read.
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file was not valid JSON.
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Infobox rendering configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Whether titles, headers, and data labels are emitted as heading
    /// elements instead of plain `div`s.
    pub use_headings: bool,

    /// A site-wide maximum thumbnail width. If a file is wider than this,
    /// thumbnails are generated at this width instead of the default.
    pub custom_image_width: Option<u32>,

    /// The width of generated thumbnail files.
    pub thumbnail_width: u32,

    /// The width of the `img` tag in the rendered infobox.
    pub infobox_width: u32,

    /// The maximum height of a generated thumbnail.
    pub max_thumbnail_height: u32,

    /// The prefix of a host strip marker.
    pub marker_prefix: String,

    /// The suffix of a host strip marker.
    pub marker_suffix: String,

    /// Names and aliases of the file namespace, which are removed from media
    /// file names.
    pub file_namespaces: Vec<String>,

    /// The time-to-live of cached infobox payloads, in seconds.
    pub cache_ttl: u64,

    /// The maximum number of bytes held by the in-process payload cache.
    pub cache_memory: usize,
}

impl Config {
    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_headings: true,
            custom_image_width: None,
            thumbnail_width: 350,
            infobox_width: 270,
            max_thumbnail_height: 500,
            marker_prefix: MARKER_PREFIX.to_string(),
            marker_suffix: MARKER_SUFFIX.to_string(),
            file_namespaces: vec!["File".to_string(), "Image".to_string()],
            cache_ttl: 86_400,
            cache_memory: 16 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.use_headings);
        assert_eq!(config.thumbnail_width, 350);
        assert_eq!(config.marker_prefix, MARKER_PREFIX);
        assert_eq!(config.custom_image_width, None);
    }

    #[test]
    fn kebab_case_keys() {
        let config: Config =
            serde_json::from_str(r#"{"use-headings": false, "custom-image-width": 400}"#).unwrap();
        assert!(!config.use_headings);
        assert_eq!(config.custom_image_width, Some(400));
        assert_eq!(config.infobox_width, 270);
    }
}
