//! Capabilities the infobox renderer needs from its host wiki.
//!
//! The renderer never parses wikitext or touches file storage itself. Every
//! such operation goes through one of the traits in this module, which the
//! host implements.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The host wikitext engine.
pub trait ExternalParser {
    /// Expands a fragment of wikitext into HTML.
    fn parse_recursive(&self, wikitext: &str) -> String;

    /// Substitutes template variables in a fragment of wikitext without
    /// otherwise expanding it.
    fn replace_variables(&self, wikitext: &str) -> String;

    /// Registers a use of the given file for dependency tracking.
    fn add_image(&self, title: &str);

    /// Returns the images of the gallery identified by the given strip marker.
    fn gallery(&self, _marker: &str) -> Vec<GalleryImage> {
        Vec::new()
    }
}

/// An image from an expanded gallery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GalleryImage {
    /// The file name.
    pub title: String,
    /// The gallery caption.
    pub label: String,
}

/// The host file repository.
pub trait FileRepository {
    /// Finds an existing file by name. The name does not include a namespace
    /// prefix.
    fn find_file(&self, name: &str) -> Option<MediaFile>;

    /// Generates a thumbnail of the given file and returns its URL, or `None`
    /// if thumbnail generation failed.
    fn transform(&self, file: &MediaFile, width: u32, height: u32) -> Option<String>;
}

/// The kind of media in a file.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A raster image.
    Bitmap,
    /// A vector image.
    Drawing,
    /// A video.
    Video,
    /// An audio file.
    Audio,
    /// Anything else.
    #[serde(other)]
    Unknown,
}

impl MediaType {
    /// Returns true if this is a still image.
    pub fn is_image(self) -> bool {
        matches!(self, Self::Bitmap | Self::Drawing)
    }
}

/// A file from the host file repository.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MediaFile {
    /// The canonical name of the file, without namespace.
    pub title: String,
    /// The URL of the full-size file.
    pub url: String,
    /// The kind of media.
    pub media_type: MediaType,
    /// The natural width, in pixels.
    #[serde(default)]
    pub width: u32,
    /// The natural height, in pixels.
    #[serde(default)]
    pub height: u32,
}

/// An [`ExternalParser`] which does not expand anything.
///
/// Useful when the input is already HTML.
#[derive(Debug, Default)]
pub struct PlainParser;

impl ExternalParser for PlainParser {
    fn parse_recursive(&self, wikitext: &str) -> String {
        wikitext.trim().to_string()
    }

    fn replace_variables(&self, wikitext: &str) -> String {
        wikitext.to_string()
    }

    fn add_image(&self, title: &str) {
        log::trace!("image used: {title}");
    }
}

/// A [`FileRepository`] backed by a fixed table of files.
///
/// Thumbnail URLs are formed by appending the requested size to the file URL.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticFiles {
    /// Files, keyed by name.
    files: IndexMap<String, MediaFile>,
}

impl StaticFiles {
    /// Creates a new repository from a list of files.
    pub fn new(files: impl IntoIterator<Item = MediaFile>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|file| (normalize_file_key(&file.title), file))
                .collect(),
        }
    }
}

impl FileRepository for StaticFiles {
    fn find_file(&self, name: &str) -> Option<MediaFile> {
        let key = normalize_file_key(name);
        self.files
            .get(&key)
            .or_else(|| {
                self.files
                    .iter()
                    .find(|(name, _)| normalize_file_key(name) == key)
                    .map(|(_, file)| file)
            })
            .cloned()
    }

    fn transform(&self, file: &MediaFile, width: u32, height: u32) -> Option<String> {
        (width > 0 && height > 0).then(|| format!("{}/{width}x{height}", file.url))
    }
}

/// Normalises a file name the way the host does for lookup: underscores become
/// spaces and the first letter is upper-cased.
fn normalize_file_key(name: &str) -> String {
    let name = name.trim().replace('_', " ");
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_files_lookup() {
        let files = StaticFiles::new([MediaFile {
            title: "Test file.jpg".into(),
            url: "http://img/Test_file.jpg".into(),
            media_type: MediaType::Bitmap,
            width: 100,
            height: 50,
        }]);
        assert!(files.find_file("test_file.jpg").is_some());
        assert!(files.find_file("other.jpg").is_none());
        let file = files.find_file("Test file.jpg").unwrap();
        assert_eq!(
            files.transform(&file, 10, 5).as_deref(),
            Some("http://img/Test_file.jpg/10x5")
        );
    }

    #[test]
    fn media_type_names() {
        let ty: MediaType = serde_json::from_str(r#""drawing""#).unwrap();
        assert!(ty.is_image());
        let ty: MediaType = serde_json::from_str(r#""office""#).unwrap();
        assert_eq!(ty, MediaType::Unknown);
    }
}
