//! The normalised intermediate representation of a resolved infobox.
//!
//! This is what gets rendered, and also what gets persisted by the host, so
//! its serialised form is versioned by [`PARSER_TAG_VERSION`]. Any change to
//! the shape of these types must bump the version.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The version of the persisted render data schema.
pub const PARSER_TAG_VERSION: u32 = 2;

/// One rendered item of an infobox.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum RenderData {
    /// The infobox title.
    Title(TextData),
    /// A section header.
    Header(TextData),
    /// A navigation row.
    Navigation(TextData),
    /// A label/value pair.
    Data(DataItem),
    /// Media from a `<media>` tag.
    Media(Vec<MediaItem>),
    /// Media from an `<image>` tag.
    Image(Vec<MediaItem>),
    /// Media from a `<video>` tag.
    Video(Vec<MediaItem>),
    /// Media from an `<audio>` tag.
    Audio(Vec<MediaItem>),
    /// A group of items.
    Group(GroupData),
    /// A tabbed panel.
    Panel(PanelData),
    /// A tab of a panel.
    Section(SectionData),
    /// A record of a type this version does not know how to render.
    #[serde(other)]
    Unsupported,
}

impl RenderData {
    /// The type name of the record.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Header(_) => "header",
            Self::Navigation(_) => "navigation",
            Self::Data(_) => "data",
            Self::Media(_) => "media",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Audio(_) => "audio",
            Self::Group(_) => "group",
            Self::Panel(_) => "panel",
            Self::Section(_) => "section",
            Self::Unsupported => "unsupported",
        }
    }

    /// The media items of a media-type record.
    pub fn media(&self) -> Option<&[MediaItem]> {
        match self {
            Self::Media(items) | Self::Image(items) | Self::Video(items) | Self::Audio(items) => {
                Some(items)
            }
            _ => None,
        }
    }

    /// The child records of a container record.
    pub fn children(&self) -> &[RenderData] {
        match self {
            Self::Group(group) => &group.value,
            Self::Panel(panel) => &panel.value,
            Self::Section(section) => &section.value,
            _ => &[],
        }
    }
}

/// Render data for title, header, and navigation items.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TextData {
    /// The expanded HTML value.
    pub value: String,
    /// The primary template parameter feeding the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The author-supplied item name.
    #[serde(rename = "item-name", default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

/// Render data for a label/value pair.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DataItem {
    /// The expanded HTML label.
    pub label: String,
    /// The expanded HTML value.
    pub value: String,
    /// The weight of the item in a smart group row.
    pub span: u32,
    /// The explicit layout. Only `default` is meaningful, and opts the item out
    /// of smart group packing.
    #[serde(default)]
    pub layout: Option<String>,
    /// The primary template parameter feeding the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The author-supplied item name.
    #[serde(rename = "item-name", default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

impl Default for DataItem {
    fn default() -> Self {
        Self {
            label: String::new(),
            value: String::new(),
            span: 1,
            layout: None,
            source: None,
            item_name: None,
        }
    }
}

/// Render data for a single media file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// The URL of the full-size file.
    pub url: String,
    /// The canonical file name.
    pub name: String,
    /// Alternative text.
    #[serde(default)]
    pub alt: Option<String>,
    /// The expanded HTML caption.
    #[serde(default)]
    pub caption: Option<String>,
    /// True for raster and vector images.
    #[serde(default)]
    pub is_image: bool,
    /// True for videos.
    #[serde(default)]
    pub is_video: bool,
    /// True for audio files.
    #[serde(default)]
    pub is_audio: bool,
    /// The primary template parameter feeding the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The author-supplied item name.
    #[serde(rename = "item-name", default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    /// The display width of an image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// The display height of an image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// The URL of the 1x thumbnail of an image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// The URL of the 2x thumbnail of an image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail2x: Option<String>,
    /// The 1-indexed position of the item in a collection.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// True for the first item of a collection.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub is_first: bool,
}

/// Render data for a group.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GroupData {
    /// The child items.
    pub value: Vec<RenderData>,
    /// Either `default` or `horizontal`.
    pub layout: String,
    /// Either `open` or `closed`, if the group is collapsible.
    #[serde(default)]
    pub collapse: Option<String>,
    /// The smart group row capacity.
    #[serde(rename = "row-items", default)]
    pub row_items: Option<u32>,
    /// The author-supplied item name.
    #[serde(rename = "item-name", default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

/// Render data for a panel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PanelData {
    /// The panel header and sections.
    pub value: Vec<RenderData>,
    /// Either `open` or `closed`, if the panel is collapsible.
    #[serde(default)]
    pub collapse: Option<String>,
    /// The author-supplied item name.
    #[serde(rename = "item-name", default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

/// Render data for a panel section.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SectionData {
    /// The expanded HTML tab label.
    pub label: String,
    /// The child items.
    pub value: Vec<RenderData>,
    /// The author-supplied item name.
    #[serde(rename = "item-name", default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

/// Records which template parameters feed a node.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Metadata {
    /// The node type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// The template parameters feeding this node, by name.
    #[serde(default)]
    pub sources: IndexMap<String, SourceMetadata>,
    /// Metadata of child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Metadata>,
}

/// Describes one template parameter which feeds a node.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SourceMetadata {
    /// The label of the node, for data nodes.
    pub label: String,
    /// True if this is the node's primary source.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub primary: bool,
}

/// One persisted infobox.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct InfoboxRecord {
    /// The schema version the record was written with.
    pub parser_tag_version: u32,
    /// The render data.
    pub data: Vec<RenderData>,
    /// The metadata of each top-level node.
    pub metadata: Vec<Metadata>,
}

impl InfoboxRecord {
    /// Creates a record at the current schema version.
    pub fn new(data: Vec<RenderData>, metadata: Vec<Metadata>) -> Self {
        Self {
            parser_tag_version: PARSER_TAG_VERSION,
            data,
            metadata,
        }
    }

    /// Returns true if the record was written with the current schema
    /// version.
    pub fn is_current(&self) -> bool {
        self.parser_tag_version == PARSER_TAG_VERSION
    }

    /// Returns the names of every media file in the record, in document order.
    pub fn images(&self) -> Vec<&str> {
        fn walk<'a>(records: &'a [RenderData], out: &mut Vec<&'a str>) {
            for record in records {
                if let Some(items) = record.media() {
                    out.extend(items.iter().map(|item| item.name.as_str()));
                }
                walk(record.children(), out);
            }
        }

        let mut out = Vec::new();
        walk(&self.data, &mut out);
        out
    }
}
