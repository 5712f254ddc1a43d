//! Media resolution for `<media>`, `<image>`, `<video>`, and `<audio>` nodes.

use super::{MediaKind, Node, file_name};
use crate::{
    config::Config,
    external::{FileRepository, GalleryImage, MediaFile, MediaType},
    render_data::MediaItem,
    sanitize::dom::Dom,
};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

/// The child element holding alternative text.
pub(super) const ALT_TAG: &str = "alt";
/// The child element holding a caption.
pub(super) const CAPTION_TAG: &str = "caption";

/// Patterns matching the strip markers the host leaves in place of expanded
/// `<gallery>` and `<tabber>` extension tags.
pub(super) struct Markers {
    /// Gallery markers.
    gallery: Option<Regex>,
    /// Tabber markers.
    tabber: Option<Regex>,
}

impl Markers {
    /// Compiles marker patterns for the configured marker delimiters.
    fn new(config: &Config) -> Self {
        Self {
            gallery: marker_pattern(config, "GALLERY"),
            tabber: marker_pattern(config, "TABBER"),
        }
    }
}

fn marker_pattern(config: &Config, extension: &str) -> Option<Regex> {
    let pattern = format!(
        "(?i){}-{extension}-[A-F0-9]{{8}}{}",
        regex::escape(&config.marker_prefix),
        regex::escape(&config.marker_suffix)
    );
    Regex::new(&pattern)
        .inspect_err(|err| log::error!("bad {extension} marker pattern: {err}"))
        .ok()
}

fn find_markers<'t>(pattern: Option<&Regex>, text: &'t str) -> Vec<&'t str> {
    pattern
        .map(|re| re.find_iter(text).map(|m| m.as_str()).collect())
        .unwrap_or_default()
}

/// Thumbnail dimensions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Fits an `original_width`×`original_height` image into a box at most
/// `preferred_width` wide and `max_height` tall, preserving its aspect ratio.
/// Images are never scaled up.
pub fn thumbnail_sizes(
    preferred_width: u32,
    max_height: u32,
    original_width: u32,
    original_height: u32,
) -> Dimensions {
    if original_width == 0 || original_height == 0 {
        return Dimensions {
            width: 0,
            height: 0,
        };
    }

    let preferred_width = f64::from(preferred_width);
    let max_height = f64::from(max_height);
    let original_width = f64::from(original_width);
    let original_height = f64::from(original_height);

    let (width, height) = if original_height / original_width > max_height / preferred_width {
        let height = max_height.min(original_height);
        (
            preferred_width.min(height * original_width / original_height),
            height,
        )
    } else {
        let width = preferred_width.min(original_width);
        (
            width,
            max_height.min(width * original_height / original_width),
        )
    };

    Dimensions {
        width: width.round() as u32,
        height: height.round() as u32,
    }
}

/// Resolves the media items of a media node.
pub(super) fn items(node: &Node<'_>, kind: MediaKind) -> Vec<MediaItem> {
    let value = node.raw_value_with_default(node.xml);
    let markers = node.env.markers.get_or_init(|| Markers::new(node.env.config));

    let galleries = find_markers(markers.gallery.as_ref(), &value);
    let tabbers = find_markers(markers.tabber.as_ref(), &value);

    if galleries.is_empty() && tabbers.is_empty() {
        let alt = node
            .xml
            .child(ALT_TAG)
            .map(|alt| node.value_with_default(alt))
            .filter(|alt| !alt.is_empty());
        let caption = node
            .xml
            .child(CAPTION_TAG)
            .map(|caption| node.value_with_default(caption));
        return item(node, kind, &value, alt, caption).into_iter().collect();
    }

    let mut images = Vec::new();
    for marker in galleries {
        images.extend(node.env.parser.gallery(marker));
    }
    for marker in tabbers {
        images.extend(tabber_images(&node.env.parser.parse_recursive(marker)));
    }

    let mut items = images
        .into_iter()
        .filter_map(|image| {
            item(
                node,
                kind,
                &image.title,
                Some(image.label.clone()),
                Some(image.label),
            )
        })
        .collect::<Vec<_>>();

    if items.len() > 1 {
        extend_collection(&mut items);
    }
    items
}

/// Extracts the images of an expanded tabber.
fn tabber_images(html: &str) -> Vec<GalleryImage> {
    static SRC: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#" src="(?:[^"]*/)?([^"]*?)""#).unwrap());

    let dom = Dom::parse_fragment(html);
    dom.descendants(dom.root())
        .into_iter()
        .filter(|id| dom.name(*id) == Some("div") && dom.attr(*id, "class") == Some("tabbertab"))
        .filter_map(|id| {
            let html = dom.outer_html(id);
            let caps = SRC.captures(&html)?;
            Some(GalleryImage {
                title: percent_decode_str(&caps[1]).decode_utf8_lossy().into_owned(),
                label: dom.attr(id, "title").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Resolves a single media item. Returns `None` if the file does not exist,
/// is of a kind the node does not accept, or could not be thumbnailed.
fn item(
    node: &Node<'_>,
    kind: MediaKind,
    title: &str,
    alt: Option<String>,
    caption: Option<String>,
) -> Option<MediaItem> {
    let env = node.env;
    let name = file_name::sanitize(title, &env.config.file_namespaces);
    if name.is_empty() {
        return None;
    }

    let Some(file) = env.files.find_file(&name) else {
        log::debug!("media file '{name}' does not exist");
        return None;
    };

    if !allows(kind, node, file.media_type) {
        log::debug!("media file '{name}' has a disallowed type");
        return None;
    }

    env.parser.add_image(&file.title);

    let mut item = MediaItem {
        url: file.url.clone(),
        name: file.title.clone(),
        alt: Some(alt.unwrap_or_else(|| file.title.clone())),
        caption: caption.filter(|caption| !caption.is_empty()),
        is_image: file.media_type.is_image(),
        is_video: file.media_type == MediaType::Video,
        is_audio: file.media_type == MediaType::Audio,
        source: node.primary_source(),
        item_name: node.item_name(),
        ..Default::default()
    };

    if item.is_image {
        let Some(image) = extend_image_data(env.files, env.config, &file) else {
            log::warn!("could not generate thumbnails for '{}'", file.title);
            return None;
        };
        item.width = Some(image.size.width);
        item.height = Some(image.size.height);
        item.thumbnail = Some(image.thumbnail);
        item.thumbnail2x = Some(image.thumbnail2x);
    }

    Some(item)
}

/// Returns true if a node of the given kind accepts files of type `ty`.
fn allows(kind: MediaKind, node: &Node<'_>, ty: MediaType) -> bool {
    let enabled = |attr: &str| {
        !node
            .xml
            .attr(attr)
            .is_some_and(|value| value.eq_ignore_ascii_case("false"))
    };

    match (kind, ty) {
        (MediaKind::Any, MediaType::Bitmap | MediaType::Drawing) => enabled("image"),
        (MediaKind::Any, MediaType::Video) => enabled("video"),
        (MediaKind::Any, MediaType::Audio) => enabled("audio"),
        (MediaKind::Image, ty) => ty.is_image(),
        (MediaKind::Video, MediaType::Video) | (MediaKind::Audio, MediaType::Audio) => true,
        _ => false,
    }
}

/// Display size and thumbnail URLs of an image.
struct ImageData {
    size: Dimensions,
    thumbnail: String,
    thumbnail2x: String,
}

/// Computes the display size of an image and generates its thumbnails.
fn extend_image_data(
    files: &dyn FileRepository,
    config: &Config,
    file: &MediaFile,
) -> Option<ImageData> {
    let thumbnail = thumbnail_sizes(
        config.thumbnail_width,
        config.max_thumbnail_height,
        file.width,
        file.height,
    );
    let size = thumbnail_sizes(
        config.infobox_width,
        config.max_thumbnail_height,
        file.width,
        file.height,
    );

    let ratio = match config.custom_image_width {
        Some(custom) if custom > 0 && thumbnail.width > 0 && file.width > custom => {
            f64::from(custom) / f64::from(thumbnail.width)
        }
        _ => 1.0,
    };

    let scaled = |scale: f64| {
        (
            (f64::from(thumbnail.width) * ratio * scale).round() as u32,
            (f64::from(thumbnail.height) * ratio * scale).round() as u32,
        )
    };

    let (width, height) = scaled(1.0);
    let thumbnail = files.transform(file, width, height)?;
    let (width, height) = scaled(2.0);
    let thumbnail2x = files.transform(file, width, height)?;

    Some(ImageData {
        size,
        thumbnail,
        thumbnail2x,
    })
}

/// Numbers the items of a multi-item collection and captions them.
fn extend_collection(items: &mut [MediaItem]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.index = Some(index + 1);
        if item.caption.is_none() {
            item.caption = Some(item.name.clone());
        }
        item.is_first = index == 0;
    }
}
