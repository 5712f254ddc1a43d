//! Template bindings for each rendered item.
//!
//! Fields rendered with `<%- %>` are HTML which has already been expanded by
//! the host parser or built by the render service, and must not be escaped
//! again. Attribute strings (`attrs`, `style`) are complete, pre-escaped
//! attribute lists with a leading space, or empty.

use crate::render_data::MediaItem;
use sailfish::TemplateSimple;

#[derive(TemplateSimple)]
#[template(path = "infobox/wrapper.html")]
pub(super) struct Wrapper<'a> {
    /// Space-prefixed theme, layout, and type classes.
    pub classes: &'a str,
    pub attrs: &'a str,
    pub content: &'a str,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/title.html")]
pub(super) struct Title<'a> {
    /// `h2` or `div`.
    pub tag: &'a str,
    pub style: &'a str,
    pub attrs: &'a str,
    pub value: &'a str,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/header.html")]
pub(super) struct Header<'a> {
    /// `h2` or `div`.
    pub tag: &'a str,
    pub style: &'a str,
    pub attrs: &'a str,
    pub value: &'a str,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/navigation.html")]
pub(super) struct Navigation<'a> {
    pub attrs: &'a str,
    pub value: &'a str,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/data.html")]
pub(super) struct Data<'a> {
    /// `h3` or `div`.
    pub tag: &'a str,
    pub attrs: &'a str,
    pub label: &'a str,
    pub value: &'a str,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/media.html")]
pub(super) struct Media<'a> {
    /// `image`, `video`, or `audio`.
    pub kind: &'a str,
    pub attrs: &'a str,
    pub item: &'a MediaItem,
    pub alt: &'a str,
    pub caption: &'a str,
    pub thumbnail: &'a str,
    pub thumbnail2x: &'a str,
    pub width: u32,
    pub height: u32,
}

/// One tab of a media collection.
pub(super) struct Tab {
    /// The element id shared by the tab link and its content.
    pub id: String,
    pub caption: String,
    pub current: bool,
    /// The rendered media, without its caption.
    pub figure: String,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/media_collection.html")]
pub(super) struct MediaCollection<'a> {
    pub attrs: &'a str,
    pub tabs: Vec<Tab>,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/group.html")]
pub(super) struct Group<'a> {
    /// Space-prefixed collapse classes.
    pub classes: &'a str,
    pub attrs: &'a str,
    pub content: &'a str,
}

/// One column of a horizontal group.
pub(super) struct HorizontalCell {
    pub label: String,
    pub value: String,
    pub attrs: String,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/horizontal_group.html")]
pub(super) struct HorizontalGroup<'a> {
    pub caption: &'a str,
    pub style: &'a str,
    pub render_labels: bool,
    pub cells: Vec<HorizontalCell>,
}

/// One item of a smart group row.
pub(super) struct SmartCell {
    pub label: String,
    pub value: String,
    /// The width declaration.
    pub style: String,
    pub attrs: String,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/smart_group.html")]
pub(super) struct SmartGroup<'a> {
    /// `h3` or `div`.
    pub tag: &'a str,
    pub render_labels: bool,
    pub cells: Vec<SmartCell>,
}

/// One section of a panel.
pub(super) struct PanelSection {
    /// The position of the section among the panel's children.
    pub index: usize,
    pub label: String,
    pub content: String,
    pub active: bool,
    pub attrs: String,
}

#[derive(TemplateSimple)]
#[template(path = "infobox/panel.html")]
pub(super) struct Panel<'a> {
    /// Space-prefixed collapse classes.
    pub classes: &'a str,
    pub attrs: &'a str,
    /// The rendered header, if any.
    pub header: &'a str,
    pub show_toggles: bool,
    pub sections: Vec<PanelSection>,
}

/// One line of infobox markup in the debug view.
pub(crate) struct DebugLine {
    pub text: String,
    pub has_error: bool,
}

/// The authoring view of markup which failed to parse.
#[derive(TemplateSimple)]
#[template(path = "infobox/markup_debug.html")]
pub(crate) struct MarkupDebug<'a> {
    /// The error list introduction.
    pub info: &'a str,
    /// The markup listing heading.
    pub heading: &'a str,
    /// Formatted error messages.
    pub errors: Vec<String>,
    pub lines: Vec<DebugLine>,
}
