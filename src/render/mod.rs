//! Turns render data into infobox HTML.
//!
//! Every record type has a template under `templates/infobox`. Groups choose
//! between three layouts: smart rows when `row-items` is set, a table when the
//! layout is `horizontal`, and their children in order otherwise. Media records
//! render as a single figure or, when they hold more than one item, as a tabbed
//! collection.

use crate::{
    config::Config,
    render_data::{DataItem, GroupData, MediaItem, PanelData, RenderData, TextData},
    sanitize,
};
use sailfish::TemplateSimple;
use smart_group::Row;
use std::cell::Cell;

mod smart_group;
pub(crate) mod templates;
#[cfg(test)]
mod tests;

/// A rendering error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A template failed to render.
    #[error("template error: {0}")]
    Template(#[from] sailfish::RenderError),
}

/// The standard result type used by the render service.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Attributes of the infobox wrapper, already validated.
#[derive(Clone, Debug, Default)]
pub struct InfoboxAttributes {
    /// Space-separated theme classes.
    pub theme: String,
    /// The layout class.
    pub layout: String,
    /// The background colour of titles and headers.
    pub accent_color: String,
    /// The text colour of titles and headers.
    pub accent_color_text: String,
    /// The type class.
    pub kind: String,
    /// The author-supplied name of the infobox.
    pub item_name: Option<String>,
}

/// Renders infoboxes for one page.
///
/// Media collection tab ids are numbered from a counter held by the service,
/// so that every collection on the page gets unique ids. Use a new service for
/// each page.
#[derive(Debug)]
pub struct RenderService<'c> {
    /// The rendering configuration.
    config: &'c Config,
    /// The number of media collection tabs rendered so far.
    tab_offset: Cell<usize>,
}

impl<'c> RenderService<'c> {
    /// Creates a new render service.
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            tab_offset: Cell::new(0),
        }
    }

    /// Renders one infobox. If none of its records produce any output, the
    /// result is empty.
    pub fn render_infobox(&self, data: &[RenderData], attrs: &InfoboxAttributes) -> Result<String> {
        let pass = Pass {
            service: self,
            inline_styles: inline_styles(&attrs.accent_color, &attrs.accent_color_text),
        };

        let content = pass.render_children(data)?;
        if content.is_empty() {
            return Ok(content);
        }

        let mut classes = String::new();
        for class in [&attrs.theme, &attrs.layout, &attrs.kind] {
            if !class.is_empty() {
                classes.push(' ');
                classes += class;
            }
        }

        Ok(templates::Wrapper {
            classes: &classes,
            attrs: &item_attrs(None, attrs.item_name.as_deref()),
            content: &content,
        }
        .render_once()?)
    }

    /// The heading element for a level, or `div` if headings are disabled.
    fn heading(&self, level: &'static str) -> &'static str {
        if self.config.use_headings { level } else { "div" }
    }
}

/// The state of one [`RenderService::render_infobox`] call.
struct Pass<'s, 'c> {
    /// The owning service.
    service: &'s RenderService<'c>,
    /// The accent colour style for titles and headers.
    inline_styles: String,
}

impl Pass<'_, '_> {
    fn render_children(&self, children: &[RenderData]) -> Result<String> {
        let mut out = String::new();
        for child in children {
            out += &self.render_item(child)?;
        }
        Ok(out)
    }

    fn render_item(&self, item: &RenderData) -> Result<String> {
        match item {
            RenderData::Title(data) => self.render_title(data),
            RenderData::Header(data) => self.render_header(data),
            RenderData::Navigation(data) => Ok(templates::Navigation {
                attrs: &item_attrs(data.source.as_deref(), data.item_name.as_deref()),
                value: &data.value,
            }
            .render_once()?),
            RenderData::Data(data) => self.render_data(data),
            RenderData::Media(items)
            | RenderData::Image(items)
            | RenderData::Video(items)
            | RenderData::Audio(items) => self.render_media(items),
            RenderData::Group(group) => self.render_group(group),
            RenderData::Panel(panel) => self.render_panel(panel),
            // Sections are only rendered by their panel.
            RenderData::Section(_) => Ok(String::new()),
            RenderData::Unsupported => {
                log::info!("skipping unsupported infobox item type");
                Ok(String::new())
            }
        }
    }

    fn render_title(&self, data: &TextData) -> Result<String> {
        Ok(templates::Title {
            tag: self.service.heading("h2"),
            style: &self.style_attr(),
            attrs: &item_attrs(data.source.as_deref(), data.item_name.as_deref()),
            value: &sanitize::TITLE.sanitize(&data.value),
        }
        .render_once()?)
    }

    fn render_header(&self, data: &TextData) -> Result<String> {
        Ok(templates::Header {
            tag: self.service.heading("h2"),
            style: &self.style_attr(),
            attrs: &item_attrs(data.source.as_deref(), data.item_name.as_deref()),
            value: &data.value,
        }
        .render_once()?)
    }

    fn render_data(&self, data: &DataItem) -> Result<String> {
        Ok(templates::Data {
            tag: self.service.heading("h3"),
            attrs: &item_attrs(data.source.as_deref(), data.item_name.as_deref()),
            label: &sanitize::DATA.sanitize(&data.label),
            value: &data.value,
        }
        .render_once()?)
    }

    fn render_media(&self, items: &[MediaItem]) -> Result<String> {
        match items {
            [] => Ok(String::new()),
            [item] => {
                let caption = item
                    .caption
                    .as_deref()
                    .map(|caption| sanitize::IMAGE.sanitize(caption))
                    .unwrap_or_default();
                self.render_figure(item, &caption, true)
            }
            [first, ..] => {
                let offset = self.service.tab_offset.get();
                self.service.tab_offset.set(offset + items.len());

                let tabs = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| -> Result<_> {
                        Ok(templates::Tab {
                            id: format!("pi-tab-{}", offset + item.index.unwrap_or(index + 1)),
                            caption: sanitize::IMAGE
                                .sanitize(item.caption.as_deref().unwrap_or_default()),
                            current: item.is_first,
                            figure: self.render_figure(item, "", false)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(templates::MediaCollection {
                    attrs: &item_attrs(first.source.as_deref(), first.item_name.as_deref()),
                    tabs,
                }
                .render_once()?)
            }
        }
    }

    /// Renders one media item. Items inside a collection carry their source
    /// on the collection instead.
    fn render_figure(&self, item: &MediaItem, caption: &str, with_attrs: bool) -> Result<String> {
        let kind = if item.is_video {
            "video"
        } else if item.is_audio {
            "audio"
        } else {
            "image"
        };
        let attrs = if with_attrs {
            item_attrs(item.source.as_deref(), item.item_name.as_deref())
        } else {
            String::new()
        };

        Ok(templates::Media {
            kind,
            attrs: &attrs,
            item,
            alt: item.alt.as_deref().unwrap_or_default(),
            caption,
            thumbnail: item.thumbnail.as_deref().unwrap_or_default(),
            thumbnail2x: item.thumbnail2x.as_deref().unwrap_or_default(),
            width: item.width.unwrap_or_default(),
            height: item.height.unwrap_or_default(),
        }
        .render_once()?)
    }

    fn render_group(&self, group: &GroupData) -> Result<String> {
        let content = match group.row_items {
            Some(capacity) if capacity > 0 => self.render_smart_rows(&group.value, capacity)?,
            _ if group.layout == "horizontal" => self.render_horizontal(&group.value)?,
            _ => self.render_children(&group.value)?,
        };

        let classes = match (&group.collapse, group.value.first()) {
            (Some(collapse), Some(RenderData::Header(_))) => {
                format!(" pi-collapse pi-collapse-{collapse}")
            }
            _ => String::new(),
        };

        Ok(templates::Group {
            classes: &classes,
            attrs: &item_attrs(None, group.item_name.as_deref()),
            content: &content,
        }
        .render_once()?)
    }

    fn render_smart_rows(&self, items: &[RenderData], capacity: u32) -> Result<String> {
        let mut out = String::new();
        for row in smart_group::pack(items, capacity) {
            out += &match row {
                Row::Item(item) => self.render_item(item)?,
                Row::Smart(cells) => {
                    let cells = cells
                        .into_iter()
                        .map(|cell| templates::SmartCell {
                            label: sanitize::DATA.sanitize(&cell.data.label),
                            value: cell.data.value.clone(),
                            style: cell.style,
                            attrs: item_attrs(
                                cell.data.source.as_deref(),
                                cell.data.item_name.as_deref(),
                            ),
                        })
                        .collect::<Vec<_>>();
                    templates::SmartGroup {
                        tag: self.service.heading("h3"),
                        render_labels: cells.iter().any(|cell| !cell.label.is_empty()),
                        cells,
                    }
                    .render_once()?
                }
            };
        }
        Ok(out)
    }

    fn render_horizontal(&self, items: &[RenderData]) -> Result<String> {
        let mut caption = None;
        let mut data = Vec::new();
        for item in items {
            match item {
                RenderData::Data(item) => data.push(item),
                RenderData::Header(header) => caption = Some(header.value.as_str()),
                _ => {}
            }
        }

        let labels =
            sanitize::HORIZONTAL_GROUP.sanitize_labels(data.iter().map(|item| item.label.as_str()));
        let render_labels = labels.iter().any(|label| !label.is_empty());
        let cells = data
            .into_iter()
            .zip(labels)
            .map(|(item, label)| templates::HorizontalCell {
                label,
                value: item.value.clone(),
                attrs: item_attrs(item.source.as_deref(), item.item_name.as_deref()),
            })
            .collect();

        let style = if caption.is_some() {
            self.style_attr()
        } else {
            String::new()
        };

        Ok(templates::HorizontalGroup {
            caption: caption.unwrap_or_default(),
            style: &style,
            render_labels,
            cells,
        }
        .render_once()?)
    }

    fn render_panel(&self, panel: &PanelData) -> Result<String> {
        let mut header = String::new();
        let mut sections = Vec::new();
        for (index, child) in panel.value.iter().enumerate() {
            match child {
                RenderData::Header(data) if header.is_empty() => {
                    header = self.render_header(data)?;
                }
                RenderData::Section(section) => {
                    let content = self.render_children(&section.value)?;
                    if !content.is_empty() {
                        sections.push(templates::PanelSection {
                            index,
                            label: section.label.clone(),
                            content,
                            active: false,
                            attrs: item_attrs(None, section.item_name.as_deref()),
                        });
                    }
                }
                _ => {}
            }
        }

        if sections.is_empty() {
            return Ok(String::new());
        }

        let show_toggles = sections.iter().any(|section| !section.label.is_empty());
        for (index, section) in sections.iter_mut().enumerate() {
            section.active = index == 0 || !show_toggles;
        }

        let classes = match &panel.collapse {
            Some(collapse) if !header.is_empty() => format!(" pi-collapse pi-collapse-{collapse}"),
            _ => String::new(),
        };

        Ok(templates::Panel {
            classes: &classes,
            attrs: &item_attrs(None, panel.item_name.as_deref()),
            header: &header,
            show_toggles,
            sections,
        }
        .render_once()?)
    }

    /// The `style` attribute for titles and headers, or an empty string if no
    /// accent colours are set.
    fn style_attr(&self) -> String {
        if self.inline_styles.is_empty() {
            String::new()
        } else {
            format!(
                r#" style="{}""#,
                html_escape::encode_double_quoted_attribute(&self.inline_styles)
            )
        }
    }
}

/// Builds the accent colour declarations.
fn inline_styles(color: &str, text_color: &str) -> String {
    let mut out = String::new();
    if !color.is_empty() {
        out += &format!("background-color:{color};");
    }
    if !text_color.is_empty() {
        out += &format!("color:{text_color};");
    }
    out
}

/// Builds the `data-source` and `data-item-name` attributes of an item.
fn item_attrs(source: Option<&str>, item_name: Option<&str>) -> String {
    let mut out = String::new();
    for (name, value) in [("data-source", source), ("data-item-name", item_name)] {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            out += &format!(
                r#" {name}="{}""#,
                html_escape::encode_double_quoted_attribute(value)
            );
        }
    }
    out
}
