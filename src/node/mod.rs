//! The typed infobox node tree.
//!
//! Each XML element of the infobox markup is wrapped in a [`Node`] whose
//! [`NodeKind`] is chosen by tag name. Nodes resolve their values lazily
//! against the template parameters and the host parser, and memoise the
//! result, so every node is resolved at most once per render pass.
//!
//! A node borrows its [`Env`], which owns nothing: the parameters, the host
//! collaborators, and the configuration all belong to the caller. This makes
//! it impossible to keep a node tree alive after the host parser it was
//! resolved with has gone away.

use crate::{
    config::Config,
    external::{ExternalParser, FileRepository},
    render_data::{
        DataItem, GroupData, Metadata, PanelData, RenderData, SectionData, SourceMetadata,
        TextData,
    },
    xml::XmlElement,
};
use indexmap::{IndexMap, IndexSet};
use regex::{Captures, Regex};
use std::{cell::OnceCell, sync::LazyLock};

mod file_name;
mod media;

pub use media::{Dimensions, thumbnail_sizes};

/// Template parameters, or tag attributes.
pub type Params = IndexMap<String, String>;

/// A node tree error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tree contains a tag which is not part of the infobox dialect.
    #[error("unimplemented infobox tag '{0}'")]
    Unimplemented(String),
}

/// The standard result type used by the node tree.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Which kinds of media a media node accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MediaKind {
    /// `<media>`: anything, unless disabled by an attribute.
    Any,
    /// `<image>`: images only.
    Image,
    /// `<video>`: videos only.
    Video,
    /// `<audio>`: audio only.
    Audio,
}

/// The variant of a node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    /// The root `<infobox>`.
    Infobox,
    /// `<title>`.
    Title,
    /// `<header>`.
    Header,
    /// `<navigation>`.
    Navigation,
    /// `<data>`.
    Data,
    /// `<media>`, `<image>`, `<video>`, or `<audio>`.
    Media(MediaKind),
    /// `<group>`.
    Group,
    /// `<panel>`.
    Panel,
    /// `<section>`.
    Section,
    /// Any other tag. Fails on data access.
    Unimplemented(String),
}

/// Node kinds by lower-case tag name.
static NODE_KINDS: phf::Map<&'static str, NodeKind> = phf::phf_map! {
    "infobox" => NodeKind::Infobox,
    "title" => NodeKind::Title,
    "header" => NodeKind::Header,
    "navigation" => NodeKind::Navigation,
    "data" => NodeKind::Data,
    "media" => NodeKind::Media(MediaKind::Any),
    "image" => NodeKind::Media(MediaKind::Image),
    "video" => NodeKind::Media(MediaKind::Video),
    "audio" => NodeKind::Media(MediaKind::Audio),
    "group" => NodeKind::Group,
    "panel" => NodeKind::Panel,
    "section" => NodeKind::Section,
};

impl NodeKind {
    /// Returns the node kind for the given tag name.
    pub fn from_tag(tag: &str) -> Self {
        NODE_KINDS
            .get(tag.to_lowercase().as_str())
            .cloned()
            .unwrap_or_else(|| Self::Unimplemented(tag.to_string()))
    }

    /// Returns the type name used in render data and metadata.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Infobox => "infobox",
            Self::Title => "title",
            Self::Header => "header",
            Self::Navigation => "navigation",
            Self::Data => "data",
            Self::Media(MediaKind::Any) => "media",
            Self::Media(MediaKind::Image) => "image",
            Self::Media(MediaKind::Video) => "video",
            Self::Media(MediaKind::Audio) => "audio",
            Self::Group => "group",
            Self::Panel => "panel",
            Self::Section => "section",
            Self::Unimplemented(tag) => tag,
        }
    }

    /// Returns true if nodes of this kind contain other nodes.
    fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Infobox | Self::Group | Self::Panel | Self::Section
        )
    }
}

/// Everything a node tree needs to resolve itself.
pub struct Env<'a> {
    /// The template parameters.
    params: &'a Params,
    /// The host wikitext engine.
    parser: &'a dyn ExternalParser,
    /// The host file repository.
    files: &'a dyn FileRepository,
    /// The rendering configuration.
    config: &'a Config,
    /// Strip marker patterns, compiled on first use.
    markers: OnceCell<media::Markers>,
}

impl<'a> Env<'a> {
    /// Creates a new node environment.
    pub fn new(
        params: &'a Params,
        parser: &'a dyn ExternalParser,
        files: &'a dyn FileRepository,
        config: &'a Config,
    ) -> Self {
        Self {
            params,
            parser,
            files,
            config,
            markers: OnceCell::new(),
        }
    }
}

/// The resolved data of a node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    /// A single render data record.
    Item(RenderData),
    /// A sequence of records. Only produced by `<infobox>`, whose children are
    /// spliced into their parent if it is nested.
    Items(Vec<RenderData>),
}

/// An infobox node.
pub struct Node<'a> {
    /// The source element.
    xml: &'a XmlElement,
    /// The node variant.
    kind: NodeKind,
    /// The shared environment.
    env: &'a Env<'a>,
    /// Child nodes, created on first use.
    children: OnceCell<Vec<Node<'a>>>,
    /// Resolved data, created on first use.
    data: OnceCell<NodeData>,
    /// Metadata, created on first use.
    metadata: OnceCell<Metadata>,
}

impl<'a> Node<'a> {
    /// Creates the node for an XML element. This never fails; unknown tags
    /// become [`NodeKind::Unimplemented`] nodes which fail when resolved.
    pub fn new(xml: &'a XmlElement, env: &'a Env<'a>) -> Self {
        Self {
            xml,
            kind: NodeKind::from_tag(&xml.name),
            env,
            children: OnceCell::new(),
            data: OnceCell::new(),
            metadata: OnceCell::new(),
        }
    }

    /// The node variant.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The source element.
    pub fn xml(&self) -> &'a XmlElement {
        self.xml
    }

    /// The attributes of the source element. For the root node, these are the
    /// infobox parameters.
    pub fn params(&self) -> &'a Params {
        &self.xml.attributes
    }

    /// The child nodes of a container node.
    pub fn children(&self) -> &[Node<'a>] {
        self.children.get_or_init(|| {
            if !self.kind.is_container() {
                return Vec::new();
            }

            self.xml
                .elements()
                .filter(|element| !(self.kind == NodeKind::Section && element.name == "label"))
                .map(|element| Node::new(element, self.env))
                .collect()
        })
    }

    /// Resolves the node.
    pub fn render_data(&self) -> Result<&NodeData> {
        if let Some(data) = self.data.get() {
            return Ok(data);
        }
        let data = self.resolve()?;
        Ok(self.data.get_or_init(|| data))
    }

    /// Resolves the node into a flat list of records.
    pub fn records(&self) -> Result<Vec<RenderData>> {
        Ok(match self.render_data()? {
            NodeData::Item(record) => vec![record.clone()],
            NodeData::Items(records) => records.clone(),
        })
    }

    /// Returns true if the node has nothing worth rendering.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(match &self.kind {
            NodeKind::Infobox | NodeKind::Section => self.all_children_empty(|_| true)?,
            NodeKind::Group => self.all_children_empty(|child| child.kind != NodeKind::Header)?,
            NodeKind::Panel => self.all_children_empty(|child| child.kind == NodeKind::Section)?,
            NodeKind::Unimplemented(tag) => return Err(Error::Unimplemented(tag.clone())),
            _ => match self.render_data()? {
                NodeData::Item(RenderData::Navigation(data)) => data.value.trim().is_empty(),
                NodeData::Item(RenderData::Title(data) | RenderData::Header(data)) => {
                    data.value.is_empty()
                }
                NodeData::Item(RenderData::Data(data)) => data.value.is_empty(),
                NodeData::Item(record) => record
                    .media()
                    .is_none_or(|items| items.iter().all(|item| item.url.is_empty())),
                NodeData::Items(records) => records.is_empty(),
            },
        })
    }

    /// Returns the parameter metadata of this node and its children.
    pub fn metadata(&self) -> &Metadata {
        self.metadata.get_or_init(|| {
            if self.kind.is_container() {
                return Metadata {
                    kind: self.kind.type_name().to_string(),
                    sources: IndexMap::new(),
                    metadata: self
                        .children()
                        .iter()
                        .map(|child| child.metadata().clone())
                        .collect(),
                };
            }

            let label = if self.kind == NodeKind::Data {
                self.xml
                    .child("label")
                    .map(|label| label.text().trim().to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            };
            let primary = primary_source(self.xml);
            let sources = self
                .sources()
                .into_iter()
                .map(|source| {
                    let metadata = SourceMetadata {
                        label: label.clone(),
                        primary: primary == Some(source.as_str()),
                    };
                    (source, metadata)
                })
                .collect();

            Metadata {
                kind: self.kind.type_name().to_string(),
                sources,
                metadata: Vec::new(),
            }
        })
    }

    /// Returns the names of all template parameters which feed this node,
    /// without duplicates, primary source first.
    pub fn sources(&self) -> Vec<String> {
        let mut sources = IndexSet::new();
        extract_sources(self.xml, &mut sources);
        if matches!(self.kind, NodeKind::Media(_)) {
            for tag in [media::ALT_TAG, media::CAPTION_TAG] {
                if let Some(child) = self.xml.child(tag) {
                    extract_sources(child, &mut sources);
                }
            }
        }
        sources.into_iter().collect()
    }

    /// Resolves this node without memoisation.
    fn resolve(&self) -> Result<NodeData> {
        log::trace!("resolving <{}>", self.xml.name);
        let item_name = self.item_name();
        let record = match &self.kind {
            NodeKind::Infobox => return Ok(NodeData::Items(self.child_records(false)?)),
            NodeKind::Title => RenderData::Title(TextData {
                value: self.value_with_default(self.xml),
                source: self.primary_source(),
                item_name,
            }),
            NodeKind::Header => RenderData::Header(TextData {
                value: self.inner_value(Some(self.xml)),
                source: None,
                item_name,
            }),
            NodeKind::Navigation => RenderData::Navigation(TextData {
                value: self.inner_value(Some(self.xml)),
                source: None,
                item_name,
            }),
            NodeKind::Data => RenderData::Data(DataItem {
                label: self.inner_value(self.xml.child("label")),
                value: self.value_with_default(self.xml),
                span: self
                    .xml
                    .attr("span")
                    .and_then(parse_digits)
                    .filter(|span| *span > 0)
                    .unwrap_or(1),
                layout: (self.xml.attr("layout") == Some("default")).then(|| "default".to_string()),
                source: self.primary_source(),
                item_name,
            }),
            NodeKind::Media(kind) => {
                let items = media::items(self, *kind);
                match kind {
                    MediaKind::Any => RenderData::Media(items),
                    MediaKind::Image => RenderData::Image(items),
                    MediaKind::Video => RenderData::Video(items),
                    MediaKind::Audio => RenderData::Audio(items),
                }
            }
            NodeKind::Group => RenderData::Group(GroupData {
                value: self.child_records(self.xml.attr("show") == Some("incomplete"))?,
                layout: if self.xml.attr("layout") == Some("horizontal") {
                    "horizontal"
                } else {
                    "default"
                }
                .to_string(),
                collapse: self.collapse(),
                row_items: self.xml.attr("row-items").and_then(parse_digits),
                item_name,
            }),
            NodeKind::Panel => RenderData::Panel(PanelData {
                value: self.child_records(false)?,
                collapse: self.collapse(),
                item_name,
            }),
            NodeKind::Section => RenderData::Section(SectionData {
                label: self.inner_value(self.xml.child("label")),
                value: self.child_records(false)?,
                item_name,
            }),
            NodeKind::Unimplemented(tag) => return Err(Error::Unimplemented(tag.clone())),
        };
        Ok(NodeData::Item(record))
    }

    /// Resolves the children of a container node. Empty children are skipped
    /// unless `include_empty` is set.
    fn child_records(&self, include_empty: bool) -> Result<Vec<RenderData>> {
        self.check_children()?;
        let mut records = Vec::new();
        for child in self.children() {
            if !include_empty && child.is_empty()? {
                continue;
            }
            match child.render_data()? {
                NodeData::Item(record) => records.push(record.clone()),
                NodeData::Items(items) => records.extend(items.iter().cloned()),
            }
        }
        Ok(records)
    }

    /// Returns true if every child matching `filter` is empty.
    fn all_children_empty(&self, filter: impl Fn(&Node<'a>) -> bool) -> Result<bool> {
        self.check_children()?;
        for child in self.children().iter().filter(|child| filter(child)) {
            if !child.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fails if any direct child is an unknown tag, even one which would
    /// otherwise be skipped.
    fn check_children(&self) -> Result {
        match self
            .children()
            .iter()
            .find_map(|child| match &child.kind {
                NodeKind::Unimplemented(tag) => Some(tag),
                _ => None,
            }) {
            Some(tag) => Err(Error::Unimplemented(tag.clone())),
            None => Ok(()),
        }
    }

    /// The collapse state of a group or panel.
    fn collapse(&self) -> Option<String> {
        self.xml
            .attr("collapse")
            .filter(|collapse| matches!(*collapse, "open" | "closed"))
            .map(str::to_string)
    }

    /// The author-supplied item name.
    fn item_name(&self) -> Option<String> {
        self.xml.attr("name").map(str::to_string)
    }

    /// The name of the template parameter this node is primarily fed by.
    fn primary_source(&self) -> Option<String> {
        primary_source(self.xml).map(str::to_string)
    }

    /// Returns the expanded value of the template parameter `key`.
    fn param_value(&self, key: &str) -> String {
        self.env
            .params
            .get(key)
            .map(|raw| self.parse(raw))
            .unwrap_or_default()
    }

    /// Expands a wikitext fragment.
    fn parse(&self, wikitext: &str) -> String {
        if wikitext.is_empty() {
            String::new()
        } else {
            self.env.parser.parse_recursive(wikitext)
        }
    }

    /// Resolves the value of `xml` from its `source` parameter, falling back
    /// to its `<default>` child. A non-empty value is then replaced by the
    /// element's `<format>`, if it has one.
    fn value_with_default(&self, xml: &XmlElement) -> String {
        let value = primary_source(xml)
            .map(|source| self.param_value(source))
            .unwrap_or_default();

        if value.is_empty() {
            xml.child("default")
                .map(|default| self.parse(&default.text()))
                .unwrap_or_default()
        } else if let Some(format) = xml.child("format") {
            self.parse(&self.substitute(&format.text()))
        } else {
            value
        }
    }

    /// Resolves the unexpanded value of `xml` from its `source` parameter,
    /// falling back to its `<default>` child with variables replaced.
    fn raw_value_with_default(&self, xml: &XmlElement) -> String {
        let value = primary_source(xml)
            .and_then(|source| self.env.params.get(source))
            .cloned()
            .unwrap_or_default();

        if value.is_empty() {
            xml.child("default")
                .map(|default| self.env.parser.replace_variables(default.text().trim()))
                .unwrap_or_default()
        } else {
            value
        }
    }

    /// Expands the text content of an element.
    fn inner_value(&self, xml: Option<&XmlElement>) -> String {
        xml.map(|xml| self.parse(&xml.text())).unwrap_or_default()
    }

    /// Replaces `{{{name}}}` and `{{{name|fallback}}}` placeholders with raw
    /// parameter values. Placeholders without a value or fallback are kept.
    fn substitute(&self, format: &str) -> String {
        static PLACEHOLDER: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\{\{\{([^{}|]*)(?:\|([^{}]*))?\}\}\}").unwrap());

        PLACEHOLDER
            .replace_all(format, |caps: &Captures<'_>| {
                let name = caps[1].trim();
                match (self.env.params.get(name), caps.get(2)) {
                    (Some(value), _) => value.clone(),
                    (None, Some(fallback)) => fallback.as_str().to_string(),
                    (None, None) => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Returns the `source` attribute of an element, if it is non-empty.
fn primary_source(xml: &XmlElement) -> Option<&str> {
    xml.attr("source").filter(|source| !source.is_empty())
}

/// Adds the primary source of `xml` and every parameter referenced by its
/// `<format>` and `<default>` children to `sources`.
fn extract_sources(xml: &XmlElement, sources: &mut IndexSet<String>) {
    static VARIABLE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\{\{\{([^|{}]*)(?:\|.*?)?\}\}\}").unwrap());

    if let Some(source) = primary_source(xml) {
        sources.insert(source.to_string());
    }

    for tag in ["format", "default"] {
        if let Some(child) = xml.child(tag) {
            for caps in VARIABLE.captures_iter(&child.text()) {
                let name = caps[1].trim();
                if !name.is_empty() {
                    sources.insert(name.to_string());
                }
            }
        }
    }
}

/// Parses an attribute consisting only of ASCII digits.
fn parse_digits(value: &str) -> Option<u32> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}
