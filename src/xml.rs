//! A tolerant reader for the infobox XML dialect.
//!
//! Infobox markup is mostly XML, except that the content of some elements is
//! really wikitext (which may contain HTML, bare ampersands, and so on). Before
//! parsing, the content of those elements is wrapped in CDATA sections and any
//! stray ampersands are escaped.
//!
//! Unlike a typical XML reader, this one keeps going after a structural error
//! so that every problem in the markup can be reported at once. If any error
//! was found, no tree is returned.

use crate::common::format_message;
use indexmap::IndexMap;
use quick_xml::{Reader, events::Event};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Elements whose content is wikitext rather than XML.
const CONTENT_TAGS: &[&str] = &["default", "label", "format", "navigation", "header"];

/// A markup parsing error.
#[derive(Debug, thiserror::Error)]
#[error("invalid infobox markup ({} errors)", .0.len())]
pub struct Error(pub Vec<XmlError>);

/// The standard result type used by the XML reader.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// A single structural error in the markup.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct XmlError {
    /// The 1-indexed line number.
    pub line: usize,
    /// The 1-indexed column number, in characters.
    pub column: usize,
    /// A description of the problem.
    pub message: String,
}

/// A node in the XML tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum XmlNode {
    /// An element.
    Element(XmlElement),
    /// Character data, including CDATA sections and resolved entities.
    Text(String),
}

/// An XML element.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct XmlElement {
    /// The tag name, in its original case.
    pub name: String,
    /// The attributes, in document order.
    pub attributes: IndexMap<String, String>,
    /// The child nodes, in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the value of the attribute `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns the first child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.name == name)
    }

    /// Returns an iterator over all child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Returns the concatenated text of the direct text children of this
    /// element. Text inside child elements is not included.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Appends text, merging it with a trailing text node.
    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

/// Parses infobox markup into an XML tree.
pub fn parse(text: &str) -> Result<XmlElement> {
    let prepared = prepare(text);
    Parser::new(text, &prepared).run()
}

/// Markup rewritten for the XML reader.
///
/// Preparation only ever inserts text, so every position in the rewritten
/// markup maps back to a position in the original.
#[derive(Debug, Default)]
pub(crate) struct Prepared {
    /// The rewritten markup.
    pub text: String,
    /// The spans inserted by each rewrite pass, as `(offset, length)` pairs in
    /// the output of that pass.
    passes: Vec<Vec<(usize, usize)>>,
}

impl Prepared {
    /// Maps a byte offset in the rewritten markup to the original markup.
    /// Offsets inside inserted text map to the insertion point.
    fn original_offset(&self, mut position: usize) -> usize {
        for pass in self.passes.iter().rev() {
            let shift = pass
                .iter()
                .take_while(|(start, _)| *start < position)
                .map(|(start, len)| (*len).min(position - start))
                .sum::<usize>();
            position -= shift;
        }
        position
    }
}

/// One rewrite pass over the markup.
#[derive(Default)]
struct Pass {
    out: String,
    inserted: Vec<(usize, usize)>,
}

impl Pass {
    fn copy(&mut self, text: &str) {
        self.out += text;
    }

    fn insert(&mut self, text: &str) {
        self.inserted.push((self.out.len(), text.len()));
        self.out += text;
    }
}

/// Wraps the content of the wikitext content elements in CDATA sections and
/// escapes any ampersand which is not part of an entity.
pub(crate) fn prepare(text: &str) -> Prepared {
    static CONTENT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        CONTENT_TAGS
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?s)(<{tag}(?:\s(?:[^>]*[^/>])?)?>)(.*?)(</{tag}>)")).unwrap()
            })
            .collect()
    });
    static CDATA: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[.*?\]\]>").unwrap());
    static AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"&(#[0-9]+;|#[xX][0-9a-fA-F]+;|[A-Za-z][A-Za-z0-9]*;)?").unwrap()
    });

    let mut prepared = Prepared {
        text: text.to_string(),
        passes: Vec::new(),
    };

    for re in CONTENT.iter() {
        if !re.is_match(&prepared.text) {
            continue;
        }

        let mut pass = Pass::default();
        let mut last = 0;
        for caps in re.captures_iter(&prepared.text) {
            let (Some(whole), Some(open), Some(content), Some(close)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            pass.copy(&prepared.text[last..whole.start()]);
            last = whole.end();

            let content = content.as_str();
            if content.starts_with("<![CDATA[") {
                pass.copy(whole.as_str());
                continue;
            }

            pass.copy(open.as_str());
            pass.insert("<![CDATA[");
            let mut pieces = content.split("]]>");
            if let Some(first) = pieces.next() {
                pass.copy(first);
            }
            for piece in pieces {
                pass.copy("]]");
                pass.insert("]]><![CDATA[");
                pass.copy(">");
                pass.copy(piece);
            }
            pass.insert("]]>");
            pass.copy(close.as_str());
        }
        pass.copy(&prepared.text[last..]);

        prepared.text = pass.out;
        prepared.passes.push(pass.inserted);
    }

    let mut pass = Pass::default();
    let mut last = 0;
    let escape = |pass: &mut Pass, segment: &str| {
        let mut last = 0;
        for caps in AMPERSAND.captures_iter(segment) {
            let (Some(whole), None) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            pass.copy(&segment[last..whole.end()]);
            pass.insert("amp;");
            last = whole.end();
        }
        pass.copy(&segment[last..]);
    };
    for cdata in CDATA.find_iter(&prepared.text) {
        escape(&mut pass, &prepared.text[last..cdata.start()]);
        pass.copy(cdata.as_str());
        last = cdata.end();
    }
    escape(&mut pass, &prepared.text[last..]);

    prepared.text = pass.out;
    prepared.passes.push(pass.inserted);
    prepared
}

/// An element which has been opened but not yet closed.
struct OpenElement {
    /// The element under construction.
    element: XmlElement,
    /// The line of the start tag.
    line: usize,
}

/// The XML tree builder.
struct Parser<'a> {
    /// The original markup, used for error positions.
    original: &'a str,
    /// The prepared markup.
    prepared: &'a Prepared,
    /// The prepared source text.
    source: &'a str,
    /// Elements which are still open.
    stack: Vec<OpenElement>,
    /// Completed top-level elements.
    roots: Vec<(XmlElement, usize)>,
    /// All errors found so far.
    errors: Vec<XmlError>,
}

impl<'a> Parser<'a> {
    /// Creates a new tree builder for the given source.
    fn new(original: &'a str, prepared: &'a Prepared) -> Self {
        Self {
            original,
            prepared,
            source: &prepared.text,
            stack: Vec::new(),
            roots: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Reads the whole source.
    fn run(mut self) -> Result<XmlElement> {
        let mut reader = Reader::from_str(self.source);
        reader.config_mut().check_end_names = false;

        loop {
            let start = to_offset(reader.buffer_position());
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = self.element(e.name().as_ref(), e.attributes(), start);
                    let (line, _) = self.line_col(start);
                    self.stack.push(OpenElement { element, line });
                }
                Ok(Event::Empty(e)) => {
                    let element = self.element(e.name().as_ref(), e.attributes(), start);
                    self.close(element, start);
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.end(&name, start);
                }
                Ok(Event::Text(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    self.text(&text, start);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    self.text(&text, start);
                }
                Ok(Event::GeneralRef(e)) => {
                    let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let text = resolve_entity(&name);
                    self.text(&text, start);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    let position = to_offset(reader.error_position());
                    self.error(position, err.to_string());
                    break;
                }
            }
        }

        let end = self.source.len();
        while let Some(open) = self.stack.pop() {
            let line = open.line.to_string();
            let message = format_message(
                "portable-infobox-xml-parse-error-unclosed-tag",
                &[&open.element.name, &line],
            );
            self.error(end, message.into_owned());
            self.close(open.element, end);
        }

        if self.roots.is_empty() && self.errors.is_empty() {
            self.error(
                end,
                format_message("portable-infobox-xml-parse-error-document-empty", &[]).into_owned(),
            );
        }

        if self.errors.is_empty() && self.roots.len() == 1 {
            let (root, _) = self.roots.remove(0);
            Ok(root)
        } else {
            Err(Error(self.errors))
        }
    }

    /// Builds an element from a start tag.
    fn element(
        &mut self,
        name: &[u8],
        attributes: quick_xml::events::attributes::Attributes<'_>,
        position: usize,
    ) -> XmlElement {
        let mut element = XmlElement::new(String::from_utf8_lossy(name));
        for attribute in attributes {
            match attribute {
                Ok(attribute) => {
                    let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                    let value = String::from_utf8_lossy(&attribute.value);
                    let value = html_escape::decode_html_entities(&value).into_owned();
                    element.attributes.insert(key, value);
                }
                Err(err) => self.error(position, err.to_string()),
            }
        }
        element
    }

    /// Handles an end tag.
    fn end(&mut self, name: &str, position: usize) {
        let Some(index) = self
            .stack
            .iter()
            .rposition(|open| open.element.name == name)
        else {
            let message =
                format_message("portable-infobox-xml-parse-error-unexpected-end-tag", &[name]);
            self.error(position, message.into_owned());
            return;
        };

        if index != self.stack.len() - 1 {
            let top = &self.stack[self.stack.len() - 1];
            let line = top.line.to_string();
            let message = format_message(
                "portable-infobox-xml-parse-error-mismatched-tag",
                &[&top.element.name, &line, name],
            );
            self.error(position, message.into_owned());
        }

        while self.stack.len() > index {
            if let Some(open) = self.stack.pop() {
                self.close(open.element, position);
            }
        }
    }

    /// Attaches a completed element to its parent, or to the list of roots.
    fn close(&mut self, element: XmlElement, position: usize) {
        if let Some(parent) = self.stack.last_mut() {
            parent.element.children.push(XmlNode::Element(element));
        } else {
            if !self.roots.is_empty() {
                let message =
                    format_message("portable-infobox-xml-parse-error-extra-content", &[]);
                self.error(position, message.into_owned());
            }
            let (line, _) = self.line_col(position);
            self.roots.push((element, line));
        }
    }

    /// Handles character data.
    fn text(&mut self, text: &str, position: usize) {
        if let Some(parent) = self.stack.last_mut() {
            parent.element.push_text(text);
        } else if !text.trim().is_empty() {
            let key = if self.roots.is_empty() {
                "portable-infobox-xml-parse-error-start-tag-expected"
            } else {
                "portable-infobox-xml-parse-error-extra-content"
            };
            self.error(position, format_message(key, &[]).into_owned());
        }
    }

    /// Records an error at the given byte offset.
    fn error(&mut self, position: usize, message: String) {
        let (line, column) = self.line_col(position);
        log::trace!("xml error at {line}:{column}: {message}");
        self.errors.push(XmlError {
            line,
            column,
            message,
        });
    }

    /// Converts a byte offset in the prepared markup into a 1-indexed line and
    /// column of the original markup.
    fn line_col(&self, position: usize) -> (usize, usize) {
        let position = self.prepared.original_offset(position.min(self.source.len()));
        let position = self.original.floor_char_boundary(position.min(self.original.len()));
        let before = &self.original[..position];
        let line = memchr::memchr_iter(b'\n', before.as_bytes()).count() + 1;
        let line_start = memchr::memrchr(b'\n', before.as_bytes()).map_or(0, |index| index + 1);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }
}

/// Converts a reader position into a byte offset.
fn to_offset<T>(position: T) -> usize
where
    usize: TryFrom<T>,
{
    usize::try_from(position).unwrap_or(usize::MAX)
}

/// Resolves a general entity reference by name. Unknown entities are kept
/// verbatim.
fn resolve_entity(name: &str) -> String {
    if let Some(number) = name.strip_prefix('#') {
        let code = if let Some(hex) = number.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            number.parse::<u32>().ok()
        };
        if let Some(c) = code.and_then(char::from_u32) {
            return c.to_string();
        }
    } else {
        let entity = format!("&{name};");
        let decoded = html_escape::decode_html_entities(&entity);
        if decoded != entity {
            return decoded.into_owned();
        }
    }
    format!("&{name};")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_tree() {
        let root = parse(r#"<infobox theme="x"><data source="a"><label>A</label></data></infobox>"#)
            .unwrap();
        assert_eq!(root.name, "infobox");
        assert_eq!(root.attr("theme"), Some("x"));
        let data = root.child("data").unwrap();
        assert_eq!(data.attr("source"), Some("a"));
        assert_eq!(data.child("label").unwrap().text(), "A");
    }

    #[test]
    fn self_closing() {
        let root = parse(r#"<infobox><image source="img"/><title source="t" /></infobox>"#).unwrap();
        let names = root.elements().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["image", "title"]);
    }

    #[test]
    fn content_tags_hold_markup() {
        let root = parse(
            "<infobox><data><default>'''bold''' & <b>html</b> [[Link|x]]</default></data></infobox>",
        )
        .unwrap();
        let default = root.child("data").unwrap().child("default").unwrap();
        assert_eq!(default.text(), "'''bold''' & <b>html</b> [[Link|x]]");
    }

    #[test]
    fn entities_in_attributes_and_text() {
        let root = parse(r#"<infobox name="a &amp; b"><title>x &lt; y &#65;&nbsp;</title></infobox>"#)
            .unwrap();
        assert_eq!(root.attr("name"), Some("a & b"));
        assert_eq!(root.child("title").unwrap().text(), "x < y A\u{a0}");
    }

    #[test]
    fn stray_ampersand_is_escaped() {
        assert_eq!(prepare("<a b='x & y'/>").text, "<a b='x &amp; y'/>");
        assert_eq!(prepare("<a>&amp;</a>").text, "<a>&amp;</a>");
        assert_eq!(
            prepare("<label>a & b</label>").text,
            "<label><![CDATA[a & b]]></label>"
        );
    }

    #[test]
    fn self_closing_content_tag_not_wrapped() {
        assert_eq!(
            prepare("<default /><x/><default>y</default>").text,
            "<default /><x/><default><![CDATA[y]]></default>"
        );
    }

    #[test]
    fn collects_all_errors() {
        let err = parse("<infobox>\n<data>\n<title></data>\n</infobox>\n<foo>").unwrap_err();
        let messages = err.0.iter().map(|e| e.message.as_str()).collect::<Vec<_>>();
        assert_eq!(
            messages,
            [
                "Opening and ending tag mismatch: title line 3 and data",
                "Premature end of data in tag foo line 5",
                "Extra content at the end of the document",
            ]
        );
        assert_eq!((err.0[0].line, err.0[0].column), (3, 8));
    }

    #[test]
    fn nested_cdata_end_is_split() {
        assert_eq!(
            prepare("<label>a]]>b</label>").text,
            "<label><![CDATA[a]]]]><![CDATA[>b]]></label>"
        );
    }

    #[test]
    fn error_columns_match_original_markup() {
        let prepared = prepare("<label>x</label> & <b/>");
        assert_eq!(prepared.text, "<label><![CDATA[x]]></label> &amp; <b/>");
        assert_eq!(prepared.original_offset(0), 0);
        assert_eq!(prepared.original_offset(16), 7);
        assert_eq!(prepared.original_offset(20), 8);
        assert_eq!(prepared.original_offset(35), 19);

        let err = parse("<infobox><label>a & b</label> & <x></infobox>").unwrap_err();
        assert_eq!(err.0[0].message, "Opening and ending tag mismatch: x line 1 and infobox");
        assert_eq!((err.0[0].line, err.0[0].column), (1, 36));
    }

    #[test]
    fn unexpected_end_tag() {
        let err = parse("<infobox></title></infobox>").unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].message, "Unexpected end tag: title");
    }

    #[test]
    fn empty_document() {
        let err = parse("  ").unwrap_err();
        assert_eq!(err.0[0].message, "Document is empty");
    }
}
