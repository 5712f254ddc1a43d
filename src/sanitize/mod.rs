//! HTML cleaners for infobox labels, titles, and captions.
//!
//! Each sanitizer reduces a fragment of expanded HTML to its text, keeping only
//! a few allowed tags and any whole "feature" subtrees, like citation markers.

pub(crate) mod dom;

use dom::{Dom, NodeId};
use regex::Regex;
use std::sync::LazyLock;

/// How an attribute selector compares values.
#[derive(Clone, Copy, Debug)]
enum AttrMatch {
    /// `[attr=value]`
    Equals(&'static str),
    /// `[attr~=value]`
    Includes(&'static str),
}

/// A simple `tag[attr op value]` selector.
#[derive(Clone, Copy, Debug)]
struct Selector {
    tag: &'static str,
    attr: Option<(&'static str, AttrMatch)>,
}

impl Selector {
    const fn tag(tag: &'static str) -> Self {
        Self { tag, attr: None }
    }

    const fn with(tag: &'static str, attr: &'static str, op: AttrMatch) -> Self {
        Self {
            tag,
            attr: Some((attr, op)),
        }
    }

    fn matches(&self, dom: &Dom, id: NodeId) -> bool {
        if dom.name(id) != Some(self.tag) {
            return false;
        }

        match self.attr {
            None => true,
            Some((name, op)) => dom.attr(id, name).is_some_and(|value| match op {
                AttrMatch::Equals(expected) => value == expected,
                AttrMatch::Includes(expected) => {
                    value.split_ascii_whitespace().any(|word| word == expected)
                }
            }),
        }
    }
}

/// A citation marker.
const REFERENCE: Selector = Selector::with("sup", "class", AttrMatch::Includes("reference"));
const SCRIPT: Selector = Selector::tag("script");
const STYLE: Selector = Selector::tag("style");

/// A set of rules for cleaning one kind of field.
#[derive(Debug)]
pub struct Sanitizer {
    /// Tags kept, with their attributes, when they contain text.
    allowed: &'static [&'static str],
    /// Subtrees kept verbatim.
    features: &'static [Selector],
    /// Subtrees removed, text included.
    removals: &'static [Selector],
}

/// The sanitizer for data labels.
pub static DATA: Sanitizer = Sanitizer {
    allowed: &["a"],
    features: &[REFERENCE],
    removals: &[
        SCRIPT,
        STYLE,
        Selector::with("span", "itemprop", AttrMatch::Equals("duration")),
    ],
};

/// The sanitizer for infobox titles.
pub static TITLE: Sanitizer = Sanitizer {
    allowed: &[],
    features: &[REFERENCE],
    removals: &[SCRIPT, STYLE],
};

/// The sanitizer for horizontal group labels.
pub static HORIZONTAL_GROUP: Sanitizer = Sanitizer {
    allowed: &["a"],
    features: &[],
    removals: &[SCRIPT, STYLE],
};

/// The sanitizer for media captions.
pub static IMAGE: Sanitizer = Sanitizer {
    allowed: &[],
    features: &[],
    removals: &[SCRIPT, STYLE],
};

impl Sanitizer {
    /// Cleans a fragment of HTML.
    pub fn sanitize(&self, text: &str) -> String {
        static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

        if text.is_empty() {
            return String::new();
        }

        let mut dom = Dom::parse_fragment(text);
        let body = dom.body();

        let removed = dom
            .descendants(body)
            .into_iter()
            .filter(|id| self.removals.iter().any(|selector| selector.matches(&dom, *id)))
            .collect::<Vec<_>>();
        for id in removed {
            dom.detach(id);
        }

        let mut out = String::new();
        self.write_children(&dom, body, &mut out);
        let out = WHITESPACE.replace_all(&out, " ").trim().to_string();

        if out != text {
            log::info!("stripped HTML from infobox field: {text:?} -> {out:?}");
        }

        out
    }

    /// Cleans each label of a horizontal group. Labels which would become empty
    /// are kept unchanged.
    pub fn sanitize_labels<'a>(&self, labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        labels
            .into_iter()
            .map(|label| {
                let sanitized = self.sanitize(label);
                if sanitized.is_empty() {
                    label.to_string()
                } else {
                    sanitized
                }
            })
            .collect()
    }

    fn write_children(&self, dom: &Dom, id: NodeId, out: &mut String) {
        for &child in dom.children(id) {
            if let Some(text) = dom.text(child) {
                out.push_str(&html_escape::encode_text(text));
                continue;
            }

            let Some(name) = dom.name(child) else {
                continue;
            };

            if self.features.iter().any(|selector| selector.matches(dom, child)) {
                out.push_str(&dom.outer_html(child));
            } else if self.allowed.contains(&name) {
                // Empty links are dropped.
                if !dom.text_content(child).trim().is_empty() {
                    out.push_str(&dom.start_tag(child));
                    self.write_children(dom, child, out);
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            } else {
                self.write_children(dom, child, out);
            }
        }
    }
}
