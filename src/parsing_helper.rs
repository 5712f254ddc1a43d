//! Extraction of infobox markup from raw page text.
//!
//! These are used to re-render the infoboxes of a page without running it
//! through the host parser, for example when a template page hides its
//! infobox inside `<includeonly>`.

use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};

/// Removes `<nowiki>` and `<pre>` sections, along with their content.
pub fn remove_nowiki_pre(text: &str) -> String {
    static NOWIKI: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<nowiki>.+?</nowiki>").unwrap());
    static PRE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<pre>.+?</pre>").unwrap());

    let text = NOWIKI.replace_all(text, "");
    PRE.replace_all(&text, "").into_owned()
}

/// Returns the text a page contributes when it is transcluded.
///
/// If the page has any `<onlyinclude>` sections, only their content is kept.
/// Otherwise, `<noinclude>` sections are removed and `<includeonly>` tags are
/// unwrapped.
pub fn transcluded_text(text: &str) -> Cow<'_, str> {
    static ONLYINCLUDE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<onlyinclude>(.*?)</onlyinclude>").unwrap());
    static NOINCLUDE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<noinclude>.*?(?:</noinclude>|$)").unwrap());
    static INCLUDEONLY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"</?includeonly>").unwrap());

    if ONLYINCLUDE.is_match(text) {
        return Cow::Owned(
            ONLYINCLUDE
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|content| content.as_str())
                .collect(),
        );
    }

    match NOINCLUDE.replace_all(text, "") {
        Cow::Borrowed(text) => INCLUDEONLY.replace_all(text, ""),
        Cow::Owned(text) => Cow::Owned(INCLUDEONLY.replace_all(&text, "").into_owned()),
    }
}

/// Finds every `<infobox>` tag in the text. Self-closing tags come first,
/// followed by tags with content, each in page order.
pub fn get_infoboxes(text: &str) -> Vec<&str> {
    static EMPTY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<infobox[^>]*?/>").unwrap());
    static FULL: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<infobox.+?</infobox>").unwrap());

    EMPTY
        .find_iter(text)
        .chain(FULL.find_iter(text))
        .map(|found| found.as_str())
        .collect()
}

/// Finds the markup of every infobox a page shows when transcluded.
pub fn transcluded_infoboxes(text: &str) -> Vec<String> {
    let text = remove_nowiki_pre(text);
    get_infoboxes(&transcluded_text(&text))
        .into_iter()
        .map(str::to_string)
        .collect()
}
