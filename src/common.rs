//! Helpers shared by the node tree, the render service, and the controller
//! which do not correspond to anything in the Rust standard library.

use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};

/// The i18n dictionary of user-visible messages.
pub(crate) static MESSAGES: LazyLock<serde_json::Value> =
    LazyLock::new(|| serde_json::from_str(include_str!("../res/i18n/en.json")).unwrap_or_default());

/// Any run of whitespace.
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Finds the message `key` and returns it with any `$N` placeholders replaced
/// by the corresponding (1-indexed) item in `args`. Placeholders without an
/// argument are left as-is.
///
/// If the message is not found, returns a not-found string.
pub fn format_message(key: &str, args: &[&str]) -> Cow<'static, str> {
    let Some(message) = MESSAGES
        .get(key.to_lowercase())
        .and_then(serde_json::Value::as_str)
        .filter(|message| !message.is_empty())
    else {
        return format!("⧼{}⧽", html_escape::encode_text(key)).into();
    };

    if !message.contains('$') {
        return Cow::Owned(message.to_string());
    }

    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(index) = memchr::memchr(b'$', rest.as_bytes()) {
        out += &rest[..index];
        let tail = &rest[index + 1..];
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        match tail[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| args.get(n))
        {
            Some(arg) => out += arg,
            None => {
                out.push('$');
                out += &tail[..digits];
            }
        }
        rest = &tail[digits..];
    }
    out += rest;
    Cow::Owned(out)
}

/// Replaces every run of whitespace in `text` with `with`.
pub fn replace_whitespace<'a>(text: &'a str, with: &str) -> Cow<'a, str> {
    WHITESPACE.replace_all(text, with)
}

/// Formats a float the way PHP does when converting it to a string, using 14
/// significant digits and no trailing zeros.
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    if value == value.trunc() && value.abs() < 1e15 {
        return format!("{value:.0}");
    }

    let exponent = format!("{value:.13e}")
        .split_once('e')
        .and_then(|(_, exponent)| exponent.parse::<i32>().ok())
        .unwrap_or(0);
    let precision = usize::try_from(13 - exponent).unwrap_or(0);
    let out = format!("{value:.precision$}");
    if out.contains('.') {
        out.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn php_float_format() {
        assert_eq!(format_float(100.0), "100");
        assert_eq!(format_float(50.0), "50");
        assert_eq!(format_float(1.0 / 3.0 * 100.0), "33.333333333333");
        assert_eq!(format_float(2.0 / 3.0 * 100.0), "66.666666666667");
        assert_eq!(format_float(12.5), "12.5");
        assert_eq!(format_float(0.05), "0.05");
    }

    #[test]
    fn message_placeholders() {
        assert_eq!(
            format_message("portable-infobox-unimplemented-infobox-tag", &["foo"]),
            "Unimplemented infobox tag: <foo>"
        );
        assert_eq!(format_message("no-such-message", &[]), "⧼no-such-message⧽");
    }

    #[test]
    fn whitespace_runs() {
        assert_eq!(replace_whitespace("test    test\n x", "-"), "test-test-x");
    }
}
