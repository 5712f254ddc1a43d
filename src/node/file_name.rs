//! Extraction of a bare file name from media parameter values.

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

/// Reduces a media parameter value to a bare file name.
///
/// The value may be a plain name, a name with a file namespace prefix, an
/// image link with options, or the body of a gallery, in which case the first
/// listed file is used. Returns an empty string if there is no file name.
pub(super) fn sanitize(text: &str, namespaces: &[String]) -> String {
    static GALLERY_TAG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</?gallery\b[^>]*>").unwrap());

    let text = GALLERY_TAG.replace_all(text, "\n");
    let Some(line) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return String::new();
    };

    let name = remove_image_params(line.strip_prefix("[[").unwrap_or(line));
    let name = strip_namespace(name, namespaces);
    let name = percent_decode_str(name)
        .decode_utf8()
        .map_or_else(|_| name.to_string(), |name| name.into_owned());
    name.trim().to_string()
}

/// Removes image link options and the closing brackets of a link.
fn remove_image_params(text: &str) -> &str {
    let text = text.split_once('|').map_or(text, |(name, _)| name);
    text.split_once("]]").map_or(text, |(name, _)| name)
}

/// Removes a leading file namespace. Only the first letter of the namespace is
/// case-insensitive, and spaces and underscores are interchangeable.
fn strip_namespace<'a>(text: &'a str, namespaces: &[String]) -> &'a str {
    let Some((prefix, rest)) = text.split_once(':') else {
        return text;
    };

    let prefix = normalize_namespace(prefix);
    if namespaces
        .iter()
        .any(|namespace| normalize_namespace(namespace) == prefix)
    {
        rest
    } else {
        text
    }
}

fn normalize_namespace(name: &str) -> String {
    let name = name.trim().replace('_', " ");
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespaces(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn file_names() {
        let ns = namespaces(&["File", "Image"]);
        for (input, expected) in [
            ("filename.jpg", "filename.jpg"),
            ("File:filename.jpg", "filename.jpg"),
            ("Image:filename.jpg", "filename.jpg"),
            ("File:filename.jpg|300px", "filename.jpg"),
            ("[[File:filename.jpg|300px|lorem ipsum]]", "filename.jpg"),
            ("[[File:filename.jpg|lorem ipsum]]", "filename.jpg"),
            ("{{File:filename.jpg|lorem ipsum}}", "{{File:filename.jpg"),
            ("", ""),
            ("[[File:Su-47_-iDOLM%40STER_Miki-EX-.jpg|300px]]", "Su-47_-iDOLM@STER_Miki-EX-.jpg"),
            ("[[File:Blaabla+2plus+.png|300px]]", "Blaabla+2plus+.png"),
            ("[[File:Luke+1.jpg]]", "Luke+1.jpg"),
            ("[[file:Luke+1.jpg]]", "Luke+1.jpg"),
            ("[[filE:Luke+1.jpg]]", "filE:Luke+1.jpg"),
            ("[[file:luke+1.jpg]]", "luke+1.jpg"),
        ] {
            assert_eq!(sanitize(input, &ns), expected, "{input}");
        }
    }

    #[test]
    fn localised_namespaces() {
        assert_eq!(
            sanitize("Plik:filename.jpg", &namespaces(&["Plik", "Grafika"])),
            "filename.jpg"
        );
        assert_eq!(
            sanitize("[[Tập tin:Naruto-Opening01_222.jpg|200px]]", &namespaces(&["Tập_tin"])),
            "Naruto-Opening01_222.jpg"
        );
        assert_eq!(
            sanitize("[[файл:Luke+1.jpg]]", &namespaces(&["Файл"])),
            "Luke+1.jpg"
        );
    }

    #[test]
    fn galleries() {
        let ns = namespaces(&["File"]);
        for (input, expected) in [
            ("<gallery>\n</gallery>\n", ""),
            ("<gallery></gallery>", ""),
            ("<gallery />", ""),
            ("<gallery>\nimage.jpg\n</gallery>\n", "image.jpg"),
            ("<gallery>\nFile:image.jpg\n</gallery>\n", "image.jpg"),
            (
                "<gallery>\n文件名óśłżźćńę?.jpg\nImage010.jpg\nImage009.jpg\n</gallery>\n",
                "文件名óśłżźćńę?.jpg",
            ),
            ("\n\n", ""),
            ("\nimage.jpg\n\n", "image.jpg"),
            ("\nFile:image.jpg\n\n", "image.jpg"),
        ] {
            assert_eq!(sanitize(input, &ns), expected, "{input:?}");
        }
    }

    #[test]
    fn image_params() {
        assert_eq!(remove_image_params("File:image.jpg|300px|lorem ipsum"), "File:image.jpg");
        assert_eq!(remove_image_params("File:image.jpg|300px"), "File:image.jpg");
    }
}
