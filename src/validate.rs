//! Validation of `<infobox>` tag attributes.

use regex::Regex;
use std::sync::LazyLock;

/// An unsupported `<infobox>` attribute.
#[derive(Debug, thiserror::Error)]
#[error("unsupported infobox attribute '{0}'")]
pub struct InvalidParam(pub String);

/// Attributes accepted on the `<infobox>` tag.
static SUPPORTED_PARAMS: phf::Set<&'static str> = phf::phf_set! {
    "accent-color-default",
    "accent-color-source",
    "accent-color-text-default",
    "accent-color-text-source",
    "layout",
    "name",
    "theme",
    "theme-source",
    "type",
};

/// Supported values of the `layout` attribute.
static SUPPORTED_LAYOUTS: phf::Set<&'static str> = phf::phf_set! {
    "default",
    "stacked",
};

/// CSS named colours.
static COLOR_NAMES: phf::Set<&'static str> = phf::phf_set! {
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque",
    "black", "blanchedalmond", "blue", "blueviolet", "brown", "burlywood",
    "cadetblue", "chartreuse", "chocolate", "coral", "cornflowerblue", "cornsilk",
    "crimson", "cyan", "darkblue", "darkcyan", "darkgoldenrod", "darkgray",
    "darkgreen", "darkgrey", "darkkhaki", "darkmagenta", "darkolivegreen",
    "darkorange", "darkorchid", "darkred", "darksalmon", "darkseagreen",
    "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise",
    "darkviolet", "deeppink", "deepskyblue", "dimgray", "dimgrey", "dodgerblue",
    "firebrick", "floralwhite", "forestgreen", "fuchsia", "gainsboro",
    "ghostwhite", "gold", "goldenrod", "gray", "green", "greenyellow", "grey",
    "honeydew", "hotpink", "indianred", "indigo", "ivory", "khaki", "lavender",
    "lavenderblush", "lawngreen", "lemonchiffon", "lightblue", "lightcoral",
    "lightcyan", "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey",
    "lightpink", "lightsalmon", "lightseagreen", "lightskyblue",
    "lightslategray", "lightslategrey", "lightsteelblue", "lightyellow", "lime",
    "limegreen", "linen", "magenta", "maroon", "mediumaquamarine", "mediumblue",
    "mediumorchid", "mediumpurple", "mediumseagreen", "mediumslateblue",
    "mediumspringgreen", "mediumturquoise", "mediumvioletred", "midnightblue",
    "mintcream", "mistyrose", "moccasin", "navajowhite", "navy", "oldlace",
    "olive", "olivedrab", "orange", "orangered", "orchid", "palegoldenrod",
    "palegreen", "paleturquoise", "palevioletred", "papayawhip", "peachpuff",
    "peru", "pink", "plum", "powderblue", "purple", "rebeccapurple", "red",
    "rosybrown", "royalblue", "saddlebrown", "salmon", "sandybrown", "seagreen",
    "seashell", "sienna", "silver", "skyblue", "slateblue", "slategray",
    "slategrey", "snow", "springgreen", "steelblue", "tan", "teal", "thistle",
    "tomato", "transparent", "turquoise", "violet", "wheat", "white",
    "whitesmoke", "yellow", "yellowgreen",
};

/// A percentage from 0 to 100.
const PERCENT: &str = r"(?:100|\d{1,2})%";
/// A hue from -360 to 360.
const HUE: &str = r"-?(?:3(?:60|[0-5]\d)|[12]?\d{1,2})";
/// An alpha value from 0 to 1, or a percentage.
const ALPHA: &str = r"(?:(?:100|\d{1,2})%|[01]?\.\d+|[01])";
/// An RGB channel value from 0 to 255, or a percentage.
const RGB_CHANNEL: &str = r"(?:(?:100|\d{1,2})%|2(?:5[0-5]|[0-4]\d)|1?\d{1,2})";

/// Colour function grammars, anchored.
static COLOR_FUNCTIONS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(&format!(r"^rgb\((?:{RGB_CHANNEL},){{2}}{RGB_CHANNEL}\)$")).unwrap(),
        Regex::new(&format!(r"^rgba\((?:{RGB_CHANNEL},){{3}}{ALPHA}\)$")).unwrap(),
        Regex::new(&format!(r"^hsl\({HUE},{PERCENT},{PERCENT}\)$")).unwrap(),
        Regex::new(&format!(r"^hsla\({HUE},(?:{PERCENT},){{2}}{ALPHA}\)$")).unwrap(),
    ]
});

/// A 3, 4, 6, or 8 digit hex colour with an optional leading hash.
static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#?[a-f0-9]{3}(?:[a-f0-9]{3}(?:[a-f0-9]{2})?|[a-f0-9])?$").unwrap()
});

/// Checks that every key of `params` is a supported `<infobox>` attribute.
/// Fails with the first unsupported key.
pub fn validate_params<'a, I>(params: I) -> Result<(), InvalidParam>
where
    I: IntoIterator<Item = &'a String>,
{
    for key in params {
        if !SUPPORTED_PARAMS.contains(key.as_str()) {
            return Err(InvalidParam(key.clone()));
        }
    }
    Ok(())
}

/// Returns true if `name` is a supported layout.
pub fn validate_layout(name: &str) -> bool {
    SUPPORTED_LAYOUTS.contains(name)
}

/// Normalises a CSS colour value. Returns an empty string if the value is not
/// a supported colour.
pub fn validate_color_value(color: &str) -> String {
    let color = color
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if HEX_COLOR.is_match(&color) {
        return if color.starts_with('#') {
            color
        } else {
            format!("#{color}")
        };
    }

    if COLOR_NAMES.contains(color.as_str()) || COLOR_FUNCTIONS.iter().any(|re| re.is_match(&color))
    {
        color
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn params(keys: &[&str]) -> IndexMap<String, String> {
        keys.iter().map(|key| (key.to_string(), String::new())).collect()
    }

    #[test]
    fn supported_params() {
        assert!(validate_params(params(&[]).keys()).is_ok());
        assert!(
            validate_params(
                params(&["theme", "theme-source", "layout", "accent-color-default", "type", "name"])
                    .keys()
            )
            .is_ok()
        );
    }

    #[test]
    fn first_unsupported_param_is_reported() {
        let err = validate_params(params(&["theme", "foo", "bar"]).keys()).unwrap_err();
        assert_eq!(err.0, "foo");
    }

    #[test]
    fn layouts() {
        assert!(validate_layout("default"));
        assert!(validate_layout("stacked"));
        assert!(!validate_layout(""));
        assert!(!validate_layout("myLayout"));
    }

    #[test]
    fn valid_colors() {
        for (color, expected) in [
            ("#aaa", "#aaa"),
            ("#aaaa", "#aaaa"),
            ("#A12ACD", "#a12acd"),
            ("#ffffffff", "#ffffffff"),
            ("fff", "#fff"),
            ("125fff", "#125fff"),
            ("ffffffff", "#ffffffff"),
            ("rgb(0,0,0)", "rgb(0,0,0)"),
            ("RGB(20,3,255)", "rgb(20,3,255)"),
            ("rgb( 20, 3, 255 )", "rgb(20,3,255)"),
            ("rgb(0%,25%,100%)", "rgb(0%,25%,100%)"),
            ("rgba(0,0,0,0%)", "rgba(0,0,0,0%)"),
            ("RGBA(20, 3, 255,.5)", "rgba(20,3,255,.5)"),
            ("rgba(255,255,255, 100%)", "rgba(255,255,255,100%)"),
            ("hsl(40, 78%, 45%)", "hsl(40,78%,45%)"),
            ("HSL( -80, 58%, 30%)", "hsl(-80,58%,30%)"),
            ("hsl(360,100%,100%)", "hsl(360,100%,100%)"),
            ("hsla( 359, 38%,20% ,0.7)", "hsla(359,38%,20%,0.7)"),
            ("White", "white"),
            ("WHITE", "white"),
        ] {
            assert_eq!(validate_color_value(color), expected, "{color}");
        }
    }

    #[test]
    fn invalid_colors() {
        for color in [
            "",
            "ggg",
            "12g",
            "#aaag",
            "aaaaa",
            "#aaaaa",
            "aaaaaaa",
            "#fffffffff",
            "rgb(0a,0a,0a)",
            "rgb(20,3,265)",
            "rgb( -20, 3, 255 )",
            "rgb(256,1,1)",
            "rgb(256,355)",
            "rgb(0%,25%,102%)",
            "rgba(255,255,255,1.)",
            "rgba(100%,100%,100%)",
            "hsl(0,0%,0%,0)",
            "hsl(0,-78%,45%)",
            "hsl(361,0%,0%)",
            "notacolor",
        ] {
            assert_eq!(validate_color_value(color), "", "{color}");
        }
    }

    #[test]
    fn idempotent() {
        for color in ["FFF", " rgb( 1, 2, 3 ) ", "Red", "hsla(1,2%,3%,.4)", "abcdef"] {
            let once = validate_color_value(color);
            assert!(!once.is_empty());
            assert_eq!(validate_color_value(&once), once);
        }
    }
}
