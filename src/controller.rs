//! The `<infobox>` tag entry point.
//!
//! The controller ties the pieces together: it parses the tag content, builds
//! the node tree, validates the tag attributes, resolves the wrapper
//! attributes, and renders the result. Markup errors never escape from
//! [`Controller::render_infobox`]; they are turned into an inline error message
//! so that one broken infobox does not break the whole page.

use crate::{
    common::{format_message, replace_whitespace},
    config::Config,
    external::{ExternalParser, FileRepository},
    node::{self, Env, Node, Params},
    render::{
        self, InfoboxAttributes, RenderService,
        templates::{DebugLine, MarkupDebug},
    },
    render_data::InfoboxRecord,
    validate::{self, InvalidParam},
    xml,
};
use regex::Regex;
use sailfish::TemplateSimple;
use std::sync::LazyLock;

/// The theme used when an infobox does not ask for one.
const DEFAULT_THEME: &str = "default";

/// The layout used when an infobox does not ask for a valid one.
const DEFAULT_LAYOUT: &str = "default";

/// An infobox rendering error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The markup used a tag which is not part of the infobox dialect.
    #[error(transparent)]
    Unimplemented(#[from] node::Error),

    /// The markup was not well-formed.
    #[error(transparent)]
    Xml(#[from] xml::Error),

    /// The `<infobox>` tag had an unsupported attribute.
    #[error(transparent)]
    InvalidParam(#[from] InvalidParam),

    /// A template failed to render.
    #[error(transparent)]
    Render(#[from] render::Error),
}

/// The standard result type used by the controller.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// The infobox data collected while rendering one page.
#[derive(Debug, Default)]
pub struct InfoboxOutput {
    /// One record per rendered infobox, in page order.
    pub infoboxes: Vec<InfoboxRecord>,
}

impl InfoboxOutput {
    /// Encodes the collected records as the persisted page payload.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.infoboxes)
    }
}

/// Renders the infoboxes of one page.
pub struct Controller<'a> {
    /// The host wikitext engine.
    parser: &'a dyn ExternalParser,
    /// The host file repository.
    files: &'a dyn FileRepository,
    /// The rendering configuration.
    config: &'a Config,
    /// The page render service.
    renderer: RenderService<'a>,
    /// The data of every infobox rendered so far.
    output: InfoboxOutput,
}

impl<'a> Controller<'a> {
    /// Creates a controller for a new page.
    pub fn new(
        parser: &'a dyn ExternalParser,
        files: &'a dyn FileRepository,
        config: &'a Config,
    ) -> Self {
        Self {
            parser,
            files,
            config,
            renderer: RenderService::new(config),
            output: InfoboxOutput::default(),
        }
    }

    /// Renders the content of one `<infobox>` tag.
    ///
    /// `params` are the tag attributes; if not given, the attributes of the
    /// root element are used instead. `args` are the arguments of the template
    /// being expanded. If `template_view` is true, malformed markup is shown
    /// in a debug view instead of a short notice.
    ///
    /// Only template errors are returned; every markup error produces an error
    /// message in the output instead.
    pub fn render_infobox(
        &mut self,
        text: &str,
        params: Option<&Params>,
        args: &Params,
        template_view: bool,
    ) -> Result<String> {
        let markup = format!("<infobox>{text}</infobox>");
        match self.render(&markup, params, args) {
            Ok(html) => Ok(html),
            Err(Error::Unimplemented(node::Error::Unimplemented(tag))) => Ok(error_message(
                &format_message("portable-infobox-unimplemented-infobox-tag", &[&tag]),
            )),
            Err(Error::InvalidParam(InvalidParam(key))) => Ok(error_message(&format_message(
                "portable-infobox-xml-parse-error-infobox-tag-attribute-unsupported",
                &[&key],
            ))),
            Err(Error::Xml(err)) if template_view => Ok(markup_debug(text, &err)?),
            Err(Error::Xml(_)) => Ok(error_message(&format_message(
                "portable-infobox-xml-parse-error",
                &[],
            ))),
            Err(err @ Error::Render(_)) => Err(err),
        }
    }

    /// Renders a complete `<infobox>` element taken from page text, using its
    /// own attributes as the tag attributes.
    ///
    /// Unlike [`Self::render_infobox`], every error is returned.
    pub fn render_markup(&mut self, markup: &str, args: &Params) -> Result<String> {
        self.render(markup, None, args)
    }

    /// The data of every infobox rendered so far.
    pub fn output(&self) -> &InfoboxOutput {
        &self.output
    }

    /// Consumes the controller, returning the collected infobox data.
    pub fn into_output(self) -> InfoboxOutput {
        self.output
    }

    fn render(&mut self, markup: &str, params: Option<&Params>, args: &Params) -> Result<String> {
        let root = xml::parse(markup)?;
        let env = Env::new(args, self.parser, self.files, self.config);
        let node = Node::new(&root, &env);

        let params = params.unwrap_or_else(|| node.params());
        validate::validate_params(params.keys())?;

        let data = node.records()?;
        self.output.infoboxes.push(InfoboxRecord::new(
            data.clone(),
            node.metadata().metadata.clone(),
        ));

        let attrs = InfoboxAttributes {
            theme: themes(params, args),
            layout: layout(params),
            accent_color: color("accent-color", params, args),
            accent_color_text: color("accent-color-text", params, args),
            kind: params
                .get("type")
                .filter(|kind| !kind.is_empty())
                .map(|kind| escape_class(&format!("pi-type-{}", replace_whitespace(kind, "-"))))
                .unwrap_or_default(),
            item_name: params.get("name").filter(|name| !name.is_empty()).cloned(),
        };

        Ok(self.renderer.render_infobox(&data, &attrs)?)
    }
}

/// Wraps an already translated message in an inline error element.
fn error_message(message: &str) -> String {
    format!(
        r#"<strong class="error"> {}</strong>"#,
        html_escape::encode_safe(message)
    )
}

/// Renders the authoring view of markup which failed to parse.
fn markup_debug(text: &str, err: &xml::Error) -> Result<String> {
    let errors = err
        .0
        .iter()
        .map(|error| {
            format_message(
                "portable-infobox-xml-parse-error-line",
                &[
                    &error.line.to_string(),
                    &error.column.to_string(),
                    &error.message,
                ],
            )
            .into_owned()
        })
        .collect();

    let lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| DebugLine {
            text: line.to_string(),
            has_error: err.0.iter().any(|error| error.line == index + 1),
        })
        .collect();

    Ok(MarkupDebug {
        info: &format_message("portable-infobox-xml-parse-error-info", &[]),
        heading: &format_message("portable-infobox-debug-markup", &[]),
        errors,
        lines,
    }
    .render_once()
    .map_err(render::Error::from)?)
}

/// Collects the theme classes: the static theme, then the theme from the
/// template argument named by `theme-source`, or the default theme if neither
/// is set.
fn themes(params: &Params, args: &Params) -> String {
    let static_theme = params.get("theme").map(|theme| theme.trim());
    let variable_theme = params
        .get("theme-source")
        .filter(|source| !source.is_empty())
        .and_then(|source| args.get(source))
        .map(|theme| theme.trim());

    let mut themes = [static_theme, variable_theme]
        .into_iter()
        .flatten()
        .filter(|theme| !theme.is_empty())
        .collect::<Vec<_>>();
    if themes.is_empty() {
        themes.push(DEFAULT_THEME);
    }

    themes
        .into_iter()
        .map(|theme| escape_class(&format!("pi-theme-{}", replace_whitespace(theme, "-"))))
        .collect::<Vec<_>>()
        .join(" ")
}

fn layout(params: &Params) -> String {
    let layout = params
        .get("layout")
        .map(String::as_str)
        .filter(|layout| validate::validate_layout(layout))
        .unwrap_or(DEFAULT_LAYOUT);
    format!("pi-layout-{layout}")
}

/// Resolves an accent colour from the template argument named by
/// `{name}-source`, falling back to the literal `{name}-default`. Invalid
/// colours are ignored.
fn color(name: &str, params: &Params, args: &Params) -> String {
    let from_source = params
        .get(&format!("{name}-source"))
        .and_then(|source| args.get(source))
        .map(|color| validate::validate_color_value(color.trim()))
        .unwrap_or_default();

    if from_source.is_empty() {
        params
            .get(&format!("{name}-default"))
            .map(|color| validate::validate_color_value(color.trim()))
            .unwrap_or_default()
    } else {
        from_source
    }
}

/// Replaces characters which are not allowed in a class name.
fn escape_class(class: &str) -> String {
    static INVALID: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r##"^[0-9\-]|[\x00-\x20!"#$%&'()*+,./:;<=>?@\[\\\]^`{|}~\u{a0}]"##).unwrap()
    });
    static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new("_+").unwrap());

    let class = INVALID.replace_all(class, "_");
    UNDERSCORES
        .replace_all(&class, "_")
        .trim_end_matches('_')
        .to_string()
}
