use super::*;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

fn normalize(html: &str) -> String {
    static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());
    BETWEEN_TAGS.replace_all(html.trim(), "><").into_owned()
}

fn records(data: serde_json::Value) -> Vec<RenderData> {
    serde_json::from_value(data).unwrap()
}

fn render_with(service: &RenderService<'_>, data: serde_json::Value, attrs: &InfoboxAttributes) -> String {
    normalize(&service.render_infobox(&records(data), attrs).unwrap())
}

fn render(data: serde_json::Value) -> String {
    let config = Config::default();
    render_with(&RenderService::new(&config), data, &InfoboxAttributes::default())
}

fn colors() -> InfoboxAttributes {
    InfoboxAttributes {
        accent_color: "#FFF".into(),
        accent_color_text: "#000".into(),
        ..Default::default()
    }
}

fn image(caption: &str, index: Option<usize>, is_first: bool) -> serde_json::Value {
    json!({
        "alt": "image alt",
        "url": "http://image.jpg",
        "name": "Image.jpg",
        "caption": caption,
        "ref": index,
        "width": 400,
        "height": 200,
        "thumbnail": "http://thumbnail.jpg",
        "thumbnail2x": "http://thumbnail2x.jpg",
        "isImage": true,
        "isFirst": is_first,
    })
}

fn pair(label: &str, value: &str, span: u32) -> serde_json::Value {
    json!({ "type": "data", "data": { "label": label, "value": value, "span": span } })
}

fn group(layout: &str, row_items: Option<u32>, collapse: Option<&str>, value: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "group",
        "data": { "value": value, "layout": layout, "collapse": collapse, "row-items": row_items }
    })
}

const PAIR: &str = r#"<div class="pi-item pi-data pi-item-spacing pi-border-color"><h3 class="pi-data-label pi-secondary-font">test label</h3><div class="pi-data-value pi-font">test value</div></div>"#;
const FIGURE: &str = r#"<a href="http://image.jpg" class="image image-thumbnail" title="image alt"><img src="http://thumbnail.jpg" srcset="http://thumbnail.jpg 1x, http://thumbnail2x.jpg 2x" class="pi-image-thumbnail" alt="image alt" width="400" height="200"/></a>"#;

fn smart_label(width: &str, label: &str) -> String {
    format!(r#"<h3 class="pi-smart-data-label pi-data-label pi-secondary-font pi-item-spacing" style="width: {width}%">{label}</h3>"#)
}

fn smart_value(width: &str, value: &str) -> String {
    format!(r#"<div class="pi-smart-data-value pi-data-value pi-font pi-item-spacing" style="width: {width}%">{value}</div>"#)
}

#[test]
fn empty_data_renders_nothing() {
    assert_eq!(render(json!([])), "");
    assert_eq!(render(json!([{ "type": "media", "data": [] }])), "");
}

#[test]
fn title() {
    assert_eq!(
        render(json!([{ "type": "title", "data": { "value": "Test Title" } }])),
        r#"<aside class="portable-infobox pi-background"><h2 class="pi-item pi-item-spacing pi-title">Test Title</h2></aside>"#
    );
}

#[test]
fn title_with_accent_colors() {
    let config = Config::default();
    let service = RenderService::new(&config);
    assert_eq!(
        render_with(&service, json!([{ "type": "title", "data": { "value": "Test Title" } }]), &colors()),
        r#"<aside class="portable-infobox pi-background"><h2 class="pi-item pi-item-spacing pi-title" style="background-color:#FFF;color:#000;">Test Title</h2></aside>"#
    );
}

#[test]
fn title_is_sanitized() {
    assert_eq!(
        render(json!([{ "type": "title", "data": { "value": r#"<a href="/x">Linked</a> <script>x</script>"#, "source": "name" } }])),
        r#"<aside class="portable-infobox pi-background"><h2 class="pi-item pi-item-spacing pi-title" data-source="name">Linked</h2></aside>"#
    );
}

#[test]
fn only_image() {
    assert_eq!(
        render(json!([{ "type": "media", "data": [image("Lorem ipsum dolor", None, false)] }])),
        format!(
            r#"<aside class="portable-infobox pi-background"><figure class="pi-item pi-media pi-image">{FIGURE}<figcaption class="pi-item-spacing pi-caption">Lorem ipsum dolor</figcaption></figure></aside>"#
        )
    );
}

#[test]
fn only_video() {
    let data = json!([{ "type": "video", "data": [{
        "alt": "image alt",
        "url": "http://image.jpg",
        "name": "Image.ogv",
        "caption": "Lorem ipsum dolor",
        "isVideo": true,
    }] }]);
    assert_eq!(
        render(data),
        r#"<aside class="portable-infobox pi-background"><figure class="pi-item pi-media pi-video"><a href="http://image.jpg" class="video" title="image alt"><video src="http://image.jpg" class="pi-video-player" controls="true" controlsList="nodownload" preload="metadata">image alt</video></a><figcaption class="pi-item-spacing pi-caption">Lorem ipsum dolor</figcaption></figure></aside>"#
    );
}

#[test]
fn only_audio() {
    let data = json!([{ "type": "audio", "data": [{
        "alt": "Sound",
        "url": "http://sound.ogg",
        "name": "Sound.ogg",
        "isAudio": true,
        "source": "music",
    }] }]);
    assert_eq!(
        render(data),
        r#"<aside class="portable-infobox pi-background"><figure class="pi-item pi-media pi-audio" data-source="music"><a href="http://sound.ogg" class="audio" title="Sound"><audio src="http://sound.ogg" class="pi-audio-player" controls="true" controlsList="nodownload" preload="metadata">Sound</audio></a></figure></aside>"#
    );
}

#[test]
fn navigation() {
    assert_eq!(
        render(json!([{ "type": "navigation", "data": { "value": "<p>Links</p>" } }])),
        r#"<aside class="portable-infobox pi-background"><nav class="pi-navigation pi-item-spacing pi-secondary-background pi-secondary-font"><p>Links</p></nav></aside>"#
    );
}

#[test]
fn pairs() {
    assert_eq!(
        render(json!([pair("test label", "test value", 1)])),
        format!(r#"<aside class="portable-infobox pi-background">{PAIR}</aside>"#)
    );
    assert_eq!(
        render(json!([pair("", "test value", 1)])),
        r#"<aside class="portable-infobox pi-background"><div class="pi-item pi-data pi-item-spacing pi-border-color"><div class="pi-data-value pi-font">test value</div></div></aside>"#
    );
}

#[test]
fn title_image_and_pair() {
    let data = json!([
        { "type": "title", "data": { "value": "Test Title" } },
        { "type": "image", "data": [image("", None, false)] },
        { "type": "media", "data": [] },
        pair("test label", "test value", 1),
    ]);
    assert_eq!(
        render(data),
        format!(
            r#"<aside class="portable-infobox pi-background"><h2 class="pi-item pi-item-spacing pi-title">Test Title</h2><figure class="pi-item pi-media pi-image">{FIGURE}</figure>{PAIR}</aside>"#
        )
    );
}

#[test]
fn group_with_header() {
    let data = json!([group(
        "default",
        None,
        None,
        json!([
            { "type": "header", "data": { "value": "Test Header" } },
            pair("test label", "test value", 1),
            pair("test label", "test value", 1),
        ])
    )]);
    let config = Config::default();
    let service = RenderService::new(&config);
    assert_eq!(
        render_with(&service, data, &colors()),
        format!(
            r#"<aside class="portable-infobox pi-background"><section class="pi-item pi-group pi-border-color"><h2 class="pi-item pi-header pi-secondary-font pi-item-spacing pi-secondary-background" style="background-color:#FFF;color:#000;">Test Header</h2>{PAIR}{PAIR}</section></aside>"#
        )
    );
}

#[test]
fn collapsible_groups_need_a_header() {
    let header = json!({ "type": "header", "data": { "value": "Test Header" } });
    let html = render(json!([group("default", None, Some("closed"), json!([header, pair("test label", "test value", 1)]))]));
    assert!(html.contains(r#"<section class="pi-item pi-group pi-border-color pi-collapse pi-collapse-closed">"#));

    let html = render(json!([group("default", None, Some("open"), json!([pair("test label", "test value", 1), header]))]));
    assert!(html.contains(r#"<section class="pi-item pi-group pi-border-color">"#));
}

#[test]
fn horizontal_group() {
    let data = json!([group(
        "horizontal",
        None,
        None,
        json!([
            { "type": "header", "data": { "value": "test header" } },
            pair("", "test value 1", 1),
            pair("test label 2", "test value 2", 1),
        ])
    )]);
    assert_eq!(
        render(data),
        concat!(
            r#"<aside class="portable-infobox pi-background"><section class="pi-item pi-group pi-border-color">"#,
            r#"<table class="pi-horizontal-group">"#,
            r#"<caption class="pi-header pi-secondary-font pi-secondary-background pi-item-spacing">test header</caption>"#,
            r#"<thead><tr>"#,
            r#"<th class="pi-horizontal-group-item pi-data-label pi-secondary-font pi-border-color pi-item-spacing"></th>"#,
            r#"<th class="pi-horizontal-group-item pi-data-label pi-secondary-font pi-border-color pi-item-spacing">test label 2</th>"#,
            r#"</tr></thead><tbody><tr>"#,
            r#"<td class="pi-horizontal-group-item pi-data-value pi-font pi-border-color pi-item-spacing">test value 1</td>"#,
            r#"<td class="pi-horizontal-group-item pi-data-value pi-font pi-border-color pi-item-spacing">test value 2</td>"#,
            r#"</tr></tbody></table></section></aside>"#,
        )
    );
}

#[test]
fn horizontal_group_without_labels() {
    let data = json!([group(
        "horizontal",
        None,
        None,
        json!([pair("", "test value", 1), pair("", "test value", 1)])
    )]);
    assert_eq!(
        render(data),
        concat!(
            r#"<aside class="portable-infobox pi-background"><section class="pi-item pi-group pi-border-color">"#,
            r#"<table class="pi-horizontal-group pi-horizontal-group-no-labels"><tbody><tr>"#,
            r#"<td class="pi-horizontal-group-item pi-data-value pi-font pi-border-color pi-item-spacing">test value</td>"#,
            r#"<td class="pi-horizontal-group-item pi-data-value pi-font pi-border-color pi-item-spacing">test value</td>"#,
            r#"</tr></tbody></table></section></aside>"#,
        )
    );
}

#[test]
fn smart_group_rows() {
    let items = (1..=5)
        .map(|n| pair(&format!("Test {n}"), &format!("test value {n}"), 1))
        .collect::<Vec<_>>();
    let third = "33.333333333333";
    let expected = format!(
        concat!(
            r#"<aside class="portable-infobox pi-background"><section class="pi-item pi-group pi-border-color">"#,
            r#"<section class="pi-item pi-smart-group pi-border-color">"#,
            r#"<section class="pi-smart-group-head">{}{}{}</section>"#,
            r#"<section class="pi-smart-group-body">{}{}{}</section></section>"#,
            r#"<section class="pi-item pi-smart-group pi-border-color">"#,
            r#"<section class="pi-smart-group-head">{}{}</section>"#,
            r#"<section class="pi-smart-group-body">{}{}</section></section>"#,
            r#"</section></aside>"#,
        ),
        smart_label(third, "Test 1"),
        smart_label(third, "Test 2"),
        smart_label(third, "Test 3"),
        smart_value(third, "test value 1"),
        smart_value(third, "test value 2"),
        smart_value(third, "test value 3"),
        smart_label("50", "Test 4"),
        smart_label("50", "Test 5"),
        smart_value("50", "test value 4"),
        smart_value("50", "test value 5"),
    );
    assert_eq!(render(json!([group("default", Some(3), None, json!(items))])), expected);
}

#[test]
fn smart_group_rows_without_labels_and_breaks() {
    let data = json!([group(
        "horizontal",
        Some(3),
        None,
        json!([
            pair("", "test value 1", 1),
            pair("", "test value 2", 1),
            { "type": "title", "data": { "value": "title value" } },
            pair("", "test value 3", 1),
            pair("Test 4", "test value 4", 1),
        ])
    )]);
    let expected = format!(
        concat!(
            r#"<aside class="portable-infobox pi-background"><section class="pi-item pi-group pi-border-color">"#,
            r#"<section class="pi-item pi-smart-group pi-border-color">"#,
            r#"<section class="pi-smart-group-body">{}{}</section></section>"#,
            r#"<h2 class="pi-item pi-item-spacing pi-title">title value</h2>"#,
            r#"<section class="pi-item pi-smart-group pi-border-color">"#,
            r#"<section class="pi-smart-group-head">{}{}</section>"#,
            r#"<section class="pi-smart-group-body">{}{}</section></section>"#,
            r#"</section></aside>"#,
        ),
        smart_value("50", "test value 1"),
        smart_value("50", "test value 2"),
        smart_label("50", ""),
        smart_label("50", "Test 4"),
        smart_value("50", "test value 3"),
        smart_value("50", "test value 4"),
    );
    assert_eq!(render(data), expected);
}

#[test]
fn image_collection() {
    let data = json!([
        { "type": "title", "data": { "value": "Test Title" } },
        { "type": "media", "data": [image("caption", Some(1), true), image("caption", Some(2), false)] },
    ]);
    let expected = format!(
        concat!(
            r#"<aside class="portable-infobox pi-background"><h2 class="pi-item pi-item-spacing pi-title">Test Title</h2>"#,
            r#"<div class="pi-media-collection"><ul class="pi-media-collection-tabs">"#,
            r#"<li class="pi-tab-link pi-item-spacing current" data-pi-tab="pi-tab-1">caption</li>"#,
            r#"<li class="pi-tab-link pi-item-spacing" data-pi-tab="pi-tab-2">caption</li></ul>"#,
            r#"<div class="pi-media-collection-tab-content current" id="pi-tab-1"><figure class="pi-item pi-media pi-image">{figure}</figure></div>"#,
            r#"<div class="pi-media-collection-tab-content" id="pi-tab-2"><figure class="pi-item pi-media pi-image">{figure}</figure></div>"#,
            r#"</div></aside>"#,
        ),
        figure = FIGURE
    );
    assert_eq!(render(data), expected);
}

#[test]
fn collection_tab_ids_are_unique_per_service() {
    let config = Config::default();
    let service = RenderService::new(&config);
    let data = json!([{ "type": "media", "data": [image("a", Some(1), true), image("b", Some(2), false)] }]);
    let first = render_with(&service, data.clone(), &InfoboxAttributes::default());
    let second = render_with(&service, data, &InfoboxAttributes::default());
    assert!(first.contains(r#"id="pi-tab-2""#));
    assert!(!first.contains(r#"id="pi-tab-3""#));
    assert!(second.contains(r#"id="pi-tab-3""#));
    assert!(second.contains(r#"id="pi-tab-4""#));
}

fn section(label: &str, value: serde_json::Value) -> serde_json::Value {
    json!({ "type": "section", "data": { "label": label, "value": value } })
}

#[test]
fn panel_with_toggles() {
    let data = json!([{ "type": "panel", "data": {
        "value": [
            { "type": "header", "data": { "value": "Panel" } },
            section("First", json!([pair("", "one", 1)])),
            section("Empty", json!([])),
            section("Third", json!([pair("", "three", 1)])),
        ],
        "collapse": "open",
        "item-name": "stats",
    } }]);
    let value = |v: &str| {
        format!(r#"<div class="pi-item pi-data pi-item-spacing pi-border-color"><div class="pi-data-value pi-font">{v}</div></div>"#)
    };
    let expected = format!(
        concat!(
            r#"<aside class="portable-infobox pi-background">"#,
            r#"<section class="pi-item pi-panel pi-border-color pi-collapse pi-collapse-open" data-item-name="stats">"#,
            r#"<h2 class="pi-item pi-header pi-secondary-font pi-item-spacing pi-secondary-background">Panel</h2>"#,
            r#"<ul class="pi-section-navigation">"#,
            r#"<li class="pi-section-tab pi-section-active" data-ref="1"><div class="pi-section-label">First</div></li>"#,
            r#"<li class="pi-section-tab" data-ref="3"><div class="pi-section-label">Third</div></li>"#,
            r#"</ul><div class="pi-section-contents">"#,
            r#"<div class="pi-section-content pi-section-active" data-ref="1">{}</div>"#,
            r#"<div class="pi-section-content" data-ref="3">{}</div>"#,
            r#"</div></section></aside>"#,
        ),
        value("one"),
        value("three"),
    );
    assert_eq!(render(data), expected);
}

#[test]
fn panel_without_labels_shows_every_section() {
    let data = json!([{ "type": "panel", "data": {
        "value": [section("", json!([pair("", "one", 1)])), section("", json!([pair("", "two", 1)]))],
        "collapse": "open",
    } }]);
    let html = render(data);
    assert!(!html.contains("pi-section-navigation"));
    assert!(!html.contains("pi-collapse"));
    assert_eq!(html.matches(r#"class="pi-section-content pi-section-active""#).count(), 2);
}

#[test]
fn empty_panel_renders_nothing() {
    let data = json!([{ "type": "panel", "data": {
        "value": [{ "type": "header", "data": { "value": "Panel" } }, section("Empty", json!([]))],
    } }]);
    assert_eq!(render(data), "");
}

#[test]
fn wrapper_classes_and_name() {
    let config = Config::default();
    let service = RenderService::new(&config);
    let attrs = InfoboxAttributes {
        theme: "pi-theme-a pi-theme-b".into(),
        layout: "pi-layout-stacked".into(),
        kind: "pi-type-character".into(),
        item_name: Some("hero".into()),
        ..Default::default()
    };
    assert_eq!(
        render_with(&service, json!([{ "type": "navigation", "data": { "value": "x" } }]), &attrs),
        r#"<aside class="portable-infobox pi-background pi-theme-a pi-theme-b pi-layout-stacked pi-type-character" data-item-name="hero"><nav class="pi-navigation pi-item-spacing pi-secondary-background pi-secondary-font">x</nav></aside>"#
    );
}

#[test]
fn headings_can_be_disabled() {
    let config = Config {
        use_headings: false,
        ..Default::default()
    };
    let service = RenderService::new(&config);
    let html = render_with(
        &service,
        json!([{ "type": "title", "data": { "value": "T" } }, pair("L", "V", 1)]),
        &InfoboxAttributes::default(),
    );
    assert!(html.contains(r#"<div class="pi-item pi-item-spacing pi-title">T</div>"#));
    assert!(html.contains(r#"<div class="pi-data-label pi-secondary-font">L</div>"#));
    assert!(!html.contains("<h"));
}

#[test]
fn item_attributes_are_escaped() {
    let data = json!([{ "type": "data", "data": {
        "label": "",
        "value": "v",
        "span": 1,
        "source": "a\"b",
        "item-name": "n",
    } }]);
    assert!(render(data).contains(r#"data-source="a&quot;b" data-item-name="n""#));
}

#[test]
fn unknown_types_are_skipped() {
    let data = json!([
        { "type": "hologram" },
        { "type": "section", "data": { "label": "x", "value": [pair("", "v", 1)] } },
        { "type": "navigation", "data": { "value": "nav" } },
    ]);
    let records = records(data);
    assert_eq!(records[0], RenderData::Unsupported);
    let config = Config::default();
    let html = RenderService::new(&config)
        .render_infobox(&records, &InfoboxAttributes::default())
        .unwrap();
    assert_eq!(
        normalize(&html),
        r#"<aside class="portable-infobox pi-background"><nav class="pi-navigation pi-item-spacing pi-secondary-background pi-secondary-font">nav</nav></aside>"#
    );
}
