use crate::config::ExtractOptions;
use crate::parsers::text;
use crate::results::{Headings, OpenGraphData, PageContent};
use scraper::{ElementRef, Html, Node, Selector};

/// Extracts a [`PageContent`] from raw HTML
///
/// Best effort on malformed markup: anything that cannot be found is left
/// empty. The same input always yields the same output.
pub fn extract(html: &str, options: &ExtractOptions, timed_out: bool) -> PageContent {
    let doc = Html::parse_document(html);

    let og = OpenGraphData {
        og_type: meta_property(&doc, "og:type"),
        url: meta_property(&doc, "og:url"),
        image: meta_property(&doc, "og:image"),
    };

    let content = PageContent {
        title: extract_title(&doc),
        description: meta_name(&doc, "description").or_else(|| meta_property(&doc, "og:description")),
        keywords: meta_name(&doc, "keywords"),
        canonical: extract_canonical(&doc),
        headings: extract_headings(&doc),
        text_full: extract_main_text(&doc, options),
        og,
        timed_out,
    };

    ::log::debug!(
        "Extracted {} chars of text and {} headings",
        content.text_full.chars().count(),
        content.headings.h1.len() + content.headings.h2.len() + content.headings.h3.len()
    );

    content
}

/// `<title>` first, then `og:title`
pub fn extract_title(doc: &Html) -> Option<String> {
    first_element(doc, "title")
        .map(|title| text::join_fragments(title.text()))
        .filter(|t| !t.is_empty())
        .or_else(|| meta_property(doc, "og:title"))
}

/// Content of the first `<meta name=...>` with the given name
pub fn meta_name(doc: &Html, name: &str) -> Option<String> {
    find_meta(doc, "name", name)
}

/// Content of the first `<meta property=...>` with the given property
pub fn meta_property(doc: &Html, property: &str) -> Option<String> {
    find_meta(doc, "property", property)
}

fn find_meta(doc: &Html, attr: &str, wanted: &str) -> Option<String> {
    let selector = selector("meta")?;
    let tag = doc.select(&selector).find(|el| {
        el.value()
            .attr(attr)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(wanted))
    })?;
    non_empty(tag.value().attr("content")?)
}

/// `href` of the first `<link>` whose `rel` tokens include `canonical`
pub fn extract_canonical(doc: &Html) -> Option<String> {
    let selector = selector("link")?;
    let link = doc.select(&selector).find(|el| {
        el.value().attr("rel").is_some_and(|rel| {
            rel.split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("canonical"))
        })
    })?;
    non_empty(link.value().attr("href")?)
}

/// h1/h2/h3 texts in document order, whitespace-collapsed, empties dropped
pub fn extract_headings(doc: &Html) -> Headings {
    let mut headings = Headings::default();
    let Some(selector) = selector("h1, h2, h3") else {
        return headings;
    };

    for el in doc.select(&selector) {
        let txt = text::join_fragments(el.text());
        if txt.is_empty() {
            continue;
        }
        match el.value().name() {
            "h1" => headings.h1.push(txt),
            "h2" => headings.h2.push(txt),
            _ => headings.h3.push(txt),
        }
    }

    headings
}

/// Joins the body's substantial paragraphs, ignoring page chrome
pub fn extract_main_text(doc: &Html, options: &ExtractOptions) -> String {
    let Some(selector) = selector("p") else {
        return String::new();
    };

    let paragraphs = doc
        .select(&selector)
        .filter(|p| !inside_stripped(p, &options.stripped_tags))
        .map(|p| {
            let mut fragments = Vec::new();
            collect_text(&p, &options.stripped_tags, &mut fragments);
            text::join_fragments(fragments)
        })
        .collect::<Vec<_>>();

    let kept = text::filter_paragraphs(paragraphs, options.min_paragraph_len);
    text::join_paragraphs(&kept, &options.paragraph_separator, options.max_text_len)
}

/// Gathers descendant text nodes, skipping stripped subtrees
fn collect_text<'a>(el: &ElementRef<'a>, stripped: &[String], out: &mut Vec<&'a str>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push(&t.text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !is_stripped(child_el.value().name(), stripped) {
                        collect_text(&child_el, stripped, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn inside_stripped(el: &ElementRef<'_>, stripped: &[String]) -> bool {
    el.ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|ancestor| is_stripped(ancestor.name(), stripped))
}

fn is_stripped(name: &str, stripped: &[String]) -> bool {
    stripped.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

fn first_element<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    doc.select(&selector).next()
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            ::log::warn!("Invalid selector {}: {:?}", css, e);
            None
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
