//! Readable-article extraction from fetched HTML
//!
//! Picks the most specific content container the page offers, drops page
//! chrome (navigation, headers, scripts and the like) and keeps block-level
//! text separated by blank lines.

use scraper::{ElementRef, Html, Selector};

use crate::errors::{RagError, Result};

/// Title recorded when a page names itself nowhere
pub const UNTITLED_PAGE: &str = "Untitled web page";

/// Containers tried in order; the first with readable text wins
const CONTENT_ROOTS: &[&str] = &["article", "main", "[role=main]", "body"];

/// Elements whose text is never article content
const BOILERPLATE: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "form", "svg", "iframe",
    "template", "button",
];

const BLOCKS: &str = "p, h1, h2, h3, h4, h5, h6, li, pre, blockquote, figcaption, dt, dd, td, th";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: Option<String>,
    pub text: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| RagError::ExtractionFailed(format!("bad selector {:?}: {:?}", css, e)))
}

fn is_named(el: ElementRef<'_>, names: &[&str]) -> bool {
    names.contains(&el.value().name())
}

/// True when an element between the node and `scope` is boilerplate
fn under_boilerplate<'a>(
    ancestors: impl Iterator<Item = ElementRef<'a>>,
    scope: ElementRef<'a>,
) -> bool {
    for ancestor in ancestors {
        if ancestor.id() == scope.id() {
            return false;
        }
        if is_named(ancestor, BOILERPLATE) {
            return true;
        }
    }
    false
}

/// Whitespace-collapsed text under `scope`, skipping boilerplate subtrees
fn visible_text(scope: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in scope.descendants() {
        if let Some(text) = node.value().as_text() {
            if !under_boilerplate(node.ancestors().filter_map(ElementRef::wrap), scope) {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    collapse(&out)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Block texts under `root`; nested blocks are covered by their outermost block
fn blocks(root: ElementRef<'_>, block_selector: &Selector) -> Vec<String> {
    let block_ids: Vec<_> = root.select(block_selector).map(|el| el.id()).collect();

    root.select(block_selector)
        .filter(|el| {
            !is_named(*el, BOILERPLATE)
                && !under_boilerplate(el.ancestors().filter_map(ElementRef::wrap), root)
        })
        .filter(|el| {
            !el.ancestors()
                .take_while(|a| a.id() != root.id())
                .any(|a| block_ids.contains(&a.id()))
        })
        .map(visible_text)
        .filter(|text| !text.is_empty())
        .collect()
}

fn title(document: &Html) -> Result<Option<String>> {
    if let Some(el) = document.select(&selector("title")?).next() {
        let text = collapse(&el.text().collect::<String>());
        if !text.is_empty() {
            return Ok(Some(text));
        }
    }

    let og = document
        .select(&selector(r#"meta[property="og:title"]"#)?)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse)
        .find(|text| !text.is_empty());
    if og.is_some() {
        return Ok(og);
    }

    Ok(document
        .select(&selector("h1")?)
        .map(|el| collapse(&el.text().collect::<String>()))
        .find(|text| !text.is_empty()))
}

/// Extract title and main text from an HTML document
pub fn extract_article(html: &str) -> Result<Article> {
    let document = Html::parse_document(html);
    let block_selector = selector(BLOCKS)?;

    for css in CONTENT_ROOTS {
        for root in document.select(&selector(css)?) {
            let mut parts = blocks(root, &block_selector);
            if parts.is_empty() {
                let loose = visible_text(root);
                if !loose.is_empty() {
                    parts.push(loose);
                }
            }
            if !parts.is_empty() {
                return Ok(Article {
                    title: title(&document)?,
                    text: parts.join("\n\n"),
                });
            }
        }
    }

    Err(RagError::ExtractionFailed(
        "page has no readable content".to_string(),
    ))
}
