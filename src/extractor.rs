//! HTML content extraction: title, boilerplate removal, main-content
//! selection, headings, word count.

use ego_tree::NodeId;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Tags removed wholesale, including their subtree — multimedia embeds and
/// interactive form controls never carry page prose.
const REMOVE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "frame", "object", "embed", "applet", "form",
    "input", "button", "select", "textarea", "svg", "canvas", "audio", "video", "source",
    "track", "map", "area",
];

/// Semantic layout tags that are boilerplate by default.
const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "menu"];

const BOILERPLATE_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary"];

const KEEP_EVEN_IF_TEXTLESS: &[&str] = &["img", "table", "pre", "code", "br", "hr"];

const MAIN_CONTENT_MIN_CHARS: usize = 50;

lazy_static! {
    static ref BOILERPLATE_PATTERN: Regex = Regex::new(
        r"(?i)nav(igation)?|menu|header|footer|sidebar|widget|comment|share|social|advert(isement)?|ads?[-_]?|banner|popup|modal|overlay|cookie|consent|newsletter|subscribe|related[-_]?posts?|breadcrumb|pagination|author[-_]?bio|meta[-_]?info"
    ).expect("boilerplate pattern is a valid regex");
}

/// Main-content selector candidates, tried in order; the first match with
/// more than [`MAIN_CONTENT_MIN_CHARS`] of visible text wins.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "div[class*='entry-content' i]",
    "div[class*='post-content' i]",
    "div[class*='page-content' i]",
    "div[class*='article-content' i]",
    "div[class*='content-area' i]",
    "div[class*='elementor-section-wrap' i]",
    "div[class*='elementor-widget-wrap' i]",
    "div[class*='elementor' i]",
    "div[id^='main' i]",
    "div[id^='content' i]",
    "div[id^='article' i]",
    "div[id^='primary' i]",
    "section[class*='content' i]",
];

/// Result of extracting meaningful content from a rendered page.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: String,
    /// Serialized HTML of the chosen, boilerplate-stripped main-content subtree.
    pub content_html: String,
    /// Heading texts grouped by depth (all `h1`s, then all `h2`s, ...).
    pub headings: Vec<String>,
    pub word_count: usize,
}

fn is_boilerplate_element(element: &scraper::node::Element) -> bool {
    if let Some(class) = element.attr("class") {
        if BOILERPLATE_PATTERN.is_match(class) {
            return true;
        }
    }
    if let Some(id) = element.attr("id") {
        if BOILERPLATE_PATTERN.is_match(id) {
            return true;
        }
    }
    if let Some(role) = element.attr("role") {
        if BOILERPLATE_ROLES.contains(&role) {
            return true;
        }
    }
    false
}

/// Remove comments, hard-coded removal tags, boilerplate tags, and
/// attribute/role-matched boilerplate elements from the whole document,
/// mutating `document`'s tree in place via `ego_tree` detachment.
fn strip_boilerplate(document: &mut Html) {
    let mut to_detach: Vec<NodeId> = Vec::new();

    for node_ref in document.tree.root().descendants() {
        match node_ref.value() {
            Node::Comment(_) => to_detach.push(node_ref.id()),
            Node::Element(element) => {
                let name = element.name();
                if REMOVE_TAGS.contains(&name) || BOILERPLATE_TAGS.contains(&name) {
                    to_detach.push(node_ref.id());
                } else if is_boilerplate_element(element) {
                    to_detach.push(node_ref.id());
                }
            }
            _ => {}
        }
    }

    detach_all(document, &to_detach);
}

/// Detach a batch of node ids, skipping any whose ancestor was already
/// detached in the same batch (detaching a descendant of an already-removed
/// subtree is a no-op but harmless; this just avoids redundant work).
fn detach_all(document: &mut Html, ids: &[NodeId]) {
    for &id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Visible text length of an element, trimmed and whitespace-collapsed —
/// used both for the >50-char main-content threshold and for picking the
/// largest-text fallback `<div>`.
fn visible_text_len(element: &ElementRef) -> usize {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ").len()
}

fn find_main_content(document: &Html) -> Option<NodeId> {
    for selector_str in MAIN_CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else { continue };
        if let Some(candidate) = document.select(&selector).next() {
            if visible_text_len(&candidate) > MAIN_CONTENT_MIN_CHARS {
                return Some(candidate.id());
            }
        }
    }

    // Fallback: the <div> with the most visible text, else <body>, else root.
    let div_selector = Selector::parse("div").ok()?;
    let best_div = document
        .select(&div_selector)
        .max_by_key(visible_text_len);
    if let Some(div) = &best_div {
        if visible_text_len(div) > MAIN_CONTENT_MIN_CHARS {
            return Some(div.id());
        }
    }

    let body_selector = Selector::parse("body").ok()?;
    document.select(&body_selector).next().map(|e| e.id())
}

fn extract_title(document: &Html) -> String {
    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_el) = document.select(&selector).next() {
            let raw: String = title_el.text().collect();
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let first_part = if let Some((head, _)) = trimmed.split_once(" | ") {
                    head
                } else if let Some((head, _)) = trimmed.split_once(" - ") {
                    head
                } else {
                    trimmed
                };
                return first_part.trim().to_string();
            }
        }
    }

    if let Ok(selector) = Selector::parse("h1") {
        if let Some(h1) = document.select(&selector).next() {
            let text: String = h1.text().collect();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    "Untitled".to_string()
}

/// Remove elements within `root` that carry neither visible text nor one of
/// the always-kept tags, then collapse repeated whitespace in the remaining
/// text (the latter is also enforced by the Converter's post-processing, so
/// this pass mainly shrinks the serialized HTML fed into it).
fn clean_content(document: &mut Html, root: NodeId) {
    let mut to_detach = Vec::new();
    if let Some(root_ref) = document.tree.get(root) {
        if let Some(root_element) = ElementRef::wrap(root_ref) {
            for descendant in root_element.descendants() {
                if descendant.id() == root {
                    continue;
                }
                let Some(element_ref) = ElementRef::wrap(descendant) else { continue };
                let name = element_ref.value().name();
                if KEEP_EVEN_IF_TEXTLESS.contains(&name) {
                    continue;
                }
                let has_kept_descendant = element_ref
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .any(|d| KEEP_EVEN_IF_TEXTLESS.contains(&d.value().name()));
                if has_kept_descendant {
                    continue;
                }
                let text: String = element_ref.text().collect();
                if text.trim().is_empty() {
                    to_detach.push(descendant.id());
                }
            }
        }
    }
    detach_all(document, &to_detach);
}

fn extract_headings(document: &Html, root: NodeId) -> Vec<String> {
    let mut headings = Vec::new();
    let Some(root_ref) = document.tree.get(root) else { return headings };
    let Some(root_element) = ElementRef::wrap(root_ref) else { return headings };

    for level in 1..=6 {
        let selector_str = format!("h{level}");
        let Ok(selector) = Selector::parse(&selector_str) else { continue };
        for heading in root_element.select(&selector) {
            let text: String = heading.text().collect();
            let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !trimmed.is_empty() {
                headings.push(trimmed);
            }
        }
    }
    headings
}

/// Extract title, main content, headings, and word count from raw HTML.
#[must_use]
pub fn extract(html: &str) -> ExtractedContent {
    let mut document = Html::parse_document(html);
    let title = extract_title(&document);

    strip_boilerplate(&mut document);

    let root = find_main_content(&document);

    let Some(root_id) = root else {
        return ExtractedContent {
            title,
            content_html: String::new(),
            headings: Vec::new(),
            word_count: 0,
        };
    };

    clean_content(&mut document, root_id);

    let headings = extract_headings(&document, root_id);

    let (content_html, word_count) = match document.tree.get(root_id).and_then(ElementRef::wrap) {
        Some(root_element) => {
            let text: String = root_element.text().collect();
            let word_count = text.split_whitespace().count();
            (root_element.html(), word_count)
        }
        None => (String::new(), 0),
    };

    ExtractedContent { title, content_html, headings, word_count }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_title_tag_split_on_pipe() {
        let html = "<html><head><title>Home | My Site</title></head><body></body></html>";
        let extracted = extract(html);
        assert_eq!(extracted.title, "Home");
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><head></head><body><h1>Welcome</h1></body></html>";
        let extracted = extract(html);
        assert_eq!(extracted.title, "Welcome");
    }

    #[test]
    fn title_defaults_to_untitled() {
        let html = "<html><head></head><body><p>no headings</p></body></html>";
        let extracted = extract(html);
        assert_eq!(extracted.title, "Untitled");
    }

    #[test]
    fn strips_nav_and_boilerplate() {
        let html = r#"<html><body>
            <nav>Home About Contact</nav>
            <main><p>This is the real page content that should survive extraction intact.</p></main>
            <div class="cookie-consent">Accept cookies</div>
        </body></html>"#;
        let extracted = extract(html);
        assert!(extracted.content_html.contains("real page content"));
        assert!(!extracted.content_html.contains("Accept cookies"));
    }

    #[test]
    fn falls_back_to_largest_div_below_threshold_main() {
        let html = r#"<html><body>
            <main>short</main>
            <div class="wrapper"><p>A genuinely long paragraph of body text that easily clears the fifty character content threshold used for fallback selection.</p></div>
        </body></html>"#;
        let extracted = extract(html);
        assert!(extracted.content_html.contains("fifty character"));
    }

    #[test]
    fn headings_grouped_by_depth() {
        let html = "<html><body><main><h2>Second</h2><h1>First</h1><h2>Also second</h2></main></body></html>";
        let extracted = extract(html);
        assert_eq!(extracted.headings, vec!["First", "Second", "Also second"]);
    }

    #[test]
    fn word_count_matches_visible_text() {
        let html = "<html><body><main><p>one two three</p></main></body></html>";
        let extracted = extract(html);
        assert_eq!(extracted.word_count, 3);
    }
}
