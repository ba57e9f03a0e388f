//! Converts an extracted HTML subtree into the canonical annotated-text
//! format: a fixed, deterministic grammar (not general Markdown) shared with
//! the browser backend's in-page JS extractor (see `fetch::js_extract`).

use ego_tree::NodeRef;
use regex::Regex;
use scraper::{Html, Node};

use lazy_static::lazy_static;

lazy_static! {
    static ref MANY_BLANK_LINES: Regex = Regex::new(r"\n{3,}").expect("valid regex");
    static ref NO_BLANK_BEFORE_HEADING: Regex =
        Regex::new(r"([^\n])\n(#{1,6}[^\n#])").expect("valid regex");
    static ref NO_BLANK_BEFORE_FENCE: Regex = Regex::new(r"([^\n])\n```").expect("valid regex");
    static ref NO_BLANK_AFTER_FENCE: Regex = Regex::new(r"```\n([^\n])").expect("valid regex");
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "li", "tr", "thead", "tbody",
    "table",
];

/// Convert a serialized HTML subtree (as produced by the extractor) into
/// annotated text.
#[must_use]
pub fn convert(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for child in fragment.tree.root().children() {
        render_node(child, &mut out);
    }
    post_process(&out)
}

fn render_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !collapsed.is_empty() {
                if !out.is_empty() && !out.ends_with([' ', '\n']) {
                    out.push(' ');
                }
                out.push_str(&collapsed);
            }
        }
        Node::Element(element) => {
            let name = element.name();
            match name {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let depth = name[1..].parse::<usize>().unwrap_or(1);
                    let text = inline_text(node);
                    let marker = "#".repeat(depth);
                    ensure_blank_line(out);
                    out.push_str(&format!("{marker} {} {marker}\n\n", text.trim()));
                }
                "ul" | "ol" => {
                    ensure_blank_line(out);
                    for li in node.children() {
                        if matches!(li.value(), Node::Element(e) if e.name() == "li") {
                            let text = inline_text(li);
                            out.push_str("- ");
                            out.push_str(text.trim());
                            out.push('\n');
                        }
                    }
                    out.push('\n');
                }
                "blockquote" => {
                    ensure_blank_line(out);
                    let text = inline_text(node);
                    for line in text.lines() {
                        out.push_str("> ");
                        out.push_str(line);
                        out.push('\n');
                    }
                    out.push('\n');
                }
                "pre" => {
                    ensure_blank_line(out);
                    let language = pre_language(node);
                    let code_text = inline_text(node);
                    out.push_str("```");
                    out.push_str(&language);
                    out.push('\n');
                    out.push_str(code_text.trim());
                    out.push_str("\n```\n\n");
                }
                "code" => {
                    let text = inline_text(node);
                    out.push('`');
                    out.push_str(text.trim());
                    out.push('`');
                }
                "table" => {
                    ensure_blank_line(out);
                    render_table(node, out);
                    out.push('\n');
                }
                "img" => {
                    let alt = element.attr("alt").unwrap_or("");
                    out.push_str(&format!("[img: {alt}]"));
                }
                "a" => {
                    let href = element.attr("href").unwrap_or("");
                    let text = inline_text(node);
                    if href.is_empty() {
                        out.push_str(text.trim());
                    } else {
                        out.push_str(&format!("[{}]({href})", text.trim()));
                    }
                }
                "br" => out.push('\n'),
                "hr" => {
                    ensure_blank_line(out);
                    out.push_str("---\n\n");
                }
                _ => {
                    let is_block = BLOCK_TAGS.contains(&name);
                    if is_block {
                        ensure_blank_line(out);
                    }
                    for child in node.children() {
                        render_node(child, out);
                    }
                    if is_block {
                        out.push_str("\n\n");
                    }
                }
            }
        }
        _ => {}
    }
}

fn ensure_blank_line(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
        if out.ends_with("\n\n\n") {
            break;
        }
    }
}

fn inline_text(node: NodeRef<'_, Node>) -> String {
    let mut buf = String::new();
    for child in node.children() {
        render_inline(child, &mut buf);
    }
    buf
}

fn render_inline(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => {
            let name = element.name();
            if name == "br" {
                out.push('\n');
                return;
            }
            if name == "img" {
                let alt = element.attr("alt").unwrap_or("");
                out.push_str(&format!("[img: {alt}]"));
                return;
            }
            if name == "a" {
                let href = element.attr("href").unwrap_or("");
                let text = inline_text(node);
                if href.is_empty() {
                    out.push_str(&text);
                } else {
                    out.push_str(&format!("[{text}]({href})"));
                }
                return;
            }
            if name == "code" {
                out.push('`');
                out.push_str(inline_text(node).trim());
                out.push('`');
                return;
            }
            for child in node.children() {
                render_inline(child, out);
            }
        }
        _ => {}
    }
}

fn pre_language(pre_node: NodeRef<'_, Node>) -> String {
    for child in pre_node.children() {
        if let Node::Element(element) = child.value() {
            if element.name() == "code" {
                if let Some(class) = element.attr("class") {
                    for cls in class.split_whitespace() {
                        if let Some(lang) = cls
                            .strip_prefix("language-")
                            .or_else(|| cls.strip_prefix("lang-"))
                            .or_else(|| cls.strip_prefix("highlight-"))
                        {
                            return lang.to_string();
                        }
                    }
                }
            }
        }
    }
    String::new()
}

fn render_table(table_node: NodeRef<'_, Node>, out: &mut String) {
    let mut header: Option<Vec<String>> = None;
    let mut body_rows: Vec<Vec<String>> = Vec::new();

    for section in table_node.descendants() {
        let Node::Element(element) = section.value() else { continue };
        if element.name() != "tr" {
            continue;
        }
        let in_thead = section
            .ancestors()
            .any(|a| matches!(a.value(), Node::Element(e) if e.name() == "thead"));

        let mut cells = Vec::new();
        for cell in section.children() {
            if let Node::Element(cell_el) = cell.value() {
                if cell_el.name() == "th" || cell_el.name() == "td" {
                    cells.push(inline_text(cell).trim().to_string());
                }
            }
        }
        if cells.is_empty() {
            continue;
        }
        if in_thead && header.is_none() {
            header = Some(cells);
        } else {
            body_rows.push(cells);
        }
    }

    let header = header.or_else(|| {
        if body_rows.is_empty() { None } else { Some(body_rows.remove(0)) }
    });

    let Some(header) = header else { return };
    out.push_str("| ");
    out.push_str(&header.join(" | "));
    out.push_str(" |\n");
    out.push('|');
    out.push_str(&vec!["---"; header.len()].join("|"));
    out.push_str("|\n");
    for row in body_rows {
        out.push_str("| ");
        out.push_str(&row.join(" | "));
        out.push_str(" |\n");
    }
}

/// CRLF→LF, collapse ≥3 newlines to 2, right-trim every line, blank lines
/// before headings and around fences, single trailing newline.
fn post_process(text: &str) -> String {
    let mut result = text.replace("\r\n", "\n").replace('\r', "\n");
    result = MANY_BLANK_LINES.replace_all(&result, "\n\n").to_string();
    result = result
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    result = NO_BLANK_BEFORE_HEADING.replace_all(&result, "$1\n\n$2").to_string();
    result = NO_BLANK_BEFORE_FENCE.replace_all(&result, "$1\n\n```").to_string();
    result = NO_BLANK_AFTER_FENCE.replace_all(&result, "```\n\n$1").to_string();
    result = MANY_BLANK_LINES.replace_all(&result, "\n\n").to_string();
    let trimmed = result.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}
