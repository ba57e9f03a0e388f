//! The in-page JavaScript evaluated by the browser backend to pull
//! annotated text directly out of a rendered DOM, mirroring the marker
//! vocabulary the HTML-path Converter also produces (`#…#` headings,
//! `• ` list items, `> ` blockquotes, fenced code) so both paths yield the
//! same canonical annotated-text shape.

/// Returns block-level text joined by blank lines; ignores
/// `script, style, nav, header, footer, aside, noscript` and any node hidden
/// via `display:none`/`visibility:hidden`/`hidden`.
pub const EXTRACT_TEXT_SCRIPT: &str = r##"
(() => {
    const SKIP_TAGS = new Set(["SCRIPT", "STYLE", "NAV", "HEADER", "FOOTER", "ASIDE", "NOSCRIPT"]);

    function isHidden(el) {
        const style = window.getComputedStyle(el);
        return style.display === "none" || style.visibility === "hidden" || el.hidden;
    }

    function headingMarker(depth) {
        return "#".repeat(Math.min(Math.max(depth, 1), 6));
    }

    function walk(node, blocks) {
        if (node.nodeType === Node.TEXT_NODE) {
            const text = node.textContent.replace(/\s+/g, " ").trim();
            if (text) blocks.push(text);
            return;
        }
        if (node.nodeType !== Node.ELEMENT_NODE) return;
        const el = node;
        if (SKIP_TAGS.has(el.tagName) || isHidden(el)) return;

        const tag = el.tagName;
        if (/^H[1-6]$/.test(tag)) {
            const depth = Number(tag[1]);
            const marker = headingMarker(depth);
            const text = el.textContent.replace(/\s+/g, " ").trim();
            if (text) blocks.push(`${marker} ${text} ${marker}`);
            return;
        }
        if (tag === "LI") {
            const text = el.textContent.replace(/\s+/g, " ").trim();
            if (text) blocks.push(`• ${text}`);
            return;
        }
        if (tag === "BLOCKQUOTE") {
            const text = el.textContent.replace(/\s+/g, " ").trim();
            if (text) blocks.push(`> ${text}`);
            return;
        }
        if (tag === "PRE") {
            const code = el.textContent.replace(/\n+$/, "");
            blocks.push("```\n" + code + "\n```");
            return;
        }

        for (const child of el.childNodes) {
            walk(child, blocks);
        }
    }

    const blocks = [];
    walk(document.body, blocks);
    return blocks.join("\n\n");
})();
"##;
