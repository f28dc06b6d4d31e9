//! Normalizer: one source page → sanitized, normalized Markdown.
//!
//! HTML pages are parsed with html5ever into an `RcDom` and walked once.
//! Navigation chrome, scripts, styles and forms are dropped on the way;
//! every other element is reduced to its Markdown equivalent. The result
//! then goes through [`postprocess::clean_markdown`] like every other page.
//!
//! The walk is a pure function of the input bytes and the set of known
//! identities, so converting the same page twice yields identical text.

use crate::document::{NormalizedDocument, SourceDocument, SourceFormat};
use crate::error::DocumentError;
use crate::pipeline::links::{rewrite_markdown_links, LinkResolver, LinkTarget};
use crate::pipeline::postprocess;
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Elements whose whole subtree is meaningless outside a browser.
const DROPPED_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "iframe", "object", "embed", "svg",
    "canvas", "form", "button", "input", "select", "textarea", "nav", "header", "footer",
    "aside", "link", "meta", "map", "audio", "video",
];

/// `id`/`class` tokens that mark site chrome rather than page content.
const CHROME_TOKENS: &[&str] = &[
    "nav",
    "navbar",
    "navigation",
    "sidebar",
    "toc",
    "breadcrumb",
    "breadcrumbs",
    "footer",
    "header",
    "menu",
    "skip",
];

/// Block-level elements; everything else is rendered inline.
const BLOCK_TAGS: &[&str] = &[
    "html", "body", "main", "article", "section", "div", "p", "h1", "h2", "h3", "h4", "h5",
    "h6", "pre", "ul", "ol", "li", "blockquote", "table", "thead", "tbody", "tfoot", "tr",
    "dl", "dt", "dd", "hr", "figure", "figcaption", "details", "summary", "center", "address",
];

/// Normalize one source document.
///
/// # Errors
/// [`DocumentError::MalformedInput`] when the bytes are not UTF-8, contain
/// NUL bytes, or nothing is left after sanitization.
pub fn normalize(
    source: &SourceDocument,
    resolver: &LinkResolver,
) -> Result<NormalizedDocument, DocumentError> {
    let malformed = |detail: String| DocumentError::MalformedInput {
        identity: source.identity.clone(),
        detail,
    };

    let text = std::str::from_utf8(&source.content).map_err(|e| {
        malformed(format!("invalid UTF-8 at byte {}", e.valid_up_to()))
    })?;
    if let Some(pos) = text.find('\0') {
        return Err(malformed(format!("NUL byte at offset {pos}")));
    }

    let markdown = match source.format {
        SourceFormat::Html => html_to_markdown(text, resolver),
        SourceFormat::Markdown => rewrite_markdown_links(text, resolver),
    };
    let markdown = postprocess::clean_markdown(&markdown);

    if markdown.trim().is_empty() {
        return Err(malformed("no content left after sanitization".to_string()));
    }

    Ok(NormalizedDocument {
        identity: source.identity.clone(),
        category: source.category.clone(),
        text: markdown,
        version: source.version,
    })
}

/// Convert an HTML page to (not yet post-processed) Markdown.
pub fn html_to_markdown(html: &str, resolver: &LinkResolver) -> String {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    let root = find_first(&dom.document, "main").unwrap_or_else(|| dom.document.clone());
    let writer = MarkdownWriter { resolver };
    writer.blocks(&root)
}

// ── DOM helpers ──────────────────────────────────────────────────────────────

fn tag_name(node: &Handle) -> Option<String> {
    match node.data {
        NodeData::Element { ref name, .. } => Some((*name.local).to_ascii_lowercase()),
        _ => None,
    }
}

fn attr(node: &Handle, key: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| (*a.name.local).eq_ignore_ascii_case(key))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

fn find_first(node: &Handle, tag: &str) -> Option<Handle> {
    for child in children(node) {
        if tag_name(&child).as_deref() == Some(tag) {
            return Some(child);
        }
        if is_dropped(&child) {
            continue;
        }
        if let Some(found) = find_first(&child, tag) {
            return Some(found);
        }
    }
    None
}

/// True for elements that must not reach the output at all.
fn is_dropped(node: &Handle) -> bool {
    let Some(tag) = tag_name(node) else {
        return false;
    };
    if DROPPED_TAGS.contains(&tag.as_str()) {
        return true;
    }
    if attr(node, "hidden").is_some() {
        return true;
    }
    if attr(node, "role").is_some_and(|r| r.eq_ignore_ascii_case("navigation")) {
        return true;
    }
    ["id", "class"].iter().any(|key| {
        attr(node, key).is_some_and(|value| {
            value
                .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
                .any(|tok| CHROME_TOKENS.contains(&tok.to_ascii_lowercase().as_str()))
        })
    })
}

fn is_block(node: &Handle) -> bool {
    tag_name(node).is_some_and(|t| BLOCK_TAGS.contains(&t.as_str()))
}

/// Raw text of a subtree, whitespace preserved; `<br>` becomes a newline.
fn raw_text(node: &Handle, out: &mut String) {
    match node.data {
        NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
        NodeData::Element { .. } => {
            if tag_name(node).as_deref() == Some("br") {
                out.push('\n');
                return;
            }
            if is_dropped(node) {
                return;
            }
            for child in children(node) {
                raw_text(&child, out);
            }
        }
        _ => {}
    }
}

// ── Text helpers ─────────────────────────────────────────────────────────────

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Escape characters Markdown would otherwise interpret inside prose.
///
/// Underscores are left alone: intraword `_` never opens emphasis, and API
/// names are full of them.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 10);
    for c in s.chars() {
        match c {
            '\\' | '*' | '`' | '<' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Guard a line that would otherwise start a heading, quote, or list.
fn guard_line_start(line: &str) -> String {
    let starts_block = line.starts_with('#')
        || line.starts_with('>')
        || line.starts_with("- ")
        || line.starts_with("+ ")
        || {
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            digits > 0 && (line[digits..].starts_with(". ") || line[digits..].starts_with(") "))
        };
    if starts_block {
        format!("\\{line}")
    } else {
        line.to_string()
    }
}

/// Tidy an inline run into paragraph text: single spaces, trimmed lines,
/// no dangling hard break at the end.
fn tidy_inline(s: &str) -> String {
    let lines: Vec<String> = s
        .split('\n')
        .map(|l| {
            let mut collapsed = String::with_capacity(l.len());
            let mut prev_space = false;
            for c in l.chars() {
                if c == ' ' {
                    if !prev_space {
                        collapsed.push(c);
                    }
                    prev_space = true;
                } else {
                    collapsed.push(c);
                    prev_space = false;
                }
            }
            collapsed.trim().to_string()
        })
        .collect();
    let mut text = lines
        .iter()
        .filter(|l| !l.is_empty() && l.as_str() != "\\")
        .map(|l| guard_line_start(l))
        .collect::<Vec<_>>()
        .join("\n");
    while text.ends_with('\\') && !text.ends_with("\\\\") {
        text.pop();
        text.truncate(text.trim_end().len());
    }
    text
}

/// Backtick fence long enough not to appear inside `content`.
fn fence_for(content: &str, min: usize, ch: char) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == ch {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    std::iter::repeat_n(ch, min.max(longest + 1)).collect()
}

fn code_language(node: &Handle) -> Option<String> {
    let from_class = |n: &Handle| {
        attr(n, "class").and_then(|class| {
            class.split_whitespace().find_map(|tok| {
                tok.strip_prefix("language-")
                    .or_else(|| tok.strip_prefix("lang-"))
                    .map(str::to_string)
            })
        })
    };
    from_class(node).or_else(|| {
        children(node)
            .iter()
            .find(|c| tag_name(c).as_deref() == Some("code"))
            .and_then(from_class)
    })
}

// ── Writer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    List,
    Other,
}

struct MarkdownWriter<'a> {
    resolver: &'a LinkResolver,
}

impl MarkdownWriter<'_> {
    /// Render the children of `node` as a sequence of blocks.
    fn blocks(&self, node: &Handle) -> String {
        self.block_parts(node)
            .into_iter()
            .map(|(s, _)| s)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Children of `node` as blocks. Consecutive inline children form one
    /// paragraph.
    fn block_parts(&self, node: &Handle) -> Vec<(String, BlockKind)> {
        let mut parts = Vec::new();
        let mut pending = String::new();

        let flush = |pending: &mut String, parts: &mut Vec<(String, BlockKind)>| {
            let para = tidy_inline(pending);
            if !para.is_empty() {
                parts.push((para, BlockKind::Other));
            }
            pending.clear();
        };

        for child in children(node) {
            if is_dropped(&child) {
                continue;
            }
            if is_block(&child) {
                flush(&mut pending, &mut parts);
                let kind = match tag_name(&child).as_deref() {
                    Some("ul") | Some("ol") => BlockKind::List,
                    _ => BlockKind::Other,
                };
                let rendered = self.block(&child);
                if !rendered.trim().is_empty() {
                    parts.push((rendered, kind));
                }
            } else {
                self.inline(&child, &mut pending);
            }
        }
        flush(&mut pending, &mut parts);
        parts
    }

    /// Render one block-level element.
    fn block(&self, node: &Handle) -> String {
        let tag = tag_name(node).unwrap_or_default();
        match tag.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = usize::from(tag.as_bytes()[1] - b'0');
                let text = self.inline_line(node);
                if text.is_empty() {
                    String::new()
                } else {
                    format!("{} {}", "#".repeat(level), text)
                }
            }
            "pre" => self.code_block(node),
            "ul" | "ol" => self.list(node, tag == "ol"),
            "blockquote" => {
                let inner = self.blocks(node);
                inner
                    .lines()
                    .map(|l| if l.is_empty() { ">".to_string() } else { format!("> {l}") })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            "table" => self.table(node),
            "dl" => self.definition_list(node),
            "dt" | "summary" => {
                let text = self.inline_line(node);
                if text.is_empty() {
                    String::new()
                } else {
                    format!("**{text}**")
                }
            }
            "hr" => "----".to_string(),
            "li" => self.blocks(node),
            "thead" | "tbody" | "tfoot" | "tr" => self.table(node),
            _ => self.blocks(node),
        }
    }

    /// Inline content of `node` flattened onto one line (headings, cells).
    fn inline_line(&self, node: &Handle) -> String {
        let mut buf = String::new();
        for child in children(node) {
            self.inline(&child, &mut buf);
        }
        tidy_inline(&buf.replace("\\\n", " ").replace('\n', " "))
            .replace('\n', " ")
    }

    /// Append the inline rendering of `node` to `out`.
    fn inline(&self, node: &Handle, out: &mut String) {
        match node.data {
            NodeData::Text { ref contents } => {
                out.push_str(&escape_text(&collapse_whitespace(&contents.borrow())));
            }
            NodeData::Element { .. } => {
                if is_dropped(node) {
                    return;
                }
                let tag = tag_name(node).unwrap_or_default();
                match tag.as_str() {
                    "br" => out.push_str("\\\n"),
                    "em" | "i" | "cite" | "var" | "dfn" => self.wrap(node, "*", out),
                    "strong" | "b" => self.wrap(node, "**", out),
                    "code" | "kbd" | "samp" | "tt" => {
                        let mut raw = String::new();
                        raw_text(node, &mut raw);
                        let code = collapse_whitespace(&raw);
                        let code = code.trim();
                        if !code.is_empty() {
                            let ticks = fence_for(code, 1, '`');
                            if code.starts_with('`') || code.ends_with('`') {
                                out.push_str(&format!("{ticks} {code} {ticks}"));
                            } else {
                                out.push_str(&format!("{ticks}{code}{ticks}"));
                            }
                        }
                    }
                    "a" => self.link(node, out),
                    "img" => {
                        if let Some(alt) = attr(node, "alt") {
                            out.push_str(&escape_text(&collapse_whitespace(&alt)));
                        }
                    }
                    "q" => {
                        out.push('"');
                        self.inline_children(node, out);
                        out.push('"');
                    }
                    _ if is_block(node) => {
                        // Block inside inline context: keep its words apart.
                        out.push(' ');
                        self.inline_children(node, out);
                        out.push(' ');
                    }
                    _ => self.inline_children(node, out),
                }
            }
            _ => {}
        }
    }

    fn inline_children(&self, node: &Handle, out: &mut String) {
        for child in children(node) {
            self.inline(&child, out);
        }
    }

    /// Wrap inline content in an emphasis marker, keeping outer spaces
    /// outside the markers.
    fn wrap(&self, node: &Handle, marker: &str, out: &mut String) {
        let mut inner = String::new();
        self.inline_children(node, &mut inner);
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            out.push_str(&inner);
            return;
        }
        if inner.starts_with(' ') {
            out.push(' ');
        }
        out.push_str(marker);
        out.push_str(trimmed);
        out.push_str(marker);
        if inner.ends_with(' ') {
            out.push(' ');
        }
    }

    fn link(&self, node: &Handle, out: &mut String) {
        let mut text = String::new();
        self.inline_children(node, &mut text);
        let label = text.trim().to_string();
        let href = attr(node, "href").unwrap_or_default();
        let trailing_space = text.ends_with(' ') && !label.is_empty();

        if text.starts_with(' ') {
            out.push(' ');
        }
        match self.resolver.resolve(&href) {
            LinkTarget::Local(id) => {
                let label = if label.is_empty() { escape_text(&id) } else { label };
                out.push_str(&format!("[{label}]({id})"));
            }
            LinkTarget::External(url) if !label.is_empty() => {
                out.push_str(&format!("[{label}](<{url}>)"));
            }
            LinkTarget::External(_) | LinkTarget::Dropped => out.push_str(&label),
        }
        if trailing_space {
            out.push(' ');
        }
    }

    fn code_block(&self, node: &Handle) -> String {
        let mut raw = String::new();
        raw_text(node, &mut raw);
        let raw = raw.strip_prefix('\n').unwrap_or(&raw);
        let content = raw.trim_end_matches(['\n', ' ', '\t']);
        if content.trim().is_empty() {
            return String::new();
        }
        let fence = fence_for(content, 3, '`');
        let lang = code_language(node).unwrap_or_default();
        format!("{fence}{lang}\n{content}\n{fence}")
    }

    fn list(&self, node: &Handle, ordered: bool) -> String {
        let mut number: u64 = attr(node, "start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);
        let mut items: Vec<String> = Vec::new();

        for child in children(node) {
            if is_dropped(&child) {
                continue;
            }
            let body = match tag_name(&child).as_deref() {
                Some("li") => {
                    let parts = self.block_parts(&child);
                    let mut body = String::new();
                    for (i, (part, _)) in parts.iter().enumerate() {
                        if i > 0 {
                            let tight = parts[i].1 == BlockKind::List;
                            body.push_str(if tight { "\n" } else { "\n\n" });
                        }
                        body.push_str(part);
                    }
                    body
                }
                Some("ul") | Some("ol") => {
                    // Nested list placed directly in the parent list.
                    if let Some(last) = items.last_mut() {
                        let nested = self.block(&child);
                        last.push('\n');
                        last.push_str(&indent(&nested, "  "));
                    }
                    continue;
                }
                _ => {
                    let mut buf = String::new();
                    self.inline(&child, &mut buf);
                    tidy_inline(&buf)
                }
            };
            if body.trim().is_empty() {
                continue;
            }
            let marker = if ordered {
                let m = format!("{number}. ");
                number += 1;
                m
            } else {
                "- ".to_string()
            };
            let pad = " ".repeat(marker.len());
            let mut lines = body.lines();
            let first = lines.next().unwrap_or_default();
            let mut item = format!("{marker}{first}");
            for line in lines {
                item.push('\n');
                if !line.is_empty() {
                    item.push_str(&pad);
                    item.push_str(line);
                }
            }
            items.push(item);
        }
        items.join("\n")
    }

    fn table(&self, node: &Handle) -> String {
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut caption = String::new();
        self.collect_rows(node, &mut rows, &mut caption);
        rows.retain(|r| !r.is_empty());
        if rows.is_empty() {
            return caption;
        }

        let cols = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let render_row = |row: &[String]| {
            let mut line = String::from("|");
            for i in 0..cols {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                line.push(' ');
                line.push_str(cell);
                line.push_str(" |");
            }
            line
        };

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(render_row(&rows[0]));
        lines.push(format!("|{}", " --- |".repeat(cols)));
        for row in &rows[1..] {
            lines.push(render_row(row));
        }
        let table = lines.join("\n");
        if caption.is_empty() {
            table
        } else {
            format!("{caption}\n\n{table}")
        }
    }

    fn collect_rows(&self, node: &Handle, rows: &mut Vec<Vec<String>>, caption: &mut String) {
        for child in children(node) {
            if is_dropped(&child) {
                continue;
            }
            match tag_name(&child).as_deref() {
                Some("tr") => {
                    let cells = children(&child)
                        .iter()
                        .filter(|c| matches!(tag_name(c).as_deref(), Some("td") | Some("th")))
                        .map(|c| self.inline_line(c).replace('|', "\\|"))
                        .collect();
                    rows.push(cells);
                }
                Some("thead") | Some("tbody") | Some("tfoot") => {
                    self.collect_rows(&child, rows, caption);
                }
                Some("caption") => *caption = self.inline_line(&child),
                _ => {}
            }
        }
    }

    fn definition_list(&self, node: &Handle) -> String {
        let mut parts = Vec::new();
        for child in children(node) {
            if is_dropped(&child) {
                continue;
            }
            match tag_name(&child).as_deref() {
                Some("dt") => {
                    let term = self.block(&child);
                    if !term.is_empty() {
                        parts.push(term);
                    }
                }
                Some("dd") => {
                    let def = self.blocks(&child);
                    if !def.is_empty() {
                        parts.push(def);
                    }
                }
                _ => {}
            }
        }
        parts.join("\n\n")
    }
}

fn indent(text: &str, pad: &str) -> String {
    text.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("{pad}{l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WikiVersion;
    use crate::document::Category;

    fn md(html: &str) -> String {
        postprocess::clean_markdown(&html_to_markdown(html, &LinkResolver::default()))
    }

    fn source(identity: &str, html: &str) -> SourceDocument {
        SourceDocument::html(identity, Category::new("SDL2", 0), html, WikiVersion::V2)
    }

    #[test]
    fn headings_and_paragraphs() {
        assert_eq!(
            md("<h1>SDL_Init</h1><p>Initializes SDL.</p><h2>Remarks</h2><p>Call   it\nonce.</p>"),
            "# SDL_Init\n\nInitializes SDL.\n\n## Remarks\n\nCall it once.\n"
        );
    }

    #[test]
    fn scripts_styles_and_nav_removed() {
        let html = r#"<html><head><title>t</title><style>p{}</style></head><body>
            <nav><a href="/">Home</a></nav>
            <div class="site-sidebar">Sidebar junk</div>
            <script>track()</script>
            <p data-track="x">Kept.</p>
            <footer>Footer</footer></body></html>"#;
        assert_eq!(md(html), "Kept.\n");
    }

    #[test]
    fn main_element_is_preferred() {
        let html = "<body><div>Outside</div><main><p>Inside</p></main></body>";
        assert_eq!(md(html), "Inside\n");
    }

    #[test]
    fn code_blocks_keep_whitespace_and_language() {
        let html = "<pre><code class=\"language-c\">int main(void)\n{\n    SDL_Init(0);\n}\n</code></pre>";
        assert_eq!(
            md(html),
            "```c\nint main(void)\n{\n    SDL_Init(0);\n}\n```\n"
        );
    }

    #[test]
    fn inline_markup() {
        assert_eq!(
            md("<p>Use <code>SDL_Init()</code> with <strong>care</strong> and <em>no</em> flags.</p>"),
            "Use `SDL_Init()` with **care** and *no* flags.\n"
        );
    }

    #[test]
    fn lists_nested_and_ordered() {
        let html = "<ul><li>One<ul><li>Inner</li></ul></li><li>Two</li></ul><ol start=\"3\"><li>c</li><li>d</li></ol>";
        assert_eq!(md(html), "- One\n  - Inner\n- Two\n\n3. c\n4. d\n");
    }

    #[test]
    fn list_nested_directly_in_list_attaches_to_previous_item() {
        let html = "<ul><li>Flags</li><ul><li>SDL_INIT_VIDEO</li></ul><li>Return</li></ul>";
        assert_eq!(md(html), "- Flags\n  - SDL_INIT_VIDEO\n- Return\n");
    }

    #[test]
    fn tables_always_have_separator() {
        let html = "<table><tr><td>Flag</td><td>Meaning</td></tr><tr><td>A|B</td><td>x</td></tr></table>";
        assert_eq!(
            md(html),
            "| Flag | Meaning |\n| --- | --- |\n| A\\|B | x |\n"
        );
    }

    #[test]
    fn links_rewritten_to_identity() {
        let resolver = LinkResolver::new(["SDL_Quit"]);
        let html = r#"<p>See <a href="https://wiki.libsdl.org/SDL2/SDL_Quit">SDL_Quit</a> and <a href="/CategoryAPI">the API</a>.</p>"#;
        let out = postprocess::clean_markdown(&html_to_markdown(html, &resolver));
        assert_eq!(out, "See [SDL_Quit](SDL_Quit) and the API.\n");
        assert!(!out.contains("wiki.libsdl.org"));
    }

    #[test]
    fn external_links_lose_tracking() {
        let html = r#"<p><a href="https://libsdl.org/?utm_source=wiki">site</a></p>"#;
        assert_eq!(md(html), "[site](<https://libsdl.org/>)\n");
    }

    #[test]
    fn images_become_alt_text() {
        assert_eq!(md("<p><img src=\"x.png\" alt=\"Diagram\"> here</p>"), "Diagram here\n");
    }

    #[test]
    fn markdown_special_chars_escaped() {
        assert_eq!(md("<p>SDL_Window *w = a[0];</p>"), "SDL_Window \\*w = a\\[0\\];\n");
        assert_eq!(md("<p># not a heading</p>"), "\\# not a heading\n");
    }

    #[test]
    fn hr_becomes_placeholder() {
        assert_eq!(
            md("<p>a</p><hr><p>b</p>"),
            format!("a\n\n{}\n\nb\n", postprocess::HR_PLACEHOLDER)
        );
    }

    #[test]
    fn br_is_hard_break() {
        assert_eq!(md("<p>one<br>two<br></p>"), "one\\\ntwo\n");
    }

    #[test]
    fn normalize_is_deterministic() {
        let src = source("SDL_Init", "<h1>SDL_Init</h1><p>Initializes SDL.</p>");
        let resolver = LinkResolver::default();
        let a = normalize(&src, &resolver).unwrap();
        let b = normalize(&src, &resolver).unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.text, "# SDL_Init\n\nInitializes SDL.\n");
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut src = source("Broken", "");
        src.content = vec![0x3c, 0x70, 0x3e, 0xff, 0xfe];
        let err = normalize(&src, &LinkResolver::default()).unwrap_err();
        assert!(matches!(err, DocumentError::MalformedInput { ref identity, .. } if identity == "Broken"));
    }

    #[test]
    fn empty_after_sanitization_is_malformed() {
        let src = source("Empty", "<script>x()</script><nav>menu</nav>");
        let err = normalize(&src, &LinkResolver::default()).unwrap_err();
        assert!(err.to_string().contains("no content"));
    }

    #[test]
    fn markdown_sources_are_cleaned() {
        let src = SourceDocument::markdown(
            "SDL_Quit",
            Category::new("SDL2", 0),
            "# SDL_Quit\r\n\r\nSee [SDL_Init](SDL_Init).\r\n\r\n\r\n----\r\n",
            WikiVersion::V2,
        );
        let doc = normalize(&src, &LinkResolver::new(["SDL_Init"])).unwrap();
        assert_eq!(
            doc.text,
            format!(
                "# SDL_Quit\n\nSee [SDL_Init](SDL_Init).\n\n{}\n",
                postprocess::HR_PLACEHOLDER
            )
        );
    }
}
