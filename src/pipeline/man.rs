//! Man target: one normalized document → one man(7) page.
//!
//! The page is generated directly from the pulldown-cmark event stream:
//!
//! | Markdown                     | roff                                   |
//! |------------------------------|----------------------------------------|
//! | identity + first line        | `.TH`, `.SH NAME` (`identity \- line`)  |
//! | content before the first `##`| `.SH DESCRIPTION`                      |
//! | `## Heading`                 | `.SH HEADING` (`Syntax` → `SYNOPSIS`)  |
//! | `### Heading`                | `.SS Heading`                          |
//! | fenced code                  | `.EX` … `.EE`, indented                |
//! | list item                    | `.IP`                                  |
//! | `*em*` / `**strong**`        | `\fI…\fR` / `\fB…\fR`                  |
//! | `[x](Identity)`              | `\fBIdentity\fR(3)`                    |
//! | `[x](https://…)`             | `x <https://…>`                        |
//! | table                        | tbl(1) `.TS` … `.TE`                   |
//!
//! HTML comments (the elided horizontal rules) are dropped.

use crate::config::ManOptions;
use crate::document::NormalizedDocument;
use crate::error::DocumentError;
use crate::pipeline::store::write_atomic;
use flate2::write::GzEncoder;
use flate2::Compression;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::io::Write;
use std::path::Path;

/// Render `doc` as roff source.
///
/// `.TH` and NAME carry the document identity; the `# ` heading itself is
/// not rendered. `date` goes verbatim into the `.TH` line.
pub fn render_roff(doc: &NormalizedDocument, opts: &ManOptions, date: &str) -> String {
    let title = doc.identity.as_str();
    let description = description_line(&doc.text).unwrap_or_else(|| title.to_string());

    let mut w = RoffWriter::new(opts.section);
    w.out.push_str(&format!(
        ".TH {} {} {} {} {}\n",
        quote(title),
        quote(&opts.section.to_string()),
        quote(date),
        quote(&opts.source),
        quote(&opts.manual),
    ));
    w.out.push_str(".SH NAME\n");
    w.out.push_str(&format!(
        "{} \\- {}\n",
        escape(title),
        escape(&description)
    ));

    let parser = Parser::new_ext(&doc.text, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    for event in parser {
        w.event(event);
    }
    w.finish()
}

/// First non-empty line after the `# ` title, reduced to plain text.
fn description_line(text: &str) -> Option<String> {
    let mut seen_title = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if !seen_title {
            seen_title = trimmed.starts_with("# ");
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("<!--") {
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with("```") || trimmed.starts_with('|') {
            return None;
        }
        let plain = plain_text(trimmed);
        return (!plain.is_empty()).then_some(plain);
    }
    None
}

fn plain_text(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Escape text for roff: backslashes, hyphens.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\e"),
            '-' => out.push_str("\\-"),
            _ => out.push(c),
        }
    }
    out
}

/// Quote a macro argument.
fn quote(s: &str) -> String {
    format!("\"{}\"", escape(s).replace('"', "\\(dq"))
}

/// Lines starting with `.` or `'` would be read as requests.
fn guard_line(line: &str) -> String {
    if line.starts_with('.') || line.starts_with('\'') {
        format!("\\&{line}")
    } else {
        line.to_string()
    }
}

enum Capture {
    Heading(HeadingLevel),
    Link(String),
    Code,
    Cell,
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    current: Vec<String>,
    header_rows: usize,
}

struct RoffWriter {
    out: String,
    section: u8,
    /// Open captures; text goes to the innermost one.
    captures: Vec<(Capture, String)>,
    /// A `.SH`/`.SS`/`.IP` was just written; the next paragraph needs no `.PP`.
    suppress_pp: bool,
    in_section: bool,
    in_title: bool,
    /// `None` for bullets, `Some(n)` for the next ordered number.
    lists: Vec<Option<u64>>,
    table: Option<TableState>,
    uses_tbl: bool,
}

impl RoffWriter {
    fn new(section: u8) -> Self {
        Self {
            out: String::new(),
            section,
            captures: Vec::new(),
            suppress_pp: false,
            in_section: false,
            in_title: false,
            lists: Vec::new(),
            table: None,
            uses_tbl: false,
        }
    }

    fn finish(self) -> String {
        let mut out = self.out;
        if !out.ends_with('\n') {
            out.push('\n');
        }
        if self.uses_tbl {
            out.insert_str(0, "'\\\" t\n");
        }
        out
    }

    fn sink(&mut self) -> &mut String {
        match self.captures.last_mut() {
            Some((_, buf)) => buf,
            None => &mut self.out,
        }
    }

    fn newline(&mut self) {
        let sink = self.sink();
        if !sink.is_empty() && !sink.ends_with('\n') {
            sink.push('\n');
        }
    }

    fn request(&mut self, req: &str) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out.push_str(req);
        self.out.push('\n');
    }

    fn text(&mut self, raw: &str) {
        if self.in_title {
            return;
        }
        let escaped = if self.in_section_title() {
            escape(&raw.to_uppercase())
        } else {
            escape(raw)
        };
        let sink = self.sink();
        if sink.is_empty() || sink.ends_with('\n') {
            sink.push_str(&guard_line(&escaped));
        } else {
            sink.push_str(&escaped);
        }
    }

    /// Any block outside a heading opens DESCRIPTION if no section is open.
    fn open_block(&mut self) {
        if !self.in_section {
            self.request(".SH DESCRIPTION");
            self.in_section = true;
            self.suppress_pp = true;
        }
    }

    fn paragraph_break(&mut self) {
        if self.suppress_pp {
            self.suppress_pp = false;
        } else {
            self.request(".PP");
        }
    }

    /// `##` headings are upper-cased before escaping so escapes survive.
    fn in_section_title(&self) -> bool {
        matches!(
            self.captures.last(),
            Some((Capture::Heading(HeadingLevel::H2), _))
        )
    }

    fn in_capture(&self) -> bool {
        !self.captures.is_empty()
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(t) => self.text(&t),
            Event::Code(t) => {
                if self.in_title {
                    return;
                }
                let code = if self.in_section_title() {
                    escape(&t.to_uppercase())
                } else {
                    format!("\\fB{}\\fR", escape(&t))
                };
                let sink = self.sink();
                if sink.is_empty() || sink.ends_with('\n') {
                    sink.push_str("\\&");
                }
                sink.push_str(&code);
            }
            Event::SoftBreak => {
                if self.in_capture() {
                    self.sink().push(' ');
                } else {
                    self.newline();
                }
            }
            Event::HardBreak => {
                if self.in_capture() {
                    self.sink().push(' ');
                } else {
                    self.request(".br");
                }
            }
            Event::Rule => {
                self.open_block();
                self.request(".PP");
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                if level == HeadingLevel::H1 {
                    self.in_title = true;
                } else {
                    self.captures.push((Capture::Heading(level), String::new()));
                }
            }
            Tag::Paragraph => {
                if self.in_capture() {
                    return;
                }
                self.open_block();
                if self.lists.is_empty() {
                    self.paragraph_break();
                } else if self.suppress_pp {
                    self.suppress_pp = false;
                } else {
                    self.request(".IP");
                }
            }
            Tag::CodeBlock(_) => {
                self.open_block();
                self.paragraph_break();
                self.captures.push((Capture::Code, String::new()));
            }
            Tag::List(start) => {
                self.open_block();
                if !self.lists.is_empty() {
                    self.request(".RS");
                }
                self.lists.push(start);
            }
            Tag::Item => {
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let m = format!(".IP {n}. 4");
                        *n += 1;
                        m
                    }
                    _ => ".IP \\(bu 2".to_string(),
                };
                self.request(&marker);
                self.suppress_pp = true;
            }
            Tag::BlockQuote(_) => {
                self.open_block();
                self.request(".RS");
            }
            Tag::Emphasis if !self.in_title => self.sink().push_str("\\fI"),
            Tag::Strong if !self.in_title => self.sink().push_str("\\fB"),
            Tag::Link { dest_url, .. } => {
                self.captures
                    .push((Capture::Link(dest_url.to_string()), String::new()));
            }
            Tag::Table(_) => {
                self.open_block();
                self.paragraph_break();
                self.table = Some(TableState::default());
                self.uses_tbl = true;
            }
            Tag::TableCell => self.captures.push((Capture::Cell, String::new())),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(level) => {
                if level == HeadingLevel::H1 {
                    self.in_title = false;
                    return;
                }
                let Some((Capture::Heading(_), text)) = self.captures.pop() else {
                    return;
                };
                let text = text.trim().to_string();
                if level == HeadingLevel::H2 {
                    let name = if text == "SYNTAX" {
                        "SYNOPSIS".to_string()
                    } else {
                        text
                    };
                    self.request(&format!(".SH {}", quote_raw(&name)));
                    self.in_section = true;
                } else {
                    self.open_block();
                    self.request(&format!(".SS {}", quote_raw(&text)));
                }
                self.suppress_pp = true;
            }
            TagEnd::Paragraph => {
                if !self.in_capture() {
                    self.newline();
                }
            }
            TagEnd::CodeBlock => {
                if let Some((Capture::Code, code)) = self.captures.pop() {
                    self.request(".in +4n");
                    self.request(".EX");
                    for line in code.trim_end_matches('\n').lines() {
                        self.out.push_str(&guard_line(line));
                        self.out.push('\n');
                    }
                    self.request(".EE");
                    self.request(".in");
                }
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if !self.lists.is_empty() {
                    self.request(".RE");
                }
                self.suppress_pp = false;
            }
            TagEnd::Item => self.newline(),
            TagEnd::BlockQuote(_) => self.request(".RE"),
            TagEnd::Emphasis | TagEnd::Strong if !self.in_title => self.sink().push_str("\\fR"),
            TagEnd::Link => {
                if let Some((Capture::Link(dest), text)) = self.captures.pop() {
                    if self.in_title {
                        return;
                    }
                    let rendered = if is_local(&dest) {
                        format!("\\fB{}\\fR({})", escape(&dest), self.section)
                    } else if text.trim().is_empty() || text.trim() == escape(&dest) {
                        escape(&dest)
                    } else {
                        format!("{} <{}>", text.trim(), escape(&dest))
                    };
                    self.sink().push_str(&rendered);
                }
            }
            TagEnd::TableCell => {
                if let Some((Capture::Cell, cell)) = self.captures.pop() {
                    if let Some(t) = self.table.as_mut() {
                        t.current.push(cell.trim().replace('\t', " "));
                    }
                }
            }
            TagEnd::TableHead => {
                if let Some(t) = self.table.as_mut() {
                    let row = std::mem::take(&mut t.current);
                    t.rows.push(row);
                    t.header_rows = 1;
                }
            }
            TagEnd::TableRow => {
                if let Some(t) = self.table.as_mut() {
                    let row = std::mem::take(&mut t.current);
                    t.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(t) = self.table.take() {
                    self.write_table(t);
                }
            }
            _ => {}
        }
    }

    fn write_table(&mut self, t: TableState) {
        let cols = t.rows.iter().map(Vec::len).max().unwrap_or(0);
        if cols == 0 {
            return;
        }
        self.request(".TS");
        self.out.push_str("allbox tab(\t);\n");
        if t.header_rows > 0 {
            self.out.push_str(&vec!["lb"; cols].join(" "));
            self.out.push('\n');
        }
        self.out.push_str(&vec!["lx"; cols].join(" "));
        self.out.push_str(".\n");
        for row in &t.rows {
            let cells: Vec<String> = (0..cols)
                .map(|i| {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    if cell.contains('\t') || cell.len() > 40 {
                        format!("T{{\n{cell}\nT}}")
                    } else {
                        cell.to_string()
                    }
                })
                .collect();
            self.out.push_str(&cells.join("\t"));
            self.out.push('\n');
        }
        self.request(".TE");
    }
}

/// Quote a heading that is already escaped.
fn quote_raw(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\(dq"))
}

/// Links the normalizer produced for another document: a bare identity.
fn is_local(dest: &str) -> bool {
    !dest.is_empty() && !dest.contains(':') && !dest.contains('/') && !dest.starts_with('#')
}

/// Compress a page with gzip.
pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 3), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Render `doc` and write it to `path`, gzipped when `opts.compress`.
///
/// Returns the number of bytes written.
pub fn write_man_page(
    doc: &NormalizedDocument,
    opts: &ManOptions,
    date: &str,
    path: &Path,
) -> Result<usize, DocumentError> {
    let fail = |detail: String| DocumentError::RenderFailure {
        identity: doc.identity.clone(),
        detail,
    };
    let roff = render_roff(doc, opts, date);
    let bytes = if opts.compress {
        gzip(roff.as_bytes()).map_err(|e| fail(format!("gzip: {e}")))?
    } else {
        roff.into_bytes()
    };
    write_atomic(path, &bytes).map_err(|e| fail(format!("write {}: {e}", path.display())))?;
    Ok(bytes.len())
}

/// `.TH` date: the configured one, or today.
pub fn page_date(opts: &ManOptions) -> String {
    opts.date
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string())
}
