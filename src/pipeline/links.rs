//! Cross-document link resolution.
//!
//! Wiki pages link to each other by URL (`https://wiki.libsdl.org/SDL2/SDL_Init`,
//! `/SDL2/SDL_Init`, `SDL_Init.html`, …). In the converted corpus those links
//! must point at the local identity instead, so they survive in the PDF and
//! turn into `SEE ALSO`-style references in man pages.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Where a link ends up after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Another document of this run, by identity.
    Local(String),
    /// An absolute URL outside the corpus, tracking parameters removed.
    External(String),
    /// Nothing useful outside a browser; keep only the link text.
    Dropped,
}

/// Maps hrefs onto the identities known to the current run.
#[derive(Debug, Clone, Default)]
pub struct LinkResolver {
    known: HashSet<String>,
}

impl LinkResolver {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: identities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_known(&self, identity: &str) -> bool {
        self.known.contains(identity)
    }

    pub fn resolve(&self, href: &str) -> LinkTarget {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return LinkTarget::Dropped;
        }
        let lower = href.to_ascii_lowercase();
        if lower.starts_with("javascript:") || lower.starts_with("data:") {
            return LinkTarget::Dropped;
        }

        if let Some(identity) = last_segment(href) {
            if self.known.contains(identity) {
                return LinkTarget::Local(identity.to_string());
            }
        }

        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
        {
            LinkTarget::External(strip_tracking_params(href))
        } else {
            LinkTarget::Dropped
        }
    }
}

/// Final path segment without query, fragment, or page extension.
fn last_segment(href: &str) -> Option<&str> {
    let path = href.split(['#', '?']).next().unwrap_or("");
    let path = path.trim_end_matches('/');
    let seg = path.rsplit('/').next().unwrap_or(path);
    let seg = [".html", ".htm", ".md"]
        .iter()
        .find_map(|ext| seg.strip_suffix(ext))
        .unwrap_or(seg);
    (!seg.is_empty()).then_some(seg)
}

const TRACKING_KEYS: [&str; 5] = ["fbclid", "gclid", "ref", "mc_cid", "mc_eid"];

fn is_tracking_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_KEYS.contains(&key.as_str())
}

/// Remove analytics query parameters, keeping the rest of the URL intact.
pub fn strip_tracking_params(url: &str) -> String {
    let (before_fragment, fragment) = match url.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (url, None),
    };
    let (base, query) = match before_fragment.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (before_fragment, None),
    };

    let mut out = base.to_string();
    if let Some(query) = query {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or("");
                !key.is_empty() && !is_tracking_key(key)
            })
            .collect();
        if !kept.is_empty() {
            out.push('?');
            out.push_str(&kept.join("&"));
        }
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

// ── Markdown sources ─────────────────────────────────────────────────────────

static RE_INLINE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*<?([^)\s>]*)>?(?:\s+"[^"]*")?\s*\)"#).unwrap()
});

static RE_REFERENCE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\[[^\]]*\]").unwrap());

static RE_LINK_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}\[[^\]]+\]:\s?\S.*$").unwrap());

/// Rewrite links in a Markdown page through `resolver`.
///
/// Inline links become local or external links (or plain text), images
/// become their alt text, reference-style links keep only their text and
/// reference definitions are removed. Fenced code is left alone.
pub fn rewrite_markdown_links(input: &str, resolver: &LinkResolver) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in input.lines() {
        if line.trim_start().starts_with("```") || line.trim_start().starts_with("~~~") {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }
        if RE_LINK_DEFINITION.is_match(line) {
            continue;
        }
        let line = RE_INLINE_LINK.replace_all(line, |caps: &regex::Captures<'_>| {
            let text = &caps[2];
            if &caps[1] == "!" {
                return text.to_string();
            }
            match resolver.resolve(&caps[3]) {
                LinkTarget::Local(id) => format!("[{text}]({id})"),
                LinkTarget::External(url) => format!("[{text}]({url})"),
                LinkTarget::Dropped => text.to_string(),
            }
        });
        let line = RE_REFERENCE_LINK.replace_all(&line, "$1");
        out.push(line.into_owned());
    }
    out.join("\n")
}
