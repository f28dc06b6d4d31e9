//! Post-processing: deterministic cleanup of converted Markdown.
//!
//! Both conversion paths (HTML pages and pages already stored as Markdown)
//! end here, so every normalized document obeys the same text rules no
//! matter where it came from. Each rule is a pure `&str → String` pass.
//!
//! ## Rule Order
//!
//! Line endings are normalised before anything looks at lines; character
//! folding runs before rule detection so `――――` style rules are not missed;
//! heading spacing runs before blank-line collapsing so the blank lines it
//! inserts are collapsed with everything else; the final-newline pass is last.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Marker left where a horizontal rule used to be. Rules render as stray
/// dashes in both pandoc's LaTeX output and roff.
pub const HR_PLACEHOLDER: &str = "<!-- Horizontal line omitted for PDF and MAN -->";

/// Apply all post-processing rules.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Fold curly double quotes, then apply NFKC (ligatures, fullwidth
///    forms, non-breaking spaces, superscripts, ellipsis)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 4. Replace `----` horizontal rules with [`HR_PLACEHOLDER`]
/// 5. Remove empty `()` outside code
/// 6. Trim trailing whitespace per line
/// 7. Ensure heading lines have a blank line before them
/// 8. Fix GFM tables missing a separator row
/// 9. Collapse blank-line runs to a single blank line
/// 10. Ensure the text has no leading blank lines and ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = fold_compatibility_chars(&s);
    let s = remove_invisible_chars(&s);
    let s = replace_horizontal_rules(&s);
    let s = remove_empty_parens(&s);
    let s = trim_trailing_whitespace(&s);
    let s = normalise_heading_spacing(&s);
    let s = fix_broken_tables(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// Run `f` over every line outside fenced code blocks.
fn map_prose_lines(input: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let mut in_fence = false;
    let mut out = Vec::new();
    for line in input.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence {
            out.push(line.to_string());
        } else if let Some(mapped) = f(line) {
            out.push(mapped);
        }
    }
    out.join("\n")
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Fold compatibility characters ────────────────────────────────────

fn fold_compatibility_chars(input: &str) -> String {
    // NFKC leaves curly double quotes alone; fold those first.
    map_prose_lines(input, |line| {
        let folded: String = line
            .chars()
            .map(|c| match c {
                '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
                _ => c,
            })
            .nfkc()
            .collect();
        Some(folded)
    })
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Horizontal rules ─────────────────────────────────────────────────

static RE_HR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^----\s*$").unwrap());

fn replace_horizontal_rules(input: &str) -> String {
    map_prose_lines(input, |line| {
        if RE_HR.is_match(line) {
            Some(HR_PLACEHOLDER.to_string())
        } else {
            Some(line.to_string())
        }
    })
}

// ── Rule 5: Remove empty parentheses ─────────────────────────────────────────
//
// Empty `()` is left behind by links whose target was dropped and by
// call-style mentions in prose. Inline code spans keep theirs: they are C.

fn remove_empty_parens(input: &str) -> String {
    map_prose_lines(input, |line| {
        if !line.contains("()") {
            return Some(line.to_string());
        }
        let rewritten = line
            .split('`')
            .enumerate()
            .map(|(i, part)| {
                if i % 2 == 0 {
                    part.replace("()", "")
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("`");
        Some(rewritten)
    })
}

// ── Rule 6: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    map_prose_lines(input, |line| Some(line.trim_end().to_string()))
}

// ── Rule 7: Normalise heading spacing ────────────────────────────────────────

static RE_ATX_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}(\s|$)").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    // Blank line before each ATX heading, except at the very start. `#include`
    // inside fenced code is not a heading.
    let mut result = String::with_capacity(input.len() + 64);
    let mut in_fence = false;
    for (i, line) in input.lines().enumerate() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if !in_fence && i > 0 && RE_ATX_HEADING.is_match(line) {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 8: Fix broken GFM tables ───────────────────────────────────────────

/// Detects table rows (lines starting with `|`) and ensures a separator row
/// exists after the header row if missing.
fn fix_broken_tables(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut result = Vec::with_capacity(lines.len() + 10);
    let mut prev_was_table = false;
    let mut in_fence = false;

    for (i, line) in lines.iter().enumerate() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        let is_row = !in_fence && is_table_row(line);
        if is_row && !prev_was_table && !is_separator_row(line) {
            result.push(line.to_string());
            let next = lines.get(i + 1).copied().unwrap_or("");
            if is_table_row(next) && !is_separator_row(next) {
                let col_count = line.matches('|').count().saturating_sub(1).max(1);
                let sep: String = std::iter::once("|")
                    .chain(std::iter::repeat_n(" --- |", col_count))
                    .collect();
                result.push(sep);
            }
        } else {
            result.push(line.to_string());
        }
        prev_was_table = is_row;
    }

    result.join("\n")
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.starts_with('|') {
        return false;
    }
    // A separator row contains only |, -, :, and whitespace
    trimmed
        .chars()
        .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

// ── Rule 9: Collapse blank lines ────────────────────────────────────────────

fn collapse_blank_lines(input: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    let mut prev_blank = false;
    for line in input.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        let blank = !in_fence && line.is_empty();
        if blank && prev_blank {
            continue;
        }
        prev_blank = blank;
        out.push(line);
    }
    out.join("\n")
}

// ── Rule 10: Leading/trailing newlines ──────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_fold_quotes_and_ligatures() {
        assert_eq!(
            fold_compatibility_chars("\u{201C}de\u{FB01}ne\u{201D}\u{00A0}now\u{2026}"),
            "\"define\" now..."
        );
    }

    #[test]
    fn test_fold_nfkc_compatibility_forms() {
        assert_eq!(
            fold_compatibility_chars("\u{FF33}\u{FF24}\u{FF2C} x\u{00B2} \u{2122} \u{00BD}"),
            "SDL x2 TM 1\u{2044}2"
        );
        let code = "```\n\u{FF33} x\u{00B2}\n```";
        assert_eq!(fold_compatibility_chars(code), code);
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_horizontal_rule_placeholder() {
        assert_eq!(
            replace_horizontal_rules("a\n----\nb\n---- \n"),
            format!("a\n{HR_PLACEHOLDER}\nb\n{HR_PLACEHOLDER}")
        );
    }

    #[test]
    fn test_rule_inside_code_untouched() {
        let input = "```\n----\n```";
        assert_eq!(replace_horizontal_rules(input), input);
    }

    #[test]
    fn test_empty_parens_outside_code() {
        assert_eq!(
            remove_empty_parens("Call SDL_Init() before `SDL_Quit()`."),
            "Call SDL_Init before `SDL_Quit()`."
        );
        let code = "```c\nSDL_Init();\n```";
        assert_eq!(remove_empty_parens(code), code);
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_code_blocks_keep_whitespace() {
        let input = "text  \n\n\n\n```c\nint x;   \n\n\n\nint y;\n```\n\n\nafter  ";
        assert_eq!(
            clean_markdown(input),
            "text\n\n```c\nint x;   \n\n\n\nint y;\n```\n\nafter\n"
        );
    }

    #[test]
    fn test_table_rows_in_code_untouched() {
        let input = "```\n| a | b |\n| 1 | 2 |\n```";
        assert_eq!(fix_broken_tables(input), input);
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("\n\nhello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_heading_spacing() {
        let input = "some text\n## Heading\nmore text";
        let result = normalise_heading_spacing(input);
        assert!(result.contains("some text\n\n## Heading\n"));
    }

    #[test]
    fn test_include_in_code_is_not_heading() {
        let input = "```c\nint x;\n#include <SDL.h>\n```";
        let result = normalise_heading_spacing(input);
        assert!(result.contains("int x;\n#include"));
    }

    #[test]
    fn test_fix_broken_table() {
        let input = "| A | B |\n| 1 | 2 |\n| 3 | 4 |";
        let result = fix_broken_tables(input);
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(is_separator_row(lines[1]));
        assert!(!is_separator_row(lines[3]));
    }

    #[test]
    fn test_table_with_separator_unchanged() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 |";
        assert_eq!(fix_broken_tables(input), input);
    }

    #[test]
    fn test_clean_markdown_full_pipeline() {
        let input = "\n\n# Title   \r\n\u{201C}Quoted\u{201D}\r\n\r\n\r\n\r\n## Section\nbody()\n----\n";
        let result = clean_markdown(input);
        assert_eq!(
            result,
            format!("# Title\n\"Quoted\"\n\n## Section\nbody\n{HR_PLACEHOLDER}\n")
        );
    }

    #[test]
    fn test_clean_markdown_is_idempotent() {
        let input = "# A\n\n\n\ntext  \n| x | y |\n| 1 | 2 |\n";
        let once = clean_markdown(input);
        assert_eq!(clean_markdown(&once), once);
    }
}
