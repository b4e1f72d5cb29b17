//! quote-aware text helpers
//!
//! Strings are delimited by `'` or `"`. Inside a string the delimiter is escaped by doubling it
//! (`'it''s'`). An unterminated string runs to the end of the text.
use std::ops::Range;

pub(crate) const COMMENT: char = '%';

/// A piece of text that is either inside or outside a quoted string
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct Segment<'a> {
    pub quoted: bool,
    pub text: &'a str,
}

/// Split text into alternating unquoted and quoted segments
///
/// Quoted segments include their delimiters.
pub(crate) fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = vec![];
    let mut start = 0;
    let mut open: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match open {
            None if c == '\'' || c == '"' => {
                if i > start {
                    out.push(Segment {
                        quoted: false,
                        text: &text[start..i],
                    });
                }
                start = i;
                open = Some(c);
            }
            Some(q) if c == q => {
                if chars.peek().map(|(_, next)| *next) == Some(q) {
                    // doubled delimiter
                    chars.next();
                    continue;
                }
                let end = i + c.len_utf8();
                out.push(Segment {
                    quoted: true,
                    text: &text[start..end],
                });
                start = end;
                open = None;
            }
            _ => {}
        }
    }

    if start < text.len() {
        out.push(Segment {
            quoted: open.is_some(),
            text: &text[start..],
        });
    }

    out
}

/// Byte ranges of all quoted segments
pub(crate) fn quoted_ranges(text: &str) -> Vec<Range<usize>> {
    let mut offset = 0;
    let mut ranges = vec![];
    for segment in segments(text) {
        let end = offset + segment.text.len();
        if segment.quoted {
            ranges.push(offset..end);
        }
        offset = end;
    }
    ranges
}

pub(crate) fn in_ranges(ranges: &[Range<usize>], offset: usize) -> bool {
    ranges.iter().any(|r| r.contains(&offset))
}

/// Rewrite only the parts of `text` that are outside of quoted strings
pub(crate) fn map_unquoted(text: &str, mut f: impl FnMut(&str) -> String) -> String {
    segments(text)
        .into_iter()
        .map(|segment| {
            if segment.quoted {
                segment.text.to_string()
            } else {
                f(segment.text)
            }
        })
        .collect()
}

/// Remove the delimiters of a quoted string and collapse doubled delimiters
pub(crate) fn unquote(text: &str) -> &str {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if open == close && (open == '\'' || open == '"') => {
            &text[1..text.len() - 1]
        }
        (Some(open), None) if open == '\'' || open == '"' => "",
        _ => text.strip_prefix(['\'', '"']).unwrap_or(text),
    }
}

/// Collapse doubled delimiters (`''` -> `'`) of a string that was quoted with `quote`
pub(crate) fn unescape(text: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    text.replace(&doubled, &quote.to_string())
}

/// Find `needle` outside of quoted strings and brackets
pub(crate) fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let quoted = quoted_ranges(text);
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        if in_ranges(&quoted, i) {
            continue;
        }
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            c if c == needle && depth <= 0 => return Some(i),
            _ => {}
        }
    }
    None
}
