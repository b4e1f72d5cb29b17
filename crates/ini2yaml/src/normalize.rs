//! text normalization
//!
//! Turns raw ini text into text that can be split into `key = value` lines and whose values
//! follow the literal grammar understood by [crate::expr]. The passes run in this order:
//!
//! 1. strip `%` comments (not inside strings)
//! 2. strip every line and drop empty ones
//! 3. `num2str(x)` -> `str(x)`
//! 4. `datenum(...)` -> `"YYYY-MM-DDTHH:MM:SS"`
//! 5. `'[...]'` -> `[...]`, `{[...]}` and `{...}` -> `[...]`
//! 6. space/semicolon delimited lists and matrices -> comma delimited, nested lists
//! 7. pad `=` and brackets with single spaces, except for the `[Trace]` and `[End]` markers,
//!    and put the markers on lines of their own
//!
//! Everything except step 5 leaves quoted strings alone.
use crate::error::{Diagnostics, Issue};
use crate::expr::MAX_NESTING;
use crate::util::{self, in_ranges, map_unquoted, quoted_ranges, COMMENT};
use crate::value::DATE_FORMAT;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

pub const TRACE_START: &str = "[Trace]";
pub const TRACE_END: &str = "[End]";

/// `datenum('now')` is pinned to this instant so output stays reproducible
pub const NOW_SENTINEL: &str = "2100-01-01T00:00:00";

pub fn normalize(text: &str, diagnostics: &mut Diagnostics) -> String {
    let text = strip_comments(text);
    let text = drop_blank_lines(&text);
    let text = replace_num2str(&text);
    let text = replace_datenum(&text, diagnostics);
    let text = unwrap_quoted_lists(&text);
    let text = convert_cells(&text);
    let text = format_lists(&text);
    let text = canonicalize_whitespace(&text);
    tracing::trace!(%text, "normalized");
    text
}

/// Remove everything from `%` to the end of the line, unless the `%` is inside a string
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open: Option<char> = None;
    let mut in_comment = false;

    for c in text.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            continue;
        }

        match open {
            None if c == COMMENT => in_comment = true,
            None if c == '\'' || c == '"' => {
                open = Some(c);
                out.push(c);
            }
            Some(q) if c == q => {
                open = None;
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

fn drop_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn call_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"\b{name}\s*\(")).expect("static pattern")
}

/// Rewrite every unquoted call of a function
///
/// `f` receives the argument text and returns the replacement for the whole call, or `None`
/// to leave the call untouched.
fn rewrite_calls(
    text: &str,
    pattern: &Regex,
    mut f: impl FnMut(&str) -> Option<String>,
) -> String {
    let quoted = quoted_ranges(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for found in pattern.find_iter(text) {
        if found.start() < cursor || in_ranges(&quoted, found.start()) {
            continue;
        }
        let Some(close) = matching_close(text, found.end() - 1) else {
            continue;
        };

        let args = &text[found.end()..close];
        if let Some(replacement) = f(args) {
            out.push_str(&text[cursor..found.start()]);
            out.push_str(&replacement);
            cursor = close + 1;
        }
    }

    out.push_str(&text[cursor..]);
    out
}

/// Byte index of the bracket closing the one opened at `open`
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in text[open..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(open + i);
                    }
                }
                _ => {}
            },
        }
    }

    None
}

pub fn replace_num2str(text: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| call_pattern("num2str"));
    rewrite_calls(text, pattern, |args| Some(format!("str({})", args.trim())))
}

pub fn replace_datenum(text: &str, diagnostics: &mut Diagnostics) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| call_pattern("datenum"));
    rewrite_calls(text, pattern, |args| match parse_datenum(args) {
        Some(date) => Some(format!("\"{}\"", date.format(DATE_FORMAT))),
        None => {
            diagnostics.log(Issue::InvalidDate {
                context: "datenum".into(),
                value: args.to_string(),
            });
            None
        }
    })
}

/// Evaluate the arguments of a `datenum(...)` call
pub fn parse_datenum(args: &str) -> Option<NaiveDateTime> {
    let args = args.trim();
    if args.starts_with(['\'', '"']) {
        return parse_date_string(util::unquote(args));
    }

    let parts = args
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok().map(|n| n as i64))
        .collect::<Option<Vec<_>>>()?;
    if !(3..=6).contains(&parts.len()) {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(
        i32::try_from(parts[0]).ok()?,
        u32::try_from(parts[1]).ok()?,
        u32::try_from(parts[2]).ok()?,
    )?;
    // out of range components make the date invalid
    let component = |index: usize, unit: fn(i64) -> Option<Duration>| match parts.get(index) {
        Some(n) => unit(*n),
        None => Some(Duration::zero()),
    };
    let offset = component(3, Duration::try_hours)?
        .checked_add(&component(4, Duration::try_minutes)?)?
        .checked_add(&component(5, Duration::try_seconds)?)?;

    date.and_hms_opt(0, 0, 0)?.checked_add_signed(offset)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%b-%Y", "%m/%d/%Y", "%b %d %Y"];

/// Parse a date string in any of the layouts found in legacy files
///
/// `24:00` means midnight at the end of the given day.
pub fn parse_date_string(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return NaiveDateTime::parse_from_str(NOW_SENTINEL, DATE_FORMAT).ok();
    }

    if s.contains("24:00") {
        return parse_date_string(&s.replace("24:00", "23:59"))
            .and_then(|date| date.checked_add_signed(Duration::minutes(1)));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// `'[1 2 3]'` -> `[1 2 3]`
fn unwrap_quoted_lists(text: &str) -> String {
    util::segments(text)
        .into_iter()
        .map(|segment| {
            let inner = util::unquote(segment.text).trim();
            if segment.quoted
                && segment.text.starts_with('\'')
                && inner.starts_with('[')
                && inner.ends_with(']')
            {
                inner.to_string()
            } else {
                segment.text.to_string()
            }
        })
        .collect()
}

/// `{[...]}` and `{...}` -> `[...]`
fn convert_cells(text: &str) -> String {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    static CLOSE: OnceLock<Regex> = OnceLock::new();
    let open = OPEN.get_or_init(|| Regex::new(r"\{\s*\[").expect("static pattern"));
    let close = CLOSE.get_or_init(|| Regex::new(r"\]\s*\}").expect("static pattern"));

    map_unquoted(text, |s| {
        let s = open.replace_all(s, "[");
        let s = close.replace_all(&s, "]");
        s.replace('{', "[").replace('}', "]")
    })
}

/// Rewrite every bracketed list into comma delimited form
pub fn format_lists(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let quoted = quoted_ranges(text);

    for (i, c) in text.char_indices() {
        if i < cursor || c != '[' || in_ranges(&quoted, i) {
            continue;
        }
        let Some(close) = matching_close(text, i) else {
            continue;
        };

        let inner = &text[i + 1..close];
        out.push_str(&text[cursor..i]);
        if inner == "Trace" || inner == "End" {
            out.push_str(&text[i..=close]);
        } else {
            out.push('[');
            out.push_str(&format_list_body(inner, 1));
            out.push(']');
        }
        cursor = close + 1;
    }

    out.push_str(&text[cursor..]);
    out
}

/// Format the inside of one bracket pair
///
/// Rows are separated by `;`. A single non-empty row stays flat, several rows become one
/// nested list each. Lists nested deeper than the evaluator accepts are left as written.
fn format_list_body(inner: &str, depth: usize) -> String {
    if depth > MAX_NESTING {
        return inner.to_string();
    }

    let rows: Vec<String> = split_top_level(inner, |c| c == ';')
        .into_iter()
        .filter(|row| !row.trim().is_empty())
        .map(|row| format_row(row, depth))
        .collect();

    match rows.len() {
        0 => String::new(),
        1 => rows.into_iter().next().unwrap_or_default(),
        _ => rows
            .iter()
            .map(|row| format!("[{row}]"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn format_row(row: &str, depth: usize) -> String {
    let mut elements: Vec<String> = vec![];
    let mut pending_join = false;
    let mut pending_sign: Option<String> = None;

    for token in tokenize_row(row) {
        match token.as_str() {
            "&" => pending_join = true,
            "-" | "+" => pending_sign = Some(token),
            _ => {
                let mut element = if token.starts_with('[') && token.ends_with(']') {
                    format!("[{}]", format_list_body(&token[1..token.len() - 1], depth + 1))
                } else {
                    token
                };
                if let Some(sign) = pending_sign.take() {
                    element = format!("{sign}{element}");
                }
                match elements.last_mut() {
                    Some(last) if pending_join => {
                        last.push_str(" & ");
                        last.push_str(&element);
                    }
                    _ => elements.push(element),
                }
                pending_join = false;
            }
        }
    }

    elements.join(", ")
}

/// Split a row on whitespace and commas outside strings and nested brackets
///
/// `&` is always returned as a token of its own.
fn tokenize_row(row: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    for c in row.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' | '(' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ']' | ')' | '}' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                c if depth == 0 && (c.is_whitespace() || c == ',') => {
                    flush(&mut current, &mut tokens)
                }
                '&' if depth == 0 => {
                    flush(&mut current, &mut tokens);
                    tokens.push("&".into());
                }
                c => current.push(c),
            },
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

/// Split on separators outside strings and nested brackets
fn split_top_level(text: &str, is_sep: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = vec![];
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' | '(' | '{' => depth += 1,
                ']' | ')' | '}' => depth = depth.saturating_sub(1),
                c if depth == 0 && is_sep(c) => {
                    parts.push(&text[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&text[start..]);

    parts
}

/// Pad `=` and brackets, collapse runs of blanks, isolate block markers
fn canonicalize_whitespace(text: &str) -> String {
    static BLANKS: OnceLock<Regex> = OnceLock::new();
    let blanks = BLANKS.get_or_init(|| Regex::new(r"[ \t]+").expect("static pattern"));

    let padded = map_unquoted(text, |s| {
        let s = s
            .replace('=', " = ")
            .replace('[', " [ ")
            .replace(']', " ] ")
            .replace(" [ Trace ] ", &format!("\n{TRACE_START}\n"))
            .replace(" [ End ] ", &format!("\n{TRACE_END}\n"));
        blanks.replace_all(&s, " ").into_owned()
    });

    drop_blank_lines(&padded)
}
