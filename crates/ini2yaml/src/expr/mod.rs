//! value evaluation
//!
//! A raw value is either kept as text or evaluated with a small literal parser. There is no
//! general purpose evaluation: the grammar covers numbers (with `Inf`/`NaN`), booleans,
//! strings, lists, matrices, dotted references, `&` concatenation and `str(...)`.
//!
//! How a value is treated depends on the literal flag of its field:
//! - `Some(true)`: verbatim text (script fragments such as `Evaluate`)
//! - `Some(false)`: always evaluated
//! - `None`: a single quoted string is text, anything else is evaluated
mod lexer;
mod parser;

pub use parser::{parse, MAX_NESTING};

use crate::util::{self, COMMENT};
use crate::value::Value;
use lexer::Token;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ExprError {
    pub message: String,
    /// byte offset into the evaluated value
    pub offset: usize,
}

impl ExprError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.offset)
    }
}

impl std::error::Error for ExprError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub value: Value,
    /// the value was written as quoted text and kept as text
    pub text: bool,
}

pub fn evaluate(raw: &str, literal: Option<bool>) -> Result<Evaluated, ExprError> {
    let raw = raw.trim();

    if literal == Some(true) {
        return Ok(Evaluated {
            value: Value::string(verbatim_text(raw)),
            text: true,
        });
    }

    if literal.is_none() {
        if let Some(quote) = single_string(raw) {
            return Ok(Evaluated {
                value: parser::text(plain_text(raw, quote)),
                text: true,
            });
        }
    }

    Ok(Evaluated {
        value: parse(raw)?,
        text: false,
    })
}

/// The quote character, if `raw` is exactly one quoted string
fn single_string(raw: &str) -> Option<char> {
    let quote = raw.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let tokens = lexer::lex(raw).ok()?;
    matches!(tokens.as_slice(), [only] if matches!(only.token, Token::Str(_))).then_some(quote)
}

/// Script text: quotes removed, line breaks, spacing and `%` kept
fn verbatim_text(raw: &str) -> String {
    let Some(quote) = raw.chars().next().filter(|c| *c == '\'' || *c == '"') else {
        return raw.replace('\t', "");
    };
    let inner = if raw.len() > 1 && raw.ends_with(quote) {
        &raw[1..raw.len() - 1]
    } else {
        &raw[1..]
    };
    util::unescape(inner, quote).replace('\t', "")
}

/// Plain text: quotes removed, comment lines dropped, whitespace collapsed
///
/// Only continuation lines can be comments, the first line is always text (`'% saturation'`).
fn plain_text(raw: &str, quote: char) -> String {
    let inner = util::unescape(util::unquote(raw), quote).replace('\t', "");
    inner
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(index, line)| *index == 0 || !line.starts_with(COMMENT))
        .map(|(_, line)| line)
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::Path;
    use pretty_assertions::assert_eq;

    fn value(raw: &str, literal: Option<bool>) -> Value {
        evaluate(raw, literal).unwrap().value
    }

    #[test]
    fn quoted_text_is_not_evaluated() {
        let evaluated = evaluate("'Air  temperature\t'", None).unwrap();
        assert_eq!(evaluated.value, Value::string("Air temperature"));
        assert!(evaluated.text);
        assert_eq!(value("'it''s'", None), Value::string("it's"));
        assert_eq!(value("'50% full'", None), Value::string("50% full"));
    }

    #[test]
    fn leading_percent_is_text() {
        assert_eq!(value("'%'", None), Value::string("%"));
        assert_eq!(value("'% saturation'", None), Value::string("% saturation"));
        assert_eq!(
            value("'%x\n% dropped\nkept'", None),
            Value::string("%x kept")
        );
    }

    #[test]
    fn multi_line_plain_text_is_joined() {
        assert_eq!(
            value("'first line\n% dropped\nsecond line'", None),
            Value::string("first line second line")
        );
    }

    #[test]
    fn verbatim_keeps_everything() {
        assert_eq!(
            value("'TA = calc(TA_1); % keep\nx = ''a'';'", Some(true)),
            Value::string("TA = calc(TA_1); % keep\nx = 'a';")
        );
        assert_eq!(value("x = [1 2];", Some(true)), Value::string("x = [1 2];"));
    }

    #[test]
    fn concatenation_starting_with_quote_is_evaluated() {
        let evaluated = evaluate("'a' & 'b'", None).unwrap();
        assert_eq!(evaluated.value, Value::string("ab"));
        assert!(!evaluated.text);
    }

    #[test]
    fn forced_evaluation() {
        assert_eq!(value("'abc'", Some(false)), Value::string("abc"));
        assert_eq!(
            value("[ 1, 2 ]", Some(false)),
            Value::Array(vec![Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn references_stay_unresolved() {
        assert_eq!(
            value("globalVars.inst.a", None),
            Value::Reference(Path::parse("globalVars.inst.a"))
        );
    }

    #[test]
    fn reserved_words() {
        assert_eq!(value("'on'", None), Value::Quoted("on".into()));
        assert_eq!(
            value("['Off', 'x']", None),
            Value::Array(vec![Value::Quoted("Off".into()), Value::string("x")])
        );
    }

    #[test]
    fn malformed_values_error() {
        assert!(evaluate("[1, 2", None).is_err());
        assert!(evaluate("undefined_thing", None).is_err());
    }
}
