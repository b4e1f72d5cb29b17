//! recursive descent parser for the literal grammar
//!
//! ```text
//! expr    := unary ('&' unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := number | string | '[' [expr (',' expr)* [',']] ']' | '(' expr ')'
//!          | ident | ident '(' expr ')'
//! ```
use super::lexer::{lex, Spanned, Token};
use super::ExprError;
use crate::path::Path;
use crate::value::{Value, DATE_FORMAT};
use chrono::NaiveDateTime;

/// Deepest nesting of lists, parentheses, calls and signs
pub const MAX_NESTING: usize = 64;

pub fn parse(source: &str) -> Result<Value, ExprError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
        depth: 0,
    };

    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::new(
            format!("unexpected {:?} after value", extra.token),
            extra.offset,
        ));
    }
    Ok(value)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.peek().map(|s| s.offset).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let next = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        next
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        let offset = self.offset();
        match self.advance() {
            Some(found) if found.token == expected => Ok(()),
            Some(found) => Err(ExprError::new(
                format!("expected {expected:?}, found {:?}", found.token),
                offset,
            )),
            None => Err(ExprError::new(
                format!("expected {expected:?}, found end of input"),
                offset,
            )),
        }
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_NESTING {
            return Err(ExprError::new("value is nested too deep", offset));
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<Value, ExprError> {
        let mut value = self.unary()?;
        while self.peek_token() == Some(&Token::Amp) {
            let offset = self.offset();
            self.advance();
            let rhs = self.unary()?;
            value = concat(value, rhs).map_err(|message| ExprError::new(message, offset))?;
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Value, ExprError> {
        match self.peek_token() {
            Some(Token::Minus) => {
                let offset = self.offset();
                self.advance();
                match self.nested(offset, Self::unary)? {
                    Value::Integer(i) => Ok(Value::Integer(-i)),
                    Value::Decimal(d) => Ok(Value::Decimal(-d)),
                    other => Err(ExprError::new(
                        format!("cannot negate {}", other.type_name()),
                        offset,
                    )),
                }
            }
            Some(Token::Plus) => {
                let offset = self.offset();
                self.advance();
                self.nested(offset, Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Value, ExprError> {
        let offset = self.offset();
        let Some(next) = self.advance() else {
            return Err(ExprError::new("unexpected end of input", offset));
        };

        match next.token {
            Token::Number(n) => number(&n)
                .ok_or_else(|| ExprError::new(format!("invalid number `{n}`"), offset)),
            Token::Str(s) => Ok(text(s)),
            Token::LBracket => self.nested(offset, Self::list),
            Token::LParen => self.nested(offset, |parser| {
                let value = parser.expr()?;
                parser.expect(Token::RParen)?;
                Ok(value)
            }),
            Token::Ident(ident) => {
                if self.peek_token() == Some(&Token::LParen) {
                    self.advance();
                    let argument = self.nested(offset, |parser| {
                        let argument = parser.expr()?;
                        parser.expect(Token::RParen)?;
                        Ok(argument)
                    })?;
                    return call(&ident, argument)
                        .map_err(|message| ExprError::new(message, offset));
                }
                identifier(&ident)
                    .ok_or_else(|| ExprError::new(format!("unknown identifier `{ident}`"), offset))
            }
            other => Err(ExprError::new(format!("unexpected {other:?}"), offset)),
        }
    }

    fn list(&mut self) -> Result<Value, ExprError> {
        let mut elements = vec![];
        loop {
            if self.peek_token() == Some(&Token::RBracket) {
                self.advance();
                return Ok(Value::Array(elements));
            }

            elements.push(self.expr()?);

            match self.peek_token() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RBracket) => {}
                _ => {
                    let offset = self.offset();
                    return Err(match self.advance() {
                        Some(found) => ExprError::new(
                            format!("expected `,` or `]`, found {:?}", found.token),
                            offset,
                        ),
                        None => ExprError::new("unterminated list", offset),
                    });
                }
            }
        }
    }
}

fn number(n: &str) -> Option<Value> {
    if !n.contains(['.', 'e', 'E']) {
        if let Ok(int) = n.parse::<i64>() {
            return Some(Value::Integer(int));
        }
    }
    n.parse::<f64>().ok().map(Value::Decimal)
}

/// Strings in `YYYY-MM-DDTHH:MM:SS` form are dates
pub(crate) fn text(s: String) -> Value {
    match NaiveDateTime::parse_from_str(&s, DATE_FORMAT) {
        Ok(date) if s.len() == 19 => Value::Date(date),
        _ => Value::string(s),
    }
}

fn identifier(ident: &str) -> Option<Value> {
    match ident {
        "true" | "True" => Some(Value::Boolean(true)),
        "false" | "False" => Some(Value::Boolean(false)),
        "Inf" | "inf" => Some(Value::Decimal(f64::INFINITY)),
        "NaN" | "nan" => Some(Value::Decimal(f64::NAN)),
        _ => {
            let path = Path::parse(ident);
            path.is_addressable().then_some(Value::Reference(path))
        }
    }
}

fn call(function: &str, argument: Value) -> Result<Value, String> {
    match function {
        "str" => argument
            .to_text()
            .map(Value::string)
            .ok_or_else(|| format!("cannot convert {} to text", argument.type_name())),
        other => Err(format!("unsupported function `{other}`")),
    }
}

fn concat(lhs: Value, rhs: Value) -> Result<Value, String> {
    for side in [&lhs, &rhs] {
        if let Value::Reference(path) = side {
            return Err(format!("cannot concatenate unresolved reference `{path}`"));
        }
    }

    match (lhs.to_text(), rhs.to_text()) {
        (Some(l), Some(r)) => Ok(Value::string(l + &r)),
        _ => Err(format!(
            "cannot concatenate {} and {}",
            lhs.type_name(),
            rhs.type_name()
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().copied().map(Value::Integer).collect())
    }

    #[test]
    fn scalars() {
        assert_eq!(parse("42").unwrap(), Value::Integer(42));
        assert_eq!(parse("-1.5").unwrap(), Value::Decimal(-1.5));
        assert_eq!(parse("1e3").unwrap(), Value::Decimal(1000.0));
        assert_eq!(parse("true").unwrap(), Value::Boolean(true));
        assert_eq!(parse("'abc'").unwrap(), Value::string("abc"));
        assert_eq!(parse("-Inf").unwrap(), Value::Decimal(f64::NEG_INFINITY));
        assert!(matches!(parse("NaN").unwrap(), Value::Decimal(d) if d.is_nan()));
    }

    #[test]
    fn lists_and_matrices() {
        assert_eq!(parse("[1, 2, 3]").unwrap(), ints(&[1, 2, 3]));
        assert_eq!(
            parse("[ [ 1, 2 ], [ 3, 4 ] ]").unwrap(),
            Value::Array(vec![ints(&[1, 2]), ints(&[3, 4])])
        );
        assert_eq!(parse("[]").unwrap(), Value::Array(vec![]));
        assert_eq!(parse("[1, 2,]").unwrap(), ints(&[1, 2]));
    }

    #[test]
    fn dates() {
        let date = NaiveDateTime::parse_from_str("2020-01-02T00:00:00", DATE_FORMAT).unwrap();
        assert_eq!(parse("\"2020-01-02T00:00:00\"").unwrap(), Value::Date(date));
        assert_eq!(parse("'2020-01-02'").unwrap(), Value::string("2020-01-02"));
    }

    #[test]
    fn references() {
        assert_eq!(
            parse("globalVars.inst.a").unwrap(),
            Value::Reference(Path::parse("globalVars.inst.a"))
        );
        assert_eq!(
            parse("[globalVars.a, 3]").unwrap(),
            Value::Array(vec![
                Value::Reference(Path::parse("globalVars.a")),
                Value::Integer(3)
            ])
        );
        assert!(parse("somewhere.else").is_err());
    }

    #[test]
    fn concatenation_and_str() {
        assert_eq!(parse("'T' & str(3)").unwrap(), Value::string("T3"));
        assert_eq!(parse("'o' & 'n'").unwrap(), Value::Quoted("on".into()));
        assert!(parse("'a' & globalVars.x").is_err());
        assert!(parse("max(3)").is_err());
    }

    #[test]
    fn malformed() {
        let err = parse("[1, 2").unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(parse("1 2").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn nesting_is_limited() {
        let deep = format!("{}1{}", "[".repeat(MAX_NESTING), "]".repeat(MAX_NESTING));
        assert!(parse(&deep).is_ok());

        let too_deep = format!("{}1{}", "[".repeat(100_000), "]".repeat(100_000));
        assert_eq!(parse(&too_deep).unwrap_err().message, "value is nested too deep");

        let signs = format!("{}1", "-".repeat(200_000));
        assert_eq!(parse(&signs).unwrap_err().message, "value is nested too deep");
        assert_eq!(parse(&format!("{}1", "-".repeat(MAX_NESTING))).unwrap(), Value::Integer(1));
    }
}
