use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(String),
    /// string contents, delimiters removed and doubled delimiters collapsed
    Str(String),
    /// identifier, possibly dotted (`globalVars.inst.a`)
    Ident(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Amp,
    Minus,
    Plus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn lex(source: &str) -> Result<Vec<Spanned>, ExprError> {
    let mut tokens = vec![];
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '[' => single(&mut chars, Token::LBracket),
            ']' => single(&mut chars, Token::RBracket),
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            ',' => single(&mut chars, Token::Comma),
            ';' => single(&mut chars, Token::Semicolon),
            '&' => single(&mut chars, Token::Amp),
            '-' => single(&mut chars, Token::Minus),
            '+' => single(&mut chars, Token::Plus),
            '\'' | '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, next)) if next == c => {
                            if matches!(chars.peek(), Some((_, after)) if *after == c) {
                                chars.next();
                                s.push(c);
                            } else {
                                break;
                            }
                        }
                        Some((_, next)) => s.push(next),
                        None => return Err(ExprError::new("unterminated string", offset)),
                    }
                }
                Token::Str(s)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut s = String::new();
                let mut prev = None;
                while let Some(&(_, next)) = chars.peek() {
                    let is_exponent_sign =
                        (next == '-' || next == '+') && matches!(prev, Some('e') | Some('E'));
                    if next.is_ascii_digit()
                        || next == '.'
                        || next == 'e'
                        || next == 'E'
                        || is_exponent_sign
                    {
                        s.push(next);
                        prev = Some(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Number(s)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' || next == '.' {
                        s.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(s)
            }
            other => {
                return Err(ExprError::new(
                    format!("unexpected character `{other}`"),
                    offset,
                ))
            }
        };

        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

fn single(chars: &mut std::iter::Peekable<std::str::CharIndices>, token: Token) -> Token {
    chars.next();
    token
}
