//! Tokenizer for the expression language.

use multireplace_core::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    Comma,
}

/// A token with the byte position it started at, for error messages.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => push_single(&mut out, Token::LParen, &mut i, start),
            b')' => push_single(&mut out, Token::RParen, &mut i, start),
            b',' => push_single(&mut out, Token::Comma, &mut i, start),
            b'+' => push_single(&mut out, Token::Plus, &mut i, start),
            b'-' => push_single(&mut out, Token::Minus, &mut i, start),
            b'*' => push_single(&mut out, Token::Star, &mut i, start),
            b'/' => push_single(&mut out, Token::Slash, &mut i, start),
            b'%' => push_single(&mut out, Token::Percent, &mut i, start),
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push(Spanned { token: Token::EqEq, pos: start });
                    i += 2;
                } else {
                    return Err(err_at("expected '=='", start));
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push(Spanned { token: Token::BangEq, pos: start });
                    i += 2;
                } else {
                    push_single(&mut out, Token::Bang, &mut i, start);
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push(Spanned { token: Token::LtEq, pos: start });
                    i += 2;
                } else {
                    push_single(&mut out, Token::Lt, &mut i, start);
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push(Spanned { token: Token::GtEq, pos: start });
                    i += 2;
                } else {
                    push_single(&mut out, Token::Gt, &mut i, start);
                }
            }
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    out.push(Spanned { token: Token::AndAnd, pos: start });
                    i += 2;
                } else {
                    return Err(err_at("expected '&&'", start));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    out.push(Spanned { token: Token::OrOr, pos: start });
                    i += 2;
                } else {
                    return Err(err_at("expected '||'", start));
                }
            }
            b'\'' | b'"' => {
                let (text, next) = read_string(source, i)?;
                out.push(Spanned { token: Token::Str(text), pos: start });
                i = next;
            }
            b'0'..=b'9' | b'.' => {
                let mut end = i;
                while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
                    end += 1;
                }
                let text = &source[i..end];
                let number = text
                    .parse::<f64>()
                    .map_err(|_| err_at(&format!("invalid number {text:?}"), start))?;
                out.push(Spanned { token: Token::Number(number), pos: start });
                i = end;
            }
            _ if c.is_ascii_alphabetic() || c == b'_' => {
                let mut end = i;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let token = match &source[i..end] {
                    "true" => Token::True,
                    "false" => Token::False,
                    ident => Token::Ident(ident.to_string()),
                };
                out.push(Spanned { token, pos: start });
                i = end;
            }
            _ => {
                let c = source[i..].chars().next().unwrap_or('?');
                return Err(err_at(&format!("unexpected character {c:?}"), start));
            }
        }
    }
    Ok(out)
}

fn push_single(out: &mut Vec<Spanned>, token: Token, i: &mut usize, pos: usize) {
    out.push(Spanned { token, pos });
    *i += 1;
}

fn read_string(source: &str, open: usize) -> Result<(String, usize), ScriptError> {
    let quote = source.as_bytes()[open] as char;
    let mut text = String::new();
    let mut chars = source[open + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, escaped)) => text.push(escaped),
                None => break,
            },
            _ if c == quote => return Ok((text, open + 1 + offset + c.len_utf8())),
            _ => text.push(c),
        }
    }
    Err(err_at("unterminated string", open))
}

pub(crate) fn err_at(message: &str, pos: usize) -> ScriptError {
    ScriptError::new(format!("{message} at offset {pos}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_operators_and_literals() {
        assert_eq!(
            tokens("1 + 2.5 * CNT"),
            vec![
                Token::Number(1.0),
                Token::Plus,
                Token::Number(2.5),
                Token::Star,
                Token::Ident("CNT".to_string()),
            ]
        );
        assert_eq!(
            tokens("a <= b && !c"),
            vec![
                Token::Ident("a".to_string()),
                Token::LtEq,
                Token::Ident("b".to_string()),
                Token::AndAnd,
                Token::Bang,
                Token::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_strings_both_quotes() {
        assert_eq!(tokens(r#""dq" 'sq'"#), vec![
            Token::Str("dq".to_string()),
            Token::Str("sq".to_string()),
        ]);
        assert_eq!(tokens(r#"'a\'b\n'"#), vec![Token::Str("a'b\n".to_string())]);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a & b").is_err());
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("1.2.3").is_err());
        assert!(tokenize("@").is_err());
    }
}
