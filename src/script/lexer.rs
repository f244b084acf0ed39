//! Tokenizer for command source text.

use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::Number;

use crate::error::AgentError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier.
    Name(String),
    /// Numeric literal.
    Number(Number),
    /// String literal with escapes resolved.
    Str(String),
    /// `return`
    Return,
    /// `nil`
    Nil,
    /// `true`
    True,
    /// `false`
    False,
    /// `not`
    Not,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `;`
    Semi,
    /// `.`
    Dot,
    /// `=`
    Assign,
    /// `-`
    Minus,
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Byte offset in the source.
    pub offset: usize,
}

/// Keywords of the full language that this subset rejects outright.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "for", "function", "goto", "if", "in",
    "local", "or", "repeat", "then", "until", "while",
];

fn compile_error(offset: usize, message: impl std::fmt::Display) -> AgentError {
    AgentError::Compile(format!("{message} at offset {offset}"))
}

/// Splits `source` into tokens.
///
/// # Errors
///
/// Returns [`AgentError::Compile`] on an unexpected character, an
/// unterminated string, a malformed number, or an unsupported keyword.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, AgentError> {
    let mut chars = source.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '-' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, n)| n == '-') {
                    // line comment
                    for (_, n) in chars.by_ref() {
                        if n == '\n' {
                            break;
                        }
                    }
                    continue;
                }
                Token::Minus
            }
            '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' | '.' | '=' => {
                chars.next();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    ';' => Token::Semi,
                    '.' => Token::Dot,
                    _ => Token::Assign,
                }
            }
            '"' | '\'' => lex_string(&mut chars, offset)?,
            c if c.is_ascii_digit() => lex_number(&mut chars, offset)?,
            c if c.is_alphabetic() || c == '_' => lex_word(&mut chars, offset)?,
            other => return Err(compile_error(offset, format!("unexpected character {other:?}"))),
        };
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

fn lex_string(chars: &mut Peekable<CharIndices<'_>>, offset: usize) -> Result<Token, AgentError> {
    let Some((_, quote)) = chars.next() else {
        return Err(compile_error(offset, "expected string"));
    };
    let mut out = String::new();
    loop {
        match chars.next() {
            None | Some((_, '\n')) => return Err(compile_error(offset, "unterminated string")),
            Some((_, c)) if c == quote => return Ok(Token::Str(out)),
            Some((at, '\\')) => {
                let escaped = match chars.next() {
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((_, '\\')) => '\\',
                    Some((_, '"')) => '"',
                    Some((_, '\'')) => '\'',
                    Some((_, '0')) => '\0',
                    Some((_, other)) => {
                        return Err(compile_error(at, format!("invalid escape \\{other}")));
                    }
                    None => return Err(compile_error(offset, "unterminated string")),
                };
                out.push(escaped);
            }
            Some((_, c)) => out.push(c),
        }
    }
}

fn lex_number(chars: &mut Peekable<CharIndices<'_>>, offset: usize) -> Result<Token, AgentError> {
    let mut text = String::new();
    let mut is_float = false;

    take_digits(chars, &mut text);
    if chars.peek().is_some_and(|&(_, c)| c == '.') {
        is_float = true;
        text.push('.');
        chars.next();
        take_digits(chars, &mut text);
    }
    if chars.peek().is_some_and(|&(_, c)| c == 'e' || c == 'E') {
        is_float = true;
        text.push('e');
        chars.next();
        if let Some(&(_, sign)) = chars.peek()
            && (sign == '+' || sign == '-')
        {
            text.push(sign);
            chars.next();
        }
        take_digits(chars, &mut text);
    }
    if chars
        .peek()
        .is_some_and(|&(_, c)| c.is_alphanumeric() || c == '_')
    {
        return Err(compile_error(offset, "malformed number"));
    }

    if !is_float && let Ok(n) = text.parse::<i64>() {
        return Ok(Token::Number(Number::from(n)));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Token::Number)
        .ok_or_else(|| compile_error(offset, format!("malformed number {text}")))
}

fn take_digits(chars: &mut Peekable<CharIndices<'_>>, out: &mut String) {
    while let Some(&(_, c)) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        out.push(c);
        chars.next();
    }
}

fn lex_word(chars: &mut Peekable<CharIndices<'_>>, offset: usize) -> Result<Token, AgentError> {
    let mut word = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if !(c.is_alphanumeric() || c == '_') {
            break;
        }
        word.push(c);
        chars.next();
    }
    let token = match word.as_str() {
        "return" => Token::Return,
        "nil" => Token::Nil,
        "true" => Token::True,
        "false" => Token::False,
        "not" => Token::Not,
        w if UNSUPPORTED_KEYWORDS.contains(&w) => {
            return Err(compile_error(offset, format!("unsupported keyword '{w}'")));
        }
        _ => Token::Name(word),
    };
    Ok(token)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        let Ok(tokens) = tokenize(source) else {
            panic!("tokenize failed for {source}");
        };
        tokens.into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn return_pair() {
        assert_eq!(
            kinds("return true, 7"),
            vec![
                Token::Return,
                Token::True,
                Token::Comma,
                Token::Number(Number::from(7))
            ]
        );
    }

    #[test]
    fn dotted_call_with_string() {
        assert_eq!(
            kinds("turtle.refuel('coal')"),
            vec![
                Token::Name("turtle".to_string()),
                Token::Dot,
                Token::Name("refuel".to_string()),
                Token::LParen,
                Token::Str("coal".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("-- nothing here\nreturn nil"), vec![Token::Return, Token::Nil]);
    }

    #[test]
    fn floats_and_escapes() {
        let tokens = kinds(r#"1.5e2 "a\n\"b\"""#);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.first(), Number::from_f64(150.0).map(Token::Number).as_ref());
        assert_eq!(tokens.get(1), Some(&Token::Str("a\n\"b\"".to_string())));
    }

    #[test]
    fn rejects_bad_input() {
        for source in ["return \"open", "return 12abc", "local x = 1", "return 1 + 2", "@"] {
            assert!(
                matches!(tokenize(source), Err(AgentError::Compile(_))),
                "expected compile error for {source}"
            );
        }
    }
}
