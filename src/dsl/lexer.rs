//! Lexer/tokenizer for the filter expression language.

use winnow::ascii::{digit0, digit1, multispace0};
use winnow::combinator::{alt, opt, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::error::ParseError;

/// Token types for the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Identifiers and literals
    Ident(String), // variable name or keyword, `::`-namespaced
    Int(i64),
    Double(f64),
    Str(String), // single-quoted, escapes resolved

    // Comparison operators
    Eq, // = ==
    Ne, // <> !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=

    // Symbolic boolean operators
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,

    // End of input
    Eof,
}

/// A token together with its byte offset in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, ErrMode<ContextError>>;

fn backtrack<T>() -> PResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// One `[A-Za-z_][A-Za-z0-9_]*` segment of an identifier.
fn ident_segment<'s>(input: &mut &'s str) -> PResult<&'s str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Lex an identifier, optionally namespaced with `::` (e.g. `geometry::type`).
fn lex_ident(input: &mut &str) -> PResult<Token> {
    let ident = (
        ident_segment,
        repeat::<_, _, (), _, _>(0.., ("::", ident_segment)),
    )
        .take()
        .parse_next(input)?;
    Ok(Token::Ident(ident.to_string()))
}

/// Lex a signed integer or floating point number.
/// Integers that overflow `i64` become doubles.
fn lex_number(input: &mut &str) -> PResult<Token> {
    let text = (
        opt(one_of(['+', '-'])),
        digit0,
        opt(('.', digit0)),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .parse_next(input)?;

    let mantissa = text.split(['e', 'E']).next().unwrap_or_default();
    if !mantissa.chars().any(|c| c.is_ascii_digit()) {
        return backtrack();
    }

    let is_double = text.contains(['.', 'e', 'E']);
    if !is_double && let Ok(i) = text.parse::<i64>() {
        return Ok(Token::Int(i));
    }
    match text.parse::<f64>() {
        Ok(d) => Ok(Token::Double(d)),
        Err(_) => backtrack(),
    }
}

/// Lex a single-quoted string literal.
///
/// Recognised escapes: `\a \b \f \n \r \t \v \\ \' \"` and `\xHH`.
/// Any other backslash is kept as-is, so regular expressions like `'\d+'` pass through.
fn lex_string(input: &mut &str) -> PResult<Token> {
    '\''.parse_next(input)?;

    let mut out = String::new();
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                *input = &input[i + 1..];
                return Ok(Token::Str(out));
            }
            '\\' => {
                let escaped = match chars.peek().map(|&(_, c)| c) {
                    Some('a') => Some('\x07'),
                    Some('b') => Some('\x08'),
                    Some('f') => Some('\x0c'),
                    Some('n') => Some('\n'),
                    Some('r') => Some('\r'),
                    Some('t') => Some('\t'),
                    Some('v') => Some('\x0b'),
                    Some('\\') => Some('\\'),
                    Some('\'') => Some('\''),
                    Some('"') => Some('"'),
                    _ => None,
                };
                if let Some(escaped) = escaped {
                    chars.next();
                    out.push(escaped);
                    continue;
                }

                if let Some(&(x, 'x')) = chars.peek() {
                    let hex: String = input[x + 1..]
                        .chars()
                        .take(2)
                        .take_while(|c| c.is_ascii_hexdigit())
                        .collect();
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        chars.next();
                        for _ in 0..hex.len() {
                            chars.next();
                        }
                        out.push(char::from(byte));
                        continue;
                    }
                }

                out.push('\\');
            }
            c => out.push(c),
        }
    }

    // Unterminated
    backtrack()
}

fn lex_operator(input: &mut &str) -> PResult<Token> {
    alt((
        // Multi-char operators first
        "==".value(Token::Eq),
        "<>".value(Token::Ne),
        "!=".value(Token::Ne),
        "<=".value(Token::Le),
        ">=".value(Token::Ge),
        "&&".value(Token::AndAnd),
        "||".value(Token::OrOr),
        // Single-char operators
        "=".value(Token::Eq),
        "<".value(Token::Lt),
        ">".value(Token::Gt),
        "!".value(Token::Bang),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        ",".value(Token::Comma),
    ))
    .parse_next(input)
}

/// Lex a single token.
fn lex_token(input: &mut &str) -> PResult<Token> {
    multispace0.parse_next(input)?;

    if input.is_empty() {
        return Ok(Token::Eof);
    }

    alt((
        lex_operator,
        // Number before ident to catch signed literals
        lex_number,
        lex_string,
        lex_ident,
    ))
    .parse_next(input)
}

/// Tokenize the entire input. The returned stream always ends with [`Token::Eof`].
pub fn tokenize(text: &str) -> Result<Vec<Lexeme>, ParseError> {
    let mut remaining = text;
    let mut lexemes = Vec::new();

    loop {
        let skipped = remaining.trim_start();
        let offset = text.len() - skipped.len();
        match lex_token(&mut remaining) {
            Ok(Token::Eof) => {
                lexemes.push(Lexeme {
                    token: Token::Eof,
                    offset: text.len(),
                });
                return Ok(lexemes);
            }
            Ok(token) => lexemes.push(Lexeme { token, offset }),
            Err(_) => {
                let message = if skipped.starts_with('\'') {
                    "Unterminated string literal"
                } else {
                    "Unexpected character"
                };
                return Err(ParseError::at(message, text, char_offset(text, offset)));
            }
        }
    }
}

/// Convert a byte offset into a character offset.
pub fn char_offset(text: &str, byte_offset: usize) -> usize {
    text.get(..byte_offset)
        .map(|prefix| prefix.chars().count())
        .unwrap_or_else(|| text.chars().count())
}
