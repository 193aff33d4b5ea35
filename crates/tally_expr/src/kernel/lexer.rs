//! Tokenizer for kernel syntax.

use crate::decimal::ExactDecimal;
use crate::error::{KernelError, KernelResult};

/// One lexical unit of a kernel expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A decimal literal.
    Number(ExactDecimal),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    StarStar,
    /// `/`
    Slash,
    /// `//`
    SlashSlash,
    /// `%`
    Percent,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

/// Splits a kernel expression into tokens.
///
/// # Errors
///
/// [`KernelError::Invalid`] for malformed numbers, a lone `<` or `>`, and any
/// character outside the kernel alphabet.
pub fn tokenize(input: &str) -> KernelResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let ch = bytes[i] as char;

        if ch.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            tokens.push(Token::Number(ExactDecimal::parse_literal(&input[start..i])?));
            continue;
        }

        if i + 1 < bytes.len() {
            let two = match &bytes[i..i + 2] {
                b"**" => Some(Token::StarStar),
                b"//" => Some(Token::SlashSlash),
                b"<<" => Some(Token::Shl),
                b">>" => Some(Token::Shr),
                _ => None,
            };
            if let Some(token) = two {
                tokens.push(token);
                i += 2;
                continue;
            }
        }

        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '&' => Token::Amp,
            '|' => Token::Pipe,
            '^' => Token::Caret,
            '~' => Token::Tilde,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => {
                // Report the whole code point, not a byte of it.
                let shown = input[i..].chars().next().unwrap_or(ch);
                return Err(KernelError::invalid(format!(
                    "unexpected character {shown:?} at byte {i}"
                )));
            }
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}
