use scriptgate_span::Position;

use super::cursor::Cursor;
use super::kind::Kind;
use super::Token;

/// Checks whether the identifier-shaped run of letters starting here is
/// actually a string prefix (`r`, `b`, `f`, `u`, or a two-letter combination
/// like `rb`/`fr`) immediately followed by a quote — and if so, lexes the
/// whole prefixed string literal. Returns `Ok(None)` when it's an ordinary
/// identifier that merely starts with a letter used as a string prefix
/// (`rb2 = 1` is a variable named `rb2`, not a malformed string).
pub fn try_lex_prefixed_string(
    cursor: &mut Cursor<'_>,
    start: Position,
) -> Result<Option<Token>, (String, Position)> {
    let prefix_len = if matches!(cursor.peek_at(1), Some('\'' | '"')) {
        1
    } else if cursor
        .peek_at(1)
        .is_some_and(|c| matches!(c, 'r' | 'R' | 'b' | 'B' | 'f' | 'F' | 'u' | 'U'))
        && matches!(cursor.peek_at(2), Some('\'' | '"'))
    {
        2
    } else {
        0
    };

    if prefix_len == 0 {
        return Ok(None);
    }

    let mut prefix = String::new();
    for _ in 0..prefix_len {
        prefix.push(cursor.bump().unwrap());
    }
    lex_string(cursor, start, &prefix).map(Some)
}

pub fn lex_string(
    cursor: &mut Cursor<'_>,
    start: Position,
    prefix: &str,
) -> Result<Token, (String, Position)> {
    let start_byte = start_byte_for(cursor, prefix);
    let quote = cursor.bump().ok_or_else(|| ("unterminated string".to_owned(), start))?;

    let triple = cursor.peek() == Some(quote) && cursor.peek_at(1) == Some(quote);
    if triple {
        cursor.bump();
        cursor.bump();
    }

    loop {
        match cursor.peek() {
            None => return Err(("unterminated string literal".to_owned(), start)),
            Some('\\') => {
                // Raw strings still treat `\'`/`\"` as not ending the
                // string (CPython's own rule), so always skip an escaped
                // character here regardless of the `r` prefix.
                cursor.bump();
                if cursor.peek().is_some() {
                    cursor.bump();
                }
            }
            Some(c) if c == quote => {
                if triple {
                    if cursor.peek_at(1) == Some(quote) && cursor.peek_at(2) == Some(quote) {
                        cursor.bump();
                        cursor.bump();
                        cursor.bump();
                        break;
                    }
                    cursor.bump();
                } else {
                    cursor.bump();
                    break;
                }
            }
            Some('\n') if !triple => return Err(("unterminated string literal".to_owned(), start)),
            Some(_) => {
                cursor.bump();
            }
        }
    }

    let end = cursor.position();
    let text = cursor.slice_bytes(start_byte, cursor.byte_pos());
    Ok(Token { kind: Kind::Str, start, end, text })
}

fn start_byte_for(cursor: &Cursor<'_>, prefix: &str) -> usize {
    cursor.byte_pos() - prefix.len()
}
