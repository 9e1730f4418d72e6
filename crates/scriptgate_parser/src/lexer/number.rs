use scriptgate_span::Position;

use super::cursor::Cursor;
use super::kind::Kind;
use super::Token;

pub fn lex_number(cursor: &mut Cursor<'_>, start: Position) -> Result<Token, (String, Position)> {
    let start_byte = cursor.byte_pos();
    let mut is_float = false;

    if cursor.peek() == Some('0')
        && matches!(cursor.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'))
    {
        cursor.bump();
        cursor.bump();
        while cursor.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            cursor.bump();
        }
    } else {
        while cursor.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            cursor.bump();
        }
        if cursor.peek() == Some('.')
            && cursor.peek_at(1).is_none_or(|c| c != '.')
        {
            is_float = true;
            cursor.bump();
            while cursor.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                cursor.bump();
            }
        }
        if matches!(cursor.peek(), Some('e' | 'E')) {
            let save = cursor.peek_at(1);
            if save.is_some_and(|c| c.is_ascii_digit()) || (save == Some('+') || save == Some('-'))
            {
                is_float = true;
                cursor.bump();
                if matches!(cursor.peek(), Some('+' | '-')) {
                    cursor.bump();
                }
                while cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
                    cursor.bump();
                }
            }
        }
        if matches!(cursor.peek(), Some('j' | 'J')) {
            cursor.bump();
        }
    }

    let end = cursor.position();
    let text = cursor.slice_bytes(start_byte, cursor.byte_pos());
    let kind = if is_float { Kind::Float } else { Kind::Int };
    Ok(Token { kind, start, end, text })
}
