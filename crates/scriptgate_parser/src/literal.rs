//! Decodes the raw text of `Str`/`Int`/`Float` tokens into [`Constant`]
//! values (and, for f-strings, into [`FStringPart`] runs parsed back through
//! the expression grammar).

use scriptgate_ast::Constant;

use crate::ParseError;

pub fn decode_number(text: &str, is_float: bool) -> Result<Constant, ParseError> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if is_float {
        let trimmed = cleaned.trim_end_matches(['j', 'J']);
        let value: f64 = trimmed
            .parse()
            .map_err(|_| ParseError::new(format!("invalid float literal: {text}"), None, None))?;
        Ok(Constant::Float { text: text.to_owned(), value })
    } else if let Some(rest) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        let value = i64::from_str_radix(rest, 16)
            .map_err(|_| ParseError::new(format!("invalid hex literal: {text}"), None, None))?;
        Ok(Constant::Int { text: text.to_owned(), value })
    } else if let Some(rest) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        let value = i64::from_str_radix(rest, 8)
            .map_err(|_| ParseError::new(format!("invalid octal literal: {text}"), None, None))?;
        Ok(Constant::Int { text: text.to_owned(), value })
    } else if let Some(rest) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        let value = i64::from_str_radix(rest, 2)
            .map_err(|_| ParseError::new(format!("invalid binary literal: {text}"), None, None))?;
        Ok(Constant::Int { text: text.to_owned(), value })
    } else {
        let value: i64 = cleaned
            .parse()
            .map_err(|_| ParseError::new(format!("invalid integer literal: {text}"), None, None))?;
        Ok(Constant::Int { text: text.to_owned(), value })
    }
}

/// Splits a raw string token's text into its prefix (`r`, `b`, `f`, ...),
/// quote style, and decoded body, applying Python's standard backslash
/// escapes (but not, deliberately, any Unicode-name (`\N{...}`) escapes,
/// which this subset has no use for).
pub struct DecodedString {
    pub prefix: String,
    pub value: String,
    pub is_bytes: bool,
    pub is_fstring: bool,
}

pub fn decode_string(text: &str) -> DecodedString {
    let mut chars = text.chars().peekable();
    let mut prefix = String::new();
    while let Some(&c) = chars.peek() {
        if c == '\'' || c == '"' {
            break;
        }
        prefix.push(c);
        chars.next();
    }
    let lower_prefix = prefix.to_ascii_lowercase();
    let is_raw = lower_prefix.contains('r');
    let is_bytes = lower_prefix.contains('b');
    let is_fstring = lower_prefix.contains('f');

    let rest: String = chars.collect();
    let quote = rest.chars().next().unwrap_or('"');
    let triple = rest.starts_with(&quote.to_string().repeat(3));
    let quote_len = if triple { 3 } else { 1 };
    let body = &rest[quote_len..rest.len().saturating_sub(quote_len)];

    let value = if is_raw { body.to_owned() } else { unescape(body) };

    DecodedString { prefix, value, is_bytes, is_fstring }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Splits an f-string's decoded body into literal runs and `{expr}`
/// placeholders. The expressions inside braces are handed back as raw text;
/// the caller re-parses each one with the full expression grammar.
pub fn split_fstring_parts(body: &str) -> Vec<FStringPartRaw> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            if chars.peek() == Some(&'{') {
                chars.next();
                literal.push('{');
                continue;
            }
            if !literal.is_empty() {
                parts.push(FStringPartRaw::Literal(std::mem::take(&mut literal)));
            }
            let mut depth = 1;
            let mut expr_text = String::new();
            for c in chars.by_ref() {
                if c == '{' {
                    depth += 1;
                } else if c == '}' {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                expr_text.push(c);
            }
            let (expr_part, conversion, format_spec) = split_conversion_and_spec(&expr_text);
            parts.push(FStringPartRaw::Expr {
                expr_text: expr_part,
                conversion,
                format_spec,
            });
        } else if c == '}' && chars.peek() == Some(&'}') {
            chars.next();
            literal.push('}');
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        parts.push(FStringPartRaw::Literal(literal));
    }
    parts
}

pub enum FStringPartRaw {
    Literal(String),
    Expr { expr_text: String, conversion: Option<char>, format_spec: Option<String> },
}

fn split_conversion_and_spec(text: &str) -> (String, Option<char>, Option<String>) {
    let (expr_and_conv, format_spec) = match text.find(':') {
        Some(idx) if !is_inside_brackets(text, idx) => {
            (text[..idx].to_owned(), Some(text[idx + 1..].to_owned()))
        }
        _ => (text.to_owned(), None),
    };
    if let Some(stripped) = expr_and_conv.strip_suffix("!r") {
        (stripped.to_owned(), Some('r'), format_spec)
    } else if let Some(stripped) = expr_and_conv.strip_suffix("!s") {
        (stripped.to_owned(), Some('s'), format_spec)
    } else if let Some(stripped) = expr_and_conv.strip_suffix("!a") {
        (stripped.to_owned(), Some('a'), format_spec)
    } else {
        (expr_and_conv, None, format_spec)
    }
}

fn is_inside_brackets(text: &str, idx: usize) -> bool {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        if i >= idx {
            break;
        }
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}
