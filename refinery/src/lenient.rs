//! Best-effort parsing of JSON-like record lines.
//!
//! Upstream generators emit a mix of strict JSON, Python dict reprs, doubly
//! braced objects and hand-edited lines with bare keys. `parse_record` runs a
//! fixed cascade over one line and returns the first mapping any strategy
//! produces:
//!
//! 1. strip one layer of `{{ ... }}`
//! 2. strict JSON
//! 3. Python literal syntax rewritten to JSON
//! 4. regex repair of keys and single-quoted scalar values
//!
//! A line that yields no mapping is rejected with `None`; nothing here panics
//! or returns an error.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::iter::Peekable;
use std::str::Chars;
use tracing::debug;

pub type Record = Map<String, Value>;

pub type Strategy = fn(&str) -> Option<Record>;

/// Decode strategies in the order they are attempted.
pub const STRATEGIES: [(&str, Strategy); 3] = [
    ("strict_json", parse_strict),
    ("python_literal", parse_python_literal),
    ("regex_repair", parse_regex_repair),
];

static QUOTED_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|[^\\])'(\w+)'\s*:").unwrap());
static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());
static QUOTED_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*'([^']*)'").unwrap());

pub fn parse_record(line: &str) -> Option<Record> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let line = unwrap_double_braces(line);

    for (name, strategy) in STRATEGIES {
        if let Some(record) = strategy(line) {
            debug!(strategy = name, "record parsed");
            return Some(record);
        }
    }
    None
}

/// `{{...}}` -> `{...}`; a double-encoding artifact of one generator.
pub fn unwrap_double_braces(line: &str) -> &str {
    if line.len() >= 4 && line.starts_with("{{") && line.ends_with("}}") {
        &line[1..line.len() - 1]
    } else {
        line
    }
}

fn into_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

pub fn parse_strict(line: &str) -> Option<Record> {
    serde_json::from_str::<Value>(line).ok().and_then(into_record)
}

pub fn parse_python_literal(line: &str) -> Option<Record> {
    let converted = python_literal_to_json(line)?;
    parse_strict(&converted)
}

pub fn parse_regex_repair(line: &str) -> Option<Record> {
    let fixed = QUOTED_KEY.replace_all(line, "${1}\"${2}\":");
    let fixed = BARE_KEY.replace_all(&fixed, "${1}\"${2}\":");
    let fixed = QUOTED_VALUE.replace_all(&fixed, |caps: &Captures| {
        format!(": \"{}\"", caps[1].replace('"', "\\\""))
    });
    parse_strict(&fixed)
}

/// Rewrite Python literal syntax into JSON text.
///
/// Handles single-, double- and triple-quoted strings (escapes translated,
/// `u`/`r` prefixes honoured), the `True`/`False`/`None` keywords, tuples,
/// trailing commas, unary plus and `0x`/`0o`/`0b` integers. Any other bare
/// name makes the line unrepresentable and returns `None`.
pub fn python_literal_to_json(src: &str) -> Option<String> {
    let mut out = String::with_capacity(src.len() + 8);
    let mut chars = src.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' => read_string(ch, false, &mut chars, &mut out)?,
            '(' => out.push('['),
            ')' => out.push(']'),
            ',' => {
                let next = chars.clone().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}' | ']' | ')')) {
                    out.push(',');
                }
            }
            '+' if matches!(chars.peek(), Some(c) if c.is_ascii_digit()) => {}
            c if c.is_ascii_digit() => read_number(c, &mut chars, &mut out)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" | "true" => out.push_str("true"),
                    "False" | "false" => out.push_str("false"),
                    "None" | "null" => out.push_str("null"),
                    prefix => {
                        let raw = match prefix {
                            "u" | "U" => false,
                            "r" | "R" => true,
                            _ => return None,
                        };
                        let quote = chars.next().filter(|c| matches!(c, '"' | '\''))?;
                        read_string(quote, raw, &mut chars, &mut out)?;
                    }
                }
            }
            c => out.push(c),
        }
    }
    Some(out)
}

fn read_number(first: char, chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Option<()> {
    let mut token = String::from(first);
    let mut prev = first;
    while let Some(&next) = chars.peek() {
        let exponent_sign = matches!(prev, 'e' | 'E') && matches!(next, '+' | '-');
        if next.is_ascii_alphanumeric() || next == '.' || exponent_sign {
            token.push(next);
        } else if next != '_' {
            break;
        }
        prev = next;
        chars.next();
    }

    let radix = match token.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => {
            out.push_str(&token);
            return Some(());
        }
    };
    let value = i64::from_str_radix(&token[2..], radix).ok()?;
    out.push_str(&value.to_string());
    Some(())
}

/// True when the next two characters repeat `quote`.
fn triple_quote_follows(quote: char, chars: &Peekable<Chars<'_>>) -> bool {
    let mut ahead = chars.clone();
    ahead.next() == Some(quote) && ahead.next() == Some(quote)
}

fn read_string(
    quote: char,
    raw: bool,
    chars: &mut Peekable<Chars<'_>>,
    out: &mut String,
) -> Option<()> {
    let triple = triple_quote_follows(quote, chars);
    if triple {
        chars.nth(1);
    }

    out.push('"');
    loop {
        let ch = chars.next()?;
        match ch {
            c if c == quote => {
                if !triple {
                    out.push('"');
                    return Some(());
                }
                if triple_quote_follows(quote, chars) {
                    chars.nth(1);
                    out.push('"');
                    return Some(());
                }
                push_json_char(c, out);
            }
            // Raw strings keep the backslash and never end on an escaped quote.
            '\\' if raw => {
                out.push_str("\\\\");
                push_json_char(chars.next()?, out);
            }
            '\\' => {
                let esc = chars.next()?;
                match esc {
                    '\'' => out.push('\''),
                    '"' => out.push_str("\\\""),
                    '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u' => {
                        out.push('\\');
                        out.push(esc);
                    }
                    'a' => out.push_str("\\u0007"),
                    'v' => out.push_str("\\u000b"),
                    '0' => out.push_str("\\u0000"),
                    'x' => {
                        let hi = chars.next()?.to_digit(16)?;
                        let lo = chars.next()?.to_digit(16)?;
                        out.push_str(&format!("\\u00{:02x}", hi * 16 + lo));
                    }
                    '\n' => {}
                    // Unknown escapes keep their backslash in Python.
                    other => {
                        out.push_str("\\\\");
                        push_json_char(other, out);
                    }
                }
            }
            c => push_json_char(c, out),
        }
    }
}

fn push_json_char(c: char, out: &mut String) {
    match c {
        '"' => out.push_str("\\\""),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}
