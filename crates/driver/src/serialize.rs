//! The textual value grammar used by `save_value`/`restore_value`, the
//! snapshot format, and `%O`.
//!
//! Integers are decimal; strings are double-quoted with `\\ \" \n \t \r`
//! escapes; arrays are `({v,v,...})`; mappings are `([k:v,...])`; object
//! references serialize as their `path#refno` name in string form and are
//! resolved back to objects after load by whoever knows the object table.

use crate::driver::Driver;
use crate::interp::RuntimeError;
use cinder_core::heap;
use cinder_core::{MapKey, Value};

/// Nesting cap for both directions; cyclic structures bottom out here.
const MAX_DEPTH: usize = 50;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

pub fn save_value(d: &Driver, value: &Value) -> Result<String, RuntimeError> {
    let mut out = String::new();
    write_value(d, value, 0, &mut out)?;
    Ok(out)
}

fn write_value(
    d: &Driver,
    value: &Value,
    depth: usize,
    out: &mut String,
) -> Result<(), RuntimeError> {
    if depth > MAX_DEPTH {
        return Err(RuntimeError::new("save_value: structure nested too deeply"));
    }
    match value {
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Str(s) => {
            out.push('"');
            out.push_str(&escape(s));
            out.push('"');
        }
        Value::Object(r) => match d.object_name(*r) {
            Some(name) => {
                out.push('"');
                out.push_str(&escape(&name));
                out.push('"');
            }
            None => out.push('0'),
        },
        Value::Array(a) => {
            out.push_str("({");
            let a = a.borrow();
            for (i, elem) in a.elems.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(d, elem, depth + 1, out)?;
            }
            out.push_str("})");
        }
        Value::Mapping(m) => {
            out.push_str("([");
            let m = m.borrow();
            for (i, (k, v)) in m.entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(d, &k.to_value(), depth + 1, out)?;
                out.push(':');
                write_value(d, v, depth + 1, out)?;
            }
            out.push_str("])");
        }
    }
    Ok(())
}

/// Parse one serialized value. Trailing garbage is an error.
pub fn restore_value(text: &str) -> Result<Value, RuntimeError> {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0;
    let value = parse_value(&chars, &mut pos, 0)?;
    skip_ws(&chars, &mut pos);
    if pos != chars.len() {
        return Err(RuntimeError::new("restore_value: trailing characters"));
    }
    Ok(value)
}

/// Parse a value starting at `pos`, leaving `pos` just past it. Exposed
/// for the snapshot reader, which embeds values in larger records.
pub fn parse_value(chars: &[char], pos: &mut usize, depth: usize) -> Result<Value, RuntimeError> {
    if depth > MAX_DEPTH {
        return Err(RuntimeError::new("restore_value: nested too deeply"));
    }
    skip_ws(chars, pos);
    match chars.get(*pos) {
        Some('"') => parse_string(chars, pos),
        Some('(') if chars.get(*pos + 1) == Some(&'{') => {
            *pos += 2;
            let mut elems = Vec::new();
            loop {
                skip_ws(chars, pos);
                if chars.get(*pos) == Some(&'}') {
                    break;
                }
                elems.push(parse_value(chars, pos, depth + 1)?);
                skip_ws(chars, pos);
                match chars.get(*pos) {
                    Some(',') => *pos += 1,
                    Some('}') => break,
                    _ => return Err(RuntimeError::new("restore_value: expected ',' or '})'")),
                }
            }
            expect(chars, pos, '}')?;
            expect(chars, pos, ')')?;
            Ok(Value::Array(heap::array_from_elems(elems)))
        }
        Some('(') if chars.get(*pos + 1) == Some(&'[') => {
            *pos += 2;
            let mapping = heap::new_mapping();
            loop {
                skip_ws(chars, pos);
                if chars.get(*pos) == Some(&']') {
                    break;
                }
                let key = parse_value(chars, pos, depth + 1)?;
                skip_ws(chars, pos);
                expect(chars, pos, ':')?;
                let value = parse_value(chars, pos, depth + 1)?;
                let key = MapKey::from_value(&key)
                    .ok_or_else(|| RuntimeError::new("restore_value: bad mapping key"))?;
                mapping.borrow_mut().entries.insert(key, value);
                skip_ws(chars, pos);
                match chars.get(*pos) {
                    Some(',') => *pos += 1,
                    Some(']') => break,
                    _ => return Err(RuntimeError::new("restore_value: expected ',' or '])'")),
                }
            }
            expect(chars, pos, ']')?;
            expect(chars, pos, ')')?;
            Ok(Value::Mapping(mapping))
        }
        Some(c) if c.is_ascii_digit() || *c == '-' => {
            let start = *pos;
            *pos += 1;
            while chars
                .get(*pos)
                .is_some_and(|c| c.is_ascii_digit())
            {
                *pos += 1;
            }
            let text: String = chars[start..*pos].iter().collect();
            text.parse()
                .map(Value::Int)
                .map_err(|_| RuntimeError::new("restore_value: bad integer"))
        }
        _ => Err(RuntimeError::new("restore_value: unexpected character")),
    }
}

fn parse_string(chars: &[char], pos: &mut usize) -> Result<Value, RuntimeError> {
    expect(chars, pos, '"')?;
    let mut s = String::new();
    loop {
        match chars.get(*pos) {
            None => return Err(RuntimeError::new("restore_value: unterminated string")),
            Some('"') => {
                *pos += 1;
                return Ok(Value::str(s));
            }
            Some('\\') => {
                *pos += 1;
                let esc = chars
                    .get(*pos)
                    .ok_or_else(|| RuntimeError::new("restore_value: unterminated escape"))?;
                s.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                *pos += 1;
            }
            Some(c) => {
                s.push(*c);
                *pos += 1;
            }
        }
    }
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while chars.get(*pos).is_some_and(|c| c.is_whitespace()) {
        *pos += 1;
    }
}

fn expect(chars: &[char], pos: &mut usize, want: char) -> Result<(), RuntimeError> {
    if chars.get(*pos) == Some(&want) {
        *pos += 1;
        Ok(())
    } else {
        Err(RuntimeError::new(format!(
            "restore_value: expected '{want}'"
        )))
    }
}
