//! The JSON peer: a relaxed reader and a configurable writer.
//!
//! With the strict flag off the reader additionally accepts `//` and
//! `/* */` comments, trailing commas, and bare identifier keys. There is no
//! multi-error recovery; the first problem aborts the parse.

use std::fmt::Write as _;
use std::path::Path;

use crate::value::{Object, Value};
use crate::{JsonError, Mark};

/// How non-finite doubles are written.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum InfNan {
    /// `inf`, `-inf`, `nan` (C-style).
    #[default]
    C,
    /// `Infinity`, `-Infinity`, `NaN` (JavaScript-style).
    Js,
    /// `null`.
    Null,
}

/// Options controlling [`as_json`] emission.
#[derive(Clone, Debug)]
pub struct JsonFormat {
    /// Indentation width; `0` emits everything on one line.
    pub indent: i32,
    /// Quote object keys even when they are identifier-safe.
    pub quote_keys: bool,
    /// Arrays wider than this (in characters, rendered flat) are wrapped.
    pub array_margin: i32,
    /// Decimal places written for doubles; `17` and above uses the shortest
    /// round-trip form.
    pub max_precision: i32,
    /// Trim trailing fractional zeroes from doubles.
    pub trim_zeroes: bool,
    /// How non-finite doubles are written.
    pub inf_nan: InfNan,
}

impl Default for JsonFormat {
    fn default() -> Self {
        JsonFormat {
            indent: 2,
            quote_keys: true,
            array_margin: 80,
            max_precision: 17,
            trim_zeroes: false,
            inf_nan: InfNan::C,
        }
    }
}

struct JsonCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u64,
    line_start: usize,
    strict: bool,
}

impl<'a> JsonCursor<'a> {
    fn new(text: &'a str, strict: bool) -> JsonCursor<'a> {
        JsonCursor {
            bytes: text.as_bytes(),
            pos: 0,
            line: 0,
            line_start: 0,
            strict,
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            index: self.pos as u64,
            line: self.line,
            column: (self.pos - self.line_start) as u64,
        }
    }

    fn error<T>(&self, problem: &'static str) -> Result<T, JsonError> {
        Err(JsonError::Problem {
            problem,
            mark: self.mark(),
        })
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(byte)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), JsonError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b'/') if !self.strict => {
                    match self.bytes.get(self.pos + 1) {
                        Some(b'/') => {
                            while let Some(byte) = self.peek() {
                                if byte == b'\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some(b'*') => {
                            self.bump();
                            self.bump();
                            loop {
                                match self.bump() {
                                    Some(b'*') if self.peek() == Some(b'/') => {
                                        self.bump();
                                        break;
                                    }
                                    Some(_) => {}
                                    None => {
                                        return self.error("unterminated block comment");
                                    }
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, JsonError> {
        self.skip_whitespace()?;
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => Ok(Value::from(self.parse_string()?)),
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::Null),
            Some(byte) if byte == b'-' || byte.is_ascii_digit() => self.parse_number(),
            Some(_) => self.error("unexpected character"),
            None => self.error("unexpected end of input"),
        }
    }

    fn parse_literal(&mut self, literal: &str, value: Value) -> Result<Value, JsonError> {
        if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
            let following = self.bytes.get(self.pos + literal.len());
            if !matches!(following, Some(byte) if byte.is_ascii_alphanumeric() || *byte == b'_') {
                self.pos += literal.len();
                return Ok(value);
            }
        }
        self.error("unexpected character")
    }

    fn parse_object(&mut self) -> Result<Value, JsonError> {
        self.bump();
        let mut object = Object::new();
        self.skip_whitespace()?;
        if self.eat(b'}') {
            return Ok(Value::Object(object));
        }
        loop {
            self.skip_whitespace()?;
            let key = match self.peek() {
                Some(b'"') => self.parse_string()?,
                Some(byte) if !self.strict && (byte.is_ascii_alphabetic() || byte == b'_') => {
                    self.parse_bare_key()
                }
                _ => return self.error("expected object key"),
            };
            self.skip_whitespace()?;
            if !self.eat(b':') {
                return self.error("expected ':'");
            }
            let value = self.parse_value()?;
            object.insert(key, value);
            self.skip_whitespace()?;
            if self.eat(b',') {
                self.skip_whitespace()?;
                if self.peek() == Some(b'}') {
                    if self.strict {
                        return self.error("trailing comma");
                    }
                    self.bump();
                    break;
                }
            } else if self.eat(b'}') {
                break;
            } else {
                return self.error("expected ',' or '}'");
            }
        }
        Ok(Value::Object(object))
    }

    fn parse_array(&mut self) -> Result<Value, JsonError> {
        self.bump();
        let mut elts = Vec::new();
        self.skip_whitespace()?;
        if self.eat(b']') {
            return Ok(Value::from(elts));
        }
        loop {
            elts.push(self.parse_value()?);
            self.skip_whitespace()?;
            if self.eat(b',') {
                self.skip_whitespace()?;
                if self.peek() == Some(b']') {
                    if self.strict {
                        return self.error("trailing comma");
                    }
                    self.bump();
                    break;
                }
            } else if self.eat(b']') {
                break;
            } else {
                return self.error("expected ',' or ']'");
            }
        }
        Ok(Value::from(elts))
    }

    fn parse_bare_key(&mut self) -> String {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                self.bump();
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn parse_string(&mut self) -> Result<String, JsonError> {
        self.bump();
        let mut string = String::new();
        loop {
            let start = self.pos;
            // Consume a plain run in one go; the input is known-good UTF-8.
            while let Some(byte) = self.peek() {
                if byte == b'"' || byte == b'\\' || byte < 0x20 {
                    break;
                }
                self.bump();
            }
            string.push_str(&String::from_utf8_lossy(&self.bytes[start..self.pos]));
            match self.peek() {
                Some(b'"') => {
                    self.bump();
                    return Ok(string);
                }
                Some(b'\\') => {
                    self.bump();
                    match self.bump() {
                        Some(b'"') => string.push('"'),
                        Some(b'\\') => string.push('\\'),
                        Some(b'/') => string.push('/'),
                        Some(b'b') => string.push('\x08'),
                        Some(b'f') => string.push('\x0C'),
                        Some(b'n') => string.push('\n'),
                        Some(b'r') => string.push('\r'),
                        Some(b't') => string.push('\t'),
                        Some(b'u') => {
                            let unit = self.parse_hex4()?;
                            let ch = if unit & 0xFC00 == 0xD800 {
                                // A high surrogate must pair with a
                                // following \uXXXX low surrogate.
                                if !(self.eat(b'\\') && self.eat(b'u')) {
                                    return self.error("expected low surrogate escape");
                                }
                                let low = self.parse_hex4()?;
                                if low & 0xFC00 != 0xDC00 {
                                    return self.error("expected low surrogate escape");
                                }
                                let combined =
                                    0x10000 + ((unit & 0x3FF) << 10) + (low & 0x3FF);
                                char::from_u32(combined)
                            } else {
                                char::from_u32(unit)
                            };
                            match ch {
                                Some(ch) => string.push(ch),
                                None => return self.error("invalid character escape"),
                            }
                        }
                        _ => return self.error("unknown escape character"),
                    }
                }
                Some(_) => return self.error("control character in string"),
                None => return self.error("unterminated string"),
            }
        }
    }

    fn parse_hex4(&mut self) -> Result<u32, JsonError> {
        let mut value = 0;
        for _ in 0..4 {
            let Some(byte) = self.bump() else {
                return self.error("expected hexadecimal digit");
            };
            let Some(digit) = (byte as char).to_digit(16) else {
                return self.error("expected hexadecimal digit");
            };
            value = (value << 4) + digit;
        }
        Ok(value)
    }

    fn parse_number(&mut self) -> Result<Value, JsonError> {
        let start = self.pos;
        self.eat(b'-');
        while matches!(self.peek(), Some(byte) if byte.is_ascii_digit()) {
            self.bump();
        }
        let mut integral = true;
        if self.eat(b'.') {
            integral = false;
            while matches!(self.peek(), Some(byte) if byte.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            integral = false;
            self.bump();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.bump();
            }
            while matches!(self.peek(), Some(byte) if byte.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .expect("number text is ASCII");
        if integral {
            if let Ok(parsed) = text.parse::<i64>() {
                return Ok(
                    if parsed >= i64::from(i32::MIN) && parsed <= i64::from(i32::MAX) {
                        Value::Int32(parsed as i32)
                    } else {
                        Value::Int64(parsed)
                    },
                );
            }
            if let Ok(parsed) = text.parse::<u64>() {
                return Ok(Value::UInt64(parsed));
            }
        }
        match text.parse::<f64>() {
            Ok(parsed) => Ok(Value::Double(parsed)),
            Err(_) => self.error("malformed number"),
        }
    }
}

/// Parse a JSON document. With `strict` off, comments, trailing commas and
/// bare keys are accepted.
pub fn parse_json(text: &str, strict: bool) -> Result<Value, JsonError> {
    let mut cursor = JsonCursor::new(text, strict);
    let value = cursor.parse_value()?;
    cursor.skip_whitespace()?;
    if cursor.peek().is_some() {
        return cursor.error("unexpected trailing content");
    }
    Ok(value)
}

/// Load a JSON document from a string, in relaxed mode.
pub fn load_json_text(text: &str) -> Result<Value, JsonError> {
    parse_json(text, false)
}

/// Load a JSON document from a file, in relaxed mode.
pub fn load_json_file(path: &Path) -> Result<Value, JsonError> {
    let text = std::fs::read_to_string(path)?;
    parse_json(&text, false)
}

pub(crate) fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && !key.as_bytes()[0].is_ascii_digit()
        && key
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

pub(crate) fn write_json_string(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            ch if (ch as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", ch as u32);
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
}

pub(crate) fn write_json_double(out: &mut String, value: f64, format: &JsonFormat) {
    if !value.is_finite() {
        let text = match (format.inf_nan, value.is_nan(), value < 0.0) {
            (InfNan::Null, ..) => "null",
            (InfNan::C, true, _) => "nan",
            (InfNan::C, false, true) => "-inf",
            (InfNan::C, false, false) => "inf",
            (InfNan::Js, true, _) => "NaN",
            (InfNan::Js, false, true) => "-Infinity",
            (InfNan::Js, false, false) => "Infinity",
        };
        out.push_str(text);
        return;
    }
    if format.max_precision >= 17 {
        let mut buffer = ryu::Buffer::new();
        let text = buffer.format(value);
        // ryu always writes a fraction; ".0" trims like any other zero, but
        // exponent forms must be left alone.
        if format.trim_zeroes && text.contains('.') && !text.contains('e') {
            out.push_str(text.trim_end_matches('0').trim_end_matches('.'));
        } else {
            out.push_str(text);
        }
        return;
    }
    let mut text = format!("{:.*}", format.max_precision.max(0) as usize, value);
    if format.trim_zeroes && text.contains('.') {
        text.truncate(text.trim_end_matches('0').trim_end_matches('.').len());
    }
    out.push_str(&text);
}

pub(crate) fn write_json_scalar(out: &mut String, value: &Value, format: &JsonFormat) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        Value::Int32(v) => out.push_str(itoa::Buffer::new().format(*v)),
        Value::UInt32(v) => out.push_str(itoa::Buffer::new().format(*v)),
        Value::Int64(v) => out.push_str(itoa::Buffer::new().format(*v)),
        Value::UInt64(v) => out.push_str(itoa::Buffer::new().format(*v)),
        Value::Double(v) => write_json_double(out, *v, format),
        Value::String(s) => write_json_string(out, s),
        Value::Array(_) | Value::Object(_) => unreachable!("collections are written elsewhere"),
    }
}

fn write_indent(out: &mut String, format: &JsonFormat, depth: usize) {
    for _ in 0..(format.indent.max(0) as usize * depth) {
        out.push(' ');
    }
}

fn write_key(out: &mut String, key: &str, format: &JsonFormat) {
    if !format.quote_keys && is_bare_key(key) {
        out.push_str(key);
    } else {
        write_json_string(out, key);
    }
}

fn write_json_value(out: &mut String, value: &Value, format: &JsonFormat, depth: usize) {
    match value {
        Value::Array(elts) => {
            if elts.is_empty() {
                out.push_str("[]");
                return;
            }
            let mut flat = String::from("[");
            for (i, elt) in elts.iter().enumerate() {
                if i > 0 {
                    flat.push_str(", ");
                }
                write_json_value(&mut flat, elt, format, depth + 1);
            }
            flat.push(']');
            if format.indent <= 0
                || !flat.contains('\n') && flat.len() as i32 <= format.array_margin
            {
                out.push_str(&flat);
            } else {
                out.push('[');
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push('\n');
                    write_indent(out, format, depth + 1);
                    write_json_value(out, elt, format, depth + 1);
                }
                out.push('\n');
                write_indent(out, format, depth);
                out.push(']');
            }
        }
        Value::Object(object) => {
            if object.is_empty() {
                out.push_str("{}");
                return;
            }
            if format.indent <= 0 {
                out.push('{');
                for (i, (key, member)) in object.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_key(out, key, format);
                    out.push_str(": ");
                    write_json_value(out, member, format, depth);
                }
                out.push('}');
            } else {
                out.push('{');
                for (i, (key, member)) in object.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push('\n');
                    write_indent(out, format, depth + 1);
                    write_key(out, key, format);
                    out.push_str(": ");
                    write_json_value(out, member, format, depth + 1);
                }
                out.push('\n');
                write_indent(out, format, depth);
                out.push('}');
            }
        }
        _ => write_json_scalar(out, value, format),
    }
}

/// Render a value as JSON text.
pub fn as_json(value: &Value, format: &JsonFormat) -> String {
    let mut out = String::new();
    write_json_value(&mut out, value, format, 0);
    out
}
