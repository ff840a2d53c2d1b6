//! Wire-format codec for backend messages
//!
//! Messages travel as flat JSON-style objects with a fixed key order:
//!
//! ```text
//! MeasurementReport  {"medicao":<f32>,"soc":<f32>,"id":"<id>"}
//! BindRequest        {"req_id":"<uuid>","nome":"<name>"}
//! BindResponse       {"req_id":"<uuid>","id":"<id>","status":"ok"|"fail"}
//! UnbindNotice       {"id":"<id>"}
//! ```
//!
//! The decoder is a single forward pass over the input slice. It accepts any
//! JSON whitespace between tokens (the backend pretty-prints), skips unknown
//! keys and copies values straight into their bounded destinations. Nested
//! values are rejected. It never indexes past the input, whatever the input.
//!
//! Encoding is deterministic and fails instead of truncating.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::error::{DecodeError, EncodeError};
use crate::message::{
    BindRequest, BindResponse, BindStatus, MeasurementReport, Message, Shape, UnbindNotice,
};

/// Upper bound on keys per object; more than this is treated as malformed
const MAX_FIELDS: usize = 8;

const KEY_VALUE: &str = "medicao";
const KEY_SOC: &str = "soc";
const KEY_ID: &str = "id";
const KEY_REQUEST_ID: &str = "req_id";
const KEY_NAME: &str = "nome";
const KEY_STATUS: &str = "status";

/// Encode `msg` into a string of capacity `N`
///
/// # Errors
///
/// - `EncodeError::Overflow` if the encoded form needs more than `N` bytes
/// - `EncodeError::NonFinite` if a numeric field is NaN or infinite
///
/// # Example
///
/// ```
/// use sensor_node_core::codec::encode;
/// use sensor_node_core::message::{Message, UnbindNotice, MAX_PAYLOAD_LEN};
///
/// let msg = Message::UnbindNotice(UnbindNotice { device_id: "DEV1".try_into().unwrap() });
/// let payload = encode::<MAX_PAYLOAD_LEN>(&msg).unwrap();
/// assert_eq!(payload.as_str(), r#"{"id":"DEV1"}"#);
/// ```
pub fn encode<const N: usize>(msg: &Message) -> Result<String<N>, EncodeError> {
    let mut out = String::<N>::new();
    let mut object = ObjectWriter::new(&mut out);

    match msg {
        Message::MeasurementReport(report) => {
            object.number(KEY_VALUE, report.value)?;
            object.number(KEY_SOC, report.state_of_charge)?;
            object.string(KEY_ID, &report.device_id)?;
        }
        Message::BindRequest(request) => {
            object.string(KEY_REQUEST_ID, &request.request_id)?;
            object.string(KEY_NAME, &request.device_name)?;
        }
        Message::BindResponse(response) => {
            object.string(KEY_REQUEST_ID, &response.request_id)?;
            object.string(KEY_ID, &response.device_id)?;
            object.string(KEY_STATUS, response.status.as_str())?;
        }
        Message::UnbindNotice(notice) => {
            object.string(KEY_ID, &notice.device_id)?;
        }
    }

    object.finish()?;
    Ok(out)
}

/// Decode `bytes` as a message of the given shape
///
/// Pure function of its input. Required fields are checked in wire order,
/// and before an unexpected end of input is reported, so a payload cut off
/// ahead of a field names that field.
pub fn decode(bytes: &[u8], shape: Shape) -> Result<Message, DecodeError> {
    match shape {
        Shape::MeasurementReport => decode_measurement_report(bytes).map(Message::MeasurementReport),
        Shape::BindRequest => decode_bind_request(bytes).map(Message::BindRequest),
        Shape::BindResponse => decode_bind_response(bytes).map(Message::BindResponse),
        Shape::UnbindNotice => decode_unbind_notice(bytes).map(Message::UnbindNotice),
    }
}

pub fn decode_measurement_report(bytes: &[u8]) -> Result<MeasurementReport, DecodeError> {
    let object = Object::parse(bytes)?;
    let report = MeasurementReport {
        value: object.number(KEY_VALUE)?,
        state_of_charge: object.number(KEY_SOC)?,
        device_id: object.string(KEY_ID)?,
    };
    object.finish()?;
    Ok(report)
}

pub fn decode_bind_request(bytes: &[u8]) -> Result<BindRequest, DecodeError> {
    let object = Object::parse(bytes)?;
    let request = BindRequest {
        request_id: object.string(KEY_REQUEST_ID)?,
        device_name: object.string(KEY_NAME)?,
    };
    object.finish()?;
    Ok(request)
}

pub fn decode_bind_response(bytes: &[u8]) -> Result<BindResponse, DecodeError> {
    let object = Object::parse(bytes)?;
    let request_id = object.string(KEY_REQUEST_ID)?;
    let device_id = object.string(KEY_ID)?;
    let status: String<8> = object.string(KEY_STATUS).map_err(|e| match e {
        DecodeError::Truncated(key) => DecodeError::InvalidValue(key),
        other => other,
    })?;
    let status = BindStatus::parse(&status).ok_or(DecodeError::InvalidValue(KEY_STATUS))?;
    object.finish()?;
    Ok(BindResponse {
        request_id,
        device_id,
        status,
    })
}

pub fn decode_unbind_notice(bytes: &[u8]) -> Result<UnbindNotice, DecodeError> {
    let object = Object::parse(bytes)?;
    let notice = UnbindNotice {
        device_id: object.string(KEY_ID)?,
    };
    object.finish()?;
    Ok(notice)
}

// ============================================================================
// ENCODER
// ============================================================================

struct ObjectWriter<'a, const N: usize> {
    out: &'a mut String<N>,
    empty: bool,
}

impl<'a, const N: usize> ObjectWriter<'a, N> {
    fn new(out: &'a mut String<N>) -> Self {
        Self { out, empty: true }
    }

    fn push(&mut self, s: &str) -> Result<(), EncodeError> {
        self.out.push_str(s).map_err(|_| EncodeError::Overflow)
    }

    fn key(&mut self, key: &str) -> Result<(), EncodeError> {
        self.push(if self.empty { "{\"" } else { ",\"" })?;
        self.empty = false;
        self.push(key)?;
        self.push("\":")
    }

    fn string(&mut self, key: &str, value: &str) -> Result<(), EncodeError> {
        self.key(key)?;
        self.push("\"")?;
        for c in value.chars() {
            match c {
                '"' => self.push("\\\"")?,
                '\\' => self.push("\\\\")?,
                c if (c as u32) < 0x20 => write!(self.out, "\\u{:04x}", c as u32)
                    .map_err(|_| EncodeError::Overflow)?,
                c => self.out.push(c).map_err(|_| EncodeError::Overflow)?,
            }
        }
        self.push("\"")
    }

    fn number(&mut self, key: &str, value: f32) -> Result<(), EncodeError> {
        if !value.is_finite() {
            return Err(EncodeError::NonFinite);
        }
        self.key(key)?;
        // f32 Display is the shortest representation that parses back exactly
        write!(self.out, "{}", value).map_err(|_| EncodeError::Overflow)
    }

    fn finish(mut self) -> Result<(), EncodeError> {
        if self.empty {
            self.push("{")?;
        }
        self.push("}")
    }
}

// ============================================================================
// DECODER
// ============================================================================

#[derive(Clone, Copy)]
enum Value<'a> {
    /// Quoted string, escapes still in place
    Str(&'a str),
    /// Unquoted scalar token (number, `true`, `null`, ...)
    Bare(&'a str),
}

struct Field<'a> {
    key: &'a str,
    value: Value<'a>,
}

/// Fields of one flat object, borrowed from the input
struct Object<'a> {
    fields: Vec<Field<'a>, MAX_FIELDS>,
    /// Closing brace seen (input was not cut short)
    complete: bool,
}

impl<'a> Object<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let text = core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
        let mut scanner = Scanner::new(text);
        let mut fields = Vec::new();

        scanner.skip_ws();
        match scanner.next() {
            Some(b'{') => {}
            Some(_) => return Err(scanner.malformed_prev()),
            None => return Err(DecodeError::UnexpectedEnd),
        }

        scanner.skip_ws();
        if scanner.peek() == Some(b'}') {
            scanner.next();
            scanner.expect_end()?;
            return Ok(Self {
                fields,
                complete: true,
            });
        }

        loop {
            scanner.skip_ws();
            let Some(key) = scanner.string()? else {
                return Ok(Self::incomplete(fields));
            };

            scanner.skip_ws();
            match scanner.next() {
                Some(b':') => {}
                Some(_) => return Err(scanner.malformed_prev()),
                None => return Ok(Self::incomplete(fields)),
            }

            scanner.skip_ws();
            let Some(value) = scanner.value()? else {
                return Ok(Self::incomplete(fields));
            };
            fields
                .push(Field { key, value })
                .map_err(|_| scanner.malformed_here())?;

            scanner.skip_ws();
            match scanner.next() {
                Some(b',') => continue,
                Some(b'}') => break,
                Some(_) => return Err(scanner.malformed_prev()),
                None => return Ok(Self::incomplete(fields)),
            }
        }

        scanner.expect_end()?;
        Ok(Self {
            fields,
            complete: true,
        })
    }

    fn incomplete(fields: Vec<Field<'a>, MAX_FIELDS>) -> Self {
        Self {
            fields,
            complete: false,
        }
    }

    /// Last occurrence wins for repeated keys
    fn find(&self, key: &str) -> Option<Value<'a>> {
        self.fields
            .iter()
            .rev()
            .find(|field| field.key == key)
            .map(|field| field.value)
    }

    fn string<const N: usize>(&self, key: &'static str) -> Result<String<N>, DecodeError> {
        match self.find(key) {
            Some(Value::Str(raw)) => unescape(raw, key),
            Some(Value::Bare(_)) => Err(DecodeError::InvalidValue(key)),
            None => Err(DecodeError::MissingField(key)),
        }
    }

    fn number(&self, key: &'static str) -> Result<f32, DecodeError> {
        match self.find(key) {
            Some(Value::Bare(token)) => token
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or(DecodeError::InvalidValue(key)),
            Some(Value::Str(_)) => Err(DecodeError::InvalidValue(key)),
            None => Err(DecodeError::MissingField(key)),
        }
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.complete {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedEnd)
        }
    }
}

/// Copy a raw string value into a bounded string, resolving escapes
fn unescape<const N: usize>(raw: &str, key: &'static str) -> Result<String<N>, DecodeError> {
    let mut out = String::<N>::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        let decoded = if c == '\\' {
            match chars.next() {
                Some('"') => '"',
                Some('\\') => '\\',
                Some('/') => '/',
                Some('b') => '\u{8}',
                Some('f') => '\u{c}',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('u') => {
                    let mut code = 0u32;
                    for _ in 0..4 {
                        let digit = chars
                            .next()
                            .and_then(|h| h.to_digit(16))
                            .ok_or(DecodeError::InvalidValue(key))?;
                        code = code * 16 + digit;
                    }
                    // Surrogates are rejected here
                    char::from_u32(code).ok_or(DecodeError::InvalidValue(key))?
                }
                _ => return Err(DecodeError::InvalidValue(key)),
            }
        } else {
            c
        };
        out.push(decoded).map_err(|_| DecodeError::Truncated(key))?;
    }

    Ok(out)
}

/// Bounds-checked cursor over the payload
struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn malformed_here(&self) -> DecodeError {
        DecodeError::Malformed { offset: self.pos }
    }

    /// Error pointing at the byte just consumed
    fn malformed_prev(&self) -> DecodeError {
        DecodeError::Malformed {
            offset: self.pos.saturating_sub(1),
        }
    }

    fn expect_end(&mut self) -> Result<(), DecodeError> {
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.malformed_here()),
        }
    }

    /// Quoted string; `Ok(None)` if the input ends before the closing quote
    fn string(&mut self) -> Result<Option<&'a str>, DecodeError> {
        match self.peek() {
            None => return Ok(None),
            Some(b'"') => self.pos += 1,
            Some(_) => return Err(self.malformed_here()),
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'"' => {
                    // Both ends sit on ASCII quotes, so these are char boundaries
                    let raw = &self.text[start..self.pos];
                    self.pos += 1;
                    return Ok(Some(raw));
                }
                b'\\' => self.pos += 2,
                b if b < 0x20 => return Err(self.malformed_here()),
                _ => self.pos += 1,
            }
        }

        self.pos = self.bytes.len();
        Ok(None)
    }

    /// String or bare scalar; `Ok(None)` if the input ends inside it
    fn value(&mut self) -> Result<Option<Value<'a>>, DecodeError> {
        match self.peek() {
            None => return Ok(None),
            Some(b'"') => return Ok(self.string()?.map(Value::Str)),
            Some(_) => {}
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | b',' | b'}' => break,
                b'{' | b'[' | b']' | b'"' | b':' => return Err(self.malformed_here()),
                _ => self.pos += 1,
            }
        }

        // A scalar running into the end of input may itself be cut short
        if self.peek().is_none() {
            return Ok(None);
        }
        if self.pos == start {
            return Err(self.malformed_here());
        }
        Ok(Some(Value::Bare(&self.text[start..self.pos])))
    }
}
