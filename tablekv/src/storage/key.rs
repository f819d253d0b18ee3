use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

const TAG_BYTES: u8 = 0x01;
const TAG_TEXT: u8 = 0x02;
const TAG_INTEGER: u8 = 0x20;
const TAG_FLOAT: u8 = 0x21;
const TAG_TIMESTAMP: u8 = 0x22;
const TAG_FALSE: u8 = 0x26;
const TAG_TRUE: u8 = 0x27;
const SIGN_FLIP: u64 = 0x8000_0000_0000_0000;

/// One element of a physical key. Variants sort in declaration order, then by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyPart {
    Bytes(Vec<u8>),
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Boolean(bool),
}

impl KeyPart {
    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            KeyPart::Bytes(b) => {
                out.push(TAG_BYTES);
                append_escaped(b, out);
            }
            KeyPart::Text(s) => {
                out.push(TAG_TEXT);
                append_escaped(s.as_bytes(), out);
            }
            KeyPart::Integer(i) => {
                out.push(TAG_INTEGER);
                out.extend_from_slice(&((*i as u64) ^ SIGN_FLIP).to_be_bytes());
            }
            KeyPart::Float(f) => {
                out.push(TAG_FLOAT);
                let bits = f.to_bits();
                let mapped = if (bits >> 63) == 1 { !bits } else { bits ^ SIGN_FLIP };
                out.extend_from_slice(&mapped.to_be_bytes());
            }
            KeyPart::Timestamp(ts) => {
                out.push(TAG_TIMESTAMP);
                out.extend_from_slice(&((ts.timestamp() as u64) ^ SIGN_FLIP).to_be_bytes());
                out.extend_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
            }
            KeyPart::Boolean(b) => out.push(if *b { TAG_TRUE } else { TAG_FALSE }),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            KeyPart::Text(s) => write!(f, "{:?}", s),
            KeyPart::Integer(i) => write!(f, "{}", i),
            KeyPart::Float(x) => write!(f, "{}", x),
            KeyPart::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            KeyPart::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Text(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Text(s)
    }
}

impl From<i64> for KeyPart {
    fn from(i: i64) -> Self {
        KeyPart::Integer(i)
    }
}

/// Interior zero bytes are escaped as `00 FF` so the `00` terminator stays unambiguous.
fn append_escaped(bytes: &[u8], out: &mut Vec<u8>) {
    for byte in bytes {
        if *byte == 0 {
            out.extend_from_slice(&[0x00, 0xFF]);
        } else {
            out.push(*byte);
        }
    }
    out.push(0x00);
}

/// Ordered tuple addressing one record copy in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Key(Vec<KeyPart>);

impl Key {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Key(parts)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.encode().starts_with(&prefix.encode())
    }

    /// Byte encoding whose lexicographic order equals the tuple order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        for part in &self.0 {
            part.encode_into(&mut out);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Key, StoreError> {
        let mut parts = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let tag = bytes[pos];
            pos += 1;
            let part = match tag {
                TAG_BYTES => KeyPart::Bytes(read_escaped(bytes, &mut pos)?),
                TAG_TEXT => {
                    let raw = read_escaped(bytes, &mut pos)?;
                    KeyPart::Text(String::from_utf8(raw).map_err(|e| StoreError::CorruptKey(e.to_string()))?)
                }
                TAG_INTEGER => KeyPart::Integer((read_u64(bytes, &mut pos)? ^ SIGN_FLIP) as i64),
                TAG_FLOAT => {
                    let mapped = read_u64(bytes, &mut pos)?;
                    let bits = if (mapped >> 63) == 1 { mapped ^ SIGN_FLIP } else { !mapped };
                    KeyPart::Float(f64::from_bits(bits))
                }
                TAG_TIMESTAMP => {
                    let secs = (read_u64(bytes, &mut pos)? ^ SIGN_FLIP) as i64;
                    let nanos = read_u32(bytes, &mut pos)?;
                    let ts = DateTime::<Utc>::from_timestamp(secs, nanos)
                        .ok_or_else(|| StoreError::CorruptKey(format!("timestamp out of range: {}.{:09}", secs, nanos)))?;
                    KeyPart::Timestamp(ts)
                }
                TAG_FALSE => KeyPart::Boolean(false),
                TAG_TRUE => KeyPart::Boolean(true),
                other => return Err(StoreError::CorruptKey(format!("unknown key part tag {:#04x}", other))),
            };
            parts.push(part);
        }
        Ok(Key(parts))
    }
}

fn read_escaped(bytes: &[u8], pos: &mut usize) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    while *pos < bytes.len() {
        let byte = bytes[*pos];
        *pos += 1;
        if byte == 0x00 {
            if bytes.get(*pos) == Some(&0xFF) {
                out.push(0x00);
                *pos += 1;
            } else {
                return Ok(out);
            }
        } else {
            out.push(byte);
        }
    }
    Err(StoreError::CorruptKey("unterminated key part".to_string()))
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> Result<u64, StoreError> {
    let end = *pos + 8;
    let slice = bytes.get(*pos..end).ok_or_else(|| StoreError::CorruptKey("truncated numeric key part".to_string()))?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(slice);
    *pos = end;
    Ok(u64::from_be_bytes(buf))
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32, StoreError> {
    let end = *pos + 4;
    let slice = bytes.get(*pos..end).ok_or_else(|| StoreError::CorruptKey("truncated timestamp key part".to_string()))?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(slice);
    *pos = end;
    Ok(u32::from_be_bytes(buf))
}

/// Smallest byte string greater than every key starting with `prefix`, if any.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    for i in (0..next.len()).rev() {
        if next[i] != 0xFF {
            next[i] += 1;
            next.truncate(i + 1);
            return Some(next);
        }
    }
    None
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.encode() == other.encode()
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encode().cmp(&other.encode())
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encode().hash(state)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}
