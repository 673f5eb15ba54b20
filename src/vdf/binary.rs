//! Binary VDF stream decoder (spec §4.1), grounded on the type-tag loop in
//! `other_examples/beae5846_dank0i-pc-bridge__src-steam-appinfo.rs`'s
//! `BinaryVdfReader`, generalized here into a full map decoder plus a
//! standalone cursor usable for partial/seek-only traversal (C3's skip
//! protocol never needs the cursor form, but C3's in-entry parse does).

use super::{VdfMap, VdfValue};
use crate::error::VdfError;

const TYPE_MAP_START: u8 = 0x00;
const TYPE_STRING: u8 = 0x01;
const TYPE_INT32: u8 = 0x02;
const TYPE_FLOAT32: u8 = 0x03;
const TYPE_POINTER: u8 = 0x04;
const TYPE_WSTRING: u8 = 0x05;
const TYPE_COLOR: u8 = 0x06;
const TYPE_UINT64: u8 = 0x07;
const TYPE_MAP_END: u8 = 0x08;
const TYPE_INT64: u8 = 0x0A;
const TYPE_ALT_END: u8 = 0x0B;

/// Decode a full binary VDF map from a byte slice that starts at a
/// map-start-implicit position (i.e. directly at the sequence of typed
/// key/value pairs, with no leading `TYPE_MAP_START` byte — this matches
/// how an appinfo entry's payload begins).
pub fn decode_binary(input: &[u8]) -> Result<VdfMap, VdfError> {
    let mut reader = BinaryVdfReader::new(input);
    reader.read_map_body()
}

/// A cursor over a binary VDF byte slice. Exposes lower-level primitives
/// than `decode_binary` so callers (C3) can skip/seek without
/// materializing intermediate maps when they only need one field.
pub struct BinaryVdfReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinaryVdfReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, VdfError> {
        let b = *self.buf.get(self.pos).ok_or(VdfError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], VdfError> {
        let end = self.pos.checked_add(n).ok_or(VdfError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(VdfError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_cstr(&mut self) -> Result<String, VdfError> {
        let start = self.pos;
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
        }
        let bytes = &self.buf[start..self.pos - 1];
        String::from_utf8(bytes.to_vec()).map_err(|_| VdfError::EncodingError)
    }

    fn read_i32(&mut self) -> Result<i32, VdfError> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64, VdfError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_i64(&mut self) -> Result<i64, VdfError> {
        let bytes = self.read_bytes(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32, VdfError> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Read one full map body (a sequence of typed key/value pairs
    /// terminated by `TYPE_MAP_END`/`TYPE_ALT_END`, or by running out of
    /// bytes at the top level).
    pub fn read_map_body(&mut self) -> Result<VdfMap, VdfError> {
        let mut map = VdfMap::new();
        loop {
            if self.pos >= self.buf.len() {
                return Ok(map);
            }
            let tag = self.read_u8()?;
            if tag == TYPE_MAP_END || tag == TYPE_ALT_END {
                return Ok(map);
            }
            let key = self.read_cstr()?;
            let value = self.read_value(tag)?;
            map.insert(key, value);
        }
    }

    fn read_value(&mut self, tag: u8) -> Result<VdfValue, VdfError> {
        match tag {
            TYPE_MAP_START => Ok(VdfValue::Map(self.read_map_body()?)),
            TYPE_STRING | TYPE_WSTRING => Ok(VdfValue::Str(self.read_cstr()?)),
            TYPE_INT32 => Ok(VdfValue::Int32(self.read_i32()?)),
            TYPE_FLOAT32 => Ok(VdfValue::Float32(self.read_f32()?)),
            TYPE_POINTER => Ok(VdfValue::Int64(self.read_i64()?)),
            TYPE_COLOR => Ok(VdfValue::Int32(self.read_i32()?)),
            TYPE_UINT64 => Ok(VdfValue::UInt64(self.read_u64()?)),
            TYPE_INT64 => Ok(VdfValue::Int64(self.read_i64()?)),
            other => Err(VdfError::UnknownTag(other)),
        }
    }

    /// Search for a top-level key named `name` whose value is a nested
    /// map, entering it and returning `true`. Leaves the cursor positioned
    /// just inside the nested map on success; on failure the cursor has
    /// consumed the whole (sub-)map it searched and `false` is returned.
    pub fn find_block(&mut self, name: &str) -> bool {
        loop {
            let tag = match self.read_u8() {
                Ok(t) => t,
                Err(_) => return false,
            };
            if tag == TYPE_MAP_END || tag == TYPE_ALT_END {
                return false;
            }
            let key = match self.read_cstr() {
                Ok(k) => k,
                Err(_) => return false,
            };
            if tag == TYPE_MAP_START {
                if key.eq_ignore_ascii_case(name) {
                    return true;
                }
                // Skip the nested map entirely by reading (and discarding) it.
                if self.read_map_body().is_err() {
                    return false;
                }
            } else if self.skip_scalar(tag).is_err() {
                return false;
            }
        }
    }

    fn skip_scalar(&mut self, tag: u8) -> Result<(), VdfError> {
        match tag {
            TYPE_STRING | TYPE_WSTRING => {
                self.read_cstr()?;
            }
            TYPE_INT32 | TYPE_FLOAT32 | TYPE_COLOR => {
                self.read_bytes(4)?;
            }
            TYPE_POINTER | TYPE_UINT64 | TYPE_INT64 => {
                self.read_bytes(8)?;
            }
            other => return Err(VdfError::UnknownTag(other)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_str(out: &mut Vec<u8>, key: &str, value: &str) {
        out.push(TYPE_STRING);
        out.extend_from_slice(key.as_bytes());
        out.push(0);
        out.extend_from_slice(value.as_bytes());
        out.push(0);
    }

    fn field_i32(out: &mut Vec<u8>, key: &str, value: i32) {
        out.push(TYPE_INT32);
        out.extend_from_slice(key.as_bytes());
        out.push(0);
        out.extend_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn flat_decode() {
        let mut buf = Vec::new();
        field_str(&mut buf, "name", "Stardew Valley");
        field_i32(&mut buf, "type", 1);
        buf.push(TYPE_MAP_END);

        let map = decode_binary(&buf).unwrap();
        assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("Stardew Valley"));
    }

    #[test]
    fn nested_map_decode() {
        let mut inner = Vec::new();
        field_str(&mut inner, "name", "Stardew Valley");
        inner.push(TYPE_MAP_END);

        let mut outer = Vec::new();
        outer.push(TYPE_MAP_START);
        outer.extend_from_slice(b"common\0");
        outer.extend_from_slice(&inner);
        outer.push(TYPE_MAP_END);

        let map = decode_binary(&outer).unwrap();
        let common = map.get("common").unwrap().as_map().unwrap();
        assert_eq!(common.get("name").and_then(|v| v.as_str()), Some("Stardew Valley"));
    }

    #[test]
    fn unknown_tag_errors() {
        let mut buf = Vec::new();
        buf.push(0xFF);
        buf.extend_from_slice(b"key\0");
        assert!(matches!(decode_binary(&buf), Err(VdfError::UnknownTag(0xFF))));
    }

    #[test]
    fn truncated_errors() {
        let buf = vec![TYPE_STRING, b'k', b'e', b'y'];
        assert!(matches!(decode_binary(&buf), Err(VdfError::Truncated)));
    }

    #[test]
    fn find_block_locates_nested_map() {
        let mut inner = Vec::new();
        field_str(&mut inner, "name", "Found");
        inner.push(TYPE_MAP_END);

        let mut outer = Vec::new();
        field_i32(&mut outer, "skip_me", 1);
        outer.push(TYPE_MAP_START);
        outer.extend_from_slice(b"common\0");
        outer.extend_from_slice(&inner);
        outer.push(TYPE_MAP_END);

        let mut reader = BinaryVdfReader::new(&outer);
        assert!(reader.find_block("common"));
        let rest = reader.read_map_body().unwrap();
        assert_eq!(rest.get("name").and_then(|v| v.as_str()), Some("Found"));
    }
}
