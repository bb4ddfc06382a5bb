//! Growable byte buffer with independent read and write cursors, and typed
//! big-endian / VarInt codecs layered on top. This is the one place the wire
//! protocol's endianness and length-prefix rules live; every packet encoder
//! and decoder goes through it.

use crate::varint::{self, VarIntError};
use crate::Transmutable as _;

pub const MAX_STRING_LEN: i32 = 32767;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer underflow: needed {needed} bytes, {available} available")]
    Underflow { needed: usize, available: usize },
    #[error(transparent)]
    Overlong(#[from] VarIntError),
    #[error("string length {0} outside of the allowed range [0, {MAX_STRING_LEN}]")]
    BadLength(i32),
    #[error("string bytes are not valid utf-8")]
    InvalidUtf8,
}

/// A byte sequence with a write cursor (always the end of written data) and
/// an independent read cursor that advances as frames are consumed.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    data: Vec<u8>,
    read_pos: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, read_pos: 0 }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Bytes written but not yet consumed by a read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reset both cursors; reuses the already-allocated capacity.
    pub fn reset(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Drop already-consumed bytes and rewind the read cursor to zero, so a
    /// connection's accumulation buffer doesn't grow unbounded across many
    /// small frames.
    pub fn compact(&mut self) {
        if self.read_pos > 0 {
            self.data.drain(..self.read_pos);
            self.read_pos = 0;
        }
    }

    fn take(&mut self, n: usize) -> Result<&[u8], BufferError> {
        if self.remaining() < n {
            return Err(BufferError::Underflow {
                needed: n,
                available: self.remaining(),
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..self.read_pos])
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, BufferError> {
        Ok(self.take(n)?.to_vec())
    }
}

macro_rules! fixed_width_int {
    ($write:ident, $read:ident, $ty:ty) => {
        impl Buffer {
            pub fn $write(&mut self, value: $ty) {
                self.write_bytes(&value.to_be_bytes());
            }

            pub fn $read(&mut self) -> Result<$ty, BufferError> {
                const N: usize = std::mem::size_of::<$ty>();
                let bytes: [u8; N] = self.take(N)?.try_into().unwrap();
                Ok(<$ty>::from_be_bytes(bytes))
            }
        }
    };
}

fixed_width_int!(write_u8, read_u8, u8);
fixed_width_int!(write_u16, read_u16, u16);
fixed_width_int!(write_u32, read_u32, u32);
fixed_width_int!(write_u64, read_u64, u64);
fixed_width_int!(write_i8, read_i8, i8);
fixed_width_int!(write_i16, read_i16, i16);
fixed_width_int!(write_i32, read_i32, i32);
fixed_width_int!(write_i64, read_i64, i64);

impl Buffer {
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(if value { 1 } else { 0 });
    }

    pub fn read_bool(&mut self) -> Result<bool, BufferError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn write_f32(&mut self, value: f32) {
        let bits: u32 = value.transmute();
        self.write_u32(bits);
    }

    pub fn read_f32(&mut self) -> Result<f32, BufferError> {
        Ok(self.read_u32()?.transmute())
    }

    pub fn write_f64(&mut self, value: f64) {
        let bits: u64 = value.transmute();
        self.write_u64(bits);
    }

    pub fn read_f64(&mut self) -> Result<f64, BufferError> {
        Ok(self.read_u64()?.transmute())
    }

    pub fn write_varint(&mut self, value: i32) {
        varint::write_varint(&mut self.data, value);
    }

    /// Returns `Ok(None)` if the buffer doesn't yet hold a complete VarInt;
    /// the caller (the connection's frame loop) should wait for more bytes.
    pub fn try_read_varint(&mut self) -> Result<Option<i32>, BufferError> {
        match varint::try_read_varint(&self.data[self.read_pos..])? {
            None => Ok(None),
            Some((consumed, value)) => {
                self.read_pos += consumed;
                Ok(Some(value))
            }
        }
    }

    pub fn read_varint(&mut self) -> Result<i32, BufferError> {
        self.try_read_varint()?.ok_or(BufferError::Underflow {
            needed: 1,
            available: 0,
        })
    }

    pub fn write_varlong(&mut self, value: i64) {
        varint::write_varlong(&mut self.data, value);
    }

    pub fn read_varlong(&mut self) -> Result<i64, BufferError> {
        match varint::try_read_varlong(&self.data[self.read_pos..])? {
            None => Err(BufferError::Underflow {
                needed: 1,
                available: 0,
            }),
            Some((consumed, value)) => {
                self.read_pos += consumed;
                Ok(value)
            }
        }
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_varint(value.len() as i32);
        self.write_bytes(value.as_bytes());
    }

    pub fn read_string(&mut self) -> Result<String, BufferError> {
        let len = self.read_varint()?;
        if !(0..=MAX_STRING_LEN).contains(&len) {
            return Err(BufferError::BadLength(len));
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BufferError::InvalidUtf8)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixed_width_roundtrip() {
        let mut buf = Buffer::new();
        buf.write_u8(0xAB);
        buf.write_u16(0x1234);
        buf.write_u32(0xDEADBEEF);
        buf.write_u64(0x0123456789ABCDEF);
        buf.write_i64(-1);
        assert_eq!(buf.read_u8().unwrap(), 0xAB);
        assert_eq!(buf.read_u16().unwrap(), 0x1234);
        assert_eq!(buf.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(buf.read_u64().unwrap(), 0x0123456789ABCDEF);
        assert_eq!(buf.read_i64().unwrap(), -1);
        assert!(buf.is_empty());
    }

    #[test]
    fn float_bit_exact_roundtrip() {
        for value in [0.0f64, -0.0, 1.5, f64::MAX, f64::MIN, f64::NAN.copysign(1.0)] {
            let mut buf = Buffer::new();
            buf.write_f64(value);
            let back = buf.read_f64().unwrap();
            assert_eq!(value.to_bits(), back.to_bits());
        }
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = Buffer::new();
        buf.write_string("localhost");
        assert_eq!(buf.read_string().unwrap(), "localhost");
    }

    #[test]
    fn string_rejects_oversize_length() {
        let mut buf = Buffer::new();
        buf.write_varint(MAX_STRING_LEN + 1);
        assert_eq!(
            buf.read_string().unwrap_err(),
            BufferError::BadLength(MAX_STRING_LEN + 1)
        );
    }

    #[test]
    fn string_rejects_negative_length() {
        let mut buf = Buffer::new();
        buf.write_varint(-1);
        assert_eq!(buf.read_string().unwrap_err(), BufferError::BadLength(-1));
    }

    #[test]
    fn underflow_on_short_read() {
        let mut buf = Buffer::new();
        buf.write_u8(1);
        assert!(buf.read_u32().is_err());
    }

    #[test]
    fn compact_rewinds_read_cursor() {
        let mut buf = Buffer::new();
        buf.write_bytes(&[1, 2, 3, 4]);
        let _ = buf.read_u16().unwrap();
        buf.compact();
        assert_eq!(buf.remaining(), 2);
        assert_eq!(buf.read_u16().unwrap(), u16::from_be_bytes([3, 4]));
    }
}
