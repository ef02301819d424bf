//! Protocol encoding/decoding traits and helpers.

use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use crate::error::ProtoError;
use crate::types::VarInt;

/// Default maximum string length (in UTF-16 units on the vanilla side; bytes here).
pub const MAX_STRING_LEN: usize = 32_767;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

/// Fail unless `buf` holds at least `needed` more bytes.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::BufferTooShort {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Write a protocol string (VarInt length + UTF-8).
pub fn write_string(buf: &mut impl BufMut, s: &str) {
    VarInt(s.len() as i32).proto_encode(buf);
    buf.put_slice(s.as_bytes());
}

/// Read a protocol string (VarInt length + UTF-8) of at most [`MAX_STRING_LEN`] bytes.
pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtoError> {
    read_string_bounded(buf, MAX_STRING_LEN)
}

/// Read a protocol string with an explicit length limit.
pub fn read_string_bounded(buf: &mut impl Buf, max: usize) -> Result<String, ProtoError> {
    let len = read_length(buf)?;
    if len > max * 4 {
        return Err(ProtoError::StringTooLong { len, max });
    }
    ensure_remaining(buf, len)?;
    let data = buf.copy_to_bytes(len);
    let s = String::from_utf8(data.to_vec()).map_err(|_| ProtoError::InvalidUtf8)?;
    if s.chars().count() > max {
        return Err(ProtoError::StringTooLong {
            len: s.chars().count(),
            max,
        });
    }
    Ok(s)
}

/// Write a VarInt-prefixed byte array.
pub fn write_byte_array(buf: &mut impl BufMut, data: &[u8]) {
    VarInt(data.len() as i32).proto_encode(buf);
    buf.put_slice(data);
}

/// Read a VarInt-prefixed byte array.
pub fn read_byte_array(buf: &mut impl Buf) -> Result<Vec<u8>, ProtoError> {
    let len = read_length(buf)?;
    ensure_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len).to_vec())
}

/// Read a non-negative VarInt used as a length or count.
pub fn read_length(buf: &mut impl Buf) -> Result<usize, ProtoError> {
    let len = VarInt::proto_decode(buf)?.0;
    usize::try_from(len).map_err(|_| ProtoError::InvalidData(format!("negative length {len}")))
}

/// Read everything left in the buffer.
pub fn read_remaining(buf: &mut impl Buf) -> Bytes {
    buf.copy_to_bytes(buf.remaining())
}

pub fn write_bool(buf: &mut impl BufMut, value: bool) {
    buf.put_u8(value as u8);
}

pub fn read_bool(buf: &mut impl Buf) -> Result<bool, ProtoError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

/// Write an optional string as `bool present` + string.
pub fn write_optional_string(buf: &mut impl BufMut, value: Option<&str>) {
    match value {
        Some(s) => {
            write_bool(buf, true);
            write_string(buf, s);
        }
        None => write_bool(buf, false),
    }
}

pub fn read_optional_string(buf: &mut impl Buf) -> Result<Option<String>, ProtoError> {
    if read_bool(buf)? {
        Ok(Some(read_string(buf)?))
    } else {
        Ok(None)
    }
}

/// Write a UUID as two big-endian u64s.
pub fn write_uuid(buf: &mut impl BufMut, id: &Uuid) {
    buf.put_u128(id.as_u128());
}

pub fn read_uuid(buf: &mut impl Buf) -> Result<Uuid, ProtoError> {
    ensure_remaining(buf, 16)?;
    Ok(Uuid::from_u128(buf.get_u128()))
}

/// Fixed-width reads that check the remaining length first.
macro_rules! checked_get {
    ($name:ident, $ty:ty, $get:ident) => {
        pub fn $name(buf: &mut impl Buf) -> Result<$ty, ProtoError> {
            ensure_remaining(buf, std::mem::size_of::<$ty>())?;
            Ok(buf.$get())
        }
    };
}

checked_get!(read_u8, u8, get_u8);
checked_get!(read_i8, i8, get_i8);
checked_get!(read_u16, u16, get_u16);
checked_get!(read_i16, i16, get_i16);
checked_get!(read_i32, i32, get_i32);
checked_get!(read_i64, i64, get_i64);
checked_get!(read_f32, f32, get_f32);
checked_get!(read_f64, f64, get_f64);
