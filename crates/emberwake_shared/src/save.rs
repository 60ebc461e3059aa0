//! # Binary Save Codec
//!
//! Little-endian serialization for saved entities.
//!
//! ## Wire format
//!
//! - Integers and floats: little-endian bytes
//! - `Vec2`: `f32 x; f32 y`
//! - String: `u32 length; length x u8 bytes` (UTF-8)
//! - `Vec<T: Pod>`: `u32 count; count x size_of::<T>() bytes`
//! - Compound objects: fields concatenated in declaration order
//!
//! Every read is bounds-checked; stream faults surface as a typed
//! [`SerializeError`], never as a panic or unwinding across the boundary.

use bytemuck::Pod;
use thiserror::Error;

use crate::handle::{EntityHandle, EntityKind, ResourceHandle};
use crate::math::Vec2;

/// Errors from the binary codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input at offset {offset}, needed {needed} bytes")]
    Truncated {
        /// Read position when the shortfall was detected
        offset: usize,
        /// Bytes the value still required
        needed: usize,
    },

    /// A length prefix exceeds the sanity cap.
    #[error("length prefix {0} exceeds limit")]
    LengthOverflow(u32),

    /// String bytes were not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// An enum discriminant had no matching variant.
    #[error("invalid discriminant {0}")]
    InvalidDiscriminant(u8),
}

/// Sanity cap on length prefixes; a save will never legitimately contain a
/// single vector or string this large.
const MAX_LENGTH_PREFIX: u32 = 16 * 1024 * 1024;

/// Binary writer appending to a byte buffer.
#[derive(Default)]
pub struct SaveWriter {
    buffer: Vec<u8>,
}

impl SaveWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the writer, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Borrows the encoded bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16 little-endian.
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 little-endian.
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u64 little-endian.
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an f32 little-endian.
    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a Vec2 as x then y.
    pub fn write_vec2(&mut self, value: Vec2) {
        self.write_f32(value.x);
        self.write_f32(value.y);
    }

    /// Writes a string as u32 length + UTF-8 bytes.
    pub fn write_string(&mut self, value: &str) {
        self.write_u32(u32::try_from(value.len()).unwrap_or(u32::MAX));
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Writes a slice of Pod values as u32 count + raw little-endian bytes.
    ///
    /// Element layout must already be little-endian friendly (plain ints
    /// and floats); every Pod used in the save format is.
    pub fn write_pod_slice<T: Pod>(&mut self, values: &[T]) {
        self.write_u32(u32::try_from(values.len()).unwrap_or(u32::MAX));
        self.buffer.extend_from_slice(bytemuck::cast_slice(values));
    }

    /// Writes an entity handle: id, kind, generation.
    pub fn write_entity_handle(&mut self, handle: EntityHandle) {
        self.write_u64(handle.id);
        self.write_u8(handle.kind as u8);
        self.write_u8(handle.generation);
    }

    /// Writes a resource handle: id, generation.
    pub fn write_resource_handle(&mut self, handle: ResourceHandle) {
        self.write_u32(handle.id);
        self.write_u16(handle.generation);
    }
}

/// Binary reader over a byte slice.
pub struct SaveReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SaveReader<'a> {
    /// Creates a reader at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read position.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes remaining.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], SerializeError> {
        if self.remaining() < count {
            return Err(SerializeError::Truncated {
                offset: self.offset,
                needed: count - self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// `Truncated` when the input is exhausted.
    pub fn read_u8(&mut self) -> Result<u8, SerializeError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian u16.
    ///
    /// # Errors
    ///
    /// `Truncated` when the input is exhausted.
    pub fn read_u16(&mut self) -> Result<u16, SerializeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian u32.
    ///
    /// # Errors
    ///
    /// `Truncated` when the input is exhausted.
    pub fn read_u32(&mut self) -> Result<u32, SerializeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian u64.
    ///
    /// # Errors
    ///
    /// `Truncated` when the input is exhausted.
    pub fn read_u64(&mut self) -> Result<u64, SerializeError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a little-endian f32.
    ///
    /// # Errors
    ///
    /// `Truncated` when the input is exhausted.
    pub fn read_f32(&mut self) -> Result<f32, SerializeError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a Vec2.
    ///
    /// # Errors
    ///
    /// `Truncated` when the input is exhausted.
    pub fn read_vec2(&mut self) -> Result<Vec2, SerializeError> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        Ok(Vec2::new(x, y))
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// `Truncated`, `LengthOverflow`, or `InvalidUtf8`.
    pub fn read_string(&mut self) -> Result<String, SerializeError> {
        let length = self.read_u32()?;
        if length > MAX_LENGTH_PREFIX {
            return Err(SerializeError::LengthOverflow(length));
        }
        let bytes = self.take(length as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| SerializeError::InvalidUtf8)
    }

    /// Reads a count-prefixed vector of Pod values.
    ///
    /// # Errors
    ///
    /// `Truncated` or `LengthOverflow`.
    pub fn read_pod_vec<T: Pod>(&mut self) -> Result<Vec<T>, SerializeError> {
        let count = self.read_u32()?;
        if count > MAX_LENGTH_PREFIX {
            return Err(SerializeError::LengthOverflow(count));
        }
        let byte_count = count as usize * std::mem::size_of::<T>();
        let bytes = self.take(byte_count)?;
        // pod_collect_to_vec copies, so alignment of the source is irrelevant.
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    /// Reads an entity handle.
    ///
    /// # Errors
    ///
    /// `Truncated` or `InvalidDiscriminant` for an unknown kind byte.
    pub fn read_entity_handle(&mut self) -> Result<EntityHandle, SerializeError> {
        let id = self.read_u64()?;
        let kind_raw = self.read_u8()?;
        let generation = self.read_u8()?;
        let kind = EntityKind::ALL
            .get(kind_raw as usize)
            .copied()
            .ok_or(SerializeError::InvalidDiscriminant(kind_raw))?;
        Ok(EntityHandle::new(id, kind, generation))
    }

    /// Reads a resource handle.
    ///
    /// # Errors
    ///
    /// `Truncated` when the input is exhausted.
    pub fn read_resource_handle(&mut self) -> Result<ResourceHandle, SerializeError> {
        let id = self.read_u32()?;
        let generation = self.read_u16()?;
        Ok(ResourceHandle::new(id, generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_roundtrip_bit_exact() {
        let v = Vec2::new(123.456, -0.000789);
        let mut w = SaveWriter::new();
        w.write_vec2(v);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 8);

        let mut r = SaveReader::new(&bytes);
        let back = r.read_vec2().unwrap();
        assert_eq!(v.x.to_bits(), back.x.to_bits());
        assert_eq!(v.y.to_bits(), back.y.to_bits());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut w = SaveWriter::new();
        w.write_u32(0x0102_0304);
        assert_eq!(w.as_slice(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut w = SaveWriter::new();
        w.write_string("iron_ore");
        w.write_string("");
        let bytes = w.into_bytes();

        let mut r = SaveReader::new(&bytes);
        assert_eq!(r.read_string().unwrap(), "iron_ore");
        assert_eq!(r.read_string().unwrap(), "");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_pod_vec_roundtrip() {
        let values: Vec<Vec2> = vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)];
        let mut w = SaveWriter::new();
        w.write_pod_slice(&values);

        let bytes = w.into_bytes();
        let mut r = SaveReader::new(&bytes);
        let back: Vec<Vec2> = r.read_pod_vec().unwrap();
        assert_eq!(values, back);
    }

    #[test]
    fn test_truncated_input_is_typed_error() {
        let bytes = [0x01, 0x02];
        let mut r = SaveReader::new(&bytes);
        match r.read_u32() {
            Err(SerializeError::Truncated { offset, needed }) => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 2);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_bogus_length_prefix_rejected() {
        let mut w = SaveWriter::new();
        w.write_u32(u32::MAX);
        let bytes = w.into_bytes();
        let mut r = SaveReader::new(&bytes);
        assert!(matches!(r.read_string(), Err(SerializeError::LengthOverflow(_))));
    }

    #[test]
    fn test_handle_roundtrip() {
        let entity = EntityHandle::new(991, EntityKind::Harvestable, 3);
        let resource = ResourceHandle::new(17, 2);

        let mut w = SaveWriter::new();
        w.write_entity_handle(entity);
        w.write_resource_handle(resource);

        let bytes = w.into_bytes();
        let mut r = SaveReader::new(&bytes);
        assert_eq!(r.read_entity_handle().unwrap(), entity);
        assert_eq!(r.read_resource_handle().unwrap(), resource);
    }

    #[test]
    fn test_unknown_kind_discriminant() {
        let mut w = SaveWriter::new();
        w.write_u64(1);
        w.write_u8(200); // no such kind
        w.write_u8(1);
        let bytes = w.into_bytes();
        let mut r = SaveReader::new(&bytes);
        assert_eq!(
            r.read_entity_handle(),
            Err(SerializeError::InvalidDiscriminant(200))
        );
    }
}
