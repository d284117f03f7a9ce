//! Compressed metadata of the R21 (AC1021) file header.
//!
//! 34 little-endian u64 fields, stored LZ77 AC21 compressed inside the
//! Reed-Solomon encoded header block at 0x80. Offsets named `*_offset` are
//! relative to the data page base 0x480.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::ac21;

/// Decompressed R21 header metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dwg21CompressedMetadata {
    /// Always 0x70
    pub header_size: u64,
    pub file_size: u64,
    pub pages_map_crc_compressed: u64,
    pub pages_map_correction_factor: u64,
    pub pages_map_crc_seed: u64,
    pub pages_map2_offset: u64,
    pub pages_map2_id: u64,
    pub pages_map_offset: u64,
    pub pages_map_id: u64,
    pub header2_offset: u64,
    pub pages_map_size_compressed: u64,
    pub pages_map_size_uncompressed: u64,
    pub pages_amount: u64,
    pub pages_max_id: u64,
    pub unknown_0x20: u64,
    pub unknown_0x40: u64,
    pub pages_map_crc_uncompressed: u64,
    pub unknown_0xf800: u64,
    pub unknown_4: u64,
    pub unknown_1: u64,
    /// Number of sections + 1
    pub sections_amount: u64,
    pub sections_map_crc_uncompressed: u64,
    pub sections_map_size_compressed: u64,
    pub sections_map2_id: u64,
    pub sections_map_id: u64,
    pub sections_map_size_uncompressed: u64,
    pub sections_map_crc_compressed: u64,
    pub sections_map_correction_factor: u64,
    pub sections_map_crc_seed: u64,
    pub stream_version: u64,
    pub crc_seed: u64,
    pub crc_seed_encoded: u64,
    pub random_seed: u64,
    pub header_crc: u64,
}

impl Default for Dwg21CompressedMetadata {
    fn default() -> Self {
        Self {
            header_size: ac21::HEADER_SIZE_MAGIC,
            file_size: 0,
            pages_map_crc_compressed: 0,
            pages_map_correction_factor: 0,
            pages_map_crc_seed: 0,
            pages_map2_offset: 0,
            pages_map2_id: 0,
            pages_map_offset: 0,
            pages_map_id: 0,
            header2_offset: 0,
            pages_map_size_compressed: 0,
            pages_map_size_uncompressed: 0,
            pages_amount: 0,
            pages_max_id: 0,
            unknown_0x20: 0x20,
            unknown_0x40: 0x40,
            pages_map_crc_uncompressed: 0,
            unknown_0xf800: 0xF800,
            unknown_4: 4,
            unknown_1: 1,
            sections_amount: 0,
            sections_map_crc_uncompressed: 0,
            sections_map_size_compressed: 0,
            sections_map2_id: 0,
            sections_map_id: 0,
            sections_map_size_uncompressed: 0,
            sections_map_crc_compressed: 0,
            sections_map_correction_factor: 0,
            sections_map_crc_seed: 0,
            stream_version: 0x60100,
            crc_seed: 0,
            crc_seed_encoded: 0,
            random_seed: 0,
            header_crc: 0,
        }
    }
}

impl Dwg21CompressedMetadata {
    /// Parse the decompressed metadata block.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ac21::DECOMPRESSED_HEADER_SIZE {
            return Err(DwgError::TruncatedStream {
                bit_position: 0,
                needed: ac21::DECOMPRESSED_HEADER_SIZE as u64 * 8,
                available: data.len() as u64 * 8,
            });
        }

        let mut c = Cursor::new(data);
        Ok(Self {
            header_size: c.read_u64::<LittleEndian>()?,
            file_size: c.read_u64::<LittleEndian>()?,
            pages_map_crc_compressed: c.read_u64::<LittleEndian>()?,
            pages_map_correction_factor: c.read_u64::<LittleEndian>()?,
            pages_map_crc_seed: c.read_u64::<LittleEndian>()?,
            pages_map2_offset: c.read_u64::<LittleEndian>()?,
            pages_map2_id: c.read_u64::<LittleEndian>()?,
            pages_map_offset: c.read_u64::<LittleEndian>()?,
            pages_map_id: c.read_u64::<LittleEndian>()?,
            header2_offset: c.read_u64::<LittleEndian>()?,
            pages_map_size_compressed: c.read_u64::<LittleEndian>()?,
            pages_map_size_uncompressed: c.read_u64::<LittleEndian>()?,
            pages_amount: c.read_u64::<LittleEndian>()?,
            pages_max_id: c.read_u64::<LittleEndian>()?,
            unknown_0x20: c.read_u64::<LittleEndian>()?,
            unknown_0x40: c.read_u64::<LittleEndian>()?,
            pages_map_crc_uncompressed: c.read_u64::<LittleEndian>()?,
            unknown_0xf800: c.read_u64::<LittleEndian>()?,
            unknown_4: c.read_u64::<LittleEndian>()?,
            unknown_1: c.read_u64::<LittleEndian>()?,
            sections_amount: c.read_u64::<LittleEndian>()?,
            sections_map_crc_uncompressed: c.read_u64::<LittleEndian>()?,
            sections_map_size_compressed: c.read_u64::<LittleEndian>()?,
            sections_map2_id: c.read_u64::<LittleEndian>()?,
            sections_map_id: c.read_u64::<LittleEndian>()?,
            sections_map_size_uncompressed: c.read_u64::<LittleEndian>()?,
            sections_map_crc_compressed: c.read_u64::<LittleEndian>()?,
            sections_map_correction_factor: c.read_u64::<LittleEndian>()?,
            sections_map_crc_seed: c.read_u64::<LittleEndian>()?,
            stream_version: c.read_u64::<LittleEndian>()?,
            crc_seed: c.read_u64::<LittleEndian>()?,
            crc_seed_encoded: c.read_u64::<LittleEndian>()?,
            random_seed: c.read_u64::<LittleEndian>()?,
            header_crc: c.read_u64::<LittleEndian>()?,
        })
    }

    /// File offset of the primary page map.
    pub fn pages_map_address(&self) -> u64 {
        self.pages_map_offset
            .saturating_add(ac21::DATA_PAGE_BASE_OFFSET)
    }

    /// Little-endian layout, the inverse of [`parse`](Self::parse).
    pub fn to_bytes(&self) -> Vec<u8> {
        [
            self.header_size,
            self.file_size,
            self.pages_map_crc_compressed,
            self.pages_map_correction_factor,
            self.pages_map_crc_seed,
            self.pages_map2_offset,
            self.pages_map2_id,
            self.pages_map_offset,
            self.pages_map_id,
            self.header2_offset,
            self.pages_map_size_compressed,
            self.pages_map_size_uncompressed,
            self.pages_amount,
            self.pages_max_id,
            self.unknown_0x20,
            self.unknown_0x40,
            self.pages_map_crc_uncompressed,
            self.unknown_0xf800,
            self.unknown_4,
            self.unknown_1,
            self.sections_amount,
            self.sections_map_crc_uncompressed,
            self.sections_map_size_compressed,
            self.sections_map2_id,
            self.sections_map_id,
            self.sections_map_size_uncompressed,
            self.sections_map_crc_compressed,
            self.sections_map_correction_factor,
            self.sections_map_crc_seed,
            self.stream_version,
            self.crc_seed,
            self.crc_seed_encoded,
            self.random_seed,
            self.header_crc,
        ]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order() {
        let mut raw = vec![0u8; ac21::DECOMPRESSED_HEADER_SIZE];
        raw[0] = 0x70;
        // pages_map_offset is the 8th field, sections_map_id the 25th
        raw[7 * 8] = 0x40;
        raw[24 * 8] = 0x05;
        raw[33 * 8] = 0xAA;
        let meta = Dwg21CompressedMetadata::parse(&raw).unwrap();
        assert_eq!(meta.header_size, 0x70);
        assert_eq!(meta.pages_map_offset, 0x40);
        assert_eq!(meta.pages_map_address(), 0x4C0);
        assert_eq!(meta.sections_map_id, 5);
        assert_eq!(meta.header_crc, 0xAA);
    }

    #[test]
    fn test_bytes_match_parse() {
        let mut meta = Dwg21CompressedMetadata::default();
        meta.pages_max_id = 9;
        meta.sections_map_correction_factor = 3;
        let bytes = meta.to_bytes();
        assert_eq!(bytes.len(), ac21::DECOMPRESSED_HEADER_SIZE);
        assert_eq!(Dwg21CompressedMetadata::parse(&bytes).unwrap(), meta);
    }

    #[test]
    fn test_short_block_is_truncated() {
        let err = Dwg21CompressedMetadata::parse(&[0u8; 0x40]).unwrap_err();
        assert!(matches!(err, DwgError::TruncatedStream { .. }));
    }
}
