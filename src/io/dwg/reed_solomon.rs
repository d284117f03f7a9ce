//! Reed-Solomon block de-interleaving for R21 files.
//!
//! R21 pages are stored as 255-byte Reed-Solomon codewords whose bytes are
//! interleaved across `block_count` blocks. Only the data bytes (the first
//! `k` of each codeword) are recovered here; the parity bytes are not used
//! for error correction.

use crate::error::{DwgError, Result};

/// Codeword length
pub const CODEWORD_SIZE: usize = 255;
/// Data bytes per codeword in system pages and the file header
pub const SYSTEM_DATA_SIZE: usize = 239;
/// Data bytes per codeword in data pages
pub const PAGE_DATA_SIZE: usize = 251;

/// How a page's codewords are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Stored as-is (encoding value 1)
    Plain,
    /// Interleaved codewords (encoding value 4)
    Interleaved,
}

impl Encoding {
    pub fn from_raw(value: u64) -> Result<Self> {
        match value {
            1 => Ok(Encoding::Plain),
            4 => Ok(Encoding::Interleaved),
            other => Err(DwgError::InvalidFormat(format!(
                "unknown Reed-Solomon encoding {}",
                other
            ))),
        }
    }
}

/// Recover `k * block_count` data bytes from an interleaved buffer.
///
/// Data byte `i` of block `b` lives at `encoded[b + i * block_count]`.
pub fn deinterleave(encoded: &[u8], block_count: usize, k: usize) -> Result<Vec<u8>> {
    let needed = needed_bytes(encoded, block_count, k)?;
    let mut out = Vec::with_capacity(needed);
    for block in 0..block_count {
        out.extend((0..k).map(|i| encoded[block + i * block_count]));
    }
    Ok(out)
}

/// Decode a page buffer according to its encoding.
pub fn decode(encoded: &[u8], block_count: usize, k: usize, encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Interleaved => deinterleave(encoded, block_count, k),
        Encoding::Plain => {
            let needed = needed_bytes(encoded, block_count, k)?;
            Ok(encoded[..needed].to_vec())
        }
    }
}

/// `k * block_count`, provided `encoded` holds that many bytes.
fn needed_bytes(encoded: &[u8], block_count: usize, k: usize) -> Result<usize> {
    match k.checked_mul(block_count) {
        Some(needed) if needed <= encoded.len() => Ok(needed),
        needed => Err(DwgError::TruncatedStream {
            bit_position: 0,
            needed: needed.map_or(u64::MAX, |n| (n as u64).saturating_mul(8)),
            available: encoded.len() as u64 * 8,
        }),
    }
}

/// Interleave `data` into `block_count` codewords with zeroed parity bytes.
///
/// Inverse of [`deinterleave`]; used to build R21 fixtures.
pub fn interleave(data: &[u8], block_count: usize, k: usize) -> Vec<u8> {
    let mut encoded = vec![0u8; CODEWORD_SIZE * block_count];
    for (index, &byte) in data.iter().enumerate().take(k * block_count) {
        let block = index / k;
        let i = index % k;
        encoded[block + i * block_count] = byte;
    }
    encoded
}

/// Size on disk and block count of a system page.
///
/// The compressed size is padded to 8 bytes, multiplied by the correction
/// factor, split into 239-byte blocks and the codewords padded to 0x20.
pub fn system_page_layout(compressed_size: u64, correction_factor: u64) -> (usize, usize) {
    let padded = (compressed_size + 7) & !7;
    let pre_encoded = padded.saturating_mul(correction_factor) as usize;
    let block_count = pre_encoded.div_ceil(SYSTEM_DATA_SIZE);
    let page_size = (block_count * CODEWORD_SIZE + 0x1F) & !0x1F;
    (page_size, block_count)
}

/// Block count of a data page holding `compressed_size` bytes.
pub fn data_page_block_count(compressed_size: u64) -> usize {
    (compressed_size as usize).div_ceil(PAGE_DATA_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_roundtrip_header_shape() {
        let data: Vec<u8> = (0..3 * SYSTEM_DATA_SIZE).map(|i| (i % 256) as u8).collect();
        let encoded = interleave(&data, 3, SYSTEM_DATA_SIZE);
        assert_eq!(encoded.len(), 3 * CODEWORD_SIZE);
        assert_eq!(deinterleave(&encoded, 3, SYSTEM_DATA_SIZE).unwrap(), data);
    }

    #[test]
    fn test_deinterleave_layout() {
        // Two blocks of three data bytes: a0 b0 a1 b1 a2 b2
        let encoded = [10, 20, 11, 21, 12, 22];
        assert_eq!(
            deinterleave(&encoded, 2, 3).unwrap(),
            vec![10, 11, 12, 20, 21, 22]
        );
    }

    #[test]
    fn test_short_buffer_is_truncated() {
        let err = deinterleave(&[0u8; 10], 2, 6).unwrap_err();
        assert!(matches!(err, DwgError::TruncatedStream { .. }));
    }

    #[test]
    fn test_overflowing_block_count_is_truncated() {
        let err = deinterleave(&[0u8; 10], usize::MAX, PAGE_DATA_SIZE).unwrap_err();
        assert!(matches!(err, DwgError::TruncatedStream { needed: u64::MAX, .. }));
        let err = decode(&[0u8; 10], usize::MAX / 2, 4, Encoding::Plain).unwrap_err();
        assert!(matches!(err, DwgError::TruncatedStream { .. }));
    }

    #[test]
    fn test_plain_and_unknown_encoding() {
        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(decode(&data, 1, 4, Encoding::Plain).unwrap(), vec![1, 2, 3, 4]);
        assert!(Encoding::from_raw(2).is_err());
        assert_eq!(Encoding::from_raw(4).unwrap(), Encoding::Interleaved);
    }

    #[test]
    fn test_system_page_layout() {
        // 100 -> 104 padded, * 3 = 312 -> 2 blocks -> 510 -> 512
        assert_eq!(system_page_layout(100, 3), (512, 2));
        assert_eq!(data_page_block_count(251), 1);
        assert_eq!(data_page_block_count(252), 2);
    }
}
