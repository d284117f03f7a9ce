//! Obfuscation layers of the R18 container.
//!
//! 1. **LCG XOR stream**: the 0x6C-byte file header block at 0x80 is XORed
//!    with the high bytes of a linear congruential generator seeded with 1.
//! 2. **Position-based XOR mask**: every data page header (8 × u32) is
//!    XORed with `0x4164536B ^ page_file_offset`.
//!
//! Both are involutions, so the same routine encrypts and decrypts.

use super::checksum::page_checksum;
use super::constants::ac18;

/// XOR `data` in place with the R18 file header key stream.
pub fn xor_file_header(data: &mut [u8]) {
    let mut seed: u32 = 1;
    for byte in data.iter_mut() {
        seed = seed.wrapping_mul(0x343FD).wrapping_add(0x269EC3);
        *byte ^= (seed >> 16) as u8;
    }
}

/// Decrypted R18 data page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataPageHeader {
    /// Should be `0x4163043B`
    pub page_type: u32,
    pub section_number: u32,
    pub compressed_size: u32,
    pub page_size: u32,
    /// Start offset of the page within the decompressed section
    pub start_offset: u32,
    /// Checksum of this header (checksum field zeroed), seeded with `data_checksum`
    pub header_checksum: u32,
    /// Checksum of the compressed payload, seed 0
    pub data_checksum: u32,
    pub unknown: u32,
}

impl DataPageHeader {
    pub const SIZE: usize = 32;

    fn fields(&self) -> [u32; 8] {
        [
            self.page_type,
            self.section_number,
            self.compressed_size,
            self.page_size,
            self.start_offset,
            self.header_checksum,
            self.data_checksum,
            self.unknown,
        ]
    }

    fn from_fields(f: [u32; 8]) -> Self {
        Self {
            page_type: f[0],
            section_number: f[1],
            compressed_size: f[2],
            page_size: f[3],
            start_offset: f[4],
            header_checksum: f[5],
            data_checksum: f[6],
            unknown: f[7],
        }
    }

    /// Plain little-endian layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        for (slot, value) in out.chunks_exact_mut(4).zip(self.fields()) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Header checksum as the writer computes it.
    pub fn compute_header_checksum(&self) -> u32 {
        let mut zeroed = *self;
        zeroed.header_checksum = 0;
        page_checksum(self.data_checksum, &zeroed.to_bytes())
    }

    pub fn is_data_page(&self) -> bool {
        self.page_type == ac18::PAGE_TYPE_DATA
    }
}

fn page_mask(file_offset: u64) -> u32 {
    ac18::DECRYPTION_MASK ^ (file_offset as u32)
}

/// Decrypt a data page header read at `file_offset`.
pub fn decrypt_page_header(data: &[u8; DataPageHeader::SIZE], file_offset: u64) -> DataPageHeader {
    let mask = page_mask(file_offset);
    let mut fields = [0u32; 8];
    for (field, raw) in fields.iter_mut().zip(data.chunks_exact(4)) {
        *field = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) ^ mask;
    }
    DataPageHeader::from_fields(fields)
}

/// Encrypt a data page header for storage at `file_offset`.
pub fn encrypt_page_header(
    header: &DataPageHeader,
    file_offset: u64,
) -> [u8; DataPageHeader::SIZE] {
    let mask = page_mask(file_offset);
    let mut out = [0u8; DataPageHeader::SIZE];
    for (slot, value) in out.chunks_exact_mut(4).zip(header.fields()) {
        slot.copy_from_slice(&(value ^ mask).to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataPageHeader {
        DataPageHeader {
            page_type: ac18::PAGE_TYPE_DATA,
            section_number: 1,
            compressed_size: 0x7000,
            page_size: 0x7400,
            start_offset: 0,
            header_checksum: 0x12345678,
            data_checksum: 0xABCDEF00,
            unknown: 0,
        }
    }

    #[test]
    fn test_page_header_mask_depends_on_offset() {
        let header = sample();
        let enc1 = encrypt_page_header(&header, 0x100);
        let enc2 = encrypt_page_header(&header, 0x480);
        assert_ne!(enc1, enc2);
        assert_eq!(decrypt_page_header(&enc1, 0x100), header);
        assert_eq!(decrypt_page_header(&enc2, 0x480), header);
        assert_ne!(decrypt_page_header(&enc1, 0x480), header);
    }

    #[test]
    fn test_first_word_of_encrypted_header() {
        let enc = encrypt_page_header(&sample(), 0);
        let word = u32::from_le_bytes([enc[0], enc[1], enc[2], enc[3]]);
        assert_eq!(word, ac18::PAGE_TYPE_DATA ^ ac18::DECRYPTION_MASK);
    }

    #[test]
    fn test_header_checksum_ignores_stored_value() {
        let mut a = sample();
        let mut b = sample();
        a.header_checksum = 1;
        b.header_checksum = 2;
        assert_eq!(a.compute_header_checksum(), b.compute_header_checksum());
    }

    #[test]
    fn test_file_header_key_stream() {
        // First key bytes of the seed-1 generator
        let mut data = [0u8; 4];
        xor_file_header(&mut data);
        assert_eq!(data, [0x29, 0x23, 0xBE, 0x84]);

        xor_file_header(&mut data);
        assert_eq!(data, [0u8; 4]);
    }
}
