//! Bit cursor over a borrowed byte view.
//!
//! [`BitReader`] is the only component that touches individual bits. It
//! borrows the session buffer (or a decoded section payload), keeps an
//! absolute bit position and implements every primitive DWG encoding on
//! top of [`read_bits`](BitReader::read_bits). It holds no interpretation
//! logic; section readers decide what the values mean.

use encoding_rs::Encoding;

use crate::error::{DwgError, Result};
use crate::types::{DwgVersion, HandleReference};

use super::stream_reader::DwgStreamReader;

/// Longest accepted unsigned or signed modular char, in bytes.
pub const MAX_MODULAR_CHAR_BYTES: usize = 5;
/// Longest accepted modular short, in 2-byte groups.
pub const MAX_MODULAR_SHORT_GROUPS: usize = 4;
/// Longest handle value, in bytes.
pub const MAX_HANDLE_BYTES: usize = 8;

/// Bit-granular cursor over `&'a [u8]`.
///
/// Bits are consumed most significant first. Cloning a reader is cheap and
/// is how R21 sub-streams (text, handles) are created over the same bytes.
#[derive(Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: u64,
    version: DwgVersion,
    encoding: &'static Encoding,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], version: DwgVersion) -> Self {
        Self {
            data,
            position: 0,
            version,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    /// Create a reader positioned at `bit_position`.
    pub fn at(data: &'a [u8], version: DwgVersion, bit_position: u64) -> Self {
        let mut reader = Self::new(data, version);
        reader.position = bit_position;
        reader
    }

    /// Set the code page used by 8-bit text.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn version(&self) -> DwgVersion {
        self.version
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    // ---------------------------------------------------------------
    // Position
    // ---------------------------------------------------------------

    pub fn position_in_bits(&self) -> u64 {
        self.position
    }

    pub fn set_position_in_bits(&mut self, position: u64) {
        self.position = position;
    }

    /// Byte containing the next bit.
    pub fn byte_position(&self) -> u64 {
        self.position >> 3
    }

    pub fn set_byte_position(&mut self, position: u64) {
        self.position = position << 3;
    }

    pub fn len_bits(&self) -> u64 {
        self.data.len() as u64 * 8
    }

    pub fn remaining_bits(&self) -> u64 {
        self.len_bits().saturating_sub(self.position)
    }

    pub fn is_aligned(&self) -> bool {
        self.position & 7 == 0
    }

    /// Discard the rest of the current byte.
    pub fn align_to_byte(&mut self) {
        self.position = (self.position + 7) & !7;
    }

    fn ensure(&self, needed: u64) -> Result<()> {
        let available = self.remaining_bits();
        if needed > available {
            return Err(DwgError::TruncatedStream {
                bit_position: self.position,
                needed,
                available,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Cursor primitives
    // ---------------------------------------------------------------

    /// Read the next `count` bits (1 to 32) as an unsigned integer.
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        if count == 0 || count > 32 {
            return Err(DwgError::InvalidFormat(format!(
                "cannot read {} bits at once",
                count
            )));
        }
        self.ensure(count as u64)?;

        let mut value: u64 = 0;
        let mut remaining = count;
        while remaining > 0 {
            let byte = self.data[(self.position >> 3) as usize];
            let offset = (self.position & 7) as u32;
            let available = 8 - offset;
            let take = available.min(remaining);
            let bits = (byte as u32 >> (available - take)) & ((1u32 << take) - 1);
            value = (value << take) | bits as u64;
            self.position += take as u64;
            remaining -= take;
        }
        Ok(value as u32)
    }

    /// Byte-granular read; the cursor must sit on a byte boundary.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if !self.is_aligned() {
            return Err(DwgError::UnalignedRead {
                bit_position: self.position,
            });
        }
        self.ensure(count as u64 * 8)?;
        let start = (self.position >> 3) as usize;
        self.position += count as u64 * 8;
        Ok(&self.data[start..start + count])
    }

    /// Read `count` bytes at any bit offset.
    pub fn read_shifted_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if self.is_aligned() {
            return self.read_bytes(count).map(<[u8]>::to_vec);
        }
        self.ensure(count as u64 * 8)?;
        (0..count).map(|_| self.read_bits(8).map(|b| b as u8)).collect()
    }

    /// Advance without interpreting, clamped to the end of the data.
    pub fn skip_bits(&mut self, count: u64) -> Result<()> {
        self.ensure(count)?;
        self.position += count;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Variable-length integers
    // ---------------------------------------------------------------

    /// Unsigned modular char (MC): 7 payload bits per byte, high bit set
    /// while more bytes follow. At most five bytes are accepted.
    pub fn read_var_int(&mut self) -> Result<u64> {
        let start = self.byte_position();
        let mut value = 0u64;
        for index in 0..MAX_MODULAR_CHAR_BYTES {
            let byte = self.read_raw_char()?;
            value |= ((byte & 0b0111_1111) as u64) << (7 * index);
            if byte & 0b1000_0000 == 0 {
                return Ok(value);
            }
        }
        Err(DwgError::MalformedVarInt { position: start })
    }

    /// Signed modular char: the final byte keeps six payload bits and uses
    /// 0x40 as the sign.
    pub fn read_signed_var_int(&mut self) -> Result<i64> {
        let start = self.byte_position();
        let mut sum = 0i64;
        for index in 0..MAX_MODULAR_CHAR_BYTES {
            let byte = self.read_raw_char()?;
            let shift = 7 * index;
            if byte & 0b1000_0000 != 0 {
                sum |= ((byte & 0b0111_1111) as i64) << shift;
                continue;
            }
            let value = sum | (((byte & 0b0011_1111) as i64) << shift);
            return Ok(if byte & 0b0100_0000 != 0 { -value } else { value });
        }
        Err(DwgError::MalformedVarInt { position: start })
    }

    /// Modular short (MS): little-endian 2-byte groups, 15 payload bits
    /// each, 0x8000 set while more groups follow.
    pub fn read_modular_short(&mut self) -> Result<u64> {
        let start = self.byte_position();
        let mut value = 0u64;
        for index in 0..MAX_MODULAR_SHORT_GROUPS {
            let lo = self.read_raw_char()? as u64;
            let hi = self.read_raw_char()?;
            value |= (lo | (((hi & 0x7F) as u64) << 8)) << (15 * index);
            if hi & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DwgError::MalformedVarInt { position: start })
    }

    /// Bit triplet (3B): up to three bits, stopping at the first zero.
    pub fn read_3b(&mut self) -> Result<u8> {
        let mut value = 0u8;
        for _ in 0..3 {
            let bit = self.read_bit()?;
            value = (value << 1) | bit as u8;
            if !bit {
                break;
            }
        }
        Ok(value)
    }

    // ---------------------------------------------------------------
    // Text and markers
    // ---------------------------------------------------------------

    /// TU: BS character count followed by UTF-16LE code units.
    pub fn read_unicode_text(&mut self) -> Result<String> {
        let length = self.read_text_length()?;
        let bytes = self.read_shifted_bytes(length * 2)?;
        Ok(decode_text(&bytes, encoding_rs::UTF_16LE))
    }

    fn read_text_length(&mut self) -> Result<usize> {
        let position = self.position;
        let length = DwgStreamReader::read_bit_short(self)?;
        if length < 0 {
            return Err(DwgError::InvalidFormat(format!(
                "negative text length {} at bit {}",
                length, position
            )));
        }
        Ok(length as usize)
    }

    /// 16-byte sentinel.
    pub fn read_sentinel(&mut self) -> Result<[u8; 16]> {
        let bytes = self.read_shifted_bytes(16)?;
        let mut sentinel = [0u8; 16];
        sentinel.copy_from_slice(&bytes);
        Ok(sentinel)
    }

    /// Read a sentinel and fail with [`DwgError::InvalidSentinel`] on mismatch.
    pub fn expect_sentinel(&mut self, expected: &[u8; 16], what: &str) -> Result<()> {
        let position = self.position;
        let found = self.read_sentinel()?;
        if &found != expected {
            return Err(DwgError::InvalidSentinel(format!(
                "{} at bit {}: {:02X?}",
                what, position, found
            )));
        }
        Ok(())
    }

    /// Locate the R21 string stream of an object or section.
    ///
    /// `position` is the bit holding the "has strings" flag. When it is set
    /// the 16 bits before it hold the stream size in bits (with an optional
    /// high part 16 bits further back) and the stream ends where the size
    /// field starts. Returns the start of the string stream and leaves the
    /// cursor there, or `None` when the object has no strings.
    pub fn set_position_by_flag(&mut self, position: u64) -> Result<Option<u64>> {
        self.position = position;
        if !self.read_bit()? {
            return Ok(None);
        }

        let underflow = || {
            DwgError::InvalidFormat(format!("string stream flag at bit {} underflows", position))
        };

        let mut end = position.checked_sub(16).ok_or_else(underflow)?;
        self.position = end;
        let mut size = self.read_raw_short()? as u16 as u64;
        if size & 0x8000 != 0 {
            end = end.checked_sub(16).ok_or_else(underflow)?;
            self.position = end;
            size &= 0x7FFF;
            let hi = self.read_raw_short()? as u16 as u64;
            size += hi << 15;
        }

        let start = end.checked_sub(size).ok_or_else(underflow)?;
        self.position = start;
        Ok(Some(start))
    }
}

impl DwgStreamReader for BitReader<'_> {
    fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    fn read_2bits(&mut self) -> Result<u8> {
        Ok(self.read_bits(2)? as u8)
    }

    fn read_raw_char(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    fn read_raw_short(&mut self) -> Result<i16> {
        let lo = self.read_raw_char()?;
        let hi = self.read_raw_char()?;
        Ok(i16::from_le_bytes([lo, hi]))
    }

    fn read_raw_long(&mut self) -> Result<i32> {
        let bytes = self.read_shifted_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_raw_double(&mut self) -> Result<f64> {
        let bytes = self.read_shifted_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&bytes);
        Ok(f64::from_le_bytes(arr))
    }

    fn read_bit_short(&mut self) -> Result<i16> {
        match self.read_2bits()? {
            // 00: A short (2 bytes) follows, little-endian order (LSB first)
            0 => self.read_raw_short(),
            // 01: An unsigned char (1 byte) follows
            1 => Ok(self.read_raw_char()? as i16),
            // 10: 0
            2 => Ok(0),
            // 11: 256
            _ => Ok(256),
        }
    }

    fn read_bit_long(&mut self) -> Result<i32> {
        let position = self.position;
        match self.read_2bits()? {
            0 => self.read_raw_long(),
            1 => Ok(self.read_raw_char()? as i32),
            2 => Ok(0),
            _ => Err(DwgError::InvalidFormat(format!(
                "BitLong code 11 at bit {}",
                position
            ))),
        }
    }

    fn read_bit_long_long(&mut self) -> Result<u64> {
        let size = self.read_bits(3)?;
        let mut value = 0u64;
        for index in 0..size {
            value |= (self.read_raw_char()? as u64) << (index * 8);
        }
        Ok(value)
    }

    fn read_bit_double(&mut self) -> Result<f64> {
        let position = self.position;
        match self.read_2bits()? {
            0 => self.read_raw_double(),
            1 => Ok(1.0),
            2 => Ok(0.0),
            _ => Err(DwgError::InvalidFormat(format!(
                "BitDouble code 11 at bit {}",
                position
            ))),
        }
    }

    fn read_handle(&mut self) -> Result<HandleReference> {
        // |CODE (4 bits)|COUNTER (4 bits)|HANDLE or OFFSET|
        let position = self.position;
        let form = self.read_raw_char()?;
        let code = form >> 4;
        let counter = (form & 0x0F) as usize;
        if counter > MAX_HANDLE_BYTES {
            return Err(DwgError::InvalidFormat(format!(
                "handle with {} value bytes at bit {}",
                counter, position
            )));
        }

        // Big-endian value bytes
        let mut value = 0u64;
        for _ in 0..counter {
            value = (value << 8) | self.read_raw_char()? as u64;
        }
        Ok(HandleReference::new(code, value))
    }

    fn read_variable_text(&mut self) -> Result<String> {
        if self.version.is_unicode() {
            return self.read_unicode_text();
        }
        let length = self.read_text_length()?;
        if length == 0 {
            return Ok(String::new());
        }
        let bytes = self.read_shifted_bytes(length)?;
        Ok(decode_text(&bytes, self.encoding))
    }
}

/// Decode stored text and drop embedded NULs.
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.replace('\0', "")
}

/// Map a DWG code page number to an encoding.
pub fn encoding_from_code_page(code_page: u16) -> &'static Encoding {
    match code_page {
        0x00 | 0x01 | 0x1E => encoding_rs::WINDOWS_1252,
        0x02 => encoding_rs::WINDOWS_1250, // Central European
        0x03 => encoding_rs::WINDOWS_1251, // Cyrillic
        0x04 => encoding_rs::WINDOWS_1253, // Greek
        0x05 => encoding_rs::WINDOWS_1254, // Turkish
        0x06 => encoding_rs::WINDOWS_1255, // Hebrew
        0x07 => encoding_rs::WINDOWS_1256, // Arabic
        0x08 => encoding_rs::WINDOWS_1257, // Baltic
        0x0A => encoding_rs::WINDOWS_874,  // Thai
        0x0B => encoding_rs::SHIFT_JIS,    // Japanese
        0x0C => encoding_rs::GBK,          // Simplified Chinese
        0x0D => encoding_rs::EUC_KR,       // Korean
        0x0E => encoding_rs::BIG5,         // Traditional Chinese
        _ => encoding_rs::WINDOWS_1252,
    }
}
