//! LZ77 AC18 decompression.
//!
//! The LZ77 variant used by R18 data and system pages. Every read from the
//! compressed stream and every back-reference is bounds-checked so a
//! corrupted page yields [`DwgError::Decompression`] instead of a panic.

use super::{copy_back, output_buffer, push_literals, Input};
use crate::error::{DwgError, Result};

/// Decompress `source` into at most `decompressed_size` bytes.
///
/// The stream ends at opcode 0x11. Output may be shorter than
/// `decompressed_size`; the caller decides whether that is acceptable.
pub fn decompress(source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut src = Input::new(source);
    let mut out = output_buffer(decompressed_size);

    let mut opcode = src.byte()?;
    if opcode & 0xF0 == 0 {
        let count = literal_count(opcode, &mut src)? + 3;
        push_literals(&mut out, src.take(count)?, decompressed_size)?;
        opcode = src.byte()?;
    }

    while opcode != 0x11 {
        let (count, offset, literal_bits) = match opcode {
            0x00..=0x0F => {
                return Err(DwgError::Decompression(format!(
                    "literal opcode {:#04X} in match position at byte {}",
                    opcode,
                    src.position() - 1
                )))
            }
            0x10..=0x1F => {
                let count = match_length(opcode, 0x07, &mut src)?;
                let (low, first) = two_byte_offset(&mut src)?;
                let offset = (((opcode & 0x08) as usize) << 11) + low + 0x4000;
                (count, offset, first & 0x03)
            }
            0x20..=0x3F => {
                let count = match_length(opcode, 0x1F, &mut src)?;
                let (low, first) = two_byte_offset(&mut src)?;
                (count, low + 1, first & 0x03)
            }
            _ => {
                let count = (opcode >> 4) as usize - 1;
                let next = src.byte()?;
                let offset = ((((opcode >> 2) & 0x03) as usize) | ((next as usize) << 2)) + 1;
                (count, offset, opcode & 0x03)
            }
        };

        copy_back(&mut out, offset, count, decompressed_size)?;

        let mut literals = literal_bits as usize;
        if literals == 0 {
            opcode = src.byte()?;
            if opcode & 0xF0 == 0 {
                literals = literal_count(opcode, &mut src)? + 3;
            }
        }
        if literals > 0 {
            push_literals(&mut out, src.take(literals)?, decompressed_size)?;
            opcode = src.byte()?;
        }
    }

    Ok(out)
}

/// Literal run length from the low nibble, extended by zero bytes.
fn literal_count(code: u8, src: &mut Input<'_>) -> Result<usize> {
    let mut count = (code & 0x0F) as usize;
    if count == 0 {
        let mut last = src.byte()?;
        while last == 0 {
            count += 0xFF;
            last = src.byte()?;
        }
        count += 0x0F + last as usize;
    }
    Ok(count)
}

/// Match length from the opcode bits, extended by zero bytes.
fn match_length(opcode: u8, valid_bits: u8, src: &mut Input<'_>) -> Result<usize> {
    let mut count = (opcode & valid_bits) as usize;
    if count == 0 {
        let mut last = src.byte()?;
        while last == 0 {
            count += 0xFF;
            last = src.byte()?;
        }
        count += last as usize + valid_bits as usize;
    }
    Ok(count + 2)
}

/// Two-byte offset; the first byte's low two bits carry the literal count.
fn two_byte_offset(src: &mut Input<'_>) -> Result<(usize, u8)> {
    let first = src.byte()?;
    let second = src.byte()?;
    let offset = ((first as usize) >> 2) | ((second as usize) << 6);
    Ok((offset, first))
}

/// Encode `data` as a single literal run, the stored form of an
/// incompressible page. `data` must hold at least 4 bytes.
#[cfg(test)]
pub(crate) fn literal_stream(data: &[u8]) -> Vec<u8> {
    let n = data.len();
    assert!(n >= 4, "a leading literal run holds at least 4 bytes");
    let mut out = Vec::with_capacity(n + 8);
    if n <= 18 {
        out.push((n - 3) as u8);
    } else {
        out.push(0);
        let mut rest = n - 18;
        while rest > 0xFF {
            out.push(0);
            rest -= 0xFF;
        }
        out.push(rest as u8);
    }
    out.extend_from_slice(data);
    out.push(0x11);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_stream_lengths() {
        for n in [4usize, 18, 19, 273, 274, 600] {
            let data: Vec<u8> = (0..n).map(|i| (i * 7) as u8).collect();
            assert_eq!(decompress(&literal_stream(&data), n).unwrap(), data, "n = {}", n);
        }
    }

    #[test]
    fn test_literal_then_match() {
        let src = [0x01, b'a', b'b', b'c', b'd', 0x40, 0x00, 0x11];
        assert_eq!(decompress(&src, 16).unwrap(), b"abcdddd".to_vec());
    }

    #[test]
    fn test_long_literal_run() {
        // 0x00 0x05 -> 0x0F + 5 + 3 = 23 literal bytes
        let payload: Vec<u8> = (0..23u8).collect();
        let mut src = vec![0x00, 0x05];
        src.extend_from_slice(&payload);
        src.push(0x11);
        assert_eq!(decompress(&src, 64).unwrap(), payload);
    }

    #[test]
    fn test_match_with_two_byte_offset() {
        // literal "xyzw", then opcode 0x22 (4 bytes, offset (0x0C>>2)+1 = 4)
        // first offset byte 0x0C carries zero literals, then terminator
        let src = [0x01, b'x', b'y', b'z', b'w', 0x22, 0x0C, 0x00, 0x11];
        assert_eq!(decompress(&src, 16).unwrap(), b"xyzwxyzw".to_vec());
    }

    #[test]
    fn test_offset_before_start_is_error() {
        let src = [0x01, b'a', b'b', b'c', b'd', 0x40, 0x10, 0x11];
        assert!(matches!(decompress(&src, 64), Err(DwgError::Decompression(_))));
    }

    #[test]
    fn test_truncated_stream_is_error() {
        let src = [0x05, b'a', b'b'];
        assert!(matches!(decompress(&src, 64), Err(DwgError::Decompression(_))));
    }

    #[test]
    fn test_output_limit() {
        let src = [0x01, b'a', b'b', b'c', b'd', 0x11];
        assert!(matches!(decompress(&src, 3), Err(DwgError::Decompression(_))));
    }
}
