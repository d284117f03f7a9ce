//! Merged stream reader for R21 (AC1021).
//!
//! From R21 on, a section or object record is split into up to three
//! streams over the same bytes:
//! - **Main data**: bits, numbers, colours
//! - **String data**: all text values, located through the string stream flag
//! - **Handle data**: all handle references
//!
//! [`MergedReader`] routes each primitive to the stream that holds it so the
//! section readers can walk their variables once for both revisions.

use crate::error::Result;
use crate::types::HandleReference;

use super::bit_reader::BitReader;
use super::stream_reader::DwgStreamReader;

pub struct MergedReader<'a> {
    main: BitReader<'a>,
    /// `None` when the record carries no string stream; text reads are empty.
    text: Option<BitReader<'a>>,
    handles: Option<BitReader<'a>>,
}

impl<'a> MergedReader<'a> {
    /// `handles == None` keeps handle reads on the main stream.
    pub fn new(
        main: BitReader<'a>,
        text: Option<BitReader<'a>>,
        handles: Option<BitReader<'a>>,
    ) -> Self {
        Self {
            main,
            text,
            handles,
        }
    }

    pub fn main(&self) -> &BitReader<'a> {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut BitReader<'a> {
        &mut self.main
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}

impl DwgStreamReader for MergedReader<'_> {
    fn read_bit(&mut self) -> Result<bool> {
        self.main.read_bit()
    }

    fn read_2bits(&mut self) -> Result<u8> {
        self.main.read_2bits()
    }

    fn read_raw_char(&mut self) -> Result<u8> {
        self.main.read_raw_char()
    }

    fn read_raw_short(&mut self) -> Result<i16> {
        self.main.read_raw_short()
    }

    fn read_raw_long(&mut self) -> Result<i32> {
        self.main.read_raw_long()
    }

    fn read_raw_double(&mut self) -> Result<f64> {
        self.main.read_raw_double()
    }

    fn read_bit_short(&mut self) -> Result<i16> {
        self.main.read_bit_short()
    }

    fn read_bit_long(&mut self) -> Result<i32> {
        self.main.read_bit_long()
    }

    fn read_bit_long_long(&mut self) -> Result<u64> {
        self.main.read_bit_long_long()
    }

    fn read_bit_double(&mut self) -> Result<f64> {
        self.main.read_bit_double()
    }

    fn read_handle(&mut self) -> Result<HandleReference> {
        match self.handles.as_mut() {
            Some(handles) => handles.read_handle(),
            None => self.main.read_handle(),
        }
    }

    fn read_variable_text(&mut self) -> Result<String> {
        match self.text.as_mut() {
            Some(text) => text.read_unicode_text(),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DwgVersion;

    #[test]
    fn test_routes_text_and_handles() {
        // main: BS 01 + 0x07 (10 bits), text at byte 2: TU "A", handles at byte 6
        let data = [
            0x41, 0xC0, // main
            0x40, 0x50, 0x40, 0x00, // text: BS 01 + 1, then 'A' 0 (shifted by 2 bits)
            0x51, 0x2A, // handle 5.1 -> 0x2A
        ];
        let main = BitReader::new(&data, DwgVersion::R21);
        let text = BitReader::at(&data, DwgVersion::R21, 16);
        let handles = BitReader::at(&data, DwgVersion::R21, 48);
        let mut merged = MergedReader::new(main, Some(text), Some(handles));

        assert_eq!(merged.read_bit_short().unwrap(), 7);
        assert_eq!(merged.read_variable_text().unwrap(), "A");
        assert_eq!(merged.read_handle().unwrap(), HandleReference::new(5, 0x2A));
        assert_eq!(merged.main().position_in_bits(), 10);
    }

    #[test]
    fn test_missing_string_stream_reads_empty() {
        let data = [0u8; 4];
        let mut merged = MergedReader::new(BitReader::new(&data, DwgVersion::R21), None, None);
        assert!(!merged.has_text());
        assert_eq!(merged.read_variable_text().unwrap(), "");
        assert_eq!(merged.main().position_in_bits(), 0);
    }
}
