//! Bit-level writer used to build section and object fixtures in tests.
//!
//! Encodes the same primitives [`BitReader`](super::bit_reader::BitReader)
//! decodes, MSB first within each byte.

pub(crate) struct BitWriter {
    data: Vec<u8>,
    position: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            position: 0,
        }
    }

    pub fn position_in_bits(&self) -> u64 {
        self.position
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bits(&mut self, value: u64, count: u32) {
        for index in (0..count).rev() {
            let bit = (value >> index) & 1 == 1;
            self.write_bit(bit);
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        let byte = (self.position >> 3) as usize;
        if byte == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte] |= 0x80 >> (self.position & 7);
        }
        self.position += 1;
    }

    pub fn write_2bits(&mut self, value: u8) {
        self.write_bits(value as u64, 2);
    }

    pub fn write_raw_char(&mut self, value: u8) {
        self.write_bits(value as u64, 8);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_raw_char(b);
        }
    }

    pub fn write_raw_short(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_raw_long(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_raw_double(&mut self, value: f64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_bit_short(&mut self, value: i16) {
        match value {
            0 => self.write_2bits(2),
            256 => self.write_2bits(3),
            1..=255 => {
                self.write_2bits(1);
                self.write_raw_char(value as u8);
            }
            _ => {
                self.write_2bits(0);
                self.write_raw_short(value as u16);
            }
        }
    }

    pub fn write_bit_long(&mut self, value: i32) {
        match value {
            0 => self.write_2bits(2),
            1..=255 => {
                self.write_2bits(1);
                self.write_raw_char(value as u8);
            }
            _ => {
                self.write_2bits(0);
                self.write_raw_long(value as u32);
            }
        }
    }

    pub fn write_bit_double(&mut self, value: f64) {
        if value == 0.0 {
            self.write_2bits(2);
        } else if value == 1.0 {
            self.write_2bits(1);
        } else {
            self.write_2bits(0);
            self.write_raw_double(value);
        }
    }

    pub fn write_handle(&mut self, code: u8, value: u64) {
        let counter = (8 - value.leading_zeros() / 8) as u8;
        self.write_raw_char((code << 4) | counter);
        for index in (0..counter).rev() {
            self.write_raw_char((value >> (index * 8)) as u8);
        }
    }

    /// TV in a single-byte code page.
    pub fn write_text(&mut self, value: &str) {
        self.write_bit_short(value.len() as i16);
        self.write_bytes(value.as_bytes());
    }

    /// TU: BS character count, then UTF-16LE.
    pub fn write_unicode_text(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_bit_short(units.len() as i16);
        for unit in units {
            self.write_raw_short(unit);
        }
    }

    pub fn write_modular_short(&mut self, mut value: u64) {
        loop {
            let group = (value & 0x7FFF) as u16;
            value >>= 15;
            if value == 0 {
                self.write_raw_short(group);
                return;
            }
            self.write_raw_short(group | 0x8000);
        }
    }

    pub fn write_var_int(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.write_raw_char(byte);
                return;
            }
            self.write_raw_char(byte | 0x80);
        }
    }

    /// Signed variant: 0x40 in the last byte carries the sign.
    pub fn write_signed_var_int(&mut self, value: i64) {
        let negative = value < 0;
        let mut magnitude = value.unsigned_abs();
        while magnitude >= 0x40 {
            self.write_raw_char((magnitude & 0x7F) as u8 | 0x80);
            magnitude >>= 7;
        }
        self.write_raw_char(magnitude as u8 | if negative { 0x40 } else { 0 });
    }

    /// Rewrite an RL written earlier at `bit_position`.
    pub fn patch_raw_long(&mut self, bit_position: u64, value: u32) {
        let end = self.position;
        self.position = bit_position;
        for byte in value.to_le_bytes() {
            for index in (0..8).rev() {
                let at = (self.position >> 3) as usize;
                let mask = 0x80 >> (self.position & 7);
                if (byte >> index) & 1 == 1 {
                    self.data[at] |= mask;
                } else {
                    self.data[at] &= !mask;
                }
                self.position += 1;
            }
        }
        self.position = end;
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align(&mut self) {
        while self.position & 7 != 0 {
            self.write_bit(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dwg::reader::bit_reader::BitReader;
    use crate::io::dwg::reader::stream_reader::DwgStreamReader;
    use crate::types::{DwgVersion, HandleReference};

    #[test]
    fn test_primitives_read_back() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_bit_short(300);
        w.write_bit_long(7);
        w.write_handle(5, 0x1234);
        w.write_text("AB");
        let data = w.into_bytes();

        let mut r = BitReader::new(&data, DwgVersion::R18);
        assert!(r.read_bit().unwrap());
        assert_eq!(r.read_bit_short().unwrap(), 300);
        assert_eq!(r.read_bit_long().unwrap(), 7);
        assert_eq!(r.read_handle().unwrap(), HandleReference::new(5, 0x1234));
        assert_eq!(r.read_variable_text().unwrap(), "AB");
    }
}
