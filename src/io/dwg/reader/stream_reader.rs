//! DWG bit-level stream reader trait.
//!
//! DWG data is **bit-aligned** (not byte-aligned). Section readers are
//! written against this trait so the same variable walk works on a single
//! [`BitReader`](super::bit_reader::BitReader) (R18) and on a
//! [`MergedReader`](super::merged_reader::MergedReader) that routes text and
//! handle reads to their own sub-streams (R21).
//!
//! Data type codes:
//!
//! - **B**: bit (1 bit)
//! - **BB**: 2-bit code
//! - **BS**: BitShort (2+0/8/16 bits)
//! - **BL**: BitLong (2+0/8/32 bits)
//! - **BLL**: BitLongLong (3+N*8 bits)
//! - **BD**: BitDouble (2+0/64 bits)
//! - **RC**, **RS**, **RL**, **RD**: raw char, short, long, double
//! - **H**: handle reference
//! - **TV**: variable text (code page in R18, UTF-16 in R21)
//! - **CMC**: colour

use crate::error::Result;
use crate::types::{HandleReference, JulianDate};

pub trait DwgStreamReader {
    /// B
    fn read_bit(&mut self) -> Result<bool>;

    /// BB
    fn read_2bits(&mut self) -> Result<u8>;

    /// RC
    fn read_raw_char(&mut self) -> Result<u8>;

    /// RS
    fn read_raw_short(&mut self) -> Result<i16>;

    /// RL
    fn read_raw_long(&mut self) -> Result<i32>;

    /// RD
    fn read_raw_double(&mut self) -> Result<f64>;

    /// BS
    fn read_bit_short(&mut self) -> Result<i16>;

    /// BL
    fn read_bit_long(&mut self) -> Result<i32>;

    /// BLL
    fn read_bit_long_long(&mut self) -> Result<u64>;

    /// BD
    fn read_bit_double(&mut self) -> Result<f64>;

    /// H
    fn read_handle(&mut self) -> Result<HandleReference>;

    /// TV
    fn read_variable_text(&mut self) -> Result<String>;

    /// 3BD
    fn read_3bit_double(&mut self) -> Result<[f64; 3]> {
        Ok([
            self.read_bit_double()?,
            self.read_bit_double()?,
            self.read_bit_double()?,
        ])
    }

    /// 2RD
    fn read_2raw_double(&mut self) -> Result<[f64; 2]> {
        Ok([self.read_raw_double()?, self.read_raw_double()?])
    }

    /// Julian date stored as BL day + BL milliseconds.
    fn read_julian_date(&mut self) -> Result<JulianDate> {
        let day = self.read_bit_long()?;
        let milliseconds = self.read_bit_long()?;
        Ok(JulianDate::new(day as i64, milliseconds as i64))
    }

    /// Skip a CMC colour: BS index, BL rgb, RC flags and the optional names.
    fn skip_cm_color(&mut self) -> Result<()> {
        let _index = self.read_bit_short()?;
        let _rgb = self.read_bit_long()?;
        let flags = self.read_raw_char()?;
        if flags & 0x01 != 0 {
            self.read_variable_text()?;
        }
        if flags & 0x02 != 0 {
            self.read_variable_text()?;
        }
        Ok(())
    }
}
