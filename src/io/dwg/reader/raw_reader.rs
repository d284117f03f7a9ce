//! Byte-aligned reads for the plain sections.
//!
//! `AcDb:SummaryInfo`, `AcDb:AppInfo` and `AcDb:AuxHeader` are not
//! bit-packed: they hold little-endian integers and length-prefixed
//! strings. Running off the end is a [`DwgError::TruncatedStream`] so the
//! caller can record it like any other localized failure.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::{Encoding, UTF_16LE};

use crate::error::{DwgError, Result};
use crate::io::dwg::reader::bit_reader::decode_text;
use crate::report::{Finding, FindingKind, ValidationReport};

pub struct RawReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RawReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(DwgError::TruncatedStream {
                bit_position: self.pos as u64 * 8,
                needed: count as u64 * 8,
                available: self.remaining() as u64 * 8,
            });
        }
        let bytes = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// RS byte count, then code-page bytes.
    pub fn read_text(&mut self, encoding: &'static Encoding) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(strip_nul(decode_text(bytes, encoding)))
    }

    /// RS character count, then UTF-16LE code units.
    pub fn read_unicode_text(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len * 2)?;
        let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
        Ok(strip_nul(text.into_owned()))
    }

    /// Record a warning when anything after the current position is not
    /// zero.
    pub fn check_slack(&self, check: &str, report: &mut ValidationReport) {
        let slack = &self.data[self.pos..];
        if let Some(first) = slack.iter().position(|&b| b != 0) {
            report.push(
                Finding::warning(
                    FindingKind::UnusedArea,
                    check,
                    format!(
                        "{} slack bytes after the decoded fields hold data",
                        slack.len()
                    ),
                )
                .at((self.pos + first) as u64),
            );
        }
    }
}

fn strip_nul(text: String) -> String {
    if text.contains('\0') {
        text.replace('\0', "")
    } else {
        text
    }
}
