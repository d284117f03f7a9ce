//! DWG summary info (`AcDb:SummaryInfo`) reader.
//!
//! Holds the document properties shown in the drawing properties dialog:
//! eight strings, the editing time, the create and modify times, then the
//! custom properties. R18 stores the strings in the drawing code page,
//! R21 as UTF-16.

use encoding_rs::Encoding;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::Result;
use crate::io::dwg::constants::section_names;
use crate::io::dwg::reader::raw_reader::RawReader;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::ValidationReport;
use crate::types::{DwgVersion, JulianDate};

const CHECK: &str = section_names::SUMMARY_INFO;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryInfo {
    pub title: String,
    pub subject: String,
    pub author: String,
    pub keywords: String,
    pub comments: String,
    pub last_saved_by: String,
    pub revision_number: String,
    pub hyperlink_base: String,
    /// Day count and milliseconds, not a calendar date
    pub total_editing_time: JulianDate,
    pub create_date: JulianDate,
    pub modified_date: JulianDate,
    /// Custom properties in stored order
    pub properties: IndexMap<String, String>,
}

pub struct DwgSummaryInfoReader<'a> {
    data: &'a [u8],
    version: DwgVersion,
    encoding: &'static Encoding,
}

impl<'a> DwgSummaryInfoReader<'a> {
    pub fn new(version: DwgVersion, data: &'a [u8], encoding: &'static Encoding) -> Self {
        Self {
            data,
            version,
            encoding,
        }
    }

    /// Read the section. `None` when the fields could not be decoded.
    pub fn read(
        &self,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<Option<SummaryInfo>> {
        let mut reader = RawReader::new(self.data);
        match self.read_fields(&mut reader) {
            Ok(info) => {
                debug!(
                    author = %info.author,
                    properties = info.properties.len(),
                    "read summary info"
                );
                reader.check_slack(CHECK, report);
                report.pass(CHECK, "summary info decoded");
                Ok(Some(info))
            }
            Err(err) => {
                config.absorb(report, CHECK, err)?;
                Ok(None)
            }
        }
    }

    fn read_fields(&self, r: &mut RawReader<'a>) -> Result<SummaryInfo> {
        let mut info = SummaryInfo {
            title: self.read_string(r)?,
            subject: self.read_string(r)?,
            author: self.read_string(r)?,
            keywords: self.read_string(r)?,
            comments: self.read_string(r)?,
            last_saved_by: self.read_string(r)?,
            revision_number: self.read_string(r)?,
            hyperlink_base: self.read_string(r)?,
            ..Default::default()
        };

        info.total_editing_time = read_date(r)?;
        info.create_date = read_date(r)?;
        info.modified_date = read_date(r)?;

        let count = r.read_u16()?;
        for _ in 0..count {
            let name = self.read_string(r)?;
            let value = self.read_string(r)?;
            if !name.is_empty() {
                info.properties.entry(name).or_insert(value);
            }
        }

        // two RLs, written as 0; older files end before them
        if r.remaining() >= 8 {
            r.read_u32()?;
            r.read_u32()?;
        }
        Ok(info)
    }

    fn read_string(&self, r: &mut RawReader<'a>) -> Result<String> {
        match self.version {
            DwgVersion::R18 => r.read_text(self.encoding),
            DwgVersion::R21 => r.read_unicode_text(),
        }
    }
}

/// RL day, RL milliseconds.
fn read_date(r: &mut RawReader<'_>) -> Result<JulianDate> {
    let day = r.read_u32()?;
    let ms = r.read_u32()?;
    Ok(JulianDate::new(day as i64, ms as i64))
}
