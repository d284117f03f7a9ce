//! DWG reader orchestrator.
//!
//! Runs the decode pipeline over an in-memory file: file header, section
//! decoding, then the section readers, and collects the result in a
//! [`DwgDocument`]. Every finding goes into the caller's report.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dwg_forensics::io::dwg::reader::DwgReader;
//! use dwg_forensics::report::ValidationReport;
//!
//! let raw = std::fs::read("sample.dwg")?;
//! let mut report = ValidationReport::new();
//! let doc = DwgReader::new(&raw).read(&mut report)?;
//! ```

use tracing::debug;

use crate::document::DwgDocument;
use crate::error::{DwgError, Result};
use crate::io::dwg::constants::section_names;
use crate::io::dwg::file_header::parse_header;
use crate::io::dwg::section::{decode_sections, SectionSet};
use crate::report::ValidationReport;

use super::app_info_reader::DwgAppInfoReader;
use super::aux_header_reader::DwgAuxHeaderReader;
use super::classes_reader::{ClassTable, DwgClassesReader};
use super::handle_reader::{DwgHandleReader, HandleMap};
use super::header_reader::DwgHeaderReader;
use super::object_reader::DwgObjectReader;
use super::summary_info_reader::DwgSummaryInfoReader;

/// Default cap on a declared object size.
pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 16 * 1024 * 1024;

/// Configuration options for the DWG reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwgReaderConfiguration {
    /// When `true`, localized decode errors are recorded as findings and
    /// reading continues with the next unit. When `false` the first one
    /// aborts the read.
    ///
    /// Default: `true`.
    pub failsafe: bool,

    /// Verify page checksums and section CRCs.
    pub verify_checksums: bool,

    /// Walk the object records in `AcDb:AcDbObjects`.
    pub decode_objects: bool,

    /// Declared object sizes above this are treated as overruns.
    pub max_object_size: u64,
}

impl Default for DwgReaderConfiguration {
    fn default() -> Self {
        Self {
            failsafe: true,
            verify_checksums: true,
            decode_objects: true,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
        }
    }
}

impl DwgReaderConfiguration {
    /// Record a localized error under `check`, or hand it back when the
    /// error is fatal or failsafe mode is off.
    pub fn absorb(&self, report: &mut ValidationReport, check: &str, err: DwgError) -> Result<()> {
        if self.failsafe && !err.is_fatal() {
            report.record_error(check, &err);
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// DWG file reader: decodes an R18/R21 file held in memory.
///
/// # Architecture
///
/// 1. Parse the file header, page map and section map.
/// 2. Decode each section's pages into a contiguous buffer.
/// 3. Read the classes and header variables.
/// 4. Read summary info, app info and the aux header.
/// 5. Read the handle map.
/// 6. Walk the object records in handle map order.
///
/// Only step 1 can fail outright. Sections that are missing, encrypted or
/// failed to decode are skipped by the readers that depend on them; their
/// problems are already in the report.
pub struct DwgReader<'a> {
    raw: &'a [u8],
    config: DwgReaderConfiguration,
}

impl<'a> DwgReader<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        Self {
            raw,
            config: DwgReaderConfiguration::default(),
        }
    }

    /// Set configuration options.
    pub fn with_config(mut self, config: DwgReaderConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DwgReaderConfiguration {
        &self.config
    }

    /// Read the whole file.
    pub fn read(&self, report: &mut ValidationReport) -> Result<DwgDocument> {
        let config = &self.config;
        let header = parse_header(self.raw, config, report)?;
        let sections = decode_sections(self.raw, &header, config, report)?;
        let version = header.version;
        let encoding = header.encoding();

        let classes = match usable(&sections, section_names::CLASSES) {
            Some(data) => DwgClassesReader::new(version, data, encoding).read(config, report)?,
            None => ClassTable::default(),
        };
        let header_variables = usable(&sections, section_names::HEADER)
            .map(|data| DwgHeaderReader::new(version, data, encoding).read(config, report))
            .transpose()?;

        let summary_info = match usable(&sections, section_names::SUMMARY_INFO) {
            Some(data) => DwgSummaryInfoReader::new(version, data, encoding).read(config, report)?,
            None => None,
        };
        let app_info = match usable(&sections, section_names::APP_INFO) {
            Some(data) => DwgAppInfoReader::new(version, data).read(config, report)?,
            None => None,
        };
        let aux_header = match usable(&sections, section_names::AUX_HEADER) {
            Some(data) => DwgAuxHeaderReader::new(data).read(config, report)?,
            None => None,
        };

        let objects_data = usable(&sections, section_names::ACDB_OBJECTS);
        let handle_map = match usable(&sections, section_names::HANDLES) {
            Some(data) => {
                let objects_len = objects_data.map(|o| o.len() as u64);
                DwgHandleReader::new(version, data, objects_len).read(config, report)?
            }
            None => HandleMap::new(),
        };

        let objects = match objects_data {
            Some(data) if config.decode_objects => {
                DwgObjectReader::new(version, data, &handle_map, &classes).read(config, report)?
            }
            _ => Vec::new(),
        };

        debug!(
            %version,
            sections = sections.len(),
            handles = handle_map.len(),
            objects = objects.len(),
            "read document"
        );

        Ok(DwgDocument {
            header,
            sections,
            classes,
            header_variables,
            summary_info,
            app_info,
            aux_header,
            handle_map,
            objects,
        })
    }
}

/// Payload of a section the readers may interpret.
fn usable<'s>(sections: &'s SectionSet, name: &str) -> Option<&'s [u8]> {
    let data = sections.data(name);
    if data.is_none() {
        debug!(name, present = sections.get(name).is_some(), "section not readable");
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FindingKind;

    #[test]
    fn test_default_configuration() {
        let config = DwgReaderConfiguration::default();
        assert!(config.failsafe);
        assert!(config.verify_checksums);
        assert!(config.decode_objects);
        assert_eq!(config.max_object_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_absorb_records_localized_errors() {
        let mut report = ValidationReport::new();
        let config = DwgReaderConfiguration::default();
        config
            .absorb(&mut report, "AcDb:Handles", DwgError::MalformedVarInt { position: 9 })
            .unwrap();
        let issues = report.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].check, "AcDb:Handles");
        assert_eq!(issues[0].kind, Some(FindingKind::SyntaxError));
        assert_eq!(issues[0].offset, Some(9));
    }

    #[test]
    fn test_absorb_in_strict_mode() {
        let mut report = ValidationReport::new();
        let config = DwgReaderConfiguration {
            failsafe: false,
            ..Default::default()
        };
        let err = config
            .absorb(&mut report, "AcDb:Header", DwgError::InvalidFormat("x".into()))
            .unwrap_err();
        assert!(matches!(err, DwgError::InvalidFormat(_)));
        assert!(report.is_empty());
    }

    #[test]
    fn test_fatal_errors_are_never_absorbed() {
        let mut report = ValidationReport::new();
        let err = DwgReaderConfiguration::default()
            .absorb(&mut report, "magic", DwgError::UnsupportedVersion("AC1015".into()))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(report.is_empty());
    }

    #[test]
    fn test_unsupported_file_is_fatal() {
        let mut raw = vec![0u8; 0x100];
        raw[..6].copy_from_slice(b"AC1032");
        let mut report = ValidationReport::new();
        let err = DwgReader::new(&raw).read(&mut report).unwrap_err();
        assert!(matches!(err, DwgError::UnsupportedVersion(_)));
    }
}
