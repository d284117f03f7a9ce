//! Object records in `AcDb:AcDbObjects`.
//!
//! Records are visited in handle-map order. Each starts with an MS size,
//! followed by the type code, the common data and a type-specific body that
//! is kept as an opaque span. A CRC over the size and the record follows.
//!
//! A second, sequential pass steps from record to record by declared size
//! and flags records the handle map does not list.

mod common;

pub use common::CommonFields;

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::{
    handle_section::CRC_SEED, section_names, OBJECTS_SECTION_MARKER,
};
use crate::io::dwg::crc::crc8;
use crate::io::dwg::object_type::{
    fixed_type, unknown_type_name, ObjectClass, FIRST_CLASS_NUMBER,
};
use crate::io::dwg::reader::bit_reader::BitReader;
use crate::io::dwg::reader::classes_reader::ClassTable;
use crate::io::dwg::reader::handle_reader::HandleMap;
use crate::io::dwg::reader::stream_reader::DwgStreamReader;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::io::dwg::section::ByteSpan;
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::types::DwgVersion;

use self::common::read_common_data;

const CHECK: &str = section_names::ACDB_OBJECTS;
const REFERENCES: &str = "handle_table";

/// One object record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Handle under which the map lists this record
    pub handle: u64,
    /// Section-relative offset of the size field
    pub offset: u64,
    /// Declared size, without the size field and the CRC
    pub size: u64,
    pub type_code: u16,
    pub type_name: String,
    /// `None` when the type code resolves nowhere
    pub class: Option<ObjectClass>,
    /// `None` when the common data could not be decoded
    pub fields: Option<CommonFields>,
    /// Section-relative bytes of the record body
    pub body: ByteSpan,
}

impl ObjectRecord {
    pub fn is_entity(&self) -> bool {
        self.class == Some(ObjectClass::Entity)
    }
}

pub struct DwgObjectReader<'a> {
    data: &'a [u8],
    version: DwgVersion,
    handles: &'a HandleMap,
    classes: &'a ClassTable,
}

impl<'a> DwgObjectReader<'a> {
    pub fn new(
        version: DwgVersion,
        data: &'a [u8],
        handles: &'a HandleMap,
        classes: &'a ClassTable,
    ) -> Self {
        Self {
            data,
            version,
            handles,
            classes,
        }
    }

    /// Walk every mapped record, then check that all references resolve.
    pub fn read(
        &self,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<Vec<ObjectRecord>> {
        let mut records = Vec::with_capacity(self.handles.len());

        for (handle, offset) in self.handles.iter() {
            // out-of-range offsets were reported with the handle map
            let Ok(offset) = u64::try_from(offset) else {
                continue;
            };
            if offset >= self.data.len() as u64 {
                continue;
            }

            match self.read_record(handle, offset, config, report) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => config.absorb(report, CHECK, err)?,
            }
        }

        check_references(&records, self.handles, report);
        self.sweep_unmapped(config, report);
        Ok(records)
    }

    /// Step through the records back to back from the section start and
    /// flag every one the handle map does not point at. The sweep stops at
    /// the first size it cannot step over.
    fn sweep_unmapped(&self, config: &DwgReaderConfiguration, report: &mut ValidationReport) {
        let marker = self
            .data
            .get(..4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        if marker != Some(OBJECTS_SECTION_MARKER) {
            debug!(?marker, "objects section has no start marker, sweep skipped");
            return;
        }

        let mapped: HashSet<u64> = self
            .handles
            .iter()
            .filter_map(|(_, offset)| u64::try_from(offset).ok())
            .collect();
        let len = self.data.len() as u64;
        let mut pos = 4u64;
        let mut visited = 0usize;
        let mut unmapped = 0usize;

        while pos < len {
            let mut reader = BitReader::at(self.data, self.version, pos * 8);
            let Ok(size) = reader.read_modular_short() else {
                break;
            };
            let start = reader.byte_position();
            if size == 0 || size > len - start.min(len) || size > config.max_object_size {
                trace!(pos, size, "sweep stopped");
                break;
            }
            visited += 1;
            if !mapped.contains(&pos) {
                unmapped += 1;
                report.push(
                    Finding::warning(
                        FindingKind::UnusedArea,
                        CHECK,
                        format!(
                            "record of {} bytes at offset {:#X} is not in the handle map",
                            size, pos
                        ),
                    )
                    .at(pos),
                );
            }
            pos = resync_offset(start, size, len);
        }
        debug!(visited, unmapped, end = pos, "swept objects section");
    }

    fn read_record(
        &self,
        handle: u64,
        offset: u64,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<Option<ObjectRecord>> {
        let mut reader = BitReader::at(self.data, self.version, offset * 8);
        let size = reader.read_modular_short()?;
        let start = reader.byte_position();
        let available = self.data.len() as u64 - start;

        if size > available || size > config.max_object_size {
            let err = DwgError::ObjectOverrun {
                offset,
                declared: size,
                available,
            };
            trace!(handle, offset, size, "skipping overrunning record");
            config.absorb(report, CHECK, err)?;
            return Ok(None);
        }
        if size == 0 {
            report.push(
                Finding::warning(
                    FindingKind::Corrupted,
                    CHECK,
                    format!("record for handle {:#X} is empty", handle),
                )
                .at(offset),
            );
            return Ok(None);
        }

        let end = start + size;
        if config.verify_checksums {
            self.check_crc(handle, offset, end, report);
        }

        let body = &self.data[start as usize..end as usize];
        let mut main = BitReader::new(body, self.version);
        let type_code = main.read_bit_short()? as u16;
        let (type_name, class) = self.classify(type_code);
        if class.is_none() {
            report.push(
                Finding::warning(
                    FindingKind::UnknownObject,
                    CHECK,
                    format!("handle {:#X} has unregistered type {}", handle, type_name),
                )
                .at(offset),
            );
        }

        let fields = match class {
            Some(class) => match read_common_data(main, body, self.version, class) {
                Ok(fields) => Some(fields),
                Err(err) => {
                    report.push(
                        Finding::warning(
                            FindingKind::Corrupted,
                            CHECK,
                            format!("handle {:#X} ({}): {}", handle, type_name, err),
                        )
                        .at(offset),
                    );
                    None
                }
            },
            None => None,
        };

        if let Some(own) = fields.as_ref().map(|f| f.own_handle) {
            if own != handle {
                report.push(
                    Finding::warning(
                        FindingKind::Corrupted,
                        CHECK,
                        format!("record mapped to {:#X} carries handle {:#X}", handle, own),
                    )
                    .at(offset),
                );
            }
        }

        trace!(handle, offset, size, type_name = %type_name, "object record");
        Ok(Some(ObjectRecord {
            handle,
            offset,
            size,
            type_code,
            type_name,
            class,
            fields,
            body: ByteSpan::new(start, size),
        }))
    }

    fn check_crc(&self, handle: u64, offset: u64, end: u64, report: &mut ValidationReport) {
        let end = end as usize;
        let Some(stored) = self.data.get(end..end + 2) else {
            report.push(
                Finding::warning(
                    FindingKind::Corrupted,
                    CHECK,
                    format!("record for handle {:#X} has no CRC", handle),
                )
                .at(offset),
            );
            return;
        };
        let stored = u16::from_le_bytes([stored[0], stored[1]]);
        let computed = crc8(CRC_SEED, &self.data[offset as usize..end]);
        if stored != computed {
            report.push(
                Finding::fail(
                    FindingKind::InvalidCrc,
                    CHECK,
                    format!(
                        "record for handle {:#X}: stored CRC {:#06X}, computed {:#06X}",
                        handle, stored, computed
                    ),
                )
                .at(offset),
            );
        }
    }

    fn classify(&self, type_code: u16) -> (String, Option<ObjectClass>) {
        if let Some((name, class)) = fixed_type(type_code) {
            return (name.to_string(), Some(class));
        }
        if type_code >= FIRST_CLASS_NUMBER {
            if let Some(class) = self.classes.get(type_code) {
                return (class.dxf_name.clone(), Some(class.object_class()));
            }
        }
        (unknown_type_name(type_code), None)
    }
}

/// Where a sequential walk resumes after a record declaring `declared`
/// bytes from `start`: past the record and its CRC, clamped to the section.
pub fn resync_offset(start: u64, declared: u64, section_len: u64) -> u64 {
    start
        .saturating_add(declared)
        .saturating_add(2)
        .min(section_len)
}

/// Every owner, reactor and xdictionary handle must be in the map.
fn check_references(records: &[ObjectRecord], handles: &HandleMap, report: &mut ValidationReport) {
    let mut unresolved = 0usize;
    let mut checked = 0usize;
    for record in records {
        let Some(fields) = &record.fields else {
            continue;
        };
        for target in fields.references() {
            checked += 1;
            if !handles.contains(target) {
                unresolved += 1;
                report.push(
                    Finding::warning(
                        FindingKind::UnresolvedReference,
                        REFERENCES,
                        format!(
                            "{} {:#X} refers to missing handle {:#X}",
                            record.type_name, record.handle, target
                        ),
                    )
                    .at(record.offset),
                );
            }
        }
    }
    if unresolved == 0 {
        report.pass(
            REFERENCES,
            format!("{} references across {} records resolve", checked, records.len()),
        );
    }
}
