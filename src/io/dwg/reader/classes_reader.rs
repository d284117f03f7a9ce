//! DWG classes (`AcDb:Classes`) reader.
//!
//! Custom object and entity types are registered here. Type codes from 500
//! upwards in the objects section are class numbers from this table.

use encoding_rs::Encoding;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::{section_names, sentinels};
use crate::io::dwg::object_type::{ObjectClass, PROXY_ENTITY};
use crate::io::dwg::reader::bit_reader::BitReader;
use crate::io::dwg::reader::framed::{check_frame, DATA_START};
use crate::io::dwg::reader::merged_reader::MergedReader;
use crate::io::dwg::reader::stream_reader::DwgStreamReader;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::{FindingKind, ValidationReport};
use crate::types::DwgVersion;

const CHECK: &str = section_names::CLASSES;

/// One registered class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DwgClass {
    pub class_number: i16,
    pub proxy_flags: u16,
    pub application_name: String,
    pub cpp_class_name: String,
    pub dxf_name: String,
    pub was_zombie: bool,
    /// 0x1F2 for entity classes, 0x1F3 for object classes
    pub item_class_id: i16,
    pub instance_count: i32,
    pub dwg_version: i32,
    pub maintenance_version: i32,
}

impl DwgClass {
    pub fn object_class(&self) -> ObjectClass {
        if self.item_class_id as u16 == PROXY_ENTITY {
            ObjectClass::Entity
        } else {
            ObjectClass::Object
        }
    }
}

/// Classes keyed by class number.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: IndexMap<i16, DwgClass>,
    pub max_class_number: Option<i16>,
}

impl ClassTable {
    pub fn get(&self, type_code: u16) -> Option<&DwgClass> {
        i16::try_from(type_code)
            .ok()
            .and_then(|number| self.classes.get(&number))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DwgClass> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn insert(&mut self, class: DwgClass) {
        self.classes.insert(class.class_number, class);
    }
}

pub struct DwgClassesReader<'a> {
    data: &'a [u8],
    version: DwgVersion,
    encoding: &'static Encoding,
}

impl<'a> DwgClassesReader<'a> {
    pub fn new(version: DwgVersion, data: &'a [u8], encoding: &'static Encoding) -> Self {
        Self {
            data,
            version,
            encoding,
        }
    }

    /// Read the class table. Classes decoded before a failure are kept.
    pub fn read(
        &self,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<ClassTable> {
        let mut table = ClassTable::default();
        match self.read_into(&mut table, config, report) {
            Ok(()) => {
                debug!(classes = table.len(), "read classes");
                report.pass(CHECK, format!("{} classes", table.len()));
            }
            Err(err) => config.absorb(report, CHECK, err)?,
        }
        Ok(table)
    }

    fn read_into(
        &self,
        table: &mut ClassTable,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<()> {
        let body_end = check_frame(
            self.data,
            &sentinels::CLASSES_START,
            &sentinels::CLASSES_END,
            CHECK,
            config,
            report,
        )?;
        let body = &self.data[..body_end];
        let mut reader =
            BitReader::at(body, self.version, DATA_START as u64 * 8).with_encoding(self.encoding);

        match self.version {
            DwgVersion::R21 => read_r21_classes(body, reader, table)?,
            DwgVersion::R18 => {
                table.max_class_number = Some(reader.read_bit_short()?);
                reader.read_raw_char()?;
                reader.read_raw_char()?;
                reader.read_bit()?;

                // trailing bits shorter than a byte are padding
                let end = body_end as u64 * 8;
                while reader.position_in_bits() + 8 <= end {
                    table.insert(read_class(&mut reader)?);
                }
            }
        }

        if let Some(max) = table.max_class_number {
            if let Some(class) = table.iter().find(|c| c.class_number > max) {
                report.warning(
                    FindingKind::Corrupted,
                    CHECK,
                    format!(
                        "class {} '{}' is above the maximum class number {}",
                        class.class_number, class.dxf_name, max
                    ),
                );
            }
        }
        Ok(())
    }
}

/// Strings live in a stream at the end of the data, found through the flag
/// bit that closes the main stream.
fn read_r21_classes(body: &[u8], mut main: BitReader<'_>, table: &mut ClassTable) -> Result<()> {
    let base = main.position_in_bits();
    let bit_size = main.read_raw_long()? as u32 as u64;
    let flag_pos = (base + bit_size).checked_sub(1).ok_or_else(|| {
        DwgError::InvalidFormat("classes stream size is zero".to_string())
    })?;

    let mut text = BitReader::new(body, main.version());
    let end = text.set_position_by_flag(flag_pos)?.unwrap_or(flag_pos);

    // BL 0, then the string stream flag
    main.read_bit_long()?;
    main.read_bit()?;

    let text = if end < flag_pos { Some(text) } else { None };
    let mut merged = MergedReader::new(main, text, None);
    while merged.main().position_in_bits() + 8 <= end {
        table.insert(read_class(&mut merged)?);
    }
    Ok(())
}

fn read_class<R: DwgStreamReader>(reader: &mut R) -> Result<DwgClass> {
    let class_number = reader.read_bit_short()?;
    let proxy_flags = reader.read_bit_short()? as u16;
    let application_name = reader.read_variable_text()?;
    let cpp_class_name = reader.read_variable_text()?;
    let dxf_name = reader.read_variable_text()?;
    let was_zombie = reader.read_bit()?;
    let item_class_id = reader.read_bit_short()?;
    let instance_count = reader.read_bit_long()?;
    let dwg_version = reader.read_bit_long()?;
    let maintenance_version = reader.read_bit_long()?;
    // two unknown BLs, normally 0
    reader.read_bit_long()?;
    reader.read_bit_long()?;

    Ok(DwgClass {
        class_number,
        proxy_flags,
        application_name,
        cpp_class_name,
        dxf_name,
        was_zombie,
        item_class_id,
        instance_count,
        dwg_version,
        maintenance_version,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::io::dwg::reader::bit_writer::BitWriter;
    use crate::io::dwg::reader::framed::tests::frame;

    /// Build an R18 classes section holding the given (number, dxf name,
    /// item class id) triples.
    pub(crate) fn r18_classes(classes: &[(i16, &str, i16)]) -> Vec<u8> {
        let mut w = BitWriter::new();
        let max = classes.iter().map(|c| c.0).max().unwrap_or(0);
        w.write_bit_short(max);
        w.write_raw_char(0);
        w.write_raw_char(0);
        w.write_bit(true);
        for &(number, name, item) in classes {
            w.write_bit_short(number);
            w.write_bit_short(0);
            w.write_text("ObjectDBX Classes");
            w.write_text(&format!("AcDb{}", name));
            w.write_text(name);
            w.write_bit(false);
            w.write_bit_short(item);
            w.write_bit_long(1);
            w.write_bit_long(0);
            w.write_bit_long(0);
            w.write_bit_long(0);
            w.write_bit_long(0);
        }
        w.align();
        frame(&sentinels::CLASSES_START, &w.into_bytes(), &sentinels::CLASSES_END)
    }

    fn read(data: &[u8]) -> (ClassTable, ValidationReport) {
        let mut report = ValidationReport::new();
        let table = DwgClassesReader::new(DwgVersion::R18, data, encoding_rs::WINDOWS_1252)
            .read(&DwgReaderConfiguration::default(), &mut report)
            .unwrap();
        (table, report)
    }

    #[test]
    fn test_reads_r18_classes() {
        let data = r18_classes(&[(500, "DICTIONARYVAR", 0x1F3), (501, "WIPEOUT", 0x1F2)]);
        let (table, report) = read(&data);
        assert!(report.issues().is_empty());
        assert_eq!(table.len(), 2);
        assert_eq!(table.max_class_number, Some(501));

        let wipeout = table.get(501).unwrap();
        assert_eq!(wipeout.dxf_name, "WIPEOUT");
        assert_eq!(wipeout.cpp_class_name, "AcDbWIPEOUT");
        assert_eq!(wipeout.object_class(), ObjectClass::Entity);
        assert_eq!(table.get(500).unwrap().object_class(), ObjectClass::Object);
        assert!(table.get(502).is_none());
    }

    #[test]
    fn test_crc_mismatch() {
        let mut data = r18_classes(&[(500, "DICTIONARYVAR", 0x1F3)]);
        let crc_at = data.len() - 18;
        data[crc_at] ^= 0x01;
        let (table, report) = read(&data);
        assert_eq!(table.len(), 1);
        assert_eq!(report.of_kind(FindingKind::InvalidCrc).len(), 1);
    }

    #[test]
    fn test_bad_start_sentinel() {
        let mut data = r18_classes(&[]);
        data[0] ^= 0xFF;
        let (table, report) = read(&data);
        assert!(table.is_empty());
        assert!(report.has_kind(FindingKind::SyntaxError));
    }

    #[test]
    fn test_truncated_section() {
        let data = r18_classes(&[(500, "DICTIONARYVAR", 0x1F3)]);
        let (_, report) = read(&data[..24]);
        assert!(!report.is_valid());
    }
}
