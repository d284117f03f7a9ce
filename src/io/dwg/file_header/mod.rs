//! DWG file header.
//!
//! The first 0x80 bytes of an R18 or R21 file form a plain preamble: magic,
//! maintenance release, a few absolute addresses, the code page and the
//! security flags. The container header that follows is version specific:
//!
//! - **R18**: a 0x6C-byte XOR-encrypted block carrying the page map and
//!   section map locations and a CRC-32 ([`ac18`]).
//! - **R21**: a Reed-Solomon encoded, LZ77 AC21 compressed metadata block
//!   ([`ac21`]).
//!
//! Both lead to a page map and a section map. The pages listed by the
//! section map, resolved through the page map, form the section locator
//! table checked by [`parse_header`].

pub mod ac18;
pub mod ac21;
mod compressed_metadata;
mod page_map;
mod section_descriptor;

pub use ac18::Ac18Header;
pub use ac21::Ac21Header;
pub use compressed_metadata::Dwg21CompressedMetadata;
pub use page_map::{PageEntry, PageGap, PageMap};
pub use section_descriptor::{SectionDescriptor, SectionPage};

use std::collections::HashMap;
use std::io::Cursor;

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::Encoding;
use tracing::debug;

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::preamble;
use crate::io::dwg::reader::bit_reader::encoding_from_code_page;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::types::DwgVersion;

bitflags! {
    /// Security flags stored at 0x18 of the preamble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SecurityFlags: u32 {
        /// Section data other than preview and summary info is encrypted.
        const ENCRYPTED_DATA = 0x01;
        /// Document properties are encrypted.
        const ENCRYPTED_PROPERTIES = 0x02;
        const SIGNED = 0x10;
        const TIMESTAMPED = 0x20;
    }
}

/// Version-specific part of the file header.
#[derive(Debug, Clone)]
pub enum ContainerHeader {
    R18(Ac18Header),
    R21(Ac21Header),
}

/// Decoded file header and section locator table.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub version: DwgVersion,
    pub maintenance_version: u8,
    /// Address of the preview image page + 0x20
    pub preview_address: u32,
    pub app_version: u8,
    pub app_maintenance_version: u8,
    pub code_page: u16,
    pub security_flags: SecurityFlags,
    pub summary_info_address: u32,
    pub vba_project_address: u32,
    /// R21 only
    pub app_info_address: Option<u32>,
    pub container: ContainerHeader,
    pub page_map: PageMap,
    /// Section map entries in stored order, pages resolved to file spans
    pub sections: Vec<SectionDescriptor>,
}

impl FileHeader {
    pub fn magic(&self) -> &'static str {
        self.version.magic()
    }

    /// Encoding of code-page text (TV) in R18 sections.
    pub fn encoding(&self) -> &'static Encoding {
        encoding_from_code_page(self.code_page)
    }

    pub fn section(&self, name: &str) -> Option<&SectionDescriptor> {
        self.sections.iter().find(|s| s.name == name)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse the file header, the page map and the section map.
///
/// Fails with [`DwgError::UnsupportedVersion`] for anything other than
/// `AC1018`/`AC1021`, and with other errors when the section table cannot
/// be located at all. Everything else, including a header checksum
/// mismatch or a corrupt locator entry, is recorded in `report`.
pub fn parse_header(
    raw: &[u8],
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<FileHeader> {
    let version = DwgVersion::from_magic(raw)?;
    report.pass("magic", format!("{} signature", version));
    debug!(%version, size = raw.len(), "parsing file header");

    let preamble = Preamble::read(raw, version)?;
    preamble.check(raw, version, report);
    if !preamble.security_flags.is_empty() {
        debug!(flags = ?preamble.security_flags, "security flags set");
    }

    let (container, page_map, mut sections) = match version {
        DwgVersion::R18 => {
            let (header, page_map, sections) = ac18::read(raw, config, report)?;
            (ContainerHeader::R18(header), page_map, sections)
        }
        DwgVersion::R21 => {
            let (header, page_map, sections) = ac21::read(raw, config, report)?;
            (ContainerHeader::R21(header), page_map, sections)
        }
    };

    resolve_locators(&mut sections, &page_map, raw.len() as u64, config, report)?;

    for section in sections.iter().filter(|s| !s.is_known()) {
        report.warning(
            FindingKind::UnknownSection,
            section.name.clone(),
            format!("section name '{}' is not produced by any DWG writer", section.name),
        );
    }
    report.pass(
        "section_map",
        format!(
            "{} sections, {} pages located",
            sections.len(),
            sections.iter().map(|s| s.pages.len()).sum::<usize>()
        ),
    );

    Ok(FileHeader {
        version,
        maintenance_version: preamble.maintenance_version,
        preview_address: preamble.preview_address,
        app_version: preamble.app_version,
        app_maintenance_version: preamble.app_maintenance_version,
        code_page: preamble.code_page,
        security_flags: preamble.security_flags,
        summary_info_address: preamble.summary_info_address,
        vba_project_address: preamble.vba_project_address,
        app_info_address: preamble.app_info_address,
        container,
        page_map,
        sections,
    })
}

// ---------------------------------------------------------------------------
// Preamble
// ---------------------------------------------------------------------------

struct Preamble {
    maintenance_version: u8,
    preview_address: u32,
    app_version: u8,
    app_maintenance_version: u8,
    code_page: u16,
    security_flags: SecurityFlags,
    summary_info_address: u32,
    vba_project_address: u32,
    app_info_address: Option<u32>,
}

impl Preamble {
    fn read(raw: &[u8], version: DwgVersion) -> Result<Self> {
        if raw.len() < preamble::SIZE {
            return Err(DwgError::TruncatedStream {
                bit_position: 0,
                needed: preamble::SIZE as u64 * 8,
                available: raw.len() as u64 * 8,
            });
        }

        let mut c = Cursor::new(raw);
        c.set_position(preamble::MAINTENANCE as u64);
        let maintenance_version = c.read_u8()?;
        c.set_position(preamble::PREVIEW_ADDRESS as u64);
        let preview_address = c.read_u32::<LittleEndian>()?;
        let app_version = c.read_u8()?;
        let app_maintenance_version = c.read_u8()?;
        let code_page = c.read_u16::<LittleEndian>()?;
        c.set_position(preamble::SECURITY_FLAGS as u64);
        // unknown bits are kept so they show up in the debug output
        let security_flags = SecurityFlags::from_bits_retain(c.read_u32::<LittleEndian>()?);
        c.set_position(preamble::SUMMARY_INFO_ADDRESS as u64);
        let summary_info_address = c.read_u32::<LittleEndian>()?;
        let vba_project_address = c.read_u32::<LittleEndian>()?;
        let app_info_address = match version {
            DwgVersion::R18 => None,
            DwgVersion::R21 => {
                c.set_position(preamble::TAIL as u64);
                Some(c.read_u32::<LittleEndian>()?)
            }
        };

        Ok(Self {
            maintenance_version,
            preview_address,
            app_version,
            app_maintenance_version,
            code_page,
            security_flags,
            summary_info_address,
            vba_project_address,
            app_info_address,
        })
    }

    /// Padding and address sanity checks.
    fn check(&self, raw: &[u8], version: DwgVersion, report: &mut ValidationReport) {
        let mut padding = vec![
            (preamble::ZERO5, preamble::ZERO5 + 5),
            (preamble::ZERO3, preamble::ZERO3 + 3),
        ];
        if version == DwgVersion::R18 {
            padding.push((preamble::TAIL, preamble::SIZE));
        }
        for (start, end) in padding {
            if let Some(pos) = raw[start..end].iter().position(|&b| b != 0) {
                report.push(
                    Finding::warning(
                        FindingKind::UnusedArea,
                        "preamble",
                        format!("non-zero byte in padding {:#X}..{:#X}", start, end),
                    )
                    .at((start + pos) as u64),
                );
            }
        }

        let file_size = raw.len() as u64;
        let mut addresses = vec![
            ("preview_address", self.preview_address),
            ("summary_info_address", self.summary_info_address),
            ("vba_project_address", self.vba_project_address),
        ];
        if let Some(app_info) = self.app_info_address {
            addresses.push(("app_info_address", app_info));
        }
        for (field, address) in addresses {
            if address as u64 >= file_size {
                report.fail(
                    FindingKind::SyntaxError,
                    "preamble",
                    format!("{} {:#X} is past the end of the file", field, address),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Locator table
// ---------------------------------------------------------------------------

/// Resolve each section page to a file span through the page map.
///
/// A page whose id is missing from the page map, whose span leaves the
/// file, or which is already claimed by another section is a corrupt
/// locator entry: it is dropped with a finding and the rest are kept.
fn resolve_locators(
    sections: &mut [SectionDescriptor],
    page_map: &PageMap,
    file_size: u64,
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<()> {
    let mut claimed: HashMap<i64, String> = HashMap::new();

    for section in sections.iter_mut() {
        let mut kept = Vec::with_capacity(section.pages.len());
        for mut page in std::mem::take(&mut section.pages) {
            let located = match page_map.get(page.page_id) {
                None => Err(format!("page {} is not in the page map", page.page_id)),
                Some(entry) if entry.end() > file_size => Err(format!(
                    "page {} at {:#X}+{:#X} lies outside the {}-byte file",
                    page.page_id, entry.address, entry.size, file_size
                )),
                Some(entry) => match claimed.get(&page.page_id) {
                    Some(owner) => Err(format!(
                        "page {} overlaps a page of '{}'",
                        page.page_id, owner
                    )),
                    None => Ok(*entry),
                },
            };

            match located {
                Ok(entry) => {
                    page.file_offset = entry.address;
                    page.page_size = entry.size;
                    claimed.insert(page.page_id, section.name.clone());
                    kept.push(page);
                }
                Err(reason) => {
                    let err = DwgError::CorruptLocator {
                        name: section.name.clone(),
                        reason,
                    };
                    config.absorb(report, &section.name, err)?;
                }
            }
        }
        section.pages = kept;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Outcome;

    fn page(id: i64) -> SectionPage {
        SectionPage {
            page_id: id,
            file_offset: 0,
            page_size: 0,
            data_offset: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            checksum: None,
            crc: None,
        }
    }

    fn page_map() -> PageMap {
        let mut map = PageMap::new();
        map.insert(PageEntry { id: 1, address: 0x100, size: 0x80 });
        map.insert(PageEntry { id: 2, address: 0x180, size: 0x80 });
        map.insert(PageEntry { id: 3, address: 0x200, size: 0x1000 });
        map
    }

    #[test]
    fn test_locators_resolve_through_page_map() {
        let mut sections = vec![SectionDescriptor::new("AcDb:Header")];
        sections[0].pages.push(page(2));
        let mut report = ValidationReport::new();
        resolve_locators(&mut sections, &page_map(), 0x300, &Default::default(), &mut report)
            .unwrap();
        assert_eq!(sections[0].pages[0].file_offset, 0x180);
        assert_eq!(sections[0].pages[0].page_size, 0x80);
        assert!(report.is_empty());
    }

    #[test]
    fn test_corrupt_locators_are_dropped_individually() {
        let mut a = SectionDescriptor::new("AcDb:Header");
        a.pages = vec![page(1), page(9), page(3)];
        let mut b = SectionDescriptor::new("AcDb:Classes");
        b.pages = vec![page(1), page(2)];
        let mut sections = vec![a, b];

        let mut report = ValidationReport::new();
        resolve_locators(&mut sections, &page_map(), 0x300, &Default::default(), &mut report)
            .unwrap();

        // 9 is unknown, 3 leaves the file, 1 is claimed twice
        assert_eq!(sections[0].pages.len(), 1);
        assert_eq!(sections[1].pages.len(), 1);
        assert_eq!(sections[1].pages[0].page_id, 2);
        assert_eq!(report.issues().len(), 3);
        assert!(report
            .iter()
            .all(|f| f.outcome == Outcome::Fail && f.kind == Some(FindingKind::Corrupted)));
    }

    #[test]
    fn test_strict_mode_aborts_on_corrupt_locator() {
        let mut sections = vec![SectionDescriptor::new("AcDb:Header")];
        sections[0].pages.push(page(7));
        let config = DwgReaderConfiguration {
            failsafe: false,
            ..Default::default()
        };
        let err = resolve_locators(
            &mut sections,
            &page_map(),
            0x300,
            &config,
            &mut ValidationReport::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DwgError::CorruptLocator { .. }));
    }

    #[test]
    fn test_unsupported_magic_fails_fast() {
        let mut raw = vec![0u8; 0x200];
        raw[..6].copy_from_slice(b"AC1015");
        let mut report = ValidationReport::new();
        let err = parse_header(&raw, &Default::default(), &mut report).unwrap_err();
        assert!(matches!(err, DwgError::UnsupportedVersion(_)));
        assert!(report.is_empty());
    }

    #[test]
    fn test_preamble_padding_warning() {
        let mut raw = vec![0u8; 0x100];
        raw[..6].copy_from_slice(b"AC1018");
        raw[0x40] = 0x5A;
        let pre = Preamble::read(&raw, DwgVersion::R18).unwrap();
        let mut report = ValidationReport::new();
        pre.check(&raw, DwgVersion::R18, &mut report);
        let issues = report.of_kind(FindingKind::UnusedArea);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].offset, Some(0x40));
    }

    #[test]
    fn test_security_flags() {
        let mut raw = vec![0u8; 0x100];
        raw[..6].copy_from_slice(b"AC1018");
        raw[preamble::SECURITY_FLAGS] = 0x41;
        let pre = Preamble::read(&raw, DwgVersion::R18).unwrap();
        assert!(pre.security_flags.contains(SecurityFlags::ENCRYPTED_DATA));
        assert!(!pre.security_flags.contains(SecurityFlags::SIGNED));
        assert_eq!(pre.security_flags.bits(), 0x41);
    }

    #[test]
    fn test_preamble_address_past_end() {
        let mut raw = vec![0u8; 0x100];
        raw[..6].copy_from_slice(b"AC1021");
        raw[preamble::SUMMARY_INFO_ADDRESS..preamble::SUMMARY_INFO_ADDRESS + 4]
            .copy_from_slice(&0x1000u32.to_le_bytes());
        let pre = Preamble::read(&raw, DwgVersion::R21).unwrap();
        assert_eq!(pre.app_info_address, Some(0));
        let mut report = ValidationReport::new();
        pre.check(&raw, DwgVersion::R21, &mut report);
        assert_eq!(report.of_kind(FindingKind::SyntaxError).len(), 1);
    }
}
