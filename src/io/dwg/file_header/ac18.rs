//! R18 (AC1018) container header.
//!
//! Layout after the preamble:
//!
//! ```text
//! 0x80   0x6C bytes  XOR-encrypted header (page map location, CRC-32)
//! 0x100  pages       page map, section map and data pages
//! ```
//!
//! The page map and section map are "system pages": a plain 20-byte header
//! (signature, decompressed size, compressed size, compression type,
//! checksum) followed by LZ77 AC18 compressed data.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use super::page_map::{PageEntry, PageGap, PageMap};
use super::section_descriptor::{SectionDescriptor, SectionPage};
use crate::error::{DwgError, Result};
use crate::io::dwg::checksum::page_checksum;
use crate::io::dwg::compression::lz77_ac18;
use crate::io::dwg::constants::{ac18, preamble, MAX_SECTION_SIZE};
use crate::io::dwg::crc::crc32;
use crate::io::dwg::encryption::xor_file_header;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::{Finding, FindingKind, ValidationReport};

/// Decrypted R18 header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ac18Header {
    pub file_id: [u8; 12],
    pub root_tree_node_gap: i32,
    pub left_gap: i32,
    pub right_gap: i32,
    pub last_page_id: i32,
    pub last_section_address: u64,
    pub second_header_address: u64,
    pub gap_amount: u32,
    pub section_amount: u32,
    pub page_map_id: u32,
    /// Absolute address; stored as address - 0x100
    pub page_map_address: u64,
    pub section_map_id: u32,
    pub section_page_array_size: u32,
    pub gap_array_size: u32,
    pub stored_crc: u32,
    /// CRC-32 over the decrypted block with the CRC field zeroed
    pub computed_crc: u32,
}

impl Ac18Header {
    /// Parse a decrypted header block.
    pub fn parse(decrypted: &[u8; ac18::ENCRYPTED_HEADER_SIZE]) -> Result<Self> {
        use ac18::header as h;

        let mut file_id = [0u8; 12];
        file_id.copy_from_slice(&decrypted[h::ID..h::ID + 12]);

        let mut c = Cursor::new(&decrypted[..]);
        c.set_position(h::ROOT_GAP as u64);
        let root_tree_node_gap = c.read_i32::<LittleEndian>()?;
        let left_gap = c.read_i32::<LittleEndian>()?;
        let right_gap = c.read_i32::<LittleEndian>()?;
        c.set_position(h::LAST_PAGE_ID as u64);
        let last_page_id = c.read_i32::<LittleEndian>()?;
        let last_section_address = c.read_u64::<LittleEndian>()?;
        let second_header_address = c.read_u64::<LittleEndian>()?;
        let gap_amount = c.read_u32::<LittleEndian>()?;
        let section_amount = c.read_u32::<LittleEndian>()?;
        c.set_position(h::PAGE_MAP_ID as u64);
        let page_map_id = c.read_u32::<LittleEndian>()?;
        let page_map_address = c
            .read_u64::<LittleEndian>()?
            .wrapping_add(ac18::PAGE_MAP_BASE);
        let section_map_id = c.read_u32::<LittleEndian>()?;
        let section_page_array_size = c.read_u32::<LittleEndian>()?;
        let gap_array_size = c.read_u32::<LittleEndian>()?;
        let stored_crc = c.read_u32::<LittleEndian>()?;

        let mut zeroed = *decrypted;
        zeroed[h::CRC..h::CRC + 4].fill(0);
        let computed_crc = crc32(0, &zeroed);

        Ok(Self {
            file_id,
            root_tree_node_gap,
            left_gap,
            right_gap,
            last_page_id,
            last_section_address,
            second_header_address,
            gap_amount,
            section_amount,
            page_map_id,
            page_map_address,
            section_map_id,
            section_page_array_size,
            gap_array_size,
            stored_crc,
            computed_crc,
        })
    }

    pub fn has_valid_id(&self) -> bool {
        self.file_id[..] == *ac18::FILE_ID
    }

    pub fn crc_matches(&self) -> bool {
        self.stored_crc == self.computed_crc
    }
}

/// Read the R18 container: decrypted header, page map and section map.
pub(super) fn read(
    raw: &[u8],
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<(Ac18Header, PageMap, Vec<SectionDescriptor>)> {
    let start = preamble::SIZE;
    let end = start + ac18::ENCRYPTED_HEADER_SIZE;
    let mut block = [0u8; ac18::ENCRYPTED_HEADER_SIZE];
    block.copy_from_slice(raw.get(start..end).ok_or(DwgError::TruncatedStream {
        bit_position: start as u64 * 8,
        needed: ac18::ENCRYPTED_HEADER_SIZE as u64 * 8,
        available: raw.len().saturating_sub(start) as u64 * 8,
    })?);
    xor_file_header(&mut block);
    let header = Ac18Header::parse(&block)?;

    if !header.has_valid_id() {
        report.push(
            Finding::fail(
                FindingKind::SyntaxError,
                "file_header",
                format!(
                    "id string {:?} is not AcFssFcAJMB",
                    String::from_utf8_lossy(&header.file_id)
                ),
            )
            .at(start as u64),
        );
    }
    if header.crc_matches() {
        report.pass("file_header", format!("header CRC {:#010X}", header.stored_crc));
    } else {
        report.push(
            Finding::fail(
                FindingKind::InvalidCrc,
                "file_header",
                format!(
                    "header checksum mismatch: stored {:#010X}, computed {:#010X}",
                    header.stored_crc, header.computed_crc
                ),
            )
            .at(start as u64),
        );
    }
    debug!(
        page_map = header.page_map_address,
        section_map_id = header.section_map_id,
        "decrypted R18 header"
    );

    let page_map_data = read_system_page(
        raw,
        header.page_map_address,
        ac18::PAGE_TYPE_PAGE_MAP,
        "page_map",
        config,
        report,
    )?;
    let page_map = parse_page_map(&page_map_data, &header, raw.len() as u64, report);

    let section_map_page = page_map.get(header.section_map_id as i64).ok_or_else(|| {
        DwgError::InvalidFormat(format!(
            "section map page {} is not in the page map",
            header.section_map_id
        ))
    })?;
    let section_map_data = read_system_page(
        raw,
        section_map_page.address,
        ac18::PAGE_TYPE_SECTION_MAP,
        "section_map",
        config,
        report,
    )?;
    let sections = parse_section_map(&section_map_data, config, report)?;

    Ok((header, page_map, sections))
}

// ---------------------------------------------------------------------------
// System pages
// ---------------------------------------------------------------------------

/// Plain header of a page map or section map page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemPageHeader {
    pub signature: u32,
    pub decompressed_size: u32,
    pub compressed_size: u32,
    pub compression_type: u32,
    pub checksum: u32,
}

impl SystemPageHeader {
    pub const SIZE: usize = ac18::SYSTEM_PAGE_HEADER_SIZE;

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut c = Cursor::new(bytes);
        Ok(Self {
            signature: c.read_u32::<LittleEndian>()?,
            decompressed_size: c.read_u32::<LittleEndian>()?,
            compressed_size: c.read_u32::<LittleEndian>()?,
            compression_type: c.read_u32::<LittleEndian>()?,
            checksum: c.read_u32::<LittleEndian>()?,
        })
    }

    /// Checksum of the header (checksum field zeroed) chained into the data.
    pub fn compute_checksum(&self, compressed: &[u8]) -> u32 {
        let mut header = [0u8; Self::SIZE];
        for (slot, value) in header.chunks_exact_mut(4).zip([
            self.signature,
            self.decompressed_size,
            self.compressed_size,
            self.compression_type,
            0,
        ]) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        page_checksum(page_checksum(0, &header), compressed)
    }
}

/// Read, verify and decompress the system page at `address`.
///
/// A checksum mismatch is recorded under `check`; a page that cannot be
/// read at all is an error.
pub fn read_system_page(
    raw: &[u8],
    address: u64,
    signature: u32,
    check: &str,
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<Vec<u8>> {
    let span = |start: u64, len: u64| {
        start
            .checked_add(len)
            .filter(|&end| end <= raw.len() as u64)
            .map(|end| &raw[start as usize..end as usize])
            .ok_or_else(|| DwgError::CorruptLocator {
                name: check.to_string(),
                reason: format!(
                    "{:#X} bytes at {:#X} exceed the {}-byte file",
                    len,
                    start,
                    raw.len()
                ),
            })
    };

    let header = SystemPageHeader::parse(span(address, SystemPageHeader::SIZE as u64)?)?;
    if header.signature != signature {
        return Err(DwgError::InvalidFormat(format!(
            "{} at {:#X}: page type {:#010X}, expected {:#010X}",
            check, address, header.signature, signature
        )));
    }
    if header.decompressed_size as u64 > MAX_SECTION_SIZE {
        return Err(DwgError::CorruptLocator {
            name: check.to_string(),
            reason: format!("declared size {:#X} is implausible", header.decompressed_size),
        });
    }
    let compressed = span(
        address + SystemPageHeader::SIZE as u64,
        header.compressed_size as u64,
    )?;

    if config.verify_checksums {
        let computed = header.compute_checksum(compressed);
        if computed == header.checksum {
            report.pass(check, format!("page checksum {:#010X}", computed));
        } else {
            report.push(
                Finding::fail(
                    FindingKind::InvalidCrc,
                    check,
                    format!(
                        "page checksum mismatch: stored {:#010X}, computed {:#010X}",
                        header.checksum, computed
                    ),
                )
                .at(address),
            );
        }
    }

    let data = if header.compression_type == ac18::SYSTEM_PAGE_COMPRESSION {
        lz77_ac18::decompress(compressed, header.decompressed_size as usize)?
    } else {
        compressed.to_vec()
    };
    if data.len() != header.decompressed_size as usize {
        report.push(
            Finding::warning(
                FindingKind::Corrupted,
                check,
                format!(
                    "decompressed to {} bytes, header declares {}",
                    data.len(),
                    header.decompressed_size
                ),
            )
            .at(address),
        );
    }
    Ok(data)
}

// ---------------------------------------------------------------------------
// Page map
// ---------------------------------------------------------------------------

/// Parse `(id, size)` pairs; gap entries carry four more i32 values.
///
/// Parsing stops at the first abnormal entry since every later address
/// depends on it.
fn parse_page_map(
    data: &[u8],
    header: &Ac18Header,
    file_size: u64,
    report: &mut ValidationReport,
) -> PageMap {
    let mut map = PageMap::new();
    let mut c = Cursor::new(data);
    let mut address = ac18::PAGE_MAP_BASE;

    while (c.position() as usize) + 8 <= data.len() {
        let entry_pos = c.position();
        let (id, size) = match (c.read_i32::<LittleEndian>(), c.read_i32::<LittleEndian>()) {
            (Ok(id), Ok(size)) => (id as i64, size as i64),
            _ => break,
        };

        let too_large = header.last_page_id > 0 && id > header.last_page_id as i64;
        let abnormal = if id == 0 || too_large {
            Some(format!("abnormal page id {}", id))
        } else if size <= 0 {
            Some(format!("abnormal size {} for page {}", size, id))
        } else if address + size as u64 > file_size {
            Some(format!(
                "page {} at {:#X}+{:#X} is past the end of the file",
                id, address, size
            ))
        } else {
            None
        };
        if let Some(reason) = abnormal {
            report.push(Finding::fail(FindingKind::Corrupted, "page_map", reason).at(entry_pos));
            break;
        }

        if id < 0 {
            let mut links = [0i32; 4];
            for link in links.iter_mut() {
                *link = c.read_i32::<LittleEndian>().unwrap_or(0);
            }
            report.push(
                Finding::warning(
                    FindingKind::HandleGap,
                    "page_map",
                    format!("free gap {} of {:#X} bytes", id, size),
                )
                .at(address),
            );
            map.push_gap(PageGap {
                id,
                address,
                size: size as u64,
                parent: links[0],
                left: links[1],
                right: links[2],
            });
        } else {
            let entry = PageEntry {
                id,
                address,
                size: size as u64,
            };
            if map.insert(entry).is_some() {
                report.push(
                    Finding::fail(
                        FindingKind::Corrupted,
                        "page_map",
                        format!("page id {} listed twice", id),
                    )
                    .at(entry_pos),
                );
            }
        }
        address += size as u64;
    }

    if map.gaps().len() != header.gap_amount as usize {
        report.warning(
            FindingKind::Corrupted,
            "page_map",
            format!(
                "{} gaps found, header declares {}",
                map.gaps().len(),
                header.gap_amount
            ),
        );
    }
    report.pass(
        "page_map",
        format!("{} pages, {} gaps", map.len(), map.gaps().len()),
    );
    debug!(pages = map.len(), gaps = map.gaps().len(), "R18 page map");
    map
}

// ---------------------------------------------------------------------------
// Section map
// ---------------------------------------------------------------------------

fn parse_section_map(
    data: &[u8],
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<Vec<SectionDescriptor>> {
    if data.len() < ac18::SECTION_MAP_HEADER_SIZE {
        return Err(DwgError::TruncatedStream {
            bit_position: 0,
            needed: ac18::SECTION_MAP_HEADER_SIZE as u64 * 8,
            available: data.len() as u64 * 8,
        });
    }

    let mut c = Cursor::new(data);
    let entry_count = c.read_u32::<LittleEndian>()?;
    c.set_position(ac18::SECTION_MAP_HEADER_SIZE as u64);

    let mut sections = Vec::new();
    for index in 0..entry_count {
        let pos = c.position() as usize;
        if pos + ac18::SECTION_ENTRY_SIZE > data.len() {
            let err = DwgError::CorruptLocator {
                name: "section_map".to_string(),
                reason: format!(
                    "entry {} of {} is cut off at byte {:#X}",
                    index, entry_count, pos
                ),
            };
            config.absorb(report, "section_map", err)?;
            break;
        }

        let size = c.read_u64::<LittleEndian>()?;
        let page_count = c.read_u32::<LittleEndian>()?;
        let max_page_size = c.read_u32::<LittleEndian>()? as u64;
        let _unknown = c.read_u32::<LittleEndian>()?;
        let compression = c.read_u32::<LittleEndian>()?;
        let section_id = c.read_u32::<LittleEndian>()?;
        let encrypted = c.read_u32::<LittleEndian>()?;
        let name_start = c.position() as usize;
        let name_bytes = &data[name_start..name_start + ac18::SECTION_NAME_SIZE];
        c.set_position((name_start + ac18::SECTION_NAME_SIZE) as u64);
        let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        let check = if name.is_empty() { "section_map" } else { name.as_str() };
        if !matches!(compression, 1 | 2) {
            report.push(
                Finding::fail(
                    FindingKind::SyntaxError,
                    check,
                    format!("compression flag {} is neither 1 nor 2", compression),
                )
                .at(pos as u64),
            );
        }
        if encrypted > 2 {
            report.push(
                Finding::fail(
                    FindingKind::SyntaxError,
                    check,
                    format!("encryption flag {} is not 0, 1 or 2", encrypted),
                )
                .at(pos as u64),
            );
        }

        let mut section = SectionDescriptor::new(name);
        section.section_id = section_id;
        section.size = size;
        section.max_page_size = max_page_size;
        section.page_count = page_count as u64;
        section.compression = compression;
        section.encrypted = encrypted;

        for page_index in 0..page_count {
            if (c.position() as usize) + ac18::PAGE_INFO_SIZE > data.len() {
                let err = DwgError::CorruptLocator {
                    name: section.name.clone(),
                    reason: format!("page {} of {} is cut off", page_index, page_count),
                };
                config.absorb(report, &section.name, err)?;
                break;
            }
            let page_id = c.read_i32::<LittleEndian>()? as i64;
            let compressed_size = c.read_u32::<LittleEndian>()? as u64;
            let data_offset = c.read_u64::<LittleEndian>()?;
            section.pages.push(SectionPage {
                page_id,
                file_offset: 0,
                page_size: 0,
                data_offset,
                compressed_size,
                uncompressed_size: max_page_size.min(size.saturating_sub(data_offset)),
                checksum: None,
                crc: None,
            });
        }

        // Unnamed entries carry no data
        if !section.name.is_empty() {
            sections.push(section);
        }
    }

    debug!(sections = sections.len(), "R18 section map");
    Ok(sections)
}
