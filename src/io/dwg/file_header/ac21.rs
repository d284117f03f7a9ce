//! R21 (AC1021) container header.
//!
//! The 0x3D8 bytes at 0x80 hold three interleaved Reed-Solomon codewords.
//! Their data bytes start with a 0x20-byte head (CRC, key, compressed size)
//! followed by the LZ77 AC21 compressed [`Dwg21CompressedMetadata`]. Five
//! u64 check values follow the encoded block at 0x458.
//!
//! System pages (page map, section map) are compressed, padded to 8 bytes,
//! repeated `correction_factor` times and Reed-Solomon encoded with k = 239.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use tracing::{debug, trace};

use super::compressed_metadata::Dwg21CompressedMetadata;
use super::page_map::{PageEntry, PageGap, PageMap};
use super::section_descriptor::{SectionDescriptor, SectionPage};
use crate::error::{DwgError, Result};
use crate::io::dwg::compression::lz77_ac21;
use crate::io::dwg::constants::{ac21, preamble, MAX_SECTION_SIZE};
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::io::dwg::reed_solomon::{self, SYSTEM_DATA_SIZE};
use crate::report::{Finding, FindingKind, ValidationReport};

/// Decoded R21 header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ac21Header {
    pub crc: u64,
    pub key: u64,
    pub compressed_crc: u64,
    /// Negative when the metadata is stored uncompressed
    pub compressed_size: i32,
    pub length2: i32,
    pub metadata: Dwg21CompressedMetadata,
    /// normal CRC, mirrored CRC, two random values, encoded CRC seed
    pub tail: [u64; ac21::HEADER_TAIL_FIELDS],
}

impl Ac21Header {
    /// File offset of the five check values.
    pub const TAIL_OFFSET: usize = preamble::SIZE + ac21::RS_ENCODED_BLOCK_SIZE;
}

pub(super) fn read(
    raw: &[u8],
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<(Ac21Header, PageMap, Vec<SectionDescriptor>)> {
    let header = read_header(raw, report)?;
    let meta = &header.metadata;

    let page_map_data = read_system_page(
        raw,
        meta.pages_map_address(),
        meta.pages_map_size_compressed,
        meta.pages_map_size_uncompressed,
        meta.pages_map_correction_factor,
        "page_map",
        report,
    )?;
    let page_map = parse_page_map(&page_map_data, meta, raw.len() as u64, report);

    let section_map_page = page_map.get(meta.sections_map_id as i64).ok_or_else(|| {
        DwgError::InvalidFormat(format!(
            "section map page {} is not in the page map",
            meta.sections_map_id
        ))
    })?;
    let section_map_data = read_system_page(
        raw,
        section_map_page.address,
        meta.sections_map_size_compressed,
        meta.sections_map_size_uncompressed,
        meta.sections_map_correction_factor,
        "section_map",
        report,
    )?;
    let sections = parse_section_map(&section_map_data, config, report)?;

    Ok((header, page_map, sections))
}

// ---------------------------------------------------------------------------
// Header block
// ---------------------------------------------------------------------------

fn read_header(raw: &[u8], report: &mut ValidationReport) -> Result<Ac21Header> {
    let start = preamble::SIZE;
    let tail_end = Ac21Header::TAIL_OFFSET + ac21::HEADER_TAIL_FIELDS * 8;
    if raw.len() < tail_end {
        return Err(DwgError::TruncatedStream {
            bit_position: start as u64 * 8,
            needed: (tail_end - start) as u64 * 8,
            available: raw.len().saturating_sub(start) as u64 * 8,
        });
    }

    let decoded = reed_solomon::deinterleave(
        &raw[start..Ac21Header::TAIL_OFFSET],
        ac21::RS_HEADER_BLOCKS,
        SYSTEM_DATA_SIZE,
    )?;

    let mut c = Cursor::new(&decoded[..]);
    let crc = c.read_u64::<LittleEndian>()?;
    let key = c.read_u64::<LittleEndian>()?;
    let compressed_crc = c.read_u64::<LittleEndian>()?;
    let compressed_size = c.read_i32::<LittleEndian>()?;
    let length2 = c.read_i32::<LittleEndian>()?;

    let length = compressed_size.unsigned_abs() as usize;
    if length as u64 >= (raw.len() as u64).saturating_sub(0x20) {
        report.push(
            Finding::fail(
                FindingKind::SyntaxError,
                "file_header",
                format!("metadata size {:#X} exceeds the file", length),
            )
            .at(start as u64),
        );
    }
    let body = decoded
        .get(ac21::HEADER_HEAD_SIZE..ac21::HEADER_HEAD_SIZE + length)
        .ok_or_else(|| {
            DwgError::InvalidFormat(format!(
                "metadata size {:#X} exceeds the {:#X}-byte header block",
                length,
                decoded.len() - ac21::HEADER_HEAD_SIZE
            ))
        })?;
    let metadata = match compressed_size {
        0 => {
            return Err(DwgError::InvalidFormat(
                "header metadata size is zero".to_string(),
            ))
        }
        n if n < 0 => Dwg21CompressedMetadata::parse(body)?,
        _ => Dwg21CompressedMetadata::parse(&lz77_ac21::decompress(
            body,
            ac21::DECOMPRESSED_HEADER_SIZE,
        )?)?,
    };

    if metadata.header_size != ac21::HEADER_SIZE_MAGIC {
        report.push(
            Finding::fail(
                FindingKind::SyntaxError,
                "file_header",
                format!("header size field is {:#X}, expected 0x70", metadata.header_size),
            )
            .at(start as u64),
        );
    }
    let file_size = raw.len() as u64;
    for (field, offset) in [
        ("pages_map_offset", metadata.pages_map_offset),
        ("pages_map2_offset", metadata.pages_map2_offset),
    ] {
        if offset.saturating_add(ac21::DATA_PAGE_BASE_OFFSET) >= file_size {
            report.fail(
                FindingKind::SyntaxError,
                "file_header",
                format!("{} {:#X} is past the end of the file", field, offset),
            );
        }
    }

    let mut tail = [0u64; ac21::HEADER_TAIL_FIELDS];
    let mut c = Cursor::new(&raw[Ac21Header::TAIL_OFFSET..tail_end]);
    for value in tail.iter_mut() {
        *value = c.read_u64::<LittleEndian>()?;
    }

    // Only the Reed-Solomon framing and the decompression vouch for the header
    report.warning(
        FindingKind::Unverified,
        "file_header",
        format!(
            "header decoded, CRC-64 {:#018X} not verified",
            metadata.header_crc
        ),
    );
    debug!(
        pages_map = metadata.pages_map_address(),
        sections_map_id = metadata.sections_map_id,
        "decoded R21 header"
    );

    Ok(Ac21Header {
        crc,
        key,
        compressed_crc,
        compressed_size,
        length2,
        metadata,
        tail,
    })
}

// ---------------------------------------------------------------------------
// System pages
// ---------------------------------------------------------------------------

/// Read, decode and decompress an R21 system page.
pub fn read_system_page(
    raw: &[u8],
    address: u64,
    compressed_size: u64,
    uncompressed_size: u64,
    correction_factor: u64,
    check: &str,
    report: &mut ValidationReport,
) -> Result<Vec<u8>> {
    if uncompressed_size > MAX_SECTION_SIZE || compressed_size > MAX_SECTION_SIZE {
        return Err(DwgError::CorruptLocator {
            name: check.to_string(),
            reason: format!(
                "declared sizes {:#X}/{:#X} are implausible",
                compressed_size, uncompressed_size
            ),
        });
    }
    if correction_factor == 0 {
        return Err(DwgError::InvalidFormat(format!(
            "{}: correction factor is zero",
            check
        )));
    }

    let (page_size, block_count) =
        reed_solomon::system_page_layout(compressed_size, correction_factor);
    let start = usize::try_from(address)
        .ok()
        .filter(|&s| s < raw.len())
        .ok_or_else(|| DwgError::CorruptLocator {
            name: check.to_string(),
            reason: format!("address {:#X} is past the end of the file", address),
        })?;
    let end = start.saturating_add(page_size).min(raw.len());
    trace!(check, address, page_size, block_count, "reading system page");

    let decoded = reed_solomon::deinterleave(&raw[start..end], block_count, SYSTEM_DATA_SIZE)?;
    let data = if compressed_size < uncompressed_size {
        let source = decoded
            .get(..compressed_size as usize)
            .unwrap_or(&decoded[..]);
        lz77_ac21::decompress(source, uncompressed_size as usize)?
    } else {
        decoded
            .get(..uncompressed_size as usize)
            .unwrap_or(&decoded[..])
            .to_vec()
    };

    if data.len() as u64 != uncompressed_size {
        report.push(
            Finding::warning(
                FindingKind::Corrupted,
                check,
                format!(
                    "decoded {} bytes, header declares {}",
                    data.len(),
                    uncompressed_size
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

/// Parse `(size, id)` pairs. Negative ids mark free gaps.
fn parse_page_map(
    data: &[u8],
    meta: &Dwg21CompressedMetadata,
    file_size: u64,
    report: &mut ValidationReport,
) -> PageMap {
    let mut map = PageMap::new();
    let mut address = ac21::DATA_PAGE_BASE_OFFSET;

    for (index, entry) in data.chunks_exact(16).enumerate() {
        let size = i64::from_le_bytes(entry[..8].try_into().unwrap_or_default());
        let raw_id = i64::from_le_bytes(entry[8..].try_into().unwrap_or_default());
        let id = raw_id.saturating_abs();

        let abnormal = if id <= 0 || id as u64 > meta.pages_max_id {
            Some(format!("abnormal page id {} at entry {}", id, index))
        } else if size <= 0 {
            Some(format!("abnormal size {} at entry {}", size, index))
        } else if address.saturating_add(size as u64) > file_size {
            Some(format!(
                "page {} at {:#X}+{:#X} is past the end of the file",
                id, address, size
            ))
        } else {
            None
        };
        if let Some(reason) = abnormal {
            report.fail(FindingKind::Corrupted, "page_map", reason);
            break;
        }

        if raw_id < 0 {
            report.push(
                Finding::warning(
                    FindingKind::HandleGap,
                    "page_map",
                    format!("free gap {} of {:#X} bytes", raw_id, size),
                )
                .at(address),
            );
            map.push_gap(PageGap {
                id: raw_id,
                address,
                size: size as u64,
                parent: 0,
                left: 0,
                right: 0,
            });
        } else if map
            .insert(PageEntry {
                id,
                address,
                size: size as u64,
            })
            .is_some()
        {
            report.fail(
                FindingKind::Corrupted,
                "page_map",
                format!("page id {} listed twice", id),
            );
        }
        address += size as u64;
    }

    let entries = (map.len() + map.gaps().len()) as u64;
    if meta.pages_max_id < entries {
        report.fail(
            FindingKind::Corrupted,
            "page_map",
            format!(
                "{} entries, header allows at most {}",
                entries, meta.pages_max_id
            ),
        );
    }
    report.pass(
        "page_map",
        format!("{} pages, {} gaps", map.len(), map.gaps().len()),
    );
    debug!(pages = map.len(), gaps = map.gaps().len(), "R21 page map");
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
    let mut sections = Vec::new();
    let mut c = Cursor::new(data);
    let mut index = 0u32;

    while (c.position() as usize) + ac21::SECTION_ENTRY_FIXED_SIZE <= data.len() {
        let entry_pos = c.position();
        let size = c.read_u64::<LittleEndian>()?;
        let max_size = c.read_u64::<LittleEndian>()?;
        let encrypted = c.read_u64::<LittleEndian>()?;
        let hash_code = c.read_u64::<LittleEndian>()?;
        let name_length = c.read_u64::<LittleEndian>()?;
        let _unknown = c.read_u64::<LittleEndian>()?;
        let encoded = c.read_u64::<LittleEndian>()?;
        let page_count = c.read_u64::<LittleEndian>()?;

        if encrypted > 2 || !matches!(encoded, 0 | 1 | 4) {
            report.push(
                Finding::fail(
                    FindingKind::SyntaxError,
                    "section_map",
                    format!(
                        "entry {}: encryption flag {} / encoding {} out of range",
                        index, encrypted, encoded
                    ),
                )
                .at(entry_pos),
            );
            break;
        }

        let remaining = data.len() as u64 - c.position();
        if name_length > remaining {
            let err = DwgError::CorruptLocator {
                name: "section_map".to_string(),
                reason: format!("entry {}: name length {} is cut off", index, name_length),
            };
            config.absorb(report, "section_map", err)?;
            break;
        }
        // Name length is in bytes, not characters
        let name_start = c.position() as usize;
        let name_bytes = &data[name_start..name_start + name_length as usize];
        let (decoded, _) = UTF_16LE.decode_without_bom_handling(name_bytes);
        let name = decoded.trim_end_matches('\0').to_string();
        c.set_position(c.position() + name_length);

        let mut section = SectionDescriptor::new(name);
        section.section_id = index;
        section.hash_code = Some(hash_code);
        section.size = size;
        section.max_page_size = max_size;
        section.page_count = page_count;
        section.compression = 0;
        section.encrypted = encrypted as u32;
        section.encoding = encoded as u32;

        if let Some(expected) = ac21::section_hash(&section.name) {
            if expected != hash_code {
                report.push(
                    Finding::warning(
                        FindingKind::Corrupted,
                        section.name.clone(),
                        format!("hash code {:#X}, expected {:#X}", hash_code, expected),
                    )
                    .at(entry_pos),
                );
            }
        }

        let remaining = data.len() as u64 - c.position();
        let fits = page_count
            .checked_mul(ac21::PAGE_INFO_SIZE as u64)
            .is_some_and(|n| n <= remaining);
        if !fits {
            let err = DwgError::CorruptLocator {
                name: section.name.clone(),
                reason: format!("{} page entries do not fit the section map", page_count),
            };
            config.absorb(report, &section.name, err)?;
            break;
        }
        for _ in 0..page_count {
            let data_offset = c.read_u64::<LittleEndian>()?;
            let _size = c.read_u64::<LittleEndian>()?;
            let page_id = c.read_i64::<LittleEndian>()?;
            let uncompressed_size = c.read_u64::<LittleEndian>()?;
            let compressed_size = c.read_u64::<LittleEndian>()?;
            let checksum = c.read_u64::<LittleEndian>()?;
            let crc = c.read_u64::<LittleEndian>()?;
            section.pages.push(SectionPage {
                page_id,
                file_offset: 0,
                page_size: 0,
                data_offset,
                compressed_size,
                uncompressed_size,
                checksum: Some(checksum),
                crc: Some(crc),
            });
        }

        if !section.name.is_empty() {
            sections.push(section);
        }
        index += 1;
    }

    debug!(sections = sections.len(), "R21 section map");
    Ok(sections)
}
