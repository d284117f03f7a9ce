//! Section decoder.
//!
//! Turns each section map entry into a [`Section`]: the pages are read from
//! the raw buffer, checked, decompressed and placed at their logical offset.
//! A page that fails to decode marks its section invalid and is recorded as
//! a finding; the remaining pages and sections are still decoded.

use tracing::{debug, trace};

use super::checksum::page_checksum;
use super::compression::{lz77_ac18, lz77_ac21};
use super::constants::MAX_SECTION_SIZE;
use super::encryption::{decrypt_page_header, DataPageHeader};
use super::file_header::{FileHeader, SectionDescriptor, SectionPage};
use super::reader::DwgReaderConfiguration;
use super::reed_solomon::{self, Encoding, PAGE_DATA_SIZE};
use crate::error::{DwgError, Result};
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::types::DwgVersion;

/// Offset/length view into the raw file buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteSpan {
    pub offset: u64,
    pub len: u64,
}

impl ByteSpan {
    pub fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.len)
    }

    /// The bytes of this span, or `None` if it leaves `raw`.
    pub fn slice<'a>(&self, raw: &'a [u8]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.offset).ok()?;
        let end = usize::try_from(self.end()).ok()?;
        raw.get(start..end)
    }
}

/// Outcome of decoding one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub page_id: i64,
    /// Where the page lives in the file
    pub span: ByteSpan,
    /// Offset of the page's data inside the decoded section
    pub data_offset: u64,
    pub stored_checksum: Option<u64>,
    /// `None` when the format stores no recomputable checksum (R21) or
    /// checksum verification is off
    pub computed_checksum: Option<u64>,
    pub valid: bool,
}

/// A decoded section.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub section_id: u32,
    pub hash_code: Option<u64>,
    pub compressed: bool,
    /// 0 = plain, 1 = encrypted, 2 = unknown
    pub encrypted: u32,
    /// Declared decompressed size
    pub size: u64,
    pub pages: Vec<PageRecord>,
    /// Decompressed payload; empty for encrypted sections
    pub data: Vec<u8>,
    pub valid: bool,
}

impl Section {
    fn from_descriptor(desc: &SectionDescriptor, version: DwgVersion) -> Self {
        let compressed = match version {
            DwgVersion::R18 => desc.is_compressed(),
            DwgVersion::R21 => desc
                .pages
                .iter()
                .any(|p| p.compressed_size < p.uncompressed_size),
        };
        Self {
            name: desc.name.clone(),
            section_id: desc.section_id,
            hash_code: desc.hash_code,
            compressed,
            encrypted: desc.encrypted,
            size: desc.size,
            pages: Vec::with_capacity(desc.pages.len()),
            data: Vec::new(),
            valid: true,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted != 0
    }

    /// Whether downstream readers may interpret the payload.
    pub fn is_usable(&self) -> bool {
        self.valid && !self.is_encrypted()
    }
}

/// Decoded sections, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct SectionSet {
    sections: Vec<Section>,
}

impl SectionSet {
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Payload of a usable section.
    pub fn data(&self, name: &str) -> Option<&[u8]> {
        self.get(name)
            .filter(|s| s.is_usable())
            .map(|s| s.data.as_slice())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl FromIterator<Section> for SectionSet {
    fn from_iter<I: IntoIterator<Item = Section>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Decode every section listed in the file header.
pub fn decode_sections(
    raw: &[u8],
    header: &FileHeader,
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<SectionSet> {
    let mut sections = Vec::with_capacity(header.sections.len());
    for desc in &header.sections {
        sections.push(decode_section(raw, desc, header.version, config, report)?);
    }
    Ok(sections.into_iter().collect())
}

fn decode_section(
    raw: &[u8],
    desc: &SectionDescriptor,
    version: DwgVersion,
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<Section> {
    let mut section = Section::from_descriptor(desc, version);

    if section.is_encrypted() {
        report.warning(
            FindingKind::Corrupted,
            section.name.clone(),
            format!(
                "section is flagged {} (encrypted), payload left opaque",
                section.encrypted
            ),
        );
        section.pages = desc.pages.iter().map(opaque_page).collect();
        return Ok(section);
    }
    if section.size > MAX_SECTION_SIZE {
        let err = DwgError::CorruptLocator {
            name: section.name.clone(),
            reason: format!("declared size {:#X} is implausible", section.size),
        };
        config.absorb(report, &section.name, err)?;
        section.valid = false;
        return Ok(section);
    }

    section.data = vec![0u8; section.size as usize];
    for (index, page) in desc.pages.iter().enumerate() {
        let decoded = check_page_sizes(desc, page).and_then(|()| match version {
            DwgVersion::R18 => decode_ac18_page(raw, desc, index, page, config, report),
            DwgVersion::R21 => decode_ac21_page(raw, desc, page, report),
        });
        let (record, payload, target) = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                config.absorb(report, &section.name, err)?;
                section.valid = false;
                section.pages.push(PageRecord {
                    valid: false,
                    ..opaque_page(page)
                });
                continue;
            }
        };
        section.valid &= record.valid;
        place(&mut section.data, target, &payload, &section.name, report);
        section.pages.push(record);
    }

    if section.valid {
        report.pass(
            section.name.clone(),
            format!(
                "{} pages, {} bytes decoded",
                section.pages.len(),
                section.data.len()
            ),
        );
    }
    debug!(
        name = %section.name,
        pages = section.pages.len(),
        size = section.size,
        valid = section.valid,
        "decoded section"
    );
    Ok(section)
}

/// Page sizes come straight from the section map and bound every buffer
/// the page decoders allocate.
fn check_page_sizes(desc: &SectionDescriptor, page: &SectionPage) -> Result<()> {
    if page.compressed_size > MAX_SECTION_SIZE || page.uncompressed_size > MAX_SECTION_SIZE {
        return Err(DwgError::CorruptLocator {
            name: desc.name.clone(),
            reason: format!(
                "page {} declares sizes {:#X}/{:#X}",
                page.page_id, page.compressed_size, page.uncompressed_size
            ),
        });
    }
    Ok(())
}

fn opaque_page(page: &SectionPage) -> PageRecord {
    PageRecord {
        page_id: page.page_id,
        span: ByteSpan::new(page.file_offset, page.page_size),
        data_offset: page.data_offset,
        stored_checksum: page.checksum,
        computed_checksum: None,
        valid: true,
    }
}

/// Copy a page payload into the section buffer, clamped to its size.
fn place(
    buffer: &mut [u8],
    offset: u64,
    payload: &[u8],
    name: &str,
    report: &mut ValidationReport,
) {
    let start = (offset as usize).min(buffer.len());
    let end = start.saturating_add(payload.len()).min(buffer.len());
    buffer[start..end].copy_from_slice(&payload[..end - start]);
    if end - start < payload.len() {
        report.warning(
            FindingKind::Corrupted,
            name,
            format!(
                "page data at {:#X}+{:#X} overruns the {}-byte section",
                offset,
                payload.len(),
                buffer.len()
            ),
        );
    }
}

// ---------------------------------------------------------------------------
// R18 data pages
// ---------------------------------------------------------------------------

/// Decrypt, verify and decompress one R18 page.
///
/// Returns the page record, the payload and its target offset.
fn decode_ac18_page(
    raw: &[u8],
    desc: &SectionDescriptor,
    index: usize,
    page: &SectionPage,
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<(PageRecord, Vec<u8>, u64)> {
    let span = ByteSpan::new(page.file_offset, page.page_size);
    let bytes = span.slice(raw).ok_or_else(|| DwgError::CorruptLocator {
        name: desc.name.clone(),
        reason: format!("page {} leaves the file", page.page_id),
    })?;
    let header_bytes: &[u8; DataPageHeader::SIZE] = bytes
        .get(..DataPageHeader::SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| DwgError::CorruptLocator {
            name: desc.name.clone(),
            reason: format!("page {} is shorter than its header", page.page_id),
        })?;
    let header = decrypt_page_header(header_bytes, page.file_offset);
    trace!(page = page.page_id, ?header, "R18 data page");

    if !header.is_data_page() {
        return Err(DwgError::InvalidFormat(format!(
            "page {} at {:#X} has type {:#010X}",
            page.page_id, page.file_offset, header.page_type
        )));
    }
    let compressed = bytes
        .get(DataPageHeader::SIZE..DataPageHeader::SIZE + header.compressed_size as usize)
        .ok_or_else(|| DwgError::CorruptLocator {
            name: desc.name.clone(),
            reason: format!(
                "page {} declares {:#X} compressed bytes in a {:#X}-byte page",
                page.page_id, header.compressed_size, page.page_size
            ),
        })?;

    let mut valid = true;
    let mut computed_checksum = None;
    if config.verify_checksums {
        let data_checksum = page_checksum(0, compressed);
        let header_checksum = header.compute_header_checksum();
        computed_checksum = Some(data_checksum as u64);
        if data_checksum != header.data_checksum || header_checksum != header.header_checksum {
            valid = false;
            report.push(
                Finding::fail(
                    FindingKind::InvalidCrc,
                    desc.name.clone(),
                    format!(
                        "page {} checksum mismatch: data stored {:#010X} computed {:#010X}, \
                         header stored {:#010X} computed {:#010X}",
                        page.page_id,
                        header.data_checksum,
                        data_checksum,
                        header.header_checksum,
                        header_checksum
                    ),
                )
                .at(page.file_offset),
            );
        }
    }

    let expected = page.uncompressed_size as usize;
    let payload = if desc.is_compressed() {
        lz77_ac18::decompress(compressed, expected)?
    } else {
        compressed.to_vec()
    };
    if payload.len() != expected {
        report.push(
            Finding::warning(
                FindingKind::Corrupted,
                desc.name.clone(),
                format!(
                    "page {} decoded to {} bytes, expected {}",
                    page.page_id,
                    payload.len(),
                    expected
                ),
            )
            .at(page.file_offset),
        );
    }

    let record = PageRecord {
        page_id: page.page_id,
        span,
        data_offset: page.data_offset,
        stored_checksum: Some(header.data_checksum as u64),
        computed_checksum,
        valid,
    };
    Ok((record, payload, index as u64 * desc.max_page_size))
}

// ---------------------------------------------------------------------------
// R21 data pages
// ---------------------------------------------------------------------------

/// Reed-Solomon decode and decompress one R21 page.
fn decode_ac21_page(
    raw: &[u8],
    desc: &SectionDescriptor,
    page: &SectionPage,
    report: &mut ValidationReport,
) -> Result<(PageRecord, Vec<u8>, u64)> {
    let encoding = Encoding::from_raw(desc.encoding as u64)?;
    let block_count = reed_solomon::data_page_block_count(page.compressed_size);
    let encoded_len = PAGE_DATA_SIZE
        .checked_mul(block_count)
        .ok_or_else(|| DwgError::CorruptLocator {
            name: desc.name.clone(),
            reason: format!("page {} block count {} overflows", page.page_id, block_count),
        })?;
    let read_len = usize::try_from(page.page_size)
        .unwrap_or(usize::MAX)
        .max(encoded_len);

    let start = usize::try_from(page.file_offset)
        .unwrap_or(usize::MAX)
        .min(raw.len());
    let end = start.saturating_add(read_len).min(raw.len());
    let decoded = reed_solomon::decode(&raw[start..end], block_count, PAGE_DATA_SIZE, encoding)?;

    let expected = page.uncompressed_size as usize;
    let payload = if page.compressed_size < page.uncompressed_size {
        let source = decoded
            .get(..page.compressed_size as usize)
            .unwrap_or(&decoded[..]);
        lz77_ac21::decompress(source, expected)?
    } else {
        decoded.get(..expected).unwrap_or(&decoded[..]).to_vec()
    };

    let valid = payload.len() == expected;
    if !valid {
        report.push(
            Finding::fail(
                FindingKind::Corrupted,
                desc.name.clone(),
                format!(
                    "page {} decoded to {} bytes, expected {}",
                    page.page_id,
                    payload.len(),
                    expected
                ),
            )
            .at(page.file_offset),
        );
    }
    let record = PageRecord {
        page_id: page.page_id,
        span: ByteSpan::new(page.file_offset, page.page_size),
        data_offset: page.data_offset,
        stored_checksum: page.checksum,
        computed_checksum: None,
        valid,
    };
    Ok((record, payload, page.data_offset))
}
