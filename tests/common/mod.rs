//! Shared test utilities for dwg-forensics integration tests.
//!
//! Builds minimal but complete R18 files in memory: preamble, encrypted
//! file header, page map, section map and one data page per section. Page
//! payloads are stored as LZ77 AC18 literal runs and page headers are
//! encrypted with the crate's own page-header cipher, so every checksum in
//! the file is genuine.
//!
//! [`R21Builder`] does the same for R21: a Reed-Solomon encoded header
//! block, system pages for both maps and one interleaved, uncompressed data
//! page per section.

#![allow(dead_code)]

use std::ops::Range;

use dwg_forensics::io::dwg::checksum::page_checksum;
use dwg_forensics::io::dwg::constants::{ac18, ac21, handle_section, preamble, section_names};
use dwg_forensics::io::dwg::crc::{crc32, crc8};
use dwg_forensics::io::dwg::encryption::{encrypt_page_header, xor_file_header, DataPageHeader};
use dwg_forensics::io::dwg::file_header::{Ac21Header, Dwg21CompressedMetadata};
use dwg_forensics::io::dwg::reed_solomon::{
    data_page_block_count, interleave, system_page_layout, PAGE_DATA_SIZE, SYSTEM_DATA_SIZE,
};

// ===========================================================================
// File builder
// ===========================================================================

struct SectionSpec {
    name: String,
    payload: Vec<u8>,
    bad_checksum: bool,
}

/// Builder for a synthetic R18 file.
pub struct R18Builder {
    sections: Vec<SectionSpec>,
    maintenance: u8,
}

/// A built file plus where each section's page payload landed.
pub struct BuiltFile {
    pub bytes: Vec<u8>,
    bodies: Vec<(String, Range<usize>)>,
}

impl BuiltFile {
    /// File range of the literal bytes of a section's page.
    pub fn body_range(&self, name: &str) -> Range<usize> {
        self.bodies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| panic!("no section {name} in the built file"))
    }
}

impl R18Builder {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            maintenance: 0,
        }
    }

    pub fn section(mut self, name: &str, payload: Vec<u8>) -> Self {
        self.sections.push(SectionSpec {
            name: name.to_string(),
            payload,
            bad_checksum: false,
        });
        self
    }

    /// Store a wrong data checksum in the page header of `name`.
    pub fn wrong_checksum(mut self, name: &str) -> Self {
        for section in self.sections.iter_mut().filter(|s| s.name == name) {
            section.bad_checksum = true;
        }
        self
    }

    pub fn maintenance(mut self, maintenance: u8) -> Self {
        self.maintenance = maintenance;
        self
    }

    pub fn build(&self) -> BuiltFile {
        let mut raw = vec![0u8; ac18::PAGE_MAP_BASE as usize];
        raw[preamble::MAGIC..preamble::MAGIC + 6].copy_from_slice(b"AC1018");
        raw[preamble::MAINTENANCE] = self.maintenance;
        raw[preamble::APP_VERSION] = 0x19;
        raw[preamble::CODE_PAGE..preamble::CODE_PAGE + 2].copy_from_slice(&0x1Eu16.to_le_bytes());

        // (page id, page size) in file order
        let mut pages: Vec<(i32, u32)> = Vec::new();
        let mut bodies = Vec::new();
        let mut page_infos = Vec::new();

        for (index, section) in self.sections.iter().enumerate() {
            let id = index as i32 + 1;
            let offset = raw.len();
            let compressed = literal_stream(&section.payload);
            let mut data_checksum = page_checksum(0, &compressed);
            if section.bad_checksum {
                data_checksum ^= 0x5A5A;
            }
            let mut header = DataPageHeader {
                page_type: ac18::PAGE_TYPE_DATA,
                section_number: id as u32,
                compressed_size: compressed.len() as u32,
                page_size: section.payload.len() as u32,
                data_checksum,
                ..Default::default()
            };
            header.header_checksum = header.compute_header_checksum();
            raw.extend_from_slice(&encrypt_page_header(&header, offset as u64));
            let literal_start = raw.len() + compressed.len() - 1 - section.payload.len();
            raw.extend_from_slice(&compressed);
            bodies.push((
                section.name.clone(),
                literal_start..literal_start + section.payload.len(),
            ));

            let page_size = DataPageHeader::SIZE + compressed.len();
            pages.push((id, page_size as u32));
            page_infos.push((id, compressed.len() as u32));
        }

        let section_map_id = self.sections.len() as i32 + 1;
        let page_map_id = section_map_id + 1;

        let section_map = self.section_map(&page_infos);
        let section_map_page = system_page(ac18::PAGE_TYPE_SECTION_MAP, &section_map);
        pages.push((section_map_id, section_map_page.len() as u32));
        raw.extend_from_slice(&section_map_page);

        // the page map lists itself, so its own size is needed up front
        let entry_bytes = (pages.len() + 1) * 8;
        let own_stream = literal_stream(&vec![0u8; entry_bytes]);
        let own_size = (ac18::SYSTEM_PAGE_HEADER_SIZE + own_stream.len()) as u32;
        pages.push((page_map_id, own_size));
        let mut page_map = Vec::with_capacity(entry_bytes);
        for (id, size) in &pages {
            page_map.extend_from_slice(&id.to_le_bytes());
            page_map.extend_from_slice(&size.to_le_bytes());
        }
        let page_map_address = raw.len() as u64;
        let page_map_page = system_page(ac18::PAGE_TYPE_PAGE_MAP, &page_map);
        assert_eq!(page_map_page.len() as u32, own_size);
        raw.extend_from_slice(&page_map_page);

        let block = self.file_header(page_map_id, section_map_id, page_map_address);
        raw[preamble::SIZE..preamble::SIZE + ac18::ENCRYPTED_HEADER_SIZE].copy_from_slice(&block);

        BuiltFile { bytes: raw, bodies }
    }

    fn section_map(&self, page_infos: &[(i32, u32)]) -> Vec<u8> {
        let count = self.sections.len() as u32;
        let mut out = Vec::new();
        for v in [count, 0x02, ac18::MAX_PAGE_SIZE as u32, 0, count] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for (index, (section, (page_id, compressed_size))) in
            self.sections.iter().zip(page_infos).enumerate()
        {
            out.extend_from_slice(&(section.payload.len() as u64).to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&(ac18::MAX_PAGE_SIZE as u32).to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&ac18::COMPRESSED.to_le_bytes());
            out.extend_from_slice(&(index as u32 + 1).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            let mut name = [0u8; ac18::SECTION_NAME_SIZE];
            name[..section.name.len()].copy_from_slice(section.name.as_bytes());
            out.extend_from_slice(&name);

            out.extend_from_slice(&page_id.to_le_bytes());
            out.extend_from_slice(&compressed_size.to_le_bytes());
            out.extend_from_slice(&0u64.to_le_bytes());
        }
        out
    }

    fn file_header(&self, page_map_id: i32, section_map_id: i32, page_map_address: u64) -> Vec<u8> {
        use ac18::header as h;

        let mut block = vec![0u8; ac18::ENCRYPTED_HEADER_SIZE];
        block[h::ID..h::ID + 12].copy_from_slice(ac18::FILE_ID);
        block[h::LAST_PAGE_ID..h::LAST_PAGE_ID + 4].copy_from_slice(&page_map_id.to_le_bytes());
        block[h::SECTION_AMOUNT..h::SECTION_AMOUNT + 4]
            .copy_from_slice(&(self.sections.len() as u32).to_le_bytes());
        block[h::PAGE_MAP_ID..h::PAGE_MAP_ID + 4].copy_from_slice(&page_map_id.to_le_bytes());
        block[h::PAGE_MAP_ADDRESS..h::PAGE_MAP_ADDRESS + 8]
            .copy_from_slice(&(page_map_address - ac18::PAGE_MAP_BASE).to_le_bytes());
        block[h::SECTION_MAP_ID..h::SECTION_MAP_ID + 4]
            .copy_from_slice(&section_map_id.to_le_bytes());
        let crc = crc32(0, &block);
        block[h::CRC..h::CRC + 4].copy_from_slice(&crc.to_le_bytes());
        xor_file_header(&mut block);
        block
    }
}

/// Page map or section map page: plain header, then a literal run.
fn system_page(signature: u32, payload: &[u8]) -> Vec<u8> {
    let compressed = literal_stream(payload);
    let mut fields = [
        signature,
        payload.len() as u32,
        compressed.len() as u32,
        ac18::SYSTEM_PAGE_COMPRESSION,
        0,
    ];
    let header_bytes = |fields: &[u32; 5]| -> Vec<u8> {
        fields.iter().flat_map(|v| v.to_le_bytes()).collect()
    };
    fields[4] = page_checksum(page_checksum(0, &header_bytes(&fields)), &compressed);
    let mut out = header_bytes(&fields);
    out.extend_from_slice(&compressed);
    out
}

/// LZ77 AC18 stream holding `data` as one literal run.
pub fn literal_stream(data: &[u8]) -> Vec<u8> {
    let n = data.len();
    assert!(n >= 4, "a leading literal run holds at least 4 bytes");
    let mut out = Vec::with_capacity(n + 8);
    if n <= 18 {
        out.push((n - 3) as u8);
    } else {
        out.push(0);
        let mut rest = n - 18;
        while rest > 0xFF {
            out.push(0);
            rest -= 0xFF;
        }
        out.push(rest as u8);
    }
    out.extend_from_slice(data);
    out.push(0x11);
    out
}

// ===========================================================================
// R21 file builder
// ===========================================================================

struct R21SectionSpec {
    name: String,
    payload: Vec<u8>,
    /// (compressed, uncompressed) stored in the section map instead of the
    /// payload length
    declared: Option<(u64, u64)>,
}

/// Builder for a synthetic R21 file.
///
/// Pages are laid out from 0x480 in page-id order: one data page per
/// section, then the section map, then the page map.
pub struct R21Builder {
    sections: Vec<R21SectionSpec>,
}

impl R21Builder {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, name: &str, payload: Vec<u8>) -> Self {
        self.sections.push(R21SectionSpec {
            name: name.to_string(),
            payload,
            declared: None,
        });
        self
    }

    /// Store these page sizes in the section map entry of `name`.
    pub fn declared_sizes(mut self, name: &str, compressed: u64, uncompressed: u64) -> Self {
        for section in self.sections.iter_mut().filter(|s| s.name == name) {
            section.declared = Some((compressed, uncompressed));
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut raw = vec![0u8; ac21::DATA_PAGE_BASE_OFFSET as usize];
        raw[preamble::MAGIC..preamble::MAGIC + 6].copy_from_slice(b"AC1021");
        raw[preamble::APP_VERSION] = 0x1F;
        raw[preamble::CODE_PAGE..preamble::CODE_PAGE + 2].copy_from_slice(&0x1Eu16.to_le_bytes());

        // page sizes in id order, which is also file order
        let mut sizes: Vec<usize> = Vec::new();
        for section in &self.sections {
            let blocks = data_page_block_count(section.payload.len() as u64);
            let mut page = interleave(&section.payload, blocks, PAGE_DATA_SIZE);
            page.resize((page.len() + 0x1F) & !0x1F, 0);
            sizes.push(page.len());
            raw.extend_from_slice(&page);
        }

        let section_map_id = self.sections.len() as u64 + 1;
        let page_map_id = section_map_id + 1;

        let section_map = self.section_map(&sizes);
        let section_map_page = r21_system_page(&section_map);
        sizes.push(section_map_page.len());
        raw.extend_from_slice(&section_map_page);

        let entry_bytes = (sizes.len() + 1) * 16;
        sizes.push(system_page_layout(entry_bytes as u64, 1).0);
        let mut page_map = Vec::with_capacity(entry_bytes);
        for (index, size) in sizes.iter().enumerate() {
            page_map.extend_from_slice(&(*size as i64).to_le_bytes());
            page_map.extend_from_slice(&(index as i64 + 1).to_le_bytes());
        }
        let page_map_address = raw.len() as u64;
        let page_map_page = r21_system_page(&page_map);
        assert_eq!(Some(&page_map_page.len()), sizes.last());
        raw.extend_from_slice(&page_map_page);

        let meta = Dwg21CompressedMetadata {
            file_size: raw.len() as u64,
            pages_map_offset: page_map_address - ac21::DATA_PAGE_BASE_OFFSET,
            pages_map_id: page_map_id,
            pages_map_size_compressed: page_map.len() as u64,
            pages_map_size_uncompressed: page_map.len() as u64,
            pages_map_correction_factor: 1,
            pages_amount: page_map_id,
            pages_max_id: page_map_id,
            sections_amount: self.sections.len() as u64,
            sections_map_id: section_map_id,
            sections_map_size_compressed: section_map.len() as u64,
            sections_map_size_uncompressed: section_map.len() as u64,
            sections_map_correction_factor: 1,
            ..Default::default()
        };
        let block = r21_header_block(&meta);
        raw[preamble::SIZE..preamble::SIZE + block.len()].copy_from_slice(&block);
        raw[Ac21Header::TAIL_OFFSET..Ac21Header::TAIL_OFFSET + 8]
            .copy_from_slice(&page_map_address.to_le_bytes());
        raw
    }

    fn section_map(&self, page_sizes: &[usize]) -> Vec<u8> {
        let mut out = Vec::new();
        for (index, (section, page_size)) in self.sections.iter().zip(page_sizes).enumerate() {
            let mut name: Vec<u8> = section
                .name
                .encode_utf16()
                .chain(Some(0))
                .flat_map(u16::to_le_bytes)
                .collect();
            let hash = ac21::section_hash(&section.name).unwrap_or(0);
            let size = section.payload.len() as u64;
            for v in [size, 0xF800, 0, hash, name.len() as u64, 0, 4, 1] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.append(&mut name);

            let (compressed, uncompressed) = section.declared.unwrap_or((size, size));
            let page_id = index as u64 + 1;
            for v in [0, *page_size as u64, page_id, uncompressed, compressed, 0, 0] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }
}

/// Uncompressed system page with correction factor 1.
fn r21_system_page(payload: &[u8]) -> Vec<u8> {
    let (page_size, blocks) = system_page_layout(payload.len() as u64, 1);
    let mut page = interleave(payload, blocks, SYSTEM_DATA_SIZE);
    page.resize(page_size, 0);
    page
}

/// Header block at 0x80: head fields, then the metadata stored uncompressed.
fn r21_header_block(meta: &Dwg21CompressedMetadata) -> Vec<u8> {
    let body = meta.to_bytes();
    let mut data = Vec::new();
    for v in [0u64, 0, 0] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    data.extend_from_slice(&(-(body.len() as i32)).to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&body);
    let mut block = interleave(&data, ac21::RS_HEADER_BLOCKS, SYSTEM_DATA_SIZE);
    block.resize(ac21::RS_ENCODED_BLOCK_SIZE, 0);
    block
}

// ===========================================================================
// Section payloads
// ===========================================================================

pub const AUTHOR: &str = "J. Doe";
/// 2005-01-01 12:00:00
pub const CREATE_DATE: (u32, u32) = (2_453_372, 43_200_000);
pub const APP_VERSION: &str = "16.2.54.0";
pub const SAVES: u32 = 12;

fn code_page_text(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16 + 1).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn unicode_text(out: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().chain(Some(0)).collect();
    out.extend_from_slice(&(units.len() as u16).to_le_bytes());
    for u in units {
        out.extend_from_slice(&u.to_le_bytes());
    }
}

pub fn summary_info() -> Vec<u8> {
    let mut out = Vec::new();
    for s in ["Site plan", "", AUTHOR, "survey", "", "reviewer", "4", ""] {
        code_page_text(&mut out, s);
    }
    for (day, ms) in [(0, 5_400_000), CREATE_DATE, (2_453_400, 1_000)] {
        out.extend_from_slice(&day.to_le_bytes());
        out.extend_from_slice(&ms.to_le_bytes());
    }
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&[0; 8]);
    out
}

pub fn app_info() -> Vec<u8> {
    let mut out = Vec::new();
    unicode_text(&mut out, "AppInfoDataList");
    out.extend_from_slice(&2u32.to_le_bytes());
    unicode_text(&mut out, "4001");
    unicode_text(&mut out, "<ProductInformation name =\"AutoCAD\"/>");
    unicode_text(&mut out, APP_VERSION);
    out
}

pub fn aux_header() -> Vec<u8> {
    let mut out = vec![0xFF, 0x77, 0x01];
    out.extend_from_slice(&0x17u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&SAVES.to_le_bytes());
    out
}

/// R21 summary info: the R18 layout with UTF-16 strings.
pub fn summary_info_r21() -> Vec<u8> {
    let mut out = Vec::new();
    for s in ["Site plan", "", AUTHOR, "survey", "", "reviewer", "4", ""] {
        unicode_text(&mut out, s);
    }
    for (day, ms) in [(0, 5_400_000), CREATE_DATE, (2_453_400, 1_000)] {
        out.extend_from_slice(&day.to_le_bytes());
        out.extend_from_slice(&ms.to_le_bytes());
    }
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&[0; 8]);
    out
}

/// R21 app info: strings interleaved with 16-byte checksums.
pub fn app_info_r21() -> Vec<u8> {
    let mut out = 3u32.to_le_bytes().to_vec();
    unicode_text(&mut out, "AppInfoDataList");
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&[0x5C; 16]);
    unicode_text(&mut out, APP_VERSION);
    out.extend_from_slice(&[0; 16]);
    unicode_text(&mut out, "");
    out.extend_from_slice(&[0; 16]);
    unicode_text(&mut out, "<ProductInformation name =\"AutoCAD\"/>");
    unicode_text(&mut out, "2.7.2.0");
    out
}

/// An R21 file with summary info, app info and aux header.
pub fn r21_drawing() -> R21Builder {
    R21Builder::new()
        .section(section_names::SUMMARY_INFO, summary_info_r21())
        .section(section_names::APP_INFO, app_info_r21())
        .section(section_names::AUX_HEADER, aux_header())
}

/// One object record to place in `AcDb:AcDbObjects`.
#[derive(Debug, Clone, Copy)]
pub struct ObjectSpec {
    pub handle: u64,
    pub type_code: i16,
    pub entity: bool,
    /// Absolute owner handle, 0 for none
    pub owner: u64,
}

impl ObjectSpec {
    pub fn object(handle: u64, type_code: i16, owner: u64) -> Self {
        Self {
            handle,
            type_code,
            entity: false,
            owner,
        }
    }

    pub fn entity(handle: u64, type_code: i16) -> Self {
        Self {
            handle,
            type_code,
            entity: true,
            owner: 0,
        }
    }
}

/// A small drawing: control objects, a block, a layer and three entities.
pub fn drawing_objects() -> Vec<ObjectSpec> {
    vec![
        ObjectSpec::object(0x1, 0x30, 0),
        ObjectSpec::object(0x2, 0x32, 0),
        ObjectSpec::object(0x3, 0x31, 0x1),
        ObjectSpec::object(0x4, 0x33, 0x2),
        ObjectSpec::entity(0x5, 0x13),
        ObjectSpec::entity(0x6, 0x13),
        ObjectSpec::entity(0x7, 0x12),
    ]
}

/// `AcDb:AcDbObjects` and the matching `AcDb:Handles` payloads.
pub fn objects_and_handles(objects: &[ObjectSpec]) -> (Vec<u8>, Vec<u8>) {
    // 0x0DCA marker the section starts with
    let mut data = 0x0DCAu32.to_le_bytes().to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for spec in objects {
        offsets.push((spec.handle, data.len() as i64));
        data.extend_from_slice(&object_record(spec));
    }
    offsets.sort_by_key(|&(handle, _)| handle);
    (data, handle_map(&offsets))
}

/// MS size, record body and CRC.
pub fn object_record(spec: &ObjectSpec) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bit_short(spec.type_code);
    let size_at = w.position();
    w.write_raw_long(0);
    w.write_handle(0, spec.handle);
    // no extended data
    w.write_bit_short(0);
    if spec.entity {
        w.write_bit(false);
        w.write_2bits(if spec.owner == 0 { 2 } else { 0 });
    }
    w.write_bit_long(0);
    w.write_bit(true);

    let stream_bits = w.position();
    w.patch_raw_long(size_at, stream_bits as u32);
    if !spec.entity || spec.owner != 0 {
        w.write_handle(4, spec.owner);
    }
    let body = w.into_bytes();

    assert!(body.len() < 0x8000);
    let mut out = (body.len() as u16).to_le_bytes().to_vec();
    out.extend_from_slice(&body);
    let crc = crc8(handle_section::CRC_SEED, &out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// One chunk of delta-encoded pairs plus the terminating chunk.
pub fn handle_map(sorted: &[(u64, i64)]) -> Vec<u8> {
    let mut pairs = Vec::new();
    let (mut last_handle, mut last_offset) = (0u64, 0i64);
    for &(handle, offset) in sorted {
        write_var_int(&mut pairs, handle - last_handle);
        write_signed_var_int(&mut pairs, offset - last_offset);
        last_handle = handle;
        last_offset = offset;
    }
    assert!(pairs.len() <= handle_section::MAX_CHUNK_SIZE);

    let mut out = ((pairs.len() + 2) as u16).to_be_bytes().to_vec();
    out.extend_from_slice(&pairs);
    let crc = crc8(handle_section::CRC_SEED, &out);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&handle_section::TERMINATOR_SIZE.to_be_bytes());
    out
}

fn write_var_int(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn write_signed_var_int(out: &mut Vec<u8>, value: i64) {
    let sign = if value < 0 { 0x40 } else { 0 };
    let mut rest = value.unsigned_abs();
    while rest >= 0x40 {
        out.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    out.push(rest as u8 | sign);
}

/// The full drawing: summary info, app info, aux header, handles, objects.
pub fn drawing(objects: &[ObjectSpec]) -> R18Builder {
    let (objects_data, handles) = objects_and_handles(objects);
    R18Builder::new()
        .section(section_names::SUMMARY_INFO, summary_info())
        .section(section_names::APP_INFO, app_info())
        .section(section_names::AUX_HEADER, aux_header())
        .section(section_names::HANDLES, handles)
        .section(section_names::ACDB_OBJECTS, objects_data)
}

pub fn standard_drawing() -> R18Builder {
    drawing(&drawing_objects())
}

// ===========================================================================
// Bit writer
// ===========================================================================

/// MSB-first bit packer for object records.
struct BitWriter {
    data: Vec<u8>,
    position: u64,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            position: 0,
        }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn write_bit(&mut self, bit: bool) {
        let byte = (self.position >> 3) as usize;
        if byte == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte] |= 0x80 >> (self.position & 7);
        }
        self.position += 1;
    }

    fn write_bits(&mut self, value: u64, count: u32) {
        for index in (0..count).rev() {
            self.write_bit((value >> index) & 1 == 1);
        }
    }

    fn write_2bits(&mut self, value: u8) {
        self.write_bits(value as u64, 2);
    }

    fn write_raw_char(&mut self, value: u8) {
        self.write_bits(value as u64, 8);
    }

    fn write_raw_long(&mut self, value: u32) {
        for b in value.to_le_bytes() {
            self.write_raw_char(b);
        }
    }

    fn write_bit_short(&mut self, value: i16) {
        match value {
            0 => self.write_2bits(2),
            256 => self.write_2bits(3),
            1..=255 => {
                self.write_2bits(1);
                self.write_raw_char(value as u8);
            }
            _ => {
                self.write_2bits(0);
                for b in value.to_le_bytes() {
                    self.write_raw_char(b);
                }
            }
        }
    }

    fn write_bit_long(&mut self, value: i32) {
        match value {
            0 => self.write_2bits(2),
            1..=255 => {
                self.write_2bits(1);
                self.write_raw_char(value as u8);
            }
            _ => {
                self.write_2bits(0);
                self.write_raw_long(value as u32);
            }
        }
    }

    fn write_handle(&mut self, code: u8, value: u64) {
        let counter = (8 - value.leading_zeros() / 8) as u8;
        self.write_raw_char((code << 4) | counter);
        for index in (0..counter).rev() {
            self.write_raw_char((value >> (index * 8)) as u8);
        }
    }

    fn patch_raw_long(&mut self, bit_position: u64, value: u32) {
        let end = self.position;
        self.position = bit_position;
        for byte in value.to_le_bytes() {
            for index in (0..8).rev() {
                let at = (self.position >> 3) as usize;
                let mask = 0x80 >> (self.position & 7);
                if (byte >> index) & 1 == 1 {
                    self.data[at] |= mask;
                } else {
                    self.data[at] &= !mask;
                }
                self.position += 1;
            }
        }
        self.position = end;
    }
}
