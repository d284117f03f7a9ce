//! Section map entries.
//!
//! Each descriptor names a logical section (e.g. `AcDb:Header`) and lists
//! the pages that hold its data. Together with the page map the pages form
//! the section locator table: every page resolves to an absolute file span.

use crate::io::dwg::constants::{ac18, section_names};

/// One page of a logical section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPage {
    pub page_id: i64,
    /// Absolute file offset, resolved through the page map
    pub file_offset: u64,
    /// Size of the page on disk, resolved through the page map
    pub page_size: u64,
    /// Offset of the page's data inside the decompressed section
    pub data_offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Stored page checksum (R21)
    pub checksum: Option<u64>,
    /// Stored page CRC (R21)
    pub crc: Option<u64>,
}

/// A named section and its pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDescriptor {
    pub name: String,
    /// R18: section type/number. R21: position in the section map.
    pub section_id: u32,
    /// Name hash stored in the R21 section map
    pub hash_code: Option<u64>,
    /// Total decompressed size
    pub size: u64,
    /// Maximum decompressed size of one page
    pub max_page_size: u64,
    /// Page count as declared, which may differ from `pages.len()`
    pub page_count: u64,
    /// R18 compression flag (1 = plain, 2 = LZ77). R21 decides per page.
    pub compression: u32,
    /// 0 = plain, 1 = encrypted, 2 = unknown
    pub encrypted: u32,
    /// R21 Reed-Solomon layout (1 = plain, 4 = interleaved)
    pub encoding: u32,
    pub pages: Vec<SectionPage>,
}

impl SectionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section_id: 0,
            hash_code: None,
            size: 0,
            max_page_size: ac18::MAX_PAGE_SIZE as u64,
            page_count: 0,
            compression: ac18::COMPRESSED,
            encrypted: 0,
            encoding: 0,
            pages: Vec::new(),
        }
    }

    /// R18 sections flagged 2 are LZ77 compressed.
    pub fn is_compressed(&self) -> bool {
        self.compression == ac18::COMPRESSED
    }

    /// Flag 2 ("unknown") is treated as encrypted as well.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted != 0
    }

    pub fn is_known(&self) -> bool {
        section_names::is_known(&self.name)
    }

    /// Sum of the declared page sizes on disk.
    pub fn stored_size(&self) -> u64 {
        self.pages.iter().map(|p| p.page_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let desc = SectionDescriptor::new("AcDb:Header");
        assert_eq!(desc.name, "AcDb:Header");
        assert!(desc.is_compressed());
        assert!(!desc.is_encrypted());
        assert!(desc.is_known());
        assert!(desc.pages.is_empty());
    }

    #[test]
    fn test_flags() {
        let mut desc = SectionDescriptor::new("AcDb:Custom");
        desc.compression = 1;
        desc.encrypted = 2;
        assert!(!desc.is_compressed());
        assert!(desc.is_encrypted());
        assert!(!desc.is_known());
    }

    #[test]
    fn test_stored_size() {
        let mut desc = SectionDescriptor::new("AcDb:Handles");
        for (id, size) in [(1, 0x100), (2, 0x80)] {
            desc.pages.push(SectionPage {
                page_id: id,
                file_offset: 0,
                page_size: size,
                data_offset: 0,
                compressed_size: 0,
                uncompressed_size: 0,
                checksum: None,
                crc: None,
            });
        }
        assert_eq!(desc.stored_size(), 0x180);
    }
}
