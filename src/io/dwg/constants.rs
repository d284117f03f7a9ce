//! Constants, sentinel bytes and magic numbers for the R18 and R21 containers.
//!
//! Every fixed offset, size and marker the readers depend on lives here,
//! grouped per format revision, so a later revision can get its own module
//! without touching the readers' contracts.

/// Upper bound on a declared decompressed size, section or system page.
pub const MAX_SECTION_SIZE: u64 = 0x1000_0000;

/// Section names as stored in the section map.
pub mod section_names {
    /// All entities, table entries, and objects
    pub const ACDB_OBJECTS: &str = "AcDb:AcDbObjects";
    /// Application information
    pub const APP_INFO: &str = "AcDb:AppInfo";
    pub const APP_INFO_HISTORY: &str = "AcDb:AppInfoHistory";
    /// Auxiliary header data (dates, version stamps)
    pub const AUX_HEADER: &str = "AcDb:AuxHeader";
    /// System variables (header variables)
    pub const HEADER: &str = "AcDb:Header";
    /// DXF class definitions
    pub const CLASSES: &str = "AcDb:Classes";
    /// Object map (handle → offset in `AcDb:AcDbObjects`)
    pub const HANDLES: &str = "AcDb:Handles";
    pub const OBJ_FREE_SPACE: &str = "AcDb:ObjFreeSpace";
    pub const TEMPLATE: &str = "AcDb:Template";
    /// Document summary information
    pub const SUMMARY_INFO: &str = "AcDb:SummaryInfo";
    pub const FILE_DEP_LIST: &str = "AcDb:FileDepList";
    /// Thumbnail preview image
    pub const PREVIEW: &str = "AcDb:Preview";
    pub const REV_HISTORY: &str = "AcDb:RevHistory";
    pub const SECURITY: &str = "AcDb:Security";
    pub const VBA_PROJECT: &str = "AcDb:VBAProject";
    pub const SIGNATURE: &str = "AcDb:Signature";
    pub const PROTOTYPE: &str = "AcDsPrototype_1b";

    const KNOWN: [&str; 17] = [
        HEADER,
        AUX_HEADER,
        CLASSES,
        HANDLES,
        TEMPLATE,
        OBJ_FREE_SPACE,
        ACDB_OBJECTS,
        REV_HISTORY,
        SUMMARY_INFO,
        PREVIEW,
        APP_INFO,
        APP_INFO_HISTORY,
        FILE_DEP_LIST,
        SECURITY,
        VBA_PROJECT,
        SIGNATURE,
        PROTOTYPE,
    ];

    /// Whether a DWG writer is known to produce a section with this name.
    pub fn is_known(name: &str) -> bool {
        KNOWN.contains(&name)
    }
}

/// Sentinel bytes for section boundaries (16-byte markers).
pub mod sentinels {
    /// AcDb:Header section start sentinel
    pub const HEADER_START: [u8; 16] = [
        0xCF, 0x7B, 0x1F, 0x23, 0xFD, 0xDE, 0x38, 0xA9, 0x5F, 0x7C, 0x68, 0xB8, 0x4E, 0x6D,
        0x33, 0x5F,
    ];
    /// AcDb:Header section end sentinel
    pub const HEADER_END: [u8; 16] = [
        0x30, 0x84, 0xE0, 0xDC, 0x02, 0x21, 0xC7, 0x56, 0xA0, 0x83, 0x97, 0x47, 0xB1, 0x92,
        0xCC, 0xA0,
    ];
    /// AcDb:Classes section start sentinel
    pub const CLASSES_START: [u8; 16] = [
        0x8D, 0xA1, 0xC4, 0xB8, 0xC4, 0xA9, 0xF8, 0xC5, 0xC0, 0xDC, 0xF4, 0x5F, 0xE7, 0xCF,
        0xB6, 0x8A,
    ];
    /// AcDb:Classes section end sentinel
    pub const CLASSES_END: [u8; 16] = [
        0x72, 0x5E, 0x3B, 0x47, 0x3B, 0x56, 0x07, 0x3A, 0x3F, 0x23, 0x0B, 0xA0, 0x18, 0x30,
        0x49, 0x75,
    ];
    /// AcDb:Preview section start sentinel
    pub const PREVIEW_START: [u8; 16] = [
        0x1F, 0x25, 0x6D, 0x07, 0xD4, 0x36, 0x28, 0x28, 0x9D, 0x57, 0xCA, 0x3F, 0x9D, 0x44,
        0x10, 0x2B,
    ];
    /// AcDb:Preview section end sentinel
    pub const PREVIEW_END: [u8; 16] = [
        0xE0, 0xDA, 0x92, 0xF8, 0x2B, 0xC9, 0xD7, 0xD7, 0x62, 0xA8, 0x35, 0xC0, 0x62, 0xBB,
        0xEF, 0xD4,
    ];

    /// Start sentinel for a section name, if the section carries one.
    pub fn start_sentinel(section_name: &str) -> Option<&'static [u8; 16]> {
        match section_name {
            super::section_names::HEADER => Some(&HEADER_START),
            super::section_names::CLASSES => Some(&CLASSES_START),
            super::section_names::PREVIEW => Some(&PREVIEW_START),
            _ => None,
        }
    }

    /// End sentinel for a section name, if the section carries one.
    pub fn end_sentinel(section_name: &str) -> Option<&'static [u8; 16]> {
        match section_name {
            super::section_names::HEADER => Some(&HEADER_END),
            super::section_names::CLASSES => Some(&CLASSES_END),
            super::section_names::PREVIEW => Some(&PREVIEW_END),
            _ => None,
        }
    }
}

/// Byte offsets inside the plain preamble shared by R18 and R21.
pub mod preamble {
    pub const MAGIC: usize = 0x00;
    /// Five zero bytes after the magic
    pub const ZERO5: usize = 0x06;
    pub const MAINTENANCE: usize = 0x0B;
    pub const PREVIEW_ADDRESS: usize = 0x0D;
    pub const APP_VERSION: usize = 0x11;
    pub const APP_MAINTENANCE: usize = 0x12;
    pub const CODE_PAGE: usize = 0x13;
    /// Three zero bytes after the code page
    pub const ZERO3: usize = 0x15;
    pub const SECURITY_FLAGS: usize = 0x18;
    pub const SUMMARY_INFO_ADDRESS: usize = 0x20;
    pub const VBA_ADDRESS: usize = 0x24;
    /// R18: start of the zero padding. R21: app info address.
    pub const TAIL: usize = 0x2C;
    /// End of the plain preamble, start of the encrypted/encoded header
    pub const SIZE: usize = 0x80;
}

/// R18 (AC1018) container constants
pub mod ac18 {
    /// Size of the encrypted header block at offset 0x80
    pub const ENCRYPTED_HEADER_SIZE: usize = 0x6C;
    /// Id string at the start of the decrypted header
    pub const FILE_ID: &[u8] = b"AcFssFcAJMB\0";
    /// XOR mask for data page header decryption
    pub const DECRYPTION_MASK: u32 = 0x4164536B;
    /// Maximum page payload size
    pub const MAX_PAGE_SIZE: usize = 0x7400;
    /// Data page type marker
    pub const PAGE_TYPE_DATA: u32 = 0x4163043B;
    /// Page map page type marker
    pub const PAGE_TYPE_PAGE_MAP: u32 = 0x41630E3B;
    /// Section map page type marker
    pub const PAGE_TYPE_SECTION_MAP: u32 = 0x4163003B;
    /// Page addresses in the decrypted header and the page map start here
    pub const PAGE_MAP_BASE: u64 = 0x100;
    /// signature, decompressed size, compressed size, compression type, checksum
    pub const SYSTEM_PAGE_HEADER_SIZE: usize = 20;
    /// Only compression type 2 exists
    pub const SYSTEM_PAGE_COMPRESSION: u32 = 2;
    /// Extra bytes after a gap entry in the page map
    pub const GAP_ENTRY_EXTRA: usize = 16;
    pub const SECTION_MAP_HEADER_SIZE: usize = 20;
    /// size, page count, max size, unknown, compressed, type, encrypted, name[64]
    pub const SECTION_ENTRY_SIZE: usize = 96;
    pub const SECTION_NAME_SIZE: usize = 64;
    /// page id, data size, logical start offset
    pub const PAGE_INFO_SIZE: usize = 16;
    /// Compressed flag value meaning "LZ77 compressed"
    pub const COMPRESSED: u32 = 2;

    /// Offsets inside the decrypted header
    pub mod header {
        pub const ID: usize = 0x00;
        pub const ROOT_GAP: usize = 0x18;
        pub const LAST_PAGE_ID: usize = 0x28;
        pub const LAST_SECTION_ADDRESS: usize = 0x2C;
        pub const SECOND_HEADER_ADDRESS: usize = 0x34;
        pub const GAP_AMOUNT: usize = 0x3C;
        pub const SECTION_AMOUNT: usize = 0x40;
        pub const PAGE_MAP_ID: usize = 0x50;
        pub const PAGE_MAP_ADDRESS: usize = 0x54;
        pub const SECTION_MAP_ID: usize = 0x5C;
        pub const SECTION_PAGE_ARRAY_SIZE: usize = 0x60;
        pub const GAP_ARRAY_SIZE: usize = 0x64;
        pub const CRC: usize = 0x68;
    }
}

/// R21 (AC1021) container constants
pub mod ac21 {
    /// Base file offset where data pages begin
    pub const DATA_PAGE_BASE_OFFSET: u64 = 0x480;
    /// Size of the Reed-Solomon encoded header block at offset 0x80
    pub const RS_ENCODED_BLOCK_SIZE: usize = 0x3D8;
    /// Number of interleaved codewords in the header block
    pub const RS_HEADER_BLOCKS: usize = 3;
    /// crc, key, compressed crc, compressed size, length2
    pub const HEADER_HEAD_SIZE: usize = 0x20;
    /// Size of the decompressed header metadata
    pub const DECOMPRESSED_HEADER_SIZE: usize = 0x110;
    /// First field of the decompressed metadata
    pub const HEADER_SIZE_MAGIC: u64 = 0x70;
    /// Five u64 values stored after the encoded block
    pub const HEADER_TAIL_FIELDS: usize = 5;
    /// Eight u64 fields before the UTF-16 name
    pub const SECTION_ENTRY_FIXED_SIZE: usize = 64;
    /// offset, size, id, uncompressed size, compressed size, checksum, crc
    pub const PAGE_INFO_SIZE: usize = 56;

    /// Name hash stored with each section map entry.
    pub fn section_hash(name: &str) -> Option<u64> {
        use super::section_names as n;
        let hash = match name {
            n::HEADER => 0x32B8_03D9,
            n::AUX_HEADER => 0x54F0_050A,
            n::CLASSES => 0x3F54_045F,
            n::HANDLES => 0x3F6E_0450,
            n::TEMPLATE => 0x4A14_04CE,
            n::OBJ_FREE_SPACE => 0x77E2_061F,
            n::ACDB_OBJECTS => 0x674C_05A9,
            n::REV_HISTORY => 0x60A2_05B3,
            n::SUMMARY_INFO => 0x717A_060F,
            n::PREVIEW => 0x40AA_0473,
            n::APP_INFO => 0x3FA0_043E,
            n::APP_INFO_HISTORY => 0x96DE_0737,
            n::FILE_DEP_LIST => 0x6C42_05CA,
            n::SECURITY => 0x4A02_04EA,
            n::VBA_PROJECT => 0x586E_0544,
            _ => return None,
        };
        Some(hash)
    }
}

/// Handle section constants
/// Leading RL of the `AcDb:AcDbObjects` section; records follow back to back.
pub const OBJECTS_SECTION_MARKER: u32 = 0x0DCA;

pub mod handle_section {
    /// Maximum chunk size for handle section entries
    pub const MAX_CHUNK_SIZE: usize = 2032;
    /// Seed of the per-chunk CRC
    pub const CRC_SEED: u16 = 0xC0C1;
    /// A chunk of this size ends the map
    pub const TERMINATOR_SIZE: u16 = 2;
}
