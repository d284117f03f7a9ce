//! DWG R18/R21 file format reader.
//!
//! # Module Structure
//!
//! - [`constants`]: magic numbers, sentinel bytes, section names, per-version offsets
//! - [`crc`]: CRC-8 (16-bit) and CRC-32
//! - [`checksum`]: the Adler-style page checksum
//! - [`encryption`]: R18 file header and data page header decryption
//! - [`compression`]: LZ77 AC18 and AC21 decompressors
//! - [`reed_solomon`]: byte de-interleaving for R21 Reed-Solomon pages
//! - [`file_header`]: file header, page map and section map
//! - [`section`]: section payload decoding and page checks
//! - [`object_type`]: built-in object type codes
//! - [`reader`]: bit readers and the section readers

pub mod checksum;
pub mod compression;
pub mod constants;
pub mod crc;
pub mod encryption;
pub mod file_header;
pub mod object_type;
pub mod reader;
pub mod reed_solomon;
pub mod section;

pub use file_header::{parse_header, FileHeader, SectionDescriptor, SecurityFlags};
pub use reader::{DwgReader, DwgReaderConfiguration};
pub use section::{decode_sections, ByteSpan, Section, SectionSet};
