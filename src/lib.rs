//! # dwg-forensics
//!
//! A read-only forensic parser for AutoCAD DWG files of revisions R18
//! (`AC1018`, AutoCAD 2004-2006) and R21 (`AC1021`, AutoCAD 2007-2009).
//!
//! ## Features
//!
//! - Structural validation: header and page checksums, section CRCs,
//!   sentinels, handle-map chunk CRCs, slack areas and handle references
//! - Metadata extraction: author, timestamps, editing time, drawing units,
//!   saving application and save counter
//! - Handle distribution analysis: object type histogram and handle gaps
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dwg_forensics::DwgSession;
//!
//! let session = DwgSession::open("sample.dwg")?;
//!
//! let report = session.validate();
//! println!("{}", report);
//!
//! for (key, value) in session.extract_metadata().iter() {
//!     println!("{}: {}", key, value);
//! }
//!
//! let dist = session.handle_distribution();
//! println!("{} gaps", dist.gaps.len());
//! # Ok::<(), dwg_forensics::error::DwgError>(())
//! ```
//!
//! ## Architecture
//!
//! Decoding runs leaf-first over one in-memory buffer:
//!
//! - `io::dwg::reader::BitReader` - bit-level cursor and DWG bit codes
//! - `io::dwg::file_header` - file header, page map and section map
//! - `io::dwg::section` - page decoding, decompression and checksums
//! - `io::dwg::reader` - section readers (header, classes, handles, objects)
//! - `metadata` and `handle_distribution` - analyses over the decoded document
//!
//! Only an unsupported version or an unlocatable section table stops a
//! read. Everything else becomes a [`Finding`] in the [`ValidationReport`].

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod document;
pub mod error;
pub mod handle_distribution;
pub mod io;
pub mod metadata;
pub mod report;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use document::DwgDocument;
pub use error::{DwgError, Result};
pub use handle_distribution::{HandleDistribution, HandleGap};
pub use io::dwg::reader::{DwgReader, DwgReaderConfiguration};
pub use metadata::{MetadataKey, MetadataRecord, MetadataValue};
pub use report::{Finding, FindingKind, Outcome, ValidationReport};
pub use session::DwgSession;
pub use types::{DwgVersion, Handle, JulianDate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_session_configuration() {
        let config = DwgReaderConfiguration::default();
        assert!(config.failsafe);
        assert_eq!(DwgVersion::R21.to_string(), "AC1021");
    }
}
