//! DWG bit-level stream readers and section readers.
//!
//! ## Stream readers
//! - [`bit_reader`]: cursor over a bit-packed buffer, DWG bit codes
//! - [`stream_reader`]: the [`DwgStreamReader`] trait shared by both readers
//! - [`merged_reader`]: the R21 reader that splits text and handles off the
//!   main stream
//! - [`raw_reader`]: byte-aligned reads for the plain sections
//!
//! ## Section readers
//! - [`header_reader`]: `AcDb:Header` (system variables)
//! - [`classes_reader`]: `AcDb:Classes` (custom class definitions)
//! - [`handle_reader`]: `AcDb:Handles` (object map)
//! - [`object_reader`]: `AcDb:AcDbObjects` (object records)
//! - [`summary_info_reader`]: `AcDb:SummaryInfo` (document properties)
//! - [`app_info_reader`]: `AcDb:AppInfo` (saving application)
//! - [`aux_header_reader`]: `AcDb:AuxHeader` (save counter)

pub mod bit_reader;
pub mod merged_reader;
pub mod raw_reader;
pub mod stream_reader;

#[cfg(test)]
pub(crate) mod bit_writer;
mod framed;

pub mod app_info_reader;
pub mod aux_header_reader;
pub mod classes_reader;
pub mod dwg_reader;
pub mod handle_reader;
pub mod header_reader;
pub mod object_reader;
pub mod summary_info_reader;

pub use bit_reader::BitReader;
pub use merged_reader::MergedReader;
pub use stream_reader::DwgStreamReader;

pub use app_info_reader::{AppInfo, DwgAppInfoReader};
pub use aux_header_reader::{AuxHeader, DwgAuxHeaderReader};
pub use classes_reader::{ClassTable, DwgClass, DwgClassesReader};
pub use dwg_reader::{DwgReader, DwgReaderConfiguration, DEFAULT_MAX_OBJECT_SIZE};
pub use handle_reader::{DwgHandleReader, HandleMap};
pub use header_reader::{DwgHeaderReader, HeaderVariables};
pub use object_reader::{CommonFields, DwgObjectReader, ObjectRecord};
pub use summary_info_reader::{DwgSummaryInfoReader, SummaryInfo};
