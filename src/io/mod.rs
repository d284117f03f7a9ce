//! I/O module for reading DWG files

pub mod dwg;

pub use dwg::{DwgReader, DwgReaderConfiguration};
