//! Decoded DWG document structure

use crate::io::dwg::file_header::FileHeader;
use crate::io::dwg::reader::{
    AppInfo, AuxHeader, ClassTable, HandleMap, HeaderVariables, ObjectRecord, SummaryInfo,
};
use crate::io::dwg::section::SectionSet;
use crate::types::DwgVersion;

/// Everything the reader recovered from one file.
///
/// Optional parts are `None` when their section is missing, unreadable or
/// failed to decode; the reason is in the validation report.
#[derive(Debug, Clone)]
pub struct DwgDocument {
    pub header: FileHeader,
    pub sections: SectionSet,
    pub classes: ClassTable,
    pub header_variables: Option<HeaderVariables>,
    pub summary_info: Option<SummaryInfo>,
    pub app_info: Option<AppInfo>,
    pub aux_header: Option<AuxHeader>,
    /// Handle to object offset, in stored order
    pub handle_map: HandleMap,
    /// Records walked in handle map order
    pub objects: Vec<ObjectRecord>,
}

impl DwgDocument {
    pub fn version(&self) -> DwgVersion {
        self.header.version
    }

    /// The record mapped under `handle`.
    pub fn object(&self, handle: u64) -> Option<&ObjectRecord> {
        self.objects.iter().find(|o| o.handle == handle)
    }

    pub fn entities(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.iter().filter(|o| o.is_entity())
    }
}
