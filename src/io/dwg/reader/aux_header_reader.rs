//! DWG auxiliary header (`AcDb:AuxHeader`) reader.
//!
//! Only the leading fields are decoded: the 3-byte signature, the DWG and
//! maintenance versions and the save counter.

use tracing::debug;

use crate::error::Result;
use crate::io::dwg::constants::section_names;
use crate::io::dwg::reader::raw_reader::RawReader;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::{Finding, FindingKind, ValidationReport};

const CHECK: &str = section_names::AUX_HEADER;

pub const SIGNATURE: [u8; 3] = [0xFF, 0x77, 0x01];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuxHeader {
    pub signature: [u8; 3],
    pub dwg_version: u16,
    pub maintenance_version: u16,
    /// Starts at 1
    pub number_of_saves: u32,
}

pub struct DwgAuxHeaderReader<'a> {
    data: &'a [u8],
}

impl<'a> DwgAuxHeaderReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn read(
        &self,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<Option<AuxHeader>> {
        let mut r = RawReader::new(self.data);
        let header = match read_fields(&mut r) {
            Ok(header) => header,
            Err(err) => {
                config.absorb(report, CHECK, err)?;
                return Ok(None);
            }
        };

        if header.signature != SIGNATURE {
            report.push(
                Finding::warning(
                    FindingKind::Corrupted,
                    CHECK,
                    format!("unexpected signature {:02X?}", header.signature),
                )
                .at(0),
            );
        } else {
            report.pass(CHECK, format!("{} saves", header.number_of_saves));
        }
        debug!(saves = header.number_of_saves, "read aux header");
        Ok(Some(header))
    }
}

fn read_fields(r: &mut RawReader<'_>) -> Result<AuxHeader> {
    let mut signature = [0u8; 3];
    signature.copy_from_slice(r.read_bytes(3)?);
    Ok(AuxHeader {
        signature,
        dwg_version: r.read_u16()?,
        maintenance_version: r.read_u16()?,
        number_of_saves: r.read_u32()?,
    })
}
