//! DWG handle map (`AcDb:Handles`) reader.
//!
//! The section is a run of chunks. Each chunk starts with a big-endian size
//! that counts the two size bytes, followed by delta-encoded handle/offset
//! pairs and a big-endian CRC over the size and the pairs. A chunk of size 2
//! terminates the map. Chunks are cut off at 2032 bytes of pair data.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::handle_section::{CRC_SEED, MAX_CHUNK_SIZE, TERMINATOR_SIZE};
use crate::io::dwg::crc::crc8;
use crate::io::dwg::reader::bit_reader::BitReader;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::types::DwgVersion;

const CHECK: &str = "handle_map";

/// Handle to object-offset index in file order.
///
/// Offsets are relative to the start of `AcDb:AcDbObjects`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleMap {
    entries: IndexMap<u64, i64>,
}

impl HandleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self, handle: u64) -> Option<i64> {
        self.entries.get(&handle).copied()
    }

    pub fn contains(&self, handle: u64) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Entries in the order they appear in the map.
    pub fn iter(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        self.entries.iter().map(|(&h, &o)| (h, o))
    }

    /// All handles, ascending.
    pub fn sorted_handles(&self) -> Vec<u64> {
        let mut handles: Vec<u64> = self.entries.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reader for the `AcDb:Handles` section.
pub struct DwgHandleReader<'a> {
    data: &'a [u8],
    version: DwgVersion,
    /// Length of the decoded objects section, when it is available
    objects_len: Option<u64>,
}

impl<'a> DwgHandleReader<'a> {
    pub fn new(version: DwgVersion, data: &'a [u8], objects_len: Option<u64>) -> Self {
        Self {
            data,
            version,
            objects_len,
        }
    }

    /// Read the map, recording one finding per broken chunk.
    ///
    /// A chunk whose pairs cannot be decoded is dropped as a whole; the
    /// walk resumes at the next chunk since its size is known up front.
    pub fn read(
        &self,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<HandleMap> {
        let mut map = HandleMap::new();
        let mut pos = 0usize;
        let mut chunks = 0usize;
        let mut issues = 0usize;
        let mut terminated = false;

        while pos + 2 <= self.data.len() {
            let size = u16::from_be_bytes([self.data[pos], self.data[pos + 1]]);
            if size == TERMINATOR_SIZE {
                terminated = true;
                break;
            }
            if size < TERMINATOR_SIZE {
                report.push(
                    Finding::fail(
                        FindingKind::Corrupted,
                        CHECK,
                        format!("chunk {} declares size {}", chunks, size),
                    )
                    .at(pos as u64),
                );
                return Ok(map);
            }

            let body_len = usize::from(size) - 2;
            if body_len > MAX_CHUNK_SIZE {
                report.push(
                    Finding::warning(
                        FindingKind::Corrupted,
                        CHECK,
                        format!(
                            "chunk {} is {} bytes, larger than {}",
                            chunks, body_len, MAX_CHUNK_SIZE
                        ),
                    )
                    .at(pos as u64),
                );
                issues += 1;
            }

            let body_start = pos + 2;
            let body_end = body_start + body_len;
            if body_end + 2 > self.data.len() {
                config.absorb(
                    report,
                    CHECK,
                    DwgError::TruncatedStream {
                        bit_position: pos as u64 * 8,
                        needed: (body_len as u64 + 4) * 8,
                        available: (self.data.len() - pos) as u64 * 8,
                    },
                )?;
                return Ok(map);
            }

            let stored = u16::from_be_bytes([self.data[body_end], self.data[body_end + 1]]);
            let computed = crc8(CRC_SEED, &self.data[pos..body_end]);
            if stored != computed {
                report.push(
                    Finding::fail(
                        FindingKind::InvalidCrc,
                        CHECK,
                        format!(
                            "chunk {} CRC mismatch: stored {:#06X}, computed {:#06X}",
                            chunks, stored, computed
                        ),
                    )
                    .at(pos as u64),
                );
                issues += 1;
            }

            match self.read_pairs(&self.data[body_start..body_end], body_start as u64) {
                Ok(pairs) => {
                    for (handle, offset) in pairs {
                        if !self.offset_in_range(offset) {
                            report.push(Finding::fail(
                                FindingKind::Corrupted,
                                CHECK,
                                format!(
                                    "handle {:#X} points at object offset {} outside the objects section",
                                    handle, offset
                                ),
                            ));
                            issues += 1;
                        }
                        if map.entries.contains_key(&handle) {
                            report.warning(
                                FindingKind::Corrupted,
                                CHECK,
                                format!("handle {:#X} listed more than once", handle),
                            );
                            issues += 1;
                            continue;
                        }
                        map.entries.insert(handle, offset);
                    }
                }
                Err(err) => {
                    config.absorb(report, CHECK, err)?;
                    issues += 1;
                }
            }

            chunks += 1;
            pos = body_end + 2;
        }

        if !terminated {
            report.push(
                Finding::warning(
                    FindingKind::Corrupted,
                    CHECK,
                    "handle map ends without a terminating chunk",
                )
                .at(pos as u64),
            );
            issues += 1;
        }

        debug!(chunks, handles = map.len(), "read handle map");
        if issues == 0 {
            report.pass(
                CHECK,
                format!("{} handles in {} chunks", map.len(), chunks),
            );
        }
        Ok(map)
    }

    /// Decode one chunk body. Both counters restart at zero per chunk.
    fn read_pairs(&self, body: &[u8], base: u64) -> Result<Vec<(u64, i64)>> {
        let mut reader = BitReader::new(body, self.version);
        let mut last_handle: u64 = 0;
        let mut last_loc: i64 = 0;
        let mut pairs = Vec::new();

        while reader.byte_position() < body.len() as u64 {
            let at = base + reader.byte_position();
            let delta = reader
                .read_var_int()
                .map_err(|err| relocate(err, at))?;
            last_handle = last_handle.wrapping_add(delta);
            let loc = reader
                .read_signed_var_int()
                .map_err(|err| relocate(err, at))?;
            last_loc = last_loc.wrapping_add(loc);

            // A zero handle delta is a dangling pair and is skipped.
            if delta > 0 {
                pairs.push((last_handle, last_loc));
            }
        }
        Ok(pairs)
    }

    fn offset_in_range(&self, offset: i64) -> bool {
        match (u64::try_from(offset), self.objects_len) {
            (Err(_), _) => false,
            (Ok(offset), Some(len)) => offset < len,
            (Ok(_), None) => true,
        }
    }
}

/// Report var-int positions relative to the section, not the chunk.
fn relocate(err: DwgError, at: u64) -> DwgError {
    match err {
        DwgError::MalformedVarInt { .. } => DwgError::MalformedVarInt { position: at },
        other => other,
    }
}
