//! Sentinel-framed sections.
//!
//! `AcDb:Header` and `AcDb:Classes` share one layout: a start sentinel, an
//! RL byte count, the bit-packed data, an RS CRC over the count and the
//! data, then an end sentinel.

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::handle_section::CRC_SEED;
use crate::io::dwg::crc::crc8;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::{Finding, FindingKind, ValidationReport};

/// Bytes before the data: sentinel and RL size.
pub const DATA_START: usize = 20;

/// Check the frame around a section's data and return where the data ends.
///
/// A bad start sentinel or a size running past the buffer is an error.
/// A CRC mismatch or a bad end sentinel is recorded and the data is still
/// returned for decoding.
pub fn check_frame(
    data: &[u8],
    start: &[u8; 16],
    end: &[u8; 16],
    check: &str,
    config: &DwgReaderConfiguration,
    report: &mut ValidationReport,
) -> Result<usize> {
    if data.len() < DATA_START || &data[..16] != start {
        return Err(DwgError::InvalidSentinel(format!("{} start", check)));
    }
    let size = u32::from_le_bytes([data[16], data[17], data[18], data[19]]) as usize;
    let body_end = DATA_START.saturating_add(size);
    if body_end.saturating_add(2) > data.len() {
        return Err(DwgError::TruncatedStream {
            bit_position: 16 * 8,
            needed: (size as u64 + 2) * 8,
            available: (data.len() - DATA_START) as u64 * 8,
        });
    }

    if config.verify_checksums {
        let stored = u16::from_le_bytes([data[body_end], data[body_end + 1]]);
        let computed = crc8(CRC_SEED, &data[16..body_end]);
        if stored != computed {
            report.push(
                Finding::fail(
                    FindingKind::InvalidCrc,
                    check,
                    format!(
                        "section CRC mismatch: stored {:#06X}, computed {:#06X}",
                        stored, computed
                    ),
                )
                .at(body_end as u64),
            );
        }
    }

    let tail = body_end + 2;
    if data.get(tail..tail + 16) != Some(&end[..]) {
        config.absorb(
            report,
            check,
            DwgError::InvalidSentinel(format!("{} end at byte {:#X}", check, tail)),
        )?;
    }
    Ok(body_end)
}
