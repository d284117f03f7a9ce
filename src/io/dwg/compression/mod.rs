//! LZ77 decompression for DWG pages.
//!
//! The DWG format uses two LZ77 variants:
//! - **AC18** (R2004): data pages, page map and section map
//! - **AC21** (R2007): different opcode format and shuffled literal runs

pub mod lz77_ac18;
pub mod lz77_ac21;

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::MAX_SECTION_SIZE;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over a compressed buffer.
pub(crate) struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn byte(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or_else(|| {
            DwgError::Decompression(format!("compressed stream ends at byte {}", self.pos))
        })?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(count).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(DwgError::Decompression(format!(
                "literal run of {} bytes at byte {} exceeds {}-byte input",
                count,
                self.pos,
                self.data.len()
            ))),
        }
    }
}

/// Output buffer for a declared size. The declared size comes from the file,
/// so the up-front reservation is capped.
pub(crate) fn output_buffer(decompressed_size: usize) -> Vec<u8> {
    Vec::with_capacity(decompressed_size.min(MAX_SECTION_SIZE as usize))
}

pub(crate) fn push_literals(out: &mut Vec<u8>, literals: &[u8], limit: usize) -> Result<()> {
    if out.len() + literals.len() > limit {
        return Err(DwgError::Decompression(format!(
            "output exceeds declared size {}",
            limit
        )));
    }
    out.extend_from_slice(literals);
    Ok(())
}

/// Append `count` bytes copied from `offset` bytes back; overlap repeats.
pub(crate) fn copy_back(
    out: &mut Vec<u8>,
    offset: usize,
    count: usize,
    limit: usize,
) -> Result<()> {
    if offset == 0 || offset > out.len() {
        return Err(DwgError::Decompression(format!(
            "back-reference offset {} with only {} bytes decoded",
            offset,
            out.len()
        )));
    }
    if out.len() + count > limit {
        return Err(DwgError::Decompression(format!(
            "output exceeds declared size {}",
            limit
        )));
    }
    let start = out.len() - offset;
    for i in 0..count {
        let b = out[start + i];
        out.push(b);
    }
    Ok(())
}
