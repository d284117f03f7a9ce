//! LZ77 AC21 decompression.
//!
//! The LZ77 variant used exclusively in AC1021 (R2007) files. Literal runs
//! are stored with their bytes shuffled in 32-byte blocks; the tail of a run
//! shorter than 32 bytes follows a fixed per-length layout.

use super::{copy_back, output_buffer, push_literals, Input};
use crate::error::Result;

/// Decompress `source` into at most `decompressed_size` bytes.
pub fn decompress(source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut src = Input::new(source);
    let mut out = output_buffer(decompressed_size);
    if source.is_empty() {
        return Ok(out);
    }

    let mut opcode = src.byte()?;
    let mut length = 0usize;
    if opcode & 0xF0 == 0x20 {
        let prefix = src.take(3)?;
        length = (prefix[2] & 0x07) as usize;
    }

    while !src.is_at_end() {
        if length == 0 {
            length = literal_length(opcode, &mut src)?;
        }
        push_literal_run(&mut out, src.take(length)?, decompressed_size)?;

        if src.is_at_end() {
            break;
        }

        let (next_opcode, next_length) = copy_matches(&mut src, &mut out, decompressed_size)?;
        opcode = next_opcode;
        length = next_length;
    }

    Ok(out)
}

fn literal_length(opcode: u8, src: &mut Input<'_>) -> Result<usize> {
    let mut length = opcode as usize + 8;
    if length == 0x17 {
        let n = src.byte()? as usize;
        length += n;
        if n == 0xFF {
            loop {
                let lo = src.byte()? as usize;
                let hi = src.byte()? as usize;
                let n = lo | (hi << 8);
                length += n;
                if n != 0xFFFF {
                    break;
                }
            }
        }
    }
    Ok(length)
}

/// Run back-reference instructions until one carries a literal count.
///
/// Returns the last opcode and the pending literal length (0 when the next
/// literal run length must be read from the opcode).
fn copy_matches(src: &mut Input<'_>, out: &mut Vec<u8>, limit: usize) -> Result<(u8, usize)> {
    let opcode = src.byte()?;
    let (mut opcode, mut offset, mut length) = read_instruction(opcode, src)?;

    loop {
        copy_back(out, offset, length, limit)?;

        let literals = (opcode & 0x07) as usize;
        if literals != 0 || src.is_at_end() {
            return Ok((opcode, literals));
        }

        opcode = src.byte()?;
        if opcode >> 4 == 0 {
            return Ok((opcode, 0));
        }
        if opcode >> 4 == 0x0F {
            opcode &= 0x0F;
        }
        (opcode, offset, length) = read_instruction(opcode, src)?;
    }
}

/// Decode one match instruction into (last opcode, offset, length).
fn read_instruction(opcode: u8, src: &mut Input<'_>) -> Result<(u8, usize, usize)> {
    let op = opcode as usize;
    match opcode >> 4 {
        0 => {
            let first = src.byte()? as usize;
            let next = src.byte()?;
            let n = next as usize;
            let length = (op & 0x0F) + 0x13 + ((n >> 3) & 0x10);
            let offset = ((n & 0x78) << 5) + 1 + first;
            Ok((next, offset, length))
        }
        1 => {
            let first = src.byte()? as usize;
            let next = src.byte()?;
            let length = (op & 0x0F) + 3;
            let offset = (((next as usize) & 0xF8) << 5) + 1 + first;
            Ok((next, offset, length))
        }
        2 => {
            let lo = src.byte()? as usize;
            let hi = src.byte()? as usize;
            let mut offset = lo | (hi << 8);
            let mut length = op & 0x07;
            let last;
            if op & 0x08 == 0 {
                last = src.byte()?;
                length += (last as usize) & 0xF8;
            } else {
                offset += 1;
                length += (src.byte()? as usize) << 3;
                last = src.byte()?;
                length += (((last as usize) & 0xF8) << 8) + 0x100;
            }
            Ok((last, offset, length))
        }
        _ => {
            let next = src.byte()?;
            let length = op >> 4;
            let offset = (((next as usize) & 0xF8) << 1) + (op & 0x0F) + 1;
            Ok((next, offset, length))
        }
    }
}

// ---------------------------------------------------------------------------
// Literal run layout
// ---------------------------------------------------------------------------

/// One piece of a shuffled literal tail: source offset and piece kind.
///
/// Kinds 1, 4 and 8 copy forward; 2 and 3 copy their bytes reversed; 16
/// copies the upper eight bytes before the lower eight.
type Piece = (usize, u8);

/// Tail layouts for run lengths 1..=31 (index 0 unused).
const TAIL_LAYOUT: [&[Piece]; 32] = [
    &[],
    &[(0, 1)],
    &[(0, 2)],
    &[(0, 3)],
    &[(0, 4)],
    &[(4, 1), (0, 4)],
    &[(5, 1), (1, 4), (0, 1)],
    &[(5, 2), (1, 4), (0, 1)],
    &[(0, 4), (4, 4)],
    &[(8, 1), (0, 8)],
    &[(9, 1), (1, 8), (0, 1)],
    &[(9, 2), (1, 8), (0, 1)],
    &[(8, 4), (0, 8)],
    &[(12, 1), (8, 4), (0, 8)],
    &[(13, 1), (9, 4), (1, 8), (0, 1)],
    &[(13, 2), (9, 4), (1, 8), (0, 1)],
    &[(8, 8), (0, 8)],
    &[(9, 8), (8, 1), (0, 8)],
    &[(17, 1), (1, 16), (0, 1)],
    &[(16, 3), (0, 16)],
    &[(16, 4), (0, 16)],
    &[(20, 1), (16, 4), (0, 16)],
    &[(20, 2), (16, 4), (0, 16)],
    &[(20, 3), (16, 4), (0, 16)],
    &[(16, 8), (0, 16)],
    &[(17, 8), (16, 1), (0, 16)],
    &[(25, 1), (17, 8), (16, 1), (0, 16)],
    &[(25, 2), (17, 8), (16, 1), (0, 16)],
    &[(24, 4), (16, 8), (0, 16)],
    &[(28, 1), (24, 4), (16, 8), (0, 16)],
    &[(28, 2), (24, 4), (16, 8), (0, 16)],
    &[(30, 1), (26, 4), (18, 8), (2, 16), (0, 2)],
];

fn push_piece(run: &mut Vec<u8>, block: &[u8], (offset, kind): Piece) {
    match kind {
        2 | 3 => run.extend(block[offset..offset + kind as usize].iter().rev()),
        16 => {
            run.extend_from_slice(&block[offset + 8..offset + 16]);
            run.extend_from_slice(&block[offset..offset + 8]);
        }
        n => run.extend_from_slice(&block[offset..offset + n as usize]),
    }
}

/// Undo the literal shuffle and append the run to `out`.
fn push_literal_run(out: &mut Vec<u8>, literals: &[u8], limit: usize) -> Result<()> {
    let mut run = Vec::with_capacity(literals.len());
    let mut blocks = literals.chunks_exact(32);
    for block in &mut blocks {
        for offset in [24, 16, 8, 0] {
            run.extend_from_slice(&block[offset..offset + 8]);
        }
    }
    let tail = blocks.remainder();
    for &piece in TAIL_LAYOUT[tail.len()] {
        push_piece(&mut run, tail, piece);
    }
    push_literals(out, &run, limit)
}
