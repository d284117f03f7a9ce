//! Common data shared by every object record.
//!
//! After the type code each record carries the bit size of its data
//! stream, the own handle and the extended entity data. Entities then hold
//! their graphics flag, entity mode, reactor count and xdictionary flag;
//! non-entities only the last two. The handle stream that starts at the bit
//! size yields the owner, reactor and xdictionary handles.

use crate::error::{DwgError, Result};
use crate::io::dwg::object_type::ObjectClass;
use crate::io::dwg::reader::bit_reader::BitReader;
use crate::io::dwg::reader::merged_reader::MergedReader;
use crate::io::dwg::reader::stream_reader::DwgStreamReader;
use crate::types::{DwgVersion, Handle};

/// Reactor counts above this are treated as garbage.
const MAX_REACTORS: i32 = 10_000;

/// Decoded common fields of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonFields {
    pub own_handle: u64,
    /// Number of extended data blocks skipped
    pub eed_blocks: usize,
    /// Entity mode (entities only): 0 = owner handle present, 1 = paper
    /// space, 2 = model space
    pub entity_mode: Option<u8>,
    pub graphics_size: Option<u64>,
    pub owner: Option<u64>,
    pub reactors: Vec<u64>,
    pub xdictionary: Option<u64>,
    /// Record-relative bit where the string stream starts (R21 only)
    pub string_stream_start: Option<u64>,
}

impl CommonFields {
    /// Every handle this record points at.
    pub fn references(&self) -> impl Iterator<Item = u64> + '_ {
        self.owner
            .iter()
            .chain(self.reactors.iter())
            .chain(self.xdictionary.iter())
            .copied()
    }
}

/// Decode the common data of a record whose type code has been read.
///
/// `main` sits right after the type code; `data` holds the record without
/// its size prefix, so bit positions are record-relative.
pub(super) fn read_common_data<'a>(
    mut main: BitReader<'a>,
    data: &'a [u8],
    version: DwgVersion,
    class: ObjectClass,
) -> Result<CommonFields> {
    // RL: size of the main stream in bits; the handle stream follows it
    let stream_bits = main.read_raw_long()? as u32 as u64;
    let total_bits = data.len() as u64 * 8;
    if stream_bits > total_bits || stream_bits < main.position_in_bits() {
        return Err(DwgError::InvalidFormat(format!(
            "handle stream at bit {} outside a {}-bit record",
            stream_bits, total_bits
        )));
    }

    let handles = BitReader::at(data, version, stream_bits);
    let (text, string_stream_start) = match version {
        DwgVersion::R21 => {
            let mut text = BitReader::new(data, version);
            match text.set_position_by_flag(stream_bits.saturating_sub(1))? {
                Some(start) => (Some(text), Some(start)),
                None => (None, None),
            }
        }
        DwgVersion::R18 => (None, None),
    };

    let mut reader = MergedReader::new(main, text, Some(handles));

    let own = reader.main_mut().read_handle()?;
    let own_handle = own.value;
    let base = Handle::new(own_handle);

    let eed_blocks = skip_extended_data(reader.main_mut())?;

    let mut fields = CommonFields {
        own_handle,
        eed_blocks,
        string_stream_start,
        ..Default::default()
    };

    let reactor_count;
    let xdictionary_missing;
    match class {
        ObjectClass::Entity => {
            if reader.read_bit()? {
                let size = reader.read_raw_long()? as u32 as u64;
                reader.main_mut().skip_bits(size * 8)?;
                fields.graphics_size = Some(size);
            }
            let mode = reader.read_2bits()?;
            fields.entity_mode = Some(mode);
            reactor_count = read_reactor_count(&mut reader)?;
            xdictionary_missing = reader.read_bit()?;

            if mode == 0 {
                fields.owner = reader.read_handle()?.resolve(base).map(u64::from);
            }
        }
        ObjectClass::Object => {
            reactor_count = read_reactor_count(&mut reader)?;
            xdictionary_missing = reader.read_bit()?;
            fields.owner = reader.read_handle()?.resolve(base).map(u64::from);
        }
    }

    for _ in 0..reactor_count {
        if let Some(reactor) = reader.read_handle()?.resolve(base) {
            fields.reactors.push(reactor.value());
        }
    }
    if !xdictionary_missing {
        fields.xdictionary = reader.read_handle()?.resolve(base).map(u64::from);
    }

    Ok(fields)
}

fn read_reactor_count(reader: &mut MergedReader<'_>) -> Result<u32> {
    let count = reader.read_bit_long()?;
    if !(0..=MAX_REACTORS).contains(&count) {
        return Err(DwgError::InvalidFormat(format!(
            "implausible reactor count {}",
            count
        )));
    }
    Ok(count as u32)
}

/// Skip EED blocks: BS size (0 ends the list), application handle, data.
fn skip_extended_data(reader: &mut BitReader<'_>) -> Result<usize> {
    let mut blocks = 0;
    loop {
        let size = reader.read_bit_short()?;
        if size == 0 {
            return Ok(blocks);
        }
        if size < 0 {
            return Err(DwgError::InvalidFormat(format!(
                "negative extended data size {}",
                size
            )));
        }
        reader.read_handle()?;
        reader.skip_bits(size as u64 * 8)?;
        blocks += 1;
    }
}
