use std::collections::HashMap;
use std::sync::Arc;

use ashlar_model::pos::{MAX_COORD, MIN_COORD};
use ashlar_model::structure::DEFAULT_MAX_BLOCKS;
use ashlar_model::{Block, BlockPos, BlockState, SourceFormat, Structure, StructureId};
use log::debug;

use crate::tag::{ParsedNbt, Tag};
use crate::{DecodeError, parse};

/// Identifies the sub-format by its header tags: Sponge schematics carry
/// `Palette` + `BlockData`, vanilla structure files `palette` + `blocks`.
/// A tree that matches neither is a valid serialization of some format we
/// do not speak, reported as an unsupported version rather than corrupt
/// bytes.
pub fn detect_format(nbt: &ParsedNbt) -> Result<SourceFormat, DecodeError> {
    if nbt.get("Palette").is_some() && nbt.get("BlockData").is_some() {
        return Ok(SourceFormat::Schematic);
    }
    if nbt.get("palette").is_some() && nbt.get("blocks").is_some() {
        return Ok(SourceFormat::Structure);
    }
    Err(DecodeError::UnsupportedVersion(0))
}

/// Full pipeline: parse raw bytes, detect the sub-format, resolve the
/// palette, and assemble a validated [`Structure`].
pub fn decode_structure(
    bytes: &[u8],
    id: StructureId,
    name: &str,
) -> Result<Structure, DecodeError> {
    let nbt = parse(bytes)?;
    let format = detect_format(&nbt)?;
    let blocks = match format {
        SourceFormat::Schematic => map_schematic(&nbt)?,
        SourceFormat::Structure => map_structure(&nbt)?,
    };
    let count = blocks.len();
    let out = Structure::new(id, name, format, blocks)?;
    debug!("decoded {format} '{name}': {count} blocks");
    Ok(out)
}

fn require<'a>(nbt: &'a ParsedNbt, key: &str) -> Result<&'a Tag, DecodeError> {
    nbt.get(key).ok_or(DecodeError::InvalidFormat)
}

/// Sponge-style schematic: `Palette` compound of state -> index,
/// `BlockData` varint indices in x + z*W + y*W*L order, dimensions as
/// shorts, `Version` 1..=3, optional `Offset` applied to every position.
fn map_schematic(nbt: &ParsedNbt) -> Result<Vec<Block>, DecodeError> {
    let version = require(nbt, "Version")?
        .as_int()
        .ok_or(DecodeError::InvalidFormat)?;
    if !(1..=3).contains(&version) {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let dim = |key: &str| -> Result<i32, DecodeError> {
        let v = require(nbt, key)?.as_int().ok_or(DecodeError::InvalidFormat)?;
        if v < 0 { Err(DecodeError::InvalidFormat) } else { Ok(v) }
    };
    let width = dim("Width")?;
    let height = dim("Height")?;
    let length = dim("Length")?;

    let palette_tag = require(nbt, "Palette")?
        .as_compound()
        .ok_or(DecodeError::InvalidFormat)?;
    let palette = resolve_schematic_palette(palette_tag)?;

    let offset = match nbt.get("Offset").and_then(Tag::as_int_array) {
        Some([ox, oy, oz]) => BlockPos::new(*ox, *oy, *oz),
        Some(_) => return Err(DecodeError::InvalidFormat),
        None => BlockPos::new(0, 0, 0),
    };

    let data = require(nbt, "BlockData")?
        .as_byte_array()
        .ok_or(DecodeError::InvalidFormat)?;

    // Dimensions come straight off the wire; bound the volume before the
    // scan so the per-index arithmetic stays in range.
    let (w, l) = (i64::from(width), i64::from(length));
    let volume = w * i64::from(height) * l;
    if volume > DEFAULT_MAX_BLOCKS as i64 {
        return Err(DecodeError::InvalidFormat);
    }
    let mut blocks = Vec::new();
    let mut cursor = data;
    for i in 0..volume {
        let index = read_varint(&mut cursor)?;
        let state = palette
            .get(&index)
            .ok_or(DecodeError::PaletteIndexOutOfRange {
                index,
                palette_len: palette.len(),
            })?;
        let Some(state) = state else {
            continue; // air entry
        };
        let x = i % w;
        let z = (i / w) % l;
        let y = i / (w * l);
        blocks.push(Block::new(offset_pos(offset, x, y, z)?, Arc::clone(state)));
    }
    if !cursor.is_empty() {
        return Err(DecodeError::InvalidFormat);
    }
    Ok(blocks)
}

/// Applies the schematic offset in i64 so extreme values cannot wrap;
/// positions outside the packable range are a format error.
fn offset_pos(offset: BlockPos, x: i64, y: i64, z: i64) -> Result<BlockPos, DecodeError> {
    let px = i64::from(offset.x) + x;
    let py = i64::from(offset.y) + y;
    let pz = i64::from(offset.z) + z;
    let ok = |v: i64| (i64::from(MIN_COORD)..=i64::from(MAX_COORD)).contains(&v);
    if ok(px) && ok(py) && ok(pz) {
        Ok(BlockPos::new(px as i32, py as i32, pz as i32))
    } else {
        Err(DecodeError::InvalidFormat)
    }
}

/// Resolves the schematic palette into index -> state, with `None` for
/// air entries so the volume scan can skip them cheaply.
fn resolve_schematic_palette(
    palette: &HashMap<String, Tag>,
) -> Result<HashMap<i32, Option<Arc<BlockState>>>, DecodeError> {
    let mut out = HashMap::with_capacity(palette.len());
    for (key, tag) in palette {
        let index = tag.as_int().ok_or(DecodeError::InvalidFormat)?;
        let state = BlockState::parse(key)?;
        let entry = if state.is_air() {
            None
        } else {
            Some(Arc::new(state))
        };
        if out.insert(index, entry).is_some() {
            return Err(DecodeError::InvalidFormat);
        }
    }
    Ok(out)
}

/// Vanilla-style structure file: `palette` list of `{Name, Properties}`
/// compounds, `blocks` list of `{pos, state}` entries, `DataVersion`
/// required.
fn map_structure(nbt: &ParsedNbt) -> Result<Vec<Block>, DecodeError> {
    if nbt.get("DataVersion").and_then(Tag::as_int).is_none() {
        return Err(DecodeError::UnsupportedVersion(0));
    }

    let palette_tags = require(nbt, "palette")?
        .as_list()
        .ok_or(DecodeError::InvalidFormat)?;
    let mut palette: Vec<Option<Arc<BlockState>>> = Vec::with_capacity(palette_tags.len());
    for tag in palette_tags {
        let comp = tag.as_compound().ok_or(DecodeError::InvalidFormat)?;
        let name = comp
            .get("Name")
            .and_then(Tag::as_str)
            .ok_or(DecodeError::InvalidFormat)?;
        let mut props: Vec<(String, String)> = Vec::new();
        if let Some(p) = comp.get("Properties") {
            let p = p.as_compound().ok_or(DecodeError::InvalidFormat)?;
            for (k, v) in p {
                let v = v.as_str().ok_or(DecodeError::InvalidFormat)?;
                props.push((k.clone(), v.to_string()));
            }
        }
        let state = BlockState::new(name, props)?;
        palette.push(if state.is_air() {
            None
        } else {
            Some(Arc::new(state))
        });
    }

    let entries = require(nbt, "blocks")?
        .as_list()
        .ok_or(DecodeError::InvalidFormat)?;
    let mut blocks = Vec::with_capacity(entries.len());
    for entry in entries {
        let comp = entry.as_compound().ok_or(DecodeError::InvalidFormat)?;
        let index = comp
            .get("state")
            .and_then(Tag::as_int)
            .ok_or(DecodeError::InvalidFormat)?;
        if index < 0 || index as usize >= palette.len() {
            return Err(DecodeError::PaletteIndexOutOfRange {
                index,
                palette_len: palette.len(),
            });
        }
        let pos_list = comp
            .get("pos")
            .and_then(Tag::as_list)
            .ok_or(DecodeError::InvalidFormat)?;
        let [px, py, pz] = pos_list else {
            return Err(DecodeError::InvalidFormat);
        };
        let pos = BlockPos::new(
            px.as_int().ok_or(DecodeError::InvalidFormat)?,
            py.as_int().ok_or(DecodeError::InvalidFormat)?,
            pz.as_int().ok_or(DecodeError::InvalidFormat)?,
        );
        if let Some(state) = &palette[index as usize] {
            blocks.push(Block::new(pos, Arc::clone(state)));
        }
    }
    Ok(blocks)
}

/// Unsigned LEB128, as used by schematic `BlockData`.
fn read_varint(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    loop {
        let (&byte, rest) = data.split_first().ok_or(DecodeError::Truncated)?;
        *data = rest;
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
        shift += 7;
        if shift > 28 {
            return Err(DecodeError::InvalidFormat);
        }
    }
}
