//! namedColor2Type
//!
//! Layout after the tag header: vendor flags, color count, device coordinate
//! count, 32-byte prefix and suffix, then per color a 32-byte name, 3 PCS
//! words and the device words. See ICC.1:2022 section 10.17.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::types::{Signature, type_sig};
use crate::pipeline::named::{MAX_COLORANTS, MAX_NAME_LEN};
use crate::pipeline::NamedColorList;

use super::io::{TagReader, TagWriter};
use super::{TagTypeHandler, TagValue, value_mismatch};

const NAME_FIELD: usize = MAX_NAME_LEN + 1;

/// Decode the body, returning the list and the vendor flags word
pub(crate) fn read_ncl2_body(reader: &mut TagReader<'_>) -> Result<(NamedColorList, u32)> {
    let vendor_flags = reader.read_u32()?;
    let count = reader.read_u32()? as usize;
    let colorants = reader.read_u32()? as usize;
    if colorants > MAX_COLORANTS {
        return Err(Error::ChannelCount {
            count: colorants,
            max: MAX_COLORANTS,
        });
    }
    let prefix = reader.read_fixed_string(NAME_FIELD)?;
    let suffix = reader.read_fixed_string(NAME_FIELD)?;

    let entry = NAME_FIELD + 2 * (3 + colorants);
    if count > reader.remaining() / entry {
        return Err(Error::truncated(
            reader.position(),
            count.saturating_mul(entry),
            reader.remaining(),
        ));
    }

    let mut list = NamedColorList::new(colorants, &prefix, &suffix)?;
    for _ in 0..count {
        let name = reader.read_fixed_string(NAME_FIELD)?;
        let pcs = [reader.read_u16()?, reader.read_u16()?, reader.read_u16()?];
        let device = reader.read_u16_array(colorants)?;
        list.push(&name, pcs, &device)?;
    }
    Ok((list, vendor_flags))
}

pub(crate) fn write_ncl2_body(writer: &mut TagWriter, list: &NamedColorList, vendor_flags: u32) {
    writer.write_u32(vendor_flags);
    writer.write_u32(list.len() as u32);
    writer.write_u32(list.colorant_count() as u32);
    writer.write_fixed_string(&list.prefix, NAME_FIELD);
    writer.write_fixed_string(&list.suffix, NAME_FIELD);
    for color in list.iter() {
        writer.write_fixed_string(&color.name, NAME_FIELD);
        writer.write_u16_array(&color.pcs);
        writer.write_u16_array(&color.device);
    }
}

/// 'ncl2' tag type
pub struct NamedColor2Type;

impl TagTypeHandler for NamedColor2Type {
    fn signature(&self) -> Signature {
        type_sig::NAMED_COLOR2
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        read_ncl2_body(reader).map(|(list, _)| TagValue::NamedColors(list))
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let list = value
            .as_named_colors()
            .ok_or_else(|| value_mismatch(self.signature()))?;
        write_ncl2_body(writer, list, 0);
        Ok(())
    }
}
