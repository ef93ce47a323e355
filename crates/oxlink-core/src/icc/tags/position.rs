//! Offset/size directories for variable-length sub-records
//!
//! Used by multi-processing elements and by the curve sets inside them. The
//! directory holds `count` pairs of `(offset, size)` relative to a base
//! position in the tag arena.

use tracing::trace;

use crate::error::Result;

use super::io::{TagReader, TagWriter};

/// One directory entry, already validated against the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub offset: usize,
    pub size: usize,
}

/// Read a directory at the cursor, then visit each element.
///
/// Every `base + offset + size` is checked against the arena before any
/// element is visited. `read_element` gets the cursor positioned at the
/// element, the element index and its declared size.
pub fn read_position_table<'a, F>(
    reader: &mut TagReader<'a>,
    base: usize,
    count: usize,
    mut read_element: F,
) -> Result<()>
where
    F: FnMut(&mut TagReader<'a>, usize, usize) -> Result<()>,
{
    let mut elements = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        let offset = reader.read_u32()? as usize;
        let size = reader.read_u32()? as usize;
        let absolute = base
            .checked_add(offset)
            .unwrap_or(usize::MAX);
        reader.check_range(absolute, size)?;
        elements.push(Element {
            offset: absolute,
            size,
        });
    }

    for (i, element) in elements.iter().enumerate() {
        trace!(index = i, offset = element.offset, size = element.size, "position table element");
        reader.seek(element.offset)?;
        read_element(reader, i, element.size)?;
    }
    Ok(())
}

/// Reserve a directory, write each element, then patch real offsets in.
///
/// Elements are padded to four bytes; the recorded size excludes padding.
pub fn write_position_table<F>(
    writer: &mut TagWriter,
    base: usize,
    count: usize,
    mut write_element: F,
) -> Result<()>
where
    F: FnMut(&mut TagWriter, usize) -> Result<()>,
{
    let directory = writer.position();
    for _ in 0..count * 2 {
        writer.write_u32(0);
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let start = writer.position();
        write_element(writer, i)?;
        entries.push((start - base, writer.position() - start));
        writer.align();
    }

    for (i, (offset, size)) in entries.into_iter().enumerate() {
        writer.patch_u32(directory + i * 8, offset as u32)?;
        writer.patch_u32(directory + i * 8 + 4, size as u32)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_directory_roundtrip() {
        let mut w = TagWriter::new();
        w.write_u32(0xAAAA_AAAA);
        write_position_table(&mut w, 0, 3, |w, i| {
            for _ in 0..=i {
                w.write_u8(i as u8 + 1);
            }
            Ok(())
        })
        .unwrap();
        let bytes = w.into_inner();

        let mut r = TagReader::new(&bytes);
        r.skip(4).unwrap();
        let mut seen = Vec::new();
        read_position_table(&mut r, 0, 3, |r, i, size| {
            assert_eq!(size, i + 1);
            seen.push(r.read_bytes(size)?.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![vec![1], vec![2, 2], vec![3, 3, 3]]);
    }

    #[test]
    fn test_out_of_bounds_entry() {
        let mut w = TagWriter::new();
        w.write_u32(8);
        w.write_u32(100);
        let bytes = w.into_inner();
        let mut r = TagReader::new(&bytes);
        let err = read_position_table(&mut r, 0, 1, |_, _, _| Ok(())).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
    }

    #[test]
    fn test_truncated_directory() {
        let bytes = [0u8; 6];
        let mut r = TagReader::new(&bytes);
        assert!(read_position_table(&mut r, 0, 1, |_, _, _| Ok(())).is_err());
    }
}
