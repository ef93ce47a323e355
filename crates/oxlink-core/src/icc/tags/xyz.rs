//! XYZ and s15Fixed16 array tag types
//!
//! XYZType holds colorants, white and black points; the sf32 array here
//! carries the 3×3 chromatic adaptation matrix. See ICC.1:2022 10.31, 10.22.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::types::{Signature, type_sig};
use crate::math::Matrix3x3;

use super::io::{TagReader, TagWriter};
use super::{TagTypeHandler, TagValue, value_mismatch};

/// 'XYZ ' tag type; only the first value of an array is kept
pub struct XyzType;

impl TagTypeHandler for XyzType {
    fn signature(&self) -> Signature {
        type_sig::XYZ
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        reader.read_xyz().map(TagValue::Xyz)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let xyz = value.as_xyz().ok_or_else(|| value_mismatch(self.signature()))?;
        writer.write_xyz(xyz);
        Ok(())
    }
}

/// 'sf32' tag type holding a row-major 3×3 matrix
pub struct S15Fixed16ArrayType;

impl TagTypeHandler for S15Fixed16ArrayType {
    fn signature(&self) -> Signature {
        type_sig::S15_FIXED16_ARRAY
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        let values = (0..9)
            .map(|_| reader.read_s15_fixed16())
            .collect::<Result<Vec<_>>>()?;
        Matrix3x3::from_slice(&values)
            .map(TagValue::Matrix)
            .ok_or_else(|| Error::Corrupted("sf32 matrix needs 9 values".into()))
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let m = value.as_matrix().ok_or_else(|| value_mismatch(self.signature()))?;
        for v in m.to_flat() {
            writer.write_s15_fixed16(v);
        }
        Ok(())
    }
}
