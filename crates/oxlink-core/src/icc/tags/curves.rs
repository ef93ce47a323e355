//! Curve Tag Types
//!
//! Two encodings:
//! - curv: identity, a single u8Fixed8 gamma, or a 16-bit table
//! - para: ICC parametric function types 0 to 4
//!
//! See ICC.1:2022 sections 10.6 (curv) and 10.18 (para)

use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::types::{Signature, type_sig};
use crate::math::param_count;
use crate::pipeline::ToneCurve;

use super::io::{TagReader, TagWriter};
use super::{TagTypeHandler, TagValue, value_mismatch};

fn read_curve_body(reader: &mut TagReader<'_>) -> Result<ToneCurve> {
    let count = reader.read_u32()? as usize;
    match count {
        0 => Ok(ToneCurve::gamma(1.0)),
        1 => Ok(ToneCurve::gamma(reader.read_u8_fixed8()?)),
        n => {
            if n > reader.remaining() / 2 {
                return Err(Error::truncated(reader.position(), n * 2, reader.remaining()));
            }
            ToneCurve::from_table16(reader.read_u16_array(n)?)
        }
    }
}

fn write_curve_body(writer: &mut TagWriter, curve: &ToneCurve) {
    match curve.as_parametric() {
        Some(p) if p.kind == 1 => {
            writer.write_u32(1);
            writer.write_u8_fixed8(p.params[0]);
        }
        _ => {
            let table = curve.table16();
            writer.write_u32(table.len() as u32);
            writer.write_u16_array(table);
        }
    }
}

fn read_parametric_body(reader: &mut TagReader<'_>) -> Result<ToneCurve> {
    let icc_type = reader.read_u16()?;
    reader.skip(2)?;
    let kind = icc_type as i32 + 1;
    let n = match param_count(kind) {
        Some(n) if icc_type <= 4 => n,
        _ => {
            return Err(Error::Corrupted(format!(
                "unknown parametric curve type {icc_type}"
            )));
        }
    };
    let params = (0..n)
        .map(|_| reader.read_s15_fixed16())
        .collect::<Result<Vec<_>>>()?;
    ToneCurve::parametric(kind, &params)
}

fn write_parametric_body(writer: &mut TagWriter, curve: &ToneCurve) -> Result<()> {
    let p = curve
        .as_parametric()
        .filter(|p| (1..=5).contains(&p.kind))
        .ok_or_else(|| {
            Error::NotSuitable("only ICC parametric types 0..4 fit a 'para' tag".into())
        })?;
    writer.write_u16((p.kind - 1) as u16);
    writer.write_u16(0);
    for &v in p.params() {
        writer.write_s15_fixed16(v);
    }
    Ok(())
}

/// Curve inside a LutAtoB/LutBtoA, dispatched on its own type signature
pub fn read_embedded_curve(reader: &mut TagReader<'_>) -> Result<ToneCurve> {
    let sig = reader.read_signature()?;
    reader.skip(4)?;
    match sig {
        type_sig::CURVE => read_curve_body(reader),
        type_sig::PARAMETRIC_CURVE => read_parametric_body(reader),
        other => Err(Error::UnknownSignature {
            kind: "curve",
            signature: other,
        }),
    }
}

/// Write a curve with its own header, as 'para' when it is one ICC parametric segment
pub fn write_embedded_curve(writer: &mut TagWriter, curve: &ToneCurve) -> Result<()> {
    let parametric = curve
        .as_parametric()
        .is_some_and(|p| (1..=5).contains(&p.kind));
    if parametric {
        writer.write_signature(type_sig::PARAMETRIC_CURVE);
        writer.write_u32(0);
        write_parametric_body(writer, curve)
    } else {
        writer.write_signature(type_sig::CURVE);
        writer.write_u32(0);
        write_curve_body(writer, curve);
        Ok(())
    }
}

/// 'curv' tag type
pub struct CurveType;

impl TagTypeHandler for CurveType {
    fn signature(&self) -> Signature {
        type_sig::CURVE
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        read_curve_body(reader).map(TagValue::Curve)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let curve = value.as_curve().ok_or_else(|| value_mismatch(self.signature()))?;
        write_curve_body(writer, curve);
        Ok(())
    }
}

/// 'para' tag type
pub struct ParametricCurveType;

impl TagTypeHandler for ParametricCurveType {
    fn signature(&self) -> Signature {
        type_sig::PARAMETRIC_CURVE
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        read_parametric_body(reader).map(TagValue::Curve)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let curve = value.as_curve().ok_or_else(|| value_mismatch(self.signature()))?;
        write_parametric_body(writer, curve)
    }
}
