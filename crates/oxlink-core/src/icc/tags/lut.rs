//! LUT Tag Types
//!
//! - mft1 (Lut8Type): matrix, 8-bit curves, 8-bit CLUT, 8-bit curves
//! - mft2 (Lut16Type): the same element order with 16-bit values
//! - mAB (lutAToBType) / mBA (lutBToAType): a subset of curves, CLUT,
//!   curves, matrix and curves, addressed by offsets from the tag start
//!
//! All of them decode to a [`Pipeline`]. See ICC.1:2022 sections 10.10-10.13.

use tracing::{debug, trace};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::types::{Signature, type_sig};
use crate::math::{Matrix3x3, quantize_grid};
use crate::pipeline::{
    Clut, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS, Pipeline, Stage, StagePosition, StageType,
    ToneCurve,
};

use super::curves::{read_embedded_curve, write_embedded_curve};
use super::io::{TagReader, TagWriter};
use super::{TagTypeHandler, TagValue, value_mismatch};

/// Highest channel count a LutAtoB/LutBtoA may declare
const MAX_AB_CHANNELS: usize = 15;

/// Entries per LUT8 curve table
const LUT8_ENTRIES: usize = 256;

#[inline]
fn from_8_to_16(v: u8) -> u16 {
    (v as u16) << 8 | v as u16
}

#[inline]
fn from_16_to_8(v: u16) -> u8 {
    ((v as u32 * 65281 + 8_388_608) >> 24) as u8
}

fn check_lut_channels(n_in: usize, n_out: usize, max_in: usize, max_out: usize) -> Result<()> {
    if n_in == 0 || n_in > max_in {
        return Err(Error::ChannelCount {
            count: n_in,
            max: max_in,
        });
    }
    if n_out == 0 || n_out > max_out {
        return Err(Error::ChannelCount {
            count: n_out,
            max: max_out,
        });
    }
    Ok(())
}

fn push(pipeline: &mut Pipeline, stage: Stage) -> Result<()> {
    pipeline.insert_stage(StagePosition::End, stage)
}

/// Table of `n` entries for `curve`, resampled when its own length differs
fn curve_table(curve: &ToneCurve, n: usize) -> Vec<u16> {
    let table = curve.table16();
    if table.len() == n {
        table.to_vec()
    } else {
        (0..n as u32)
            .map(|i| curve.eval_u16(quantize_grid(i, n as u32)))
            .collect()
    }
}

/// The parts of a pipeline that fit the fixed LUT8/LUT16 element order
struct FixedOrderLut<'a> {
    matrix: Option<Matrix3x3>,
    pre: Option<&'a [ToneCurve]>,
    clut: Option<&'a Clut>,
    post: Option<&'a [ToneCurve]>,
}

impl<'a> FixedOrderLut<'a> {
    fn split(pipeline: &'a Pipeline, type_signature: Signature) -> Result<Self> {
        let not_suitable =
            || Error::NotSuitable(format!("pipeline shape cannot be stored as '{type_signature}'"));
        let mut stages = pipeline.stages().iter().peekable();

        let mut matrix = None;
        if let Some(stage) = stages.next_if(|s| s.stage_type() == StageType::Matrix) {
            let (m, offset) = stage.as_matrix().ok_or_else(not_suitable)?;
            let zero_offset = offset.is_none_or(|o| o.iter().all(|v| *v == 0.0));
            if stage.input_channels() != 3 || stage.output_channels() != 3 || !zero_offset {
                return Err(not_suitable());
            }
            matrix = Matrix3x3::from_slice(m);
        }
        let pre = stages.next_if(|s| s.stage_type() == StageType::CurveSet).and_then(Stage::as_curves);
        let clut = stages.next_if(|s| s.stage_type() == StageType::Clut).and_then(Stage::as_clut);
        let post = stages.next_if(|s| s.stage_type() == StageType::CurveSet).and_then(Stage::as_curves);
        if stages.next().is_some() {
            return Err(not_suitable());
        }
        if clut.is_none() && pipeline.input_channels() != pipeline.output_channels() {
            return Err(not_suitable());
        }
        Ok(Self {
            matrix,
            pre,
            clut,
            post,
        })
    }

    fn grid_points(&self) -> Result<u8> {
        match self.clut {
            None => Ok(0),
            Some(clut) => clut
                .uniform_points()
                .filter(|&p| p <= u8::MAX as u32)
                .map(|p| p as u8)
                .ok_or_else(|| Error::NotSuitable("LUT8/LUT16 need a uniform CLUT grid".into())),
        }
    }

    fn write_header(&self, writer: &mut TagWriter, pipeline: &Pipeline) -> Result<()> {
        let n_in = pipeline.input_channels();
        let n_out = pipeline.output_channels();
        check_lut_channels(n_in, n_out, MAX_INPUT_DIMENSIONS, u8::MAX as usize)?;
        writer.write_u8(n_in as u8);
        writer.write_u8(n_out as u8);
        writer.write_u8(self.grid_points()?);
        writer.write_u8(0);
        for v in self.matrix.unwrap_or_else(Matrix3x3::identity).to_flat() {
            writer.write_s15_fixed16(v);
        }
        Ok(())
    }
}

/// Shared LUT8/LUT16 reader; `wide` selects 16-bit tables
fn read_fixed_order(reader: &mut TagReader<'_>, wide: bool) -> Result<Pipeline> {
    let n_in = reader.read_u8()? as usize;
    let n_out = reader.read_u8()? as usize;
    let grid = reader.read_u8()? as u32;
    reader.skip(1)?;
    check_lut_channels(n_in, n_out, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS)?;
    if grid == 1 {
        return Err(Error::InvalidGridPoints(1));
    }

    let mut m = [0f64; 9];
    for v in &mut m {
        *v = reader.read_s15_fixed16()?;
    }

    let (in_entries, out_entries) = if wide {
        (reader.read_u16()? as usize, reader.read_u16()? as usize)
    } else {
        (LUT8_ENTRIES, LUT8_ENTRIES)
    };
    for entries in [in_entries, out_entries] {
        if entries == 1 || entries > 0x7FFF {
            return Err(Error::Corrupted(format!("{entries} curve entries")));
        }
    }

    let read_values = |reader: &mut TagReader<'_>, n: usize| -> Result<Vec<u16>> {
        if wide {
            reader.read_u16_array(n)
        } else {
            Ok(reader.read_bytes(n)?.iter().map(|&b| from_8_to_16(b)).collect())
        }
    };
    let read_curves = |reader: &mut TagReader<'_>, channels: usize, entries: usize| {
        (0..channels)
            .map(|_| ToneCurve::from_table16(read_values(reader, entries)?))
            .collect::<Result<Vec<_>>>()
    };

    let mut pipeline = Pipeline::empty();
    if let Some(matrix) = Matrix3x3::from_slice(&m) {
        if n_in == 3 && !matrix.is_identity(1.0 / 65535.0) {
            push(&mut pipeline, Stage::matrix3(&matrix, None))?;
        }
    }
    if in_entries > 0 {
        push(&mut pipeline, Stage::curves(read_curves(reader, n_in, in_entries)?)?)?;
    }
    if grid > 0 {
        let grid = vec![grid; n_in];
        let len = crate::pipeline::lut::table_len(&grid, n_out)?;
        if len > reader.remaining() / if wide { 2 } else { 1 } {
            return Err(Error::truncated(reader.position(), len, reader.remaining()));
        }
        let table = read_values(reader, len)?;
        push(&mut pipeline, Stage::clut(Clut::new_u16(&grid, n_out, Some(table))?))?;
    }
    if out_entries > 0 {
        push(&mut pipeline, Stage::curves(read_curves(reader, n_out, out_entries)?)?)?;
    }
    if pipeline.stage_count() == 0 {
        pipeline = Pipeline::new(n_in, n_out)?;
    }
    Ok(pipeline)
}

/// 'mft1' tag type
pub struct Lut8Type;

impl TagTypeHandler for Lut8Type {
    fn signature(&self) -> Signature {
        type_sig::LUT8
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        trace!("reading LUT8");
        let mut pipeline = read_fixed_order(reader, false)?;
        pipeline.set_save_as_8bit(true);
        Ok(TagValue::Pipeline(pipeline))
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let pipeline = value.as_pipeline().ok_or_else(|| value_mismatch(self.signature()))?;
        let parts = FixedOrderLut::split(pipeline, self.signature())?;
        parts.write_header(writer, pipeline)?;

        let write_curves = |writer: &mut TagWriter, curves: Option<&[ToneCurve]>, n: usize| {
            for c in 0..n {
                match curves.and_then(|cs| cs.get(c)) {
                    Some(curve) => {
                        for v in curve_table(curve, LUT8_ENTRIES) {
                            writer.write_u8(from_16_to_8(v));
                        }
                    }
                    None => (0..=255u8).for_each(|v| writer.write_u8(v)),
                }
            }
        };
        write_curves(writer, parts.pre, pipeline.input_channels());
        if let Some(clut) = parts.clut {
            for v in clut.table_u16() {
                writer.write_u8(from_16_to_8(v));
            }
        }
        write_curves(writer, parts.post, pipeline.output_channels());
        Ok(())
    }
}

/// 'mft2' tag type
pub struct Lut16Type;

impl TagTypeHandler for Lut16Type {
    fn signature(&self) -> Signature {
        type_sig::LUT16
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        trace!("reading LUT16");
        read_fixed_order(reader, true).map(TagValue::Pipeline)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let pipeline = value.as_pipeline().ok_or_else(|| value_mismatch(self.signature()))?;
        let parts = FixedOrderLut::split(pipeline, self.signature())?;
        parts.write_header(writer, pipeline)?;

        let entries = |curves: Option<&[ToneCurve]>| {
            curves
                .and_then(|cs| cs.first())
                .map_or(2, |c| c.table16().len().clamp(2, 4096))
        };
        let in_entries = entries(parts.pre);
        let out_entries = entries(parts.post);
        writer.write_u16(in_entries as u16);
        writer.write_u16(out_entries as u16);

        let write_curves = |writer: &mut TagWriter, curves: Option<&[ToneCurve]>, n: usize, entries: usize| {
            for c in 0..n {
                match curves.and_then(|cs| cs.get(c)) {
                    Some(curve) => writer.write_u16_array(&curve_table(curve, entries)),
                    None => writer.write_u16_array(&curve_table(&ToneCurve::identity(), entries)),
                }
            }
        };
        write_curves(writer, parts.pre, pipeline.input_channels(), in_entries);
        if let Some(clut) = parts.clut {
            writer.write_u16_array(&clut.table_u16());
        }
        write_curves(writer, parts.post, pipeline.output_channels(), out_entries);
        Ok(())
    }
}

/// Which way a LutAtoB-style tag runs; the element order flips with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    AtoB,
    BtoA,
}

/// Element offsets in directory order `{B, Matrix, M, CLUT, A}`
#[derive(Debug, Default, Clone, Copy)]
struct AbOffsets {
    b: u32,
    matrix: u32,
    m: u32,
    clut: u32,
    a: u32,
}

fn read_curve_set(reader: &mut TagReader<'_>, offset: u32, n: usize) -> Result<Stage> {
    reader.seek(offset as usize)?;
    let mut curves = Vec::with_capacity(n);
    for _ in 0..n {
        curves.push(read_embedded_curve(reader)?);
        reader.align()?;
    }
    Stage::curves(curves)
}

fn read_ab_matrix(reader: &mut TagReader<'_>, offset: u32) -> Result<Stage> {
    reader.seek(offset as usize)?;
    let mut m = [0f64; 9];
    let mut off = [0f64; 3];
    for v in m.iter_mut().chain(off.iter_mut()) {
        *v = reader.read_s15_fixed16()?;
    }
    Stage::matrix(3, 3, &m, Some(&off))
}

fn read_ab_clut(reader: &mut TagReader<'_>, offset: u32, n_in: usize, n_out: usize) -> Result<Stage> {
    reader.seek(offset as usize)?;
    let points = reader.read_bytes(16)?;
    let grid: Vec<u32> = points[..n_in].iter().map(|&p| p as u32).collect();
    let precision = reader.read_u8()?;
    reader.skip(3)?;
    let len = crate::pipeline::lut::table_len(&grid, n_out)?;
    let table = match precision {
        1 => reader.read_bytes(len)?.iter().map(|&b| from_8_to_16(b)).collect(),
        2 => reader.read_u16_array(len)?,
        p => return Err(Error::Corrupted(format!("CLUT precision {p}"))),
    };
    Ok(Stage::clut(Clut::new_u16(&grid, n_out, Some(table))?))
}

fn read_ab(reader: &mut TagReader<'_>, direction: Direction) -> Result<Pipeline> {
    let n_in = reader.read_u8()? as usize;
    let n_out = reader.read_u8()? as usize;
    reader.skip(2)?;
    check_lut_channels(n_in, n_out, MAX_AB_CHANNELS, MAX_AB_CHANNELS)?;
    let o = AbOffsets {
        b: reader.read_u32()?,
        matrix: reader.read_u32()?,
        m: reader.read_u32()?,
        clut: reader.read_u32()?,
        a: reader.read_u32()?,
    };
    trace!(?direction, ?o, n_in, n_out, "reading LutAtoB/LutBtoA");

    let mut p = Pipeline::empty();
    match direction {
        Direction::AtoB => {
            if o.a != 0 {
                push(&mut p, read_curve_set(reader, o.a, n_in)?)?;
            }
            if o.clut != 0 {
                push(&mut p, read_ab_clut(reader, o.clut, n_in, n_out)?)?;
            }
            if o.m != 0 {
                push(&mut p, read_curve_set(reader, o.m, n_out)?)?;
            }
            if o.matrix != 0 {
                push(&mut p, read_ab_matrix(reader, o.matrix)?)?;
            }
            if o.b != 0 {
                push(&mut p, read_curve_set(reader, o.b, n_out)?)?;
            }
        }
        Direction::BtoA => {
            if o.b != 0 {
                push(&mut p, read_curve_set(reader, o.b, n_in)?)?;
            }
            if o.matrix != 0 {
                push(&mut p, read_ab_matrix(reader, o.matrix)?)?;
            }
            if o.m != 0 {
                push(&mut p, read_curve_set(reader, o.m, n_in)?)?;
            }
            if o.clut != 0 {
                push(&mut p, read_ab_clut(reader, o.clut, n_in, n_out)?)?;
            }
            if o.a != 0 {
                push(&mut p, read_curve_set(reader, o.a, n_out)?)?;
            }
        }
    }
    if p.input_channels() != n_in || p.output_channels() != n_out {
        return Err(Error::ChannelMismatch {
            expected: n_in,
            actual: p.input_channels(),
        });
    }
    Ok(p)
}

/// Stages of an AtoB/BtoA tag keyed by slot
#[derive(Default)]
struct AbParts<'a> {
    a: Option<&'a [ToneCurve]>,
    clut: Option<&'a Clut>,
    m: Option<&'a [ToneCurve]>,
    matrix: Option<&'a Stage>,
    b: Option<&'a [ToneCurve]>,
}

fn split_ab(pipeline: &Pipeline, direction: Direction, sig: Signature) -> Result<AbParts<'_>> {
    use StageType::{Clut as C, CurveSet as T, Matrix as X};

    let s = pipeline.stages();
    let curves = |i: usize| s[i].as_curves();
    let mut parts = AbParts::default();
    if pipeline.check_and_retrieve(&[T]).is_some() {
        parts.b = curves(0);
    } else if pipeline.check_and_retrieve(&[T, X, T]).is_some() {
        let (first, last) = (curves(0), curves(2));
        parts.matrix = Some(&s[1]);
        match direction {
            Direction::AtoB => (parts.m, parts.b) = (first, last),
            Direction::BtoA => (parts.b, parts.m) = (first, last),
        }
    } else if pipeline.check_and_retrieve(&[T, C, T]).is_some() {
        let (first, last) = (curves(0), curves(2));
        parts.clut = s[1].as_clut();
        match direction {
            Direction::AtoB => (parts.a, parts.b) = (first, last),
            Direction::BtoA => (parts.b, parts.a) = (first, last),
        }
    } else if direction == Direction::AtoB && pipeline.check_and_retrieve(&[T, C, T, X, T]).is_some() {
        parts.a = curves(0);
        parts.clut = s[1].as_clut();
        parts.m = curves(2);
        parts.matrix = Some(&s[3]);
        parts.b = curves(4);
    } else if direction == Direction::BtoA && pipeline.check_and_retrieve(&[T, X, T, C, T]).is_some() {
        parts.b = curves(0);
        parts.matrix = Some(&s[1]);
        parts.m = curves(2);
        parts.clut = s[3].as_clut();
        parts.a = curves(4);
    } else {
        return Err(Error::NotSuitable(format!(
            "pipeline shape cannot be stored as '{sig}'"
        )));
    }
    Ok(parts)
}

fn write_curve_set(writer: &mut TagWriter, curves: &[ToneCurve]) -> Result<u32> {
    let at = writer.position() as u32;
    for curve in curves {
        write_embedded_curve(writer, curve)?;
        writer.align();
    }
    Ok(at)
}

fn write_ab(writer: &mut TagWriter, pipeline: &Pipeline, direction: Direction, sig: Signature) -> Result<()> {
    let parts = split_ab(pipeline, direction, sig)?;
    let n_in = pipeline.input_channels();
    let n_out = pipeline.output_channels();
    check_lut_channels(n_in, n_out, MAX_AB_CHANNELS, MAX_AB_CHANNELS)?;

    writer.write_u8(n_in as u8);
    writer.write_u8(n_out as u8);
    writer.write_u16(0);
    let directory = writer.position();
    for _ in 0..5 {
        writer.write_u32(0);
    }

    let mut o = AbOffsets::default();
    if let Some(a) = parts.a {
        o.a = write_curve_set(writer, a)?;
    }
    if let Some(clut) = parts.clut {
        o.clut = writer.position() as u32;
        let mut points = [0u8; 16];
        for (slot, &g) in points.iter_mut().zip(clut.grid()) {
            *slot = u8::try_from(g)
                .map_err(|_| Error::NotSuitable(format!("{g} grid points in '{sig}'")))?;
        }
        writer.write_bytes(&points);
        writer.write_u8(2);
        writer.write_bytes(&[0; 3]);
        writer.write_u16_array(&clut.table_u16());
        writer.align();
    }
    if let Some(m) = parts.m {
        o.m = write_curve_set(writer, m)?;
    }
    if let Some(stage) = parts.matrix {
        let (m, offset) = stage
            .as_matrix()
            .filter(|_| stage.input_channels() == 3 && stage.output_channels() == 3)
            .ok_or_else(|| Error::NotSuitable(format!("'{sig}' needs a 3x3 matrix")))?;
        o.matrix = writer.position() as u32;
        for &v in m {
            writer.write_s15_fixed16(v);
        }
        for i in 0..3 {
            writer.write_s15_fixed16(offset.map_or(0.0, |o| o[i]));
        }
    }
    if let Some(b) = parts.b {
        o.b = write_curve_set(writer, b)?;
    }

    for (i, v) in [o.b, o.matrix, o.m, o.clut, o.a].into_iter().enumerate() {
        writer.patch_u32(directory + i * 4, v)?;
    }
    debug!(%sig, ?o, "wrote LutAtoB/LutBtoA");
    Ok(())
}

/// 'mAB ' tag type
pub struct LutAtoBType;

impl TagTypeHandler for LutAtoBType {
    fn signature(&self) -> Signature {
        type_sig::LUT_A_TO_B
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        read_ab(reader, Direction::AtoB).map(TagValue::Pipeline)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let pipeline = value.as_pipeline().ok_or_else(|| value_mismatch(self.signature()))?;
        write_ab(writer, pipeline, Direction::AtoB, self.signature())
    }
}

/// 'mBA ' tag type
pub struct LutBtoAType;

impl TagTypeHandler for LutBtoAType {
    fn signature(&self) -> Signature {
        type_sig::LUT_B_TO_A
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        read_ab(reader, Direction::BtoA).map(TagValue::Pipeline)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let pipeline = value.as_pipeline().ok_or_else(|| value_mismatch(self.signature()))?;
        write_ab(writer, pipeline, Direction::BtoA, self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icc::tags::{decode_tag, encode_tag};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_clut(rng: &mut ChaCha8Rng, n_in: usize, points: u32, n_out: usize) -> Clut {
        let mut clut = Clut::uniform_u16(n_in, points, n_out).unwrap();
        clut.sample_16(false, |_, out| {
            for v in out.iter_mut() {
                *v = rng.r#gen();
            }
            Ok(())
        })
        .unwrap();
        clut
    }

    fn assert_same_eval(a: &Pipeline, b: &Pipeline, tolerance: f32) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut oa = [0f32; 16];
        let mut ob = [0f32; 16];
        for _ in 0..200 {
            let input: Vec<f32> = (0..a.input_channels()).map(|_| rng.r#gen()).collect();
            a.eval_f32(&input, &mut oa);
            b.eval_f32(&input, &mut ob);
            for c in 0..a.output_channels() {
                assert!((oa[c] - ob[c]).abs() <= tolerance, "channel {c}: {} vs {}", oa[c], ob[c]);
            }
        }
    }

    fn roundtrip(sig: Signature, p: &Pipeline) -> Pipeline {
        let ctx = Context::new();
        let bytes = encode_tag(&ctx, sig, &TagValue::Pipeline(p.clone())).unwrap();
        let (read_sig, value) = decode_tag(&ctx, &bytes).unwrap();
        assert_eq!(read_sig, sig);
        value.into_pipeline().unwrap()
    }

    #[test]
    fn test_lut16_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tabulated = |g: f64| ToneCurve::from_table16(ToneCurve::gamma(g).table16().to_vec()).unwrap();
        let p = Pipeline::from_stages([
            Stage::curves(vec![tabulated(1.8); 3]).unwrap(),
            Stage::clut(random_clut(&mut rng, 3, 9, 4)),
            Stage::curves(vec![tabulated(0.9); 4]).unwrap(),
        ])
        .unwrap();
        let back = roundtrip(type_sig::LUT16, &p);
        assert_eq!((back.input_channels(), back.output_channels()), (3, 4));
        assert_same_eval(&p, &back, 1.0 / 65535.0);
    }

    #[test]
    fn test_lut16_keeps_non_identity_matrix() {
        let m = Matrix3x3::new([[0.9, 0.1, 0.0], [0.0, 1.0, 0.0], [0.0, 0.2, 0.8]]);
        let p = Pipeline::from_stages([
            Stage::matrix3(&m, None),
            Stage::identity_curves(3).unwrap(),
        ])
        .unwrap();
        let back = roundtrip(type_sig::LUT16, &p);
        assert_eq!(back.first_stage().unwrap().stage_type(), StageType::Matrix);
        assert_same_eval(&p, &back, 1e-4);
    }

    #[test]
    fn test_lut8_roundtrip_is_coarse() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut p = Pipeline::from_stages([Stage::clut(random_clut(&mut rng, 3, 5, 3))]).unwrap();
        p.set_save_as_8bit(true);
        let back = roundtrip(type_sig::LUT8, &p);
        assert!(back.save_as_8bit());
        assert_same_eval(&p, &back, 1.0 / 255.0);
    }

    #[test]
    fn test_lut16_rejects_grid_of_one() {
        let ctx = Context::new();
        let mut w = TagWriter::new();
        w.write_signature(type_sig::LUT16);
        w.write_u32(0);
        w.write_bytes(&[3, 3, 1, 0]);
        for v in Matrix3x3::identity().to_flat() {
            w.write_s15_fixed16(v);
        }
        w.write_u16(2);
        w.write_u16(2);
        w.write_u16_array(&[0, 0xffff, 0, 0xffff, 0, 0xffff]);
        w.write_u16_array(&[0; 3]);
        let err = decode_tag(&ctx, w.as_slice()).unwrap_err();
        assert_eq!(err, Error::InvalidGridPoints(1));
    }

    #[test]
    fn test_lut16_rejects_zero_channels() {
        let ctx = Context::new();
        let mut bytes = b"mft2\0\0\0\0".to_vec();
        bytes.extend_from_slice(&[0, 3, 2, 0]);
        bytes.extend_from_slice(&[0; 40]);
        assert!(matches!(
            decode_tag(&ctx, &bytes),
            Err(Error::ChannelCount { count: 0, .. })
        ));
    }

    #[test]
    fn test_lut16_truncated_clut() {
        let ctx = Context::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let p = Pipeline::from_stages([Stage::clut(random_clut(&mut rng, 3, 17, 3))]).unwrap();
        let bytes = encode_tag(&ctx, type_sig::LUT16, &TagValue::Pipeline(p)).unwrap();
        assert!(matches!(
            decode_tag(&ctx, &bytes[..bytes.len() - 100]),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn test_a2b_full_shape_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let m = Matrix3x3::new([[0.5, 0.2, 0.1], [0.1, 0.6, 0.1], [0.0, 0.1, 0.7]]);
        let p = Pipeline::from_stages([
            Stage::curves(vec![ToneCurve::gamma(2.2); 4]).unwrap(),
            Stage::clut(random_clut(&mut rng, 4, 5, 3)),
            Stage::curves(vec![ToneCurve::gamma(1.2); 3]).unwrap(),
            Stage::matrix3(&m, Some([0.01, 0.02, 0.03])),
            Stage::identity_curves(3).unwrap(),
        ])
        .unwrap();
        let back = roundtrip(type_sig::LUT_A_TO_B, &p);
        assert_eq!(back.stage_count(), 5);
        // s15Fixed16 matrix and gamma quantization
        assert_same_eval(&p, &back, 1e-4);
    }

    #[test]
    fn test_b2a_matrix_shape_roundtrip() {
        let m = Matrix3x3::new([[0.7, 0.2, 0.1], [0.1, 0.8, 0.1], [0.05, 0.15, 0.8]]);
        let p = Pipeline::from_stages([
            Stage::identity_curves(3).unwrap(),
            Stage::matrix3(&m, None),
            Stage::curves(vec![ToneCurve::gamma(1.2); 3]).unwrap(),
        ])
        .unwrap();
        let back = roundtrip(type_sig::LUT_B_TO_A, &p);
        assert_same_eval(&p, &back, 1e-4);
    }

    #[test]
    fn test_ab_rejects_unlisted_shape() {
        let p = Pipeline::from_stages([
            Stage::matrix3(&Matrix3x3::identity(), None),
            Stage::identity_curves(3).unwrap(),
        ])
        .unwrap();
        let err = encode_tag(&Context::new(), type_sig::LUT_A_TO_B, &TagValue::Pipeline(p)).unwrap_err();
        assert!(matches!(err, Error::NotSuitable(_)));
    }

    #[test]
    fn test_ab_offset_out_of_bounds() {
        let ctx = Context::new();
        let p = Pipeline::from_stages([Stage::identity_curves(3).unwrap()]).unwrap();
        let mut bytes = encode_tag(&ctx, type_sig::LUT_A_TO_B, &TagValue::Pipeline(p)).unwrap();
        // B offset
        bytes[12..16].copy_from_slice(&10_000u32.to_be_bytes());
        assert!(matches!(decode_tag(&ctx, &bytes), Err(Error::OutOfBounds { .. })));
    }
}
