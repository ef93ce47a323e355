//! multiProcessElementsType and its elements
//!
//! An 'mpet' tag is a channel header followed by a position table of
//! elements. Each element starts with its own signature and is decoded by the
//! [`ElementHandler`] registered for it in the context, so plugins can add
//! element kinds. Element offsets are relative to the tag start; offsets
//! inside a curve set element are relative to that element.
//!
//! See ICC.1:2022 section 10.14 and 11.

use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::types::{Signature, type_sig};
use crate::math::ParametricCurve;
use crate::pipeline::lut::MAX_INPUT_DIMENSIONS;
use crate::pipeline::tone_curve::{MINUS_INF, PLUS_INF};
use crate::pipeline::{
    Clut, CurveSegment, NamedColorOutput, Pipeline, SegmentKind, Stage, StageKind, ToneCurve,
};

use super::io::{TagReader, TagWriter};
use super::named::{read_ncl2_body, write_ncl2_body};
use super::position::{read_position_table, write_position_table};
use super::{ElementHandler, TagTypeHandler, TagValue, value_mismatch};

/// Element signature plus reserved word
const ELEMENT_HEADER: usize = 8;

/// Vendor flag bit marking a named color element that emits PCS values
const NAMED_PCS_FLAG: u32 = 1;

fn read_channels(reader: &mut TagReader<'_>) -> Result<(usize, usize)> {
    let n_in = reader.read_u16()? as usize;
    let n_out = reader.read_u16()? as usize;
    Ok((n_in, n_out))
}

fn write_channels(writer: &mut TagWriter, stage: &Stage) {
    writer.write_u16(stage.input_channels() as u16);
    writer.write_u16(stage.output_channels() as u16);
}

/// Element signature used when writing `stage`
fn element_signature(stage: &Stage) -> Result<Signature> {
    match stage.kind() {
        StageKind::CurveSet(_) => Ok(type_sig::CURVE_SET_ELEMENT),
        StageKind::Matrix { .. } => Ok(type_sig::MATRIX_ELEMENT),
        StageKind::Clut(_) => Ok(type_sig::CLUT_ELEMENT),
        StageKind::NamedColor { .. } => Ok(type_sig::NAMED_COLOR2),
        StageKind::Identity(_) => Ok(type_sig::B_ACS_ELEMENT),
        _ => Err(Error::NotSuitable(format!(
            "{:?} stage has no multi-process element",
            stage.stage_type()
        ))),
    }
}

/// 'mpet' tag type
pub struct MultiProcessElementType;

impl TagTypeHandler for MultiProcessElementType {
    fn signature(&self) -> Signature {
        type_sig::MULTI_PROCESS_ELEMENT
    }

    fn read(&self, ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue> {
        let (n_in, n_out) = read_channels(reader)?;
        let count = reader.read_u32()? as usize;
        if count == 0 {
            return Err(Error::Corrupted("multi-process tag without elements".into()));
        }

        let mut stages = Vec::with_capacity(count.min(64));
        read_position_table(reader, 0, count, |reader, _, size| {
            if size < ELEMENT_HEADER {
                return Err(Error::Corrupted(format!("element of {size} bytes")));
            }
            let sig = reader.read_signature()?;
            reader.skip(4)?;
            let handler = ctx.element_handler(sig).ok_or(Error::UnknownSignature {
                kind: "element",
                signature: sig,
            })?;
            stages.push(handler.read(ctx, reader, size - ELEMENT_HEADER)?);
            Ok(())
        })?;

        let pipeline = Pipeline::from_stages(stages)?;
        if pipeline.input_channels() != n_in || pipeline.output_channels() != n_out {
            return Err(Error::Corrupted(format!(
                "elements run {}→{} but the tag declares {n_in}→{n_out}",
                pipeline.input_channels(),
                pipeline.output_channels()
            )));
        }
        debug!(elements = count, n_in, n_out, "read multi-process tag");
        Ok(TagValue::Pipeline(pipeline))
    }

    fn write(&self, ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()> {
        let pipeline = value
            .as_pipeline()
            .ok_or_else(|| value_mismatch(self.signature()))?;
        let elements = pipeline
            .stages()
            .iter()
            .map(|stage| {
                let sig = element_signature(stage)?;
                let handler = ctx.element_handler(sig).ok_or(Error::UnknownSignature {
                    kind: "element",
                    signature: sig,
                })?;
                Ok((sig, handler))
            })
            .collect::<Result<Vec<_>>>()?;

        writer.write_u16(pipeline.input_channels() as u16);
        writer.write_u16(pipeline.output_channels() as u16);
        writer.write_u32(elements.len() as u32);
        write_position_table(writer, 0, elements.len(), |writer, i| {
            let (sig, handler) = &elements[i];
            writer.write_signature(*sig);
            writer.write_u32(0);
            handler.write(ctx, writer, &pipeline.stages()[i])
        })
    }
}

fn read_segment_body(
    reader: &mut TagReader<'_>,
    x0: f32,
    x1: f32,
    previous: Option<&CurveSegment>,
) -> Result<CurveSegment> {
    let sig = reader.read_signature()?;
    reader.skip(4)?;
    let kind = match sig {
        type_sig::FORMULA_SEGMENT => {
            let function = reader.read_u16()?;
            reader.skip(2)?;
            let kind = function as i32 + 6;
            let n = match crate::math::param_count(kind) {
                Some(n) if function <= 2 => n,
                _ => {
                    return Err(Error::Corrupted(format!(
                        "unknown formula segment function {function}"
                    )));
                }
            };
            let params: Vec<f64> = reader
                .read_f32_array(n)?
                .into_iter()
                .map(f64::from)
                .collect();
            let curve = ParametricCurve::new(kind, &params)
                .ok_or_else(|| Error::Corrupted("formula segment parameters".into()))?;
            SegmentKind::Parametric(curve)
        }
        type_sig::SAMPLED_SEGMENT => {
            let count = reader.read_u32()? as usize;
            if count == 0 || count > reader.remaining() / 4 {
                return Err(Error::truncated(
                    reader.position(),
                    count.saturating_mul(4),
                    reader.remaining(),
                ));
            }
            let start = previous.map_or(0.0, |seg| segment_end_value(seg, x0));
            let mut points = Vec::with_capacity(count + 1);
            points.push(start);
            points.extend(reader.read_f32_array(count)?);
            SegmentKind::Sampled(points)
        }
        other => {
            return Err(Error::UnknownSignature {
                kind: "curve segment",
                signature: other,
            });
        }
    };
    Ok(CurveSegment { x0, x1, kind })
}

/// Value of `seg` at its right end `x`, seeding the next sampled segment
fn segment_end_value(seg: &CurveSegment, x: f32) -> f32 {
    match &seg.kind {
        SegmentKind::Parametric(p) => p.eval(x as f64) as f32,
        SegmentKind::Sampled(points) => points.last().copied().unwrap_or(0.0),
    }
}

fn read_segmented_curve(reader: &mut TagReader<'_>) -> Result<ToneCurve> {
    let sig = reader.read_signature()?;
    if sig != type_sig::SEGMENTED_CURVE {
        return Err(Error::UnknownSignature {
            kind: "segmented curve",
            signature: sig,
        });
    }
    reader.skip(4)?;
    let n_segments = reader.read_u16()? as usize;
    reader.skip(2)?;
    if n_segments == 0 {
        return Err(Error::Corrupted("segmented curve without segments".into()));
    }

    let breaks = reader.read_f32_array(n_segments - 1)?;
    let mut segments: Vec<CurveSegment> = Vec::with_capacity(n_segments);
    for i in 0..n_segments {
        let x0 = if i == 0 { MINUS_INF } else { breaks[i - 1] };
        let x1 = if i == n_segments - 1 { PLUS_INF } else { breaks[i] };
        let segment = read_segment_body(reader, x0, x1, segments.last())?;
        segments.push(segment);
    }
    ToneCurve::segmented(segments)
}

/// Segments to write for `curve`; plain tables become a sampled [0, 1] span
fn writable_segments(curve: &ToneCurve) -> Result<Vec<CurveSegment>> {
    if !curve.segments().is_empty() {
        return Ok(curve.segments().to_vec());
    }
    let values: Vec<f32> = curve
        .table16()
        .iter()
        .map(|&v| v as f32 / 65535.0)
        .collect();
    Ok(ToneCurve::from_float_table(&values)?.segments().to_vec())
}

fn write_segmented_curve(writer: &mut TagWriter, curve: &ToneCurve) -> Result<()> {
    let segments = writable_segments(curve)?;
    writer.write_signature(type_sig::SEGMENTED_CURVE);
    writer.write_u32(0);
    writer.write_u16(segments.len() as u16);
    writer.write_u16(0);
    for seg in &segments[..segments.len() - 1] {
        writer.write_f32(seg.x1);
    }

    for seg in &segments {
        match &seg.kind {
            SegmentKind::Parametric(p) => {
                let (function, params): (u16, Vec<f64>) = match p.kind {
                    6..=8 => ((p.kind - 6) as u16, p.params().to_vec()),
                    // Y = X^g is function 0 with a = 1 and no offsets
                    1 => (0, vec![p.params[0], 1.0, 0.0, 0.0]),
                    kind => {
                        return Err(Error::NotSuitable(format!(
                            "parametric type {kind} has no formula segment"
                        )));
                    }
                };
                writer.write_signature(type_sig::FORMULA_SEGMENT);
                writer.write_u32(0);
                writer.write_u16(function);
                writer.write_u16(0);
                for v in params {
                    writer.write_f32(v as f32);
                }
            }
            SegmentKind::Sampled(points) => {
                // the first point is implied by the previous segment
                writer.write_signature(type_sig::SAMPLED_SEGMENT);
                writer.write_u32(0);
                writer.write_u32((points.len() - 1) as u32);
                for &v in &points[1..] {
                    writer.write_f32(v);
                }
            }
        }
    }
    Ok(())
}

/// 'cvst' element: one segmented curve per channel
pub struct CurveSetElement;

impl ElementHandler for CurveSetElement {
    fn signature(&self) -> Signature {
        type_sig::CURVE_SET_ELEMENT
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>, _size: usize) -> Result<Stage> {
        let base = reader.position() - ELEMENT_HEADER;
        let (n_in, n_out) = read_channels(reader)?;
        if n_in != n_out {
            return Err(Error::Corrupted(format!(
                "curve set element maps {n_in} channels to {n_out}"
            )));
        }
        let mut curves = Vec::with_capacity(n_in);
        read_position_table(reader, base, n_in, |reader, _, _| {
            curves.push(read_segmented_curve(reader)?);
            Ok(())
        })?;
        Stage::curves(curves)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, stage: &Stage) -> Result<()> {
        let curves = stage
            .as_curves()
            .ok_or_else(|| value_mismatch(self.signature()))?;
        let base = writer.position() - ELEMENT_HEADER;
        write_channels(writer, stage);
        write_position_table(writer, base, curves.len(), |writer, i| {
            write_segmented_curve(writer, &curves[i])
        })
    }
}

/// 'matf' element: row-major float matrix followed by the offsets
pub struct MatrixElement;

impl ElementHandler for MatrixElement {
    fn signature(&self) -> Signature {
        type_sig::MATRIX_ELEMENT
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>, _size: usize) -> Result<Stage> {
        let (n_in, n_out) = read_channels(reader)?;
        let to_f64 = |v: Vec<f32>| v.into_iter().map(f64::from).collect::<Vec<_>>();
        let m = to_f64(reader.read_f32_array(n_in * n_out)?);
        let offset = to_f64(reader.read_f32_array(n_out)?);
        Stage::matrix(n_out, n_in, &m, Some(&offset))
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, stage: &Stage) -> Result<()> {
        let (m, offset) = stage
            .as_matrix()
            .ok_or_else(|| value_mismatch(self.signature()))?;
        write_channels(writer, stage);
        for &v in m {
            writer.write_f32(v as f32);
        }
        for row in 0..stage.output_channels() {
            let v = offset.map_or(0.0, |o| o[row]);
            writer.write_f32(v as f32);
        }
        Ok(())
    }
}

/// 'clut' element: float table with per-dimension grid sizes
pub struct ClutElement;

impl ElementHandler for ClutElement {
    fn signature(&self) -> Signature {
        type_sig::CLUT_ELEMENT
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>, _size: usize) -> Result<Stage> {
        let (n_in, n_out) = read_channels(reader)?;
        if n_in == 0 || n_in > MAX_INPUT_DIMENSIONS {
            return Err(Error::ChannelCount {
                count: n_in,
                max: MAX_INPUT_DIMENSIONS,
            });
        }
        let grid_bytes = reader.read_bytes(16)?;
        let grid: Vec<u32> = grid_bytes[..n_in].iter().map(|&g| g as u32).collect();
        if let Some(&bad) = grid.iter().find(|&&g| g == 1) {
            return Err(Error::InvalidGridPoints(bad));
        }
        let len = crate::pipeline::lut::table_len(&grid, n_out)?;
        if len > reader.remaining() / 4 {
            return Err(Error::truncated(reader.position(), len * 4, reader.remaining()));
        }
        let table = reader.read_f32_array(len)?;
        Ok(Stage::clut(Clut::new_f32(&grid, n_out, Some(table))?))
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, stage: &Stage) -> Result<()> {
        let clut = stage
            .as_clut()
            .ok_or_else(|| value_mismatch(self.signature()))?;
        let mut grid = [0u8; 16];
        for (slot, &points) in grid.iter_mut().zip(clut.grid()) {
            *slot = u8::try_from(points).map_err(|_| {
                Error::NotSuitable(format!("{points} grid points exceed a clut element"))
            })?;
        }
        write_channels(writer, stage);
        writer.write_bytes(&grid);
        for v in clut.table_f32() {
            writer.write_f32(v);
        }
        Ok(())
    }
}

/// 'bACS' and 'eACS' elements, read as pass-through
pub struct AcsElement {
    signature: Signature,
}

impl AcsElement {
    pub fn begin() -> Self {
        Self {
            signature: type_sig::B_ACS_ELEMENT,
        }
    }

    pub fn end() -> Self {
        Self {
            signature: type_sig::E_ACS_ELEMENT,
        }
    }
}

impl ElementHandler for AcsElement {
    fn signature(&self) -> Signature {
        self.signature
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>, _size: usize) -> Result<Stage> {
        let (n_in, n_out) = read_channels(reader)?;
        if n_in != n_out {
            return Err(Error::Corrupted(format!(
                "'{}' element maps {n_in} channels to {n_out}",
                self.signature
            )));
        }
        Stage::identity(n_in)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, stage: &Stage) -> Result<()> {
        if !matches!(stage.kind(), StageKind::Identity(_)) {
            return Err(value_mismatch(self.signature));
        }
        write_channels(writer, stage);
        // no private ACS signature
        writer.write_u32(0);
        Ok(())
    }
}

/// Named color list carried as an element
pub struct NamedColorElement;

impl ElementHandler for NamedColorElement {
    fn signature(&self) -> Signature {
        type_sig::NAMED_COLOR2
    }

    fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>, _size: usize) -> Result<Stage> {
        let (n_in, n_out) = read_channels(reader)?;
        if n_in != 1 {
            return Err(Error::Corrupted(format!(
                "named color element with {n_in} inputs"
            )));
        }
        let (list, flags) = read_ncl2_body(reader)?;
        let output = if flags & NAMED_PCS_FLAG != 0 {
            NamedColorOutput::Pcs
        } else {
            NamedColorOutput::Colorant
        };
        let stage = Stage::named_color(list, output)?;
        if stage.output_channels() != n_out {
            return Err(Error::ChannelMismatch {
                expected: n_out,
                actual: stage.output_channels(),
            });
        }
        Ok(stage)
    }

    fn write(&self, _ctx: &Context, writer: &mut TagWriter, stage: &Stage) -> Result<()> {
        let StageKind::NamedColor { list, output } = stage.kind() else {
            return Err(value_mismatch(self.signature()));
        };
        let flags = match output {
            NamedColorOutput::Pcs => NAMED_PCS_FLAG,
            NamedColorOutput::Colorant => 0,
        };
        write_channels(writer, stage);
        write_ncl2_body(writer, list, flags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icc::tags::{decode_tag, encode_tag};
    use crate::pipeline::NamedColorList;
    use std::sync::Arc;

    fn float_pipeline() -> Pipeline {
        let srgb = ToneCurve::parametric(6, &[2.4, 1.0 / 1.055, 0.055 / 1.055, 0.0]).unwrap();
        let table: Vec<f32> = (0..17).map(|i| (i as f32 / 16.0).powf(0.8)).collect();
        let sampled = ToneCurve::from_float_table(&table).unwrap();
        let mut clut = Clut::uniform_f32(3, 5, 3).unwrap();
        clut.sample_f32(false, |input, output| {
            output[0] = input[0] * 0.9 + 0.05;
            output[1] = input[1];
            output[2] = 1.0 - input[2];
            Ok(())
        })
        .unwrap();
        Pipeline::from_stages([
            Stage::curves(vec![srgb.clone(), sampled, ToneCurve::gamma(1.8)]).unwrap(),
            Stage::matrix(
                3,
                3,
                &[0.5, 0.25, 0.25, 0.1, 0.8, 0.1, 0.0, 0.2, 0.8],
                Some(&[0.01, -0.02, 0.0]),
            )
            .unwrap(),
            Stage::identity(3).unwrap(),
            Stage::clut(clut),
        ])
        .unwrap()
    }

    #[test]
    fn test_mpe_roundtrip() {
        let ctx = Context::new();
        let pipeline = float_pipeline();
        let bytes = encode_tag(
            &ctx,
            type_sig::MULTI_PROCESS_ELEMENT,
            &TagValue::Pipeline(pipeline.clone()),
        )
        .unwrap();
        let (sig, value) = decode_tag(&ctx, &bytes).unwrap();
        assert_eq!(sig, type_sig::MULTI_PROCESS_ELEMENT);
        let back = value.into_pipeline().unwrap();
        assert_eq!(back.stage_count(), 4);

        for i in 0..=10 {
            let v = i as f32 / 10.0;
            let input = [v, 1.0 - v, v * 0.5];
            let mut a = [0.0; 3];
            let mut b = [0.0; 3];
            pipeline.eval_f32(&input, &mut a);
            back.eval_f32(&input, &mut b);
            for c in 0..3 {
                assert!((a[c] - b[c]).abs() < 1e-5, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_unknown_element_fails() {
        let ctx = Context::new();
        let pipeline = Pipeline::from_stages([Stage::identity(3).unwrap()]).unwrap();
        let mut bytes = encode_tag(
            &ctx,
            type_sig::MULTI_PROCESS_ELEMENT,
            &TagValue::Pipeline(pipeline),
        )
        .unwrap();
        // header 8, channels 4, count 4, one directory pair 8
        bytes[24..28].copy_from_slice(b"zzzz");
        let err = decode_tag(&ctx, &bytes).unwrap_err();
        assert!(matches!(err, Error::UnknownSignature { kind: "element", .. }));
    }

    #[test]
    fn test_lab_conversion_stage_not_suitable() {
        let ctx = Context::new();
        let pipeline = Pipeline::from_stages([Stage::xyz_to_lab()]).unwrap();
        let err = encode_tag(
            &ctx,
            type_sig::MULTI_PROCESS_ELEMENT,
            &TagValue::Pipeline(pipeline),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotSuitable(_)));
    }

    #[test]
    fn test_named_color_element_keeps_output_mode() {
        let ctx = Context::new();
        let mut list = NamedColorList::new(2, "", "").unwrap();
        list.push("spot", [0x8000, 0x8000, 0x8000], &[0x1000, 0x2000]).unwrap();
        let stage = Stage::named_color(list, NamedColorOutput::Pcs).unwrap();
        let pipeline = Pipeline::from_stages([stage.clone()]).unwrap();
        let bytes = encode_tag(
            &ctx,
            type_sig::MULTI_PROCESS_ELEMENT,
            &TagValue::Pipeline(pipeline),
        )
        .unwrap();
        let back = decode_tag(&ctx, &bytes).unwrap().1.into_pipeline().unwrap();
        assert_eq!(back.stages()[0], stage);
    }

    struct ScaleElement;

    impl ElementHandler for ScaleElement {
        fn signature(&self) -> Signature {
            Signature::from_bytes(*b"scal")
        }

        fn read(&self, _ctx: &Context, reader: &mut TagReader<'_>, _size: usize) -> Result<Stage> {
            let factor = reader.read_f32()? as f64;
            Stage::matrix(1, 1, &[factor], None)
        }

        fn write(&self, _ctx: &Context, writer: &mut TagWriter, _stage: &Stage) -> Result<()> {
            writer.write_f32(2.0);
            Ok(())
        }
    }

    #[test]
    fn test_plugin_element_is_consulted() {
        let ctx = Context::new();
        ctx.register_elements(vec![Arc::new(ScaleElement)]);

        let mut w = TagWriter::new();
        w.write_signature(type_sig::MULTI_PROCESS_ELEMENT);
        w.write_u32(0);
        w.write_u16(1);
        w.write_u16(1);
        w.write_u32(1);
        w.write_u32(24);
        w.write_u32(12);
        w.write_signature(Signature::from_bytes(*b"scal"));
        w.write_u32(0);
        w.write_f32(0.5);
        let bytes = w.into_inner();

        let pipeline = decode_tag(&ctx, &bytes).unwrap().1.into_pipeline().unwrap();
        let mut out = [0.0];
        pipeline.eval_f32(&[0.8], &mut out);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }
}
