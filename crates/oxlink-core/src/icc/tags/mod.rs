//! ICC tag codec
//!
//! Tags are typed blobs. Each starts with an 8-byte header (type signature
//! plus 4 reserved bytes) followed by type-specific data. See ICC.1:2022
//! section 10.
//!
//! Decoding and encoding go through [`TagTypeHandler`]s looked up by type
//! signature in the [`Context`] registry, plugin tier first. Multi-processing
//! elements use a second registry of [`ElementHandler`]s. Which type a tag is
//! written as is decided by its [`TagDescriptor`].

pub mod io;
pub mod position;

mod curves;
mod lut;
mod mpe;
mod named;
mod xyz;

use std::fmt;
use std::sync::Arc;

use tracing::trace;

pub use curves::{CurveType, ParametricCurveType, read_embedded_curve, write_embedded_curve};
pub use io::{TagReader, TagWriter};
pub use lut::{Lut8Type, Lut16Type, LutAtoBType, LutBtoAType};
pub use mpe::{
    AcsElement, ClutElement, CurveSetElement, MatrixElement, MultiProcessElementType,
    NamedColorElement,
};
pub use named::NamedColor2Type;
pub use xyz::{S15Fixed16ArrayType, XyzType};

use crate::color::Xyz;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::header::ProfileVersion;
use crate::icc::types::{Signature, tag, type_sig};
use crate::math::Matrix3x3;
use crate::pipeline::{NamedColorList, Pipeline, Stage, ToneCurve};

/// Decoded tag content
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Xyz(Xyz),
    Curve(ToneCurve),
    /// 3×3 matrix from an s15Fixed16 array (chad)
    Matrix(Matrix3x3),
    Pipeline(Pipeline),
    NamedColors(NamedColorList),
}

impl TagValue {
    pub fn as_xyz(&self) -> Option<&Xyz> {
        match self {
            Self::Xyz(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_curve(&self) -> Option<&ToneCurve> {
        match self {
            Self::Curve(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Matrix3x3> {
        match self {
            Self::Matrix(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_pipeline(&self) -> Option<&Pipeline> {
        match self {
            Self::Pipeline(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_pipeline(self) -> Option<Pipeline> {
        match self {
            Self::Pipeline(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_named_colors(&self) -> Option<&NamedColorList> {
        match self {
            Self::NamedColors(n) => Some(n),
            _ => None,
        }
    }
}

/// Reads and writes one tag type.
///
/// `read` gets a cursor placed just after the 8-byte tag header over an arena
/// that spans the whole tag; `write` appends the body after the header.
/// Duplication and release are `Clone` and `Drop` of [`TagValue`].
pub trait TagTypeHandler: Send + Sync {
    fn signature(&self) -> Signature;

    fn read(&self, ctx: &Context, reader: &mut TagReader<'_>) -> Result<TagValue>;

    fn write(&self, ctx: &Context, writer: &mut TagWriter, value: &TagValue) -> Result<()>;
}

/// Reads and writes one multi-processing element kind.
///
/// The cursor sits after the element's signature and reserved field.
pub trait ElementHandler: Send + Sync {
    fn signature(&self) -> Signature;

    fn read(&self, ctx: &Context, reader: &mut TagReader<'_>, size: usize) -> Result<Stage>;

    fn write(&self, ctx: &Context, writer: &mut TagWriter, stage: &Stage) -> Result<()>;
}

/// Chooses the on-disk type for a value given the profile version
pub type TypeDecider = fn(ProfileVersion, &TagValue) -> Signature;

/// What a tag signature may hold
#[derive(Clone)]
pub struct TagDescriptor {
    /// Accepted type signatures, the first being the default
    pub supported_types: Vec<Signature>,
    pub decide_type: Option<TypeDecider>,
}

impl TagDescriptor {
    pub fn single(type_signature: Signature) -> Self {
        Self {
            supported_types: vec![type_signature],
            decide_type: None,
        }
    }

    pub fn new(supported_types: Vec<Signature>, decide_type: TypeDecider) -> Self {
        Self {
            supported_types,
            decide_type: Some(decide_type),
        }
    }

    pub fn supports(&self, type_signature: Signature) -> bool {
        self.supported_types.contains(&type_signature)
    }

    /// Type to write `value` as in a profile of `version`
    pub fn type_for(&self, version: ProfileVersion, value: &TagValue) -> Option<Signature> {
        match self.decide_type {
            Some(decide) => Some(decide(version, value)),
            None => self.supported_types.first().copied(),
        }
    }
}

impl fmt::Debug for TagDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDescriptor")
            .field("supported_types", &self.supported_types)
            .field("decide_type", &self.decide_type.is_some())
            .finish()
    }
}

fn is_8bit(value: &TagValue) -> bool {
    value.as_pipeline().is_some_and(Pipeline::save_as_8bit)
}

fn decide_lut_a_to_b(version: ProfileVersion, value: &TagValue) -> Signature {
    if is_8bit(value) {
        type_sig::LUT8
    } else if !version.is_v4() {
        type_sig::LUT16
    } else {
        type_sig::LUT_A_TO_B
    }
}

fn decide_lut_b_to_a(version: ProfileVersion, value: &TagValue) -> Signature {
    if is_8bit(value) {
        type_sig::LUT8
    } else if !version.is_v4() {
        type_sig::LUT16
    } else {
        type_sig::LUT_B_TO_A
    }
}

fn decide_curve(version: ProfileVersion, value: &TagValue) -> Signature {
    let parametric = value
        .as_curve()
        .and_then(ToneCurve::as_parametric)
        .is_some_and(|p| (1..=5).contains(&p.kind));
    if version.is_v4() && parametric {
        type_sig::PARAMETRIC_CURVE
    } else {
        type_sig::CURVE
    }
}

/// Built-in tag type handlers
pub fn builtin_type_handlers() -> Vec<Arc<dyn TagTypeHandler>> {
    vec![
        Arc::new(XyzType),
        Arc::new(S15Fixed16ArrayType),
        Arc::new(CurveType),
        Arc::new(ParametricCurveType),
        Arc::new(Lut8Type),
        Arc::new(Lut16Type),
        Arc::new(LutAtoBType),
        Arc::new(LutBtoAType),
        Arc::new(MultiProcessElementType),
        Arc::new(NamedColor2Type),
    ]
}

/// Built-in multi-processing element handlers
pub fn builtin_element_handlers() -> Vec<Arc<dyn ElementHandler>> {
    vec![
        Arc::new(CurveSetElement),
        Arc::new(MatrixElement),
        Arc::new(ClutElement),
        Arc::new(AcsElement::begin()),
        Arc::new(AcsElement::end()),
        Arc::new(NamedColorElement),
    ]
}

/// Built-in tag descriptors
pub fn builtin_tag_descriptors() -> Vec<(Signature, TagDescriptor)> {
    let a2b = || {
        TagDescriptor::new(
            vec![type_sig::LUT16, type_sig::LUT_A_TO_B, type_sig::LUT8],
            decide_lut_a_to_b,
        )
    };
    let b2a = || {
        TagDescriptor::new(
            vec![type_sig::LUT16, type_sig::LUT_B_TO_A, type_sig::LUT8],
            decide_lut_b_to_a,
        )
    };
    let trc = || {
        TagDescriptor::new(
            vec![type_sig::CURVE, type_sig::PARAMETRIC_CURVE],
            decide_curve,
        )
    };
    let xyz = || TagDescriptor::single(type_sig::XYZ);
    let mpe = || TagDescriptor::single(type_sig::MULTI_PROCESS_ELEMENT);

    let mut out = vec![
        (tag::A2B0, a2b()),
        (tag::A2B1, a2b()),
        (tag::A2B2, a2b()),
        (tag::B2A0, b2a()),
        (tag::B2A1, b2a()),
        (tag::B2A2, b2a()),
        (tag::GAMUT, b2a()),
        (tag::PREVIEW0, b2a()),
        (tag::PREVIEW1, b2a()),
        (tag::PREVIEW2, b2a()),
        (tag::RED_TRC, trc()),
        (tag::GREEN_TRC, trc()),
        (tag::BLUE_TRC, trc()),
        (tag::GRAY_TRC, trc()),
        (tag::RED_COLORANT, xyz()),
        (tag::GREEN_COLORANT, xyz()),
        (tag::BLUE_COLORANT, xyz()),
        (tag::MEDIA_WHITE, xyz()),
        (tag::MEDIA_BLACK, xyz()),
        (tag::LUMINANCE, xyz()),
        (tag::CHAD, TagDescriptor::single(type_sig::S15_FIXED16_ARRAY)),
        (tag::NAMED_COLOR2, TagDescriptor::single(type_sig::NAMED_COLOR2)),
    ];
    for sig in [
        tag::D2B0,
        tag::D2B1,
        tag::D2B2,
        tag::D2B3,
        tag::B2D0,
        tag::B2D1,
        tag::B2D2,
        tag::B2D3,
    ] {
        out.push((sig, mpe()));
    }
    out
}

/// Decode a whole tag, header included, returning its type and value
pub fn decode_tag(ctx: &Context, bytes: &[u8]) -> Result<(Signature, TagValue)> {
    let mut reader = TagReader::new(bytes);
    let type_signature = reader.read_signature()?;
    reader.skip(4)?;
    let handler = ctx
        .tag_type_handler(type_signature)
        .ok_or(Error::UnknownSignature {
            kind: "tag type",
            signature: type_signature,
        })?;
    trace!(%type_signature, len = bytes.len(), "decoding tag");
    let value = handler.read(ctx, &mut reader)?;
    Ok((type_signature, value))
}

/// Encode `value` as a whole tag of the given type
pub fn encode_tag(ctx: &Context, type_signature: Signature, value: &TagValue) -> Result<Vec<u8>> {
    let handler = ctx
        .tag_type_handler(type_signature)
        .ok_or(Error::UnknownSignature {
            kind: "tag type",
            signature: type_signature,
        })?;
    let mut writer = TagWriter::new();
    writer.write_signature(type_signature);
    writer.write_u32(0);
    handler.write(ctx, &mut writer, value)?;
    Ok(writer.into_inner())
}

/// Wrong value kind handed to a handler
pub(crate) fn value_mismatch(handler: Signature) -> Error {
    Error::NotSuitable(format!("value cannot be written as '{handler}'"))
}
