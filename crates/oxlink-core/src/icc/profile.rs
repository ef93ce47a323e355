//! In-memory ICC profile
//!
//! A [`Profile`] is a header plus an ordered tag store. Tags loaded from
//! bytes stay raw until [`Profile::read_tag`] decodes them through the
//! context's handler registry; tags written by the engine are kept decoded
//! together with the type chosen for them at write time. Tags whose type no
//! handler understands survive a load/save cycle byte for byte.
//!
//! # Example
//!
//! ```
//! use oxlink_core::Context;
//! use oxlink_core::icc::{Profile, tag};
//!
//! let ctx = Context::new();
//! let srgb = Profile::srgb(&ctx).unwrap();
//! let bytes = srgb.to_bytes(&ctx).unwrap();
//! let back = Profile::from_bytes(&bytes).unwrap();
//! assert!(back.is_matrix_shaper());
//! assert!(back.read_tag(&ctx, tag::RED_TRC).is_ok());
//! ```

use tracing::debug;

use crate::color::{D50, Xyz};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::intent::Intent;
use crate::math::{Matrix3x3, adaptation_to_d50};

use super::header::{ColorSpace, HEADER_SIZE, ProfileClass, ProfileHeader, ProfileVersion};
use super::tags::{TagValue, decode_tag, encode_tag};
use super::types::{Signature, tag};

const DIRECTORY_ENTRY: usize = 12;

/// Which way a LUT tag is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LutDirection {
    /// Device to PCS
    Input,
    /// PCS to device
    Output,
    /// Device to PCS to device, for soft proofing
    Proof,
}

#[derive(Debug, Clone, PartialEq)]
enum TagSlot {
    Raw(Vec<u8>),
    Decoded { type_sig: Signature, value: TagValue },
}

impl TagSlot {
    fn type_sig(&self) -> Option<Signature> {
        match self {
            Self::Raw(bytes) => bytes
                .get(..4)
                .map(|b| Signature(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))),
            Self::Decoded { type_sig, .. } => Some(*type_sig),
        }
    }
}

/// An ICC profile held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    header: ProfileHeader,
    tags: Vec<(Signature, TagSlot)>,
}

impl Profile {
    /// Empty profile of the given kind
    pub fn new(
        class: ProfileClass,
        color_space: ColorSpace,
        pcs: ColorSpace,
        version: ProfileVersion,
    ) -> Self {
        Self {
            header: ProfileHeader {
                device_class: class,
                color_space,
                pcs,
                version,
                ..ProfileHeader::default()
            },
            tags: Vec::new(),
        }
    }

    /// Load a profile; tag bodies are decoded on demand
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = ProfileHeader::parse(data)?;
        let declared = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let len = if declared >= HEADER_SIZE && declared <= data.len() {
            declared
        } else {
            data.len()
        };
        let data = &data[..len];

        let count_at = HEADER_SIZE;
        let count = data
            .get(count_at..count_at + 4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .ok_or_else(|| Error::truncated(count_at, 4, len))?;
        let table_end = count
            .checked_mul(DIRECTORY_ENTRY)
            .and_then(|n| n.checked_add(count_at + 4))
            .filter(|&end| end <= len)
            .ok_or_else(|| Error::truncated(count_at + 4, count.saturating_mul(DIRECTORY_ENTRY), len))?;

        let mut tags = Vec::with_capacity(count);
        for entry in data[count_at + 4..table_end].chunks_exact(DIRECTORY_ENTRY) {
            let word = |i: usize| {
                u32::from_be_bytes([entry[i], entry[i + 1], entry[i + 2], entry[i + 3]])
            };
            let sig = Signature(word(0));
            let offset = word(4) as usize;
            let size = word(8) as usize;
            let end = offset.checked_add(size).filter(|&end| end <= len).ok_or(
                Error::OutOfBounds {
                    offset,
                    size,
                    len,
                },
            )?;
            if size < 8 {
                return Err(Error::Corrupted(format!("tag '{sig}' of {size} bytes")));
            }
            // first occurrence wins on duplicated signatures
            if !tags.iter().any(|(s, _)| *s == sig) {
                tags.push((sig, TagSlot::Raw(data[offset..end].to_vec())));
            }
        }
        debug!(tags = tags.len(), version = header.version.as_f64(), "loaded profile");
        Ok(Self { header, tags })
    }

    /// Serialize header, directory and tags; identical tag blocks are shared
    pub fn to_bytes(&self, ctx: &Context) -> Result<Vec<u8>> {
        let mut blocks: Vec<Vec<u8>> = Vec::new();
        let mut directory: Vec<(Signature, usize)> = Vec::with_capacity(self.tags.len());
        for (sig, slot) in &self.tags {
            let bytes = match slot {
                TagSlot::Raw(bytes) => bytes.clone(),
                TagSlot::Decoded { type_sig, value } => {
                    encode_tag(ctx, *type_sig, value).map_err(|e| ctx.signal(e))?
                }
            };
            let block = match blocks.iter().position(|b| *b == bytes) {
                Some(i) => i,
                None => {
                    blocks.push(bytes);
                    blocks.len() - 1
                }
            };
            directory.push((*sig, block));
        }

        let mut offset = HEADER_SIZE + 4 + directory.len() * DIRECTORY_ENTRY;
        let mut placed = Vec::with_capacity(blocks.len());
        for block in &blocks {
            placed.push(offset);
            offset += block.len().next_multiple_of(4);
        }
        let total = u32::try_from(offset)
            .map_err(|_| Error::Resource(format!("profile of {offset} bytes")))?;

        let mut out = Vec::with_capacity(offset);
        out.extend_from_slice(&self.header.to_bytes(total));
        out.extend_from_slice(&(directory.len() as u32).to_be_bytes());
        for (sig, block) in &directory {
            out.extend_from_slice(&sig.0.to_be_bytes());
            out.extend_from_slice(&(placed[*block] as u32).to_be_bytes());
            out.extend_from_slice(&(blocks[*block].len() as u32).to_be_bytes());
        }
        for block in &blocks {
            out.extend_from_slice(block);
            out.resize(out.len().next_multiple_of(4), 0);
        }
        Ok(out)
    }

    pub fn header(&self) -> &ProfileHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut ProfileHeader {
        &mut self.header
    }

    pub fn color_space(&self) -> ColorSpace {
        self.header.color_space
    }

    pub fn device_class(&self) -> ProfileClass {
        self.header.device_class
    }

    pub fn pcs(&self) -> ColorSpace {
        self.header.pcs
    }

    pub fn version(&self) -> ProfileVersion {
        self.header.version
    }

    /// Version in the header's BCD encoding, e.g. `0x0440_0000`
    pub fn encoded_version(&self) -> u32 {
        self.header.version.encoded()
    }

    pub fn rendering_intent(&self) -> Intent {
        self.header.rendering_intent
    }

    pub fn set_rendering_intent(&mut self, intent: Intent) {
        self.header.rendering_intent = intent;
    }

    pub fn set_version(&mut self, version: ProfileVersion) {
        self.header.version = version;
    }

    pub fn has_tag(&self, sig: Signature) -> bool {
        self.tags.iter().any(|(s, _)| *s == sig)
    }

    /// Signatures of every tag, in directory order
    pub fn tag_signatures(&self) -> impl Iterator<Item = Signature> + '_ {
        self.tags.iter().map(|(s, _)| *s)
    }

    /// Type signature the tag is stored as
    pub fn tag_true_type(&self, sig: Signature) -> Option<Signature> {
        self.slot(sig).and_then(TagSlot::type_sig)
    }

    fn slot(&self, sig: Signature) -> Option<&TagSlot> {
        self.tags.iter().find(|(s, _)| *s == sig).map(|(_, slot)| slot)
    }

    /// Decode a tag. The stored type must be one the tag's descriptor allows.
    pub fn read_tag(&self, ctx: &Context, sig: Signature) -> Result<TagValue> {
        let slot = self.slot(sig).ok_or(Error::MissingTag(sig))?;
        match slot {
            TagSlot::Decoded { value, .. } => Ok(value.clone()),
            TagSlot::Raw(bytes) => {
                let (type_sig, value) = decode_tag(ctx, bytes).map_err(|e| ctx.signal(e))?;
                let allowed = ctx
                    .tag_descriptor(sig)
                    .is_none_or(|d| d.supports(type_sig));
                if !allowed {
                    return Err(ctx.signal(Error::Corrupted(format!(
                        "tag '{sig}' cannot hold type '{type_sig}'"
                    ))));
                }
                Ok(value)
            }
        }
    }

    /// Store a value, choosing its on-disk type from the tag descriptor and
    /// the profile version
    pub fn write_tag(&mut self, ctx: &Context, sig: Signature, value: TagValue) -> Result<()> {
        let descriptor = ctx.tag_descriptor(sig).ok_or_else(|| {
            ctx.signal(Error::UnknownSignature {
                kind: "tag",
                signature: sig,
            })
        })?;
        let type_sig = descriptor
            .type_for(self.header.version, &value)
            .filter(|t| descriptor.supports(*t))
            .ok_or_else(|| {
                ctx.signal(Error::NotSuitable(format!("no type for tag '{sig}'")))
            })?;
        if ctx.tag_type_handler(type_sig).is_none() {
            return Err(ctx.signal(Error::UnknownSignature {
                kind: "tag type",
                signature: type_sig,
            }));
        }
        debug!(%sig, %type_sig, "writing tag");
        let slot = TagSlot::Decoded { type_sig, value };
        match self.tags.iter_mut().find(|(s, _)| *s == sig) {
            Some((_, existing)) => *existing = slot,
            None => self.tags.push((sig, slot)),
        }
        Ok(())
    }

    /// Store raw tag bytes, header included, without decoding them
    pub fn write_raw_tag(&mut self, sig: Signature, bytes: Vec<u8>) {
        let slot = TagSlot::Raw(bytes);
        match self.tags.iter_mut().find(|(s, _)| *s == sig) {
            Some((_, existing)) => *existing = slot,
            None => self.tags.push((sig, slot)),
        }
    }

    pub fn remove_tag(&mut self, sig: Signature) -> bool {
        let before = self.tags.len();
        self.tags.retain(|(s, _)| *s != sig);
        self.tags.len() != before
    }

    /// Gray TRC, or RGB colorants plus TRCs
    pub fn is_matrix_shaper(&self) -> bool {
        match self.color_space() {
            ColorSpace::Gray => self.has_tag(tag::GRAY_TRC),
            ColorSpace::Rgb => [
                tag::RED_COLORANT,
                tag::GREEN_COLORANT,
                tag::BLUE_COLORANT,
                tag::RED_TRC,
                tag::GREEN_TRC,
                tag::BLUE_TRC,
            ]
            .iter()
            .all(|&t| self.has_tag(t)),
            _ => false,
        }
    }

    /// Whether a LUT tag implements `intent` in `direction`
    pub fn is_clut(&self, intent: Intent, direction: LutDirection) -> bool {
        if self.device_class() == ProfileClass::DeviceLink {
            return self.rendering_intent() == intent;
        }
        let table = match direction {
            LutDirection::Input => [tag::A2B0, tag::A2B1, tag::A2B2],
            LutDirection::Output => [tag::B2A0, tag::B2A1, tag::B2A2],
            LutDirection::Proof => {
                return self.is_intent_supported(intent, LutDirection::Input)
                    && self.is_intent_supported(
                        Intent::RELATIVE_COLORIMETRIC,
                        LutDirection::Output,
                    );
            }
        };
        let index = match intent {
            Intent::PERCEPTUAL => 0,
            Intent::RELATIVE_COLORIMETRIC | Intent::ABSOLUTE_COLORIMETRIC => 1,
            Intent::SATURATION => 2,
            _ => return false,
        };
        self.has_tag(table[index])
    }

    /// A LUT for the intent, or a matrix-shaper that serves every intent
    pub fn is_intent_supported(&self, intent: Intent, direction: LutDirection) -> bool {
        self.is_clut(intent, direction) || self.is_matrix_shaper()
    }

    /// Media white point; D50 when absent and for v2 display profiles
    pub fn media_white_point(&self, ctx: &Context) -> Xyz {
        if !self.version().is_v4() && self.device_class() == ProfileClass::Display {
            return D50;
        }
        match self.read_tag(ctx, tag::MEDIA_WHITE) {
            Ok(TagValue::Xyz(white)) => white,
            _ => D50,
        }
    }

    /// Chromatic adaptation to D50; derived from the white point for v2
    /// display profiles without a 'chad' tag
    pub fn chromatic_adaptation(&self, ctx: &Context) -> Result<Matrix3x3> {
        if let Ok(TagValue::Matrix(m)) = self.read_tag(ctx, tag::CHAD) {
            return Ok(m);
        }
        if !self.version().is_v4() && self.device_class() == ProfileClass::Display {
            if let Ok(TagValue::Xyz(white)) = self.read_tag(ctx, tag::MEDIA_WHITE) {
                return adaptation_to_d50(&white);
            }
        }
        Ok(Matrix3x3::identity())
    }
}
