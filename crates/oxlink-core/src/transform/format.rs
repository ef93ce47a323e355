//! Pixel layouts and the formatters that read and write them
//!
//! A [`PixelFormat`] describes how one pixel sits in a byte buffer. Binding
//! a format produces a [`Formatter`] that moves pixels between that layout
//! and the pipeline domain: 16-bit words for the precalculated path, floats
//! in the pipeline encoding for the float path.

use crate::color::MAX_ENCODEABLE_XYZ;
use crate::context::MAX_CHANNELS;
use crate::error::{Error, Result};
use crate::icc::ColorSpace;
use crate::math::{f32_to_u16, quick_saturate_word, u16_to_f32};
use crate::simd;

/// Layout of one pixel in a buffer
///
/// Channels are interleaved. `reversed` stores the color channels last to
/// first (BGR); `swap_first` moves the first sample to the end, or the
/// extra channels in front of the color channels when there are any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelFormat {
    /// Color space the data is in; None accepts any
    pub space: Option<ColorSpace>,
    pub channels: u8,
    /// Alpha or other channels carried beside the color
    pub extra: u8,
    /// 1 or 2 for integers, 4 (f32) or 8 (f64) for floats
    pub bytes: u8,
    pub float: bool,
    pub reversed: bool,
    pub swap_first: bool,
    /// 0 is full intensity
    pub min_is_white: bool,
    /// 16-bit samples in the opposite byte order
    pub endian16: bool,
    pub planar: bool,
}

impl PixelFormat {
    pub const fn new(space: ColorSpace, channels: u8, bytes: u8) -> Self {
        Self {
            space: Some(space),
            channels,
            extra: 0,
            bytes,
            float: false,
            reversed: false,
            swap_first: false,
            min_is_white: false,
            endian16: false,
            planar: false,
        }
    }

    /// Floating point layout, `bytes` 4 or 8
    pub const fn new_float(space: ColorSpace, channels: u8, bytes: u8) -> Self {
        let mut f = Self::new(space, channels, bytes);
        f.float = true;
        f
    }

    /// Layout that accepts data of any color space
    pub const fn any(channels: u8, bytes: u8) -> Self {
        let mut f = Self::new(ColorSpace::Rgb, channels, bytes);
        f.space = None;
        f
    }

    pub const fn with_extra(mut self, extra: u8) -> Self {
        self.extra = extra;
        self
    }

    pub const fn with_reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub const fn with_swap_first(mut self) -> Self {
        self.swap_first = true;
        self
    }

    pub const fn with_min_is_white(mut self) -> Self {
        self.min_is_white = true;
        self
    }

    pub const fn with_endian16(mut self) -> Self {
        self.endian16 = true;
        self
    }

    pub const fn with_planar(mut self) -> Self {
        self.planar = true;
        self
    }

    pub const GRAY_8: Self = Self::new(ColorSpace::Gray, 1, 1);
    pub const GRAY_16: Self = Self::new(ColorSpace::Gray, 1, 2);
    pub const GRAY_FLT: Self = Self::new_float(ColorSpace::Gray, 1, 4);
    pub const RGB_8: Self = Self::new(ColorSpace::Rgb, 3, 1);
    pub const RGBA_8: Self = Self::RGB_8.with_extra(1);
    pub const BGR_8: Self = Self::RGB_8.with_reversed();
    pub const BGRA_8: Self = Self::RGBA_8.with_reversed().with_swap_first();
    pub const ARGB_8: Self = Self::RGBA_8.with_swap_first();
    pub const RGB_16: Self = Self::new(ColorSpace::Rgb, 3, 2);
    pub const RGBA_16: Self = Self::RGB_16.with_extra(1);
    pub const RGB_FLT: Self = Self::new_float(ColorSpace::Rgb, 3, 4);
    pub const RGBA_FLT: Self = Self::RGB_FLT.with_extra(1);
    pub const RGB_DBL: Self = Self::new_float(ColorSpace::Rgb, 3, 8);
    pub const CMYK_8: Self = Self::new(ColorSpace::Cmyk, 4, 1);
    pub const CMYK_16: Self = Self::new(ColorSpace::Cmyk, 4, 2);
    pub const CMYK_FLT: Self = Self::new_float(ColorSpace::Cmyk, 4, 4);
    pub const CMYK_DBL: Self = Self::new_float(ColorSpace::Cmyk, 4, 8);
    pub const LAB_8: Self = Self::new(ColorSpace::Lab, 3, 1);
    pub const LAB_16: Self = Self::new(ColorSpace::Lab, 3, 2);
    pub const LAB_FLT: Self = Self::new_float(ColorSpace::Lab, 3, 4);
    pub const LAB_DBL: Self = Self::new_float(ColorSpace::Lab, 3, 8);
    pub const XYZ_16: Self = Self::new(ColorSpace::Xyz, 3, 2);
    pub const XYZ_FLT: Self = Self::new_float(ColorSpace::Xyz, 3, 4);
    pub const XYZ_DBL: Self = Self::new_float(ColorSpace::Xyz, 3, 8);

    /// Color plus extra samples
    pub fn samples(&self) -> usize {
        self.channels as usize + self.extra as usize
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.samples() * self.bytes as usize
    }

    /// Whether a transform may later re-bind to other 16-bit layouts
    pub fn is_16bits_or_more(&self) -> bool {
        self.bytes >= 2
    }

    /// Whether data in `space` may be read or written with this format
    pub fn accepts(&self, space: ColorSpace) -> bool {
        match self.space {
            None => true,
            Some(s) if s == space => true,
            Some(ColorSpace::Cmyk) => space == ColorSpace::Color(4),
            Some(ColorSpace::Color(4)) => space == ColorSpace::Cmyk,
            Some(_) => false,
        }
    }
}

/// Float units a format uses outside the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloatUnits {
    /// L 0..100, a and b -128..127
    Lab,
    /// XYZ with Y = 1 for white
    Xyz,
    /// Percent
    Ink,
    Unit,
}

impl FloatUnits {
    fn of(space: Option<ColorSpace>) -> Self {
        match space {
            Some(ColorSpace::Lab) => Self::Lab,
            Some(ColorSpace::Xyz) => Self::Xyz,
            Some(s) if s.is_ink_space() => Self::Ink,
            _ => Self::Unit,
        }
    }

    fn encode(self, channel: usize, v: f64) -> f32 {
        let e = match self {
            Self::Lab if channel == 0 => v / 100.0,
            Self::Lab => (v + 128.0) / 255.0,
            Self::Xyz => v / MAX_ENCODEABLE_XYZ,
            Self::Ink => v / 100.0,
            Self::Unit => v,
        };
        e as f32
    }

    fn decode(self, channel: usize, v: f32) -> f64 {
        let v = v as f64;
        match self {
            Self::Lab if channel == 0 => v * 100.0,
            Self::Lab => v * 255.0 - 128.0,
            Self::Xyz => v * MAX_ENCODEABLE_XYZ,
            Self::Ink => v * 100.0,
            Self::Unit => v,
        }
    }
}

/// A bound format: sample positions resolved once
#[derive(Debug, Clone)]
pub(crate) struct Formatter {
    format: PixelFormat,
    units: FloatUnits,
    /// Sample index of each color channel within a pixel
    color: [usize; MAX_CHANNELS],
    /// Sample index of each extra channel
    extra: [usize; MAX_CHANNELS],
    /// Color channels are the leading samples in channel order
    plain: bool,
}

impl Formatter {
    pub(crate) fn bind(format: PixelFormat) -> Result<Self> {
        let n = format.channels as usize;
        let extra = format.extra as usize;
        if format.planar {
            return Err(Error::NotSuitable("planar layouts have no formatter".into()));
        }
        if n == 0 || n > MAX_CHANNELS || extra > MAX_CHANNELS - n {
            return Err(Error::ChannelCount {
                count: n + extra,
                max: MAX_CHANNELS,
            });
        }
        if !matches!((format.float, format.bytes), (false, 1 | 2) | (true, 4 | 8)) {
            return Err(Error::NotSuitable(format!(
                "no formatter for {}-byte {} samples",
                format.bytes,
                if format.float { "float" } else { "integer" }
            )));
        }

        let extra_first = format.reversed ^ format.swap_first;
        let rotate = extra == 0 && format.swap_first;
        let offset = if extra_first { extra } else { 0 };
        let slot_of = |j: usize| if format.reversed { n - 1 - j } else { j };

        let mut color = [0usize; MAX_CHANNELS];
        for (c, pos) in color[..n].iter_mut().enumerate() {
            let j = if rotate { (c + 1) % n } else { c };
            *pos = offset + slot_of(j);
        }
        let mut extra_pos = [0usize; MAX_CHANNELS];
        for (e, pos) in extra_pos[..extra].iter_mut().enumerate() {
            *pos = if extra_first { e } else { n + e };
        }
        let plain = color[..n].iter().enumerate().all(|(c, &p)| c == p);

        Ok(Self {
            format,
            units: FloatUnits::of(format.space),
            color,
            extra: extra_pos,
            plain,
        })
    }

    pub(crate) fn format(&self) -> PixelFormat {
        self.format
    }

    pub(crate) fn channels(&self) -> usize {
        self.format.channels as usize
    }

    /// Whole-line conversion can skip per-sample positioning
    fn is_plain(&self) -> bool {
        self.plain
            && self.format.extra == 0
            && !self.format.min_is_white
            && !self.format.endian16
            && !self.format.float
    }

    fn read_raw(&self, pixel: &[u8], sample: usize) -> RawSample {
        let b = self.format.bytes as usize;
        let at = &pixel[sample * b..(sample + 1) * b];
        match (self.format.float, b) {
            (false, 1) => RawSample::Word(at[0] as u16 * 257),
            (false, _) => {
                let v = u16::from_ne_bytes([at[0], at[1]]);
                RawSample::Word(if self.format.endian16 { v.swap_bytes() } else { v })
            }
            (true, 4) => RawSample::Float(f32::from_ne_bytes([at[0], at[1], at[2], at[3]]) as f64),
            (true, _) => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(at);
                RawSample::Float(f64::from_ne_bytes(raw))
            }
        }
    }

    fn write_word(&self, pixel: &mut [u8], sample: usize, v: u16) {
        let b = self.format.bytes as usize;
        let at = &mut pixel[sample * b..(sample + 1) * b];
        if b == 1 {
            at[0] = ((v as u32 * 65281 + 8_388_608) >> 24) as u8;
        } else {
            let v = if self.format.endian16 { v.swap_bytes() } else { v };
            at.copy_from_slice(&v.to_ne_bytes());
        }
    }

    fn write_float(&self, pixel: &mut [u8], sample: usize, v: f64) {
        let b = self.format.bytes as usize;
        let at = &mut pixel[sample * b..(sample + 1) * b];
        if b == 4 {
            at.copy_from_slice(&(v as f32).to_ne_bytes());
        } else {
            at.copy_from_slice(&v.to_ne_bytes());
        }
    }

    /// Color channel `c` of `pixel` in the pipeline's float encoding
    fn read_encoded(&self, pixel: &[u8], c: usize) -> f32 {
        let v = match self.read_raw(pixel, self.color[c]) {
            RawSample::Word(w) => u16_to_f32(w),
            RawSample::Float(f) => self.units.encode(c, f),
        };
        if self.format.min_is_white { 1.0 - v } else { v }
    }

    /// Read `pixels` pixels into 16-bit words, `channels()` per pixel
    pub(crate) fn unpack_words(&self, src: &[u8], pixels: usize, dst: &mut [u16]) {
        let n = self.channels();
        let bpp = self.format.bytes_per_pixel();
        if self.is_plain() && self.format.bytes == 1 {
            simd::widen_u8_to_u16(&src[..pixels * n], &mut dst[..pixels * n]);
            return;
        }
        for (pixel, words) in src.chunks_exact(bpp).zip(dst.chunks_exact_mut(n)).take(pixels) {
            for (c, w) in words.iter_mut().enumerate() {
                *w = match self.read_raw(pixel, self.color[c]) {
                    RawSample::Word(v) if self.format.min_is_white => 0xffff - v,
                    RawSample::Word(v) => v,
                    RawSample::Float(_) => f32_to_u16(self.read_encoded(pixel, c)),
                };
            }
        }
    }

    /// Write `pixels` pixels from 16-bit words; extra samples are untouched
    pub(crate) fn pack_words(&self, src: &[u16], pixels: usize, dst: &mut [u8]) {
        let n = self.channels();
        let bpp = self.format.bytes_per_pixel();
        if self.is_plain() && self.format.bytes == 1 {
            simd::narrow_u16_to_u8(&src[..pixels * n], &mut dst[..pixels * n]);
            return;
        }
        for (pixel, words) in dst.chunks_exact_mut(bpp).zip(src.chunks_exact(n)).take(pixels) {
            for (c, &w) in words.iter().enumerate() {
                if self.format.float {
                    self.write_encoded(pixel, c, u16_to_f32(w));
                } else {
                    let w = if self.format.min_is_white { 0xffff - w } else { w };
                    self.write_word(pixel, self.color[c], w);
                }
            }
        }
    }

    /// Read `pixels` pixels into the pipeline's float encoding
    pub(crate) fn unpack_floats(&self, src: &[u8], pixels: usize, dst: &mut [f32]) {
        let n = self.channels();
        let bpp = self.format.bytes_per_pixel();
        if self.is_plain() && self.format.bytes == 2 {
            let mut words = vec![0u16; pixels * n];
            self.unpack_words(src, pixels, &mut words);
            simd::u16_to_unit_f32(&words, &mut dst[..pixels * n]);
            return;
        }
        for (pixel, values) in src.chunks_exact(bpp).zip(dst.chunks_exact_mut(n)).take(pixels) {
            for (c, v) in values.iter_mut().enumerate() {
                *v = self.read_encoded(pixel, c);
            }
        }
    }

    fn write_encoded(&self, pixel: &mut [u8], c: usize, v: f32) {
        let v = if self.format.min_is_white { 1.0 - v } else { v };
        if self.format.float {
            self.write_float(pixel, self.color[c], self.units.decode(c, v));
        } else {
            self.write_word(pixel, self.color[c], f32_to_u16(v));
        }
    }

    /// Write `pixels` pixels from the pipeline's float encoding
    pub(crate) fn pack_floats(&self, src: &[f32], pixels: usize, dst: &mut [u8]) {
        let n = self.channels();
        let bpp = self.format.bytes_per_pixel();
        if self.is_plain() && self.format.bytes == 2 {
            let mut words = vec![0u16; pixels * n];
            simd::unit_f32_to_u16(&src[..pixels * n], &mut words);
            self.pack_words(&words, pixels, dst);
            return;
        }
        for (pixel, values) in dst.chunks_exact_mut(bpp).zip(src.chunks_exact(n)).take(pixels) {
            for (c, &v) in values.iter().enumerate() {
                self.write_encoded(pixel, c, v);
            }
        }
    }

    /// Copy extra channels from `src` laid out by `from` into `dst`,
    /// converting the sample type when the layouts differ
    pub(crate) fn copy_extra(from: &Self, to: &Self, src: &[u8], dst: &mut [u8], pixels: usize) {
        let count = from.format.extra.min(to.format.extra) as usize;
        if count == 0 {
            return;
        }
        let (in_bpp, out_bpp) = (from.format.bytes_per_pixel(), to.format.bytes_per_pixel());
        for (pin, pout) in src
            .chunks_exact(in_bpp)
            .zip(dst.chunks_exact_mut(out_bpp))
            .take(pixels)
        {
            for e in 0..count {
                let unit = match from.read_raw(pin, from.extra[e]) {
                    RawSample::Word(w) => w as f64 / 65535.0,
                    RawSample::Float(f) => f,
                };
                if to.format.float {
                    to.write_float(pout, to.extra[e], unit);
                } else {
                    to.write_word(pout, to.extra[e], quick_saturate_word(unit * 65535.0));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RawSample {
    Word(u16),
    Float(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_rejected() {
        let f = PixelFormat::RGB_8.with_planar();
        assert!(matches!(Formatter::bind(f), Err(Error::NotSuitable(_))));
    }

    #[test]
    fn test_bad_byte_width_rejected() {
        let f = PixelFormat::new(ColorSpace::Rgb, 3, 4);
        assert!(matches!(Formatter::bind(f), Err(Error::NotSuitable(_))));
    }

    #[test]
    fn test_bgra_positions() {
        let fmt = Formatter::bind(PixelFormat::BGRA_8).unwrap();
        let mut words = [0u16; 3];
        fmt.unpack_words(&[10, 20, 30, 255], 1, &mut words);
        assert_eq!(words, [30 * 257, 20 * 257, 10 * 257]);
    }

    #[test]
    fn test_argb_positions() {
        let fmt = Formatter::bind(PixelFormat::ARGB_8).unwrap();
        let mut words = [0u16; 3];
        fmt.unpack_words(&[255, 10, 20, 30], 1, &mut words);
        assert_eq!(words, [10 * 257, 20 * 257, 30 * 257]);
    }

    #[test]
    fn test_swap_first_without_extra_rotates() {
        let fmt = Formatter::bind(PixelFormat::RGB_8.with_swap_first()).unwrap();
        let mut words = [0u16; 3];
        fmt.unpack_words(&[1, 2, 3], 1, &mut words);
        assert_eq!(words, [2 * 257, 3 * 257, 257]);

        let mut bytes = [0u8; 3];
        fmt.pack_words(&words, 1, &mut bytes);
        assert_eq!(bytes, [1, 2, 3]);
    }

    #[test]
    fn test_lab_float_units() {
        let fmt = Formatter::bind(PixelFormat::LAB_DBL).unwrap();
        let src: Vec<u8> = [50.0f64, -128.0, 127.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let mut enc = [0f32; 3];
        fmt.unpack_floats(&src, 1, &mut enc);
        assert!((enc[0] - 0.5).abs() < 1e-6);
        assert!(enc[1].abs() < 1e-6);
        assert!((enc[2] - 1.0).abs() < 1e-6);

        let mut out = vec![0u8; 24];
        fmt.pack_floats(&enc, 1, &mut out);
        assert_eq!(out, src);
    }

    #[test]
    fn test_ink_percent() {
        let fmt = Formatter::bind(PixelFormat::CMYK_FLT).unwrap();
        let src: Vec<u8> = [100.0f32, 50.0, 0.0, 25.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let mut words = [0u16; 4];
        fmt.unpack_words(&src, 1, &mut words);
        assert_eq!(words, [0xffff, 32768, 0, 16384]);
    }

    #[test]
    fn test_min_is_white_and_endian() {
        let fmt = Formatter::bind(PixelFormat::GRAY_16.with_min_is_white().with_endian16()).unwrap();
        let src = 0x1234u16.swap_bytes().to_ne_bytes();
        let mut words = [0u16; 1];
        fmt.unpack_words(&src, 1, &mut words);
        assert_eq!(words[0], 0xffff - 0x1234);
    }

    #[test]
    fn test_copy_extra_converts_depth() {
        let from = Formatter::bind(PixelFormat::RGBA_8).unwrap();
        let to = Formatter::bind(PixelFormat::RGBA_16).unwrap();
        let mut dst = [0u8; 8];
        Formatter::copy_extra(&from, &to, &[0, 0, 0, 255], &mut dst, 1);
        assert_eq!(u16::from_ne_bytes([dst[6], dst[7]]), 0xffff);
    }

    #[test]
    fn test_format_accepts() {
        assert!(PixelFormat::CMYK_8.accepts(ColorSpace::Color(4)));
        assert!(!PixelFormat::LAB_16.accepts(ColorSpace::Xyz));
        assert!(PixelFormat::any(3, 2).accepts(ColorSpace::Lab));
    }
}
