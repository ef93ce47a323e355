//! Batch sample conversions and per-pixel loops
//!
//! The formatters hand whole lines to these kernels when a layout is plain
//! interleaved data, and the executor drives its per-pixel evaluation
//! through the `map_pixels_*` loops.

use multiversion::multiversion;

/// 8-bit samples to 16-bit, `v * 257`
#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
pub fn widen_u8_to_u16(src: &[u8], dst: &mut [u16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s as u16) << 8 | s as u16;
    }
}

/// 16-bit samples to 8-bit with rounding
#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
pub fn narrow_u16_to_u8(src: &[u16], dst: &mut [u8]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = ((s as u32 * 65281 + 8_388_608) >> 24) as u8;
    }
}

/// Normalized floats to 16-bit, saturating
#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
pub fn unit_f32_to_u16(src: &[f32], dst: &mut [u16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16;
    }
}

/// 16-bit to normalized floats
#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
pub fn u16_to_unit_f32(src: &[u16], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as f32 / 65535.0;
    }
}

/// Apply `f` to every pixel of an interleaved 16-bit buffer
#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
pub fn map_pixels_u16<F>(src: &[u16], n_in: usize, dst: &mut [u16], n_out: usize, mut f: F)
where
    F: FnMut(&[u16], &mut [u16]),
{
    for (s, d) in src.chunks_exact(n_in).zip(dst.chunks_exact_mut(n_out)) {
        f(s, d);
    }
}

/// Apply `f` to every pixel of an interleaved float buffer
#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
pub fn map_pixels_f32<F>(src: &[f32], n_in: usize, dst: &mut [f32], n_out: usize, mut f: F)
where
    F: FnMut(&[f32], &mut [f32]),
{
    for (s, d) in src.chunks_exact(n_in).zip(dst.chunks_exact_mut(n_out)) {
        f(s, d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_narrow_roundtrip() {
        let src: Vec<u8> = (0..=255).collect();
        let mut wide = vec![0u16; 256];
        let mut back = vec![0u8; 256];
        widen_u8_to_u16(&src, &mut wide);
        assert_eq!(wide[255], 0xffff);
        assert_eq!(wide[128], 0x8080);
        narrow_u16_to_u8(&wide, &mut back);
        assert_eq!(src, back);
    }

    #[test]
    fn test_float_saturates() {
        let mut out = [0u16; 4];
        unit_f32_to_u16(&[-0.5, 0.0, 0.5, 1.5], &mut out);
        assert_eq!(out, [0, 0, 32768, 0xffff]);
    }

    #[test]
    fn test_map_pixels_channel_counts() {
        let src = [1u16, 2, 3, 4, 5, 6];
        let mut dst = [0u16; 2];
        map_pixels_u16(&src, 3, &mut dst, 1, |s, d| d[0] = s.iter().sum());
        assert_eq!(dst, [6, 15]);
    }
}
