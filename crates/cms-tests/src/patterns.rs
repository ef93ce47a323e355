//! Test pattern generation
//!
//! RGB and CMYK buffers for scenario tests. Random patterns are seeded so
//! every run sees the same pixels.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// RGB test pattern types
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// Horizontal gradient black to white
    GradientH,
    /// RGB color cube corners (8 colors)
    ColorCube,
    /// Grayscale ramp 0-255
    Grayscale,
    /// Random pixels with seed
    Random(u64),
    /// Saturated colors near gamut boundary
    GamutBoundary,
    /// Runs of identical pixels, the case the single-pixel cache serves
    Runs(u64),
    /// All zeros (black)
    Black,
    /// All 255 (white)
    White,
}

/// Generate test pattern as RGB8 buffer
pub fn generate_pattern(pattern: TestPattern, width: usize, height: usize) -> Vec<u8> {
    let pixel_count = width * height;
    let mut data = vec![0u8; pixel_count * 3];

    match pattern {
        TestPattern::GradientH => {
            for (i, chunk) in data.chunks_exact_mut(3).enumerate() {
                let x = i % width;
                chunk.fill(((x as f32 / width as f32) * 255.0) as u8);
            }
        }
        TestPattern::ColorCube => {
            for (i, chunk) in data.chunks_exact_mut(3).enumerate() {
                let corner = i % 8;
                for (c, v) in chunk.iter_mut().enumerate() {
                    *v = if (corner >> c) & 1 == 1 { 255 } else { 0 };
                }
            }
        }
        TestPattern::Grayscale => {
            for (i, chunk) in data.chunks_exact_mut(3).enumerate() {
                chunk.fill(((i as f32 / pixel_count as f32) * 255.0) as u8);
            }
        }
        TestPattern::Random(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.fill_bytes(&mut data);
        }
        TestPattern::GamutBoundary => {
            let colors: [[u8; 3]; 8] = [
                [255, 0, 0],
                [0, 255, 0],
                [0, 0, 255],
                [255, 255, 0],
                [255, 0, 255],
                [0, 255, 255],
                [255, 128, 0],
                [128, 0, 255],
            ];
            for (i, chunk) in data.chunks_exact_mut(3).enumerate() {
                chunk.copy_from_slice(&colors[i % 8]);
            }
        }
        TestPattern::Runs(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut pixel = [0u8; 3];
            for (i, chunk) in data.chunks_exact_mut(3).enumerate() {
                if i % 5 == 0 {
                    rng.fill_bytes(&mut pixel);
                }
                chunk.copy_from_slice(&pixel);
            }
        }
        TestPattern::Black => {
            // Already zeros
        }
        TestPattern::White => {
            data.fill(255);
        }
    }

    data
}

/// `count` CMYK pixels in 0..1 with a seeded mix of K-only and full-color
/// samples
pub fn cmyk_samples(seed: u64, count: usize) -> Vec<[f64; 4]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let k: f64 = rng.r#gen();
            if rng.gen_bool(0.25) {
                [0.0, 0.0, 0.0, k]
            } else {
                [rng.r#gen(), rng.r#gen(), rng.r#gen(), k]
            }
        })
        .collect()
}

/// K ramp from 0 to 1 in `steps` samples, CMY at zero
pub fn k_ramp(steps: usize) -> Vec<[f64; 4]> {
    let last = steps.saturating_sub(1).max(1) as f64;
    (0..steps)
        .map(|i| [0.0, 0.0, 0.0, i as f64 / last])
        .collect()
}

/// Seeded 16-bit samples
pub fn random_u16(seed: u64, count: usize) -> Vec<u16> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count).map(|_| rng.r#gen()).collect()
}

/// Standard test sizes
pub mod sizes {
    pub const TINY: (usize, usize) = (8, 8);
    pub const SMALL: (usize, usize) = (64, 64);
    pub const MEDIUM: (usize, usize) = (256, 256);
}
