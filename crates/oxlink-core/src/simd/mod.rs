//! CPU-dispatched kernels
//!
//! Functions here are compiled with `multiversion` for AVX2, SSE4.1 and NEON
//! and pick the best variant at runtime. The scalar fallback is always
//! available.

mod batch;

pub use batch::{
    map_pixels_f32, map_pixels_u16, narrow_u16_to_u8, u16_to_unit_f32, unit_f32_to_u16,
    widen_u8_to_u16,
};

/// Name of the instruction set the kernels dispatch to
pub fn active_features() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            "AVX2"
        } else if is_x86_feature_detected!("sse4.1") {
            "SSE4.1"
        } else {
            "scalar"
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        "NEON"
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        "scalar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_features() {
        assert!(!active_features().is_empty());
    }
}
