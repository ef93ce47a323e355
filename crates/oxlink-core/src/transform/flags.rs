//! Transform and linking options

/// Options for linking and transform creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransformFlags {
    /// Black point compensation on every link
    pub black_point_compensation: bool,
    /// Mark out-of-gamut pixels with the context alarm codes
    pub gamut_check: bool,
    /// Run the proofing chain instead of the plain input/output pair
    pub soft_proofing: bool,
    /// Disable the single-pixel cache
    pub no_cache: bool,
    /// Evaluate the linked pipeline as is instead of precalculating a CLUT
    pub no_optimize: bool,
    /// Copy input to output without any color conversion
    pub null_transform: bool,
    /// Prefer larger precalculation grids
    pub high_res_precalc: bool,
    /// Prefer smaller precalculation grids
    pub low_res_precalc: bool,
    /// Explicit precalculation grid size, overriding the heuristics
    pub grid_points: Option<u32>,
    /// Clamp negative values after the last stage for Gray, RGB and CMYK output
    pub clip_negatives: bool,
    /// Copy extra (alpha) channels from input to output
    pub copy_alpha: bool,
}

impl TransformFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bpc(mut self) -> Self {
        self.black_point_compensation = true;
        self
    }

    pub fn with_gamut_check(mut self) -> Self {
        self.gamut_check = true;
        self
    }

    pub fn with_soft_proofing(mut self) -> Self {
        self.soft_proofing = true;
        self
    }

    pub fn with_no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn with_no_optimize(mut self) -> Self {
        self.no_optimize = true;
        self
    }

    pub fn with_null_transform(mut self) -> Self {
        self.null_transform = true;
        self
    }

    pub fn with_high_res_precalc(mut self) -> Self {
        self.high_res_precalc = true;
        self.low_res_precalc = false;
        self
    }

    pub fn with_low_res_precalc(mut self) -> Self {
        self.low_res_precalc = true;
        self.high_res_precalc = false;
        self
    }

    /// Fixed grid size; values below 2 are ignored
    pub fn with_grid_points(mut self, points: u32) -> Self {
        self.grid_points = (points >= 2).then_some(points);
        self
    }

    pub fn with_clip_negatives(mut self) -> Self {
        self.clip_negatives = true;
        self
    }

    pub fn with_copy_alpha(mut self) -> Self {
        self.copy_alpha = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_flags_exclusive() {
        let f = TransformFlags::new().with_high_res_precalc().with_low_res_precalc();
        assert!(f.low_res_precalc);
        assert!(!f.high_res_precalc);
    }

    #[test]
    fn test_grid_points_rejects_degenerate() {
        assert_eq!(TransformFlags::new().with_grid_points(1).grid_points, None);
        assert_eq!(TransformFlags::new().with_grid_points(9).grid_points, Some(9));
    }
}
