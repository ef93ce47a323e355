//! Accuracy measurement over Lab buffers
//!
//! Differences are CIE76 deltaE, the metric the linker itself uses.

use oxlink_core::Lab;
use oxlink_core::color::delta_e;

/// Statistics from a deltaE comparison
#[derive(Debug, Clone)]
pub struct DeltaEStats {
    /// Mean deltaE across all samples
    pub mean: f64,
    /// Maximum deltaE
    pub max: f64,
    /// 95th percentile deltaE
    pub p95: f64,
    /// Number of samples
    pub count: usize,
}

impl DeltaEStats {
    /// Check if all differences are imperceptible (deltaE < 1.0)
    pub fn is_excellent(&self) -> bool {
        self.max < 1.0
    }

    /// Check if differences are acceptable (deltaE < 3.5)
    pub fn is_acceptable(&self) -> bool {
        self.max < 3.5
    }
}

/// Compare two buffers of `[L, a, b]` triples
pub fn compare_lab_buffers(reference: &[f64], result: &[f64]) -> DeltaEStats {
    assert_eq!(reference.len(), result.len());
    assert_eq!(reference.len() % 3, 0);

    let mut delta_es: Vec<f64> = reference
        .chunks_exact(3)
        .zip(result.chunks_exact(3))
        .map(|(a, b)| {
            delta_e(
                &Lab::new(a[0], a[1], a[2]),
                &Lab::new(b[0], b[1], b[2]),
            )
        })
        .collect();
    delta_es.sort_by(f64::total_cmp);

    let count = delta_es.len();
    let mean = if count == 0 {
        0.0
    } else {
        delta_es.iter().sum::<f64>() / count as f64
    };
    let max = delta_es.last().copied().unwrap_or(0.0);
    let p95 = delta_es
        .get((count as f64 * 0.95) as usize)
        .copied()
        .unwrap_or(max);

    DeltaEStats {
        mean,
        max,
        p95,
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_buffers() {
        let lab = [50.0, 10.0, -20.0, 90.0, 0.0, 0.0];
        let stats = compare_lab_buffers(&lab, &lab);
        assert_eq!(stats.count, 2);
        assert!(stats.max < 1e-12);
        assert!(stats.is_excellent());
    }

    #[test]
    fn test_single_difference() {
        let a = [50.0, 0.0, 0.0, 50.0, 0.0, 0.0];
        let b = [50.0, 0.0, 0.0, 53.0, 4.0, 0.0];
        let stats = compare_lab_buffers(&a, &b);
        assert!((stats.max - 5.0).abs() < 1e-9);
        assert!((stats.mean - 2.5).abs() < 1e-9);
        assert!(!stats.is_excellent());
    }
}
