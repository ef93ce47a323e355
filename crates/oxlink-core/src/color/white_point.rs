//! Standard illuminants and correlated color temperature

use crate::color::{XyY, Xyz};

/// ICC PCS illuminant (D50, as encoded in profile headers)
pub const D50: Xyz = Xyz::new(0.9642, 1.0, 0.8249);

/// CIE D65 (noon daylight)
pub const D65: Xyz = Xyz::new(0.95045, 1.0, 1.08905);

/// Robertson isotemperature lines: (mirek, u, v, slope)
const ISOTEMPERATURE: [(f64, f64, f64, f64); 31] = [
    (0.0, 0.18006, 0.26352, -0.24341),
    (10.0, 0.18066, 0.26589, -0.25479),
    (20.0, 0.18133, 0.26846, -0.26876),
    (30.0, 0.18208, 0.27119, -0.28539),
    (40.0, 0.18293, 0.27407, -0.30470),
    (50.0, 0.18388, 0.27709, -0.32675),
    (60.0, 0.18494, 0.28021, -0.35156),
    (70.0, 0.18611, 0.28342, -0.37915),
    (80.0, 0.18740, 0.28668, -0.40955),
    (90.0, 0.18880, 0.28997, -0.44278),
    (100.0, 0.19032, 0.29326, -0.47888),
    (125.0, 0.19462, 0.30141, -0.58204),
    (150.0, 0.19962, 0.30921, -0.70471),
    (175.0, 0.20525, 0.31647, -0.84901),
    (200.0, 0.21142, 0.32312, -1.0182),
    (225.0, 0.21807, 0.32909, -1.2168),
    (250.0, 0.22511, 0.33439, -1.4512),
    (275.0, 0.23247, 0.33904, -1.7298),
    (300.0, 0.24010, 0.34308, -2.0637),
    (325.0, 0.24702, 0.34655, -2.4681),
    (350.0, 0.25591, 0.34951, -2.9641),
    (375.0, 0.26400, 0.35200, -3.5814),
    (400.0, 0.27218, 0.35407, -4.3633),
    (425.0, 0.28039, 0.35577, -5.3762),
    (450.0, 0.28863, 0.35714, -6.7262),
    (475.0, 0.29685, 0.35823, -8.5955),
    (500.0, 0.30505, 0.35907, -11.324),
    (525.0, 0.31320, 0.35968, -15.628),
    (550.0, 0.32129, 0.36011, -23.325),
    (575.0, 0.32931, 0.36038, -40.770),
    (600.0, 0.33724, 0.36051, -116.45),
];

/// Correlated color temperature in kelvin (Robertson's method)
///
/// Returns `None` when the chromaticity lies outside the table.
pub fn temperature_from_white_point(white: &XyY) -> Option<f64> {
    let denom = -white.x + 6.0 * white.y + 1.5;
    let us = 2.0 * white.x / denom;
    let vs = 3.0 * white.y / denom;

    let mut prev_distance = 0.0;
    let mut prev_mirek = 0.0;
    for (j, &(mirek, u, v, slope)) in ISOTEMPERATURE.iter().enumerate() {
        let distance = ((vs - v) - slope * (us - u)) / (1.0 + slope * slope).sqrt();
        if j != 0 && prev_distance / distance < 0.0 {
            let interpolated =
                prev_mirek + (prev_distance / (prev_distance - distance)) * (mirek - prev_mirek);
            return Some(1_000_000.0 / interpolated);
        }
        prev_distance = distance;
        prev_mirek = mirek;
    }
    None
}

/// CIE daylight chromaticity for a temperature in 4000..=25000 K
pub fn white_point_from_temperature(kelvin: f64) -> Option<XyY> {
    let t = kelvin;
    let t2 = t * t;
    let t3 = t2 * t;

    let x = if (4000.0..=7000.0).contains(&t) {
        -4.6070 * (1e9 / t3) + 2.9678 * (1e6 / t2) + 0.09911 * (1e3 / t) + 0.244063
    } else if t > 7000.0 && t <= 25000.0 {
        -2.0064 * (1e9 / t3) + 1.9018 * (1e6 / t2) + 0.24748 * (1e3 / t) + 0.237040
    } else {
        return None;
    };
    let y = -3.000 * x * x + 2.870 * x - 0.275;

    Some(XyY::new(x, y, 1.0))
}
