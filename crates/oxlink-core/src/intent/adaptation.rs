//! Absolute colorimetric adaptation between media white points

use tracing::trace;

use crate::color::{D50, Xyz, temperature_from_white_point, white_point_from_temperature};
use crate::error::{Error, Result};
use crate::math::{Matrix3x3, adaptation_matrix};

const SAME_TEMPERATURE: f64 = 0.01;

/// White ratios closer to 1 than one 16-bit step count as the same white
const SAME_WHITE: f64 = 1.0 / 65535.0;

/// Correlated color temperature of the white a 'chad' matrix adapts from
fn chad_to_temperature(chad: &Matrix3x3) -> Result<f64> {
    let inverse = chad.try_inverse()?;
    let white = Xyz::from_array(inverse.multiply_vec(D50.to_array()));
    temperature_from_white_point(&white.to_xyy()).ok_or_else(|| {
        Error::Range(format!(
            "no correlated color temperature for white {:.4} {:.4} {:.4}",
            white.x, white.y, white.z
        ))
    })
}

/// Adaptation from a daylight white at `kelvin` to D50
fn temperature_to_chad(kelvin: f64) -> Result<Matrix3x3> {
    let white = white_point_from_temperature(kelvin)
        .ok_or_else(|| Error::Range(format!("temperature {kelvin} K outside the daylight locus")))?;
    adaptation_matrix(&white.to_xyz(), &D50)
}

/// Matrix taking PCS values relative to the input media white to values
/// relative to the output media white
///
/// `state` 1.0 scales by the ratio of white points. 0.0 undoes both 'chad'
/// adaptations. Values in between blend the two sides' correlated color
/// temperatures.
pub fn compute_absolute_intent(
    state: f64,
    white_in: &Xyz,
    chad_in: &Matrix3x3,
    white_out: &Xyz,
    chad_out: &Matrix3x3,
) -> Result<Matrix3x3> {
    let scale = Matrix3x3::diagonal(
        white_in.x / white_out.x,
        white_in.y / white_out.y,
        white_in.z / white_out.z,
    );
    if state == 1.0 {
        return Ok(scale);
    }

    let chad_in_inv = chad_in.try_inverse()?;
    if state == 0.0 {
        let m2 = chad_out.multiply(&scale);
        return Ok(m2.multiply(&chad_in_inv));
    }

    let m3 = chad_in_inv.multiply(&scale);
    let temp_src = chad_to_temperature(chad_in)?;
    let temp_dst = chad_to_temperature(chad_out)?;
    if scale.is_identity(SAME_WHITE) && (temp_src - temp_dst).abs() < SAME_TEMPERATURE {
        return Ok(Matrix3x3::identity());
    }
    let temp = (1.0 - state) * temp_dst + state * temp_src;
    trace!(temp_src, temp_dst, temp, "partial adaptation");
    Ok(m3.multiply(&temperature_to_chad(temp)?))
}
