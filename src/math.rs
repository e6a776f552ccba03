use nalgebra as na;
use num_traits::Float;

/// Length of the chord between two range readings `a` and `b` separated by `angle`
/// (law of cosines).
///
/// Treats the object as the straight segment between its two edge readings, which
/// underestimates the extent of wide, curved objects.
pub fn chord_width<F: Float>(a: F, b: F, angle: F) -> F {
    let two = F::one() + F::one();
    let sq = a * a + b * b - two * a * b * angle.cos();

    sq.max(F::zero()).sqrt()
}

#[inline]
pub fn index_to_angle(index: usize, angle_min: f64, angle_increment: f64) -> f64 {
    angle_min + index as f64 * angle_increment
}

/// Sensor convention: x forward, y left, z up.
#[inline]
pub fn polar_to_point(range: f64, angle: f64) -> na::Point3<f64> {
    na::Point3::new(range * angle.cos(), range * angle.sin(), 0.0)
}

/// Splits `v` into its norm and direction; a zero vector has no direction.
pub fn norm_and_direction(v: &na::Vector3<f64>) -> (f64, na::Vector3<f64>) {
    let norm = v.norm();

    if norm > 0.0 {
        (norm, v / norm)
    } else {
        (0.0, na::Vector3::zeros())
    }
}
