use crate::consts::{FRAC_PI_2, FRAC_PI_4, INV_4_PI, PI};
use crate::{Float, Point2f, Vec3f};

pub fn concentric_sample_disk(u: Point2f) -> Point2f {
    // map sample from [0, 1] to [-1, 1]
    let ux = 2.0 * u.x - 1.0;
    let uy = 2.0 * u.y - 1.0;
    if ux == 0.0 && uy == 0.0 {
        return Point2f::new(0.0, 0.0);
    }

    let (r, theta) = if ux.abs() > uy.abs() {
        (ux, FRAC_PI_4 * (uy / ux))
    } else {
        (uy, FRAC_PI_2 - FRAC_PI_4 * (ux / uy))
    };

    Point2f::new(r * theta.cos(), r * theta.sin())
}

/// Cosine-weighted direction in the +z hemisphere.
pub fn cosine_sample_hemisphere(u: Point2f) -> Vec3f {
    let d = concentric_sample_disk(u);
    let z = Float::sqrt(Float::max(0.0, 1.0 - d.x * d.x - d.y * d.y));
    Vec3f::new(d.x, d.y, z)
}

pub fn uniform_sample_sphere(u: Point2f) -> Vec3f {
    let z = 1.0 - 2.0 * u.x;
    let r = Float::sqrt(Float::max(0.0, 1.0 - z * z));
    let phi = 2.0 * PI * u.y;
    Vec3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> Float {
    INV_4_PI
}

/// Power heuristic with beta = 2 for one sample from each of two strategies.
pub fn power_heuristic(pdf_a: Float, pdf_b: Float) -> Float {
    let a2 = pdf_a * pdf_a;
    let b2 = pdf_b * pdf_b;
    if a2 + b2 == 0.0 {
        return 0.0;
    }
    a2 / (a2 + b2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cgmath::InnerSpace;

    #[test]
    fn test_cosine_hemisphere_unit_and_upper() {
        for &(x, y) in &[(0.1, 0.9), (0.5, 0.5), (0.99, 0.01), (0.3, 0.7)] {
            let w = cosine_sample_hemisphere(Point2f::new(x, y));
            assert_abs_diff_eq!(w.magnitude(), 1.0, epsilon = 1e-5);
            assert!(w.z >= 0.0);
        }
    }

    #[test]
    fn test_power_heuristic() {
        assert_abs_diff_eq!(power_heuristic(1.0, 1.0), 0.5);
        assert_abs_diff_eq!(power_heuristic(2.0, 1.0), 0.8);
        assert_abs_diff_eq!(power_heuristic(2.0, 1.0) + power_heuristic(1.0, 2.0), 1.0);
        assert_eq!(power_heuristic(0.0, 0.0), 0.0);
    }
}
