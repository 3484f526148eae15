use crate::consts::PI;
use crate::reflection::{abs_cos_theta, cos2_phi, cos2_theta, same_hemisphere, sin2_phi, tan2_theta, tan_theta};
use crate::{spherical_direction, Float, Point2f, Vec3f};

/// Maps a perceptual roughness in `[0, 1]` to the distribution's alpha parameter.
pub fn roughness_to_alpha(roughness: Float) -> Float {
    let rough = roughness.max(1.0e-3);
    let x = rough.ln();
    1.62142 + 0.819955 * x + 0.1734 * x * x + 0.0171201 * x * x * x + 0.000640711 * x * x * x * x
}

/// Also known as GGX.
///
/// Directions here point away from the surface on both sides.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrowbridgeReitzDistribution {
    alpha_x: Float,
    alpha_y: Float,
}

impl TrowbridgeReitzDistribution {
    pub fn new(alpha_x: Float, alpha_y: Float) -> Self {
        TrowbridgeReitzDistribution { alpha_x, alpha_y }
    }

    pub fn isotropic(roughness: Float) -> Self {
        let alpha = roughness_to_alpha(roughness);
        Self::new(alpha, alpha)
    }

    /// Differential area of microfacets oriented with normal `wh`.
    pub fn d(&self, wh: Vec3f) -> Float {
        let tan2_theta = tan2_theta(wh);
        if tan2_theta.is_infinite() {
            return 0.0;
        }

        let cos4_theta = cos2_theta(wh) * cos2_theta(wh);
        let e = (cos2_phi(wh) / sq!(self.alpha_x) + sin2_phi(wh) / sq!(self.alpha_y)) * tan2_theta;
        1.0 / (PI * self.alpha_x * self.alpha_y * cos4_theta * (1.0 + e) * (1.0 + e))
    }

    /// Invisible masked microfacet area per visible microfacet area.
    pub fn lambda(&self, w: Vec3f) -> Float {
        let abs_tan_theta = tan_theta(w).abs();
        if abs_tan_theta.is_infinite() {
            return 0.0;
        }

        let alpha = Float::sqrt(cos2_phi(w) * sq!(self.alpha_x) + sin2_phi(w) * sq!(self.alpha_y));
        let alpha2_tan2_theta = sq!(alpha * abs_tan_theta);
        (-1.0 + Float::sqrt(1.0 + alpha2_tan2_theta)) / 2.0
    }

    pub fn g1(&self, w: Vec3f) -> Float {
        1.0 / (1.0 + self.lambda(w))
    }

    /// Fraction of microfacets visible from both `wo` and `wi`.
    pub fn g(&self, wo: Vec3f, wi: Vec3f) -> Float {
        1.0 / (1.0 + self.lambda(wo) + self.lambda(wi))
    }

    /// Samples a half vector from the full distribution of normals, flipped into the hemisphere
    /// of `wo`.
    pub fn sample_wh(&self, wo: Vec3f, u: Point2f) -> Vec3f {
        let (cos_theta, phi) = if self.alpha_x == self.alpha_y {
            let tan_theta2 = sq!(self.alpha_x) * u[0] / (1.0 - u[0]);
            (1.0 / Float::sqrt(1.0 + tan_theta2), 2.0 * PI * u[1])
        } else {
            let mut phi = Float::atan(self.alpha_y / self.alpha_x * Float::tan(2.0 * PI * u[1] + 0.5 * PI));
            if u[1] > 0.5 {
                phi += PI;
            }
            let alpha2 = 1.0 / (sq!(phi.cos()) / sq!(self.alpha_x) + sq!(phi.sin()) / sq!(self.alpha_y));
            let tan_theta2 = alpha2 * u[0] / (1.0 - u[0]);
            (1.0 / Float::sqrt(1.0 + tan_theta2), phi)
        };
        let sin_theta = Float::sqrt(Float::max(0.0, 1.0 - sq!(cos_theta)));
        let wh = spherical_direction(sin_theta, cos_theta, phi);
        if same_hemisphere(wo, wh) {
            wh
        } else {
            -wh
        }
    }

    pub fn pdf(&self, wh: Vec3f) -> Float {
        self.d(wh) * abs_cos_theta(wh)
    }
}
