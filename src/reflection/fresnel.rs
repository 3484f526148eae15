use crate::Float;

/// Unpolarized Fresnel reflectance at a boundary between two dielectrics.
///
/// `cos_theta_i` is measured against the normal on the `eta_i` side; a negative cosine means the
/// ray arrives from the `eta_t` side and the indices are swapped.
pub fn fresnel_dielectric(cos_theta_i: Float, mut eta_i: Float, mut eta_t: Float) -> Float {
    let mut cos_theta_i = cos_theta_i.max(-1.0).min(1.0);
    let entering = cos_theta_i > 0.0;
    if !entering {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_theta_i = cos_theta_i.abs();
    }

    // compute cos_theta_t using snell's law
    let sin_theta_i = Float::sqrt((1.0 - cos_theta_i * cos_theta_i).max(0.0));
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 {
        return 1.0; // total internal reflection
    }
    let cos_theta_t = Float::sqrt((1.0 - sin_theta_t * sin_theta_t).max(0.0));

    let r_parallel = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t))
        / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp = ((eta_i * cos_theta_i) - (eta_t * cos_theta_t))
        / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));

    (r_parallel * r_parallel + r_perp * r_perp) / 2.0
}

/// Schlick's approximation of the Fresnel term, `r0` being the reflectance at normal incidence.
pub fn schlick(r0: Float, cos_theta: Float) -> Float {
    let m = (1.0 - cos_theta.abs()).max(0.0);
    r0 + (1.0 - r0) * sq!(sq!(m)) * m
}
