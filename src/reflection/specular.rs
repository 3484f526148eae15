use std::sync::Arc;

use crate::random::Sampler;
use crate::reflection::fresnel::fresnel_dielectric;
use crate::reflection::{cos_theta, Hemisphere, SpecularSample};
use crate::spectrum::{Reflector, SpectralAllocator};
use crate::{DirectionDifferentials, Float, Vec3f};

/// Lobes that scatter into a single direction.
#[derive(Debug)]
pub enum SpecularLobe {
    Mirror(Mirror),
    Dielectric(SpecularDielectric),
    Transparent(Transparent),
}

impl SpecularLobe {
    pub fn sample<'a>(
        &'a self,
        incoming: Vec3f,
        differentials: Option<&DirectionDifferentials>,
        sampler: &mut Sampler,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<SpecularSample<'a>> {
        match self {
            SpecularLobe::Mirror(m) => Some(SpecularSample {
                outgoing: mirror(incoming),
                hemisphere: Hemisphere::Brdf,
                reflectance: m.reflectance.as_ref(),
                differentials: differentials.map(|d| DirectionDifferentials { dx: mirror(d.dx), dy: mirror(d.dy) }),
                pdf: None,
            }),
            SpecularLobe::Transparent(t) => Some(SpecularSample {
                outgoing: incoming,
                hemisphere: Hemisphere::Btdf,
                reflectance: t.transmittance.as_ref(),
                differentials: differentials.copied(),
                pdf: None,
            }),
            SpecularLobe::Dielectric(d) => d.sample(incoming, differentials, sampler, allocator),
        }
    }
}

fn mirror(w: Vec3f) -> Vec3f {
    Vec3f::new(w.x, w.y, -w.z)
}

/// Bends `incoming` through the shading plane, `eta` being the ratio of the index on the arrival
/// side to the index on the far side. `None` on total internal reflection.
fn refract(incoming: Vec3f, eta: Float) -> Option<Vec3f> {
    // normal on the arrival side
    let n_z = if incoming.z < 0.0 { 1.0 } else { -1.0 };
    let cos_theta_i = -incoming.z * n_z;
    let sin2_theta_i = Float::max(0.0, 1.0 - cos_theta_i * cos_theta_i);
    let sin2_theta_t = eta * eta * sin2_theta_i;
    if sin2_theta_t >= 1.0 {
        return None;
    }
    let cos_theta_t = Float::sqrt(1.0 - sin2_theta_t);
    let wt = eta * incoming + Vec3f::new(0.0, 0.0, (eta * cos_theta_i - cos_theta_t) * n_z);
    Some(wt)
}

#[derive(Debug)]
pub struct Mirror {
    reflectance: Arc<dyn Reflector>,
}

impl Mirror {
    pub fn new(reflectance: Arc<dyn Reflector>) -> Self {
        Self { reflectance }
    }
}

/// Passes light straight through, attenuated by the transmittance.
#[derive(Debug)]
pub struct Transparent {
    transmittance: Arc<dyn Reflector>,
}

impl Transparent {
    pub fn new(transmittance: Arc<dyn Reflector>) -> Self {
        Self { transmittance }
    }
}

/// Smooth boundary between two dielectrics. `eta_front` is the index of refraction on the side
/// the shading normal points to.
#[derive(Debug)]
pub struct SpecularDielectric {
    reflectance: Option<Arc<dyn Reflector>>,
    transmittance: Option<Arc<dyn Reflector>>,
    eta_front: Float,
    eta_back: Float,
}

impl SpecularDielectric {
    pub fn new(
        reflectance: Option<Arc<dyn Reflector>>,
        transmittance: Option<Arc<dyn Reflector>>,
        eta_front: Float,
        eta_back: Float,
    ) -> Option<Self> {
        if reflectance.is_none() && transmittance.is_none() {
            return None;
        }
        if !(eta_front > 0.0) || !(eta_back > 0.0) {
            return None;
        }
        Some(Self { reflectance, transmittance, eta_front, eta_back })
    }

    fn sample<'a>(
        &'a self,
        incoming: Vec3f,
        differentials: Option<&DirectionDifferentials>,
        sampler: &mut Sampler,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<SpecularSample<'a>> {
        let u = sampler.next();
        if cos_theta(incoming) == 0.0 {
            return None;
        }

        let fresnel = fresnel_dielectric(-cos_theta(incoming), self.eta_front, self.eta_back);
        if u < fresnel {
            return Some(SpecularSample {
                outgoing: mirror(incoming),
                hemisphere: Hemisphere::Brdf,
                reflectance: self.reflectance.as_deref()?,
                differentials: differentials.map(|d| DirectionDifferentials { dx: mirror(d.dx), dy: mirror(d.dy) }),
                pdf: None,
            });
        }

        let (eta_i, eta_t) = if incoming.z < 0.0 {
            (self.eta_front, self.eta_back)
        } else {
            (self.eta_back, self.eta_front)
        };
        let eta = eta_i / eta_t;
        let outgoing = refract(incoming, eta)?;
        let differentials = differentials.and_then(|d| {
            Some(DirectionDifferentials { dx: refract(d.dx, eta)?, dy: refract(d.dy, eta)? })
        });

        // radiance is compressed into the smaller solid angle on the denser side
        let reflectance = allocator.unbounded_scale(self.transmittance.as_deref(), eta * eta)?;
        Some(SpecularSample {
            outgoing,
            hemisphere: Hemisphere::Btdf,
            reflectance,
            differentials,
            pdf: None,
        })
    }
}
