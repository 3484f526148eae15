use std::sync::Arc;

use crate::consts::{INV_PI, PI};
use crate::random::Sampler;
use crate::reflection::fresnel::schlick;
use crate::reflection::microfacet::TrowbridgeReitzDistribution;
use crate::reflection::{abs_cos_theta, cos_phi, same_hemisphere, sin_phi, sin_theta, Hemisphere};
use crate::sampling::cosine_sample_hemisphere;
use crate::spectrum::{Reflector, SpectralAllocator};
use crate::{Float, Point2f, Vec3f};
use cgmath::InnerSpace;

/// Lobes that scatter over a continuous range of directions.
///
/// Internally these use the usual convention of both directions pointing away from the surface,
/// `wo = -incoming` and `wi = outgoing`.
#[derive(Debug)]
pub enum DiffuseLobe {
    Lambertian(Lambertian),
    OrenNayar(OrenNayar),
    AshikhminShirley(AshikhminShirley),
}

impl DiffuseLobe {
    pub fn sample(&self, incoming: Vec3f, sampler: &mut Sampler) -> Option<Vec3f> {
        let wo = -incoming;
        match self {
            DiffuseLobe::Lambertian(_) | DiffuseLobe::OrenNayar(_) => {
                let u = Point2f::new(sampler.next(), sampler.next());
                sample_cosine(wo, u)
            }
            DiffuseLobe::AshikhminShirley(lobe) => lobe.sample(wo, sampler),
        }
    }

    pub fn pdf(&self, incoming: Vec3f, outgoing: Vec3f, hemisphere: Hemisphere) -> Float {
        let (wo, wi) = (-incoming, outgoing);
        if hemisphere != Hemisphere::Brdf || !same_hemisphere(wo, wi) {
            return 0.0;
        }
        match self {
            DiffuseLobe::Lambertian(_) | DiffuseLobe::OrenNayar(_) => abs_cos_theta(wi) * INV_PI,
            DiffuseLobe::AshikhminShirley(lobe) => lobe.pdf(wo, wi),
        }
    }

    pub fn reflectance<'a>(
        &'a self,
        incoming: Vec3f,
        outgoing: Vec3f,
        hemisphere: Hemisphere,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<&'a dyn Reflector> {
        let (wo, wi) = (-incoming, outgoing);
        if hemisphere != Hemisphere::Brdf || !same_hemisphere(wo, wi) {
            return None;
        }
        match self {
            DiffuseLobe::Lambertian(lobe) => allocator.scale_reflector(Some(lobe.reflectance.as_ref()), INV_PI),
            DiffuseLobe::OrenNayar(lobe) => lobe.reflectance(wo, wi, allocator),
            DiffuseLobe::AshikhminShirley(lobe) => lobe.reflectance(wo, wi, allocator),
        }
    }
}

fn sample_cosine(wo: Vec3f, u: Point2f) -> Option<Vec3f> {
    let mut wi = cosine_sample_hemisphere(u);
    if wo.z < 0.0 {
        wi.z *= -1.0;
    }
    if wi.z == 0.0 {
        None
    } else {
        Some(wi)
    }
}

#[derive(Debug)]
pub struct Lambertian {
    reflectance: Arc<dyn Reflector>,
}

impl Lambertian {
    pub fn new(reflectance: Arc<dyn Reflector>) -> Self {
        Self { reflectance }
    }
}

#[derive(Debug)]
pub struct OrenNayar {
    reflectance: Arc<dyn Reflector>,
    a: Float,
    b: Float,
}

impl OrenNayar {
    /// `sigma` is the standard deviation of the microfacet angle, in radians.
    pub fn new(reflectance: Arc<dyn Reflector>, sigma: Float) -> Self {
        let sigma2 = sigma * sigma;
        let a = 1.0 - (sigma2 / (2.0 * (sigma2 + 0.33)));
        let b = 0.45 * sigma2 / (sigma2 + 0.09);
        OrenNayar { reflectance, a, b }
    }

    fn reflectance<'a>(&'a self, wo: Vec3f, wi: Vec3f, allocator: &SpectralAllocator<'a>) -> Option<&'a dyn Reflector> {
        let sin_theta_i = sin_theta(wi);
        let sin_theta_o = sin_theta(wo);
        // compute cosine term of Oren-Nayar model
        let max_cos = if sin_theta_i > 1.0e-4 && sin_theta_o > 1.0e-4 {
            let d_cos = cos_phi(wi) * cos_phi(wo) + sin_phi(wi) * sin_phi(wo);
            Float::max(0.0, d_cos)
        } else {
            0.0
        };

        let (sin_alpha, tan_beta) = if abs_cos_theta(wi) > abs_cos_theta(wo) {
            (sin_theta_o, sin_theta_i / abs_cos_theta(wi))
        } else {
            (sin_theta_i, sin_theta_o / abs_cos_theta(wo))
        };

        let k = INV_PI * (self.a + self.b * max_cos * sin_alpha * tan_beta);
        allocator.unbounded_scale(Some(self.reflectance.as_ref()), k)
    }
}

/// Ashikhmin and Shirley's coupled diffuse/glossy model: a diffuse base under a glossy
/// Trowbridge-Reitz coat whose reflectance follows Schlick's Fresnel approximation.
#[derive(Debug)]
pub struct AshikhminShirley {
    diffuse: Option<Arc<dyn Reflector>>,
    specular: Option<Arc<dyn Reflector>>,
    distribution: TrowbridgeReitzDistribution,
}

/// Per-evaluation value of an [`AshikhminShirley`] lobe.
#[derive(Debug)]
struct AshikhminShirleyValue<'a> {
    diffuse: Option<&'a dyn Reflector>,
    specular: Option<&'a dyn Reflector>,
    diffuse_factor: Float,
    specular_factor: Float,
    cos_half: Float,
}

impl Reflector for AshikhminShirleyValue<'_> {
    fn reflectance(&self, wavelength: Float) -> Float {
        let rs = self.specular.map_or(0.0, |s| s.reflectance(wavelength));
        let rd = self.diffuse.map_or(0.0, |d| d.reflectance(wavelength));
        rd * (1.0 - rs) * self.diffuse_factor + self.specular_factor * schlick(rs, self.cos_half)
    }
}

impl AshikhminShirley {
    /// `None` if neither the diffuse nor the specular reflector is present.
    pub fn new(diffuse: Option<Arc<dyn Reflector>>, specular: Option<Arc<dyn Reflector>>, roughness: Float) -> Option<Self> {
        if diffuse.is_none() && specular.is_none() {
            return None;
        }
        Some(Self {
            diffuse,
            specular,
            distribution: TrowbridgeReitzDistribution::isotropic(roughness),
        })
    }

    fn sample(&self, wo: Vec3f, sampler: &mut Sampler) -> Option<Vec3f> {
        let u0 = sampler.next();
        let u1 = sampler.next();
        let u2 = sampler.next();
        if u0 < 0.5 {
            sample_cosine(wo, Point2f::new(u1, u2))
        } else {
            let wh = self.distribution.sample_wh(wo, Point2f::new(u1, u2));
            let wi = -wo + 2.0 * wo.dot(wh) * wh;
            if same_hemisphere(wo, wi) {
                Some(wi)
            } else {
                None
            }
        }
    }

    fn pdf(&self, wo: Vec3f, wi: Vec3f) -> Float {
        let wh = (wo + wi).normalize();
        let pdf_wh = self.distribution.pdf(wh);
        0.5 * (abs_cos_theta(wi) * INV_PI + pdf_wh / (4.0 * wo.dot(wh)))
    }

    fn reflectance<'a>(&'a self, wo: Vec3f, wi: Vec3f, allocator: &SpectralAllocator<'a>) -> Option<&'a dyn Reflector> {
        let pow5 = |v: Float| sq!(sq!(v)) * v;
        let diffuse_factor = (28.0 / (23.0 * PI))
            * (1.0 - pow5(1.0 - 0.5 * abs_cos_theta(wi)))
            * (1.0 - pow5(1.0 - 0.5 * abs_cos_theta(wo)));

        let wh = wi + wo;
        if wh.x == 0.0 && wh.y == 0.0 && wh.z == 0.0 {
            return None;
        }
        let wh = wh.normalize();
        let cos_half = wi.dot(wh);
        let specular_factor = self.distribution.d(wh)
            / (4.0 * cos_half.abs() * Float::max(abs_cos_theta(wi), abs_cos_theta(wo)));

        let value: &'a dyn Reflector = allocator.arena().alloc(AshikhminShirleyValue {
            diffuse: self.diffuse.as_deref(),
            specular: self.specular.as_deref(),
            diffuse_factor: if self.diffuse.is_some() { diffuse_factor } else { 0.0 },
            specular_factor,
            cos_half,
        });
        Some(value)
    }
}
