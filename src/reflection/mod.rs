use std::sync::Arc;

use crate::random::Sampler;
use crate::spectrum::{Reflector, SpectralAllocator};
use crate::{DirectionDifferentials, Float, Vec3f};

pub mod bsdf;
pub mod composite;
pub mod diffuse;
pub mod fourier;
pub mod fresnel;
pub mod microfacet;
pub mod specular;

pub use composite::{Attenuated, Composite, MAX_COMPOSITE_LOBES};
pub use diffuse::{AshikhminShirley, DiffuseLobe, Lambertian, OrenNayar};
pub use fourier::{FourierBasis, FourierBxdf, FourierTable};
pub use specular::{Mirror, SpecularDielectric, SpecularLobe, Transparent};

// Local shading frame helpers. The shading normal is +z.

pub(crate) fn cos_theta(w: Vec3f) -> Float { w.z }
pub(crate) fn cos2_theta(w: Vec3f) -> Float { w.z * w.z }
pub(crate) fn abs_cos_theta(w: Vec3f) -> Float { w.z.abs() }

pub(crate) fn sin2_theta(w: Vec3f) -> Float {
    Float::max(0.0, 1.0 - cos2_theta(w))
}

pub(crate) fn sin_theta(w: Vec3f) -> Float {
    sin2_theta(w).sqrt()
}

pub(crate) fn tan_theta(w: Vec3f) -> Float {
    sin_theta(w) / cos_theta(w)
}

pub(crate) fn tan2_theta(w: Vec3f) -> Float {
    sin2_theta(w) / cos2_theta(w)
}

pub(crate) fn cos_phi(w: Vec3f) -> Float {
    let sin_theta = sin_theta(w);
    if sin_theta == 0.0 {
        1.0
    } else {
        (w.x / sin_theta).max(-1.0).min(1.0)
    }
}

pub(crate) fn sin_phi(w: Vec3f) -> Float {
    let sin_theta = sin_theta(w);
    if sin_theta == 0.0 {
        0.0
    } else {
        (w.y / sin_theta).max(-1.0).min(1.0)
    }
}

pub(crate) fn cos2_phi(w: Vec3f) -> Float {
    cos_phi(w) * cos_phi(w)
}

pub(crate) fn sin2_phi(w: Vec3f) -> Float {
    sin_phi(w) * sin_phi(w)
}

pub(crate) fn same_hemisphere(v1: Vec3f, v2: Vec3f) -> bool {
    v1.z * v2.z > 0.0
}

/// Which side of the surface a scattered direction leaves from, relative to the arriving ray.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hemisphere {
    /// Reflection: the path turns back to the side it arrived from.
    Brdf,
    /// Transmission: the path continues through the surface.
    Btdf,
}

/// Draws a single `Bsdf::sample` call may take from the stream.
pub const BXDF_SAMPLE_BUDGET: usize = 8;

#[derive(Clone, Copy, Debug)]
pub struct SpecularSample<'a> {
    pub outgoing: Vec3f,
    pub hemisphere: Hemisphere,
    pub reflectance: &'a dyn Reflector,
    pub differentials: Option<DirectionDifferentials>,
    /// Discrete selection probability, `None` when the direction was chosen with certainty.
    pub pdf: Option<Float>,
}

#[derive(Clone, Copy, Debug)]
pub enum BxdfSample<'a> {
    /// A direction drawn from the lobe's own density; its value and pdf are evaluated
    /// separately through `pdf_diffuse` / `reflectance_diffuse`.
    Diffuse { outgoing: Vec3f },
    Specular(SpecularSample<'a>),
}

/// A scattering model at a point, in a local frame where the shading normal is +z.
///
/// All directions follow the path: `incoming` is the direction the ray travels *towards* the
/// surface and `outgoing` the direction the path continues in.
#[derive(Debug)]
pub enum Bxdf {
    Diffuse(DiffuseLobe),
    Specular(SpecularLobe),
    Tabulated(FourierBxdf),
    Composite(Composite),
    Attenuated(Attenuated),
}

impl Bxdf {
    pub fn lambertian(reflectance: Option<Arc<dyn Reflector>>) -> Option<Self> {
        Some(Bxdf::Diffuse(DiffuseLobe::Lambertian(Lambertian::new(reflectance?))))
    }

    pub fn oren_nayar(reflectance: Option<Arc<dyn Reflector>>, sigma: Float) -> Option<Self> {
        Some(Bxdf::Diffuse(DiffuseLobe::OrenNayar(OrenNayar::new(reflectance?, sigma))))
    }

    pub fn ashikhmin_shirley(
        diffuse: Option<Arc<dyn Reflector>>,
        specular: Option<Arc<dyn Reflector>>,
        roughness: Float,
    ) -> Option<Self> {
        AshikhminShirley::new(diffuse, specular, roughness)
            .map(|lobe| Bxdf::Diffuse(DiffuseLobe::AshikhminShirley(lobe)))
    }

    pub fn mirror(reflectance: Option<Arc<dyn Reflector>>) -> Option<Self> {
        Some(Bxdf::Specular(SpecularLobe::Mirror(Mirror::new(reflectance?))))
    }

    pub fn specular_dielectric(
        reflectance: Option<Arc<dyn Reflector>>,
        transmittance: Option<Arc<dyn Reflector>>,
        eta_front: Float,
        eta_back: Float,
    ) -> Option<Self> {
        SpecularDielectric::new(reflectance, transmittance, eta_front, eta_back)
            .map(|lobe| Bxdf::Specular(SpecularLobe::Dielectric(lobe)))
    }

    pub fn transparent(transmittance: Option<Arc<dyn Reflector>>) -> Option<Self> {
        Some(Bxdf::Specular(SpecularLobe::Transparent(Transparent::new(transmittance?))))
    }

    pub fn tabulated(bxdf: FourierBxdf) -> Self {
        Bxdf::Tabulated(bxdf)
    }

    /// Absent lobes are skipped; no lobes at all gives `None` and a single lobe is returned
    /// as-is.
    pub fn composite(lobes: impl IntoIterator<Item = Option<Bxdf>>) -> Option<Self> {
        Composite::build(lobes.into_iter().flatten())
    }

    /// Scales `inner` by `attenuation`; non-positive coefficients or a missing inner lobe
    /// leave nothing to scatter.
    pub fn attenuated(inner: Option<Bxdf>, attenuation: Float) -> Option<Self> {
        Attenuated::build(inner?, attenuation)
    }

    /// `Some(p)` if the lobe has a diffuse component, where `p` is the probability that a
    /// full `sample` call picks that component.
    pub fn is_diffuse(&self) -> Option<Float> {
        match self {
            Bxdf::Diffuse(_) | Bxdf::Tabulated(_) => Some(1.0),
            Bxdf::Specular(_) => None,
            Bxdf::Composite(c) => c.is_diffuse(),
            Bxdf::Attenuated(a) => a.inner().is_diffuse(),
        }
    }

    pub fn sample<'a>(
        &'a self,
        incoming: Vec3f,
        differentials: Option<&DirectionDifferentials>,
        surface_normal: Vec3f,
        sampler: &mut Sampler,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<BxdfSample<'a>> {
        match self {
            Bxdf::Diffuse(lobe) => lobe
                .sample(incoming, sampler)
                .map(|outgoing| BxdfSample::Diffuse { outgoing }),
            Bxdf::Tabulated(lobe) => lobe
                .sample(incoming, sampler)
                .map(|outgoing| BxdfSample::Diffuse { outgoing }),
            Bxdf::Specular(lobe) => lobe
                .sample(incoming, differentials, sampler, allocator)
                .map(BxdfSample::Specular),
            Bxdf::Composite(c) => c.sample(incoming, differentials, surface_normal, sampler, allocator),
            Bxdf::Attenuated(a) => a.sample(incoming, differentials, surface_normal, sampler, allocator),
        }
    }

    /// Samples only the diffuse part of the lobe.
    pub fn sample_diffuse(&self, incoming: Vec3f, surface_normal: Vec3f, sampler: &mut Sampler) -> Option<Vec3f> {
        match self {
            Bxdf::Diffuse(lobe) => lobe.sample(incoming, sampler),
            Bxdf::Tabulated(lobe) => lobe.sample(incoming, sampler),
            Bxdf::Specular(_) => None,
            Bxdf::Composite(c) => c.sample_diffuse(incoming, surface_normal, sampler),
            Bxdf::Attenuated(a) => a.inner().sample_diffuse(incoming, surface_normal, sampler),
        }
    }

    /// Density of `sample_diffuse` producing `outgoing`. Zero for purely specular lobes.
    pub fn pdf_diffuse(&self, incoming: Vec3f, outgoing: Vec3f, surface_normal: Vec3f, hemisphere: Hemisphere) -> Float {
        match self {
            Bxdf::Diffuse(lobe) => lobe.pdf(incoming, outgoing, hemisphere),
            Bxdf::Tabulated(lobe) => lobe.pdf(incoming, outgoing),
            Bxdf::Specular(_) => 0.0,
            Bxdf::Composite(c) => c.pdf_diffuse(incoming, outgoing, surface_normal, hemisphere),
            Bxdf::Attenuated(a) => a.inner().pdf_diffuse(incoming, outgoing, surface_normal, hemisphere),
        }
    }

    pub fn reflectance_diffuse<'a>(
        &'a self,
        incoming: Vec3f,
        outgoing: Vec3f,
        surface_normal: Vec3f,
        hemisphere: Hemisphere,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<&'a dyn Reflector> {
        match self {
            Bxdf::Diffuse(lobe) => lobe.reflectance(incoming, outgoing, hemisphere, allocator),
            Bxdf::Tabulated(lobe) => lobe.reflectance(incoming, outgoing, allocator),
            Bxdf::Specular(_) => None,
            Bxdf::Composite(c) => c.reflectance_diffuse(incoming, outgoing, surface_normal, hemisphere, allocator),
            Bxdf::Attenuated(a) => a.reflectance_diffuse(incoming, outgoing, surface_normal, hemisphere, allocator),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::random::tests::SequenceRandom;
    use crate::spectrum::UniformReflector;
    use approx::assert_abs_diff_eq;

    pub fn grey(v: Float) -> Option<Arc<dyn Reflector>> {
        UniformReflector::new(v).map(|r| Arc::new(r) as Arc<dyn Reflector>)
    }

    #[test]
    fn test_composite_diffuse_probability() {
        // weights 1 + 1 + 0 over three lobes
        let bxdf = Bxdf::composite(vec![
            Bxdf::lambertian(grey(0.5)),
            Bxdf::oren_nayar(grey(0.5), 0.3),
            Bxdf::mirror(grey(0.5)),
        ])
        .unwrap();
        assert_abs_diff_eq!(bxdf.is_diffuse().unwrap(), 2.0 / 3.0);

        let specular = Bxdf::composite(vec![Bxdf::mirror(grey(0.5)), Bxdf::transparent(grey(0.5))]).unwrap();
        assert!(specular.is_diffuse().is_none());
    }

    #[test]
    fn test_lambertian_sample_and_evaluate() {
        let bxdf = Bxdf::lambertian(grey(0.5)).unwrap();
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        let mut rng = SequenceRandom::new(vec![0.25, 0.75]);
        let incoming = Vec3f::new(0.0, 0.0, -1.0);
        let n = Vec3f::new(0.0, 0.0, 1.0);

        let sample = {
            let mut sampler = Sampler::new(&mut rng, 2);
            bxdf.sample(incoming, None, n, &mut sampler, &allocator)
        };
        let outgoing = match sample {
            Some(BxdfSample::Diffuse { outgoing }) => outgoing,
            _ => panic!("expected a diffuse sample"),
        };
        assert!(outgoing.z > 0.0);

        let pdf = bxdf.pdf_diffuse(incoming, outgoing, n, Hemisphere::Brdf);
        assert_abs_diff_eq!(pdf, outgoing.z * crate::consts::INV_PI, epsilon = 1e-6);
        assert_eq!(bxdf.pdf_diffuse(incoming, outgoing, n, Hemisphere::Btdf), 0.0);

        let r = bxdf.reflectance_diffuse(incoming, outgoing, n, Hemisphere::Brdf, &allocator).unwrap();
        assert_abs_diff_eq!(r.reflectance(550.0), 0.5 * crate::consts::INV_PI, epsilon = 1e-6);
        assert!(bxdf.reflectance_diffuse(incoming, outgoing, n, Hemisphere::Btdf, &allocator).is_none());
    }

    #[test]
    fn test_attenuated_collapses() {
        assert!(Bxdf::attenuated(Bxdf::lambertian(grey(0.5)), 0.0).is_none());
        assert!(Bxdf::attenuated(Bxdf::lambertian(grey(0.5)), -1.0).is_none());
        assert!(Bxdf::attenuated(None, 0.5).is_none());
        assert!(Bxdf::lambertian(None).is_none());

        let attenuated = Bxdf::attenuated(Bxdf::lambertian(grey(0.5)), 0.5).unwrap();
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        let n = Vec3f::new(0.0, 0.0, 1.0);
        let r = attenuated
            .reflectance_diffuse(-n, n, n, Hemisphere::Brdf, &allocator)
            .unwrap();
        assert_abs_diff_eq!(r.reflectance(500.0), 0.25 * crate::consts::INV_PI, epsilon = 1e-6);
    }
}
