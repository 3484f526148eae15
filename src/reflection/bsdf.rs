use cgmath::InnerSpace;

use crate::random::Sampler;
use crate::reflection::{Bxdf, BxdfSample, Hemisphere};
use crate::spectrum::{Reflector, SpectralAllocator};
use crate::{coordinate_system, DirectionDifferentials, Float, Vec3f};

/// A sampled scattering event, in world space.
#[derive(Clone, Copy, Debug)]
pub struct BsdfSample<'a> {
    pub reflector: &'a dyn Reflector,
    pub direction: Vec3f,
    pub differentials: Option<DirectionDifferentials>,
    /// Solid angle density, present exactly when the direction came from a diffuse lobe.
    pub pdf: Option<Float>,
    pub diffuse: bool,
    pub hemisphere: Hemisphere,
}

/// A [`Bxdf`] placed at a surface point.
///
/// Reflection and transmission are told apart with the geometric normal: an outgoing direction
/// on the same side of the surface as the incoming ray direction (which points into the
/// surface) continues through it.
#[derive(Clone, Copy, Debug)]
pub struct Bsdf<'s> {
    bxdf: &'s Bxdf,

    /// Geometry normal
    ng: Vec3f,

    /// Shading normal
    ns: Vec3f,

    /// s orthonormal basis vector with the shading normal
    ss: Vec3f,

    /// t orthonormal basis vector with the shading normal
    ts: Vec3f,
}

impl<'s> Bsdf<'s> {
    pub fn new(bxdf: &'s Bxdf, surface_normal: Vec3f, shading_normal: Vec3f, normalize: bool) -> Self {
        let (ng, ns) = if normalize {
            (surface_normal.normalize(), shading_normal.normalize())
        } else {
            (surface_normal, shading_normal)
        };
        let (ss, ts) = coordinate_system(ns);
        Self { bxdf, ng, ns, ss, ts }
    }

    pub fn bxdf(&self) -> &'s Bxdf {
        self.bxdf
    }

    pub fn surface_normal(&self) -> Vec3f {
        self.ng
    }

    pub fn shading_normal(&self) -> Vec3f {
        self.ns
    }

    pub fn is_diffuse(&self) -> Option<Float> {
        self.bxdf.is_diffuse()
    }

    pub fn world_to_local(&self, v: Vec3f) -> Vec3f {
        Vec3f::new(v.dot(self.ss), v.dot(self.ts), v.dot(self.ns))
    }

    pub fn local_to_world(&self, v: Vec3f) -> Vec3f {
        self.ss * v.x + self.ts * v.y + self.ns * v.z
    }

    fn hemisphere(&self, incoming: Vec3f, outgoing: Vec3f) -> Option<Hemisphere> {
        let i = incoming.dot(self.ng);
        let o = outgoing.dot(self.ng);
        if i == 0.0 || o == 0.0 {
            None
        } else if (i > 0.0) == (o > 0.0) {
            Some(Hemisphere::Btdf)
        } else {
            Some(Hemisphere::Brdf)
        }
    }

    /// Samples a direction to continue the path in. With `diffuse_only` only the diffuse part
    /// of the lobe is sampled and the pdf is that part's own density.
    pub fn sample<'a>(
        &self,
        incoming: Vec3f,
        differentials: Option<&DirectionDifferentials>,
        sampler: &mut Sampler,
        allocator: &SpectralAllocator<'a>,
        diffuse_only: bool,
    ) -> Option<BsdfSample<'a>>
    where
        's: 'a,
    {
        let bxdf: &'a Bxdf = self.bxdf;
        let local_in = self.world_to_local(incoming);
        let local_ng = self.world_to_local(self.ng);

        if diffuse_only {
            let local_out = bxdf.sample_diffuse(local_in, local_ng, sampler)?;
            return self.diffuse_sample(bxdf, incoming, local_in, local_out, local_ng, 1.0, allocator);
        }

        let local_differentials = differentials.map(|d| DirectionDifferentials {
            dx: self.world_to_local(d.dx),
            dy: self.world_to_local(d.dy),
        });
        match bxdf.sample(local_in, local_differentials.as_ref(), local_ng, sampler, allocator)? {
            BxdfSample::Diffuse { outgoing } => {
                let diffuse_probability = bxdf.is_diffuse()?;
                self.diffuse_sample(bxdf, incoming, local_in, outgoing, local_ng, diffuse_probability, allocator)
            }
            BxdfSample::Specular(s) => {
                let direction = self.local_to_world(s.outgoing);
                let hemisphere = self.hemisphere(incoming, direction)?;
                if hemisphere != s.hemisphere {
                    // the shading normal bent the direction across the geometric surface
                    return None;
                }
                let reflector = match s.pdf {
                    Some(pdf) if pdf > 0.0 => allocator.unbounded_scale(Some(s.reflectance), 1.0 / pdf)?,
                    Some(_) => return None,
                    None => s.reflectance,
                };
                Some(BsdfSample {
                    reflector,
                    direction,
                    differentials: s.differentials.map(|d| DirectionDifferentials {
                        dx: self.local_to_world(d.dx),
                        dy: self.local_to_world(d.dy),
                    }),
                    pdf: None,
                    diffuse: false,
                    hemisphere,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn diffuse_sample<'a>(
        &self,
        bxdf: &'a Bxdf,
        incoming: Vec3f,
        local_in: Vec3f,
        local_out: Vec3f,
        local_ng: Vec3f,
        selection_probability: Float,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<BsdfSample<'a>> {
        let direction = self.local_to_world(local_out);
        let hemisphere = self.hemisphere(incoming, direction)?;
        let pdf = bxdf.pdf_diffuse(local_in, local_out, local_ng, hemisphere) * selection_probability;
        if !(pdf > 0.0) {
            return None;
        }
        let reflector = bxdf.reflectance_diffuse(local_in, local_out, local_ng, hemisphere, allocator)?;
        Some(BsdfSample {
            reflector,
            direction,
            differentials: None,
            pdf: Some(pdf),
            diffuse: true,
            hemisphere,
        })
    }

    /// Value and diffuse-only density of scattering from `incoming` into `outgoing`.
    pub fn reflectance<'a>(
        &self,
        incoming: Vec3f,
        outgoing: Vec3f,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<(&'a dyn Reflector, Float)>
    where
        's: 'a,
    {
        let bxdf: &'a Bxdf = self.bxdf;
        bxdf.is_diffuse()?;
        let hemisphere = self.hemisphere(incoming, outgoing)?;
        let local_in = self.world_to_local(incoming);
        let local_out = self.world_to_local(outgoing);
        let local_ng = self.world_to_local(self.ng);

        let reflector = bxdf.reflectance_diffuse(local_in, local_out, local_ng, hemisphere, allocator)?;
        let pdf = bxdf.pdf_diffuse(local_in, local_out, local_ng, hemisphere);
        Some((reflector, pdf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::random::tests::SequenceRandom;
    use crate::reflection::tests::grey;
    use crate::reflection::BXDF_SAMPLE_BUDGET;
    use approx::assert_abs_diff_eq;

    fn sample_once<'a>(
        bsdf: &Bsdf<'a>,
        incoming: Vec3f,
        draws: Vec<Float>,
        allocator: &SpectralAllocator<'a>,
        diffuse_only: bool,
    ) -> Option<BsdfSample<'a>> {
        let mut rng = SequenceRandom::new(draws);
        let mut sampler = Sampler::new(&mut rng, BXDF_SAMPLE_BUDGET);
        bsdf.sample(incoming, None, &mut sampler, allocator, diffuse_only)
    }

    #[test]
    fn test_reflection_is_brdf() {
        let mirror = Bxdf::mirror(grey(0.5)).unwrap();
        // tilted frame so the local and world axes differ
        let n = Vec3f::new(0.0, 1.0, 1.0).normalize();
        let bsdf = Bsdf::new(&mirror, n, n, false);
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);

        let incoming = Vec3f::new(0.3, -0.2, -0.9).normalize();
        let s = sample_once(&bsdf, incoming, vec![0.5], &allocator, false).unwrap();
        assert_eq!(s.hemisphere, Hemisphere::Brdf);
        assert!(incoming.dot(n) < 0.0 && s.direction.dot(n) > 0.0);
        assert!(s.pdf.is_none());
        assert!(!s.diffuse);
        // reflected about the normal
        let expected = incoming - 2.0 * incoming.dot(n) * n;
        assert_abs_diff_eq!(s.direction.x, expected.x, epsilon = 1e-5);
        assert_abs_diff_eq!(s.direction.y, expected.y, epsilon = 1e-5);
        assert_abs_diff_eq!(s.direction.z, expected.z, epsilon = 1e-5);
    }

    #[test]
    fn test_transmission_is_btdf() {
        let clear = Bxdf::transparent(grey(0.5)).unwrap();
        let n = Vec3f::new(1.0, 0.0, 0.0);
        let bsdf = Bsdf::new(&clear, n, n, true);
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);

        let incoming = Vec3f::new(-0.8, 0.6, 0.0);
        let s = sample_once(&bsdf, incoming, vec![0.5], &allocator, false).unwrap();
        assert_eq!(s.hemisphere, Hemisphere::Btdf);
        assert!(incoming.dot(n) < 0.0 && s.direction.dot(n) < 0.0);

        // grazing rays never scatter
        assert!(sample_once(&bsdf, Vec3f::new(0.0, 1.0, 0.0), vec![0.5], &allocator, false).is_none());
    }

    #[test]
    fn test_composite_specular_pdf_is_folded() {
        let bxdf = Bxdf::composite(vec![Bxdf::lambertian(grey(0.5)), Bxdf::mirror(grey(0.5))]).unwrap();
        let n = Vec3f::new(0.0, 0.0, 1.0);
        let bsdf = Bsdf::new(&bxdf, n, n, false);
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        let incoming = Vec3f::new(0.0, 0.6, -0.8);

        // second lobe: the mirror, chosen with probability one half
        let s = sample_once(&bsdf, incoming, vec![0.75], &allocator, false).unwrap();
        assert!(s.pdf.is_none());
        assert_abs_diff_eq!(s.reflector.reflectance(500.0), 1.0);

        // first lobe: diffuse, density scaled by the diffuse probability
        let s = sample_once(&bsdf, incoming, vec![0.25, 0.3, 0.4], &allocator, false).unwrap();
        assert!(s.diffuse);
        let cos = s.direction.dot(n);
        assert_abs_diff_eq!(s.pdf.unwrap(), 0.5 * cos * crate::consts::INV_PI, epsilon = 1e-5);

        // diffuse only: density of the diffuse part alone
        let s = sample_once(&bsdf, incoming, vec![0.25, 0.3, 0.4], &allocator, true).unwrap();
        let cos = s.direction.dot(n);
        assert_abs_diff_eq!(s.pdf.unwrap(), cos * crate::consts::INV_PI, epsilon = 1e-5);

        let (value, pdf) = bsdf.reflectance(incoming, n, &allocator).unwrap();
        assert_abs_diff_eq!(value.reflectance(500.0), 0.5 * crate::consts::INV_PI, epsilon = 1e-6);
        assert_abs_diff_eq!(pdf, crate::consts::INV_PI, epsilon = 1e-6);
    }

    #[test]
    fn test_specular_has_no_reflectance() {
        let mirror = Bxdf::mirror(grey(0.5)).unwrap();
        let n = Vec3f::new(0.0, 0.0, 1.0);
        let bsdf = Bsdf::new(&mirror, n, n, false);
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        assert!(bsdf.reflectance(-n, n, &allocator).is_none());
        assert!(sample_once(&bsdf, -n, vec![0.5], &allocator, true).is_none());
    }
}
