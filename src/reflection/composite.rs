use arrayvec::ArrayVec;

use crate::random::Sampler;
use crate::reflection::{Bxdf, BxdfSample, Hemisphere, SpecularSample};
use crate::spectrum::{Reflector, SpectralAllocator};
use crate::{DirectionDifferentials, Float, Vec3f};

pub const MAX_COMPOSITE_LOBES: usize = 8;

/// Sum of several lobes.
#[derive(Debug)]
pub struct Composite {
    lobes: Vec<Bxdf>,
    // diffuse probability mass of each lobe, zero for purely specular ones
    diffuse_weights: ArrayVec<Float, MAX_COMPOSITE_LOBES>,
    diffuse_total: Float,
}

impl Composite {
    pub(crate) fn build(lobes: impl Iterator<Item = Bxdf>) -> Option<Bxdf> {
        let mut lobes: Vec<Bxdf> = lobes.collect();
        match lobes.len() {
            0 => return None,
            1 => return lobes.pop(),
            n if n > MAX_COMPOSITE_LOBES => {
                tracing::warn!("composite with {} lobes, keeping the first {}", n, MAX_COMPOSITE_LOBES);
                lobes.truncate(MAX_COMPOSITE_LOBES);
            }
            _ => {}
        }

        let diffuse_weights: ArrayVec<Float, MAX_COMPOSITE_LOBES> =
            lobes.iter().map(|l| l.is_diffuse().unwrap_or(0.0)).collect();
        let diffuse_total = diffuse_weights.iter().sum();
        Some(Bxdf::Composite(Composite { lobes, diffuse_weights, diffuse_total }))
    }

    pub fn lobes(&self) -> &[Bxdf] {
        &self.lobes
    }

    pub fn is_diffuse(&self) -> Option<Float> {
        if self.diffuse_total > 0.0 {
            Some(self.diffuse_total / self.lobes.len() as Float)
        } else {
            None
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
        let n = self.lobes.len();
        let chosen = &self.lobes[sampler.next_index(n)];
        match chosen.sample(incoming, differentials, surface_normal, sampler, allocator)? {
            BxdfSample::Specular(s) => Some(BxdfSample::Specular(SpecularSample {
                pdf: Some(s.pdf.unwrap_or(1.0) / n as Float),
                ..s
            })),
            diffuse => Some(diffuse),
        }
    }

    pub fn sample_diffuse(&self, incoming: Vec3f, surface_normal: Vec3f, sampler: &mut Sampler) -> Option<Vec3f> {
        let u = sampler.next();
        if self.diffuse_total <= 0.0 {
            return None;
        }

        let target = u * self.diffuse_total;
        let mut cumulative = 0.0;
        let mut chosen = None;
        for (lobe, &weight) in self.lobes.iter().zip(&self.diffuse_weights) {
            if weight <= 0.0 {
                continue;
            }
            chosen = Some(lobe);
            cumulative += weight;
            if target < cumulative {
                break;
            }
        }
        chosen?.sample_diffuse(incoming, surface_normal, sampler)
    }

    pub fn pdf_diffuse(&self, incoming: Vec3f, outgoing: Vec3f, surface_normal: Vec3f, hemisphere: Hemisphere) -> Float {
        if self.diffuse_total <= 0.0 {
            return 0.0;
        }
        let weighted: Float = self
            .lobes
            .iter()
            .zip(&self.diffuse_weights)
            .filter(|(_, w)| **w > 0.0)
            .map(|(lobe, &w)| w * lobe.pdf_diffuse(incoming, outgoing, surface_normal, hemisphere))
            .sum();
        weighted / self.diffuse_total
    }

    pub fn reflectance_diffuse<'a>(
        &'a self,
        incoming: Vec3f,
        outgoing: Vec3f,
        surface_normal: Vec3f,
        hemisphere: Hemisphere,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<&'a dyn Reflector> {
        self.lobes.iter().fold(None, |sum, lobe| {
            let value = lobe.reflectance_diffuse(incoming, outgoing, surface_normal, hemisphere, allocator);
            allocator.unbounded_add(sum, value)
        })
    }
}

/// A lobe with its reflectance scaled down by a constant factor in `(0, 1)`.
#[derive(Debug)]
pub struct Attenuated {
    inner: Box<Bxdf>,
    attenuation: Float,
}

impl Attenuated {
    pub(crate) fn build(inner: Bxdf, attenuation: Float) -> Option<Bxdf> {
        if !(attenuation > 0.0) {
            None
        } else if attenuation >= 1.0 {
            Some(inner)
        } else {
            Some(Bxdf::Attenuated(Attenuated { inner: Box::new(inner), attenuation }))
        }
    }

    pub fn inner(&self) -> &Bxdf {
        &self.inner
    }

    pub fn attenuation(&self) -> Float {
        self.attenuation
    }

    pub fn sample<'a>(
        &'a self,
        incoming: Vec3f,
        differentials: Option<&DirectionDifferentials>,
        surface_normal: Vec3f,
        sampler: &mut Sampler,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<BxdfSample<'a>> {
        match self.inner.sample(incoming, differentials, surface_normal, sampler, allocator)? {
            BxdfSample::Specular(s) => {
                let reflectance = allocator.unbounded_scale(Some(s.reflectance), self.attenuation)?;
                Some(BxdfSample::Specular(SpecularSample { reflectance, ..s }))
            }
            diffuse => Some(diffuse),
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
        let value = self.inner.reflectance_diffuse(incoming, outgoing, surface_normal, hemisphere, allocator);
        allocator.unbounded_scale(value, self.attenuation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::random::tests::SequenceRandom;
    use crate::reflection::tests::grey;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_single_lobe_is_unwrapped() {
        let bxdf = Bxdf::composite(vec![None, Bxdf::mirror(grey(0.5)), None]).unwrap();
        assert!(matches!(bxdf, Bxdf::Specular(_)));
        assert!(Bxdf::composite(vec![None, None]).is_none());
        assert!(matches!(Bxdf::attenuated(Bxdf::mirror(grey(0.5)), 1.0), Some(Bxdf::Specular(_))));
    }

    #[test]
    fn test_specular_selection_probability() {
        let bxdf = Bxdf::composite(vec![Bxdf::lambertian(grey(0.5)), Bxdf::mirror(grey(0.5))]).unwrap();
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        let n = Vec3f::new(0.0, 0.0, 1.0);
        let incoming = Vec3f::new(0.0, 0.6, -0.8);

        // 0.75 picks the second of two lobes
        let mut rng = SequenceRandom::new(vec![0.75]);
        let mut sampler = Sampler::new(&mut rng, 1);
        match bxdf.sample(incoming, None, n, &mut sampler, &allocator) {
            Some(BxdfSample::Specular(s)) => {
                assert_eq!(s.pdf, Some(0.5));
                assert_eq!(s.hemisphere, Hemisphere::Brdf);
            }
            _ => panic!("expected the mirror lobe"),
        }
    }

    #[test]
    fn test_diffuse_density_is_weighted() {
        let bxdf = Bxdf::composite(vec![
            Bxdf::lambertian(grey(0.25)),
            Bxdf::lambertian(grey(0.5)),
            Bxdf::mirror(grey(1.0)),
        ])
        .unwrap();
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        let n = Vec3f::new(0.0, 0.0, 1.0);
        let incoming = Vec3f::new(0.0, 0.0, -1.0);
        let outgoing = Vec3f::new(0.0, 0.0, 1.0);

        // both diffuse lobes share the cosine density, the mirror contributes nothing
        let pdf = bxdf.pdf_diffuse(incoming, outgoing, n, Hemisphere::Brdf);
        assert_abs_diff_eq!(pdf, crate::consts::INV_PI, epsilon = 1e-6);
        let value = bxdf.reflectance_diffuse(incoming, outgoing, n, Hemisphere::Brdf, &allocator).unwrap();
        assert_abs_diff_eq!(value.reflectance(500.0), 0.75 * crate::consts::INV_PI, epsilon = 1e-6);

        let mut rng = SequenceRandom::new(vec![0.9, 0.5, 0.5]);
        let mut sampler = Sampler::new(&mut rng, 3);
        let sampled = bxdf.sample_diffuse(incoming, n, &mut sampler).unwrap();
        assert!(sampled.z > 0.0);
    }
}
