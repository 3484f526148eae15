use std::sync::Arc;

use crate::consts::PI;
use crate::light::{EnvironmentalLight, Light, LightEmission, LightSampleResult, VisibilityTester};
use crate::random::Sampler;
use crate::sampling::{uniform_sample_sphere, uniform_sphere_pdf};
use crate::spectrum::{PowerMatcher, SpectralAllocator, Spectrum};
use crate::{Float, Point2f, Point3f, Ray, Vec3f};

/// Constant emission arriving from every direction.
#[derive(Debug)]
pub struct UniformEnvironmentLight {
    radiance: Arc<dyn Spectrum>,
}

impl UniformEnvironmentLight {
    pub fn new(radiance: Arc<dyn Spectrum>) -> Self {
        Self { radiance }
    }
}

impl Light for UniformEnvironmentLight {
    fn sample<'a>(
        &'a self,
        hit_point: Point3f,
        sampler: &mut Sampler,
        visibility: &dyn VisibilityTester,
        _allocator: &SpectralAllocator<'a>,
    ) -> Option<LightSampleResult<'a>> {
        let u = Point2f::new(sampler.next(), sampler.next());
        let to_light = uniform_sample_sphere(u);
        if !visibility.visible(&Ray::new(hit_point, to_light), Float::INFINITY) {
            return None;
        }
        Some(LightSampleResult {
            emission: self.radiance.as_ref(),
            to_light,
            pdf: Some(uniform_sphere_pdf()),
        })
    }

    fn emission<'a>(
        &'a self,
        ray: &Ray,
        visibility: &dyn VisibilityTester,
        _allocator: &SpectralAllocator<'a>,
    ) -> Option<LightEmission<'a>> {
        if !visibility.visible(ray, Float::INFINITY) {
            return None;
        }
        Some(LightEmission { emission: self.radiance.as_ref(), pdf: uniform_sphere_pdf() })
    }

    fn power(&self, matcher: &dyn PowerMatcher, world_radius: Float) -> Float {
        PI * world_radius * world_radius * matcher.match_power(self.radiance.as_ref())
    }
}

impl EnvironmentalLight for UniformEnvironmentLight {
    fn escaped<'a>(&'a self, _direction: Vec3f, _allocator: &SpectralAllocator<'a>) -> Option<&'a dyn Spectrum> {
        Some(self.radiance.as_ref())
    }

    fn into_light(self: Arc<Self>) -> Arc<dyn Light> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::light::tests::{Blocked, EmptySpace};
    use crate::random::tests::SequenceRandom;
    use crate::spectrum::UniformSpectrum;
    use approx::assert_abs_diff_eq;
    use cgmath::InnerSpace;

    #[test]
    fn test_uniform_sampling() {
        let light = UniformEnvironmentLight::new(Arc::new(UniformSpectrum::new(0.5).unwrap()));
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        let mut rng = SequenceRandom::new(vec![0.2, 0.7]);
        let origin = Point3f::new(0.0, 0.0, 0.0);

        let sample = light.sample(origin, &mut Sampler::new(&mut rng, 2), &EmptySpace, &allocator).unwrap();
        assert_abs_diff_eq!(sample.to_light.magnitude(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(sample.pdf.unwrap(), 0.25 / PI);
        assert_abs_diff_eq!(sample.emission.intensity(400.0), 0.5);

        let ray = Ray::new(origin, Vec3f::new(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(light.emission(&ray, &EmptySpace, &allocator).unwrap().pdf, 0.25 / PI);
        assert!(light.emission(&ray, &Blocked, &allocator).is_none());
        assert!(light.escaped(ray.dir, &allocator).is_some());
    }
}
