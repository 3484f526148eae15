use std::sync::Arc;

use cgmath::InnerSpace;

use crate::consts::PI;
use crate::light::{Light, LightEmission, LightSampleResult, VisibilityTester};
use crate::random::Sampler;
use crate::spectrum::{PowerMatcher, SpectralAllocator, Spectrum};
use crate::{Float, Point3f, Ray};

/// Isotropic point source.
#[derive(Debug)]
pub struct PointLight {
    position: Point3f,
    intensity: Arc<dyn Spectrum>,
}

impl PointLight {
    pub fn new(position: Point3f, intensity: Arc<dyn Spectrum>) -> Self {
        Self { position, intensity }
    }

    pub fn position(&self) -> Point3f {
        self.position
    }
}

impl Light for PointLight {
    fn sample<'a>(
        &'a self,
        hit_point: Point3f,
        _sampler: &mut Sampler,
        visibility: &dyn VisibilityTester,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<LightSampleResult<'a>> {
        let offset = self.position - hit_point;
        let distance2 = offset.magnitude2();
        if distance2 == 0.0 {
            return None;
        }
        let distance = distance2.sqrt();
        let to_light = offset / distance;
        if !visibility.visible(&Ray::new(hit_point, to_light), distance) {
            return None;
        }

        let emission = allocator.scale(Some(self.intensity.as_ref()), 1.0 / distance2)?;
        Some(LightSampleResult { emission, to_light, pdf: None })
    }

    fn emission<'a>(
        &'a self,
        _ray: &Ray,
        _visibility: &dyn VisibilityTester,
        _allocator: &SpectralAllocator<'a>,
    ) -> Option<LightEmission<'a>> {
        // rays never hit a point
        None
    }

    fn power(&self, matcher: &dyn PowerMatcher, _world_radius: Float) -> Float {
        4.0 * PI * matcher.match_power(self.intensity.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::light::tests::{Blocked, EmptySpace};
    use crate::random::tests::SequenceRandom;
    use crate::spectrum::{UniformSpectrum, VisiblePowerMatcher};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_inverse_square_falloff() {
        let light = PointLight::new(Point3f::new(0.0, 2.0, 0.0), Arc::new(UniformSpectrum::new(8.0).unwrap()));
        let arena = Arena::new();
        let allocator = SpectralAllocator::new(&arena);
        let mut rng = SequenceRandom::new(vec![0.5]);

        let sample = light
            .sample(Point3f::new(0.0, 0.0, 0.0), &mut Sampler::new(&mut rng, 2), &EmptySpace, &allocator)
            .unwrap();
        assert!(sample.pdf.is_none());
        assert_abs_diff_eq!(sample.emission.intensity(550.0), 2.0);
        assert_abs_diff_eq!(sample.to_light.y, 1.0);

        let occluded = light.sample(Point3f::new(0.0, 0.0, 0.0), &mut Sampler::new(&mut rng, 2), &Blocked, &allocator);
        assert!(occluded.is_none());

        assert_abs_diff_eq!(light.power(&VisiblePowerMatcher, 10.0), 32.0 * PI, epsilon = 1e-2);
    }
}
