use std::fmt::Debug;
use std::sync::Arc;

use crate::arena::Arena;
use crate::random::Sampler;
use crate::spectrum::{PowerMatcher, SpectralAllocator, Spectrum};
use crate::{Float, Point3f, Ray, Vec3f};

pub mod environment;
pub mod point;
pub mod scene;

pub use environment::UniformEnvironmentLight;
pub use point::PointLight;
pub use scene::{make_light_scene, AllLightScene, LightScene, OneLightScene, PowerLightScene};

/// Draws a single `Light::sample` call may take from the stream.
pub const LIGHT_SAMPLE_BUDGET: usize = 2;

/// Occlusion queries against the scene geometry.
pub trait VisibilityTester: Send + Sync {
    /// Whether nothing blocks `ray` before `max_distance`, which is infinite for lights at
    /// infinity.
    fn visible(&self, ray: &Ray, max_distance: Float) -> bool;
}

#[derive(Clone, Copy, Debug)]
pub struct LightSampleResult<'a> {
    pub emission: &'a dyn Spectrum,
    /// Unit direction from the shaded point towards the light.
    pub to_light: Vec3f,
    /// Solid angle density, `None` for lights that can only be reached by sampling them.
    pub pdf: Option<Float>,
}

#[derive(Clone, Copy, Debug)]
pub struct LightEmission<'a> {
    pub emission: &'a dyn Spectrum,
    /// Density with which `Light::sample` would have chosen this direction.
    pub pdf: Float,
}

pub trait Light: Debug + Send + Sync {
    /// Samples incident emission at `hit_point`. Occluded samples yield `None`.
    fn sample<'a>(
        &'a self,
        hit_point: Point3f,
        sampler: &mut Sampler,
        visibility: &dyn VisibilityTester,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<LightSampleResult<'a>>;

    /// Emission reaching the origin of `ray` from this light along the ray's direction.
    fn emission<'a>(
        &'a self,
        ray: &Ray,
        visibility: &dyn VisibilityTester,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<LightEmission<'a>>;

    /// Total emitted power, reduced to a scalar by `matcher`. `world_radius` bounds the scene.
    fn power(&self, matcher: &dyn PowerMatcher, world_radius: Float) -> Float;
}

/// A light surrounding the whole scene; rays that escape the geometry see it.
pub trait EnvironmentalLight: Light {
    /// Emission seen along an escaped ray travelling in `direction`.
    fn escaped<'a>(&'a self, direction: Vec3f, allocator: &SpectralAllocator<'a>) -> Option<&'a dyn Spectrum>;

    fn into_light(self: Arc<Self>) -> Arc<dyn Light>;
}

/// One light chosen for next-event estimation at a shading point, with its selection
/// probability. `None` means the light was visited deterministically.
#[derive(Clone, Copy, Debug)]
pub struct LightSample<'a> {
    pub next: Option<&'a LightSample<'a>>,
    pub light: &'a dyn Light,
    pub pdf: Option<Float>,
}

impl<'a> LightSample<'a> {
    pub fn iter(&'a self) -> LightSampleIter<'a> {
        LightSampleIter { current: Some(self) }
    }
}

pub struct LightSampleIter<'a> {
    current: Option<&'a LightSample<'a>>,
}

impl<'a> Iterator for LightSampleIter<'a> {
    type Item = &'a LightSample<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.next;
        Some(current)
    }
}

/// Builds [`LightSample`] lists in the per-sample arena.
#[derive(Clone, Copy)]
pub struct LightSampleAllocator<'a> {
    arena: &'a Arena,
}

impl<'a> LightSampleAllocator<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self { arena }
    }

    /// Prepends a sample to `next`.
    pub fn push(
        &self,
        light: &'a dyn Light,
        pdf: Option<Float>,
        next: Option<&'a LightSample<'a>>,
    ) -> &'a LightSample<'a> {
        self.arena.alloc(LightSample { next, light, pdf })
    }
}
