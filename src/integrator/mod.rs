use crate::arena::Arena;
use crate::config::PathTracerConfig;
use crate::light::{LightScene, VisibilityTester};
use crate::random::Random;
use crate::reflection::Bxdf;
use crate::spectrum::Spectrum;
use crate::{Float, Point3f, Ray, RayDifferential, Vec3f};

pub mod direct_lighting;
pub mod path;

pub use path::PathIntegrator;

/// First intersection of a ray with the scene, with the material and emission found there.
#[derive(Clone, Copy, Debug)]
pub struct Hit<'s> {
    /// `None` for surfaces that only emit.
    pub bxdf: Option<&'s Bxdf>,
    pub emission: Option<&'s dyn Spectrum>,
    pub point: Point3f,
    pub surface_normal: Vec3f,
    pub shading_normal: Vec3f,
}

/// Ray-scene intersection, provided by the acceleration structure.
pub trait RayTracer: Send + Sync {
    /// `None` when the ray leaves the scene.
    fn trace(&self, ray: &Ray) -> Option<Hit<'_>>;
}

/// Everything an integrator queries while following a path.
#[derive(Clone, Copy)]
pub struct Scene<'s> {
    pub tracer: &'s dyn RayTracer,
    pub visibility: &'s dyn VisibilityTester,
    pub lights: &'s dyn LightScene,
}

impl<'s> Scene<'s> {
    pub fn new(
        tracer: &'s dyn RayTracer,
        visibility: &'s dyn VisibilityTester,
        lights: &'s dyn LightScene,
    ) -> Self {
        Self { tracer, visibility, lights }
    }
}

pub trait Integrator: Send + Sync {
    /// Estimates the radiance arriving along `ray`. Everything the estimate refers to lives
    /// in `arena` or in the scene.
    fn integrate<'a>(
        &mut self,
        ray: &RayDifferential,
        scene: &Scene<'a>,
        rng: &mut dyn Random,
        arena: &'a Arena,
    ) -> Option<&'a dyn Spectrum>;

    /// A fresh instance sharing this one's configuration, for another worker.
    fn duplicate(&self) -> Box<dyn Integrator>;

    /// Called once by each worker after its last sample.
    fn finish(&self) {}
}

/// Decides whether a path with the given throughput continues. Returns the survival
/// probability the surviving path has to be divided by, or `None` if the path ends.
///
/// Always takes exactly one draw from `rng`.
pub fn russian_roulette(throughput: Float, config: &PathTracerConfig, rng: &mut dyn Random) -> Option<Float> {
    let u = rng.next_float();
    if throughput >= config.roulette_threshold {
        return Some(1.0);
    }
    let q = Float::max(config.min_termination_probability, 1.0 - throughput);
    if u < q {
        None
    } else {
        Some(1.0 - q)
    }
}
