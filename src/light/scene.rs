use std::sync::Arc;

use anyhow::{ensure, Context};
use tracing::debug;

use crate::config::LightSamplingStrategy;
use crate::light::{EnvironmentalLight, Light, LightSample, LightSampleAllocator};
use crate::random::{Random, Sampler};
use crate::spectrum::PowerMatcher;
use crate::{Float, Point3f};

/// Chooses which lights to estimate direct lighting from at a shading point.
pub trait LightScene: Send + Sync {
    /// Every call consumes the same number of draws from `rng`, whatever it returns.
    fn sample<'a>(
        &'a self,
        hit_point: Point3f,
        rng: &mut dyn Random,
        allocator: &LightSampleAllocator<'a>,
    ) -> Option<&'a LightSample<'a>>;

    fn environmental_light(&self) -> Option<&dyn EnvironmentalLight>;

    fn lights(&self) -> &[Arc<dyn Light>];
}

#[derive(Debug, Default)]
struct LightSet {
    lights: Vec<Arc<dyn Light>>,
    environment: Option<Arc<dyn EnvironmentalLight>>,
}

impl LightSet {
    fn new(mut lights: Vec<Arc<dyn Light>>, environment: Option<Arc<dyn EnvironmentalLight>>) -> Self {
        if let Some(env) = &environment {
            lights.push(env.clone().into_light());
        }
        Self { lights, environment }
    }

    fn environmental_light(&self) -> Option<&dyn EnvironmentalLight> {
        self.environment.as_deref()
    }
}

/// Visits every light.
#[derive(Debug)]
pub struct AllLightScene {
    set: LightSet,
}

impl AllLightScene {
    pub fn new(lights: Vec<Arc<dyn Light>>, environment: Option<Arc<dyn EnvironmentalLight>>) -> Self {
        Self { set: LightSet::new(lights, environment) }
    }
}

impl LightScene for AllLightScene {
    fn sample<'a>(
        &'a self,
        _hit_point: Point3f,
        _rng: &mut dyn Random,
        allocator: &LightSampleAllocator<'a>,
    ) -> Option<&'a LightSample<'a>> {
        // built back to front so the list keeps the scene order
        self.set
            .lights
            .iter()
            .rev()
            .fold(None, |next, light| Some(allocator.push(light.as_ref(), None, next)))
    }

    fn environmental_light(&self) -> Option<&dyn EnvironmentalLight> {
        self.set.environmental_light()
    }

    fn lights(&self) -> &[Arc<dyn Light>] {
        &self.set.lights
    }
}

/// Picks a single light uniformly.
#[derive(Debug)]
pub struct OneLightScene {
    set: LightSet,
}

impl OneLightScene {
    pub fn new(lights: Vec<Arc<dyn Light>>, environment: Option<Arc<dyn EnvironmentalLight>>) -> Self {
        Self { set: LightSet::new(lights, environment) }
    }
}

impl LightScene for OneLightScene {
    fn sample<'a>(
        &'a self,
        _hit_point: Point3f,
        rng: &mut dyn Random,
        allocator: &LightSampleAllocator<'a>,
    ) -> Option<&'a LightSample<'a>> {
        let mut sampler = Sampler::new(rng, 1);
        let n = self.set.lights.len();
        if n == 0 {
            return None;
        }
        let light = self.set.lights[sampler.next_index(n)].as_ref();
        let pdf = if n > 1 { Some(1.0 / n as Float) } else { None };
        Some(allocator.push(light, pdf, None))
    }

    fn environmental_light(&self) -> Option<&dyn EnvironmentalLight> {
        self.set.environmental_light()
    }

    fn lights(&self) -> &[Arc<dyn Light>] {
        &self.set.lights
    }
}

/// Picks a single light with probability proportional to its emitted power.
#[derive(Debug)]
pub struct PowerLightScene {
    set: LightSet,
    pdfs: Vec<Float>,
    cdf: Vec<Float>,
}

impl PowerLightScene {
    pub fn new(
        lights: Vec<Arc<dyn Light>>,
        environment: Option<Arc<dyn EnvironmentalLight>>,
        matcher: &dyn PowerMatcher,
        world_radius: Float,
    ) -> Self {
        let set = LightSet::new(lights, environment);
        let powers: Vec<Float> = set
            .lights
            .iter()
            .map(|l| l.power(matcher, world_radius).max(0.0))
            .collect();
        let total: Float = powers.iter().sum();
        let n = powers.len();

        let pdfs: Vec<Float> = if total > 0.0 && total.is_finite() {
            powers.iter().map(|p| p / total).collect()
        } else {
            // nothing to weight by
            vec![1.0 / n as Float; n]
        };
        let cdf = pdfs
            .iter()
            .scan(0.0, |acc, p| {
                *acc += p;
                Some(*acc)
            })
            .collect();

        debug!(lights = n, total_power = total, "built power light distribution");
        Self { set, pdfs, cdf }
    }

    pub fn pdfs(&self) -> &[Float] {
        &self.pdfs
    }
}

impl LightScene for PowerLightScene {
    fn sample<'a>(
        &'a self,
        _hit_point: Point3f,
        rng: &mut dyn Random,
        allocator: &LightSampleAllocator<'a>,
    ) -> Option<&'a LightSample<'a>> {
        let mut sampler = Sampler::new(rng, 1);
        let n = self.set.lights.len();
        if n == 0 {
            return None;
        }
        let u = sampler.next();
        let idx = self.cdf.partition_point(|&c| c <= u).min(n - 1);
        let pdf = if n > 1 { Some(self.pdfs[idx]) } else { None };
        Some(allocator.push(self.set.lights[idx].as_ref(), pdf, None))
    }

    fn environmental_light(&self) -> Option<&dyn EnvironmentalLight> {
        self.set.environmental_light()
    }

    fn lights(&self) -> &[Arc<dyn Light>] {
        &self.set.lights
    }
}

/// Builds the light scene named by `strategy`, one of `all`, `uniform` or `power`.
pub fn make_light_scene(
    strategy: &str,
    lights: Vec<Arc<dyn Light>>,
    environment: Option<Arc<dyn EnvironmentalLight>>,
    matcher: &dyn PowerMatcher,
    world_radius: Float,
) -> anyhow::Result<Box<dyn LightScene>> {
    let strategy: LightSamplingStrategy = strategy.parse().context("failed to build light scene")?;
    ensure!(
        world_radius >= 0.0 && world_radius.is_finite(),
        "scene radius must be finite and non-negative, got {}",
        world_radius
    );
    debug!(?strategy, lights = lights.len(), environment = environment.is_some(), "building light scene");

    let scene: Box<dyn LightScene> = match strategy {
        LightSamplingStrategy::All => Box::new(AllLightScene::new(lights, environment)),
        LightSamplingStrategy::Uniform => Box::new(OneLightScene::new(lights, environment)),
        LightSamplingStrategy::Power => Box::new(PowerLightScene::new(lights, environment, matcher, world_radius)),
    };
    Ok(scene)
}
