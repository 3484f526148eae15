use smallvec::SmallVec;
use tracing::debug;

use crate::arena::Arena;
use crate::config::PathTracerConfig;
use crate::integrator::direct_lighting::estimate_direct;
use crate::integrator::{russian_roulette, Integrator, Scene};
use crate::random::{Random, Sampler};
use crate::reflection::bsdf::Bsdf;
use crate::reflection::BXDF_SAMPLE_BUDGET;
use crate::spectrum::{Reflector, SpectralAllocator, Spectrum};
use crate::{abs_dot, DirectionDifferentials, Float, RayDifferential};

/// Counters kept by one worker's integrator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathStats {
    pub paths: u64,
    pub bounces: u64,
    pub roulette_terminations: u64,
}

/// Unidirectional path tracer with next-event estimation and Russian roulette.
///
/// A path is traced to its end first, recording the emission seen at every vertex and the
/// reflector and attenuation of every bounce; the estimate is then folded back to front.
#[derive(Clone, Debug)]
pub struct PathIntegrator {
    config: PathTracerConfig,
    stats: PathStats,
}

impl PathIntegrator {
    pub fn new(config: PathTracerConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { config, stats: PathStats::default() })
    }

    pub fn config(&self) -> &PathTracerConfig {
        &self.config
    }

    pub fn stats(&self) -> PathStats {
        self.stats
    }
}

impl Integrator for PathIntegrator {
    fn integrate<'a>(
        &mut self,
        ray: &RayDifferential,
        scene: &Scene<'a>,
        rng: &mut dyn Random,
        arena: &'a Arena,
    ) -> Option<&'a dyn Spectrum> {
        let allocator = SpectralAllocator::new(arena);
        let mut bounces: SmallVec<[(&'a dyn Reflector, Float); 8]> = SmallVec::new();
        let mut spectra: SmallVec<[Option<&'a dyn Spectrum>; 9]> = SmallVec::new();

        let mut trace_ray = *ray;
        let mut bounce_count = 0;
        let mut path_throughput: Float = 1.0;
        let mut add_light_emissions = true;
        self.stats.paths += 1;

        loop {
            let hit = match scene.tracer.trace(&trace_ray.ray) {
                Some(hit) => hit,
                None => {
                    let escaped = if add_light_emissions {
                        scene
                            .lights
                            .environmental_light()
                            .and_then(|env| env.escaped(trace_ray.ray.dir, &allocator))
                    } else {
                        None
                    };
                    spectra.push(escaped);
                    break;
                }
            };

            spectra.push(if add_light_emissions { hit.emission } else { None });

            let bxdf = match hit.bxdf {
                Some(bxdf) => bxdf,
                None => break,
            };
            let bsdf = Bsdf::new(bxdf, hit.surface_normal, hit.shading_normal, true);
            let incoming = trace_ray.ray.dir;
            let differentials = trace_ray.diff.map(|d| DirectionDifferentials { dx: d.rx_dir, dy: d.ry_dir });

            let sample = {
                let mut sampler = Sampler::new(rng, BXDF_SAMPLE_BUDGET);
                bsdf.sample(incoming, differentials.as_ref(), &mut sampler, &allocator, false)
            };

            if bsdf.is_diffuse().is_some() {
                let direct = estimate_direct(&bsdf, incoming, hit.point, scene, rng, &allocator);
                if let Some(slot) = spectra.last_mut() {
                    *slot = allocator.add(*slot, direct);
                }
            }

            let sample = match sample {
                Some(sample) => sample,
                None => break,
            };
            // emission found by a diffuse bounce was already counted by next-event estimation
            add_light_emissions = sample.pdf.is_none();

            if bounce_count == self.config.max_bounces {
                break;
            }

            let mut attenuation = match sample.pdf {
                Some(pdf) => abs_dot(bsdf.shading_normal(), sample.direction) / pdf,
                None => 1.0,
            };
            path_throughput *= sample.reflector.albedo() * attenuation;
            trace_ray = RayDifferential::spawn(hit.point, sample.direction, sample.differentials);
            bounce_count += 1;
            self.stats.bounces += 1;

            if bounce_count > self.config.min_bounces {
                match russian_roulette(path_throughput, &self.config, rng) {
                    Some(survival) => {
                        path_throughput /= survival;
                        attenuation /= survival;
                    }
                    None => {
                        self.stats.roulette_terminations += 1;
                        break;
                    }
                }
            }
            bounces.push((sample.reflector, attenuation));
        }

        debug_assert_eq!(spectra.len(), bounces.len() + 1, "unbalanced path stacks");
        let mut result = spectra.pop().flatten();
        while let Some((reflector, attenuation)) = bounces.pop() {
            let scattered = allocator.reflect(allocator.scale(result, attenuation), Some(reflector));
            result = allocator.add(spectra.pop().flatten(), scattered);
        }
        result
    }

    fn duplicate(&self) -> Box<dyn Integrator> {
        Box::new(Self { config: self.config, stats: PathStats::default() })
    }

    fn finish(&self) {
        debug!(
            paths = self.stats.paths,
            bounces = self.stats.bounces,
            roulette_terminations = self.stats.roulette_terminations,
            "path integrator finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::tests::ScriptedTracer;
    use crate::integrator::Hit;
    use crate::light::tests::EmptySpace;
    use crate::light::{AllLightScene, EnvironmentalLight, UniformEnvironmentLight};
    use crate::random::tests::SequenceRandom;
    use crate::reflection::tests::grey;
    use crate::reflection::Bxdf;
    use crate::spectrum::UniformSpectrum;
    use crate::{Point3f, Ray, Vec3f};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn hit<'s>(bxdf: Option<&'s Bxdf>, emission: Option<&'s dyn Spectrum>) -> Hit<'s> {
        let n = Vec3f::new(0.0, 0.0, 1.0);
        Hit { bxdf, emission, point: Point3f::new(0.0, 0.0, 0.0), surface_normal: n, shading_normal: n }
    }

    fn camera_ray() -> RayDifferential {
        RayDifferential::new(Ray::new(Point3f::new(0.0, 0.0, 1.0), Vec3f::new(0.0, 0.0, -1.0)))
    }

    fn one_bounce() -> PathTracerConfig {
        PathTracerConfig { min_bounces: 1, max_bounces: 1, ..Default::default() }
    }

    #[test]
    fn test_mirror_into_emitter() {
        let mirror = Bxdf::mirror(grey(0.5)).unwrap();
        let emitter = UniformSpectrum::new(1.0).unwrap();
        let tracer = ScriptedTracer::new(vec![hit(Some(&mirror), None), hit(None, Some(&emitter))]);
        let lights = AllLightScene::new(vec![], None);
        let scene = Scene::new(&tracer, &EmptySpace, &lights);

        let mut integrator = PathIntegrator::new(one_bounce()).unwrap();
        let arena = Arena::new();
        let mut rng = SequenceRandom::new(vec![0.5]);
        let radiance = integrator.integrate(&camera_ray(), &scene, &mut rng, &arena).unwrap();

        assert_abs_diff_eq!(radiance.intensity(550.0), 0.5, epsilon = 1e-6);
        assert_eq!(tracer.traced(), 2);
        assert_eq!(integrator.stats(), PathStats { paths: 1, bounces: 1, roulette_terminations: 0 });
    }

    #[test]
    fn test_escape_after_specular_sees_environment() {
        let mirror = Bxdf::mirror(grey(0.5)).unwrap();
        let tracer = ScriptedTracer::new(vec![hit(Some(&mirror), None)]);
        let env: Arc<dyn EnvironmentalLight> =
            Arc::new(UniformEnvironmentLight::new(Arc::new(UniformSpectrum::new(2.0).unwrap())));
        let lights = AllLightScene::new(vec![], Some(env));
        let scene = Scene::new(&tracer, &EmptySpace, &lights);

        let mut integrator = PathIntegrator::new(one_bounce()).unwrap();
        let arena = Arena::new();
        let mut rng = SequenceRandom::new(vec![0.5]);
        let radiance = integrator.integrate(&camera_ray(), &scene, &mut rng, &arena).unwrap();
        assert_abs_diff_eq!(radiance.intensity(600.0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_max_bounces_stops_before_scattering() {
        let mirror = Bxdf::mirror(grey(0.5)).unwrap();
        let emitter = UniformSpectrum::new(1.0).unwrap();
        let tracer = ScriptedTracer::new(vec![hit(Some(&mirror), Some(&emitter)), hit(None, Some(&emitter))]);
        let lights = AllLightScene::new(vec![], None);
        let scene = Scene::new(&tracer, &EmptySpace, &lights);

        let config = PathTracerConfig { min_bounces: 0, max_bounces: 0, ..Default::default() };
        let mut integrator = PathIntegrator::new(config).unwrap();
        let arena = Arena::new();
        let mut rng = SequenceRandom::new(vec![0.5]);
        let radiance = integrator.integrate(&camera_ray(), &scene, &mut rng, &arena).unwrap();
        assert_abs_diff_eq!(radiance.intensity(550.0), 1.0, epsilon = 1e-6);
        assert_eq!(tracer.traced(), 1);
    }

    #[test]
    fn test_roulette_reweights_survivors() {
        // a dim mirror keeps the throughput below the threshold
        let mirror = Bxdf::mirror(grey(0.5)).unwrap();
        let emitter = UniformSpectrum::new(1.0).unwrap();
        let scene_hits = vec![hit(Some(&mirror), None), hit(None, Some(&emitter))];
        let lights = AllLightScene::new(vec![], None);
        let config = PathTracerConfig { min_bounces: 0, max_bounces: 1, ..Default::default() };

        // survives with probability 0.5
        let tracer = ScriptedTracer::new(scene_hits.clone());
        let scene = Scene::new(&tracer, &EmptySpace, &lights);
        let mut integrator = PathIntegrator::new(config).unwrap();
        let arena = Arena::new();
        let mut rng = SequenceRandom::new(vec![0.75]);
        let radiance = integrator.integrate(&camera_ray(), &scene, &mut rng, &arena).unwrap();
        assert_abs_diff_eq!(radiance.intensity(550.0), 1.0, epsilon = 1e-6);

        let tracer = ScriptedTracer::new(scene_hits);
        let scene = Scene::new(&tracer, &EmptySpace, &lights);
        let mut rng = SequenceRandom::new(vec![0.25]);
        assert!(integrator.integrate(&camera_ray(), &scene, &mut rng, &arena).is_none());
        assert_eq!(integrator.stats().roulette_terminations, 1);
        assert_eq!(integrator.stats().paths, 2);
    }
}
