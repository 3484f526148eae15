use std::sync::Arc;

use approx::assert_abs_diff_eq;
use cgmath::InnerSpace;

use lumen::config::PathTracerConfig;
use lumen::integrator::{Hit, Integrator, PathIntegrator, RayTracer, Scene};
use lumen::light::{make_light_scene, EnvironmentalLight, LightScene, UniformEnvironmentLight, VisibilityTester};
use lumen::material::{MaterialGraph, MaterialId};
use lumen::random::{Random, XoshiroRandom};
use lumen::renderer::{Framebuffer, PixelSampler, Renderer};
use lumen::spectrum::{BasisColorMatcher, Reflector, UniformReflector, UniformSpectrum, VisiblePowerMatcher};
use lumen::{Float, Point3f, Ray, RayDifferential, Vec3f};

struct Floor<'s> {
    materials: &'s MaterialGraph,
    material: MaterialId,
}

impl RayTracer for Floor<'_> {
    fn trace(&self, ray: &Ray) -> Option<Hit<'_>> {
        if ray.origin.z <= 0.0 || ray.dir.z >= 0.0 {
            return None;
        }
        let t = -ray.origin.z / ray.dir.z;
        let n = Vec3f::new(0.0, 0.0, 1.0);
        Some(Hit {
            bxdf: Some(self.materials.get(self.material)),
            emission: None,
            point: ray.at(t),
            surface_normal: n,
            shading_normal: n,
        })
    }
}

impl VisibilityTester for Floor<'_> {
    fn visible(&self, ray: &Ray, _max_distance: Float) -> bool {
        ray.dir.z > 0.0 || ray.origin.z < 0.0
    }
}

#[derive(Clone)]
struct Oblique {
    spp: usize,
}

impl PixelSampler for Oblique {
    fn samples_per_pixel(&self) -> usize {
        self.spp
    }

    fn sample(&mut self, x: usize, y: usize, _index: usize, rng: &mut dyn Random) -> Option<RayDifferential> {
        let origin = Point3f::new(x as Float + rng.next_float(), y as Float + rng.next_float(), 2.0);
        Some(RayDifferential::new(Ray::new(origin, Vec3f::new(0.2, -0.1, -1.0).normalize())))
    }

    fn replicate(&self) -> Box<dyn PixelSampler> {
        Box::new(self.clone())
    }
}

fn grey(albedo: Float) -> Option<Arc<dyn Reflector>> {
    UniformReflector::new(albedo).map(|r| Arc::new(r) as Arc<dyn Reflector>)
}

fn sky(strategy: &str) -> anyhow::Result<Box<dyn LightScene>> {
    let radiance = UniformSpectrum::new(1.0).ok_or_else(|| anyhow::anyhow!("sky"))?;
    let env: Arc<dyn EnvironmentalLight> = Arc::new(UniformEnvironmentLight::new(Arc::new(radiance)));
    make_light_scene(strategy, vec![], Some(env), &VisiblePowerMatcher, 10.0)
}

fn render(materials: &MaterialGraph, material: MaterialId, strategy: &str, spp: usize) -> anyhow::Result<Framebuffer> {
    let floor = Floor { materials, material };
    let lights = sky(strategy)?;
    let scene = Scene::new(&floor, &floor, lights.as_ref());
    let integrator = PathIntegrator::new(PathTracerConfig::default())?;
    let renderer = Renderer::new(2, 4)?;
    Ok(renderer.render(
        8,
        4,
        &scene,
        &integrator,
        &Oblique { spp },
        &XoshiroRandom::new_with_seed(1),
        &BasisColorMatcher::new(),
        None,
        None,
    ))
}

fn mean(image: &Framebuffer) -> [Float; 3] {
    let n = image.pixels().len() as Float;
    let mut mean = [0.0; 3];
    for p in image.pixels() {
        mean.iter_mut().zip(p).for_each(|(m, v)| *m += v / n);
    }
    mean
}

#[test]
fn diffuse_floor_converges_to_albedo() -> anyhow::Result<()> {
    for strategy in ["all", "uniform", "power"] {
        let mut materials = MaterialGraph::new();
        let floor = materials.matte(grey(0.5), 0.0).ok_or_else(|| anyhow::anyhow!("floor"))?;
        let image = render(&materials, floor, strategy, 64)?;
        for c in mean(&image) {
            assert_abs_diff_eq!(c, 0.5, epsilon = 0.03);
        }
    }
    Ok(())
}

#[test]
fn mirror_floor_reflects_sky_exactly() -> anyhow::Result<()> {
    let mut materials = MaterialGraph::new();
    let floor = materials.mirror(grey(0.5)).ok_or_else(|| anyhow::anyhow!("floor"))?;
    let image = render(&materials, floor, "power", 4)?;
    for p in image.pixels() {
        for &c in p {
            assert_abs_diff_eq!(c, 0.5, epsilon = 1e-4);
        }
    }
    Ok(())
}

#[test]
fn single_sample_matches_direct_call() -> anyhow::Result<()> {
    let mut materials = MaterialGraph::new();
    let floor_id = materials.mirror(grey(0.25)).ok_or_else(|| anyhow::anyhow!("floor"))?;
    let floor = Floor { materials: &materials, material: floor_id };
    let lights = sky("all")?;
    let scene = Scene::new(&floor, &floor, lights.as_ref());

    let mut integrator = PathIntegrator::new(PathTracerConfig::default())?;
    let arena = lumen::arena::Arena::new();
    let mut rng = XoshiroRandom::new_with_seed(9);
    let ray = RayDifferential::new(Ray::new(Point3f::new(0.0, 0.0, 1.0), Vec3f::new(0.0, 0.0, -1.0)));
    let radiance = integrator.integrate(&ray, &scene, &mut rng, &arena);
    let value = radiance.map(|s| s.intensity(550.0)).unwrap_or(0.0);
    assert_abs_diff_eq!(value, 0.25, epsilon = 1e-5);
    Ok(())
}
