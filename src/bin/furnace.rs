use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lumen::config::{LightSamplingStrategy, PathTracerConfig, RenderConfig, DEFAULT_CHUNK_WIDTH};
use lumen::integrator::{Hit, PathIntegrator, RayTracer, Scene};
use lumen::light::{make_light_scene, EnvironmentalLight, Light, PointLight, UniformEnvironmentLight, VisibilityTester};
use lumen::material::{MaterialGraph, MaterialId};
use lumen::random::{Random, XoshiroRandom};
use lumen::renderer::{PixelSampler, RenderProgress, Renderer};
use lumen::spectrum::{BasisColorMatcher, Reflector, Spectrum, UniformReflector, UniformSpectrum, VisiblePowerMatcher};
use lumen::{Float, Point3f, Ray, RayDifferential, Vec3f};

/// Renders a grey floor under a uniform white sky. Every pixel of the result converges to the
/// floor's albedo (plus the point light, if one is added).
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value_t = 64)]
    width: usize,

    #[arg(long, default_value_t = 64)]
    height: usize,

    #[arg(long, default_value_t = 16)]
    spp: usize,

    /// Reflectance of the floor
    #[arg(long, default_value_t = 0.5)]
    albedo: Float,

    /// Roughness of the floor in radians; zero is Lambertian
    #[arg(long, default_value_t = 0.0)]
    sigma: Float,

    /// Intensity of a point light above the centre of the image
    #[arg(long)]
    point_light: Option<Float>,

    /// One of: all, uniform, power
    #[arg(long, default_value_t = LightSamplingStrategy::Power)]
    light_sampling: LightSamplingStrategy,

    #[arg(long, default_value_t = 0.05)]
    min_termination_probability: Float,

    #[arg(long, default_value_t = 1.0)]
    roulette_threshold: Float,

    #[arg(long, default_value_t = 3)]
    min_bounces: u32,

    #[arg(long, default_value_t = 8)]
    max_bounces: u32,

    /// Worker threads, 0 for one per core
    #[arg(long, short = 'j', default_value_t = 0)]
    threads: usize,

    #[arg(long, default_value_t = DEFAULT_CHUNK_WIDTH)]
    chunk_width: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Args {
    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            integrator: PathTracerConfig {
                min_termination_probability: self.min_termination_probability,
                roulette_threshold: self.roulette_threshold,
                min_bounces: self.min_bounces,
                max_bounces: self.max_bounces,
            },
            light_sampling: self.light_sampling,
            threads: self.threads,
            chunk_width: self.chunk_width,
        }
    }
}

/// The plane z = 0, facing up.
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
        // nothing above the floor, and the floor hides everything below it
        ray.dir.z > 0.0 || ray.origin.z < 0.0
    }
}

/// Looks straight down onto the floor, one unit per pixel.
#[derive(Clone)]
struct TopDown {
    samples_per_pixel: usize,
}

impl PixelSampler for TopDown {
    fn samples_per_pixel(&self) -> usize {
        self.samples_per_pixel
    }

    fn sample(&mut self, x: usize, y: usize, _index: usize, rng: &mut dyn Random) -> Option<RayDifferential> {
        let origin = Point3f::new(x as Float + rng.next_float(), y as Float + rng.next_float(), 1.0);
        Some(RayDifferential::new(Ray::new(origin, Vec3f::new(0.0, 0.0, -1.0))))
    }

    fn replicate(&self) -> Box<dyn PixelSampler> {
        Box::new(self.clone())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = args.render_config();
    config.validate().context("invalid render configuration")?;

    let mut materials = MaterialGraph::new();
    let floor_reflector = UniformReflector::new(args.albedo).map(|r| Arc::new(r) as Arc<dyn Reflector>);
    let material = materials
        .matte(floor_reflector, args.sigma)
        .context("the floor needs a positive albedo")?;
    let floor = Floor { materials: &materials, material };

    let sky = UniformSpectrum::new(1.0).context("sky radiance")?;
    let environment: Arc<dyn EnvironmentalLight> = Arc::new(UniformEnvironmentLight::new(Arc::new(sky)));
    let mut lights: Vec<Arc<dyn Light>> = Vec::new();
    if let Some(intensity) = args.point_light {
        let spectrum = UniformSpectrum::new(intensity).context("point light intensity must be positive")?;
        let position = Point3f::new(args.width as Float / 2.0, args.height as Float / 2.0, 10.0);
        lights.push(Arc::new(PointLight::new(position, Arc::new(spectrum) as Arc<dyn Spectrum>)));
    }
    let world_radius = (args.width.max(args.height) as Float) * 2.0;
    let light_scene = make_light_scene(
        &config.light_sampling.to_string(),
        lights,
        Some(environment),
        &VisiblePowerMatcher,
        world_radius,
    )?;

    let scene = Scene::new(&floor, &floor, light_scene.as_ref());
    let integrator = PathIntegrator::new(config.integrator)?;
    let renderer = Renderer::from_config(&config)?;

    let total_chunks = (args.width + config.chunk_width - 1) / config.chunk_width * args.height;
    let bar = ProgressBar::new(total_chunks as u64);
    bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let report = |p: RenderProgress| bar.set_position(p.chunks_done as u64);

    let image = renderer.render(
        args.width,
        args.height,
        &scene,
        &integrator,
        &TopDown { samples_per_pixel: args.spp },
        &XoshiroRandom::new_with_seed(args.seed),
        &BasisColorMatcher::new(),
        None,
        Some(&report),
    );
    bar.finish();

    let n = image.pixels().len().max(1) as Float;
    let mut mean = [0.0; 3];
    for p in image.pixels() {
        mean.iter_mut().zip(p).for_each(|(m, v)| *m += v / n);
    }
    info!(r = mean[0], g = mean[1], b = mean[2], expected = args.albedo, "mean pixel value");
    println!("mean pixel value: {:.4} {:.4} {:.4}", mean[0], mean[1], mean[2]);
    Ok(())
}
