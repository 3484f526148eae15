use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{ensure, Context};
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use crate::arena::Arena;
use crate::config::RenderConfig;
use crate::integrator::{Integrator, Scene};
use crate::random::Random;
use crate::spectrum::ColorMatcher;
use crate::{Float, RayDifferential};

/// Camera rays for each sample of each pixel.
pub trait PixelSampler: Send + Sync {
    fn samples_per_pixel(&self) -> usize;

    /// Ray for sample `index` of pixel `(x, y)`, or `None` if the camera produces nothing there.
    fn sample(&mut self, x: usize, y: usize, index: usize, rng: &mut dyn Random) -> Option<RayDifferential>;

    fn replicate(&self) -> Box<dyn PixelSampler>;
}

/// Row-major grid of colour triples.
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<[Float; 3]>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![[0.0; 3]; width * height] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> [Float; 3] {
        self.pixels[y * self.width + x]
    }

    pub fn pixels(&self) -> &[[Float; 3]] {
        &self.pixels
    }

    fn write_run(&mut self, x: usize, y: usize, run: &[[Float; 3]]) {
        let start = y * self.width + x;
        self.pixels[start..start + run.len()].copy_from_slice(run);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderProgress {
    pub chunks_done: usize,
    pub total_chunks: usize,
    pub pixels_done: usize,
    /// Pixels not skipped.
    pub total_pixels: usize,
}

pub type SkipPredicate<'f> = &'f (dyn Fn(usize, usize) -> bool + Sync);
pub type ProgressCallback<'f> = &'f (dyn Fn(RenderProgress) + Sync);

/// Runs an integrator over an image on a fixed pool of worker threads.
///
/// Work is handed out as runs of `chunk_width` pixels of one row through a shared counter.
/// Every worker owns its arena and replicas of the random stream, the pixel sampler and the
/// integrator, and keeps its finished runs until all workers return. Each pixel restarts the
/// random stream at its own index, so the image does not depend on which worker rendered which
/// pixel.
pub struct Renderer {
    pool: ThreadPool,
    chunk_width: usize,
}

struct Progress {
    chunks_done: usize,
    pixels_done: usize,
}

impl Renderer {
    /// `threads == 0` uses one thread per core.
    pub fn new(threads: usize, chunk_width: usize) -> anyhow::Result<Self> {
        ensure!(chunk_width > 0, "chunk width must be positive");
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("render-{}", i))
            .build()
            .context("failed to build render thread pool")?;
        Ok(Self { pool, chunk_width })
    }

    pub fn from_config(config: &RenderConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Self::new(config.threads, config.chunk_width)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        width: usize,
        height: usize,
        scene: &Scene<'_>,
        integrator: &dyn Integrator,
        pixel_sampler: &dyn PixelSampler,
        rng: &dyn Random,
        matcher: &dyn ColorMatcher,
        skip: Option<SkipPredicate<'_>>,
        progress: Option<ProgressCallback<'_>>,
    ) -> Framebuffer {
        let chunk_width = self.chunk_width;
        let chunks_per_row = (width + chunk_width - 1) / chunk_width;
        let total_chunks = chunks_per_row * height;
        let is_skipped = |x: usize, y: usize| skip.map_or(false, |f| f(x, y));
        let total_pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .filter(|&(x, y)| !is_skipped(x, y))
            .count();

        info!(width, height, threads = self.threads(), total_pixels, "starting render");
        let start = Instant::now();

        let next_chunk = AtomicUsize::new(0);
        let done = Mutex::new(Progress { chunks_done: 0, pixels_done: 0 });

        let finished = self.pool.broadcast(|_| {
            let mut arena = Arena::new();
            let mut rng = rng.replicate();
            let mut sampler = pixel_sampler.replicate();
            let mut integrator = integrator.duplicate();
            let samples_per_pixel = sampler.samples_per_pixel();
            let mut runs = Vec::new();

            loop {
                let chunk = next_chunk.fetch_add(1, Ordering::Relaxed);
                if chunk >= total_chunks {
                    break;
                }
                let y = chunk / chunks_per_row;
                let x0 = (chunk % chunks_per_row) * chunk_width;
                let x1 = (x0 + chunk_width).min(width);

                let mut run = Vec::with_capacity(x1 - x0);
                let mut rendered = 0;
                for x in x0..x1 {
                    if is_skipped(x, y) {
                        run.push([0.0; 3]);
                        continue;
                    }
                    rendered += 1;
                    rng.set_stream((y * width + x) as u64);

                    let mut color = [0.0; 3];
                    for i in 0..samples_per_pixel {
                        if let Some(ray) = sampler.sample(x, y, i, rng.as_mut()) {
                            let radiance = integrator.integrate(&ray, scene, rng.as_mut(), &arena);
                            let rgb = matcher.match_color(radiance);
                            color.iter_mut().zip(rgb).for_each(|(c, v)| *c += v);
                        }
                        arena.clear();
                    }
                    if samples_per_pixel > 0 {
                        color.iter_mut().for_each(|c| *c /= samples_per_pixel as Float);
                    }
                    run.push(color);
                }

                runs.push((x0, y, run));

                let mut done = done.lock();
                done.chunks_done += 1;
                done.pixels_done += rendered;
                if let Some(callback) = progress {
                    callback(RenderProgress {
                        chunks_done: done.chunks_done,
                        total_chunks,
                        pixels_done: done.pixels_done,
                        total_pixels,
                    });
                }
            }
            integrator.finish();
            runs
        });

        let mut framebuffer = Framebuffer::new(width, height);
        for (x0, y, run) in finished.iter().flatten() {
            framebuffer.write_run(*x0, *y, run);
        }
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "render finished");
        framebuffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathTracerConfig;
    use crate::integrator::{Hit, PathIntegrator, RayTracer};
    use crate::light::tests::EmptySpace;
    use crate::light::{AllLightScene, EnvironmentalLight, UniformEnvironmentLight};
    use crate::random::XoshiroRandom;
    use crate::reflection::tests::grey;
    use crate::reflection::Bxdf;
    use crate::spectrum::{BasisColorMatcher, UniformSpectrum};
    use crate::{Point2f, Point3f, Ray, Vec3f};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    /// The plane z = 0, seen from above.
    struct Floor<'s> {
        bxdf: &'s Bxdf,
    }

    impl RayTracer for Floor<'_> {
        fn trace(&self, ray: &Ray) -> Option<Hit<'_>> {
            if ray.origin.z <= 0.0 || ray.dir.z >= 0.0 {
                return None;
            }
            let t = -ray.origin.z / ray.dir.z;
            let n = Vec3f::new(0.0, 0.0, 1.0);
            Some(Hit { bxdf: Some(self.bxdf), emission: None, point: ray.at(t), surface_normal: n, shading_normal: n })
        }
    }

    /// Looks straight down from above each pixel, jittered within it.
    #[derive(Clone)]
    struct Orthographic {
        spp: usize,
    }

    impl PixelSampler for Orthographic {
        fn samples_per_pixel(&self) -> usize {
            self.spp
        }

        fn sample(&mut self, x: usize, y: usize, _index: usize, rng: &mut dyn Random) -> Option<RayDifferential> {
            let jitter = Point2f::new(rng.next_float(), rng.next_float());
            let origin = Point3f::new(x as Float + jitter.x, y as Float + jitter.y, 1.0);
            Some(RayDifferential::new(Ray::new(origin, Vec3f::new(0.0, 0.0, -1.0))))
        }

        fn replicate(&self) -> Box<dyn PixelSampler> {
            Box::new(self.clone())
        }
    }

    fn render_floor(threads: usize, skip: Option<SkipPredicate<'_>>, progress: Option<ProgressCallback<'_>>) -> Framebuffer {
        let bxdf = Bxdf::lambertian(grey(0.5)).unwrap();
        let tracer = Floor { bxdf: &bxdf };
        let env: Arc<dyn EnvironmentalLight> =
            Arc::new(UniformEnvironmentLight::new(Arc::new(UniformSpectrum::new(1.0).unwrap())));
        let lights = AllLightScene::new(vec![], Some(env));
        let scene = Scene::new(&tracer, &EmptySpace, &lights);
        let integrator = PathIntegrator::new(PathTracerConfig::default()).unwrap();

        let renderer = Renderer::new(threads, 3).unwrap();
        renderer.render(
            7,
            2,
            &scene,
            &integrator,
            &Orthographic { spp: 16 },
            &XoshiroRandom::new_with_seed(5),
            &BasisColorMatcher::new(),
            skip,
            progress,
        )
    }

    #[test]
    fn test_image_independent_of_thread_count() {
        let single = render_floor(1, None, None);
        let parallel = render_floor(4, None, None);
        assert_eq!(single, parallel);
        assert!(parallel.pixels().iter().all(|p| p.iter().all(|&c| c > 0.0)));
        let mean: Float = single.pixels().iter().map(|p| p[1]).sum::<Float>() / 14.0;
        assert_abs_diff_eq!(mean, 0.5, epsilon = 0.1);
    }

    #[test]
    fn test_progress_and_skip() {
        let reports = Mutex::new(Vec::new());
        let record = |p: RenderProgress| reports.lock().push(p);
        let skip_first_column = |x: usize, _y: usize| x == 0;
        let image = render_floor(2, Some(&skip_first_column), Some(&record));

        let reports = reports.into_inner();
        // 7 pixels in runs of 3 is 3 chunks per row
        assert_eq!(reports.len(), 6);
        assert!(reports.windows(2).all(|w| w[0].chunks_done < w[1].chunks_done));
        let last = reports[reports.len() - 1];
        assert_eq!(last.chunks_done, 6);
        assert_eq!(last.total_pixels, 12);
        assert_eq!(last.pixels_done, 12);
        assert_eq!(image.get(0, 1), [0.0; 3]);
        assert!(image.get(1, 1)[0] > 0.0);
    }

    #[test]
    fn test_rejects_zero_chunk_width() {
        assert!(Renderer::new(1, 0).is_err());
    }
}
