use crate::integrator::Scene;
use crate::light::{Light, LightSampleAllocator, VisibilityTester, LIGHT_SAMPLE_BUDGET};
use crate::random::{Random, Sampler};
use crate::reflection::bsdf::Bsdf;
use crate::reflection::BXDF_SAMPLE_BUDGET;
use crate::sampling::power_heuristic;
use crate::spectrum::{SpectralAllocator, Spectrum};
use crate::{abs_dot, Point3f, Ray, Vec3f};

/// Next-event estimation at a diffuse-capable surface point: radiance from the lights chosen by
/// the scene's light strategy, scattered by `bsdf` back along `-incoming`.
///
/// Takes the same number of draws from `rng` regardless of what is visible.
pub fn estimate_direct<'a>(
    bsdf: &Bsdf<'a>,
    incoming: Vec3f,
    hit_point: Point3f,
    scene: &Scene<'a>,
    rng: &mut dyn Random,
    allocator: &SpectralAllocator<'a>,
) -> Option<&'a dyn Spectrum> {
    let light_allocator = LightSampleAllocator::new(allocator.arena());
    let lights = scene.lights.sample(hit_point, rng, &light_allocator);

    let mut total = None;
    for sample in lights.into_iter().flat_map(|l| l.iter()) {
        let contribution = estimate_light(sample.light, bsdf, incoming, hit_point, scene.visibility, rng, allocator);
        let contribution = match sample.pdf {
            Some(pdf) if pdf > 0.0 => allocator.scale(contribution, 1.0 / pdf),
            Some(_) => None,
            None => contribution,
        };
        total = allocator.add(total, contribution);
    }
    total
}

/// One light sample and one BSDF sample, combined with the power heuristic.
fn estimate_light<'a>(
    light: &'a dyn Light,
    bsdf: &Bsdf<'a>,
    incoming: Vec3f,
    hit_point: Point3f,
    visibility: &dyn VisibilityTester,
    rng: &mut dyn Random,
    allocator: &SpectralAllocator<'a>,
) -> Option<&'a dyn Spectrum> {
    let light_sample = {
        let mut sampler = Sampler::new(rng, LIGHT_SAMPLE_BUDGET);
        light.sample(hit_point, &mut sampler, visibility, allocator)
    };
    // delta lights cannot be hit by a sampled direction
    let delta = matches!(light_sample, Some(s) if s.pdf.is_none());

    let from_light = light_sample.and_then(|ls| {
        let (reflector, bsdf_pdf) = bsdf.reflectance(incoming, ls.to_light, allocator)?;
        let weight = match ls.pdf {
            Some(light_pdf) if light_pdf > 0.0 => power_heuristic(light_pdf, bsdf_pdf) / light_pdf,
            Some(_) => return None,
            None => 1.0,
        };
        let cos = abs_dot(ls.to_light, bsdf.shading_normal());
        allocator.scale(allocator.reflect(Some(ls.emission), Some(reflector)), cos * weight)
    });

    let bsdf_sample = {
        let mut sampler = Sampler::new(rng, BXDF_SAMPLE_BUDGET);
        if delta {
            None
        } else {
            bsdf.sample(incoming, None, &mut sampler, allocator, true)
        }
    };
    let from_bsdf = bsdf_sample.and_then(|bs| {
        let bsdf_pdf = bs.pdf?;
        let emitted = light.emission(&Ray::new(hit_point, bs.direction), visibility, allocator)?;
        let weight = power_heuristic(bsdf_pdf, emitted.pdf) / bsdf_pdf;
        let cos = abs_dot(bs.direction, bsdf.shading_normal());
        allocator.scale(allocator.reflect(Some(emitted.emission), Some(bs.reflector)), cos * weight)
    });

    allocator.add(from_light, from_bsdf)
}
