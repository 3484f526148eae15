use std::fmt::Debug;

use crate::arena::Arena;
use crate::Float;

pub mod matcher;
pub mod spectra;

pub use matcher::{BasisColorMatcher, ColorMatcher, PowerMatcher, VisiblePowerMatcher};
pub use spectra::*;

/// Shortest wavelength, in nanometers, considered part of the visible range.
pub const VISIBLE_MIN_WAVELENGTH: Float = 360.0;

/// Longest wavelength, in nanometers, considered part of the visible range.
pub const VISIBLE_MAX_WAVELENGTH: Float = 830.0;

const ALBEDO_SAMPLES: usize = 95;

/// Emitted radiant intensity as a function of wavelength.
pub trait Spectrum: Debug + Send + Sync {
    /// Non-negative intensity at `wavelength` nanometers.
    fn intensity(&self, wavelength: Float) -> Float;
}

/// Fraction of incident light reflected at each wavelength.
pub trait Reflector: Debug + Send + Sync {
    /// Reflectance in `[0, 1]` at `wavelength` nanometers.
    fn reflectance(&self, wavelength: Float) -> Float;

    /// Scalar summary of the reflector: its mean reflectance over the visible range.
    fn albedo(&self) -> Float {
        let step = (VISIBLE_MAX_WAVELENGTH - VISIBLE_MIN_WAVELENGTH) / (ALBEDO_SAMPLES - 1) as Float;
        let sum: Float = (0..ALBEDO_SAMPLES)
            .map(|i| self.reflectance(VISIBLE_MIN_WAVELENGTH + i as Float * step))
            .sum();
        sum / ALBEDO_SAMPLES as Float
    }
}

#[allow(clippy::excessive_precision)]
pub fn xyz_to_rgb(xyz: [Float; 3]) -> [Float; 3] {
    let mut rgb = [0.0; 3];
    rgb[0] = 3.240479 * xyz[0] - 1.537150 * xyz[1] - 0.498535 * xyz[2];
    rgb[1] = -0.969256 * xyz[0] + 1.875991 * xyz[1] + 0.041556 * xyz[2];
    rgb[2] = 0.055648 * xyz[0] - 0.204043 * xyz[1] + 1.057311 * xyz[2];
    rgb
}

#[allow(clippy::excessive_precision)]
pub fn rgb_to_xyz(rgb: [Float; 3]) -> [Float; 3] {
    let mut xyz = [0.0; 3];
    xyz[0] = 0.412453 * rgb[0] + 0.357580 * rgb[1] + 0.180423 * rgb[2];
    xyz[1] = 0.212671 * rgb[0] + 0.715160 * rgb[1] + 0.072169 * rgb[2];
    xyz[2] = 0.019334 * rgb[0] + 0.119193 * rgb[1] + 0.950227 * rgb[2];
    xyz
}

// Composite values produced by the allocator. They only borrow their operands, so they live
// exactly as long as the arena borrow they were allocated from.

#[derive(Debug)]
struct SumSpectrum<'a> {
    a: &'a dyn Spectrum,
    b: &'a dyn Spectrum,
}

impl Spectrum for SumSpectrum<'_> {
    fn intensity(&self, wavelength: Float) -> Float {
        self.a.intensity(wavelength) + self.b.intensity(wavelength)
    }
}

#[derive(Debug)]
struct ScaledSpectrum<'a> {
    s: &'a dyn Spectrum,
    k: Float,
}

impl Spectrum for ScaledSpectrum<'_> {
    fn intensity(&self, wavelength: Float) -> Float {
        self.k * self.s.intensity(wavelength)
    }
}

#[derive(Debug)]
struct ReflectedSpectrum<'a> {
    s: &'a dyn Spectrum,
    r: &'a dyn Reflector,
}

impl Spectrum for ReflectedSpectrum<'_> {
    fn intensity(&self, wavelength: Float) -> Float {
        self.s.intensity(wavelength) * self.r.reflectance(wavelength)
    }
}

#[derive(Debug)]
struct SumReflector<'a> {
    a: &'a dyn Reflector,
    b: &'a dyn Reflector,
    clamp: bool,
}

impl Reflector for SumReflector<'_> {
    fn reflectance(&self, wavelength: Float) -> Float {
        let sum = self.a.reflectance(wavelength) + self.b.reflectance(wavelength);
        if self.clamp {
            sum.min(1.0)
        } else {
            sum
        }
    }
}

#[derive(Debug)]
struct ScaledReflector<'a> {
    r: &'a dyn Reflector,
    k: Float,
    clamp: bool,
}

impl Reflector for ScaledReflector<'_> {
    fn reflectance(&self, wavelength: Float) -> Float {
        let value = self.k * self.r.reflectance(wavelength);
        if self.clamp {
            value.min(1.0)
        } else {
            value
        }
    }

    fn albedo(&self) -> Float {
        if self.clamp {
            (self.k * self.r.albedo()).min(1.0)
        } else {
            self.k * self.r.albedo()
        }
    }
}

/// Arena-backed algebra over spectra and reflectors.
///
/// `None` stands for "no contribution" throughout: it is the identity of `add` and absorbs
/// `scale` and `reflect`.
#[derive(Clone, Copy)]
pub struct SpectralAllocator<'a> {
    arena: &'a Arena,
}

impl<'a> SpectralAllocator<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    pub fn add(
        &self,
        a: Option<&'a dyn Spectrum>,
        b: Option<&'a dyn Spectrum>,
    ) -> Option<&'a dyn Spectrum> {
        match (a, b) {
            (Some(a), Some(b)) => {
                let sum: &'a dyn Spectrum = self.arena.alloc(SumSpectrum { a, b });
                Some(sum)
            }
            (a, None) => a,
            (None, b) => b,
        }
    }

    pub fn scale(&self, s: Option<&'a dyn Spectrum>, k: Float) -> Option<&'a dyn Spectrum> {
        let s = s?;
        if k == 0.0 {
            return None;
        }
        if k == 1.0 {
            return Some(s);
        }
        let scaled: &'a dyn Spectrum = self.arena.alloc(ScaledSpectrum { s, k });
        Some(scaled)
    }

    pub fn reflect(
        &self,
        s: Option<&'a dyn Spectrum>,
        r: Option<&'a dyn Reflector>,
    ) -> Option<&'a dyn Spectrum> {
        let (s, r) = (s?, r?);
        let reflected: &'a dyn Spectrum = self.arena.alloc(ReflectedSpectrum { s, r });
        Some(reflected)
    }

    /// Sum of two reflectors, evaluated with its result clamped to 1.
    pub fn add_reflectors(
        &self,
        a: Option<&'a dyn Reflector>,
        b: Option<&'a dyn Reflector>,
    ) -> Option<&'a dyn Reflector> {
        self.sum_reflectors(a, b, true)
    }

    /// Attenuates a reflector by `k`, which must lie in `[0, 1]`.
    pub fn scale_reflector(&self, r: Option<&'a dyn Reflector>, k: Float) -> Option<&'a dyn Reflector> {
        debug_assert!((0.0..=1.0).contains(&k), "reflector attenuation {} outside [0, 1]", k);
        self.scale_reflector_inner(r, k, true)
    }

    /// Like [`add_reflectors`](Self::add_reflectors) but allowed to exceed unit reflectance.
    pub fn unbounded_add(
        &self,
        a: Option<&'a dyn Reflector>,
        b: Option<&'a dyn Reflector>,
    ) -> Option<&'a dyn Reflector> {
        self.sum_reflectors(a, b, false)
    }

    /// Like [`scale_reflector`](Self::scale_reflector) but accepts any non-negative `k`.
    pub fn unbounded_scale(&self, r: Option<&'a dyn Reflector>, k: Float) -> Option<&'a dyn Reflector> {
        debug_assert!(k >= 0.0, "negative reflector scale {}", k);
        self.scale_reflector_inner(r, k, false)
    }

    fn sum_reflectors(
        &self,
        a: Option<&'a dyn Reflector>,
        b: Option<&'a dyn Reflector>,
        clamp: bool,
    ) -> Option<&'a dyn Reflector> {
        match (a, b) {
            (Some(a), Some(b)) => {
                let sum: &'a dyn Reflector = self.arena.alloc(SumReflector { a, b, clamp });
                Some(sum)
            }
            (a, None) => a,
            (None, b) => b,
        }
    }

    fn scale_reflector_inner(
        &self,
        r: Option<&'a dyn Reflector>,
        k: Float,
        clamp: bool,
    ) -> Option<&'a dyn Reflector> {
        let r = r?;
        if k <= 0.0 {
            return None;
        }
        if k == 1.0 {
            return Some(r);
        }
        let scaled: &'a dyn Reflector = self.arena.alloc(ScaledReflector { r, k, clamp });
        Some(scaled)
    }
}

/// Compares the data addresses of two trait objects, ignoring their vtables.
pub fn same_value<T: ?Sized>(a: &T, b: &T) -> bool {
    std::ptr::eq(a as *const T as *const u8, b as *const T as *const u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn constant(v: Float) -> UniformSpectrum {
        UniformSpectrum::new(v).unwrap()
    }

    fn grey(v: Float) -> UniformReflector {
        UniformReflector::new(v).unwrap()
    }

    #[test]
    fn test_scale_identity_and_zero() {
        let arena = Arena::new();
        let alloc = SpectralAllocator::new(&arena);
        let s = constant(2.0);
        let r = grey(0.5);

        let before = arena.allocated_bytes();
        let scaled = alloc.scale(Some(&s), 1.0).unwrap();
        assert!(same_value::<dyn Spectrum>(scaled, &s));
        let scaled_r = alloc.scale_reflector(Some(&r), 1.0).unwrap();
        assert!(same_value::<dyn Reflector>(scaled_r, &r));
        let unbounded_r = alloc.unbounded_scale(Some(&r), 1.0).unwrap();
        assert!(same_value::<dyn Reflector>(unbounded_r, &r));
        assert_eq!(arena.allocated_bytes(), before);

        assert!(alloc.scale(Some(&s), 0.0).is_none());
        assert!(alloc.scale_reflector(Some(&r), 0.0).is_none());
        assert!(alloc.unbounded_scale(Some(&r), 0.0).is_none());
        assert!(alloc.scale(None, 3.0).is_none());
    }

    #[test]
    fn test_add_with_absent_operands() {
        let arena = Arena::new();
        let alloc = SpectralAllocator::new(&arena);
        let a = constant(1.0);
        let b = constant(0.25);

        assert!(alloc.add(None, None).is_none());
        assert!(same_value::<dyn Spectrum>(alloc.add(Some(&a), None).unwrap(), &a));
        assert!(same_value::<dyn Spectrum>(alloc.add(None, Some(&b)).unwrap(), &b));
        let sum = alloc.add(Some(&a), Some(&b)).unwrap();
        assert_abs_diff_eq!(sum.intensity(550.0), 1.25);
    }

    #[test]
    fn test_reflect_and_scale() {
        let arena = Arena::new();
        let alloc = SpectralAllocator::new(&arena);
        let s = constant(4.0);
        let r = grey(0.25);

        let reflected = alloc.reflect(Some(&s), Some(&r)).unwrap();
        assert_abs_diff_eq!(reflected.intensity(500.0), 1.0);
        assert!(alloc.reflect(None, Some(&r)).is_none());
        assert!(alloc.reflect(Some(&s), None).is_none());

        let scaled = alloc.scale(Some(reflected), 3.0).unwrap();
        assert_abs_diff_eq!(scaled.intensity(500.0), 3.0);
    }

    #[test]
    fn test_bounded_and_unbounded_reflectors() {
        let arena = Arena::new();
        let alloc = SpectralAllocator::new(&arena);
        let a = grey(0.75);
        let b = grey(0.5);

        let bounded = alloc.add_reflectors(Some(&a), Some(&b)).unwrap();
        assert_abs_diff_eq!(bounded.reflectance(600.0), 1.0);
        let unbounded = alloc.unbounded_add(Some(&a), Some(&b)).unwrap();
        assert_abs_diff_eq!(unbounded.reflectance(600.0), 1.25);
        let doubled = alloc.unbounded_scale(Some(&a), 2.0).unwrap();
        assert_abs_diff_eq!(doubled.reflectance(600.0), 1.5);
        assert_abs_diff_eq!(doubled.albedo(), 1.5);
        let halved = alloc.scale_reflector(Some(&a), 0.5).unwrap();
        assert_abs_diff_eq!(halved.albedo(), 0.375);
    }

    #[test]
    fn test_default_albedo_is_mean_reflectance() {
        let arena = Arena::new();
        let alloc = SpectralAllocator::new(&arena);
        let a = grey(0.2);
        let b = grey(0.3);
        let sum = alloc.add_reflectors(Some(&a), Some(&b)).unwrap();
        assert_abs_diff_eq!(sum.albedo(), 0.5, epsilon = 1e-5);
    }
}
