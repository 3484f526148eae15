use crate::spectrum::{rgb_basis, Spectrum, VISIBLE_MAX_WAVELENGTH, VISIBLE_MIN_WAVELENGTH};
use crate::Float;

/// Reduces an emission spectrum to a scalar power, used to weight lights against each other.
pub trait PowerMatcher: Send + Sync {
    fn match_power(&self, spectrum: &dyn Spectrum) -> Float;
}

/// Converts the estimate for one pixel sample into a colour triple.
pub trait ColorMatcher: Send + Sync {
    fn match_color(&self, spectrum: Option<&dyn Spectrum>) -> [Float; 3];
}

const INTEGRATION_STEPS: usize = 470;

fn integrate_visible(f: impl Fn(Float) -> Float) -> Float {
    // trapezoid rule on a 1nm grid
    let step = (VISIBLE_MAX_WAVELENGTH - VISIBLE_MIN_WAVELENGTH) / INTEGRATION_STEPS as Float;
    let mut sum = 0.5 * (f(VISIBLE_MIN_WAVELENGTH) + f(VISIBLE_MAX_WAVELENGTH));
    for i in 1..INTEGRATION_STEPS {
        sum += f(VISIBLE_MIN_WAVELENGTH + i as Float * step);
    }
    sum * step
}

/// Mean intensity over the visible range.
#[derive(Clone, Copy, Debug, Default)]
pub struct VisiblePowerMatcher;

impl PowerMatcher for VisiblePowerMatcher {
    fn match_power(&self, spectrum: &dyn Spectrum) -> Float {
        integrate_visible(|w| spectrum.intensity(w)) / (VISIBLE_MAX_WAVELENGTH - VISIBLE_MIN_WAVELENGTH)
    }
}

/// Projects spectra onto the same red/green/blue basis that colour-derived spectra are built
/// from, so a spectrum made from an RGB triple matches back to (approximately) that triple.
#[derive(Clone, Copy, Debug)]
pub struct BasisColorMatcher {
    basis_integrals: [Float; 3],
}

impl Default for BasisColorMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl BasisColorMatcher {
    pub fn new() -> Self {
        let basis_integrals = [
            integrate_visible(|w| rgb_basis(w)[0]),
            integrate_visible(|w| rgb_basis(w)[1]),
            integrate_visible(|w| rgb_basis(w)[2]),
        ];
        Self { basis_integrals }
    }
}

impl ColorMatcher for BasisColorMatcher {
    fn match_color(&self, spectrum: Option<&dyn Spectrum>) -> [Float; 3] {
        let spectrum = match spectrum {
            Some(s) => s,
            None => return [0.0; 3],
        };

        let mut rgb = [0.0; 3];
        for (c, value) in rgb.iter_mut().enumerate() {
            *value = integrate_visible(|w| spectrum.intensity(w) * rgb_basis(w)[c])
                / self.basis_integrals[c];
        }
        rgb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{RgbSpectrum, UniformSpectrum};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_uniform_power() {
        let s = UniformSpectrum::new(2.0).unwrap();
        assert_abs_diff_eq!(VisiblePowerMatcher.match_power(&s), 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_color_round_trip() {
        let matcher = BasisColorMatcher::new();
        let s = RgbSpectrum::new([0.8, 0.4, 0.1]).unwrap();
        let rgb = matcher.match_color(Some(&s));
        // the ramps overlap, so neighbouring channels bleed into each other a little
        assert_abs_diff_eq!(rgb[0], 0.8, epsilon = 0.1);
        assert_abs_diff_eq!(rgb[1], 0.4, epsilon = 0.1);
        assert_abs_diff_eq!(rgb[2], 0.1, epsilon = 0.1);
        assert_eq!(matcher.match_color(None), [0.0; 3]);
    }
}
