use crate::spectrum::{xyz_to_rgb, Reflector, Spectrum};
use crate::{lerp, Float};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformSpectrum {
    intensity: Float,
}

impl UniformSpectrum {
    /// `None` unless the intensity is positive and finite.
    pub fn new(intensity: Float) -> Option<Self> {
        if intensity > 0.0 && intensity.is_finite() {
            Some(Self { intensity })
        } else {
            None
        }
    }
}

impl Spectrum for UniformSpectrum {
    fn intensity(&self, _wavelength: Float) -> Float {
        self.intensity
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformReflector {
    reflectance: Float,
}

impl UniformReflector {
    /// `None` for non-positive reflectance; values above 1 are clamped.
    pub fn new(reflectance: Float) -> Option<Self> {
        if reflectance > 0.0 && !reflectance.is_nan() {
            Some(Self { reflectance: reflectance.min(1.0) })
        } else {
            None
        }
    }
}

impl Reflector for UniformReflector {
    fn reflectance(&self, _wavelength: Float) -> Float {
        self.reflectance
    }

    fn albedo(&self) -> Float {
        self.reflectance
    }
}

/// Planck's law for a blackbody at `temperature` kelvin, `wavelength` in nanometers.
pub fn blackbody(wavelength: Float, temperature: Float) -> Float {
    if temperature <= 0.0 {
        return 0.0;
    }

    const C: f64 = 299_792_458.0;
    const H: f64 = 6.626_070_15e-34;
    const K_B: f64 = 1.380_649e-23;

    // work in f64, the intermediate powers underflow f32
    let l = wavelength as f64 * 1.0e-9;
    let t = temperature as f64;
    let radiance = (2.0 * H * C * C) / (l.powi(5) * (((H * C) / (l * K_B * t)).exp() - 1.0));
    radiance as Float
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlackbodySpectrum {
    temperature: Float,
    scale: Float,
}

impl BlackbodySpectrum {
    /// With `normalize` set the spectrum peaks at exactly 1, otherwise it is Planck's law in
    /// W·sr⁻¹·m⁻³.
    pub fn new(temperature: Float, normalize: bool) -> Option<Self> {
        if !(temperature > 0.0) || !temperature.is_finite() {
            return None;
        }

        let scale = if normalize {
            // Wien's displacement law
            let peak_wavelength = 2.897_772e-3 / temperature * 1.0e9;
            1.0 / blackbody(peak_wavelength, temperature)
        } else {
            1.0
        };
        Some(Self { temperature, scale })
    }

    pub fn temperature(&self) -> Float {
        self.temperature
    }
}

impl Spectrum for BlackbodySpectrum {
    fn intensity(&self, wavelength: Float) -> Float {
        blackbody(wavelength, self.temperature) * self.scale
    }
}

/// Piecewise-linear function through `(wavelength, value)` samples, zero outside the samples.
#[derive(Clone, Debug, PartialEq)]
struct PiecewiseLinear {
    wavelengths: Vec<Float>,
    values: Vec<Float>,
}

impl PiecewiseLinear {
    fn new(samples: &[(Float, Float)], max_value: Float) -> Option<Self> {
        let mut samples: Vec<(Float, Float)> = samples
            .iter()
            .filter(|(w, v)| w.is_finite() && v.is_finite())
            .map(|&(w, v)| (w, v.max(0.0).min(max_value)))
            .collect();
        if samples.iter().all(|&(_, v)| v == 0.0) {
            return None;
        }
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        samples.dedup_by(|a, b| a.0 == b.0);

        let (wavelengths, values) = samples.into_iter().unzip();
        Some(Self { wavelengths, values })
    }

    fn evaluate(&self, wavelength: Float) -> Float {
        let n = self.wavelengths.len();
        if n == 1 {
            return if wavelength == self.wavelengths[0] { self.values[0] } else { 0.0 };
        }
        if wavelength < self.wavelengths[0] || wavelength > self.wavelengths[n - 1] {
            return 0.0;
        }

        let upper = self.wavelengths.partition_point(|&w| w <= wavelength).min(n - 1);
        let lower = upper - 1;
        let (w0, w1) = (self.wavelengths[lower], self.wavelengths[upper]);
        let t = (wavelength - w0) / (w1 - w0);
        lerp(t.max(0.0).min(1.0), self.values[lower], self.values[upper])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampledSpectrum(PiecewiseLinear);

impl SampledSpectrum {
    /// Negative intensities are clamped to zero; `None` if nothing remains.
    pub fn new(samples: &[(Float, Float)]) -> Option<Self> {
        PiecewiseLinear::new(samples, Float::INFINITY).map(Self)
    }
}

impl Spectrum for SampledSpectrum {
    fn intensity(&self, wavelength: Float) -> Float {
        self.0.evaluate(wavelength)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampledReflector(PiecewiseLinear);

impl SampledReflector {
    /// Values are clamped to `[0, 1]`; `None` if all of them are zero.
    pub fn new(samples: &[(Float, Float)]) -> Option<Self> {
        PiecewiseLinear::new(samples, 1.0).map(Self)
    }
}

impl Reflector for SampledReflector {
    fn reflectance(&self, wavelength: Float) -> Float {
        self.0.evaluate(wavelength)
    }
}

// Basis used to turn colour triples into spectra: three overlapping ramps that sum to one at
// every wavelength, so a grey triple maps to a flat spectrum.
const BLUE_GREEN_CROSSOVER: (Float, Float) = (480.0, 510.0);
const GREEN_RED_CROSSOVER: (Float, Float) = (570.0, 600.0);

fn ramp(x: Float, (start, end): (Float, Float)) -> Float {
    ((x - start) / (end - start)).max(0.0).min(1.0)
}

/// Weights of the red, green and blue basis functions at `wavelength`.
pub fn rgb_basis(wavelength: Float) -> [Float; 3] {
    let to_green = ramp(wavelength, BLUE_GREEN_CROSSOVER);
    let to_red = ramp(wavelength, GREEN_RED_CROSSOVER);
    let blue = 1.0 - to_green;
    let red = to_red;
    let green = 1.0 - blue - red;
    [red, green, blue]
}

fn project_rgb(rgb: [Float; 3], wavelength: Float) -> Float {
    let basis = rgb_basis(wavelength);
    rgb[0] * basis[0] + rgb[1] * basis[1] + rgb[2] * basis[2]
}

fn clean_triple(c: [Float; 3], max: Float) -> Option<[Float; 3]> {
    let cleaned = [
        c[0].max(0.0).min(max),
        c[1].max(0.0).min(max),
        c[2].max(0.0).min(max),
    ];
    if cleaned.iter().any(|x| x.is_nan()) || cleaned.iter().all(|&x| x == 0.0) {
        None
    } else {
        Some(cleaned)
    }
}

/// Emission spectrum built from a linear sRGB triple.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RgbSpectrum {
    rgb: [Float; 3],
}

impl RgbSpectrum {
    pub fn new(rgb: [Float; 3]) -> Option<Self> {
        clean_triple(rgb, Float::INFINITY).map(|rgb| Self { rgb })
    }

    pub fn from_xyz(xyz: [Float; 3]) -> Option<Self> {
        Self::new(xyz_to_rgb(xyz))
    }
}

impl Spectrum for RgbSpectrum {
    fn intensity(&self, wavelength: Float) -> Float {
        project_rgb(self.rgb, wavelength)
    }
}

/// Reflectance built from a linear sRGB triple with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RgbReflector {
    rgb: [Float; 3],
}

impl RgbReflector {
    pub fn new(rgb: [Float; 3]) -> Option<Self> {
        clean_triple(rgb, 1.0).map(|rgb| Self { rgb })
    }

    pub fn from_xyz(xyz: [Float; 3]) -> Option<Self> {
        Self::new(xyz_to_rgb(xyz))
    }
}

impl Reflector for RgbReflector {
    fn reflectance(&self, wavelength: Float) -> Float {
        project_rgb(self.rgb, wavelength)
    }
}
