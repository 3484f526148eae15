//! Measured or precomputed BSDFs stored as Fourier series in the azimuth difference, tabulated
//! over pairs of zenith angle cosines and interpolated with Catmull-Rom splines.

use std::sync::Arc;

use anyhow::{anyhow, bail, ensure};
use ndarray::Array2;
use smallvec::SmallVec;

use crate::consts::{INV_2_PI, PI};
use crate::random::Sampler;
use crate::reflection::sin2_theta;
use crate::spectrum::{Reflector, SpectralAllocator};
use crate::{Float, Vec3f};
use cgmath::InnerSpace;

/// Returns the largest index `i` in `[0, size - 2]` for which `pred(i)` holds, assuming `pred`
/// is true up to some point and false after it.
fn find_interval(size: usize, pred: impl Fn(usize) -> bool) -> usize {
    let mut first = 0;
    let mut len = size;
    while len > 0 {
        let half = len >> 1;
        let middle = first + half;
        if pred(middle) {
            first = middle + 1;
            len -= half + 1;
        } else {
            len = half;
        }
    }
    first.saturating_sub(1).min(size.saturating_sub(2))
}

/// Spline weights of the four nodes around `x`. The first node sits at `offset`, which is -1 when
/// `x` falls in the first interval (its weight is then zero).
fn catmull_rom_weights(nodes: &[Float], x: Float) -> Option<(isize, [Float; 4])> {
    let size = nodes.len();
    if size < 2 || !(x >= nodes[0] && x <= nodes[size - 1]) {
        return None;
    }

    let idx = find_interval(size, |i| nodes[i] <= x);
    let offset = idx as isize - 1;
    let (x0, x1) = (nodes[idx], nodes[idx + 1]);

    let t = (x - x0) / (x1 - x0);
    let t2 = t * t;
    let t3 = t2 * t;

    let mut weights = [0.0; 4];
    weights[1] = 2.0 * t3 - 3.0 * t2 + 1.0;
    weights[2] = -2.0 * t3 + 3.0 * t2;

    if idx > 0 {
        let w0 = (t3 - 2.0 * t2 + t) * (x1 - x0) / (x1 - nodes[idx - 1]);
        weights[0] = -w0;
        weights[2] += w0;
    } else {
        let w0 = t3 - 2.0 * t2 + t;
        weights[0] = 0.0;
        weights[1] -= w0;
        weights[2] += w0;
    }

    if idx + 2 < size {
        let w3 = (t3 - t2) * (x1 - x0) / (nodes[idx + 2] - x0);
        weights[1] -= w3;
        weights[3] = w3;
    } else {
        let w3 = t3 - t2;
        weights[1] -= w3;
        weights[2] += w3;
        weights[3] = 0.0;
    }
    Some((offset, weights))
}

/// Running integral of the spline through `(x, values)`, written into `cdf`. Returns the total.
fn integrate_catmull_rom(x: &[Float], values: &[Float], cdf: &mut [Float]) -> Float {
    let n = x.len();
    let mut sum = 0.0;
    cdf[0] = 0.0;
    for i in 0..n - 1 {
        let (x0, x1) = (x[i], x[i + 1]);
        let (f0, f1) = (values[i], values[i + 1]);
        let width = x1 - x0;

        let d0 = if i > 0 {
            width * (f1 - values[i - 1]) / (x1 - x[i - 1])
        } else {
            f1 - f0
        };
        let d1 = if i + 2 < n {
            width * (values[i + 2] - f0) / (x[i + 2] - x0)
        } else {
            f1 - f0
        };

        sum += ((d0 - d1) * (1.0 / 12.0) + (f0 + f1) * 0.5) * width;
        cdf[i + 1] = sum;
    }
    sum
}

/// Evaluates the cosine series with coefficients `a` at `cos_phi`.
fn fourier(a: &[Float], cos_phi: Float) -> Float {
    let cos_phi = cos_phi as f64;
    let mut value = 0.0f64;
    let mut cos_k_minus_one_phi = cos_phi;
    let mut cos_k_phi = 1.0f64;
    for &ak in a {
        value += ak as f64 * cos_k_phi;
        let cos_k_plus_one_phi = 2.0 * cos_phi * cos_k_phi - cos_k_minus_one_phi;
        cos_k_minus_one_phi = cos_k_phi;
        cos_k_phi = cos_k_plus_one_phi;
    }
    value as Float
}

const MAX_NEWTON_ITERATIONS: usize = 64;

/// Importance samples the azimuth of a cosine series. Returns `(value, pdf, phi)`.
fn sample_fourier(ak: &[Float], recip: &[Float], u: Float) -> (Float, Float, Float) {
    let (flip, u) = if u >= 0.5 {
        (true, 1.0 - 2.0 * (u - 0.5))
    } else {
        (false, u * 2.0)
    };
    let u = u as f64;
    let a0 = ak[0] as f64;

    let (mut a, mut b) = (0.0f64, std::f64::consts::PI);
    let mut phi = 0.5 * std::f64::consts::PI;
    let mut f;
    let mut iterations = 0;
    loop {
        // evaluate the integral F(phi) and its derivative f(phi)
        let cos_phi = phi.cos();
        let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
        let (mut cos_phi_prev, mut cos_phi_cur) = (cos_phi, 1.0f64);
        let (mut sin_phi_prev, mut sin_phi_cur) = (-sin_phi, 0.0f64);
        let mut big_f = a0 * phi;
        f = a0;
        for k in 1..ak.len() {
            let sin_phi_next = 2.0 * cos_phi * sin_phi_cur - sin_phi_prev;
            let cos_phi_next = 2.0 * cos_phi * cos_phi_cur - cos_phi_prev;
            sin_phi_prev = sin_phi_cur;
            sin_phi_cur = sin_phi_next;
            cos_phi_prev = cos_phi_cur;
            cos_phi_cur = cos_phi_next;
            big_f += ak[k] as f64 * recip[k] as f64 * sin_phi_next;
            f += ak[k] as f64 * cos_phi_next;
        }
        big_f -= u * a0 * std::f64::consts::PI;

        if big_f > 0.0 {
            b = phi;
        } else {
            a = phi;
        }
        iterations += 1;
        if big_f.abs() < 1.0e-6 || b - a < 1.0e-6 || iterations >= MAX_NEWTON_ITERATIONS {
            break;
        }

        phi -= big_f / f;
        if !(phi > a && phi < b) {
            phi = 0.5 * (a + b);
        }
    }

    if flip {
        phi = 2.0 * std::f64::consts::PI - phi;
    }
    let pdf = INV_2_PI * (f / a0) as Float;
    (f as Float, pdf, phi as Float)
}

/// Samples the second dimension of a 2D spline table, the first being fixed at `alpha`.
/// Returns `(x, pdf)`.
fn sample_catmull_rom_2d(
    nodes1: &[Float],
    nodes2: &[Float],
    values: &Array2<Float>,
    cdf: &Array2<Float>,
    alpha: Float,
    u: Float,
) -> Option<(Float, Float)> {
    let (offset, weights) = catmull_rom_weights(nodes1, alpha)?;
    let size2 = nodes2.len();

    let interpolate = |array: &Array2<Float>, idx: usize| -> Float {
        let mut value = 0.0;
        for (i, &w) in weights.iter().enumerate() {
            if w != 0.0 {
                value += array[[(offset + i as isize) as usize, idx]] * w;
            }
        }
        value
    };

    // map u to a spline interval by inverting the interpolated cdf
    let maximum = interpolate(cdf, size2 - 1);
    if !(maximum > 0.0) {
        return None;
    }
    let u = u * maximum;
    let idx = find_interval(size2, |i| interpolate(cdf, i) <= u);

    let (f0, f1) = (interpolate(values, idx), interpolate(values, idx + 1));
    let (x0, x1) = (nodes2[idx], nodes2[idx + 1]);
    let width = x1 - x0;
    let u = (u - interpolate(cdf, idx)) / width;

    let d0 = if idx > 0 {
        width * (f1 - interpolate(values, idx - 1)) / (x1 - nodes2[idx - 1])
    } else {
        f1 - f0
    };
    let d1 = if idx + 2 < size2 {
        width * (interpolate(values, idx + 2) - f0) / (nodes2[idx + 2] - x0)
    } else {
        f1 - f0
    };

    // initial guess from a linear interpolant, then Newton-bisection
    let mut t = if f0 != f1 {
        (f0 - Float::sqrt(Float::max(0.0, f0 * f0 + 2.0 * u * (f1 - f0)))) / (f0 - f1)
    } else {
        u / f0
    };
    let (mut a, mut b) = (0.0, 1.0);
    let mut fhat;
    let mut iterations = 0;
    loop {
        if !(t >= a && t <= b) {
            t = 0.5 * (a + b);
        }

        let big_fhat = t
            * (f0 + t * (0.5 * d0 + t * ((1.0 / 3.0) * (-2.0 * d0 - d1) + f1 - f0
                + t * (0.25 * (d0 + d1) + 0.5 * (f0 - f1)))));
        fhat = f0 + t * (d0 + t * (-2.0 * d0 - d1 + 3.0 * (f1 - f0) + t * (d0 + d1 + 2.0 * (f0 - f1))));

        iterations += 1;
        if (big_fhat - u).abs() < 1.0e-6 || b - a < 1.0e-6 || iterations >= MAX_NEWTON_ITERATIONS {
            break;
        }

        if big_fhat - u < 0.0 {
            a = t;
        } else {
            b = t;
        }
        t -= (big_fhat - u) / fhat;
    }

    Some((x0 + width * t, fhat / maximum))
}

/// Tabulated Fourier coefficients.
///
/// Pairs of zenith cosines are indexed `[outgoing, incident]` in the usual convention where both
/// directions point away from the surface; `mu` runs over `[-1, 1]`. Each pair stores
/// `order * channels` coefficients, channel-major. With three channels they hold luminance, red
/// and blue.
#[derive(Debug)]
pub struct FourierTable {
    eta: Float,
    n_channels: usize,
    m_max: usize,
    mu: Vec<Float>,
    orders: Array2<usize>,
    offsets: Array2<usize>,
    coefficients: Vec<Float>,
    a0: Array2<Float>,
    cdf: Array2<Float>,
    recip: Vec<Float>,
}

impl FourierTable {
    /// `orders` and the coefficient blocks are laid out row-major over `(mu_o, mu_i)` pairs.
    pub fn new(
        eta: Float,
        n_channels: usize,
        mu: Vec<Float>,
        orders: Vec<usize>,
        coefficients: Vec<Float>,
    ) -> anyhow::Result<Self> {
        ensure!(eta > 0.0, "index of refraction must be positive, got {}", eta);
        ensure!(n_channels == 1 || n_channels == 3, "expected 1 or 3 channels, got {}", n_channels);
        let n_mu = mu.len();
        ensure!(n_mu >= 2, "at least two zenith nodes are needed");
        ensure!(
            mu.windows(2).all(|w| w[0] < w[1]) && mu[0] >= -1.0 && mu[n_mu - 1] <= 1.0,
            "zenith nodes must increase strictly within [-1, 1]"
        );

        let orders = Array2::from_shape_vec((n_mu, n_mu), orders)
            .map_err(|_| anyhow!("expected {} order counts", n_mu * n_mu))?;

        let mut offsets = Array2::zeros((n_mu, n_mu));
        let mut total = 0;
        for (offset, &order) in offsets.iter_mut().zip(orders.iter()) {
            *offset = total;
            total += order * n_channels;
        }
        if total != coefficients.len() {
            bail!("orders describe {} coefficients but {} were given", total, coefficients.len());
        }

        let m_max = orders.iter().copied().max().unwrap_or(0);
        ensure!(m_max > 0, "table holds no coefficients");

        let mut a0 = Array2::zeros((n_mu, n_mu));
        for ((idx, &order), &offset) in orders.indexed_iter().zip(offsets.iter()) {
            if order > 0 {
                a0[idx] = coefficients[offset];
            }
        }

        let mut cdf = Array2::zeros((n_mu, n_mu));
        for o in 0..n_mu {
            let row: Vec<Float> = a0.row(o).to_vec();
            let mut row_cdf = vec![0.0; n_mu];
            integrate_catmull_rom(&mu, &row, &mut row_cdf);
            cdf.row_mut(o).assign(&ndarray::ArrayView1::from(&row_cdf[..]));
        }

        let recip = (0..m_max).map(|k| if k == 0 { 0.0 } else { 1.0 / k as Float }).collect();

        tracing::debug!(n_mu, m_max, n_channels, "loaded fourier table");
        Ok(Self { eta, n_channels, m_max, mu, orders, offsets, coefficients, a0, cdf, recip })
    }

    pub fn eta(&self) -> Float {
        self.eta
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn m_max(&self) -> usize {
        self.m_max
    }

    fn ak(&self, offset_i: usize, offset_o: usize) -> (&[Float], usize) {
        let order = self.orders[[offset_o, offset_i]];
        let start = self.offsets[[offset_o, offset_i]];
        (&self.coefficients[start..start + order * self.n_channels], order)
    }

    /// Interpolated coefficients for the pair `(mu_i, mu_o)`, `channels` of them, laid out in
    /// blocks of `m_max`. Returns the coefficients and the highest order touched.
    fn interpolate(&self, mu_i: Float, mu_o: Float, channels: usize) -> Option<(SmallVec<[Float; 64]>, usize)> {
        let (offset_i, weights_i) = catmull_rom_weights(&self.mu, mu_i)?;
        let (offset_o, weights_o) = catmull_rom_weights(&self.mu, mu_o)?;

        let mut ak: SmallVec<[Float; 64]> = SmallVec::from_elem(0.0, self.m_max * channels);
        let mut m_max = 0;
        for (b, &w_o) in weights_o.iter().enumerate() {
            for (a, &w_i) in weights_i.iter().enumerate() {
                let weight = w_i * w_o;
                if weight == 0.0 {
                    continue;
                }
                let (ap, m) = self.ak((offset_i + a as isize) as usize, (offset_o + b as isize) as usize);
                m_max = m_max.max(m);
                for c in 0..channels {
                    for k in 0..m {
                        ak[c * self.m_max + k] += weight * ap[c * m + k];
                    }
                }
            }
        }
        Some((ak, m_max))
    }

    /// Integral of the luminance over all incident directions for a fixed `mu_o`.
    fn rho(&self, mu_o: Float) -> Float {
        let (offset_o, weights_o) = match catmull_rom_weights(&self.mu, mu_o) {
            Some(w) => w,
            None => return 0.0,
        };
        let last = self.mu.len() - 1;
        weights_o
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0.0)
            .map(|(o, &w)| w * self.cdf[[(offset_o + o as isize) as usize, last]] * 2.0 * PI)
            .sum()
    }
}

/// Reflectors the table's channels are expressed in. Three-channel tables carry luminance, red
/// and blue; green is reconstructed from them.
#[derive(Clone, Debug)]
pub enum FourierBasis {
    Luminance(Arc<dyn Reflector>),
    Rgb([Arc<dyn Reflector>; 3]),
}

#[derive(Debug)]
pub struct FourierBxdf {
    table: Arc<FourierTable>,
    basis: FourierBasis,
}

fn cos_d_phi(wa: Vec3f, wb: Vec3f) -> Float {
    let waxy = wa.x * wa.x + wa.y * wa.y;
    let wbxy = wb.x * wb.x + wb.y * wb.y;
    if waxy == 0.0 || wbxy == 0.0 {
        return 1.0;
    }
    ((wa.x * wb.x + wa.y * wb.y) / Float::sqrt(waxy * wbxy)).max(-1.0).min(1.0)
}

impl FourierBxdf {
    pub fn new(table: Arc<FourierTable>, basis: FourierBasis) -> anyhow::Result<Self> {
        let expected = match basis {
            FourierBasis::Luminance(_) => 1,
            FourierBasis::Rgb(_) => 3,
        };
        ensure!(
            table.n_channels() == expected,
            "table has {} channels but its basis expects {}",
            table.n_channels(),
            expected
        );
        Ok(Self { table, basis })
    }

    // mu_i and mu_o as seen by the table
    fn cosines(incoming: Vec3f, outgoing: Vec3f) -> (Float, Float) {
        (-outgoing.z, -incoming.z)
    }

    pub fn sample(&self, incoming: Vec3f, sampler: &mut Sampler) -> Option<Vec3f> {
        let u_mu = sampler.next();
        let u_phi = sampler.next();
        let table = &*self.table;

        let wo = -incoming;
        let mu_o = wo.z;
        let (mu_i, _) = sample_catmull_rom_2d(&table.mu, &table.mu, &table.a0, &table.cdf, mu_o, u_mu)?;

        let (ak, m) = table.interpolate(mu_i, mu_o, 1)?;
        if m == 0 || ak[0] == 0.0 {
            return None;
        }
        let (_, _, phi) = sample_fourier(&ak[..m], &table.recip, u_phi);

        let sin2_theta_i = Float::max(0.0, 1.0 - mu_i * mu_i);
        let mut norm = Float::sqrt(sin2_theta_i / sin2_theta(wo));
        if norm.is_infinite() || norm.is_nan() {
            norm = 0.0;
        }
        let (sin_phi, cos_phi) = phi.sin_cos();
        let outgoing = -Vec3f::new(
            norm * (cos_phi * wo.x - sin_phi * wo.y),
            norm * (sin_phi * wo.x + cos_phi * wo.y),
            mu_i,
        );
        let outgoing = outgoing.normalize();
        if outgoing.z == 0.0 || !outgoing.z.is_finite() {
            None
        } else {
            Some(outgoing)
        }
    }

    pub fn pdf(&self, incoming: Vec3f, outgoing: Vec3f) -> Float {
        let (mu_i, mu_o) = Self::cosines(incoming, outgoing);
        let (ak, m) = match self.table.interpolate(mu_i, mu_o, 1) {
            Some(a) => a,
            None => return 0.0,
        };
        let rho = self.table.rho(mu_o);
        let y = fourier(&ak[..m], cos_d_phi(outgoing, incoming));
        if rho > 0.0 && y > 0.0 {
            y / rho
        } else {
            0.0
        }
    }

    pub fn reflectance<'a>(
        &'a self,
        incoming: Vec3f,
        outgoing: Vec3f,
        allocator: &SpectralAllocator<'a>,
    ) -> Option<&'a dyn Reflector> {
        let table = &*self.table;
        let (mu_i, mu_o) = Self::cosines(incoming, outgoing);
        let (ak, m) = table.interpolate(mu_i, mu_o, table.n_channels)?;
        let cos_phi = cos_d_phi(outgoing, incoming);

        let mut scale = if mu_i != 0.0 { 1.0 / mu_i.abs() } else { 0.0 };
        if mu_i * mu_o > 0.0 {
            // transmission: account for the change in solid angle across the boundary
            let eta = if mu_i > 0.0 { 1.0 / table.eta } else { table.eta };
            scale *= eta * eta;
        }

        let y = Float::max(0.0, fourier(&ak[..m], cos_phi));
        match &self.basis {
            FourierBasis::Luminance(basis) => allocator.unbounded_scale(Some(basis.as_ref()), y * scale),
            FourierBasis::Rgb([red, green, blue]) => {
                let r = fourier(&ak[table.m_max..table.m_max + m], cos_phi);
                let b = fourier(&ak[2 * table.m_max..2 * table.m_max + m], cos_phi);
                let g = 1.39829 * y - 0.100913 * b - 0.297375 * r;

                let channel = |reflector: &'a Arc<dyn Reflector>, v: Float| {
                    allocator.unbounded_scale(Some(reflector.as_ref()), (v * scale).max(0.0))
                };
                let sum = allocator.unbounded_add(channel(red, r), channel(green, g));
                allocator.unbounded_add(sum, channel(blue, b))
            }
        }
    }
}
