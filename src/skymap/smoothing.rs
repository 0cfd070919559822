//! Gaussian smoothing of the sky maps
//!
//! The filter reproduces the defaults of `scipy.ndimage.gaussian_filter`:
//! separable 1-D kernels truncated at 4 sigma and mirror-reflected boundaries
//! (`d c b a | a b c d | d c b a`).

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::SIGMA_TO_FWHM;

/// Kernel truncation in units of sigma
pub const TRUNCATE: f64 = 4.;
/// Below this width a kernel is the identity
const MIN_SIGMA: f64 = 1e-15;
/// Largest kernel radius in pixels
pub const MAX_KERNEL_RADIUS: f64 = 65536.;

/// Converts a FWHM [deg] into the Gaussian sigma in pixels of size `reso` [deg]
pub fn fwhm_to_sigma_px(fwhm: f64, reso: f64) -> f64 {
    fwhm / SIGMA_TO_FWHM / reso
}

/// Radius in pixels of the kernel of a Gaussian of width `sigma` pixels
///
/// Returns `None` if `sigma` is negative, not a number or if the radius is larger than [`MAX_KERNEL_RADIUS`].
pub fn kernel_radius(sigma: f64) -> Option<usize> {
    let radius = TRUNCATE * sigma + 0.5;
    (sigma >= 0. && radius <= MAX_KERNEL_RADIUS).then_some(radius as usize)
}

/// Normalized 1-D Gaussian kernel of radius `⌊4σ+0.5⌋`, at most [`MAX_KERNEL_RADIUS`]
pub fn gaussian_kernel1d(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5).min(MAX_KERNEL_RADIUS) as i64;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.into_iter().map(|k| k / sum).collect()
}

#[inline]
fn reflect(i: i64, n: i64) -> usize {
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

fn correlate1d(line: &[f64], kernel: &[f64], out: &mut [f64]) {
    let n = line.len() as i64;
    let radius = (kernel.len() / 2) as i64;
    for (i, o) in out.iter_mut().enumerate() {
        *o = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * line[reflect(i as i64 + k as i64 - radius, n)])
            .sum();
    }
}

/// Blurs the map in place with a Gaussian of width `[σx, σy]` pixels
///
/// `σx` applies along the columns index (RA axis) and `σy` along the rows
/// index (Dec axis). An axis with a null width is left untouched.
pub fn gaussian_filter(data: &mut DMatrix<f64>, sigma: [f64; 2]) {
    let (ny, nx) = data.shape();
    if sigma[0] > MIN_SIGMA {
        let kernel = gaussian_kernel1d(sigma[0]);
        log::debug!("RA kernel: {} samples", kernel.len());
        let mut line = vec![0f64; nx];
        let mut out = vec![0f64; nx];
        for j in 0..ny {
            line.iter_mut()
                .zip(data.row(j).iter())
                .for_each(|(l, d)| *l = *d);
            correlate1d(&line, &kernel, &mut out);
            data.row_mut(j)
                .iter_mut()
                .zip(&out)
                .for_each(|(d, o)| *d = *o);
        }
    }
    if sigma[1] > MIN_SIGMA {
        let kernel = gaussian_kernel1d(sigma[1]);
        log::debug!("Dec kernel: {} samples", kernel.len());
        let mut line = vec![0f64; ny];
        let mut out = vec![0f64; ny];
        for i in 0..nx {
            line.iter_mut()
                .zip(data.column(i).iter())
                .for_each(|(l, d)| *l = *d);
            correlate1d(&line, &kernel, &mut out);
            data.column_mut(i).copy_from_slice(&out);
        }
    }
}

/// Significance normalization factor `2σ√π` of a map smoothed with a Gaussian of width `σ` pixels
///
/// The geometric mean of the two axis widths is used for anisotropic kernels.
pub fn significance_factor(sigma: [f64; 2]) -> f64 {
    2. * (sigma[0] * sigma[1]).sqrt() * PI.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn kernel() {
        let k = gaussian_kernel1d(1.);
        assert_eq!(k.len(), 9);
        assert!((k.iter().sum::<f64>() - 1.).abs() < 1e-12);
        assert_eq!(k[0], k[8]);
        assert_eq!(gaussian_kernel1d(0.3).len(), 3);
    }

    #[test]
    fn radius_bounds() {
        assert_eq!(kernel_radius(0.), Some(0));
        assert_eq!(kernel_radius(1.), Some(4));
        assert_eq!(kernel_radius(-1.), None);
        assert_eq!(kernel_radius(f64::NAN), None);
        assert_eq!(kernel_radius(f64::INFINITY), None);
        assert_eq!(kernel_radius(4.2e298), None);
        assert_eq!(gaussian_kernel1d(1e300).len(), 2 * 65536 + 1);
    }

    #[test]
    fn reflect_boundary() {
        let idx: Vec<_> = (-4..8).map(|i| reflect(i, 4)).collect();
        assert_eq!(idx, vec![3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0]);
        assert_eq!(reflect(-7, 2), 1);
    }

    #[test]
    fn identity() {
        let mut rng = rand::thread_rng();
        let data = DMatrix::from_fn(16, 12, |_, _| rng.gen_range(-1f64..1f64));
        let mut smoothed = data.clone();
        gaussian_filter(&mut smoothed, [0., 0.]);
        assert_eq!(smoothed, data);
    }

    #[test]
    fn flux_conservation() {
        let mut data = DMatrix::zeros(41, 41);
        data[(20, 20)] = 1.;
        gaussian_filter(&mut data, [2., 3.]);
        assert!((data.sum() - 1.).abs() < 1e-12);
        assert!(data[(20, 20)] < 1. && data[(20, 20)] > 0.);
        assert!((data[(20, 18)] - data[(20, 22)]).abs() < 1e-15);
        // wider along the rows
        assert!(data[(23, 20)] > data[(20, 23)]);
    }

    #[test]
    fn constant_map() {
        let mut data = DMatrix::from_element(5, 7, 3.);
        gaussian_filter(&mut data, [4., 4.]);
        assert!(data.iter().all(|x| (x - 3.).abs() < 1e-12));
    }

    #[test]
    fn significance() {
        assert_eq!(significance_factor([0., 0.]), 0.);
        assert!((significance_factor([2., 2.]) - 4. * PI.sqrt()).abs() < 1e-12);
        assert!((significance_factor([1., 4.]) - 4. * PI.sqrt()).abs() < 1e-12);
        let sigma = fwhm_to_sigma_px(0.2, 0.02);
        assert!((sigma - 10. / SIGMA_TO_FWHM).abs() < 1e-12);
    }
}
