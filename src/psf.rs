//! On-axis point spread function
//!
//! The instrument response tabulates the PSF as a Gaussian width per energy bin.
//! [`estimate_psf`] reduces it to a single FWHM averaged over an energy range,
//! each energy being weighted by a power law spectrum.

use std::{io, path::PathBuf};

use crate::SIGMA_TO_FWHM;

mod calibration;
mod spline;
pub use calibration::CalibrationCurve;
pub use spline::CubicSpline;

/// Number of log-spaced energies the PSF is sampled at
pub const N_ENERGY_SAMPLE: usize = 1000;
/// CTA energy range [TeV]
pub const CTA_ENERGY_RANGE: (f64, f64) = (0.02, 100.0);

#[derive(Debug, thiserror::Error)]
pub enum PsfError {
    #[error("invalid energy range [{0}, {1}] TeV")]
    InvalidRange(f64, f64),
    #[error("the calibration curve needs at least 2 samples, found {0}")]
    TooFewSamples(usize),
    #[error("calibration energies must be strictly increasing (sample #{0})")]
    NonMonotonic(usize),
    #[error("non-finite calibration sample #{0}")]
    NonFinite(usize),
    #[error("calibration columns lengths do not match ({0} vs {1})")]
    LengthMismatch(usize, usize),
    #[error("failed to open the calibration file {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to deserialize the calibration table")]
    Csv(#[from] csv::Error),
    #[error("failed to solve the spline system")]
    Spline,
}
impl PsfError {
    /// Returns true if the error comes from malformed calibration data
    pub fn is_data_format(&self) -> bool {
        !matches!(self, PsfError::InvalidRange(..))
    }
}
type Result<T> = std::result::Result<T, PsfError>;

/// Power law index of the spectrum used to weight the PSF
///
/// The default index of -2 biases the average toward low energies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralWeighting(pub f64);
impl Default for SpectralWeighting {
    fn default() -> Self {
        Self(-2.)
    }
}
impl SpectralWeighting {
    pub fn slope(&self) -> f64 {
        self.0
    }
    pub fn weight(&self, energy: f64) -> f64 {
        energy.powf(self.0)
    }
}
impl From<f64> for SpectralWeighting {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// Logarithmically spaced samples from `start` to `stop`, both included
pub fn log_space(start: f64, stop: f64, n: usize) -> impl Iterator<Item = f64> {
    let (a, b) = (start.log10(), stop.log10());
    let step = (b - a) / (n.max(2) - 1) as f64;
    (0..n).map(move |i| {
        if i + 1 == n {
            10f64.powf(b)
        } else {
            10f64.powf(a + i as f64 * step)
        }
    })
}

/// Returns the spectrum-weighted PSF FWHM [deg] between `e_min` and `e_max` [TeV]
///
/// The tabulated widths are interpolated with a cubic spline, sampled at
/// [`N_ENERGY_SAMPLE`] log-spaced energies and converted to FWHM. Only the
/// samples strictly within `(e_min, e_max)` enter the average
/// `Σ w(E)·E^s / Σ E^s`.
///
/// Energies outside of the calibrated domain are extrapolated; the result is
/// then not validated by the instrument response.
pub fn estimate_psf(
    curve: &CalibrationCurve,
    e_min: f64,
    e_max: f64,
    weighting: SpectralWeighting,
) -> Result<f64> {
    if !(e_min.is_finite() && e_max.is_finite()) || e_min <= 0. || e_min >= e_max {
        return Err(PsfError::InvalidRange(e_min, e_max));
    }
    let (lo, hi) = curve.domain();
    if e_min < lo || e_max > hi {
        log::warn!(
            "PSF extrapolated over [{}, {}] TeV, calibrated within [{}, {}] TeV",
            e_min,
            e_max,
            lo,
            hi
        );
    }
    let spline = curve.interpolant()?;
    let (n, sum_w, sum_psf) = log_space(e_min, e_max, N_ENERGY_SAMPLE)
        .filter(|&e| e > e_min && e < e_max)
        .fold((0usize, 0f64, 0f64), |(n, sum_w, sum_psf), e| {
            let w = weighting.weight(e);
            (n + 1, sum_w + w, sum_psf + w * spline.eval(e) * SIGMA_TO_FWHM)
        });
    if n == 0 || sum_w == 0. {
        return Err(PsfError::InvalidRange(e_min, e_max));
    }
    Ok(sum_psf / sum_w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> CalibrationCurve {
        let energy = vec![0.03, 0.05, 0.1, 0.3, 1., 3., 10., 30., 100.];
        let width = energy
            .iter()
            .map(|e: &f64| 0.02 + 0.08 * (1. + e.log10() / 3.).exp().recip())
            .collect();
        CalibrationCurve::new(energy, width).unwrap()
    }

    #[test]
    fn log_space_bounds() {
        let e: Vec<_> = log_space(0.1, 10., 5).collect();
        assert_eq!(e.len(), 5);
        assert!((e[0] - 0.1).abs() < 1e-15);
        assert!((e[2] - 1.).abs() < 1e-12);
        assert_eq!(e[4], 10f64.powf(1.));
    }

    #[test]
    fn tabulated_width() {
        let curve = curve();
        for (&e, &w) in curve.energy().iter().zip(curve.width()).skip(1).take(7) {
            let psf = estimate_psf(
                &curve,
                e * (1. - 1e-7),
                e * (1. + 1e-7),
                Default::default(),
            )
            .unwrap();
            let expected = w * SIGMA_TO_FWHM;
            assert!(
                ((psf - expected) / expected).abs() < 1e-5,
                "{} TeV: {} vs {}",
                e,
                psf,
                expected
            );
        }
    }

    #[test]
    fn deterministic() {
        let curve = curve();
        let a = curve.mean_psf(0.05, 50.).unwrap();
        let b = curve.mean_psf(0.05, 50.).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn soft_spectrum_bias() {
        // the width decreases with energy so a softer spectrum gives a wider PSF
        let curve = curve();
        let soft = estimate_psf(&curve, 0.05, 50., SpectralWeighting(-2.)).unwrap();
        let flat = estimate_psf(&curve, 0.05, 50., SpectralWeighting(0.)).unwrap();
        let hard = estimate_psf(&curve, 0.05, 50., SpectralWeighting(1.)).unwrap();
        assert!(soft > flat && flat > hard);
        let (w_min, w_max) = (
            curve.width().last().unwrap() * SIGMA_TO_FWHM,
            curve.width()[0] * SIGMA_TO_FWHM,
        );
        assert!(soft < w_max && hard > w_min);
    }

    #[test]
    fn invalid_ranges() {
        let curve = curve();
        for (e_min, e_max) in [(1., 1.), (10., 1.), (0., 1.), (-1., 1.), (f64::NAN, 1.)] {
            let err = estimate_psf(&curve, e_min, e_max, Default::default()).unwrap_err();
            assert!(matches!(err, PsfError::InvalidRange(..)));
            assert!(!err.is_data_format());
        }
    }

    #[test]
    fn extrapolation() {
        let curve = curve();
        let psf = curve.mean_psf(0.01, 200.).unwrap();
        assert!(psf.is_finite());
    }
}
