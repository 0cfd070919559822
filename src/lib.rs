/*!
# gammaview

Validation plots for gamma-ray observation simulations.

The crate has two independent parts:

- [`psf`]: the spectrum-weighted on-axis PSF of an instrument response,
  computed from the tabulated calibration curve,
- [`skymap`]: rendering of FITS sky maps with Gaussian smoothing, color scaling
  and sky-projected overlays (regions, pointings, point sources, PSF glyph).

[`pointings`] and [`profile`] render the pointing pattern of an observation
and the radial profile of a source, [`events`] a quicklook of an event list.

## Usage

```rust,no_run
use gammaview::{psf::CalibrationCurve, skymap::{MapOptions, SkyImage}};

# fn main() -> Result<(), Box<dyn std::error::Error>> {
let curve = CalibrationCurve::from_path("psf_north_z20_50h.csv")?;
let psf = curve.mean_psf(0.05, 100.0)?;

let options = MapOptions::default()
    .smoothing(0.1)
    .cluster(266.4, -21.3, 0.3, "Perseus")
    .psf(psf)
    .title("Counts")
    .bar_title("Counts / pixel");
let report = SkyImage::from_path("skymap.fits")?.render(&options, "skymap.png")?;
if report.output.is_none() {
    println!("{:?}", report.warnings);
}
# Ok(())
# }
```
*/

/// Conversion factor from a Gaussian standard deviation to its full width at half maximum: `2·sqrt(2·ln 2)`
pub const SIGMA_TO_FWHM: f64 = 2.354_820_045_030_949_3;

mod error;
pub mod events;
pub mod fits;
pub mod pointings;
pub mod profile;
pub mod psf;
pub mod skymap;
mod style;

pub use error::Error;
pub use style::PlotStyle;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_to_fwhm() {
        let factor = 2. * (2. * 2f64.ln()).sqrt();
        assert!((SIGMA_TO_FWHM - factor).abs() < 1e-15);
    }
}
