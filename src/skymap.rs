//! Sky map rendering
//!
//! A [`SkyImage`] is loaded from the primary HDU of a FITS file, smoothed
//! with a Gaussian kernel, optionally converted to a significance map, color
//! scaled and written to an image file with the overlays of [`MapOptions`].
//!
//! A map with only null pixels is not rendered: the [`RenderReport`] then has
//! no output and carries a [`RenderWarning::EmptyMap`] warning.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Instant,
};

use nalgebra::DMatrix;

mod options;
pub mod overlay;
pub mod projection;
mod render;
pub mod scale;
pub mod smoothing;

pub use crate::fits::{FitsError, FitsImage};
pub use options::MapOptions;
pub use overlay::{Overlays, PointSource, Pointings, Region, SkyCoord, Target};
pub use projection::{Projection, SkyProjection};
pub use scale::{ColorMap, ColorScale, Normalization};

#[derive(Debug, thiserror::Error)]
pub enum SkyMapError {
    #[error("failed to load the sky map")]
    Fits(#[from] FitsError),
    #[error("invalid map option: {0}")]
    InvalidOption(String),
    #[error("invalid pixel size: {0:?}deg")]
    InvalidPixelSize([f64; 2]),
    #[error("failed to draw the sky map: {0}")]
    Plot(String),
}
impl SkyMapError {
    /// Returns true if the error comes from a malformed FITS file
    pub fn is_data_format(&self) -> bool {
        matches!(self, SkyMapError::Fits(_) | SkyMapError::InvalidPixelSize(_))
    }
}
type Result<T> = std::result::Result<T, SkyMapError>;

/// Non-fatal events of a rendering
#[derive(Debug, Clone, PartialEq)]
pub enum RenderWarning {
    /// the map was multiplied by the smoothing significance correction `factor`
    SignificanceBoost { factor: f64 },
    /// all the pixels are null, the file was not created
    EmptyMap(PathBuf),
}
impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::SignificanceBoost { factor } => write!(
                f,
                "the significance is boosted by {:.3} accounting for smoothing, \
                 assuming weak noise spatial variations (w.r.t. smoothing), gaussian regime and uncorrelated pixels",
                factor
            ),
            RenderWarning::EmptyMap(path) => {
                write!(f, "empty map, {:?} was not created", path)
            }
        }
    }
}

/// Outcome of a rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    /// the image file, `None` if the map is empty
    pub output: Option<PathBuf>,
    pub warnings: Vec<RenderWarning>,
}
impl RenderReport {
    fn warn(&mut self, warning: RenderWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Sky map
///
/// `data` rows follow the Dec axis (`NAXIS2`) and columns the RA axis (`NAXIS1`).
#[derive(Debug, Clone)]
pub struct SkyImage {
    pub data: DMatrix<f64>,
    pub wcs: SkyProjection,
}
impl SkyImage {
    pub fn new(data: DMatrix<f64>, wcs: SkyProjection) -> Self {
        Self { data, wcs }
    }
    /// Loads a sky map from a FITS file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let now = Instant::now();
        let this = Self::try_from(FitsImage::from_path(path)?)?;
        log::info!("... loaded in {:}ms", now.elapsed().as_millis());
        Ok(this)
    }
    /// Parses a sky map from the content of a FITS file
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::try_from(FitsImage::from_bytes(bytes)?)
    }
    /// Number of pixels along RA and Dec
    pub fn shape(&self) -> (usize, usize) {
        let (ny, nx) = self.data.shape();
        (nx, ny)
    }
    /// Pixel size [deg]
    pub fn reso(&self) -> [f64; 2] {
        self.wcs.reso()
    }
    /// Field of view [deg]
    pub fn fov(&self) -> [f64; 2] {
        let (nx, ny) = self.shape();
        let [rx, ry] = self.reso();
        [nx as f64 * rx, ny as f64 * ry]
    }
    /// Width in pixels of a Gaussian kernel of full width at half maximum `fwhm` [deg]
    pub fn sigma_px(&self, fwhm: f64) -> [f64; 2] {
        let [rx, ry] = self.reso();
        [
            smoothing::fwhm_to_sigma_px(fwhm, rx),
            smoothing::fwhm_to_sigma_px(fwhm, ry),
        ]
    }
    /// Checks that the pixel sizes are finite and positive
    pub fn check_reso(&self) -> Result<()> {
        let reso = self.reso();
        if reso.iter().all(|r| r.is_finite() && *r > 0.) {
            Ok(())
        } else {
            Err(SkyMapError::InvalidPixelSize(reso))
        }
    }
    /// Smoothes the map with a Gaussian kernel of full width at half maximum `fwhm` [deg]
    ///
    /// Returns the kernel width in pixels.
    /// A kernel wider than [`smoothing::MAX_KERNEL_RADIUS`] pixels is an error.
    pub fn smooth(&mut self, fwhm: f64) -> Result<[f64; 2]> {
        if fwhm == 0. {
            return Ok([0., 0.]);
        }
        let sigma = self.sigma_px(fwhm);
        if sigma.iter().any(|&s| smoothing::kernel_radius(s).is_none()) {
            return Err(SkyMapError::InvalidOption(format!(
                "a {}deg smoothing gives a kernel of {:?} pixels",
                fwhm, sigma
            )));
        }
        smoothing::gaussian_filter(&mut self.data, sigma);
        Ok(sigma)
    }
    /// Multiplies the map by the significance correction of a smoothing kernel of width `sigma` pixels
    ///
    /// Returns the applied factor or `None` if the factor is 0 and the map is left untouched.
    pub fn boost_significance(&mut self, sigma: [f64; 2]) -> Option<f64> {
        let factor = smoothing::significance_factor(sigma);
        if factor > 0. {
            self.data *= factor;
            Some(factor)
        } else {
            None
        }
    }
    /// Returns true if all the pixels are exactly 0
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&x| x == 0.)
    }
    /// Renders the map into `path`, see [`render_map`]
    pub fn render<P: AsRef<Path>>(self, options: &MapOptions, path: P) -> Result<RenderReport> {
        render_map(self, options, path)
    }
}
impl TryFrom<FitsImage> for SkyImage {
    type Error = SkyMapError;

    fn try_from(image: FitsImage) -> Result<Self> {
        Ok(Self {
            wcs: SkyProjection::from_header(&image.header)?,
            data: image.data,
        })
    }
}

/// Renders a sky map into the image file `path`
///
/// The image is a PNG file unless `path` has the `svg` extension.
pub fn render_map<P: AsRef<Path>>(
    mut image: SkyImage,
    options: &MapOptions,
    path: P,
) -> Result<RenderReport> {
    options.validate()?;
    image.check_reso()?;
    let path = path.as_ref();
    let mut report = RenderReport::default();

    let sigma = image.smooth(options.smoothing_fwhm)?;
    if options.significance {
        match image.boost_significance(sigma) {
            Some(factor) => report.warn(RenderWarning::SignificanceBoost { factor }),
            None => log::debug!("no smoothing, the significance is left unchanged"),
        }
    }

    if image.is_empty() {
        report.warn(RenderWarning::EmptyMap(path.to_path_buf()));
        return Ok(report);
    }

    let scale = ColorScale::from_data(
        image.data.iter().copied(),
        options.vmin,
        options.vmax,
        options.normalization,
    );
    let annotations = options.overlays.annotations(&image.wcs);

    log::info!("Writing {:?}...", path);
    let now = Instant::now();
    render::draw(&image, &scale, &annotations, options, path)?;
    log::info!("... written in {:}ms", now.elapsed().as_millis());

    report.output = Some(path.to_path_buf());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::error::Error;

    fn wcs() -> SkyProjection {
        SkyProjection::gnomonic([5.5, 5.5], [150., 2.], [-0.02, 0.02])
    }

    #[test]
    fn empty_map() {
        let path = std::env::temp_dir().join("gammaview_empty_map.png");
        let _ = std::fs::remove_file(&path);
        let image = SkyImage::new(DMatrix::zeros(10, 10), wcs());
        let report = image
            .render(&MapOptions::default().smoothing(0.1).significance(), &path)
            .unwrap();
        assert!(report.output.is_none());
        assert!(!path.exists());
        let empty: Vec<_> = report
            .warnings
            .iter()
            .filter(|w| matches!(w, RenderWarning::EmptyMap(_)))
            .collect();
        assert_eq!(empty.len(), 1);
    }

    #[test]
    fn no_smoothing() {
        let mut rng = rand::thread_rng();
        let data = DMatrix::from_fn(12, 10, |_, _| rng.gen_range(-5f64..5f64));
        let mut image = SkyImage::new(data.clone(), wcs());
        let sigma = image.smooth(0.).unwrap();
        assert_eq!(sigma, [0., 0.]);
        assert_eq!(image.data, data);
        assert_eq!(image.boost_significance(sigma), None);
        assert_eq!(image.data, data);
    }

    #[test]
    fn significance_boost() {
        let mut image = SkyImage::new(DMatrix::from_element(4, 4, 1.), wcs());
        let sigma = image.sigma_px(0.02 * crate::SIGMA_TO_FWHM);
        assert!((sigma[0] - 1.).abs() < 1e-12);
        let factor = image.boost_significance(sigma).unwrap();
        assert!((factor - 2. * std::f64::consts::PI.sqrt()).abs() < 1e-12);
        assert!(image.data.iter().all(|&x| (x - factor).abs() < 1e-15));
    }

    #[test]
    fn fits_map() -> std::result::Result<(), Box<dyn Error>> {
        let data = DMatrix::from_fn(20, 30, |j, i| (i + j) as f64);
        let bytes = crate::fits::to_bytes(
            &[
                ("CTYPE1", "'RA---TAN'"),
                ("CTYPE2", "'DEC--TAN'"),
                ("CRPIX1", "15.5"),
                ("CRPIX2", "10.5"),
                ("CRVAL1", "83.6"),
                ("CRVAL2", "22.0"),
                ("CDELT1", "-0.05"),
                ("CDELT2", "0.05"),
            ],
            &data,
        );
        let image = SkyImage::from_bytes(&bytes)?;
        assert_eq!(image.shape(), (30, 20));
        assert_eq!(image.reso(), [0.05, 0.05]);
        let [fx, fy] = image.fov();
        assert!((fx - 1.5).abs() < 1e-12 && (fy - 1.).abs() < 1e-12);
        assert_eq!(image.data[(3, 7)], 10.);
        Ok(())
    }

    #[test]
    fn malformed_fits() {
        let data = DMatrix::from_element(4, 4, 1.);
        let bytes = crate::fits::to_bytes(&[("CRPIX1", "2.5")], &data);
        let err = SkyImage::from_bytes(&bytes).unwrap_err();
        assert!(err.is_data_format());
        assert!(SkyImage::from_bytes(b"SIMPLE").unwrap_err().is_data_format());
    }

    #[test]
    fn oversized_kernel() -> std::result::Result<(), Box<dyn Error>> {
        let data = DMatrix::from_element(4, 4, 1.);
        let bytes = crate::fits::to_bytes(
            &[
                ("CRPIX1", "2.5"),
                ("CRPIX2", "2.5"),
                ("CRVAL1", "150.0"),
                ("CRVAL2", "2.0"),
                ("CDELT1", "-1E-300"),
                ("CDELT2", "1E-300"),
            ],
            &data,
        );
        let mut image = SkyImage::from_bytes(&bytes)?;
        assert!(matches!(
            image.smooth(0.1),
            Err(SkyMapError::InvalidOption(_))
        ));
        assert_eq!(image.data, data);
        let mut image = SkyImage::new(data.clone(), wcs());
        assert!(matches!(
            image.smooth(1e9),
            Err(SkyMapError::InvalidOption(_))
        ));
        let err = render_map(image, &MapOptions::default().smoothing(1e9), "never.png")
            .unwrap_err();
        assert!(matches!(err, SkyMapError::InvalidOption(_)));
        assert!(!Path::new("never.png").exists());
        Ok(())
    }

    #[test]
    fn null_pixel_size() {
        let wcs = SkyProjection::gnomonic([2.5, 2.5], [150., 2.], [0., 0.02]);
        let image = SkyImage::new(DMatrix::from_element(4, 4, 1.), wcs);
        let err = render_map(image, &MapOptions::default(), "never.png").unwrap_err();
        assert!(matches!(err, SkyMapError::InvalidPixelSize(_)));
        assert!(err.is_data_format());
    }

    #[test]
    fn invalid_options() {
        let image = SkyImage::new(DMatrix::from_element(4, 4, 1.), wcs());
        let err = render_map(image, &MapOptions::default().smoothing(f64::NAN), "never.png")
            .unwrap_err();
        assert!(matches!(err, SkyMapError::InvalidOption(_)));
    }

    #[test]
    fn render_png_and_svg() -> std::result::Result<(), Box<dyn Error>> {
        let mut rng = rand::thread_rng();
        let data = DMatrix::from_fn(50, 50, |_, _| rng.gen_range(-2f64..20f64));
        for ext in ["png", "svg"] {
            let path = std::env::temp_dir().join(format!("gammaview_skymap.{}", ext));
            let image = SkyImage::new(
                data.clone(),
                SkyProjection::gnomonic([25.5, 25.5], [150., 2.], [-0.02, 0.02]),
            );
            let options = MapOptions::default()
                .smoothing(0.05)
                .significance()
                .cluster(150., 2., 0.2, "Cluster")
                .pointings([(150.1, 2.1), (149.9, 1.9)])
                .point_source("PS", Some(150.3), Some(2.2))
                .point_source("Lost", None, Some(2.2))
                .psf(0.1)
                .title("Test map")
                .bar_title("Significance");
            let report = match image.render(&options, &path) {
                Err(e) if crate::style::missing_fonts(&e) => {
                    eprintln!("skipping {:?}: {}", path, e);
                    let _ = std::fs::remove_file(path);
                    continue;
                }
                result => result?,
            };
            assert_eq!(report.output.as_deref(), Some(path.as_path()));
            assert_eq!(report.warnings.len(), 1);
            assert!(std::fs::metadata(&path)?.len() > 0);
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
