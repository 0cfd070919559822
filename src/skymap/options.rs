use super::{
    overlay::{Overlays, PointSource, Pointings, Region, SkyCoord, Target},
    scale::{ColorMap, Normalization},
    Result, SkyMapError,
};
use crate::PlotStyle;

/// Sky map rendering options
///
/// Every option has a default: no smoothing, no significance correction,
/// color range from the data, symmetric-log normalization, `magma` color map,
/// no overlay and a 12"x12" figure.
///
/// ```
/// use gammaview::skymap::MapOptions;
///
/// let options = MapOptions::default()
///     .smoothing(0.1)
///     .linear()
///     .range(Some(0.), None)
///     .cluster(150., 2., 0.2, "A")
///     .point_source("PS", Some(150.5), Some(2.1))
///     .psf(0.08);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    /// smoothing kernel FWHM [deg]
    pub smoothing_fwhm: f64,
    pub significance: bool,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    pub normalization: Normalization,
    pub colormap: ColorMap,
    pub title: String,
    pub bar_title: String,
    pub overlays: Overlays,
    pub style: PlotStyle,
}
impl Default for MapOptions {
    fn default() -> Self {
        Self {
            smoothing_fwhm: 0.,
            significance: false,
            vmin: None,
            vmax: None,
            normalization: Normalization::default(),
            colormap: ColorMap::default(),
            title: String::new(),
            bar_title: String::new(),
            overlays: Overlays::default(),
            style: PlotStyle::default().figure_size(12., 12.),
        }
    }
}
impl MapOptions {
    /// Smoothing kernel FWHM [deg]
    pub fn smoothing(mut self, fwhm: f64) -> Self {
        self.smoothing_fwhm = fwhm;
        self
    }
    /// Scales a significance map by the smoothing noise reduction factor
    pub fn significance(mut self) -> Self {
        self.significance = true;
        self
    }
    pub fn range(mut self, vmin: Option<f64>, vmax: Option<f64>) -> Self {
        self.vmin = vmin;
        self.vmax = vmax;
        self
    }
    pub fn vmin(mut self, value: f64) -> Self {
        self.vmin = Some(value);
        self
    }
    pub fn vmax(mut self, value: f64) -> Self {
        self.vmax = Some(value);
        self
    }
    /// Linear color scale
    pub fn linear(mut self) -> Self {
        self.normalization = Normalization::Linear;
        self
    }
    pub fn normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }
    pub fn colormap(mut self, colormap: ColorMap) -> Self {
        self.colormap = colormap;
        self
    }
    pub fn title(mut self, title: impl ToString) -> Self {
        self.title = title.to_string();
        self
    }
    /// Color bar label
    pub fn bar_title(mut self, title: impl ToString) -> Self {
        self.bar_title = title.to_string();
        self
    }
    pub fn region(mut self, region: Region) -> Self {
        self.overlays.region = Some(region);
        self
    }
    pub fn center(mut self, target: Target) -> Self {
        self.overlays.center = Some(target);
        self
    }
    /// Cluster center, name and θ500 [deg] region
    pub fn cluster(self, ra: f64, dec: f64, theta500: f64, name: impl ToString) -> Self {
        self.region(Region::new(ra, dec, theta500))
            .center(Target::new(ra, dec).name(name))
    }
    pub fn pointing(mut self, ra: f64, dec: f64) -> Self {
        self.overlays.pointings = Some(Pointings::Single(SkyCoord::new(ra, dec)));
        self
    }
    pub fn pointings<I: IntoIterator<Item = (f64, f64)>>(mut self, coords: I) -> Self {
        self.overlays.pointings = Some(Pointings::List(
            coords.into_iter().map(SkyCoord::from).collect(),
        ));
        self
    }
    pub fn point_source(mut self, name: impl ToString, ra: Option<f64>, dec: Option<f64>) -> Self {
        self.overlays
            .point_sources
            .push(PointSource::new(name, ra, dec));
        self
    }
    /// PSF FWHM [deg]
    pub fn psf(mut self, fwhm: f64) -> Self {
        self.overlays.psf = Some(fwhm);
        self
    }
    pub fn style(mut self, style: PlotStyle) -> Self {
        self.style = style;
        self
    }
    /// Checks the consistency of the options
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SkyMapError::InvalidOption(msg));
        if !self.smoothing_fwhm.is_finite() || self.smoothing_fwhm < 0. {
            return invalid(format!("smoothing FWHM: {}", self.smoothing_fwhm));
        }
        if let (Some(vmin), Some(vmax)) = (self.vmin, self.vmax) {
            if !(vmin <= vmax) {
                return invalid(format!("color range: [{}, {}]", vmin, vmax));
            }
        }
        if let Normalization::SymLog { linthresh } = self.normalization {
            if !(linthresh > 0.) {
                return invalid(format!("symmetric-log linear threshold: {}", linthresh));
            }
        }
        if let Some(region) = &self.overlays.region {
            if !(region.radius >= 0.) {
                return invalid(format!("region radius: {}", region.radius));
            }
        }
        if let Some(fwhm) = self.overlays.psf {
            if !(fwhm > 0.) {
                return invalid(format!("PSF FWHM: {}", fwhm));
            }
        }
        let (w, h) = self.style.figure_size;
        if !(w > 0. && h > 0. && self.style.dpi > 0.) {
            return invalid(format!("figure size: {}x{} at {} dpi", w, h, self.style.dpi));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = MapOptions::default();
        assert_eq!(options.style.canvas(), (1200, 1200));
        assert_eq!(options.normalization, Normalization::default());
        assert_eq!(options.colormap, ColorMap::Magma);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn invalid() {
        for options in [
            MapOptions::default().smoothing(-0.1),
            MapOptions::default().range(Some(2.), Some(1.)),
            MapOptions::default().psf(0.),
            MapOptions::default().normalization(Normalization::SymLog { linthresh: 0. }),
            MapOptions::default().style(PlotStyle::default().dpi(0.)),
        ] {
            assert!(matches!(
                options.validate(),
                Err(SkyMapError::InvalidOption(_))
            ));
        }
    }

    #[test]
    fn cluster() {
        let options = MapOptions::default().cluster(10., 20., 0.3, "Coma");
        assert_eq!(options.overlays.region.as_ref().map(|r| r.radius), Some(0.3));
        assert_eq!(
            options.overlays.center.and_then(|c| c.name),
            Some("Coma".to_string())
        );
    }
}
