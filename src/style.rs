use std::path::Path;

use plotters::{
    coord::Shift,
    prelude::{BitMapBackend, DrawingArea, DrawingBackend, IntoDrawingArea, SVGBackend},
    style::{FontDesc, IntoFont},
};

/// Plot style shared by all the figures
///
/// Font sizes are in points and the figure size in inches, both converted to
/// pixels with the resolution `dpi`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub font_family: String,
    pub font_size: f64,
    pub title_size: f64,
    pub figure_size: (f64, f64),
    pub dpi: f64,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            font_family: String::from("serif"),
            font_size: 16.,
            title_size: 16.,
            figure_size: (8., 6.),
            dpi: 100.,
        }
    }
}
impl PlotStyle {
    pub fn font_family(mut self, value: impl ToString) -> Self {
        self.font_family = value.to_string();
        self
    }
    pub fn font_size(mut self, value: f64) -> Self {
        self.font_size = value;
        self
    }
    pub fn title_size(mut self, value: f64) -> Self {
        self.title_size = value;
        self
    }
    pub fn figure_size(mut self, width: f64, height: f64) -> Self {
        self.figure_size = (width, height);
        self
    }
    pub fn dpi(mut self, value: f64) -> Self {
        self.dpi = value;
        self
    }
    /// Converts a length in points into pixels
    pub fn px(&self, points: f64) -> f64 {
        points * self.dpi / 72.
    }
    /// Figure size in pixels
    pub fn canvas(&self) -> (u32, u32) {
        let (w, h) = self.figure_size;
        (
            (w * self.dpi).round().max(1.) as u32,
            (h * self.dpi).round().max(1.) as u32,
        )
    }
    /// Size of the axis label areas in pixels
    pub(crate) fn label_area(&self) -> u32 {
        self.px(4. * self.font_size).round() as u32
    }
    pub(crate) fn font(&self) -> FontDesc<'_> {
        self.font_at(self.font_size)
    }
    pub(crate) fn title_font(&self) -> FontDesc<'_> {
        self.font_at(self.title_size)
    }
    pub(crate) fn font_at(&self, points: f64) -> FontDesc<'_> {
        (self.font_family.as_str(), self.px(points)).into_font()
    }
}

/// A figure that can be drawn on any plotters backend
pub(crate) trait Figure {
    type Error;
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>) -> Result<(), Self::Error>;
}

/// Returns true if the file extension selects the SVG backend
pub(crate) fn is_svg(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}

/// Saves a figure of `size` pixels into `path`, as SVG if the extension is `svg` or as PNG otherwise
pub(crate) fn save<F: Figure>(figure: &F, path: &Path, size: (u32, u32)) -> Result<(), F::Error> {
    if is_svg(path) {
        figure.draw(SVGBackend::new(path, size).into_drawing_area())
    } else {
        figure.draw(BitMapBackend::new(path, size).into_drawing_area())
    }
}

/// Returns true if a drawing failed because no system font could be loaded
#[cfg(test)]
pub(crate) fn missing_fonts<E: std::fmt::Display>(error: &E) -> bool {
    let message = error.to_string();
    message.contains("Font loading error") || message.contains("No such font")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas() {
        let style = PlotStyle::default().figure_size(12., 12.);
        assert_eq!(style.canvas(), (1200, 1200));
        assert!((PlotStyle::default().dpi(72.).px(10.) - 10.).abs() < 1e-12);
    }

    #[test]
    fn backend() {
        assert!(is_svg(Path::new("map.SVG")));
        assert!(!is_svg(Path::new("map.png")));
        assert!(!is_svg(Path::new("svg")));
    }

    #[test]
    fn font_errors() {
        assert!(missing_fonts(
            &"failed to draw: backend error: Font loading error: No such font: serif regular"
        ));
        assert!(!missing_fonts(&"failed to draw: Bad layout"));
    }
}
