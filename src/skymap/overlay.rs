//! Sky map annotations
//!
//! The overlays requested by the caller ([`Overlays`]) are reduced to a list
//! of drawing primitives ([`Annotation`]) in sky coordinates. Any angular
//! radius is drawn as an ellipse stretched along RA by `1/cos(dec)` so that it
//! appears circular on the sky.

use super::projection::SkyProjection;

/// Sky coordinates [deg]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}
impl SkyCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
    /// Shifts the coordinates by (`d_ra`,`d_dec`) [deg]
    pub fn offset(&self, d_ra: f64, d_dec: f64) -> Self {
        Self::new(self.ra + d_ra, self.dec + d_dec)
    }
}
impl From<(f64, f64)> for SkyCoord {
    fn from((ra, dec): (f64, f64)) -> Self {
        Self::new(ra, dec)
    }
}

/// RA stretch `1/cos(dec)` of an angular distance at declination `dec` [deg]
pub fn dec_stretch(dec: f64) -> f64 {
    dec.to_radians().cos().recip()
}

/// Ellipse aligned with the RA and Dec axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyEllipse {
    pub center: SkyCoord,
    /// full extent along RA [deg]
    pub width: f64,
    /// full extent along Dec [deg]
    pub height: f64,
}
impl SkyEllipse {
    /// Sky circle of angular `radius` [deg]
    pub fn circle(center: SkyCoord, radius: f64) -> Self {
        Self {
            center,
            width: 2. * radius * dec_stretch(center.dec),
            height: 2. * radius,
        }
    }
    pub fn ra_half_width(&self) -> f64 {
        0.5 * self.width
    }
    pub fn dec_half_height(&self) -> f64 {
        0.5 * self.height
    }
    /// `n` points regularly spaced along the ellipse
    pub fn outline(&self, n: usize) -> Vec<SkyCoord> {
        (0..n)
            .map(|i| {
                let (s, c) = (2. * std::f64::consts::PI * i as f64 / n as f64).sin_cos();
                self.center
                    .offset(self.ra_half_width() * c, self.dec_half_height() * s)
            })
            .collect()
    }
}

/// Annotation colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    LightGray,
    White,
    Cyan,
    Green,
}
impl Tint {
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Tint::LightGray => (211, 211, 211),
            Tint::White => (255, 255, 255),
            Tint::Cyan => (0, 255, 255),
            Tint::Green => (0, 128, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EllipseStyle {
    /// dashed outline
    Dashed,
    /// filled with a white outline
    Filled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Cross,
    Ring,
}

/// Text anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Center,
    LeftCenter,
    LeftBottom,
}

/// Drawing primitive in sky coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Ellipse {
        shape: SkyEllipse,
        style: EllipseStyle,
        tint: Tint,
    },
    Marker {
        at: SkyCoord,
        kind: MarkerKind,
        tint: Tint,
        /// marker area [pt²]
        size: f64,
    },
    Label {
        at: SkyCoord,
        text: String,
        tint: Tint,
        /// font size [pt]
        size: f64,
        anchor: Anchor,
    },
}

const LABEL_SIZE: f64 = 10.;
const PSF_LABEL_SIZE: f64 = 12.;
const CROSS_SIZE: f64 = 100.;
const RING_SIZE: f64 = 200.;

/// Characteristic radius of a source, shown as a dashed circle
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub center: SkyCoord,
    /// angular radius [deg]
    pub radius: f64,
    pub label: String,
}
impl Region {
    pub fn new(ra: f64, dec: f64, radius: f64) -> Self {
        Self {
            center: SkyCoord::new(ra, dec),
            radius,
            label: String::from("R500"),
        }
    }
    pub fn label(mut self, label: impl ToString) -> Self {
        self.label = label.to_string();
        self
    }
    fn annotations(&self) -> Vec<Annotation> {
        vec![
            Annotation::Ellipse {
                shape: SkyEllipse::circle(self.center, self.radius),
                style: EllipseStyle::Dashed,
                tint: Tint::LightGray,
            },
            Annotation::Label {
                at: self.center.offset(-self.radius, -self.radius),
                text: self.label.clone(),
                tint: Tint::LightGray,
                size: LABEL_SIZE,
                anchor: Anchor::Center,
            },
        ]
    }
}

/// Telescope pointing(s)
#[derive(Debug, Clone, PartialEq)]
pub enum Pointings {
    Single(SkyCoord),
    List(Vec<SkyCoord>),
}
impl Pointings {
    fn annotations(&self) -> Vec<Annotation> {
        let (coords, text) = match self {
            Pointings::Single(coord) => (std::slice::from_ref(coord), "Pointing"),
            Pointings::List(coords) => (coords.as_slice(), "Pointings"),
        };
        let mut annotations: Vec<_> = coords
            .iter()
            .map(|&at| Annotation::Marker {
                at,
                kind: MarkerKind::Cross,
                tint: Tint::White,
                size: CROSS_SIZE,
            })
            .collect();
        if let Some(first) = coords.first() {
            annotations.push(Annotation::Label {
                at: first.offset(0., 0.2),
                text: text.to_string(),
                tint: Tint::White,
                size: LABEL_SIZE,
                anchor: Anchor::Center,
            });
        }
        annotations
    }
}

/// Named target center
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub center: SkyCoord,
    pub name: Option<String>,
}
impl Target {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self {
            center: SkyCoord::new(ra, dec),
            name: None,
        }
    }
    pub fn name(mut self, name: impl ToString) -> Self {
        self.name = Some(name.to_string());
        self
    }
    fn annotations(&self) -> Vec<Annotation> {
        let mut annotations = vec![Annotation::Marker {
            at: self.center,
            kind: MarkerKind::Cross,
            tint: Tint::Cyan,
            size: CROSS_SIZE,
        }];
        if let Some(name) = &self.name {
            annotations.push(Annotation::Label {
                at: self.center.offset(0., -0.2),
                text: name.clone(),
                tint: Tint::Cyan,
                size: LABEL_SIZE,
                anchor: Anchor::Center,
            });
        }
        annotations
    }
}

/// Point source, skipped if any of its coordinates is missing
#[derive(Debug, Clone, PartialEq)]
pub struct PointSource {
    pub name: String,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
}
impl PointSource {
    pub fn new(name: impl ToString, ra: Option<f64>, dec: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            ra,
            dec,
        }
    }
    fn annotations(&self) -> Vec<Annotation> {
        let (Some(ra), Some(dec)) = (self.ra, self.dec) else {
            return vec![];
        };
        let at = SkyCoord::new(ra, dec);
        vec![
            Annotation::Marker {
                at,
                kind: MarkerKind::Ring,
                tint: Tint::Green,
                size: RING_SIZE,
            },
            Annotation::Label {
                at: at.offset(-0.1, 0.1),
                text: self.name.clone(),
                tint: Tint::Green,
                size: LABEL_SIZE,
                anchor: Anchor::LeftBottom,
            },
        ]
    }
}

/// PSF size glyph in the lower corner of the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsfGlyph {
    pub shape: SkyEllipse,
    pub label_at: SkyCoord,
}
impl PsfGlyph {
    /// Places a glyph of the PSF `fwhm` [deg] with respect to the map reference point
    pub fn new(fwhm: f64, wcs: &SkyProjection) -> Self {
        let dec = wcs.crval[1] - wcs.crpix[1] * wcs.cdelt[1] + 0.3;
        let stretch = dec_stretch(dec);
        let ra = wcs.crval[0] - wcs.crpix[0] * wcs.cdelt[0] * stretch;
        Self {
            shape: SkyEllipse {
                center: SkyCoord::new(ra - 0.3, dec),
                width: fwhm * stretch,
                height: fwhm,
            },
            label_at: SkyCoord::new(ra - 0.6, dec),
        }
    }
    fn annotations(&self) -> Vec<Annotation> {
        vec![
            Annotation::Ellipse {
                shape: self.shape,
                style: EllipseStyle::Filled,
                tint: Tint::LightGray,
            },
            Annotation::Label {
                at: self.label_at,
                text: String::from("PSF"),
                tint: Tint::White,
                size: PSF_LABEL_SIZE,
                anchor: Anchor::LeftCenter,
            },
        ]
    }
}

/// Optional map overlays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlays {
    pub region: Option<Region>,
    pub pointings: Option<Pointings>,
    pub center: Option<Target>,
    pub point_sources: Vec<PointSource>,
    /// PSF FWHM [deg]
    pub psf: Option<f64>,
}
impl Overlays {
    /// Returns the drawing primitives, back to front
    pub fn annotations(&self, wcs: &SkyProjection) -> Vec<Annotation> {
        let mut annotations = vec![];
        if let Some(region) = &self.region {
            annotations.extend(region.annotations());
        }
        if let Some(pointings) = &self.pointings {
            annotations.extend(pointings.annotations());
        }
        if let Some(center) = &self.center {
            annotations.extend(center.annotations());
        }
        annotations.extend(self.point_sources.iter().flat_map(PointSource::annotations));
        if let Some(fwhm) = self.psf {
            annotations.extend(PsfGlyph::new(fwhm, wcs).annotations());
        }
        annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wcs() -> SkyProjection {
        SkyProjection::gnomonic([100., 100.], [150., 2.], [-0.02, 0.02])
    }

    #[test]
    fn region_stretch() {
        let region = SkyEllipse::circle(SkyCoord::new(10., 60.), 0.5);
        assert!((region.ra_half_width() - 1.).abs() < 1e-12);
        assert_eq!(region.dec_half_height(), 0.5);
        let outline = region.outline(4);
        assert!((outline[0].ra - 11.).abs() < 1e-12);
        assert!((outline[1].dec - 60.5).abs() < 1e-12);
    }

    #[test]
    fn region_label() {
        let annotations = Region::new(10., 60., 0.5).annotations();
        match &annotations[1] {
            Annotation::Label { at, text, .. } => {
                assert_eq!(text, "R500");
                assert_eq!((at.ra, at.dec), (9.5, 59.5));
            }
            other => panic!("expected a label, found {:?}", other),
        }
    }

    #[test]
    fn missing_point_source() {
        let overlays = Overlays {
            point_sources: vec![
                PointSource::new("A", Some(150.), Some(2.)),
                PointSource::new("B", None, Some(2.)),
                PointSource::new("C", Some(151.), None),
            ],
            ..Default::default()
        };
        let labels: Vec<_> = overlays
            .annotations(&wcs())
            .into_iter()
            .filter_map(|a| match a {
                Annotation::Label { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["A".to_string()]);
    }

    #[test]
    fn pointings_label() {
        let single = Pointings::Single(SkyCoord::new(1., 2.)).annotations();
        assert_eq!(single.len(), 2);
        let list = Pointings::List(vec![(1., 2.).into(), (3., 4.).into(), (5., 6.).into()])
            .annotations();
        assert_eq!(list.len(), 4);
        match list.last() {
            Some(Annotation::Label { at, text, .. }) => {
                assert_eq!(text, "Pointings");
                assert_eq!(at.ra, 1.);
                assert!((at.dec - 2.2).abs() < 1e-12);
            }
            other => panic!("expected a label, found {:?}", other),
        }
        match &single[1] {
            Annotation::Label { text, .. } => assert_eq!(text, "Pointing"),
            other => panic!("expected a label, found {:?}", other),
        }
    }

    #[test]
    fn psf_glyph() {
        let glyph = PsfGlyph::new(0.1, &wcs());
        // 2 - 100·0.02 + 0.3
        assert!((glyph.shape.center.dec - 0.3).abs() < 1e-12);
        let stretch = dec_stretch(0.3);
        assert!((glyph.shape.center.ra - (149.7 + 2. * stretch)).abs() < 1e-12);
        assert!((glyph.shape.width - 0.1 * stretch).abs() < 1e-15);
        assert!((glyph.label_at.ra - (glyph.shape.center.ra - 0.3)).abs() < 1e-12);
    }

    #[test]
    fn empty() {
        assert!(Overlays::default().annotations(&wcs()).is_empty());
    }
}
