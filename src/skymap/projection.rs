use crate::fits::{FitsError, FitsHeader};

/// Sky projection of the map pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// `TAN`: gnomonic projection on the plane tangent at the reference point
    Gnomonic,
    /// `CAR` and the other projections: linear in (RA,Dec) about the reference point
    PlateCarree,
}
impl Projection {
    fn from_ctype(ctype: &str) -> Self {
        match ctype.rsplit('-').next().map(str::trim) {
            Some("TAN") => Projection::Gnomonic,
            Some("CAR") | Some("") | None => Projection::PlateCarree,
            Some(other) => {
                log::warn!(
                    "{} projection not supported, the map is assumed linear in (RA,Dec)",
                    other
                );
                Projection::PlateCarree
            }
        }
    }
}

/// Pixel to sky coordinates transform
///
/// The reference pixel `crpix` follows the FITS 1-based convention while the
/// pixel coordinates of [`pixel_to_world`](SkyProjection::pixel_to_world) and
/// [`world_to_pixel`](SkyProjection::world_to_pixel) are 0-based, the center of
/// the first pixel being at (0,0). Sky coordinates are (RA,Dec) in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyProjection {
    pub crpix: [f64; 2],
    pub crval: [f64; 2],
    pub cdelt: [f64; 2],
    pub projection: Projection,
}
impl SkyProjection {
    /// Creates a tangent plane projection
    pub fn gnomonic(crpix: [f64; 2], crval: [f64; 2], cdelt: [f64; 2]) -> Self {
        Self {
            crpix,
            crval,
            cdelt,
            projection: Projection::Gnomonic,
        }
    }
    /// Creates a plate carrée projection
    pub fn plate_carree(crpix: [f64; 2], crval: [f64; 2], cdelt: [f64; 2]) -> Self {
        Self {
            crpix,
            crval,
            cdelt,
            projection: Projection::PlateCarree,
        }
    }
    /// Reads the projection from the `CRPIXi`, `CRVALi`, `CDELTi` (or `CDi_i`) and `CTYPE1` keywords
    pub fn from_header(header: &FitsHeader) -> Result<Self, FitsError> {
        let cdelt = |i: usize| -> Result<f64, FitsError> {
            let key = format!("CDELT{}", i);
            let value = match header.get(&key) {
                Some(_) => header.real(&key)?,
                None => header.real(&format!("CD{0}_{0}", i))?,
            };
            if value == 0. || !value.is_finite() {
                return Err(FitsError::InvalidKeyword(key, value.to_string()));
            }
            Ok(value)
        };
        Ok(Self {
            crpix: [header.real("CRPIX1")?, header.real("CRPIX2")?],
            crval: [header.real("CRVAL1")?, header.real("CRVAL2")?],
            cdelt: [cdelt(1)?, cdelt(2)?],
            projection: Projection::from_ctype(header.text("CTYPE1").unwrap_or_default()),
        })
    }
    /// Angular size of the pixels along each axis [deg]
    pub fn reso(&self) -> [f64; 2] {
        [self.cdelt[0].abs(), self.cdelt[1].abs()]
    }
    /// Converts 0-based pixel coordinates into (RA,Dec)
    pub fn pixel_to_world(&self, px: f64, py: f64) -> (f64, f64) {
        let x = (px + 1. - self.crpix[0]) * self.cdelt[0];
        let y = (py + 1. - self.crpix[1]) * self.cdelt[1];
        let [ra0, dec0] = self.crval;
        match self.projection {
            Projection::PlateCarree => ((ra0 + x).rem_euclid(360.), dec0 + y),
            Projection::Gnomonic => {
                let (x, y) = (x.to_radians(), y.to_radians());
                let (sin_d0, cos_d0) = dec0.to_radians().sin_cos();
                let den = cos_d0 - y * sin_d0;
                let ra = ra0 + x.atan2(den).to_degrees();
                let dec = (sin_d0 + y * cos_d0).atan2(x.hypot(den)).to_degrees();
                (ra.rem_euclid(360.), dec)
            }
        }
    }
    /// Converts (RA,Dec) into 0-based pixel coordinates
    ///
    /// Returns `None` for a point on the far side of the tangent plane.
    pub fn world_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let [ra0, dec0] = self.crval;
        let d_ra = (ra - ra0 + 180.).rem_euclid(360.) - 180.;
        let (x, y) = match self.projection {
            Projection::PlateCarree => (d_ra, dec - dec0),
            Projection::Gnomonic => {
                let (sin_d0, cos_d0) = dec0.to_radians().sin_cos();
                let (sin_d, cos_d) = dec.to_radians().sin_cos();
                let (sin_a, cos_a) = d_ra.to_radians().sin_cos();
                let cos_c = sin_d0 * sin_d + cos_d0 * cos_d * cos_a;
                if cos_c <= 0. {
                    return None;
                }
                (
                    (cos_d * sin_a / cos_c).to_degrees(),
                    ((cos_d0 * sin_d - sin_d0 * cos_d * cos_a) / cos_c).to_degrees(),
                )
            }
        };
        Some((
            self.crpix[0] - 1. + x / self.cdelt[0],
            self.crpix[1] - 1. + y / self.cdelt[1],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::HeaderValue;

    #[test]
    fn reference_pixel() {
        for wcs in [
            SkyProjection::gnomonic([50.5, 50.5], [150., 60.], [-0.02, 0.02]),
            SkyProjection::plate_carree([50.5, 50.5], [150., 60.], [-0.02, 0.02]),
        ] {
            let (ra, dec) = wcs.pixel_to_world(49.5, 49.5);
            assert!((ra - 150.).abs() < 1e-12 && (dec - 60.).abs() < 1e-12);
            let (px, py) = wcs.world_to_pixel(150., 60.).unwrap();
            assert!((px - 49.5).abs() < 1e-12 && (py - 49.5).abs() < 1e-12);
        }
    }

    #[test]
    fn round_trip() {
        let wcs = SkyProjection::gnomonic([100.5, 100.5], [359.9, -30.], [-0.02, 0.02]);
        for (px, py) in [(0., 0.), (199., 0.), (37.2, 150.9)] {
            let (ra, dec) = wcs.pixel_to_world(px, py);
            let (qx, qy) = wcs.world_to_pixel(ra, dec).unwrap();
            assert!((px - qx).abs() < 1e-8 && (py - qy).abs() < 1e-8);
        }
    }

    #[test]
    fn ra_increases_to_the_left() {
        let wcs = SkyProjection::gnomonic([50.5, 50.5], [10., 20.], [-0.02, 0.02]);
        let (left, _) = wcs.world_to_pixel(10.5, 20.).unwrap();
        let (right, _) = wcs.world_to_pixel(9.5, 20.).unwrap();
        assert!(left < right);
        assert!(wcs.world_to_pixel(190., -20.).is_none());
    }

    #[test]
    fn header() {
        let mut header = FitsHeader::default();
        for (key, value) in [("CRPIX1", 51.), ("CRPIX2", 51.), ("CRVAL1", 1.), ("CRVAL2", 2.)] {
            header.insert(key, HeaderValue::Real(value));
        }
        header.insert("CD1_1", HeaderValue::Real(-0.05));
        header.insert("CDELT2", HeaderValue::Real(0.05));
        header.insert("CTYPE1", HeaderValue::Text("RA---TAN".into()));
        let wcs = SkyProjection::from_header(&header).unwrap();
        assert_eq!(wcs.projection, Projection::Gnomonic);
        assert_eq!(wcs.reso(), [0.05, 0.05]);

        header.insert("CDELT2", HeaderValue::Real(0.));
        assert!(SkyProjection::from_header(&header).is_err());
    }
}
