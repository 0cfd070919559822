//! Pointing pattern of an observation
//!
//! Each pointing is shown as a cross surrounded by its region of interest,
//! the colors of the pointings being sampled along a continuous color map.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
    time::Instant,
};

use plotters::{coord::Shift, prelude::*};
use serde::Deserialize;

use crate::{
    skymap::{
        overlay::{dec_stretch, SkyCoord, SkyEllipse},
        ColorMap,
    },
    style::{save, Figure},
    PlotStyle,
};

#[derive(Debug, thiserror::Error)]
pub enum PointingsError {
    #[error("failed to open the pointings file {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to deserialize the pointings table")]
    Csv(#[from] csv::Error),
    #[error("no pointing with a region of interest")]
    Empty,
    #[error("failed to draw the pointings: {0}")]
    Plot(String),
}
type Result<T> = std::result::Result<T, PointingsError>;

fn plot_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> PointingsError {
    PointingsError::Plot(e.to_string())
}

#[derive(Deserialize, Debug)]
struct Record {
    obsid: String,
    ra: f64,
    dec: f64,
    roi_ra: Option<f64>,
    roi_dec: Option<f64>,
    roi_rad: Option<f64>,
}

/// Region of interest of an observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub center: SkyCoord,
    /// radius [deg]
    pub radius: f64,
}

/// Telescope pointing
#[derive(Debug, Clone, PartialEq)]
pub struct Pointing {
    pub obsid: String,
    pub coord: SkyCoord,
    pub roi: Option<Roi>,
}
impl Pointing {
    pub fn new(obsid: impl ToString, ra: f64, dec: f64) -> Self {
        Self {
            obsid: obsid.to_string(),
            coord: SkyCoord::new(ra, dec),
            roi: None,
        }
    }
    pub fn roi(mut self, ra: f64, dec: f64, radius: f64) -> Self {
        self.roi = Some(Roi {
            center: SkyCoord::new(ra, dec),
            radius,
        });
        self
    }
    /// Region of interest outline, stretched along RA at the pointing declination
    pub fn roi_ellipse(&self) -> Option<SkyEllipse> {
        self.roi.map(|roi| SkyEllipse {
            center: roi.center,
            width: 2. * roi.radius * dec_stretch(self.coord.dec),
            height: 2. * roi.radius,
        })
    }
}
impl From<Record> for Pointing {
    fn from(record: Record) -> Self {
        let pointing = Pointing::new(record.obsid, record.ra, record.dec);
        match (record.roi_ra, record.roi_dec, record.roi_rad) {
            (Some(ra), Some(dec), Some(radius)) => pointing.roi(ra, dec, radius),
            _ => pointing,
        }
    }
}

/// Sky area covered by the regions of interest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub center: SkyCoord,
    /// field of view along RA and Dec [deg]
    pub fov: (f64, f64),
}
impl Extent {
    pub fn ra_range(&self) -> std::ops::Range<f64> {
        self.center.ra - 0.5 * self.fov.0..self.center.ra + 0.5 * self.fov.0
    }
    pub fn dec_range(&self) -> std::ops::Range<f64> {
        self.center.dec - 0.5 * self.fov.1..self.center.dec + 0.5 * self.fov.1
    }
}

/// Observation pointings
#[derive(Debug, Clone, PartialEq)]
pub struct PointingPattern {
    pointings: Vec<Pointing>,
    style: PlotStyle,
    colormap: ColorMap,
}
impl Default for PointingPattern {
    fn default() -> Self {
        Self::from(vec![])
    }
}
impl From<Vec<Pointing>> for PointingPattern {
    fn from(pointings: Vec<Pointing>) -> Self {
        Self {
            pointings,
            style: PlotStyle::default().figure_size(20., 20.),
            colormap: ColorMap::Turbo,
        }
    }
}
impl PointingPattern {
    /// Loads the pointings from a CSV table with the columns `obsid`, `ra`, `dec`, `roi_ra`, `roi_dec` and `roi_rad`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let now = Instant::now();
        let file = File::open(path).map_err(|e| PointingsError::Io(e, path.to_path_buf()))?;
        let this = Self::from_reader(BufReader::new(file))?;
        log::info!("... loaded in {:}ms", now.elapsed().as_millis());
        Ok(this)
    }
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut pointings = vec![];
        for result in rdr.deserialize() {
            let record: Record = result?;
            pointings.push(record.into());
        }
        Ok(Self::from(pointings))
    }
    pub fn style(mut self, style: PlotStyle) -> Self {
        self.style = style;
        self
    }
    pub fn colormap(mut self, colormap: ColorMap) -> Self {
        self.colormap = colormap;
        self
    }
    pub fn len(&self) -> usize {
        self.pointings.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pointings.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Pointing> {
        self.pointings.iter()
    }
    /// Returns the area covered by the regions of interest with a 10% margin
    pub fn extent(&self) -> Result<Extent> {
        let (mut ra_min, mut ra_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut dec_min, mut dec_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for ellipse in self.pointings.iter().filter_map(Pointing::roi_ellipse) {
            ra_min = ra_min.min(ellipse.center.ra - ellipse.ra_half_width());
            ra_max = ra_max.max(ellipse.center.ra + ellipse.ra_half_width());
            dec_min = dec_min.min(ellipse.center.dec - ellipse.dec_half_height());
            dec_max = dec_max.max(ellipse.center.dec + ellipse.dec_half_height());
        }
        if ra_min > ra_max {
            return Err(PointingsError::Empty);
        }
        let center = SkyCoord::new(0.5 * (ra_max + ra_min), 0.5 * (dec_max + dec_min));
        Ok(Extent {
            center,
            fov: (
                (ra_max - ra_min) * 1.1 * dec_stretch(center.dec),
                (dec_max - dec_min) * 1.1,
            ),
        })
    }
    /// Plots the pointings into `path`
    pub fn plot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        // no output file without a region of interest
        self.extent()?;
        log::info!("Writing {:?}...", path);
        let now = Instant::now();
        save(self, path, self.style.canvas())?;
        log::info!("... written in {:}ms", now.elapsed().as_millis());
        Ok(())
    }
}

// number of vertices of the regions of interest
const N_OUTLINE: usize = 96;

impl Figure for PointingPattern {
    type Error = PointingsError;

    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>) -> Result<()> {
        let extent = self.extent()?;
        let style = &self.style;
        root.fill(&WHITE).map_err(plot_err)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(style.px(10.).round() as u32)
            .x_label_area_size(style.label_area())
            .y_label_area_size(style.label_area())
            .build_cartesian_2d(extent.ra_range(), extent.dec_range())
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc("R.A. (deg)")
            .y_desc("Dec. (deg)")
            .label_style(style.font())
            .axis_desc_style(style.font())
            .draw()
            .map_err(plot_err)?;

        let colors = self.colormap.sample(self.len());
        let cross = style.px(0.5 * 150f64.sqrt()).round() as i32;
        let line = style.px(1.).round() as u32;
        for (pointing, &color) in self.pointings.iter().zip(&colors) {
            let xy = (pointing.coord.ra, pointing.coord.dec);
            chart
                .plotting_area()
                .draw(&Cross::new(xy, cross, color.stroke_width(2 * line)))
                .map_err(plot_err)?;
            let Some(ellipse) = pointing.roi_ellipse() else {
                continue;
            };
            let outline: Vec<_> = ellipse
                .outline(N_OUTLINE)
                .into_iter()
                .map(|c| (c.ra, c.dec))
                .collect();
            chart
                .draw_series(Some(Polygon::new(outline.clone(), color.mix(0.1).filled())))
                .map_err(plot_err)?
                .label(format!("ObsID{}", pointing.obsid))
                .legend(move |(x, y)| {
                    Rectangle::new([(x - 10, y - 5), (x + 10, y + 5)], color.mix(0.3).filled())
                });
            let mut edge = outline;
            edge.push(edge[0]);
            chart
                .draw_series(Some(PathElement::new(edge, color.stroke_width(line))))
                .map_err(plot_err)?;
        }
        chart
            .configure_series_labels()
            .label_font(style.font())
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.8))
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(plot_err)?;
        root.present().map_err(plot_err)?;
        Ok(())
    }
}
