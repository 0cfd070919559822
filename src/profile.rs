//! Radial profile plot
//!
//! In log scale the positive and the negative values of the profile are shown
//! separately, the latter as absolute values.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
    time::Instant,
};

use plotters::{coord::Shift, prelude::*};
use serde::Deserialize;

use crate::{
    style::{save, Figure},
    PlotStyle,
};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to open the profile file {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to deserialize the profile table")]
    Csv(#[from] csv::Error),
    #[error("the profile has no value to plot")]
    Empty,
    #[error("failed to draw the profile: {0}")]
    Plot(String),
}
type Result<T> = std::result::Result<T, ProfileError>;

fn plot_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> ProfileError {
    ProfileError::Plot(e.to_string())
}

/// Profile value at a given radius
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ProfileSample {
    pub radius: f64,
    pub profile: f64,
    pub error: f64,
}

const ORANGE: RGBColor = RGBColor(255, 165, 0);
// number of dashes of the θ500 line
const N_DASH: usize = 20;

/// Radial profile
#[derive(Debug, Clone, PartialEq)]
pub struct RadialProfile {
    samples: Vec<ProfileSample>,
    radius_unit: String,
    profile_unit: String,
    theta500: Option<f64>,
    logscale: bool,
    style: PlotStyle,
}
impl From<Vec<ProfileSample>> for RadialProfile {
    fn from(samples: Vec<ProfileSample>) -> Self {
        Self {
            samples,
            radius_unit: String::from("deg"),
            profile_unit: String::new(),
            theta500: None,
            logscale: true,
            style: PlotStyle::default(),
        }
    }
}
impl RadialProfile {
    /// Loads the profile from a CSV table with the columns `radius`, `profile` and `error`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let now = Instant::now();
        let file = File::open(path).map_err(|e| ProfileError::Io(e, path.to_path_buf()))?;
        let this = Self::from_reader(BufReader::new(file))?;
        log::info!("... loaded in {:}ms", now.elapsed().as_millis());
        Ok(this)
    }
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let samples = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<ProfileSample>, csv::Error>>()?;
        Ok(Self::from(samples))
    }
    /// Radius and profile units
    pub fn units(mut self, radius: impl ToString, profile: impl ToString) -> Self {
        self.radius_unit = radius.to_string();
        self.profile_unit = profile.to_string();
        self
    }
    /// θ500 [radius unit]
    pub fn theta500(mut self, value: f64) -> Self {
        self.theta500 = Some(value);
        self
    }
    pub fn linear(mut self) -> Self {
        self.logscale = false;
        self
    }
    pub fn style(mut self, style: PlotStyle) -> Self {
        self.style = style;
        self
    }
    pub fn samples(&self) -> &[ProfileSample] {
        &self.samples
    }
    /// Returns the samples with a positive and a negative profile, the latter with the profile absolute value
    pub fn split_signs(&self) -> (Vec<ProfileSample>, Vec<ProfileSample>) {
        let (positive, negative): (Vec<_>, Vec<_>) = self
            .samples
            .iter()
            .copied()
            .filter(|s| s.radius > 0. && s.profile != 0. && s.profile.is_finite())
            .partition(|s| s.profile > 0.);
        (
            positive,
            negative
                .into_iter()
                .map(|s| ProfileSample {
                    profile: -s.profile,
                    ..s
                })
                .collect(),
        )
    }
    fn radius_max(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| s.radius)
            .filter(|r| r.is_finite())
            .reduce(f64::max)
    }
    /// Plots the profile into `path`
    pub fn plot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        // no output file without values to plot
        self.check()?;
        log::info!("Writing {:?}...", path);
        let now = Instant::now();
        save(self, path, self.style.canvas())?;
        log::info!("... written in {:}ms", now.elapsed().as_millis());
        Ok(())
    }
    fn check(&self) -> Result<()> {
        let has_values = if self.logscale {
            let (positive, negative) = self.split_signs();
            !(positive.is_empty() && negative.is_empty())
        } else {
            self.samples.iter().any(|s| s.profile.is_finite())
        };
        if has_values {
            Ok(())
        } else {
            Err(ProfileError::Empty)
        }
    }
    fn draw_log<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()> {
        let (positive, negative) = self.split_signs();
        let (p_min, p_max) = positive.iter().chain(&negative).fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(p_min, p_max), s| (p_min.min(s.profile), p_max.max(s.profile + s.error.abs())),
        );
        if p_min > p_max {
            return Err(ProfileError::Empty);
        }
        let r_min = self
            .samples
            .iter()
            .map(|s| s.radius)
            .filter(|&r| r > 0.)
            .fold(f64::INFINITY, f64::min);
        let r_max = self.radius_max().unwrap_or(r_min).max(r_min * 2.);
        let (p_lo, p_hi) = (0.5 * p_min, 2. * p_max);
        let mut chart = self
            .chart_builder(root)
            .build_cartesian_2d(
                (0.5 * r_min..r_max).log_scale(),
                (p_lo..p_hi).log_scale(),
            )
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc(format!("Radius ({})", self.radius_unit))
            .y_desc(format!("Profile ({})", self.profile_unit))
            .label_style(self.style.font())
            .axis_desc_style(self.style.font())
            .draw()
            .map_err(plot_err)?;
        let marker = self.style.px(3.).round() as i32;
        self.draw_points(&mut chart, &positive, p_lo, BLUE, marker, Some("values > 0"))?;
        self.draw_points(&mut chart, &negative, p_lo, ORANGE, marker / 2, Some("values < 0"))?;
        let dashes = dashes((p_lo.ln(), p_hi.ln()), N_DASH)
            .into_iter()
            .map(|(a, b)| (a.exp(), b.exp()))
            .collect();
        self.finish(&mut chart, dashes)
    }
    fn draw_linear<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()> {
        let samples: Vec<_> = self
            .samples
            .iter()
            .copied()
            .filter(|s| s.profile.is_finite() && s.radius.is_finite())
            .collect();
        let (p_min, p_max) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(p_min, p_max), s| {
                (
                    p_min.min(s.profile - s.error.abs()),
                    p_max.max(s.profile + s.error.abs()),
                )
            },
        );
        if p_min > p_max {
            return Err(ProfileError::Empty);
        }
        let pad = if p_max > p_min { 0.05 * (p_max - p_min) } else { 1. };
        let (p_lo, p_hi) = (p_min - pad, p_max + pad);
        let r_max = self
            .radius_max()
            .filter(|&r| r > 0.)
            .or(self.theta500)
            .unwrap_or(1.);
        let mut chart = self
            .chart_builder(root)
            .build_cartesian_2d(0f64..r_max, p_lo..p_hi)
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc(format!("Radius ({})", self.radius_unit))
            .y_desc(format!("Profile ({})", self.profile_unit))
            .label_style(self.style.font())
            .axis_desc_style(self.style.font())
            .draw()
            .map_err(plot_err)?;
        let marker = self.style.px(3.).round() as i32;
        self.draw_points(&mut chart, &samples, p_lo, BLUE, marker, None)?;
        self.finish(&mut chart, dashes((p_lo, p_hi), N_DASH))
    }
    fn chart_builder<'a, 'b, DB: DrawingBackend>(
        &'b self,
        root: &'a DrawingArea<DB, Shift>,
    ) -> ChartBuilder<'a, 'b, DB> {
        let mut builder = ChartBuilder::on(root);
        builder
            .margin(self.style.px(10.).round() as u32)
            .x_label_area_size(self.style.label_area())
            .y_label_area_size(self.style.label_area());
        builder
    }
    /// Draws the samples with their error bars, the lower bars being clipped at `floor`
    fn draw_points<'a, DB, X, Y>(
        &self,
        chart: &mut ChartContext<'a, DB, Cartesian2d<X, Y>>,
        samples: &[ProfileSample],
        floor: f64,
        color: RGBColor,
        radius: i32,
        label: Option<&str>,
    ) -> Result<()>
    where
        DB: DrawingBackend + 'a,
        X: Ranged<ValueType = f64>,
        Y: Ranged<ValueType = f64>,
    {
        let line = self.style.px(1.).round() as u32;
        chart
            .draw_series(samples.iter().map(|s| {
                ErrorBar::new_vertical(
                    s.radius,
                    (s.profile - s.error.abs()).max(floor),
                    s.profile,
                    s.profile + s.error.abs(),
                    color.stroke_width(line),
                    2 * radius as u32,
                )
            }))
            .map_err(plot_err)?;
        let series = chart
            .draw_series(
                samples
                    .iter()
                    .map(|s| Circle::new((s.radius, s.profile), radius, color.filled())),
            )
            .map_err(plot_err)?;
        if let Some(label) = label {
            series
                .label(label)
                .legend(move |(x, y)| Circle::new((x, y), radius, color.filled()));
        }
        Ok(())
    }
    /// Draws the θ500 line and the legend
    fn finish<'a, DB, X, Y>(
        &self,
        chart: &mut ChartContext<'a, DB, Cartesian2d<X, Y>>,
        dashes: Vec<(f64, f64)>,
    ) -> Result<()>
    where
        DB: DrawingBackend + 'a,
        X: Ranged<ValueType = f64>,
        Y: Ranged<ValueType = f64>,
    {
        let line = self.style.px(1.5).round() as u32;
        let mut labelled = self.logscale;
        if let Some(theta500) = self.theta500 {
            chart
                .draw_series(dashes.into_iter().map(|(y0, y1)| {
                    PathElement::new(vec![(theta500, y0), (theta500, y1)], BLACK.stroke_width(line))
                }))
                .map_err(plot_err)?
                .label("θ500")
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x - 10, y), (x + 10, y)], BLACK.stroke_width(line))
                });
            labelled = true;
        }
        if labelled {
            chart
                .configure_series_labels()
                .label_font(self.style.font())
                .border_style(&BLACK)
                .background_style(&WHITE.mix(0.8))
                .position(SeriesLabelPosition::UpperRight)
                .draw()
                .map_err(plot_err)?;
        }
        Ok(())
    }
}
impl Figure for RadialProfile {
    type Error = ProfileError;

    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>) -> Result<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        if self.logscale {
            self.draw_log(&root)?;
        } else {
            self.draw_linear(&root)?;
        }
        root.present().map_err(plot_err)?;
        Ok(())
    }
}

/// Splits `[lo, hi]` into `n` dashes separated by gaps of the same length
fn dashes((lo, hi): (f64, f64), n: usize) -> Vec<(f64, f64)> {
    let step = (hi - lo) / (2 * n - 1) as f64;
    (0..n)
        .map(|i| {
            let a = lo + 2. * i as f64 * step;
            (a, a + step)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "radius, profile, error
0.01, 10.0, 1.0
0.05, 2.0, 0.5
0.1, -0.5, 0.3
0.2, 0.0, 0.1
0.5, 0.01, 0.02
";

    #[test]
    fn from_reader() {
        let profile = RadialProfile::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(profile.samples().len(), 5);
        assert_eq!(profile.samples()[2].profile, -0.5);
        assert_eq!(profile.radius_max(), Some(0.5));
    }

    #[test]
    fn signs() {
        let profile = RadialProfile::from_reader(TABLE.as_bytes()).unwrap();
        let (positive, negative) = profile.split_signs();
        assert_eq!(positive.len(), 3);
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].profile, 0.5);
        assert_eq!(negative[0].radius, 0.1);
    }

    #[test]
    fn dash_pattern() {
        let d = dashes((0., 3.), 2);
        assert_eq!(d, vec![(0., 1.), (2., 3.)]);
    }

    #[test]
    fn empty() {
        let profile = RadialProfile::from(vec![ProfileSample {
            radius: 0.1,
            profile: 0.,
            error: 0.1,
        }]);
        assert!(matches!(profile.check(), Err(ProfileError::Empty)));
        assert!(profile.clone().linear().check().is_ok());
        assert!(matches!(
            RadialProfile::from(vec![]).linear().check(),
            Err(ProfileError::Empty)
        ));
        assert!(matches!(
            RadialProfile::from_reader("radius, profile\n1, 2\n".as_bytes()),
            Err(ProfileError::Csv(_))
        ));
    }

    #[test]
    fn plot() -> std::result::Result<(), Box<dyn std::error::Error>> {
        for (name, profile) in [
            (
                "gammaview_profile_log.png",
                RadialProfile::from_reader(TABLE.as_bytes())?,
            ),
            (
                "gammaview_profile_lin.svg",
                RadialProfile::from_reader(TABLE.as_bytes())?.linear(),
            ),
        ] {
            let path = std::env::temp_dir().join(name);
            match profile.units("deg", "cm-3").theta500(0.3).plot(&path) {
                Err(e) if crate::style::missing_fonts(&e) => {
                    eprintln!("skipping {}: {}", name, e);
                    let _ = std::fs::remove_file(path);
                    continue;
                }
                result => result?,
            }
            assert!(path.exists());
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
