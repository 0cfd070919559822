//! Quicklook of an event list
//!
//! The events are read from the `EVENTS` binary table of a FITS file or from a
//! CSV table and summarized on 4 panels: the sky coordinates, the energy and
//! arrival time histograms and the observation information.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    ops::Range,
    path::{Path, PathBuf},
    time::Instant,
};

use itertools::{izip, Itertools};
use plotters::{
    coord::{types::RangedCoordf64, Shift},
    prelude::*,
};
use serde::Deserialize;

use crate::{
    fits::{FitsError, FitsHeader, FitsTable},
    style::{save, Figure},
    PlotStyle,
};

#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    #[error("failed to open the events file {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to deserialize the events table")]
    Csv(#[from] csv::Error),
    #[error("failed to read the events FITS file")]
    Fits(#[from] FitsError),
    #[error("the event list is empty")]
    Empty,
    #[error("failed to draw the events: {0}")]
    Plot(String),
}
type Result<T> = std::result::Result<T, EventsError>;

fn plot_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> EventsError {
    EventsError::Plot(e.to_string())
}

/// Name of the binary table extension holding the events
pub const EVENTS_EXTENSION: &str = "EVENTS";
/// Maximum number of events shown on the sky panel
pub const N_SKY_POINTS: usize = 100_000;
const N_ENERGY_BINS: usize = 50;
const N_TIME_BINS: usize = 200;

/// Reconstructed photon
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// right ascension [deg]
    #[serde(alias = "RA")]
    pub ra: f64,
    /// declination [deg]
    #[serde(alias = "DEC")]
    pub dec: f64,
    #[serde(alias = "ENERGY")]
    pub energy: f64,
    /// arrival time [s]
    #[serde(alias = "TIME")]
    pub time: f64,
}

/// Observation keywords of the events table header
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationInfo {
    pub obs_id: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub livetime: Option<f64>,
    pub time_unit: String,
    pub energy_unit: String,
}
impl Default for ObservationInfo {
    fn default() -> Self {
        Self {
            obs_id: None,
            start: None,
            end: None,
            livetime: None,
            time_unit: String::from("s"),
            energy_unit: String::from("TeV"),
        }
    }
}
impl From<&FitsHeader> for ObservationInfo {
    fn from(header: &FitsHeader) -> Self {
        let text = |key: &str| header.text(key).map(str::to_string);
        let date = |date: &str, time: &str| match (text(date), text(time)) {
            (Some(date), Some(time)) => Some(format!("{}-{}", date, time)),
            (date, time) => date.or(time),
        };
        let default = Self::default();
        Self {
            obs_id: header.get("OBS_ID").and_then(|value| {
                value
                    .as_str()
                    .map(str::to_string)
                    .or_else(|| value.as_i64().map(|id| id.to_string()))
            }),
            start: date("DATE-OBS", "TIME-OBS"),
            end: date("DATE-END", "TIME-END"),
            livetime: header.real("LIVETIME").ok(),
            time_unit: text("TIMEUNIT").unwrap_or(default.time_unit),
            energy_unit: text("EUNIT").unwrap_or(default.energy_unit),
        }
    }
}

/// Histogram with evenly spaced bins
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// bin edges, one more than the counts
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}
impl Histogram {
    /// Bins the finite values into `n_bins` bins spanning their range
    ///
    /// The last bin includes its upper edge. Identical values are centered in
    /// a unit range and no value at all gives the range `[0,1]`.
    pub fn new(values: &[f64], n_bins: usize) -> Self {
        let n_bins = n_bins.max(1);
        let (lo, hi) = match values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .minmax_by(f64::total_cmp)
            .into_option()
        {
            Some((lo, hi)) if hi > lo => (lo, hi),
            Some((value, _)) => (value - 0.5, value + 0.5),
            None => (0., 1.),
        };
        let mut edges: Vec<f64> = (0..n_bins)
            .map(|i| lo + (hi - lo) * i as f64 / n_bins as f64)
            .collect();
        edges.push(hi);
        let mut counts = vec![0; n_bins];
        for value in values.iter().filter(|v| v.is_finite()) {
            let i = ((value - lo) / (hi - lo) * n_bins as f64) as usize;
            counts[i.min(n_bins - 1)] += 1;
        }
        Self { edges, counts }
    }
    pub fn range(&self) -> Range<f64> {
        self.edges[0]..self.edges[self.edges.len() - 1]
    }
    pub fn peak(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Median of the finite values
pub fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values: Vec<_> = values.filter(|v| v.is_finite()).collect();
    values.sort_by(f64::total_cmp);
    let n = values.len();
    match n {
        0 => None,
        n if n % 2 == 1 => Some(values[n / 2]),
        n => Some(0.5 * (values[n / 2 - 1] + values[n / 2])),
    }
}

// range of the finite values with a 5% margin
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    match values
        .filter(|v| v.is_finite())
        .minmax_by(f64::total_cmp)
        .into_option()
    {
        Some((lo, hi)) if hi > lo => {
            let pad = 0.05 * (hi - lo);
            lo - pad..hi + pad
        }
        Some((value, _)) => value - 0.5..value + 0.5,
        None => 0f64..1f64,
    }
}

/// Outcome of loading an event list
#[derive(Debug)]
pub enum EventsLoad {
    Loaded(EventList),
    /// the file holds no event
    Empty,
    /// the file cannot be read or misses a column
    Malformed(EventsError),
}

/// Outcome of [events_quicklook]
#[derive(Debug)]
pub enum Quicklook {
    /// the quicklook is written into the file
    Written(PathBuf),
    Empty,
    Malformed(EventsError),
}

/// Event list
#[derive(Debug, Clone, PartialEq)]
pub struct EventList {
    events: Vec<Event>,
    info: ObservationInfo,
    style: PlotStyle,
}
impl From<Vec<Event>> for EventList {
    fn from(events: Vec<Event>) -> Self {
        Self {
            events,
            info: ObservationInfo::default(),
            style: PlotStyle::default().figure_size(18., 14.),
        }
    }
}
impl EventList {
    /// Loads the events, inspecting the outcome instead of failing
    pub fn load<P: AsRef<Path>>(path: P) -> EventsLoad {
        match Self::from_path(path) {
            Ok(events) if events.is_empty() => EventsLoad::Empty,
            Ok(events) => EventsLoad::Loaded(events),
            Err(e) => EventsLoad::Malformed(e),
        }
    }
    /// Loads the events from a CSV table (`csv` extension) with the columns `ra`, `dec`, `energy` and `time`,
    /// or from the `EVENTS` extension of a FITS file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let now = Instant::now();
        let this = if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            let file = File::open(path).map_err(|e| EventsError::Io(e, path.to_path_buf()))?;
            Self::from_reader(BufReader::new(file))?
        } else {
            Self::from_table(&FitsTable::from_path(path, EVENTS_EXTENSION)?)?
        };
        log::info!("... loaded in {:}ms", now.elapsed().as_millis());
        Ok(this)
    }
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let events = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<Event>, csv::Error>>()?;
        Ok(Self::from(events))
    }
    /// Reads the `RA`, `DEC`, `ENERGY` and `TIME` columns and the observation keywords of a binary table
    pub fn from_table(table: &FitsTable) -> Result<Self> {
        let events: Vec<Event> = izip!(
            table.column("RA")?,
            table.column("DEC")?,
            table.column("ENERGY")?,
            table.column("TIME")?
        )
        .map(|(ra, dec, energy, time)| Event {
            ra,
            dec,
            energy,
            time,
        })
        .collect();
        Ok(Self::from(events).info(ObservationInfo::from(&table.header)))
    }
    pub fn info(mut self, info: ObservationInfo) -> Self {
        self.info = info;
        self
    }
    pub fn style(mut self, style: PlotStyle) -> Self {
        self.style = style;
        self
    }
    pub fn len(&self) -> usize {
        self.events.len()
    }
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
    /// Every k-th event, k being the smallest stride that keeps at most [N_SKY_POINTS] events
    pub fn sky_sample(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .step_by(self.len().div_ceil(N_SKY_POINTS).max(1))
    }
    /// Histogram of `log10(energy)`
    pub fn energy_histogram(&self) -> Histogram {
        let log_energy: Vec<_> = self
            .events
            .iter()
            .filter(|e| e.energy > 0.)
            .map(|e| e.energy.log10())
            .collect();
        Histogram::new(&log_energy, N_ENERGY_BINS)
    }
    /// Histogram of the arrival times in hours since the first event
    pub fn time_histogram(&self) -> Histogram {
        let t0 = self
            .events
            .iter()
            .map(|e| e.time)
            .filter(|t| t.is_finite())
            .fold(f64::INFINITY, f64::min);
        let hours: Vec<_> = self.events.iter().map(|e| (e.time - t0) / 3600.).collect();
        Histogram::new(&hours, N_TIME_BINS)
    }
    /// Observation information and event statistics, one entry per text line
    pub fn summary(&self) -> Vec<String> {
        let info = &self.info;
        let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| "unknown".into());
        let number = |value: Option<f64>, unit: &str| {
            value.map_or_else(|| "unknown".to_string(), |v| format!("{} {}", v, unit))
        };
        vec![
            format!("ObsID: {}", or_unknown(&info.obs_id)),
            format!("Date obs: {}", or_unknown(&info.start)),
            format!("Date end: {}", or_unknown(&info.end)),
            format!("Live time: {}", number(info.livetime, &info.time_unit)),
            String::new(),
            format!("Number of events: {}", self.len()),
            format!(
                "Median energy: {}",
                number(median(self.iter().map(|e| e.energy)), &info.energy_unit)
            ),
            format!(
                "Median R.A.: {}",
                number(median(self.iter().map(|e| e.ra)), "deg")
            ),
            format!(
                "Median Dec.: {}",
                number(median(self.iter().map(|e| e.dec)), "deg")
            ),
        ]
    }
    /// Plots the quicklook into `path`
    pub fn plot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(EventsError::Empty);
        }
        log::info!("Writing {:?}...", path);
        let now = Instant::now();
        save(self, path, self.style.canvas())?;
        log::info!("... written in {:}ms", now.elapsed().as_millis());
        Ok(())
    }
    fn chart_builder<'a, 'b, DB: DrawingBackend>(
        &'b self,
        area: &'a DrawingArea<DB, Shift>,
        caption: &str,
    ) -> ChartBuilder<'a, 'b, DB> {
        let mut builder = ChartBuilder::on(area);
        builder
            .caption(caption, self.style.title_font())
            .margin(self.style.px(10.).round() as u32)
            .x_label_area_size(self.style.label_area())
            .y_label_area_size(self.style.label_area());
        builder
    }
    // RA increases to the left: the abscissa is -RA
    fn draw_sky<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<()> {
        let ra = padded_range(self.sky_sample().map(|e| e.ra));
        let dec = padded_range(self.sky_sample().map(|e| e.dec));
        let mut chart = self
            .chart_builder(area, "Photon coordinate map")
            .build_cartesian_2d(-ra.end..-ra.start, dec)
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc("R.A. (deg)")
            .y_desc("Dec. (deg)")
            .x_label_formatter(&|x| format!("{:.2}", -x + 0.))
            .y_label_formatter(&|y| format!("{:.2}", y))
            .label_style(self.style.font())
            .axis_desc_style(self.style.font())
            .draw()
            .map_err(plot_err)?;
        let marker = self.style.px(0.4).round().max(1.) as i32;
        chart
            .draw_series(
                self.sky_sample()
                    .filter(|e| e.ra.is_finite() && e.dec.is_finite())
                    .map(|e| Circle::new((-e.ra, e.dec), marker, BLACK.mix(0.2).filled())),
            )
            .map_err(plot_err)?;
        Ok(())
    }
    fn draw_histogram<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        histogram: &Histogram,
        logscale: bool,
        caption: &str,
        x_desc: &str,
    ) -> Result<()> {
        let peak = histogram.peak().max(1) as f64;
        let mut builder = self.chart_builder(area, caption);
        if logscale {
            let mut chart = builder
                .build_cartesian_2d(histogram.range(), (0.5..2. * peak).log_scale())
                .map_err(plot_err)?;
            chart
                .configure_mesh()
                .x_desc(x_desc)
                .y_desc("Photon counts")
                .label_style(self.style.font())
                .axis_desc_style(self.style.font())
                .draw()
                .map_err(plot_err)?;
            draw_bars(&mut chart, histogram, 0.5)
        } else {
            let mut chart = builder
                .build_cartesian_2d(histogram.range(), 0f64..1.05 * peak)
                .map_err(plot_err)?;
            chart
                .configure_mesh()
                .x_desc(x_desc)
                .y_desc("Photon counts")
                .label_style(self.style.font())
                .axis_desc_style(self.style.font())
                .draw()
                .map_err(plot_err)?;
            draw_bars(&mut chart, histogram, 0.)
        }
    }
    fn draw_info<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<()> {
        let (width, height) = area.dim_in_pixel();
        let x = (0.1 * width as f64) as i32;
        let line_height = self.style.px(2. * self.style.font_size);
        for (i, line) in self.summary().into_iter().enumerate() {
            let y = (0.15 * height as f64 + i as f64 * line_height) as i32;
            area.draw(&Text::new(line, (x, y), self.style.font()))
                .map_err(plot_err)?;
        }
        Ok(())
    }
}

/// Draws the histogram bars from `base` up to the counts
fn draw_bars<'a, DB, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<RangedCoordf64, Y>>,
    histogram: &Histogram,
    base: f64,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    Y: Ranged<ValueType = f64>,
{
    chart
        .draw_series(
            histogram
                .edges
                .iter()
                .tuple_windows()
                .zip(&histogram.counts)
                .filter(|(_, &count)| count > 0)
                .map(|((&lo, &hi), &count)| {
                    Rectangle::new([(lo, base), (hi, count as f64)], BLACK.mix(0.3).filled())
                }),
        )
        .map_err(plot_err)?;
    Ok(())
}

impl Figure for EventList {
    type Error = EventsError;

    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>) -> Result<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let panels = root.split_evenly((2, 2));
        self.draw_sky(&panels[0])?;
        self.draw_histogram(
            &panels[1],
            &self.energy_histogram(),
            true,
            "Photon energy histogram",
            &format!("log E/{}", self.info.energy_unit),
        )?;
        self.draw_histogram(
            &panels[2],
            &self.time_histogram(),
            false,
            "Photon time histogram",
            "Time (h)",
        )?;
        self.draw_info(&panels[3])?;
        root.present().map_err(plot_err)?;
        Ok(())
    }
}

/// Plots the quicklook of the events of `evfile` into `outfile`
///
/// An empty or malformed event list is reported in the outcome and no file is
/// written, drawing failures are errors.
pub fn events_quicklook<P: AsRef<Path>, Q: AsRef<Path>>(
    evfile: P,
    outfile: Q,
) -> Result<Quicklook> {
    let evfile = evfile.as_ref();
    match EventList::load(evfile) {
        EventsLoad::Loaded(events) => {
            events.plot(&outfile)?;
            Ok(Quicklook::Written(outfile.as_ref().to_path_buf()))
        }
        EventsLoad::Empty => {
            log::warn!("no event in {:?}", evfile);
            Ok(Quicklook::Empty)
        }
        EventsLoad::Malformed(e) => {
            log::warn!("cannot read the events of {:?}: {}", evfile, e);
            Ok(Quicklook::Malformed(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::table_to_bytes;

    const TABLE: &str = "ra, dec, energy, time
266.4, -21.3, 0.1, 1000.0
266.6, -21.1, 1.0, 4600.0
266.5, -21.2, 10.0, 8200.0
";

    fn events_fits(n: usize) -> Vec<u8> {
        let column = |f: fn(usize) -> f64| (0..n).map(f).collect::<Vec<_>>();
        table_to_bytes(
            EVENTS_EXTENSION,
            &[
                ("OBS_ID", "'000042'"),
                ("DATE-OBS", "'2026-03-01'"),
                ("TIME-OBS", "'22:00:00'"),
                ("LIVETIME", "1800.0"),
                ("EUNIT", "'TeV'"),
            ],
            &[
                ("RA", "D", column(|i| 266. + 0.001 * i as f64)),
                ("DEC", "D", column(|i| -21. - 0.001 * i as f64)),
                ("ENERGY", "E", column(|i| 0.1 * (1 + i % 10) as f64)),
                ("TIME", "D", column(|i| 10. * i as f64)),
            ],
        )
    }

    #[test]
    fn from_reader() {
        let events = EventList::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().nth(1).unwrap().energy, 1.);
        assert_eq!(events.time_histogram().range(), 0.0..2.);
    }

    #[test]
    fn from_fits() {
        let table = FitsTable::from_bytes(&events_fits(5), EVENTS_EXTENSION).unwrap();
        let events = EventList::from_table(&table).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events.iter().last().unwrap().time, 40.);
        assert_eq!(events.info.obs_id.as_deref(), Some("000042"));
        assert_eq!(events.info.start.as_deref(), Some("2026-03-01-22:00:00"));
        assert_eq!(events.info.end, None);
        assert_eq!(events.info.livetime, Some(1800.));
        let summary = events.summary();
        assert_eq!(summary[0], "ObsID: 000042");
        assert_eq!(summary[2], "Date end: unknown");
        assert_eq!(summary[3], "Live time: 1800 s");
        assert_eq!(summary[5], "Number of events: 5");
    }

    #[test]
    fn load_outcome() {
        let dir = std::env::temp_dir();
        let path = dir.join("gammaview_events_load.fits");
        std::fs::write(&path, events_fits(4)).unwrap();
        assert!(matches!(EventList::load(&path), EventsLoad::Loaded(events) if events.len() == 4));
        std::fs::write(&path, events_fits(0)).unwrap();
        assert!(matches!(EventList::load(&path), EventsLoad::Empty));
        std::fs::write(&path, b"not a FITS file").unwrap();
        assert!(matches!(
            EventList::load(&path),
            EventsLoad::Malformed(EventsError::Fits(_))
        ));
        let no_dec = table_to_bytes(EVENTS_EXTENSION, &[], &[("RA", "D", vec![1.])]);
        std::fs::write(&path, no_dec).unwrap();
        assert!(matches!(
            EventList::load(&path),
            EventsLoad::Malformed(EventsError::Fits(FitsError::MissingColumn(_)))
        ));
        std::fs::remove_file(&path).unwrap();
        let csv = dir.join("gammaview_events_load.csv");
        std::fs::write(&csv, "ra, dec, energy, time\n").unwrap();
        assert!(matches!(EventList::load(&csv), EventsLoad::Empty));
        std::fs::write(&csv, "ra, dec\n1, 2\n").unwrap();
        assert!(matches!(
            EventList::load(&csv),
            EventsLoad::Malformed(EventsError::Csv(_))
        ));
        std::fs::remove_file(&csv).unwrap();
    }

    #[test]
    fn empty_quicklook() {
        let dir = std::env::temp_dir();
        let evfile = dir.join("gammaview_no_events.csv");
        let outfile = dir.join("gammaview_no_events.png");
        let _ = std::fs::remove_file(&outfile);
        std::fs::write(&evfile, "ra, dec, energy, time\n").unwrap();
        assert!(matches!(
            events_quicklook(&evfile, &outfile),
            Ok(Quicklook::Empty)
        ));
        assert!(!outfile.exists());
        assert!(matches!(
            events_quicklook(dir.join("gammaview_missing_events.fits"), &outfile),
            Ok(Quicklook::Malformed(EventsError::Fits(FitsError::Io(..))))
        ));
        assert!(!outfile.exists());
        assert!(matches!(
            EventList::from(vec![]).plot(&outfile),
            Err(EventsError::Empty)
        ));
        std::fs::remove_file(evfile).unwrap();
    }

    #[test]
    fn histogram() {
        let histogram = Histogram::new(&[0., 1., 2., 3., 4.], 4);
        assert_eq!(histogram.edges, vec![0., 1., 2., 3., 4.]);
        assert_eq!(histogram.counts, vec![1, 1, 1, 2]);
        let histogram = Histogram::new(&[2., 2., f64::NAN], 2);
        assert_eq!(histogram.edges, vec![1.5, 2., 2.5]);
        assert_eq!(histogram.counts, vec![0, 2]);
        let histogram = Histogram::new(&[], 10);
        assert_eq!(histogram.range(), 0.0..1.);
        assert_eq!(histogram.peak(), 0);
    }

    #[test]
    fn medians() {
        assert_eq!(median([3., 1., 2.].into_iter()), Some(2.));
        assert_eq!(median([4., 1., f64::NAN, 2., 3.].into_iter()), Some(2.5));
        assert_eq!(median(std::iter::empty()), None);
    }

    #[test]
    fn sky_sample() {
        let events: Vec<_> = (0..250_001)
            .map(|i| Event {
                ra: i as f64,
                dec: 0.,
                energy: 1.,
                time: 0.,
            })
            .collect();
        let events = EventList::from(events);
        let sample: Vec<_> = events.sky_sample().collect();
        assert_eq!(sample.len(), 83_334);
        assert!(sample.len() <= N_SKY_POINTS);
        assert_eq!(sample[1].ra, 3.);
        let few = EventList::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(few.sky_sample().count(), 3);
    }

    #[test]
    fn energy_histogram() {
        let events = EventList::from_reader(TABLE.as_bytes()).unwrap();
        let histogram = events.energy_histogram();
        assert_eq!(histogram.counts.len(), N_ENERGY_BINS);
        let range = histogram.range();
        assert!((range.start + 1.).abs() < 1e-12 && (range.end - 1.).abs() < 1e-12);
        assert_eq!(histogram.counts.iter().sum::<usize>(), 3);
        assert_eq!(events.time_histogram().counts.len(), N_TIME_BINS);
    }

    #[test]
    fn plot() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = std::env::temp_dir();
        let evfile = dir.join("gammaview_quicklook.fits");
        std::fs::write(&evfile, events_fits(500))?;
        for name in ["gammaview_quicklook.png", "gammaview_quicklook.svg"] {
            let path = dir.join(name);
            match events_quicklook(&evfile, &path) {
                Err(e) if crate::style::missing_fonts(&e) => {
                    eprintln!("skipping {}: {}", name, e);
                    let _ = std::fs::remove_file(path);
                    continue;
                }
                Ok(Quicklook::Written(output)) => assert_eq!(output, path),
                result => panic!("unexpected quicklook outcome: {:?}", result),
            }
            assert!(std::fs::metadata(&path)?.len() > 0);
            std::fs::remove_file(path)?;
        }
        std::fs::remove_file(evfile)?;
        Ok(())
    }
}
