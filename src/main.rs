use std::{io, path::PathBuf};

use anyhow::Context;
use gammaview::{
    events::{events_quicklook, Quicklook},
    pointings::PointingPattern,
    profile::RadialProfile,
    psf::{estimate_psf, CalibrationCurve, CTA_ENERGY_RANGE},
    skymap::{ColorMap, MapOptions, Region, RenderReport, SkyImage, Target},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "gammaview",
    about = "Validation plots for gamma-ray observation simulations"
)]
enum Opt {
    /// Spectrum weighted on-axis PSF FWHM
    Psf {
        /// PSF calibration table (CSV: ENERG_LO, ENERG_HI, SIGMA_1)
        curve: PathBuf,
        #[structopt(flatten)]
        energy: EnergyRange,
    },
    /// Sky map rendering
    Map(MapArgs),
    /// Observation pointings
    Pointings {
        /// Pointings table (CSV: obsid, ra, dec, roi_ra, roi_dec, roi_rad)
        table: PathBuf,
        /// Output image (PNG or SVG)
        #[structopt(short, long, default_value = "pointings.png")]
        output: PathBuf,
        /// Color map of the pointings
        #[structopt(long, default_value = "turbo")]
        cmap: ColorMap,
    },
    /// Radial profile
    Profile {
        /// Profile table (CSV: radius, profile, error)
        table: PathBuf,
        /// Output image (PNG or SVG)
        #[structopt(short, long, default_value = "profile.png")]
        output: PathBuf,
        /// Radius unit
        #[structopt(long, default_value = "deg")]
        radius_unit: String,
        /// Profile unit
        #[structopt(long, default_value = "")]
        profile_unit: String,
        /// θ500 in radius unit
        #[structopt(long)]
        theta500: Option<f64>,
        /// Linear axis
        #[structopt(long)]
        linear: bool,
    },
    /// Event list quicklook
    Events {
        /// Event list (FITS with an EVENTS table or CSV: ra, dec, energy, time)
        events: PathBuf,
        /// Output image (PNG or SVG)
        #[structopt(short, long, default_value = "events.png")]
        output: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
struct EnergyRange {
    /// Minimum energy [TeV]
    #[structopt(long)]
    emin: Option<f64>,
    /// Maximum energy [TeV]
    #[structopt(long)]
    emax: Option<f64>,
    /// Spectral index of the PSF weights
    #[structopt(long, default_value = "-2", allow_hyphen_values = true)]
    slope: f64,
}
impl EnergyRange {
    fn psf(&self, curve: &CalibrationCurve) -> anyhow::Result<f64> {
        let (e_min, e_max) = CTA_ENERGY_RANGE;
        Ok(estimate_psf(
            curve,
            self.emin.unwrap_or(e_min),
            self.emax.unwrap_or(e_max),
            self.slope.into(),
        )?)
    }
}

#[derive(Debug, StructOpt)]
struct MapArgs {
    /// Sky map FITS file
    map: PathBuf,
    /// Output image (PNG or SVG)
    #[structopt(short, long, default_value = "skymap.png")]
    output: PathBuf,
    /// Smoothing FWHM [deg]
    #[structopt(short, long, default_value = "0")]
    smoothing: f64,
    /// Significance map: corrects for the smoothing noise reduction
    #[structopt(long)]
    significance: bool,
    /// Color scale lower bound
    #[structopt(long, allow_hyphen_values = true)]
    vmin: Option<f64>,
    /// Color scale upper bound
    #[structopt(long, allow_hyphen_values = true)]
    vmax: Option<f64>,
    /// Linear color scale
    #[structopt(long)]
    linear: bool,
    /// Color map
    #[structopt(long, default_value = "magma")]
    cmap: ColorMap,
    /// Map title
    #[structopt(long, default_value = "")]
    title: String,
    /// Color bar title
    #[structopt(long, default_value = "")]
    bar_title: String,
    /// Target center "RA,Dec" [deg]
    #[structopt(long, parse(try_from_str = parse_coord), allow_hyphen_values = true)]
    center: Option<(f64, f64)>,
    /// Target name
    #[structopt(long)]
    name: Option<String>,
    /// Target θ500 [deg]
    #[structopt(long)]
    theta500: Option<f64>,
    /// Pointing(s) "RA,Dec" [deg]
    #[structopt(long, parse(try_from_str = parse_coord), allow_hyphen_values = true)]
    pointing: Vec<(f64, f64)>,
    /// Point source "NAME,RA,Dec" [deg], a missing coordinate is left empty
    #[structopt(long, parse(try_from_str = parse_source), allow_hyphen_values = true)]
    source: Vec<(String, Option<f64>, Option<f64>)>,
    /// PSF FWHM [deg]
    #[structopt(long)]
    psf: Option<f64>,
    /// PSF calibration table, the PSF is computed if `--psf` is not given
    #[structopt(long)]
    irf: Option<PathBuf>,
    #[structopt(flatten)]
    energy: EnergyRange,
}
impl MapArgs {
    fn options(&self) -> anyhow::Result<MapOptions> {
        let mut options = MapOptions::default()
            .smoothing(self.smoothing)
            .range(self.vmin, self.vmax)
            .colormap(self.cmap)
            .title(&self.title)
            .bar_title(&self.bar_title);
        if self.significance {
            options = options.significance();
        }
        if self.linear {
            options = options.linear();
        }
        if let Some((ra, dec)) = self.center {
            if let Some(theta500) = self.theta500 {
                options = options.region(Region::new(ra, dec, theta500));
            }
            let mut target = Target::new(ra, dec);
            if let Some(name) = &self.name {
                target = target.name(name);
            }
            options = options.center(target);
        }
        options = match self.pointing.as_slice() {
            [] => options,
            [(ra, dec)] => options.pointing(*ra, *dec),
            pointings => options.pointings(pointings.iter().copied()),
        };
        for (name, ra, dec) in &self.source {
            options = options.point_source(name, *ra, *dec);
        }
        let psf = match (self.psf, &self.irf) {
            (Some(psf), _) => Some(psf),
            (None, Some(irf)) => {
                let curve = CalibrationCurve::from_path(irf)?;
                Some(self.energy.psf(&curve)?)
            }
            (None, None) => None,
        };
        if let Some(psf) = psf {
            log::info!("PSF FWHM: {:.3}deg", psf);
            options = options.psf(psf);
        }
        Ok(options)
    }
}

fn parse_coord(arg: &str) -> Result<(f64, f64), String> {
    let (ra, dec) = arg
        .split_once(',')
        .ok_or_else(|| format!("expected RA,Dec, found {}", arg))?;
    Ok((
        ra.trim().parse().map_err(|e| format!("RA {}: {}", ra, e))?,
        dec.trim().parse().map_err(|e| format!("Dec {}: {}", dec, e))?,
    ))
}

fn parse_source(arg: &str) -> Result<(String, Option<f64>, Option<f64>), String> {
    let mut fields = arg.splitn(3, ',');
    let (Some(name), Some(ra), Some(dec)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(format!("expected NAME,RA,Dec, found {}", arg));
    };
    let coord = |value: &str| -> Result<Option<f64>, String> {
        match value.trim() {
            "" => Ok(None),
            value => value
                .parse()
                .map(Some)
                .map_err(|e| format!("{}: {}", value, e)),
        }
    };
    Ok((name.trim().to_string(), coord(ra)?, coord(dec)?))
}

/// Writes the rendered file name into `out` and the rendering warnings into `err`
fn print_report<O: io::Write, E: io::Write>(
    report: &RenderReport,
    out: &mut O,
    err: &mut E,
) -> io::Result<()> {
    for warning in &report.warnings {
        writeln!(err, "warning: {}", warning)?;
    }
    if let Some(output) = &report.output {
        writeln!(out, "{:?} written", output)?;
    }
    Ok(())
}

/// Writes the quicklook outcome, an empty or a malformed event list is a warning
fn print_quicklook<O: io::Write, E: io::Write>(
    outcome: &Quicklook,
    out: &mut O,
    err: &mut E,
) -> io::Result<()> {
    match outcome {
        Quicklook::Written(output) => writeln!(out, "{:?} written", output),
        Quicklook::Empty => writeln!(err, "warning: the event list is empty, no quicklook"),
        Quicklook::Malformed(e) => {
            writeln!(err, "warning: no quicklook, {}", e)?;
            let mut source = std::error::Error::source(e);
            while let Some(cause) = source {
                writeln!(err, "  caused by: {}", cause)?;
                source = std::error::Error::source(cause);
            }
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    match opt {
        Opt::Psf { curve, energy } => {
            let curve = CalibrationCurve::from_path(&curve)?;
            println!("PSF FWHM: {:.4}deg", energy.psf(&curve)?);
        }
        Opt::Map(args) => {
            let options = args.options()?;
            let report = SkyImage::from_path(&args.map)?
                .render(&options, &args.output)
                .with_context(|| format!("failed to render {:?}", args.map))?;
            print_report(&report, &mut io::stdout(), &mut io::stderr())?;
        }
        Opt::Pointings {
            table,
            output,
            cmap,
        } => {
            PointingPattern::from_path(&table)?
                .colormap(cmap)
                .plot(&output)?;
        }
        Opt::Profile {
            table,
            output,
            radius_unit,
            profile_unit,
            theta500,
            linear,
        } => {
            let mut profile = RadialProfile::from_path(&table)?.units(radius_unit, profile_unit);
            if let Some(theta500) = theta500 {
                profile = profile.theta500(theta500);
            }
            if linear {
                profile = profile.linear();
            }
            profile.plot(&output)?;
        }
        Opt::Events { events, output } => {
            let outcome = events_quicklook(&events, &output)
                .with_context(|| format!("failed to plot the events of {:?}", events))?;
            print_quicklook(&outcome, &mut io::stdout(), &mut io::stderr())?;
        }
    }

    Ok(())
}
