use std::{ops::Range, path::Path};

use plotters::{
    coord::{
        ranged1d::{KeyPointHint, NoDefaultFormatting, Ranged, ValueFormatter},
        types::RangedCoordf64,
        Shift,
    },
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};

use super::{
    overlay::{Anchor, Annotation, EllipseStyle, MarkerKind, SkyCoord, Tint},
    projection::SkyProjection,
    scale::{ColorScale, Normalization},
    MapOptions, Result, SkyImage, SkyMapError,
};
use crate::style::{save, Figure};

// number of vertices of the ellipses
const N_OUTLINE: usize = 96;
// dashes: segments drawn, segments skipped
const DASH: (usize, usize) = (3, 1);
const N_COLORBAR_STEP: usize = 256;

fn plot_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> SkyMapError {
    SkyMapError::Plot(e.to_string())
}

/// Nice ticks within `[lo, hi]` and the number of decimals to print them with
pub(crate) fn nice_ticks(lo: f64, hi: f64, n: usize) -> (Vec<f64>, usize) {
    let span = hi - lo;
    if !(span > 0.) || !span.is_finite() {
        return (vec![lo], 2);
    }
    let raw = span / n.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1., 2., 5., 10.]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10. * magnitude);
    let decimals = (-step.log10().floor()).max(0.) as usize;
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    let ticks = (first..=last).map(|k| k as f64 * step).collect();
    (ticks, decimals)
}

fn format_value(value: f64, decimals: usize) -> String {
    if value == 0. {
        return String::from("0");
    }
    let magnitude = value.abs().log10();
    if !(-2. ..5.).contains(&magnitude) {
        let label = format!("{:.2e}", value);
        match label.split_once('e') {
            Some((mantissa, exponent)) => format!(
                "{}e{}",
                mantissa.trim_end_matches('0').trim_end_matches('.'),
                exponent
            ),
            None => label,
        }
    } else {
        format!("{:.*}", decimals, value)
    }
}

/// Color bar tick values
pub(crate) fn colorbar_ticks(scale: &ColorScale) -> (Vec<f64>, usize) {
    let (lo, hi) = (scale.vmin, scale.vmax);
    if let Normalization::SymLog { linthresh } = scale.normalization {
        let max_abs = lo.abs().max(hi.abs());
        if max_abs > 10. * linthresh {
            let k0 = linthresh.log10().floor() as i32;
            let k1 = max_abs.log10().floor() as i32;
            let mut ticks: Vec<f64> = (k0..=k1)
                .flat_map(|k| [-(10f64.powi(k)), 10f64.powi(k)])
                .chain(Some(0.))
                .filter(|t| (lo..=hi).contains(t))
                .collect();
            ticks.sort_by(f64::total_cmp);
            if ticks.len() > 1 {
                return (ticks, (-k0).max(0) as usize);
            }
        }
    }
    nice_ticks(lo, hi, 6)
}

/// Linear axis with the ticks at given positions
///
/// The tick labels are given by the mesh label formatters.
#[derive(Clone)]
struct TickedAxis {
    inner: RangedCoordf64,
    ticks: Vec<f64>,
}
impl TickedAxis {
    fn new(range: Range<f64>, ticks: Vec<f64>) -> Self {
        Self {
            inner: range.into(),
            ticks,
        }
    }
}
impl Ranged for TickedAxis {
    type FormatOption = NoDefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.inner.map(value, limit)
    }
    fn key_points<Hint: KeyPointHint>(&self, _hint: Hint) -> Vec<f64> {
        self.ticks.clone()
    }
    fn range(&self) -> Range<f64> {
        self.inner.range()
    }
}
impl ValueFormatter<f64> for TickedAxis {
    fn format(value: &f64) -> String {
        format!("{}", value)
    }
}

// unwrap an RA to the half-turn around `ra0`
fn unwrap_ra(ra: f64, ra0: f64) -> f64 {
    ra0 + (ra - ra0 + 180.).rem_euclid(360.) - 180.
}

/// Chart coordinates of the sky ticks along the central row and column of the map
fn sky_ticks(wcs: &SkyProjection, nx: usize, ny: usize) -> (Vec<f64>, Vec<f64>, usize) {
    let (x_mid, y_mid) = (0.5 * (nx as f64 - 1.), 0.5 * (ny as f64 - 1.));
    let (ra_mid, dec_mid) = wcs.pixel_to_world(x_mid, y_mid);
    let ra_edges =
        [-0.5, nx as f64 - 0.5].map(|x| unwrap_ra(wcs.pixel_to_world(x, y_mid).0, ra_mid));
    let dec_edges = [-0.5, ny as f64 - 0.5].map(|y| wcs.pixel_to_world(x_mid, y).1);
    let (ra_ticks, ra_decimals) = nice_ticks(
        ra_edges[0].min(ra_edges[1]),
        ra_edges[0].max(ra_edges[1]),
        5,
    );
    let (dec_ticks, dec_decimals) = nice_ticks(
        dec_edges[0].min(dec_edges[1]),
        dec_edges[0].max(dec_edges[1]),
        5,
    );
    let mut x: Vec<f64> = ra_ticks
        .into_iter()
        .filter_map(|ra| wcs.world_to_pixel(ra.rem_euclid(360.), dec_mid))
        .map(|(x, _)| x + 0.5)
        .collect();
    x.sort_by(f64::total_cmp);
    let y = dec_ticks
        .into_iter()
        .filter_map(|dec| wcs.world_to_pixel(ra_mid, dec))
        .map(|(_, y)| y + 0.5)
        .collect();
    (x, y, ra_decimals.max(dec_decimals))
}

fn chart_xy(wcs: &SkyProjection, coord: SkyCoord) -> Option<(f64, f64)> {
    wcs.world_to_pixel(coord.ra, coord.dec)
        .map(|(x, y)| (x + 0.5, y + 0.5))
}

fn rgb(tint: Tint) -> RGBColor {
    let (r, g, b) = tint.rgb();
    RGBColor(r, g, b)
}

/// Writes the sky map to `path`, the backend is selected from the extension
pub(super) fn draw(
    image: &SkyImage,
    scale: &ColorScale,
    annotations: &[Annotation],
    options: &MapOptions,
    path: &Path,
) -> Result<()> {
    let figure = MapFigure {
        image,
        scale,
        annotations,
        options,
    };
    save(&figure, path, options.style.canvas())
}

struct MapFigure<'a> {
    image: &'a SkyImage,
    scale: &'a ColorScale,
    annotations: &'a [Annotation],
    options: &'a MapOptions,
}
impl<'a> Figure for MapFigure<'a> {
    type Error = SkyMapError;

    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>) -> Result<()> {
        let Self {
            image,
            scale,
            annotations,
            options,
        } = *self;
        draw_map(root, image, scale, annotations, options)
    }
}

fn draw_map<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    image: &SkyImage,
    scale: &ColorScale,
    annotations: &[Annotation],
    options: &MapOptions,
) -> Result<()> {
    let style = &options.style;
    root.fill(&WHITE).map_err(plot_err)?;
    let (width, _) = root.dim_in_pixel();
    let (map_area, bar_area) = root.split_horizontally(width * 5 / 6);

    let (nx, ny) = image.shape();
    let wcs = &image.wcs;
    let (x_ticks, y_ticks, decimals) = sky_ticks(wcs, nx, ny);
    let (x_mid, y_mid) = (0.5 * (nx as f64 - 1.), 0.5 * (ny as f64 - 1.));

    let mut builder = ChartBuilder::on(&map_area);
    builder
        .margin(style.px(10.).round() as u32)
        .x_label_area_size(style.label_area())
        .y_label_area_size(style.label_area());
    if !options.title.is_empty() {
        builder.caption(&options.title, style.title_font());
    }
    let mut chart = builder
        .build_cartesian_2d(
            TickedAxis::new(0f64..nx as f64, x_ticks),
            TickedAxis::new(0f64..ny as f64, y_ticks),
        )
        .map_err(plot_err)?;

    let ra_label = |x: &f64| {
        let ra = wcs.pixel_to_world(*x - 0.5, y_mid).0;
        let rounding = 10f64.powi(decimals as i32);
        format!("{:.*}", decimals, ((ra * rounding).round() / rounding).rem_euclid(360.))
    };
    let dec_label = |y: &f64| format!("{:.*}", decimals, wcs.pixel_to_world(x_mid, *y - 0.5).1);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("R.A. (deg)")
        .y_desc("Dec (deg)")
        .label_style(style.font())
        .axis_desc_style(style.font())
        .x_label_formatter(&ra_label)
        .y_label_formatter(&dec_label)
        .draw()
        .map_err(plot_err)?;

    let data = &image.data;
    let cmap = options.colormap;
    chart
        .draw_series((0..ny).flat_map(|j| {
            (0..nx).filter_map(move |i| {
                let u = scale.normalize(data[(j, i)])?;
                Some(Rectangle::new(
                    [(i as f64, j as f64), ((i + 1) as f64, (j + 1) as f64)],
                    cmap.eval(u).filled(),
                ))
            })
        }))
        .map_err(plot_err)?;

    let area = chart.plotting_area();
    for annotation in annotations {
        match annotation {
            Annotation::Ellipse { shape, style: ellipse, tint } => {
                let mut outline: Vec<_> = shape
                    .outline(N_OUTLINE)
                    .into_iter()
                    .filter_map(|coord| chart_xy(wcs, coord))
                    .collect();
                if outline.len() < N_OUTLINE {
                    continue;
                }
                outline.push(outline[0]);
                match ellipse {
                    EllipseStyle::Dashed => {
                        let line = rgb(*tint).stroke_width(style.px(2.).round() as u32);
                        let (on, off) = DASH;
                        for dash in outline.windows(on + 1).step_by(on + off) {
                            area.draw(&PathElement::new(dash.to_vec(), line))
                                .map_err(plot_err)?;
                        }
                    }
                    EllipseStyle::Filled => {
                        area.draw(&Polygon::new(outline.clone(), rgb(*tint).filled()))
                            .map_err(plot_err)?;
                        area.draw(&PathElement::new(
                            outline,
                            WHITE.stroke_width(style.px(1.).round() as u32),
                        ))
                        .map_err(plot_err)?;
                    }
                }
            }
            Annotation::Marker { at, kind, tint, size } => {
                let Some(xy) = chart_xy(wcs, *at) else {
                    continue;
                };
                let half = style.px(0.5 * size.sqrt()).round() as i32;
                let line = rgb(*tint).stroke_width(style.px(1.5).round() as u32);
                match kind {
                    MarkerKind::Cross => area.draw(&Cross::new(xy, half, line)),
                    MarkerKind::Ring => area.draw(&Circle::new(xy, half, line)),
                }
                .map_err(plot_err)?;
            }
            Annotation::Label {
                at,
                text,
                tint,
                size,
                anchor,
            } => {
                let Some(xy) = chart_xy(wcs, *at) else {
                    continue;
                };
                let pos = match anchor {
                    Anchor::Center => Pos::new(HPos::Center, VPos::Center),
                    Anchor::LeftCenter => Pos::new(HPos::Left, VPos::Center),
                    Anchor::LeftBottom => Pos::new(HPos::Left, VPos::Bottom),
                };
                let font = style.font_at(*size).color(&rgb(*tint)).pos(pos);
                area.draw(&Text::new(text.as_str(), xy, font))
                    .map_err(plot_err)?;
            }
        }
    }

    draw_colorbar(&bar_area, scale, options)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    scale: &ColorScale,
    options: &MapOptions,
) -> Result<()> {
    let style = &options.style;
    let (values, decimals) = colorbar_ticks(scale);
    let key_points: Vec<f64> = values
        .iter()
        .filter_map(|&v| scale.normalize(v))
        .collect();
    let margin = style.px(10.).round() as u32;
    let mut chart = ChartBuilder::on(area)
        .margin_top(margin + style.label_area() / 2)
        .margin_bottom(margin + style.label_area())
        .margin_left(margin)
        .set_label_area_size(LabelAreaPosition::Right, style.label_area())
        .build_cartesian_2d(0f64..1f64, TickedAxis::new(0f64..1f64, key_points))
        .map_err(plot_err)?;

    let tick_label = |u: &f64| format_value(scale.inverse(*u), decimals);
    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(options.bar_title.as_str())
        .label_style(style.font())
        .axis_desc_style(style.font())
        .y_label_formatter(&tick_label)
        .draw()
        .map_err(plot_err)?;

    let cmap = options.colormap;
    let du = (N_COLORBAR_STEP as f64).recip();
    chart
        .draw_series((0..N_COLORBAR_STEP).map(|k| {
            let u = k as f64 * du;
            Rectangle::new([(0., u), (1., u + du)], cmap.eval(u + 0.5 * du).filled())
        }))
        .map_err(plot_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks() {
        let (ticks, decimals) = nice_ticks(0.13, 1.02, 5);
        assert_eq!(decimals, 1);
        assert_eq!(ticks.len(), 5);
        assert!((ticks[0] - 0.2).abs() < 1e-12 && (ticks[4] - 1.).abs() < 1e-12);
        assert_eq!(nice_ticks(3., 3., 5).0, vec![3.]);
    }

    #[test]
    fn symlog_colorbar() {
        let scale = ColorScale::new(-50., 1000., Default::default());
        let (ticks, _) = colorbar_ticks(&scale);
        assert_eq!(ticks, vec![-10., -1., 0., 1., 10., 100., 1000.]);
        let scale = ColorScale::new(0., 5., Default::default());
        let (ticks, _) = colorbar_ticks(&scale);
        assert_eq!(ticks, vec![0., 1., 2., 3., 4., 5.]);
    }

    #[test]
    fn sky_axis() {
        let wcs = SkyProjection::gnomonic([50.5, 50.5], [0.1, 2.], [-0.02, 0.02]);
        let (x, y, decimals) = sky_ticks(&wcs, 100, 100);
        assert!(!x.is_empty() && !y.is_empty());
        assert_eq!(decimals, 1);
        // RA increases to the left across RA = 0
        let ra: Vec<_> = x
            .iter()
            .map(|x| unwrap_ra(wcs.pixel_to_world(x - 0.5, 49.5).0, 0.1))
            .collect();
        assert!(ra.windows(2).all(|r| r[1] < r[0]));
        assert!(x.iter().all(|x| (0. ..=100.).contains(x)));
    }

    #[test]
    fn value_format() {
        assert_eq!(format_value(0., 2), "0");
        assert_eq!(format_value(2.5, 1), "2.5");
        assert_eq!(format_value(1e5, 0), "1e5");
        assert_eq!(format_value(123456., 0), "1.23e5");
        assert_eq!(format_value(-2.5e-3, 4), "-2.5e-3");
        assert_eq!(format_value(1234., 0), "1234");
    }

    #[test]
    fn ticked_axis() {
        let axis = TickedAxis::new(0f64..10., vec![1.5, 7.25]);
        assert_eq!(axis.key_points(10usize), vec![1.5, 7.25]);
        assert_eq!(axis.range(), 0f64..10.);
        assert_eq!(axis.map(&5., (0, 100)), 50);
        assert_eq!(<TickedAxis as ValueFormatter<f64>>::format(&7.25), "7.25");
    }
}
