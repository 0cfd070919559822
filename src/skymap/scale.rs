use itertools::Itertools;
use plotters::style::RGBColor;
use strum_macros::{Display, EnumIter, EnumString};

/// Linear threshold of the symmetric-log normalization
pub const SYMLOG_LINTHRESH: f64 = 1.;
// the linear range spans `linscale` decades
const SYMLOG_LINSCALE: f64 = 1.;

/// Map values to `[0,1]` transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    Linear,
    /// logarithmic in base 10 beyond `±linthresh`, linear in between
    SymLog { linthresh: f64 },
}
impl Default for Normalization {
    fn default() -> Self {
        Normalization::SymLog {
            linthresh: SYMLOG_LINTHRESH,
        }
    }
}
impl Normalization {
    fn forward(&self, x: f64) -> f64 {
        match *self {
            Normalization::Linear => x,
            Normalization::SymLog { linthresh } => {
                let adj = SYMLOG_LINSCALE / (1. - 10f64.recip());
                if x.abs() <= linthresh {
                    x * adj
                } else {
                    x.signum() * linthresh * (adj + (x.abs() / linthresh).log10())
                }
            }
        }
    }
    fn backward(&self, t: f64) -> f64 {
        match *self {
            Normalization::Linear => t,
            Normalization::SymLog { linthresh } => {
                let adj = SYMLOG_LINSCALE / (1. - 10f64.recip());
                if t.abs() <= linthresh * adj {
                    t / adj
                } else {
                    t.signum() * linthresh * 10f64.powf(t.abs() / linthresh - adj)
                }
            }
        }
    }
}

/// Color scale of a map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub vmin: f64,
    pub vmax: f64,
    pub normalization: Normalization,
}
impl ColorScale {
    pub fn new(vmin: f64, vmax: f64, normalization: Normalization) -> Self {
        Self {
            vmin,
            vmax,
            normalization,
        }
    }
    /// Creates a color scale, the missing bounds are set to the data extrema (NaN are ignored)
    pub fn from_data<I>(
        data: I,
        vmin: Option<f64>,
        vmax: Option<f64>,
        normalization: Normalization,
    ) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (lo, hi) = match (vmin, vmax) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => {
                let (min, max) = data
                    .into_iter()
                    .filter(|x| !x.is_nan())
                    .minmax_by(|a, b| a.total_cmp(b))
                    .into_option()
                    .unwrap_or((0., 0.));
                (vmin.unwrap_or(min), vmax.unwrap_or(max))
            }
        };
        Self::new(lo, hi, normalization)
    }
    /// Maps a value into `[0,1]`, values outside of the bounds are clipped
    ///
    /// Returns `None` for NaN.
    pub fn normalize(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        let t_min = self.normalization.forward(self.vmin);
        let t_max = self.normalization.forward(self.vmax);
        let span = t_max - t_min;
        if span == 0. || !span.is_finite() {
            return Some(0.5);
        }
        Some(((self.normalization.forward(value) - t_min) / span).clamp(0., 1.))
    }
    /// Returns the value at the normalized position `u`
    pub fn inverse(&self, u: f64) -> f64 {
        let t_min = self.normalization.forward(self.vmin);
        let t_max = self.normalization.forward(self.vmax);
        self.normalization.backward(t_min + u * (t_max - t_min))
    }
    /// Normalized position of 0
    pub fn midpoint(&self) -> f64 {
        self.normalize(0.).unwrap_or(0.5)
    }
}

/// Continuous color maps
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColorMap {
    #[default]
    Magma,
    Inferno,
    Plasma,
    Viridis,
    Cividis,
    Turbo,
    Cubehelix,
    Greys,
    #[strum(serialize = "rdbu")]
    RdBu,
}
impl ColorMap {
    pub fn gradient(&self) -> colorous::Gradient {
        match self {
            ColorMap::Magma => colorous::MAGMA,
            ColorMap::Inferno => colorous::INFERNO,
            ColorMap::Plasma => colorous::PLASMA,
            ColorMap::Viridis => colorous::VIRIDIS,
            ColorMap::Cividis => colorous::CIVIDIS,
            ColorMap::Turbo => colorous::TURBO,
            ColorMap::Cubehelix => colorous::CUBEHELIX,
            ColorMap::Greys => colorous::GREYS,
            ColorMap::RdBu => colorous::RED_BLUE,
        }
    }
    /// Color at the normalized position `u`
    pub fn eval(&self, u: f64) -> RGBColor {
        let (r, g, b) = self.gradient().eval_continuous(u.clamp(0., 1.)).as_tuple();
        RGBColor(r, g, b)
    }
    /// `n` colors evenly spaced along the color map, both ends included
    pub fn sample(&self, n: usize) -> Vec<RGBColor> {
        match n {
            0 => vec![],
            1 => vec![self.eval(0.)],
            _ => (0..n)
                .map(|i| self.eval(i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}
