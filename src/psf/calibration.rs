use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    time::Instant,
};

use flate2::read::GzDecoder;
use serde::Deserialize;

use super::{estimate_psf, CubicSpline, PsfError, Result};

#[derive(Deserialize, Debug)]
struct Record {
    #[serde(rename = "ENERG_LO")]
    energy_lo: f64,
    #[serde(rename = "ENERG_HI")]
    energy_hi: f64,
    #[serde(rename = "SIGMA_1")]
    sigma: f64,
}

/// On-axis PSF calibration curve
#[derive(Debug, Clone)]
pub struct CalibrationCurve {
    // the energy bins center [TeV]
    energy: Vec<f64>,
    // the PSF Gaussian width [deg]
    width: Vec<f64>,
}
impl CalibrationCurve {
    /// Creates a curve from the energies and the PSF widths
    ///
    /// The energies must be finite and strictly increasing with at least 2 samples.
    pub fn new(energy: Vec<f64>, width: Vec<f64>) -> Result<Self> {
        if energy.len() != width.len() {
            return Err(PsfError::LengthMismatch(energy.len(), width.len()));
        }
        if energy.len() < 2 {
            return Err(PsfError::TooFewSamples(energy.len()));
        }
        if let Some(i) = energy
            .iter()
            .zip(&width)
            .position(|(e, w)| !(e.is_finite() && w.is_finite()))
        {
            return Err(PsfError::NonFinite(i));
        }
        if let Some(i) = energy.windows(2).position(|e| e[1] <= e[0]) {
            return Err(PsfError::NonMonotonic(i + 1));
        }
        Ok(Self { energy, width })
    }
    /// Creates a curve from the energy bins edges, the bins center being the mean of the edges
    pub fn from_bins(energy_lo: &[f64], energy_hi: &[f64], width: &[f64]) -> Result<Self> {
        if energy_lo.len() != energy_hi.len() {
            return Err(PsfError::LengthMismatch(energy_lo.len(), energy_hi.len()));
        }
        Self::new(
            energy_lo
                .iter()
                .zip(energy_hi)
                .map(|(lo, hi)| 0.5 * (lo + hi))
                .collect(),
            width.to_vec(),
        )
    }
    /// Loads the curve from a CSV table with the columns `ENERG_LO`, `ENERG_HI` and `SIGMA_1`
    ///
    /// Gzip compressed tables (`.gz` extension) are decompressed on the fly.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let now = Instant::now();
        let file = File::open(path).map_err(|e| PsfError::Io(e, path.to_path_buf()))?;
        let this = if path.extension().is_some_and(|ext| ext == "gz") {
            Self::from_reader(GzDecoder::new(file))
        } else {
            Self::from_reader(BufReader::new(file))
        }?;
        log::info!("... loaded in {:}ms", now.elapsed().as_millis());
        Ok(this)
    }
    /// Reads the curve from a CSV table
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let (mut energy_lo, mut energy_hi, mut width) = (vec![], vec![], vec![]);
        for result in rdr.deserialize() {
            let record: Record = result?;
            energy_lo.push(record.energy_lo);
            energy_hi.push(record.energy_hi);
            width.push(record.sigma);
        }
        Self::from_bins(&energy_lo, &energy_hi, &width)
    }
    pub fn len(&self) -> usize {
        self.energy.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Energy bins center [TeV]
    pub fn energy(&self) -> &[f64] {
        &self.energy
    }
    /// PSF Gaussian width [deg]
    pub fn width(&self) -> &[f64] {
        &self.width
    }
    /// Returns the calibrated energy range [TeV]
    pub fn domain(&self) -> (f64, f64) {
        (self.energy[0], self.energy[self.len() - 1])
    }
    /// Cubic interpolant of the PSF width
    pub fn interpolant(&self) -> Result<CubicSpline> {
        CubicSpline::new(&self.energy, &self.width)
    }
    /// Returns the PSF FWHM [deg] between `e_min` and `e_max` [TeV] for a E<sup>-2</sup> spectrum
    pub fn mean_psf(&self, e_min: f64, e_max: f64) -> Result<f64> {
        estimate_psf(self, e_min, e_max, Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{error::Error, io::Write};

    const TABLE: &str = "ENERG_LO, ENERG_HI, SIGMA_1
0.0125, 0.02, 0.12
0.02, 0.0316, 0.10
0.0316, 0.05, 0.08
0.05, 0.0794, 0.065
0.0794, 0.125, 0.05
";

    #[test]
    fn from_reader() {
        let curve = CalibrationCurve::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(curve.len(), 5);
        assert!((curve.energy()[0] - 0.01625).abs() < 1e-12);
        assert_eq!(curve.width()[4], 0.05);
    }

    #[test]
    fn from_gz_path() -> std::result::Result<(), Box<dyn Error>> {
        let path = std::env::temp_dir().join("gammaview_calibration.csv.gz");
        let mut gz = flate2::write::GzEncoder::new(File::create(&path)?, Default::default());
        gz.write_all(TABLE.as_bytes())?;
        gz.finish()?;
        let curve = CalibrationCurve::from_path(&path)?;
        assert_eq!(curve.len(), 5);
        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            CalibrationCurve::from_reader("ENERG_LO,ENERG_HI\n1,2\n".as_bytes()),
            Err(PsfError::Csv(_))
        ));
        assert!(matches!(
            CalibrationCurve::new(vec![1., 1., 2.], vec![0.1; 3]),
            Err(PsfError::NonMonotonic(1))
        ));
        assert!(matches!(
            CalibrationCurve::new(vec![1.], vec![0.1]),
            Err(PsfError::TooFewSamples(1))
        ));
        assert!(matches!(
            CalibrationCurve::new(vec![1., f64::NAN], vec![0.1; 2]),
            Err(PsfError::NonFinite(1))
        ));
        assert!(
            CalibrationCurve::from_bins(&[1., 2.], &[2.], &[0.1, 0.2])
                .unwrap_err()
                .is_data_format()
        );
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            CalibrationCurve::from_path("/nonexistent/psf.csv"),
            Err(PsfError::Io(..))
        ));
    }
}
