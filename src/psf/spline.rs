use nalgebra::{DMatrix, DVector};

use super::{PsfError, Result};

/// Cubic spline interpolant with not-a-knot end conditions
///
/// With 3 knots the spline is the interpolating parabola and with 2 knots the
/// straight line. Outside of the knots the end polynomials are extended.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    // second derivatives at the knots
    m: Vec<f64>,
}
impl CubicSpline {
    /// Builds the spline through the knots (`x`,`y`), `x` strictly increasing
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        let n = x.len();
        if n != y.len() {
            return Err(PsfError::LengthMismatch(n, y.len()));
        }
        if n < 2 {
            return Err(PsfError::TooFewSamples(n));
        }
        let h: Vec<f64> = x.windows(2).map(|x| x[1] - x[0]).collect();
        let m = if n == 2 {
            vec![0f64; 2]
        } else {
            let mut a = DMatrix::<f64>::zeros(n, n);
            let mut b = DVector::<f64>::zeros(n);
            for i in 1..n - 1 {
                a[(i, i - 1)] = h[i - 1];
                a[(i, i)] = 2. * (h[i - 1] + h[i]);
                a[(i, i + 1)] = h[i];
                b[i] = 6. * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
            }
            if n == 3 {
                // constant curvature
                a[(0, 0)] = 1.;
                a[(0, 1)] = -1.;
                a[(2, 1)] = 1.;
                a[(2, 2)] = -1.;
            } else {
                // continuous third derivative at the second and penultimate knots
                a[(0, 0)] = -h[1];
                a[(0, 1)] = h[0] + h[1];
                a[(0, 2)] = -h[0];
                a[(n - 1, n - 3)] = -h[n - 2];
                a[(n - 1, n - 2)] = h[n - 3] + h[n - 2];
                a[(n - 1, n - 1)] = -h[n - 3];
            }
            a.lu()
                .solve(&b)
                .ok_or(PsfError::Spline)?
                .iter()
                .cloned()
                .collect()
        };
        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }
    /// Evaluates the spline at `x`
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.x.len();
        let i = self.x[1..n - 1].partition_point(|&xi| xi <= x);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let (a, t) = (x1 - x, x - x0);
        (m0 * a.powi(3) + m1 * t.powi(3)) / (6. * h)
            + (y0 / h - m0 * h / 6.) * a
            + (y1 / h - m1 * h / 6.) * t
    }
    /// Knots abscissa
    pub fn knots(&self) -> &[f64] {
        &self.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn through_knots() {
        let x = [0.1, 0.4, 1.0, 2.5, 3.0, 7.0];
        let y = [1.0, -0.3, 2.2, 0.7, 0.1, 4.0];
        let spline = CubicSpline::new(&x, &y).unwrap();
        for (x, y) in x.iter().zip(y) {
            assert!((spline.eval(*x) - y).abs() < 1e-12);
        }
    }

    #[test]
    fn cubic_is_exact() {
        let f = |x: f64| 0.5 * x.powi(3) - 2. * x * x + x - 3.;
        let x = [-2., -0.5, 0.3, 1.7, 2.0, 4.1];
        let y: Vec<_> = x.iter().map(|&x| f(x)).collect();
        let spline = CubicSpline::new(&x, &y).unwrap();
        for x in [-3., -1.2, 0., 1., 1.9, 3.3, 5.] {
            assert!((spline.eval(x) - f(x)).abs() < 1e-9, "x={}", x);
        }
    }

    #[test]
    fn parabola() {
        let f = |x: f64| 2. * x * x - x + 1.;
        let x = [0., 1., 3.];
        let y: Vec<_> = x.iter().map(|&x| f(x)).collect();
        let spline = CubicSpline::new(&x, &y).unwrap();
        for x in [-1., 0.5, 2., 4.] {
            assert!((spline.eval(x) - f(x)).abs() < 1e-10);
        }
    }

    #[test]
    fn line() {
        let spline = CubicSpline::new(&[1., 3.], &[2., 6.]).unwrap();
        assert!((spline.eval(2.) - 4.).abs() < 1e-12);
        assert!((spline.eval(5.) - 10.).abs() < 1e-12);
    }

    #[test]
    fn too_few() {
        assert!(matches!(
            CubicSpline::new(&[1.], &[2.]),
            Err(PsfError::TooFewSamples(1))
        ));
    }
}
