//! Least-squares polynomial refit of a profile, so the model can be queried between grid points.
use crate::errors::BasinError;

/// Polynomial in a shifted and scaled abscissa.
///
/// The abscissa is mapped onto [-1, 1] before fitting, which keeps the Vandermonde columns of a
/// degree 10 fit well enough conditioned for a Householder QR solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coef: Vec<f64>,
    center: f64,
    half_width: f64,
}

impl Polynomial {
    /// Fit a polynomial of `degree` to the points `(x, y)` by least squares.
    ///
    /// # Examples
    /// ```
    /// use basins::poly::Polynomial;
    /// let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
    /// let y: Vec<f64> = x.iter().map(|v| 2.0 * v * v - v + 3.0).collect();
    /// let p = Polynomial::fit(&x, &y, 2)?;
    /// assert!((p.eval(7.5) - (2.0 * 56.25 - 7.5 + 3.0)).abs() < 1e-9);
    /// # Ok::<(), basins::prelude::BasinError>(())
    /// ```
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self, BasinError> {
        let m = x.len();
        let n = degree + 1;
        if y.len() != m {
            return Err(BasinError::Config(format!(
                "polynomial fit needs matching lengths, got {} and {}",
                m,
                y.len()
            )));
        }
        if m < n {
            return Err(BasinError::Config(format!(
                "degree {} fit needs at least {} points, got {}",
                degree, n, m
            )));
        }
        let lo = x.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let center = 0.5 * (hi + lo);
        let half_width = if hi > lo { 0.5 * (hi - lo) } else { 1.0 };

        // column-major Vandermonde matrix
        let mut a = vec![0.0; m * n];
        for (i, xi) in x.iter().enumerate() {
            let t = (xi - center) / half_width;
            let mut pow = 1.0;
            for j in 0..n {
                a[j * m + i] = pow;
                pow *= t;
            }
        }
        let mut b = y.to_vec();

        // Householder QR, applying each reflection to b as we go
        for k in 0..n {
            let norm = (k..m).map(|i| a[k * m + i].powi(2)).sum::<f64>().sqrt();
            if norm == 0.0 {
                return Err(BasinError::Singular { row: k });
            }
            let alpha = if a[k * m + k] > 0.0 { -norm } else { norm };
            let mut v: Vec<f64> = (k..m).map(|i| a[k * m + i]).collect();
            v[0] -= alpha;
            let vnorm = v.iter().map(|x| x * x).sum::<f64>();
            if vnorm == 0.0 {
                continue;
            }
            for j in k..n {
                let dot = (k..m).map(|i| v[i - k] * a[j * m + i]).sum::<f64>();
                let f = 2.0 * dot / vnorm;
                for i in k..m {
                    a[j * m + i] -= f * v[i - k];
                }
            }
            let dot = (k..m).map(|i| v[i - k] * b[i]).sum::<f64>();
            let f = 2.0 * dot / vnorm;
            for i in k..m {
                b[i] -= f * v[i - k];
            }
        }

        // back substitution on R
        let mut coef = vec![0.0; n];
        for k in (0..n).rev() {
            let diag = a[k * m + k];
            if !diag.is_finite() || diag.abs() < 1e-300 {
                return Err(BasinError::Singular { row: k });
            }
            let tail = ((k + 1)..n).map(|j| a[j * m + k] * coef[j]).sum::<f64>();
            coef[k] = (b[k] - tail) / diag;
        }
        Ok(Polynomial {
            coef,
            center,
            half_width,
        })
    }

    /// Evaluate with Horner's scheme.
    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.half_width;
        self.coef.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }

    /// Degree of the polynomial.
    pub fn degree(&self) -> usize {
        self.coef.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_polynomial() {
        let x: Vec<f64> = (0..=50).map(|i| i as f64 * 10.0).collect();
        let truth = |v: f64| 0.3 + 1e-3 * v - 2e-6 * v * v + 1e-9 * v.powi(3);
        let y: Vec<f64> = x.iter().map(|v| truth(*v)).collect();
        let p = Polynomial::fit(&x, &y, 10).unwrap();
        assert_eq!(p.degree(), 10);
        for v in [0.0, 5.0, 123.4, 499.0, 500.0].iter() {
            assert!((p.eval(*v) - truth(*v)).abs() < 1e-9, "at {}", v);
        }
    }

    #[test]
    fn constant_data_fits_flat() {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y = vec![0.1; 30];
        let p = Polynomial::fit(&x, &y, 10).unwrap();
        for xi in &x {
            assert!((p.eval(*xi) - 0.1).abs() < 1e-10);
        }
    }

    #[test]
    fn too_few_points() {
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![1.0, 2.0, 3.0];
        assert!(Polynomial::fit(&x, &y, 10).is_err());
    }

    #[test]
    fn least_squares_line_through_noise() {
        let x: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 2.0 * v + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let p = Polynomial::fit(&x, &y, 1).unwrap();
        assert!((p.eval(5.0) - 10.0).abs() < 0.05);
    }
}
