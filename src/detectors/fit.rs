//! Parabolic fit evaluator
//!
//! Fits `a·x² + b·x + c` to a close-price window by least squares, with `x` the
//! position inside the window (0..N-1), and scores the fit with R².
//! Degenerate input never errors: it gets [`DEGENERATE_R2`], which every acceptance
//! threshold rejects.

use serde::{Deserialize, Serialize};

/// R² reported for windows that cannot be fitted
pub const DEGENERATE_R2: f64 = -1.0;

/// Fitted coefficients of `a·x² + b·x + c`, with `x` counted from the cup start.
/// [`eval`](Self::eval) gives the fitted curve, e.g. for drawing it over a chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl FitCoefficients {
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        (self.a * x + self.b) * x + self.c
    }
}

/// Outcome of a parabolic fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParabolicFit {
    pub r_squared: f64,
    /// `None` when the fit is degenerate
    pub coefficients: Option<FitCoefficients>,
}

impl ParabolicFit {
    fn degenerate() -> Self {
        Self {
            r_squared: DEGENERATE_R2,
            coefficients: None,
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.coefficients.is_none()
    }
}

/// Least-squares quadratic fit of `y` against positions 0..y.len().
///
/// Degenerate when there are fewer than three points, the prices are constant
/// (SS_tot = 0), the normal equations are singular, or anything is non-finite.
pub fn fit_parabola(y: &[f64]) -> ParabolicFit {
    let n = y.len();
    if n < 3 {
        return ParabolicFit::degenerate();
    }

    // Power sums Σx^p (p = 0..4) and moments Σx^p·y (p = 0..2)
    let mut sx = [0.0f64; 5];
    let mut sxy = [0.0f64; 3];
    for (i, &v) in y.iter().enumerate() {
        let x = i as f64;
        let mut xp = 1.0;
        for (p, s) in sx.iter_mut().enumerate() {
            *s += xp;
            if p < 3 {
                sxy[p] += xp * v;
            }
            xp *= x;
        }
    }

    let system = [
        [sx[0], sx[1], sx[2], sxy[0]],
        [sx[1], sx[2], sx[3], sxy[1]],
        [sx[2], sx[3], sx[4], sxy[2]],
    ];
    let Some([c, b, a]) = solve3(system) else {
        return ParabolicFit::degenerate();
    };
    let coefficients = FitCoefficients { a, b, c };

    let mean = sxy[0] / n as f64;
    let (ss_res, ss_tot, sum_sq) = y.iter().enumerate().fold(
        (0.0, 0.0, 0.0),
        |(res, tot, sq), (i, &v)| {
            let residual = v - coefficients.eval(i as f64);
            (res + residual * residual, tot + (v - mean) * (v - mean), sq + v * v)
        },
    );

    // Constant prices leave only rounding noise in SS_tot; the negated test also catches NaN
    if !(ss_tot > f64::EPSILON * sum_sq) {
        return ParabolicFit::degenerate();
    }

    let r_squared = 1.0 - ss_res / ss_tot;
    if !r_squared.is_finite() {
        return ParabolicFit::degenerate();
    }

    ParabolicFit {
        r_squared,
        coefficients: Some(coefficients),
    }
}

/// Gauss-Jordan elimination with partial pivoting on a 3x3 augmented matrix
fn solve3(mut m: [[f64; 4]; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if !(m[pivot][col].abs() > 1e-12) {
            return None;
        }
        m.swap(col, pivot);

        for row in 0..3 {
            if row != col {
                let factor = m[row][col] / m[col][col];
                for k in col..4 {
                    m[row][k] -= factor * m[col][k];
                }
            }
        }
    }

    let solution = [m[0][3] / m[0][0], m[1][3] / m[1][1], m[2][3] / m[2][2]];
    solution.iter().all(|v| v.is_finite()).then_some(solution)
}
