//! Natural cubic spline used to remap noise values into elevation ranges.
//!
//! Control points must have strictly increasing x. Between control points the
//! curve is a cubic with continuous first and second derivatives; the second
//! derivative is zero at both ends. Outside the control range the curve
//! continues as a straight line with the boundary slope.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};

/// Per-segment polynomial `y = a + b*h + c*h^2 + d*h^3`, `h = x - x_i`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Segment {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SplinePoints", into = "SplinePoints")]
pub struct Spline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    segments: Vec<Segment>,
    /// Slope at the last control point, used for right extrapolation.
    end_slope: f64,
}

/// Serialized form: just the control points.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SplinePoints {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl TryFrom<SplinePoints> for Spline {
    type Error = TerrainError;

    fn try_from(points: SplinePoints) -> Result<Self> {
        Spline::new(points.xs, points.ys)
    }
}

impl From<Spline> for SplinePoints {
    fn from(spline: Spline) -> Self {
        Self { xs: spline.xs, ys: spline.ys }
    }
}

impl Spline {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        let mut spline = Self::default();
        spline.set_points(xs, ys)?;
        Ok(spline)
    }

    /// True once control points have been set.
    pub fn is_set(&self) -> bool {
        self.xs.len() >= 2
    }

    pub fn points(&self) -> (&[f64], &[f64]) {
        (&self.xs, &self.ys)
    }

    /// Replace the control points and recompute the coefficients.
    pub fn set_points(&mut self, xs: Vec<f64>, ys: Vec<f64>) -> Result<()> {
        if xs.len() != ys.len() {
            return Err(TerrainError::input(format!(
                "spline needs as many y values as x values ({} vs {})",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(TerrainError::input("spline needs at least two control points"));
        }
        if xs.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(TerrainError::input("spline x values must be strictly increasing"));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(TerrainError::input("spline control points must be finite"));
        }

        let n = xs.len();
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let second = natural_second_derivatives(&ys, &h);

        let segments: Vec<Segment> = (0..n - 1)
            .map(|i| {
                let slope = (ys[i + 1] - ys[i]) / h[i];
                Segment {
                    a: ys[i],
                    b: slope - h[i] * (2.0 * second[i] + second[i + 1]) / 6.0,
                    c: second[i] / 2.0,
                    d: (second[i + 1] - second[i]) / (6.0 * h[i]),
                }
            })
            .collect();

        let last = segments[n - 2];
        let hl = h[n - 2];
        self.end_slope = last.b + 2.0 * last.c * hl + 3.0 * last.d * hl * hl;
        self.xs = xs;
        self.ys = ys;
        self.segments = segments;
        Ok(())
    }

    /// Evaluate the spline at `x`. An unset spline evaluates to 0.
    pub fn evaluate(&self, x: f64) -> f64 {
        if !self.is_set() {
            return 0.0;
        }
        let n = self.xs.len();
        if x < self.xs[0] {
            return self.ys[0] + self.segments[0].b * (x - self.xs[0]);
        }
        if x > self.xs[n - 1] {
            return self.ys[n - 1] + self.end_slope * (x - self.xs[n - 1]);
        }

        let i = self.xs.partition_point(|&p| p <= x).saturating_sub(1).min(n - 2);
        let s = self.segments[i];
        let dx = x - self.xs[i];
        ((s.d * dx + s.c) * dx + s.b) * dx + s.a
    }
}

/// Solve the tridiagonal system for the second derivatives of a natural
/// cubic spline (zero at both ends).
fn natural_second_derivatives(ys: &[f64], h: &[f64]) -> Vec<f64> {
    let n = ys.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    // Interior unknowns m[1..n-1], solved with the Thomas algorithm.
    let size = n - 2;
    let mut diag = vec![0.0; size];
    let mut upper = vec![0.0; size];
    let mut rhs = vec![0.0; size];
    for k in 0..size {
        let i = k + 1;
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        upper[k] = h[i];
        rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
    }

    for k in 1..size {
        let lower = h[k];
        let w = lower / diag[k - 1];
        diag[k] -= w * upper[k - 1];
        rhs[k] -= w * rhs[k - 1];
    }

    m[size] = rhs[size - 1] / diag[size - 1];
    for k in (0..size - 1).rev() {
        m[k + 1] = (rhs[k] - upper[k] * m[k + 2]) / diag[k];
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continentalness() -> Spline {
        Spline::new(
            vec![-1.0, -0.7, -0.2, 0.03, 0.3, 1.0],
            vec![0.0, 40.0, 64.0, 66.0, 68.0, 70.0],
        )
        .unwrap()
    }

    #[test]
    fn test_passes_through_control_points() {
        let spline = continentalness();
        let (xs, ys) = spline.points();
        for (x, y) in xs.iter().zip(ys) {
            assert!((spline.evaluate(*x) - y).abs() < 1e-9, "at x={}", x);
        }
    }

    #[test]
    fn test_two_points_is_linear() {
        let spline = Spline::new(vec![0.0, 2.0], vec![1.0, 5.0]).unwrap();
        assert!((spline.evaluate(1.0) - 3.0).abs() < 1e-12);
        assert!((spline.evaluate(-1.0) + 1.0).abs() < 1e-12);
        assert!((spline.evaluate(3.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_reproduces_cubic_free_straight_line() {
        // Collinear points have zero curvature everywhere
        let spline = Spline::new(vec![0.0, 1.0, 3.0, 4.0], vec![0.0, 2.0, 6.0, 8.0]).unwrap();
        for x in [0.25, 1.5, 2.9, 3.7] {
            assert!((spline.evaluate(x) - 2.0 * x).abs() < 1e-9);
        }
    }

    #[test]
    fn test_extrapolation_is_linear_with_boundary_slope() {
        let spline = continentalness();
        let a = spline.evaluate(1.5);
        let b = spline.evaluate(2.0);
        let c = spline.evaluate(2.5);
        assert!(((b - a) - (c - b)).abs() < 1e-9);

        let eps = 1e-6;
        let inside_slope = (spline.evaluate(1.0) - spline.evaluate(1.0 - eps)) / eps;
        let outside_slope = (spline.evaluate(1.0 + eps) - spline.evaluate(1.0)) / eps;
        assert!((inside_slope - outside_slope).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_malformed_points() {
        assert!(matches!(
            Spline::new(vec![0.0], vec![1.0]),
            Err(TerrainError::InvalidInput(_))
        ));
        assert!(matches!(
            Spline::new(vec![0.0, 1.0], vec![1.0]),
            Err(TerrainError::InvalidInput(_))
        ));
        assert!(matches!(
            Spline::new(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]),
            Err(TerrainError::InvalidInput(_))
        ));
        assert!(matches!(
            Spline::new(vec![1.0, 0.0], vec![1.0, 2.0]),
            Err(TerrainError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unset_spline_evaluates_to_zero() {
        let spline = Spline::default();
        assert!(!spline.is_set());
        assert_eq!(spline.evaluate(0.5), 0.0);
    }

    #[test]
    fn test_serde_keeps_only_points() {
        let spline = continentalness();
        let json = serde_json::to_string(&spline).unwrap();
        let back: Spline = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spline);
        assert!(serde_json::from_str::<Spline>(r#"{"xs":[0.0],"ys":[1.0]}"#).is_err());
    }
}
