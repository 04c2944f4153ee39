//! Piecewise-linear curves over the normalized domain `[0, 1]`.
//!
//! Every interpolation stage of the engine (window, season and light-type
//! curves) evaluates one of these. Evaluation never fails: inputs are clamped
//! into the curve's domain, a single point yields a constant, and a vertical
//! step (two points sharing the same x) resolves to the later point.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One control point of a [`Curve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

impl CurvePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Ordered control points, evaluated by linear interpolation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curve(Vec<CurvePoint>);

impl Curve {
    pub fn new(points: Vec<CurvePoint>) -> Self {
        Self(points)
    }

    /// Build a curve from `(x, y)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self(pairs.iter().map(|&(x, y)| CurvePoint::new(x, y)).collect())
    }

    /// A flat curve returning `y` everywhere.
    pub fn constant(y: f64) -> Self {
        Self::from_pairs(&[(0.0, y), (1.0, y)])
    }

    /// `y = x` on `[0, 1]`.
    pub fn identity() -> Self {
        Self::from_pairs(&[(0.0, 0.0), (1.0, 1.0)])
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate the curve at `x`.
    ///
    /// `x` is clamped to `[0, 1]` and then to the span of the control points,
    /// so values left of the first point return its `y` and values right of
    /// the last point return that one's `y`. An empty curve evaluates to `0.0`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let points = &self.0;
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return 0.0;
        };

        let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) };

        if x < first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }

        // Last point at or left of x; with duplicated x values this is the later one.
        let index = points.iter().rposition(|p| p.x <= x).unwrap_or(0);
        let a = points[index];
        let Some(&b) = points.get(index + 1) else {
            return a.y;
        };
        if x == a.x {
            return a.y;
        }

        let span = b.x - a.x;
        if span <= 0.0 {
            return b.y;
        }
        a.y + (x - a.x) / span * (b.y - a.y)
    }

    /// Check the control points: at least one, all x inside `[0, 1]` and
    /// strictly increasing, no NaN anywhere.
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.0.is_empty() {
            anyhow::bail!("{label} curve has no control points");
        }

        for point in &self.0 {
            if point.x.is_nan() || point.y.is_nan() {
                anyhow::bail!("{label} curve contains NaN");
            }
            if !(0.0..=1.0).contains(&point.x) {
                anyhow::bail!(
                    "{label} curve point x={} lies outside the [0, 1] domain",
                    point.x
                );
            }
        }

        if let Some(pair) = self.0.windows(2).find(|pair| pair[1].x <= pair[0].x) {
            anyhow::bail!(
                "{label} curve x values must be strictly increasing ({} followed by {})",
                pair[0].x,
                pair[1].x
            );
        }

        Ok(())
    }
}
