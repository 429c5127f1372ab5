use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::IDataPoint;

/// Straight line `y = slope * x + intercept` fitted by ordinary least squares.
///
/// Only used to fill the gaps between measured pixel deviations, so there is
/// no weighting, outlier rejection or goodness-of-fit estimate here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    slope: f64,
    intercept: f64,
}

impl LinearRegressor {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Fit a line over the points.
    ///
    /// Returns `None` if there are fewer than 2 distinct x values: a vertical
    /// or single-point set has no usable slope.
    pub fn fit<P: IDataPoint<f64>>(points: &[P]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let x = DVector::<f64>::from_iterator(points.len(), points.iter().map(|p| p.x()));
        let y = DVector::<f64>::from_iterator(points.len(), points.iter().map(|p| p.y()));

        let x_mean = x.mean();
        let y_mean = y.mean();

        let dx = x.add_scalar(-x_mean);
        let dy = y.add_scalar(-y_mean);

        let sxx = dx.dot(&dx);
        if sxx <= 0.0 || sxx.is_nan() {
            return None;
        }

        let slope = dx.dot(&dy) / sxx;
        let intercept = y_mean - slope * x_mean;

        if slope.is_finite() && intercept.is_finite() {
            tracing::trace!("Linear fit: slope={}, intercept={}", slope, intercept);
            Some(Self { slope, intercept })
        } else {
            None
        }
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}
