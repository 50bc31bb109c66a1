//! Gaussian cloud profiles

use serde::Serialize;

use super::Model;

/// 1D Gaussian `amplitude · exp(-((x - mean)/stddev)² / 2)`
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Gaussian1D {
    pub amplitude: f64,
    pub mean: f64,
    pub stddev: f64,
}
impl Gaussian1D {
    pub fn eval(&self, x: f64) -> f64 {
        Gaussian1DModel.evaluate(x, &(*self).into())
    }
    /// Returns the profile sampled at `0..len`
    pub fn sample(&self, len: usize) -> Vec<f64> {
        (0..len).map(|x| self.eval(x as f64)).collect()
    }
}
impl From<[f64; 3]> for Gaussian1D {
    fn from([amplitude, mean, stddev]: [f64; 3]) -> Self {
        Self {
            amplitude,
            mean,
            stddev: stddev.abs(),
        }
    }
}
impl From<Gaussian1D> for [f64; 3] {
    fn from(g: Gaussian1D) -> Self {
        [g.amplitude, g.mean, g.stddev]
    }
}
/// Least-squares model of [Gaussian1D] with parameters `[amplitude, mean, stddev]`
pub struct Gaussian1DModel;
impl Model<f64, 3> for Gaussian1DModel {
    fn evaluate(&self, x: f64, &[amplitude, mean, stddev]: &[f64; 3]) -> f64 {
        let u = (x - mean) / stddev;
        amplitude * (-0.5 * u * u).exp()
    }
    fn jacobian_row(&self, x: f64, &[amplitude, mean, stddev]: &[f64; 3]) -> [f64; 3] {
        let u = (x - mean) / stddev;
        let e = (-0.5 * u * u).exp();
        let ae = amplitude * e;
        [e, ae * u / stddev, ae * u * u / stddev]
    }
    fn scale_parameters(&self) -> &'static [usize] {
        &[0, 2]
    }
}

/// Rotated 2D Gaussian
///
/// The coordinates relative to the center are rotated by `theta` and the
/// profile falls off independently along the rotated axes with widths
/// `sigma_x` and `sigma_y`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Gaussian2D {
    pub amplitude: f64,
    pub x0: f64,
    pub y0: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub theta: f64,
}
impl Gaussian2D {
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        Gaussian2DModel.evaluate((x, y), &(*self).into())
    }
}
impl From<[f64; 6]> for Gaussian2D {
    fn from([amplitude, x0, y0, sigma_x, sigma_y, theta]: [f64; 6]) -> Self {
        Self {
            amplitude,
            x0,
            y0,
            sigma_x: sigma_x.abs(),
            sigma_y: sigma_y.abs(),
            theta,
        }
    }
}
impl From<Gaussian2D> for [f64; 6] {
    fn from(g: Gaussian2D) -> Self {
        [g.amplitude, g.x0, g.y0, g.sigma_x, g.sigma_y, g.theta]
    }
}

/// Coordinates along the rotated axes
#[inline]
fn rotate(x: f64, y: f64, x0: f64, y0: f64, theta: f64) -> (f64, f64) {
    let (dx, dy) = (x - x0, y - y0);
    let (sin, cos) = theta.sin_cos();
    (dx * cos - dy * sin, dx * sin + dy * cos)
}

/// Least-squares model of [Gaussian2D] with parameters `[amplitude, x0, y0, sigma_x, sigma_y, theta]`
pub struct Gaussian2DModel;
impl Model<(f64, f64), 6> for Gaussian2DModel {
    fn evaluate(
        &self,
        (x, y): (f64, f64),
        &[amplitude, x0, y0, sigma_x, sigma_y, theta]: &[f64; 6],
    ) -> f64 {
        let (u, v) = rotate(x, y, x0, y0, theta);
        let q = 0.5 * (u * u / (sigma_x * sigma_x) + v * v / (sigma_y * sigma_y));
        amplitude * (-q).exp()
    }
    fn jacobian_row(
        &self,
        (x, y): (f64, f64),
        &[amplitude, x0, y0, sigma_x, sigma_y, theta]: &[f64; 6],
    ) -> [f64; 6] {
        let (u, v) = rotate(x, y, x0, y0, theta);
        let (sx2, sy2) = (sigma_x * sigma_x, sigma_y * sigma_y);
        let e = (-0.5 * (u * u / sx2 + v * v / sy2)).exp();
        let ae = amplitude * e;
        let (sin, cos) = theta.sin_cos();
        let (us, vs) = (u / sx2, v / sy2);
        [
            e,
            ae * (us * cos + vs * sin),
            ae * (vs * cos - us * sin),
            ae * u * u / (sx2 * sigma_x),
            ae * v * v / (sy2 * sigma_y),
            ae * u * v * (1. / sx2 - 1. / sy2),
        ]
    }
    fn scale_parameters(&self) -> &'static [usize] {
        &[0, 3, 4]
    }
}
