//! Nonlinear least-squares fitting
//!
//! Levenberg-Marquardt minimization of the sum of squared residuals between
//! a [Model] and samples, with the parameter covariance estimated the usual
//! unweighted curve-fit way: `(JᵀJ)⁻¹ · SSR / (N - p)`.

use nalgebra::{SMatrix, SVector};
use serde::Serialize;

use crate::config::LmConfig;

pub mod gaussian;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FitError {
    #[error("{points} data points cannot constrain {parameters} parameters")]
    InsufficientData { points: usize, parameters: usize },
    #[error("model or residuals are not finite at iteration {0}")]
    NonFinite(usize),
    #[error("singular normal equations at iteration {0}")]
    Singular(usize),
    #[error("singular covariance matrix")]
    SingularCovariance,
    #[error("no convergence after {0} iterations")]
    MaxIterations(usize),
    #[error("damping exceeded {max_lambda:e} at iteration {iteration} without convergence")]
    Stalled { iteration: usize, max_lambda: f64 },
    #[error("parameter #{parameter} = {value:e} is undetermined (standard error {uncertainty:e})")]
    Undetermined {
        parameter: usize,
        value: f64,
        uncertainty: f64,
    },
}
type Result<T> = std::result::Result<T, FitError>;

/// A model with `N` free parameters evaluated at coordinates of type `C`
pub trait Model<C, const N: usize> {
    /// Model value
    fn evaluate(&self, at: C, params: &[f64; N]) -> f64;
    /// Partial derivatives of the model with respect to the parameters
    fn jacobian_row(&self, at: C, params: &[f64; N]) -> [f64; N];
    /// Indices of the parameters setting the scale of the model (amplitudes, widths)
    ///
    /// A converged fit with one of them lost in its own standard error has
    /// collapsed instead of describing the data.
    fn scale_parameters(&self) -> &'static [usize] {
        &[]
    }
}

/// Outcome of a converged fit
#[derive(Debug, Clone, Copy)]
pub struct Solution<const N: usize> {
    pub params: [f64; N],
    pub covariance: SMatrix<f64, N, N>,
    /// sum of squared residuals at the solution
    pub ssr: f64,
    pub iterations: usize,
}
impl<const N: usize> Solution<N> {
    /// Parameter standard errors, the square root of the covariance diagonal
    pub fn uncertainty(&self) -> [f64; N] {
        let mut sigma = [0f64; N];
        sigma
            .iter_mut()
            .zip(self.covariance.diagonal().iter())
            .for_each(|(s, v)| *s = v.sqrt());
        sigma
    }
}

/// Goodness of fit figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitDiagnostics {
    /// sum of the squared residuals normalized by the data
    pub chi_squared: f64,
    /// `chi_squared` per degree of freedom
    pub reduced_chi_squared: f64,
    /// sum of the squared residuals of the fitted data
    pub residual_sum_of_squares: f64,
    pub iterations: usize,
}
impl FitDiagnostics {
    /// Computes the diagnostics of `model` against `data`
    ///
    /// The residuals are normalized by the data, zero data values being
    /// replaced by `zero_floor`.
    pub fn new<const N: usize>(
        data: impl IntoIterator<Item = f64>,
        model: impl IntoIterator<Item = f64>,
        zero_floor: f64,
        solution: &Solution<N>,
    ) -> Self {
        let (chi_squared, n) = data
            .into_iter()
            .zip(model)
            .map(|(d, m)| {
                let residual = d - m;
                let d = if d == 0. { zero_floor } else { d };
                (residual / d).powi(2)
            })
            .fold((0f64, 0usize), |(s, n), x| (s + x, n + 1));
        Self {
            chi_squared,
            reduced_chi_squared: chi_squared / (n as f64 - N as f64),
            residual_sum_of_squares: solution.ssr,
            iterations: solution.iterations,
        }
    }
}

struct NormalEquations<const N: usize> {
    hessian: SMatrix<f64, N, N>,
    gradient: SVector<f64, N>,
    ssr: f64,
}

fn sum_of_squares<C: Copy, M: Model<C, N>, const N: usize>(
    model: &M,
    coords: &[C],
    data: &[f64],
    params: &[f64; N],
) -> f64 {
    coords
        .iter()
        .zip(data)
        .map(|(&at, &z)| (z - model.evaluate(at, params)).powi(2))
        .sum()
}

fn normal_equations<C: Copy, M: Model<C, N>, const N: usize>(
    model: &M,
    coords: &[C],
    data: &[f64],
    params: &[f64; N],
) -> NormalEquations<N> {
    let mut hessian = SMatrix::<f64, N, N>::zeros();
    let mut gradient = SVector::<f64, N>::zeros();
    let mut ssr = 0f64;
    for (&at, &z) in coords.iter().zip(data) {
        let r = z - model.evaluate(at, params);
        let row = SVector::<f64, N>::from(model.jacobian_row(at, params));
        ssr += r * r;
        gradient += row * r;
        hessian += row * row.transpose();
    }
    NormalEquations {
        hessian,
        gradient,
        ssr,
    }
}

/// Fits `model` to the samples `data` taken at `coords`, starting from `initial`
pub fn optimize<C: Copy, M: Model<C, N>, const N: usize>(
    model: &M,
    coords: &[C],
    data: &[f64],
    initial: [f64; N],
    config: &LmConfig,
) -> Result<Solution<N>> {
    let n = coords.len().min(data.len());
    if n <= N {
        return Err(FitError::InsufficientData {
            points: n,
            parameters: N,
        });
    }
    if initial.iter().any(|p| !p.is_finite()) {
        return Err(FitError::NonFinite(0));
    }

    let mut params = SVector::<f64, N>::from(initial);
    let mut eqs = normal_equations(model, coords, data, &initial);
    let mut lambda = config.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    for iteration in 1..=config.max_iterations {
        iterations = iteration;
        if !eqs.ssr.is_finite() || eqs.hessian.iter().any(|h| !h.is_finite()) {
            return Err(FitError::NonFinite(iteration));
        }
        if eqs.ssr == 0. {
            converged = true;
            break;
        }

        let floor = eqs.hessian.diagonal().max() * 1e-12;
        let mut damped = eqs.hessian;
        for i in 0..N {
            damped[(i, i)] += lambda * eqs.hessian[(i, i)].max(floor);
        }
        let delta = damped
            .try_inverse()
            .map(|inverse| inverse * eqs.gradient)
            .ok_or(FitError::Singular(iteration))?;

        let trial = params + delta;
        let trial_ssr = sum_of_squares(model, coords, data, &trial.into());
        let small_step = delta.norm() <= config.xtol * (params.norm() + config.xtol);
        let small_reduction = (eqs.ssr - trial_ssr).abs() <= config.ftol * eqs.ssr;

        if trial_ssr.is_finite() && trial_ssr <= eqs.ssr {
            params = trial;
            lambda = (lambda * config.lambda_down).max(f64::EPSILON);
            eqs = normal_equations(model, coords, data, &params.into());
            log::debug!("LM #{iteration}: accepted, SSR={:.6e}, λ={lambda:.1e}", eqs.ssr);
            if small_step || small_reduction {
                converged = true;
                break;
            }
        } else {
            if small_step || (trial_ssr.is_finite() && small_reduction) {
                converged = true;
                break;
            }
            lambda *= config.lambda_up;
            log::debug!("LM #{iteration}: rejected, λ={lambda:.1e}");
            if lambda > config.max_lambda {
                return Err(FitError::Stalled {
                    iteration,
                    max_lambda: config.max_lambda,
                });
            }
        }
    }
    if !converged {
        return Err(FitError::MaxIterations(iterations));
    }
    if !eqs.ssr.is_finite() || params.iter().any(|p| !p.is_finite()) {
        return Err(FitError::NonFinite(iterations));
    }

    let covariance = eqs
        .hessian
        .try_inverse()
        .ok_or(FitError::SingularCovariance)?
        * (eqs.ssr / (n - N) as f64);
    if covariance
        .diagonal()
        .iter()
        .any(|v| !v.is_finite() || *v < 0.)
    {
        return Err(FitError::SingularCovariance);
    }
    let solution = Solution {
        params: params.into(),
        covariance,
        ssr: eqs.ssr,
        iterations,
    };
    let uncertainty = solution.uncertainty();
    for &parameter in model.scale_parameters() {
        let (value, uncertainty) = (solution.params[parameter], uncertainty[parameter]);
        if uncertainty > config.max_relative_uncertainty * value.abs() {
            return Err(FitError::Undetermined {
                parameter,
                value,
                uncertainty,
            });
        }
    }
    Ok(solution)
}
