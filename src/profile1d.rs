//! 1D Gaussian fits of horizontal and vertical cuts through the cloud

use serde::Serialize;

use crate::{
    config::{AnalysisConfig, InitialGuess},
    error::Profile,
    fit::{
        self,
        gaussian::{Gaussian1D, Gaussian1DModel},
        FitDiagnostics,
    },
    image::{Image, Roi},
    Error, Result,
};

/// Gaussian fit of a single cut
#[derive(Debug, Clone, Serialize)]
pub struct Profile1D {
    /// row (horizontal cut) or column (vertical cut) of the fitted profile
    pub index: usize,
    /// fitted Gaussian sampled at every pixel along the cut
    pub curve: Vec<f64>,
    pub params: Gaussian1D,
    /// standard errors of `[amplitude, mean, stddev]`
    pub uncertainty: [f64; 3],
    pub diagnostics: FitDiagnostics,
}

/// Horizontal and vertical Gaussian fits of the optical density
#[derive(Debug, Clone, Serialize)]
pub struct Profile1DFit {
    pub horizontal: Profile1D,
    pub vertical: Profile1D,
}

impl InitialGuess {
    /// Starting `[amplitude, mean, stddev]` of a Gaussian fit of `values`
    pub fn guess(&self, values: &[f64]) -> [f64; 3] {
        let n = values.len() as f64;
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        match self {
            InitialGuess::Statistical => {
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                [max, mean, var.sqrt()]
            }
            InitialGuess::Moments => {
                let (w, wx) = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v.max(0.), i as f64))
                    .fold((0f64, 0f64), |(w, wx), (v, x)| (w + v, wx + v * x));
                let centroid = wx / w;
                let var = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| v.max(0.) * (i as f64 - centroid).powi(2))
                    .sum::<f64>()
                    / w;
                [max, centroid, var.sqrt()]
            }
        }
    }
}

fn fit_cut(
    profile: Profile,
    index: usize,
    cut: &[f64],
    residual_profile: &[f64],
    config: &AnalysisConfig,
) -> Result<Profile1D> {
    let x: Vec<f64> = (0..cut.len()).map(|i| i as f64).collect();
    let guess = config.initial_guess.guess(cut);
    log::debug!("{profile} #{index}: initial guess {guess:?}");
    let solution = fit::optimize(&Gaussian1DModel, &x, cut, guess, &config.lm).map_err(|e| {
        log::warn!("{profile} #{index}: {e}");
        Error::fit(profile)(e)
    })?;
    let params = Gaussian1D::from(solution.params);
    let curve = params.sample(cut.len());
    let diagnostics = FitDiagnostics::new(
        residual_profile.iter().cloned(),
        curve.iter().cloned(),
        config.zero_floor,
        &solution,
    );
    log::info!(
        "{profile} #{index}: A={:.4}, μ={:.2}px, σ={:.2}px ({} iterations)",
        params.amplitude,
        params.mean,
        params.stddev,
        solution.iterations
    );
    Ok(Profile1D {
        index,
        curve,
        params,
        uncertainty: solution.uncertainty(),
        diagnostics,
    })
}

/// Fits 1D Gaussians to a horizontal and a vertical cut of the optical density
///
/// The rows and columns of the cuts and of the profiles the residuals are
/// computed against are selected from the analysis ROI according to the
/// configured [SliceConvention](crate::image::SliceConvention). Each cut is
/// fitted over the full width (height) of the map.
pub fn fit_profile_1d(
    od: &Image,
    analysis_roi: &Roi,
    config: &AnalysisConfig,
) -> Result<Profile1DFit> {
    analysis_roi.validate(od.shape())?;
    let idx = config.slice_convention.indices(analysis_roi, od.shape())?;

    let row = |i: usize| od.row(i).iter().cloned().collect::<Vec<_>>();
    let column = |i: usize| od.column(i).iter().cloned().collect::<Vec<_>>();

    let horizontal = fit_cut(
        Profile::Horizontal,
        idx.cut_row,
        &row(idx.cut_row),
        &row(idx.residual_row),
        config,
    )?;
    let vertical = fit_cut(
        Profile::Vertical,
        idx.cut_column,
        &column(idx.cut_column),
        &column(idx.residual_column),
        config,
    )?;
    Ok(Profile1DFit {
        horizontal,
        vertical,
    })
}
