//! 2D Gaussian fit of the optical density and atom number

use itertools::iproduct;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    config::{AnalysisConfig, Calibration, InitialGuess},
    error::Profile,
    fit::{
        self,
        gaussian::{Gaussian2D, Gaussian2DModel},
        FitDiagnostics,
    },
    image::{Image, Roi},
    Error, Result,
};

/// Rotated Gaussian fit of the whole optical density map
#[derive(Debug, Clone, Serialize)]
pub struct Profile2DFit {
    /// number of atoms within the analysis ROI
    pub atom_count: f64,
    /// fitted Gaussian sampled at every pixel of the map
    pub surface: Image,
    pub params: Gaussian2D,
    /// standard errors of `[amplitude, x0, y0, sigma_x, sigma_y, theta]`
    pub uncertainty: [f64; 6],
    pub diagnostics: FitDiagnostics,
}

/// Number of atoms from the optical density integrated over the ROI
pub fn atom_count(od: &Image, roi: &Roi, calibration: &Calibration) -> Result<f64> {
    Ok(roi.window(od)?.sum() * calibration.atoms_per_od())
}

/// Samples the Gaussian at every pixel of a `height` x `width` image
pub fn render(params: &Gaussian2D, (height, width): (usize, usize)) -> Image {
    let values: Vec<f64> = (0..height * width)
        .into_par_iter()
        .map(|i| params.eval((i % width) as f64, (i / width) as f64))
        .collect();
    Image::from_row_slice(height, width, &values)
}

impl InitialGuess {
    /// Starting `[amplitude, x0, y0, sigma_x, sigma_y, theta]` of the 2D Gaussian fit of `od`
    ///
    /// [Statistical](InitialGuess::Statistical) centers the Gaussian on the
    /// image with both widths set to `initial_width` and no rotation,
    /// [Moments](InitialGuess::Moments) derives the center, the widths and
    /// the angle from the first and second moments of the map (negative
    /// values being clipped).
    pub fn surface_guess(&self, od: &Image, initial_width: f64) -> [f64; 6] {
        let (height, width) = od.shape();
        match self {
            InitialGuess::Statistical => [
                od.max(),
                width as f64 / 2.,
                height as f64 / 2.,
                initial_width,
                initial_width,
                0.,
            ],
            InitialGuess::Moments => {
                let weights = || {
                    iproduct!(0..height, 0..width)
                        .map(move |(r, c)| (c as f64, r as f64, od[(r, c)].max(0.)))
                };
                let (w, wx, wy) = weights().fold((0f64, 0f64, 0f64), |(w, wx, wy), (x, y, v)| {
                    (w + v, wx + v * x, wy + v * y)
                });
                let (cx, cy) = (wx / w, wy / w);
                let (cxx, cyy, cxy) =
                    weights().fold((0f64, 0f64, 0f64), |(xx, yy, xy), (x, y, v)| {
                        let (dx, dy) = (x - cx, y - cy);
                        (xx + v * dx * dx, yy + v * dy * dy, xy + v * dx * dy)
                    });
                let (cxx, cyy, cxy) = (cxx / w, cyy / w, cxy / w);
                let mean = 0.5 * (cxx + cyy);
                let spread = 0.5 * (cxx - cyy).hypot(2. * cxy);
                [
                    od.max(),
                    cx,
                    cy,
                    (mean + spread).sqrt(),
                    (mean - spread).max(0.).sqrt(),
                    0.5 * (-2. * cxy).atan2(cxx - cyy),
                ]
            }
        }
    }
}

/// Fits a rotated 2D Gaussian to the optical density and counts the atoms within the analysis ROI
///
/// Every pixel of the map is a sample of the fit, the ROI only bounds the
/// atom number integration. By default the fit starts at the map maximum,
/// centered on the image, with both widths set to
/// [initial_width_2d](AnalysisConfig::initial_width_2d) and no rotation
/// (see [InitialGuess::surface_guess]).
pub fn fit_profile_2d(
    od: &Image,
    analysis_roi: &Roi,
    config: &AnalysisConfig,
) -> Result<Profile2DFit> {
    let atom_count = atom_count(od, analysis_roi, &config.calibration)?;
    log::info!("atom number: {:.3}M", atom_count * 1e-6);

    let (height, width) = od.shape();
    let (coords, data): (Vec<_>, Vec<_>) = iproduct!(0..height, 0..width)
        .map(|(r, c)| ((c as f64, r as f64), od[(r, c)]))
        .unzip();
    let guess = config
        .initial_guess
        .surface_guess(od, config.initial_width_2d);
    log::debug!("2D fit initial guess: {guess:?}");

    let solution =
        fit::optimize(&Gaussian2DModel, &coords, &data, guess, &config.lm).map_err(|e| {
            log::warn!("{}: {e}", Profile::Surface);
            Error::fit(Profile::Surface)(e)
        })?;
    let params = Gaussian2D::from(solution.params);
    let surface = render(&params, (height, width));
    let diagnostics = FitDiagnostics::new(
        data.iter().cloned(),
        iproduct!(0..height, 0..width).map(|(r, c)| surface[(r, c)]),
        config.zero_floor,
        &solution,
    );
    log::info!(
        "2D fit: A={:.4}, (x0,y0)=({:.2},{:.2})px, (σx,σy)=({:.2},{:.2})px, θ={:.4}rd ({} iterations)",
        params.amplitude,
        params.x0,
        params.y0,
        params.sigma_x,
        params.sigma_y,
        params.theta,
        solution.iterations
    );

    Ok(Profile2DFit {
        atom_count,
        surface,
        params,
        uncertainty: solution.uncertainty(),
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TRUTH: [f64; 6] = [3., 60., 40., 15., 25., 0.3];

    fn cloud() -> Image {
        render(&Gaussian2D::from(TRUTH), (80, 120))
    }

    /// Both parameter sets describing the same rotated Gaussian, angles wrapped to (-π/2, π/2]
    fn representations(g: &Gaussian2D) -> [[f64; 6]; 2] {
        let wrap = |t: f64| {
            let t = t.rem_euclid(PI);
            if t > FRAC_PI_2 {
                t - PI
            } else {
                t
            }
        };
        [
            [g.amplitude, g.x0, g.y0, g.sigma_x, g.sigma_y, wrap(g.theta)],
            [
                g.amplitude,
                g.x0,
                g.y0,
                g.sigma_y,
                g.sigma_x,
                wrap(g.theta + FRAC_PI_2),
            ],
        ]
    }

    #[test]
    fn round_trip() {
        let fit = fit_profile_2d(&cloud(), &Roi::new(0, 120, 0, 80), &AnalysisConfig::default())
            .unwrap();
        let recovered = representations(&fit.params).into_iter().any(|p| {
            p.iter()
                .zip(TRUTH)
                .all(|(p, t)| ((p - t) / t).abs() < 1e-2)
        });
        assert!(recovered, "{:?}", fit.params);
        assert!(
            fit.uncertainty.iter().all(|s| *s < 1e-6),
            "{:?}",
            fit.uncertainty
        );
        assert_eq!(fit.surface.shape(), (80, 120));
        assert!((fit.surface - cloud()).abs().max() < 1e-6);
    }

    #[test]
    fn small_cloud_from_moments() {
        let truth = [0.8, 40., 25., 8., 6., 0.];
        let od = render(&Gaussian2D::from(truth), (60, 100));
        let config = AnalysisConfig::default().initial_guess(InitialGuess::Moments);
        let guess = config.initial_guess.surface_guess(&od, config.initial_width_2d);
        assert!((guess[1] - 40.).abs() < 1e-3 && (guess[2] - 25.).abs() < 1e-3);
        let fit = fit_profile_2d(&od, &Roi::new(20, 60, 45, 5), &config).unwrap();
        let recovered = representations(&fit.params).into_iter().any(|p| {
            p.iter()
                .zip(truth)
                .all(|(p, t)| (p - t).abs() < 1e-3 * t.abs().max(1.))
        });
        assert!(recovered, "{:?}", fit.params);
    }

    #[test]
    fn moments_guess_of_rotated_cloud() {
        let od = render(&Gaussian2D::from([1., 100., 100., 10., 5., 0.4]), (200, 200));
        let [_, x0, y0, sigma_x, sigma_y, theta] = InitialGuess::Moments.surface_guess(&od, 400.);
        assert!((x0 - 100.).abs() < 1e-6 && (y0 - 100.).abs() < 1e-6);
        assert!((sigma_x - 10.).abs() < 1e-2, "{sigma_x}");
        assert!((sigma_y - 5.).abs() < 1e-2, "{sigma_y}");
        assert!((theta - 0.4).abs() < 1e-3, "{theta}");
    }

    #[test]
    fn atom_count_scales_with_density() {
        let od = cloud();
        let roi = Roi::new(30, 90, 70, 10);
        let config = AnalysisConfig::default();
        let n = fit_profile_2d(&od, &roi, &config).unwrap().atom_count;
        let n2 = fit_profile_2d(&(&od * 2.), &roi, &config)
            .unwrap()
            .atom_count;
        assert!(n > 0.);
        assert!((n2 / n - 2.).abs() < 1e-12);
    }

    #[test]
    fn atom_count_calibration() {
        let od = Image::from_element(20, 20, 0.5);
        let calibration = Calibration::default();
        let n = atom_count(&od, &Roi::new(2, 12, 15, 5), &calibration).unwrap();
        let expected = 100. * 0.5 * (8.46e-6f64).powi(2) / 2.907e-13;
        assert!((n / expected - 1.).abs() < 1e-12);
        let n_reversed = atom_count(&od, &Roi::new(2, 12, 5, 15), &calibration).unwrap();
        assert_eq!(n, n_reversed);
        let custom = Calibration {
            cross_section_m2: 1e-13,
            pixel_pitch_m: 1e-5,
        };
        let n = atom_count(&od, &Roi::new(0, 20, 0, 20), &custom).unwrap();
        assert!((n / (400. * 0.5 * 1e-10 / 1e-13) - 1.).abs() < 1e-12);
    }

    #[test]
    fn flat_map_does_not_converge() {
        let od = Image::zeros(40, 60);
        let err = fit_profile_2d(&od, &Roi::new(10, 30, 30, 10), &AnalysisConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FitDidNotConverge {
                profile: Profile::Surface,
                ..
            }
        ));
    }

    #[test]
    fn invalid_roi() {
        assert!(matches!(
            fit_profile_2d(&cloud(), &Roi::new(0, 121, 0, 80), &AnalysisConfig::default()),
            Err(Error::InvalidRoi { .. })
        ));
    }
}
