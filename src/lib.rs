//! Absorption imaging analysis of cold atom clouds
//!
//! A (dark, bright) pair of camera frames is turned into an optical density
//! map, which is then fitted with 1D Gaussians along a horizontal and a
//! vertical cut and with a rotated 2D Gaussian over the whole map, the
//! latter also giving the number of atoms within the analysis ROI.
//!
//! ```no_run
//! use absorption_od::{analyse, AnalysisConfig, ImageLoader, Roi};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dark = ImageLoader::new("DATA/image.csv").load()?;
//! let bright = ImageLoader::new("DATA/bright.csv").load()?;
//! let analysis = analyse(
//!     &dark,
//!     &bright,
//!     &Roi::new(100, 400, 400, 100),
//!     &Roi::new(0, 50, 0, 50),
//!     &AnalysisConfig::default(),
//! )?;
//! analysis.summary();
//! # Ok(())
//! # }
//! ```

use std::time::Instant;

pub mod config;
pub mod error;
pub mod fit;
pub mod image;
pub mod loader;
pub mod od;
pub mod profile1d;
pub mod profile2d;

pub use config::{AnalysisConfig, Calibration, InitialGuess, LmConfig};
pub use error::{Error, Profile, Result};
pub use fit::{
    gaussian::{Gaussian1D, Gaussian2D},
    FitDiagnostics, FitError,
};
pub use image::{Image, Roi, SliceConvention};
pub use loader::{write_profiles_csv, ImageLoader, LoaderError};
pub use od::{compute_optical_density, display_optical_density, normalize_to_roi};
pub use profile1d::{fit_profile_1d, Profile1D, Profile1DFit};
pub use profile2d::{atom_count, fit_profile_2d, Profile2DFit};

/// Optical density map and its Gaussian fits
#[derive(Debug, Clone)]
pub struct Analysis {
    pub optical_density: Image,
    pub profile_1d: Profile1DFit,
    pub profile_2d: Profile2DFit,
}

/// Runs the whole analysis of a (dark, bright) image pair
///
/// The 1D and the 2D fits are run concurrently on the optical density map.
pub fn analyse(
    dark: &Image,
    bright: &Image,
    analysis_roi: &Roi,
    normalization_roi: &Roi,
    config: &AnalysisConfig,
) -> Result<Analysis> {
    let now = Instant::now();
    let optical_density = compute_optical_density(dark, bright, normalization_roi)?;
    let (profile_1d, profile_2d) = rayon::join(
        || fit_profile_1d(&optical_density, analysis_roi, config),
        || fit_profile_2d(&optical_density, analysis_roi, config),
    );
    log::info!("analysis completed in {}ms", now.elapsed().as_millis());
    Ok(Analysis {
        profile_1d: profile_1d?,
        profile_2d: profile_2d?,
        optical_density,
    })
}

impl Analysis {
    pub fn summary(&self) {
        let Self {
            optical_density: od,
            profile_1d,
            profile_2d,
        } = self;
        let minmax = od
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), &x| {
                (a.min(x), b.max(x))
            });
        println!("SUMMARY:");
        println!(" - optical density: {}x{} px", od.nrows(), od.ncols());
        println!(" - optical density range: [{:.3},{:.3}]", minmax.0, minmax.1);
        println!(" - atom number: {:.4e}", profile_2d.atom_count);
        println!(
            "    {:^16}: {:^12} {:^12} {:^12} {:>10}",
            "PROFILE", "AMPLITUDE", "CENTER [px]", "WIDTH [px]", "CHI2/DOF"
        );
        for (name, p) in [
            ("horizontal", &profile_1d.horizontal),
            ("vertical", &profile_1d.vertical),
        ] {
            println!(
                "  - {:16}: {:>5.3}±{:<6.1e} {:>5.1}±{:<6.1e} {:>5.1}±{:<6.1e} {:>10.3e}",
                format!("{name} #{}", p.index),
                p.params.amplitude,
                p.uncertainty[0],
                p.params.mean,
                p.uncertainty[1],
                p.params.stddev,
                p.uncertainty[2],
                p.diagnostics.reduced_chi_squared
            );
        }
        let g = &profile_2d.params;
        let s = &profile_2d.uncertainty;
        println!(" - 2D fit:");
        println!("    amplitude : {:.4}±{:.1e}", g.amplitude, s[0]);
        println!(
            "    center    : ({:.2}±{:.1e}, {:.2}±{:.1e}) px",
            g.x0, s[1], g.y0, s[2]
        );
        println!(
            "    widths    : ({:.2}±{:.1e}, {:.2}±{:.1e}) px",
            g.sigma_x, s[3], g.sigma_y, s[4]
        );
        println!("    angle     : {:.4}±{:.1e} rd", g.theta, s[5]);
        println!(
            "    chi2/dof  : {:.3e}",
            profile_2d.diagnostics.reduced_chi_squared
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Image, Image) {
        let (height, width) = (60, 100);
        let dark = Image::from_element(height, width, 1000.);
        let od = Image::from_fn(height, width, |r, c| {
            let (x, y) = (c as f64 - 50., r as f64 - 30.);
            0.8 * (-0.5 * ((x / 8.).powi(2) + (y / 6.).powi(2))).exp()
        });
        let bright = dark.zip_map(&od, |d, od| d * 10f64.powf(od));
        (dark, bright)
    }

    #[test]
    fn pipeline() {
        let (dark, bright) = pair();
        let config = AnalysisConfig::default()
            .slice_convention(SliceConvention::RoiCenter)
            .initial_guess(InitialGuess::Moments);
        let analysis = analyse(
            &dark,
            &bright,
            &Roi::new(20, 80, 50, 10),
            &Roi::new(0, 10, 0, 10),
            &config,
        )
        .unwrap();
        assert_eq!(analysis.optical_density.shape(), (60, 100));
        let h = &analysis.profile_1d.horizontal;
        assert_eq!(h.index, 30);
        assert!((h.params.mean - 50.).abs() < 1e-3, "{:?}", h.params);
        assert!((h.params.stddev - 8.).abs() < 1e-3, "{:?}", h.params);
        let v = &analysis.profile_1d.vertical;
        assert_eq!(v.index, 50);
        assert!((v.params.mean - 30.).abs() < 1e-3, "{:?}", v.params);
        let g = &analysis.profile_2d.params;
        assert!((g.x0 - 50.).abs() < 1e-2, "{g:?}");
        assert!((g.y0 - 30.).abs() < 1e-2, "{g:?}");
        assert!(analysis.profile_2d.atom_count > 0.);
        analysis.summary();
    }

    #[test]
    fn pipeline_errors() {
        let (dark, bright) = pair();
        let config = AnalysisConfig::default();
        assert!(matches!(
            analyse(
                &dark,
                &bright,
                &Roi::new(20, 80, 50, 10),
                &Roi::new(0, 101, 0, 10),
                &config
            ),
            Err(Error::InvalidRoi { .. })
        ));
        assert!(matches!(
            analyse(
                &dark,
                &bright.remove_row(0),
                &Roi::new(20, 80, 50, 10),
                &Roi::new(0, 10, 0, 10),
                &config
            ),
            Err(Error::ShapeMismatch(..))
        ));
    }
}
