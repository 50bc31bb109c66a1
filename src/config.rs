use serde::{Deserialize, Serialize};

use crate::image::SliceConvention;

/// Physical calibration used to turn optical density into an atom number
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// resonant absorption cross-section [m^2]
    pub cross_section_m2: f64,
    /// camera pixel pitch in the object plane [m]
    pub pixel_pitch_m: f64,
}
impl Default for Calibration {
    fn default() -> Self {
        Self {
            cross_section_m2: 2.907e-13,
            pixel_pitch_m: 8.46e-6,
        }
    }
}
impl Calibration {
    /// Pixel area [m^2]
    pub fn pixel_area(&self) -> f64 {
        self.pixel_pitch_m * self.pixel_pitch_m
    }
    /// Number of atoms per unit of optical density in a single pixel
    pub fn atoms_per_od(&self) -> f64 {
        self.pixel_area() / self.cross_section_m2
    }
}

/// Starting point of the 1D Gaussian fits
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum InitialGuess {
    /// amplitude, mean and standard deviation of the profile values
    #[default]
    Statistical,
    /// profile maximum, intensity weighted centroid and width of the profile
    Moments,
}

/// Levenberg-Marquardt solver settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// relative tolerance on the parameter steps
    pub xtol: f64,
    /// relative tolerance on the reduction of the sum of squares
    pub ftol: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// damping beyond which the solver gives up
    pub max_lambda: f64,
    /// largest standard error of a scale parameter relative to its value
    pub max_relative_uncertainty: f64,
}
impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            xtol: 1.49012e-8,
            ftol: 1.49012e-8,
            initial_lambda: 1e2,
            lambda_up: 10.,
            lambda_down: 0.1,
            max_lambda: 1e16,
            max_relative_uncertainty: 1.,
        }
    }
}

/// Optical density analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub calibration: Calibration,
    /// value substituted to zero pixels before dividing by them
    pub zero_floor: f64,
    pub slice_convention: SliceConvention,
    pub initial_guess: InitialGuess,
    /// starting widths of the 2D Gaussian [px]
    pub initial_width_2d: f64,
    pub lm: LmConfig,
}
impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            calibration: Default::default(),
            zero_floor: 1e-6,
            slice_convention: Default::default(),
            initial_guess: Default::default(),
            initial_width_2d: 400.,
            lm: Default::default(),
        }
    }
}
impl AnalysisConfig {
    pub fn calibration(self, calibration: Calibration) -> Self {
        Self {
            calibration,
            ..self
        }
    }
    pub fn slice_convention(self, slice_convention: SliceConvention) -> Self {
        Self {
            slice_convention,
            ..self
        }
    }
    pub fn initial_guess(self, initial_guess: InitialGuess) -> Self {
        Self {
            initial_guess,
            ..self
        }
    }
    pub fn initial_width_2d(self, initial_width_2d: f64) -> Self {
        Self {
            initial_width_2d,
            ..self
        }
    }
    pub fn lm(self, lm: LmConfig) -> Self {
        Self { lm, ..self }
    }
}
