use crate::{fit::FitError, image::Roi};

/// The profile a fit was attempted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Profile {
    #[strum(serialize = "horizontal cut")]
    Horizontal,
    #[strum(serialize = "vertical cut")]
    Vertical,
    #[strum(serialize = "2D surface")]
    Surface,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid ROI {roi:?} for a {height}x{width} image: {reason}")]
    InvalidRoi {
        roi: Roi,
        height: usize,
        width: usize,
        reason: &'static str,
    },
    #[error("normalization ROI {0:?} has a zero or undefined mean")]
    DegenerateNormalization(Roi),
    #[error("the {profile} fit did not converge")]
    FitDidNotConverge {
        profile: Profile,
        #[source]
        source: FitError,
    },
    #[error("image shapes differ: {0:?} and {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),
}
impl Error {
    pub(crate) fn fit(profile: Profile) -> impl FnOnce(FitError) -> Self {
        move |source| Error::FitDidNotConverge { profile, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
