//! Optical density maps

use crate::{
    image::{same_shape, Image, Roi},
    Error, Result,
};

/// Mean of the ROI, failing if it is zero or undefined
fn roi_mean(image: &Image, roi: &Roi) -> Result<f64> {
    let mean = roi.window(image)?.mean();
    if mean == 0. || !mean.is_finite() {
        Err(Error::DegenerateNormalization(*roi))
    } else {
        Ok(mean)
    }
}

/// Divides the image by the mean of the ROI
pub fn normalize_to_roi(image: &Image, roi: &Roi) -> Result<Image> {
    let mean = roi_mean(image, roi)?;
    Ok(image / mean)
}

/// Optical density `log10(bright / dark)` before the zero substitution
///
/// Both images are normalized by the mean of the dark image within the
/// normalization ROI. Pixels where either normalized intensity is zero have
/// no valid signal and are set to 0: a dead or saturated dark pixel is
/// never divided by.
pub fn raw_optical_density(dark: &Image, bright: &Image, normalization_roi: &Roi) -> Result<Image> {
    same_shape(dark, bright)?;
    let mean = roi_mean(dark, normalization_roi)?;
    Ok(dark.zip_map(bright, |d, b| {
        let (d, b) = (d / mean, b / mean);
        if d != 0. && b != 0. {
            (b / d).log10()
        } else {
            0.
        }
    }))
}

/// Replaces every zero of the map by the map maximum
///
/// Pixels without signal are then rendered as fully absorbing instead of as
/// dark spots. A valid pixel with an optical density of exactly 0 is
/// indistinguishable from a pixel without signal and is replaced too.
pub fn fill_zeros_with_max(mut od: Image) -> Image {
    let max = od.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    od.iter_mut().filter(|v| **v == 0.).for_each(|v| *v = max);
    od
}

/// Computes the optical density map of a (dark, bright) image pair
///
/// The normalization ROI must lie within the images and the dark image
/// must have a non-zero mean within it.
pub fn compute_optical_density(
    dark: &Image,
    bright: &Image,
    normalization_roi: &Roi,
) -> Result<Image> {
    let od = raw_optical_density(dark, bright, normalization_roi)?;
    let od = fill_zeros_with_max(od);
    log::debug!(
        "optical density: {}x{}, range [{:.3},{:.3}]",
        od.nrows(),
        od.ncols(),
        od.min(),
        od.max()
    );
    Ok(od)
}

/// Quick-look optical density `log10(reference / absorption)` for live display
///
/// Pixels where the absorption image is zero are given a ratio of 1, i.e. an
/// optical density of 0.
pub fn display_optical_density(reference: &Image, absorption: &Image) -> Result<Image> {
    same_shape(reference, absorption)?;
    Ok(reference.zip_map(absorption, |r, a| {
        if a != 0. {
            (r / a).log10()
        } else {
            0.
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(height: usize, width: usize) -> Image {
        Image::from_fn(height, width, |r, c| {
            100. + 50. * (-(((r as f64 - 10.).powi(2) + (c as f64 - 15.).powi(2)) / 40.)).exp()
        })
    }

    #[test]
    fn normalization_idempotence() {
        let dark = frame(20, 30);
        let bright = Image::from_fn(20, 30, |r, c| 120. + (r + c) as f64);
        let roi = Roi::new(0, 10, 0, 5);
        let od = compute_optical_density(&dark, &bright, &roi).unwrap();
        let scaled =
            compute_optical_density(&(&dark * 7.5), &(&bright * 7.5), &roi).unwrap();
        assert!((od - scaled).abs().max() < 1e-12);
    }

    #[test]
    fn identical_images_have_zero_density() {
        let dark = frame(20, 30);
        let roi = Roi::new(20, 30, 0, 20);
        let raw = raw_optical_density(&dark, &dark, &roi).unwrap();
        assert!(raw.iter().all(|v| *v == 0.));
        let od = compute_optical_density(&dark, &dark, &roi).unwrap();
        assert!(od.iter().all(|v| *v == 0.));
    }

    #[test]
    fn max_substitution() {
        let mut od = Image::zeros(6, 4);
        od[(2, 3)] = 0.8;
        let od = fill_zeros_with_max(od);
        assert!(od.iter().all(|v| *v == 0.8));
    }

    #[test]
    fn zero_pixels_take_the_maximum() {
        let mut dark = Image::from_element(5, 5, 100.);
        let mut bright = Image::from_element(5, 5, 100.);
        dark[(1, 1)] = 0.;
        bright[(3, 3)] = 0.;
        bright[(0, 4)] = 1000.;
        let od = compute_optical_density(&dark, &bright, &Roi::new(0, 5, 0, 5)).unwrap();
        let max = od[(0, 4)];
        assert!((max - 1.).abs() < 1e-12);
        assert_eq!(od[(1, 1)], max);
        assert_eq!(od[(3, 3)], max);
        assert_eq!(od[(2, 2)], max);
        assert!(od.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn degenerate_normalization() {
        let mut dark = Image::from_element(10, 10, 5.);
        dark.view_mut((0, 0), (4, 4)).fill(0.);
        let bright = Image::from_element(10, 10, 5.);
        assert!(matches!(
            compute_optical_density(&dark, &bright, &Roi::new(0, 4, 0, 4)),
            Err(Error::DegenerateNormalization(_))
        ));
        assert!(matches!(
            normalize_to_roi(&dark, &Roi::new(4, 0, 4, 0)),
            Err(Error::DegenerateNormalization(_))
        ));
    }

    #[test]
    fn invalid_normalization_roi() {
        let dark = Image::from_element(10, 10, 5.);
        assert!(matches!(
            compute_optical_density(&dark, &dark, &Roi::new(0, 11, 0, 4)),
            Err(Error::InvalidRoi { .. })
        ));
    }

    #[test]
    fn shape_mismatch() {
        let dark = Image::from_element(10, 10, 5.);
        let bright = Image::from_element(10, 12, 5.);
        assert!(matches!(
            compute_optical_density(&dark, &bright, &Roi::new(0, 4, 0, 4)),
            Err(Error::ShapeMismatch((10, 10), (10, 12)))
        ));
        assert!(matches!(
            display_optical_density(&dark, &bright),
            Err(Error::ShapeMismatch(..))
        ));
    }

    #[test]
    fn display_density() {
        let reference = Image::from_element(2, 2, 100.);
        let absorption = Image::from_row_slice(2, 2, &[10., 100., 0., 1000.]);
        let od = display_optical_density(&reference, &absorption).unwrap();
        let expected = Image::from_row_slice(2, 2, &[1., 0., 0., -1.]);
        assert!((od - expected).abs().max() < 1e-12);
    }

    #[test]
    fn roi_normalization() {
        let mut image = Image::from_element(4, 4, 2.);
        image[(3, 3)] = 8.;
        let normalized = normalize_to_roi(&image, &Roi::new(0, 2, 0, 2)).unwrap();
        assert_eq!(normalized[(0, 0)], 1.);
        assert_eq!(normalized[(3, 3)], 4.);
    }
}
