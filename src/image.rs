//! Images, regions of interest and the mapping from a ROI to the rows and columns
//! the 1D profiles are cut along

use std::{ops::Range, str::FromStr};

use nalgebra::{DMatrix, DMatrixView};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A camera frame or a map derived from it, `height` rows by `width` columns
pub type Image = DMatrix<f64>;

/// Checks that two images have the same shape
pub fn same_shape(a: &Image, b: &Image) -> Result<()> {
    if a.shape() == b.shape() {
        Ok(())
    } else {
        Err(Error::ShapeMismatch(a.shape(), b.shape()))
    }
}

/// Rectangular region of interest `[x_start, x_end, y_start, y_end]` in pixel coordinates
///
/// The coordinates are kept as received: the analysis ROI is usually given
/// with `y_start > y_end`, the rectangle spans the interval between the two
/// values of each pair whatever their order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x_start: i64,
    pub x_end: i64,
    pub y_start: i64,
    pub y_end: i64,
}
impl Roi {
    pub fn new(x_start: i64, x_end: i64, y_start: i64, y_end: i64) -> Self {
        Self {
            x_start,
            x_end,
            y_start,
            y_end,
        }
    }
    /// Checks that the ROI is non-empty and lies within an image of the given (height, width)
    pub fn validate(&self, (height, width): (usize, usize)) -> Result<()> {
        let invalid = |reason| Error::InvalidRoi {
            roi: *self,
            height,
            width,
            reason,
        };
        let in_range = |v: i64, len: usize| v >= 0 && v <= len as i64;
        if !(in_range(self.x_start, width) && in_range(self.x_end, width)) {
            return Err(invalid("x coordinates out of image bounds"));
        }
        if !(in_range(self.y_start, height) && in_range(self.y_end, height)) {
            return Err(invalid("y coordinates out of image bounds"));
        }
        if self.x_start == self.x_end || self.y_start == self.y_end {
            return Err(invalid("zero area"));
        }
        Ok(())
    }
    /// Column range covered by the ROI
    pub fn columns(&self) -> Range<usize> {
        ordered(self.x_start, self.x_end)
    }
    /// Row range covered by the ROI
    pub fn rows(&self) -> Range<usize> {
        ordered(self.y_start, self.y_end)
    }
    /// Number of pixels in the ROI
    pub fn area(&self) -> usize {
        self.columns().len() * self.rows().len()
    }
    /// Validates the ROI against the image and returns a view of the enclosed pixels
    pub fn window<'a>(&self, image: &'a Image) -> Result<DMatrixView<'a, f64>> {
        self.validate(image.shape())?;
        let (rows, cols) = (self.rows(), self.columns());
        Ok(image.view((rows.start, cols.start), (rows.len(), cols.len())))
    }
}
fn ordered(a: i64, b: i64) -> Range<usize> {
    (a.min(b).max(0) as usize)..(a.max(b).max(0) as usize)
}
impl FromStr for Roi {
    type Err = String;

    /// Parses `x_start,x_end,y_start,y_end`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<i64>().map_err(|e| format!("{v:?}: {e}")))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        match values.as_slice() {
            &[x_start, x_end, y_start, y_end] => Ok(Self::new(x_start, x_end, y_start, y_end)),
            _ => Err(format!(
                "expected 4 comma separated integers, found {}",
                values.len()
            )),
        }
    }
}
impl From<[i64; 4]> for Roi {
    fn from([x_start, x_end, y_start, y_end]: [i64; 4]) -> Self {
        Self::new(x_start, x_end, y_start, y_end)
    }
}

/// How the analysis ROI selects the row and the column the 1D profiles are taken along
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
pub enum SliceConvention {
    /// Indices derived from the ROI extents (`x_end - x_start`, `y_start - y_end`, ...),
    /// negative values counting back from the end of the axis
    ///
    /// This is the convention existing calibration data was produced with.
    #[default]
    RoiExtent,
    /// Row and column through the center of the ROI
    RoiCenter,
}

/// Rows and columns the 1D profiles are cut along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    /// row of the horizontal cut that is fitted
    pub cut_row: usize,
    /// column of the vertical cut that is fitted
    pub cut_column: usize,
    /// row of the horizontal profile the residuals are computed against
    pub residual_row: usize,
    /// column of the vertical profile the residuals are computed against
    pub residual_column: usize,
}
impl SliceConvention {
    /// Maps the ROI to the slice indices of an image of the given (height, width)
    pub fn indices(&self, roi: &Roi, (height, width): (usize, usize)) -> Result<SliceIndices> {
        let Roi {
            x_start,
            x_end,
            y_start,
            y_end,
        } = *roi;
        let (cut_row, cut_column, residual_row, residual_column) = match self {
            SliceConvention::RoiExtent => (
                x_end - x_start,
                y_start - y_end,
                (y_end - y_start) / 2,
                (x_end - x_start) / 2,
            ),
            SliceConvention::RoiCenter => {
                let (row, column) = ((y_start + y_end) / 2, (x_start + x_end) / 2);
                (row, column, row, column)
            }
        };
        let wrap = |index: i64, len: usize, reason| {
            wrap_index(index, len).ok_or(Error::InvalidRoi {
                roi: *roi,
                height,
                width,
                reason,
            })
        };
        Ok(SliceIndices {
            cut_row: wrap(cut_row, height, "horizontal cut row out of bounds")?,
            cut_column: wrap(cut_column, width, "vertical cut column out of bounds")?,
            residual_row: wrap(residual_row, height, "residual row out of bounds")?,
            residual_column: wrap(residual_column, width, "residual column out of bounds")?,
        })
    }
}

/// Resolves an index into an axis of length `len`, negative indices counting back from the end
pub fn wrap_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    match index {
        i if (0..len).contains(&i) => Some(i as usize),
        i if (-len..0).contains(&i) => Some((len + i) as usize),
        _ => None,
    }
}
