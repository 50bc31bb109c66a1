//! Camera frames from delimited text and fitted cuts to CSV

use std::{
    io,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{image::Image, profile1d::Profile1DFit};

#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    #[error("Failed to open the image file")]
    Io(#[from] io::Error),
    #[error("Failed to read or write the CSV file")]
    Csv(#[from] csv::Error),
    #[error("row {row}, column {column}: {value:?} is not a number")]
    Parse {
        row: usize,
        column: usize,
        value: String,
    },
    #[error("row {row} has {found} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("no pixel values in {0:?}")]
    Empty(PathBuf),
}
type Result<T> = std::result::Result<T, LoaderError>;

/// Delimited text image loader
///
/// Each line of the file is a row of the image, the values of a row being
/// separated by the delimiter (`;` by default). The first line is a header
/// and is skipped unless [has_headers](ImageLoader::has_headers) is set to `false`.
pub struct ImageLoader {
    path: PathBuf,
    delimiter: u8,
    has_headers: bool,
}
impl Default for ImageLoader {
    fn default() -> Self {
        Self {
            path: PathBuf::from("image.csv"),
            delimiter: b';',
            has_headers: true,
        }
    }
}
impl ImageLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
    pub fn delimiter(self, delimiter: u8) -> Self {
        Self { delimiter, ..self }
    }
    pub fn has_headers(self, has_headers: bool) -> Self {
        Self {
            has_headers,
            ..self
        }
    }
    fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .flexible(true)
            .trim(csv::Trim::All);
        builder
    }
    /// Loads the image from the file
    pub fn load(self) -> Result<Image> {
        log::info!("loading {:?}", self.path);
        let file = std::fs::File::open(&self.path)?;
        self.read_from(file)
    }
    /// Loads the image from any reader
    pub fn read_from<R: io::Read>(&self, reader: R) -> Result<Image> {
        let mut rdr = self.reader_builder().from_reader(reader);
        let mut values = vec![];
        let mut width = None;
        let mut height = 0;
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            let expected = *width.get_or_insert(record.len());
            if record.len() != expected {
                return Err(LoaderError::Ragged {
                    row,
                    expected,
                    found: record.len(),
                });
            }
            for (column, field) in record.iter().enumerate() {
                values.push(field.parse::<f64>().map_err(|_| LoaderError::Parse {
                    row,
                    column,
                    value: field.to_string(),
                })?);
            }
            height += 1;
        }
        match width {
            Some(width) if width > 0 => {
                log::debug!("{height}x{width} image");
                Ok(Image::from_row_slice(height, width, &values))
            }
            _ => Err(LoaderError::Empty(self.path.clone())),
        }
    }
}

#[derive(Serialize)]
struct Record {
    profile: &'static str,
    index: usize,
    pixel: usize,
    #[serde(rename = "optical density")]
    data: f64,
    fit: f64,
}

fn write_profiles<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    od: &Image,
    profiles: &Profile1DFit,
) -> Result<()> {
    let horizontal = &profiles.horizontal;
    let vertical = &profiles.vertical;
    let row = od.row(horizontal.index);
    let column = od.column(vertical.index);
    let rows = row
        .iter()
        .zip(&horizontal.curve)
        .enumerate()
        .map(|(pixel, (&data, &fit))| Record {
            profile: "horizontal",
            index: horizontal.index,
            pixel,
            data,
            fit,
        });
    let columns = column
        .iter()
        .zip(&vertical.curve)
        .enumerate()
        .map(|(pixel, (&data, &fit))| Record {
            profile: "vertical",
            index: vertical.index,
            pixel,
            data,
            fit,
        });
    for record in rows.chain(columns) {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the optical density along the horizontal and vertical cuts next to their Gaussian fits
pub fn write_profiles_csv<P: AsRef<Path>>(
    path: P,
    od: &Image,
    profiles: &Profile1DFit,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    write_profiles(&mut wtr, od, profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fit::gaussian::Gaussian1D, fit::FitDiagnostics, profile1d::Profile1D};

    #[test]
    fn load_with_header() {
        let text = "c0; c1; c2\n1;2;3\n4; 5 ;6.5\n";
        let image = ImageLoader::default().read_from(text.as_bytes()).unwrap();
        assert_eq!(image.shape(), (2, 3));
        assert_eq!(image[(0, 2)], 3.);
        assert_eq!(image[(1, 1)], 5.);
        assert_eq!(image[(1, 2)], 6.5);
    }

    #[test]
    fn load_without_header() {
        let text = "0,1\n2,3\n\n4,5\n";
        let image = ImageLoader::default()
            .delimiter(b',')
            .has_headers(false)
            .read_from(text.as_bytes())
            .unwrap();
        assert_eq!(image.shape(), (3, 2));
        assert_eq!(image[(2, 0)], 4.);
    }

    #[test]
    fn ragged_rows() {
        let text = "1;2;3\n4;5\n";
        let err = ImageLoader::default()
            .has_headers(false)
            .read_from(text.as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Ragged {
                row: 1,
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn not_a_number() {
        let text = "1;x\n";
        let err = ImageLoader::default()
            .has_headers(false)
            .read_from(text.as_bytes())
            .unwrap_err();
        assert!(matches!(err, LoaderError::Parse { row: 0, column: 1, .. }));
    }

    #[test]
    fn empty() {
        let err = ImageLoader::default().read_from("a;b\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoaderError::Empty(_)));
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join("absorption-od_loader_test.csv");
        std::fs::write(&path, "x;y\n1;2\n3;4\n").unwrap();
        let image = ImageLoader::new(&path).load().unwrap();
        assert_eq!(image, Image::from_row_slice(2, 2, &[1., 2., 3., 4.]));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn profiles_to_csv() {
        let od = Image::from_fn(3, 4, |r, c| (10 * r + c) as f64);
        let profile = |index: usize, len: usize| Profile1D {
            index,
            curve: vec![0.5; len],
            params: Gaussian1D::default(),
            uncertainty: [0.; 3],
            diagnostics: FitDiagnostics {
                chi_squared: 0.,
                reduced_chi_squared: 0.,
                residual_sum_of_squares: 0.,
                iterations: 1,
            },
        };
        let profiles = Profile1DFit {
            horizontal: profile(1, 4),
            vertical: profile(2, 3),
        };
        let mut wtr = csv::Writer::from_writer(vec![]);
        write_profiles(&mut wtr, &od, &profiles).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 4 + 3);
        assert_eq!(lines[0], "profile,index,pixel,optical density,fit");
        assert_eq!(lines[2], "horizontal,1,1,11.0,0.5");
        assert_eq!(lines[7], "vertical,2,2,22.0,0.5");
    }
}
