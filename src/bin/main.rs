use std::path::PathBuf;

use absorption_od::{
    analyse, write_profiles_csv, AnalysisConfig, Calibration, ImageLoader, InitialGuess, Roi,
    SliceConvention,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "absorption-od",
    about = "Optical density and Gaussian fits of an absorption image pair"
)]
struct Opt {
    /// Image without the atoms
    dark: PathBuf,
    /// Image with the atoms
    bright: PathBuf,
    /// Analysis ROI: x_start,x_end,y_start,y_end
    #[structopt(short, long, default_value = "100,350,375,150")]
    analysis_roi: Roi,
    /// Normalization ROI: x_start,x_end,y_start,y_end
    #[structopt(short, long, default_value = "500,620,80,425")]
    normalization_roi: Roi,
    /// Column delimiter of the image files
    #[structopt(short, long, default_value = ";")]
    delimiter: char,
    /// The image files have no header line
    #[structopt(long)]
    no_header: bool,
    /// Rows and columns of the 1D cuts: roi-extent or roi-center
    #[structopt(long, default_value = "roi-extent")]
    slice_convention: SliceConvention,
    /// Starting point of the fits: statistical or moments
    #[structopt(long, default_value = "statistical")]
    initial_guess: InitialGuess,
    /// Starting widths of the 2D Gaussian with the statistical guess [px]
    #[structopt(long, default_value = "400")]
    initial_width: f64,
    /// Absorption cross-section [m^2]
    #[structopt(long, default_value = "2.907e-13")]
    cross_section: f64,
    /// Pixel pitch in the object plane [m]
    #[structopt(long, default_value = "8.46e-6")]
    pixel_pitch: f64,
    /// Save the 1D cuts and their fits to a CSV file
    #[structopt(long)]
    csv: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    log::debug!("{:?}", opt);

    let delimiter = u8::try_from(opt.delimiter)
        .map_err(|_| anyhow::anyhow!("the delimiter {:?} is not an ASCII character", opt.delimiter))?;
    let load = |path: &PathBuf| {
        ImageLoader::new(path)
            .delimiter(delimiter)
            .has_headers(!opt.no_header)
            .load()
    };
    let dark = load(&opt.dark)?;
    let bright = load(&opt.bright)?;

    let config = AnalysisConfig::default()
        .calibration(Calibration {
            cross_section_m2: opt.cross_section,
            pixel_pitch_m: opt.pixel_pitch,
        })
        .slice_convention(opt.slice_convention)
        .initial_guess(opt.initial_guess)
        .initial_width_2d(opt.initial_width);

    let analysis = analyse(
        &dark,
        &bright,
        &opt.analysis_roi,
        &opt.normalization_roi,
        &config,
    )?;
    analysis.summary();

    if let Some(path) = opt.csv {
        write_profiles_csv(&path, &analysis.optical_density, &analysis.profile_1d)?;
        log::info!("1D profiles saved to {:?}", path);
    }

    Ok(())
}
