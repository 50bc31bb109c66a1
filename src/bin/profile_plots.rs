//! Optical density cuts
//!
//! Plots the horizontal and vertical cuts through the optical density map
//! together with their Gaussian fits

use std::path::PathBuf;

use absorption_od::{
    compute_optical_density, fit_profile_1d, AnalysisConfig, ImageLoader, InitialGuess, Profile1D,
    Roi, SliceConvention,
};
use plotters::{coord::Shift, prelude::*};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "profile_plots", about = "Plots the 1D cuts of the optical density")]
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
    /// Rows and columns of the 1D cuts: roi-extent or roi-center
    #[structopt(long, default_value = "roi-extent")]
    slice_convention: SliceConvention,
    /// Starting point of the fits: statistical or moments
    #[structopt(long, default_value = "statistical")]
    initial_guess: InitialGuess,
    /// SVG file
    #[structopt(short, long, default_value = "profiles.svg")]
    output: PathBuf,
}

fn plot_cut(
    area: &DrawingArea<SVGBackend, Shift>,
    name: &str,
    data: &[f64],
    profile: &Profile1D,
) -> anyhow::Result<()> {
    let (lo, hi) = data
        .iter()
        .chain(&profile.curve)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    let margin = 0.05 * (hi - lo).max(1e-3);
    let mut chart = ChartBuilder::on(area)
        .caption(format!("{name} #{}", profile.index), ("sans-serif", 20))
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(0f64..data.len() as f64, lo - margin..hi + margin)?;
    chart
        .configure_mesh()
        .x_desc("Pixel")
        .y_desc("Optical density")
        .draw()?;

    let [data_rgb, fit_rgb] = [0, 1].map(|i| {
        let color = colorous::TABLEAU10[i];
        RGBColor(color.r, color.g, color.b)
    });
    chart
        .draw_series(LineSeries::new(
            data.iter().enumerate().map(|(x, &y)| (x as f64, y)),
            &data_rgb,
        ))?
        .label("data")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &data_rgb));
    chart
        .draw_series(LineSeries::new(
            profile.curve.iter().enumerate().map(|(x, &y)| (x as f64, y)),
            &fit_rgb,
        ))?
        .label(format!(
            "A={:.3}, μ={:.1}px, σ={:.1}px",
            profile.params.amplitude, profile.params.mean, profile.params.stddev
        ))
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &fit_rgb));
    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let dark = ImageLoader::new(&opt.dark).load()?;
    let bright = ImageLoader::new(&opt.bright).load()?;
    let od = compute_optical_density(&dark, &bright, &opt.normalization_roi)?;
    let config = AnalysisConfig::default()
        .slice_convention(opt.slice_convention)
        .initial_guess(opt.initial_guess);
    let profiles = fit_profile_1d(&od, &opt.analysis_roi, &config)?;

    let plot = SVGBackend::new(&opt.output, (1024, 512)).into_drawing_area();
    plot.fill(&WHITE)?;
    let panels = plot.split_evenly((1, 2));
    let horizontal: Vec<_> = od.row(profiles.horizontal.index).iter().cloned().collect();
    let vertical: Vec<_> = od.column(profiles.vertical.index).iter().cloned().collect();
    plot_cut(&panels[0], "horizontal cut", &horizontal, &profiles.horizontal)?;
    plot_cut(&panels[1], "vertical cut", &vertical, &profiles.vertical)?;
    plot.present()?;
    log::info!("profiles plotted in {:?}", opt.output);

    Ok(())
}
