use anyhow::{Context, Result};
use breath_lib::{
    config::{EstimatorConfig, Normalization, RateBasis},
    estimator::{EstimateReport, RateEstimator},
    io::{frames as frames_io, text as text_io},
    pipeline::{FrameDisposition, FrameOutcome, Pipeline, Status},
    plot::{figure_from_analysis, Figure, Series},
    signal::FrameObservation,
    simulate::SyntheticBreathing,
    worker::AsyncPipeline,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;
use plotters::prelude::*;
use serde::Serialize;
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "breath",
    version,
    about = "Breathing-rate estimation from face-region intensity recordings"
)]
struct Cli {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// Detect from the extension or the first line
    Auto,
    /// `timestamp,intensity[,region_found]` with a header row
    Csv,
    /// Newline-delimited intensities sampled at --fs
    Series,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum NormalizationArg {
    None,
    Zscore,
    Detrend,
}

impl From<NormalizationArg> for Normalization {
    fn from(value: NormalizationArg) -> Self {
        match value {
            NormalizationArg::None => Normalization::None,
            NormalizationArg::Zscore => Normalization::Zscore,
            NormalizationArg::Detrend => Normalization::Detrend,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RateBasisArg {
    Timestamps,
    SampleIndex,
}

impl From<RateBasisArg> for RateBasis {
    fn from(value: RateBasisArg) -> Self {
        match value {
            RateBasisArg::Timestamps => RateBasis::Timestamps,
            RateBasisArg::SampleIndex => RateBasis::SampleIndex,
        }
    }
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Recording to read; stdin when absent
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    format: InputFormat,
    /// Frame rate for plain series input (Hz)
    #[arg(long, default_value_t = 30.0)]
    fs: f64,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// TOML file with estimator settings
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    min_samples: Option<usize>,
    #[arg(long)]
    half_width: Option<usize>,
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long, value_enum)]
    normalization: Option<NormalizationArg>,
    #[arg(long, value_enum)]
    rate_basis: Option<RateBasisArg>,
    /// Keep only the most recent N samples
    #[arg(long)]
    window: Option<usize>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<EstimatorConfig> {
        let mut cfg = match &self.config {
            Some(path) => EstimatorConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EstimatorConfig::default(),
        };
        if let Some(v) = self.min_samples {
            cfg.min_samples = v;
        }
        if let Some(v) = self.half_width {
            cfg.half_width = v;
        }
        if let Some(v) = self.threshold {
            cfg.peak_threshold = v;
        }
        if let Some(v) = self.normalization {
            cfg.normalization = v.into();
        }
        if let Some(v) = self.rate_basis {
            cfg.rate_basis = v.into();
        }
        if let Some(v) = self.window {
            cfg.window_capacity = Some(v);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording through the pipeline and print the final report as JSON
    Estimate {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        config: ConfigArgs,
        /// Run estimation on the background worker
        #[arg(long)]
        worker: bool,
    },
    /// Print one JSON status line per processed frame
    Stream {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Generate a synthetic frame recording as CSV
    Simulate {
        #[arg(long, default_value_t = 15.0)]
        rate_cpm: f64,
        #[arg(long, default_value_t = 30.0)]
        frame_rate: f64,
        #[arg(long, default_value_t = 60.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 120.0)]
        baseline: f64,
        #[arg(long, default_value_t = 1.5)]
        amplitude: f64,
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 0.0)]
        drift_per_s: f64,
        #[arg(long, default_value_t = 0.0)]
        dropout: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render raw/smoothed intensity and detected peaks to a PNG via plotters
    Plot {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the effective estimator configuration as TOML
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Debug, Default, Serialize)]
struct FrameCounts {
    total: usize,
    accepted: usize,
    no_region: usize,
    rejected: usize,
}

impl FrameCounts {
    fn record(&mut self, outcome: &FrameOutcome) {
        self.total += 1;
        match outcome.disposition {
            FrameDisposition::Accepted => self.accepted += 1,
            FrameDisposition::NoRegion => self.no_region += 1,
            FrameDisposition::Rejected => self.rejected += 1,
        }
    }
}

#[derive(Debug, Serialize)]
struct EstimateOutput {
    status: Status,
    frames: FrameCounts,
    report: Option<EstimateReport>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    match cli.command {
        Commands::Estimate {
            input,
            config,
            worker,
        } => cmd_estimate(&input, &config, worker)?,
        Commands::Stream { input, config } => cmd_stream(&input, &config)?,
        Commands::Simulate {
            rate_cpm,
            frame_rate,
            duration_s,
            baseline,
            amplitude,
            noise,
            drift_per_s,
            dropout,
            seed,
            out,
        } => {
            let sim = SyntheticBreathing {
                rate_cpm,
                frame_rate,
                duration_s,
                baseline,
                amplitude,
                noise,
                drift_per_s,
                dropout,
                seed,
            };
            cmd_simulate(&sim, out.as_deref())?
        }
        Commands::Plot { input, config, out } => cmd_plot(&input, &config, &out)?,
        Commands::Config { config } => {
            let cfg = config.resolve()?;
            print!("{}", cfg.to_toml_string()?);
        }
    }
    Ok(())
}

fn read_input_text(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn looks_like_csv(path: Option<&Path>, text: &str) -> bool {
    let by_extension = path
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"));
    if let Some(is_csv) = by_extension {
        return is_csv;
    }
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_ascii_lowercase().contains("timestamp"))
        .unwrap_or(false)
}

fn load_frames(args: &InputArgs) -> Result<Vec<FrameObservation>> {
    let path = args.input.as_deref();
    let text = read_input_text(path)?;
    let csv = match args.format {
        InputFormat::Csv => true,
        InputFormat::Series => false,
        InputFormat::Auto => looks_like_csv(path, &text),
    };
    let frames = if csv {
        frames_io::parse_frames(text.as_bytes())?
    } else {
        let values = text_io::parse_f64_series(&text)?;
        text_io::frames_from_series(&values, args.fs)?
    };
    info!("loaded {} frames (csv={})", frames.len(), csv);
    Ok(frames)
}

fn cmd_estimate(input: &InputArgs, config: &ConfigArgs, worker: bool) -> Result<()> {
    let cfg = config.resolve()?;
    let frames = load_frames(input)?;
    let mut counts = FrameCounts::default();
    let output = if worker {
        let mut pipeline = AsyncPipeline::new(cfg)?;
        for frame in &frames {
            counts.record(&pipeline.process_frame(frame));
        }
        pipeline.flush()?;
        EstimateOutput {
            status: pipeline.status(),
            frames: counts,
            report: pipeline.worker().latest().map(|p| p.report),
        }
    } else {
        let mut pipeline = Pipeline::new(cfg)?;
        for frame in &frames {
            counts.record(&pipeline.process_frame(frame));
        }
        EstimateOutput {
            status: pipeline.status(),
            frames: counts,
            report: pipeline.latest().cloned(),
        }
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_stream(input: &InputArgs, config: &ConfigArgs) -> Result<()> {
    let cfg = config.resolve()?;
    let frames = load_frames(input)?;
    let mut pipeline = Pipeline::new(cfg)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for frame in &frames {
        let outcome = pipeline.process_frame(frame);
        writeln!(out, "{}", serde_json::to_string(&outcome)?)?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_simulate(sim: &SyntheticBreathing, out: Option<&Path>) -> Result<()> {
    let frames = sim.generate()?;
    match out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            frames_io::write_frames_csv(file, &frames)?;
        }
        None => frames_io::write_frames_csv(io::stdout().lock(), &frames)?,
    }
    Ok(())
}

fn cmd_plot(input: &InputArgs, config: &ConfigArgs, out: &Path) -> Result<()> {
    let cfg = config.resolve()?;
    let frames = load_frames(input)?;
    let mut pipeline = Pipeline::new(cfg)?;
    for frame in &frames {
        pipeline.process_frame(frame);
    }
    let snapshot = pipeline.snapshot();
    if snapshot.is_empty() {
        anyhow::bail!("no usable samples to plot");
    }
    let analysis = RateEstimator::new(cfg).analyze(&snapshot);
    let fig = figure_from_analysis(&snapshot, &analysis, 2048);
    draw_plotters_figure(out, &fig)?;
    println!("{}", serde_json::to_string(&analysis.report)?);
    Ok(())
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let backend = BitMapBackend::new(path, (960, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let (x_min, mut x_max, y_min, mut y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.style.color.rgb();
                let radius = markers.style.width.round().max(1.0) as i32;
                chart.draw_series(
                    markers
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), radius, RGBColor(r, g, b).filled())),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}
