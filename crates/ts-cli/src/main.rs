//! TorusSpec CLI

mod manifest;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ts_core::{ProcessingConfig, ViewingInterval};
use ts_measure::{
    AverageColumnDensity, IronAbundance, MeasurementAggregator, MeasurementReport, ReductionPipeline, RunIdentity,
    write_measurements,
};
use ts_spectrum::{ColumnDensityDistribution, ColumnDensityGrid, SpectrumSet, TorusGeometry, build_from_files, io};

#[derive(Parser)]
#[command(name = "torusspec")]
#[command(about = "TorusSpec - reduction of clumpy-torus photon simulations")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Processing configuration (YAML, or JSON by extension). Defaults apply otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Torus geometry, lengths in simulation units.
#[derive(Args, Debug, Clone, Copy)]
struct GeometryArgs {
    /// Inner torus radius
    #[arg(long)]
    r_inner: f64,

    /// Outer torus radius
    #[arg(long)]
    r_outer: f64,

    /// Cloud volume filling factor
    #[arg(long)]
    filling_factor: f64,

    /// Average equatorial column density (cm^-2)
    #[arg(long)]
    nh_aver: f64,
}

impl GeometryArgs {
    fn geometry(&self, config: &ProcessingConfig) -> Result<TorusGeometry> {
        let scale = config.length_to_cm;
        Ok(TorusGeometry::new(self.r_inner * scale, self.r_outer * scale, self.filling_factor, self.nh_aver)?)
    }
}

/// Viewing interval in degrees from the torus axis.
#[derive(Args, Debug, Clone, Copy)]
struct ViewingArgs {
    /// First inclination (deg)
    #[arg(long)]
    angle_begin: f64,

    /// Interval length (deg)
    #[arg(long)]
    angle_length: f64,
}

impl ViewingArgs {
    fn viewing(&self) -> Result<ViewingInterval> {
        Ok(ViewingInterval::new(self.angle_begin, self.angle_length)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Bin photon files into spectra
    Spectra {
        /// Photon record files of one simulation
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        viewing: ViewingArgs,

        /// Directory receiving the spectrum files
        #[arg(long)]
        output_dir: PathBuf,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Column-density distribution of an effective-lengths file
    Distribution {
        /// Effective lengths, one per line (cm)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        geometry: GeometryArgs,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bin photon files and measure every column-density bin
    Reduce {
        /// Photon record files of one simulation
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        viewing: ViewingArgs,

        /// Average number of clouds per sight line
        #[arg(long)]
        n_aver: u32,

        /// Iron abundance code (05xfe, 07xfe, 1xfe, 15xfe, 2xfe)
        #[arg(long, default_value = "1xfe")]
        abundance: IronAbundance,

        /// Column-density bins to measure (repeatable). Defaults to every populated bin.
        #[arg(long = "nh-index")]
        nh_indices: Vec<usize>,

        /// Measurements file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the per-key flux densities and counts, with a manifest for `measure`.
        #[arg(long)]
        spectral_data_dir: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Measure spectral-data files listed in a manifest
    Measure {
        /// Manifest (YAML, or JSON by extension)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Measurements file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Spectra { inputs, geometry, viewing, output_dir, threads } => {
            cmd_spectra(&config, &inputs, &geometry, &viewing, &output_dir, threads)
        }
        Commands::Distribution { input, geometry, output } => {
            cmd_distribution(&config, &input, &geometry, output.as_deref())
        }
        Commands::Reduce {
            inputs,
            geometry,
            viewing,
            n_aver,
            abundance,
            nh_indices,
            output,
            spectral_data_dir,
            threads,
        } => cmd_reduce(
            &config,
            &inputs,
            &geometry,
            &viewing,
            n_aver,
            abundance,
            &nh_indices,
            output.as_deref(),
            spectral_data_dir.as_deref(),
            threads,
        ),
        Commands::Measure { manifest, output, threads } => cmd_measure(&config, &manifest, output.as_deref(), threads),
        Commands::Version => {
            println!("torusspec {}", ts_core::VERSION);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ProcessingConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            ts_core::read_config(path).with_context(|| format!("reading configuration {}", path.display()))
        }
        None => Ok(ProcessingConfig::default()),
    }
}

fn setup_threads(threads: usize) {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

fn bin_photons(
    config: &ProcessingConfig,
    inputs: &[PathBuf],
    geometry: &TorusGeometry,
    viewing: ViewingInterval,
) -> Result<SpectrumSet> {
    tracing::info!(files = inputs.len(), viewing = %viewing, "binning photons");
    let set = build_from_files(inputs, config, geometry, viewing)?;
    let stats = set.stats();
    tracing::info!(
        seen = stats.photons_seen,
        accepted = stats.accepted,
        skipped = stats.malformed_skipped,
        spectra = set.spectra().len(),
        "binning complete"
    );
    Ok(set)
}

fn cmd_spectra(
    config: &ProcessingConfig,
    inputs: &[PathBuf],
    geometry: &GeometryArgs,
    viewing: &ViewingArgs,
    output_dir: &Path,
    threads: usize,
) -> Result<()> {
    setup_threads(threads);
    let geometry = geometry.geometry(config)?;
    let set = bin_photons(config, inputs, &geometry, viewing.viewing()?)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    for (key, spectrum) in set.spectra() {
        let path = output_dir.join(format!("{key}.spectrum"));
        io::write_spectrum(BufWriter::new(File::create(&path)?), spectrum)?;
    }
    io::write_spectrum(BufWriter::new(File::create(output_dir.join("reference.spectrum"))?), set.reference())?;
    io::write_effective_lengths(
        BufWriter::new(File::create(output_dir.join("effective_lengths"))?),
        set.effective_lengths(),
    )?;

    let summary = serde_json::json!({
        "stats": set.stats(),
        "spectra": set.spectra().keys().map(|k| k.to_string()).collect::<Vec<_>>(),
        "anomalies": set.anomalies(),
        "output_dir": output_dir,
    });
    write_json(None, summary)
}

fn cmd_distribution(
    config: &ProcessingConfig,
    input: &Path,
    geometry: &GeometryArgs,
    output: Option<&Path>,
) -> Result<()> {
    let geometry = geometry.geometry(config)?;
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let lengths = io::read_effective_lengths(BufReader::new(file))?;
    let grid = ColumnDensityGrid::from_config(&config.column_density)?;
    let distribution = ColumnDensityDistribution::from_effective_lengths(grid, &lengths, &geometry)?;
    tracing::info!(samples = distribution.sample_len(), "distribution built");

    let bins: Vec<serde_json::Value> = distribution
        .grid()
        .midpoints()
        .iter()
        .zip(distribution.probabilities())
        .enumerate()
        .map(|(index, (midpoint, probability))| {
            serde_json::json!({ "index": index, "midpoint": midpoint, "probability": probability })
        })
        .collect();
    let value = serde_json::json!({
        "grid": distribution.grid().to_string(),
        "samples": distribution.sample_len(),
        "mean": distribution.mean(),
        "relative_std": distribution.relative_std(),
        "bins": bins,
    });
    write_json(output, value)
}

#[allow(clippy::too_many_arguments)]
fn cmd_reduce(
    config: &ProcessingConfig,
    inputs: &[PathBuf],
    geometry: &GeometryArgs,
    viewing: &ViewingArgs,
    n_aver: u32,
    abundance: IronAbundance,
    nh_indices: &[usize],
    output: Option<&Path>,
    spectral_data_dir: Option<&Path>,
    threads: usize,
) -> Result<()> {
    setup_threads(threads);
    let identity = RunIdentity {
        nh_aver: AverageColumnDensity::from_value(geometry.nh_aver)?,
        n_aver,
        abundance,
        viewing: viewing.viewing()?,
    };
    let geometry = geometry.geometry(config)?;
    let set = bin_photons(config, inputs, &geometry, identity.viewing)?;

    let grid = ColumnDensityGrid::from_config(&config.column_density)?;
    let distribution = ColumnDensityDistribution::from_effective_lengths(grid, set.effective_lengths(), &geometry)?;
    let pipeline = ReductionPipeline::new(config, &set, &distribution, identity)?;
    let aggregator = MeasurementAggregator::new(config)?;
    let (inputs, skipped) = pipeline.inputs((!nh_indices.is_empty()).then_some(nh_indices))?;
    if let Some(dir) = spectral_data_dir {
        manifest::write_spectral_data(dir, &inputs)?;
    }
    let mut report = aggregator.run(&inputs)?;
    report.skipped.extend(skipped);
    report.skipped.sort_by(|a, b| a.0.cmp(&b.0));
    write_report(output, &report)
}

fn cmd_measure(config: &ProcessingConfig, manifest: &Path, output: Option<&Path>, threads: usize) -> Result<()> {
    setup_threads(threads);
    let manifest = manifest::read_manifest(manifest)?;
    let inputs = manifest.load()?;
    tracing::info!(keys = inputs.len(), "manifest loaded");
    let report = MeasurementAggregator::new(config)?.run(&inputs)?;
    write_report(output, &report)
}

fn write_report(output: Option<&Path>, report: &MeasurementReport) -> Result<()> {
    for (key, reason) in &report.skipped {
        tracing::warn!(key = %key, reason = %reason, "measurement skipped");
    }
    tracing::info!(records = report.records.len(), skipped = report.skipped.len(), "measurements complete");
    match output {
        Some(path) => write_measurements(BufWriter::new(File::create(path)?), report)?,
        None => {
            let stdout = std::io::stdout();
            write_measurements(stdout.lock(), report)?;
        }
    }
    Ok(())
}

fn write_json(output: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
    }
    Ok(())
}
