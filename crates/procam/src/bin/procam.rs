//! procam CLI: marker canvases and calibration file queries.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use procam::core::CameraModel;
use procam::markers::{
    generate, write_png, Dictionary, DictionaryRenderer, IdBitsRenderer, MarkerLayoutParams,
    MarkerRenderer, DEFAULT_MARKER_SIZE,
};
use procam::report;
use procam::ProjectorSessionConfig;
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "procam")]
#[command(about = "Projector/camera calibration tools: marker canvases, projection queries, session checks")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a projector marker canvas and its marker registry.
    Markers(MarkersArgs),

    /// Project a world point (metres) through a calibration file.
    Project(ProjectArgs),

    /// Back-project a pixel through a calibration file.
    Unproject(UnprojectArgs),

    /// Check a projector session config and report its surfaces.
    Inspect(InspectArgs),
}

#[derive(Debug, Clone, Args)]
struct MarkersArgs {
    /// Canvas width in pixels.
    #[arg(long)]
    width: u32,

    /// Canvas height in pixels.
    #[arg(long)]
    height: u32,

    /// Marker side in pixels.
    #[arg(long, default_value_t = DEFAULT_MARKER_SIZE)]
    marker_size: u32,

    /// Ids to leave blank, comma separated.
    #[arg(long, value_delimiter = ',')]
    omit: Vec<u32>,

    /// Dictionary JSON; without it markers carry their id bits.
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Path to write the canvas (PNG).
    #[arg(long)]
    out: PathBuf,

    /// Path to write the marker registry (JSON).
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ProjectArgs {
    /// Calibration file (YAML).
    #[arg(long)]
    calibration: PathBuf,

    /// World point in metres; homography models ignore Z.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    point: Vec<f64>,
}

#[derive(Debug, Clone, Args)]
struct UnprojectArgs {
    /// Calibration file (YAML).
    #[arg(long)]
    calibration: PathBuf,

    /// Pixel coordinates.
    #[arg(long, num_args = 2, value_names = ["U", "V"], allow_negative_numbers = true)]
    pixel: Vec<f64>,

    /// Intersect the ray with the plane Z = z (metres).
    #[arg(long, allow_negative_numbers = true)]
    z: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct InspectArgs {
    /// Projector session config (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Projector canvas as WIDTHxHEIGHT, to count the markers it holds.
    #[arg(long, value_parser = parse_canvas)]
    canvas: Option<(u32, u32)>,
}

fn parse_canvas(raw: &str) -> Result<(u32, u32), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{raw}`"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("bad canvas size `{raw}`: {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(feature = "tracing")]
    init_logging(cli.log_json);
    #[cfg(not(feature = "tracing"))]
    init_logging();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Markers(args) => run_markers(&args),
        Commands::Project(args) => run_project(&args),
        Commands::Unproject(args) => run_unproject(&args),
        Commands::Inspect(args) => run_inspect(&args),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(json: bool) {
    // A logger may already be installed when embedded.
    let _ = LogTracer::init();
    procam::core::init_tracing(json);
}

#[cfg(not(feature = "tracing"))]
fn init_logging() {
    let _ = procam::core::init_from_env();
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── markers ────────────────────────────────────────────────────────────

fn run_markers(args: &MarkersArgs) -> CliResult<()> {
    let renderer: Box<dyn MarkerRenderer> = match &args.dictionary {
        Some(path) => Box::new(DictionaryRenderer::new(Dictionary::load_json(path)?)),
        None => Box::new(IdBitsRenderer::default()),
    };
    let params = MarkerLayoutParams::new(args.width, args.height)
        .with_marker_size(args.marker_size)
        .with_omit(args.omit.iter().copied());

    let (canvas, registry) = generate(params, renderer.as_ref())?;
    write_png(&args.out, &canvas)?;
    if let Some(path) = &args.registry {
        registry.write_json(path)?;
    }

    println!(
        "wrote {} markers on a {}x{} canvas to {}",
        registry.len(),
        canvas.width,
        canvas.height,
        args.out.display()
    );
    Ok(())
}

// ── project / unproject ────────────────────────────────────────────────

fn run_project(args: &ProjectArgs) -> CliResult<()> {
    let model = CameraModel::read(&args.calibration)?;
    let world: [f64; 3] = args
        .point
        .as_slice()
        .try_into()
        .map_err(|_| "expected three coordinates for --point")?;
    print_json(&report::project_point(&model, world)?)
}

fn run_unproject(args: &UnprojectArgs) -> CliResult<()> {
    let model = CameraModel::read(&args.calibration)?;
    let pixel: [f64; 2] = args
        .pixel
        .as_slice()
        .try_into()
        .map_err(|_| "expected two coordinates for --pixel")?;
    print_json(&report::unproject_pixel(&model, pixel, args.z)?)
}

// ── inspect ────────────────────────────────────────────────────────────

fn run_inspect(args: &InspectArgs) -> CliResult<()> {
    let config = ProjectorSessionConfig::load_json(&args.config)?;
    print_json(&report::inspect_session(&config, args.canvas)?)
}
