use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand};
use searchspace_core::{
    closest_point, convex_hull, hull_normalization, AppConfig, ControlInput, HeadlessBackend,
    ImageData, InputEvent, Metric, Point, SceneSettings, Searchspace, SurfaceRect,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

fn main() -> searchspace_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            preset,
            config,
            script,
            out,
        } => run_session(preset.as_deref(), config.as_deref(), script.as_deref(), &out),
        Commands::Closest {
            metric,
            points,
            query,
        } => {
            run_closest(metric, &points, query);
            Ok(())
        }
        Commands::Hull { points } => {
            run_hull(&points);
            Ok(())
        }
    }
}

/// One entry of a session script: either raw input or a host command.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Input(InputEvent),
    Command(Command),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Command {
    /// Advances the loop by `count` animation frames of `ms` each.
    Tick {
        #[serde(default = "default_frame_ms")]
        ms: u64,
        #[serde(default = "default_count")]
        count: u32,
    },
    Hide,
    Show,
    /// Moves the surface within the client area.
    Surface(SurfaceRect),
    Control {
        id: String,
        input: ControlInput,
    },
    /// Same as the record button.
    Record,
}

fn default_frame_ms() -> u64 {
    16
}

fn default_count() -> u32 {
    1
}

fn run_session(
    preset: Option<&str>,
    config: Option<&Path>,
    script: Option<&Path>,
    out: &Path,
) -> searchspace_core::Result<()> {
    let app_config = match (config, preset) {
        (Some(path), Some(name)) => AppConfig {
            scene: SceneSettings::preset(name)?,
            ..AppConfig::from_json_file(path)?
        },
        (Some(path), None) => AppConfig::from_json_file(path)?,
        (None, Some(name)) => AppConfig::with_preset(name)?,
        (None, None) => AppConfig::default(),
    };
    let steps: Vec<ScriptStep> = match script {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };
    tracing::info!(title = %app_config.scene.title, steps = steps.len(), "starting session");

    let mut scene = Searchspace::new(HeadlessBackend::new(), app_config, watermark())?;
    scene.start();
    print_status(&scene);

    for step in steps {
        match step {
            ScriptStep::Input(event) => scene.handle(event),
            ScriptStep::Command(Command::Tick { ms, count }) => {
                for _ in 0..count {
                    scene.tick(Duration::from_millis(ms));
                }
            }
            ScriptStep::Command(Command::Hide) => scene.set_hidden(true),
            ScriptStep::Command(Command::Show) => scene.set_hidden(false),
            ScriptStep::Command(Command::Surface(rect)) => scene.set_surface_rect(rect),
            ScriptStep::Command(Command::Control { id, input }) => {
                if let Err(err) = scene.interact(&id, input) {
                    scene.render_mut().report(err);
                }
            }
            ScriptStep::Command(Command::Record) => scene.toggle_recording(),
        }
        print_status(&scene);
    }
    // Flush anything that was deferred to the next frame.
    scene.tick(Duration::from_millis(default_frame_ms()));

    for line in scene.diagnostics().lines() {
        eprintln!("error: {line}");
    }
    for (index, artifact) in scene.take_artifacts().iter().enumerate() {
        let path = artifact.write_to(out, index)?;
        tracing::info!(?path, "artifact written");
    }
    tracing::info!(frames = scene.render().frames_drawn(), "session finished");
    Ok(())
}

fn print_status(scene: &Searchspace<HeadlessBackend>) {
    for line in scene.status() {
        println!("{line}");
    }
}

/// Translucent stand-in for the watermark texture.
fn watermark() -> ImageData {
    ImageData::filled(64, 16, [255, 255, 255, 64])
}

fn run_closest(metric: Metric, points: &[Point], query: Point) {
    let frame = hull_normalization(&convex_hull(points));
    let closest = closest_point(metric, points, query, &frame);
    match closest.index {
        Some(index) => println!(
            "{metric}: closest point #{index} {:?} at distance {:.5}",
            points[index].to_array(),
            closest.distance
        ),
        None => println!("{metric}: no points"),
    }
}

fn run_hull(points: &[Point]) {
    let hull = convex_hull(points);
    for vertex in &hull {
        println!("{:.5} {:.5}", vertex.x, vertex.y);
    }
    let frame = hull_normalization(&hull);
    println!(
        "centroid {:.5} {:.5} scale {:.5}",
        frame.centroid.x, frame.centroid.y, frame.scale
    );
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|err| format!("bad coordinate `{v}`: {err}"))
    };
    Ok(Point::new(coord(x)?, coord(y)?))
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    s.parse().map_err(|err: searchspace_core::SearchspaceError| err.to_string())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive visualisation of similarity measures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay an input script against a headless scene.
    Run {
        /// Built-in scene preset: default, l1-l2 or adjusted-dot.
        #[arg(short, long)]
        preset: Option<String>,
        /// JSON config file; the preset replaces its scene section.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// JSON array of input events and host commands.
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// Directory for snapshots and recordings.
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
    /// Find the point closest to a query position.
    Closest {
        #[arg(short, long, default_value = "L2", value_parser = parse_metric)]
        metric: Metric,
        /// Candidate point as `x,y`; repeat for more.
        #[arg(short, long = "point", value_parser = parse_point, allow_hyphen_values = true)]
        points: Vec<Point>,
        #[arg(short, long, value_parser = parse_point, allow_hyphen_values = true)]
        query: Point,
    },
    /// Print the convex hull of a point set and its normalisation.
    Hull {
        #[arg(short, long = "point", value_parser = parse_point, allow_hyphen_values = true)]
        points: Vec<Point>,
    },
}
