//! Splatseed Application
//!
//! Command-line driver for Gaussian Splatting initialization.
//!
//! Stages:
//! - `scales`: per-point scales from nearest-neighbor distances
//! - `init`: Gaussian parameter assembly and validation
//! - `cameras`: intrinsics and poses from a sparse model
//! - `analyze`: point cloud quality report
//! - `run`: `scales`, `init` and `cameras` in order

mod app;
mod layout;

use app::{App, AppBuilder};
use clap::{Parser, Subcommand};
use splatseed_init::{CameraSelection, InitError, KnnBackend};
use std::error::Error;
use std::path::PathBuf;

/// Splatseed - Gaussian Splatting initialization from sparse reconstructions
#[derive(Parser, Debug)]
#[command(name = "splatseed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project root containing sparse/0 and outputs
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Send spans to Tracy (requires the `tracy` feature)
    #[arg(long, global = true)]
    tracy: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate per-point scales
    Scales {
        /// PLY file or sparse model directory
        #[arg(short, long)]
        points: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Neighbors averaged per point
        #[arg(short = 'k', long)]
        neighbors: Option<usize>,
        /// brute-force, kd-tree or auto
        #[arg(long)]
        backend: Option<KnnBackend>,
    },
    /// Assemble and validate Gaussian parameters
    Init {
        #[arg(short, long)]
        points: Option<PathBuf>,
        /// Scale artifact written by `scales`
        #[arg(short, long)]
        scales: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        summary: Option<PathBuf>,
        #[arg(long)]
        opacity: Option<f32>,
    },
    /// Extract camera intrinsics and poses
    Cameras {
        /// Sparse model directory (text or binary)
        #[arg(short, long)]
        model: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Camera supplying the intrinsics; the lowest id by default
        #[arg(long)]
        camera_id: Option<u32>,
    },
    /// Report point cloud quality
    Analyze {
        #[arg(short, long)]
        points: Option<PathBuf>,
        /// Report file [default: outputs/analysis/report.txt]
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Run scales, init and cameras in order
    Run {
        #[arg(short, long)]
        points: Option<PathBuf>,
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    let result = AppBuilder::new()
        .with_root(args.root)
        .with_config_file(args.config)
        .with_log_level(args.log_level)
        .with_tracy(args.tracy)
        .build()
        .and_then(|mut app| dispatch(&mut app, args.command));

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }
}

fn dispatch(app: &mut App, command: Command) -> Result<(), InitError> {
    let layout = app.layout().clone();
    match command {
        Command::Scales {
            points,
            output,
            neighbors,
            backend,
        } => {
            let scale = &mut app.config_mut().scale;
            if let Some(k) = neighbors {
                scale.neighbors = k;
            }
            if let Some(backend) = backend {
                scale.backend = backend;
            }
            app.scales(
                &points.unwrap_or_else(|| layout.points()),
                &output.unwrap_or_else(|| layout.scales()),
            )
        }
        Command::Init {
            points,
            scales,
            output,
            summary,
            opacity,
        } => {
            if let Some(opacity) = opacity {
                app.config_mut().params.initial_opacity = opacity;
            }
            app.init(
                &points.unwrap_or_else(|| layout.points()),
                &scales.unwrap_or_else(|| layout.scales()),
                &output.unwrap_or_else(|| layout.params()),
                &summary.unwrap_or_else(|| layout.summary()),
            )
        }
        Command::Cameras {
            model,
            output,
            camera_id,
        } => {
            if let Some(id) = camera_id {
                app.config_mut().cameras.selection = CameraSelection::ById(id);
            }
            app.cameras(
                &model.unwrap_or_else(|| layout.model()),
                &output.unwrap_or_else(|| layout.cameras()),
            )
        }
        Command::Analyze { points, report } => app.analyze(
            &points.unwrap_or_else(|| layout.points()),
            Some(&report.unwrap_or_else(|| layout.report())),
        ),
        Command::Run { points, model } => app.run_all(
            &points.unwrap_or_else(|| layout.points()),
            &model.unwrap_or_else(|| layout.model()),
        ),
    }
}

/// Print the failure with every violation and the full source chain.
fn report(error: &InitError) {
    match error {
        InitError::ParameterValidation(violations) => {
            eprintln!("Validation failed:");
            for violation in violations {
                eprintln!("  - {violation}");
            }
        }
        other => eprintln!("Error: {other}"),
    }
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scales_overrides() {
        let args = Args::try_parse_from([
            "splatseed", "--root", "/tmp/scene", "scales", "-k", "5", "--backend", "kd-tree",
        ])
        .unwrap();
        assert_eq!(args.root, PathBuf::from("/tmp/scene"));
        match args.command {
            Command::Scales {
                neighbors, backend, ..
            } => {
                assert_eq!(neighbors, Some(5));
                assert_eq!(backend, Some(KnnBackend::KdTree));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["splatseed", "run", "--log-level", "debug", "--config", "c.json"])
                .unwrap();
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
        assert!(matches!(args.command, Command::Run { .. }));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Args::try_parse_from(["splatseed", "scales", "--backend", "octree"]).is_err());
    }
}
