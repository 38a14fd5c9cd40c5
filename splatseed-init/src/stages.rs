//! Stage runners
//!
//! Each stage reads its inputs from explicit paths, runs one core component
//! and persists its artifact atomically. Stages communicate only through
//! these artifacts.

use crate::cameras::{CameraConfig, CameraExtractor, Extraction};
use crate::error::InitError;
use crate::params::{GaussianParams, ParamsAssembler, ParamsConfig};
use crate::quality::{self, QualityConfig, QualityReport};
use crate::scale::{ScaleConfig, ScaleEstimator, ScaleSet};
use splatseed_data::{ArrayArchive, PointCloud, Reconstruction, read_point_cloud_ply, write_atomic};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Load a point cloud from a PLY file or a sparse model directory.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_point_cloud(path: &Path) -> Result<PointCloud, InitError> {
    if !path.exists() {
        return Err(InitError::InputMissing(path.to_path_buf()));
    }
    let cloud = if path.is_dir() {
        Reconstruction::read(path)?.point_cloud()
    } else {
        read_point_cloud_ply(path)?
    };
    info!("Loaded {} points", cloud.len());
    if cloud.has_colors() {
        info!("Colors loaded successfully");
    }
    Ok(cloud)
}

/// Stage 1: estimate per-point scales and write the scale artifact.
pub fn run_scale_stage(
    points: &Path,
    output: &Path,
    config: &ScaleConfig,
) -> Result<ScaleSet, InitError> {
    info!("Computing point scales from {}", points.display());
    let cloud = load_point_cloud(points)?;
    let scales = ScaleEstimator::new(config.clone()).estimate(&cloud.positions)?;

    let archive = scales.to_archive()?;
    archive
        .save(output)
        .map_err(|e| InitError::persistence(output, e))?;
    info!("Saved scales to {}", output.display());
    Ok(scales)
}

fn load_scales(path: &Path) -> Result<ScaleSet, InitError> {
    if !path.exists() {
        return Err(InitError::InputMissing(path.to_path_buf()));
    }
    let scales = ScaleSet::from_archive(&ArrayArchive::load(path)?)?;
    info!("Loaded {} scales", scales.len());
    Ok(scales)
}

/// Stage 2: assemble parameters from the cloud and the scale artifact.
///
/// Writes the parameter artifact, then the text summary. A summary that
/// cannot be written is only a warning.
pub fn run_params_stage(
    points: &Path,
    scales: &Path,
    output: &Path,
    summary: &Path,
    config: &ParamsConfig,
) -> Result<GaussianParams, InitError> {
    info!("Initializing Gaussian parameters");
    let cloud = load_point_cloud(points)?;
    let scales = load_scales(scales)?;

    let params =
        ParamsAssembler::new(config.clone()).assemble(&cloud.positions, cloud.colors(), scales.values())?;
    info!("All checks passed");

    params
        .to_archive()?
        .save(output)
        .map_err(|e| InitError::persistence(output, e))?;
    info!("Saved parameters to {}", output.display());

    let text = summary_text(&params, output, summary);
    match write_atomic(summary, |w| w.write_all(text.as_bytes())) {
        Ok(()) => info!("Saved summary to {}", summary.display()),
        Err(e) => warn!("Could not save summary file {}: {e}", summary.display()),
    }
    info!("\n{text}");
    Ok(params)
}

fn summary_text(params: &GaussianParams, output: &Path, summary: &Path) -> String {
    let file_name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.display().to_string())
    };
    format!(
        "{}\n\nFiles created:\n  - {}\n  - {}\n",
        params.summary(),
        file_name(output),
        file_name(summary)
    )
}

/// Stage 3: extract intrinsics and poses and write the camera record.
pub fn run_camera_stage(
    model: &Path,
    output: &Path,
    config: &CameraConfig,
) -> Result<Extraction, InitError> {
    info!("Extracting camera parameters from {}", model.display());
    if !model.is_dir() {
        return Err(InitError::InputMissing(model.to_path_buf()));
    }
    let reconstruction = Reconstruction::read(model)?;
    let extraction = CameraExtractor::new(config.clone()).extract(&reconstruction)?;

    let json = extraction
        .record
        .to_json()
        .map_err(|e| InitError::persistence(output, e))?;
    write_atomic(output, |w| w.write_all(json.as_bytes()))
        .map_err(|e| InitError::persistence(output, e))?;
    info!("Saved camera data to {}", output.display());
    Ok(extraction)
}

/// Optional diagnostic stage: analyze the cloud, optionally writing the report.
pub fn run_quality_stage(
    points: &Path,
    report: Option<&Path>,
    config: &QualityConfig,
) -> Result<QualityReport, InitError> {
    info!("Analyzing point cloud {}", points.display());
    let cloud = load_point_cloud(points)?;
    let analysis = quality::analyze(&cloud, config)?;
    info!("\n{analysis}");

    if let Some(path) = report {
        let text = format!("{analysis}\n");
        write_atomic(path, |w| w.write_all(text.as_bytes()))
            .map_err(|e| InitError::persistence(path, e))?;
        info!("Saved report to {}", path.display());
    }
    Ok(analysis)
}
