#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region count pipeline.
//!
//! Reads a CSV of points and a `GeoJSON` or shapefile boundary set, reprojects the
//! boundaries to WGS84, assigns every point to the region containing it,
//! counts points per region, and writes the boundaries back out enriched
//! with their counts.
//!
//! Stages run strictly in sequence. Any failure stops the run before the
//! writer starts, so a failed run never replaces a previous run's output.

pub mod aggregate;
pub mod join;
pub mod progress;
pub mod writer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use livability_crs::{Crs, CrsError};
use livability_ingest::{DataIntegrityError, IngestError};
use livability_pipeline_models::{BoundaryPolygon, ConfigError, PipelineConfig, RegionCounts};
use thiserror::Error;

use crate::progress::{ProgressCallback, null_progress};
use crate::writer::{OutputPaths, WriteError, WriteOptions};

/// Any failure that stops a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A source could not be read or validated.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The boundary CRS could not be resolved or applied.
    #[error(transparent)]
    Crs(#[from] CrsError),

    /// The join found an integrity violation.
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    /// An artifact could not be written.
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Boundaries in WGS84 along with the CRS they were read in.
#[derive(Debug, Clone)]
pub struct NormalizedBoundaries {
    /// Boundaries in source order.
    pub boundaries: Vec<BoundaryPolygon>,
    /// CRS the source was interpreted in.
    pub source_crs: Crs,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Dataset the artifacts were written for.
    pub dataset_name: String,
    /// Points read.
    pub points: usize,
    /// Malformed rows dropped under the skip policy.
    pub skipped: usize,
    /// Points inside some region.
    pub matched: usize,
    /// Points outside every region.
    pub unmatched: usize,
    /// CRS the boundary source was interpreted in.
    pub source_crs: Crs,
    /// Per-region counts, one entry per boundary.
    pub counts: RegionCounts,
    /// Written artifacts.
    pub outputs: OutputPaths,
}

/// Reads the configured boundary source and reprojects it to WGS84.
///
/// # Errors
///
/// Returns [`PipelineError`] if the source cannot be read, breaks an
/// integrity rule, or its CRS cannot be resolved or applied.
pub fn load_boundaries(config: &PipelineConfig) -> Result<NormalizedBoundaries, PipelineError> {
    let source =
        livability_ingest::read_boundaries(&config.boundary_source_path, &config.region_id_attribute)?;

    let source_crs = livability_crs::resolve_source_crs(
        source.declared_crs.as_deref(),
        config.boundary_crs.as_deref(),
        &config.default_crs,
    )?;

    let boundaries = livability_crs::normalize_boundaries(source.boundaries, source_crs)?;

    Ok(NormalizedBoundaries {
        boundaries,
        source_crs,
    })
}

/// Runs the full pipeline for one dataset.
///
/// Both sources are checked for existence before either is read. Output
/// goes to [`PipelineConfig::resolve_output_dir`]; rerunning with the same
/// inputs reproduces the same bytes.
///
/// # Errors
///
/// Returns [`PipelineError`] from whichever stage fails first.
pub fn run(
    config: &PipelineConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<PipelineReport, PipelineError> {
    let start = Instant::now();
    let progress = progress.unwrap_or_else(null_progress);

    let output_dir: PathBuf = config.resolve_output_dir()?;
    livability_ingest::ensure_source_exists(&config.points_source_path)?;
    livability_ingest::ensure_source_exists(&config.boundary_source_path)?;

    log::info!("Running dataset '{}'", config.dataset_name);

    let point_set = livability_ingest::read_points(
        &config.points_source_path,
        &config.columns,
        config.malformed_points,
    )?;

    let NormalizedBoundaries {
        boundaries,
        source_crs,
    } = load_boundaries(config)?;

    let assignments = join::join_points(
        &point_set.records,
        &boundaries,
        config.overlap_policy,
        progress.as_ref(),
    )?;
    let counts = aggregate::count_by_region(&assignments, &boundaries);

    let options = WriteOptions {
        region_attribute: &config.region_id_attribute,
        count_attribute: &config.count_attribute,
        include_area: config.compute_area,
    };
    let outputs = writer::write_artifacts(
        &output_dir,
        &boundaries,
        &counts,
        &point_set.records,
        config.write_assignments.then_some(assignments.as_slice()),
        &options,
    )?;

    let matched = assignments.iter().filter(|a| a.is_matched()).count();

    log::info!(
        "Dataset '{}' complete in {:.2}s: {} points, {matched} matched, {} regions",
        config.dataset_name,
        start.elapsed().as_secs_f64(),
        point_set.records.len(),
        counts.len()
    );

    Ok(PipelineReport {
        dataset_name: config.dataset_name.clone(),
        points: point_set.records.len(),
        skipped: point_set.skipped,
        matched,
        unmatched: assignments.len() - matched,
        source_crs,
        counts,
        outputs,
    })
}
