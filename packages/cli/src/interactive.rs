#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the livability tool.
//!
//! Walks through the same operations as the subcommands using `dialoguer`
//! prompts, pre-filled with the configured defaults.

use dialoguer::{Confirm, Input, Select};
use livability_cli_utils::{MultiProgress, prompt_optional, prompt_path};
use livability_pipeline_models::{ColumnMapping, PipelineConfig};

use crate::{DEFAULT_TOP, report};

/// Top-level actions available in the interactive menu.
enum Action {
    RunDataset,
    ShowAreas,
    InspectColumns,
}

impl Action {
    const ALL: &[Self] = &[Self::RunDataset, Self::ShowAreas, Self::InspectColumns];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunDataset => "Count points per region",
            Self::ShowAreas => "List regions by area",
            Self::InspectColumns => "Inspect point source columns",
        }
    }
}

/// Prompts for an action and runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected operation fails.
pub fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Livability Toolchain");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::RunDataset => run_dataset(multi)?,
        Action::ShowAreas => show_areas()?,
        Action::InspectColumns => inspect_columns()?,
    }

    Ok(())
}

/// Collects a dataset name and source paths, confirms, and runs.
fn run_dataset(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let defaults = PipelineConfig::default();

    let dataset_name: String = Input::new()
        .with_prompt("Dataset name")
        .default(defaults.dataset_name.clone())
        .interact_text()?;

    let points = prompt_path(
        "Point source CSV",
        &defaults.points_source_path.display().to_string(),
    )?;
    let boundaries = prompt_path(
        "Boundary GeoJSON or shapefile",
        &defaults.boundary_source_path.display().to_string(),
    )?;
    let output_dir = prompt_optional("Output directory (empty for the dataset directory)")?;

    let config = PipelineConfig {
        dataset_name: dataset_name.trim().to_string(),
        points_source_path: points,
        boundary_source_path: boundaries,
        output_dir: output_dir.map(Into::into),
        ..defaults
    };

    let target = config.resolve_output_dir()?;
    let proceed = Confirm::new()
        .with_prompt(format!("Write results to {}?", target.display()))
        .default(true)
        .interact()?;

    if !proceed {
        println!("Cancelled.");
        return Ok(());
    }

    crate::run_pipeline(multi, &config, DEFAULT_TOP)
}

fn show_areas() -> Result<(), Box<dyn std::error::Error>> {
    let defaults = PipelineConfig::default();
    let boundaries = prompt_path(
        "Boundary GeoJSON or shapefile",
        &defaults.boundary_source_path.display().to_string(),
    )?;
    let matching = prompt_optional("Highlight regions containing (empty to skip)")?;

    let config = PipelineConfig {
        boundary_source_path: boundaries,
        ..defaults
    };

    crate::show_areas(&config, DEFAULT_TOP, matching.as_deref())
}

fn inspect_columns() -> Result<(), Box<dyn std::error::Error>> {
    let defaults = PipelineConfig::default();
    let input = prompt_path(
        "Point source CSV",
        &defaults.points_source_path.display().to_string(),
    )?;

    let header = livability_ingest::read_header(&input)?;
    let columns = livability_ingest::resolve_columns(&header, &ColumnMapping::default())?;
    report::print_columns(&header, &columns);

    Ok(())
}
