#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `livability` command line tool.
//!
//! Counts points (schools, clinics, ...) per administrative region and
//! writes the enriched boundaries under `data/processed/<dataset>`. Run
//! without a subcommand for a guided interactive flow.
//!
//! Uses `indicatif-log-bridge` (via [`livability_cli_utils::init_logger`])
//! so that log lines and progress bars share the terminal cleanly.

mod interactive;
mod report;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use livability_cli_utils::IndicatifProgress;
use livability_pipeline_models::{
    ColumnMapping, MalformedPointPolicy, OverlapPolicy, PipelineConfig,
};
use livability_spatial::area::{RegionArea, largest, region_areas};

/// Number of regions shown in summaries unless overridden.
const DEFAULT_TOP: usize = 10;

#[derive(Parser)]
#[command(name = "livability", about = "Point-in-region counts for livability datasets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Join points to regions, count them, and write the enriched boundaries
    Run(RunArgs),
    /// List the largest regions by geodesic area
    Areas {
        #[command(flatten)]
        boundaries: BoundaryArgs,
        /// Number of regions to list
        #[arg(long, default_value_t = DEFAULT_TOP)]
        top: usize,
        /// Also list regions whose id contains this text (case-insensitive)
        #[arg(long)]
        matching: Option<String>,
    },
    /// Show a point source's header and the columns that would be used
    Columns {
        /// Point source CSV
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Args)]
struct BoundaryArgs {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Boundary `GeoJSON` file or `.shp` shapefile
    #[arg(long)]
    boundaries: Option<PathBuf>,
    /// Boundary property holding the region id (e.g. "`ADM2_EN`")
    #[arg(long)]
    region_attr: Option<String>,
    /// CRS of the boundary coordinates, overriding any the file declares
    #[arg(long)]
    boundary_crs: Option<String>,
}

impl BoundaryArgs {
    fn load_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(path) = &self.boundaries {
            config.boundary_source_path.clone_from(path);
        }
        if let Some(attr) = &self.region_attr {
            config.region_id_attribute.clone_from(attr);
        }
        if self.boundary_crs.is_some() {
            config.boundary_crs.clone_from(&self.boundary_crs);
        }
        Ok(config)
    }
}

#[derive(Args)]
#[allow(clippy::struct_excessive_bools)]
struct RunArgs {
    #[command(flatten)]
    boundaries: BoundaryArgs,
    /// Point source CSV
    #[arg(long)]
    input: Option<PathBuf>,
    /// Dataset name; output goes to `<processed_root>/<name>`
    #[arg(long)]
    name: Option<String>,
    /// Write output here instead of the dataset directory
    #[arg(long)]
    outdir: Option<PathBuf>,
    /// Longitude column
    #[arg(long)]
    lon: Option<String>,
    /// Latitude column
    #[arg(long)]
    lat: Option<String>,
    /// Label column
    #[arg(long)]
    label: Option<String>,
    /// Name of the count property written to each region
    #[arg(long)]
    count_attr: Option<String>,
    /// Fail instead of falling back to the first column when lon/lat
    /// columns cannot be found by name
    #[arg(long)]
    strict_columns: bool,
    /// How to pick a region when boundaries overlap
    #[arg(long, value_parser = parse_overlap)]
    overlap: Option<OverlapPolicy>,
    /// Drop rows with malformed coordinates instead of failing
    #[arg(long)]
    skip_malformed: bool,
    /// Also write the per-point assignment table
    #[arg(long)]
    assignments: bool,
    /// Add each region's geodesic area (km²) to the output
    #[arg(long)]
    area: bool,
    /// Number of regions shown in the summary
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,
}

impl RunArgs {
    fn into_config(self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = self.boundaries.load_config()?;

        if let Some(input) = self.input {
            config.points_source_path = input;
        }
        if let Some(name) = self.name {
            config.dataset_name = name;
        }
        if self.outdir.is_some() {
            config.output_dir = self.outdir;
        }
        if self.lon.is_some() {
            config.columns.longitude_column = self.lon;
        }
        if self.lat.is_some() {
            config.columns.latitude_column = self.lat;
        }
        if self.label.is_some() {
            config.columns.label_column = self.label;
        }
        if let Some(count_attr) = self.count_attr {
            config.count_attribute = count_attr;
        }
        if self.strict_columns {
            config.columns.first_column_fallback = false;
        }
        if let Some(overlap) = self.overlap {
            config.overlap_policy = overlap;
        }
        if self.skip_malformed {
            config.malformed_points = MalformedPointPolicy::Skip;
        }
        config.write_assignments |= self.assignments;
        config.compute_area |= self.area;

        Ok(config)
    }
}

fn parse_overlap(value: &str) -> Result<OverlapPolicy, String> {
    value
        .parse()
        .map_err(|_| format!("expected one of: first, smallest-area, reject (got '{value}')"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = livability_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi);
    };

    match command {
        Commands::Run(args) => {
            let top = args.top;
            let config = args.into_config()?;
            run_pipeline(&multi, &config, top)?;
        }
        Commands::Areas {
            boundaries,
            top,
            matching,
        } => {
            let config = boundaries.load_config()?;
            show_areas(&config, top, matching.as_deref())?;
        }
        Commands::Columns { input } => {
            let header = livability_ingest::read_header(&input)?;
            let columns = livability_ingest::resolve_columns(&header, &ColumnMapping::default())?;
            report::print_columns(&header, &columns);
        }
    }

    Ok(())
}

/// Runs the pipeline with a progress bar and prints the summary.
fn run_pipeline(
    multi: &livability_cli_utils::MultiProgress,
    config: &PipelineConfig,
    top: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    log::debug!("Effective configuration: {config:?}");
    let progress = IndicatifProgress::points_bar(multi, "Joining points to regions");
    let report = livability_pipeline::run(config, Some(progress))?;
    report::print_run(&report, top);
    Ok(())
}

/// Prints the largest regions and, optionally, those matching a name.
fn show_areas(
    config: &PipelineConfig,
    top: usize,
    matching: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let normalized = livability_pipeline::load_boundaries(config)?;
    let areas = region_areas(&normalized.boundaries);

    if let Some(text) = matching {
        let needle = text.to_lowercase();
        let matches: Vec<RegionArea> = areas
            .iter()
            .filter(|a| a.region_id.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        if matches.is_empty() {
            println!("No regions match '{text}'.");
        } else {
            report::print_areas(&format!("Regions matching '{text}'"), &matches);
        }
    }

    report::print_areas(
        &format!("Largest {top} regions"),
        &largest(areas, top),
    );

    Ok(())
}
