//! Pipeline configuration.
//!
//! Every default the pipeline relies on (assumed boundary CRS, column
//! auto-detection fallback, output layout) is an explicit field here rather
//! than ambient state. Configuration is deserialized from TOML and then
//! overridden field-by-field by CLI flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Default point source path.
pub const DEFAULT_POINTS_SOURCE: &str = "data/samples/schools.csv";

/// Default boundary source path.
pub const DEFAULT_BOUNDARY_SOURCE: &str = "data/boundaries/uga_admbnda_adm2_ubos_20200824.geojson";

/// Default boundary property holding the region identifier.
pub const DEFAULT_REGION_ID_ATTRIBUTE: &str = "ADM2_EN";

/// Default name of the count property added to each boundary.
pub const DEFAULT_COUNT_ATTRIBUTE: &str = "count";

/// Default dataset name.
pub const DEFAULT_DATASET_NAME: &str = "sample_schools";

/// Default root directory for processed outputs.
pub const DEFAULT_PROCESSED_ROOT: &str = "data/processed";

/// CRS assumed for boundary sources that do not declare one.
pub const DEFAULT_CRS: &str = "EPSG:4326";

/// How to pick a region when a point lies inside more than one boundary.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OverlapPolicy {
    /// The first containing boundary in boundary dataset order. Arbitrary
    /// with respect to geography; callers must not attach meaning to it.
    #[default]
    First,
    /// The containing boundary with the smallest area, ties broken by
    /// dataset order.
    SmallestArea,
    /// Overlapping containment is a data integrity failure.
    Reject,
}

/// What to do with point rows whose coordinates are missing or not numeric.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MalformedPointPolicy {
    /// Fail the whole run on the first malformed row.
    #[default]
    Abort,
    /// Drop malformed rows with a warning and continue.
    Skip,
}

/// Column bindings for the point source.
///
/// `None` means "auto-detect from the header".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Explicit longitude column.
    pub longitude_column: Option<String>,
    /// Explicit latitude column.
    pub latitude_column: Option<String>,
    /// Explicit label column. Never required.
    pub label_column: Option<String>,
    /// When auto-detection finds no coordinate column, bind the first
    /// header column not already bound instead of failing.
    pub first_column_fallback: bool,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            longitude_column: None,
            latitude_column: None,
            label_column: None,
            first_column_fallback: true,
        }
    }
}

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PipelineConfig {
    /// CSV file of points.
    pub points_source_path: PathBuf,
    /// `GeoJSON` file of boundary polygons.
    pub boundary_source_path: PathBuf,
    /// Point source column bindings.
    pub columns: ColumnMapping,
    /// Boundary property used as the region identifier.
    pub region_id_attribute: String,
    /// Name of the count property written onto each boundary.
    pub count_attribute: String,
    /// Dataset identity. Selects the output directory under
    /// `processed_root`.
    pub dataset_name: String,
    /// Root directory for processed outputs.
    pub processed_root: PathBuf,
    /// Explicit output directory, overriding `processed_root/dataset_name`.
    pub output_dir: Option<PathBuf>,
    /// CRS assigned to boundary sources that do not declare one. Must be
    /// geographic.
    pub default_crs: String,
    /// Boundary CRS override, taking precedence over any CRS declared by
    /// the source.
    pub boundary_crs: Option<String>,
    /// Tie-break for points inside overlapping boundaries.
    pub overlap_policy: OverlapPolicy,
    /// Handling of point rows with malformed coordinates.
    pub malformed_points: MalformedPointPolicy,
    /// Also write the per-point assignment table.
    pub write_assignments: bool,
    /// Add a geodesic `area_km2` property to each enriched boundary.
    pub compute_area: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            points_source_path: PathBuf::from(DEFAULT_POINTS_SOURCE),
            boundary_source_path: PathBuf::from(DEFAULT_BOUNDARY_SOURCE),
            columns: ColumnMapping::default(),
            region_id_attribute: DEFAULT_REGION_ID_ATTRIBUTE.to_string(),
            count_attribute: DEFAULT_COUNT_ATTRIBUTE.to_string(),
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            processed_root: PathBuf::from(DEFAULT_PROCESSED_ROOT),
            output_dir: None,
            default_crs: DEFAULT_CRS.to_string(),
            boundary_crs: None,
            overlap_policy: OverlapPolicy::default(),
            malformed_points: MalformedPointPolicy::default(),
            write_assignments: false,
            compute_area: false,
        }
    }
}

impl PipelineConfig {
    /// Parses a configuration from TOML. Missing fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::de::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            source: e,
        })
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::de::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Resolves the directory this run writes into.
    ///
    /// Uses `output_dir` when set, otherwise
    /// `processed_root/dataset_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDatasetName`] if `dataset_name` is not
    /// a single plain path component.
    pub fn resolve_output_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        validate_dataset_name(&self.dataset_name)?;
        Ok(self.processed_root.join(&self.dataset_name))
    }
}

/// Checks that a dataset name maps to exactly one directory under the
/// processed root.
fn validate_dataset_name(name: &str) -> Result<(), ConfigError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if invalid {
        return Err(ConfigError::InvalidDatasetName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`PipelineConfig`].
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The dataset name cannot be used as a directory name.
    #[error("Invalid dataset name '{name}': must be a single non-empty path component")]
    InvalidDatasetName {
        /// The rejected name.
        name: String,
    },
}
