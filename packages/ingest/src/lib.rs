#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Readers for the point and boundary sources.
//!
//! Points come from a header-bearing CSV whose coordinate and label
//! columns are resolved by [`schema::resolve_columns`]. Boundaries come
//! from a `GeoJSON` `FeatureCollection` or an ESRI shapefile; each feature
//! must carry a unique region identifier and polygonal geometry.

pub mod boundaries;
pub mod points;
pub mod schema;
pub mod shp;

use std::path::Path;

use livability_pipeline_models::ColumnRole;
use thiserror::Error;

pub use boundaries::{BoundarySource, parse_boundaries, read_boundaries};
pub use points::{PointSet, read_header, read_points, read_points_from};
pub use schema::{ResolvedColumn, ResolvedColumns, resolve_columns};

/// Errors that can occur while reading sources.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A source file does not exist.
    #[error("Source not found: {path}")]
    SourceNotFound {
        /// Missing path.
        path: String,
    },

    /// File read failed.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV decoding failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path being read.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// `GeoJSON` decoding failed.
    #[error("GeoJSON error in {path}: {source}")]
    GeoJson {
        /// Path being read.
        path: String,
        /// Underlying `GeoJSON` error.
        #[source]
        source: Box<geojson::Error>,
    },

    /// Shapefile or attribute table decoding failed.
    #[error("Shapefile error in {path}: {source}")]
    Shapefile {
        /// Path being read.
        path: String,
        /// Underlying shapefile error.
        #[source]
        source: Box<shapefile::Error>,
    },

    /// The point source columns could not be resolved.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A source violates a data integrity rule.
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),
}

/// Failure to bind a required column of the point source.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The source has no header columns at all.
    #[error("Point source has an empty header")]
    EmptyHeader,

    /// An explicitly configured column is not in the header.
    #[error("Configured {role} column '{column}' not found (available: {})", available.join(", "))]
    MissingColumn {
        /// Role the column was configured for.
        role: ColumnRole,
        /// Configured column name.
        column: String,
        /// Header columns.
        available: Vec<String>,
    },

    /// Auto-detection found no column for a required role and the
    /// first-column fallback is disabled or exhausted.
    #[error("No {role} column could be resolved (available: {})", available.join(", "))]
    Unresolved {
        /// Unresolved role.
        role: ColumnRole,
        /// Header columns.
        available: Vec<String>,
    },
}

/// Source data that breaks an integrity rule.
#[derive(Debug, Error)]
pub enum DataIntegrityError {
    /// Two boundary features share a region id.
    #[error("Duplicate region id '{region_id}' in boundary features {first} and {second}")]
    DuplicateRegionId {
        /// The duplicated id.
        region_id: String,
        /// Index of the first feature carrying it.
        first: usize,
        /// Index of the later feature carrying it.
        second: usize,
    },

    /// A boundary feature has no usable region id.
    #[error("Boundary feature {feature} has no usable '{attribute}' property")]
    MissingRegionId {
        /// Feature index.
        feature: usize,
        /// Region id attribute name.
        attribute: String,
    },

    /// A boundary feature's geometry is not a polygon or multipolygon.
    #[error("Boundary '{region_id}' has unsupported geometry type {geometry_type}")]
    UnsupportedGeometry {
        /// Region id of the feature.
        region_id: String,
        /// The geometry type found.
        geometry_type: String,
    },

    /// A boundary feature's geometry could not be decoded.
    #[error("Boundary '{region_id}' has invalid geometry: {message}")]
    InvalidGeometry {
        /// Region id of the feature.
        region_id: String,
        /// Decoder message.
        message: String,
    },

    /// The boundary document holds no features.
    #[error("Boundary source {path} is a bare geometry, not a Feature or FeatureCollection")]
    NotFeatures {
        /// Boundary source path.
        path: String,
    },

    /// A point row has a missing, non-numeric, or non-finite coordinate.
    #[error("Point row {row}: {column} value '{value}' is not a finite number")]
    MalformedCoordinate {
        /// Zero-based data row.
        row: usize,
        /// Column name.
        column: String,
        /// Raw cell value.
        value: String,
    },

    /// A point lies inside more than one boundary and overlaps are
    /// rejected.
    #[error("Point {point_id} lies inside multiple regions: {}", region_ids.join(", "))]
    OverlappingRegions {
        /// Offending point.
        point_id: usize,
        /// Every containing region, in boundary set order.
        region_ids: Vec<String>,
    },
}

/// Checks that a source exists before any attempt to read it.
///
/// # Errors
///
/// Returns [`IngestError::SourceNotFound`] if nothing exists at `path`.
pub fn ensure_source_exists(path: &Path) -> Result<(), IngestError> {
    if path.exists() {
        Ok(())
    } else {
        Err(IngestError::SourceNotFound {
            path: path.display().to_string(),
        })
    }
}
