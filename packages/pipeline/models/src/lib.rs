#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point, boundary, and aggregation types for the region count pipeline.
//!
//! These types flow through every stage of a run: points and boundaries
//! are read by the ingest layer, joined into [`JoinAssignment`]s, folded
//! into [`RegionCounts`], and written back out alongside the boundary
//! geometry. Pipeline configuration lives in [`config`].

pub mod config;

use std::collections::BTreeMap;

use geo::{MultiPolygon, Point};
use strum_macros::{Display, EnumString};

pub use config::{
    ColumnMapping, ConfigError, MalformedPointPolicy, OverlapPolicy, PipelineConfig,
};

/// A single point read from the tabular point source.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// Zero-based data row index (header excluded).
    pub id: usize,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Value of the resolved label column, or empty when no label column
    /// was resolved.
    pub label: String,
    /// Every non-coordinate column, keyed by header name.
    pub attributes: BTreeMap<String, String>,
}

impl PointRecord {
    /// Returns the record's location as a `geo` point (x = lon, y = lat).
    #[must_use]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// The geometry type a boundary feature was declared with.
///
/// Boundaries are held as [`MultiPolygon`]s internally; this records the
/// original type so the enriched output keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    /// A single polygon.
    Polygon,
    /// A multipolygon.
    MultiPolygon,
}

/// An administrative boundary polygon with its pass-through attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    /// Canonical region identifier. Unique across a boundary set.
    pub region_id: String,
    /// Boundary geometry.
    pub geometry: MultiPolygon<f64>,
    /// Declared geometry type of the source feature.
    pub kind: GeometryKind,
    /// All source feature properties, untouched.
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl BoundaryPolygon {
    /// Returns the geometry in its declared shape.
    ///
    /// A [`GeometryKind::Polygon`] boundary whose multipolygon holds exactly
    /// one member is returned as a plain polygon.
    #[must_use]
    pub fn to_geometry(&self) -> geo::Geometry<f64> {
        match (self.kind, self.geometry.0.as_slice()) {
            (GeometryKind::Polygon, [polygon]) => geo::Geometry::Polygon(polygon.clone()),
            _ => geo::Geometry::MultiPolygon(self.geometry.clone()),
        }
    }
}

/// The result of joining one point against the boundary set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAssignment {
    /// [`PointRecord::id`] of the joined point.
    pub point_id: usize,
    /// Containing region, or `None` when the point fell outside every
    /// boundary.
    pub region_id: Option<String>,
}

impl JoinAssignment {
    /// Whether the point was matched to a region.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        self.region_id.is_some()
    }
}

/// Role a point source column plays in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ColumnRole {
    /// Longitude (x) coordinate.
    Longitude,
    /// Latitude (y) coordinate.
    Latitude,
    /// Optional human-readable label.
    Label,
}

/// Point counts per region, keyed uniquely by region id.
///
/// Holds an entry for every region of the boundary set it was built from,
/// including regions with a count of zero. Iterates in region id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionCounts {
    counts: BTreeMap<String, u64>,
}

impl RegionCounts {
    /// Wraps an already-built region id to count mapping.
    #[must_use]
    pub const fn new(counts: BTreeMap<String, u64>) -> Self {
        Self { counts }
    }

    /// Returns the count for a region, or `None` if the region is unknown.
    #[must_use]
    pub fn get(&self, region_id: &str) -> Option<u64> {
        self.counts.get(region_id).copied()
    }

    /// Number of regions covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no regions are covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, i.e. the number of matched points.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterates `(region_id, count)` pairs in region id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(id, count)| (id.as_str(), *count))
    }

    /// Returns the `n` regions with the highest counts.
    ///
    /// Ties are broken by region id so the result is stable.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}
