#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reference system handling for boundary datasets.
//!
//! Parses CRS descriptors (`EPSG:3857`, OGC URNs, `CRS84`, ...) into EPSG
//! codes, looks their definitions up in the `crs-definitions` registry, and
//! reprojects boundary geometry into WGS84 longitude/latitude through
//! `proj4rs` so it can be compared directly against point coordinates.
//!
//! Geographic coordinates are always handled in `(longitude, latitude)`
//! order, the order `GeoJSON` mandates, regardless of the axis order an
//! EPSG definition declares.

pub mod normalize;
pub mod transform;

use std::fmt;

pub use normalize::{normalize_boundaries, project_boundaries, resolve_source_crs};
pub use transform::Transformer;

/// EPSG codes that are retired or vendor aliases of Web Mercator.
const WEB_MERCATOR_ALIASES: &[u32] = &[3785, 900_913, 102_100, 102_113];

/// A coordinate reference system with a known EPSG definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    code: u16,
}

impl Crs {
    /// WGS84 geographic longitude/latitude in degrees (EPSG:4326, CRS84).
    pub const WGS84: Self = Self { code: 4326 };

    /// Spherical Web Mercator in meters (EPSG:3857).
    pub const WEB_MERCATOR: Self = Self { code: 3857 };

    /// Parses a CRS descriptor.
    ///
    /// Accepts `EPSG:n`, a bare EPSG code, `urn:ogc:def:crs:EPSG::n`
    /// (with or without a version), `http(s)://www.opengis.net/def/crs/EPSG/0/n`,
    /// and the `CRS84` forms. Matching is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Unparseable`] if no EPSG code or `CRS84` name
    /// can be read from the descriptor, or [`CrsError::Unsupported`] if the
    /// code is well-formed but has no known definition.
    pub fn parse(descriptor: &str) -> Result<Self, CrsError> {
        let upper = descriptor.trim().to_ascii_uppercase();

        if is_crs84(&upper) {
            return Ok(Self::WGS84);
        }

        let code = extract_epsg_code(&upper).ok_or_else(|| CrsError::Unparseable {
            descriptor: descriptor.to_string(),
        })?;

        Self::from_epsg(code).ok_or_else(|| CrsError::Unsupported {
            descriptor: descriptor.to_string(),
        })
    }

    /// Maps an EPSG code to a system with a known definition.
    #[must_use]
    pub fn from_epsg(code: u32) -> Option<Self> {
        if WEB_MERCATOR_ALIASES.contains(&code) {
            return Some(Self::WEB_MERCATOR);
        }
        let code = u16::try_from(code).ok()?;
        crs_definitions::from_code(code).map(|_| Self { code })
    }

    /// Canonical EPSG code for this system.
    #[must_use]
    pub const fn epsg(self) -> u16 {
        self.code
    }

    /// The system's PROJ.4 definition string.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Unsupported`] if the registry has no entry for
    /// the code.
    pub fn definition(self) -> Result<&'static str, CrsError> {
        crs_definitions::from_code(self.code)
            .map(|def| def.proj4)
            .ok_or_else(|| CrsError::Unsupported {
                descriptor: self.to_string(),
            })
    }

    /// Whether coordinates in this system are longitude/latitude degrees.
    #[must_use]
    pub fn is_geographic(self) -> bool {
        self.definition()
            .is_ok_and(|def| def.split_whitespace().any(|p| p == "+proj=longlat"))
    }

    /// Whether this is WGS84 itself, the system points are expressed in.
    #[must_use]
    pub const fn is_wgs84(self) -> bool {
        self.code == Self::WGS84.code
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.code)
    }
}

fn is_crs84(upper: &str) -> bool {
    upper == "CRS84" || upper.ends_with(":CRS84") || upper.ends_with("/CRS84")
}

/// Pulls the numeric EPSG code out of an upper-cased descriptor.
fn extract_epsg_code(upper: &str) -> Option<u32> {
    if let Ok(code) = upper.parse::<u32>() {
        return Some(code);
    }
    // EPSG:3857, and EPSG::3857 with an empty version
    if let Some(rest) = upper.strip_prefix("EPSG:") {
        return rest.trim_start_matches(':').trim().parse().ok();
    }
    // urn:ogc:def:crs:EPSG::3857 or urn:ogc:def:crs:EPSG:6.6:3857
    if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
        return rest.rsplit(':').next()?.parse().ok();
    }
    // http://www.opengis.net/def/crs/EPSG/0/3857
    if upper.contains("/EPSG/") {
        return upper.trim_end_matches('/').rsplit('/').next()?.parse().ok();
    }
    None
}

/// Errors that can occur while resolving or applying a CRS.
#[derive(Debug, thiserror::Error)]
pub enum CrsError {
    /// The descriptor names no recognizable CRS.
    #[error("Unparseable CRS descriptor: '{descriptor}'")]
    Unparseable {
        /// The descriptor as given.
        descriptor: String,
    },

    /// The descriptor is well-formed but the system is not supported.
    #[error("Unsupported CRS '{descriptor}': no EPSG definition is known for it")]
    Unsupported {
        /// The descriptor as given.
        descriptor: String,
    },

    /// The configured default CRS is projected, so undeclared boundaries
    /// could not be trusted as longitude/latitude.
    #[error("Default CRS {crs} is not a geographic (longitude/latitude) system")]
    DefaultNotGeographic {
        /// The configured default.
        crs: String,
    },

    /// A definition string was rejected by the projection library.
    #[error("Cannot build projection for {crs}: {message}")]
    Definition {
        /// The system whose definition failed.
        crs: String,
        /// Library error text.
        message: String,
    },

    /// Reprojection failed or produced a non-finite coordinate.
    #[error("Reprojecting region '{region_id}' from {from} failed for ({x}, {y})")]
    Transform {
        /// Region whose geometry failed.
        region_id: String,
        /// Source CRS.
        from: String,
        /// Input x.
        x: f64,
        /// Input y.
        y: f64,
    },
}
