//! Coordinate transformation between two EPSG systems via `proj4rs`.
//!
//! `proj4rs` works in radians for geographic systems; [`Transformer`]
//! takes and returns degrees so callers never see the difference.

use proj4rs::proj::Proj;

use crate::{Crs, CrsError};

/// A prepared transformation from one [`Crs`] to another.
///
/// Building the projections parses their definitions once; reuse one
/// transformer for every vertex of a boundary set.
pub struct Transformer {
    from: Crs,
    to: Crs,
    source: Proj,
    target: Proj,
    source_degrees: bool,
    target_degrees: bool,
}

impl Transformer {
    /// Prepares a transformation from `from` into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Unsupported`] if either system has no definition,
    /// or [`CrsError::Definition`] if `proj4rs` rejects one.
    pub fn new(from: Crs, to: Crs) -> Result<Self, CrsError> {
        Ok(Self {
            from,
            to,
            source: build_proj(from)?,
            target: build_proj(to)?,
            source_degrees: from.is_geographic(),
            target_degrees: to.is_geographic(),
        })
    }

    /// Source system.
    #[must_use]
    pub const fn source_crs(&self) -> Crs {
        self.from
    }

    /// Transforms one coordinate, returning `None` if the library fails or
    /// the result is not finite.
    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let mut point = if self.source_degrees {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        if let Err(e) = proj4rs::transform::transform(&self.source, &self.target, &mut point) {
            log::trace!("{} -> {} failed for ({x}, {y}): {e}", self.from, self.to);
            return None;
        }

        let (out_x, out_y) = if self.target_degrees {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        (out_x.is_finite() && out_y.is_finite()).then_some((out_x, out_y))
    }
}

fn build_proj(crs: Crs) -> Result<Proj, CrsError> {
    let definition = crs.definition()?;
    Proj::from_proj_string(definition).map_err(|e| CrsError::Definition {
        crs: crs.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64), tolerance: f64) -> bool {
        (a.0 - b.0).abs() < tolerance && (a.1 - b.1).abs() < tolerance
    }

    #[test]
    fn web_mercator_matches_known_values() {
        let forward = Transformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let (x, y) = forward.apply(32.58, 0.32).unwrap();
        // 6378137 * 32.58° in radians
        assert!((x - 3_626_789.0).abs() < 1.0, "x = {x}");
        assert!((y - 35_622.0).abs() < 1.0, "y = {y}");

        let inverse = Transformer::new(Crs::WEB_MERCATOR, Crs::WGS84).unwrap();
        assert!(close(inverse.apply(x, y).unwrap(), (32.58, 0.32), 1e-9));
    }

    #[test]
    fn utm_zone_36_round_trips() {
        let utm = Crs::parse("EPSG:32636").unwrap();
        let forward = Transformer::new(Crs::WGS84, utm).unwrap();
        let (easting, northing) = forward.apply(33.0, 0.5).unwrap();
        // Central meridian of zone 36 is 33°E
        assert!((easting - 500_000.0).abs() < 1e-3, "easting = {easting}");
        assert!((northing - 55_265.0).abs() < 5.0, "northing = {northing}");

        let inverse = Transformer::new(utm, Crs::WGS84).unwrap();
        assert!(close(inverse.apply(easting, northing).unwrap(), (33.0, 0.5), 1e-7));
    }

    #[test]
    fn uganda_national_grid_lands_near_kampala() {
        let arc1960 = Crs::parse("EPSG:21096").unwrap();
        let inverse = Transformer::new(arc1960, Crs::WGS84).unwrap();
        // Roughly central Kampala in Arc 1960 / UTM zone 36N
        let (lon, lat) = inverse.apply(453_000.0, 35_400.0).unwrap();
        assert!((32.5..32.7).contains(&lon), "lon = {lon}");
        assert!((0.25..0.4).contains(&lat), "lat = {lat}");
    }

    #[test]
    fn non_finite_input_yields_none() {
        let inverse = Transformer::new(Crs::WEB_MERCATOR, Crs::WGS84).unwrap();
        assert_eq!(inverse.apply(f64::NAN, 0.0), None);
    }
}
