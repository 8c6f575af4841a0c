//! Geodesic boundary areas.
//!
//! Areas are computed on the WGS84 ellipsoid, so boundaries must already
//! be in longitude/latitude degrees. Ring winding in the source does not
//! matter: shapefile-derived data winds exteriors clockwise.

use geo::orient::Direction;
use geo::{GeodesicArea, MultiPolygon, Orient};
use livability_pipeline_models::BoundaryPolygon;

const SQ_METERS_PER_SQ_KM: f64 = 1_000_000.0;

/// Area of a region in square kilometers.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionArea {
    /// Region identifier.
    pub region_id: String,
    /// Geodesic area in km².
    pub area_km2: f64,
}

/// Unsigned geodesic area of a multipolygon, in km².
///
/// Rings are re-wound (exterior counter-clockwise, holes clockwise) first;
/// a clockwise exterior would otherwise measure the rest of the globe.
#[must_use]
pub fn area_km2(mp: &MultiPolygon<f64>) -> f64 {
    mp.orient(Direction::Default).geodesic_area_unsigned() / SQ_METERS_PER_SQ_KM
}

/// Computes the area of every boundary, in boundary set order.
#[must_use]
pub fn region_areas(boundaries: &[BoundaryPolygon]) -> Vec<RegionArea> {
    boundaries
        .iter()
        .map(|b| RegionArea {
            region_id: b.region_id.clone(),
            area_km2: area_km2(&b.geometry),
        })
        .collect()
}

/// Returns the `n` largest regions, largest first.
#[must_use]
pub fn largest(mut areas: Vec<RegionArea>, n: usize) -> Vec<RegionArea> {
    areas.sort_by(|a, b| {
        b.area_km2
            .total_cmp(&a.area_km2)
            .then_with(|| a.region_id.cmp(&b.region_id))
    });
    areas.truncate(n);
    areas
}
