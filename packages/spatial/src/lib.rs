#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for point-in-boundary lookups.
//!
//! Builds an R-tree over the bounding boxes of a boundary set and answers
//! "which boundaries contain this point" by testing only the candidates
//! whose envelope contains the point. Results are identified by each
//! boundary's ordinal (its position in the boundary set), so callers can
//! apply order-based tie-breaks deterministically.
//!
//! Containment is strict: a point on a boundary edge is not contained.

pub mod area;

use geo::{BoundingRect, Contains, MultiPolygon, Point};
use livability_pipeline_models::BoundaryPolygon;
use rstar::{AABB, RTree, RTreeObject};

/// A boundary polygon stored in the R-tree with its metadata.
struct BoundaryEntry<'a> {
    ordinal: usize,
    area_km2: f64,
    envelope: AABB<[f64; 2]>,
    polygon: &'a MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree index over a borrowed boundary set.
pub struct BoundaryIndex<'a> {
    tree: RTree<BoundaryEntry<'a>>,
}

impl<'a> BoundaryIndex<'a> {
    /// Builds the index in one bulk load.
    ///
    /// Boundaries with empty geometry are left out; they cannot contain
    /// any point.
    #[must_use]
    pub fn build(boundaries: &'a [BoundaryPolygon]) -> Self {
        let entries: Vec<BoundaryEntry<'a>> = boundaries
            .iter()
            .enumerate()
            .filter_map(|(ordinal, boundary)| {
                let Some(envelope) = compute_envelope(&boundary.geometry) else {
                    log::warn!(
                        "Boundary {} has empty geometry and will never match a point",
                        boundary.region_id
                    );
                    return None;
                };

                Some(BoundaryEntry {
                    ordinal,
                    area_km2: area::area_km2(&boundary.geometry),
                    envelope,
                    polygon: &boundary.geometry,
                })
            })
            .collect();

        log::debug!("Built spatial index over {} boundaries", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no boundaries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    fn candidates(&self, lng: f64, lat: f64) -> impl Iterator<Item = &BoundaryEntry<'a>> {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);
        let finite = lng.is_finite() && lat.is_finite();

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(move |entry| finite && entry.polygon.contains(&point))
    }

    /// Ordinals of every boundary containing the point, ascending.
    #[must_use]
    pub fn containing(&self, lng: f64, lat: f64) -> Vec<usize> {
        let mut ordinals: Vec<usize> = self.candidates(lng, lat).map(|e| e.ordinal).collect();
        ordinals.sort_unstable();
        ordinals
    }

    /// Looks up the containing boundary that comes first in boundary set
    /// order.
    ///
    /// This tie-break is arbitrary with respect to geography; it only
    /// makes overlapping boundary data resolve deterministically.
    #[must_use]
    pub fn lookup_first(&self, lng: f64, lat: f64) -> Option<usize> {
        self.candidates(lng, lat).map(|e| e.ordinal).min()
    }

    /// Looks up the containing boundary with the smallest geodesic area,
    /// falling back to boundary set order between equal areas.
    #[must_use]
    pub fn lookup_smallest(&self, lng: f64, lat: f64) -> Option<usize> {
        self.candidates(lng, lat)
            .min_by(|a, b| {
                a.area_km2
                    .total_cmp(&b.area_km2)
                    .then_with(|| a.ordinal.cmp(&b.ordinal))
            })
            .map(|e| e.ordinal)
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`], or `None`
/// when it has no coordinates.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};
    use livability_pipeline_models::GeometryKind;

    use super::*;

    fn rect_boundary(id: &str, min: (f64, f64), max: (f64, f64)) -> BoundaryPolygon {
        let rect = Rect::new(coord! { x: min.0, y: min.1 }, coord! { x: max.0, y: max.1 });
        BoundaryPolygon {
            region_id: id.to_string(),
            geometry: MultiPolygon(vec![rect.to_polygon()]),
            kind: GeometryKind::Polygon,
            attributes: Default::default(),
        }
    }

    /// Reference implementation: test every boundary.
    fn containing_naive(boundaries: &[BoundaryPolygon], lng: f64, lat: f64) -> Vec<usize> {
        let point = Point::new(lng, lat);
        boundaries
            .iter()
            .enumerate()
            .filter(|(_, b)| b.geometry.contains(&point))
            .map(|(i, _)| i)
            .collect()
    }

    fn grid(n: u32) -> Vec<BoundaryPolygon> {
        let mut boundaries = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let x = f64::from(i);
                let y = f64::from(j);
                boundaries.push(rect_boundary(
                    &format!("cell-{i}-{j}"),
                    (x, y),
                    (x + 1.0, y + 1.0),
                ));
            }
        }
        boundaries
    }

    #[test]
    fn index_matches_naive_scan() {
        let boundaries = grid(8);
        let index = BoundaryIndex::build(&boundaries);
        assert_eq!(index.len(), 64);

        let mut lng = -0.73;
        while lng < 9.0 {
            let mut lat = -0.41;
            while lat < 9.0 {
                assert_eq!(
                    index.containing(lng, lat),
                    containing_naive(&boundaries, lng, lat),
                    "mismatch at ({lng}, {lat})"
                );
                lat += 0.37;
            }
            lng += 0.29;
        }
    }

    #[test]
    fn edge_points_are_not_contained() {
        let boundaries = vec![rect_boundary("a", (0.0, 0.0), (1.0, 1.0))];
        let index = BoundaryIndex::build(&boundaries);
        assert_eq!(index.lookup_first(0.5, 0.5), Some(0));
        assert_eq!(index.lookup_first(1.0, 0.5), None);
        assert_eq!(index.lookup_first(0.0, 0.0), None);
    }

    #[test]
    fn first_wins_on_overlap() {
        let boundaries = vec![
            rect_boundary("big", (0.0, 0.0), (10.0, 10.0)),
            rect_boundary("small", (4.0, 4.0), (6.0, 6.0)),
        ];
        let index = BoundaryIndex::build(&boundaries);
        assert_eq!(index.containing(5.0, 5.0), vec![0, 1]);
        assert_eq!(index.lookup_first(5.0, 5.0), Some(0));
        assert_eq!(index.lookup_smallest(5.0, 5.0), Some(1));
        assert_eq!(index.lookup_smallest(1.0, 1.0), Some(0));
    }

    #[test]
    fn smallest_ignores_ring_winding() {
        let mut clockwise_inner = rect_boundary("inner", (4.0, 4.0), (6.0, 6.0));
        clockwise_inner.geometry.0[0].exterior_mut(|ring| ring.0.reverse());
        let boundaries = vec![
            rect_boundary("outer", (0.0, 0.0), (10.0, 10.0)),
            clockwise_inner,
        ];
        let index = BoundaryIndex::build(&boundaries);
        assert_eq!(index.lookup_smallest(5.0, 5.0), Some(1));

        let mut clockwise_outer = rect_boundary("outer", (0.0, 0.0), (10.0, 10.0));
        clockwise_outer.geometry.0[0].exterior_mut(|ring| ring.0.reverse());
        let boundaries = vec![
            rect_boundary("inner", (4.0, 4.0), (6.0, 6.0)),
            clockwise_outer,
        ];
        let index = BoundaryIndex::build(&boundaries);
        assert_eq!(index.lookup_smallest(5.0, 5.0), Some(0));
    }

    #[test]
    fn smallest_ties_fall_back_to_order() {
        let boundaries = vec![
            rect_boundary("b", (0.0, 0.0), (1.0, 1.0)),
            rect_boundary("a", (0.0, 0.0), (1.0, 1.0)),
        ];
        let index = BoundaryIndex::build(&boundaries);
        assert_eq!(index.lookup_smallest(0.5, 0.5), Some(0));
    }

    #[test]
    fn non_finite_points_match_nothing() {
        let boundaries = vec![rect_boundary("a", (0.0, 0.0), (1.0, 1.0))];
        let index = BoundaryIndex::build(&boundaries);
        assert!(index.containing(f64::NAN, 0.5).is_empty());
        assert_eq!(index.lookup_first(0.5, f64::INFINITY), None);
    }

    #[test]
    fn empty_geometries_are_skipped() {
        let boundaries = vec![
            BoundaryPolygon {
                region_id: "empty".to_string(),
                geometry: MultiPolygon(vec![]),
                kind: GeometryKind::MultiPolygon,
                attributes: Default::default(),
            },
            rect_boundary("a", (0.0, 0.0), (1.0, 1.0)),
        ];
        let index = BoundaryIndex::build(&boundaries);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup_first(0.5, 0.5), Some(1));
    }
}
