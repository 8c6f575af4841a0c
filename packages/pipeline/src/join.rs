//! Point-in-boundary left join.

use livability_ingest::DataIntegrityError;
use livability_pipeline_models::{BoundaryPolygon, JoinAssignment, OverlapPolicy, PointRecord};
use livability_spatial::BoundaryIndex;

use crate::progress::ProgressCallback;

/// Assigns every point to the boundary that contains it.
///
/// Returns exactly one assignment per point, in point order. Points that
/// fall outside every boundary (including points on a boundary edge) keep
/// a `None` region. When boundaries overlap, `policy` picks the winner.
///
/// Boundaries must already be in WGS84.
///
/// # Errors
///
/// Returns [`DataIntegrityError::OverlappingRegions`] if a point lies in
/// more than one boundary under [`OverlapPolicy::Reject`].
pub fn join_points(
    points: &[PointRecord],
    boundaries: &[BoundaryPolygon],
    policy: OverlapPolicy,
    progress: &dyn ProgressCallback,
) -> Result<Vec<JoinAssignment>, DataIntegrityError> {
    let index = BoundaryIndex::build(boundaries);

    progress.set_total(points.len() as u64);
    progress.set_message("Joining points to regions".to_string());

    let mut assignments = Vec::with_capacity(points.len());

    for point in points {
        let ordinal = match policy {
            OverlapPolicy::First => index.lookup_first(point.longitude, point.latitude),
            OverlapPolicy::SmallestArea => index.lookup_smallest(point.longitude, point.latitude),
            OverlapPolicy::Reject => {
                let containing = index.containing(point.longitude, point.latitude);
                if containing.len() > 1 {
                    return Err(DataIntegrityError::OverlappingRegions {
                        point_id: point.id,
                        region_ids: containing
                            .iter()
                            .map(|&i| boundaries[i].region_id.clone())
                            .collect(),
                    });
                }
                containing.first().copied()
            }
        };

        assignments.push(JoinAssignment {
            point_id: point.id,
            region_id: ordinal.map(|i| boundaries[i].region_id.clone()),
        });
        progress.inc(1);
    }

    let matched = assignments.iter().filter(|a| a.is_matched()).count();
    log::info!(
        "Joined {} points: {matched} matched, {} unmatched",
        assignments.len(),
        assignments.len() - matched
    );
    progress.finish(format!("Joined {} points", assignments.len()));

    Ok(assignments)
}
