//! Per-region point counts.

use std::collections::BTreeMap;

use livability_pipeline_models::{BoundaryPolygon, JoinAssignment, RegionCounts};

/// Counts assignments per region.
///
/// Every boundary appears in the result, with `0` when no point was
/// assigned to it. Unmatched assignments are not counted anywhere, so the
/// total equals the number of matched points. Assignments naming a region
/// outside `boundaries` are ignored.
#[must_use]
pub fn count_by_region(
    assignments: &[JoinAssignment],
    boundaries: &[BoundaryPolygon],
) -> RegionCounts {
    let seed: BTreeMap<String, u64> = boundaries
        .iter()
        .map(|b| (b.region_id.clone(), 0))
        .collect();

    let counts = assignments
        .iter()
        .filter_map(|a| a.region_id.as_deref())
        .fold(seed, |mut acc, region_id| {
            if let Some(count) = acc.get_mut(region_id) {
                *count += 1;
            } else {
                log::debug!("Ignoring assignment to unknown region '{region_id}'");
            }
            acc
        });

    log::info!("Aggregated counts for {} regions", counts.len());

    RegionCounts::new(counts)
}
