//! Boundary CRS resolution and reprojection.
//!
//! The point source is always WGS84 longitude/latitude, so normalizing a
//! boundary set means bringing it into WGS84. Boundary sources that
//! declare no CRS are assigned the configured default as-is.

use geo::{Coord, MapCoords};
use livability_pipeline_models::BoundaryPolygon;

use crate::{Crs, CrsError, Transformer};

/// Decides which CRS a boundary source is expressed in.
///
/// Precedence: explicit `override_crs`, then the CRS `declared` by the
/// source, then `default_crs`. The default must be geographic since it is
/// applied without transforming any coordinates.
///
/// # Errors
///
/// Returns [`CrsError`] if any descriptor involved cannot be parsed or is
/// unsupported, or if the default is not geographic.
pub fn resolve_source_crs(
    declared: Option<&str>,
    override_crs: Option<&str>,
    default_crs: &str,
) -> Result<Crs, CrsError> {
    let default = Crs::parse(default_crs)?;
    if !default.is_geographic() {
        return Err(CrsError::DefaultNotGeographic {
            crs: default_crs.to_string(),
        });
    }

    if let Some(descriptor) = override_crs {
        let crs = Crs::parse(descriptor)?;
        log::info!("Boundary CRS set by configuration: {crs}");
        return Ok(crs);
    }

    match declared {
        Some(descriptor) => {
            let crs = Crs::parse(descriptor)?;
            log::info!("Boundary source declares {crs}");
            Ok(crs)
        }
        None => {
            log::info!("Boundary source has no CRS; assuming {default}");
            Ok(default)
        }
    }
}

/// Reprojects boundaries from `source` into WGS84.
///
/// WGS84 sources are returned unchanged. Otherwise every vertex is mapped
/// independently, so ring counts and vertex order (and with them
/// winding) are preserved.
///
/// # Errors
///
/// Returns [`CrsError::Definition`] if the projection cannot be built, or
/// [`CrsError::Transform`] if any vertex fails to map to a finite
/// coordinate.
pub fn normalize_boundaries(
    boundaries: Vec<BoundaryPolygon>,
    source: Crs,
) -> Result<Vec<BoundaryPolygon>, CrsError> {
    if source.is_wgs84() {
        return Ok(boundaries);
    }

    log::info!(
        "Reprojecting {} boundaries from {source} to {}",
        boundaries.len(),
        Crs::WGS84
    );

    let transformer = Transformer::new(source, Crs::WGS84)?;
    transform_boundaries(boundaries, &transformer)
}

/// Projects WGS84 boundaries into `target`.
///
/// The inverse of [`normalize_boundaries`]; used to produce equivalent
/// boundary sets in projected systems.
///
/// # Errors
///
/// Same as [`normalize_boundaries`].
pub fn project_boundaries(
    boundaries: Vec<BoundaryPolygon>,
    target: Crs,
) -> Result<Vec<BoundaryPolygon>, CrsError> {
    if target.is_wgs84() {
        return Ok(boundaries);
    }

    let transformer = Transformer::new(Crs::WGS84, target)?;
    transform_boundaries(boundaries, &transformer)
}

fn transform_boundaries(
    boundaries: Vec<BoundaryPolygon>,
    transformer: &Transformer,
) -> Result<Vec<BoundaryPolygon>, CrsError> {
    boundaries
        .into_iter()
        .map(|boundary| transform_boundary(boundary, transformer))
        .collect()
}

fn transform_boundary(
    mut boundary: BoundaryPolygon,
    transformer: &Transformer,
) -> Result<BoundaryPolygon, CrsError> {
    let region_id = boundary.region_id.as_str();
    let geometry = boundary.geometry.try_map_coords(|c| {
        transformer
            .apply(c.x, c.y)
            .map(|(x, y)| Coord { x, y })
            .ok_or_else(|| CrsError::Transform {
                region_id: region_id.to_string(),
                from: transformer.source_crs().to_string(),
                x: c.x,
                y: c.y,
            })
    })?;
    boundary.geometry = geometry;
    Ok(boundary)
}
