//! ESRI shapefile boundary source reader.
//!
//! Reads polygon shapes from the `.shp` together with their `.dbf`
//! attribute rows. The sibling `.prj`, when present, supplies the declared
//! CRS.

use std::path::Path;

use geo::MultiPolygon;
use geojson::{JsonObject, JsonValue};
use livability_pipeline_models::{BoundaryPolygon, GeometryKind};
use shapefile::Shape;
use shapefile::dbase::{FieldValue, Record};

use crate::boundaries::{BoundarySource, collect_boundaries, region_id_of};
use crate::{DataIntegrityError, IngestError};

/// Reads a boundary set from a shapefile.
///
/// # Errors
///
/// Returns [`IngestError`] if the shapefile or its attribute table cannot
/// be read, or a record breaks a boundary integrity rule.
pub fn read_shapefile(path: &Path, region_id_attribute: &str) -> Result<BoundarySource, IngestError> {
    let source_name = path.display().to_string();
    let shapefile_error = |source: shapefile::Error| IngestError::Shapefile {
        path: source_name.clone(),
        source: Box::new(source),
    };

    let declared_crs = read_prj(path)?;
    let mut reader = shapefile::Reader::from_path(path).map_err(shapefile_error)?;

    let boundaries = reader
        .iter_shapes_and_records()
        .enumerate()
        .map(|(index, item)| {
            let (shape, record) = item.map_err(shapefile_error)?;
            to_boundary(shape, record, index, region_id_attribute)
        });

    collect_boundaries(boundaries, &source_name, region_id_attribute, declared_crs)
}

fn to_boundary(
    shape: Shape,
    record: Record,
    index: usize,
    region_id_attribute: &str,
) -> Result<BoundaryPolygon, IngestError> {
    let attributes: JsonObject = record
        .into_iter()
        .map(|(name, value)| (name, field_to_json(value)))
        .collect();
    let region_id = region_id_of(&attributes, index, region_id_attribute)?;

    let geometry: MultiPolygon<f64> = match shape {
        Shape::Polygon(polygon) => polygon.into(),
        Shape::PolygonM(polygon) => polygon.into(),
        Shape::PolygonZ(polygon) => polygon.into(),
        other => {
            return Err(DataIntegrityError::UnsupportedGeometry {
                region_id,
                geometry_type: shape_type_name(&other).to_string(),
            }
            .into());
        }
    };

    // Shapefiles have no single/multi distinction
    let kind = if geometry.0.len() == 1 {
        GeometryKind::Polygon
    } else {
        GeometryKind::MultiPolygon
    };

    Ok(BoundaryPolygon {
        region_id,
        geometry,
        kind,
        attributes,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn field_to_json(value: FieldValue) -> JsonValue {
    match value {
        FieldValue::Character(s) => s.map_or(JsonValue::Null, JsonValue::from),
        FieldValue::Memo(s) => JsonValue::from(s),
        FieldValue::Logical(b) => b.map_or(JsonValue::Null, JsonValue::from),
        FieldValue::Integer(n) => JsonValue::from(n),
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => {
            // dBase stores integer codes as numerics; keep them integral
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                JsonValue::from(n as i64)
            } else {
                JsonValue::from(n)
            }
        }
        FieldValue::Float(Some(n)) => JsonValue::from(f64::from(n)),
        FieldValue::Numeric(None) | FieldValue::Float(None) => JsonValue::Null,
        other => JsonValue::from(format!("{other:?}")),
    }
}

const fn shape_type_name(shape: &Shape) -> &'static str {
    match shape {
        Shape::NullShape => "null",
        Shape::Point(_) | Shape::PointM(_) | Shape::PointZ(_) => "Point",
        Shape::Multipoint(_) | Shape::MultipointM(_) | Shape::MultipointZ(_) => "MultiPoint",
        Shape::Polyline(_) | Shape::PolylineM(_) | Shape::PolylineZ(_) => "Polyline",
        Shape::Polygon(_) | Shape::PolygonM(_) | Shape::PolygonZ(_) => "Polygon",
        Shape::Multipatch(_) => "Multipatch",
    }
}

/// Reads the `.prj` next to `path` into a CRS descriptor, if there is one.
fn read_prj(path: &Path) -> Result<Option<String>, IngestError> {
    let prj = path.with_extension("prj");
    if !prj.exists() {
        log::debug!("No projection file at {}", prj.display());
        return Ok(None);
    }

    let wkt = std::fs::read_to_string(&prj).map_err(|source| IngestError::Io {
        path: prj.display().to_string(),
        source,
    })?;

    Ok(Some(descriptor_from_wkt(&wkt)))
}

/// Turns WKT into a descriptor the CRS layer can parse.
///
/// Uses the outermost EPSG authority when the WKT carries one, and
/// recognizes the ESRI names for WGS84, Web Mercator, and the WGS84 UTM
/// zones. Anything else is returned as-is so that CRS parsing rejects it
/// instead of it being taken for longitude/latitude.
fn descriptor_from_wkt(wkt: &str) -> String {
    let compact: String = wkt.chars().filter(|c| !c.is_whitespace()).collect();
    let upper = compact.to_ascii_uppercase();

    for marker in [r#"AUTHORITY["EPSG","#, r#"ID["EPSG","#] {
        if let Some(pos) = upper.rfind(marker) {
            let code: String = upper[pos + marker.len()..]
                .chars()
                .filter(|c| *c != '"')
                .take_while(char::is_ascii_digit)
                .collect();
            if !code.is_empty() {
                return format!("EPSG:{code}");
            }
        }
    }

    if let Some(rest) = upper.split("WGS_1984_UTM_ZONE_").nth(1) {
        let zone: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let hemisphere = rest[zone.len()..].chars().next();
        if let (Ok(zone), Some(h @ ('N' | 'S'))) = (zone.parse::<u32>(), hemisphere) {
            let base = if h == 'N' { 32_600 } else { 32_700 };
            return format!("EPSG:{}", base + zone);
        }
    }

    if upper.starts_with("PROJCS[") && upper.contains("WEB_MERCATOR") {
        return "EPSG:3857".to_string();
    }

    if upper.starts_with("GEOGCS[") && (upper.contains("WGS_1984") || upper.contains("WGS84")) {
        return "EPSG:4326".to_string();
    }

    wkt.trim().to_string()
}
