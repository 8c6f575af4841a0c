//! `GeoJSON` boundary source reader.
//!
//! Accepts a `FeatureCollection` (or a single `Feature`). Each feature
//! becomes a [`BoundaryPolygon`] keyed by the configured region id
//! property. A CRS declared through the legacy top-level `crs` member is
//! surfaced as a descriptor string for the CRS layer to interpret.
//!
//! Paths ending in `.shp` are handed to the shapefile reader in
//! [`crate::shp`]; both formats share the region id rules here.

use std::collections::BTreeMap;
use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson, JsonObject, JsonValue};
use livability_pipeline_models::{BoundaryPolygon, GeometryKind};

use crate::{DataIntegrityError, IngestError, ensure_source_exists};

/// A parsed boundary set together with the CRS its source declares.
#[derive(Debug, Clone)]
pub struct BoundarySource {
    /// Boundaries in source feature order.
    pub boundaries: Vec<BoundaryPolygon>,
    /// CRS descriptor from the source, if it declared one.
    pub declared_crs: Option<String>,
}

/// Reads a boundary set from a `GeoJSON` file or, for a `.shp` path, an
/// ESRI shapefile.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing, unreadable, not valid
/// `GeoJSON` or shapefile data, or breaks a boundary integrity rule.
pub fn read_boundaries(path: &Path, region_id_attribute: &str) -> Result<BoundarySource, IngestError> {
    ensure_source_exists(path)?;

    if is_shapefile(path) {
        return crate::shp::read_shapefile(path, region_id_attribute);
    }

    let source_name = path.display().to_string();

    let content = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: source_name.clone(),
        source,
    })?;

    parse_boundaries(&content, &source_name, region_id_attribute)
}

/// Parses a boundary set from `GeoJSON` text.
///
/// # Errors
///
/// See [`read_boundaries`].
pub fn parse_boundaries(
    content: &str,
    source_name: &str,
    region_id_attribute: &str,
) -> Result<BoundarySource, IngestError> {
    let geojson: GeoJson = content.parse().map_err(|source| IngestError::GeoJson {
        path: source_name.to_string(),
        source: Box::new(source),
    })?;

    let (features, foreign_members) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(feature) => {
            let foreign = feature.foreign_members.clone();
            (vec![feature], foreign)
        }
        GeoJson::Geometry(_) => {
            return Err(DataIntegrityError::NotFeatures {
                path: source_name.to_string(),
            }
            .into());
        }
    };

    let declared_crs = foreign_members.as_ref().and_then(declared_crs);

    let boundaries = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| to_boundary(feature, index, region_id_attribute));

    collect_boundaries(boundaries, source_name, region_id_attribute, declared_crs)
}

fn is_shapefile(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"))
}

/// Gathers boundaries in source order, rejecting duplicate region ids.
pub(crate) fn collect_boundaries(
    boundaries: impl Iterator<Item = Result<BoundaryPolygon, IngestError>>,
    source_name: &str,
    region_id_attribute: &str,
    declared_crs: Option<String>,
) -> Result<BoundarySource, IngestError> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut collected = Vec::new();

    for (index, boundary) in boundaries.enumerate() {
        let boundary = boundary?;

        if let Some(&first) = seen.get(&boundary.region_id) {
            return Err(DataIntegrityError::DuplicateRegionId {
                region_id: boundary.region_id,
                first,
                second: index,
            }
            .into());
        }
        seen.insert(boundary.region_id.clone(), index);

        collected.push(boundary);
    }

    log::info!(
        "Loaded {} boundaries from {source_name} keyed by '{region_id_attribute}'",
        collected.len()
    );

    Ok(BoundarySource {
        boundaries: collected,
        declared_crs,
    })
}

/// Reads the legacy `crs` member.
///
/// `{"type": "name", "properties": {"name": ...}}` yields the name and
/// `{"type": "EPSG", "properties": {"code": ...}}` yields `EPSG:<code>`,
/// whether or not the code already carries the prefix.
/// Any other non-null value is passed on verbatim so that it fails CRS
/// parsing instead of being silently ignored.
fn declared_crs(members: &JsonObject) -> Option<String> {
    let crs = members.get("crs")?;
    if crs.is_null() {
        return None;
    }

    let properties = crs.get("properties");
    let named = match crs.get("type").and_then(JsonValue::as_str) {
        Some("name") => properties
            .and_then(|p| p.get("name"))
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        Some("EPSG") => properties
            .and_then(|p| p.get("code"))
            .and_then(|code| match code {
                JsonValue::Number(n) => Some(n.to_string()),
                JsonValue::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .map(|code| {
                if code.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("EPSG:")) {
                    code
                } else {
                    format!("EPSG:{code}")
                }
            }),
        _ => None,
    };

    Some(named.unwrap_or_else(|| crs.to_string()))
}

fn to_boundary(
    feature: Feature,
    index: usize,
    region_id_attribute: &str,
) -> Result<BoundaryPolygon, IngestError> {
    let attributes = feature.properties.unwrap_or_default();
    let region_id = region_id_of(&attributes, index, region_id_attribute)?;

    let Some(geometry) = feature.geometry else {
        return Err(DataIntegrityError::UnsupportedGeometry {
            region_id,
            geometry_type: "null".to_string(),
        }
        .into());
    };

    let kind = match &geometry.value {
        geojson::Value::Polygon(_) => GeometryKind::Polygon,
        geojson::Value::MultiPolygon(_) => GeometryKind::MultiPolygon,
        other => {
            return Err(DataIntegrityError::UnsupportedGeometry {
                region_id,
                geometry_type: value_type_name(other).to_string(),
            }
            .into());
        }
    };

    let geo_geom: geo::Geometry<f64> =
        geometry
            .try_into()
            .map_err(|e: geojson::Error| DataIntegrityError::InvalidGeometry {
                region_id: region_id.clone(),
                message: e.to_string(),
            })?;

    let geometry = match geo_geom {
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        geo::Geometry::MultiPolygon(mp) => mp,
        _ => {
            return Err(DataIntegrityError::InvalidGeometry {
                region_id,
                message: "geometry changed type during conversion".to_string(),
            }
            .into());
        }
    };

    Ok(BoundaryPolygon {
        region_id,
        geometry,
        kind,
        attributes,
    })
}

/// Reads the region id property of feature `index`.
///
/// Strings must be non-blank; numbers are stringified.
pub(crate) fn region_id_of(
    attributes: &JsonObject,
    index: usize,
    region_id_attribute: &str,
) -> Result<String, IngestError> {
    match attributes.get(region_id_attribute) {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(JsonValue::Number(n)) => Ok(n.to_string()),
        _ => Err(DataIntegrityError::MissingRegionId {
            feature: index,
            attribute: region_id_attribute.to_string(),
        }
        .into()),
    }
}

const fn value_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(props: &str, geometry: &str) -> String {
        format!(r#"{{"type":"Feature","properties":{props},"geometry":{geometry}}}"#)
    }

    fn square(x: f64, y: f64) -> String {
        format!(
            r#"{{"type":"Polygon","coordinates":[[[{x},{y}],[{x1},{y}],[{x1},{y1}],[{x},{y1}],[{x},{y}]]]}}"#,
            x1 = x + 1.0,
            y1 = y + 1.0
        )
    }

    fn collection(features: &[String], extra: &str) -> String {
        format!(
            r#"{{"type":"FeatureCollection"{extra},"features":[{}]}}"#,
            features.join(",")
        )
    }

    #[test]
    fn parses_feature_collection_in_order() {
        let doc = collection(
            &[
                feature(r#"{"ADM2_EN":"Kampala","pop":1}"#, &square(32.0, 0.0)),
                feature(
                    r#"{"ADM2_EN":"Wakiso"}"#,
                    r#"{"type":"MultiPolygon","coordinates":[[[[33,0],[34,0],[34,1],[33,0]]]]}"#,
                ),
            ],
            "",
        );
        let source = parse_boundaries(&doc, "t.geojson", "ADM2_EN").unwrap();
        assert!(source.declared_crs.is_none());
        assert_eq!(source.boundaries.len(), 2);
        assert_eq!(source.boundaries[0].region_id, "Kampala");
        assert_eq!(source.boundaries[0].kind, GeometryKind::Polygon);
        assert_eq!(source.boundaries[0].attributes.get("pop"), Some(&JsonValue::from(1)));
        assert_eq!(source.boundaries[1].kind, GeometryKind::MultiPolygon);
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let doc = collection(&[feature(r#"{"code":101}"#, &square(0.0, 0.0))], "");
        let source = parse_boundaries(&doc, "t.geojson", "code").unwrap();
        assert_eq!(source.boundaries[0].region_id, "101");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doc = collection(
            &[
                feature(r#"{"ADM2_EN":"Kampala"}"#, &square(0.0, 0.0)),
                feature(r#"{"ADM2_EN":"Wakiso"}"#, &square(1.0, 0.0)),
                feature(r#"{"ADM2_EN":"Kampala"}"#, &square(2.0, 0.0)),
            ],
            "",
        );
        let err = parse_boundaries(&doc, "t.geojson", "ADM2_EN").unwrap_err();
        match err {
            IngestError::DataIntegrity(DataIntegrityError::DuplicateRegionId {
                region_id,
                first,
                second,
            }) => {
                assert_eq!(region_id, "Kampala");
                assert_eq!((first, second), (0, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_or_null_ids_are_rejected() {
        for props in [r#"{"other":"x"}"#, r#"{"ADM2_EN":null}"#, r#"{"ADM2_EN":""}"#, "null"] {
            let doc = collection(&[feature(props, &square(0.0, 0.0))], "");
            let err = parse_boundaries(&doc, "t.geojson", "ADM2_EN").unwrap_err();
            assert!(
                matches!(
                    err,
                    IngestError::DataIntegrity(DataIntegrityError::MissingRegionId { feature: 0, .. })
                ),
                "props {props}: {err}"
            );
        }
    }

    #[test]
    fn non_polygon_geometry_is_rejected() {
        let doc = collection(
            &[feature(
                r#"{"ADM2_EN":"Road"}"#,
                r#"{"type":"LineString","coordinates":[[0,0],[1,1]]}"#,
            )],
            "",
        );
        let err = parse_boundaries(&doc, "t.geojson", "ADM2_EN").unwrap_err();
        assert!(err.to_string().contains("LineString"), "{err}");
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let err = parse_boundaries(&square(0.0, 0.0), "t.geojson", "ADM2_EN").unwrap_err();
        assert!(matches!(
            err,
            IngestError::DataIntegrity(DataIntegrityError::NotFeatures { .. })
        ));
    }

    #[test]
    fn invalid_json_is_a_geojson_error() {
        let err = parse_boundaries("{not json", "t.geojson", "ADM2_EN").unwrap_err();
        assert!(matches!(err, IngestError::GeoJson { .. }));
    }

    #[test]
    fn reads_declared_crs() {
        let features = [feature(r#"{"ADM2_EN":"A"}"#, &square(0.0, 0.0))];

        let named = collection(
            &features,
            r#","crs":{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::3857"}}"#,
        );
        let source = parse_boundaries(&named, "t.geojson", "ADM2_EN").unwrap();
        assert_eq!(source.declared_crs.as_deref(), Some("urn:ogc:def:crs:EPSG::3857"));

        let epsg = collection(&features, r#","crs":{"type":"EPSG","properties":{"code":32636}}"#);
        let source = parse_boundaries(&epsg, "t.geojson", "ADM2_EN").unwrap();
        assert_eq!(source.declared_crs.as_deref(), Some("EPSG:32636"));

        let prefixed = collection(
            &features,
            r#","crs":{"type":"EPSG","properties":{"code":"EPSG:3857"}}"#,
        );
        let source = parse_boundaries(&prefixed, "t.geojson", "ADM2_EN").unwrap();
        assert_eq!(source.declared_crs.as_deref(), Some("EPSG:3857"));

        let lowercase = collection(
            &features,
            r#","crs":{"type":"EPSG","properties":{"code":"epsg:3857"}}"#,
        );
        let source = parse_boundaries(&lowercase, "t.geojson", "ADM2_EN").unwrap();
        assert_eq!(source.declared_crs.as_deref(), Some("epsg:3857"));

        let null = collection(&features, r#","crs":null"#);
        let source = parse_boundaries(&null, "t.geojson", "ADM2_EN").unwrap();
        assert!(source.declared_crs.is_none());

        let odd = collection(&features, r#","crs":{"type":"link"}"#);
        let source = parse_boundaries(&odd, "t.geojson", "ADM2_EN").unwrap();
        assert!(source.declared_crs.unwrap().contains("link"));
    }

    #[test]
    fn empty_collection_is_valid() {
        let source = parse_boundaries(&collection(&[], ""), "t.geojson", "ADM2_EN").unwrap();
        assert!(source.boundaries.is_empty());
    }
}
