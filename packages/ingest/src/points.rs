//! CSV point source reader.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use livability_pipeline_models::{ColumnMapping, MalformedPointPolicy, PointRecord};

use crate::schema::{ResolvedColumn, ResolvedColumns, resolve_columns};
use crate::{DataIntegrityError, IngestError, SchemaError, ensure_source_exists};

/// Points read from a source, with the columns they were read through.
#[derive(Debug, Clone)]
pub struct PointSet {
    /// Resolved column bindings.
    pub columns: ResolvedColumns,
    /// Points in source row order.
    pub records: Vec<PointRecord>,
    /// Rows dropped under [`MalformedPointPolicy::Skip`].
    pub skipped: usize,
}

/// Reads just the trimmed header row of a CSV file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or cannot be decoded.
pub fn read_header(path: &Path) -> Result<Vec<String>, IngestError> {
    ensure_source_exists(path)?;
    let source_name = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| IngestError::Csv {
            path: source_name.clone(),
            source,
        })?;

    header_of(&mut reader, &source_name)
}

/// Reads every point from a CSV file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or unreadable, its
/// columns cannot be resolved, or a row has a malformed coordinate under
/// [`MalformedPointPolicy::Abort`].
pub fn read_points(
    path: &Path,
    mapping: &ColumnMapping,
    policy: MalformedPointPolicy,
) -> Result<PointSet, IngestError> {
    ensure_source_exists(path)?;
    let source_name = path.display().to_string();

    let file = std::fs::File::open(path).map_err(|source| IngestError::Io {
        path: source_name.clone(),
        source,
    })?;

    read_points_from(file, &source_name, mapping, policy)
}

/// Reads every point from any CSV byte stream.
///
/// `source_name` only labels errors and log lines.
///
/// # Errors
///
/// See [`read_points`].
pub fn read_points_from<R: Read>(
    input: R,
    source_name: &str,
    mapping: &ColumnMapping,
    policy: MalformedPointPolicy,
) -> Result<PointSet, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let header = header_of(&mut reader, source_name)?;
    let columns = resolve_columns(&header, mapping)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|source| IngestError::Csv {
            path: source_name.to_string(),
            source,
        })?;

        let coords = parse_coordinate(&record, row, &columns.longitude).and_then(|lon| {
            parse_coordinate(&record, row, &columns.latitude).map(|lat| (lon, lat))
        });

        let (longitude, latitude) = match coords {
            Ok(coords) => coords,
            Err(e) => match policy {
                MalformedPointPolicy::Abort => return Err(e.into()),
                MalformedPointPolicy::Skip => {
                    log::warn!("Skipping point: {e}");
                    skipped += 1;
                    continue;
                }
            },
        };

        let label = columns
            .label
            .as_ref()
            .and_then(|c| record.get(c.index))
            .unwrap_or_default()
            .to_string();

        let attributes: BTreeMap<String, String> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != columns.longitude.index && *i != columns.latitude.index)
            .map(|(i, name)| (name.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();

        records.push(PointRecord {
            id: row,
            longitude,
            latitude,
            label,
            attributes,
        });
    }

    log::info!(
        "Read {} points from {source_name} ({skipped} skipped)",
        records.len()
    );

    Ok(PointSet {
        columns,
        records,
        skipped,
    })
}

fn header_of<R: Read>(
    reader: &mut csv::Reader<R>,
    source_name: &str,
) -> Result<Vec<String>, IngestError> {
    let header: Vec<String> = reader
        .headers()
        .map_err(|source| IngestError::Csv {
            path: source_name.to_string(),
            source,
        })?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    if header.is_empty() || header.iter().all(String::is_empty) {
        return Err(SchemaError::EmptyHeader.into());
    }

    Ok(header)
}

fn parse_coordinate(
    record: &csv::StringRecord,
    row: usize,
    column: &ResolvedColumn,
) -> Result<f64, DataIntegrityError> {
    let raw = record.get(column.index).unwrap_or_default();
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DataIntegrityError::MalformedCoordinate {
            row,
            column: column.name.clone(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHOOLS: &str = "\
name,type,lon,lat
St. Mary's,primary,32.58,0.31
 Gulu High , secondary , 32.30 , 2.78
Entebbe Prep,primary,32.46,0.05
";

    fn read(csv: &str, policy: MalformedPointPolicy) -> Result<PointSet, IngestError> {
        read_points_from(csv.as_bytes(), "test.csv", &ColumnMapping::default(), policy)
    }

    #[test]
    fn reads_points_in_row_order() {
        let set = read(SCHOOLS, MalformedPointPolicy::Abort).unwrap();
        assert_eq!(set.records.len(), 3);
        assert_eq!(set.skipped, 0);

        let ids: Vec<usize> = set.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let gulu = &set.records[1];
        assert_eq!(gulu.label, "Gulu High");
        assert!((gulu.longitude - 32.30).abs() < 1e-12);
        assert!((gulu.latitude - 2.78).abs() < 1e-12);
        assert_eq!(gulu.attributes.get("type").map(String::as_str), Some("secondary"));
        assert!(!gulu.attributes.contains_key("lon"));
        assert_eq!(gulu.attributes.get("name").map(String::as_str), Some("Gulu High"));
    }

    #[test]
    fn header_only_source_yields_no_points() {
        let set = read("name,lon,lat\n", MalformedPointPolicy::Abort).unwrap();
        assert!(set.records.is_empty());
    }

    #[test]
    fn empty_source_is_a_schema_error() {
        let err = read("", MalformedPointPolicy::Abort).unwrap_err();
        assert!(matches!(err, IngestError::Schema(SchemaError::EmptyHeader)));
    }

    #[test]
    fn malformed_coordinate_aborts_by_default() {
        let csv = "name,lon,lat\na,32.5,0.3\nb,abc,0.3\n";
        let err = read(csv, MalformedPointPolicy::Abort).unwrap_err();
        match err {
            IngestError::DataIntegrity(DataIntegrityError::MalformedCoordinate {
                row,
                column,
                value,
            }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "lon");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_rows_can_be_skipped() {
        let csv = "name,lon,lat\na,32.5,0.3\nb,,0.3\nc,NaN,1\nd,32.6\ne,32.7,0.4\n";
        let set = read(csv, MalformedPointPolicy::Skip).unwrap();
        assert_eq!(set.skipped, 3);
        let ids: Vec<usize> = set.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 4], "ids keep their source row index");
    }

    #[test]
    fn out_of_range_coordinates_are_kept() {
        let set = read("lon,lat\n200,95\n", MalformedPointPolicy::Abort).unwrap();
        assert_eq!(set.records.len(), 1);
        assert!((set.records[0].longitude - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_file_is_reported() {
        let path = std::env::temp_dir().join("livability_points_missing.csv");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            read_points(&path, &ColumnMapping::default(), MalformedPointPolicy::Abort),
            Err(IngestError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn reads_header_from_file() {
        let dir = std::env::temp_dir().join("livability_points_header_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("schools.csv");
        std::fs::write(&path, SCHOOLS).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header, vec!["name", "type", "lon", "lat"]);

        let set = read_points(&path, &ColumnMapping::default(), MalformedPointPolicy::Abort)
            .unwrap();
        assert_eq!(set.records.len(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
