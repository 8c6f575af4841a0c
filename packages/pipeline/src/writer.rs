//! Enriched boundary artifacts.
//!
//! Every file of a run is first written to a `.tmp` sibling and flushed.
//! Only once all of them are staged are they renamed over their final
//! paths, so a failure while writing leaves the previous run's artifacts
//! untouched. Output bytes depend only on the inputs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use livability_pipeline_models::{BoundaryPolygon, JoinAssignment, PointRecord, RegionCounts};
use livability_spatial::area::area_km2;
use thiserror::Error;

/// File name of the enriched `GeoJSON` boundary set.
pub const COUNTS_GEOJSON: &str = "counts_by_region.geojson";

/// File name of the tabular per-region counts.
pub const COUNTS_CSV: &str = "counts_by_region.csv";

/// File name of the per-point assignment table.
pub const ASSIGNMENTS_CSV: &str = "assignments.csv";

/// Property name for the geodesic area column.
pub const AREA_ATTRIBUTE: &str = "area_km2";

/// Failure to write an output artifact.
#[derive(Debug, Error)]
#[error("Failed to write {path}: {source}")]
pub struct WriteError {
    /// Artifact (or directory) being written.
    pub path: String,
    /// Underlying cause.
    pub source: WriteFailure,
}

/// Cause of a [`WriteError`].
#[derive(Debug, Error)]
pub enum WriteFailure {
    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// CSV encoding error.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Column naming and optional extras for the written artifacts.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions<'a> {
    /// Name of the region id column in the counts CSV.
    pub region_attribute: &'a str,
    /// Name of the count property and column.
    pub count_attribute: &'a str,
    /// Whether to add [`AREA_ATTRIBUTE`] to every region.
    pub include_area: bool,
}

/// Paths of the artifacts produced by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Output directory.
    pub dir: PathBuf,
    /// Enriched `GeoJSON`.
    pub geojson: PathBuf,
    /// Counts CSV.
    pub csv: PathBuf,
    /// Assignment CSV, when requested.
    pub assignments: Option<PathBuf>,
}

/// Writes the enriched boundary set, the counts table, and optionally the
/// assignment table into `dir`, creating it if needed.
///
/// `assignments` pairs with `points` by [`PointRecord::id`]. When it is
/// `None`, an assignment table left by a previous run is removed so the
/// directory only reflects this run.
///
/// # Errors
///
/// Returns [`WriteError`] if the directory cannot be created or any
/// artifact cannot be written.
pub fn write_artifacts(
    dir: &Path,
    boundaries: &[BoundaryPolygon],
    counts: &RegionCounts,
    points: &[PointRecord],
    assignments: Option<&[JoinAssignment]>,
    options: &WriteOptions<'_>,
) -> Result<OutputPaths, WriteError> {
    std::fs::create_dir_all(dir).map_err(|e| WriteError {
        path: dir.display().to_string(),
        source: e.into(),
    })?;

    let mut staged = Staged::default();

    let geojson_path = dir.join(COUNTS_GEOJSON);
    let collection = enriched_collection(boundaries, counts, options);
    staged.stage(&geojson_path, |out| {
        serde_json::to_writer(&mut *out, &collection)?;
        out.write_all(b"\n")?;
        Ok(())
    })?;

    let csv_path = dir.join(COUNTS_CSV);
    staged.stage(&csv_path, |out| {
        write_counts_csv(out, boundaries, counts, options)
    })?;

    let assignments_path = dir.join(ASSIGNMENTS_CSV);
    if let Some(assignments) = assignments {
        staged.stage(&assignments_path, |out| {
            write_assignments_csv(out, points, assignments)
        })?;
    }

    staged.commit()?;
    log::info!("Saved enriched boundaries to {}", geojson_path.display());
    log::info!("Saved region counts to {}", csv_path.display());

    let assignments_path = if assignments.is_some() {
        log::info!("Saved point assignments to {}", assignments_path.display());
        Some(assignments_path)
    } else {
        if assignments_path.exists() {
            log::debug!("Removing stale {}", assignments_path.display());
            std::fs::remove_file(&assignments_path).map_err(|e| WriteError {
                path: assignments_path.display().to_string(),
                source: e.into(),
            })?;
        }
        None
    };

    Ok(OutputPaths {
        dir: dir.to_path_buf(),
        geojson: geojson_path,
        csv: csv_path,
        assignments: assignments_path,
    })
}

/// Builds the enriched `FeatureCollection`, in boundary order.
///
/// Each feature keeps its source properties and gains the count (and the
/// area when requested). Regions missing from `counts` get `0`.
#[must_use]
pub fn enriched_collection(
    boundaries: &[BoundaryPolygon],
    counts: &RegionCounts,
    options: &WriteOptions<'_>,
) -> FeatureCollection {
    let features = boundaries
        .iter()
        .map(|boundary| {
            let mut properties: JsonObject = boundary.attributes.clone();
            properties.insert(
                options.count_attribute.to_string(),
                JsonValue::from(counts.get(&boundary.region_id).unwrap_or(0)),
            );
            if options.include_area {
                properties.insert(
                    AREA_ATTRIBUTE.to_string(),
                    JsonValue::from(area_km2(&boundary.geometry)),
                );
            }

            let geometry = geojson::Geometry::new(geojson::Value::from(&boundary.to_geometry()));

            Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn write_counts_csv(
    out: &mut BufWriter<File>,
    boundaries: &[BoundaryPolygon],
    counts: &RegionCounts,
    options: &WriteOptions<'_>,
) -> Result<(), WriteFailure> {
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec![options.region_attribute, options.count_attribute];
    if options.include_area {
        header.push(AREA_ATTRIBUTE);
    }
    wtr.write_record(&header)?;

    for boundary in boundaries {
        let count = counts.get(&boundary.region_id).unwrap_or(0).to_string();
        let mut row = vec![boundary.region_id.clone(), count];
        if options.include_area {
            row.push(area_km2(&boundary.geometry).to_string());
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

fn write_assignments_csv(
    out: &mut BufWriter<File>,
    points: &[PointRecord],
    assignments: &[JoinAssignment],
) -> Result<(), WriteFailure> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["point_id", "label", "region_id"])?;

    for (point, assignment) in points.iter().zip(assignments) {
        debug_assert_eq!(point.id, assignment.point_id);
        wtr.write_record([
            point.id.to_string().as_str(),
            point.label.as_str(),
            assignment.region_id.as_deref().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Artifacts written to `.tmp` siblings and not yet moved into place.
///
/// Dropping a [`Staged`] without committing removes every temp file it
/// still holds.
#[derive(Default)]
struct Staged {
    /// `(tmp, final)` pairs in staging order.
    files: Vec<(PathBuf, PathBuf)>,
}

impl Staged {
    /// Writes `path`'s content to its `.tmp` sibling and flushes it to disk.
    fn stage(
        &mut self,
        path: &Path,
        write: impl FnOnce(&mut BufWriter<File>) -> Result<(), WriteFailure>,
    ) -> Result<(), WriteError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

        if let Err(source) = write_synced(&tmp_path, write) {
            if tmp_path.is_file() {
                let _ = std::fs::remove_file(&tmp_path);
            }
            return Err(WriteError {
                path: path.display().to_string(),
                source,
            });
        }

        self.files.push((tmp_path, path.to_path_buf()));
        Ok(())
    }

    /// Renames every staged file over its final path.
    fn commit(mut self) -> Result<(), WriteError> {
        while !self.files.is_empty() {
            let (tmp_path, path) = &self.files[0];
            std::fs::rename(tmp_path, path).map_err(|e| WriteError {
                path: path.display().to_string(),
                source: e.into(),
            })?;
            self.files.remove(0);
        }
        Ok(())
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        for (tmp_path, _) in self.files.drain(..) {
            log::debug!("Discarding {}", tmp_path.display());
            let _ = std::fs::remove_file(&tmp_path);
        }
    }
}

fn write_synced(
    tmp_path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<(), WriteFailure>,
) -> Result<(), WriteFailure> {
    let mut out = BufWriter::new(File::create(tmp_path)?);
    write(&mut out)?;
    out.flush()?;
    let file = out.into_inner().map_err(std::io::IntoInnerError::into_error)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geo::{MultiPolygon, Rect, coord};
    use livability_pipeline_models::GeometryKind;

    use super::*;

    const OPTIONS: WriteOptions<'static> = WriteOptions {
        region_attribute: "ADM2_EN",
        count_attribute: "count",
        include_area: false,
    };

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("livability_writer_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn region(id: &str, x: f64) -> BoundaryPolygon {
        let rect = Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 1.0, y: 1.0 });
        let mut attributes = serde_json::Map::new();
        attributes.insert("ADM2_EN".to_string(), JsonValue::from(id));
        attributes.insert("ADM1_EN".to_string(), JsonValue::from("Central"));
        BoundaryPolygon {
            region_id: id.to_string(),
            geometry: MultiPolygon(vec![rect.to_polygon()]),
            kind: GeometryKind::Polygon,
            attributes,
        }
    }

    fn counts(pairs: &[(&str, u64)]) -> RegionCounts {
        RegionCounts::new(pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect())
    }

    fn no_tmp_files(dir: &Path) -> bool {
        std::fs::read_dir(dir)
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".tmp"))
    }

    #[test]
    fn writes_enriched_geojson_and_csv() {
        let dir = scratch("basic");
        let boundaries = vec![region("Wakiso", 1.0), region("Kampala", 0.0)];
        let counts = counts(&[("Kampala", 1), ("Wakiso", 0)]);

        let paths = write_artifacts(&dir, &boundaries, &counts, &[], None, &OPTIONS).unwrap();
        assert!(paths.assignments.is_none());
        assert!(no_tmp_files(&dir));

        let geojson: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.geojson).unwrap()).unwrap();
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["ADM2_EN"], "Wakiso", "boundary order is kept");
        assert_eq!(features[0]["properties"]["count"], 0);
        assert_eq!(features[1]["properties"]["count"], 1);
        assert_eq!(features[1]["properties"]["ADM1_EN"], "Central");
        assert_eq!(features[1]["geometry"]["type"], "Polygon");

        let csv = std::fs::read_to_string(&paths.csv).unwrap();
        assert_eq!(csv, "ADM2_EN,count\nWakiso,0\nKampala,1\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_counts_are_written_as_zero() {
        let boundaries = vec![region("Kampala", 0.0)];
        let collection = enriched_collection(&boundaries, &RegionCounts::default(), &OPTIONS);
        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props.get("count"), Some(&JsonValue::from(0)));
    }

    #[test]
    fn area_is_added_when_requested() {
        let dir = scratch("area");
        let options = WriteOptions {
            include_area: true,
            ..OPTIONS
        };
        let boundaries = vec![region("Kampala", 0.0)];
        let paths = write_artifacts(
            &dir,
            &boundaries,
            &counts(&[("Kampala", 2)]),
            &[],
            None,
            &options,
        )
        .unwrap();

        let csv = std::fs::read_to_string(&paths.csv).unwrap();
        assert!(csv.starts_with("ADM2_EN,count,area_km2\nKampala,2,"), "{csv}");

        let collection = enriched_collection(&boundaries, &RegionCounts::default(), &options);
        let area = collection.features[0].properties.as_ref().unwrap()["area_km2"]
            .as_f64()
            .unwrap();
        assert!(area > 12_000.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn assignments_are_written_and_cleared() {
        let dir = scratch("assignments");
        let boundaries = vec![region("Kampala", 0.0)];
        let points = vec![
            PointRecord {
                id: 0,
                longitude: 0.5,
                latitude: 0.5,
                label: "St. Mary's, Kampala".to_string(),
                attributes: BTreeMap::new(),
            },
            PointRecord {
                id: 1,
                longitude: 200.0,
                latitude: 95.0,
                label: String::new(),
                attributes: BTreeMap::new(),
            },
        ];
        let assignments = vec![
            JoinAssignment {
                point_id: 0,
                region_id: Some("Kampala".to_string()),
            },
            JoinAssignment {
                point_id: 1,
                region_id: None,
            },
        ];
        let counts = counts(&[("Kampala", 1)]);

        let paths = write_artifacts(
            &dir,
            &boundaries,
            &counts,
            &points,
            Some(&assignments),
            &OPTIONS,
        )
        .unwrap();
        let path = paths.assignments.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "point_id,label,region_id\n0,\"St. Mary's, Kampala\",Kampala\n1,,\n"
        );

        write_artifacts(&dir, &boundaries, &counts, &points, None, &OPTIONS).unwrap();
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rewrite_replaces_previous_artifact() {
        let dir = scratch("replace");
        let boundaries = vec![region("Kampala", 0.0)];

        write_artifacts(&dir, &boundaries, &counts(&[("Kampala", 5)]), &[], None, &OPTIONS)
            .unwrap();
        let paths =
            write_artifacts(&dir, &boundaries, &counts(&[("Kampala", 1)]), &[], None, &OPTIONS)
                .unwrap();

        assert_eq!(std::fs::read_to_string(&paths.csv).unwrap(), "ADM2_EN,count\nKampala,1\n");
        assert!(no_tmp_files(&dir));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_rewrite_keeps_previous_run_intact() {
        let dir = scratch("all_or_nothing");
        let boundaries = vec![region("Kampala", 0.0)];

        let paths =
            write_artifacts(&dir, &boundaries, &counts(&[("Kampala", 5)]), &[], None, &OPTIONS)
                .unwrap();
        let geojson_before = std::fs::read_to_string(&paths.geojson).unwrap();

        // A directory squatting on the temp path makes staging the CSV fail
        std::fs::create_dir(dir.join("counts_by_region.csv.tmp")).unwrap();
        let err =
            write_artifacts(&dir, &boundaries, &counts(&[("Kampala", 1)]), &[], None, &OPTIONS)
                .unwrap_err();

        assert!(err.path.ends_with(COUNTS_CSV), "{err}");
        assert_eq!(std::fs::read_to_string(&paths.geojson).unwrap(), geojson_before);
        assert_eq!(std::fs::read_to_string(&paths.csv).unwrap(), "ADM2_EN,count\nKampala,5\n");
        assert!(!dir.join("counts_by_region.geojson.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_directory_is_a_write_error() {
        let base = scratch("blocked");
        std::fs::create_dir_all(&base).unwrap();
        let blocker = base.join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_artifacts(
            &blocker.join("out"),
            &[region("Kampala", 0.0)],
            &RegionCounts::default(),
            &[],
            None,
            &OPTIONS,
        )
        .unwrap_err();
        assert!(err.path.contains("not_a_dir"));
        assert!(matches!(err.source, WriteFailure::Io(_)));

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = scratch("partial");
        std::fs::create_dir_all(&dir).unwrap();
        let first = dir.join("first.csv");
        let path = dir.join("artifact.csv");

        let mut staged = Staged::default();
        staged
            .stage(&first, |out| {
                out.write_all(b"complete")?;
                Ok(())
            })
            .unwrap();
        let err = staged
            .stage(&path, |out| {
                out.write_all(b"half a row")?;
                Err(WriteFailure::Io(std::io::Error::other("boom")))
            })
            .unwrap_err();
        drop(staged);

        assert!(err.to_string().contains("boom"));
        assert!(!path.exists());
        assert!(!first.exists());
        assert!(no_tmp_files(&dir));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
