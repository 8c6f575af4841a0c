//! Point source schema resolution.
//!
//! Binds the longitude, latitude, and optional label roles to header
//! columns. Explicitly configured names must exist. Otherwise the header
//! is searched for well-known names, and as a last resort (when enabled)
//! a coordinate role is bound to the first column not already taken.

use livability_pipeline_models::{ColumnMapping, ColumnRole};

use crate::SchemaError;

/// Header names recognized as longitude, in priority order.
pub const LONGITUDE_CANDIDATES: &[&str] = &["lon", "longitude"];

/// Header names recognized as latitude, in priority order.
pub const LATITUDE_CANDIDATES: &[&str] = &["lat", "latitude"];

/// Header names recognized as the label.
pub const LABEL_CANDIDATES: &[&str] = &["name"];

/// A header column bound to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Header name.
    pub name: String,
    /// Zero-based position in the header.
    pub index: usize,
}

/// Column bindings for a point source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// Longitude column.
    pub longitude: ResolvedColumn,
    /// Latitude column.
    pub latitude: ResolvedColumn,
    /// Label column, if any.
    pub label: Option<ResolvedColumn>,
}

/// Resolves the point source columns from its header.
///
/// Matching is exact and case-sensitive. Detected and configured columns
/// are bound before any fallback, so the fallback never steals a column
/// another role matched by name.
///
/// # Errors
///
/// Returns [`SchemaError`] if the header is empty, a configured coordinate
/// column is absent, or a coordinate role stays unresolved.
pub fn resolve_columns(
    header: &[String],
    mapping: &ColumnMapping,
) -> Result<ResolvedColumns, SchemaError> {
    if header.is_empty() {
        return Err(SchemaError::EmptyHeader);
    }

    let longitude = match_role(
        header,
        ColumnRole::Longitude,
        mapping.longitude_column.as_deref(),
        LONGITUDE_CANDIDATES,
    )?;
    let latitude = match_role(
        header,
        ColumnRole::Latitude,
        mapping.latitude_column.as_deref(),
        LATITUDE_CANDIDATES,
    )?;

    let longitude = match longitude {
        Some(column) => column,
        None => fallback(
            header,
            ColumnRole::Longitude,
            mapping.first_column_fallback,
            latitude.as_ref().map(|c| c.index),
        )?,
    };
    let latitude = match latitude {
        Some(column) => column,
        None => fallback(
            header,
            ColumnRole::Latitude,
            mapping.first_column_fallback,
            Some(longitude.index),
        )?,
    };

    let label = resolve_label(header, mapping.label_column.as_deref());

    log::debug!(
        "Resolved point columns: longitude='{}', latitude='{}', label={:?}",
        longitude.name,
        latitude.name,
        label.as_ref().map(|c| c.name.as_str())
    );

    Ok(ResolvedColumns {
        longitude,
        latitude,
        label,
    })
}

fn find(header: &[String], name: &str) -> Option<ResolvedColumn> {
    header
        .iter()
        .position(|h| h == name)
        .map(|index| ResolvedColumn {
            name: name.to_string(),
            index,
        })
}

/// Binds a role by configuration or by well-known name.
fn match_role(
    header: &[String],
    role: ColumnRole,
    explicit: Option<&str>,
    candidates: &[&str],
) -> Result<Option<ResolvedColumn>, SchemaError> {
    if let Some(name) = explicit {
        return find(header, name)
            .map(Some)
            .ok_or_else(|| SchemaError::MissingColumn {
                role,
                column: name.to_string(),
                available: header.to_vec(),
            });
    }

    Ok(candidates.iter().find_map(|c| find(header, c)))
}

/// Binds a role to the first header column that is not `taken`.
fn fallback(
    header: &[String],
    role: ColumnRole,
    enabled: bool,
    taken: Option<usize>,
) -> Result<ResolvedColumn, SchemaError> {
    let unresolved = || SchemaError::Unresolved {
        role,
        available: header.to_vec(),
    };

    if !enabled {
        return Err(unresolved());
    }

    let index = (0..header.len())
        .find(|&i| Some(i) != taken)
        .ok_or_else(unresolved)?;

    log::warn!(
        "No {role} column found by name; falling back to column '{}' (disable with first_column_fallback = false)",
        header[index]
    );

    Ok(ResolvedColumn {
        name: header[index].clone(),
        index,
    })
}

/// Binds the optional label role. Never fails.
fn resolve_label(header: &[String], explicit: Option<&str>) -> Option<ResolvedColumn> {
    if let Some(name) = explicit {
        let column = find(header, name);
        if column.is_none() {
            log::warn!("Configured label column '{name}' not found; labels will be empty");
        }
        return column;
    }

    LABEL_CANDIDATES.iter().find_map(|c| find(header, c))
}
