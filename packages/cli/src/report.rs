//! Terminal output for run summaries and area listings.

use livability_ingest::ResolvedColumns;
use livability_pipeline::PipelineReport;
use livability_spatial::area::RegionArea;

/// Prints the run summary followed by the `top` regions by count.
pub fn print_run(report: &PipelineReport, top: usize) {
    println!();
    println!("Dataset:    {}", report.dataset_name);
    println!("Boundaries: {} ({})", report.counts.len(), report.source_crs);
    println!(
        "Points:     {} ({} matched, {} unmatched, {} skipped)",
        report.points, report.matched, report.unmatched, report.skipped
    );
    println!("Output:     {}", report.outputs.dir.display());
    println!();

    let ranked = report.counts.top(top);
    if ranked.is_empty() {
        println!("No regions.");
        return;
    }

    println!("{:<32} {:>8}", "REGION", "COUNT");
    println!("{}", "-".repeat(41));
    for (region_id, count) in ranked {
        println!("{region_id:<32} {count:>8}");
    }
}

/// Prints regions with their areas, in the order given.
pub fn print_areas(title: &str, areas: &[RegionArea]) {
    println!();
    println!("{title}");
    println!("{:<32} {:>12}", "REGION", "AREA (km²)");
    println!("{}", "-".repeat(45));
    for area in areas {
        println!("{:<32} {:>12.1}", area.region_id, area.area_km2);
    }
}

/// Prints a point source header and the columns bound to each role.
pub fn print_columns(header: &[String], columns: &ResolvedColumns) {
    println!("Columns: {}", header.join(", "));
    println!("  longitude -> {}", columns.longitude.name);
    println!("  latitude  -> {}", columns.latitude.name);
    println!(
        "  label     -> {}",
        columns.label.as_ref().map_or("(none)", |c| c.name.as_str())
    );
}
