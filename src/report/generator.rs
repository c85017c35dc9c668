//! Markdown and JSON rendering of dashboard reports.

use crate::analysis::{StatsRow, TimeSeriesPoint};
use crate::legend::{LegendDetail, LegendEntry};
use crate::models::PlaceField;
use crate::report::{AreaValue, DashboardReport, ReportMetadata};
use crate::store::LayerStatus;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &DashboardReport) -> String {
    let mut output = String::new();

    output.push_str("# Mapboard Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_legend_section(&report.legend));
    output.push_str(&generate_areas_section(report));

    if let Some(ref table) = report.table {
        output.push_str(&generate_table_section(table, &report.attributes, report.unit.as_deref()));
    }
    if let Some(ref series) = report.time_series {
        output.push_str(&generate_time_series_section(series, &report.attributes));
    }

    output.push_str(&generate_footer());
    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## View\n\n");
    section.push_str(&format!("- **Share Link:** <{}>\n", metadata.share_link));
    let layers = if metadata.layers.is_empty() {
        "none"
    } else {
        metadata.layers.as_str()
    };
    section.push_str(&format!("- **Layers:** `{}`\n", layers));
    if !metadata.province.is_empty() {
        section.push_str(&format!("- **Province:** {}\n", metadata.province));
    }
    if !metadata.area_council.is_empty() {
        section.push_str(&format!("- **Area Council:** {}\n", metadata.area_council));
    }
    section.push_str(&format!("- **Year:** {}\n", metadata.year));
    section.push_str(&format!("- **Data Source:** {}\n", metadata.data_source));
    section.push_str(&format!("- **Observations:** {}\n", metadata.observation_count));
    section.push_str(&format!(
        "- **Generated:** {}\n\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    section
}

fn generate_legend_section(legend: &[LegendEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Legend\n\n");
    if legend.is_empty() {
        section.push_str("No layer metadata loaded.\n\n");
        return section;
    }

    section.push_str("| Layer | Name | Unit | Details | Status |\n");
    section.push_str("|:---|:---|:---:|:---|:---|\n");
    for entry in legend {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            entry.layer,
            entry.name,
            entry.unit.as_deref().unwrap_or("-"),
            describe_detail(&entry.detail),
            describe_status(&entry.status),
        ));
    }
    section.push('\n');

    section
}

fn describe_detail(detail: &LegendDetail) -> String {
    match detail {
        LegendDetail::Tabular {
            color_scheme,
            data_range: Some(range),
        } => format!("{} {} to {}", color_scheme, format_value(range.min), format_value(range.max)),
        LegendDetail::Tabular { .. } => "no data".to_string(),
        LegendDetail::Vector {
            geometry_type,
            color,
        } => format!("{:?} {}", geometry_type, color),
        LegendDetail::Raster { opacity } => format!("opacity {:.0}%", opacity * 100.0),
        LegendDetail::TiledVector { color, .. } => format!("tiles {}", color),
    }
}

fn describe_status(status: &LayerStatus) -> String {
    match status {
        LayerStatus::Loading => "loading".to_string(),
        LayerStatus::Ready => "ready".to_string(),
        LayerStatus::Failed(message) => format!("failed: {}", message),
    }
}

fn generate_areas_section(report: &DashboardReport) -> String {
    let mut section = String::new();

    let heading = match report.place_field {
        PlaceField::Province => "Provinces",
        PlaceField::AreaCouncil => "Area Councils",
    };
    section.push_str(&format!("## {}\n\n", heading));

    match report.value_range {
        Some(range) => section.push_str(&format!(
            "Values range from **{}** to **{}**.\n\n",
            format_value(range.min),
            format_value(range.max)
        )),
        None => {
            section.push_str("No values for the selected year.\n\n");
            return section;
        }
    }

    let mut areas: Vec<&AreaValue> = report.areas.iter().collect();
    areas.sort_by(|a, b| b.value.total_cmp(&a.value));

    section.push_str("| Area | Value |\n");
    section.push_str("|:---|---:|\n");
    for area in areas {
        section.push_str(&format!("| {} | {} |\n", area.name, format_value(area.value)));
    }
    section.push('\n');

    section
}

fn generate_table_section(rows: &[StatsRow], attributes: &[String], unit: Option<&str>) -> String {
    let mut section = String::new();

    section.push_str("## Statistics\n\n");
    if rows.is_empty() {
        section.push_str("No observations for the selected year.\n\n");
        return section;
    }
    if let Some(unit) = unit {
        section.push_str(&format!("*Unit: {}*\n\n", unit));
    }

    section.push_str(&format!("| Place | {} |\n", attributes.join(" | ")));
    section.push_str(&format!("|:---|{}\n", "---:|".repeat(attributes.len())));
    for row in rows {
        let cells: Vec<String> = attributes
            .iter()
            .map(|a| format_value(row.get(a).unwrap_or(0.0)))
            .collect();
        section.push_str(&format!("| {} | {} |\n", row.place, cells.join(" | ")));
    }
    section.push('\n');

    section
}

fn generate_time_series_section(series: &[TimeSeriesPoint], attributes: &[String]) -> String {
    let mut section = String::new();

    section.push_str("## Time Series\n\n");
    if series.is_empty() {
        section.push_str("No observations.\n\n");
        return section;
    }

    section.push_str(&format!("| Period | {} |\n", attributes.join(" | ")));
    section.push_str(&format!("|:---|{}\n", "---:|".repeat(attributes.len())));
    for point in series {
        let period = point.month.as_deref().unwrap_or(&point.year);
        let cells: Vec<String> = attributes
            .iter()
            .map(|a| format_value(point.get(a).unwrap_or(0.0)))
            .collect();
        section.push_str(&format!("| {} | {} |\n", period, cells.join(" | ")));
    }
    section.push('\n');

    section
}

/// Integers without decimals, everything else with two.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn generate_footer() -> String {
    "---\n\n*Report generated by mapboard*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
