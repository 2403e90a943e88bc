//! Backlog export.
//!
//! Thirteen columns, one row per story sorted by priority:
//!
//! ```text
//! | Prioridade | Feature | Onda | ID | Component | Nome | Status |
//! | Desenvolvedor | Dependências | SP | Início | Fim | Duração |
//! ```
//!
//! Dates are `dd/mm/yyyy`; dependencies are joined by `", "`. The same
//! rows can be written as an XLSX workbook or a CSV file.

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use waveplan_core::{Developer, Feature, Story};

use crate::IoError;

pub const EXPORT_COLUMNS: [&str; 13] = [
    "Prioridade",
    "Feature",
    "Onda",
    "ID",
    "Component",
    "Nome",
    "Status",
    "Desenvolvedor",
    "Dependências",
    "SP",
    "Início",
    "Fim",
    "Duração",
];

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// Build the export rows, sorted by priority.
pub fn export_rows(
    stories: &[Story],
    features: &[Feature],
    developers: &[Developer],
) -> Vec<[String; 13]> {
    let feature_names: HashMap<&str, &str> = features
        .iter()
        .map(|f| (f.id.as_str(), f.name.as_str()))
        .collect();
    let developer_names: HashMap<&str, &str> = developers
        .iter()
        .map(|d| (d.id.as_str(), d.name.as_str()))
        .collect();

    let mut sorted: Vec<&Story> = stories.iter().collect();
    sorted.sort_by_key(|s| s.priority);

    sorted
        .iter()
        .map(|story| {
            let feature = story
                .feature_id
                .as_deref()
                .map(|fid| feature_names.get(fid).copied().unwrap_or(fid))
                .unwrap_or_default();
            let developer = story
                .developer_id
                .as_deref()
                .map(|did| developer_names.get(did).copied().unwrap_or(did))
                .unwrap_or_default();
            let wave = if story.feature_id.is_some() {
                story.wave.to_string()
            } else {
                String::new()
            };

            [
                story.priority.to_string(),
                feature.to_string(),
                wave,
                story.id.clone(),
                story.component.clone(),
                story.name.clone(),
                story.status.to_string(),
                developer.to_string(),
                story.dependencies.join(", "),
                story
                    .story_point
                    .map(|sp| sp.value().to_string())
                    .unwrap_or_default(),
                format_date(story.start_date),
                format_date(story.end_date),
                story.duration.map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect()
}

/// Write the backlog as an XLSX workbook.
pub fn write_xlsx(
    path: &Path,
    stories: &[Story],
    features: &[Feature],
    developers: &[Developer],
) -> Result<(), IoError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Backlog")?;

    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_background_color(0x4472C4)
        .set_font_color(0xFFFFFF)
        .set_border(FormatBorder::Thin);
    let text = Format::new().set_border(FormatBorder::Thin);

    for (col, title) in EXPORT_COLUMNS.iter().enumerate() {
        sheet.write_with_format(0, col as u16, *title, &header)?;
    }

    for (row, values) in export_rows(stories, features, developers).iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            sheet.write_with_format(row as u32 + 1, col as u16, value.as_str(), &text)?;
        }
    }

    // Id and name columns get room to breathe
    sheet.set_column_width(1, 20).ok();
    sheet.set_column_width(3, 10).ok();
    sheet.set_column_width(4, 14).ok();
    sheet.set_column_width(5, 40).ok();
    sheet.set_column_width(7, 16).ok();
    sheet.set_column_width(8, 20).ok();
    sheet.set_freeze_panes(1, 0)?;

    workbook.save(path)?;
    info!(stories = stories.len(), path = %path.display(), "backlog exported");
    Ok(())
}

/// Write the backlog as CSV with the same column layout.
pub fn write_csv(
    path: &Path,
    stories: &[Story],
    features: &[Feature],
    developers: &[Developer],
) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(EXPORT_COLUMNS)?;
    for row in export_rows(stories, features, developers) {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    info!(stories = stories.len(), path = %path.display(), "backlog exported");
    Ok(())
}
