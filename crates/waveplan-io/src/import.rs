//! Tabular backlog import.
//!
//! Accepts a header row plus data rows (the CSV adapter below, or any
//! spreadsheet reader the caller brings) and turns them into validated
//! import records in four phases:
//!
//! 1. Row extraction: flexible column aliases, per-row validation, id
//!    generation for blank ids
//! 2. Duplicate detection: every row of a duplicated id is dropped
//! 3. Dependency resolution against the sheet and the existing store;
//!    unknown and self references are stripped
//! 4. Sequential priorities when the sheet has no priority column

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};
use waveplan_core::{StoryPoint, StoryStatus};

use crate::IoError;

/// Normalized sheet columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Id,
    Component,
    Name,
    StoryPoint,
    Deps,
    Status,
    Developer,
    Priority,
    Feature,
    Wave,
}

impl Field {
    /// Case-insensitive header aliases.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Id => &["id"],
            Field::Component => &["component"],
            Field::Name => &["nome", "name"],
            Field::StoryPoint => &["storypoint", "sp"],
            Field::Deps => &["deps", "dependencias", "dependências"],
            Field::Status => &["status"],
            Field::Developer => &["desenvolvedor", "developer", "developer_id"],
            Field::Priority => &["prioridade", "priority"],
            Field::Feature => &["feature"],
            Field::Wave => &["onda", "wave"],
        }
    }

    const ALL: [Field; 10] = [
        Field::Id,
        Field::Component,
        Field::Name,
        Field::StoryPoint,
        Field::Deps,
        Field::Status,
        Field::Developer,
        Field::Priority,
        Field::Feature,
        Field::Wave,
    ];
}

/// One validated row, not yet a domain entity: feature and developer
/// references are still names to be upserted by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedStory {
    pub id: String,
    pub component: String,
    pub name: String,
    pub story_point: Option<StoryPoint>,
    pub status: StoryStatus,
    pub priority: u32,
    pub developer: Option<String>,
    pub dependencies: Vec<String>,
    pub feature_name: Option<String>,
    pub wave: Option<u32>,
}

/// Import counters and free-form row warnings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub total_processed: usize,
    pub total_imported: usize,
    pub skipped_duplicates: usize,
    pub skipped_invalid: usize,
    pub dependencies_dropped: usize,
    pub warnings: Vec<String>,
}

/// Everything the import produces.
#[derive(Clone, Debug)]
pub struct ImportOutcome {
    pub records: Vec<ImportedStory>,
    pub stats: ImportStats,
    /// Columns present in the sheet; absent columns must not overwrite
    /// existing data on merge.
    pub columns_present: HashSet<Field>,
}

fn detect_columns(header: &[String]) -> HashMap<Field, usize> {
    let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    let mut map = HashMap::new();
    for field in Field::ALL {
        for (idx, cell) in normalized.iter().enumerate() {
            if field.aliases().contains(&cell.as_str()) {
                map.entry(field).or_insert(idx);
            }
        }
    }
    map
}

fn cell<'a>(row: &'a [String], columns: &HashMap<Field, usize>, field: Field) -> Option<&'a str> {
    let idx = *columns.get(&field)?;
    let value = row.get(idx)?.trim();
    (!value.is_empty()).then_some(value)
}

/// Import a header + rows table.
///
/// `existing_ids` are story ids already in the store; dependencies may
/// reference them in addition to the sheet itself.
pub fn import_rows(
    header: &[String],
    rows: &[Vec<String>],
    existing_ids: &HashSet<String>,
) -> Result<ImportOutcome, IoError> {
    let columns = detect_columns(header);
    for required in [Field::Component, Field::Name, Field::StoryPoint] {
        if !columns.contains_key(&required) {
            return Err(IoError::MissingColumn(format!("{required:?}")));
        }
    }
    let columns_present: HashSet<Field> = columns.keys().copied().collect();

    let mut stats = ImportStats::default();
    let mut staged: Vec<(ImportedStory, usize, Option<String>)> = Vec::new();
    let mut id_counts: HashMap<String, usize> = HashMap::new();
    let mut generated_id_counter = 1;

    // Phase 1: extraction and per-row validation
    for (offset, row) in rows.iter().enumerate() {
        let row_number = offset + 2; // header is row 1
        stats.total_processed += 1;

        let Some(component) = cell(row, &columns, Field::Component) else {
            stats.skipped_invalid += 1;
            stats
                .warnings
                .push(format!("row {row_number}: empty component, row skipped"));
            continue;
        };
        let Some(name) = cell(row, &columns, Field::Name) else {
            stats.skipped_invalid += 1;
            stats
                .warnings
                .push(format!("row {row_number}: empty name, row skipped"));
            continue;
        };

        let id = match cell(row, &columns, Field::Id) {
            Some(id) => id.to_string(),
            None => {
                let id = format!("US-{generated_id_counter:03}");
                generated_id_counter += 1;
                id
            }
        };
        *id_counts.entry(id.clone()).or_insert(0) += 1;

        let story_point = match cell(row, &columns, Field::StoryPoint) {
            None => None,
            Some(raw) => match raw.parse::<u32>().ok().and_then(|v| StoryPoint::new(v).ok()) {
                Some(sp) => Some(sp),
                None => {
                    stats.skipped_invalid += 1;
                    stats.warnings.push(format!(
                        "row {row_number}: invalid story point '{raw}', row skipped"
                    ));
                    continue;
                }
            },
        };

        let status = match cell(row, &columns, Field::Status) {
            None => StoryStatus::Backlog,
            Some(raw) => StoryStatus::parse(raw).unwrap_or_else(|_| {
                stats.warnings.push(format!(
                    "row {row_number}: invalid status '{raw}', using BACKLOG"
                ));
                StoryStatus::Backlog
            }),
        };

        let developer = cell(row, &columns, Field::Developer).map(str::to_string);
        let priority = cell(row, &columns, Field::Priority)
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|&p| p >= 0)
            .map_or(0, |p| p as u32);
        let feature_name = cell(row, &columns, Field::Feature).map(str::to_string);
        let wave = cell(row, &columns, Field::Wave)
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|&w| w > 0)
            .map(|w| w as u32);

        let deps_raw = cell(row, &columns, Field::Deps).map(str::to_string);

        staged.push((
            ImportedStory {
                id,
                component: component.to_string(),
                name: name.to_string(),
                story_point,
                status,
                priority,
                developer,
                dependencies: Vec::new(),
                feature_name,
                wave,
            },
            row_number,
            deps_raw,
        ));
    }
    debug!(staged = staged.len(), "rows extracted");

    // Phase 2: within-sheet duplicate ids drop every involved row
    let duplicated: HashSet<&String> = id_counts
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(id, _)| id)
        .collect();
    for id in &duplicated {
        let count = id_counts[*id];
        stats.skipped_duplicates += count;
        stats.warnings.push(format!(
            "id '{id}' duplicated in the sheet, {count} rows skipped"
        ));
    }

    // Phase 3: dependency resolution against the sheet and the store
    let sheet_ids: HashSet<String> = staged
        .iter()
        .filter(|(record, _, _)| !duplicated.contains(&record.id))
        .map(|(record, _, _)| record.id.clone())
        .collect();

    let mut records = Vec::new();
    for (mut record, row_number, deps_raw) in staged {
        if duplicated.contains(&record.id) {
            continue;
        }

        if let Some(raw) = deps_raw {
            for dep in raw.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                let known = dep != record.id
                    && (sheet_ids.contains(dep) || existing_ids.contains(dep));
                if known {
                    if !record.dependencies.iter().any(|d| d == dep) {
                        record.dependencies.push(dep.to_string());
                    }
                } else {
                    stats.dependencies_dropped += 1;
                    stats.warnings.push(format!(
                        "row {row_number}: dependency '{dep}' not found, removed from '{}'",
                        record.id
                    ));
                }
            }
        }

        records.push(record);
    }

    // Phase 4: sheet order becomes the priority when no column says otherwise
    if !columns_present.contains(&Field::Priority) {
        for (position, record) in records.iter_mut().enumerate() {
            record.priority = position as u32 + 1;
        }
    }

    stats.total_imported = records.len();
    info!(
        imported = stats.total_imported,
        duplicates = stats.skipped_duplicates,
        invalid = stats.skipped_invalid,
        dropped_deps = stats.dependencies_dropped,
        "import finished"
    );

    Ok(ImportOutcome {
        records,
        stats,
        columns_present,
    })
}

/// Read a CSV file into header + rows.
pub fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    if rows.is_empty() {
        return Err(IoError::MissingColumn("empty file".into()));
    }
    let header = rows.remove(0);
    Ok((header, rows))
}

/// Import a CSV backlog file.
pub fn import_csv(path: &Path, existing_ids: &HashSet<String>) -> Result<ImportOutcome, IoError> {
    let (header, rows) = read_csv(path)?;
    import_rows(&header, &rows, existing_ids)
}
