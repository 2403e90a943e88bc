//! JSON project files.
//!
//! One document carries the whole planning state: configuration,
//! developers, features and stories. Loading validates every record,
//! rejects duplicate waves and resolves each story's `wave` from its
//! feature, so downstream code can trust the records.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};
use waveplan_core::{Configuration, Developer, Feature, PlanError, Story};

use crate::import::{Field, ImportOutcome};
use crate::IoError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub configuration: Configuration,
    #[serde(default)]
    pub developers: Vec<Developer>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub stories: Vec<Story>,
}

impl ProjectFile {
    /// Read, validate and resolve a project file.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let text = std::fs::read_to_string(path)?;
        let mut project: ProjectFile = serde_json::from_str(&text)?;
        project.resolve()?;
        info!(
            stories = project.stories.len(),
            developers = project.developers.len(),
            features = project.features.len(),
            "project loaded"
        );
        Ok(project)
    }

    /// Write the project file, pretty-printed.
    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Validate all records, enforce one-feature-per-wave and fill each
    /// story's `wave` from its feature.
    pub fn resolve(&mut self) -> Result<(), PlanError> {
        self.configuration.validate()?;
        for developer in &self.developers {
            developer.validate()?;
        }

        let mut wave_owner: HashMap<u32, &str> = HashMap::new();
        for feature in &self.features {
            feature.validate()?;
            if let Some(existing) = wave_owner.insert(feature.wave, feature.name.as_str()) {
                return Err(PlanError::DuplicateWave {
                    wave: feature.wave,
                    existing_name: existing.to_string(),
                });
            }
        }

        let wave_by_feature: HashMap<&str, u32> = self
            .features
            .iter()
            .map(|f| (f.id.as_str(), f.wave))
            .collect();
        for story in &mut self.stories {
            story.validate()?;
            story.wave = match story.feature_id.as_deref() {
                None => 0,
                Some(fid) => *wave_by_feature
                    .get(fid)
                    .ok_or_else(|| PlanError::FeatureNotFound(fid.to_string()))?,
            };
        }
        Ok(())
    }

    pub fn story_ids(&self) -> HashSet<String> {
        self.stories.iter().map(|s| s.id.clone()).collect()
    }

    /// Merge an import outcome into the project.
    ///
    /// Features are upserted by name (a wave collision shifts the new
    /// feature to the next free wave); developers are upserted by name;
    /// stories are inserted, or merged when the id already exists: only
    /// columns present in the sheet overwrite, and computed fields
    /// (dates, duration) are always preserved.
    pub fn merge_import(&mut self, outcome: &ImportOutcome) -> Result<(), PlanError> {
        for record in &outcome.records {
            let feature_id = record
                .feature_name
                .as_deref()
                .map(|name| self.upsert_feature(name, record.wave.unwrap_or(1)))
                .transpose()?;
            let developer_id = record
                .developer
                .as_deref()
                .map(|name| self.upsert_developer(name))
                .transpose()?;

            match self.stories.iter_mut().find(|s| s.id == record.id) {
                None => {
                    let mut story = Story::new(&record.id, &record.component, &record.name);
                    story.story_point = record.story_point;
                    story.status = record.status;
                    story.priority = record.priority;
                    story.developer_id = developer_id;
                    story.feature_id = feature_id;
                    story.dependencies = record.dependencies.clone();
                    self.stories.push(story);
                }
                Some(existing) => {
                    let present = |field: Field| outcome.columns_present.contains(&field);
                    existing.component = record.component.clone();
                    existing.name = record.name.clone();
                    if present(Field::StoryPoint) {
                        existing.story_point = record.story_point;
                    }
                    if present(Field::Status) {
                        existing.status = record.status;
                    }
                    if present(Field::Priority) {
                        existing.priority = record.priority;
                    }
                    if present(Field::Developer) {
                        existing.developer_id = developer_id;
                    }
                    if present(Field::Feature) {
                        existing.feature_id = feature_id;
                    }
                    if present(Field::Deps) {
                        existing.dependencies = record.dependencies.clone();
                    }
                    // start_date, end_date and duration survive the merge
                }
            }
        }
        self.resolve()
    }

    /// Find a feature by name (case-insensitive) or create one, shifting
    /// to the next free wave when the requested one is taken.
    fn upsert_feature(&mut self, name: &str, wave: u32) -> Result<String, PlanError> {
        if let Some(existing) = self
            .features
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            return Ok(existing.id.clone());
        }

        let taken: HashSet<u32> = self.features.iter().map(|f| f.wave).collect();
        let mut wave = wave.max(1);
        if taken.contains(&wave) {
            let requested = wave;
            while taken.contains(&wave) {
                wave += 1;
            }
            warn!(feature = name, requested, assigned = wave, "wave taken, shifted");
        }

        let id = self.next_feature_id(name);
        let feature = Feature::new(id.clone(), name, wave);
        feature.validate()?;
        info!(feature = name, wave, "feature created");
        self.features.push(feature);
        Ok(id)
    }

    /// Ids are the first three letters, upper-cased, with a counter on
    /// collision.
    fn next_feature_id(&self, name: &str) -> String {
        let base: String = name.chars().take(3).collect::<String>().to_uppercase();
        let exists = |id: &str| self.features.iter().any(|f| f.id == id);
        if !exists(&base) {
            return base;
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{base}{counter}");
            if !exists(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Find a developer by name (case-insensitive) or create one keyed by
    /// the name itself.
    fn upsert_developer(&mut self, name: &str) -> Result<String, PlanError> {
        if let Some(existing) = self
            .developers
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
        {
            return Ok(existing.id.clone());
        }
        let developer = Developer::new(name, name);
        developer.validate()?;
        info!(developer = name, "developer created");
        self.developers.push(developer.clone());
        Ok(developer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import_rows;
    use pretty_assertions::assert_eq;
    use waveplan_core::StoryPoint;

    fn outcome_from(text: &str) -> ImportOutcome {
        let mut lines = text
            .trim()
            .lines()
            .map(|l| l.split(';').map(|c| c.trim().to_string()).collect::<Vec<_>>());
        let header = lines.next().unwrap();
        let rows: Vec<Vec<String>> = lines.collect();
        import_rows(&header, &rows, &HashSet::new()).unwrap()
    }

    #[test]
    fn resolve_fills_waves_from_features() {
        let mut project = ProjectFile {
            features: vec![Feature::new("F1", "Search", 2)],
            stories: vec![
                Story::new("A", "api", "With feature").feature("F1", 0),
                Story::new("B", "api", "Without"),
            ],
            developers: vec![Developer::new("d1", "Ana")],
            ..ProjectFile::default()
        };
        project.resolve().unwrap();
        assert_eq!(project.stories[0].wave, 2);
        assert_eq!(project.stories[1].wave, 0);
    }

    #[test]
    fn resolve_rejects_duplicate_waves() {
        let mut project = ProjectFile {
            features: vec![
                Feature::new("F1", "Search", 1),
                Feature::new("F2", "Billing", 1),
            ],
            ..ProjectFile::default()
        };
        let err = project.resolve().unwrap_err();
        assert!(matches!(err, PlanError::DuplicateWave { wave: 1, .. }));
    }

    #[test]
    fn resolve_rejects_unknown_feature_reference() {
        let mut project = ProjectFile {
            stories: vec![Story::new("A", "api", "Orphan").feature("NOPE", 0)],
            ..ProjectFile::default()
        };
        assert_eq!(
            project.resolve().unwrap_err(),
            PlanError::FeatureNotFound("NOPE".into())
        );
    }

    #[test]
    fn merge_creates_features_and_developers() {
        let mut project = ProjectFile::default();
        let outcome = outcome_from(
            "ID;Component;Nome;SP;Feature;Onda;Desenvolvedor\n\
             A;api;Login;5;Search;1;Ana\n\
             B;api;Browse;3;Search;1;Bruno",
        );
        project.merge_import(&outcome).unwrap();

        assert_eq!(project.features.len(), 1);
        assert_eq!(project.features[0].id, "SEA");
        assert_eq!(project.developers.len(), 2);
        assert_eq!(project.stories.len(), 2);
        assert_eq!(project.stories[0].wave, 1);
    }

    #[test]
    fn wave_collision_shifts_to_next_free_wave() {
        let mut project = ProjectFile {
            features: vec![Feature::new("F1", "Billing", 1)],
            ..ProjectFile::default()
        };
        let outcome = outcome_from("ID;Component;Nome;SP;Feature;Onda\nA;api;Login;5;Search;1");
        project.merge_import(&outcome).unwrap();

        let search = project
            .features
            .iter()
            .find(|f| f.name == "Search")
            .unwrap();
        assert_eq!(search.wave, 2);
    }

    #[test]
    fn merge_preserves_computed_fields_on_existing_stories() {
        let start = chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        let mut project = ProjectFile {
            developers: vec![Developer::new("ana", "Ana")],
            stories: vec![Story::new("A", "api", "Old name")
                .story_point(StoryPoint::new(5).unwrap())
                .developer("ana")
                .scheduled(start, end, 4)],
            ..ProjectFile::default()
        };

        // No developer or status columns: those survive; name and SP update,
        // and the computed dates are never touched
        let outcome = outcome_from("ID;Component;Nome;SP\nA;api;New name;8");
        project.merge_import(&outcome).unwrap();

        let story = &project.stories[0];
        assert_eq!(story.name, "New name");
        assert_eq!(story.story_point.unwrap().value(), 8);
        assert_eq!(story.developer_id.as_deref(), Some("ana"));
        assert_eq!(story.start_date, Some(start));
        assert_eq!(story.duration, Some(4));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");

        let mut project = ProjectFile {
            features: vec![Feature::new("F1", "Search", 1)],
            developers: vec![Developer::new("d1", "Ana")],
            stories: vec![Story::new("A", "api", "Login")
                .story_point(StoryPoint::new(5).unwrap())
                .feature("F1", 0)],
            ..ProjectFile::default()
        };
        project.resolve().unwrap();
        project.save(&path).unwrap();

        let loaded = ProjectFile::load(&path).unwrap();
        assert_eq!(loaded.stories[0].wave, 1);
        assert_eq!(loaded.developers[0].name, "Ana");
    }
}
