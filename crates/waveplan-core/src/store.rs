//! In-memory store implementing the repository contracts.
//!
//! Backs the CLI and the test suites. A relational implementation would live
//! behind the same traits; the engine never sees the difference.

use crate::{
    Configuration, ConfigurationRepository, Developer, DeveloperRepository, Feature,
    FeatureRepository, PlanError, Story, StoryRepository,
};
use std::collections::BTreeMap;

/// All four repositories over plain maps.
///
/// Stories keep insertion order; `find_all` resolves each story's wave from
/// its feature so the engine never needs the feature back-reference.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    stories: Vec<Story>,
    developers: BTreeMap<String, Developer>,
    features: BTreeMap<String, Feature>,
    configuration: Configuration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from already-validated collections.
    pub fn with_data(
        stories: Vec<Story>,
        developers: Vec<Developer>,
        features: Vec<Feature>,
        configuration: Configuration,
    ) -> Result<Self, PlanError> {
        let mut store = Self {
            configuration,
            ..Self::default()
        };
        for feature in features {
            store.save_feature(feature)?;
        }
        for developer in developers {
            DeveloperRepository::save(&mut store, developer)?;
        }
        for story in stories {
            StoryRepository::save(&mut store, story)?;
        }
        Ok(store)
    }

    fn resolve_wave(&self, story: &mut Story) {
        story.wave = story
            .feature_id
            .as_deref()
            .and_then(|fid| self.features.get(fid))
            .map_or(0, |f| f.wave);
    }

    fn save_feature(&mut self, feature: Feature) -> Result<(), PlanError> {
        feature.validate()?;
        if let Some(existing) = self
            .features
            .values()
            .find(|f| f.wave == feature.wave && f.id != feature.id)
        {
            return Err(PlanError::DuplicateWave {
                wave: feature.wave,
                existing_name: existing.name.clone(),
            });
        }
        self.features.insert(feature.id.clone(), feature);
        Ok(())
    }
}

impl StoryRepository for MemoryStore {
    fn find_all(&self) -> Result<Vec<Story>, PlanError> {
        let mut stories = self.stories.clone();
        for story in &mut stories {
            self.resolve_wave(story);
        }
        Ok(stories)
    }

    fn find_by_id(&self, id: &str) -> Result<Story, PlanError> {
        let mut story = self
            .stories
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| PlanError::StoryNotFound(id.to_string()))?;
        self.resolve_wave(&mut story);
        Ok(story)
    }

    fn save(&mut self, story: Story) -> Result<(), PlanError> {
        story.validate()?;
        if let Some(fid) = story.feature_id.as_deref() {
            if !self.features.contains_key(fid) {
                return Err(PlanError::FeatureNotFound(fid.to_string()));
            }
        }
        match self.stories.iter_mut().find(|s| s.id == story.id) {
            Some(slot) => *slot = story,
            None => self.stories.push(story),
        }
        Ok(())
    }

    fn save_batch(&mut self, stories: Vec<Story>) -> Result<(), PlanError> {
        // All-or-nothing: validate everything before touching the store.
        for story in &stories {
            story.validate()?;
            if let Some(fid) = story.feature_id.as_deref() {
                if !self.features.contains_key(fid) {
                    return Err(PlanError::FeatureNotFound(fid.to_string()));
                }
            }
        }
        for story in stories {
            match self.stories.iter_mut().find(|s| s.id == story.id) {
                Some(slot) => *slot = story,
                None => self.stories.push(story),
            }
        }
        Ok(())
    }
}

impl DeveloperRepository for MemoryStore {
    fn find_all(&self) -> Result<Vec<Developer>, PlanError> {
        Ok(self.developers.values().cloned().collect())
    }

    fn find_by_id(&self, id: &str) -> Result<Developer, PlanError> {
        self.developers
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::DeveloperNotFound(id.to_string()))
    }

    fn save(&mut self, developer: Developer) -> Result<(), PlanError> {
        developer.validate()?;
        self.developers.insert(developer.id.clone(), developer);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), PlanError> {
        self.developers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PlanError::DeveloperNotFound(id.to_string()))
    }
}

impl FeatureRepository for MemoryStore {
    fn find_all(&self) -> Result<Vec<Feature>, PlanError> {
        Ok(self.features.values().cloned().collect())
    }

    fn find_by_id(&self, id: &str) -> Result<Feature, PlanError> {
        self.features
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::FeatureNotFound(id.to_string()))
    }

    fn find_by_wave(&self, wave: u32) -> Result<Option<Feature>, PlanError> {
        Ok(self.features.values().find(|f| f.wave == wave).cloned())
    }

    fn exists(&self, id: &str) -> Result<bool, PlanError> {
        Ok(self.features.contains_key(id))
    }

    fn wave_exists(&self, wave: u32) -> Result<bool, PlanError> {
        Ok(self.features.values().any(|f| f.wave == wave))
    }

    fn count_stories_by_feature(&self, id: &str) -> Result<usize, PlanError> {
        Ok(self
            .stories
            .iter()
            .filter(|s| s.feature_id.as_deref() == Some(id))
            .count())
    }

    fn save(&mut self, feature: Feature) -> Result<(), PlanError> {
        self.save_feature(feature)
    }

    fn delete(&mut self, id: &str) -> Result<(), PlanError> {
        let feature = self
            .features
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::FeatureNotFound(id.to_string()))?;
        let count = self.count_stories_by_feature(id)?;
        if count > 0 {
            return Err(PlanError::FeatureHasStories {
                id: feature.id,
                name: feature.name,
                count,
            });
        }
        self.features.remove(id);
        Ok(())
    }
}

impl ConfigurationRepository for MemoryStore {
    fn get(&self) -> Result<Configuration, PlanError> {
        Ok(self.configuration.clone())
    }

    fn save(&mut self, configuration: Configuration) -> Result<(), PlanError> {
        configuration.validate()?;
        self.configuration = configuration;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn find_all_resolves_waves() {
        let mut store = MemoryStore::new();
        FeatureRepository::save(&mut store, Feature::new("F1", "Search", 2)).unwrap();
        StoryRepository::save(
            &mut store,
            Story::new("A", "core", "Story A").feature("F1", 0),
        )
        .unwrap();
        StoryRepository::save(&mut store, Story::new("B", "core", "Story B")).unwrap();

        let stories = StoryRepository::find_all(&store).unwrap();
        assert_eq!(stories[0].wave, 2);
        assert_eq!(stories[1].wave, 0);
    }

    #[test]
    fn duplicate_wave_is_rejected() {
        let mut store = MemoryStore::new();
        FeatureRepository::save(&mut store, Feature::new("F1", "Search", 1)).unwrap();
        let err = FeatureRepository::save(&mut store, Feature::new("F2", "Billing", 1));
        assert_eq!(
            err,
            Err(PlanError::DuplicateWave {
                wave: 1,
                existing_name: "Search".into()
            })
        );
    }

    #[test]
    fn feature_wave_can_be_updated_in_place() {
        let mut store = MemoryStore::new();
        FeatureRepository::save(&mut store, Feature::new("F1", "Search", 1)).unwrap();
        // Same feature, new wave: not a duplicate of itself
        FeatureRepository::save(&mut store, Feature::new("F1", "Search", 3)).unwrap();
        assert_eq!(store.find_by_wave(3).unwrap().unwrap().id, "F1");
    }

    #[test]
    fn feature_with_stories_cannot_be_deleted() {
        let mut store = MemoryStore::new();
        FeatureRepository::save(&mut store, Feature::new("F1", "Search", 1)).unwrap();
        StoryRepository::save(
            &mut store,
            Story::new("A", "core", "Story A").feature("F1", 0),
        )
        .unwrap();

        let err = FeatureRepository::delete(&mut store, "F1");
        assert_eq!(
            err,
            Err(PlanError::FeatureHasStories {
                id: "F1".into(),
                name: "Search".into(),
                count: 1
            })
        );
    }

    #[test]
    fn story_with_unknown_feature_is_rejected() {
        let mut store = MemoryStore::new();
        let err = StoryRepository::save(
            &mut store,
            Story::new("A", "core", "Story A").feature("NOPE", 0),
        );
        assert_eq!(err, Err(PlanError::FeatureNotFound("NOPE".into())));
    }

    #[test]
    fn save_batch_upserts() {
        let mut store = MemoryStore::new();
        StoryRepository::save(&mut store, Story::new("A", "core", "Old name")).unwrap();
        StoryRepository::save_batch(
            &mut store,
            vec![
                Story::new("A", "core", "New name"),
                Story::new("B", "core", "Fresh"),
            ],
        )
        .unwrap();

        assert_eq!(
            StoryRepository::find_by_id(&store, "A").unwrap().name,
            "New name"
        );
        assert_eq!(StoryRepository::find_all(&store).unwrap().len(), 2);
    }

    #[test]
    fn missing_lookups_report_ids() {
        let store = MemoryStore::new();
        assert_eq!(
            StoryRepository::find_by_id(&store, "X"),
            Err(PlanError::StoryNotFound("X".into()))
        );
        assert_eq!(
            DeveloperRepository::find_by_id(&store, "d"),
            Err(PlanError::DeveloperNotFound("d".into()))
        );
        assert_eq!(
            FeatureRepository::find_by_id(&store, "F"),
            Err(PlanError::FeatureNotFound("F".into()))
        );
    }
}
