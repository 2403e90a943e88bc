//! # waveplan-core
//!
//! Core domain model and traits for the waveplan backlog planning engine.
//!
//! This crate provides:
//! - Domain types: `Story`, `Developer`, `Feature`, `Configuration`
//! - Value objects: `StoryPoint`, `StoryStatus`, `AllocationCriteria`
//! - The business-day calendar
//! - Error, warning and metrics types
//! - Repository traits and an in-memory store
//!
//! ## Example
//!
//! ```rust
//! use waveplan_core::{Story, StoryPoint};
//!
//! let story = Story::new("US-001", "api", "Login endpoint")
//!     .story_point(StoryPoint::new(5).unwrap())
//!     .priority(0)
//!     .depends_on("US-000");
//!
//! assert_eq!(story.dependencies, vec!["US-000".to_string()]);
//! assert_eq!(story.wave, 0);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod calendar;
pub mod store;

pub use store::MemoryStore;

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for a story
pub type StoryId = String;

/// Unique identifier for a developer
pub type DeveloperId = String;

/// Unique identifier for a feature
pub type FeatureId = String;

// ============================================================================
// Value Objects
// ============================================================================

/// Effort estimate on the modified Fibonacci scale.
///
/// Only 3 (small), 5 (medium), 8 (large) and 13 (extra large) are legal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StoryPoint(u32);

impl StoryPoint {
    pub const VALID_VALUES: [u32; 4] = [3, 5, 8, 13];

    pub fn new(value: u32) -> Result<Self, PlanError> {
        if Self::VALID_VALUES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(PlanError::InvalidStoryPoint(value))
        }
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Build from a size label: P, M, G or GG.
    pub fn from_size_label(label: &str) -> Result<Self, PlanError> {
        match label.trim().to_uppercase().as_str() {
            "P" => Self::new(3),
            "M" => Self::new(5),
            "G" => Self::new(8),
            "GG" => Self::new(13),
            _ => Err(PlanError::Validation(format!(
                "invalid size label '{label}', expected P, M, G or GG"
            ))),
        }
    }
}

impl TryFrom<u32> for StoryPoint {
    type Error = PlanError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoryPoint> for u32 {
    fn from(sp: StoryPoint) -> Self {
        sp.0
    }
}

impl fmt::Display for StoryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a story.
///
/// Normal flow: BACKLOG -> EXECUÇÃO -> TESTES -> CONCLUÍDO.
/// Any state may transition to IMPEDIDO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryStatus {
    #[default]
    #[serde(rename = "BACKLOG")]
    Backlog,
    #[serde(rename = "EXECUÇÃO")]
    Execution,
    #[serde(rename = "TESTES")]
    Testing,
    #[serde(rename = "CONCLUÍDO")]
    Done,
    #[serde(rename = "IMPEDIDO")]
    Blocked,
}

impl StoryStatus {
    /// Parse from the wire form, case-insensitive; accents optional.
    pub fn parse(value: &str) -> Result<Self, PlanError> {
        match value.trim().to_uppercase().as_str() {
            "BACKLOG" => Ok(Self::Backlog),
            "EXECUÇÃO" | "EXECUCAO" => Ok(Self::Execution),
            "TESTES" => Ok(Self::Testing),
            "CONCLUÍDO" | "CONCLUIDO" => Ok(Self::Done),
            "IMPEDIDO" => Ok(Self::Blocked),
            _ => Err(PlanError::Validation(format!("invalid status '{value}'"))),
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoryStatus::Backlog => "BACKLOG",
            StoryStatus::Execution => "EXECUÇÃO",
            StoryStatus::Testing => "TESTES",
            StoryStatus::Done => "CONCLUÍDO",
            StoryStatus::Blocked => "IMPEDIDO",
        };
        write!(f, "{s}")
    }
}

/// Strategy used when picking a developer for a story.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationCriteria {
    /// Even out the number of stories per developer; random tie-break.
    #[default]
    #[serde(rename = "LOAD_BALANCING")]
    LoadBalancing,
    /// Prefer the developer who implemented the story's dependencies,
    /// falling back to load balancing.
    #[serde(rename = "DEPENDENCY_OWNER")]
    DependencyOwner,
}

impl AllocationCriteria {
    pub fn parse(value: &str) -> Result<Self, PlanError> {
        match value.trim().to_uppercase().replace(' ', "_").as_str() {
            "LOAD_BALANCING" => Ok(Self::LoadBalancing),
            "DEPENDENCY_OWNER" => Ok(Self::DependencyOwner),
            _ => Err(PlanError::Validation(format!(
                "invalid allocation criteria '{value}'"
            ))),
        }
    }
}

impl fmt::Display for AllocationCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AllocationCriteria::LoadBalancing => "LOAD_BALANCING",
            AllocationCriteria::DependencyOwner => "DEPENDENCY_OWNER",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Story
// ============================================================================

/// A unit of work in the backlog.
///
/// The planning engine mutates `developer_id`, `start_date`, `end_date`,
/// `duration` and `schedule_order` in place; everything else is caller data.
/// `wave` is resolved from the owning feature at load time (0 = no feature)
/// so the engine never has to chase a back-reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Story {
    /// Unique identifier
    pub id: StoryId,
    /// Functional grouping (e.g. "api", "ui")
    pub component: String,
    /// Human-readable name
    pub name: String,
    /// Effort estimate; may be absent right after import
    #[serde(default)]
    pub story_point: Option<StoryPoint>,
    /// Lifecycle status
    #[serde(default)]
    pub status: StoryStatus,
    /// Ordering priority; lower = more urgent
    #[serde(default)]
    pub priority: u32,
    /// Owning feature, if any
    #[serde(default)]
    pub feature_id: Option<FeatureId>,
    /// Assigned developer, if any
    #[serde(default)]
    pub developer_id: Option<DeveloperId>,
    /// Precedence edges: ids of stories that must finish first.
    /// Ordered, no duplicates, never contains this story's own id.
    #[serde(default)]
    pub dependencies: Vec<StoryId>,
    /// Planned first workday
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Planned last workday
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Duration in business days (>= 1 when set)
    #[serde(default)]
    pub duration: Option<u32>,
    /// Dense index into the priority-sorted backlog
    #[serde(default)]
    pub schedule_order: Option<u32>,
    /// Delivery wave inherited from the feature (0 = no feature)
    #[serde(default)]
    pub wave: u32,
}

impl Story {
    /// Create a new story with the given id, component and name.
    pub fn new(id: impl Into<String>, component: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            name: name.into(),
            story_point: None,
            status: StoryStatus::Backlog,
            priority: 0,
            feature_id: None,
            developer_id: None,
            dependencies: Vec::new(),
            start_date: None,
            end_date: None,
            duration: None,
            schedule_order: None,
            wave: 0,
        }
    }

    /// Set the story point estimate
    pub fn story_point(mut self, sp: StoryPoint) -> Self {
        self.story_point = Some(sp);
        self
    }

    /// Set the priority
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the lifecycle status
    pub fn status(mut self, status: StoryStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach to a feature delivered in the given wave
    pub fn feature(mut self, feature_id: impl Into<String>, wave: u32) -> Self {
        self.feature_id = Some(feature_id.into());
        self.wave = wave;
        self
    }

    /// Add a precedence edge (self-references are ignored)
    pub fn depends_on(mut self, story_id: impl Into<String>) -> Self {
        let story_id = story_id.into();
        self.add_dependency(&story_id);
        self
    }

    /// Pre-assign a developer
    pub fn developer(mut self, developer_id: impl Into<String>) -> Self {
        self.developer_id = Some(developer_id.into());
        self
    }

    /// Set the planned interval and duration
    pub fn scheduled(mut self, start: NaiveDate, end: NaiveDate, duration: u32) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self.duration = Some(duration);
        self
    }

    /// Add a dependency, preserving set semantics.
    pub fn add_dependency(&mut self, story_id: &str) {
        if story_id != self.id && !self.dependencies.iter().any(|d| d == story_id) {
            self.dependencies.push(story_id.to_string());
        }
    }

    /// Remove a dependency if present.
    pub fn remove_dependency(&mut self, story_id: &str) {
        self.dependencies.retain(|d| d != story_id);
    }

    pub fn has_dependency(&self, story_id: &str) -> bool {
        self.dependencies.iter().any(|d| d == story_id)
    }

    /// Assign a developer to this story.
    pub fn allocate_developer(&mut self, developer_id: &str) -> Result<(), PlanError> {
        if developer_id.trim().is_empty() {
            return Err(PlanError::Validation(
                "developer id must not be empty".into(),
            ));
        }
        self.developer_id = Some(developer_id.to_string());
        Ok(())
    }

    pub fn deallocate_developer(&mut self) {
        self.developer_id = None;
    }

    pub fn is_allocated(&self) -> bool {
        self.developer_id.is_some()
    }

    /// Check the record invariants.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.id.trim().is_empty() {
            return Err(PlanError::Validation("story id must not be empty".into()));
        }
        if self.component.trim().is_empty() {
            return Err(PlanError::Validation(format!(
                "story '{}': component must not be empty",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(PlanError::Validation(format!(
                "story '{}': name must not be empty",
                self.id
            )));
        }
        if self.dependencies.iter().any(|d| *d == self.id) {
            return Err(PlanError::Validation(format!(
                "story '{}' cannot depend on itself",
                self.id
            )));
        }
        if self.duration == Some(0) {
            return Err(PlanError::Validation(format!(
                "story '{}': duration must be at least 1 business day",
                self.id
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(PlanError::Validation(format!(
                    "story '{}': end date precedes start date",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

impl PartialEq for Story {
    /// Entity identity: stories are equal when their ids are equal.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Story {}

// ============================================================================
// Developer
// ============================================================================

/// Someone who can be assigned stories.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Developer {
    pub id: DeveloperId,
    pub name: String,
}

impl Developer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.id.trim().is_empty() {
            return Err(PlanError::Validation("developer id must not be empty".into()));
        }
        if self.name.trim().chars().count() < 2 {
            return Err(PlanError::Validation(format!(
                "developer '{}': name must have at least 2 characters",
                self.id
            )));
        }
        Ok(())
    }
}

impl PartialEq for Developer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Developer {}

// ============================================================================
// Feature
// ============================================================================

/// A feature groups stories into a delivery wave.
///
/// Waves are globally unique: one feature per wave. Lower wave = delivered
/// earlier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    pub wave: u32,
}

impl Feature {
    pub fn new(id: impl Into<String>, name: impl Into<String>, wave: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            wave,
        }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.id.trim().is_empty() {
            return Err(PlanError::Validation("feature id must not be empty".into()));
        }
        if self.name.trim().chars().count() < 3 {
            return Err(PlanError::Validation(format!(
                "feature '{}': name must have at least 3 characters",
                self.id
            )));
        }
        if self.wave == 0 {
            return Err(PlanError::Validation(format!(
                "feature '{}': wave must be a positive number",
                self.id
            )));
        }
        Ok(())
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Feature {}

// ============================================================================
// Configuration
// ============================================================================

/// Global planning configuration (singleton).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Team velocity in story points per sprint
    pub story_points_per_sprint: u32,
    /// Business days in one sprint
    pub workdays_per_sprint: u32,
    /// First day of the roadmap; today when absent. Must be a workday.
    pub roadmap_start_date: Option<NaiveDate>,
    /// Developer selection strategy
    pub allocation_criteria: AllocationCriteria,
    /// Maximum idle business days tolerated between two stories of the
    /// same developer within one wave (minimum 2)
    pub max_idle_days: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            story_points_per_sprint: 21,
            workdays_per_sprint: 15,
            roadmap_start_date: None,
            allocation_criteria: AllocationCriteria::LoadBalancing,
            max_idle_days: 3,
        }
    }
}

impl Configuration {
    /// Story points the team burns per business day.
    pub fn velocity_per_day(&self) -> f64 {
        f64::from(self.story_points_per_sprint) / f64::from(self.workdays_per_sprint)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.story_points_per_sprint == 0 {
            return Err(PlanError::Validation(
                "story points per sprint must be greater than zero".into(),
            ));
        }
        if self.workdays_per_sprint == 0 {
            return Err(PlanError::Validation(
                "workdays per sprint must be greater than zero".into(),
            ));
        }
        if let Some(start) = self.roadmap_start_date {
            if !calendar::is_workday(start) {
                return Err(PlanError::Validation(
                    "roadmap start date must be a workday".into(),
                ));
            }
        }
        if self.max_idle_days < 2 {
            return Err(PlanError::Validation(
                "max idle days must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Planning error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("invalid story point {0}: allowed values are 3, 5, 8, 13")]
    InvalidStoryPoint(u32),

    #[error("cyclic dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<StoryId>),

    #[error("story not found: {0}")]
    StoryNotFound(StoryId),

    #[error("developer not found: {0}")]
    DeveloperNotFound(DeveloperId),

    #[error("feature not found: {0}")]
    FeatureNotFound(FeatureId),

    #[error("wave {wave} already taken by feature '{existing_name}'")]
    DuplicateWave { wave: u32, existing_name: String },

    #[error("feature '{name}' ({id}) still has {count} stories")]
    FeatureHasStories {
        id: FeatureId,
        name: String,
        count: usize,
    },

    #[error(
        "story '{story_id}' (wave {story_wave}) cannot depend on '{dependency_id}' (wave {dependency_wave})"
    )]
    InvalidWaveDependency {
        story_id: StoryId,
        story_wave: u32,
        dependency_id: StoryId,
        dependency_wave: u32,
    },

    #[error("no developers available for allocation")]
    NoDevelopersAvailable,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// Warnings
// ============================================================================

/// An idle gap between two consecutive stories of one developer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdlenessWarning {
    pub developer_id: DeveloperId,
    /// Idle business days between the two stories (exclusive count)
    pub gap_days: u32,
    pub story_before: StoryId,
    pub story_after: StoryId,
    /// First calendar day of the idle window
    pub idle_start: NaiveDate,
    /// Last calendar day of the idle window
    pub idle_end: NaiveDate,
}

impl fmt::Display for IdlenessWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "developer {}: {} idle workday(s) between {} and {} ({} - {})",
            self.developer_id,
            self.gap_days,
            self.story_before,
            self.story_after,
            self.idle_start.format("%d/%m/%Y"),
            self.idle_end.format("%d/%m/%Y"),
        )
    }
}

/// Non-fatal findings surfaced by the allocator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationWarning {
    /// A wave made no further progress; the listed stories stay unallocated.
    Deadlock {
        wave: u32,
        unallocated: Vec<StoryId>,
    },
    /// Intra-wave idleness above the configured limit that repair could not
    /// eliminate.
    Idleness(IdlenessWarning),
    /// Idleness across a wave boundary. Informational only: waves are
    /// barriers, gaps between them are expected.
    WaveTransition(IdlenessWarning),
}

impl fmt::Display for AllocationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationWarning::Deadlock { wave, unallocated } => write!(
                f,
                "wave {wave}: {} story(ies) could not be allocated: {}",
                unallocated.len(),
                unallocated.join(", ")
            ),
            AllocationWarning::Idleness(w) => write!(f, "{w}"),
            AllocationWarning::WaveTransition(w) => write!(f, "(between waves) {w}"),
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Counters collected across one allocator run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationMetrics {
    pub stories_processed: usize,
    pub stories_allocated: usize,
    pub waves_processed: usize,
    pub total_iterations: u32,
    pub iterations_per_wave: HashMap<u32, u32>,
    pub allocations_by_dependency_owner: usize,
    pub allocations_by_load_balancing: usize,
    pub deadlocks_detected: usize,
    pub date_adjustments: usize,
    // Repair phase
    pub repair_reallocations: usize,
    pub repair_dependency_fixes: usize,
    pub repair_conflict_fixes: usize,
    pub max_idle_violations_detected: usize,
    pub max_idle_violations_fixed: usize,
    pub failed_reallocations: usize,
}

impl fmt::Display for AllocationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AllocationMetrics(stories={}/{}, waves={}, iterations={}, \
             by_dep_owner={}, by_load_bal={}, deadlocks={}, adjustments={}, \
             repair_reallocs={}, idle_violations={})",
            self.stories_allocated,
            self.stories_processed,
            self.waves_processed,
            self.total_iterations,
            self.allocations_by_dependency_owner,
            self.allocations_by_load_balancing,
            self.deadlocks_detected,
            self.date_adjustments,
            self.repair_reallocations,
            self.max_idle_violations_detected,
        )
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Story persistence contract.
///
/// `find_all` must return stories with `wave` already resolved from the
/// owning feature. `save_batch` must be atomic: one transaction for the
/// whole modified set.
pub trait StoryRepository {
    fn find_all(&self) -> Result<Vec<Story>, PlanError>;
    fn find_by_id(&self, id: &str) -> Result<Story, PlanError>;
    fn save(&mut self, story: Story) -> Result<(), PlanError>;
    fn save_batch(&mut self, stories: Vec<Story>) -> Result<(), PlanError>;
}

/// Developer persistence contract.
pub trait DeveloperRepository {
    fn find_all(&self) -> Result<Vec<Developer>, PlanError>;
    fn find_by_id(&self, id: &str) -> Result<Developer, PlanError>;
    fn save(&mut self, developer: Developer) -> Result<(), PlanError>;
    fn delete(&mut self, id: &str) -> Result<(), PlanError>;
}

/// Feature persistence contract. One feature per wave, enforced on save.
pub trait FeatureRepository {
    fn find_all(&self) -> Result<Vec<Feature>, PlanError>;
    fn find_by_id(&self, id: &str) -> Result<Feature, PlanError>;
    fn find_by_wave(&self, wave: u32) -> Result<Option<Feature>, PlanError>;
    fn exists(&self, id: &str) -> Result<bool, PlanError>;
    fn wave_exists(&self, wave: u32) -> Result<bool, PlanError>;
    fn count_stories_by_feature(&self, id: &str) -> Result<usize, PlanError>;
    fn save(&mut self, feature: Feature) -> Result<(), PlanError>;
    fn delete(&mut self, id: &str) -> Result<(), PlanError>;
}

/// Configuration persistence contract (singleton record).
pub trait ConfigurationRepository {
    fn get(&self) -> Result<Configuration, PlanError>;
    fn save(&mut self, configuration: Configuration) -> Result<(), PlanError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn story_point_accepts_fibonacci_scale() {
        for value in [3, 5, 8, 13] {
            assert_eq!(StoryPoint::new(value).unwrap().value(), value);
        }
    }

    #[test]
    fn story_point_rejects_other_values() {
        for value in [0, 1, 2, 4, 7, 21] {
            assert_eq!(
                StoryPoint::new(value),
                Err(PlanError::InvalidStoryPoint(value))
            );
        }
    }

    #[test]
    fn story_point_from_size_label() {
        assert_eq!(StoryPoint::from_size_label("P").unwrap().value(), 3);
        assert_eq!(StoryPoint::from_size_label("m").unwrap().value(), 5);
        assert_eq!(StoryPoint::from_size_label("G").unwrap().value(), 8);
        assert_eq!(StoryPoint::from_size_label("gg").unwrap().value(), 13);
        assert!(StoryPoint::from_size_label("XL").is_err());
    }

    #[test]
    fn status_parse_is_case_and_accent_insensitive() {
        assert_eq!(StoryStatus::parse("backlog").unwrap(), StoryStatus::Backlog);
        assert_eq!(
            StoryStatus::parse("EXECUCAO").unwrap(),
            StoryStatus::Execution
        );
        assert_eq!(
            StoryStatus::parse("Concluído").unwrap(),
            StoryStatus::Done
        );
        assert!(StoryStatus::parse("DONE").is_err());
    }

    #[test]
    fn status_display_uses_wire_form() {
        assert_eq!(StoryStatus::Execution.to_string(), "EXECUÇÃO");
        assert_eq!(StoryStatus::Done.to_string(), "CONCLUÍDO");
    }

    #[test]
    fn criteria_parse() {
        assert_eq!(
            AllocationCriteria::parse("load_balancing").unwrap(),
            AllocationCriteria::LoadBalancing
        );
        assert_eq!(
            AllocationCriteria::parse("DEPENDENCY OWNER").unwrap(),
            AllocationCriteria::DependencyOwner
        );
        assert!(AllocationCriteria::parse("ROUND_ROBIN").is_err());
    }

    #[test]
    fn story_builder() {
        let story = Story::new("US-001", "api", "Login endpoint")
            .story_point(StoryPoint::new(8).unwrap())
            .priority(3)
            .feature("F1", 2)
            .depends_on("US-000");

        assert_eq!(story.id, "US-001");
        assert_eq!(story.story_point.unwrap().value(), 8);
        assert_eq!(story.priority, 3);
        assert_eq!(story.wave, 2);
        assert_eq!(story.dependencies, vec!["US-000".to_string()]);
    }

    #[test]
    fn dependencies_have_set_semantics() {
        let mut story = Story::new("A", "core", "Story A");
        story.add_dependency("B");
        story.add_dependency("B");
        story.add_dependency("A"); // self-reference ignored
        assert_eq!(story.dependencies, vec!["B".to_string()]);

        story.remove_dependency("B");
        assert!(story.dependencies.is_empty());
    }

    #[test]
    fn story_allocation_round_trip() {
        let mut story = Story::new("A", "core", "Story A");
        assert!(!story.is_allocated());
        story.allocate_developer("dev1").unwrap();
        assert!(story.is_allocated());
        assert!(story.allocate_developer("  ").is_err());
        story.deallocate_developer();
        assert!(!story.is_allocated());
    }

    #[test]
    fn story_validation_rejects_bad_records() {
        assert!(Story::new("", "core", "x").validate().is_err());
        assert!(Story::new("A", "", "x").validate().is_err());
        assert!(Story::new("A", "core", " ").validate().is_err());

        let mut inverted = Story::new("A", "core", "Story A");
        inverted.start_date = NaiveDate::from_ymd_opt(2025, 1, 10);
        inverted.end_date = NaiveDate::from_ymd_opt(2025, 1, 6);
        assert!(inverted.validate().is_err());

        let mut zero = Story::new("A", "core", "Story A");
        zero.duration = Some(0);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn story_equality_is_by_id() {
        let a = Story::new("A", "core", "First");
        let also_a = Story::new("A", "ui", "Second");
        assert_eq!(a, also_a);
    }

    #[test]
    fn developer_name_needs_two_chars() {
        assert!(Developer::new("d1", "Jo").validate().is_ok());
        assert!(Developer::new("d1", "J").validate().is_err());
    }

    #[test]
    fn feature_invariants() {
        assert!(Feature::new("F1", "Search", 1).validate().is_ok());
        assert!(Feature::new("F1", "Se", 1).validate().is_err());
        assert!(Feature::new("F1", "Search", 0).validate().is_err());
    }

    #[test]
    fn configuration_velocity() {
        let config = Configuration::default();
        assert!((config.velocity_per_day() - 1.4).abs() < 1e-9);
    }

    #[test]
    fn configuration_validation() {
        assert!(Configuration::default().validate().is_ok());

        let mut config = Configuration::default();
        config.max_idle_days = 1;
        assert!(config.validate().is_err());

        let mut config = Configuration::default();
        // 2025-01-04 is a Saturday
        config.roadmap_start_date = NaiveDate::from_ymd_opt(2025, 1, 4);
        assert!(config.validate().is_err());

        let mut config = Configuration::default();
        config.workdays_per_sprint = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cyclic_dependency_error_formats_path() {
        let err = PlanError::CyclicDependency(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected: A -> B -> A"
        );
    }

    #[test]
    fn idleness_warning_display() {
        let warning = IdlenessWarning {
            developer_id: "dev1".into(),
            gap_days: 4,
            story_before: "A".into(),
            story_after: "B".into(),
            idle_start: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            idle_end: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        };
        let text = warning.to_string();
        assert!(text.contains("dev1"));
        assert!(text.contains("4 idle workday(s)"));
        assert!(text.contains("10/01/2025"));
    }

    #[test]
    fn story_serde_round_trip() {
        let story = Story::new("US-001", "api", "Login")
            .story_point(StoryPoint::new(5).unwrap())
            .feature("F1", 1)
            .status(StoryStatus::Execution);

        let json = serde_json::to_string(&story).unwrap();
        assert!(json.contains("EXECUÇÃO"));
        let back: Story = serde_json::from_str(&json).unwrap();
        assert_eq!(back.story_point.unwrap().value(), 5);
        assert_eq!(back.wave, 1);
    }

    #[test]
    fn story_point_serde_rejects_invalid() {
        let result: Result<StoryPoint, _> = serde_json::from_str("7");
        assert!(result.is_err());
    }
}
