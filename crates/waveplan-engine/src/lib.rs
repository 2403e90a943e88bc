//! # waveplan-engine
//!
//! Planning engine for waveplan: topological backlog ordering, business-day
//! schedule calculation and wave-by-wave developer allocation with a
//! fixed-point repair loop.
//!
//! The engine is a pure computation over in-memory collections: it owns the
//! entities for the duration of the call, mutates dates and assignments in
//! place, and hands the modified id-set back for the caller to persist in
//! one transaction. No clocks, no I/O, no global state; randomness enters
//! only through an explicit seed.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use waveplan_core::{Configuration, Developer, Story, StoryPoint};
//! use waveplan_engine::Planner;
//!
//! let mut stories = vec![
//!     Story::new("A", "api", "Groundwork").story_point(StoryPoint::new(5).unwrap()),
//!     Story::new("B", "api", "Follow-up")
//!         .story_point(StoryPoint::new(3).unwrap())
//!         .priority(1)
//!         .depends_on("A"),
//! ];
//! let developers = vec![Developer::new("d1", "Ana")];
//!
//! let planner = Planner::new(Configuration::default()).with_seed(42);
//! let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
//! let outcome = planner.plan(&mut stories, &developers, start).unwrap();
//!
//! assert_eq!(outcome.allocated, 2);
//! assert!(stories[1].start_date.unwrap() > stories[0].end_date.unwrap());
//! ```

use chrono::NaiveDate;
use waveplan_core::{Configuration, Developer, PlanError, Story};

pub mod allocate;
pub mod balance;
pub mod conflict;
pub mod cycle;
pub mod idleness;
pub mod schedule;
pub mod sort;
pub mod waves;

pub use allocate::{
    AllocationOutcome, Allocator, DEFAULT_MAX_ITERATIONS, MAX_REALLOCATIONS_PER_STORY,
    MAX_STABILIZATION_PASSES,
};
pub use conflict::AllocationConflict;

/// Full pipeline: sort, calculate, allocate.
///
/// The composition the application layer always runs; the individual
/// stages stay public for callers that need only one of them.
pub struct Planner {
    config: Configuration,
    seed: Option<u64>,
    max_iterations: u32,
}

impl Planner {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            seed: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Fix the tie-break seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the allocator's per-wave iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sort the backlog and compute dates, without touching assignments.
    ///
    /// `start_date` is the effective roadmap start; the caller resolves
    /// `roadmap_start_date` or today before calling in.
    pub fn schedule(
        &self,
        stories: &mut [Story],
        start_date: NaiveDate,
    ) -> Result<(), PlanError> {
        let order = sort::topological_order(stories)?;
        schedule::calculate(stories, &order, &self.config, start_date);
        Ok(())
    }

    /// Sort, calculate and allocate in one run.
    pub fn plan(
        &self,
        stories: &mut [Story],
        developers: &[Developer],
        start_date: NaiveDate,
    ) -> Result<AllocationOutcome, PlanError> {
        self.schedule(stories, start_date)?;

        let mut allocator = Allocator::new().with_max_iterations(self.max_iterations);
        if let Some(seed) = self.seed {
            allocator = allocator.with_seed(seed);
        }
        allocator.allocate(stories, developers, &self.config)
    }
}
