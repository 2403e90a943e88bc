//! Developer allocation.
//!
//! Processes waves in ascending order. Within a wave, unallocated stories
//! are visited by priority: a story with a free developer is assigned and
//! the pass restarts; a story with nobody free has its dates advanced one
//! workday, at most once per iteration, yielding to stories that have not
//! been advanced yet. A pass that can neither allocate nor advance is a
//! deadlock: the wave is abandoned with a warning and later waves proceed.
//!
//! After all waves, a stabilization loop repairs what the greedy phase may
//! have broken: dependency violations (topological walk), per-developer
//! overlaps, and intra-wave idleness above the configured limit, the last
//! one by cautious reassignment. Both the pass cap and the per-step caps
//! are load-bearing; convergence is not assumed.

use crate::{balance, conflict, idleness, sort};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};
use waveplan_core::calendar::{add_workdays, count_workdays};
use waveplan_core::{
    AllocationCriteria, AllocationMetrics, AllocationWarning, Configuration, Developer, PlanError,
    Story, StoryId,
};

/// Iteration cap per wave; configurable for large backlogs.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

/// A story bounces between developers at most this many times during repair.
pub const MAX_REALLOCATIONS_PER_STORY: usize = 3;

/// Stabilization passes over the three repair steps.
pub const MAX_STABILIZATION_PASSES: usize = 10;

/// Sub-passes inside the overlap resolution step.
const MAX_OVERLAP_PASSES: usize = 100;

/// Result of one allocator run. Stories are mutated in place; `modified`
/// names the records the caller must persist (one atomic batch).
#[derive(Clone, Debug)]
pub struct AllocationOutcome {
    pub allocated: usize,
    pub warnings: Vec<AllocationWarning>,
    pub metrics: AllocationMetrics,
    pub modified: BTreeSet<StoryId>,
}

/// Wave-by-wave developer allocator.
pub struct Allocator {
    max_iterations: u32,
    seed: Option<u64>,
}

impl Allocator {
    pub fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
        }
    }

    /// Override the per-wave iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Fix the random tie-break seed, making the run reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Assign developers to every eligible story.
    ///
    /// Eligible means: dates and story point set, no developer yet. The
    /// only hard failure is an empty developer roster.
    pub fn allocate(
        &self,
        stories: &mut [Story],
        developers: &[Developer],
        config: &Configuration,
    ) -> Result<AllocationOutcome, PlanError> {
        if developers.is_empty() {
            return Err(PlanError::NoDevelopersAvailable);
        }

        let mut run = Run {
            developers,
            criteria: config.allocation_criteria,
            max_idle_days: config.max_idle_days,
            max_iterations: self.max_iterations,
            rng: self
                .seed
                .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
            metrics: AllocationMetrics::default(),
            warnings: Vec::new(),
            modified: BTreeSet::new(),
            adjusted_global: HashSet::new(),
        };

        run.metrics.stories_processed = stories.len();

        let waves: BTreeSet<u32> = stories.iter().map(|s| s.wave).collect();
        run.metrics.waves_processed = waves.len();
        info!(criteria = %run.criteria, waves = waves.len(), "starting allocation");

        let mut allocated = 0;
        for &wave in &waves {
            allocated += run.allocate_wave(stories, wave);
        }

        run.repair(stories)?;
        run.renumber_schedule_order(stories);

        // Final idleness sweep: violations repair could not eliminate, plus
        // the informational inter-wave gaps.
        run.warnings
            .extend(idleness::detect_idleness(stories, run.max_idle_days));
        run.warnings
            .extend(idleness::detect_between_waves_idleness(stories));

        run.metrics.stories_allocated = allocated;
        info!(
            allocated,
            warnings = run.warnings.len(),
            metrics = %run.metrics,
            "allocation finished"
        );

        Ok(AllocationOutcome {
            allocated,
            warnings: run.warnings,
            metrics: run.metrics,
            modified: run.modified,
        })
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable state shared by one allocator run.
struct Run<'a> {
    developers: &'a [Developer],
    criteria: AllocationCriteria,
    max_idle_days: u32,
    max_iterations: u32,
    rng: StdRng,
    metrics: AllocationMetrics,
    warnings: Vec<AllocationWarning>,
    modified: BTreeSet<StoryId>,
    /// Stories whose dates were ever advanced, across all waves
    adjusted_global: HashSet<StoryId>,
}

impl Run<'_> {
    // ========================================================================
    // Wave loop
    // ========================================================================

    fn allocate_wave(&mut self, stories: &mut [Story], wave: u32) -> usize {
        debug!(wave, "processing wave");

        let mut allocated_count = 0;
        let mut iterations: u32 = 0;
        let mut adjusted_last: HashSet<StoryId> = HashSet::new();
        let mut deadlocked = false;

        for _ in 0..self.max_iterations {
            iterations += 1;

            let unallocated = eligible_indices(stories, wave);
            if unallocated.is_empty() {
                break;
            }

            let has_unadjusted_last = unallocated
                .iter()
                .any(|&i| !adjusted_last.contains(&stories[i].id));

            let mut adjusted_this: HashSet<StoryId> = HashSet::new();
            let mut allocation_made = false;

            for &i in &unallocated {
                if self.ensure_dependencies_finished(stories, i) {
                    debug!(story = %stories[i].id, "start pushed past dependencies");
                }

                let (Some(start), Some(end)) = (stories[i].start_date, stories[i].end_date)
                else {
                    continue;
                };

                let candidates: Vec<Developer> = self
                    .developers
                    .iter()
                    .filter(|d| conflict::is_free(&d.id, &stories[i].id, start, end, stories))
                    .cloned()
                    .collect();

                if candidates.is_empty() {
                    let id = stories[i].id.clone();
                    let adjusted_ever = self.adjusted_global.contains(&id);
                    let adjusted_last_iteration = adjusted_last.contains(&id);

                    if adjusted_ever && adjusted_last_iteration && has_unadjusted_last {
                        // Yield the slot to stories not advanced yet
                        continue;
                    }

                    self.advance_one_workday(stories, i);
                    self.adjusted_global.insert(id.clone());
                    adjusted_this.insert(id.clone());
                    self.modified.insert(id);
                    self.metrics.date_adjustments += 1;
                    debug!(story = %stories[i].id, wave, "dates advanced one workday");
                } else {
                    let owner_id = balance::get_dependency_owner(&stories[i], stories, &candidates)
                        .map(|d| d.id.clone());

                    let selected = balance::get_developer_for_story(
                        &stories[i],
                        stories,
                        &candidates,
                        self.criteria,
                        start,
                        self.max_idle_days,
                        wave,
                        &mut self.rng,
                    )
                    .unwrap_or_else(|| candidates[0].clone());

                    stories[i].developer_id = Some(selected.id.clone());
                    self.modified.insert(stories[i].id.clone());
                    allocated_count += 1;
                    allocation_made = true;

                    if owner_id.as_deref() == Some(selected.id.as_str()) {
                        self.metrics.allocations_by_dependency_owner += 1;
                    } else {
                        self.metrics.allocations_by_load_balancing += 1;
                    }

                    debug!(story = %stories[i].id, wave, developer = %selected.name, "story allocated");
                    // Restart the pass with a fresh unallocated list
                    break;
                }
            }

            let progressed = allocation_made || !adjusted_this.is_empty();
            adjusted_last = adjusted_this;

            if !progressed {
                let leftover: Vec<StoryId> = eligible_indices(stories, wave)
                    .into_iter()
                    .map(|i| stories[i].id.clone())
                    .collect();
                warn!(wave, ?leftover, "deadlock: wave abandoned");
                self.warnings.push(AllocationWarning::Deadlock {
                    wave,
                    unallocated: leftover,
                });
                self.metrics.deadlocks_detected += 1;
                deadlocked = true;
                break;
            }
        }

        // The iteration cap is a termination guarantee, not a success path:
        // stories still unallocated when it expires are surfaced like any
        // other dead end.
        if !deadlocked && iterations >= self.max_iterations {
            let leftover: Vec<StoryId> = eligible_indices(stories, wave)
                .into_iter()
                .map(|i| stories[i].id.clone())
                .collect();
            if !leftover.is_empty() {
                warn!(wave, ?leftover, "iteration cap reached with unallocated stories");
                self.warnings.push(AllocationWarning::Deadlock {
                    wave,
                    unallocated: leftover,
                });
                self.metrics.deadlocks_detected += 1;
            }
        }

        self.metrics.iterations_per_wave.insert(wave, iterations);
        self.metrics.total_iterations += iterations;

        debug!(wave, allocated_count, iterations, "wave finished");
        allocated_count
    }

    // ========================================================================
    // Date plumbing
    // ========================================================================

    /// Latest end date among the story's dependencies present in the set.
    fn latest_dependency_end(stories: &[Story], i: usize) -> Option<NaiveDate> {
        let by_id: HashMap<&str, &Story> =
            stories.iter().map(|s| (s.id.as_str(), s)).collect();
        stories[i]
            .dependencies
            .iter()
            .filter_map(|dep| by_id.get(dep.as_str()).and_then(|s| s.end_date))
            .max()
    }

    /// Move a story to `new_start`, keeping its duration. False when the
    /// duration cannot be derived.
    fn update_story_dates(stories: &mut [Story], i: usize, new_start: NaiveDate) -> bool {
        let span = match (stories[i].duration, stories[i].start_date, stories[i].end_date) {
            (Some(duration), _, _) => duration.max(1) - 1,
            (None, Some(start), Some(end)) => count_workdays(start, end).saturating_sub(1),
            _ => return false,
        };
        stories[i].start_date = Some(new_start);
        stories[i].end_date = Some(add_workdays(new_start, span));
        true
    }

    /// Push the story's start to the workday after its latest dependency
    /// ends, when it currently starts on or before that end.
    fn ensure_dependencies_finished(&mut self, stories: &mut [Story], i: usize) -> bool {
        if stories[i].dependencies.is_empty() || stories[i].start_date.is_none() {
            return false;
        }
        let Some(latest) = Self::latest_dependency_end(stories, i) else {
            return false;
        };
        if stories[i].start_date.is_some_and(|s| s > latest) {
            return false;
        }
        let new_start = add_workdays(latest, 1);
        if Self::update_story_dates(stories, i, new_start) {
            self.modified.insert(stories[i].id.clone());
            true
        } else {
            false
        }
    }

    fn advance_one_workday(&mut self, stories: &mut [Story], i: usize) {
        if let Some(start) = stories[i].start_date {
            Self::update_story_dates(stories, i, add_workdays(start, 1));
        }
    }

    // ========================================================================
    // Repair: fixed point over dependencies, overlaps and idleness
    // ========================================================================

    fn repair(&mut self, stories: &mut [Story]) -> Result<(), PlanError> {
        let mut reallocation_counts: HashMap<StoryId, usize> = HashMap::new();

        for pass in 0..MAX_STABILIZATION_PASSES {
            let mut changed = false;

            let dependency_fixes = self.fix_dependency_violations(stories)?;
            if dependency_fixes > 0 {
                self.metrics.repair_dependency_fixes += dependency_fixes;
                changed = true;
                debug!(pass, dependency_fixes, "repair: dependency violations fixed");
            }

            let conflicts_resolved = self.resolve_allocation_conflicts(stories);
            if conflicts_resolved > 0 {
                self.metrics.repair_conflict_fixes += conflicts_resolved;
                changed = true;
                debug!(pass, conflicts_resolved, "repair: overlaps resolved");
            }

            let idle_fixes = self.fix_idle_violations(stories, &mut reallocation_counts);
            if idle_fixes > 0 {
                changed = true;
                debug!(pass, idle_fixes, "repair: idleness violations fixed");
            }

            if !changed {
                info!(passes = pass + 1, "repair converged");
                return Ok(());
            }
        }

        warn!(
            passes = MAX_STABILIZATION_PASSES,
            "repair hit the stabilization pass cap"
        );
        Ok(())
    }

    /// Walk stories in topological order pushing each one past its latest
    /// dependency. Allocated stories move too; the overlap step cleans up
    /// whatever this creates.
    fn fix_dependency_violations(&mut self, stories: &mut [Story]) -> Result<usize, PlanError> {
        let order = sort::topological_order(stories)?;
        let mut fixed = 0;

        for idx in order {
            if stories[idx].start_date.is_none() || stories[idx].dependencies.is_empty() {
                continue;
            }
            let Some(latest) = Self::latest_dependency_end(stories, idx) else {
                continue;
            };
            if stories[idx].start_date.is_some_and(|s| s > latest) {
                continue;
            }
            let new_start = add_workdays(latest, 1);
            if Self::update_story_dates(stories, idx, new_start) {
                self.modified.insert(stories[idx].id.clone());
                fixed += 1;
                info!(
                    story = %stories[idx].id,
                    %new_start,
                    "dependency violation fixed"
                );
            }
        }

        Ok(fixed)
    }

    /// For each developer, push overlapping consecutive stories apart until
    /// a full sweep finds nothing.
    fn resolve_allocation_conflicts(&mut self, stories: &mut [Story]) -> usize {
        let mut resolved = 0;

        for _ in 0..MAX_OVERLAP_PASSES {
            let mut found_in_pass = false;

            for dev in self.developers {
                let mut dev_indices: Vec<usize> = stories
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| {
                        s.developer_id.as_deref() == Some(dev.id.as_str())
                            && s.start_date.is_some()
                            && s.end_date.is_some()
                    })
                    .map(|(i, _)| i)
                    .collect();

                if dev_indices.len() < 2 {
                    continue;
                }
                dev_indices.sort_by_key(|&i| (stories[i].start_date, stories[i].id.clone()));

                for pair in 0..dev_indices.len() - 1 {
                    let (current, next) = (dev_indices[pair], dev_indices[pair + 1]);
                    let overlap = conflict::periods_overlap(
                        stories[current].start_date.unwrap_or_default(),
                        stories[current].end_date.unwrap_or_default(),
                        stories[next].start_date.unwrap_or_default(),
                        stories[next].end_date.unwrap_or_default(),
                    );
                    if !overlap {
                        continue;
                    }

                    let new_start = add_workdays(stories[current].end_date.unwrap_or_default(), 1);
                    if Self::update_story_dates(stories, next, new_start) {
                        self.modified.insert(stories[next].id.clone());
                        resolved += 1;
                        found_in_pass = true;
                        warn!(
                            story = %stories[next].id,
                            blocker = %stories[current].id,
                            developer = %dev.name,
                            %new_start,
                            "overlap resolved"
                        );
                    }
                }
            }

            if !found_in_pass {
                break;
            }
        }

        resolved
    }

    /// Intra-wave idle gap of the story on its current developer, when it
    /// breaches the limit.
    fn max_idle_violation(&self, stories: &[Story], i: usize) -> Option<u32> {
        let dev_id = stories[i].developer_id.as_deref()?;
        let start = stories[i].start_date?;
        let gap =
            balance::idle_gap_within_wave(dev_id, &stories[i].id, start, stories[i].wave, stories)?;
        (gap > self.max_idle_days).then_some(gap)
    }

    /// Reassign idle-violating stories to some other free developer,
    /// rejecting moves that would only trade one violation for another.
    fn fix_idle_violations(
        &mut self,
        stories: &mut [Story],
        reallocation_counts: &mut HashMap<StoryId, usize>,
    ) -> usize {
        let mut allocated: Vec<usize> = (0..stories.len())
            .filter(|&i| {
                stories[i].developer_id.is_some()
                    && stories[i].start_date.is_some()
                    && stories[i].end_date.is_some()
            })
            .collect();
        allocated.sort_by_key(|&i| stories[i].start_date);

        let mut fixes = 0;
        for i in allocated {
            let Some(gap) = self.max_idle_violation(stories, i) else {
                continue;
            };
            self.metrics.max_idle_violations_detected += 1;
            debug!(
                story = %stories[i].id,
                gap,
                limit = self.max_idle_days,
                "idleness violation detected"
            );

            if self.try_reallocate(stories, i, gap, reallocation_counts) {
                fixes += 1;
                self.metrics.max_idle_violations_fixed += 1;
            } else {
                warn!(
                    story = %stories[i].id,
                    gap,
                    limit = self.max_idle_days,
                    "idleness violation could not be repaired"
                );
            }
        }
        fixes
    }

    fn try_reallocate(
        &mut self,
        stories: &mut [Story],
        i: usize,
        gap: u32,
        reallocation_counts: &mut HashMap<StoryId, usize>,
    ) -> bool {
        let (Some(start), Some(end)) = (stories[i].start_date, stories[i].end_date) else {
            return false;
        };
        let Some(current_dev) = stories[i].developer_id.clone() else {
            return false;
        };

        let id = stories[i].id.clone();
        let attempts = reallocation_counts.get(&id).copied().unwrap_or(0);
        if attempts >= MAX_REALLOCATIONS_PER_STORY {
            warn!(story = %id, attempts, "reallocation limit reached");
            self.metrics.failed_reallocations += 1;
            return false;
        }

        let candidates: Vec<Developer> = self
            .developers
            .iter()
            .filter(|d| d.id != current_dev)
            .filter(|d| conflict::is_free(&d.id, &id, start, end, stories))
            .cloned()
            .collect();

        if candidates.is_empty() {
            debug!(story = %id, "no alternative developer for reallocation");
            self.metrics.failed_reallocations += 1;
            return false;
        }

        let selected = balance::get_developer_for_story(
            &stories[i],
            stories,
            &candidates,
            self.criteria,
            start,
            self.max_idle_days,
            stories[i].wave,
            &mut self.rng,
        )
        .unwrap_or_else(|| candidates[0].clone());

        // Trial assignment; revert when it just moves the violation
        stories[i].developer_id = Some(selected.id.clone());
        if self.max_idle_violation(stories, i).is_some() {
            stories[i].developer_id = Some(current_dev);
            debug!(story = %id, candidate = %selected.name, "reallocation would re-violate");
            self.metrics.failed_reallocations += 1;
            return false;
        }

        self.modified.insert(id.clone());
        *reallocation_counts.entry(id.clone()).or_insert(0) += 1;
        self.metrics.repair_reallocations += 1;
        info!(
            story = %id,
            from = %current_dev,
            to = %selected.name,
            gap,
            "story reallocated to cut idleness"
        );
        true
    }

    // ========================================================================
    // Finalize
    // ========================================================================

    /// Dense `schedule_order` over the priority-sorted backlog; only
    /// actually-changed stories enter the modified set.
    fn renumber_schedule_order(&mut self, stories: &mut [Story]) {
        let mut by_priority: Vec<usize> = (0..stories.len()).collect();
        by_priority.sort_by_key(|&i| stories[i].priority);

        for (position, &i) in by_priority.iter().enumerate() {
            let position = position as u32;
            if stories[i].schedule_order != Some(position) {
                stories[i].schedule_order = Some(position);
                self.modified.insert(stories[i].id.clone());
            }
        }
    }
}

/// Unallocated, fully-specified stories of one wave, by ascending priority.
fn eligible_indices(stories: &[Story], wave: u32) -> Vec<usize> {
    let mut indices: Vec<usize> = stories
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.wave == wave
                && s.developer_id.is_none()
                && s.start_date.is_some()
                && s.end_date.is_some()
                && s.story_point.is_some()
        })
        .map(|(i, _)| i)
        .collect();
    indices.sort_by_key(|&i| stories[i].priority);
    indices
}
